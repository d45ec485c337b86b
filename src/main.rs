//! Printvault: Encrypted biometric enrollment and verification
//!
//! Main entry point for the command-line application.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use printvault::adapters::keyfile::KeyFile;
use printvault::adapters::sanitize::SanitizingMakeWriter;
use printvault::adapters::sqlite::SqliteStorage;
use printvault::adapters::tfhe::TfheScheme;
use printvault::adapters::zstd::ZstdCodec;
use printvault::application::ContextManager;
use printvault::config::DEFAULT_MAX_ATTEMPTS;
use printvault::domain::{
    MatchPolicy, NormalizationBounds, DEFAULT_THRESHOLD, DEFAULT_TOLERANCE,
};
use printvault::shell::Shell;
use printvault::{BiometricSample, EnrollmentService, Settings, UserId, VerifyOutcome};

/// Exit code for errors, distinct from the verification outcomes.
const EXIT_ERROR: u8 = 3;

#[derive(Parser)]
#[command(name = "printvault")]
#[command(about = "Enroll and verify biometric templates under homomorphic encryption")]
#[command(version)]
struct Cli {
    /// Output format
    #[arg(long, global = true)]
    json: bool,

    /// Template database path
    #[arg(long, global = true, env = "PRINTVAULT_DB_PATH", default_value = "printvault.db")]
    db_path: PathBuf,

    /// Key file path
    #[arg(long, global = true, env = "PRINTVAULT_KEY_PATH", default_value = "printvault.key")]
    key_path: PathBuf,

    /// Minimum similarity (percent) to approve a verification
    #[arg(long, global = true, env = "PRINTVAULT_THRESHOLD", default_value_t = DEFAULT_THRESHOLD)]
    threshold: f64,

    /// Absolute per-component tolerance after normalization
    #[arg(long, global = true, env = "PRINTVAULT_TOLERANCE", default_value_t = DEFAULT_TOLERANCE)]
    tolerance: f64,

    /// Lower normalization bound
    #[arg(
        long,
        global = true,
        env = "PRINTVAULT_NORMALIZE_MIN",
        default_value_t = 0.0,
        allow_hyphen_values = true
    )]
    normalize_min: f64,

    /// Upper normalization bound
    #[arg(
        long,
        global = true,
        env = "PRINTVAULT_NORMALIZE_MAX",
        default_value_t = 100.0,
        allow_hyphen_values = true
    )]
    normalize_max: f64,

    /// Input attempts in the interactive shell
    #[arg(
        long,
        global = true,
        env = "PRINTVAULT_MAX_ATTEMPTS",
        default_value_t = DEFAULT_MAX_ATTEMPTS
    )]
    max_attempts: u32,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Enroll (or re-enroll) a user's biometric sample
    Enroll(SampleArgs),
    /// Verify a sample against a user's enrolled template
    Verify(SampleArgs),
    /// List enrolled user IDs
    List,
    /// Interactive menu (default)
    Shell,
}

#[derive(Args)]
struct SampleArgs {
    /// User ID
    #[arg(long)]
    user: String,

    /// Five measurements separated by spaces or commas
    #[arg(long, allow_hyphen_values = true)]
    sample: String,
}

impl Cli {
    fn settings(&self) -> Settings {
        Settings {
            db_path: self.db_path.clone(),
            key_path: self.key_path.clone(),
            bounds: NormalizationBounds {
                min: self.normalize_min,
                max: self.normalize_max,
            },
            policy: MatchPolicy {
                threshold: self.threshold,
                tolerance: self.tolerance,
            },
            max_attempts: self.max_attempts,
            ..Settings::default()
        }
    }
}

fn init_logging() -> Result<tracing_appender::non_blocking::WorkerGuard> {
    // Logging to the terminal would interleave with prompts and command output.
    // Default behavior:
    // - interactive TTY: log to a file
    // - non-interactive: log to stderr (stdout carries command output)
    let log_mode = std::env::var("PRINTVAULT_LOG_MODE").unwrap_or_else(|_| "auto".to_string());

    let interactive = std::io::stdout().is_terminal();
    let (writer, guard) = match log_mode.as_str() {
        "stdout" => tracing_appender::non_blocking(std::io::stdout()),
        "stderr" => tracing_appender::non_blocking(std::io::stderr()),
        "file" => tracing_appender::non_blocking(open_log_file()?),
        // auto
        _ if interactive => tracing_appender::non_blocking(open_log_file()?),
        _ => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(SanitizingMakeWriter::new(writer)),
        )
        .init();

    Ok(guard)
}

fn open_log_file() -> Result<std::fs::File> {
    let log_file =
        std::env::var("PRINTVAULT_LOG_FILE").unwrap_or_else(|_| "printvault.log".to_string());

    if let Some(parent) = std::path::Path::new(&log_file).parent() {
        // Best-effort: don't fail startup just because the directory is missing.
        let _ = std::fs::create_dir_all(parent);
    }

    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .with_context(|| format!("Failed to open log file {log_file}"))
}

fn print_user_ids(ids: &[String], json_output: bool) {
    if json_output {
        println!("{}", json!({ "user_ids": ids }));
    } else if ids.is_empty() {
        println!("No templates are currently stored.");
    } else {
        println!("User IDs currently stored:");
        for id in ids {
            println!("  {id}");
        }
    }
}

fn print_outcome(user_id: &UserId, outcome: &VerifyOutcome, json_output: bool) -> Result<()> {
    if json_output {
        let mut value = serde_json::to_value(outcome)?;
        value["user_id"] = json!(user_id.as_str());
        println!("{value}");
        return Ok(());
    }

    match outcome {
        VerifyOutcome::Approved { similarity } => {
            println!("Biometrics approved ({similarity:.1}% similar).");
        }
        VerifyOutcome::Denied { similarity } => {
            println!("Biometrics denied ({similarity:.1}% similar).");
        }
        VerifyOutcome::UnknownUser => println!("No template found for user ID {user_id}."),
    }
    Ok(())
}

fn run(cli: Cli) -> Result<ExitCode> {
    let settings = cli.settings();
    settings.validate()?;

    // Open storage and ensure keys before doing anything else.
    let storage = Arc::new(
        SqliteStorage::new(&settings.db_path)
            .with_context(|| format!("Failed to open {}", settings.db_path.display()))?,
    );
    let scheme = Arc::new(TfheScheme::new());

    let key_file = KeyFile::from_env(&settings.key_path)?;
    let context = ContextManager::new(Arc::clone(&scheme), key_file, settings.scheme.clone())
        .ensure_context()?;

    let service = EnrollmentService::new(
        scheme,
        storage,
        Arc::new(ZstdCodec::new()),
        settings.bounds,
        settings.policy,
    );

    match cli.command.unwrap_or(Command::Shell) {
        Command::Enroll(args) => {
            let user_id = UserId::new(&args.user)?;
            let sample = BiometricSample::parse(&args.sample)?;
            service.enroll(&user_id, sample.values(), &context)?;

            if cli.json {
                println!("{}", json!({ "enrolled": user_id.as_str() }));
            } else {
                println!("Template for {user_id} stored successfully. Your data has been encrypted.");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Verify(args) => {
            let user_id = UserId::new(&args.user)?;
            // Unknown ids exit 2 even when the sample is malformed.
            let outcome = service.verify_input(&user_id, &args.sample, &context)?;

            print_outcome(&user_id, &outcome, cli.json)?;
            Ok(match outcome {
                VerifyOutcome::Approved { .. } => ExitCode::SUCCESS,
                VerifyOutcome::Denied { .. } => ExitCode::from(1),
                VerifyOutcome::UnknownUser => ExitCode::from(2),
            })
        }
        Command::List => {
            print_user_ids(&service.list_user_ids()?, cli.json);
            Ok(ExitCode::SUCCESS)
        }
        Command::Shell => {
            let stdin = std::io::stdin();
            let mut shell = Shell::new(
                &service,
                &context,
                settings.max_attempts,
                stdin.lock(),
                std::io::stdout(),
            );
            shell.run()?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match init_logging() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::from(EXIT_ERROR);
        }
    };

    tracing::info!("Starting Printvault...");

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("An error occurred: {e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::from(EXIT_ERROR)
        }
    };

    tracing::info!("Printvault finished.");
    code
}
