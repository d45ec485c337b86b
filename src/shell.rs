//! Interactive shell: list enrolled ids, then enroll or verify one user.
//!
//! Input and output are injected so the prompt flow can run against a
//! terminal or an in-memory buffer.

use std::io::{BufRead, Write};

use crate::adapters::StorageError;
use crate::application::{EnrollmentService, VerifyOutcome};
use crate::domain::{BiometricSample, CryptoContext, UserId, SAMPLE_DIMENSION};
use crate::ports::{BlobCodec, HomomorphicScheme, KeyValueStore};
use crate::PrintvaultError;

/// Menu entry chosen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellAction {
    Enroll,
    Verify,
    Exit,
    Invalid,
}

impl ShellAction {
    fn parse(input: &str) -> Self {
        match input.trim() {
            "1" => Self::Enroll,
            "2" => Self::Verify,
            "3" => Self::Exit,
            _ => Self::Invalid,
        }
    }
}

pub struct Shell<'a, H, K, C, R, W>
where
    H: HomomorphicScheme,
    K: KeyValueStore,
    C: BlobCodec,
{
    service: &'a EnrollmentService<H, K, C>,
    context: &'a CryptoContext,
    max_attempts: u32,
    input: R,
    output: W,
}

impl<'a, H, K, C, R, W> Shell<'a, H, K, C, R, W>
where
    H: HomomorphicScheme,
    K: KeyValueStore,
    K::Error: Into<StorageError>,
    C: BlobCodec,
    R: BufRead,
    W: Write,
{
    pub fn new(
        service: &'a EnrollmentService<H, K, C>,
        context: &'a CryptoContext,
        max_attempts: u32,
        input: R,
        output: W,
    ) -> Self {
        Self {
            service,
            context,
            max_attempts: max_attempts.max(1),
            input,
            output,
        }
    }

    /// Run one round of the menu.
    ///
    /// # Returns
    /// The action taken and, for verification, its outcome.
    ///
    /// # Errors
    /// Returns error if IO fails, input stays invalid for every attempt, or
    /// the enrollment service fails.
    pub fn run(&mut self) -> Result<(ShellAction, Option<VerifyOutcome>), PrintvaultError> {
        tracing::debug!("Starting user interaction flow");
        self.print_user_ids()?;

        let choice = self.prompt(
            "Choose an action:\n1. Enroll a new user ID\n2. Verify an existing user ID\n3. Exit\nYour choice (1/2/3): ",
        )?;

        let action = ShellAction::parse(&choice);
        let outcome = match action {
            ShellAction::Enroll => {
                self.enroll()?;
                None
            }
            ShellAction::Verify => Some(self.verify()?),
            ShellAction::Exit => {
                writeln!(self.output, "Exiting.")?;
                None
            }
            ShellAction::Invalid => {
                writeln!(self.output, "Invalid choice. Please enter 1, 2 or 3.")?;
                None
            }
        };

        Ok((action, outcome))
    }

    fn print_user_ids(&mut self) -> Result<(), PrintvaultError> {
        let ids = self.service.list_user_ids()?;
        if ids.is_empty() {
            writeln!(self.output, "No templates are currently stored.")?;
        } else {
            writeln!(self.output, "User IDs currently stored:")?;
            for id in ids {
                writeln!(self.output, "  {id}")?;
            }
        }
        Ok(())
    }

    fn enroll(&mut self) -> Result<(), PrintvaultError> {
        let user_id = self.read_user_id("Enter a user ID for the new template: ")?;
        let sample = self.read_sample()?;

        self.service.enroll(&user_id, sample.values(), self.context)?;
        writeln!(
            self.output,
            "Template for {user_id} stored successfully. Your data has been encrypted."
        )?;
        Ok(())
    }

    fn verify(&mut self) -> Result<VerifyOutcome, PrintvaultError> {
        let user_id = self.read_user_id("Enter your user ID: ")?;

        // Only ask for biometrics when there is something to compare against.
        if !self.service.is_enrolled(&user_id)? {
            writeln!(self.output, "No template found for user ID {user_id}.")?;
            return Ok(VerifyOutcome::UnknownUser);
        }

        let sample = self.read_sample()?;
        let outcome = self.service.verify(&user_id, sample.values(), self.context)?;

        match outcome {
            VerifyOutcome::Approved { .. } => writeln!(self.output, "Biometrics approved.")?,
            VerifyOutcome::Denied { .. } => writeln!(self.output, "Biometrics denied.")?,
            VerifyOutcome::UnknownUser => {
                writeln!(self.output, "No template found for user ID {user_id}.")?;
            }
        }
        Ok(outcome)
    }

    fn read_user_id(&mut self, prompt: &str) -> Result<UserId, PrintvaultError> {
        self.prompt_until(prompt, |line| UserId::new(line).map_err(|e| e.to_string()))
    }

    fn read_sample(&mut self) -> Result<BiometricSample, PrintvaultError> {
        let prompt = format!(
            "Enter your biometric data as {SAMPLE_DIMENSION} numbers separated by spaces: "
        );
        self.prompt_until(&prompt, |line| {
            BiometricSample::parse(line).map_err(|e| e.to_string())
        })
    }

    /// Re-prompt until `parse` accepts the line, at most `max_attempts` times.
    fn prompt_until<T>(
        &mut self,
        prompt: &str,
        parse: impl Fn(&str) -> Result<T, String>,
    ) -> Result<T, PrintvaultError> {
        for attempt in 1..=self.max_attempts {
            let line = self.prompt(prompt)?;
            match parse(&line) {
                Ok(value) => return Ok(value),
                Err(reason) => {
                    tracing::debug!("Rejected input on attempt {attempt}: {reason}");
                    writeln!(self.output, "Invalid input: {reason}")?;
                }
            }
        }
        Err(PrintvaultError::AttemptsExhausted(self.max_attempts))
    }

    fn prompt(&mut self, prompt: &str) -> Result<String, PrintvaultError> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "input closed",
            )
            .into());
        }
        Ok(line.trim_end_matches(['\n', '\r']).to_string())
    }
}
