//! Key file adapter: durable, atomic storage of the serialized FHE context.
//!
//! # Security
//!
//! The key file holds the secret key. It is written with owner-only
//! permissions and replaced atomically (temp file in the same directory,
//! fsync, rename), so a crash never leaves a truncated key behind.
//!
//! When a key password is available the context is sealed at rest:
//! - Argon2id for key derivation from password
//! - AES-256-GCM for authenticated encryption
//! - Password sourced from a file descriptor or file (e.g., Docker secret)
//!
//! Without a password the context is written as-is and protection relies on
//! file permissions alone.
use std::io::Write;
use std::path::{Path, PathBuf};
#[cfg(unix)]
use std::{io::Read, os::unix::io::FromRawFd};

use tempfile::NamedTempFile;
use zeroize::Zeroizing;

use crate::domain::kdf::{self, KdfError, SealedKey};

/// Secure sources for key file password.
///
/// Precedence (highest first):
/// - `PRINTVAULT_KEY_PASSWORD_FD` (read from an already-open FD, then close it)
/// - `PRINTVAULT_KEY_PASSWORD_FILE` (read from a file path)
/// - `/run/secrets/printvault_key_password` (Docker/Compose secret default)
///
/// In release builds, reading secrets from environment variables is refused.
pub const KEY_PASSWORD_FD_ENV: &str = "PRINTVAULT_KEY_PASSWORD_FD";
pub const KEY_PASSWORD_FILE_ENV: &str = "PRINTVAULT_KEY_PASSWORD_FILE";
const KEY_PASSWORD_DOCKER_SECRET_PATH: &str = "/run/secrets/printvault_key_password";

// Dev-only escape hatch for local runs.
const KEY_PASSWORD_ENV_DEV: &str = "PRINTVAULT_KEY_PASSWORD";

#[derive(Debug, thiserror::Error)]
pub enum KeyFileError {
    #[error("Key file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(
        "Key file is sealed but no password was provided: set {KEY_PASSWORD_FD_ENV} or {KEY_PASSWORD_FILE_ENV} (or mount {KEY_PASSWORD_DOCKER_SECRET_PATH})"
    )]
    MissingPassword,

    #[error("Key password from {0} is empty")]
    EmptyPassword(&'static str),

    #[error("Key decryption failed: wrong password or corrupted data")]
    KeyDecryption,

    #[error("Sealed key file is malformed")]
    Malformed,

    #[error("Key sealing failed: {0}")]
    Sealing(String),
}

impl From<KdfError> for KeyFileError {
    fn from(err: KdfError) -> Self {
        match err {
            KdfError::Decryption => Self::KeyDecryption,
            KdfError::InvalidFormat => Self::Malformed,
            KdfError::Derivation(msg) | KdfError::Encryption(msg) => Self::Sealing(msg),
        }
    }
}

/// Location of the persisted context plus the optional sealing password.
pub struct KeyFile {
    path: PathBuf,
    password: Option<Zeroizing<String>>,
}

impl std::fmt::Debug for KeyFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyFile")
            .field("path", &self.path)
            .field("sealed", &self.password.is_some())
            .finish()
    }
}

impl KeyFile {
    /// Key file without a sealing password.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            password: None,
        }
    }

    /// Seal on write and open on read with `password`.
    #[must_use]
    pub fn with_password(mut self, password: Zeroizing<String>) -> Self {
        self.password = Some(password);
        self
    }

    /// Key file whose password comes from the secure sources, if any is set.
    ///
    /// # Errors
    /// Returns error if a configured password source cannot be read or is
    /// empty.
    pub fn from_env(path: impl Into<PathBuf>) -> Result<Self, KeyFileError> {
        let key_file = Self::new(path);
        Ok(match password_from_env()? {
            Some(password) => key_file.with_password(password),
            None => key_file,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the serialized context, opening it if sealed.
    ///
    /// # Errors
    /// Returns `MissingPassword` for a sealed file without password,
    /// `KeyDecryption` for a wrong password, `Io` if the file is unreadable.
    pub fn read(&self) -> Result<Zeroizing<Vec<u8>>, KeyFileError> {
        let raw = Zeroizing::new(std::fs::read(&self.path)?);

        if !kdf::is_sealed(&raw) {
            return Ok(raw);
        }

        let password = self
            .password
            .as_ref()
            .ok_or(KeyFileError::MissingPassword)?;
        let sealed = SealedKey::from_bytes(&raw)?;
        let opened = kdf::open(&sealed, password)?;

        tracing::debug!("Opened sealed key file {}", self.path.display());
        Ok(opened)
    }

    /// Atomically replace the key file with `bytes`, sealing them if a
    /// password is set.
    ///
    /// # Errors
    /// Returns error if sealing or any filesystem step fails. The previous
    /// file, if any, is left untouched on failure.
    pub fn write_atomic(&self, bytes: &[u8]) -> Result<(), KeyFileError> {
        let payload = match &self.password {
            Some(password) => Zeroizing::new(kdf::seal(bytes, password)?.to_bytes()),
            None => Zeroizing::new(bytes.to_vec()),
        };

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut tmp = NamedTempFile::new_in(dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }
        tmp.write_all(&payload)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        tracing::info!(
            "Wrote key file {} ({}, {} bytes)",
            self.path.display(),
            if self.password.is_some() { "sealed" } else { "unsealed" },
            payload.len()
        );
        Ok(())
    }
}

fn non_empty_secret(raw: &str, source: &'static str) -> Result<Zeroizing<String>, KeyFileError> {
    let secret = raw.trim_end_matches(['\n', '\r']);
    if secret.is_empty() {
        return Err(KeyFileError::EmptyPassword(source));
    }
    Ok(Zeroizing::new(secret.to_string()))
}

/// Get the key file password from a secure source, if one is configured.
///
/// # Errors
/// Returns error if a configured source is unreadable or empty.
pub fn password_from_env() -> Result<Option<Zeroizing<String>>, KeyFileError> {
    // 1) Read from an already-open FD (recommended for systemd/K8s sidecars)
    #[cfg(unix)]
    if let Ok(fd_str) = std::env::var(KEY_PASSWORD_FD_ENV) {
        let fd: i32 = fd_str
            .trim()
            .parse()
            .map_err(|_| KeyFileError::EmptyPassword(KEY_PASSWORD_FD_ENV))?;
        if fd <= 2 {
            // Refuse stdio FDs; stdin belongs to the interactive shell.
            return Err(KeyFileError::EmptyPassword(KEY_PASSWORD_FD_ENV));
        }

        // SAFETY: We take ownership of the FD for one-time secret read and close it.
        let mut file = unsafe { std::fs::File::from_raw_fd(fd) };
        let mut buf = Zeroizing::new(String::new());
        file.read_to_string(&mut buf)?;
        return non_empty_secret(&buf, KEY_PASSWORD_FD_ENV).map(Some);
    }

    // 2) Read from an explicit file path
    if let Ok(path) = std::env::var(KEY_PASSWORD_FILE_ENV) {
        let content = Zeroizing::new(std::fs::read_to_string(path.trim())?);
        return non_empty_secret(&content, KEY_PASSWORD_FILE_ENV).map(Some);
    }

    // 3) Docker secrets default path
    if Path::new(KEY_PASSWORD_DOCKER_SECRET_PATH).exists() {
        let content = Zeroizing::new(std::fs::read_to_string(KEY_PASSWORD_DOCKER_SECRET_PATH)?);
        return non_empty_secret(&content, KEY_PASSWORD_DOCKER_SECRET_PATH).map(Some);
    }

    // 4) Dev-only env var (refused in release builds)
    if cfg!(debug_assertions) {
        if let Ok(v) = std::env::var(KEY_PASSWORD_ENV_DEV) {
            return non_empty_secret(&v, KEY_PASSWORD_ENV_DEV).map(Some);
        }
    }

    Ok(None)
}
