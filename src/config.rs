//! Runtime settings.
//!
//! The binary fills these from command-line flags backed by `PRINTVAULT_*`
//! environment variables; library users construct them directly.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::{MatchPolicy, NormalizationBounds, SchemeParams};
use crate::PrintvaultError;

/// Default number of input attempts in the interactive shell.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_key_path")]
    pub key_path: PathBuf,

    #[serde(default)]
    pub bounds: NormalizationBounds,
    #[serde(default)]
    pub policy: MatchPolicy,
    #[serde(default)]
    pub scheme: SchemeParams,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("printvault.db")
}
fn default_key_path() -> PathBuf {
    PathBuf::from("printvault.key")
}
fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            key_path: default_key_path(),
            bounds: NormalizationBounds::default(),
            policy: MatchPolicy::default(),
            scheme: SchemeParams::default(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Settings {
    /// # Errors
    /// Returns `PrintvaultError::Validation` describing the first
    /// inconsistent value.
    pub fn validate(&self) -> Result<(), PrintvaultError> {
        self.bounds
            .validate()
            .map_err(|e| PrintvaultError::Validation(e.to_string()))?;
        self.policy
            .validate()
            .map_err(|e| PrintvaultError::Validation(e.to_string()))?;
        self.scheme
            .validate()
            .map_err(|e| PrintvaultError::Validation(e.to_string()))?;

        if self.max_attempts == 0 {
            return Err(PrintvaultError::Validation(
                "max attempts must be at least 1".to_string(),
            ));
        }
        if self.db_path.as_os_str().is_empty() || self.key_path.as_os_str().is_empty() {
            return Err(PrintvaultError::Validation(
                "database and key file paths must not be empty".to_string(),
            ));
        }
        if self.db_path == self.key_path {
            return Err(PrintvaultError::Validation(
                "database and key file must be different files".to_string(),
            ));
        }
        Ok(())
    }
}
