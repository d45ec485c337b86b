//! # Printvault
//!
//! Biometric template enrollment and verification under homomorphic
//! encryption.
//!
//! This crate provides:
//! - Min-max normalization of fixed-length biometric samples
//! - Encryption of templates under an approximate-arithmetic FHE context
//! - Compressed, per-user template storage in SQLite
//! - Tolerance-based matching of decrypted templates
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core business types (samples, crypto context, match policy)
//! - `ports`: Trait definitions for external operations
//! - `adapters`: Concrete implementations (tfhe-rs, SQLite, zstd, key file)
//! - `application`: Use cases orchestrating domain and ports
//! - `config`: Runtime settings
//! - `shell`: Interactive enrollment/verification prompt

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod shell;

pub use application::{EnrollmentService, VerifyOutcome};
pub use config::Settings;
pub use domain::{BiometricSample, CryptoContext, UserId};

/// Result type for Printvault operations
pub type Result<T> = std::result::Result<T, PrintvaultError>;

/// Main error type for Printvault
#[derive(Debug, thiserror::Error)]
pub enum PrintvaultError {
    #[error("Cryptographic operation failed: {0}")]
    Crypto(#[from] domain::CryptoError),

    #[error("Invalid sample: {0}")]
    InvalidSample(#[from] domain::SampleError),

    #[error("Corrupt template blob: {0}")]
    CorruptBlob(#[from] ports::CodecError),

    #[error("Template comparison failed: {0}")]
    Match(#[from] domain::MatchError),

    #[error("Invalid user ID: {0}")]
    UserId(#[from] domain::UserIdError),

    #[error("Storage operation failed: {0}")]
    Storage(#[from] adapters::StorageError),

    #[error("Key file error: {0}")]
    KeyFile(#[from] adapters::KeyFileError),

    #[error("Invalid configuration: {0}")]
    Validation(String),

    #[error("No valid input after {0} attempts")]
    AttemptsExhausted(u32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
