//! Adapters layer: Concrete implementations of ports.
//!
//! These modules contain the actual integration with external libraries:
//! - `tfhe`: tfhe-rs for FHE operations
//! - `sqlite`: SQLite for template storage
//! - `zstd`: zstd compression of stored templates
//! - `keyfile`: atomic, optionally sealed key file
//! - `sanitize`: biometric/secret filtering for logs

pub mod keyfile;
#[cfg(test)]
pub mod mock;
pub mod sanitize;
pub mod sqlite;
pub mod tfhe;
pub mod zstd;

// Re-export adapter errors for lib.rs
pub use keyfile::KeyFileError;
pub use sqlite::StorageError;
