//! Storage port: Trait for the template key-value backend.
//!
//! This trait abstracts the storage backend (SQLite) from the application logic.

/// Key-value persistence of opaque template blobs keyed by user id.
///
/// All data is stored locally and never transmitted.
pub trait KeyValueStore: Send + Sync {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch the blob stored under `key`.
    ///
    /// # Returns
    /// `None` if nothing is stored under `key`.
    ///
    /// # Errors
    /// Returns error if the storage operation fails.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    /// Returns error if the storage operation fails.
    fn put(&self, key: &str, value: &[u8]) -> Result<(), Self::Error>;

    /// List every stored key in backend iteration order.
    ///
    /// # Errors
    /// Returns error if the storage operation fails.
    fn keys(&self) -> Result<Vec<String>, Self::Error>;
}
