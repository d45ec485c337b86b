//! Template store: compressed encrypted templates keyed by user id.

use std::sync::Arc;

use crate::adapters::StorageError;
use crate::application::codec::{pack, unpack};
use crate::domain::{EncryptedTemplate, UserId};
use crate::ports::{BlobCodec, KeyValueStore};
use crate::PrintvaultError;

/// Persists templates through a key-value backend, compressing on the way in.
pub struct TemplateStore<K, C>
where
    K: KeyValueStore,
    C: BlobCodec,
{
    store: Arc<K>,
    codec: Arc<C>,
}

impl<K, C> TemplateStore<K, C>
where
    K: KeyValueStore,
    K::Error: Into<StorageError>,
    C: BlobCodec,
{
    pub fn new(store: Arc<K>, codec: Arc<C>) -> Self {
        Self { store, codec }
    }

    /// Pack and upsert a template; re-saving an id replaces its template.
    ///
    /// # Errors
    /// Returns error if compression or the storage write fails.
    pub fn save(
        &self,
        user_id: &UserId,
        template: &EncryptedTemplate,
    ) -> Result<(), PrintvaultError> {
        tracing::debug!("Saving template for user {user_id}");
        let blob = pack(self.codec.as_ref(), template)?;

        self.store
            .put(user_id.as_str(), &blob)
            .map_err(|e| PrintvaultError::Storage(e.into()))?;

        tracing::debug!(
            "Stored template ({} bytes, {} compressed)",
            template.size_bytes(),
            blob.len()
        );
        Ok(())
    }

    /// Load and unpack the template of `user_id`.
    ///
    /// # Returns
    /// `None` if no template is stored for this id.
    ///
    /// # Errors
    /// Returns `CorruptBlob` if the stored bytes fail to decompress.
    pub fn load(&self, user_id: &UserId) -> Result<Option<EncryptedTemplate>, PrintvaultError> {
        tracing::debug!("Loading template for user {user_id}");

        let Some(blob) = self
            .store
            .get(user_id.as_str())
            .map_err(|e| PrintvaultError::Storage(e.into()))?
        else {
            tracing::info!("No template found for user {user_id}");
            return Ok(None);
        };

        match unpack(self.codec.as_ref(), &blob) {
            Ok(template) => Ok(Some(template)),
            Err(e) => {
                tracing::error!("Stored template for user {user_id} is corrupt: {e}");
                Err(e.into())
            }
        }
    }

    /// Whether a template is stored for `user_id`.
    ///
    /// # Errors
    /// Returns error if the storage read fails.
    pub fn contains(&self, user_id: &UserId) -> Result<bool, PrintvaultError> {
        self.store
            .get(user_id.as_str())
            .map(|blob| blob.is_some())
            .map_err(|e| PrintvaultError::Storage(e.into()))
    }

    /// All stored user ids, in backend order.
    ///
    /// # Errors
    /// Returns error if the storage read fails.
    pub fn list_user_ids(&self) -> Result<Vec<String>, PrintvaultError> {
        self.store
            .keys()
            .map_err(|e| PrintvaultError::Storage(e.into()))
    }
}
