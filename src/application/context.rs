//! Context manager: Loads, generates and persists the FHE context.
//!
//! The key file is the only place key material lives on disk. A context is
//! returned only once it is known to carry a secret key and, for a fresh
//! context, only after it has been persisted.

use std::sync::Arc;

use crate::adapters::keyfile::KeyFile;
use crate::domain::{CryptoContext, CryptoError, SchemeParams};
use crate::ports::HomomorphicScheme;
use crate::PrintvaultError;

/// Owns the key file and produces ready-to-use private contexts.
pub struct ContextManager<H>
where
    H: HomomorphicScheme,
{
    scheme: Arc<H>,
    key_file: KeyFile,
    params: SchemeParams,
}

impl<H> ContextManager<H>
where
    H: HomomorphicScheme,
{
    /// Create a new context manager.
    pub fn new(scheme: Arc<H>, key_file: KeyFile, params: SchemeParams) -> Self {
        Self {
            scheme,
            key_file,
            params,
        }
    }

    /// Load the context from the key file, or generate and persist a new one.
    ///
    /// # Errors
    /// Returns `MissingSecretKey` if the key file holds a public-only
    /// context, `InvalidKeyFormat` if it does not parse, `KeyGeneration` if a
    /// fresh context is not privately keyed, and key file errors if reading
    /// or writing fails.
    pub fn ensure_context(&self) -> Result<CryptoContext, PrintvaultError> {
        if self.key_file.exists() {
            tracing::info!("Key file found. Loading context...");
            let bytes = self.key_file.read()?;
            let context = self.scheme.deserialize_context(&bytes)?;

            if !context.is_private() {
                tracing::error!("Loaded context is public and does not contain a secret key");
                return Err(CryptoError::MissingSecretKey.into());
            }

            tracing::info!("Loaded FHE context - fingerprint: {}", context.fingerprint());
            return Ok(context);
        }

        tracing::info!("Key file not found. Generating new context and keys...");
        let context = self.scheme.generate_context(&self.params)?;
        if !context.is_private() {
            return Err(CryptoError::KeyGeneration(
                "generated context does not carry a secret key".to_string(),
            )
            .into());
        }

        self.persist(&context)?;
        Ok(context)
    }

    /// Serialize the context with its secret key and atomically replace the
    /// key file.
    ///
    /// # Errors
    /// Returns error if serialization or the file write fails.
    pub fn persist(&self, context: &CryptoContext) -> Result<(), PrintvaultError> {
        let bytes = zeroize::Zeroizing::new(self.scheme.serialize_context(context, true)?);
        self.key_file.write_atomic(&bytes)?;

        tracing::info!(
            "Context with secret key saved - fingerprint: {}",
            context.fingerprint()
        );
        Ok(())
    }
}
