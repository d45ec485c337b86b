//! Homomorphic scheme port: Trait for the approximate-arithmetic FHE library.
//!
//! This trait abstracts the FHE library (tfhe-rs) from the application logic.
//! Key material crosses this boundary only as the serialized bytes held by
//! [`CryptoContext`].

use crate::domain::{CryptoContext, CryptoError, EncryptedTemplate, SchemeParams};

/// Trait for homomorphic encryption of real-valued vectors.
///
/// Implementations provide:
/// - Context (key) generation with a CSPRNG
/// - Context serialization, with or without the secret key
/// - Encryption under the public key
/// - Decryption under the secret key
pub trait HomomorphicScheme: Send + Sync {
    /// Generate a fresh private context for the given parameters.
    ///
    /// # Errors
    /// Returns `CryptoError::InvalidParameters` for inconsistent parameters
    /// and `CryptoError::KeyGeneration` if key generation fails.
    fn generate_context(&self, params: &SchemeParams) -> Result<CryptoContext, CryptoError>;

    /// Serialize a context. The secret key is written only when
    /// `include_secret` is set and the context carries one.
    ///
    /// # Errors
    /// Returns `CryptoError::Serialization` if serialization fails.
    fn serialize_context(
        &self,
        context: &CryptoContext,
        include_secret: bool,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Deserialize a context produced by [`HomomorphicScheme::serialize_context`].
    ///
    /// # Errors
    /// Returns `CryptoError::InvalidKeyFormat` if the bytes do not parse.
    fn deserialize_context(&self, bytes: &[u8]) -> Result<CryptoContext, CryptoError>;

    /// Encrypt a vector of reals under the context's public key and
    /// serialize the ciphertext.
    ///
    /// # Errors
    /// Returns `CryptoError::Encryption` if encryption fails.
    fn encrypt(
        &self,
        values: &[f64],
        context: &CryptoContext,
    ) -> Result<EncryptedTemplate, CryptoError>;

    /// Decrypt a serialized ciphertext. The result approximates the
    /// encrypted values.
    ///
    /// # Errors
    /// Returns `CryptoError::MissingSecretKey` for public-only contexts and
    /// `CryptoError::Decryption` if the ciphertext cannot be decrypted.
    fn decrypt(
        &self,
        template: &EncryptedTemplate,
        context: &CryptoContext,
    ) -> Result<Vec<f64>, CryptoError>;
}
