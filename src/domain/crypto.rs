//! Cryptographic context types for the homomorphic template scheme.
//!
//! The context bundles scheme parameters with serialized key material.
//! Adapters deserialize the key bytes on demand; the domain layer never
//! depends on a concrete FHE library.
//!
//! # Memory Security
//!
//! Secret key material implements `Zeroize` and `ZeroizeOnDrop` so it is
//! erased when the context is released.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Error type for cryptographic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Context does not carry a secret key; decryption is impossible")]
    MissingSecretKey,

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("Invalid scheme parameters: {0}")]
    InvalidParameters(String),
}

/// Scheme configuration carried by every context.
///
/// Defaults mirror a CKKS-style setup: ring degree 8192, a
/// `[60, 40, 40, 60]` bit modulus chain and a global scale of `2^40`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeParams {
    pub poly_modulus_degree: u32,
    pub coeff_mod_bit_sizes: Vec<u32>,
    /// Base-2 exponent of the global scale factor.
    pub global_scale_bits: u32,
    /// Generate auxiliary evaluation keys alongside the key pair.
    pub evaluation_keys: bool,
}

impl Default for SchemeParams {
    fn default() -> Self {
        Self {
            poly_modulus_degree: 8192,
            coeff_mod_bit_sizes: vec![60, 40, 40, 60],
            global_scale_bits: 40,
            evaluation_keys: true,
        }
    }
}

impl SchemeParams {
    /// Global scale factor as a float (`2^global_scale_bits`).
    #[must_use]
    pub fn global_scale(&self) -> f64 {
        2f64.powi(self.global_scale_bits as i32)
    }

    /// Check internal consistency of the parameter set.
    ///
    /// # Errors
    /// Returns `CryptoError::InvalidParameters` describing the first violation.
    pub fn validate(&self) -> Result<(), CryptoError> {
        let degree = self.poly_modulus_degree;
        if degree < 1024 || !degree.is_power_of_two() {
            return Err(CryptoError::InvalidParameters(format!(
                "poly_modulus_degree must be a power of two >= 1024, got {degree}"
            )));
        }

        if self.coeff_mod_bit_sizes.len() < 2 {
            return Err(CryptoError::InvalidParameters(
                "coefficient modulus chain needs at least two moduli".into(),
            ));
        }
        if let Some(bad) = self
            .coeff_mod_bit_sizes
            .iter()
            .find(|&&bits| bits == 0 || bits > 60)
        {
            return Err(CryptoError::InvalidParameters(format!(
                "coefficient modulus size {bad} outside 1..=60 bits"
            )));
        }

        if self.global_scale_bits == 0 || self.global_scale_bits > 60 {
            return Err(CryptoError::InvalidParameters(format!(
                "global scale exponent {} outside 1..=60",
                self.global_scale_bits
            )));
        }

        let chain = &self.coeff_mod_bit_sizes;
        let interior = &chain[1..chain.len() - 1];
        if let Some(&smallest) = interior.iter().min() {
            if self.global_scale_bits > smallest {
                return Err(CryptoError::InvalidParameters(format!(
                    "global scale 2^{} exceeds the interior modulus size ({smallest} bits)",
                    self.global_scale_bits
                )));
            }
        }

        Ok(())
    }
}

/// Serialized public encryption key.
#[derive(Clone)]
pub struct PublicKey {
    pub(crate) inner: Vec<u8>,

    /// Key fingerprint for identification (NOT secret)
    pub fingerprint: String,
}

impl PublicKey {
    /// Wrap serialized public key bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let fingerprint = compute_fingerprint(&bytes);
        Self {
            inner: bytes,
            fingerprint,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.inner
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicKey")
            .field("fingerprint", &self.fingerprint)
            .field("size_bytes", &self.inner.len())
            .finish()
    }
}

/// Serialized secret key.
///
/// This key MUST stay with the caller that owns the key file.
///
/// # Security
///
/// - Implements `ZeroizeOnDrop`: key material is erased when dropped
/// - `Debug` implementation does NOT expose key bytes
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    pub(crate) inner: Vec<u8>,
}

impl SecretKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { inner: bytes }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.inner
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKey")
            .field("size_bytes", &self.inner.len())
            .finish()
    }
}

/// Serialized auxiliary evaluation key (can compute, cannot decrypt).
#[derive(Clone)]
pub struct EvaluationKey {
    pub(crate) inner: Vec<u8>,
}

impl EvaluationKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { inner: bytes }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.inner
    }
}

impl std::fmt::Debug for EvaluationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationKey")
            .field("size_bytes", &self.inner.len())
            .finish()
    }
}

/// Cryptographic context: scheme parameters plus key material.
///
/// A context carrying a secret key is *private* and can decrypt. A
/// public-only context can still encrypt templates.
#[derive(Debug, Clone)]
pub struct CryptoContext {
    params: SchemeParams,
    public: PublicKey,
    evaluation: Option<EvaluationKey>,
    secret: Option<SecretKey>,
}

impl CryptoContext {
    pub fn new(
        params: SchemeParams,
        public: PublicKey,
        evaluation: Option<EvaluationKey>,
        secret: Option<SecretKey>,
    ) -> Self {
        Self {
            params,
            public,
            evaluation,
            secret,
        }
    }

    #[must_use]
    pub fn params(&self) -> &SchemeParams {
        &self.params
    }

    #[must_use]
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    #[must_use]
    pub fn evaluation_key(&self) -> Option<&EvaluationKey> {
        self.evaluation.as_ref()
    }

    /// Whether the context carries a secret key.
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.secret.is_some()
    }

    /// Borrow the secret key.
    ///
    /// # Errors
    /// Returns `CryptoError::MissingSecretKey` for public-only contexts.
    pub fn secret_key(&self) -> Result<&SecretKey, CryptoError> {
        self.secret.as_ref().ok_or(CryptoError::MissingSecretKey)
    }

    /// Fingerprint of the public key.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.public.fingerprint
    }

    /// A copy of this context with the secret key stripped.
    #[must_use]
    pub fn to_public(&self) -> Self {
        Self {
            params: self.params.clone(),
            public: self.public.clone(),
            evaluation: self.evaluation.clone(),
            secret: None,
        }
    }
}

/// Serialized ciphertext of one normalized biometric vector.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedTemplate {
    bytes: Vec<u8>,
}

impl EncryptedTemplate {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}

impl std::fmt::Debug for EncryptedTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedTemplate")
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

/// SHA-256 based fingerprint: first 8 bytes of the digest, hex encoded.
fn compute_fingerprint(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};

    let digest = Sha256::digest(bytes);
    digest[..8].iter().map(|b| format!("{b:02x}")).collect()
}
