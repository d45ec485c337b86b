//! Mock homomorphic scheme for testing
//!
//! NOT SECURE - values are stored in the clear with a small additive error.
//! Enables fast application tests without tfhe-rs key generation.

use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::domain::{
    CryptoContext, CryptoError, EncryptedTemplate, PublicKey, SchemeParams, SecretKey,
};
use crate::ports::HomomorphicScheme;

/// Error added to every value, well below the 2-decimal rounding step.
pub const MOCK_NOISE: f64 = 1e-6;

#[derive(Serialize, Deserialize)]
struct MockContext {
    params: SchemeParams,
    key: Vec<u8>,
    secret: Option<Vec<u8>>,
}

#[derive(Serialize, Deserialize)]
struct MockCiphertext {
    key_fingerprint: String,
    values: Vec<f64>,
}

#[derive(Debug, Default)]
pub struct MockScheme;

impl HomomorphicScheme for MockScheme {
    fn generate_context(&self, params: &SchemeParams) -> Result<CryptoContext, CryptoError> {
        params.validate()?;

        let mut key = vec![0u8; 32];
        OsRng.fill_bytes(&mut key);

        // Mock: pk = sk
        Ok(CryptoContext::new(
            params.clone(),
            PublicKey::from_bytes(key.clone()),
            None,
            Some(SecretKey::from_bytes(key)),
        ))
    }

    fn serialize_context(
        &self,
        context: &CryptoContext,
        include_secret: bool,
    ) -> Result<Vec<u8>, CryptoError> {
        let secret = if include_secret {
            context.secret_key().ok().map(|s| s.as_bytes().to_vec())
        } else {
            None
        };
        let stored = MockContext {
            params: context.params().clone(),
            key: context.public_key().as_bytes().to_vec(),
            secret,
        };
        bincode::serialize(&stored).map_err(|e| CryptoError::Serialization(e.to_string()))
    }

    fn deserialize_context(&self, bytes: &[u8]) -> Result<CryptoContext, CryptoError> {
        let stored: MockContext = bincode::deserialize(bytes)
            .map_err(|e| CryptoError::InvalidKeyFormat(e.to_string()))?;
        Ok(CryptoContext::new(
            stored.params,
            PublicKey::from_bytes(stored.key),
            None,
            stored.secret.map(SecretKey::from_bytes),
        ))
    }

    fn encrypt(
        &self,
        values: &[f64],
        context: &CryptoContext,
    ) -> Result<EncryptedTemplate, CryptoError> {
        let stored = MockCiphertext {
            key_fingerprint: context.fingerprint().to_string(),
            values: values.iter().map(|v| v + MOCK_NOISE).collect(),
        };
        bincode::serialize(&stored)
            .map(EncryptedTemplate::from_bytes)
            .map_err(|e| CryptoError::Encryption(e.to_string()))
    }

    fn decrypt(
        &self,
        template: &EncryptedTemplate,
        context: &CryptoContext,
    ) -> Result<Vec<f64>, CryptoError> {
        context.secret_key()?;

        let stored: MockCiphertext = bincode::deserialize(template.as_bytes())
            .map_err(|e| CryptoError::Decryption(e.to_string()))?;
        if stored.key_fingerprint != context.fingerprint() {
            return Err(CryptoError::Decryption("foreign key".to_string()));
        }
        Ok(stored.values)
    }
}
