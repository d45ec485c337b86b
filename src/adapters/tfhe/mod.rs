//! TFHE adapter: Implementation of HomomorphicScheme using tfhe-rs.
//!
//! # Approximate encoding
//!
//! tfhe-rs encrypts integers. Real values are carried as fixed-point
//! integers at the context's global scale: `q = round(x * 2^scale_bits)`,
//! encrypted as `FheInt64`. Decryption divides by the same scale, so the
//! scheme behaves like an approximate (CKKS-style) scheme whose error is
//! bounded by `2^-scale_bits`.
//!
//! # Keys
//!
//! - `ClientKey`: secret key, required to decrypt
//! - `CompactPublicKey`: encrypts without the secret key
//! - `CompressedServerKey`: optional evaluation key, generated when
//!   `SchemeParams::evaluation_keys` is set
//!
//! All tfhe-rs objects are serialized with bincode and kept as bytes in the
//! domain types; they are deserialized per operation.

use serde::{Deserialize, Serialize};

use tfhe::prelude::*;
use tfhe::{
    ClientKey as TfheClientKey, CompactCiphertextList, CompactPublicKey, CompressedServerKey,
    ConfigBuilder, FheInt64,
};

use crate::domain::{
    CryptoContext, CryptoError, EncryptedTemplate, EvaluationKey, PublicKey, SchemeParams,
    SecretKey,
};
use crate::ports::HomomorphicScheme;

/// Version tag of the serialized context layout.
const CONTEXT_FORMAT_VERSION: u16 = 1;

/// Version tag of the serialized ciphertext layout.
const TEMPLATE_FORMAT_VERSION: u16 = 1;

/// Scaled values must fit comfortably in a signed 64-bit plaintext.
const MAX_SCALED_MAGNITUDE: f64 = 4_611_686_018_427_387_904.0; // 2^62

/// Serialized context as written to the key file.
#[derive(Serialize, Deserialize)]
struct StoredContext {
    version: u16,
    params: SchemeParams,
    public_key: Vec<u8>,
    evaluation_key: Option<Vec<u8>>,
    secret_key: Option<Vec<u8>>,
}

/// Borrowed view used when serializing, so secret bytes are not copied
/// into an intermediate owned buffer.
#[derive(Serialize)]
struct StoredContextRef<'a> {
    version: u16,
    params: &'a SchemeParams,
    public_key: &'a [u8],
    evaluation_key: Option<&'a [u8]>,
    secret_key: Option<&'a [u8]>,
}

/// Serialized ciphertext of one template.
#[derive(Serialize, Deserialize)]
struct StoredCiphertext {
    version: u16,
    /// Fingerprint of the public key used for encryption
    key_fingerprint: String,
    values: CompactCiphertextList,
}

/// TFHE adapter for homomorphic template encryption.
#[derive(Debug, Default)]
pub struct TfheScheme;

impl TfheScheme {
    #[must_use]
    pub fn new() -> Self {
        tracing::debug!("Initializing TfheScheme (tfhe-rs)");
        Self
    }

    fn quantize(value: f64, scale: f64) -> Result<i64, CryptoError> {
        let scaled = (value * scale).round();
        if !scaled.is_finite() || scaled.abs() >= MAX_SCALED_MAGNITUDE {
            return Err(CryptoError::Encryption(format!(
                "value out of range for fixed-point scale 2^{}",
                scale.log2()
            )));
        }
        Ok(scaled as i64)
    }

    fn deserialize_client_key(bytes: &[u8]) -> Result<TfheClientKey, CryptoError> {
        bincode::deserialize(bytes).map_err(|e| {
            CryptoError::InvalidKeyFormat(format!("Failed to deserialize client key: {e}"))
        })
    }

    fn deserialize_public_key(bytes: &[u8]) -> Result<CompactPublicKey, CryptoError> {
        bincode::deserialize(bytes).map_err(|e| {
            CryptoError::InvalidKeyFormat(format!("Failed to deserialize public key: {e}"))
        })
    }
}

impl HomomorphicScheme for TfheScheme {
    fn generate_context(&self, params: &SchemeParams) -> Result<CryptoContext, CryptoError> {
        params.validate()?;
        tracing::info!(
            "Generating FHE context (degree={}, moduli={:?}, scale=2^{})...",
            params.poly_modulus_degree,
            params.coeff_mod_bit_sizes,
            params.global_scale_bits
        );

        let config = ConfigBuilder::default().build();
        let client_key = TfheClientKey::generate(config);
        let public_key = CompactPublicKey::new(&client_key);

        let evaluation = if params.evaluation_keys {
            let server_key = CompressedServerKey::new(&client_key);
            let bytes = bincode::serialize(&server_key).map_err(|e| {
                CryptoError::KeyGeneration(format!("Failed to serialize evaluation key: {e}"))
            })?;
            Some(EvaluationKey::from_bytes(bytes))
        } else {
            None
        };

        let secret_bytes = bincode::serialize(&client_key).map_err(|e| {
            CryptoError::KeyGeneration(format!("Failed to serialize client key: {e}"))
        })?;
        let public_bytes = bincode::serialize(&public_key).map_err(|e| {
            CryptoError::KeyGeneration(format!("Failed to serialize public key: {e}"))
        })?;

        let public = PublicKey::from_bytes(public_bytes);
        tracing::info!("Generated FHE context - fingerprint: {}", public.fingerprint);

        Ok(CryptoContext::new(
            params.clone(),
            public,
            evaluation,
            Some(SecretKey::from_bytes(secret_bytes)),
        ))
    }

    fn serialize_context(
        &self,
        context: &CryptoContext,
        include_secret: bool,
    ) -> Result<Vec<u8>, CryptoError> {
        let secret_key = if include_secret {
            context.secret_key().ok().map(SecretKey::as_bytes)
        } else {
            None
        };

        let stored = StoredContextRef {
            version: CONTEXT_FORMAT_VERSION,
            params: context.params(),
            public_key: context.public_key().as_bytes(),
            evaluation_key: context.evaluation_key().map(EvaluationKey::as_bytes),
            secret_key,
        };

        bincode::serialize(&stored)
            .map_err(|e| CryptoError::Serialization(format!("Failed to serialize context: {e}")))
    }

    fn deserialize_context(&self, bytes: &[u8]) -> Result<CryptoContext, CryptoError> {
        let stored: StoredContext = bincode::deserialize(bytes)
            .map_err(|e| CryptoError::InvalidKeyFormat(format!("Malformed context: {e}")))?;

        if stored.version != CONTEXT_FORMAT_VERSION {
            return Err(CryptoError::InvalidKeyFormat(format!(
                "Unsupported context format version {}",
                stored.version
            )));
        }
        stored.params.validate()?;

        // Validate keys by attempting to deserialize
        let _: CompactPublicKey = Self::deserialize_public_key(&stored.public_key)?;
        if let Some(secret) = &stored.secret_key {
            let _: TfheClientKey = Self::deserialize_client_key(secret)?;
        }

        Ok(CryptoContext::new(
            stored.params,
            PublicKey::from_bytes(stored.public_key),
            stored.evaluation_key.map(EvaluationKey::from_bytes),
            stored.secret_key.map(SecretKey::from_bytes),
        ))
    }

    fn encrypt(
        &self,
        values: &[f64],
        context: &CryptoContext,
    ) -> Result<EncryptedTemplate, CryptoError> {
        tracing::debug!("Encrypting {} values...", values.len());

        let public_key = Self::deserialize_public_key(context.public_key().as_bytes())?;
        let scale = context.params().global_scale();

        let mut builder = CompactCiphertextList::builder(&public_key);
        for &value in values {
            builder.push(Self::quantize(value, scale)?);
        }

        let stored = StoredCiphertext {
            version: TEMPLATE_FORMAT_VERSION,
            key_fingerprint: context.fingerprint().to_string(),
            values: builder.build(),
        };

        let bytes = bincode::serialize(&stored).map_err(|e| {
            CryptoError::Encryption(format!("Failed to serialize ciphertext: {e}"))
        })?;

        tracing::debug!(
            "Encrypted {} values (ciphertext size: {} bytes)",
            values.len(),
            bytes.len()
        );
        Ok(EncryptedTemplate::from_bytes(bytes))
    }

    fn decrypt(
        &self,
        template: &EncryptedTemplate,
        context: &CryptoContext,
    ) -> Result<Vec<f64>, CryptoError> {
        let secret = context.secret_key()?;
        let client_key = Self::deserialize_client_key(secret.as_bytes())?;

        let stored: StoredCiphertext = bincode::deserialize(template.as_bytes()).map_err(|e| {
            CryptoError::Decryption(format!("Failed to deserialize ciphertext: {e}"))
        })?;

        if stored.version != TEMPLATE_FORMAT_VERSION {
            return Err(CryptoError::Decryption(format!(
                "Unsupported ciphertext format version {}",
                stored.version
            )));
        }
        if stored.key_fingerprint != context.fingerprint() {
            return Err(CryptoError::Decryption(format!(
                "Ciphertext was encrypted under key {}, context holds {}",
                stored.key_fingerprint,
                context.fingerprint()
            )));
        }

        let expander = stored
            .values
            .expand()
            .map_err(|e| CryptoError::Decryption(format!("Failed to expand ciphertext: {e}")))?;

        let scale = context.params().global_scale();
        let mut values = Vec::with_capacity(expander.len());
        for i in 0..expander.len() {
            let encrypted: FheInt64 = expander
                .get(i)
                .map_err(|e| CryptoError::Decryption(format!("Ciphertext {i}: {e}")))?
                .ok_or_else(|| CryptoError::Decryption(format!("Ciphertext {i} missing")))?;

            let clear: i64 = encrypted.decrypt(&client_key);
            values.push(clear as f64 / scale);
        }

        tracing::debug!("Decrypted {} values", values.len());
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    fn fast_params() -> SchemeParams {
        SchemeParams {
            evaluation_keys: false,
            ..SchemeParams::default()
        }
    }

    fn shared_context() -> &'static CryptoContext {
        static CONTEXT: OnceLock<CryptoContext> = OnceLock::new();
        CONTEXT.get_or_init(|| {
            TfheScheme::new()
                .generate_context(&fast_params())
                .expect("Context generation should succeed")
        })
    }

    #[test]
    fn test_quantization() {
        let scale = 2f64.powi(40);
        assert_eq!(TfheScheme::quantize(0.5, scale).unwrap(), 1i64 << 39);
        assert_eq!(TfheScheme::quantize(-0.25, scale).unwrap(), -(1i64 << 38));
        assert!(TfheScheme::quantize(1e9, scale).is_err());
        assert!(TfheScheme::quantize(f64::NAN, scale).is_err());
    }

    #[test]
    fn test_generated_context_is_private() {
        let ctx = shared_context();
        assert!(ctx.is_private());
        assert!(ctx.public_key().as_bytes().len() > 100);
        assert!(ctx.evaluation_key().is_none());
        assert_eq!(ctx.fingerprint().len(), 16);
    }

    #[test]
    fn test_generation_with_evaluation_keys() {
        let ctx = TfheScheme::new()
            .generate_context(&SchemeParams::default())
            .expect("Context generation should succeed");
        let evaluation = ctx.evaluation_key().expect("evaluation key requested");
        assert!(evaluation.as_bytes().len() > 100);
    }

    #[test]
    fn test_invalid_params_are_rejected() {
        let params = SchemeParams {
            poly_modulus_degree: 1000,
            ..fast_params()
        };
        assert!(matches!(
            TfheScheme::new().generate_context(&params),
            Err(CryptoError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let scheme = TfheScheme::new();
        let ctx = shared_context();
        let values = [0.12, 0.5, 0.0, 1.0, 0.875];

        let template = scheme.encrypt(&values, ctx).expect("Encryption should succeed");
        let decrypted = scheme.decrypt(&template, ctx).expect("Decryption should succeed");

        assert_eq!(decrypted.len(), values.len());
        for (got, want) in decrypted.iter().zip(values) {
            assert!((got - want).abs() < 1e-9, "{got} vs {want}");
        }
    }

    #[test]
    fn test_public_context_encrypts_but_cannot_decrypt() {
        let scheme = TfheScheme::new();
        let private = shared_context();
        let public = private.to_public();

        let template = scheme
            .encrypt(&[0.1, 0.2, 0.3, 0.4, 0.5], &public)
            .expect("Public encryption should succeed");
        assert!(matches!(
            scheme.decrypt(&template, &public),
            Err(CryptoError::MissingSecretKey)
        ));

        let decrypted = scheme.decrypt(&template, private).expect("Private decrypt");
        assert!((decrypted[4] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_context_serialization_roundtrip() {
        let scheme = TfheScheme::new();
        let ctx = shared_context();

        let bytes = scheme.serialize_context(ctx, true).expect("serialize");
        let restored = scheme.deserialize_context(&bytes).expect("deserialize");
        assert!(restored.is_private());
        assert_eq!(restored.fingerprint(), ctx.fingerprint());
        assert_eq!(restored.params(), ctx.params());

        let template = scheme.encrypt(&[0.3; 5], ctx).expect("encrypt");
        let decrypted = scheme.decrypt(&template, &restored).expect("decrypt");
        assert!(decrypted.iter().all(|v| (v - 0.3).abs() < 1e-9));

        let public_bytes = scheme.serialize_context(ctx, false).expect("serialize");
        let public = scheme.deserialize_context(&public_bytes).expect("deserialize");
        assert!(!public.is_private());
    }

    #[test]
    fn test_malformed_context_is_rejected() {
        assert!(matches!(
            TfheScheme::new().deserialize_context(b"not a context"),
            Err(CryptoError::InvalidKeyFormat(_))
        ));
    }

    #[test]
    fn test_foreign_ciphertext_is_rejected() {
        let scheme = TfheScheme::new();
        let ctx = shared_context();
        let other = scheme.generate_context(&fast_params()).expect("second context");

        let template = scheme.encrypt(&[0.5; 5], &other).expect("encrypt");
        assert!(matches!(
            scheme.decrypt(&template, ctx),
            Err(CryptoError::Decryption(_))
        ));
    }

    #[test]
    fn test_garbage_ciphertext_is_rejected() {
        let scheme = TfheScheme::new();
        let template = EncryptedTemplate::from_bytes(vec![1, 2, 3]);
        assert!(matches!(
            scheme.decrypt(&template, shared_context()),
            Err(CryptoError::Decryption(_))
        ));
    }
}
