//! Template codec: sample → normalized vector → ciphertext → stored blob,
//! and back.

use std::sync::Arc;

use crate::domain::{
    BiometricSample, CryptoContext, CryptoError, EncryptedTemplate, NormalizationBounds,
    NormalizedVector, SampleError,
};
use crate::ports::{BlobCodec, CodecError, HomomorphicScheme};

/// Decimal places kept after decryption.
const DECODE_DECIMALS: i32 = 2;

/// Compress a serialized ciphertext for storage.
///
/// # Errors
/// Returns `CodecError` if compression fails.
pub fn pack<C: BlobCodec + ?Sized>(
    codec: &C,
    template: &EncryptedTemplate,
) -> Result<Vec<u8>, CodecError> {
    codec.compress(template.as_bytes())
}

/// Decompress a stored blob back into a serialized ciphertext.
///
/// # Errors
/// Returns `CodecError` if the blob is not a valid compressed stream.
pub fn unpack<C: BlobCodec + ?Sized>(
    codec: &C,
    blob: &[u8],
) -> Result<EncryptedTemplate, CodecError> {
    codec.decompress(blob).map(EncryptedTemplate::from_bytes)
}

fn round_to_decimals(value: f64) -> f64 {
    let factor = 10f64.powi(DECODE_DECIMALS);
    (value * factor).round() / factor
}

/// Transforms biometric samples into encrypted templates and back.
pub struct TemplateCodec<H, C>
where
    H: HomomorphicScheme,
    C: BlobCodec,
{
    scheme: Arc<H>,
    codec: Arc<C>,
    bounds: NormalizationBounds,
}

impl<H, C> TemplateCodec<H, C>
where
    H: HomomorphicScheme,
    C: BlobCodec,
{
    pub fn new(scheme: Arc<H>, codec: Arc<C>, bounds: NormalizationBounds) -> Self {
        Self {
            scheme,
            codec,
            bounds,
        }
    }

    /// Validate raw measurements and scale them with the configured bounds.
    ///
    /// # Errors
    /// Returns `SampleError` if the sample does not have exactly 5 finite
    /// values.
    pub fn normalize(&self, raw: &[f64]) -> Result<NormalizedVector, SampleError> {
        let sample = BiometricSample::new(raw.to_vec())?;
        let normalized = self.bounds.normalize(&sample);
        tracing::debug!("Normalized sample ({} values)", normalized.len());
        Ok(normalized)
    }

    /// Encrypt a normalized vector under the context's public key.
    ///
    /// # Errors
    /// Returns `CryptoError::Encryption` if encryption fails.
    pub fn encode(
        &self,
        vector: &NormalizedVector,
        context: &CryptoContext,
    ) -> Result<EncryptedTemplate, CryptoError> {
        tracing::debug!("Encrypting biometric template...");
        self.scheme.encrypt(vector.values(), context)
    }

    /// # Errors
    /// Returns `CodecError` if compression fails.
    pub fn pack(&self, template: &EncryptedTemplate) -> Result<Vec<u8>, CodecError> {
        pack(self.codec.as_ref(), template)
    }

    /// # Errors
    /// Returns `CodecError` if the blob is not a valid compressed stream.
    pub fn unpack(&self, blob: &[u8]) -> Result<EncryptedTemplate, CodecError> {
        unpack(self.codec.as_ref(), blob)
    }

    /// Decrypt a template and round each value to 2 decimal places.
    ///
    /// # Errors
    /// Returns `CryptoError::MissingSecretKey` for a public-only context and
    /// `CryptoError::Decryption` for any other failure.
    pub fn decode(
        &self,
        template: &EncryptedTemplate,
        context: &CryptoContext,
    ) -> Result<Vec<f64>, CryptoError> {
        tracing::debug!("Decrypting template ({} bytes)...", template.size_bytes());

        let values = self.scheme.decrypt(template, context).map_err(|e| {
            tracing::error!("Failed to decrypt template: {e}");
            match e {
                CryptoError::MissingSecretKey => CryptoError::MissingSecretKey,
                CryptoError::Decryption(msg) => CryptoError::Decryption(msg),
                other => CryptoError::Decryption(other.to_string()),
            }
        })?;

        Ok(values.into_iter().map(round_to_decimals).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::MockScheme;
    use crate::adapters::zstd::ZstdCodec;
    use crate::domain::SchemeParams;
    use proptest::prelude::*;

    fn codec() -> TemplateCodec<MockScheme, ZstdCodec> {
        TemplateCodec::new(
            Arc::new(MockScheme),
            Arc::new(ZstdCodec::new()),
            NormalizationBounds::default(),
        )
    }

    fn context() -> CryptoContext {
        MockScheme.generate_context(&SchemeParams::default()).unwrap()
    }

    #[test]
    fn test_normalize_scales_into_unit_range() {
        let normalized = codec().normalize(&[0.0, 25.0, 50.0, 75.0, 100.0]).unwrap();
        assert_eq!(normalized.values(), &[0.0, 0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn test_normalize_rejects_bad_samples() {
        let codec = codec();
        assert!(matches!(
            codec.normalize(&[1.0, 2.0, 3.0, 4.0]),
            Err(SampleError::WrongDimension { actual: 4, .. })
        ));
        assert!(matches!(
            codec.normalize(&[1.0, f64::NAN, 3.0, 4.0, 5.0]),
            Err(SampleError::NonFinite { index: 1 })
        ));
    }

    #[test]
    fn test_encode_decode_rounds_to_two_decimals() {
        let codec = codec();
        let ctx = context();
        let normalized = codec.normalize(&[12.0, 34.0, 56.0, 78.0, 90.0]).unwrap();

        let template = codec.encode(&normalized, &ctx).unwrap();
        let decoded = codec.decode(&template, &ctx).unwrap();

        assert_eq!(decoded, vec![0.12, 0.34, 0.56, 0.78, 0.9]);
        for (d, n) in decoded.iter().zip(normalized.values()) {
            assert!((d - n).abs() <= 1e-2);
        }
    }

    #[test]
    fn test_encode_needs_only_public_key() {
        let codec = codec();
        let ctx = context();
        let normalized = codec.normalize(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();

        let template = codec.encode(&normalized, &ctx.to_public()).unwrap();
        assert!(matches!(
            codec.decode(&template, &ctx.to_public()),
            Err(CryptoError::MissingSecretKey)
        ));
        assert_eq!(codec.decode(&template, &ctx).unwrap()[4], 0.05);
    }

    #[test]
    fn test_decode_failures_surface_as_decryption() {
        let codec = codec();
        let garbage = EncryptedTemplate::from_bytes(vec![0xff; 3]);
        assert!(matches!(
            codec.decode(&garbage, &context()),
            Err(CryptoError::Decryption(_))
        ));
    }

    #[test]
    fn test_pack_unpack_roundtrip() {
        let codec = codec();
        let template = EncryptedTemplate::from_bytes(b"serialized ciphertext".repeat(8));

        let blob = codec.pack(&template).unwrap();
        assert!(blob.len() < template.size_bytes());
        assert_eq!(codec.unpack(&blob).unwrap().as_bytes(), template.as_bytes());
    }

    #[test]
    fn test_unpack_rejects_uncompressed_bytes() {
        let codec = codec();
        assert!(codec.unpack(b"raw ciphertext, not zstd").is_err());
        assert!(codec.unpack(&[]).is_err());
    }

    #[test]
    fn test_rounding() {
        assert_eq!(round_to_decimals(0.123_456), 0.12);
        assert_eq!(round_to_decimals(0.125_000_1), 0.13);
        assert_eq!(round_to_decimals(0.899_999_9), 0.9);
    }

    proptest! {
        #[test]
        fn prop_unpack_inverts_pack(bytes in prop::collection::vec(any::<u8>(), 0..4096)) {
            let codec = codec();
            let template = EncryptedTemplate::from_bytes(bytes.clone());

            let blob = codec.pack(&template).unwrap();
            let unpacked = codec.unpack(&blob).unwrap();
            prop_assert_eq!(unpacked.as_bytes(), bytes.as_slice());
        }

        #[test]
        fn prop_decode_recovers_normalized_values(
            raw in prop::collection::vec(0.0f64..=100.0, 5),
        ) {
            let codec = codec();
            let ctx = context();
            let normalized = codec.normalize(&raw).unwrap();

            let template = codec.encode(&normalized, &ctx).unwrap();
            let decoded = codec.decode(&template, &ctx).unwrap();

            prop_assert_eq!(decoded.len(), normalized.len());
            for (d, n) in decoded.iter().zip(normalized.values()) {
                prop_assert!((d - n).abs() <= 1e-2, "decoded {} vs normalized {}", d, n);
            }
        }
    }
}
