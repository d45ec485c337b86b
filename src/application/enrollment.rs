//! Enrollment service: Orchestrates template enrollment and verification.
//!
//! This service coordinates:
//! - User id and sample validation
//! - Normalization and encryption
//! - Template storage
//! - Decryption and tolerance matching
//!
//! The crypto context is passed into every call; the service holds no key
//! material of its own.

use std::sync::Arc;

use serde::Serialize;

use crate::adapters::StorageError;
use crate::application::codec::TemplateCodec;
use crate::application::store::TemplateStore;
use crate::domain::{
    BiometricSample, CryptoContext, EncryptedTemplate, MatchPolicy, NormalizationBounds, UserId,
};
use crate::ports::{BlobCodec, HomomorphicScheme, KeyValueStore};
use crate::PrintvaultError;

/// Result of a verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerifyOutcome {
    Approved { similarity: f64 },
    Denied { similarity: f64 },
    /// No template is enrolled under the requested id.
    UnknownUser,
}

impl VerifyOutcome {
    #[must_use]
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved { .. })
    }

    #[must_use]
    pub fn similarity(&self) -> Option<f64> {
        match self {
            Self::Approved { similarity } | Self::Denied { similarity } => Some(*similarity),
            Self::UnknownUser => None,
        }
    }
}

/// Service for enrolling and verifying encrypted biometric templates.
pub struct EnrollmentService<H, K, C>
where
    H: HomomorphicScheme,
    K: KeyValueStore,
    C: BlobCodec,
{
    codec: TemplateCodec<H, C>,
    store: TemplateStore<K, C>,
    policy: MatchPolicy,
}

impl<H, K, C> EnrollmentService<H, K, C>
where
    H: HomomorphicScheme,
    K: KeyValueStore,
    K::Error: Into<StorageError>,
    C: BlobCodec,
{
    /// Create a new enrollment service.
    pub fn new(
        scheme: Arc<H>,
        store: Arc<K>,
        blob_codec: Arc<C>,
        bounds: NormalizationBounds,
        policy: MatchPolicy,
    ) -> Self {
        Self {
            codec: TemplateCodec::new(scheme, Arc::clone(&blob_codec), bounds),
            store: TemplateStore::new(store, blob_codec),
            policy,
        }
    }

    /// Normalize, encrypt and store a sample under `user_id`.
    ///
    /// Enrolling an existing id replaces its template.
    ///
    /// # Errors
    /// Returns `InvalidSample` for malformed input, otherwise crypto, codec
    /// or storage errors.
    pub fn enroll(
        &self,
        user_id: &UserId,
        raw_sample: &[f64],
        context: &CryptoContext,
    ) -> Result<(), PrintvaultError> {
        let normalized = self.codec.normalize(raw_sample)?;
        let template = self.codec.encode(&normalized, context)?;
        self.store.save(user_id, &template)?;

        tracing::info!("Enrolled template for user {user_id}");
        Ok(())
    }

    /// Compare a fresh sample against the template stored for `user_id`.
    ///
    /// # Errors
    /// Corrupt blobs, decryption failures and length mismatches are returned
    /// as errors; they never count as a denial.
    pub fn verify(
        &self,
        user_id: &UserId,
        raw_sample: &[f64],
        context: &CryptoContext,
    ) -> Result<VerifyOutcome, PrintvaultError> {
        let Some(stored_template) = self.store.load(user_id)? else {
            return Ok(VerifyOutcome::UnknownUser);
        };
        self.verify_against(user_id, &stored_template, raw_sample, context)
    }

    /// Like [`Self::verify`], but takes the sample as unparsed text.
    ///
    /// An unknown `user_id` yields `UnknownUser` before the text is parsed.
    ///
    /// # Errors
    /// Returns `InvalidSample` if an enrolled user's sample does not parse,
    /// otherwise the errors of [`Self::verify`].
    pub fn verify_input(
        &self,
        user_id: &UserId,
        raw_input: &str,
        context: &CryptoContext,
    ) -> Result<VerifyOutcome, PrintvaultError> {
        let Some(stored_template) = self.store.load(user_id)? else {
            return Ok(VerifyOutcome::UnknownUser);
        };
        let sample = BiometricSample::parse(raw_input)?;
        self.verify_against(user_id, &stored_template, sample.values(), context)
    }

    fn verify_against(
        &self,
        user_id: &UserId,
        stored_template: &EncryptedTemplate,
        raw_sample: &[f64],
        context: &CryptoContext,
    ) -> Result<VerifyOutcome, PrintvaultError> {
        let normalized = self.codec.normalize(raw_sample)?;
        let current_template = self.codec.encode(&normalized, context)?;

        let stored = self.codec.decode(stored_template, context)?;
        let current = self.codec.decode(&current_template, context)?;

        let score = self.policy.similarity(&stored, &current)?;
        let similarity = score.unwrap_or(0.0);
        let outcome = if self.policy.accepts(score) {
            VerifyOutcome::Approved { similarity }
        } else {
            VerifyOutcome::Denied { similarity }
        };

        tracing::info!(
            "Verification for user {user_id}: {} (similarity {similarity:.1}%)",
            if outcome.is_approved() { "approved" } else { "denied" }
        );
        Ok(outcome)
    }

    /// Whether a template is enrolled under `user_id`.
    ///
    /// # Errors
    /// Returns error if the storage read fails.
    pub fn is_enrolled(&self, user_id: &UserId) -> Result<bool, PrintvaultError> {
        self.store.contains(user_id)
    }

    /// All enrolled user ids.
    ///
    /// # Errors
    /// Returns error if the storage read fails.
    pub fn list_user_ids(&self) -> Result<Vec<String>, PrintvaultError> {
        self.store.list_user_ids()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::MockScheme;
    use crate::adapters::sqlite::SqliteStorage;
    use crate::adapters::zstd::ZstdCodec;
    use crate::domain::{CryptoError, MatchError, SampleError, SchemeParams};
    use crate::ports::KeyValueStore;

    const SAMPLE: [f64; 5] = [12.0, 34.0, 56.0, 78.0, 90.0];

    struct Fixture {
        backend: Arc<SqliteStorage>,
        service: EnrollmentService<MockScheme, SqliteStorage, ZstdCodec>,
        context: CryptoContext,
    }

    fn fixture() -> Fixture {
        let backend = Arc::new(SqliteStorage::in_memory().expect("Should create db"));
        let service = EnrollmentService::new(
            Arc::new(MockScheme),
            Arc::clone(&backend),
            Arc::new(ZstdCodec::new()),
            NormalizationBounds::default(),
            MatchPolicy::default(),
        );
        let context = MockScheme.generate_context(&SchemeParams::default()).unwrap();
        Fixture {
            backend,
            service,
            context,
        }
    }

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    #[test]
    fn test_enroll_then_verify_same_sample_approves() {
        let f = fixture();
        f.service.enroll(&user("alice"), &SAMPLE, &f.context).unwrap();

        let outcome = f.service.verify(&user("alice"), &SAMPLE, &f.context).unwrap();
        assert_eq!(outcome, VerifyOutcome::Approved { similarity: 100.0 });
    }

    #[test]
    fn test_verify_unknown_user() {
        let f = fixture();
        let outcome = f.service.verify(&user("ghost"), &SAMPLE, &f.context).unwrap();
        assert_eq!(outcome, VerifyOutcome::UnknownUser);
        assert_eq!(outcome.similarity(), None);
        assert!(!f.service.is_enrolled(&user("ghost")).unwrap());
    }

    #[test]
    fn test_one_component_off_by_six_hundredths_denies() {
        let f = fixture();
        f.service.enroll(&user("alice"), &SAMPLE, &f.context).unwrap();

        // 6 units on a 0..100 scale is 0.06 after normalization.
        let mut candidate = SAMPLE;
        candidate[2] += 6.0;
        let outcome = f.service.verify(&user("alice"), &candidate, &f.context).unwrap();
        assert_eq!(outcome, VerifyOutcome::Denied { similarity: 80.0 });
    }

    #[test]
    fn test_one_component_off_by_four_hundredths_approves() {
        let f = fixture();
        f.service.enroll(&user("alice"), &SAMPLE, &f.context).unwrap();

        let mut candidate = SAMPLE;
        candidate[2] += 4.0;
        let outcome = f.service.verify(&user("alice"), &candidate, &f.context).unwrap();
        assert!(outcome.is_approved());
    }

    #[test]
    fn test_re_enrollment_is_idempotent() {
        let f = fixture();
        let mut candidate = SAMPLE;
        candidate[0] += 3.0;

        f.service.enroll(&user("alice"), &SAMPLE, &f.context).unwrap();
        let once = f.service.verify(&user("alice"), &candidate, &f.context).unwrap();

        f.service.enroll(&user("alice"), &SAMPLE, &f.context).unwrap();
        let twice = f.service.verify(&user("alice"), &candidate, &f.context).unwrap();

        assert_eq!(once, twice);
        assert_eq!(f.service.list_user_ids().unwrap(), vec!["alice".to_string()]);
    }

    #[test]
    fn test_re_enrollment_replaces_template() {
        let f = fixture();
        let other = [90.0, 78.0, 56.0, 34.0, 12.0];

        f.service.enroll(&user("alice"), &SAMPLE, &f.context).unwrap();
        f.service.enroll(&user("alice"), &other, &f.context).unwrap();

        assert!(f.service.verify(&user("alice"), &other, &f.context).unwrap().is_approved());
        assert!(!f.service.verify(&user("alice"), &SAMPLE, &f.context).unwrap().is_approved());
    }

    #[test]
    fn test_invalid_sample_is_rejected() {
        let f = fixture();
        assert!(matches!(
            f.service.enroll(&user("alice"), &SAMPLE[..4], &f.context),
            Err(PrintvaultError::InvalidSample(SampleError::WrongDimension { .. }))
        ));
        assert!(f.service.list_user_ids().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_user_wins_over_invalid_sample() {
        let f = fixture();
        let outcome = f.service.verify(&user("ghost"), &[1.0], &f.context).unwrap();
        assert_eq!(outcome, VerifyOutcome::UnknownUser);
    }

    #[test]
    fn test_verify_input_checks_enrollment_before_parsing() {
        let f = fixture();
        let outcome = f
            .service
            .verify_input(&user("ghost"), "not a sample", &f.context)
            .unwrap();
        assert_eq!(outcome, VerifyOutcome::UnknownUser);
    }

    #[test]
    fn test_verify_input_parses_for_enrolled_user() {
        let f = fixture();
        f.service.enroll(&user("alice"), &SAMPLE, &f.context).unwrap();

        let outcome = f
            .service
            .verify_input(&user("alice"), "12, 34, 56, 78, 90", &f.context)
            .unwrap();
        assert_eq!(outcome, VerifyOutcome::Approved { similarity: 100.0 });

        assert!(matches!(
            f.service.verify_input(&user("alice"), "12 34 x", &f.context),
            Err(PrintvaultError::InvalidSample(_))
        ));
    }

    #[test]
    fn test_outcome_follows_policy_threshold() {
        let backend = Arc::new(SqliteStorage::in_memory().expect("Should create db"));
        let service = EnrollmentService::new(
            Arc::new(MockScheme),
            backend,
            Arc::new(ZstdCodec::new()),
            NormalizationBounds::default(),
            MatchPolicy::new(80.0, crate::domain::DEFAULT_TOLERANCE).unwrap(),
        );
        let context = MockScheme.generate_context(&SchemeParams::default()).unwrap();
        service.enroll(&user("alice"), &SAMPLE, &context).unwrap();

        let mut candidate = SAMPLE;
        candidate[2] += 6.0;
        let outcome = service.verify(&user("alice"), &candidate, &context).unwrap();
        assert_eq!(outcome, VerifyOutcome::Approved { similarity: 80.0 });
    }

    #[test]
    fn test_corrupt_blob_is_an_error_not_a_denial() {
        let f = fixture();
        f.backend.put("alice", b"definitely not zstd").unwrap();

        assert!(matches!(
            f.service.verify(&user("alice"), &SAMPLE, &f.context),
            Err(PrintvaultError::CorruptBlob(_))
        ));
    }

    #[test]
    fn test_foreign_template_is_a_decryption_error() {
        let f = fixture();
        let other = MockScheme.generate_context(&SchemeParams::default()).unwrap();
        f.service.enroll(&user("alice"), &SAMPLE, &other).unwrap();

        assert!(matches!(
            f.service.verify(&user("alice"), &SAMPLE, &f.context),
            Err(PrintvaultError::Crypto(CryptoError::Decryption(_)))
        ));
    }

    #[test]
    fn test_length_mismatch_is_an_error() {
        let f = fixture();
        let short = MockScheme.encrypt(&[0.1, 0.2, 0.3], &f.context).unwrap();
        let blob = crate::application::codec::pack(&ZstdCodec::new(), &short).unwrap();
        f.backend.put("alice", &blob).unwrap();

        assert!(matches!(
            f.service.verify(&user("alice"), &SAMPLE, &f.context),
            Err(PrintvaultError::Match(MatchError::LengthMismatch { stored: 3, current: 5 }))
        ));
    }

    #[test]
    fn test_verify_requires_secret_key() {
        let f = fixture();
        let public = f.context.to_public();
        f.service.enroll(&user("alice"), &SAMPLE, &public).unwrap();

        assert!(matches!(
            f.service.verify(&user("alice"), &SAMPLE, &public),
            Err(PrintvaultError::Crypto(CryptoError::MissingSecretKey))
        ));
        assert!(f.service.verify(&user("alice"), &SAMPLE, &f.context).unwrap().is_approved());
    }

    #[test]
    fn test_tfhe_enrollment_survives_reload() {
        use crate::adapters::keyfile::KeyFile;
        use crate::adapters::tfhe::TfheScheme;
        use crate::application::ContextManager;

        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("templates.db");
        let key_path = dir.path().join("ctx.key");
        let params = SchemeParams {
            evaluation_keys: false,
            ..SchemeParams::default()
        };
        let open = |scheme: &Arc<TfheScheme>| {
            EnrollmentService::new(
                Arc::clone(scheme),
                Arc::new(SqliteStorage::new(&db_path).expect("Should open db")),
                Arc::new(ZstdCodec::new()),
                NormalizationBounds::default(),
                MatchPolicy::default(),
            )
        };

        let scheme = Arc::new(TfheScheme::new());
        let manager =
            ContextManager::new(Arc::clone(&scheme), KeyFile::new(&key_path), params.clone());
        let context = manager
            .ensure_context()
            .expect("Should generate context");
        let service = open(&scheme);
        service.enroll(&user("alice"), &SAMPLE, &context).unwrap();
        assert!(service.verify(&user("alice"), &SAMPLE, &context).unwrap().is_approved());
        drop(service);

        let scheme = Arc::new(TfheScheme::new());
        let reloaded = ContextManager::new(Arc::clone(&scheme), KeyFile::new(&key_path), params)
            .ensure_context()
            .expect("Should load context");
        assert_eq!(reloaded.fingerprint(), context.fingerprint());

        let service = open(&scheme);
        let mut candidate = SAMPLE;
        candidate[1] += 6.0;
        assert_eq!(
            service.verify(&user("alice"), &SAMPLE, &reloaded).unwrap(),
            VerifyOutcome::Approved { similarity: 100.0 }
        );
        assert_eq!(
            service.verify(&user("alice"), &candidate, &reloaded).unwrap(),
            VerifyOutcome::Denied { similarity: 80.0 }
        );
    }

    #[test]
    fn test_outcome_json_shape() {
        let json = serde_json::to_string(&VerifyOutcome::Denied { similarity: 80.0 }).unwrap();
        assert_eq!(json, r#"{"outcome":"denied","similarity":80.0}"#);
        let json = serde_json::to_string(&VerifyOutcome::UnknownUser).unwrap();
        assert_eq!(json, r#"{"outcome":"unknown_user"}"#);
    }
}
