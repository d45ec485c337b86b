//! Domain layer: Core types and pure logic.
//!
//! This module contains the biometric sample model, the cryptographic
//! context and template types, and the matching policy. Nothing here
//! performs IO or depends on a concrete FHE library.

mod crypto;
pub mod kdf;
mod matching;
mod sample;
mod user;

pub use crypto::{
    CryptoContext, CryptoError, EncryptedTemplate, EvaluationKey, PublicKey, SchemeParams,
    SecretKey,
};
pub use matching::{MatchError, MatchPolicy, DEFAULT_THRESHOLD, DEFAULT_TOLERANCE};
pub use sample::{
    BiometricSample, NormalizationBounds, NormalizedVector, SampleError, SAMPLE_DIMENSION,
};
pub use user::{UserId, UserIdError, MAX_USER_ID_BYTES};
