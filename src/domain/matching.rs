//! Tolerance-based matching of decrypted biometric vectors.
//!
//! The matcher never sees ciphertext. It receives two vectors that were
//! already decrypted and rounded by the template codec.

use serde::{Deserialize, Serialize};

/// Default minimum similarity (percent) for acceptance.
pub const DEFAULT_THRESHOLD: f64 = 95.0;

/// Default absolute per-component tolerance (sensor noise after rounding).
pub const DEFAULT_TOLERANCE: f64 = 0.05;

/// Absorbs binary representation error on values rounded to 2 decimals.
const FLOAT_SLACK: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MatchError {
    #[error("Vector length mismatch: stored {stored}, current {current}")]
    LengthMismatch { stored: usize, current: usize },

    #[error("Invalid threshold {0}: must be within 0..=100")]
    InvalidThreshold(f64),

    #[error("Invalid tolerance {0}: must be finite and non-negative")]
    InvalidTolerance(f64),
}

/// Similarity policy: tolerance per component and acceptance threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchPolicy {
    pub threshold: f64,
    pub tolerance: f64,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl MatchPolicy {
    /// # Errors
    /// Returns `MatchError` if threshold or tolerance are out of range.
    pub fn new(threshold: f64, tolerance: f64) -> Result<Self, MatchError> {
        let policy = Self {
            threshold,
            tolerance,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// # Errors
    /// Returns `MatchError` if threshold or tolerance are out of range.
    pub fn validate(&self) -> Result<(), MatchError> {
        if !(0.0..=100.0).contains(&self.threshold) {
            return Err(MatchError::InvalidThreshold(self.threshold));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(MatchError::InvalidTolerance(self.tolerance));
        }
        Ok(())
    }

    /// Percentage of components within tolerance.
    ///
    /// Returns `None` when either vector is empty.
    ///
    /// # Errors
    /// Returns `MatchError::LengthMismatch` when the lengths differ.
    pub fn similarity(&self, stored: &[f64], current: &[f64]) -> Result<Option<f64>, MatchError> {
        if stored.is_empty() || current.is_empty() {
            return Ok(None);
        }
        if stored.len() != current.len() {
            return Err(MatchError::LengthMismatch {
                stored: stored.len(),
                current: current.len(),
            });
        }

        let matched = stored
            .iter()
            .zip(current)
            .filter(|(s, c)| (*s - *c).abs() <= self.tolerance + FLOAT_SLACK)
            .count();

        Ok(Some(matched as f64 / stored.len() as f64 * 100.0))
    }

    /// Accept when similarity reaches the threshold. Empty input fails closed.
    ///
    /// # Errors
    /// Returns `MatchError::LengthMismatch` when the lengths differ.
    pub fn compare(&self, stored: &[f64], current: &[f64]) -> Result<bool, MatchError> {
        Ok(self.accepts(self.similarity(stored, current)?))
    }

    /// Decision for an already computed similarity.
    #[must_use]
    pub fn accepts(&self, similarity: Option<f64>) -> bool {
        similarity.is_some_and(|similarity| similarity >= self.threshold)
    }
}
