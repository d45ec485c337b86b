//! Biometric sample types and min-max normalization.
//!
//! A sample is a fixed-length vector of sensor measurements. It is transient:
//! it exists only while being entered and encoded, and is never persisted.

use serde::{Deserialize, Serialize};

/// Number of measurements in every biometric sample.
pub const SAMPLE_DIMENSION: usize = 5;

/// Errors raised while validating biometric input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SampleError {
    #[error("Expected exactly {expected} measurements, got {actual}")]
    WrongDimension { expected: usize, actual: usize },

    #[error("Measurement {index} is not a finite number")]
    NonFinite { index: usize },

    #[error("Could not parse measurement {token:?} as a number")]
    Parse { token: String },

    #[error("Invalid normalization bounds: min {min}, max {max}")]
    InvalidBounds { min: f64, max: f64 },
}

/// Raw biometric measurements as captured from the sensor.
#[derive(Clone, PartialEq)]
pub struct BiometricSample {
    values: Vec<f64>,
}

impl BiometricSample {
    /// Validate raw measurements.
    ///
    /// # Errors
    /// Returns `SampleError` when the length is not [`SAMPLE_DIMENSION`] or a
    /// value is NaN or infinite.
    pub fn new(values: Vec<f64>) -> Result<Self, SampleError> {
        if values.len() != SAMPLE_DIMENSION {
            return Err(SampleError::WrongDimension {
                expected: SAMPLE_DIMENSION,
                actual: values.len(),
            });
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(SampleError::NonFinite { index });
        }
        Ok(Self { values })
    }

    /// Parse whitespace- or comma-separated measurements.
    ///
    /// # Errors
    /// Returns `SampleError::Parse` for non-numeric tokens, otherwise the
    /// same errors as [`BiometricSample::new`].
    pub fn parse(input: &str) -> Result<Self, SampleError> {
        let values = input
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .map(|token| {
                token.parse::<f64>().map_err(|_| SampleError::Parse {
                    token: token.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(values)
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

// Raw measurements are biometric data; keep them out of logs.
impl std::fmt::Debug for BiometricSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BiometricSample")
            .field("len", &self.values.len())
            .finish()
    }
}

/// Fixed bounds used for min-max scaling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationBounds {
    pub min: f64,
    pub max: f64,
}

impl Default for NormalizationBounds {
    fn default() -> Self {
        Self { min: 0.0, max: 100.0 }
    }
}

impl NormalizationBounds {
    /// Create bounds, checking `max > min` and finiteness.
    ///
    /// # Errors
    /// Returns `SampleError::InvalidBounds` otherwise.
    pub fn new(min: f64, max: f64) -> Result<Self, SampleError> {
        let bounds = Self { min, max };
        bounds.validate()?;
        Ok(bounds)
    }

    /// # Errors
    /// Returns `SampleError::InvalidBounds` if the range is empty or not finite.
    pub fn validate(&self) -> Result<(), SampleError> {
        if !self.min.is_finite() || !self.max.is_finite() || self.max <= self.min {
            return Err(SampleError::InvalidBounds {
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }

    /// Scale a sample into the unit range: `(x - min) / (max - min)`.
    #[must_use]
    pub fn normalize(&self, sample: &BiometricSample) -> NormalizedVector {
        let span = self.max - self.min;
        NormalizedVector {
            values: sample.values().iter().map(|x| (x - self.min) / span).collect(),
        }
    }
}

/// Sample after min-max scaling, ready for encryption.
#[derive(Clone, PartialEq)]
pub struct NormalizedVector {
    values: Vec<f64>,
}

impl NormalizedVector {
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::fmt::Debug for NormalizedVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NormalizedVector")
            .field("len", &self.values.len())
            .finish()
    }
}
