//! Statistical model of observed cleavage counts given their expectation.
//!
//! Expected counts are partitioned into log-spaced buckets; each bucket holds
//! a fitted Poisson or negative-binomial distribution whose mean scales with
//! the expectation. The model is immutable once fitted or loaded and can be
//! shared freely between threads.

mod distribution;
mod fit;
mod model;
mod persist;

use thiserror::Error;

pub use distribution::CountDistribution;
pub use fit::{FitConfig, TrainingSet};
pub use model::{Bucket, BucketSource, DispersionModel, EXPECTED_EPSILON, MIN_MEAN};
pub use persist::FORMAT_VERSION;

/// Errors raised while fitting, persisting or loading a dispersion model.
#[derive(Debug, Error)]
pub enum DispersionError {
    /// No usable `(observed, expected)` pair was supplied.
    #[error("no usable observations to fit a dispersion model")]
    InsufficientData,
    /// Observed and expected arrays differ in length.
    #[error("observed has {observed} values but expected has {expected}")]
    LengthMismatch {
        /// Length of the observed array.
        observed: usize,
        /// Length of the expected array.
        expected: usize,
    },
    /// Fitting parameters are unusable.
    #[error("invalid fit configuration: {0}")]
    InvalidConfig(String),
    /// A persisted model failed structural validation.
    #[error("corrupt dispersion model: {reason}")]
    CorruptModel {
        /// What was inconsistent.
        reason: String,
    },
    /// The persisted model is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// I/O failure reading or writing a model.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispersionError {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        DispersionError::CorruptModel { reason: reason.into() }
    }
}
