use thiserror::Error;

use crate::bias::BiasError;
use crate::calls::CallError;
use crate::cutcounts::CountError;
use crate::dispersion::DispersionError;
use crate::genomics::{IntervalError, SequenceError, VariantError};
use crate::predict::PredictError;

/// Crate-level error covering every component.
#[derive(Debug, Error)]
pub enum FootprintError {
    /// Reading alignments failed.
    #[error(transparent)]
    Count(#[from] CountError),
    /// Fetching reference sequence failed.
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    /// Bias lookup failed.
    #[error(transparent)]
    Bias(#[from] BiasError),
    /// Fitting, loading or evaluating a dispersion model failed.
    #[error(transparent)]
    Dispersion(#[from] DispersionError),
    /// Calling footprints failed.
    #[error(transparent)]
    Call(#[from] CallError),
    /// An interval could not be built.
    #[error(transparent)]
    Interval(#[from] IntervalError),
    /// A variant site was malformed.
    #[error(transparent)]
    Variant(#[from] VariantError),
}

impl From<PredictError> for FootprintError {
    fn from(err: PredictError) -> Self {
        match err {
            PredictError::Count(err) => FootprintError::Count(err),
            PredictError::Sequence(err) => FootprintError::Sequence(err),
            PredictError::Bias(err) => FootprintError::Bias(err),
        }
    }
}

/// Result alias defaulting to [`FootprintError`].
pub type Result<T, E = FootprintError> = std::result::Result<T, E>;
