//! Per-position footprint statistics.
//!
//! [`FootprintPredictor`] combines cleavage counts, a [`BiasModel`] and a
//! [`Rescale`] strategy into observed/expected signals, and scores them
//! against a [`DispersionModel`].
//!
//! [`BiasModel`]: crate::bias::BiasModel
//! [`DispersionModel`]: crate::dispersion::DispersionModel

mod predictor;
mod rescale;
mod track;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bias::BiasError;
use crate::cutcounts::CountError;
use crate::genomics::SequenceError;

pub use predictor::FootprintPredictor;
pub use rescale::{Absolute, LocalWindow, RegionTotal, Rescale, RescaleMethod, Smoothed, TrimmedMean};
pub use track::{FootprintScore, FootprintTrack, RegionSignal, Scores, StrandSignal};

/// Errors raised while computing a region's signal.
#[derive(Debug, Error)]
pub enum PredictError {
    /// Counting cleavages failed.
    #[error(transparent)]
    Count(#[from] CountError),
    /// Fetching reference sequence failed.
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    /// Bias lookup failed.
    #[error(transparent)]
    Bias(#[from] BiasError),
}

/// What to do when a bias k-mer contains an ambiguous base.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    /// Substitute the model's neutral score.
    #[default]
    NeutralWeight,
    /// Treat the position as uncleavable.
    ZeroWeight,
    /// Abort the region with [`BiasError::InvalidSequence`].
    Fail,
}

/// Prediction settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Handling of ambiguous bases in bias k-mers.
    pub ambiguity: AmbiguityPolicy,
    /// Conversion of propensities into expected counts.
    pub rescale: RescaleMethod,
}

impl PredictorConfig {
    /// Set the ambiguity policy.
    pub fn with_ambiguity(mut self, ambiguity: AmbiguityPolicy) -> Self {
        self.ambiguity = ambiguity;
        self
    }

    /// Set the rescaling strategy.
    pub fn with_rescale(mut self, rescale: RescaleMethod) -> Self {
        self.rescale = rescale;
        self
    }
}
