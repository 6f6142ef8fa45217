use rand::Rng;
use serde::{Deserialize, Serialize};

use super::fit::{fit_buckets, FitConfig, TrainingSet};
use super::{CountDistribution, DispersionError};

/// Expected counts at or below this are treated as zero.
pub const EXPECTED_EPSILON: f64 = 1e-9;
/// Floor applied to every distribution mean.
pub const MIN_MEAN: f64 = 1e-6;

/// Where a bucket's parameters came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BucketSource {
    /// Fitted from the bucket's own observations.
    Fitted,
    /// Copied from the nearest fitted bucket.
    Borrowed {
        /// Index of the bucket the parameters were taken from.
        from: usize,
    },
    /// Shared fit over all observations (no bucket had enough data).
    Pooled,
}

/// One expected-count bucket and its fitted parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    /// Inclusive lower bound on the expected count.
    pub lower: f64,
    /// Training pairs that fell in the bucket.
    pub observations: u64,
    /// Ratio of observed to expected totals; the distribution mean is
    /// `mean_ratio * expected`.
    pub mean_ratio: f64,
    /// Negative-binomial size, or `None` for a Poisson bucket.
    pub dispersion: Option<f64>,
    /// Provenance of the parameters.
    pub source: BucketSource,
}

/// Fitted mapping from expected count to a distribution over observed counts.
#[derive(Debug, Clone, PartialEq)]
pub struct DispersionModel {
    buckets: Vec<Bucket>,
}

impl DispersionModel {
    /// Fit a model with the default bucket layout from parallel arrays.
    pub fn learn(observed: &[u32], expected: &[f64]) -> Result<Self, DispersionError> {
        let set = TrainingSet::from_slices(observed, expected)?;
        Self::fit(&set, &FitConfig::default())
    }

    /// Fit a model from a training set.
    ///
    /// Fails with [`DispersionError::InsufficientData`] when no pair has a
    /// positive, finite expectation. Sparse buckets are smoothed, never fatal.
    pub fn fit(set: &TrainingSet, config: &FitConfig) -> Result<Self, DispersionError> {
        Ok(Self {
            buckets: fit_buckets(set, config)?,
        })
    }

    /// Build a model from explicit buckets, validating their structure.
    pub fn from_buckets(buckets: Vec<Bucket>) -> Result<Self, DispersionError> {
        validate(&buckets)?;
        Ok(Self { buckets })
    }

    /// Buckets in increasing order of lower bound.
    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    /// Index of the bucket responsible for `expected`.
    ///
    /// Zero, negative, tiny and NaN expectations map to the first bucket.
    pub fn bucket_index(&self, expected: f64) -> usize {
        if !is_positive(expected) {
            return 0;
        }
        let upper = self.buckets.partition_point(|b| b.lower <= expected);
        upper.saturating_sub(1)
    }

    /// Distribution of observed counts at `expected`.
    pub fn distribution(&self, expected: f64) -> CountDistribution {
        let bucket = &self.buckets[self.bucket_index(expected)];
        let expected = if expected.is_finite() { expected.max(0.0) } else { 0.0 };
        let mean = (bucket.mean_ratio * expected).max(MIN_MEAN);
        CountDistribution::new(mean, bucket.dispersion)
    }

    /// Upper-tail p-value `P(X ≥ observed)`: small when the position is
    /// cleaved more often than expected. Non-increasing in `observed`.
    pub fn evaluate(&self, observed: u32, expected: f64) -> f64 {
        if observed == 0 {
            return 1.0;
        }
        self.distribution(expected).sf(observed as u64)
    }

    /// Lower-tail p-value `P(X ≤ observed)`: small when the position is
    /// protected from cleavage, the footprint signal.
    pub fn depletion(&self, observed: u32, expected: f64) -> f64 {
        if observed == 0 && !is_positive(expected) {
            return 1.0;
        }
        self.distribution(expected).cdf(observed as u64)
    }

    /// Draw an observed count for `expected` from the fitted distribution.
    pub fn sample<R: Rng + ?Sized>(&self, expected: f64, rng: &mut R) -> u32 {
        let draw = self.distribution(expected).sample(rng);
        u32::try_from(draw).unwrap_or(u32::MAX)
    }
}

/// `true` for expectations large enough to carry signal.
pub(crate) fn is_positive(expected: f64) -> bool {
    expected > EXPECTED_EPSILON
}

pub(super) fn bucket_position(bounds: &[f64], expected: f64) -> usize {
    if !is_positive(expected) {
        return 0;
    }
    bounds.partition_point(|&lower| lower <= expected).saturating_sub(1)
}

fn validate(buckets: &[Bucket]) -> Result<(), DispersionError> {
    let first = buckets
        .first()
        .ok_or_else(|| DispersionError::corrupt("model has no buckets"))?;
    if first.lower != 0.0 {
        return Err(DispersionError::corrupt(format!(
            "first bucket must start at 0, found {}",
            first.lower
        )));
    }

    for (index, bucket) in buckets.iter().enumerate() {
        if !bucket.lower.is_finite() {
            return Err(DispersionError::corrupt(format!("bucket {index} has a non-finite bound")));
        }
        if index > 0 && bucket.lower <= buckets[index - 1].lower {
            return Err(DispersionError::corrupt(format!(
                "bucket bounds not increasing at bucket {index} ({} after {})",
                bucket.lower,
                buckets[index - 1].lower
            )));
        }
        if !(bucket.mean_ratio.is_finite() && bucket.mean_ratio >= 0.0) {
            return Err(DispersionError::corrupt(format!(
                "bucket {index} has invalid mean ratio {}",
                bucket.mean_ratio
            )));
        }
        if let Some(size) = bucket.dispersion {
            if !(size.is_finite() && size > 0.0) {
                return Err(DispersionError::corrupt(format!(
                    "bucket {index} has invalid dispersion {size}"
                )));
            }
        }
        if let BucketSource::Borrowed { from } = bucket.source {
            match buckets.get(from) {
                Some(donor) if from != index && donor.source == BucketSource::Fitted => {}
                _ => {
                    return Err(DispersionError::corrupt(format!(
                        "bucket {index} borrows from {from}, which is not a fitted bucket"
                    )))
                }
            }
        }
    }
    Ok(())
}
