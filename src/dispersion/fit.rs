use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::model::{bucket_position, Bucket, BucketSource, EXPECTED_EPSILON, MIN_MEAN};
use super::DispersionError;
use crate::stats::digamma;

/// Smallest negative-binomial size the fit will report.
const MIN_SIZE: f64 = 1e-4;
/// Sizes beyond this are indistinguishable from Poisson.
const MAX_SIZE: f64 = 1e6;
const BISECTION_STEPS: usize = 64;

/// Bucket layout and smoothing parameters for [`DispersionModel::fit`].
///
/// [`DispersionModel::fit`]: super::DispersionModel::fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Lower bound of the second bucket; the first covers `[0, min_expected)`.
    pub min_expected: f64,
    /// Ratio between consecutive bucket bounds.
    pub growth: f64,
    /// Last bucket bound; the final bucket is open-ended.
    pub max_expected: f64,
    /// Buckets with fewer pairs borrow parameters from a neighbour.
    pub min_observations: usize,
    /// Drop pairs whose observed count lies above this per-bucket quantile.
    pub trim_quantile: Option<f64>,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            min_expected: 0.25,
            growth: 1.25,
            max_expected: 250.0,
            min_observations: 50,
            trim_quantile: None,
        }
    }
}

impl FitConfig {
    /// Set the first non-zero bucket bound.
    pub fn with_min_expected(mut self, value: f64) -> Self {
        self.min_expected = value;
        self
    }

    /// Set the bound growth factor.
    pub fn with_growth(mut self, value: f64) -> Self {
        self.growth = value;
        self
    }

    /// Set the last bucket bound.
    pub fn with_max_expected(mut self, value: f64) -> Self {
        self.max_expected = value;
        self
    }

    /// Set the per-bucket observation threshold.
    pub fn with_min_observations(mut self, value: usize) -> Self {
        self.min_observations = value;
        self
    }

    /// Enable outlier trimming at the given quantile of observed counts.
    pub fn with_trim_quantile(mut self, value: Option<f64>) -> Self {
        self.trim_quantile = value;
        self
    }

    /// Lower bounds of all buckets, starting at zero.
    pub fn bucket_bounds(&self) -> Result<Vec<f64>, DispersionError> {
        self.validate()?;
        let mut bounds = vec![0.0];
        let mut bound = self.min_expected;
        while bound <= self.max_expected * (1.0 + 1e-12) {
            bounds.push(bound);
            bound *= self.growth;
        }
        Ok(bounds)
    }

    fn validate(&self) -> Result<(), DispersionError> {
        if !(self.min_expected.is_finite() && self.min_expected > 0.0) {
            return Err(DispersionError::InvalidConfig(format!(
                "min_expected must be positive, got {}",
                self.min_expected
            )));
        }
        if !(self.growth.is_finite() && self.growth > 1.0) {
            return Err(DispersionError::InvalidConfig(format!(
                "growth must exceed 1, got {}",
                self.growth
            )));
        }
        if !(self.max_expected.is_finite() && self.max_expected >= self.min_expected) {
            return Err(DispersionError::InvalidConfig(format!(
                "max_expected must be at least min_expected, got {}",
                self.max_expected
            )));
        }
        if self.min_observations == 0 {
            return Err(DispersionError::InvalidConfig("min_observations must be positive".into()));
        }
        if let Some(q) = self.trim_quantile {
            if !(q > 0.0 && q <= 1.0) {
                return Err(DispersionError::InvalidConfig(format!(
                    "trim_quantile must lie in (0, 1], got {q}"
                )));
            }
        }
        Ok(())
    }
}

/// Parallel observed/expected pairs collected for fitting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSet {
    observed: Vec<u32>,
    expected: Vec<f64>,
}

impl TrainingSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy parallel arrays into a set.
    pub fn from_slices(observed: &[u32], expected: &[f64]) -> Result<Self, DispersionError> {
        if observed.len() != expected.len() {
            return Err(DispersionError::LengthMismatch {
                observed: observed.len(),
                expected: expected.len(),
            });
        }
        Ok(Self {
            observed: observed.to_vec(),
            expected: expected.to_vec(),
        })
    }

    /// Add one pair.
    pub fn push(&mut self, observed: u32, expected: f64) {
        self.observed.push(observed);
        self.expected.push(expected);
    }

    /// Move every pair of `other` into `self`.
    pub fn append(&mut self, mut other: TrainingSet) {
        self.observed.append(&mut other.observed);
        self.expected.append(&mut other.expected);
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.observed.len()
    }

    /// `true` when no pairs were added.
    pub fn is_empty(&self) -> bool {
        self.observed.is_empty()
    }

    /// Observed counts.
    pub fn observed(&self) -> &[u32] {
        &self.observed
    }

    /// Expected counts.
    pub fn expected(&self) -> &[f64] {
        &self.expected
    }

    /// Iterate over `(observed, expected)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.observed.iter().copied().zip(self.expected.iter().copied())
    }
}

impl FromIterator<(u32, f64)> for TrainingSet {
    fn from_iter<I: IntoIterator<Item = (u32, f64)>>(iter: I) -> Self {
        let mut set = TrainingSet::new();
        set.extend(iter);
        set
    }
}

impl Extend<(u32, f64)> for TrainingSet {
    fn extend<I: IntoIterator<Item = (u32, f64)>>(&mut self, iter: I) {
        for (observed, expected) in iter {
            self.push(observed, expected);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct BucketFit {
    mean_ratio: f64,
    dispersion: Option<f64>,
}

/// Fit every bucket, smoothing sparse ones from their neighbours.
pub(super) fn fit_buckets(set: &TrainingSet, config: &FitConfig) -> Result<Vec<Bucket>, DispersionError> {
    let bounds = config.bucket_bounds()?;

    // zero expectation carries no information about scale or spread
    let mut groups: Vec<Vec<(u32, f64)>> = vec![Vec::new(); bounds.len()];
    for (observed, expected) in set.iter() {
        if expected.is_finite() && expected > EXPECTED_EPSILON {
            groups[bucket_position(&bounds, expected)].push((observed, expected));
        }
    }
    let usable: usize = groups.iter().map(Vec::len).sum();
    if usable == 0 {
        return Err(DispersionError::InsufficientData);
    }

    let fits: Vec<Option<BucketFit>> = groups
        .par_iter()
        .map(|pairs| {
            if pairs.len() >= config.min_observations {
                Some(fit_pairs(pairs, config.trim_quantile))
            } else {
                None
            }
        })
        .collect();

    let fitted = fits.iter().filter(|fit| fit.is_some()).count();
    let buckets: Vec<Bucket> = if fitted == 0 {
        let pooled: Vec<(u32, f64)> = groups.iter().flatten().copied().collect();
        let fit = fit_pairs(&pooled, config.trim_quantile);
        warn!(
            usable,
            min_observations = config.min_observations,
            "no bucket reached the observation threshold, sharing one pooled fit"
        );
        bounds
            .iter()
            .zip(&groups)
            .map(|(&lower, pairs)| Bucket {
                lower,
                observations: pairs.len() as u64,
                mean_ratio: fit.mean_ratio,
                dispersion: fit.dispersion,
                source: BucketSource::Pooled,
            })
            .collect()
    } else {
        (0..bounds.len())
            .map(|index| {
                let (fit, source) = match fits[index] {
                    Some(fit) => (fit, BucketSource::Fitted),
                    None => {
                        let from = nearest_fitted(&fits, index);
                        let fit = fits[from].unwrap_or(BucketFit {
                            mean_ratio: 1.0,
                            dispersion: None,
                        });
                        (fit, BucketSource::Borrowed { from })
                    }
                };
                Bucket {
                    lower: bounds[index],
                    observations: groups[index].len() as u64,
                    mean_ratio: fit.mean_ratio,
                    dispersion: fit.dispersion,
                    source,
                }
            })
            .collect()
    };

    for (index, bucket) in buckets.iter().enumerate() {
        debug!(
            index,
            lower = bucket.lower,
            observations = bucket.observations,
            mean_ratio = bucket.mean_ratio,
            dispersion = ?bucket.dispersion,
            source = ?bucket.source,
            "dispersion bucket"
        );
    }
    info!(pairs = set.len(), usable, buckets = buckets.len(), fitted, "fitted dispersion model");
    Ok(buckets)
}

/// Index of the closest fitted bucket; ties go to the lower bucket.
fn nearest_fitted(fits: &[Option<BucketFit>], index: usize) -> usize {
    for distance in 1..fits.len() {
        if index >= distance && fits[index - distance].is_some() {
            return index - distance;
        }
        if index + distance < fits.len() && fits[index + distance].is_some() {
            return index + distance;
        }
    }
    index
}

fn fit_pairs(pairs: &[(u32, f64)], trim_quantile: Option<f64>) -> BucketFit {
    let mut pairs = pairs.to_vec();
    if let Some(q) = trim_quantile {
        pairs.sort_unstable_by_key(|&(observed, _)| observed);
        let keep = ((q * pairs.len() as f64).ceil() as usize).clamp(1, pairs.len());
        pairs.truncate(keep);
    }

    let observed_total: f64 = pairs.iter().map(|&(y, _)| y as f64).sum();
    let expected_total: f64 = pairs.iter().map(|&(_, e)| e).sum();
    let mean_ratio = if expected_total > 0.0 {
        observed_total / expected_total
    } else {
        1.0
    };
    let dispersion = estimate_size(&pairs, mean_ratio);
    BucketFit { mean_ratio, dispersion }
}

/// Negative-binomial size by moments, refined by maximum likelihood.
/// `None` when the data show no overdispersion.
fn estimate_size(pairs: &[(u32, f64)], mean_ratio: f64) -> Option<f64> {
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for &(y, e) in pairs {
        let mu = (mean_ratio * e).max(MIN_MEAN);
        let resid = y as f64 - mu;
        numerator += mu * mu;
        denominator += resid * resid - mu;
    }
    if !(denominator > 0.0 && numerator > 0.0) {
        return None;
    }
    let moments = (numerator / denominator).clamp(MIN_SIZE, MAX_SIZE);

    let score = SizeScore::new(pairs, mean_ratio);
    if score.at(MAX_SIZE) >= 0.0 {
        return None;
    }
    if score.at(MIN_SIZE) <= 0.0 {
        return Some(MIN_SIZE);
    }

    let mut lo = (moments / 64.0).max(MIN_SIZE);
    if score.at(lo) <= 0.0 {
        lo = MIN_SIZE;
    }
    let mut hi = (moments * 64.0).min(MAX_SIZE);
    if score.at(hi) >= 0.0 {
        hi = MAX_SIZE;
    }
    let (mut log_lo, mut log_hi) = (lo.ln(), hi.ln());
    for _ in 0..BISECTION_STEPS {
        let mid = 0.5 * (log_lo + log_hi);
        if score.at(mid.exp()) > 0.0 {
            log_lo = mid;
        } else {
            log_hi = mid;
        }
    }
    let size = (0.5 * (log_lo + log_hi)).exp();
    (size < MAX_SIZE * 0.999).then_some(size)
}

/// Observed counts up to this value expand `ψ(y + r) − ψ(r)` as a finite sum.
const DIRECT_SUM_LIMIT: u32 = 64;

/// Derivative of the negative-binomial log-likelihood in the size `r`.
struct SizeScore {
    /// Distinct observed counts with their multiplicities.
    distinct: Vec<(u32, u64)>,
    /// `(observed, mean)` per pair.
    terms: Vec<(f64, f64)>,
}

impl SizeScore {
    fn new(pairs: &[(u32, f64)], mean_ratio: f64) -> Self {
        let mut observed: Vec<u32> = pairs.iter().map(|&(y, _)| y).collect();
        observed.sort_unstable();
        let mut distinct: Vec<(u32, u64)> = Vec::new();
        for y in observed {
            if let Some((last, count)) = distinct.last_mut() {
                if *last == y {
                    *count += 1;
                    continue;
                }
            }
            distinct.push((y, 1));
        }
        let terms = pairs
            .iter()
            .map(|&(y, e)| (y as f64, (mean_ratio * e).max(MIN_MEAN)))
            .collect();
        Self { distinct, terms }
    }

    fn at(&self, r: f64) -> f64 {
        let digamma_part: f64 = self
            .distinct
            .iter()
            .map(|&(y, count)| count as f64 * digamma_difference(y, r))
            .sum();
        let rest: f64 = self
            .terms
            .iter()
            .map(|&(y, mu)| -(mu / r).ln_1p() + (mu - y) / (r + mu))
            .sum();
        digamma_part + rest
    }
}

/// `ψ(y + r) − ψ(r)`.
fn digamma_difference(y: u32, r: f64) -> f64 {
    if y <= DIRECT_SUM_LIMIT {
        (0..y).map(|j| 1.0 / (r + j as f64)).sum()
    } else {
        digamma(y as f64 + r) - digamma(r)
    }
}
