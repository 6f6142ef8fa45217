use std::fmt;

use serde::{Deserialize, Serialize};

/// Converts relative bias propensities into expected cleavage counts.
///
/// `observed` and `propensity` cover the same bases, including
/// [`padding`](Rescale::padding) bases of context on each side of the region
/// being scored; the result has the same length.
pub trait Rescale: Send + Sync + fmt::Debug {
    /// Context bases required on each side of a region.
    fn padding(&self) -> usize;

    /// Expected counts for every position.
    fn rescale(&self, observed: &[u32], propensity: &[f64]) -> Vec<f64>;
}

impl<T: Rescale + ?Sized> Rescale for &T {
    fn padding(&self) -> usize {
        (**self).padding()
    }

    fn rescale(&self, observed: &[u32], propensity: &[f64]) -> Vec<f64> {
        (**self).rescale(observed, propensity)
    }
}

impl<T: Rescale + ?Sized> Rescale for Box<T> {
    fn padding(&self) -> usize {
        (**self).padding()
    }

    fn rescale(&self, observed: &[u32], propensity: &[f64]) -> Vec<f64> {
        (**self).rescale(observed, propensity)
    }
}

/// Distribute the observed total of a sliding window over its positions in
/// proportion to their propensity: `E_i = Σ_w obs · p_i / Σ_w p`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalWindow {
    /// Bases on each side of the position.
    pub half_width: usize,
}

impl Default for LocalWindow {
    fn default() -> Self {
        Self { half_width: 5 }
    }
}

impl Rescale for LocalWindow {
    fn padding(&self) -> usize {
        self.half_width
    }

    fn rescale(&self, observed: &[u32], propensity: &[f64]) -> Vec<f64> {
        let observed: Vec<f64> = observed.iter().map(|&c| c as f64).collect();
        let observed_sums = window_sums(&observed, self.half_width);
        let propensity_sums = window_sums(propensity, self.half_width);
        propensity
            .iter()
            .zip(observed_sums.iter().zip(&propensity_sums))
            .map(|(&p, (&total, &mass))| if mass > 0.0 { total * p / mass } else { 0.0 })
            .collect()
    }
}

/// Scale propensities by the ratio of robust local levels: the trimmed mean
/// of observed counts over the trimmed mean of propensities in a wide window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimmedMean {
    /// Bases on each side of the position.
    pub half_width: usize,
    /// Fraction of values dropped from each end before averaging.
    pub clip: f64,
}

impl Default for TrimmedMean {
    fn default() -> Self {
        Self {
            half_width: 50,
            clip: 0.01,
        }
    }
}

impl Rescale for TrimmedMean {
    fn padding(&self) -> usize {
        self.half_width
    }

    fn rescale(&self, observed: &[u32], propensity: &[f64]) -> Vec<f64> {
        let observed: Vec<f64> = observed.iter().map(|&c| c as f64).collect();
        let n = propensity.len();
        let mut scratch = Vec::with_capacity(2 * self.half_width + 1);
        (0..n)
            .map(|i| {
                let lo = i.saturating_sub(self.half_width);
                let hi = (i + self.half_width + 1).min(n);
                let level = trimmed_mean(&observed[lo..hi], self.clip, &mut scratch);
                let mass = trimmed_mean(&propensity[lo..hi], self.clip, &mut scratch);
                if mass > 0.0 {
                    level * propensity[i] / mass
                } else {
                    0.0
                }
            })
            .collect()
    }
}

/// [`LocalWindow`] normalization followed by a level correction: each
/// expected count is scaled by the trimmed mean of observed counts over the
/// trimmed mean of expected counts in a wider smoothing window.
///
/// A `smooth_half_width` of zero disables the correction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Smoothed {
    /// Bases on each side of the position for the local normalization.
    pub half_width: usize,
    /// Bases on each side of the position for the level correction.
    pub smooth_half_width: usize,
    /// Fraction of values dropped from each end of the smoothing window.
    pub clip: f64,
}

impl Default for Smoothed {
    fn default() -> Self {
        Self {
            half_width: 5,
            smooth_half_width: 50,
            clip: 0.01,
        }
    }
}

impl Rescale for Smoothed {
    fn padding(&self) -> usize {
        // expected counts at the edge of a smoothing window need their own local window
        self.half_width + self.smooth_half_width
    }

    fn rescale(&self, observed: &[u32], propensity: &[f64]) -> Vec<f64> {
        let local = LocalWindow {
            half_width: self.half_width,
        }
        .rescale(observed, propensity);
        if self.smooth_half_width == 0 {
            return local;
        }

        let observed: Vec<f64> = observed.iter().map(|&c| c as f64).collect();
        let n = local.len();
        let mut scratch = Vec::with_capacity(2 * self.smooth_half_width + 1);
        (0..n)
            .map(|i| {
                let lo = i.saturating_sub(self.smooth_half_width);
                let hi = (i + self.smooth_half_width + 1).min(n);
                let level = trimmed_mean(&observed[lo..hi], self.clip, &mut scratch);
                let fitted = trimmed_mean(&local[lo..hi], self.clip, &mut scratch);
                if fitted > 0.0 {
                    local[i] * level / fitted
                } else {
                    0.0
                }
            })
            .collect()
    }
}

/// Distribute the observed total of the whole region by propensity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegionTotal;

impl Rescale for RegionTotal {
    fn padding(&self) -> usize {
        0
    }

    fn rescale(&self, observed: &[u32], propensity: &[f64]) -> Vec<f64> {
        let total: f64 = observed.iter().map(|&c| c as f64).sum();
        let mass: f64 = propensity.iter().sum();
        if mass <= 0.0 {
            return vec![0.0; propensity.len()];
        }
        propensity.iter().map(|&p| total * p / mass).collect()
    }
}

/// Propensities are already expected counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Absolute;

impl Rescale for Absolute {
    fn padding(&self) -> usize {
        0
    }

    fn rescale(&self, _observed: &[u32], propensity: &[f64]) -> Vec<f64> {
        propensity.to_vec()
    }
}

/// Serialisable choice among the built-in rescaling strategies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum RescaleMethod {
    /// See [`LocalWindow`].
    LocalWindow {
        /// Bases on each side of the position.
        half_width: usize,
    },
    /// See [`TrimmedMean`].
    TrimmedMean {
        /// Bases on each side of the position.
        half_width: usize,
        /// Fraction clipped from each end.
        clip: f64,
    },
    /// See [`Smoothed`].
    Smoothed {
        /// Bases on each side of the position for the local normalization.
        half_width: usize,
        /// Bases on each side of the position for the level correction; zero
        /// disables it.
        smooth_half_width: usize,
        /// Fraction clipped from each end of the smoothing window.
        clip: f64,
    },
    /// See [`RegionTotal`].
    RegionTotal,
    /// See [`Absolute`].
    Absolute,
}

impl Default for RescaleMethod {
    fn default() -> Self {
        RescaleMethod::LocalWindow {
            half_width: LocalWindow::default().half_width,
        }
    }
}

impl Rescale for RescaleMethod {
    fn padding(&self) -> usize {
        match *self {
            RescaleMethod::LocalWindow { half_width } => LocalWindow { half_width }.padding(),
            RescaleMethod::TrimmedMean { half_width, clip } => TrimmedMean { half_width, clip }.padding(),
            RescaleMethod::Smoothed {
                half_width,
                smooth_half_width,
                clip,
            } => Smoothed {
                half_width,
                smooth_half_width,
                clip,
            }
            .padding(),
            RescaleMethod::RegionTotal => RegionTotal.padding(),
            RescaleMethod::Absolute => Absolute.padding(),
        }
    }

    fn rescale(&self, observed: &[u32], propensity: &[f64]) -> Vec<f64> {
        match *self {
            RescaleMethod::LocalWindow { half_width } => LocalWindow { half_width }.rescale(observed, propensity),
            RescaleMethod::TrimmedMean { half_width, clip } => {
                TrimmedMean { half_width, clip }.rescale(observed, propensity)
            }
            RescaleMethod::Smoothed {
                half_width,
                smooth_half_width,
                clip,
            } => Smoothed {
                half_width,
                smooth_half_width,
                clip,
            }
            .rescale(observed, propensity),
            RescaleMethod::RegionTotal => RegionTotal.rescale(observed, propensity),
            RescaleMethod::Absolute => Absolute.rescale(observed, propensity),
        }
    }
}

/// Sum of `values[i - half_width ..= i + half_width]`, clipped at the ends.
fn window_sums(values: &[f64], half_width: usize) -> Vec<f64> {
    let mut prefix = Vec::with_capacity(values.len() + 1);
    prefix.push(0.0);
    let mut acc = 0.0;
    for &v in values {
        acc += v;
        prefix.push(acc);
    }
    (0..values.len())
        .map(|i| {
            let lo = i.saturating_sub(half_width);
            let hi = (i + half_width + 1).min(values.len());
            prefix[hi] - prefix[lo]
        })
        .collect()
}

fn trimmed_mean(values: &[f64], clip: f64, scratch: &mut Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    scratch.clear();
    scratch.extend_from_slice(values);
    scratch.sort_by(f64::total_cmp);
    let drop = ((clip.clamp(0.0, 0.5) * scratch.len() as f64).floor() as usize).min((scratch.len() - 1) / 2);
    let kept = &scratch[drop..scratch.len() - drop];
    kept.iter().sum::<f64>() / kept.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_window_preserves_window_totals_for_flat_bias() {
        let observed = [0, 0, 4, 0, 0, 0, 0];
        let expected = LocalWindow { half_width: 1 }.rescale(&observed, &[1.0; 7]);
        assert_eq!(expected.len(), 7);
        assert!((expected[1] - 4.0 / 3.0).abs() < 1e-12);
        assert!((expected[2] - 4.0 / 3.0).abs() < 1e-12);
        // edge window only has two positions
        assert_eq!(expected[0], 0.0);
        assert_eq!(expected[5], 0.0);
    }

    #[test]
    fn local_window_follows_propensity() {
        let expected = LocalWindow { half_width: 1 }.rescale(&[3, 3, 3], &[1.0, 2.0, 1.0]);
        assert!((expected[1] - 9.0 * 2.0 / 4.0).abs() < 1e-12);
        assert!(LocalWindow::default().rescale(&[1, 2], &[0.0, 0.0]).iter().all(|&e| e == 0.0));
    }

    #[test]
    fn trimmed_mean_ignores_single_spikes() {
        let mut observed = vec![2u32; 101];
        observed[50] = 1_000;
        let expected = TrimmedMean { half_width: 50, clip: 0.01 }.rescale(&observed, &vec![1.0; 101]);
        assert!((expected[50] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn smoothing_corrects_the_local_level() {
        // a dip in the bias leaves the local window short of cuts next to it
        let observed = vec![4u32; 41];
        let mut propensity = vec![1.0; 41];
        propensity[20] = 0.01;
        let local = LocalWindow { half_width: 2 }.rescale(&observed, &propensity);
        let smoothed = Smoothed {
            half_width: 2,
            smooth_half_width: 10,
            clip: 0.1,
        }
        .rescale(&observed, &propensity);

        assert!(local[19] > 4.5, "local {}", local[19]);
        assert!((smoothed[19] - 4.0).abs() < (local[19] - 4.0).abs());
        assert!(smoothed[20] < local[20]);
        assert!((smoothed[5] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn zero_smoothing_width_is_the_local_window() {
        let observed = [1, 5, 0, 2, 8, 3, 0, 0, 7];
        let propensity = [0.5, 1.0, 2.0, 1.0, 0.25, 1.0, 3.0, 1.0, 1.0];
        let plain = Smoothed {
            half_width: 3,
            smooth_half_width: 0,
            clip: 0.01,
        };
        assert_eq!(plain.padding(), 3);
        assert_eq!(
            plain.rescale(&observed, &propensity),
            LocalWindow { half_width: 3 }.rescale(&observed, &propensity)
        );
        assert_eq!(Smoothed::default().padding(), 55);
    }

    #[test]
    fn region_total_and_absolute() {
        let region = RegionTotal.rescale(&[1, 2, 3, 4], &[1.0, 1.0, 2.0, 0.0]);
        assert_eq!(region, vec![2.5, 2.5, 5.0, 0.0]);
        assert_eq!(Absolute.rescale(&[9, 9], &[0.5, 1.5]), vec![0.5, 1.5]);
        assert_eq!(RegionTotal.rescale(&[1], &[0.0]), vec![0.0]);
    }

    #[test]
    fn method_dispatch_matches_concrete_strategies() {
        let observed = [1, 5, 0, 2, 8, 3];
        let propensity = [0.5, 1.0, 2.0, 1.0, 0.25, 1.0];
        let method = RescaleMethod::LocalWindow { half_width: 2 };
        assert_eq!(method.padding(), 2);
        assert_eq!(
            method.rescale(&observed, &propensity),
            LocalWindow { half_width: 2 }.rescale(&observed, &propensity)
        );
        assert_eq!(RescaleMethod::default(), RescaleMethod::LocalWindow { half_width: 5 });
    }
}
