//! Footprint calls from scored tracks.
//!
//! Per-bond depletion p-values are combined over a small window, compared to
//! null tracks simulated from the dispersion model to estimate an empirical
//! FDR, and thresholded into footprint intervals.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::genomics::GenomicInterval;
use crate::predict::FootprintTrack;
use crate::stats::{empirical_fdr, segment, stouffers_z};

/// Invalid caller settings.
#[derive(Debug, Error, PartialEq)]
pub enum CallError {
    /// FDR thresholds must lie in `(0, 1]`.
    #[error("FDR threshold {0} outside (0, 1]")]
    InvalidThreshold(f64),
}

/// Settings for [`FootprintCaller`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallerConfig {
    /// Bonds on each side combined into a windowed p-value.
    pub window_half_width: usize,
    /// Null tracks simulated per region.
    pub null_samples: usize,
    /// Base seed for null simulation; mixed with the region coordinates.
    pub seed: u64,
    /// FDR levels at which footprints are reported.
    pub fdr_thresholds: Vec<f64>,
    /// Passing runs separated by at most this many bonds are merged.
    pub merge_gap: usize,
}

impl Default for CallerConfig {
    fn default() -> Self {
        Self {
            window_half_width: 3,
            null_samples: 50,
            seed: 0,
            fdr_thresholds: vec![0.001, 0.01, 0.05],
            merge_gap: 3,
        }
    }
}

impl CallerConfig {
    /// Set the half width of the p-value combination window.
    pub fn with_window_half_width(mut self, value: usize) -> Self {
        self.window_half_width = value;
        self
    }

    /// Set the number of simulated null tracks.
    pub fn with_null_samples(mut self, value: usize) -> Self {
        self.null_samples = value;
        self
    }

    /// Set the base seed for null simulation.
    pub fn with_seed(mut self, value: u64) -> Self {
        self.seed = value;
        self
    }

    /// Set the FDR levels at which footprints are reported.
    pub fn with_fdr_thresholds(mut self, value: Vec<f64>) -> Self {
        self.fdr_thresholds = value;
        self
    }

    /// Set the largest gap bridged between passing bonds.
    pub fn with_merge_gap(mut self, value: usize) -> Self {
        self.merge_gap = value;
        self
    }
}

/// Statistics for one bond.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BondStatistics {
    /// Base to the left of the bond.
    pub position: u32,
    /// Observed cuts at the bond.
    pub observed: u32,
    /// Expected cuts at the bond.
    pub expected: f64,
    /// Depletion p-value of the bond alone.
    pub p_value: f64,
    /// Stouffer-combined depletion over the window.
    pub window_p_value: f64,
    /// Empirical false discovery rate of the windowed p-value.
    pub fdr: f64,
}

/// Footprints found at one FDR level.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdCalls {
    /// FDR level.
    pub threshold: f64,
    /// Merged intervals whose bonds pass the level.
    pub footprints: Vec<GenomicInterval>,
}

/// Everything computed for one region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionCalls {
    /// Region the calls cover.
    pub region: GenomicInterval,
    /// One entry per bond.
    pub statistics: Vec<BondStatistics>,
    /// Footprints per requested FDR level.
    pub calls: Vec<ThresholdCalls>,
}

impl RegionCalls {
    /// Footprints at `threshold`, if that level was requested.
    pub fn footprints_at(&self, threshold: f64) -> Option<&[GenomicInterval]> {
        self.calls
            .iter()
            .find(|calls| calls.threshold == threshold)
            .map(|calls| calls.footprints.as_slice())
    }
}

/// Turns footprint tracks into FDR-controlled footprint intervals.
#[derive(Debug, Clone)]
pub struct FootprintCaller {
    config: CallerConfig,
}

impl FootprintCaller {
    /// Validate `config` and build a caller.
    pub fn new(config: CallerConfig) -> Result<Self, CallError> {
        if let Some(&bad) = config
            .fdr_thresholds
            .iter()
            .find(|&&t| !(t > 0.0 && t <= 1.0))
        {
            return Err(CallError::InvalidThreshold(bad));
        }
        Ok(Self { config })
    }

    /// Active configuration.
    pub fn config(&self) -> &CallerConfig {
        &self.config
    }

    /// Windowed p-values, FDR and footprints for one track.
    ///
    /// A region without a single observed cut yields neutral statistics and
    /// no footprints.
    pub fn call(&self, track: &FootprintTrack<'_>) -> RegionCalls {
        let region = track.region().clone();
        let scores: Vec<_> = track.iter().collect();
        let p_values: Vec<f64> = scores.iter().map(|s| s.depletion).collect();

        let has_signal = scores.iter().any(|s| s.observed > 0);
        let (window_p_values, fdr) = if has_signal {
            let window = stouffers_z(&p_values, self.config.window_half_width);
            let null = self.null_windows(track);
            let fdr = empirical_fdr(&null, &window);
            (window, fdr)
        } else {
            (vec![1.0; scores.len()], vec![1.0; scores.len()])
        };

        let statistics = scores
            .iter()
            .zip(window_p_values.iter().zip(&fdr))
            .map(|(score, (&window_p_value, &fdr))| BondStatistics {
                position: score.position,
                observed: score.observed,
                expected: score.expected,
                p_value: score.depletion,
                window_p_value,
                fdr,
            })
            .collect();

        let confidence: Vec<f64> = fdr.iter().map(|f| 1.0 - f).collect();
        let calls = self
            .config
            .fdr_thresholds
            .iter()
            .map(|&threshold| ThresholdCalls {
                threshold,
                footprints: segment(&confidence, 1.0 - threshold, self.config.merge_gap)
                    .into_iter()
                    .map(|(lo, hi)| {
                        let start = region.start() + lo as u32;
                        let end = region.start() + hi as u32;
                        GenomicInterval::new(region.chrom_arc(), start, end).with_strand(region.strand())
                    })
                    .collect(),
            })
            .collect();

        RegionCalls {
            region,
            statistics,
            calls,
        }
    }

    /// Windowed depletion p-values of tracks sampled from the model.
    fn null_windows(&self, track: &FootprintTrack<'_>) -> Vec<Vec<f64>> {
        let model = track.model();
        let expected = track.signal().expected();
        let mut rng = StdRng::seed_from_u64(region_seed(self.config.seed, track.region()));
        (0..self.config.null_samples)
            .map(|_| {
                let p: Vec<f64> = expected
                    .iter()
                    .map(|&e| model.depletion(model.sample(e, &mut rng), e))
                    .collect();
                stouffers_z(&p, self.config.window_half_width)
            })
            .collect()
    }
}

/// FNV-1a over the region coordinates, folded into `seed`.
fn region_seed(seed: u64, region: &GenomicInterval) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET ^ seed;
    let bytes = region
        .chrom()
        .bytes()
        .chain(region.start().to_le_bytes())
        .chain(region.end().to_le_bytes());
    for byte in bytes {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bias::UniformModel;
    use crate::cutcounts::{CleavageCounter, InMemoryAlignments};
    use crate::dispersion::{Bucket, BucketSource, DispersionModel};
    use crate::genomics::{AlignedRead, InMemoryGenome};
    use crate::predict::{FootprintPredictor, RegionTotal};

    fn model() -> DispersionModel {
        DispersionModel::from_buckets(vec![Bucket {
            lower: 0.0,
            observations: 1_000,
            mean_ratio: 1.0,
            dispersion: Some(20.0),
            source: BucketSource::Fitted,
        }])
        .unwrap()
    }

    /// Uniform coverage of ten cuts per base with a cut-free gap.
    fn protected_region() -> (InMemoryAlignments, InMemoryGenome) {
        let mut reads = Vec::new();
        for pos in 0..200u32 {
            if (90..110).contains(&pos) {
                continue;
            }
            for _ in 0..10 {
                reads.push(AlignedRead::contiguous("chr1", pos, b"ACGTACGTAC", false));
            }
        }
        let genome = InMemoryGenome::new().with_contig("chr1", &b"ACGT".repeat(60));
        (InMemoryAlignments::from_reads(reads), genome)
    }

    fn track_for(model: &DispersionModel) -> FootprintTrack<'_> {
        let (mut reads, mut genome) = protected_region();
        let predictor = FootprintPredictor::new(CleavageCounter::default(), UniformModel::new(), RegionTotal);
        predictor
            .predict(&mut reads, &mut genome, &GenomicInterval::new("chr1", 20, 180), model)
            .unwrap()
    }

    #[test]
    fn protected_gap_is_called() {
        let model = model();
        let track = track_for(&model);
        let caller = FootprintCaller::new(CallerConfig::default().with_null_samples(20)).unwrap();
        let calls = caller.call(&track);

        assert_eq!(calls.statistics.len(), 160);
        let footprints = calls.footprints_at(0.05).unwrap();
        assert!(!footprints.is_empty());
        assert!(footprints
            .iter()
            .any(|fp| fp.overlaps(&GenomicInterval::new("chr1", 95, 105))));
        assert!(footprints.iter().all(|fp| fp.start() >= 80 && fp.end() <= 120));
    }

    #[test]
    fn calls_are_reproducible_for_a_seed() {
        let model = model();
        let track = track_for(&model);
        let caller = FootprintCaller::new(CallerConfig::default().with_seed(9).with_null_samples(5)).unwrap();
        assert_eq!(caller.call(&track), caller.call(&track));
    }

    #[test]
    fn empty_region_is_neutral() {
        let model = model();
        let mut reads = InMemoryAlignments::new().with_contig("chr1");
        let mut genome = InMemoryGenome::new().with_contig("chr1", &b"ACGT".repeat(10));
        let predictor = FootprintPredictor::new(CleavageCounter::default(), UniformModel::new(), RegionTotal);
        let track = predictor
            .predict(&mut reads, &mut genome, &GenomicInterval::new("chr1", 5, 25), &model)
            .unwrap();
        let calls = FootprintCaller::new(CallerConfig::default()).unwrap().call(&track);
        assert!(calls.statistics.iter().all(|s| s.fdr == 1.0 && s.window_p_value == 1.0));
        assert!(calls.calls.iter().all(|c| c.footprints.is_empty()));
    }

    #[test]
    fn rejects_invalid_thresholds() {
        assert_eq!(
            FootprintCaller::new(CallerConfig::default().with_fdr_thresholds(vec![0.0])).unwrap_err(),
            CallError::InvalidThreshold(0.0)
        );
    }
}
