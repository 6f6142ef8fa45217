use tracing::trace;

use super::track::{FootprintTrack, RegionSignal, StrandSignal};
use super::{AmbiguityPolicy, PredictError, PredictorConfig, Rescale, RescaleMethod};
use crate::bias::{BiasError, BiasModel};
use crate::cutcounts::{AlignmentSource, CleavageCounter, CounterConfig};
use crate::dispersion::DispersionModel;
use crate::genomics::{GenomicInterval, SequenceSource, Strand};

/// Computes observed and expected cleavage signals over regions.
///
/// Scores are reported per bond: element `i` of a region covers the bond
/// between bases `start + i` and `start + i + 1`, summing plus-strand cuts
/// at base `start + i + 1` and minus-strand cuts at base `start + i`.
#[derive(Debug, Clone)]
pub struct FootprintPredictor<B, R = RescaleMethod> {
    counter: CleavageCounter,
    bias: B,
    rescale: R,
    ambiguity: AmbiguityPolicy,
}

impl<B: BiasModel> FootprintPredictor<B, RescaleMethod> {
    /// Build a predictor from serialisable settings.
    pub fn from_config(counter: CounterConfig, bias: B, config: PredictorConfig) -> Self {
        Self {
            counter: CleavageCounter::new(counter),
            bias,
            rescale: config.rescale,
            ambiguity: config.ambiguity,
        }
    }
}

impl<B: BiasModel, R: Rescale> FootprintPredictor<B, R> {
    /// Build a predictor with an explicit rescaling strategy.
    pub fn new(counter: CleavageCounter, bias: B, rescale: R) -> Self {
        Self {
            counter,
            bias,
            rescale,
            ambiguity: AmbiguityPolicy::default(),
        }
    }

    /// Set the ambiguity policy.
    pub fn with_ambiguity(mut self, ambiguity: AmbiguityPolicy) -> Self {
        self.ambiguity = ambiguity;
        self
    }

    /// Cleavage counter used for observed counts.
    pub fn counter(&self) -> &CleavageCounter {
        &self.counter
    }

    /// Sequence-bias model.
    pub fn bias(&self) -> &B {
        &self.bias
    }

    /// Rescaling strategy.
    pub fn rescale(&self) -> &R {
        &self.rescale
    }

    /// Handling of ambiguous bases.
    pub fn ambiguity(&self) -> AmbiguityPolicy {
        self.ambiguity
    }

    /// Observed and expected signal over `region`.
    pub fn compute<A, S>(
        &self,
        source: &mut A,
        genome: &mut S,
        region: &GenomicInterval,
    ) -> Result<RegionSignal, PredictError>
    where
        A: AlignmentSource + ?Sized,
        S: SequenceSource + ?Sized,
    {
        let pad = self.rescale.padding() as u32;
        // one extra base on the right completes the last bond
        let query = region.widened(pad, pad + 1);
        let left = (region.start() - query.start()) as usize;
        let len = region.len();

        let counts = self.counter.query(source, &query)?;
        let (plus_propensity, minus_propensity) = self.propensities(genome, &query)?;
        let plus_expected = self.rescale.rescale(counts.plus(), &plus_propensity);
        let minus_expected = self.rescale.rescale(counts.minus(), &minus_propensity);

        let merged_observed = counts.merged();
        let observed = merged_observed[left..left + len].to_vec();
        let expected = (left..left + len)
            .map(|m| plus_expected[m + 1] + minus_expected[m])
            .collect();

        let plus = StrandSignal::new(
            counts.plus()[left..left + len].to_vec(),
            plus_expected[left..left + len].to_vec(),
        );
        let minus = StrandSignal::new(
            counts.minus()[left..left + len].to_vec(),
            minus_expected[left..left + len].to_vec(),
        );
        trace!(%region, cuts = counts.total(), "computed region signal");
        Ok(RegionSignal::new(region.clone(), observed, expected, plus, minus))
    }

    /// Score every bond of `region` against `model`.
    pub fn predict<'m, A, S>(
        &self,
        source: &mut A,
        genome: &mut S,
        region: &GenomicInterval,
        model: &'m DispersionModel,
    ) -> Result<FootprintTrack<'m>, PredictError>
    where
        A: AlignmentSource + ?Sized,
        S: SequenceSource + ?Sized,
    {
        Ok(FootprintTrack::new(self.compute(source, genome, region)?, model))
    }

    /// Per-strand propensities for every base of `query`.
    ///
    /// The plus-strand cut at base `x` sits at bond `x` (left of the base)
    /// and the minus-strand cut at bond `x + 1`; the k-mer for bond `b`
    /// spans `[b - k/2, b - k/2 + k)` on the plus strand and
    /// `[b - (k - k/2), b + k/2)`, reverse-complemented, on the minus strand.
    fn propensities<S>(
        &self,
        genome: &mut S,
        query: &GenomicInterval,
    ) -> Result<(Vec<f64>, Vec<f64>), PredictError>
    where
        S: SequenceSource + ?Sized,
    {
        let k = self.bias.kmer_len();
        let half = k / 2;
        let seq_start = query.start() as i64 - k as i64;
        let sequence = genome.fetch(query.chrom(), seq_start, query.end() as i64 + k as i64)?;

        let mut plus = Vec::with_capacity(query.len());
        let mut minus = Vec::with_capacity(query.len());
        for j in 0..query.len() {
            let plus_lo = j + k - half;
            plus.push(self.score(&sequence[plus_lo..plus_lo + k], Strand::Forward)?);
            let minus_lo = j + 1 + half;
            minus.push(self.score(&sequence[minus_lo..minus_lo + k], Strand::Reverse)?);
        }
        Ok((plus, minus))
    }

    fn score(&self, kmer: &[u8], strand: Strand) -> Result<f64, PredictError> {
        match self.bias.score(kmer, strand) {
            Ok(score) => Ok(score),
            Err(err @ BiasError::InvalidSequence { .. }) => match self.ambiguity {
                AmbiguityPolicy::NeutralWeight => Ok(self.bias.neutral_score()),
                AmbiguityPolicy::ZeroWeight => Ok(0.0),
                AmbiguityPolicy::Fail => Err(err.into()),
            },
            Err(err) => Err(err.into()),
        }
    }
}
