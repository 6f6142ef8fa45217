use std::iter::FusedIterator;

use crate::dispersion::DispersionModel;
use crate::genomics::GenomicInterval;

/// Observed cuts and expected counts of one strand, indexed by base.
#[derive(Debug, Clone, PartialEq)]
pub struct StrandSignal {
    observed: Vec<u32>,
    expected: Vec<f64>,
}

impl StrandSignal {
    pub(crate) fn new(observed: Vec<u32>, expected: Vec<f64>) -> Self {
        debug_assert_eq!(observed.len(), expected.len());
        Self { observed, expected }
    }

    /// Cuts per base.
    pub fn observed(&self) -> &[u32] {
        &self.observed
    }

    /// Expected cuts per base after rescaling.
    pub fn expected(&self) -> &[f64] {
        &self.expected
    }
}

/// Bond-level observed and expected signal over a region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionSignal {
    region: GenomicInterval,
    observed: Vec<u32>,
    expected: Vec<f64>,
    plus: StrandSignal,
    minus: StrandSignal,
}

impl RegionSignal {
    pub(crate) fn new(
        region: GenomicInterval,
        observed: Vec<u32>,
        expected: Vec<f64>,
        plus: StrandSignal,
        minus: StrandSignal,
    ) -> Self {
        debug_assert_eq!(observed.len(), region.len());
        debug_assert_eq!(expected.len(), region.len());
        Self {
            region,
            observed,
            expected,
            plus,
            minus,
        }
    }

    /// Scored region.
    pub fn region(&self) -> &GenomicInterval {
        &self.region
    }

    /// Merged cuts per bond.
    pub fn observed(&self) -> &[u32] {
        &self.observed
    }

    /// Merged expected cuts per bond.
    pub fn expected(&self) -> &[f64] {
        &self.expected
    }

    /// Plus-strand signal per base of the region.
    pub fn plus(&self) -> &StrandSignal {
        &self.plus
    }

    /// Minus-strand signal per base of the region.
    pub fn minus(&self) -> &StrandSignal {
        &self.minus
    }

    /// Number of bonds.
    pub fn len(&self) -> usize {
        self.observed.len()
    }

    /// `true` for a region without bonds.
    pub fn is_empty(&self) -> bool {
        self.observed.is_empty()
    }
}

/// Statistic for a single bond.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FootprintScore {
    /// Base to the left of the scored bond.
    pub position: u32,
    /// Merged observed cuts.
    pub observed: u32,
    /// Merged expected cuts.
    pub expected: f64,
    /// `P(X ≥ observed)`: excess cleavage.
    pub p_value: f64,
    /// `P(X ≤ observed)`: protection from cleavage.
    pub depletion: f64,
}

/// A region's signal paired with the model that scores it.
///
/// Scores are produced on demand; [`FootprintTrack::iter`] can be called any
/// number of times and always yields the same sequence.
#[derive(Debug, Clone)]
pub struct FootprintTrack<'m> {
    signal: RegionSignal,
    model: &'m DispersionModel,
}

impl<'m> FootprintTrack<'m> {
    pub(crate) fn new(signal: RegionSignal, model: &'m DispersionModel) -> Self {
        Self { signal, model }
    }

    /// Underlying observed/expected signal.
    pub fn signal(&self) -> &RegionSignal {
        &self.signal
    }

    /// Scored region.
    pub fn region(&self) -> &GenomicInterval {
        self.signal.region()
    }

    /// Model used for scoring.
    pub fn model(&self) -> &'m DispersionModel {
        self.model
    }

    /// Number of bonds.
    pub fn len(&self) -> usize {
        self.signal.len()
    }

    /// `true` for a region without bonds.
    pub fn is_empty(&self) -> bool {
        self.signal.is_empty()
    }

    /// Lazily score every bond in region order.
    pub fn iter(&self) -> Scores<'_> {
        Scores {
            track: self,
            next: 0,
        }
    }

    /// Depletion p-value of every bond.
    pub fn depletion(&self) -> Vec<f64> {
        self.iter().map(|score| score.depletion).collect()
    }

    fn score_at(&self, index: usize) -> FootprintScore {
        let observed = self.signal.observed[index];
        let expected = self.signal.expected[index];
        FootprintScore {
            position: self.signal.region.start() + index as u32,
            observed,
            expected,
            p_value: self.model.evaluate(observed, expected),
            depletion: self.model.depletion(observed, expected),
        }
    }
}

impl<'a, 'm> IntoIterator for &'a FootprintTrack<'m> {
    type Item = FootprintScore;
    type IntoIter = Scores<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a track's scores.
#[derive(Debug, Clone)]
pub struct Scores<'a> {
    track: &'a FootprintTrack<'a>,
    next: usize,
}

impl Iterator for Scores<'_> {
    type Item = FootprintScore;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.track.len() {
            return None;
        }
        let score = self.track.score_at(self.next);
        self.next += 1;
        Some(score)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.track.len() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Scores<'_> {}
impl FusedIterator for Scores<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispersion::{Bucket, BucketSource};

    fn track(model: &DispersionModel) -> FootprintTrack<'_> {
        let region = GenomicInterval::new("chr2", 100, 104);
        let signal = RegionSignal::new(
            region,
            vec![0, 5, 0, 1],
            vec![0.0, 1.0, 8.0, 1.0],
            StrandSignal::new(vec![0; 4], vec![0.0; 4]),
            StrandSignal::new(vec![0; 4], vec![0.0; 4]),
        );
        FootprintTrack::new(signal, model)
    }

    fn poisson_model() -> DispersionModel {
        DispersionModel::from_buckets(vec![Bucket {
            lower: 0.0,
            observations: 1,
            mean_ratio: 1.0,
            dispersion: None,
            source: BucketSource::Fitted,
        }])
        .unwrap()
    }

    #[test]
    fn iteration_is_restartable_and_ordered() {
        let model = poisson_model();
        let track = track(&model);
        let first: Vec<_> = track.iter().collect();
        let second: Vec<_> = (&track).into_iter().collect();
        assert_eq!(first, second);
        assert_eq!(track.iter().len(), 4);
        assert_eq!(
            first.iter().map(|s| s.position).collect::<Vec<_>>(),
            vec![100, 101, 102, 103]
        );
    }

    #[test]
    fn scores_carry_both_tails() {
        let model = poisson_model();
        let scores: Vec<_> = track(&model).iter().collect();
        // zero observed, zero expected: neutral
        assert_eq!((scores[0].p_value, scores[0].depletion), (1.0, 1.0));
        // excess cleavage
        assert!(scores[1].p_value < 0.01);
        // protected position
        assert!(scores[2].depletion < 1e-3);
        assert_eq!(scores[2].p_value, 1.0);
    }
}
