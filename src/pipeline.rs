//! Region-parallel drivers.
//!
//! Regions are processed in batches on the rayon pool. Alignment and
//! sequence handles are not shared between threads: every batch opens its
//! own pair through the caller's factory and drops it when the batch ends.
//! Results keep region order and the first error aborts the run.

use rayon::prelude::*;
use tracing::{debug, info, info_span};

use crate::bias::BiasModel;
use crate::calls::{FootprintCaller, RegionCalls};
use crate::cutcounts::AlignmentSource;
use crate::dispersion::{DispersionModel, FitConfig, TrainingSet};
use crate::error::{FootprintError, Result};
use crate::genomics::{GenomicInterval, SequenceSource};
use crate::predict::{FootprintPredictor, Rescale};

/// Runs a predictor over many regions.
#[derive(Debug)]
pub struct RegionPipeline<'p, B, R> {
    predictor: &'p FootprintPredictor<B, R>,
    batch_size: usize,
}

impl<'p, B, R> RegionPipeline<'p, B, R>
where
    B: BiasModel,
    R: Rescale,
{
    /// `batch_size` regions share one pair of handles; zero is treated as one.
    pub fn new(predictor: &'p FootprintPredictor<B, R>, batch_size: usize) -> Self {
        Self {
            predictor,
            batch_size: batch_size.max(1),
        }
    }

    /// Regions handled per pair of handles.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Observed/expected pairs for every bond of every region.
    pub fn training_set<A, S, F>(&self, open: F, regions: &[GenomicInterval]) -> Result<TrainingSet>
    where
        A: AlignmentSource,
        S: SequenceSource,
        F: Fn() -> Result<(A, S)> + Sync,
    {
        let _span = info_span!("collect_training_pairs", regions = regions.len()).entered();
        let batches = self.run_batches(&open, regions, |predictor, source, genome, region| {
            let signal = predictor.compute(source, genome, region)?;
            Ok(signal
                .observed()
                .iter()
                .copied()
                .zip(signal.expected().iter().copied())
                .collect::<TrainingSet>())
        })?;

        let mut set = TrainingSet::new();
        for part in batches {
            set.append(part);
        }
        info!(pairs = set.len(), "collected training pairs");
        Ok(set)
    }

    /// Fit a dispersion model from every bond of every region.
    pub fn learn<A, S, F>(&self, open: F, regions: &[GenomicInterval], config: &FitConfig) -> Result<DispersionModel>
    where
        A: AlignmentSource,
        S: SequenceSource,
        F: Fn() -> Result<(A, S)> + Sync,
    {
        let set = self.training_set(open, regions)?;
        let _span = info_span!("learn_dispersion_model", pairs = set.len()).entered();
        Ok(DispersionModel::fit(&set, config)?)
    }

    /// Score and call footprints in every region.
    pub fn detect<A, S, F>(
        &self,
        open: F,
        regions: &[GenomicInterval],
        model: &DispersionModel,
        caller: &FootprintCaller,
    ) -> Result<Vec<RegionCalls>>
    where
        A: AlignmentSource,
        S: SequenceSource,
        F: Fn() -> Result<(A, S)> + Sync,
    {
        let _span = info_span!("detect_footprints", regions = regions.len()).entered();
        let calls = self.run_batches(&open, regions, |predictor, source, genome, region| {
            let track = predictor.predict(source, genome, region, model)?;
            Ok(caller.call(&track))
        })?;
        let footprints: usize = calls
            .iter()
            .flat_map(|region| region.calls.iter())
            .map(|level| level.footprints.len())
            .sum();
        info!(regions = calls.len(), footprints, "footprint detection finished");
        Ok(calls)
    }

    fn run_batches<A, S, F, T, W>(&self, open: &F, regions: &[GenomicInterval], work: W) -> Result<Vec<T>>
    where
        A: AlignmentSource,
        S: SequenceSource,
        F: Fn() -> Result<(A, S)> + Sync,
        T: Send,
        W: Fn(&FootprintPredictor<B, R>, &mut A, &mut S, &GenomicInterval) -> Result<T> + Sync,
    {
        let batches: Vec<Vec<T>> = regions
            .par_chunks(self.batch_size)
            .enumerate()
            .map(|(index, batch)| {
                let (mut source, mut genome) = open()?;
                let results = batch
                    .iter()
                    .map(|region| work(self.predictor, &mut source, &mut genome, region))
                    .collect::<Result<Vec<T>>>()?;
                debug!(batch = index, regions = batch.len(), "processed batch");
                Ok::<_, FootprintError>(results)
            })
            .collect::<Result<_>>()?;
        Ok(batches.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bias::UniformModel;
    use crate::calls::CallerConfig;
    use crate::cutcounts::{CleavageCounter, CountError, InMemoryAlignments};
    use crate::genomics::{AlignedRead, InMemoryGenome};
    use crate::predict::RegionTotal;

    fn fixtures() -> (InMemoryAlignments, InMemoryGenome) {
        let reads = (0..400u32)
            .flat_map(|pos| {
                let depth = 1 + (pos * 7 % 5) as usize;
                std::iter::repeat(AlignedRead::contiguous("chr1", pos, b"ACGTACGT", pos % 2 == 0)).take(depth)
            })
            .collect::<Vec<_>>();
        (
            InMemoryAlignments::from_reads(reads),
            InMemoryGenome::new().with_contig("chr1", &b"ACGT".repeat(110)),
        )
    }

    fn regions() -> Vec<GenomicInterval> {
        (0..8).map(|i| GenomicInterval::new("chr1", 20 + i * 40, 50 + i * 40)).collect()
    }

    #[test]
    fn training_pairs_keep_region_order() {
        let predictor = FootprintPredictor::new(CleavageCounter::default(), UniformModel::new(), RegionTotal);
        let open = || Ok(fixtures());
        let batched = RegionPipeline::new(&predictor, 3).training_set(open, &regions()).unwrap();
        let serial = RegionPipeline::new(&predictor, 100).training_set(open, &regions()).unwrap();
        assert_eq!(batched.len(), 8 * 30);
        assert_eq!(batched, serial);
    }

    #[test]
    fn learn_then_detect() {
        let predictor = FootprintPredictor::new(CleavageCounter::default(), UniformModel::new(), RegionTotal);
        let pipeline = RegionPipeline::new(&predictor, 2);
        let open = || Ok(fixtures());
        let model = pipeline
            .learn(open, &regions(), &FitConfig::default().with_min_observations(10))
            .unwrap();
        let caller = FootprintCaller::new(CallerConfig::default().with_null_samples(4)).unwrap();
        let calls = pipeline.detect(open, &regions(), &model, &caller).unwrap();
        assert_eq!(calls.len(), 8);
        assert_eq!(calls[3].region, regions()[3]);
        assert!(calls.iter().all(|c| c.statistics.len() == 30));
    }

    #[test]
    fn first_error_aborts() {
        let predictor = FootprintPredictor::new(CleavageCounter::default(), UniformModel::new(), RegionTotal);
        let mut bad = regions();
        bad.push(GenomicInterval::new("chrUn", 0, 10));
        let err = RegionPipeline::new(&predictor, 4)
            .training_set(|| Ok(fixtures()), &bad)
            .unwrap_err();
        assert!(matches!(err, FootprintError::Count(CountError::OutOfRange { .. })));
    }
}
