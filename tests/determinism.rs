#[path = "common/mod.rs"]
mod common;

use std::collections::HashSet;
use std::fmt::Write;

use blake3::hash;
use footprinter::bias::UniformModel;
use footprinter::calls::{CallerConfig, FootprintCaller, RegionCalls};
use footprinter::cutcounts::CleavageCounter;
use footprinter::dispersion::FitConfig;
use footprinter::genomics::GenomicInterval;
use footprinter::pipeline::RegionPipeline;
use footprinter::predict::{FootprintPredictor, LocalWindow};

fn render(calls: &[RegionCalls]) -> String {
    let mut out = String::new();
    for region in calls {
        for stat in &region.statistics {
            writeln!(
                out,
                "{}\t{}\t{}\t{:.6}\t{:.6e}\t{:.6e}",
                region.region.chrom(),
                stat.position,
                stat.observed,
                stat.expected,
                stat.window_p_value,
                stat.fdr
            )
            .unwrap();
        }
        for level in &region.calls {
            for fp in &level.footprints {
                writeln!(out, "{}\t{fp}", level.threshold).unwrap();
            }
        }
    }
    out
}

#[test]
fn detection_is_deterministic_across_batching() {
    common::init_tracing();
    let predictor = FootprintPredictor::new(CleavageCounter::default(), UniformModel::new(), LocalWindow::default());
    let open = || {
        let reads = common::tiled_reads("chrD", 0, 1_500, 3, Some((700, 716)));
        Ok((reads, common::genome("chrD", 1_600, 11)))
    };
    let regions: Vec<_> = (0..12)
        .map(|i| GenomicInterval::new("chrD", 50 + i * 110, 150 + i * 110))
        .collect();
    let caller = FootprintCaller::new(CallerConfig::default().with_null_samples(10).with_seed(42)).unwrap();

    let mut fingerprints = HashSet::new();
    for batch_size in [1, 3, 5, 100] {
        let pipeline = RegionPipeline::new(&predictor, batch_size);
        let model = pipeline
            .learn(open, &regions, &FitConfig::default().with_min_observations(20))
            .expect("model fits");
        let calls = pipeline
            .detect(open, &regions, &model, &caller)
            .expect("detection succeeds");
        let digest = hash(render(&calls).as_bytes());
        fingerprints.insert((hash(model.to_json().unwrap().as_bytes()), digest));
    }

    assert_eq!(fingerprints.len(), 1, "outputs diverged across batch sizes");
}
