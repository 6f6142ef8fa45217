#[path = "common/mod.rs"]
mod common;

use footprinter::bias::{BiasModel, KmerModel, KmerTable, UniformModel};
use footprinter::calls::{CallerConfig, FootprintCaller};
use footprinter::cutcounts::{CleavageCounter, CounterConfig, CutOffsets, InMemoryAlignments};
use footprinter::dispersion::{CountDistribution, DispersionModel};
use footprinter::genomics::{dna, AlignedRead, GenomicInterval, Strand};
use footprinter::pipeline::RegionPipeline;
use footprinter::predict::{FootprintPredictor, RegionTotal};
use rand::rngs::StdRng;
use rand::SeedableRng;
use test_case::test_case;

fn counts_for(reads: Vec<AlignedRead>, offsets: CutOffsets) -> (Vec<u32>, Vec<u32>) {
    let mut source = InMemoryAlignments::from_reads(reads);
    let counter = CleavageCounter::new(CounterConfig::default().with_offsets(offsets));
    let counts = counter
        .query(&mut source, &GenomicInterval::new("chr1", 1000, 1010).with_strand(Strand::Forward))
        .expect("counting succeeds");
    (counts.plus().to_vec(), counts.minus().to_vec())
}

#[test]
fn plus_strand_reads_land_on_their_start() {
    let reads = vec![
        AlignedRead::contiguous("chr1", 1002, b"ACGTACGT", false),
        AlignedRead::contiguous("chr1", 1005, b"ACGTACGT", false),
    ];
    let (plus, minus) = counts_for(reads, CutOffsets::default());
    assert_eq!(plus, vec![0, 0, 1, 0, 0, 1, 0, 0, 0, 0]);
    assert_eq!(minus, vec![0; 10]);
}

#[test_case(false, CutOffsets::default(), 2; "dnase forward")]
#[test_case(true, CutOffsets::default(), 7; "dnase reverse")]
#[test_case(false, CutOffsets::tn5(), 6; "tn5 forward")]
#[test_case(true, CutOffsets::tn5(), 3; "tn5 reverse")]
fn cut_offsets_shift_the_recorded_base(reverse: bool, offsets: CutOffsets, expected_offset: usize) {
    // forward starts at 1002, reverse spans [1000, 1008)
    let read = if reverse {
        AlignedRead::contiguous("chr1", 1000, b"ACGTACGT", true)
    } else {
        AlignedRead::contiguous("chr1", 1002, b"ACGTACGT", false)
    };
    let (plus, minus) = counts_for(vec![read], offsets);
    let (hit, silent) = if reverse { (minus, plus) } else { (plus, minus) };
    let mut expected = vec![0; 10];
    expected[expected_offset] = 1;
    assert_eq!(hit, expected);
    assert_eq!(silent, vec![0; 10]);
}

#[test_case(b"ACGTACGTACGTA"; "periodic")]
#[test_case(b"AAAAAAAAAAAAA"; "homopolymer")]
#[test_case(b"GCGCGTTTACGAT"; "mixed")]
fn uniform_model_is_flat(window: &[u8; 13]) {
    let model = UniformModel::new();
    assert_eq!(model.score(window, Strand::Forward).unwrap(), 1.0);
    assert_eq!(model.score(window, Strand::Reverse).unwrap(), 1.0);
}

#[test_case(b"ACGTTGCAACGTA"; "odd window")]
#[test_case(b"TTTGACCATGGCA"; "asymmetric")]
#[test_case(b"GGGGGCCCCCATA"; "gc rich")]
fn kmer_lookup_is_strand_symmetric(window: &[u8; 13]) {
    let weights = (0..4usize.pow(5)).map(|i| 0.25 + (i % 37) as f64 * 0.05).collect();
    let model = KmerModel::new(KmerTable::from_weights(5, weights).unwrap());
    let forward = model.score(window, Strand::Forward).unwrap();
    let reverse = model
        .score(&dna::reverse_complement(window), Strand::Reverse)
        .unwrap();
    assert_eq!(forward, reverse);
}

#[test]
fn learned_model_is_calibrated_at_the_mean() {
    common::init_tracing();
    let levels = [2.0, 5.0, 10.0, 20.0, 50.0];
    let mut rng = StdRng::seed_from_u64(17);
    let mut observed = Vec::with_capacity(10_000);
    let mut expected = Vec::with_capacity(10_000);
    for i in 0..10_000 {
        let e = levels[i % levels.len()];
        let draw = CountDistribution::new(e, Some(10.0)).sample(&mut rng);
        observed.push(draw as u32);
        expected.push(e);
    }

    let model = DispersionModel::learn(&observed, &expected).unwrap();
    for &e in &levels {
        let p = model.evaluate(e as u32, e);
        assert!((0.2..0.8).contains(&p), "evaluate({e}, {e}) = {p}");
    }
}

#[test]
fn protected_site_is_called_end_to_end() {
    common::init_tracing();
    let predictor = FootprintPredictor::new(CleavageCounter::default(), UniformModel::new(), RegionTotal);
    let open = || {
        let reads = common::tiled_reads("chr1", 0, 2_000, 6, Some((1_000, 1_020)));
        Ok((reads, common::genome("chr1", 2_100, 3)))
    };
    let training: Vec<_> = (0..8)
        .map(|i| GenomicInterval::new("chr1", 100 + i * 100, 180 + i * 100))
        .collect();
    let pipeline = RegionPipeline::new(&predictor, 2);
    let model = pipeline
        .learn(open, &training, &Default::default())
        .expect("model fits");

    let target = vec![GenomicInterval::new("chr1", 900, 1_120)];
    let caller = FootprintCaller::new(CallerConfig::default().with_null_samples(20)).unwrap();
    let calls = pipeline.detect(open, &target, &model, &caller).unwrap();
    let footprints = calls[0].footprints_at(0.05).unwrap();
    assert!(footprints
        .iter()
        .any(|fp| fp.overlaps(&GenomicInterval::new("chr1", 1_005, 1_015))));
}

#[test]
fn rescaling_with_region_total_preserves_cut_mass() {
    let predictor = FootprintPredictor::new(CleavageCounter::default(), UniformModel::new(), RegionTotal);
    let mut reads = common::tiled_reads("chr1", 0, 300, 2, None);
    let mut genome = common::genome("chr1", 400, 5);
    let signal = predictor
        .compute(&mut reads, &mut genome, &GenomicInterval::new("chr1", 50, 250))
        .unwrap();
    let observed: u32 = signal.plus().observed().iter().sum();
    let expected: f64 = signal.plus().expected().iter().sum();
    assert!((observed as f64 - expected).abs() < 1e-6 * observed as f64 + 1.0);
}
