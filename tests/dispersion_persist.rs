#[path = "common/mod.rs"]
mod common;

use common::assert_snapshot;
use footprinter::dispersion::{Bucket, BucketSource, DispersionError, DispersionModel, FitConfig, TrainingSet};

fn small_model() -> DispersionModel {
    DispersionModel::from_buckets(vec![
        Bucket {
            lower: 0.0,
            observations: 120,
            mean_ratio: 1.0,
            dispersion: None,
            source: BucketSource::Fitted,
        },
        Bucket {
            lower: 0.25,
            observations: 12,
            mean_ratio: 1.0,
            dispersion: None,
            source: BucketSource::Borrowed { from: 0 },
        },
        Bucket {
            lower: 1.5,
            observations: 4000,
            mean_ratio: 0.875,
            dispersion: Some(12.5),
            source: BucketSource::Fitted,
        },
    ])
    .expect("buckets are consistent")
}

#[test]
fn persisted_model_matches_golden() {
    let json = small_model().to_json().expect("model serialises");
    assert_snapshot("dispersion/small_model.json", &json);
}

#[test]
fn file_round_trip_preserves_predictions() {
    common::init_tracing();
    let observed: Vec<u32> = (0..3_000u32).map(|i| (i * 7 + i / 3) % 23).collect();
    let expected: Vec<f64> = (0..3_000u32).map(|i| 4.0 + (i % 17) as f64).collect();
    let set = TrainingSet::from_slices(&observed, &expected).unwrap();
    let model = DispersionModel::fit(&set, &FitConfig::default().with_min_observations(20)).unwrap();

    let path = std::env::temp_dir().join(format!("footprinter-model-{}.json", std::process::id()));
    model.write(&path).unwrap();
    let restored = DispersionModel::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(restored.buckets(), model.buckets());
    for (obs, exp) in [(0u32, 4.0), (3, 7.5), (12, 12.0), (40, 20.0)] {
        assert_eq!(restored.evaluate(obs, exp), model.evaluate(obs, exp));
        assert_eq!(restored.depletion(obs, exp), model.depletion(obs, exp));
    }
}

#[test]
fn damaged_documents_are_reported_as_corrupt() {
    let json = small_model().to_json().unwrap();
    let damaged = json.replacen("\"lower\": 0.25", "\"lower\": -3.0", 1);
    assert!(matches!(
        DispersionModel::from_json(&damaged),
        Err(DispersionError::CorruptModel { .. })
    ));

    let future = json.replacen("\"format_version\": 1", "\"format_version\": 7", 1);
    assert!(matches!(
        DispersionModel::from_json(&future),
        Err(DispersionError::CorruptModel { .. })
    ));

    assert!(matches!(
        DispersionModel::from_json("{ \"format_version\": 1, "),
        Err(DispersionError::Json(_))
    ));
    assert!(matches!(
        DispersionModel::load("/nonexistent/footprinter/model.json"),
        Err(DispersionError::Io(_))
    ));
}
