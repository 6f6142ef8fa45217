use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::model::Bucket;
use super::{DispersionError, DispersionModel};

/// Version tag written into every persisted model.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct PersistedModelRef<'a> {
    format_version: u32,
    buckets: &'a [Bucket],
}

#[derive(Deserialize)]
struct PersistedModel {
    format_version: u32,
    buckets: Vec<Bucket>,
}

impl DispersionModel {
    /// Serialise as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, DispersionError> {
        let persisted = PersistedModelRef {
            format_version: FORMAT_VERSION,
            buckets: self.buckets(),
        };
        Ok(serde_json::to_string_pretty(&persisted)?)
    }

    /// Parse and validate a JSON model.
    ///
    /// Well-formed JSON with a wrong shape or inconsistent buckets yields
    /// [`DispersionError::CorruptModel`]; malformed JSON yields
    /// [`DispersionError::Json`].
    pub fn from_json(json: &str) -> Result<Self, DispersionError> {
        let persisted: PersistedModel = serde_json::from_str(json).map_err(classify)?;
        Self::from_persisted(persisted)
    }

    /// Write the model to `writer`.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<(), DispersionError> {
        writer.write_all(self.to_json()?.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Read a model from `reader`.
    pub fn load_from<R: Read>(reader: R) -> Result<Self, DispersionError> {
        let persisted: PersistedModel = serde_json::from_reader(reader).map_err(classify)?;
        Self::from_persisted(persisted)
    }

    /// Write the model to a file.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), DispersionError> {
        let path = path.as_ref();
        debug!(path = %path.display(), buckets = self.buckets().len(), "writing dispersion model");
        self.write_to(BufWriter::new(File::create(path)?))
    }

    /// Read a model from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DispersionError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading dispersion model");
        Self::load_from(BufReader::new(File::open(path)?))
    }

    fn from_persisted(persisted: PersistedModel) -> Result<Self, DispersionError> {
        if persisted.format_version != FORMAT_VERSION {
            return Err(DispersionError::corrupt(format!(
                "unsupported format version {} (expected {FORMAT_VERSION})",
                persisted.format_version
            )));
        }
        DispersionModel::from_buckets(persisted.buckets)
    }
}

fn classify(err: serde_json::Error) -> DispersionError {
    if err.is_data() {
        DispersionError::corrupt(err.to_string())
    } else if err.is_io() {
        DispersionError::Io(err.into())
    } else {
        DispersionError::Json(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispersion::BucketSource;

    fn model() -> DispersionModel {
        DispersionModel::from_buckets(vec![
            Bucket {
                lower: 0.0,
                observations: 12,
                mean_ratio: 0.9,
                dispersion: None,
                source: BucketSource::Borrowed { from: 1 },
            },
            Bucket {
                lower: 0.25,
                observations: 400,
                mean_ratio: 1.0 / 3.0,
                dispersion: Some(2.718281828459045),
                source: BucketSource::Fitted,
            },
        ])
        .unwrap()
    }

    #[test]
    fn json_round_trip_is_exact() {
        let original = model();
        let restored = DispersionModel::from_json(&original.to_json().unwrap()).unwrap();
        assert_eq!(restored, original);
        for observed in 0..20 {
            assert_eq!(
                restored.evaluate(observed, 3.7).to_bits(),
                original.evaluate(observed, 3.7).to_bits()
            );
        }
    }

    #[test]
    fn writer_and_reader_round_trip() {
        let original = model();
        let mut buffer = Vec::new();
        original.write_to(&mut buffer).unwrap();
        let restored = DispersionModel::load_from(buffer.as_slice()).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn load_distinguishes_corrupt_from_malformed() {
        assert!(matches!(
            DispersionModel::from_json("{ not json"),
            Err(DispersionError::Json(_))
        ));
        assert!(matches!(
            DispersionModel::from_json(r#"{"format_version": 1}"#),
            Err(DispersionError::CorruptModel { .. })
        ));
        assert!(matches!(
            DispersionModel::from_json(r#"{"format_version": 9, "buckets": []}"#),
            Err(DispersionError::CorruptModel { reason }) if reason.contains("version")
        ));
    }
}
