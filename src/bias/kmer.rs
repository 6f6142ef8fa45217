use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use super::{central_kmer, BiasError, BiasModel};
use crate::genomics::dna::{index_kmer, kmer_index, reverse_complement_index, NUM_BASES};
use crate::genomics::Strand;

/// Dense k-mer → weight table holding all `4^k` entries.
///
/// Entries are addressed by the 2-bit packed index of the k-mer (first base
/// most significant), so lookup never hashes and an incomplete table cannot
/// be constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct KmerTable {
    k: usize,
    weights: Vec<f64>,
}

impl KmerTable {
    /// Largest supported k-mer length.
    pub const MAX_K: usize = 12;

    /// Build a table from weights already laid out in packed-index order.
    pub fn from_weights(k: usize, weights: Vec<f64>) -> Result<Self, BiasError> {
        let expected = table_size(k)?;
        if weights.len() != expected {
            return Err(BiasError::IncompleteTable {
                k,
                found: weights.len(),
                expected,
            });
        }
        for (index, &weight) in weights.iter().enumerate() {
            check_weight(&index_kmer(index, k), weight)?;
        }
        Ok(Self { k, weights })
    }

    /// Build a table from `(kmer, weight)` pairs. The k-mer length is taken
    /// from the first pair; every k-mer must appear exactly once.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, BiasError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<[u8]>,
    {
        let mut builder = TableBuilder::default();
        for (kmer, weight) in pairs {
            builder.insert(kmer.as_ref(), weight)?;
        }
        builder.finish()
    }

    /// Parse the `KMER<whitespace>WEIGHT` text format.
    ///
    /// Blank lines and lines starting with `#` are skipped; columns after the
    /// weight are ignored.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, BiasError> {
        let mut builder = TableBuilder::default();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let mut fields = trimmed.split_whitespace();
            let (kmer, weight) = match (fields.next(), fields.next()) {
                (Some(kmer), Some(weight)) => (kmer, weight),
                _ => {
                    return Err(BiasError::Parse {
                        line: lineno + 1,
                        message: "expected a k-mer and a weight".to_string(),
                    })
                }
            };
            let weight: f64 = weight.parse().map_err(|_| BiasError::Parse {
                line: lineno + 1,
                message: format!("invalid weight '{weight}'"),
            })?;
            builder.insert(kmer.as_bytes(), weight)?;
        }
        builder.finish()
    }

    /// Read a table file from disk.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, BiasError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// K-mer length.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Number of entries (`4^k`).
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Always `false`; tables are complete by construction.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Weight of `kmer`, or `None` for a wrong length or ambiguous base.
    pub fn get(&self, kmer: &[u8]) -> Option<f64> {
        if kmer.len() != self.k {
            return None;
        }
        kmer_index(kmer).ok().map(|index| self.weights[index])
    }

    /// Mean weight, used in place of lookups that cannot be made.
    pub fn neutral_weight(&self) -> f64 {
        self.weights.iter().sum::<f64>() / self.weights.len() as f64
    }

    /// Entries in packed-index (lexicographic ACGT) order.
    pub fn iter(&self) -> impl Iterator<Item = (Vec<u8>, f64)> + '_ {
        self.weights
            .iter()
            .enumerate()
            .map(move |(index, &weight)| (index_kmer(index, self.k), weight))
    }

    fn weight_at(&self, index: usize) -> f64 {
        self.weights[index]
    }
}

fn table_size(k: usize) -> Result<usize, BiasError> {
    if k == 0 || k > KmerTable::MAX_K {
        return Err(BiasError::UnsupportedKmerLength(k));
    }
    Ok(NUM_BASES.pow(k as u32))
}

fn check_weight(kmer: &[u8], weight: f64) -> Result<(), BiasError> {
    if weight.is_finite() && weight >= 0.0 {
        Ok(())
    } else {
        Err(BiasError::InvalidWeight {
            kmer: String::from_utf8_lossy(kmer).into_owned(),
            weight,
        })
    }
}

#[derive(Default)]
struct TableBuilder {
    k: usize,
    slots: Vec<Option<f64>>,
}

impl TableBuilder {
    fn insert(&mut self, kmer: &[u8], weight: f64) -> Result<(), BiasError> {
        let display = || String::from_utf8_lossy(kmer).into_owned();
        if self.slots.is_empty() {
            self.slots = vec![None; table_size(kmer.len())?];
            self.k = kmer.len();
        } else if kmer.len() != self.k {
            return Err(BiasError::InconsistentKmerLength {
                kmer: display(),
                found: kmer.len(),
                expected: self.k,
            });
        }
        check_weight(kmer, weight)?;
        let index = kmer_index(kmer).map_err(|_| BiasError::InvalidKmer(display()))?;
        let slot = &mut self.slots[index];
        if slot.is_some() {
            return Err(BiasError::DuplicateKmer(display()));
        }
        *slot = Some(weight);
        Ok(())
    }

    fn finish(self) -> Result<KmerTable, BiasError> {
        if self.slots.is_empty() {
            return Err(BiasError::EmptyTable);
        }
        let expected = self.slots.len();
        let weights: Vec<f64> = self.slots.into_iter().flatten().collect();
        if weights.len() != expected {
            return Err(BiasError::IncompleteTable {
                k: self.k,
                found: weights.len(),
                expected,
            });
        }
        Ok(KmerTable { k: self.k, weights })
    }
}

/// Bias model backed by a [`KmerTable`].
///
/// Cloning shares the table, so one loaded model can be handed to every
/// worker thread.
#[derive(Debug, Clone)]
pub struct KmerModel {
    table: Arc<KmerTable>,
}

impl KmerModel {
    /// Wrap a complete table.
    pub fn new(table: KmerTable) -> Self {
        Self {
            table: Arc::new(table),
        }
    }

    /// Load the table from a text file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, BiasError> {
        Ok(Self::new(KmerTable::from_path(path)?))
    }

    /// Underlying table.
    pub fn table(&self) -> &KmerTable {
        &self.table
    }
}

impl BiasModel for KmerModel {
    fn kmer_len(&self) -> usize {
        self.table.k()
    }

    fn score(&self, window: &[u8], strand: Strand) -> Result<f64, BiasError> {
        let (flank, kmer) = central_kmer(window, self.table.k())?;
        let index = match strand {
            Strand::Reverse => reverse_complement_index(kmer),
            Strand::Forward | Strand::Unstranded => kmer_index(kmer),
        };
        match index {
            Ok(index) => Ok(self.table.weight_at(index)),
            Err(offset) => Err(BiasError::InvalidSequence {
                window: String::from_utf8_lossy(window).into_owned(),
                offset: flank + offset,
                base: kmer[offset] as char,
            }),
        }
    }

    fn neutral_score(&self) -> f64 {
        self.table.neutral_weight()
    }
}
