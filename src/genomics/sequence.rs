use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

/// Errors raised by reference sequence sources.
#[derive(Debug, Error)]
pub enum SequenceError {
    /// Contig absent from the reference index.
    #[error("contig '{chrom}' not present in reference")]
    OutOfRange {
        /// Requested contig.
        chrom: String,
    },
    /// Error reported by htslib while reading the FASTA index.
    #[error("htslib error: {0}")]
    Htslib(#[from] rust_htslib::errors::Error),
}

/// Random-access reference sequence provider.
pub trait SequenceSource {
    /// Fetch bases `[start, end)` of `chrom` as upper-case ASCII.
    ///
    /// The result always has `end - start` bases; positions before 0 or past
    /// the contig end are filled with `N`.
    fn fetch(&mut self, chrom: &str, start: i64, end: i64) -> Result<Vec<u8>, SequenceError>;
}

impl<S: SequenceSource + ?Sized> SequenceSource for &mut S {
    fn fetch(&mut self, chrom: &str, start: i64, end: i64) -> Result<Vec<u8>, SequenceError> {
        (**self).fetch(chrom, start, end)
    }
}

/// Reference genome held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGenome {
    contigs: HashMap<Arc<str>, Arc<[u8]>>,
}

impl InMemoryGenome {
    /// Create an empty genome.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a contig.
    pub fn insert(&mut self, chrom: impl Into<Arc<str>>, sequence: &[u8]) {
        self.contigs
            .insert(chrom.into(), Arc::from(sequence.to_ascii_uppercase()));
    }

    /// Builder-style variant of [`InMemoryGenome::insert`].
    pub fn with_contig(mut self, chrom: impl Into<Arc<str>>, sequence: &[u8]) -> Self {
        self.insert(chrom, sequence);
        self
    }

    /// Length of a contig, if present.
    pub fn contig_len(&self, chrom: &str) -> Option<usize> {
        self.contigs.get(chrom).map(|seq| seq.len())
    }
}

impl SequenceSource for InMemoryGenome {
    fn fetch(&mut self, chrom: &str, start: i64, end: i64) -> Result<Vec<u8>, SequenceError> {
        let contig = self
            .contigs
            .get(chrom)
            .ok_or_else(|| SequenceError::OutOfRange {
                chrom: chrom.to_string(),
            })?;
        Ok(padded_slice(contig, start, end))
    }
}

/// Copy `[start, end)` out of `contig`, padding with `N` outside its bounds.
pub(crate) fn padded_slice(contig: &[u8], start: i64, end: i64) -> Vec<u8> {
    if end <= start {
        return Vec::new();
    }
    let mut out = vec![b'N'; (end - start) as usize];
    let lo = start.max(0);
    let hi = end.min(contig.len() as i64);
    if lo < hi {
        let dst = (lo - start) as usize;
        out[dst..dst + (hi - lo) as usize].copy_from_slice(&contig[lo as usize..hi as usize]);
    }
    out
}
