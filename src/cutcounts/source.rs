use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::genomics::{AlignedRead, MalformedRecordError};

/// Errors raised while counting cleavages.
#[derive(Debug, Error)]
pub enum CountError {
    /// The queried contig is absent from the alignment index.
    #[error("contig '{chrom}' not present in alignment index")]
    OutOfRange {
        /// Requested contig.
        chrom: String,
    },
    /// A record could not be translated to reference coordinates.
    #[error("malformed alignment record: {0}")]
    MalformedRecord(#[from] MalformedRecordError),
    /// Error reported by htslib while reading the alignment file.
    #[error("htslib error: {0}")]
    Htslib(#[from] rust_htslib::errors::Error),
}

/// Indexed alignment provider queried by genomic range.
///
/// Implementations are not required to be thread-safe; region-parallel
/// callers open one source per worker.
pub trait AlignmentSource {
    /// Reads whose aligned span overlaps `[start, end)` on `chrom`.
    fn fetch(&mut self, chrom: &str, start: u32, end: u32) -> Result<Vec<AlignedRead>, CountError>;
}

impl<A: AlignmentSource + ?Sized> AlignmentSource for &mut A {
    fn fetch(&mut self, chrom: &str, start: u32, end: u32) -> Result<Vec<AlignedRead>, CountError> {
        (**self).fetch(chrom, start, end)
    }
}

/// Alignment source backed by reads held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAlignments {
    contigs: HashMap<Arc<str>, Vec<AlignedRead>>,
}

impl InMemoryAlignments {
    /// Create a source with no contigs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a contig without reads.
    pub fn with_contig(mut self, chrom: impl Into<Arc<str>>) -> Self {
        self.contigs.entry(chrom.into()).or_default();
        self
    }

    /// Build a source from reads; contigs are registered as they appear.
    pub fn from_reads(reads: impl IntoIterator<Item = AlignedRead>) -> Self {
        let mut source = Self::new();
        for read in reads {
            source.push(read);
        }
        source
    }

    /// Add a read to its contig.
    pub fn push(&mut self, read: AlignedRead) {
        self.contigs
            .entry(Arc::clone(&read.chrom))
            .or_default()
            .push(read);
    }

    /// Total number of stored reads.
    pub fn len(&self) -> usize {
        self.contigs.values().map(Vec::len).sum()
    }

    /// Returns `true` when no reads are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AlignmentSource for InMemoryAlignments {
    fn fetch(&mut self, chrom: &str, start: u32, end: u32) -> Result<Vec<AlignedRead>, CountError> {
        let reads = self
            .contigs
            .get(chrom)
            .ok_or_else(|| CountError::OutOfRange {
                chrom: chrom.to_string(),
            })?;

        let mut overlapping = Vec::new();
        for read in reads {
            let read_end = read.reference_end()?;
            if read.pos < end && read_end > start {
                overlapping.push(read.clone());
            }
        }
        Ok(overlapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_returns_overlapping_reads_only() {
        let mut source = InMemoryAlignments::from_reads(vec![
            AlignedRead::contiguous("chr1", 0, b"ACGT", false),
            AlignedRead::contiguous("chr1", 8, b"ACGT", false),
            AlignedRead::contiguous("chr1", 20, b"ACGT", true),
        ]);
        let reads = source.fetch("chr1", 3, 10).unwrap();
        assert_eq!(reads.iter().map(|r| r.pos).collect::<Vec<_>>(), vec![0, 8]);
    }

    #[test]
    fn unknown_contig_is_out_of_range() {
        let mut source = InMemoryAlignments::new().with_contig("chr1");
        assert!(source.fetch("chr1", 0, 10).unwrap().is_empty());
        assert!(matches!(
            source.fetch("chrX", 0, 10),
            Err(CountError::OutOfRange { .. })
        ));
    }
}
