use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{AlignmentSource, AlleleCounts, CleavageCounts, CountError};
use crate::genomics::{AlignedRead, GenomicInterval, VariantSite};

/// Shifts applied to read ends to locate the cut bond.
///
/// The plus offset is added to the leftmost aligned position of forward
/// reads; the minus offset is added to the exclusive reference end of
/// reverse reads. The DNase I default `(0, -1)` places both at the read's
/// 5′-most aligned base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CutOffsets {
    /// Offset applied to forward-strand reads.
    pub plus: i32,
    /// Offset applied to reverse-strand reads.
    pub minus: i32,
}

impl CutOffsets {
    /// Build an offset pair.
    pub fn new(plus: i32, minus: i32) -> Self {
        Self { plus, minus }
    }

    /// Tn5 insertion shift used for ATAC-seq libraries.
    pub fn tn5() -> Self {
        Self { plus: 4, minus: -5 }
    }

    /// Extra bases to fetch on each side so shifted cuts are not missed.
    fn fetch_padding(&self) -> u32 {
        self.plus.unsigned_abs().max(self.minus.unsigned_abs()) + 1
    }
}

impl Default for CutOffsets {
    fn default() -> Self {
        Self { plus: 0, minus: -1 }
    }
}

/// Read filtering and cut-site translation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    /// Reads with a lower mapping quality are ignored.
    pub min_mapq: u8,
    /// Drop reads flagged as duplicates and collapse reads sharing a
    /// `(start, end, strand)` signature.
    pub remove_dups: bool,
    /// Ignore reads flagged as QC failures.
    pub remove_qcfail: bool,
    /// Read-end to cut-site offsets.
    pub offsets: CutOffsets,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            min_mapq: 1,
            remove_dups: false,
            remove_qcfail: true,
            offsets: CutOffsets::default(),
        }
    }
}

impl CounterConfig {
    /// Set the minimum mapping quality.
    pub fn with_min_mapq(mut self, min_mapq: u8) -> Self {
        self.min_mapq = min_mapq;
        self
    }

    /// Enable or disable duplicate removal.
    pub fn with_remove_dups(mut self, enabled: bool) -> Self {
        self.remove_dups = enabled;
        self
    }

    /// Enable or disable the QC-fail filter.
    pub fn with_remove_qcfail(mut self, enabled: bool) -> Self {
        self.remove_qcfail = enabled;
        self
    }

    /// Set the cut-site offsets.
    pub fn with_offsets(mut self, offsets: CutOffsets) -> Self {
        self.offsets = offsets;
        self
    }
}

/// Stateless translator from alignments to cleavage counts.
#[derive(Debug, Clone, Default)]
pub struct CleavageCounter {
    config: CounterConfig,
}

impl CleavageCounter {
    /// Create a counter with the given configuration.
    pub fn new(config: CounterConfig) -> Self {
        Self { config }
    }

    /// Active configuration.
    pub fn config(&self) -> &CounterConfig {
        &self.config
    }

    /// Strand-resolved cleavage counts over `interval`.
    pub fn query<A>(&self, source: &mut A, interval: &GenomicInterval) -> Result<CleavageCounts, CountError>
    where
        A: AlignmentSource + ?Sized,
    {
        let mut counts = CleavageCounts::zeros(interval.clone());
        let reads = self.passing_reads(source, interval)?;
        let mut recorded = 0usize;
        for read in &reads {
            if counts.record(self.cut_site(read)?, read.is_reverse) {
                recorded += 1;
            }
        }
        trace!(%interval, reads = reads.len(), recorded, "counted cleavages");
        Ok(counts)
    }

    /// Cleavage counts over `interval` split by the allele each read
    /// carries at `variant`.
    ///
    /// Reads whose alignment does not reach the variant position are
    /// skipped. Reads that reach it but carry neither allele, including
    /// reads with a deletion or read end inside the allele, are tallied as
    /// dropped.
    pub fn query_allele_resolved<A>(
        &self,
        source: &mut A,
        interval: &GenomicInterval,
        variant: &VariantSite,
    ) -> Result<AlleleCounts, CountError>
    where
        A: AlignmentSource + ?Sized,
    {
        let mut counts = AlleleCounts::new(variant.clone(), interval.clone());
        if variant.chrom() != interval.chrom() {
            return Ok(counts);
        }

        let ref_allele = variant.ref_allele().as_bytes();
        let alt_allele = variant.alt_allele().as_bytes();
        for read in self.passing_reads(source, interval)? {
            let read_end = read.reference_end()?;
            if variant.pos() < read.pos || variant.pos() >= read_end {
                continue;
            }
            let cut = self.cut_site(&read)?;
            match read.bases_at(variant.pos(), variant.allele_len())? {
                Some(bases) if bases == ref_allele => {
                    counts.reference_mut().record(cut, read.is_reverse);
                }
                Some(bases) if bases == alt_allele => {
                    counts.alternate_mut().record(cut, read.is_reverse);
                }
                _ => counts.mark_dropped(),
            }
        }
        trace!(%interval, %variant, dropped = counts.dropped(), "allele-resolved cleavages");
        Ok(counts)
    }

    /// Genomic coordinate of the base at which `read` records its cut.
    pub fn cut_site(&self, read: &AlignedRead) -> Result<i64, CountError> {
        let offsets = self.config.offsets;
        Ok(if read.is_reverse {
            read.reference_end()? as i64 + offsets.minus as i64
        } else {
            read.pos as i64 + offsets.plus as i64
        })
    }

    fn passing_reads<A>(&self, source: &mut A, interval: &GenomicInterval) -> Result<Vec<AlignedRead>, CountError>
    where
        A: AlignmentSource + ?Sized,
    {
        let pad = self.config.offsets.fetch_padding();
        let fetch_start = interval.start().saturating_sub(pad);
        let fetch_end = interval.end().saturating_add(pad);
        let fetched = source.fetch(interval.chrom(), fetch_start, fetch_end)?;

        let mut signatures = HashSet::new();
        let mut kept = Vec::with_capacity(fetched.len());
        for read in fetched {
            if read.mapq < self.config.min_mapq {
                continue;
            }
            if self.config.remove_qcfail && read.is_qcfail {
                continue;
            }
            if self.config.remove_dups && read.is_duplicate {
                continue;
            }
            let read_end = read.reference_end()?;
            if self.config.remove_dups && !signatures.insert((read.pos, read_end, read.is_reverse)) {
                continue;
            }
            kept.push(read);
        }
        Ok(kept)
    }
}
