use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use rust_htslib::bam::{self, record::Cigar, Read};
use rust_htslib::faidx;

use super::sequence::{padded_slice, SequenceError, SequenceSource};
use super::types::{AlignedRead, CigarOp, CigarOpKind, MalformedRecordError};
use crate::cutcounts::{AlignmentSource, CountError};

/// Alignment source reading an indexed BAM/CRAM file through htslib.
///
/// One handle must not be shared between threads; open one per worker.
pub struct BamAlignmentSource {
    reader: bam::IndexedReader,
}

impl std::fmt::Debug for BamAlignmentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BamAlignmentSource").finish_non_exhaustive()
    }
}

impl BamAlignmentSource {
    /// Open an indexed alignment file (the `.bai`/`.csi` must sit beside it).
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CountError> {
        let reader = bam::IndexedReader::from_path(path)?;
        Ok(Self { reader })
    }
}

impl AlignmentSource for BamAlignmentSource {
    fn fetch(&mut self, chrom: &str, start: u32, end: u32) -> Result<Vec<AlignedRead>, CountError> {
        let tid = self
            .reader
            .header()
            .tid(chrom.as_bytes())
            .ok_or_else(|| CountError::OutOfRange {
                chrom: chrom.to_string(),
            })?;
        self.reader.fetch((tid, start as i64, end as i64))?;

        let chrom: Arc<str> = Arc::from(chrom);
        let mut reads = Vec::new();
        for result in self.reader.records() {
            let record = result?;
            if record.is_unmapped() {
                continue;
            }
            reads.push(convert_record(&record, &chrom)?);
        }
        Ok(reads)
    }
}

fn convert_record(record: &bam::Record, chrom: &Arc<str>) -> Result<AlignedRead, MalformedRecordError> {
    let pos = u32::try_from(record.pos()).map_err(|_| MalformedRecordError::InvalidPosition {
        chrom: Arc::clone(chrom),
        pos: record.pos(),
    })?;

    let cigar = record
        .cigar()
        .iter()
        .map(|op| match *op {
            Cigar::Match(len) => CigarOp::new(CigarOpKind::Match, len),
            Cigar::Ins(len) => CigarOp::new(CigarOpKind::Insertion, len),
            Cigar::Del(len) => CigarOp::new(CigarOpKind::Deletion, len),
            Cigar::RefSkip(len) => CigarOp::new(CigarOpKind::RefSkip, len),
            Cigar::SoftClip(len) => CigarOp::new(CigarOpKind::SoftClip, len),
            Cigar::HardClip(len) => CigarOp::new(CigarOpKind::HardClip, len),
            Cigar::Pad(len) => CigarOp::new(CigarOpKind::Padding, len),
            Cigar::Equal(len) => CigarOp::new(CigarOpKind::SequenceMatch, len),
            Cigar::Diff(len) => CigarOp::new(CigarOpKind::SequenceMismatch, len),
        })
        .collect();

    let read = AlignedRead::new(
        Arc::clone(chrom),
        pos,
        record.mapq(),
        cigar,
        record.seq().as_bytes(),
        record.is_reverse(),
    )
    .with_duplicate(record.is_duplicate())
    .with_qcfail(record.is_quality_check_failed());

    read.reference_span()?;
    Ok(read)
}

/// Reference sequence source reading a faidx-indexed FASTA through htslib.
pub struct FastaSequenceSource {
    reader: faidx::Reader,
    lengths: HashMap<String, u64>,
}

impl std::fmt::Debug for FastaSequenceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastaSequenceSource")
            .field("contigs", &self.lengths.len())
            .finish_non_exhaustive()
    }
}

impl FastaSequenceSource {
    /// Open a FASTA file; the `.fai` index must sit beside it.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SequenceError> {
        let reader = faidx::Reader::from_path(path)?;
        let mut lengths = HashMap::new();
        for idx in 0..reader.n_seqs() {
            let name = reader.seq_name(idx as i32)?;
            let len = reader.fetch_seq_len(&name);
            lengths.insert(name, len);
        }
        Ok(Self { reader, lengths })
    }
}

impl SequenceSource for FastaSequenceSource {
    fn fetch(&mut self, chrom: &str, start: i64, end: i64) -> Result<Vec<u8>, SequenceError> {
        let contig_len = *self
            .lengths
            .get(chrom)
            .ok_or_else(|| SequenceError::OutOfRange {
                chrom: chrom.to_string(),
            })? as i64;

        let lo = start.max(0);
        let hi = end.min(contig_len);
        if lo >= hi {
            return Ok(padded_slice(&[], start, end));
        }

        // faidx coordinates are 0-based with an inclusive end
        let bases = self
            .reader
            .fetch_seq_string(chrom, lo as usize, (hi - 1) as usize)?
            .into_bytes()
            .to_ascii_uppercase();

        let mut out = vec![b'N'; (end - start) as usize];
        let dst = (lo - start) as usize;
        let n = bases.len().min(out.len() - dst);
        out[dst..dst + n].copy_from_slice(&bases[..n]);
        Ok(out)
    }
}
