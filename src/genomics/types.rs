use std::sync::Arc;

use thiserror::Error;

/// CIGAR operation kinds describing how a read aligns to the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CigarOpKind {
    /// Consuming match/mismatch (`M`).
    Match,
    /// Insertion relative to the reference (`I`).
    Insertion,
    /// Deletion relative to the reference (`D`).
    Deletion,
    /// Skipped reference region, e.g. an intron (`N`).
    RefSkip,
    /// Soft clipping (sequence present in read only).
    SoftClip,
    /// Hard clipping (trimmed sequence not present in read).
    HardClip,
    /// Silent padding (`P`).
    Padding,
    /// Sequence match (`=`).
    SequenceMatch,
    /// Sequence mismatch (`X`).
    SequenceMismatch,
}

impl CigarOpKind {
    /// Whether the operation advances along the reference.
    pub fn consumes_reference(self) -> bool {
        matches!(
            self,
            CigarOpKind::Match
                | CigarOpKind::Deletion
                | CigarOpKind::RefSkip
                | CigarOpKind::SequenceMatch
                | CigarOpKind::SequenceMismatch
        )
    }

    /// Whether the operation advances along the stored read sequence.
    pub fn consumes_query(self) -> bool {
        matches!(
            self,
            CigarOpKind::Match
                | CigarOpKind::Insertion
                | CigarOpKind::SoftClip
                | CigarOpKind::SequenceMatch
                | CigarOpKind::SequenceMismatch
        )
    }

    fn aligns_bases(self) -> bool {
        self.consumes_reference() && self.consumes_query()
    }
}

/// CIGAR operation with length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CigarOp {
    /// Operation kind.
    pub kind: CigarOpKind,
    /// Number of bases affected by the operation.
    pub len: u32,
}

impl CigarOp {
    /// Construct a new CIGAR operation.
    pub fn new(kind: CigarOpKind, len: u32) -> Self {
        Self { kind, len }
    }
}

/// A record whose position or CIGAR cannot be translated to reference
/// coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedRecordError {
    /// The alignment carries no CIGAR operations.
    #[error("read at {chrom}:{pos} has an empty CIGAR")]
    EmptyCigar {
        /// Contig of the offending record.
        chrom: Arc<str>,
        /// Reported leftmost position.
        pos: u32,
    },
    /// The CIGAR never advances along the reference.
    #[error("read at {chrom}:{pos} aligns no reference bases")]
    NoReferenceSpan {
        /// Contig of the offending record.
        chrom: Arc<str>,
        /// Reported leftmost position.
        pos: u32,
    },
    /// The CIGAR and the stored sequence disagree on the read length.
    #[error("read at {chrom}:{pos}: CIGAR consumes {cigar_len} query bases but sequence has {seq_len}")]
    QueryLengthMismatch {
        /// Contig of the offending record.
        chrom: Arc<str>,
        /// Reported leftmost position.
        pos: u32,
        /// Query bases implied by the CIGAR.
        cigar_len: u32,
        /// Bases actually stored.
        seq_len: usize,
    },
    /// The reported position is negative or overflows 32-bit coordinates.
    #[error("read on {chrom} has unrepresentable position {pos}")]
    InvalidPosition {
        /// Contig of the offending record.
        chrom: Arc<str>,
        /// Position as reported by the alignment source.
        pos: i64,
    },
}

/// Aligned read as handed over by an alignment source.
#[derive(Debug, Clone)]
pub struct AlignedRead {
    /// Reference contig/chromosome name.
    pub chrom: Arc<str>,
    /// 0-based leftmost reference coordinate.
    pub pos: u32,
    /// Mapping quality (Phred-scaled).
    pub mapq: u8,
    /// CIGAR describing the alignment.
    pub cigar: Vec<CigarOp>,
    /// Read sequence stored as uppercase ASCII (may be empty when absent).
    pub sequence: Arc<[u8]>,
    /// Whether the read maps to the reverse complement strand.
    pub is_reverse: bool,
    /// Whether the source flagged the record as a PCR/optical duplicate.
    pub is_duplicate: bool,
    /// Whether the record failed platform/vendor quality checks.
    pub is_qcfail: bool,
}

impl AlignedRead {
    /// Construct a new aligned read wrapper.
    pub fn new(
        chrom: impl Into<Arc<str>>,
        pos: u32,
        mapq: u8,
        cigar: Vec<CigarOp>,
        sequence: impl Into<Arc<[u8]>>,
        is_reverse: bool,
    ) -> Self {
        Self {
            chrom: chrom.into(),
            pos,
            mapq,
            cigar,
            sequence: sequence.into(),
            is_reverse,
            is_duplicate: false,
            is_qcfail: false,
        }
    }

    /// Ungapped read whose CIGAR is a single match over the whole sequence.
    pub fn contiguous(
        chrom: impl Into<Arc<str>>,
        pos: u32,
        sequence: &[u8],
        is_reverse: bool,
    ) -> Self {
        let cigar = vec![CigarOp::new(CigarOpKind::Match, sequence.len() as u32)];
        Self::new(chrom, pos, 60, cigar, sequence.to_vec(), is_reverse)
    }

    /// Set the mapping quality.
    pub fn with_mapq(mut self, mapq: u8) -> Self {
        self.mapq = mapq;
        self
    }

    /// Mark the record as a duplicate.
    pub fn with_duplicate(mut self, flag: bool) -> Self {
        self.is_duplicate = flag;
        self
    }

    /// Mark the record as QC-failed.
    pub fn with_qcfail(mut self, flag: bool) -> Self {
        self.is_qcfail = flag;
        self
    }

    /// Read length inferred from the sequence.
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// Returns `true` when no sequence is stored.
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Mapping quality associated with the alignment.
    pub fn mapq(&self) -> u8 {
        self.mapq
    }

    /// Number of reference bases covered by the alignment.
    pub fn reference_span(&self) -> Result<u32, MalformedRecordError> {
        if self.cigar.is_empty() {
            return Err(MalformedRecordError::EmptyCigar {
                chrom: Arc::clone(&self.chrom),
                pos: self.pos,
            });
        }

        let mut span = 0u32;
        let mut query = 0u32;
        for op in &self.cigar {
            if op.kind.consumes_reference() {
                span = span.saturating_add(op.len);
            }
            if op.kind.consumes_query() {
                query = query.saturating_add(op.len);
            }
        }

        if span == 0 {
            return Err(MalformedRecordError::NoReferenceSpan {
                chrom: Arc::clone(&self.chrom),
                pos: self.pos,
            });
        }
        if !self.sequence.is_empty() && query as usize != self.sequence.len() {
            return Err(MalformedRecordError::QueryLengthMismatch {
                chrom: Arc::clone(&self.chrom),
                pos: self.pos,
                cigar_len: query,
                seq_len: self.sequence.len(),
            });
        }
        Ok(span)
    }

    /// End position (half-open) on the reference.
    pub fn reference_end(&self) -> Result<u32, MalformedRecordError> {
        let span = self.reference_span()?;
        self.pos
            .checked_add(span)
            .ok_or_else(|| MalformedRecordError::InvalidPosition {
                chrom: Arc::clone(&self.chrom),
                pos: self.pos as i64 + span as i64,
            })
    }

    /// Read bases aligned to reference positions `[ref_pos, ref_pos + len)`.
    ///
    /// Returns `Ok(None)` when any of those positions is not covered by an
    /// aligned base (outside the read, deleted, skipped) or no sequence is
    /// stored.
    pub fn bases_at(&self, ref_pos: u32, len: usize) -> Result<Option<Vec<u8>>, MalformedRecordError> {
        self.reference_span()?;
        if self.sequence.is_empty() || len == 0 {
            return Ok(None);
        }

        let mut out = Vec::with_capacity(len);
        let mut ref_cursor = self.pos;
        let mut query_cursor = 0usize;
        let mut wanted = ref_pos;
        let last = ref_pos as u64 + len as u64;

        for op in &self.cigar {
            if wanted as u64 >= last {
                break;
            }
            let op_len = op.len;
            if op.kind.aligns_bases() {
                let op_end = ref_cursor as u64 + op_len as u64;
                while (wanted as u64) < last && (wanted as u64) < op_end {
                    if wanted < ref_cursor {
                        return Ok(None);
                    }
                    let offset = query_cursor + (wanted - ref_cursor) as usize;
                    match self.sequence.get(offset) {
                        Some(base) => out.push(base.to_ascii_uppercase()),
                        None => return Ok(None),
                    }
                    wanted += 1;
                }
            } else if op.kind.consumes_reference() {
                let op_end = ref_cursor as u64 + op_len as u64;
                if (wanted as u64) < op_end && wanted >= ref_cursor {
                    return Ok(None);
                }
            }

            if op.kind.consumes_reference() {
                ref_cursor = ref_cursor.saturating_add(op_len);
            }
            if op.kind.consumes_query() {
                query_cursor += op_len as usize;
            }
        }

        if out.len() == len {
            Ok(Some(out))
        } else {
            Ok(None)
        }
    }
}
