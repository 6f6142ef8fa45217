use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Strand annotation of an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Strand {
    /// Forward (`+`) strand.
    #[serde(rename = "+")]
    Forward,
    /// Reverse (`-`) strand.
    #[serde(rename = "-")]
    Reverse,
    /// No strand information (`.`).
    #[default]
    #[serde(rename = ".")]
    Unstranded,
}

impl Strand {
    /// Single-character representation used in BED files.
    pub fn symbol(self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
            Strand::Unstranded => '.',
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for Strand {
    type Err = IntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" => Ok(Strand::Forward),
            "-" => Ok(Strand::Reverse),
            "." | "" => Ok(Strand::Unstranded),
            other => Err(IntervalError::InvalidStrand(other.to_string())),
        }
    }
}

/// Errors raised while constructing intervals.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntervalError {
    /// End coordinate lies before the start coordinate.
    #[error("interval {chrom}:{start}-{end} ends before it starts")]
    Inverted {
        /// Contig name.
        chrom: String,
        /// Requested start.
        start: u32,
        /// Requested end.
        end: u32,
    },
    /// Unknown strand symbol.
    #[error("invalid strand '{0}'")]
    InvalidStrand(String),
}

/// Immutable genomic interval, 0-based and half-open.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenomicInterval {
    chrom: Arc<str>,
    start: u32,
    end: u32,
    strand: Strand,
}

impl GenomicInterval {
    /// Create an unstranded interval.
    ///
    /// # Panics
    /// Panics if `end < start`; use [`GenomicInterval::try_new`] for
    /// untrusted coordinates.
    pub fn new(chrom: impl Into<Arc<str>>, start: u32, end: u32) -> Self {
        let chrom = chrom.into();
        assert!(
            end >= start,
            "interval {}:{}-{} ends before it starts",
            chrom,
            start,
            end
        );
        Self {
            chrom,
            start,
            end,
            strand: Strand::Unstranded,
        }
    }

    /// Create an unstranded interval, rejecting inverted coordinates.
    pub fn try_new(chrom: impl Into<Arc<str>>, start: u32, end: u32) -> Result<Self, IntervalError> {
        let chrom = chrom.into();
        if end < start {
            return Err(IntervalError::Inverted {
                chrom: chrom.to_string(),
                start,
                end,
            });
        }
        Ok(Self {
            chrom,
            start,
            end,
            strand: Strand::Unstranded,
        })
    }

    /// Copy of this interval carrying the given strand.
    pub fn with_strand(&self, strand: Strand) -> Self {
        Self {
            strand,
            ..self.clone()
        }
    }

    /// Contig name.
    pub fn chrom(&self) -> &str {
        &self.chrom
    }

    /// Shared handle to the contig name.
    pub fn chrom_arc(&self) -> Arc<str> {
        Arc::clone(&self.chrom)
    }

    /// 0-based inclusive start.
    pub fn start(&self) -> u32 {
        self.start
    }

    /// 0-based exclusive end.
    pub fn end(&self) -> u32 {
        self.end
    }

    /// Strand annotation.
    pub fn strand(&self) -> Strand {
        self.strand
    }

    /// Number of bases covered.
    pub fn len(&self) -> usize {
        (self.end - self.start) as usize
    }

    /// Returns `true` for zero-length intervals.
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// Whether `pos` lies inside `[start, end)`.
    pub fn contains(&self, pos: u32) -> bool {
        pos >= self.start && pos < self.end
    }

    /// Whether `other` lies entirely inside this interval on the same contig.
    pub fn contains_interval(&self, other: &GenomicInterval) -> bool {
        self.chrom == other.chrom && other.start >= self.start && other.end <= self.end
    }

    /// Whether the two intervals share at least one base.
    pub fn overlaps(&self, other: &GenomicInterval) -> bool {
        self.chrom == other.chrom && self.start < other.end && other.start < self.end
    }

    /// Interval grown by `left` and `right` bases; the start saturates at 0.
    pub fn widened(&self, left: u32, right: u32) -> Self {
        Self {
            chrom: Arc::clone(&self.chrom),
            start: self.start.saturating_sub(left),
            end: self.end.saturating_add(right),
            strand: self.strand,
        }
    }
}

impl fmt::Display for GenomicInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chrom, self.start, self.end)
    }
}
