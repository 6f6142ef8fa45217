//! Genomic primitives consumed by the cleavage, bias and prediction layers.
//!
//! Intervals, aligned reads and variant sites are plain values handed over by
//! external collaborators; the htslib adapters in this module are thin
//! translations from BAM/FASTA records into those values.

pub mod dna;
mod interval;
mod io;
mod sequence;
mod types;
mod variant;

pub use interval::{GenomicInterval, IntervalError, Strand};
pub use io::{BamAlignmentSource, FastaSequenceSource};
pub use sequence::{InMemoryGenome, SequenceError, SequenceSource};
pub use types::{AlignedRead, CigarOp, CigarOpKind, MalformedRecordError};
pub use variant::{VariantError, VariantSite};
