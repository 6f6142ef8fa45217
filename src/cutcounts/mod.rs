//! Translation of aligned reads into strand-resolved cleavage counts.
//!
//! A read's 5′ end marks the phosphodiester bond that was cut. Plus-strand
//! reads contribute at their leftmost aligned base, minus-strand reads at
//! their rightmost aligned base (with the default [`CutOffsets`]). Counts are
//! indexed per base of the queried interval; [`CleavageCounts::merged`]
//! applies the one-base strand shift that aligns both strands on the same
//! bond.

mod counter;
mod counts;
mod source;

pub use counter::{CleavageCounter, CounterConfig, CutOffsets};
pub use counts::{AlleleCounts, CleavageCounts};
pub use source::{AlignmentSource, CountError, InMemoryAlignments};
