use crate::genomics::{GenomicInterval, VariantSite};

/// Per-base cleavage counts for both strands of one interval.
///
/// Index `i` of either strand vector corresponds to genomic base
/// `interval.start() + i`. Plus-strand cuts are recorded at the first base
/// downstream of the cut bond, minus-strand cuts at the last base upstream
/// of it, so the two vectors are offset by one position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleavageCounts {
    interval: GenomicInterval,
    plus: Vec<u32>,
    minus: Vec<u32>,
}

impl CleavageCounts {
    /// All-zero counts covering `interval`.
    pub fn zeros(interval: GenomicInterval) -> Self {
        let len = interval.len();
        Self {
            interval,
            plus: vec![0; len],
            minus: vec![0; len],
        }
    }

    /// Assemble counts from raw vectors.
    ///
    /// # Panics
    /// Panics if either vector's length differs from the interval length.
    pub fn from_parts(interval: GenomicInterval, plus: Vec<u32>, minus: Vec<u32>) -> Self {
        assert_eq!(plus.len(), interval.len(), "plus-strand length mismatch");
        assert_eq!(minus.len(), interval.len(), "minus-strand length mismatch");
        Self {
            interval,
            plus,
            minus,
        }
    }

    /// Queried interval.
    pub fn interval(&self) -> &GenomicInterval {
        &self.interval
    }

    /// Plus-strand counts.
    pub fn plus(&self) -> &[u32] {
        &self.plus
    }

    /// Minus-strand counts.
    pub fn minus(&self) -> &[u32] {
        &self.minus
    }

    /// Number of positions per strand.
    pub fn len(&self) -> usize {
        self.plus.len()
    }

    /// Returns `true` for an empty interval.
    pub fn is_empty(&self) -> bool {
        self.plus.is_empty()
    }

    /// Total cuts across both strands.
    pub fn total(&self) -> u64 {
        self.plus
            .iter()
            .chain(self.minus.iter())
            .map(|&c| c as u64)
            .sum()
    }

    /// Bond-aligned sum of both strands: `plus[i + 1] + minus[i]`.
    ///
    /// Element `i` counts cuts at the bond between bases `start + i` and
    /// `start + i + 1`, so the result has `len() - 1` elements. Query an
    /// interval widened by one base on the right to obtain one value per
    /// base of the original interval.
    pub fn merged(&self) -> Vec<u32> {
        if self.plus.is_empty() {
            return Vec::new();
        }
        self.plus[1..]
            .iter()
            .zip(&self.minus[..self.minus.len() - 1])
            .map(|(&p, &m)| p + m)
            .collect()
    }

    pub(crate) fn record(&mut self, cut: i64, is_reverse: bool) -> bool {
        let offset = cut - self.interval.start() as i64;
        if offset < 0 || offset >= self.plus.len() as i64 {
            return false;
        }
        let slot = if is_reverse {
            &mut self.minus[offset as usize]
        } else {
            &mut self.plus[offset as usize]
        };
        *slot += 1;
        true
    }
}

/// Cleavage counts split by the allele each read carries at a variant.
///
/// The key set is fixed to the variant's reference and alternate allele.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlleleCounts {
    variant: VariantSite,
    reference: CleavageCounts,
    alternate: CleavageCounts,
    dropped: u32,
}

impl AlleleCounts {
    pub(crate) fn new(variant: VariantSite, interval: GenomicInterval) -> Self {
        Self {
            variant,
            reference: CleavageCounts::zeros(interval.clone()),
            alternate: CleavageCounts::zeros(interval),
            dropped: 0,
        }
    }

    pub(crate) fn reference_mut(&mut self) -> &mut CleavageCounts {
        &mut self.reference
    }

    pub(crate) fn alternate_mut(&mut self) -> &mut CleavageCounts {
        &mut self.alternate
    }

    pub(crate) fn mark_dropped(&mut self) {
        self.dropped += 1;
    }

    /// Variant the reads were classified against.
    pub fn variant(&self) -> &VariantSite {
        &self.variant
    }

    /// Counts from reads carrying the reference allele.
    pub fn reference(&self) -> &CleavageCounts {
        &self.reference
    }

    /// Counts from reads carrying the alternate allele.
    pub fn alternate(&self) -> &CleavageCounts {
        &self.alternate
    }

    /// Reads covering the variant that matched neither allele.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Look up counts by allele string (case-insensitive).
    pub fn get(&self, allele: &str) -> Option<&CleavageCounts> {
        if allele.eq_ignore_ascii_case(self.variant.ref_allele()) {
            Some(&self.reference)
        } else if allele.eq_ignore_ascii_case(self.variant.alt_allele()) {
            Some(&self.alternate)
        } else {
            None
        }
    }

    /// `(allele, counts)` pairs, reference first.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CleavageCounts)> {
        [
            (self.variant.ref_allele(), &self.reference),
            (self.variant.alt_allele(), &self.alternate),
        ]
        .into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_shifts_plus_strand_by_one() {
        let interval = GenomicInterval::new("chr1", 10, 14);
        let counts = CleavageCounts::from_parts(interval, vec![1, 2, 3, 4], vec![10, 20, 30, 40]);
        assert_eq!(counts.merged(), vec![12, 23, 34]);
        assert_eq!(counts.total(), 110);
    }

    #[test]
    fn record_ignores_cuts_outside_interval() {
        let mut counts = CleavageCounts::zeros(GenomicInterval::new("chr1", 10, 12));
        assert!(!counts.record(9, false));
        assert!(!counts.record(12, true));
        assert!(counts.record(11, true));
        assert_eq!(counts.minus(), &[0, 1]);
    }

    #[test]
    fn allele_lookup_has_fixed_keys() {
        let variant = VariantSite::new("chr1", 11, "A", "G").unwrap();
        let counts = AlleleCounts::new(variant, GenomicInterval::new("chr1", 10, 12));
        assert!(counts.get("a").is_some());
        assert!(counts.get("G").is_some());
        assert!(counts.get("T").is_none());
        assert_eq!(counts.iter().map(|(a, _)| a).collect::<Vec<_>>(), vec!["A", "G"]);
    }
}
