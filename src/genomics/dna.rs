//! Nucleotide encoding helpers shared by the bias model and allele matching.

/// Number of canonical bases (A, C, G, T).
pub const NUM_BASES: usize = 4;

/// Map a nucleotide to its 2-bit code (A=0, C=1, G=2, T=3).
pub fn base_index(base: u8) -> Option<usize> {
    match base {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' => Some(3),
        _ => None,
    }
}

/// Inverse of [`base_index`].
pub fn index_base(code: usize) -> u8 {
    match code & 0b11 {
        0 => b'A',
        1 => b'C',
        2 => b'G',
        _ => b'T',
    }
}

/// Watson-Crick complement; anything that is not ACGT becomes `N`.
pub fn complement(base: u8) -> u8 {
    match base {
        b'A' | b'a' => b'T',
        b'C' | b'c' => b'G',
        b'G' | b'g' => b'C',
        b'T' | b't' => b'A',
        _ => b'N',
    }
}

/// Reverse complement of a sequence.
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&b| complement(b)).collect()
}

/// Pack a k-mer into its dense table index, most significant base first.
///
/// Returns the offset of the first ambiguous base on failure.
pub fn kmer_index(kmer: &[u8]) -> Result<usize, usize> {
    let mut index = 0usize;
    for (offset, &base) in kmer.iter().enumerate() {
        let code = base_index(base).ok_or(offset)?;
        index = (index << 2) | code;
    }
    Ok(index)
}

/// Index of the reverse complement of `kmer` without allocating.
pub fn reverse_complement_index(kmer: &[u8]) -> Result<usize, usize> {
    let mut index = 0usize;
    for (offset, &base) in kmer.iter().enumerate().rev() {
        let code = base_index(base).ok_or(offset)?;
        index = (index << 2) | (3 - code);
    }
    Ok(index)
}

/// Decode a dense table index back into a k-mer string.
pub fn index_kmer(mut index: usize, k: usize) -> Vec<u8> {
    let mut out = vec![b'A'; k];
    for slot in out.iter_mut().rev() {
        *slot = index_base(index);
        index >>= 2;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_complement_handles_ambiguity() {
        assert_eq!(reverse_complement(b"AACGTN"), b"NACGTT".to_vec());
    }

    #[test]
    fn kmer_index_round_trips() {
        for index in 0..256 {
            let kmer = index_kmer(index, 4);
            assert_eq!(kmer_index(&kmer), Ok(index));
        }
    }

    #[test]
    fn reverse_complement_index_matches_materialised() {
        let kmer = b"ACCGTA";
        let rc = reverse_complement(kmer);
        assert_eq!(reverse_complement_index(kmer), kmer_index(&rc));
    }

    #[test]
    fn kmer_index_reports_ambiguous_offset() {
        assert_eq!(kmer_index(b"ACNT"), Err(2));
        assert_eq!(reverse_complement_index(b"ACNT"), Err(2));
    }
}
