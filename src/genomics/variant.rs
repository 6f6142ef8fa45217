use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::dna::base_index;

/// Errors raised while constructing a variant site.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VariantError {
    /// An allele is empty or contains bases outside ACGT.
    #[error("allele '{0}' must be a non-empty ACGT string")]
    InvalidAllele(String),
    /// Reference and alternate alleles have different lengths (indel).
    #[error("alleles '{reference}' and '{alternate}' differ in length")]
    LengthMismatch {
        /// Reference allele.
        reference: String,
        /// Alternate allele.
        alternate: String,
    },
    /// Reference and alternate alleles are identical.
    #[error("reference and alternate allele are both '{0}'")]
    IdenticalAlleles(String),
}

/// Bi-allelic substitution site (SNV or MNV).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantSite {
    chrom: Arc<str>,
    pos: u32,
    ref_allele: String,
    alt_allele: String,
}

impl VariantSite {
    /// Create a variant at 0-based `pos`; alleles are upper-cased.
    pub fn new(
        chrom: impl Into<Arc<str>>,
        pos: u32,
        ref_allele: &str,
        alt_allele: &str,
    ) -> Result<Self, VariantError> {
        let ref_allele = normalise_allele(ref_allele)?;
        let alt_allele = normalise_allele(alt_allele)?;
        if ref_allele.len() != alt_allele.len() {
            return Err(VariantError::LengthMismatch {
                reference: ref_allele,
                alternate: alt_allele,
            });
        }
        if ref_allele == alt_allele {
            return Err(VariantError::IdenticalAlleles(ref_allele));
        }
        Ok(Self {
            chrom: chrom.into(),
            pos,
            ref_allele,
            alt_allele,
        })
    }

    /// Contig name.
    pub fn chrom(&self) -> &str {
        &self.chrom
    }

    /// 0-based position of the first allele base.
    pub fn pos(&self) -> u32 {
        self.pos
    }

    /// Reference allele.
    pub fn ref_allele(&self) -> &str {
        &self.ref_allele
    }

    /// Alternate allele.
    pub fn alt_allele(&self) -> &str {
        &self.alt_allele
    }

    /// Number of reference bases spanned by either allele.
    pub fn allele_len(&self) -> usize {
        self.ref_allele.len()
    }
}

impl fmt::Display for VariantSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}>{}",
            self.chrom, self.pos, self.ref_allele, self.alt_allele
        )
    }
}

fn normalise_allele(allele: &str) -> Result<String, VariantError> {
    if allele.is_empty() || allele.bytes().any(|b| base_index(b).is_none()) {
        return Err(VariantError::InvalidAllele(allele.to_string()));
    }
    Ok(allele.to_ascii_uppercase())
}
