//! Sequence-dependent cleavage bias.
//!
//! A [`BiasModel`] maps a DNA window centred on a cut bond to a relative
//! cleavage propensity. Two variants are provided: [`UniformModel`] (no
//! sequence preference) and [`KmerModel`] (dense k-mer lookup table).

mod kmer;
mod uniform;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::genomics::Strand;

pub use kmer::{KmerModel, KmerTable};
pub use uniform::UniformModel;

/// Errors raised by bias models and k-mer table loading.
#[derive(Debug, Error)]
pub enum BiasError {
    /// The k-mer needed for lookup contains a base outside ACGT.
    #[error("ambiguous base '{base}' at offset {offset} of window '{window}'")]
    InvalidSequence {
        /// Offending window.
        window: String,
        /// Offset of the ambiguous base inside the window.
        offset: usize,
        /// The ambiguous base.
        base: char,
    },
    /// The window cannot centre a k-mer (too short or wrong parity).
    #[error("window of {len} bases cannot centre a {k}-mer")]
    InvalidWindow {
        /// Window length.
        len: usize,
        /// Model k-mer length.
        k: usize,
    },
    /// Requested k is outside the supported range.
    #[error("k-mer length {0} outside supported range 1..={max}", max = KmerTable::MAX_K)]
    UnsupportedKmerLength(usize),
    /// Table does not define every k-mer.
    #[error("k-mer table has {found} of {expected} entries for k={k}")]
    IncompleteTable {
        /// K-mer length.
        k: usize,
        /// Entries present.
        found: usize,
        /// Entries required (`4^k`).
        expected: usize,
    },
    /// A k-mer is defined twice.
    #[error("k-mer '{0}' listed more than once")]
    DuplicateKmer(String),
    /// A k-mer contains non-ACGT characters.
    #[error("k-mer '{0}' contains bases outside ACGT")]
    InvalidKmer(String),
    /// K-mers of different lengths in one table.
    #[error("k-mer '{kmer}' has length {found}, expected {expected}")]
    InconsistentKmerLength {
        /// Offending k-mer.
        kmer: String,
        /// Its length.
        found: usize,
        /// Length established by earlier entries.
        expected: usize,
    },
    /// Weight is negative or not finite.
    #[error("invalid weight {weight} for k-mer '{kmer}'")]
    InvalidWeight {
        /// K-mer whose weight is invalid.
        kmer: String,
        /// The weight.
        weight: f64,
    },
    /// Unparseable line in a persisted table.
    #[error("line {line}: {message}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// Description of the problem.
        message: String,
    },
    /// Table without entries.
    #[error("k-mer table is empty")]
    EmptyTable,
    /// I/O failure while reading a table.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Capability shared by all bias models.
///
/// `window` is a forward-strand sequence of length `2 * flank + k`; the
/// central k-mer `window[flank..flank + k]` determines the score. On the
/// reverse strand the reverse complement of that k-mer is looked up, since
/// propensities are defined relative to the sequenced strand's 5′ end.
pub trait BiasModel: Send + Sync + fmt::Debug {
    /// Length of the k-mer the model looks up.
    fn kmer_len(&self) -> usize;

    /// Relative cleavage propensity of the window's central k-mer.
    fn score(&self, window: &[u8], strand: Strand) -> Result<f64, BiasError>;

    /// Score substituted for windows that cannot be looked up.
    fn neutral_score(&self) -> f64 {
        1.0
    }
}

impl<T: BiasModel + ?Sized> BiasModel for &T {
    fn kmer_len(&self) -> usize {
        (**self).kmer_len()
    }

    fn score(&self, window: &[u8], strand: Strand) -> Result<f64, BiasError> {
        (**self).score(window, strand)
    }

    fn neutral_score(&self) -> f64 {
        (**self).neutral_score()
    }
}

impl<T: BiasModel + ?Sized> BiasModel for Box<T> {
    fn kmer_len(&self) -> usize {
        (**self).kmer_len()
    }

    fn score(&self, window: &[u8], strand: Strand) -> Result<f64, BiasError> {
        (**self).score(window, strand)
    }

    fn neutral_score(&self) -> f64 {
        (**self).neutral_score()
    }
}

impl<T: BiasModel + ?Sized> BiasModel for Arc<T> {
    fn kmer_len(&self) -> usize {
        (**self).kmer_len()
    }

    fn score(&self, window: &[u8], strand: Strand) -> Result<f64, BiasError> {
        (**self).score(window, strand)
    }

    fn neutral_score(&self) -> f64 {
        (**self).neutral_score()
    }
}

/// Load a k-mer model from `path`, or fall back to the uniform model.
pub fn load_bias_model(path: Option<&Path>) -> Result<Arc<dyn BiasModel>, BiasError> {
    match path {
        Some(path) => {
            info!(path = %path.display(), "loading k-mer bias model");
            Ok(Arc::new(KmerModel::from_path(path)?))
        }
        None => {
            info!("no bias model file given, using uniform sequence bias");
            Ok(Arc::new(UniformModel::new()))
        }
    }
}

/// Central `k`-mer of a window together with its flank length.
pub(crate) fn central_kmer(window: &[u8], k: usize) -> Result<(usize, &[u8]), BiasError> {
    if window.len() < k || (window.len() - k) % 2 != 0 {
        return Err(BiasError::InvalidWindow {
            len: window.len(),
            k,
        });
    }
    let flank = (window.len() - k) / 2;
    Ok((flank, &window[flank..flank + k]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn central_kmer_requires_symmetric_flanks() {
        assert_eq!(central_kmer(b"AACGTT", 2).unwrap(), (2, &b"CG"[..]));
        assert!(matches!(
            central_kmer(b"AACGT", 2),
            Err(BiasError::InvalidWindow { len: 5, k: 2 })
        ));
        assert!(matches!(
            central_kmer(b"A", 2),
            Err(BiasError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn boxed_and_shared_models_delegate() {
        let boxed: Box<dyn BiasModel> = Box::new(UniformModel::new());
        let shared: Arc<dyn BiasModel> = Arc::new(UniformModel::new());
        assert_eq!(boxed.score(b"ACG", Strand::Forward).unwrap(), 1.0);
        assert_eq!(shared.kmer_len(), 1);
    }
}
