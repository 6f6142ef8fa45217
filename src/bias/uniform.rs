use super::{BiasError, BiasModel};
use crate::genomics::Strand;

/// Bias model without sequence preference: every window scores `1.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UniformModel;

impl UniformModel {
    /// Create the uniform model.
    pub fn new() -> Self {
        Self
    }
}

impl BiasModel for UniformModel {
    fn kmer_len(&self) -> usize {
        1
    }

    fn score(&self, _window: &[u8], _strand: Strand) -> Result<f64, BiasError> {
        Ok(1.0)
    }
}
