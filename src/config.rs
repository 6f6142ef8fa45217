//! Run-wide settings.
//!
//! [`FootprintConfig`] gathers the per-component settings so a whole run can
//! be described by one JSON document; every field has a default, so partial
//! documents are accepted.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::bias::{load_bias_model, BiasModel};
use crate::calls::{CallerConfig, FootprintCaller};
use crate::cutcounts::CounterConfig;
use crate::dispersion::FitConfig;
use crate::predict::{FootprintPredictor, PredictorConfig};

/// Settings for counting, prediction, fitting, calling and batching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FootprintConfig {
    /// Read filtering and cut offsets.
    pub counter: CounterConfig,
    /// Bias handling and rescaling.
    pub predictor: PredictorConfig,
    /// Dispersion bucket layout.
    pub fit: FitConfig,
    /// Null simulation and FDR levels.
    pub caller: CallerConfig,
    /// Regions handled per pair of file handles.
    pub batch_size: usize,
    /// K-mer table; the uniform model is used when absent.
    pub bias_model: Option<PathBuf>,
}

impl Default for FootprintConfig {
    fn default() -> Self {
        Self {
            counter: CounterConfig::default(),
            predictor: PredictorConfig::default(),
            fit: FitConfig::default(),
            caller: CallerConfig::default(),
            batch_size: 100,
            bias_model: None,
        }
    }
}

impl FootprintConfig {
    /// Parse a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid footprint configuration")
    }

    /// Read a JSON document from disk.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialise configuration")
    }

    /// Replace the counter settings.
    pub fn with_counter(mut self, counter: CounterConfig) -> Self {
        self.counter = counter;
        self
    }

    /// Replace the prediction settings.
    pub fn with_predictor(mut self, predictor: PredictorConfig) -> Self {
        self.predictor = predictor;
        self
    }

    /// Replace the fit settings.
    pub fn with_fit(mut self, fit: FitConfig) -> Self {
        self.fit = fit;
        self
    }

    /// Replace the caller settings.
    pub fn with_caller(mut self, caller: CallerConfig) -> Self {
        self.caller = caller;
        self
    }

    /// Set the number of regions per batch.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Use the k-mer table at `path`.
    pub fn with_bias_model(mut self, path: impl Into<PathBuf>) -> Self {
        self.bias_model = Some(path.into());
        self
    }

    /// Load the configured bias model and build a predictor around it.
    pub fn build_predictor(&self) -> Result<FootprintPredictor<Arc<dyn BiasModel>>> {
        let bias = load_bias_model(self.bias_model.as_deref()).context("failed to load bias model")?;
        Ok(FootprintPredictor::from_config(self.counter.clone(), bias, self.predictor))
    }

    /// Build the footprint caller.
    pub fn build_caller(&self) -> Result<FootprintCaller> {
        FootprintCaller::new(self.caller.clone()).context("invalid caller configuration")
    }
}
