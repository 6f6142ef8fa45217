//! # DNase I footprinting
//!
//! Per-nucleotide cleavage counts from aligned reads are compared to the
//! cleavage expected from a sequence-bias model, scored against a learned
//! negative-binomial dispersion model, and turned into footprint calls with
//! an empirical false discovery rate.
//!
//! ## Pipeline
//!
//! 1. **Cleavage counting** ([`cutcounts`]): filter reads, translate 5′ ends
//!    into strand-specific cut sites, optionally split by allele.
//! 2. **Sequence bias** ([`bias`]): uniform or k-mer propensities.
//! 3. **Prediction** ([`predict`]): rescale propensities into expected counts.
//! 4. **Dispersion** ([`dispersion`]): bucketed count distributions keyed on
//!    the expected count, persisted as JSON.
//! 5. **Calling** ([`calls`]): windowed p-values, simulated nulls, FDR.
//!
//! ## Usage Example
//!
//! ```ignore
//! use footprinter::{FootprintConfig, RegionPipeline};
//!
//! let config = FootprintConfig::from_path("footprint.json")?;
//! let predictor = config.build_predictor()?;
//! let pipeline = RegionPipeline::new(&predictor, config.batch_size);
//! let model = pipeline.learn(open, &regions, &config.fit)?;
//! let calls = pipeline.detect(open, &regions, &model, &config.build_caller()?)?;
//! ```

#![warn(missing_docs, missing_debug_implementations)]

pub mod bias;
pub mod calls;
pub mod config;
pub mod cutcounts;
pub mod dispersion;
pub mod genomics;
pub mod pipeline;
pub mod predict;
pub mod stats;

mod error;

pub use bias::{BiasError, BiasModel, KmerModel, KmerTable, UniformModel};
pub use calls::{BondStatistics, CallError, CallerConfig, FootprintCaller, RegionCalls};
pub use config::FootprintConfig;
pub use cutcounts::{AlignmentSource, CleavageCounter, CleavageCounts, CounterConfig, CountError};
pub use dispersion::{CountDistribution, DispersionError, DispersionModel, FitConfig, TrainingSet};
pub use error::{FootprintError, Result};
pub use genomics::{GenomicInterval, SequenceSource, Strand};
pub use pipeline::RegionPipeline;
pub use predict::{FootprintPredictor, FootprintTrack, PredictError, PredictorConfig, RegionSignal};
