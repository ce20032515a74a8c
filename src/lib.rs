//! Explainable full/empty classification of waste container photographs.
//!
//! An image is reduced to a handful of photometric features, five
//! threshold predicates vote on them, and three votes make a container
//! full. The thresholds are periodically re-fitted to the accumulated
//! history by an exhaustive grid search.
//!
//! ```no_run
//! use std::sync::Arc;
//! use waste_gauge::{Classifier, ClassifierConfig, ImageMeta, Library};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let library = Arc::new(Library::open_default()?);
//! let classifier = Classifier::new(library, ClassifierConfig::default());
//! let bytes = std::fs::read("bin.jpg")?;
//! let result = classifier.classify(bytes, ImageMeta::named("bin.jpg")).await?;
//! println!("{} (score {})", result.verdict.label, result.verdict.score);
//! # Ok(())
//! # }
//! ```

pub mod calibration;
pub mod classifier;
pub mod color;
pub mod config;
pub mod error;
pub mod features;
pub mod ingest;
pub mod scoring;
pub mod state;

pub use calibration::{CalibrationOutcome, CandidateGrid, CandidateRange};
pub use classifier::{Classification, Classifier, ImageMeta};
pub use config::ClassifierConfig;
pub use error::{CalibrationError, ClassifierError, ConfigError, DecodeError, PersistenceError};
pub use scoring::{Predicates, Verdict};
pub use state::{
    FeatureHistory, FeatureRecord, FeatureVector, Label, Library, MemoryStore, ThresholdLog, ThresholdSet,
};
