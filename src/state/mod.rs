//! State management module
//!
//! This module handles all classifier state, including:
//! - Database connections and queries (library.rs)
//! - Shared data structures (data.rs)
//! - Threshold sets and the live threshold cell (thresholds.rs)
//! - Store seams and an in-memory store for tests (store.rs)

pub mod library;
pub mod data;
pub mod thresholds;
pub mod store;

pub use data::{FeatureRecord, FeatureVector, Label, StoredRecord, ThresholdEntry, ThresholdOrigin};
pub use library::Library;
pub use store::{FeatureHistory, MemoryStore, ThresholdLog};
pub use thresholds::{ThresholdCell, ThresholdSet};
