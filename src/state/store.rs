//! Store seams for the feature history and the threshold log
//!
//! The classifier only talks to these traits. `Library` implements them
//! on SQLite; `MemoryStore` keeps everything in vectors and can be told to
//! fail, which is how the degraded persistence paths are exercised.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::data::{FeatureRecord, StoredRecord, ThresholdEntry, ThresholdOrigin};
use super::thresholds::ThresholdSet;
use crate::error::PersistenceError;

/// Append-only log of processed images
pub trait FeatureHistory: Send + Sync {
    /// Append a record, returning its insertion id
    fn append_record(&self, record: &FeatureRecord) -> Result<i64, PersistenceError>;

    /// Every stored record. Callers must not depend on the order.
    fn list_records(&self) -> Result<Vec<StoredRecord>, PersistenceError>;

    fn record_count(&self) -> Result<i64, PersistenceError>;

    /// Most recent records first
    fn recent_records(&self, limit: usize) -> Result<Vec<StoredRecord>, PersistenceError>;
}

/// Append-only log of threshold sets; the latest entry is current
pub trait ThresholdLog: Send + Sync {
    fn append_thresholds(
        &self,
        thresholds: &ThresholdSet,
        origin: ThresholdOrigin,
        accuracy: Option<f64>,
    ) -> Result<i64, PersistenceError>;

    fn latest_entry(&self) -> Result<Option<ThresholdEntry>, PersistenceError>;

    /// Newest entries first
    fn threshold_entries(&self, limit: usize) -> Result<Vec<ThresholdEntry>, PersistenceError>;

    /// Current threshold set, or the hardcoded default when the log is empty
    fn latest_thresholds(&self) -> Result<ThresholdSet, PersistenceError> {
        Ok(self
            .latest_entry()?
            .map(|entry| entry.thresholds)
            .unwrap_or_default())
    }
}

/// In-memory store used by tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<StoredRecord>>,
    thresholds: Mutex<Vec<ThresholdEntry>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following call fail as if the database were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), PersistenceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable);
        }
        Ok(())
    }
}

impl FeatureHistory for MemoryStore {
    fn append_record(&self, record: &FeatureRecord) -> Result<i64, PersistenceError> {
        self.check()?;
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let id = records.len() as i64 + 1;
        records.push(StoredRecord {
            id,
            record: record.clone(),
        });
        Ok(id)
    }

    fn list_records(&self) -> Result<Vec<StoredRecord>, PersistenceError> {
        self.check()?;
        Ok(self.records.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn record_count(&self) -> Result<i64, PersistenceError> {
        self.check()?;
        Ok(self.records.lock().unwrap_or_else(|e| e.into_inner()).len() as i64)
    }

    fn recent_records(&self, limit: usize) -> Result<Vec<StoredRecord>, PersistenceError> {
        self.check()?;
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(records.iter().rev().take(limit).cloned().collect())
    }
}

impl ThresholdLog for MemoryStore {
    fn append_thresholds(
        &self,
        thresholds: &ThresholdSet,
        origin: ThresholdOrigin,
        accuracy: Option<f64>,
    ) -> Result<i64, PersistenceError> {
        self.check()?;
        let mut entries = self.thresholds.lock().unwrap_or_else(|e| e.into_inner());
        let id = entries.len() as i64 + 1;
        entries.push(ThresholdEntry {
            id,
            thresholds: *thresholds,
            origin,
            accuracy,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    fn latest_entry(&self) -> Result<Option<ThresholdEntry>, PersistenceError> {
        self.check()?;
        Ok(self
            .thresholds
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned())
    }

    fn threshold_entries(&self, limit: usize) -> Result<Vec<ThresholdEntry>, PersistenceError> {
        self.check()?;
        let entries = self.thresholds.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_falls_back_to_default() {
        let store = MemoryStore::new();
        assert!(store.latest_thresholds().unwrap().is_default());
    }

    #[test]
    fn test_latest_is_last_appended() {
        let store = MemoryStore::new();
        let first = ThresholdSet {
            size_kb: 100.0,
            ..ThresholdSet::default()
        };
        let second = ThresholdSet {
            size_kb: 200.0,
            ..ThresholdSet::default()
        };

        store
            .append_thresholds(&first, ThresholdOrigin::Calibration, Some(0.5))
            .unwrap();
        store
            .append_thresholds(&second, ThresholdOrigin::Calibration, Some(0.7))
            .unwrap();

        assert_eq!(store.latest_thresholds().unwrap(), second);
        let entries = store.threshold_entries(10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].thresholds, second);
    }

    #[test]
    fn test_unavailable_store_fails() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(matches!(store.record_count(), Err(PersistenceError::Unavailable)));
        assert!(store.latest_entry().is_err());

        store.set_unavailable(false);
        assert_eq!(store.record_count().unwrap(), 0);
    }
}
