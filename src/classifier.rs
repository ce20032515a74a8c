//! Classification service.
//!
//! Ties the pipeline together: decode and measure an image, score it
//! against a snapshot of the current thresholds, append the record to
//! the history, then hand calibration to the blocking pool. Calibration
//! results reach the scoring path only through `ThresholdCell::publish`,
//! after they have been written to the threshold log. Log append and
//! publish happen under one commit lock, so the live set is always the
//! latest logged entry.

use chrono::Utc;
use log::{debug, info, log, warn, Level};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Handle;
use tokio::task::{self, JoinHandle};

use crate::calibration::{self, CalibrationOutcome};
use crate::config::ClassifierConfig;
use crate::error::{ClassifierError, PersistenceError};
use crate::features;
use crate::scoring::{self, Verdict};
use crate::state::{FeatureHistory, FeatureRecord, ThresholdCell, ThresholdLog, ThresholdOrigin, ThresholdSet};

/// Caller-supplied metadata for one image
#[derive(Debug, Clone, Default)]
pub struct ImageMeta {
    pub filename: String,
    pub annotation: Option<String>,
    pub location: Option<String>,
}

impl ImageMeta {
    pub fn named(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            ..Self::default()
        }
    }
}

/// Result of classifying one image
#[derive(Serialize, Debug, Clone)]
pub struct Classification {
    /// History id, when the record was stored
    pub id: Option<i64>,
    pub record: FeatureRecord,
    pub verdict: Verdict,
    /// Thresholds the verdict was computed with
    pub thresholds: ThresholdSet,
    /// False when the history store could not be written
    pub persisted: bool,
}

/// Calibration errors (empty or malformed history) are expected and
/// logged at debug; anything else is a warning
pub(crate) fn calibration_failure_level(error: &ClassifierError) -> Level {
    match error {
        ClassifierError::Calibration(_) => Level::Debug,
        _ => Level::Warn,
    }
}

/// Clears the in-flight flag when a calibration pass ends, even on panic
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Classifier over a store implementing both logs
pub struct Classifier<S> {
    store: Arc<S>,
    thresholds: Arc<ThresholdCell>,
    config: Arc<ClassifierConfig>,
    calibrating: Arc<AtomicBool>,
    /// Held across "append to threshold log" and "publish"
    commit: Arc<Mutex<()>>,
}

impl<S> Clone for Classifier<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            thresholds: Arc::clone(&self.thresholds),
            config: Arc::clone(&self.config),
            calibrating: Arc::clone(&self.calibrating),
            commit: Arc::clone(&self.commit),
        }
    }
}

impl<S> Classifier<S>
where
    S: FeatureHistory + ThresholdLog + 'static,
{
    /// Create a classifier, adopting the latest stored thresholds.
    /// An unreadable threshold log falls back to the defaults.
    pub fn new(store: Arc<S>, config: ClassifierConfig) -> Self {
        let initial = match store.latest_thresholds() {
            Ok(thresholds) => thresholds,
            Err(e) => {
                warn!("⚠️  Could not read threshold log, using defaults: {e}");
                ThresholdSet::default()
            }
        };
        info!(
            "🎯 Thresholds: size>{} ground>{} entropy>{} contrast<{} dark>{}",
            initial.size_kb, initial.ground_ratio, initial.entropy, initial.contrast, initial.dark_ratio
        );

        Self {
            store,
            thresholds: Arc::new(ThresholdCell::new(initial)),
            config: Arc::new(config),
            calibrating: Arc::new(AtomicBool::new(false)),
            commit: Arc::new(Mutex::new(())),
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consistent copy of the thresholds in use
    pub fn current_thresholds(&self) -> ThresholdSet {
        self.thresholds.snapshot()
    }

    /// True while a background calibration pass is running
    pub fn is_calibrating(&self) -> bool {
        self.calibrating.load(Ordering::SeqCst)
    }

    fn commit_lock(&self) -> MutexGuard<'_, ()> {
        // The guarded unit carries no data, so poisoning is harmless
        self.commit.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Classify image bytes and append the record to the history.
    ///
    /// Only decode failures are returned as errors. A failed append is
    /// logged and reported through `Classification::persisted`.
    pub fn classify_bytes(&self, bytes: &[u8], meta: ImageMeta) -> Result<Classification, ClassifierError> {
        let mut classification = self.score_bytes(bytes, meta)?;

        match self.store.append_record(&classification.record) {
            Ok(id) => {
                classification.id = Some(id);
                classification.persisted = true;
            }
            Err(e) => {
                warn!("⚠️  Label computed but not stored for {}: {e}", classification.record.filename);
            }
        }

        Ok(classification)
    }

    /// Classify image bytes without touching the history
    pub fn score_bytes(&self, bytes: &[u8], meta: ImageMeta) -> Result<Classification, ClassifierError> {
        let features = features::analyze(bytes, &self.config)?;
        let thresholds = self.thresholds.snapshot();
        let verdict = scoring::evaluate(&features, &thresholds);

        debug!(
            "🔍 {}: score {} -> {} ({:?})",
            meta.filename, verdict.score, verdict.label, verdict.predicates
        );

        let record = FeatureRecord {
            filename: meta.filename,
            features,
            label: verdict.label,
            annotation: meta.annotation,
            location: meta.location,
            recorded_at: Utc::now(),
        };

        Ok(Classification {
            id: None,
            persisted: false,
            record,
            verdict,
            thresholds,
        })
    }

    /// Classify on the blocking pool without triggering calibration
    pub async fn classify_deferred(&self, bytes: Vec<u8>, meta: ImageMeta) -> Result<Classification, ClassifierError> {
        let this = self.clone();
        task::spawn_blocking(move || this.classify_bytes(&bytes, meta))
            .await
            .map_err(|e| ClassifierError::Task(format!("Task join error: {e}")))?
    }

    /// Score on the blocking pool; nothing is stored
    pub async fn score_deferred(&self, bytes: Vec<u8>, meta: ImageMeta) -> Result<Classification, ClassifierError> {
        let this = self.clone();
        task::spawn_blocking(move || this.score_bytes(&bytes, meta))
            .await
            .map_err(|e| ClassifierError::Task(format!("Task join error: {e}")))?
    }

    /// Classify, then schedule a background recalibration when the record
    /// was stored and `auto_calibrate` is on. The response never waits
    /// for calibration.
    pub async fn classify(&self, bytes: Vec<u8>, meta: ImageMeta) -> Result<Classification, ClassifierError> {
        let classification = self.classify_deferred(bytes, meta).await?;
        if classification.persisted && self.config.auto_calibrate {
            self.schedule_calibration();
        }
        Ok(classification)
    }

    /// Run a calibration pass now over the whole history.
    ///
    /// The winning set is written to the threshold log first and only
    /// then published, so the log never lags behind what scoring uses.
    pub fn calibrate_now(&self) -> Result<CalibrationOutcome, ClassifierError> {
        let records: Vec<FeatureRecord> = self
            .store
            .list_records()?
            .into_iter()
            .map(|stored| stored.record)
            .collect();

        info!(
            "⚙️  Calibrating over {} records ({} candidates)",
            records.len(),
            self.config.grid.len()
        );

        let outcome = calibration::calibrate(&records, &self.config.grid)?;

        let previous = {
            let _commit = self.commit_lock();
            self.store
                .append_thresholds(&outcome.thresholds, ThresholdOrigin::Calibration, Some(outcome.accuracy))?;
            self.thresholds.publish(outcome.thresholds)
        };

        if previous != outcome.thresholds {
            info!(
                "✅ New thresholds adopted (accuracy {:.1}%): {:?}",
                outcome.accuracy * 100.0,
                outcome.thresholds
            );
        } else {
            info!("✅ Thresholds unchanged (accuracy {:.1}%)", outcome.accuracy * 100.0);
        }

        Ok(outcome)
    }

    /// Dispatch a calibration pass to the blocking pool.
    ///
    /// Returns `None` when a pass is already running (the next trigger
    /// will see any new records) or when called outside a Tokio runtime.
    /// Failures inside the pass are logged, never propagated.
    pub fn schedule_calibration(&self) -> Option<JoinHandle<()>> {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("⚠️  No async runtime, calibration not scheduled");
                return None;
            }
        };

        if self.calibrating.swap(true, Ordering::SeqCst) {
            debug!("⏳ Calibration already running, skipping trigger");
            return None;
        }

        let guard = InFlight(Arc::clone(&self.calibrating));
        let this = self.clone();

        Some(handle.spawn_blocking(move || {
            let _guard = guard;
            if let Err(e) = this.calibrate_now() {
                log!(calibration_failure_level(&e), "Background calibration did not run: {e}");
            }
        }))
    }

    /// Restore the hardcoded default thresholds, bypassing the search.
    /// The reset is logged as a new entry before it is published.
    pub fn reset(&self) -> Result<ThresholdSet, PersistenceError> {
        let defaults = ThresholdSet::default();
        {
            let _commit = self.commit_lock();
            self.store.append_thresholds(&defaults, ThresholdOrigin::Reset, None)?;
            self.thresholds.publish(defaults);
        }
        info!("🔄 Thresholds reset to defaults");
        Ok(defaults)
    }
}
