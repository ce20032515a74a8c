//! Folder ingestion.
//!
//! Walks a directory tree, classifies every image it finds and stores the
//! records. Calibration runs once at the end instead of once per file.

use log::{info, log, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::classifier::{calibration_failure_level, Classifier, ImageMeta};
use crate::features::decode;
use crate::state::{FeatureHistory, Label, ThresholdLog};

/// Extensions treated as images (lowercase)
pub const IMAGE_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "bmp", "gif", "tif", "tiff", "webp"];

/// Result of a folder ingestion
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub full: usize,
    pub empty: usize,
    /// Classified but not stored
    pub unsaved: usize,
    /// Could not be read or decoded
    pub failed: usize,
    /// Not an image by extension
    pub skipped: usize,
}

impl IngestReport {
    pub fn classified(&self) -> usize {
        self.full + self.empty
    }
}

/// True if the path has an image extension
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_string_lossy().to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Image files below `folder`, in a stable order
pub fn image_files(folder: &Path) -> (Vec<PathBuf>, usize) {
    let mut images = Vec::new();
    let mut skipped = 0;

    for entry in WalkDir::new(folder)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if is_image_path(path) {
            images.push(path.to_path_buf());
        } else {
            skipped += 1;
        }
    }

    (images, skipped)
}

/// Classify every image below `folder`, then recalibrate once
pub async fn ingest_folder<S>(
    classifier: &Classifier<S>,
    folder: &Path,
    location: Option<String>,
) -> IngestReport
where
    S: FeatureHistory + ThresholdLog + 'static,
{
    info!("🔍 Scanning folder: {}", folder.display());

    let (images, skipped) = image_files(folder);
    let mut report = IngestReport {
        skipped,
        ..IngestReport::default()
    };

    for path in images {
        let filename = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let bytes = match decode::read_image_bytes(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("⚠️  Could not read {}: {e}", path.display());
                report.failed += 1;
                continue;
            }
        };

        let meta = ImageMeta {
            filename,
            annotation: None,
            location: location.clone(),
        };

        match classifier.classify_deferred(bytes, meta).await {
            Ok(result) => {
                match result.verdict.label {
                    Label::Full => report.full += 1,
                    Label::Empty => report.empty += 1,
                }
                if !result.persisted {
                    report.unsaved += 1;
                }
                if report.classified() % 100 == 0 {
                    info!("⏳ Classified {} files...", report.classified());
                }
            }
            Err(e) => {
                warn!("⚠️  Skipping {}: {e}", path.display());
                report.failed += 1;
            }
        }
    }

    info!(
        "✅ Ingest complete: {} full, {} empty, {} failed, {} skipped",
        report.full, report.empty, report.failed, report.skipped
    );

    if classifier.config().auto_calibrate && report.classified() > report.unsaved {
        let this = classifier.clone();
        match tokio::task::spawn_blocking(move || this.calibrate_now()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => log!(calibration_failure_level(&e), "Calibration after ingest did not run: {e}"),
            Err(e) => warn!("⚠️  Calibration task failed: {e}"),
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{CandidateGrid, CandidateRange};
    use crate::config::ClassifierConfig;
    use crate::state::{FeatureRecord, FeatureVector, MemoryStore, ThresholdOrigin};
    use chrono::Utc;
    use image::{Rgb, RgbImage};
    use std::sync::Arc;

    fn tiny_config() -> ClassifierConfig {
        ClassifierConfig {
            grid: CandidateGrid {
                size_kb: CandidateRange::new(0.0, 1.0, 2),
                ground_ratio: CandidateRange::new(0.1, 0.1, 2),
                entropy: CandidateRange::new(1000.0, 1000.0, 2),
                contrast: CandidateRange::new(10.0, 10.0, 2),
                dark_ratio: CandidateRange::new(0.1, 0.1, 2),
            },
            ..ClassifierConfig::default()
        }
    }

    #[test]
    fn test_extension_filter() {
        assert!(is_image_path(Path::new("a/b/bin.JPG")));
        assert!(is_image_path(Path::new("bin.webp")));
        assert!(!is_image_path(Path::new("notes.txt")));
        assert!(!is_image_path(Path::new("README")));
    }

    #[tokio::test]
    async fn test_ingest_folder() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("street_12");
        std::fs::create_dir_all(&nested).unwrap();

        RgbImage::from_pixel(40, 30, Rgb([128, 128, 128]))
            .save(dir.path().join("a.png"))
            .unwrap();
        RgbImage::from_pixel(40, 30, Rgb([245, 245, 245]))
            .save(nested.join("b.png"))
            .unwrap();
        std::fs::write(nested.join("broken.jpg"), b"not a jpeg").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"hello").unwrap();

        let store = Arc::new(MemoryStore::new());
        let classifier = Classifier::new(Arc::clone(&store), tiny_config());

        let report = ingest_folder(&classifier, dir.path(), Some("Rue Victor Hugo".to_string())).await;

        assert_eq!(report.classified(), 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.unsaved, 0);

        let records = store.list_records().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records
            .iter()
            .all(|r| r.record.location.as_deref() == Some("Rue Victor Hugo")));

        let entry = store.latest_entry().unwrap().unwrap();
        assert_eq!(entry.origin, ThresholdOrigin::Calibration);
    }

    #[tokio::test]
    async fn test_ingest_over_malformed_history_keeps_thresholds() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::from_pixel(40, 30, Rgb([128, 128, 128]))
            .save(dir.path().join("a.png"))
            .unwrap();

        let store = Arc::new(MemoryStore::new());
        store
            .append_record(&FeatureRecord {
                filename: "corrupt.jpg".to_string(),
                features: FeatureVector {
                    width: 10,
                    height: 10,
                    size_kb: 12.0,
                    mean_r: 0.0,
                    mean_g: 0.0,
                    mean_b: 0.0,
                    entropy: f64::NAN,
                    contrast: 0.0,
                    dark_ratio: 0.0,
                    ground_ratio: 0.0,
                },
                label: Label::Empty,
                annotation: None,
                location: None,
                recorded_at: Utc::now(),
            })
            .unwrap();
        let classifier = Classifier::new(Arc::clone(&store), tiny_config());

        let report = ingest_folder(&classifier, dir.path(), None).await;

        assert_eq!(report.classified(), 1);
        assert_eq!(store.record_count().unwrap(), 2);
        assert!(store.latest_entry().unwrap().is_none());
        assert!(classifier.current_thresholds().is_default());
    }
}
