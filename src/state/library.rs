use chrono::{DateTime, Utc};
use log::{debug, info};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::data::{FeatureRecord, FeatureVector, Label, StoredRecord, ThresholdEntry, ThresholdOrigin};
use super::store::{FeatureHistory, ThresholdLog};
use super::thresholds::ThresholdSet;
use crate::error::PersistenceError;

const RECORD_COLUMNS: &str = "id, filename, width, height, size_kb, mean_r, mean_g, mean_b, \
     entropy, contrast, dark_ratio, ground_ratio, label, annotation, location, recorded_at";

const THRESHOLD_COLUMNS: &str =
    "id, size_kb, ground_ratio, entropy, contrast, dark_ratio, origin, accuracy, created_at";

/// The Library manages the SQLite catalog database.
/// It stores the append-only feature history and threshold log.
pub struct Library {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl Library {
    /// Open the catalog at its default location, creating it if needed.
    ///
    /// The database file is created in the user's data directory:
    /// - Linux: ~/.local/share/waste-gauge/waste_gauge.db
    /// - macOS: ~/Library/Application Support/waste-gauge/waste_gauge.db
    /// - Windows: %APPDATA%\waste-gauge\waste_gauge.db
    pub fn open_default() -> Result<Self, PersistenceError> {
        Self::open(Self::default_db_path()?)
    }

    /// Open or create the catalog at `db_path`
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let db_path = db_path.into();

        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&db_path)?;
        info!("📁 Catalog opened at: {}", db_path.display());

        let library = Library {
            conn: Mutex::new(conn),
            db_path,
        };
        library.init_schema()?;

        Ok(library)
    }

    /// Get the path where the database should be stored
    pub fn default_db_path() -> Result<PathBuf, PersistenceError> {
        let mut path = dirs::data_dir()
            .or_else(dirs::home_dir)
            .ok_or(PersistenceError::NoDataDir)?;

        path.push("waste-gauge");
        path.push("waste_gauge.db");
        Ok(path)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Initialize the database schema.
    /// Creates all necessary tables and indexes if they don't exist.
    fn init_schema(&self) -> Result<(), PersistenceError> {
        let conn = self.conn();

        // One row per processed image, never updated
        conn.execute(
            "CREATE TABLE IF NOT EXISTS feature_records (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                filename        TEXT NOT NULL,
                width           INTEGER NOT NULL,
                height          INTEGER NOT NULL,
                size_kb         REAL NOT NULL,
                mean_r          REAL NOT NULL,
                mean_g          REAL NOT NULL,
                mean_b          REAL NOT NULL,
                entropy         REAL NOT NULL,
                contrast        REAL NOT NULL,
                dark_ratio      REAL NOT NULL,
                ground_ratio    REAL NOT NULL,
                label           TEXT NOT NULL,
                annotation      TEXT,
                location        TEXT,
                recorded_at     INTEGER NOT NULL
            )",
            [],
        )?;

        // Threshold log; the highest id is the current set
        conn.execute(
            "CREATE TABLE IF NOT EXISTS threshold_sets (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                size_kb         REAL NOT NULL,
                ground_ratio    REAL NOT NULL,
                entropy         REAL NOT NULL,
                contrast        REAL NOT NULL,
                dark_ratio      REAL NOT NULL,
                origin          TEXT NOT NULL,
                accuracy        REAL,
                created_at      INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_feature_records_label
             ON feature_records(label)",
            [],
        )?;

        debug!("✅ Catalog schema initialized");

        Ok(())
    }
}

fn timestamp_from_millis(millis: i64, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            Type::Integer,
            format!("timestamp out of range: {millis}").into(),
        )
    })
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<StoredRecord> {
    let label_text: String = row.get(12)?;
    let label = label_text
        .parse::<Label>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(12, Type::Text, e.into()))?;

    Ok(StoredRecord {
        id: row.get(0)?,
        record: FeatureRecord {
            filename: row.get(1)?,
            features: FeatureVector {
                width: row.get(2)?,
                height: row.get(3)?,
                size_kb: row.get(4)?,
                mean_r: row.get(5)?,
                mean_g: row.get(6)?,
                mean_b: row.get(7)?,
                entropy: row.get(8)?,
                contrast: row.get(9)?,
                dark_ratio: row.get(10)?,
                ground_ratio: row.get(11)?,
            },
            label,
            annotation: row.get(13)?,
            location: row.get(14)?,
            recorded_at: timestamp_from_millis(row.get(15)?, 15)?,
        },
    })
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<ThresholdEntry> {
    let origin_text: String = row.get(6)?;
    let origin = origin_text
        .parse::<ThresholdOrigin>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, e.into()))?;

    Ok(ThresholdEntry {
        id: row.get(0)?,
        thresholds: ThresholdSet {
            size_kb: row.get(1)?,
            ground_ratio: row.get(2)?,
            entropy: row.get(3)?,
            contrast: row.get(4)?,
            dark_ratio: row.get(5)?,
        },
        origin,
        accuracy: row.get(7)?,
        created_at: timestamp_from_millis(row.get(8)?, 8)?,
    })
}

impl FeatureHistory for Library {
    fn append_record(&self, record: &FeatureRecord) -> Result<i64, PersistenceError> {
        let conn = self.conn();
        let f = &record.features;
        conn.execute(
            "INSERT INTO feature_records (filename, width, height, size_kb, mean_r, mean_g, mean_b,
                 entropy, contrast, dark_ratio, ground_ratio, label, annotation, location, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                record.filename,
                f.width,
                f.height,
                f.size_kb,
                f.mean_r,
                f.mean_g,
                f.mean_b,
                f.entropy,
                f.contrast,
                f.dark_ratio,
                f.ground_ratio,
                record.label.as_str(),
                record.annotation,
                record.location,
                record.recorded_at.timestamp_millis(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn list_records(&self) -> Result<Vec<StoredRecord>, PersistenceError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("SELECT {RECORD_COLUMNS} FROM feature_records"))?;
        let records = stmt
            .query_map([], record_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn record_count(&self) -> Result<i64, PersistenceError> {
        let count: i64 =
            self.conn()
                .query_row("SELECT COUNT(*) FROM feature_records", [], |row| row.get(0))?;
        Ok(count)
    }

    fn recent_records(&self, limit: usize) -> Result<Vec<StoredRecord>, PersistenceError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM feature_records ORDER BY id DESC LIMIT ?1"
        ))?;
        let records = stmt
            .query_map([limit as i64], record_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

impl ThresholdLog for Library {
    fn append_thresholds(
        &self,
        thresholds: &ThresholdSet,
        origin: ThresholdOrigin,
        accuracy: Option<f64>,
    ) -> Result<i64, PersistenceError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO threshold_sets (size_kb, ground_ratio, entropy, contrast, dark_ratio,
                 origin, accuracy, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                thresholds.size_kb,
                thresholds.ground_ratio,
                thresholds.entropy,
                thresholds.contrast,
                thresholds.dark_ratio,
                origin.as_str(),
                accuracy,
                Utc::now().timestamp_millis(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn latest_entry(&self) -> Result<Option<ThresholdEntry>, PersistenceError> {
        Ok(self.threshold_entries(1)?.into_iter().next())
    }

    fn threshold_entries(&self, limit: usize) -> Result<Vec<ThresholdEntry>, PersistenceError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {THRESHOLD_COLUMNS} FROM threshold_sets ORDER BY id DESC LIMIT ?1"
        ))?;
        let entries = stmt
            .query_map([limit as i64], entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("db_path", &self.db_path)
            .finish()
    }
}
