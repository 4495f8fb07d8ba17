//! Version record store.
//!
//! One JSON file per tracked library, named `<library>.json`, holding the
//! last recorded upstream version. The store is the durable state shared
//! between scheduled runs.
//!
//! There is no locking: at most one release pipeline is assumed to run
//! against a store at a time, which the scheduler has to guarantee.

use crate::error::StoreError;
use crate::models::LibraryVersionRecord;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use walkdir::WalkDir;

const RECORD_EXTENSION: &str = "json";

/// Key-value persistence of library version records.
pub trait VersionStore {
    /// Every persisted record, keyed by library name.
    ///
    /// A store that does not exist yet is empty, not an error.
    fn read_all(&self) -> Result<BTreeMap<String, LibraryVersionRecord>, StoreError>;

    /// Create or replace the record for one library.
    fn write_one(&self, record: &LibraryVersionRecord) -> Result<(), StoreError>;
}

/// Check that a library name can be used as a record file stem.
pub fn validate_library_name(name: &str) -> Result<(), StoreError> {
    let invalid = name.trim().is_empty()
        || name != name.trim()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0']);

    if invalid {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Directory-backed store.
#[derive(Debug, Clone)]
pub struct FileVersionStore {
    dir: PathBuf,
}

impl FileVersionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record file for a library.
    pub fn record_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, RECORD_EXTENSION))
    }

    fn read_record(&self, name: &str, path: &Path) -> Result<LibraryVersionRecord, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            library: name.to_string(),
            path: path.to_path_buf(),
            reason,
        };

        let content = std::fs::read_to_string(path).map_err(|e| StoreError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut record: LibraryVersionRecord =
            serde_json::from_str(&content).map_err(|e| corrupt(e.to_string()))?;

        if record.version.trim().is_empty() {
            return Err(corrupt("version is blank".to_string()));
        }

        record.name = name.to_string();
        Ok(record)
    }
}

impl VersionStore for FileVersionStore {
    fn read_all(&self) -> Result<BTreeMap<String, LibraryVersionRecord>, StoreError> {
        let mut records = BTreeMap::new();

        if !self.dir.exists() {
            debug!("Version store {} does not exist yet", self.dir.display());
            return Ok(records);
        }

        let walker = WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.map_err(|e| StoreError::Io {
                path: self.dir.clone(),
                source: e.into(),
            })?;

            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION)
            {
                debug!("Skipping non-record entry {}", path.display());
                continue;
            }

            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let record = self.read_record(name, path)?;
            debug!("Loaded record {} v{}", record.name, record.version);
            records.insert(record.name.clone(), record);
        }

        Ok(records)
    }

    fn write_one(&self, record: &LibraryVersionRecord) -> Result<(), StoreError> {
        validate_library_name(&record.name)?;

        let io_err = |path: &Path, e: std::io::Error| StoreError::Io {
            path: path.to_path_buf(),
            source: e,
        };

        std::fs::create_dir_all(&self.dir).map_err(|e| io_err(&self.dir, e))?;

        let target = self.record_path(&record.name);
        let mut json = serde_json::to_string_pretty(record).map_err(|e| StoreError::Corrupt {
            library: record.name.clone(),
            path: target.clone(),
            reason: e.to_string(),
        })?;
        json.push('\n');

        // Write to a sibling temp file, then rename over the target.
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| io_err(&self.dir, e))?;
        tmp.write_all(json.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| io_err(tmp.path(), e))?;
        tmp.persist(&target).map_err(|e| io_err(&target, e.error))?;

        info!(
            "Recorded {} v{} at {}",
            record.name,
            record.version,
            target.display()
        );
        Ok(())
    }
}

/// In-memory store, for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryVersionStore {
    records: Mutex<BTreeMap<String, LibraryVersionRecord>>,
}

impl MemoryVersionStore {
    /// Seed a store with the given records.
    pub fn with_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = LibraryVersionRecord>,
    {
        Self {
            records: Mutex::new(records.into_iter().map(|r| (r.name.clone(), r)).collect()),
        }
    }
}

impl VersionStore for MemoryVersionStore {
    fn read_all(&self) -> Result<BTreeMap<String, LibraryVersionRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }

    fn write_one(&self, record: &LibraryVersionRecord) -> Result<(), StoreError> {
        validate_library_name(&record.name)?;
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(record.name.clone(), record.clone());
        Ok(())
    }
}
