//! Per-stage cache files
//!
//! One JSON file per enrichment stage, shaped as
//! `{ "<semantic key>": { track_id: result, ... }, "timestamp": "YYYY-MM-DD HH:MM:SS" }`.
//! Validity is age-based on the file's mtime. Loads fail soft (missing or
//! malformed files are a cache miss); saves fail loud, since silently losing
//! computed work would be invisible until the next expensive run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// Timestamp format written into every cache file
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A loaded stage cache: the id-to-result mapping plus its write timestamp
#[derive(Debug, Clone)]
pub struct CachedStage<R> {
    pub results: HashMap<String, R>,
    pub timestamp: Option<String>,
}

/// Age-validated JSON cache store
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
    max_age: Duration,
}

impl CacheStore {
    /// Create a store rooted at `dir` with the given expiry
    pub fn new(dir: impl Into<PathBuf>, max_age_hours: u64) -> Self {
        CacheStore {
            dir: dir.into(),
            max_age: Duration::from_secs(max_age_hours * 3600),
        }
    }

    /// Resolve a cache file name inside the store directory
    pub fn path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Whether the file exists and is younger than the configured expiry
    ///
    /// Any stat error is treated as invalid: failing closed here just means
    /// recomputation, never data loss.
    pub fn is_valid(&self, path: &Path) -> bool {
        let mtime = match std::fs::metadata(path).and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(_) => return false,
        };

        match SystemTime::now().duration_since(mtime) {
            Ok(age) => age < self.max_age,
            Err(_) => false, // mtime in the future
        }
    }

    /// Load one stage mapping from a cache file
    ///
    /// Returns `None` for a missing file, unreadable content, or content that
    /// does not hold the expected key. A malformed cache is a cache miss, not
    /// an error; the stage recomputes from scratch.
    pub fn load<R: DeserializeOwned>(&self, path: &Path, key: &str) -> Option<CachedStage<R>> {
        let content = std::fs::read_to_string(path).ok()?;
        let value: Value = serde_json::from_str(&content).ok()?;

        let timestamp = value
            .get("timestamp")
            .and_then(Value::as_str)
            .map(str::to_string);

        let results: HashMap<String, R> =
            serde_json::from_value(value.get(key)?.clone()).ok()?;

        Some(CachedStage { results, timestamp })
    }

    /// Persist one stage mapping, stamping the current local time
    ///
    /// Creates parent directories as needed. I/O errors propagate.
    pub fn save<R: Serialize>(
        &self,
        path: &Path,
        key: &str,
        results: &HashMap<String, R>,
    ) -> Result<()> {
        self.save_value(path, key, results)
    }

    /// Persist an arbitrary value (e.g. the raw track list) under `key`
    pub fn save_value<T: Serialize>(&self, path: &Path, key: &str, value: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        let record = serde_json::json!({
            key: value,
            "timestamp": timestamp,
        });

        std::fs::write(path, serde_json::to_string_pretty(&record)?)?;
        tracing::debug!(path = %path.display(), key, "cache written");
        Ok(())
    }

    /// Load an arbitrary value stored under `key`, fail-soft
    pub fn load_value<T: DeserializeOwned>(&self, path: &Path, key: &str) -> Option<T> {
        let content = std::fs::read_to_string(path).ok()?;
        let value: Value = serde_json::from_str(&content).ok()?;
        serde_json::from_value(value.get(key)?.clone()).ok()
    }
}

/// Monotonic cache merge: last writer wins per id, nothing is dropped
///
/// The single merge used by every stage; new results extend or overwrite the
/// existing mapping and never truncate it.
pub fn merge<R>(into: &mut HashMap<String, R>, from: HashMap<String, R>) {
    into.extend(from);
}
