//! Configuration for trackforge
//!
//! One explicit struct passed into the pipeline and adapter constructors.
//! Loaded from a TOML file when present, otherwise defaults apply; every
//! field has a default so partial files work.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Recognized configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the per-stage cache files
    pub cache_dir: PathBuf,
    /// Cache expiry in hours; older files are treated as invalid
    pub cache_expiry_hours: u64,
    /// Bounded retry count for external fetches
    pub retry_count: u32,
    /// Fixed delay between retries, seconds
    pub retry_delay_secs: u64,
    /// Worker count for mixed CPU/network stages
    pub worker_count: usize,
    /// Smaller worker bound for rate-limited external APIs
    pub api_worker_count: usize,
    /// Minimum confidence passed to the object detector
    pub detector_confidence: f64,
    /// Minimum confidence for a detection to contribute to a group
    pub detector_grouping_confidence: f64,
    /// Categories with fewer tracks than this never become playlists
    pub min_tracks: usize,
    /// Remote track store base URL
    pub store_base_url: String,
    /// Remote track store bearer token
    pub store_token: String,
    /// Lyrics provider base URL; empty disables the lyrics stage
    pub lyrics_base_url: String,
    /// Object detector command; probed at startup, absence skips the stage
    pub detector_command: String,
    /// Timeout for artwork downloads, seconds
    pub image_timeout_secs: u64,
    /// Timeout for remote API requests, seconds
    pub api_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let cache_dir = dirs::cache_dir()
            .map(|d| d.join("trackforge"))
            .unwrap_or_else(|| PathBuf::from(".trackforge-cache"));

        Config {
            cache_dir,
            cache_expiry_hours: 24,
            retry_count: 5,
            retry_delay_secs: 3,
            worker_count: num_cpus::get().saturating_sub(1).max(1),
            api_worker_count: 5,
            detector_confidence: 0.4,
            detector_grouping_confidence: 0.5,
            min_tracks: 5,
            store_base_url: "https://api.spotify.com/v1".to_string(),
            store_token: String::new(),
            lyrics_base_url: String::new(),
            detector_command: "artdetect".to_string(),
            image_timeout_secs: 10,
            api_timeout_secs: 20,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// A missing file yields the defaults; a malformed file is an error
    /// (silently ignoring a user's config would be worse than failing).
    pub fn load(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("read {} failed: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("parse {} failed: {}", path.display(), e)))
    }

    /// Resolve a cache file name inside the configured cache directory
    pub fn cache_path(&self, file_name: &str) -> PathBuf {
        self.cache_dir.join(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.cache_expiry_hours, 24);
        assert_eq!(cfg.retry_count, 5);
        assert_eq!(cfg.api_worker_count, 5);
        assert!(cfg.worker_count >= 1);
        assert_eq!(cfg.min_tracks, 5);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let cfg = Config::load(Path::new("/nonexistent/trackforge.toml")).unwrap();
        assert_eq!(cfg.cache_expiry_hours, 24);
    }

    #[test]
    fn test_partial_toml_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trackforge.toml");
        std::fs::write(&path, "cache_expiry_hours = 6\nmin_tracks = 3\n").unwrap();

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.cache_expiry_hours, 6);
        assert_eq!(cfg.min_tracks, 3);
        // Untouched fields keep defaults
        assert_eq!(cfg.retry_count, 5);
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trackforge.toml");
        std::fs::write(&path, "cache_expiry_hours = \"not a number").unwrap();

        assert!(Config::load(&path).is_err());
    }
}
