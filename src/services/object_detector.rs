//! Object detection on album artwork via an external detector command
//!
//! The detector binary is an optional capability probed once at startup.
//! Contract: `<command> <image_path> <output_json>` writes a JSON document
//! `{"detections": [{"class": "...", "confidence": 0.0-1.0, "bbox": [x, y, w, h]}]}`
//! to the output path and exits 0.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::process::Stdio;

use image::DynamicImage;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{Detection, Track};
use crate::services::artwork::ArtworkFetcher;
use crate::services::Capability;

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("detector command not found: {0}")]
    CommandNotFound(String),

    #[error("detector exited with failure: {0}")]
    ExecutionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse detector output: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct DetectorOutput {
    #[serde(default)]
    detections: Vec<Detection>,
}

/// Client for the external object-detection command
pub struct DetectorClient {
    command: String,
    min_confidence: f64,
}

impl DetectorClient {
    /// Probe the configured detector command
    ///
    /// Runs `--version` once; a command that cannot be spawned means the
    /// capability is absent.
    pub fn new(config: &Config) -> Result<Self, DetectorError> {
        match std::process::Command::new(&config.detector_command)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .output()
        {
            Ok(_) => Ok(Self {
                command: config.detector_command.clone(),
                min_confidence: config.detector_confidence,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(DetectorError::CommandNotFound(config.detector_command.clone()))
            }
            Err(e) => Err(DetectorError::Io(e)),
        }
    }

    /// Resolve the detector as an optional capability
    pub fn resolve(config: &Config) -> Capability<DetectorClient> {
        match Self::new(config) {
            Ok(client) => Capability::Present(client),
            Err(e) => {
                warn!("object detector unavailable, stage will be skipped: {}", e);
                Capability::Absent
            }
        }
    }

    /// Run detection on one decoded cover image
    ///
    /// Detections below the configured confidence floor are dropped.
    pub async fn detect(&self, image: &DynamicImage, tag: &str) -> Result<Vec<Detection>, DetectorError> {
        let temp_dir = std::env::temp_dir();
        let pid = std::process::id();
        let input_path = temp_dir.join(format!("detect_{}_{}.png", pid, tag));
        let output_path = temp_dir.join(format!("detect_{}_{}.json", pid, tag));

        let write_result = {
            let image = image.clone();
            let path = input_path.clone();
            tokio::task::spawn_blocking(move || image.save(&path))
                .await
                .map_err(|e| DetectorError::ExecutionFailed(e.to_string()))?
        };
        if let Err(e) = write_result {
            return Err(DetectorError::ExecutionFailed(format!("writing temp image: {}", e)));
        }

        let result = self.run_command(&input_path, &output_path).await;

        // Temp files are best-effort cleanup.
        let _ = std::fs::remove_file(&input_path);
        let _ = std::fs::remove_file(&output_path);

        result
    }

    async fn run_command(
        &self,
        input_path: &PathBuf,
        output_path: &PathBuf,
    ) -> Result<Vec<Detection>, DetectorError> {
        let output = tokio::process::Command::new(&self.command)
            .arg(input_path)
            .arg(output_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DetectorError::ExecutionFailed(stderr.trim().to_string()));
        }

        let json = std::fs::read_to_string(output_path)?;
        let parsed: DetectorOutput = serde_json::from_str(&json)?;

        let retained: Vec<Detection> = parsed
            .detections
            .into_iter()
            .filter(|d| d.confidence >= self.min_confidence)
            .collect();

        debug!(count = retained.len(), "detector run complete");
        Ok(retained)
    }
}

/// Per-track compute function for the object stage
///
/// A track with no artwork, a failed download, or a failed detector run
/// yields `None`. A successful run with zero detections is a real result
/// and yields an empty list.
pub async fn compute(
    client: &DetectorClient,
    fetcher: &ArtworkFetcher,
    track: &Track,
) -> Option<Vec<Detection>> {
    let url = track.image_url.as_ref()?;
    let image = fetcher.fetch(url).await?;

    match client.detect(&image, &track.id).await {
        Ok(detections) => Some(detections),
        Err(e) => {
            warn!(track_id = %track.id, "object detection failed: {}", e);
            None
        }
    }
}

/// Group tracks by detected object class
///
/// A track lands in the group of every class with at least one detection at
/// or above the grouping confidence, so groups are non-exclusive. Tracks
/// with no qualifying detections appear in no group.
pub fn group_by_object(
    tracks: &[Track],
    detections: &HashMap<String, Vec<Detection>>,
    grouping_confidence: f64,
) -> HashMap<String, Vec<Track>> {
    let mut groups: HashMap<String, Vec<Track>> = HashMap::new();

    for track in tracks {
        let Some(track_detections) = detections.get(&track.id) else {
            continue;
        };

        let classes: BTreeSet<&str> = track_detections
            .iter()
            .filter(|d| d.confidence >= grouping_confidence)
            .map(|d| d.class.as_str())
            .collect();

        for class in classes {
            groups.entry(class.to_string()).or_default().push(track.clone());
        }
    }

    groups
}
