//! Core data types: tracks and per-stage analysis results
//!
//! All numeric leaves are plain Rust scalars so every result serializes to
//! portable JSON without any post-hoc normalization pass.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single track from the remote store
///
/// Identity is the opaque `id`, stable across runs. Tracks are never mutated
/// after fetch; enrichment results live in per-stage id-keyed maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Opaque remote-store identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Primary artist name
    pub artist: String,
    /// Playable reference, used when adding to playlists
    pub uri: String,
    /// Album title
    pub album_name: String,
    /// Timestamp the track was added to the source collection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<String>,
    /// Album artwork URL, if the album has any images
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Numeric audio feature map (energy, tempo, valence, ...)
///
/// Keys follow the remote store's feature names. Discrete features
/// (key, mode, time_signature) are carried as numbers too and decoded
/// by the categorization engine.
pub type AudioFeatures = BTreeMap<String, f64>;

/// Dominant-color analysis of one album cover
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorAnalysis {
    /// Whether the cover is (near-)grayscale
    pub is_grayscale: bool,
    /// Black/White/Gray, only set for grayscale covers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grayscale_category: Option<String>,
    /// Most dominant RGB color
    pub dominant_color: [u8; 3],
    /// Closest named reference color, absent for grayscale covers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_name: Option<String>,
    /// Broad category the dominant color maps to (Red, Blue, ..., Other)
    pub color_category: String,
    /// All cluster colors, ordered by pixel share descending
    pub dominant_colors: Vec<[u8; 3]>,
    /// Pixel share of each cluster, percent, same order as `dominant_colors`
    pub color_percentages: Vec<f64>,
    /// Percentage-weighted average hue/saturation/value across clusters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_hsv: Option<[f64; 3]>,
}

/// One detected object in an album cover
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Detector class name (e.g. "person", "guitar")
    pub class: String,
    /// Detection confidence, 0-1
    pub confidence: f64,
    /// Bounding box as [x1, y1, x2, y2]
    pub bbox: [f64; 4],
}

/// Sentiment summary of one track's lyrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentSummary {
    /// Polarity, -1 (negative) to 1 (positive)
    pub polarity: f64,
    /// Subjectivity, 0 (objective) to 1 (subjective)
    pub subjectivity: f64,
    /// Occurrence counts of the five fixed emotion keyword sets
    pub emotion_counts: BTreeMap<String, usize>,
    /// Total word count of the cleaned lyrics
    pub word_count: usize,
    /// Whether the lyrics match the profanity set
    pub is_explicit: bool,
}

/// Full lyrics analysis for one track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricsAnalysis {
    pub sentiment: SentimentSummary,
    /// Most frequent non-stopword terms with their counts
    pub topics: Vec<(String, usize)>,
}

/// Convert an RGB color (0-255 channels) to HSV (each component 0-1)
pub fn rgb_to_hsv(rgb: [u8; 3]) -> [f64; 3] {
    let r = rgb[0] as f64 / 255.0;
    let g = rgb[1] as f64 / 255.0;
    let b = rgb[2] as f64 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        (((g - b) / delta).rem_euclid(6.0)) / 6.0
    } else if max == g {
        ((b - r) / delta + 2.0) / 6.0
    } else {
        ((r - g) / delta + 4.0) / 6.0
    };

    let s = if max == 0.0 { 0.0 } else { delta / max };

    [h, s, max]
}
