//! Categorization engine
//!
//! Deterministic rules mapping feature values to named buckets. Two modes:
//! exclusive single-feature threshold bucketing (first matching threshold
//! wins) and non-exclusive composite categories built from boolean
//! combinations of several features.

use std::collections::HashMap;

use crate::models::{AudioFeatures, Track};

/// Ordered threshold table: (category name, inclusive upper bound)
///
/// Order is significant; thresholds must ascend.
pub type ThresholdTable = Vec<(String, f64)>;

/// Note names indexed by the store's 0-11 pitch-class encoding
pub const KEY_NAMES: [&str; 12] = [
    "C", "C♯/D♭", "D", "D♯/E♭", "E", "F", "F♯/G♭", "G", "G♯/A♭", "A", "A♯/B♭", "B",
];

fn table(entries: &[(&str, f64)]) -> ThresholdTable {
    entries
        .iter()
        .map(|(name, max)| (name.to_string(), *max))
        .collect()
}

/// Default threshold tables for the known feature names
///
/// Unknown features fall back to a generic low/medium/high split.
pub fn default_thresholds(feature: &str) -> ThresholdTable {
    match feature {
        "energy" => table(&[("low", 0.3), ("medium", 0.6), ("high", 1.0)]),
        "danceability" => table(&[("low", 0.4), ("medium", 0.7), ("high", 1.0)]),
        "valence" => table(&[("sad", 0.3), ("neutral", 0.6), ("happy", 1.0)]),
        "acousticness" => table(&[("low", 0.3), ("medium", 0.7), ("high", 1.0)]),
        "tempo" => table(&[
            ("slow", 95.0),
            ("medium", 120.0),
            ("fast", 180.0),
            ("very_fast", 300.0),
        ]),
        "loudness" => table(&[("quiet", -20.0), ("medium", -10.0), ("loud", 0.0)]),
        "instrumentalness" => table(&[("vocal", 0.2), ("mixed", 0.7), ("instrumental", 1.0)]),
        "speechiness" => table(&[
            ("music", 0.33),
            ("music_and_speech", 0.66),
            ("speech", 1.0),
        ]),
        "liveness" => table(&[("studio", 0.4), ("live", 1.0)]),
        _ => table(&[("low", 0.33), ("medium", 0.67), ("high", 1.0)]),
    }
}

/// Assign a value to exactly one category: first threshold >= value wins
///
/// Values above the final threshold land in the last category, so the
/// assignment is total over any finite value.
pub fn bucket_for<'a>(value: f64, thresholds: &'a [(String, f64)]) -> Option<&'a str> {
    for (name, max) in thresholds {
        if value <= *max {
            return Some(name);
        }
    }
    thresholds.last().map(|(name, _)| name.as_str())
}

/// Bucket tracks by one audio feature
///
/// Exclusive: each track with the feature present lands in exactly one
/// bucket. Tracks missing the feature are skipped. `key`, `mode` and
/// `time_signature` use discrete name lookups instead of thresholds.
/// Empty buckets are never produced.
pub fn categorize_by_feature(
    tracks: &[Track],
    features: &HashMap<String, AudioFeatures>,
    feature: &str,
    thresholds: Option<ThresholdTable>,
) -> HashMap<String, Vec<Track>> {
    let thresholds = thresholds.unwrap_or_else(|| default_thresholds(feature));
    let mut groups: HashMap<String, Vec<Track>> = HashMap::new();

    for track in tracks {
        let value = match features.get(&track.id).and_then(|f| f.get(feature)) {
            Some(v) => *v,
            None => continue,
        };

        let category = match feature {
            "key" => {
                if value < 0.0 {
                    continue; // key -1 means "not detected"
                }
                KEY_NAMES
                    .get(value as usize)
                    .copied()
                    .unwrap_or("Unknown")
                    .to_string()
            }
            "mode" => if value == 1.0 { "Major" } else { "Minor" }.to_string(),
            "time_signature" => match value as i64 {
                3 => "3/4".to_string(),
                4 => "4/4".to_string(),
                5 => "5/4".to_string(),
                6 => "6/8".to_string(),
                _ => "Other".to_string(),
            },
            _ => match bucket_for(value, &thresholds) {
                Some(name) => name.to_string(),
                None => continue, // empty threshold table
            },
        };

        groups.entry(category).or_default().push(track.clone());
    }

    groups
}

/// A composite category: a named boolean predicate over several features
struct CompositeRule {
    name: &'static str,
    requires: &'static [&'static str],
    applies: fn(&AudioFeatures) -> bool,
}

fn get(f: &AudioFeatures, name: &str) -> f64 {
    // Only called after the `requires` check, so the key is present.
    f.get(name).copied().unwrap_or(f64::NAN)
}

const COMPOSITE_RULES: &[CompositeRule] = &[
    CompositeRule {
        name: "workout",
        requires: &["energy", "tempo"],
        applies: |f| get(f, "energy") > 0.7 && get(f, "tempo") > 120.0,
    },
    CompositeRule {
        name: "chill",
        requires: &["energy", "acousticness"],
        applies: |f| get(f, "energy") < 0.4 && get(f, "acousticness") > 0.6,
    },
    CompositeRule {
        name: "party",
        requires: &["danceability", "energy"],
        applies: |f| get(f, "danceability") > 0.7 && get(f, "energy") > 0.7,
    },
    CompositeRule {
        name: "focus",
        requires: &["instrumentalness", "speechiness"],
        applies: |f| get(f, "instrumentalness") > 0.5 && get(f, "speechiness") < 0.1,
    },
    CompositeRule {
        name: "happy",
        requires: &["valence", "energy"],
        applies: |f| get(f, "valence") > 0.7 && get(f, "energy") > 0.5,
    },
    CompositeRule {
        name: "sad",
        requires: &["valence", "energy"],
        applies: |f| get(f, "valence") < 0.3 && get(f, "energy") < 0.6,
    },
    CompositeRule {
        name: "acoustic",
        requires: &["acousticness"],
        applies: |f| get(f, "acousticness") > 0.8,
    },
    CompositeRule {
        name: "electronic",
        requires: &["acousticness", "energy"],
        applies: |f| get(f, "acousticness") < 0.3 && get(f, "energy") > 0.7,
    },
    CompositeRule {
        name: "intense",
        requires: &["energy", "loudness"],
        applies: |f| get(f, "energy") > 0.8 && get(f, "loudness") > -5.0,
    },
    CompositeRule {
        name: "background",
        requires: &["energy", "loudness"],
        applies: |f| get(f, "energy") < 0.3 && get(f, "loudness") < -15.0,
    },
];

/// Bucket tracks into the fixed composite categories
///
/// Non-exclusive: a track appears in every category whose predicate it
/// satisfies. A track missing any of a rule's required features is excluded
/// from that rule's evaluation, not defaulted. Empty buckets are dropped.
pub fn custom_categories(
    tracks: &[Track],
    features: &HashMap<String, AudioFeatures>,
) -> HashMap<String, Vec<Track>> {
    let mut groups: HashMap<String, Vec<Track>> = HashMap::new();

    for track in tracks {
        let f = match features.get(&track.id) {
            Some(f) => f,
            None => continue,
        };

        for rule in COMPOSITE_RULES {
            if !rule.requires.iter().all(|name| f.contains_key(*name)) {
                continue;
            }
            if (rule.applies)(f) {
                groups.entry(rule.name.to_string()).or_default().push(track.clone());
            }
        }
    }

    groups
}
