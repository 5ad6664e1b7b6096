//! Audio feature retrieval from the remote track store
//!
//! Unlike the per-track stages, features come back in batches of up to 100
//! ids per request, so this stage drives the cache steps itself instead of
//! going through the per-track pipeline. A failed batch degrades to absence
//! for its ids and never aborts the remaining batches.

use std::collections::{BTreeMap, HashMap};

use tracing::{info, warn};

use crate::cache::{merge, CacheStore};
use crate::error::Result;
use crate::models::{AudioFeatures, Track};
use crate::pipeline::StageOptions;
use crate::services::remote_store::{RemoteTrackStore, BATCH_LIMIT};

/// Fetch audio features for every track, reusing cached results
///
/// Same cache contract as the per-track pipeline: valid cache ids are never
/// refetched, fresh results merge last-writer-wins, and the merged mapping is
/// persisted before returning.
pub async fn enrich_audio_features(
    store: &dyn RemoteTrackStore,
    tracks: &[Track],
    cache: &CacheStore,
    opts: &StageOptions,
) -> Result<HashMap<String, AudioFeatures>> {
    let path = cache.path(&opts.cache_file);

    let mut results: HashMap<String, AudioFeatures> = HashMap::new();
    if opts.use_cache && !opts.force_refresh && cache.is_valid(&path) {
        if let Some(stage) = cache.load::<AudioFeatures>(&path, opts.cache_key) {
            info!(
                stage = opts.label,
                cached = stage.results.len(),
                timestamp = stage.timestamp.as_deref().unwrap_or("unknown"),
                "loaded stage cache"
            );
            results = stage.results;
        }
    }

    let missing: Vec<String> = tracks
        .iter()
        .filter(|t| !results.contains_key(&t.id))
        .map(|t| t.id.clone())
        .collect();

    if missing.is_empty() {
        info!(stage = opts.label, retained = results.len(), "cache complete");
        return Ok(results);
    }

    info!(
        stage = opts.label,
        missing = missing.len(),
        batches = missing.len().div_ceil(BATCH_LIMIT),
        "fetching audio features"
    );

    let mut fresh: HashMap<String, AudioFeatures> = HashMap::new();
    for batch in missing.chunks(BATCH_LIMIT) {
        match store.fetch_audio_features(batch).await {
            Ok(features) => fresh.extend(features),
            Err(e) => {
                // Ids of a failed batch stay absent and retry next run.
                warn!(stage = opts.label, batch = batch.len(), "batch failed: {}", e);
            }
        }
    }

    let processed = fresh.len();
    merge(&mut results, fresh);

    if opts.use_cache {
        cache.save(&path, opts.cache_key, &results)?;
    }

    info!(
        stage = opts.label,
        processed,
        retained = results.len(),
        "stage complete"
    );

    Ok(results)
}

/// Aggregate view of a feature mapping, for end-of-run reporting
#[derive(Debug, Default)]
pub struct FeatureSummary {
    pub track_count: usize,
    /// feature name -> (min, mean, max), continuous features only
    pub ranges: BTreeMap<String, (f64, f64, f64)>,
    /// discrete feature name -> value name -> track count
    pub distributions: BTreeMap<String, BTreeMap<String, usize>>,
}

fn discrete_name(feature: &str, value: f64) -> Option<String> {
    match feature {
        "key" => {
            if value < 0.0 {
                return None; // key -1 means "not detected"
            }
            Some(
                crate::categorize::KEY_NAMES
                    .get(value as usize)
                    .copied()
                    .unwrap_or("Unknown")
                    .to_string(),
            )
        }
        "mode" => Some(if value == 1.0 { "Major" } else { "Minor" }.to_string()),
        "time_signature" => Some(format!("{}", value as i64)),
        _ => None,
    }
}

/// Summarize features across all tracks
///
/// Continuous features get min/mean/max ranges; the discrete lookups
/// (key, mode, time_signature) get value distributions instead.
pub fn summarize(features: &HashMap<String, AudioFeatures>) -> FeatureSummary {
    let mut sums: BTreeMap<String, (f64, f64, f64, usize)> = BTreeMap::new();
    let mut distributions: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();

    for track_features in features.values() {
        for (name, &value) in track_features {
            if let Some(label) = discrete_name(name, value) {
                *distributions
                    .entry(name.clone())
                    .or_default()
                    .entry(label)
                    .or_default() += 1;
                continue;
            }
            if matches!(name.as_str(), "key" | "mode" | "time_signature") {
                continue; // undetected key
            }
            let entry = sums
                .entry(name.clone())
                .or_insert((f64::INFINITY, 0.0, f64::NEG_INFINITY, 0));
            entry.0 = entry.0.min(value);
            entry.1 += value;
            entry.2 = entry.2.max(value);
            entry.3 += 1;
        }
    }

    FeatureSummary {
        track_count: features.len(),
        ranges: sums
            .into_iter()
            .map(|(name, (min, sum, max, n))| (name, (min, sum / n as f64, max)))
            .collect(),
        distributions,
    }
}
