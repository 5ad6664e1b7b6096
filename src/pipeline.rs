//! Generic cached parallel enrichment driver
//!
//! Every analyzer stage is the same shape: take the current track list, skip
//! ids already present in a valid cache, run the expensive per-track compute
//! concurrently with bounded parallelism, merge, persist, return. This module
//! implements that shape once; adapters supply only the compute function,
//! the cache key/file and a worker bound.

use std::collections::HashMap;
use std::future::Future;

use futures::{stream, StreamExt};
use indicatif::ProgressBar;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{merge, CacheStore};
use crate::error::Result;
use crate::models::Track;

/// Per-stage pipeline parameters
#[derive(Debug, Clone)]
pub struct StageOptions {
    /// Human-readable stage name for progress and logs
    pub label: &'static str,
    /// Top-level semantic key inside the cache file
    pub cache_key: &'static str,
    /// Cache file name inside the cache directory
    pub cache_file: String,
    /// Whether to read and write the cache at all
    pub use_cache: bool,
    /// Recompute every id and replace (not merge) the cached mapping
    pub force_refresh: bool,
    /// Bounded worker count for concurrent compute dispatch
    pub workers: usize,
}

impl StageOptions {
    pub fn new(label: &'static str, cache_key: &'static str, cache_file: &str) -> Self {
        StageOptions {
            label,
            cache_key,
            cache_file: cache_file.to_string(),
            use_cache: true,
            force_refresh: false,
            workers: num_cpus::get().saturating_sub(1).max(1),
        }
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }
}

/// Run one enrichment stage over `tracks`
///
/// `compute` performs the stage's expensive per-track work; returning `None`
/// (missing input, exhausted retries, analyzer failure) records absence for
/// that id and never aborts sibling computations. The returned mapping is the
/// monotonic merge of cached and newly computed results, persisted before
/// this function returns when caching is enabled.
///
/// No id is dispatched twice in one invocation: the missing set is unique by
/// construction. Completion order is irrelevant.
pub async fn enrich<R, F, Fut>(
    tracks: &[Track],
    cache: &CacheStore,
    opts: &StageOptions,
    compute: F,
) -> Result<HashMap<String, R>>
where
    R: Serialize + DeserializeOwned,
    F: Fn(Track) -> Fut,
    Fut: Future<Output = Option<R>>,
{
    let path = cache.path(&opts.cache_file);

    let mut results: HashMap<String, R> = HashMap::new();
    if opts.use_cache && !opts.force_refresh && cache.is_valid(&path) {
        if let Some(stage) = cache.load::<R>(&path, opts.cache_key) {
            tracing::info!(
                stage = opts.label,
                cached = stage.results.len(),
                timestamp = stage.timestamp.as_deref().unwrap_or("unknown"),
                "loaded stage cache"
            );
            results = stage.results;
        }
    }

    let missing: Vec<Track> = tracks
        .iter()
        .filter(|t| !results.contains_key(&t.id))
        .cloned()
        .collect();

    if missing.is_empty() {
        // Every current id is already present: zero work, zero external calls.
        tracing::info!(stage = opts.label, retained = results.len(), "cache complete");
        return Ok(results);
    }

    tracing::info!(
        stage = opts.label,
        missing = missing.len(),
        workers = opts.workers,
        "computing missing tracks"
    );

    let progress = ProgressBar::new(missing.len() as u64);
    let computed: Vec<(String, Option<R>)> = stream::iter(missing.into_iter().map(|track| {
        let id = track.id.clone();
        let fut = compute(track);
        let progress = progress.clone();
        async move {
            let result = fut.await;
            progress.inc(1);
            (id, result)
        }
    }))
    .buffer_unordered(opts.workers.max(1))
    .collect()
    .await;
    progress.finish_and_clear();

    let mut fresh = HashMap::new();
    for (id, result) in computed {
        // Failed or empty computations are recorded as absence, not as
        // null markers; they will be retried on the next run.
        if let Some(result) = result {
            fresh.insert(id, result);
        }
    }

    let processed = fresh.len();
    merge(&mut results, fresh);

    if opts.use_cache {
        cache.save(&path, opts.cache_key, &results)?;
    }

    tracing::info!(
        stage = opts.label,
        processed,
        retained = results.len(),
        "stage complete"
    );

    Ok(results)
}
