//! End-to-end enrichment flow against an in-memory track store

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use trackforge::cache::CacheStore;
use trackforge::categorize;
use trackforge::config::Config;
use trackforge::pipeline::{self, StageOptions};
use trackforge::playlists::create_category_playlists;
use trackforge::services::artwork::ArtworkFetcher;
use trackforge::services::audio_features::enrich_audio_features;
use trackforge::services::remote_store::{
    fetch_library, RemoteTrackStore, StoreError, TrackPage, TrackSource,
};
use trackforge::{AudioFeatures, Track};

fn track(n: usize) -> Track {
    Track {
        id: format!("t{:03}", n),
        name: format!("Track {}", n),
        artist: "Artist".to_string(),
        uri: format!("store:track:t{:03}", n),
        album_name: "Album".to_string(),
        added_at: Some("2024-01-01T00:00:00Z".to_string()),
        // Every third track has no artwork.
        image_url: if n % 4 == 3 {
            None
        } else {
            Some(format!("https://img.example/{}.jpg", n))
        },
    }
}

struct InMemoryStore {
    tracks: Vec<Track>,
    page_calls: AtomicUsize,
    feature_calls: AtomicUsize,
    playlists: Mutex<Vec<(String, Vec<String>)>>,
}

impl InMemoryStore {
    fn with_tracks(count: usize) -> Self {
        InMemoryStore {
            tracks: (0..count).map(track).collect(),
            page_calls: AtomicUsize::new(0),
            feature_calls: AtomicUsize::new(0),
            playlists: Mutex::new(Vec::new()),
        }
    }

    fn energy_for(id: &str) -> f64 {
        // Deterministic spread across the energy buckets.
        let n: usize = id.trim_start_matches('t').parse().unwrap();
        (n % 10) as f64 / 10.0
    }
}

#[async_trait]
impl RemoteTrackStore for InMemoryStore {
    async fn current_user(&self) -> Result<String, StoreError> {
        Ok("listener".to_string())
    }

    async fn saved_tracks_page(&self, limit: usize, offset: usize) -> Result<TrackPage, StoreError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        let page = self
            .tracks
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        Ok(TrackPage { tracks: page, total: self.tracks.len() })
    }

    async fn playlist_tracks_page(
        &self,
        _playlist_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<TrackPage, StoreError> {
        self.saved_tracks_page(limit, offset).await
    }

    async fn fetch_audio_features(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, AudioFeatures>, StoreError> {
        self.feature_calls.fetch_add(1, Ordering::SeqCst);
        if ids.len() > 100 {
            return Err(StoreError::BatchTooLarge(ids.len()));
        }
        Ok(ids
            .iter()
            .map(|id| {
                let mut features = AudioFeatures::new();
                features.insert("energy".to_string(), Self::energy_for(id));
                features.insert("tempo".to_string(), 100.0);
                (id.clone(), features)
            })
            .collect())
    }

    async fn create_playlist(
        &self,
        _user: &str,
        name: &str,
        _public: bool,
        _description: &str,
    ) -> Result<String, StoreError> {
        let mut playlists = self.playlists.lock().unwrap();
        playlists.push((name.to_string(), Vec::new()));
        Ok(format!("pl{}", playlists.len()))
    }

    async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<(), StoreError> {
        if uris.len() > 100 {
            return Err(StoreError::BatchTooLarge(uris.len()));
        }
        let index: usize = playlist_id.trim_start_matches("pl").parse().unwrap();
        let mut playlists = self.playlists.lock().unwrap();
        playlists[index - 1].1.extend(uris.iter().cloned());
        Ok(())
    }

    async fn upload_playlist_cover(&self, _playlist_id: &str, jpeg: &[u8]) -> Result<(), StoreError> {
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "cover must be JPEG");
        Ok(())
    }
}

/// Store whose listing contains unplayable entries (podcast episodes, local
/// files) that carry no track: every 50th raw position yields nothing, so a
/// full page comes back with fewer than `limit` tracks.
struct SparseListingStore {
    raw_total: usize,
    page_calls: AtomicUsize,
}

#[async_trait]
impl RemoteTrackStore for SparseListingStore {
    async fn current_user(&self) -> Result<String, StoreError> {
        Ok("listener".to_string())
    }

    async fn saved_tracks_page(&self, limit: usize, offset: usize) -> Result<TrackPage, StoreError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        let end = (offset + limit).min(self.raw_total);
        let page = (offset..end).filter(|n| n % 50 != 0).map(track).collect();
        Ok(TrackPage { tracks: page, total: self.raw_total })
    }

    async fn playlist_tracks_page(
        &self,
        _playlist_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<TrackPage, StoreError> {
        self.saved_tracks_page(limit, offset).await
    }

    async fn fetch_audio_features(
        &self,
        _ids: &[String],
    ) -> Result<HashMap<String, AudioFeatures>, StoreError> {
        Ok(HashMap::new())
    }

    async fn create_playlist(
        &self,
        _user: &str,
        _name: &str,
        _public: bool,
        _description: &str,
    ) -> Result<String, StoreError> {
        Ok("pl1".to_string())
    }

    async fn add_tracks(&self, _playlist_id: &str, _uris: &[String]) -> Result<(), StoreError> {
        Ok(())
    }

    async fn upload_playlist_cover(&self, _playlist_id: &str, _jpeg: &[u8]) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Store where every request fails, for exercising the degradation paths.
struct UnreachableStore;

#[async_trait]
impl RemoteTrackStore for UnreachableStore {
    async fn current_user(&self) -> Result<String, StoreError> {
        Err(StoreError::Network("unreachable".to_string()))
    }

    async fn saved_tracks_page(&self, _limit: usize, _offset: usize) -> Result<TrackPage, StoreError> {
        Err(StoreError::Network("unreachable".to_string()))
    }

    async fn playlist_tracks_page(
        &self,
        _playlist_id: &str,
        _limit: usize,
        _offset: usize,
    ) -> Result<TrackPage, StoreError> {
        Err(StoreError::Network("unreachable".to_string()))
    }

    async fn fetch_audio_features(
        &self,
        _ids: &[String],
    ) -> Result<HashMap<String, AudioFeatures>, StoreError> {
        Err(StoreError::Network("unreachable".to_string()))
    }

    async fn create_playlist(
        &self,
        _user: &str,
        _name: &str,
        _public: bool,
        _description: &str,
    ) -> Result<String, StoreError> {
        Err(StoreError::Network("unreachable".to_string()))
    }

    async fn add_tracks(&self, _playlist_id: &str, _uris: &[String]) -> Result<(), StoreError> {
        Err(StoreError::Network("unreachable".to_string()))
    }

    async fn upload_playlist_cover(&self, _playlist_id: &str, _jpeg: &[u8]) -> Result<(), StoreError> {
        Err(StoreError::Network("unreachable".to_string()))
    }
}

fn test_config(cache_dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.cache_dir = cache_dir.to_path_buf();
    config.retry_count = 1;
    config.retry_delay_secs = 0;
    config
}

#[tokio::test]
async fn test_library_fetch_paginates_and_caches() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let cache = CacheStore::new(&config.cache_dir, config.cache_expiry_hours);

    // 120 tracks at 50 per page = 3 page requests.
    let store = InMemoryStore::with_tracks(120);
    let tracks = fetch_library(&store, &cache, &config, &TrackSource::Liked, true).await;
    assert_eq!(tracks.len(), 120);
    assert_eq!(store.page_calls.load(Ordering::SeqCst), 3);

    // Second run hits the track cache, zero remote calls.
    let again = fetch_library(&store, &cache, &config, &TrackSource::Liked, true).await;
    assert_eq!(again.len(), 120);
    assert_eq!(store.page_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_pagination_survives_unplayable_listing_items() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let cache = CacheStore::new(&config.cache_dir, config.cache_expiry_hours);

    // 120 raw listing positions, positions 0/50/100 unplayable: every page is
    // full at the listing level but yields only 49 tracks. Pagination must
    // walk the raw positions to the reported total, not stop at the first
    // short page.
    let store = SparseListingStore { raw_total: 120, page_calls: AtomicUsize::new(0) };
    let tracks = fetch_library(&store, &cache, &config, &TrackSource::Liked, false).await;
    assert_eq!(store.page_calls.load(Ordering::SeqCst), 3);
    assert_eq!(tracks.len(), 117);
}

#[tokio::test]
async fn test_no_cache_run_never_serves_stale_tracks() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let cache = CacheStore::new(&config.cache_dir, config.cache_expiry_hours);

    // Seed the on-disk track cache with a successful run.
    let good = InMemoryStore::with_tracks(6);
    let seeded = fetch_library(&good, &cache, &config, &TrackSource::Liked, true).await;
    assert_eq!(seeded.len(), 6);

    // With caching disabled, a dead store must not resurrect the cached copy.
    let down = UnreachableStore;
    let tracks = fetch_library(&down, &cache, &config, &TrackSource::Liked, false).await;
    assert!(tracks.is_empty());

    // With caching enabled the same file is still a valid stale fallback
    // (expired cache store, so the fast path does not short-circuit).
    let expired = CacheStore::new(&config.cache_dir, 0);
    let fallback = fetch_library(&down, &expired, &config, &TrackSource::Liked, true).await;
    assert_eq!(fallback.len(), 6);
}

#[tokio::test]
async fn test_missing_artwork_yields_partial_stage_results() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(dir.path(), 24);

    // 12 tracks, 3 of which (n = 3, 7, 11) have no artwork URL.
    let tracks: Vec<Track> = (0..12).map(track).collect();
    let opts = StageOptions::new("color analysis", "color_analysis", "color_analysis_cache.json")
        .workers(4);

    let results = pipeline::enrich(&tracks, &cache, &opts, |t| async move {
        t.image_url.as_ref()?;
        Some("analyzed".to_string())
    })
    .await
    .unwrap();

    assert_eq!(results.len(), 9);
    assert!(!results.contains_key("t003"));
    assert!(results.contains_key("t000"));
}

#[tokio::test]
async fn test_feature_grouping_and_playlist_creation() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let cache = CacheStore::new(&config.cache_dir, config.cache_expiry_hours);
    let store = InMemoryStore::with_tracks(40);

    let tracks = fetch_library(&store, &cache, &config, &TrackSource::Liked, true).await;
    let opts = StageOptions::new("audio features", "audio_features", "audio_features_cache.json");
    let features = enrich_audio_features(&store, &tracks, &cache, &opts)
        .await
        .unwrap();
    assert_eq!(features.len(), 40);

    let groups = categorize::categorize_by_feature(&tracks, &features, "energy", None);
    // Energies 0.0-0.9 in steps of 0.1: low <= 0.3, medium <= 0.6, high <= 1.0.
    assert_eq!(groups["low"].len(), 16);
    assert_eq!(groups["medium"].len(), 12);
    assert_eq!(groups["high"].len(), 12);

    let fetcher = ArtworkFetcher::new(&config).unwrap();
    let created = create_category_playlists(
        &store,
        &fetcher,
        &groups,
        "Energy: ",
        |c| format!("Songs with {} energy.", c),
        15,
        true,
    )
    .await
    .unwrap();

    // min_tracks = 15 drops medium and high.
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].name, "Energy: low");

    let playlists = store.playlists.lock().unwrap();
    assert_eq!(playlists.len(), 1);
    assert_eq!(playlists[0].1.len(), 16);
}

#[tokio::test]
async fn test_cached_features_skip_remote_calls() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let cache = CacheStore::new(&config.cache_dir, config.cache_expiry_hours);
    let store = InMemoryStore::with_tracks(10);

    let tracks: Vec<Track> = (0..10).map(track).collect();
    let opts = StageOptions::new("audio features", "audio_features", "audio_features_cache.json");

    enrich_audio_features(&store, &tracks, &cache, &opts)
        .await
        .unwrap();
    let first_calls = store.feature_calls.load(Ordering::SeqCst);
    assert_eq!(first_calls, 1);

    let second = enrich_audio_features(&store, &tracks, &cache, &opts)
        .await
        .unwrap();
    assert_eq!(store.feature_calls.load(Ordering::SeqCst), first_calls);
    assert_eq!(second.len(), 10);

    // Growing the library refetches only the new ids.
    let grown: Vec<Track> = (0..12).map(track).collect();
    let merged = enrich_audio_features(&store, &grown, &cache, &opts)
        .await
        .unwrap();
    assert_eq!(store.feature_calls.load(Ordering::SeqCst), first_calls + 1);
    assert_eq!(merged.len(), 12);
}

#[tokio::test]
async fn test_composite_groups_from_fetched_features() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let cache = CacheStore::new(&config.cache_dir, config.cache_expiry_hours);
    let store = InMemoryStore::with_tracks(20);

    let tracks: Vec<Track> = (0..20).map(track).collect();
    let opts = StageOptions::new("audio features", "audio_features", "audio_features_cache.json");
    let features = enrich_audio_features(&store, &tracks, &cache, &opts)
        .await
        .unwrap();

    // The fake store reports energy up to 0.9 but tempo fixed at 100, so the
    // workout predicate (tempo > 120) never fires.
    let groups = categorize::custom_categories(&tracks, &features);
    assert!(!groups.contains_key("workout"));
}
