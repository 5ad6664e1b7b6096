//! Remote track store client
//!
//! The store is a consumed capability: paginated saved-track and playlist
//! listings, batched audio-feature lookups, playlist creation and cover
//! upload. The HTTP implementation targets a Spotify-style Web API; tests
//! substitute an in-memory implementation of the same trait.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::cache::CacheStore;
use crate::config::Config;
use crate::models::{AudioFeatures, Track};

/// Maximum ids/uris per batched request, imposed by the store API
pub const BATCH_LIMIT: usize = 100;

/// Page size for track listing requests
const PAGE_SIZE: usize = 50;

/// Minimum interval between requests to stay under the store's rate limit
const RATE_LIMIT_MS: u64 = 100;

/// Remote store client errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Network communication error (includes timeouts)
    #[error("Network error: {0}")]
    Network(String),

    /// Store signalled a rate limit (HTTP 429)
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Store API returned an error response
    #[error("API error {0}: {1}")]
    Api(u16, String),

    /// Failed to parse API response JSON
    #[error("Parse error: {0}")]
    Parse(String),

    /// Batched call exceeded the 100-item API limit
    #[error("Batch of {0} exceeds the {BATCH_LIMIT}-item API limit")]
    BatchTooLarge(usize),
}

impl StoreError {
    /// Whether a bounded retry with fixed delay is worthwhile
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Network(_) | StoreError::RateLimited)
    }
}

/// One page of a track listing
#[derive(Debug, Clone)]
pub struct TrackPage {
    pub tracks: Vec<Track>,
    pub total: usize,
}

/// Remote track store capability
#[async_trait]
pub trait RemoteTrackStore: Send + Sync {
    /// Current user's id, used as playlist owner
    async fn current_user(&self) -> Result<String, StoreError>;

    /// One page of the user's saved tracks
    async fn saved_tracks_page(&self, limit: usize, offset: usize)
        -> Result<TrackPage, StoreError>;

    /// One page of a playlist's tracks
    async fn playlist_tracks_page(
        &self,
        playlist_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<TrackPage, StoreError>;

    /// Audio features for up to [`BATCH_LIMIT`] track ids
    ///
    /// Ids the store has no features for are simply absent from the result.
    async fn fetch_audio_features(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, AudioFeatures>, StoreError>;

    /// Create a playlist, returning its id
    async fn create_playlist(
        &self,
        user: &str,
        name: &str,
        public: bool,
        description: &str,
    ) -> Result<String, StoreError>;

    /// Add up to [`BATCH_LIMIT`] track uris to a playlist
    async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<(), StoreError>;

    /// Upload a JPEG playlist cover (sent base64-encoded)
    async fn upload_playlist_cover(
        &self,
        playlist_id: &str,
        jpeg: &[u8],
    ) -> Result<(), StoreError>;
}

/// Rate limiter enforcing a minimum inter-request interval
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    /// Wait if necessary to comply with the rate limit
    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }

        *last = Some(Instant::now());
    }
}

// Wire DTOs for the HTTP implementation.

#[derive(Debug, Deserialize)]
struct ListingResponse {
    items: Vec<ListingItem>,
    total: usize,
}

#[derive(Debug, Deserialize)]
struct ListingItem {
    added_at: Option<String>,
    track: Option<TrackDto>,
}

#[derive(Debug, Deserialize)]
struct TrackDto {
    id: Option<String>,
    name: String,
    uri: String,
    artists: Vec<ArtistDto>,
    album: AlbumDto,
}

#[derive(Debug, Deserialize)]
struct ArtistDto {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AlbumDto {
    name: String,
    #[serde(default)]
    images: Vec<ImageDto>,
}

#[derive(Debug, Deserialize)]
struct ImageDto {
    url: String,
}

#[derive(Debug, Deserialize)]
struct AudioFeaturesResponse {
    audio_features: Vec<Option<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct CreatedPlaylistDto {
    id: String,
}

#[derive(Debug, Deserialize)]
struct UserDto {
    id: String,
}

impl ListingItem {
    fn into_track(self) -> Option<Track> {
        let dto = self.track?;
        Some(Track {
            id: dto.id?,
            name: dto.name,
            artist: dto.artists.first().map(|a| a.name.clone()).unwrap_or_default(),
            uri: dto.uri,
            album_name: dto.album.name,
            added_at: self.added_at,
            image_url: dto.album.images.first().map(|i| i.url.clone()),
        })
    }
}

/// HTTP remote track store client
pub struct HttpTrackStore {
    http_client: reqwest::Client,
    base_url: String,
    token: String,
    rate_limiter: Arc<RateLimiter>,
}

impl HttpTrackStore {
    pub fn new(base_url: &str, token: &str, timeout_secs: u64) -> Result<Self, StoreError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| StoreError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            rate_limiter: Arc::new(RateLimiter::new(RATE_LIMIT_MS)),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, StoreError> {
        self.rate_limiter.wait().await;

        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "store GET");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(StoreError::RateLimited);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(StoreError::Api(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| StoreError::Parse(e.to_string()))
    }

    async fn listing_page(&self, path: &str) -> Result<TrackPage, StoreError> {
        let listing: ListingResponse = self.get_json(path).await?;
        let total = listing.total;
        let tracks = listing
            .items
            .into_iter()
            .filter_map(ListingItem::into_track)
            .collect();
        Ok(TrackPage { tracks, total })
    }

    async fn send_checked(&self, request: reqwest::RequestBuilder) -> Result<(), StoreError> {
        self.rate_limiter.wait().await;

        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(StoreError::RateLimited);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(StoreError::Api(status.as_u16(), error_text));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteTrackStore for HttpTrackStore {
    async fn current_user(&self) -> Result<String, StoreError> {
        let user: UserDto = self.get_json("/me").await?;
        Ok(user.id)
    }

    async fn saved_tracks_page(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<TrackPage, StoreError> {
        self.listing_page(&format!("/me/tracks?limit={}&offset={}", limit, offset))
            .await
    }

    async fn playlist_tracks_page(
        &self,
        playlist_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<TrackPage, StoreError> {
        self.listing_page(&format!(
            "/playlists/{}/tracks?limit={}&offset={}",
            playlist_id, limit, offset
        ))
        .await
    }

    async fn fetch_audio_features(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, AudioFeatures>, StoreError> {
        if ids.len() > BATCH_LIMIT {
            return Err(StoreError::BatchTooLarge(ids.len()));
        }
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let response: AudioFeaturesResponse = self
            .get_json(&format!("/audio-features?ids={}", ids.join(",")))
            .await?;

        let mut features = HashMap::new();
        for (id, entry) in ids.iter().zip(response.audio_features) {
            // Some tracks have no features; those ids stay absent.
            let Some(serde_json::Value::Object(map)) = entry else {
                continue;
            };
            let numeric: AudioFeatures = map
                .into_iter()
                .filter_map(|(k, v)| v.as_f64().map(|n| (k, n)))
                .collect();
            if !numeric.is_empty() {
                features.insert(id.clone(), numeric);
            }
        }
        Ok(features)
    }

    async fn create_playlist(
        &self,
        user: &str,
        name: &str,
        public: bool,
        description: &str,
    ) -> Result<String, StoreError> {
        self.rate_limiter.wait().await;

        let url = format!("{}/users/{}/playlists", self.base_url, user);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({
                "name": name,
                "public": public,
                "description": description,
            }))
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(StoreError::Api(status.as_u16(), error_text));
        }

        let created: CreatedPlaylistDto = response
            .json()
            .await
            .map_err(|e| StoreError::Parse(e.to_string()))?;
        Ok(created.id)
    }

    async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<(), StoreError> {
        if uris.len() > BATCH_LIMIT {
            return Err(StoreError::BatchTooLarge(uris.len()));
        }

        let url = format!("{}/playlists/{}/tracks", self.base_url, playlist_id);
        let request = self
            .http_client
            .post(&url)
            .json(&serde_json::json!({ "uris": uris }));
        self.send_checked(request).await
    }

    async fn upload_playlist_cover(
        &self,
        playlist_id: &str,
        jpeg: &[u8],
    ) -> Result<(), StoreError> {
        let url = format!("{}/playlists/{}/images", self.base_url, playlist_id);
        let request = self
            .http_client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .body(BASE64.encode(jpeg));
        self.send_checked(request).await
    }
}

/// Where the track list comes from
#[derive(Debug, Clone)]
pub enum TrackSource {
    /// The user's saved/liked tracks
    Liked,
    /// A specific playlist
    Playlist(String),
}

impl TrackSource {
    /// Cache file name for this source's raw track list
    pub fn cache_file(&self) -> String {
        match self {
            TrackSource::Liked => "tracks_cache.json".to_string(),
            TrackSource::Playlist(id) => format!("playlist_{}_cache.json", id),
        }
    }
}

/// Retry a transient-failure-prone operation with a fixed delay
async fn with_retries<T, F, Fut>(
    retries: u32,
    delay: Duration,
    mut op: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt + 1 < retries.max(1) => {
                attempt += 1;
                tracing::warn!(
                    attempt,
                    retries,
                    error = %e,
                    "transient store error, retrying after fixed delay"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Fetch the full track list for a source, with caching and degradation
///
/// Order of preference: valid cache, paginated remote fetch (each page
/// retried with a fixed delay and capped attempts), stale cache as fallback
/// once retries are exhausted, and finally whatever partial pages were
/// accumulated. Partial results are cached so the next run can resume.
pub async fn fetch_library(
    store: &dyn RemoteTrackStore,
    cache: &CacheStore,
    config: &Config,
    source: &TrackSource,
    use_cache: bool,
) -> Vec<Track> {
    let cache_path = cache.path(&source.cache_file());

    if use_cache && cache.is_valid(&cache_path) {
        if let Some(tracks) = cache.load_value::<Vec<Track>>(&cache_path, "tracks") {
            tracing::info!(count = tracks.len(), "using cached track list");
            return tracks;
        }
        tracing::warn!("track cache exists but is malformed, refetching");
    }

    let retry_delay = Duration::from_secs(config.retry_delay_secs);
    let mut tracks: Vec<Track> = Vec::new();
    let mut offset = 0usize;

    loop {
        let page_offset = offset;
        let page = with_retries(config.retry_count, retry_delay, move || async move {
            match source {
                TrackSource::Liked => store.saved_tracks_page(PAGE_SIZE, page_offset).await,
                TrackSource::Playlist(id) => {
                    store.playlist_tracks_page(id, PAGE_SIZE, page_offset).await
                }
            }
        })
        .await;

        let page = match page {
            Ok(page) => page,
            Err(e) => {
                tracing::error!(error = %e, fetched = tracks.len(), "track fetch failed");
                // Prefer the last cache on disk, however old, over losing
                // data; unless the caller asked to bypass the cache.
                if use_cache {
                    if let Some(cached) = cache.load_value::<Vec<Track>>(&cache_path, "tracks") {
                        tracing::warn!(count = cached.len(), "falling back to stale track cache");
                        return cached;
                    }
                }
                if use_cache && !tracks.is_empty() {
                    if let Err(e) = cache.save_value(&cache_path, "tracks", &tracks) {
                        tracing::warn!(error = %e, "failed to cache partial track list");
                    }
                }
                return tracks;
            }
        };

        tracks.extend(page.tracks);
        offset += PAGE_SIZE;

        // Terminate on raw listing position, not retained count: a page may
        // contain items with no playable track (local or unavailable
        // entries), so a full page can yield fewer than PAGE_SIZE tracks.
        if offset >= page.total {
            break;
        }
    }

    tracing::info!(count = tracks.len(), "fetched track list");

    if use_cache {
        if let Err(e) = cache.save_value(&cache_path, "tracks", &tracks) {
            tracing::warn!(error = %e, "failed to cache track list");
        }
    }

    tracks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_interval() {
        let limiter = RateLimiter::new(250);
        assert_eq!(limiter.min_interval, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_rate_limiter_spacing() {
        let limiter = RateLimiter::new(50);
        let start = Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(45));
    }

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::Network("timeout".into()).is_transient());
        assert!(StoreError::RateLimited.is_transient());
        assert!(!StoreError::Api(401, "unauthorized".into()).is_transient());
        assert!(!StoreError::Parse("bad json".into()).is_transient());
    }

    #[test]
    fn test_track_source_cache_files() {
        assert_eq!(TrackSource::Liked.cache_file(), "tracks_cache.json");
        assert_eq!(
            TrackSource::Playlist("p1".into()).cache_file(),
            "playlist_p1_cache.json"
        );
    }

    #[test]
    fn test_listing_item_without_track_is_skipped() {
        let item = ListingItem {
            added_at: Some("2024-01-01T00:00:00Z".into()),
            track: None,
        };
        assert!(item.into_track().is_none());
    }

    #[test]
    fn test_listing_item_maps_fields() {
        let json = r#"{
            "added_at": "2024-05-01T12:00:00Z",
            "track": {
                "id": "t1",
                "name": "Song",
                "uri": "store:track:t1",
                "artists": [{"name": "First"}, {"name": "Second"}],
                "album": {"name": "Album", "images": [{"url": "https://img/1"}]}
            }
        }"#;
        let item: ListingItem = serde_json::from_str(json).unwrap();
        let track = item.into_track().unwrap();
        assert_eq!(track.id, "t1");
        assert_eq!(track.artist, "First");
        assert_eq!(track.image_url.as_deref(), Some("https://img/1"));
        assert_eq!(track.added_at.as_deref(), Some("2024-05-01T12:00:00Z"));
    }

    #[tokio::test]
    async fn test_with_retries_gives_up_on_permanent_errors() {
        let mut calls = 0;
        let result: Result<(), StoreError> =
            with_retries(5, Duration::from_millis(1), || {
                calls += 1;
                async { Err(StoreError::Api(400, "bad request".into())) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_with_retries_retries_transient_then_succeeds() {
        let mut calls = 0;
        let result = with_retries(5, Duration::from_millis(1), || {
            calls += 1;
            let ok = calls >= 3;
            async move {
                if ok {
                    Ok(42)
                } else {
                    Err(StoreError::Network("timeout".into()))
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls, 3);
    }
}
