//! Playlist creation from category groups
//!
//! Each qualifying category becomes one playlist on the remote store: create,
//! add uris in batches, then best-effort upload a 2x2 artwork mosaic cover.
//! A failed cover never fails the playlist.

use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::models::Track;
use crate::services::artwork::ArtworkFetcher;
use crate::services::remote_store::{RemoteTrackStore, BATCH_LIMIT};

const COVER_SIZE: u32 = 640;

/// Solid fallback cover colors when no artwork is available
const FALLBACK_COLORS: &[(&str, [u8; 3])] = &[
    ("Red", [220, 60, 60]),
    ("Blue", [60, 60, 220]),
    ("Green", [60, 220, 60]),
    ("Yellow", [220, 220, 60]),
    ("Purple", [180, 60, 220]),
    ("Orange", [220, 140, 60]),
    ("Pink", [220, 60, 180]),
    ("Turquoise", [60, 220, 180]),
    ("Brown", [160, 120, 60]),
    ("Black", [20, 20, 20]),
    ("White", [240, 240, 240]),
    ("Gray", [128, 128, 128]),
];

#[derive(Debug, Clone)]
pub struct CreatedPlaylist {
    pub id: String,
    pub name: String,
    pub category: String,
    pub track_count: usize,
}

/// Create one playlist per category group
///
/// Groups below `min_tracks` are skipped. Store errors while creating or
/// filling a playlist propagate; cover generation and upload are best-effort.
pub async fn create_category_playlists(
    store: &dyn RemoteTrackStore,
    fetcher: &ArtworkFetcher,
    groups: &HashMap<String, Vec<Track>>,
    prefix: &str,
    describe: impl Fn(&str) -> String,
    min_tracks: usize,
    public: bool,
) -> Result<Vec<CreatedPlaylist>> {
    let user = store.current_user().await?;

    // Sorted iteration keeps playlist creation order stable across runs.
    let ordered: BTreeMap<&String, &Vec<Track>> = groups.iter().collect();

    let mut created = Vec::new();
    for (category, tracks) in ordered {
        if tracks.len() < min_tracks {
            info!(
                category = %category,
                tracks = tracks.len(),
                min_tracks,
                "skipping category below minimum"
            );
            continue;
        }

        let name = format!("{}{}", prefix, category);
        let description = describe(category);

        let playlist_id = store
            .create_playlist(&user, &name, public, &description)
            .await?;

        let uris: Vec<String> = tracks.iter().map(|t| t.uri.clone()).collect();
        for batch in uris.chunks(BATCH_LIMIT) {
            store.add_tracks(&playlist_id, batch).await?;
        }

        match build_cover(fetcher, tracks, category).await {
            Some(jpeg) => {
                if let Err(e) = store.upload_playlist_cover(&playlist_id, &jpeg).await {
                    warn!(playlist = %name, "cover upload failed: {}", e);
                }
            }
            None => warn!(playlist = %name, "no cover generated"),
        }

        info!(playlist = %name, tracks = tracks.len(), "created playlist");
        created.push(CreatedPlaylist {
            id: playlist_id,
            name,
            category: category.clone(),
            track_count: tracks.len(),
        });
    }

    Ok(created)
}

/// Build a JPEG cover: a 2x2 mosaic of track artwork, or a solid fallback
async fn build_cover(fetcher: &ArtworkFetcher, tracks: &[Track], category: &str) -> Option<Vec<u8>> {
    let mut images: Vec<DynamicImage> = Vec::new();
    for track in tracks.iter().filter(|t| t.image_url.is_some()).take(4) {
        if let Some(url) = &track.image_url {
            if let Some(image) = fetcher.fetch(url).await {
                images.push(image);
            }
        }
    }

    let cover = if images.is_empty() {
        solid_cover(category)
    } else {
        mosaic(&images)
    };

    encode_jpeg(&cover).ok()
}

fn solid_cover(category: &str) -> RgbImage {
    let color = FALLBACK_COLORS
        .iter()
        .find(|(name, _)| *name == category)
        .map(|(_, rgb)| *rgb)
        .unwrap_or([128, 128, 128]);
    RgbImage::from_pixel(COVER_SIZE, COVER_SIZE, Rgb(color))
}

/// Tile up to four images into a 2x2 grid, cycling when fewer are available
fn mosaic(images: &[DynamicImage]) -> RgbImage {
    let tile = COVER_SIZE / 2;
    let mut canvas = RgbImage::new(COVER_SIZE, COVER_SIZE);

    for cell in 0..4usize {
        let source = &images[cell % images.len()];
        let resized = source.resize_exact(tile, tile, FilterType::Triangle).to_rgb8();
        let x0 = (cell as u32 % 2) * tile;
        let y0 = (cell as u32 / 2) * tile;
        for (x, y, pixel) in resized.enumerate_pixels() {
            canvas.put_pixel(x0 + x, y0 + y, *pixel);
        }
    }

    canvas
}

fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut buffer, ImageFormat::Jpeg)
        .map_err(|e| Error::Internal(format!("JPEG encode: {}", e)))?;
    Ok(buffer.into_inner())
}
