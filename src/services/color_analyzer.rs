//! Album-art dominant color analysis
//!
//! Near-grayscale covers are classified by brightness alone. Colorful covers
//! are downsampled and clustered; the heaviest cluster's color resolves to
//! the nearest named reference color, which maps to a broad category
//! (Red, Blue, ..., Other) used for grouping.

use std::collections::HashMap;

use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use rayon::prelude::*;

use crate::models::{rgb_to_hsv, ColorAnalysis, Track};
use crate::services::artwork::ArtworkFetcher;

/// Mean channel deviation below which a cover counts as grayscale (0-255 scale)
const GRAYSCALE_THRESHOLD: f64 = 10.0;

/// Downsample target before clustering
const SAMPLE_SIZE: u32 = 100;

/// Fixed cluster count for dominant color extraction
const NUM_CLUSTERS: usize = 5;

/// Lloyd iterations; dominant-color extraction converges quickly
const KMEANS_ITERATIONS: usize = 10;

/// Named reference colors with their broad category
///
/// (name, rgb, category); nearest-name resolution works over this table in
/// normalized RGB space.
const NAMED_COLORS: &[(&str, [u8; 3], &str)] = &[
    // Reds
    ("red", [255, 0, 0], "Red"),
    ("darkred", [139, 0, 0], "Red"),
    ("firebrick", [178, 34, 34], "Red"),
    ("crimson", [220, 20, 60], "Red"),
    ("indianred", [205, 92, 92], "Red"),
    ("maroon", [128, 0, 0], "Red"),
    ("tomato", [255, 99, 71], "Red"),
    ("salmon", [250, 128, 114], "Red"),
    ("lightcoral", [240, 128, 128], "Red"),
    // Blues
    ("blue", [0, 0, 255], "Blue"),
    ("darkblue", [0, 0, 139], "Blue"),
    ("navy", [0, 0, 128], "Blue"),
    ("royalblue", [65, 105, 225], "Blue"),
    ("dodgerblue", [30, 144, 255], "Blue"),
    ("steelblue", [70, 130, 180], "Blue"),
    ("deepskyblue", [0, 191, 255], "Blue"),
    ("cornflowerblue", [100, 149, 237], "Blue"),
    ("skyblue", [135, 206, 235], "Blue"),
    ("lightblue", [173, 216, 230], "Blue"),
    // Greens
    ("green", [0, 128, 0], "Green"),
    ("darkgreen", [0, 100, 0], "Green"),
    ("forestgreen", [34, 139, 34], "Green"),
    ("limegreen", [50, 205, 50], "Green"),
    ("lime", [0, 255, 0], "Green"),
    ("seagreen", [46, 139, 87], "Green"),
    ("olive", [128, 128, 0], "Green"),
    ("teal", [0, 128, 128], "Green"),
    ("lightgreen", [144, 238, 144], "Green"),
    ("palegreen", [152, 251, 152], "Green"),
    // Yellows
    ("yellow", [255, 255, 0], "Yellow"),
    ("gold", [255, 215, 0], "Yellow"),
    ("khaki", [240, 230, 140], "Yellow"),
    ("darkkhaki", [189, 183, 107], "Yellow"),
    ("lemonchiffon", [255, 250, 205], "Yellow"),
    // Purples
    ("purple", [128, 0, 128], "Purple"),
    ("indigo", [75, 0, 130], "Purple"),
    ("darkviolet", [148, 0, 211], "Purple"),
    ("blueviolet", [138, 43, 226], "Purple"),
    ("magenta", [255, 0, 255], "Purple"),
    ("orchid", [218, 112, 214], "Purple"),
    ("mediumpurple", [147, 112, 219], "Purple"),
    ("plum", [221, 160, 221], "Purple"),
    ("violet", [238, 130, 238], "Purple"),
    ("lavender", [230, 230, 250], "Purple"),
    // Oranges
    ("orange", [255, 165, 0], "Orange"),
    ("darkorange", [255, 140, 0], "Orange"),
    ("coral", [255, 127, 80], "Orange"),
    ("orangered", [255, 69, 0], "Orange"),
    ("goldenrod", [218, 165, 32], "Orange"),
    ("sandybrown", [244, 164, 96], "Orange"),
    ("tan", [210, 180, 140], "Orange"),
    // Pinks
    ("pink", [255, 192, 203], "Pink"),
    ("hotpink", [255, 105, 180], "Pink"),
    ("deeppink", [255, 20, 147], "Pink"),
    ("lightpink", [255, 182, 193], "Pink"),
    ("palevioletred", [219, 112, 147], "Pink"),
    ("mediumvioletred", [199, 21, 133], "Pink"),
    // Browns
    ("brown", [165, 42, 42], "Brown"),
    ("saddlebrown", [139, 69, 19], "Brown"),
    ("sienna", [160, 82, 45], "Brown"),
    ("chocolate", [210, 105, 30], "Brown"),
    ("peru", [205, 133, 63], "Brown"),
    ("rosybrown", [188, 143, 143], "Brown"),
    // Turquoise/cyan
    ("turquoise", [64, 224, 208], "Turquoise"),
    ("mediumturquoise", [72, 209, 204], "Turquoise"),
    ("darkturquoise", [0, 206, 209], "Turquoise"),
    ("cyan", [0, 255, 255], "Turquoise"),
    ("paleturquoise", [175, 238, 238], "Turquoise"),
    ("aquamarine", [127, 255, 212], "Turquoise"),
    // Grays, blacks, whites
    ("black", [0, 0, 0], "Black"),
    ("gray", [128, 128, 128], "Gray"),
    ("darkgray", [169, 169, 169], "Gray"),
    ("dimgray", [105, 105, 105], "Gray"),
    ("lightgray", [211, 211, 211], "Gray"),
    ("silver", [192, 192, 192], "Gray"),
    ("slategray", [112, 128, 144], "Gray"),
    ("white", [255, 255, 255], "White"),
    ("snow", [255, 250, 250], "White"),
    ("ivory", [255, 255, 240], "White"),
    ("beige", [245, 245, 220], "White"),
    ("whitesmoke", [245, 245, 245], "White"),
    ("linen", [250, 240, 230], "White"),
    ("antiquewhite", [250, 235, 215], "White"),
];

/// Whether an image is (near-)grayscale
///
/// Mean absolute deviation between the RGB channel pairs, averaged over all
/// pixels, below a fixed threshold.
pub fn is_grayscale(image: &RgbImage) -> bool {
    let pixel_count = (image.width() * image.height()) as f64;
    if pixel_count == 0.0 {
        return true;
    }

    let mut total_diff = 0.0f64;
    for pixel in image.pixels() {
        let [r, g, b] = pixel.0.map(|c| c as f64);
        total_diff += ((r - g).abs() + (r - b).abs() + (g - b).abs()) / 3.0;
    }

    total_diff / pixel_count < GRAYSCALE_THRESHOLD
}

/// Classify a grayscale cover by mean luminance on the 0-255 scale
pub fn classify_grayscale(image: &DynamicImage) -> &'static str {
    let luma = image.to_luma8();
    let pixel_count = (luma.width() * luma.height()).max(1) as f64;
    let brightness: f64 = luma.pixels().map(|p| p.0[0] as f64).sum::<f64>() / pixel_count;

    if brightness < 50.0 {
        "Black"
    } else if brightness > 200.0 {
        "White"
    } else {
        "Gray"
    }
}

/// Nearest named reference color by Euclidean distance in normalized RGB
pub fn closest_color_name(rgb: [u8; 3]) -> (&'static str, &'static str) {
    let target = rgb.map(|c| c as f64 / 255.0);

    let mut best = NAMED_COLORS[0];
    let mut best_distance = f64::INFINITY;

    for entry in NAMED_COLORS {
        let reference = entry.1.map(|c| c as f64 / 255.0);
        let distance = (target[0] - reference[0]).powi(2)
            + (target[1] - reference[1]).powi(2)
            + (target[2] - reference[2]).powi(2);
        if distance < best_distance {
            best_distance = distance;
            best = *entry;
        }
    }

    (best.0, best.2)
}

fn squared_distance(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}

fn nearest_centroid(pixel: &[f32; 3], centroids: &[[f32; 3]]) -> usize {
    let mut best = 0;
    let mut best_distance = f32::INFINITY;
    for (i, centroid) in centroids.iter().enumerate() {
        let distance = squared_distance(pixel, centroid);
        if distance < best_distance {
            best_distance = distance;
            best = i;
        }
    }
    best
}

/// Fixed-iteration Lloyd clustering over pixel colors
///
/// Deterministic: centroids seed from evenly spaced pixels. Returns
/// (pixel count, centroid) per non-empty cluster, unordered.
fn cluster_pixels(pixels: &[[f32; 3]], k: usize) -> Vec<(usize, [f32; 3])> {
    let k = k.min(pixels.len()).max(1);
    let mut centroids: Vec<[f32; 3]> =
        (0..k).map(|i| pixels[i * pixels.len() / k]).collect();

    let mut assignments: Vec<usize> = Vec::new();
    for _ in 0..KMEANS_ITERATIONS {
        assignments = pixels
            .par_iter()
            .map(|p| nearest_centroid(p, &centroids))
            .collect();

        let mut sums = vec![[0.0f64; 3]; k];
        let mut counts = vec![0usize; k];
        for (pixel, &cluster) in pixels.iter().zip(&assignments) {
            counts[cluster] += 1;
            for c in 0..3 {
                sums[cluster][c] += pixel[c] as f64;
            }
        }

        for i in 0..k {
            if counts[i] > 0 {
                centroids[i] = [
                    (sums[i][0] / counts[i] as f64) as f32,
                    (sums[i][1] / counts[i] as f64) as f32,
                    (sums[i][2] / counts[i] as f64) as f32,
                ];
            }
        }
    }

    let mut counts = vec![0usize; k];
    for &cluster in &assignments {
        counts[cluster] += 1;
    }

    counts
        .into_iter()
        .zip(centroids)
        .filter(|(count, _)| *count > 0)
        .collect()
}

/// Extract and analyze the dominant colors of one cover image
pub fn extract_color_info(image: &DynamicImage) -> ColorAnalysis {
    let small = image
        .resize_exact(SAMPLE_SIZE, SAMPLE_SIZE, FilterType::Triangle)
        .to_rgb8();

    if is_grayscale(&small) {
        let category = classify_grayscale(image).to_string();
        return ColorAnalysis {
            is_grayscale: true,
            grayscale_category: Some(category.clone()),
            dominant_color: [128, 128, 128],
            color_name: None,
            color_category: category,
            dominant_colors: vec![[128, 128, 128]],
            color_percentages: vec![100.0],
            average_hsv: None,
        };
    }

    let pixels: Vec<[f32; 3]> = small
        .pixels()
        .map(|p| p.0.map(|c| c as f32))
        .collect();
    let total_pixels = pixels.len() as f64;

    let mut clusters = cluster_pixels(&pixels, NUM_CLUSTERS);
    // Weight-sort by pixel share descending.
    clusters.sort_by(|a, b| b.0.cmp(&a.0));

    let dominant_colors: Vec<[u8; 3]> = clusters
        .iter()
        .map(|(_, c)| c.map(|v| v.round().clamp(0.0, 255.0) as u8))
        .collect();
    let color_percentages: Vec<f64> = clusters
        .iter()
        .map(|(count, _)| *count as f64 / total_pixels * 100.0)
        .collect();

    let main_color = dominant_colors[0];
    let (color_name, color_category) = closest_color_name(main_color);

    // Percentage-weighted average HSV across all clusters.
    let weight_total: f64 = color_percentages.iter().sum();
    let mut average_hsv = [0.0f64; 3];
    for (color, weight) in dominant_colors.iter().zip(&color_percentages) {
        let hsv = rgb_to_hsv(*color);
        for c in 0..3 {
            average_hsv[c] += hsv[c] * weight / weight_total;
        }
    }

    ColorAnalysis {
        is_grayscale: false,
        grayscale_category: None,
        dominant_color: main_color,
        color_name: Some(color_name.to_string()),
        color_category: color_category.to_string(),
        dominant_colors,
        color_percentages,
        average_hsv: Some(average_hsv),
    }
}

/// Per-track compute function for the color stage
///
/// Missing artwork URL, failed download, or a panicked clustering task all
/// degrade to `None` for this track.
pub async fn compute(fetcher: &ArtworkFetcher, track: &Track) -> Option<ColorAnalysis> {
    let url = track.image_url.as_ref()?;
    let image = fetcher.fetch(url).await?;

    // Clustering is CPU-bound; keep it off the async workers.
    tokio::task::spawn_blocking(move || extract_color_info(&image))
        .await
        .ok()
}

/// Group tracks by the broad category of their dominant color
pub fn group_by_color(
    tracks: &[Track],
    analysis: &HashMap<String, ColorAnalysis>,
) -> HashMap<String, Vec<Track>> {
    let mut groups: HashMap<String, Vec<Track>> = HashMap::new();

    for track in tracks {
        if let Some(result) = analysis.get(&track.id) {
            groups
                .entry(result.color_category.clone())
                .or_default()
                .push(track.clone());
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(rgb: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(50, 50, Rgb(rgb)))
    }

    #[test]
    fn test_grayscale_detection() {
        assert!(is_grayscale(&solid([120, 120, 120]).to_rgb8()));
        assert!(is_grayscale(&solid([100, 104, 98]).to_rgb8()));
        assert!(!is_grayscale(&solid([200, 30, 30]).to_rgb8()));
    }

    #[test]
    fn test_grayscale_brightness_classes() {
        assert_eq!(classify_grayscale(&solid([30, 30, 30])), "Black");
        assert_eq!(classify_grayscale(&solid([120, 120, 120])), "Gray");
        assert_eq!(classify_grayscale(&solid([220, 220, 220])), "White");
    }

    #[test]
    fn test_closest_color_name_exact_blue() {
        let (name, category) = closest_color_name([0, 0, 255]);
        assert_eq!(name, "blue");
        assert_eq!(category, "Blue");
    }

    #[test]
    fn test_closest_color_name_near_match() {
        let (name, category) = closest_color_name([250, 5, 5]);
        assert_eq!(name, "red");
        assert_eq!(category, "Red");
    }

    #[test]
    fn test_extract_solid_color() {
        let analysis = extract_color_info(&solid([255, 0, 0]));
        assert!(!analysis.is_grayscale);
        assert_eq!(analysis.color_category, "Red");
        assert_eq!(analysis.dominant_color, [255, 0, 0]);
        // Percentages sum to ~100 regardless of cluster count.
        let sum: f64 = analysis.color_percentages.iter().sum();
        assert!((sum - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_extract_grayscale_shortcut() {
        let analysis = extract_color_info(&solid([40, 40, 40]));
        assert!(analysis.is_grayscale);
        assert_eq!(analysis.color_category, "Black");
        assert_eq!(analysis.grayscale_category.as_deref(), Some("Black"));
        assert!(analysis.average_hsv.is_none());
    }

    #[test]
    fn test_two_tone_image_dominant_cluster() {
        // 3/4 red, 1/4 blue: the top cluster must be red.
        let mut img = RgbImage::from_pixel(100, 100, Rgb([255, 0, 0]));
        for y in 0..100 {
            for x in 0..25 {
                img.put_pixel(x, y, Rgb([0, 0, 255]));
            }
        }
        let analysis = extract_color_info(&DynamicImage::ImageRgb8(img));
        assert_eq!(analysis.color_category, "Red");
        assert!(analysis.color_percentages[0] > 50.0);
    }

    #[test]
    fn test_group_by_color() {
        let tracks = vec![
            Track {
                id: "a".into(),
                name: "A".into(),
                artist: "X".into(),
                uri: "u:a".into(),
                album_name: "Al".into(),
                added_at: None,
                image_url: None,
            },
            Track {
                id: "b".into(),
                name: "B".into(),
                artist: "X".into(),
                uri: "u:b".into(),
                album_name: "Al".into(),
                added_at: None,
                image_url: None,
            },
        ];

        let mut analysis = HashMap::new();
        analysis.insert("a".to_string(), extract_color_info(&solid([255, 0, 0])));
        // "b" has no analysis result and must not appear in any group.

        let groups = group_by_color(&tracks, &analysis);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups["Red"].len(), 1);
        assert_eq!(groups["Red"][0].id, "a");
    }
}
