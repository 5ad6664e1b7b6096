//! Time-of-day track selection
//!
//! Seven fixed day periods, each with an hour range, a three-color palette
//! and a mood description. Tracks are selected for a period either by how
//! closely their cover art matches the palette (scored from the
//! color-analysis stage results) or by the hour of day they were added to
//! the source collection.

use std::collections::HashMap;

use chrono::{DateTime, Timelike};

use crate::models::{ColorAnalysis, Track};

/// Distance between opposite corners of the RGB cube, for normalizing
/// similarity scores
const MAX_COLOR_DISTANCE: f64 = 441.7;

/// Default cap on tracks per selection
pub const MAX_TRACKS: usize = 50;

/// One fixed period of the day
#[derive(Debug)]
pub struct TimePeriod {
    pub key: &'static str,
    pub display: &'static str,
    /// Start hour (inclusive) and end hour (exclusive); wraps past midnight
    /// when start > end
    pub hours: (u32, u32),
    /// Palette cover art is scored against
    pub palette: [[u8; 3]; 3],
    pub description: &'static str,
    pub mood_keywords: &'static [&'static str],
}

pub const TIME_PERIODS: &[TimePeriod] = &[
    TimePeriod {
        key: "sunrise",
        display: "Sunrise (5-8 AM)",
        hours: (5, 8),
        palette: [[255, 200, 100], [255, 150, 50], [200, 100, 0]],
        description: "Calm, peaceful music for the early morning",
        mood_keywords: &["calm", "peaceful", "acoustic", "soft", "ambient"],
    },
    TimePeriod {
        key: "morning",
        display: "Morning (8-11 AM)",
        hours: (8, 11),
        palette: [[200, 220, 255], [150, 200, 250], [100, 180, 250]],
        description: "Upbeat, energizing tracks to start your day",
        mood_keywords: &["upbeat", "motivational", "bright", "energetic"],
    },
    TimePeriod {
        key: "midday",
        display: "Midday (11 AM-2 PM)",
        hours: (11, 14),
        palette: [[100, 200, 255], [50, 150, 255], [0, 100, 200]],
        description: "Productive, focused music for the middle of the day",
        mood_keywords: &["focus", "instrumental", "work", "productivity"],
    },
    TimePeriod {
        key: "afternoon",
        display: "Afternoon (2-5 PM)",
        hours: (14, 17),
        palette: [[200, 200, 100], [220, 180, 50], [240, 160, 0]],
        description: "Relaxed but upbeat music for the afternoon",
        mood_keywords: &["relaxed", "upbeat", "chill", "laid-back"],
    },
    TimePeriod {
        key: "sunset",
        display: "Sunset (5-8 PM)",
        hours: (17, 20),
        palette: [[255, 100, 100], [200, 50, 100], [150, 0, 100]],
        description: "Relaxing, warm music for the evening",
        mood_keywords: &["relaxing", "warm", "melodic", "soothing"],
    },
    TimePeriod {
        key: "night",
        display: "Night (8-11 PM)",
        hours: (20, 23),
        palette: [[50, 50, 100], [20, 20, 80], [0, 0, 50]],
        description: "Atmospheric, moody tracks for the night",
        mood_keywords: &["atmospheric", "moody", "dark", "deep"],
    },
    TimePeriod {
        key: "late_night",
        display: "Late Night (11 PM-5 AM)",
        hours: (23, 5),
        palette: [[20, 0, 40], [40, 0, 60], [60, 0, 80]],
        description: "Ambient, dreamy music for late night hours",
        mood_keywords: &["ambient", "dreamy", "sleep", "chill", "electronic"],
    },
];

/// Look up a period by its key
pub fn period(key: &str) -> Option<&'static TimePeriod> {
    TIME_PERIODS.iter().find(|p| p.key == key)
}

impl TimePeriod {
    /// First word of the display name ("Sunrise", "Night"), for playlist names
    pub fn base_name(&self) -> &'static str {
        self.display.split(' ').next().unwrap_or(self.display)
    }

    /// Daytime periods reward bright covers; the rest reward dark ones
    fn is_daytime(&self) -> bool {
        self.hours.0 >= 5 && self.hours.1 <= 17
    }

    /// Whether `hour` falls inside the period, handling the midnight wrap
    pub fn contains_hour(&self, hour: u32) -> bool {
        let (start, end) = self.hours;
        if start > end {
            hour >= start || hour < end
        } else {
            start <= hour && hour < end
        }
    }
}

/// Similarity between two RGB colors: 1.0 at equality, 0.0 between black
/// and white
fn color_similarity(a: [u8; 3], b: [u8; 3]) -> f64 {
    let distance = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt();
    1.0 - distance / MAX_COLOR_DISTANCE
}

/// Score one cover analysis against a period
///
/// Each palette color contributes its similarity to the dominant color at
/// weight 5; average brightness adds up to 3 more, toward bright covers for
/// daytime periods and dark covers otherwise.
pub fn mood_score(analysis: &ColorAnalysis, period: &TimePeriod) -> f64 {
    let mut score = 0.0;
    for target in &period.palette {
        score += color_similarity(analysis.dominant_color, *target) * 5.0;
    }
    if let Some(hsv) = analysis.average_hsv {
        if period.is_daytime() {
            score += hsv[2] * 3.0;
        } else {
            score += (1.0 - hsv[2]) * 3.0;
        }
    }
    score
}

/// Select the tracks whose covers best fit a period, highest score first
///
/// Tracks without a color analysis score zero and sink to the bottom; ties
/// keep the input order. At most `max_tracks` tracks are returned.
pub fn select_by_mood(
    tracks: &[Track],
    colors: &HashMap<String, ColorAnalysis>,
    period: &TimePeriod,
    max_tracks: usize,
) -> Vec<Track> {
    let mut scored: Vec<(&Track, f64)> = tracks
        .iter()
        .map(|t| {
            let score = colors
                .get(&t.id)
                .map(|analysis| mood_score(analysis, period))
                .unwrap_or(0.0);
            (t, score)
        })
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored
        .into_iter()
        .take(max_tracks)
        .map(|(t, _)| t.clone())
        .collect()
}

/// Hour of day a track was added, if it carries a parsable timestamp
fn added_hour(track: &Track) -> Option<u32> {
    let stamp = track.added_at.as_deref()?;
    let parsed = DateTime::parse_from_rfc3339(stamp).ok()?;
    Some(parsed.hour())
}

/// Select tracks added to the collection during a period's hours
///
/// Tracks without a timestamp, or with one that does not parse, are
/// skipped. Input order is preserved.
pub fn select_by_added_time(tracks: &[Track], period: &TimePeriod) -> Vec<Track> {
    tracks
        .iter()
        .filter(|t| added_hour(t).map_or(false, |h| period.contains_hour(h)))
        .cloned()
        .collect()
}
