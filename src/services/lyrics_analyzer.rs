//! Lyrics retrieval and mood analysis
//!
//! The lyrics provider is an optional capability: with no base URL
//! configured the stage is skipped. Retrieved text is cleaned of section
//! markers and provider artifacts before scoring.

use std::collections::{BTreeMap, HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{LyricsAnalysis, SentimentSummary, Track};
use crate::services::sentiment;
use crate::services::Capability;

/// Emotion keyword sets, counted by substring occurrence
///
/// Order matters: the dominant emotion is the first one reaching the
/// maximum count, so "love" wins ties.
const EMOTION_KEYWORDS: &[(&str, &[&str])] = &[
    ("love", &["love", "loved", "loving", "lover"]),
    ("sad", &["sad", "sadness", "grief", "sorrow", "tear", "tears", "cry", "crying"]),
    ("happy", &["happy", "happiness", "joy", "smile", "laugh", "laughing"]),
    ("angry", &["angry", "anger", "rage", "hate", "mad", "fury"]),
    ("fear", &["fear", "afraid", "scared", "terror", "horror"]),
];

static PROFANITY: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "fuck", "shit", "bitch", "ass", "damn", "hell", "crap", "dick", "cock", "pussy",
        "nigga", "nigger", "hoe",
    ]
    .into_iter()
    .collect()
});

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "and", "for", "you", "your", "yours", "she", "her", "hers", "him", "his",
        "they", "them", "their", "our", "ours", "was", "were", "are", "been", "being",
        "have", "has", "had", "this", "that", "these", "those", "with", "from", "but",
        "not", "all", "can", "will", "just", "don", "won", "what", "when", "where",
        "who", "whom", "why", "how", "out", "about", "into", "over", "under", "again",
        "then", "than", "too", "very", "now", "here", "there", "because", "while",
        "down", "only", "own", "same", "more", "most", "some", "such", "each", "both",
        "ain", "gonna", "wanna", "gotta", "yeah", "ooh", "got", "get",
    ]
    .into_iter()
    .collect()
});

static FEAT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(feat\..*?\)").unwrap());
static SUFFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r" - .*$").unwrap());
static SECTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[.*?\]").unwrap());
static EMBED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+Embed").unwrap());
static HEADER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Lyrics\s*\d*\s*").unwrap());

/// Strip "(feat. ...)" and trailing " - ..." decorations from a track title
pub fn clean_title(title: &str) -> String {
    let without_feat = FEAT_RE.replace_all(title, "");
    SUFFIX_RE.replace(&without_feat, "").trim().to_string()
}

/// Strip section markers and provider artifacts from raw lyrics text
pub fn clean_lyrics(raw: &str) -> String {
    let text = SECTION_RE.replace_all(raw, "");
    let text = EMBED_RE.replace_all(&text, "");
    let text = HEADER_RE.replace_all(&text, "");
    text.trim().to_string()
}

#[derive(Debug, Deserialize)]
struct LyricsResponse {
    lyrics: String,
}

/// Client for a lyrics.ovh-style text provider
pub struct LyricsClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl LyricsClient {
    /// Resolve the lyrics provider as an optional capability
    ///
    /// An empty base URL means the capability is not configured.
    pub fn resolve(config: &Config) -> Capability<LyricsClient> {
        if config.lyrics_base_url.is_empty() {
            warn!("no lyrics provider configured, stage will be skipped");
            return Capability::Absent;
        }

        let http_client = match reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.api_timeout_secs))
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                warn!("failed to build lyrics HTTP client: {}", e);
                return Capability::Absent;
            }
        };

        Capability::Present(LyricsClient {
            http_client,
            base_url: config.lyrics_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch lyrics text for one (title, artist) pair
    ///
    /// Not-found and every transport failure map to `None`.
    pub async fn search_lyrics(&self, title: &str, artist: &str) -> Option<String> {
        let cleaned = clean_title(title);

        let mut url = match reqwest::Url::parse(&self.base_url) {
            Ok(url) => url,
            Err(e) => {
                warn!("invalid lyrics base URL: {}", e);
                return None;
            }
        };
        url.path_segments_mut()
            .ok()?
            .push("v1")
            .push(artist)
            .push(&cleaned);

        let response = match self.http_client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(title, artist, "lyrics request failed: {}", e);
                return None;
            }
        };

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return None;
        }
        if !response.status().is_success() {
            debug!(title, artist, status = %response.status(), "lyrics provider error");
            return None;
        }

        let body: LyricsResponse = response.json().await.ok()?;
        let text = clean_lyrics(&body.lyrics);
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Whole-word, case-insensitive profanity check
pub fn is_explicit(lyrics: &str) -> bool {
    sentiment::tokenize(lyrics)
        .iter()
        .any(|word| PROFANITY.contains(word.as_str()))
}

fn emotion_counts(lyrics_lower: &str) -> BTreeMap<String, usize> {
    EMOTION_KEYWORDS
        .iter()
        .map(|(emotion, keywords)| {
            let count = keywords
                .iter()
                .map(|keyword| lyrics_lower.matches(keyword).count())
                .sum();
            (emotion.to_string(), count)
        })
        .collect()
}

/// Top recurring non-stopword terms, most frequent first
pub fn extract_topics(lyrics: &str, n_topics: usize) -> Vec<(String, usize)> {
    let mut frequencies: HashMap<String, usize> = HashMap::new();
    for word in sentiment::tokenize(lyrics) {
        if word.len() > 2 && word.chars().all(|c| c.is_ascii_alphabetic())
            && !STOPWORDS.contains(word.as_str())
        {
            *frequencies.entry(word).or_default() += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = frequencies.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(n_topics);
    ranked
}

/// Analyze cleaned lyrics text
pub fn analyze(lyrics: &str) -> LyricsAnalysis {
    let lyrics_lower = lyrics.to_lowercase();
    let (polarity, subjectivity) = sentiment::score(lyrics);

    LyricsAnalysis {
        sentiment: SentimentSummary {
            polarity,
            subjectivity,
            emotion_counts: emotion_counts(&lyrics_lower),
            word_count: sentiment::tokenize(lyrics).len(),
            is_explicit: is_explicit(lyrics),
        },
        topics: extract_topics(lyrics, 5),
    }
}

/// Per-track compute function for the lyrics stage
pub async fn compute(client: &LyricsClient, track: &Track) -> Option<LyricsAnalysis> {
    let lyrics = client.search_lyrics(&track.name, &track.artist).await?;
    Some(analyze(&lyrics))
}

fn dominant_emotion(counts: &BTreeMap<String, usize>) -> (&'static str, usize) {
    let mut best = ("neutral", 0);
    for (emotion, _) in EMOTION_KEYWORDS {
        let count = counts.get(*emotion).copied().unwrap_or(0);
        if count > best.1 {
            best = (emotion, count);
        }
    }
    best
}

/// Group tracks into mood buckets from their lyrics analysis
///
/// "explicit" is additive; every other bucket is exclusive. Love dominance
/// short-circuits the polarity checks.
pub fn group_by_mood(
    tracks: &[Track],
    analysis: &HashMap<String, LyricsAnalysis>,
) -> HashMap<String, Vec<Track>> {
    let mut groups: HashMap<String, Vec<Track>> = HashMap::new();

    for track in tracks {
        let Some(result) = analysis.get(&track.id) else {
            continue;
        };
        let sentiment = &result.sentiment;

        if sentiment.is_explicit {
            groups.entry("explicit".to_string()).or_default().push(track.clone());
        }

        let (emotion, count) = dominant_emotion(&sentiment.emotion_counts);
        if emotion == "love" && count > 0 {
            groups.entry("love".to_string()).or_default().push(track.clone());
            continue;
        }

        let mood = if sentiment.polarity > 0.3 {
            "happy"
        } else if sentiment.polarity < -0.3 {
            "sad"
        } else if sentiment.emotion_counts.get("angry").copied().unwrap_or(0) > 0 {
            "angry"
        } else {
            "neutral"
        };
        groups.entry(mood.to_string()).or_default().push(track.clone());
    }

    groups
}

/// Human-readable description per mood bucket, used for playlist metadata
pub fn mood_description(mood: &str) -> String {
    match mood {
        "happy" => "Songs with positive, upbeat lyrics.".to_string(),
        "sad" => "Songs with melancholic, sad lyrics.".to_string(),
        "angry" => "Songs with intense, angry lyrics.".to_string(),
        "neutral" => "Songs with balanced, neutral lyrics.".to_string(),
        "love" => "Songs about love and relationships.".to_string(),
        "explicit" => "Songs with explicit content in lyrics.".to_string(),
        other => format!("Songs grouped by lyrics: {}.", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str) -> Track {
        Track {
            id: id.into(),
            name: id.to_uppercase(),
            artist: "Artist".into(),
            uri: format!("track:{}", id),
            album_name: "Album".into(),
            added_at: None,
            image_url: None,
        }
    }

    fn analysis_with(polarity: f64, love: usize, angry: usize, explicit: bool) -> LyricsAnalysis {
        let mut counts = BTreeMap::new();
        counts.insert("love".to_string(), love);
        counts.insert("sad".to_string(), 0);
        counts.insert("happy".to_string(), 0);
        counts.insert("angry".to_string(), angry);
        counts.insert("fear".to_string(), 0);

        LyricsAnalysis {
            sentiment: SentimentSummary {
                polarity,
                subjectivity: 0.5,
                emotion_counts: counts,
                word_count: 100,
                is_explicit: explicit,
            },
            topics: vec![],
        }
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(clean_title("Song (feat. Someone)"), "Song");
        assert_eq!(clean_title("Song - 2011 Remaster"), "Song");
        assert_eq!(clean_title("Song (feat. A) - Live"), "Song");
    }

    #[test]
    fn test_clean_lyrics_strips_artifacts() {
        let raw = "Lyrics\n[Verse 1]\nhello world\n[Chorus]\ngoodbye42Embed";
        let cleaned = clean_lyrics(raw);
        assert!(!cleaned.contains('['));
        assert!(!cleaned.contains("Embed"));
        assert!(cleaned.contains("hello world"));
    }

    #[test]
    fn test_explicit_is_whole_word() {
        assert!(is_explicit("what the hell"));
        // "class" and "assist" contain a profane substring but are clean words.
        assert!(!is_explicit("first class assist"));
    }

    #[test]
    fn test_emotion_counts_substring_occurrences() {
        // Substring counting: "lover" also matches "love", and "tears"
        // also matches "tear".
        let counts = emotion_counts("love my lover, no tears");
        assert_eq!(counts["love"], 3);
        assert_eq!(counts["sad"], 2);
    }

    #[test]
    fn test_positive_polarity_maps_to_happy() {
        let tracks = vec![track("a")];
        let mut results = HashMap::new();
        results.insert("a".to_string(), analysis_with(0.5, 0, 0, false));

        let groups = group_by_mood(&tracks, &results);
        assert_eq!(groups["happy"].len(), 1);
        assert!(!groups.contains_key("love"));
    }

    #[test]
    fn test_love_precedence_over_polarity() {
        let tracks = vec![track("a")];
        let mut results = HashMap::new();
        results.insert("a".to_string(), analysis_with(0.5, 2, 0, false));

        let groups = group_by_mood(&tracks, &results);
        assert_eq!(groups["love"].len(), 1);
        assert!(!groups.contains_key("happy"));
    }

    #[test]
    fn test_explicit_bucket_is_additive() {
        let tracks = vec![track("a")];
        let mut results = HashMap::new();
        results.insert("a".to_string(), analysis_with(-0.6, 0, 0, true));

        let groups = group_by_mood(&tracks, &results);
        assert_eq!(groups["explicit"].len(), 1);
        assert_eq!(groups["sad"].len(), 1);
    }

    #[test]
    fn test_angry_bucket_for_neutral_polarity() {
        let tracks = vec![track("a")];
        let mut results = HashMap::new();
        results.insert("a".to_string(), analysis_with(0.1, 0, 3, false));

        let groups = group_by_mood(&tracks, &results);
        assert_eq!(groups["angry"].len(), 1);
    }

    #[test]
    fn test_missing_analysis_excluded() {
        let tracks = vec![track("a"), track("b")];
        let mut results = HashMap::new();
        results.insert("a".to_string(), analysis_with(0.0, 0, 0, false));

        let groups = group_by_mood(&tracks, &results);
        assert_eq!(groups["neutral"].len(), 1);
    }

    #[test]
    fn test_extract_topics_ranked() {
        let topics = extract_topics("river river river mountain mountain sky the the the", 2);
        assert_eq!(topics[0], ("river".to_string(), 3));
        assert_eq!(topics[1], ("mountain".to_string(), 2));
    }

    #[test]
    fn test_analyze_end_to_end() {
        let result = analyze("wonderful beautiful morning, nothing else");
        assert!(result.sentiment.polarity > 0.3);
        assert!(!result.sentiment.is_explicit);
        assert_eq!(result.sentiment.emotion_counts["love"], 0);
    }
}
