//! trackforge - enrich a music library and group it into playlists
//!
//! Fetches a track list from the remote store, runs the selected analyzer
//! stage through the cached parallel pipeline, prints the resulting groups
//! and optionally materializes them as playlists.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use trackforge::cache::CacheStore;
use trackforge::categorize;
use trackforge::config::Config;
use trackforge::pipeline::{self, StageOptions};
use trackforge::playlists;
use trackforge::services::artwork::ArtworkFetcher;
use trackforge::services::remote_store::{fetch_library, HttpTrackStore, TrackSource};
use trackforge::services::{
    audio_features, color_analyzer, lyrics_analyzer, object_detector, Capability,
};
use trackforge::time_of_day;
use trackforge::Track;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum GroupBy {
    /// Dominant album artwork color
    Color,
    /// Objects detected in album artwork
    Objects,
    /// Lyrical mood
    Mood,
    /// One audio feature's threshold buckets
    Feature,
    /// Fixed composite categories over several features
    Custom,
    /// Tracks fitting one time-of-day period
    Time,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TimeSelect {
    /// Covers closest to the period's palette and brightness
    Mood,
    /// Tracks added to the collection during the period's hours
    Added,
}

#[derive(Debug, Parser)]
#[command(name = "trackforge", version, about = "Track library enrichment and playlist creation")]
struct Cli {
    /// Configuration file path
    #[arg(long, default_value = "trackforge.toml")]
    config: std::path::PathBuf,

    /// Source playlist id; defaults to the user's saved tracks
    #[arg(long)]
    playlist: Option<String>,

    /// Grouping dimension
    #[arg(long, value_enum, default_value_t = GroupBy::Color)]
    by: GroupBy,

    /// Audio feature name for `--by feature`
    #[arg(long)]
    feature: Option<String>,

    /// Time period key for `--by time` (sunrise, morning, midday, afternoon,
    /// sunset, night, late_night)
    #[arg(long)]
    period: Option<String>,

    /// Track selection strategy for `--by time`
    #[arg(long, value_enum, default_value_t = TimeSelect::Mood)]
    time_select: TimeSelect,

    /// Cap on tracks selected for `--by time`
    #[arg(long, default_value_t = time_of_day::MAX_TRACKS)]
    max_tracks: usize,

    /// Create playlists on the remote store from the resulting groups
    #[arg(long)]
    create_playlists: bool,

    /// Recompute every track, replacing cached stage results
    #[arg(long)]
    reanalyze: bool,

    /// Disable cache reads and writes entirely
    #[arg(long)]
    no_cache: bool,

    /// Override the minimum group size for playlist creation
    #[arg(long)]
    min_tracks: Option<usize>,

    /// Remote store bearer token; overrides the config file
    #[arg(long, env = "TRACKFORGE_STORE_TOKEN")]
    store_token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    info!("Starting trackforge");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(&cli.config)?;
    if let Some(min_tracks) = cli.min_tracks {
        config.min_tracks = min_tracks;
    }
    if let Some(token) = &cli.store_token {
        config.store_token = token.clone();
    }
    if config.store_token.is_empty() {
        anyhow::bail!(
            "no store token configured; set store_token in {} or TRACKFORGE_STORE_TOKEN",
            cli.config.display()
        );
    }

    let cache = CacheStore::new(&config.cache_dir, config.cache_expiry_hours);
    let store = HttpTrackStore::new(&config.store_base_url, &config.store_token, config.api_timeout_secs)?;
    let fetcher = ArtworkFetcher::new(&config)?;

    let source = match &cli.playlist {
        Some(id) => TrackSource::Playlist(id.clone()),
        None => TrackSource::Liked,
    };

    let time_period = match (cli.by, cli.period.as_deref()) {
        (GroupBy::Time, Some(key)) => Some(
            time_of_day::period(key)
                .ok_or_else(|| anyhow::anyhow!("unknown time period: {}", key))?,
        ),
        (GroupBy::Time, None) => {
            let keys: Vec<&str> = time_of_day::TIME_PERIODS.iter().map(|p| p.key).collect();
            anyhow::bail!("--by time requires --period <{}>", keys.join("|"));
        }
        _ => None,
    };

    let use_cache = !cli.no_cache;
    let tracks = fetch_library(&store, &cache, &config, &source, use_cache && !cli.reanalyze).await;
    if tracks.is_empty() {
        warn!("no tracks retrieved, nothing to do");
        return Ok(());
    }
    info!(count = tracks.len(), "track list ready");

    let groups = match cli.by {
        GroupBy::Color => {
            let opts = stage_opts("color analysis", "color_analysis", "color_analysis_cache.json", &cli)
                .workers(config.worker_count);
            let fetcher_ref = &fetcher;
            let results = pipeline::enrich(&tracks, &cache, &opts, |t| async move {
                color_analyzer::compute(fetcher_ref, &t).await
            })
            .await?;
            color_analyzer::group_by_color(&tracks, &results)
        }
        GroupBy::Objects => {
            let detector = match object_detector::DetectorClient::resolve(&config) {
                Capability::Present(client) => client,
                Capability::Absent => {
                    println!("Object detection is unavailable (detector command not found).");
                    return Ok(());
                }
            };
            let opts = stage_opts("object detection", "object_detection", "object_detection_cache.json", &cli)
                .workers(config.worker_count);
            let detector_ref = &detector;
            let fetcher_ref = &fetcher;
            let results = pipeline::enrich(&tracks, &cache, &opts, |t| async move {
                object_detector::compute(detector_ref, fetcher_ref, &t).await
            })
            .await?;
            object_detector::group_by_object(&tracks, &results, config.detector_grouping_confidence)
        }
        GroupBy::Mood => {
            let client = match lyrics_analyzer::LyricsClient::resolve(&config) {
                Capability::Present(client) => client,
                Capability::Absent => {
                    println!("Lyrics analysis is unavailable (no provider configured).");
                    return Ok(());
                }
            };
            let opts = stage_opts("lyrics analysis", "lyrics", "lyrics_analysis_cache.json", &cli)
                .workers(config.api_worker_count);
            let client_ref = &client;
            let results = pipeline::enrich(&tracks, &cache, &opts, |t| async move {
                lyrics_analyzer::compute(client_ref, &t).await
            })
            .await?;
            lyrics_analyzer::group_by_mood(&tracks, &results)
        }
        GroupBy::Feature | GroupBy::Custom => {
            let opts = stage_opts("audio features", "audio_features", "audio_features_cache.json", &cli);
            let results = audio_features::enrich_audio_features(&store, &tracks, &cache, &opts).await?;

            let summary = audio_features::summarize(&results);
            println!("Audio features for {} tracks:", summary.track_count);
            for (name, (min, mean, max)) in &summary.ranges {
                println!("  {:<18} min {:>8.3}  mean {:>8.3}  max {:>8.3}", name, min, mean, max);
            }
            for (name, counts) in &summary.distributions {
                let rendered: Vec<String> =
                    counts.iter().map(|(value, n)| format!("{} ({})", value, n)).collect();
                println!("  {:<18} {}", name, rendered.join(", "));
            }

            if cli.by == GroupBy::Custom {
                categorize::custom_categories(&tracks, &results)
            } else {
                let feature = cli
                    .feature
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("--by feature requires --feature <name>"))?;
                categorize::categorize_by_feature(&tracks, &results, feature, None)
            }
        }
        GroupBy::Time => {
            // Presence was validated before the fetch.
            let Some(period) = time_period else {
                anyhow::bail!("--by time requires --period");
            };

            let selected = match cli.time_select {
                TimeSelect::Added => time_of_day::select_by_added_time(&tracks, period),
                TimeSelect::Mood => {
                    println!("{}: {}", period.display, period.mood_keywords.join(", "));
                    let opts = stage_opts("color analysis", "color_analysis", "color_analysis_cache.json", &cli)
                        .workers(config.worker_count);
                    let fetcher_ref = &fetcher;
                    let results = pipeline::enrich(&tracks, &cache, &opts, |t| async move {
                        color_analyzer::compute(fetcher_ref, &t).await
                    })
                    .await?;
                    time_of_day::select_by_mood(&tracks, &results, period, cli.max_tracks)
                }
            };

            let name = match cli.time_select {
                TimeSelect::Mood => format!("{} Vibes", period.base_name()),
                TimeSelect::Added => format!("{} Time Releases", period.base_name()),
            };
            let mut groups = std::collections::HashMap::new();
            if !selected.is_empty() {
                groups.insert(name, selected);
            }
            groups
        }
    };

    if groups.is_empty() {
        println!("No groups produced.");
        return Ok(());
    }
    print_groups(&groups);

    if cli.create_playlists {
        let (prefix, describe) =
            playlist_style(cli.by, cli.feature.as_deref(), time_period, cli.time_select);
        let created = playlists::create_category_playlists(
            &store,
            &fetcher,
            &groups,
            &prefix,
            describe,
            config.min_tracks,
            true,
        )
        .await?;

        println!("Created {} playlists:", created.len());
        for playlist in &created {
            println!("  {} ({} tracks)", playlist.name, playlist.track_count);
        }
    }

    Ok(())
}

fn stage_opts(
    label: &'static str,
    cache_key: &'static str,
    cache_file: &str,
    cli: &Cli,
) -> StageOptions {
    StageOptions::new(label, cache_key, cache_file)
        .use_cache(!cli.no_cache)
        .force_refresh(cli.reanalyze)
}

fn print_groups(groups: &std::collections::HashMap<String, Vec<Track>>) {
    let mut ordered: Vec<(&String, usize)> = groups.iter().map(|(k, v)| (k, v.len())).collect();
    ordered.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    println!("Groups:");
    for (name, count) in ordered {
        println!("  {:<20} {} tracks", name, count);
    }
}

type Describe = Box<dyn Fn(&str) -> String>;

fn playlist_style(
    by: GroupBy,
    feature: Option<&str>,
    time_period: Option<&'static time_of_day::TimePeriod>,
    time_select: TimeSelect,
) -> (String, Describe) {
    match by {
        GroupBy::Color => (
            "Color - ".to_string(),
            Box::new(|c: &str| format!("Songs with {} album artwork.", c.to_lowercase())),
        ),
        GroupBy::Objects => (
            "Objects - ".to_string(),
            Box::new(|c: &str| format!("Songs with {} in album artwork.", c)),
        ),
        GroupBy::Mood => (
            "Mood - ".to_string(),
            Box::new(|c: &str| lyrics_analyzer::mood_description(c)),
        ),
        GroupBy::Feature => {
            let name = feature.unwrap_or("feature").to_string();
            let describe_name = name.clone();
            (
                format!("{}: ", title_case(&name)),
                Box::new(move |c: &str| format!("Songs with {} {}.", c, describe_name)),
            )
        }
        GroupBy::Custom => (
            "Mix - ".to_string(),
            Box::new(|c: &str| format!("Songs matching the {} profile.", c)),
        ),
        GroupBy::Time => {
            // The group name already carries the full playlist name.
            let text = match time_period {
                Some(period) => match time_select {
                    TimeSelect::Mood => format!("{}.", period.description),
                    TimeSelect::Added => format!("Songs added during {}.", period.display),
                },
                None => "Time of day selection.".to_string(),
            };
            (String::new(), Box::new(move |_c: &str| text.clone()))
        }
    }
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
