//! trackforge library interface
//!
//! Exposes the cache store, the generic enrichment pipeline, the analyzer
//! adapters and the categorization engine for integration testing.

pub mod cache;
pub mod categorize;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod playlists;
pub mod services;
pub mod time_of_day;

pub use crate::error::{Error, Result};
pub use crate::models::{AudioFeatures, ColorAnalysis, Detection, LyricsAnalysis, Track};
