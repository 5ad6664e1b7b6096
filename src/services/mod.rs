//! Service adapters: external clients and the four analyzer stages

pub mod artwork;
pub mod audio_features;
pub mod color_analyzer;
pub mod lyrics_analyzer;
pub mod object_detector;
pub mod remote_store;
pub mod sentiment;

/// An optional capability resolved at startup
///
/// Absence is a normal configuration state, not an error: the orchestrator
/// skips stages whose capability is `Absent` and the run continues.
#[derive(Debug)]
pub enum Capability<T> {
    Present(T),
    Absent,
}

impl<T> Capability<T> {
    pub fn is_present(&self) -> bool {
        matches!(self, Capability::Present(_))
    }

    pub fn as_ref(&self) -> Option<&T> {
        match self {
            Capability::Present(t) => Some(t),
            Capability::Absent => None,
        }
    }
}
