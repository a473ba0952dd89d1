// Settings module
// Persisted player and search configuration

#[allow(clippy::module_inception)]
pub mod settings;

pub use settings::{AppSettings, PlaybackSettings, SearchSettings};
