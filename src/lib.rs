// Chipsloth - tracker module player
// Module declarations
pub mod audio;
pub mod db;
pub mod error;
pub mod library;
pub mod logging;
pub mod search;
pub mod settings;
pub mod state;

pub use audio::{ChipCore, PlaybackBridge, PlaybackState, Player};
pub use error::{AbiError, PlayerError, SearchError};
pub use search::SearchPresenter;
pub use state::AppState;
