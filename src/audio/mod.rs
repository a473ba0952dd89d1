// Audio playback module
// Bridges a tracker decoder core to cpal output

pub mod abi;
pub mod bridge;
pub mod decoder;
pub mod output;
pub mod player;
pub mod sink;
pub mod tempo;

pub use bridge::{FillOutcome, PlaybackBridge, PlaybackState};
pub use decoder::ChipCore;
pub use player::Player;
