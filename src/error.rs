// Error types

use thiserror::Error;

/// Errors raised while reading or writing decoder structs in the foreign heap.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AbiError {
    /// A struct or buffer read fell outside the decoder's heap.
    #[error("Heap access out of bounds: {len} bytes at {ptr:#x}")]
    OutOfBounds { ptr: u32, len: usize },

    /// The decoder core was built against a different struct layout.
    #[error("Decoder ABI mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: String, found: String },
}

/// Playback bridge error type.
#[derive(Error, Debug)]
pub enum PlayerError {
    /// The decoder refused the module bytes.
    #[error("Unable to load this file (decoder error {code})")]
    UnloadableModule { code: i32 },

    /// The decoder failed mid-playback. The session is stopped.
    #[error("Unable to play this file (decoder error {code})")]
    Decode { code: i32 },

    /// No module is loaded.
    #[error("No module loaded")]
    NotLoaded,

    /// The session ended; load a module to play again.
    #[error("Playback has stopped")]
    Stopped,

    /// The decoder heap could not satisfy an allocation.
    #[error("Decoder heap allocation of {size} bytes failed")]
    OutOfMemory { size: usize },

    #[error(transparent)]
    Abi(#[from] AbiError),

    /// Audio output device error.
    #[error("Audio output error: {0}")]
    Output(String),
}

/// Search presenter error type.
#[derive(Error, Debug)]
pub enum SearchError {
    /// A worker message could not be encoded or decoded.
    #[error("Malformed worker message: {0}")]
    Json(#[from] serde_json::Error),

    /// The worker's inbound channel has been dropped.
    #[error("Search worker channel closed")]
    WorkerClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = PlayerError::UnloadableModule { code: -3 };
        assert_eq!(err.to_string(), "Unable to load this file (decoder error -3)");
    }

    #[test]
    fn abi_error_converts() {
        let err: PlayerError = AbiError::OutOfBounds { ptr: 0x10, len: 4 }.into();
        assert!(matches!(err, PlayerError::Abi(AbiError::OutOfBounds { .. })));
        assert_eq!(err.to_string(), "Heap access out of bounds: 4 bytes at 0x10");
    }

    #[test]
    fn search_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: SearchError = json_err.into();
        assert!(err.to_string().starts_with("Malformed worker message"));
    }
}
