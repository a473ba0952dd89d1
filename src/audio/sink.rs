// Link between a playback bridge and the output node that pulls from it

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared connection state for one output sink.
///
/// Clones observe the same flag: the bridge disconnects when playback ends,
/// the output and render thread stop pulling as soon as they see it.
#[derive(Debug, Clone)]
pub struct SinkConnection {
    connected: Arc<AtomicBool>,
    sample_rate: u32,
}

impl SinkConnection {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            connected: Arc::new(AtomicBool::new(false)),
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn connect(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let sink = SinkConnection::new(48000);
        let other = sink.clone();
        assert!(!other.is_connected());
        sink.connect();
        assert!(other.is_connected());
        other.disconnect();
        assert!(!sink.is_connected());
        assert_eq!(other.sample_rate(), 48000);
    }
}
