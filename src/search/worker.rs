// Search worker handle
// The index itself runs elsewhere; this side only posts JSON messages to it.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::trace;

use crate::error::SearchError;
use crate::search::protocol::WorkerRequest;

/// Outbound half of a search worker connection.
pub trait SearchWorker {
    fn post_message(&self, message: &WorkerRequest) -> Result<(), SearchError>;
}

/// Worker connection over an unbounded channel of JSON text.
#[derive(Clone)]
pub struct ChannelWorker {
    tx: UnboundedSender<String>,
}

impl ChannelWorker {
    /// Create a worker handle and the receiver the worker task reads from.
    pub fn channel() -> (Self, UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl SearchWorker for ChannelWorker {
    fn post_message(&self, message: &WorkerRequest) -> Result<(), SearchError> {
        let json = serde_json::to_string(message)?;
        trace!(len = json.len(), "Posting worker message");
        self.tx.send(json).map_err(|_| SearchError::WorkerClosed)
    }
}
