// Search worker protocol
// Messages are `{"type": ..., "payload": ...}` objects. Replies go through a
// loose envelope so unknown reply types parse instead of failing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message posted to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum WorkerRequest {
    /// JSON-serialized catalog.
    Load(String),
    Search(SearchQuery),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub query: Vec<String>,
    pub max_results: usize,
    /// Request sequence number, echoed back in the results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    #[serde(default)]
    pub num_records: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsPayload {
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub results: Vec<SearchResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

/// Message received from the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerReply {
    Status(StatusPayload),
    Results(ResultsPayload),
    /// A message type this client does not know.
    Unknown(String),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

impl WorkerReply {
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        let envelope: Envelope = serde_json::from_str(json)?;
        Ok(match envelope.kind.as_str() {
            "status" => WorkerReply::Status(serde_json::from_value(envelope.payload)?),
            "results" => WorkerReply::Results(serde_json::from_value(envelope.payload)?),
            _ => WorkerReply::Unknown(envelope.kind),
        })
    }
}
