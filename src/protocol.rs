//! Wire types for the query backend's HTTP contract.
//!
//! Three endpoints are involved:
//!
//! - `POST /` submits a query and answers `{ "query_id": "..." }`.
//! - `GET /query_status/{id}` answers `{ "status": "<json>", "error"?: "..." }`
//!   where `status` is itself a JSON document encoded as a string.
//! - `GET /performance_statistics` answers an array of stat records.
//!
//! The decode functions turn raw bodies into domain values and typed errors,
//! so the HTTP layer and the test fakes share one parsing path.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PollError, StatsError, SubmissionError};

// ---------------------------------------------------------------------------
// Domain values
// ---------------------------------------------------------------------------

/// Opaque identifier handed out by the backend for one submitted query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryId(String);

impl QueryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One poll's cumulative view of the answer.
///
/// `fragments` only ever grows between snapshots of the same query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub fragments: Vec<String>,
    pub completed: bool,
}

impl StatusSnapshot {
    pub fn new<I, S>(fragments: I, completed: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            completed,
        }
    }
}

/// The previous turn of a conversation, sent along with the next query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub response: String,
    pub done: bool,
}

impl ConversationContext {
    /// Context for a fully assembled answer.
    pub fn completed(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            done: true,
        }
    }
}

/// One performance statistics record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatsRecord {
    pub average: f64,
    pub count: u64,
    pub max: f64,
    pub min: f64,
    pub total: f64,
}

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

/// Request body for `POST /`.
#[derive(Debug, Serialize)]
pub struct SubmitRequest<'a> {
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<&'a ConversationContext>,
}

/// Response body from `POST /`. An error shape simply lacks `query_id`.
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    query_id: Option<String>,
}

/// Response body from `GET /query_status/{id}`.
#[derive(Debug, Deserialize)]
struct PollResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// The JSON document encoded inside [`PollResponse::status`].
#[derive(Debug, Deserialize)]
struct StatusPayload {
    #[serde(default)]
    completed: bool,
    partial_responses: Vec<String>,
}

/// One element of the `GET /performance_statistics` array.
#[derive(Debug, Deserialize)]
struct WireStatsRecord {
    average_value: f64,
    count: u64,
    max_value: f64,
    min_value: f64,
    total_value: f64,
}

impl From<WireStatsRecord> for StatsRecord {
    fn from(wire: WireStatsRecord) -> Self {
        Self {
            average: wire.average_value,
            count: wire.count,
            max: wire.max_value,
            min: wire.min_value,
            total: wire.total_value,
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode a submit response body into a query id.
///
/// An absent or empty `query_id` is [`SubmissionError::MissingQueryId`].
pub fn decode_submit_body(body: &str) -> Result<QueryId, SubmissionError> {
    let parsed: SubmitResponse =
        serde_json::from_str(body).map_err(|e| SubmissionError::Malformed(e.to_string()))?;

    match parsed.query_id {
        Some(id) if !id.is_empty() => Ok(QueryId(id)),
        _ => Err(SubmissionError::MissingQueryId),
    }
}

/// Decode a poll response body into a snapshot.
///
/// A non-empty `error` wins over any `status` present in the same body. The
/// `status` string is decoded a second time to reach the fragments.
pub fn decode_poll_body(body: &str) -> Result<StatusSnapshot, PollError> {
    let parsed: PollResponse =
        serde_json::from_str(body).map_err(|e| PollError::Malformed(e.to_string()))?;

    if let Some(error) = parsed.error
        && !error.is_empty()
    {
        return Err(PollError::ServerReported(error));
    }

    let status = parsed
        .status
        .ok_or_else(|| PollError::Malformed("response has no status field".to_string()))?;

    let payload: StatusPayload = serde_json::from_str(&status)
        .map_err(|e| PollError::Malformed(format!("status field: {e}")))?;

    Ok(StatusSnapshot {
        fragments: payload.partial_responses,
        completed: payload.completed,
    })
}

/// Extract a server-reported error from an error-status body, if it has one.
pub fn server_error_message(body: &str) -> Option<String> {
    let parsed: PollResponse = serde_json::from_str(body).ok()?;
    parsed.error.filter(|e| !e.is_empty())
}

/// Decode a statistics response body, keeping only the first record.
pub fn decode_stats_body(body: &str) -> Result<StatsRecord, StatsError> {
    let records: Vec<WireStatsRecord> =
        serde_json::from_str(body).map_err(|e| StatsError::Malformed(e.to_string()))?;

    records
        .into_iter()
        .next()
        .map(StatsRecord::from)
        .ok_or(StatsError::Empty)
}

/// Encode a snapshot the way the backend does. Used by fakes and tests.
pub fn encode_poll_body(snapshot: &StatusSnapshot) -> String {
    let status = serde_json::json!({
        "completed": snapshot.completed,
        "partial_responses": snapshot.fragments,
    })
    .to_string();
    serde_json::json!({ "status": status }).to_string()
}
