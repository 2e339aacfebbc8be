//! Error taxonomy for submission, polling, and statistics sampling.
//!
//! Submission and poll errors are terminal for the operation that raised
//! them. [`ConsistencyViolation`] and [`StatsError`] never stop anything;
//! they are recorded or logged and the caller keeps going.

use thiserror::Error;

/// Failure to obtain a query id. No poller is started after one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    /// The query text was empty or whitespace only. No request was made.
    #[error("query text is empty")]
    EmptyQuery,
    #[error("submit request failed: {0}")]
    Transport(String),
    /// The backend answered, but without a usable `query_id`.
    #[error("backend response did not contain a query id")]
    MissingQueryId,
    #[error("malformed submit response: {0}")]
    Malformed(String),
}

/// Terminal failure of a poll cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    /// Network or HTTP-level failure while fetching a status snapshot.
    #[error("error fetching query status: {0}")]
    Transport(String),
    /// The backend reported an error for this query. Carried verbatim.
    #[error("backend reported error: {0}")]
    ServerReported(String),
    /// The poll body or its encoded `status` field could not be decoded.
    #[error("malformed query status: {0}")]
    Malformed(String),
}

/// The backend returned fewer fragments than were already delivered.
///
/// Non-fatal: the delta is clamped to empty and polling continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error(
    "fragment sequence shrank: {observed} fragments observed after {expected_at_least} were delivered"
)]
pub struct ConsistencyViolation {
    pub expected_at_least: usize,
    pub observed: usize,
}

/// Failure to fetch one statistics sample. The sampler skips the tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatsError {
    #[error("statistics request failed: {0}")]
    Transport(String),
    #[error("malformed statistics response: {0}")]
    Malformed(String),
    #[error("statistics response contained no records")]
    Empty,
}
