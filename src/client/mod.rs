//! Backend access for query submission, status polling, and statistics.
//!
//! The [`Backend`] trait is the seam between the polling logic and the
//! network. [`http::HttpBackend`] talks to a real server over HTTP using the
//! synchronous `ureq` client; tests substitute scripted in-memory fakes.
//!
//! # Submission
//!
//! [`submit_query`] is the entry point callers use. It rejects empty or
//! whitespace-only text before anything touches the network, so a failed
//! validation never costs a request and never leaves a query id behind.
pub mod http;

use crate::error::{PollError, StatsError, SubmissionError};
use crate::protocol::{ConversationContext, QueryId, StatsRecord, StatusSnapshot};

pub use http::HttpBackend;

/// Operations offered by the query backend.
pub trait Backend {
    /// Submit a query and return the id to poll.
    fn submit(
        &self,
        message: &str,
        context: Option<&ConversationContext>,
    ) -> Result<QueryId, SubmissionError>;

    /// Fetch the current cumulative status of a query.
    fn fetch_status(&self, query_id: &QueryId) -> Result<StatusSnapshot, PollError>;

    /// Fetch the latest performance statistics record.
    fn fetch_stats(&self) -> Result<StatsRecord, StatsError>;
}

impl<B: Backend + ?Sized> Backend for &B {
    fn submit(
        &self,
        message: &str,
        context: Option<&ConversationContext>,
    ) -> Result<QueryId, SubmissionError> {
        (**self).submit(message, context)
    }

    fn fetch_status(&self, query_id: &QueryId) -> Result<StatusSnapshot, PollError> {
        (**self).fetch_status(query_id)
    }

    fn fetch_stats(&self) -> Result<StatsRecord, StatsError> {
        (**self).fetch_stats()
    }
}

/// Submit `text` with optional prior-turn context.
///
/// Returns [`SubmissionError::EmptyQuery`] without calling the backend when
/// the text is empty after trimming.
pub fn submit_query<B: Backend + ?Sized>(
    backend: &B,
    text: &str,
    context: Option<&ConversationContext>,
) -> Result<QueryId, SubmissionError> {
    if text.trim().is_empty() {
        return Err(SubmissionError::EmptyQuery);
    }

    let query_id = backend.submit(text, context)?;
    tracing::info!(query_id = %query_id, with_context = context.is_some(), "query submitted");
    Ok(query_id)
}
