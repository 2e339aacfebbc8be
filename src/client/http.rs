//! HTTP client for the query backend.
//!
//! Uses the synchronous `ureq` client. Every request carries the configured
//! timeout, so a stalled backend surfaces as a transport error on the tick
//! that hit it instead of hanging the poll loop forever.
use std::time::Duration;

use crate::config::schema::BackendConfig;
use crate::error::{PollError, StatsError, SubmissionError};
use crate::protocol::{
    self, ConversationContext, QueryId, StatsRecord, StatusSnapshot, SubmitRequest,
};

use super::Backend;

/// Synchronous HTTP backend client.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    timeout: Duration,
}

impl HttpBackend {
    /// Build a client from the resolved backend config.
    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(&config.base_url, Duration::from_millis(config.timeout_ms))
    }

    pub fn new(base_url: &str, timeout: Duration) -> Self {
        // "localhost" may resolve to ::1 first and stall when the server only
        // binds IPv4.
        let base_url = base_url
            .trim_end_matches('/')
            .replace("://localhost", "://127.0.0.1");
        Self { base_url, timeout }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Outcome of one request, reduced to what the decoders need.
enum RawResponse {
    Ok(String),
    ErrorStatus(u16, String),
}

fn read_response(result: Result<ureq::Response, ureq::Error>) -> Result<RawResponse, String> {
    match result {
        Ok(resp) => resp
            .into_string()
            .map(RawResponse::Ok)
            .map_err(|e| format!("failed to read response body: {e}")),
        Err(ureq::Error::Status(code, resp)) => {
            Ok(RawResponse::ErrorStatus(code, resp.into_string().unwrap_or_default()))
        }
        Err(ureq::Error::Transport(t)) => Err(t.to_string()),
    }
}

impl Backend for HttpBackend {
    fn submit(
        &self,
        message: &str,
        context: Option<&ConversationContext>,
    ) -> Result<QueryId, SubmissionError> {
        let body = SubmitRequest { message, context };
        let result = ureq::post(&self.url("/"))
            .timeout(self.timeout)
            .send_json(&body);

        match read_response(result).map_err(SubmissionError::Transport)? {
            RawResponse::Ok(text) => protocol::decode_submit_body(&text),
            // An error status may still carry an error shape; either way there
            // is no id to poll.
            RawResponse::ErrorStatus(code, text) => {
                tracing::debug!(code, body = %text, "submit rejected");
                Err(SubmissionError::Transport(format!("HTTP status {code}")))
            }
        }
    }

    fn fetch_status(&self, query_id: &QueryId) -> Result<StatusSnapshot, PollError> {
        let url = self.url(&format!("/query_status/{query_id}"));
        let result = ureq::get(&url).timeout(self.timeout).call();

        match read_response(result).map_err(PollError::Transport)? {
            RawResponse::Ok(text) => protocol::decode_poll_body(&text),
            RawResponse::ErrorStatus(code, text) => match protocol::server_error_message(&text) {
                Some(message) => Err(PollError::ServerReported(message)),
                None => Err(PollError::Transport(format!("HTTP status {code}"))),
            },
        }
    }

    fn fetch_stats(&self) -> Result<StatsRecord, StatsError> {
        let result = ureq::get(&self.url("/performance_statistics"))
            .timeout(self.timeout)
            .call();

        match read_response(result).map_err(StatsError::Transport)? {
            RawResponse::Ok(text) => protocol::decode_stats_body(&text),
            RawResponse::ErrorStatus(code, _) => {
                Err(StatsError::Transport(format!("HTTP status {code}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_from_default_config() {
        let config = BackendConfig::default();
        let client = HttpBackend::from_config(&config);
        assert_eq!(client.base_url, "http://127.0.0.1:8080");
        assert_eq!(client.timeout, Duration::from_millis(5000));
    }

    #[test]
    fn client_strips_trailing_slash_and_pins_ipv4() {
        let client = HttpBackend::new("http://localhost:9000/", Duration::from_secs(1));
        assert_eq!(client.base_url(), "http://127.0.0.1:9000");
        assert_eq!(client.url("/query_status/q1"), "http://127.0.0.1:9000/query_status/q1");
    }
}
