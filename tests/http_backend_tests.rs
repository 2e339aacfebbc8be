/// HTTP backend tests against a local fake server.
///
/// Each test starts a `tiny_http` server on an ephemeral port, answers with
/// canned bodies in the backend's wire format, and checks how `HttpBackend`
/// decodes them and what it sends.
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use chatpoll::client::{Backend, HttpBackend, submit_query};
use chatpoll::error::{PollError, StatsError, SubmissionError};
use chatpoll::poller::{QueryPoller, RunOutcome, Scheduler, run_to_completion};
use chatpoll::protocol::{self, ConversationContext, QueryId, StatusSnapshot};
use chatpoll::sink::{MergePolicy, Transcript};
use tiny_http::{Header, Response, Server};

/// A request as the fake server saw it.
#[derive(Debug, Clone)]
struct Seen {
    method: String,
    url: String,
    body: String,
}

/// Fake backend server. Stops when dropped.
struct FakeServer {
    server: Arc<Server>,
    base_url: String,
    seen: Arc<Mutex<Vec<Seen>>>,
    worker: Option<JoinHandle<()>>,
}

impl FakeServer {
    /// Serve every request with `handler(method, url, seen_so_far)`.
    fn start<F>(handler: F) -> Self
    where
        F: Fn(&str, &str, usize) -> (u16, String) + Send + 'static,
    {
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let addr = server.server_addr().to_ip().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let worker = {
            let server = Arc::clone(&server);
            let seen = Arc::clone(&seen);
            std::thread::spawn(move || {
                for mut request in server.incoming_requests() {
                    let mut body = String::new();
                    let _ = request.as_reader().read_to_string(&mut body);
                    let method = request.method().to_string();
                    let url = request.url().to_string();

                    let count = {
                        let mut seen = seen.lock().unwrap();
                        seen.push(Seen {
                            method: method.clone(),
                            url: url.clone(),
                            body,
                        });
                        seen.len()
                    };

                    let (status, reply) = handler(&method, &url, count);
                    let header =
                        Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
                    let _ = request.respond(
                        Response::from_string(reply)
                            .with_status_code(status)
                            .with_header(header),
                    );
                }
            })
        };

        Self {
            server,
            base_url: format!("http://{addr}"),
            seen,
            worker: Some(worker),
        }
    }

    fn backend(&self) -> HttpBackend {
        HttpBackend::new(&self.base_url, Duration::from_secs(5))
    }

    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

struct NoSleep;

impl Scheduler for NoSleep {
    fn sleep(&mut self, _period: Duration) {}
}

fn poll_body(fragments: &[&str], completed: bool) -> String {
    protocol::encode_poll_body(&StatusSnapshot::new(fragments.iter().copied(), completed))
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

#[test]
fn submit_posts_message_and_context() {
    let server = FakeServer::start(|_, _, _| (200, r#"{"query_id":"abc"}"#.to_string()));
    let backend = server.backend();
    let context = ConversationContext::completed("earlier answer");

    let id = submit_query(&backend, "next question", Some(&context)).unwrap();

    assert_eq!(id, QueryId::new("abc"));
    let seen = server.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].method, "POST");
    assert_eq!(seen[0].url, "/");
    let body: serde_json::Value = serde_json::from_str(&seen[0].body).unwrap();
    assert_eq!(body["message"], "next question");
    assert_eq!(body["context"]["response"], "earlier answer");
    assert_eq!(body["context"]["done"], true);
}

#[test]
fn submit_without_context_omits_the_field() {
    let server = FakeServer::start(|_, _, _| (200, r#"{"query_id":"abc"}"#.to_string()));

    server.backend().submit("hi", None).unwrap();

    let body: serde_json::Value = serde_json::from_str(&server.seen()[0].body).unwrap();
    assert!(body.get("context").is_none());
}

#[test]
fn submit_error_shape_has_no_query_id() {
    let server = FakeServer::start(|_, _, _| (200, r#"{"error":"model offline"}"#.to_string()));

    let err = server.backend().submit("hi", None).unwrap_err();

    assert_eq!(err, SubmissionError::MissingQueryId);
}

#[test]
fn submit_error_status_is_a_transport_failure() {
    let server = FakeServer::start(|_, _, _| (503, String::new()));

    let err = server.backend().submit("hi", None).unwrap_err();

    assert_eq!(err, SubmissionError::Transport("HTTP status 503".to_string()));
}

// ---------------------------------------------------------------------------
// Poll
// ---------------------------------------------------------------------------

#[test]
fn poll_decodes_double_encoded_status() {
    let server = FakeServer::start(|_, _, _| (200, poll_body(&["a", "b"], false)));

    let snap = server.backend().fetch_status(&QueryId::new("q7")).unwrap();

    assert_eq!(snap, StatusSnapshot::new(["a", "b"], false));
    assert_eq!(server.seen()[0].method, "GET");
    assert_eq!(server.seen()[0].url, "/query_status/q7");
}

#[test]
fn poll_error_field_is_reported_verbatim() {
    let server = FakeServer::start(|_, _, _| (200, r#"{"error":"boom"}"#.to_string()));

    let err = server.backend().fetch_status(&QueryId::new("q")).unwrap_err();

    assert_eq!(err, PollError::ServerReported("boom".to_string()));
}

#[test]
fn poll_error_status_with_error_body_is_server_reported() {
    let server = FakeServer::start(|_, _, _| (404, r#"{"error":"unknown query"}"#.to_string()));

    let err = server.backend().fetch_status(&QueryId::new("q")).unwrap_err();

    assert_eq!(err, PollError::ServerReported("unknown query".to_string()));
}

#[test]
fn poll_error_status_without_body_is_transport() {
    let server = FakeServer::start(|_, _, _| (500, "oops".to_string()));

    let err = server.backend().fetch_status(&QueryId::new("q")).unwrap_err();

    assert_eq!(err, PollError::Transport("HTTP status 500".to_string()));
}

#[test]
fn unreachable_backend_is_a_transport_error() {
    // Bind and immediately release a port so nothing is listening on it.
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let backend = HttpBackend::new(&format!("http://{addr}"), Duration::from_secs(1));

    let err = backend.fetch_status(&QueryId::new("q")).unwrap_err();

    assert!(matches!(err, PollError::Transport(_)));
}

#[test]
fn full_query_over_http() {
    let server = FakeServer::start(|method, _, n| match (method, n) {
        ("POST", _) => (200, r#"{"query_id":"q1"}"#.to_string()),
        (_, 2) => (200, poll_body(&[], false)),
        (_, 3) => (200, poll_body(&["Hello"], false)),
        (_, 4) => (200, poll_body(&["Hello"], false)),
        _ => (200, poll_body(&["Hello", "world."], true)),
    });
    let backend = server.backend();

    let id = submit_query(&backend, "greet me", None).unwrap();
    let mut poller = QueryPoller::new(id, MergePolicy::Running);
    let mut sink = Transcript::new();
    let outcome = run_to_completion(
        &mut poller,
        &backend,
        &mut sink,
        &mut NoSleep,
        Duration::from_millis(100),
    )
    .unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Completed(ConversationContext::completed("Hello world."))
    );
    assert_eq!(server.seen().len(), 5);
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[test]
fn stats_reads_first_record() {
    let server = FakeServer::start(|_, _, _| {
        (
            200,
            r#"[{"average_value":1.5,"count":4,"max_value":3.0,"min_value":0.5,"total_value":6.0},
               {"average_value":9.0,"count":1,"max_value":9.0,"min_value":9.0,"total_value":9.0}]"#
                .to_string(),
        )
    });

    let record = server.backend().fetch_stats().unwrap();

    assert_eq!(record.average, 1.5);
    assert_eq!(record.count, 4);
    assert_eq!(record.total, 6.0);
    assert_eq!(server.seen()[0].url, "/performance_statistics");
}

#[test]
fn stats_empty_array_is_an_error() {
    let server = FakeServer::start(|_, _, _| (200, "[]".to_string()));

    assert_eq!(server.backend().fetch_stats(), Err(StatsError::Empty));
}
