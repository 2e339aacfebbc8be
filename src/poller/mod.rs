//! Query poller: incremental delivery of a growing answer.
//!
//! A [`QueryPoller`] is bound to one query id. Each tick fetches the query's
//! cumulative [`StatusSnapshot`], reconciles it against the delivery cursor,
//! and hands only the new fragments to the render sink.
//!
//! # State machine
//!
//! ```text
//!            start()            completed = true
//!   Idle ──────────────▶ Polling ─────────────────▶ Completed
//!     │                   │   │
//!     │                   │   └── fetch error ─────▶ Failed
//!     │                   │
//!     └───── cancel() ────┴──────────────────────▶ Cancelled
//! ```
//!
//! Terminal states absorb everything: no further ticks start, and a response
//! that arrives after a terminal transition is discarded.
//!
//! # Ticks
//!
//! A tick is split in two so it can be driven without real I/O:
//! [`QueryPoller::begin_tick`] hands out a [`TickTicket`] for one fetch, and
//! [`QueryPoller::complete_tick`] applies the fetch result. Only one ticket
//! is outstanding at a time, so ticks are serialized. [`QueryPoller::tick`]
//! runs both halves against a [`Backend`].
pub mod driver;
pub mod reconcile;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::client::Backend;
use crate::error::{ConsistencyViolation, PollError};
use crate::protocol::{ConversationContext, QueryId, StatusSnapshot};
use crate::sink::{MergePolicy, RenderSink};

pub use driver::{RunOutcome, Scheduler, ThreadScheduler, run_to_completion};
pub use reconcile::{Delta, reconcile};

/// Source of per-poller identities stamped on tickets.
static NEXT_POLLER_ID: AtomicU64 = AtomicU64::new(0);

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Lifecycle state of a [`QueryPoller`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Polling,
    Completed,
    Failed,
    Cancelled,
}

impl PollerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for PollerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Polling => write!(f, "polling"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Thread-safe cancellation flag shared with a poller.
///
/// Cancelling through a handle takes effect at the poller's next
/// `begin_tick` or `complete_tick`, whichever comes first.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Marker for one in-flight fetch.
#[derive(Debug)]
#[must_use = "a ticket must be completed or the poller stays blocked"]
pub struct TickTicket {
    poller: u64,
    seq: u64,
    query_id: QueryId,
}

impl TickTicket {
    /// The query to fetch for this tick.
    pub fn query_id(&self) -> &QueryId {
        &self.query_id
    }
}

/// Result of completing one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still polling; `delivered` fragments were forwarded (possibly zero).
    Delivered { delivered: usize },
    /// The backend reported completion. Carries the assembled answer.
    Completed(ConversationContext),
    /// Terminal failure. Reported exactly once per poller.
    Failed(PollError),
    /// The response was dropped: the poller was cancelled or the ticket is
    /// stale.
    Discarded,
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

/// Incremental poller for one query.
#[derive(Debug)]
pub struct QueryPoller {
    id: u64,
    query_id: QueryId,
    policy: MergePolicy,
    state: PollerState,
    cursor: usize,
    cancel: CancelHandle,
    in_flight: Option<u64>,
    next_seq: u64,
    violations: Vec<ConsistencyViolation>,
}

impl QueryPoller {
    pub fn new(query_id: QueryId, policy: MergePolicy) -> Self {
        Self {
            id: NEXT_POLLER_ID.fetch_add(1, Ordering::Relaxed),
            query_id,
            policy,
            state: PollerState::Idle,
            cursor: 0,
            cancel: CancelHandle::default(),
            in_flight: None,
            next_seq: 0,
            violations: Vec::new(),
        }
    }

    pub fn query_id(&self) -> &QueryId {
        &self.query_id
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    /// Number of fragments already forwarded to the sink.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Consistency violations seen so far, oldest first.
    pub fn violations(&self) -> &[ConsistencyViolation] {
        &self.violations
    }

    /// A handle that can cancel this poller from elsewhere.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// `Idle → Polling`. No effect in any other state.
    pub fn start(&mut self) {
        self.observe_cancel();
        if self.state == PollerState::Idle {
            self.state = PollerState::Polling;
            tracing::debug!(query_id = %self.query_id, policy = %self.policy, "polling started");
        }
    }

    /// Move to `Cancelled` unless already terminal.
    ///
    /// An outstanding ticket stays outstanding; its response is discarded.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.observe_cancel();
    }

    /// Reserve the next fetch.
    ///
    /// Returns `None` when the poller is not polling or a fetch is already in
    /// flight.
    pub fn begin_tick(&mut self) -> Option<TickTicket> {
        self.observe_cancel();
        if self.state != PollerState::Polling || self.in_flight.is_some() {
            return None;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.in_flight = Some(seq);
        Some(TickTicket {
            poller: self.id,
            seq,
            query_id: self.query_id.clone(),
        })
    }

    /// Apply the result of the fetch reserved by `ticket`.
    pub fn complete_tick(
        &mut self,
        ticket: TickTicket,
        result: Result<StatusSnapshot, PollError>,
        sink: &mut dyn RenderSink,
    ) -> TickOutcome {
        // Tickets are only valid on the poller that issued them.
        if ticket.poller != self.id || self.in_flight != Some(ticket.seq) {
            return TickOutcome::Discarded;
        }
        self.in_flight = None;

        self.observe_cancel();
        if self.state != PollerState::Polling {
            tracing::debug!(query_id = %self.query_id, state = %self.state, "response discarded");
            return TickOutcome::Discarded;
        }

        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.state = PollerState::Failed;
                tracing::info!(query_id = %self.query_id, error = %err, "polling failed");
                return TickOutcome::Failed(err);
            }
        };

        let delta = reconcile(self.cursor, &snapshot.fragments);
        if let Some(violation) = delta.violation {
            tracing::warn!(query_id = %self.query_id, %violation, "backend fragment sequence shrank");
            self.violations.push(violation);
        }

        let delivered = delta.fragments.len();
        self.policy.deliver(delta.fragments, sink);
        self.cursor = delta.next_cursor;
        tracing::debug!(
            query_id = %self.query_id,
            delivered,
            cursor = self.cursor,
            completed = snapshot.completed,
            "tick applied"
        );

        if snapshot.completed {
            self.state = PollerState::Completed;
            let response = sink.finalize();
            tracing::info!(query_id = %self.query_id, fragments = self.cursor, "query completed");
            return TickOutcome::Completed(ConversationContext::completed(response));
        }

        TickOutcome::Delivered { delivered }
    }

    /// Run one full tick against `backend`.
    ///
    /// Returns `None` when no tick could start (see [`Self::begin_tick`]).
    pub fn tick<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        sink: &mut dyn RenderSink,
    ) -> Option<TickOutcome> {
        let ticket = self.begin_tick()?;
        let result = backend.fetch_status(ticket.query_id());
        Some(self.complete_tick(ticket, result, sink))
    }

    fn observe_cancel(&mut self) {
        if self.cancel.is_cancelled() && !self.state.is_terminal() {
            self.state = PollerState::Cancelled;
            tracing::info!(query_id = %self.query_id, "polling cancelled");
        }
    }
}
