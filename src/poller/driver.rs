//! Blocking poll loop.
//!
//! Sleeps one interval, ticks, and repeats until the poller reaches a
//! terminal state. The fetch for a tick finishes before the next sleep
//! starts, so fetches never overlap.

use std::time::Duration;

use crate::client::Backend;
use crate::error::PollError;
use crate::protocol::ConversationContext;
use crate::sink::RenderSink;

use super::{PollerState, QueryPoller, TickOutcome};

/// Floor for the polling interval; anything lower becomes a busy loop.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Source of delays between ticks.
pub trait Scheduler {
    fn sleep(&mut self, period: Duration);
}

/// Scheduler backed by [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadScheduler;

impl Scheduler for ThreadScheduler {
    fn sleep(&mut self, period: Duration) {
        std::thread::sleep(period);
    }
}

/// How a poll loop ended, other than by failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(ConversationContext),
    Cancelled,
}

/// Drive `poller` until it completes, fails, or is cancelled.
///
/// An `Idle` poller is started first. A poller that is already terminal
/// returns immediately: `Cancelled` maps to [`RunOutcome::Cancelled`], and
/// `Completed`/`Failed` pollers have already reported their outcome, so
/// they also return [`RunOutcome::Cancelled`] without touching the sink.
pub fn run_to_completion<B, S>(
    poller: &mut QueryPoller,
    backend: &B,
    sink: &mut dyn RenderSink,
    scheduler: &mut S,
    interval: Duration,
) -> Result<RunOutcome, PollError>
where
    B: Backend + ?Sized,
    S: Scheduler + ?Sized,
{
    let interval = interval.max(MIN_POLL_INTERVAL);
    poller.start();

    loop {
        if poller.state().is_terminal() {
            return Ok(RunOutcome::Cancelled);
        }

        scheduler.sleep(interval);

        match poller.tick(backend, sink) {
            Some(TickOutcome::Completed(context)) => return Ok(RunOutcome::Completed(context)),
            Some(TickOutcome::Failed(err)) => return Err(err),
            Some(TickOutcome::Delivered { .. }) | Some(TickOutcome::Discarded) | None => {}
        }

        if poller.state() == PollerState::Cancelled {
            return Ok(RunOutcome::Cancelled);
        }
    }
}
