//! Shared fakes for integration tests.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

use chatpoll::client::Backend;
use chatpoll::error::{PollError, StatsError, SubmissionError};
use chatpoll::poller::{CancelHandle, Scheduler};
use chatpoll::protocol::{ConversationContext, QueryId, StatsRecord, StatusSnapshot};

/// One recorded `submit` call.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub message: String,
    pub context: Option<ConversationContext>,
}

/// In-memory backend. Every submit hands out `q1`, `q2`, ... and every poll
/// pops the next scripted result. An exhausted script repeats its last
/// snapshot, which is what a real backend does once an answer is complete.
#[derive(Default)]
pub struct ScriptedBackend {
    polls: RefCell<VecDeque<Result<StatusSnapshot, PollError>>>,
    last: RefCell<Option<StatusSnapshot>>,
    pub submissions: RefCell<Vec<Submission>>,
    pub polled: RefCell<Vec<QueryId>>,
    pub reject_submit: Option<SubmissionError>,
}

impl ScriptedBackend {
    pub fn new(polls: Vec<Result<StatusSnapshot, PollError>>) -> Self {
        Self {
            polls: RefCell::new(polls.into()),
            ..Self::default()
        }
    }

    /// A backend whose every submit fails with `err`.
    pub fn rejecting(err: SubmissionError) -> Self {
        Self {
            reject_submit: Some(err),
            ..Self::default()
        }
    }

    /// Queue further poll results, e.g. for the next chat turn.
    pub fn script(&self, polls: Vec<Result<StatusSnapshot, PollError>>) {
        self.polls.borrow_mut().extend(polls);
    }

    pub fn poll_count(&self) -> usize {
        self.polled.borrow().len()
    }
}

pub fn snapshot(fragments: &[&str], completed: bool) -> Result<StatusSnapshot, PollError> {
    Ok(StatusSnapshot::new(fragments.iter().copied(), completed))
}

impl Backend for ScriptedBackend {
    fn submit(
        &self,
        message: &str,
        context: Option<&ConversationContext>,
    ) -> Result<QueryId, SubmissionError> {
        if let Some(err) = &self.reject_submit {
            return Err(err.clone());
        }
        let mut submissions = self.submissions.borrow_mut();
        submissions.push(Submission {
            message: message.to_string(),
            context: context.cloned(),
        });
        Ok(QueryId::new(format!("q{}", submissions.len())))
    }

    fn fetch_status(&self, query_id: &QueryId) -> Result<StatusSnapshot, PollError> {
        self.polled.borrow_mut().push(query_id.clone());
        match self.polls.borrow_mut().pop_front() {
            Some(Ok(snap)) => {
                *self.last.borrow_mut() = Some(snap.clone());
                Ok(snap)
            }
            Some(Err(e)) => Err(e),
            None => Ok(self.last.borrow().clone().unwrap_or_default()),
        }
    }

    fn fetch_stats(&self) -> Result<StatsRecord, StatsError> {
        Err(StatsError::Empty)
    }
}

/// Records requested sleeps instead of sleeping. Optionally cancels a
/// poller once a given number of sleeps have happened.
#[derive(Default)]
pub struct RecordingScheduler {
    pub sleeps: Vec<Duration>,
    pub cancel_after: Option<(usize, CancelHandle)>,
}

impl Scheduler for RecordingScheduler {
    fn sleep(&mut self, period: Duration) {
        self.sleeps.push(period);
        if let Some((n, handle)) = &self.cancel_after
            && self.sleeps.len() > *n
        {
            handle.cancel();
        }
    }
}
