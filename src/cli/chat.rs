//! `chatpoll ask` and `chatpoll chat`: one query turn, and a loop of them.
//!
//! A turn submits the query, polls until the answer is complete, and streams
//! fragments to the terminal as they arrive. The finished answer comes back
//! as a [`ConversationContext`] that the chat loop hands to the next turn.

use std::io::{BufRead, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;

use crate::client::{Backend, submit_query};
use crate::config::schema::PollerConfig;
use crate::error::{PollError, SubmissionError};
use crate::poller::{CancelHandle, QueryPoller, RunOutcome, Scheduler, run_to_completion};
use crate::protocol::ConversationContext;
use crate::sink::{RenderSink, TerminalSink};

/// Input that ends an interactive session.
const QUIT_COMMANDS: [&str; 3] = ["/quit", "/exit", ":q"];

/// How a single turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed(ConversationContext),
    Cancelled,
}

/// Why a turn failed.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(transparent)]
    Poll(#[from] PollError),
}

/// Run one query turn: submit, poll to a terminal state, render.
pub fn run_turn<B, S, W>(
    backend: &B,
    scheduler: &mut S,
    poller_config: &PollerConfig,
    query: &str,
    context: Option<&ConversationContext>,
    out: &mut W,
) -> Result<TurnOutcome, TurnError>
where
    B: Backend + ?Sized,
    S: Scheduler + ?Sized,
    W: Write,
{
    let query_id = submit_query(backend, query, context)?;
    let _ = writeln!(
        out,
        "{} {}",
        "Query sent. Waiting for responses...".dimmed(),
        format!("[{query_id}]").dimmed()
    );

    let mut poller = QueryPoller::new(query_id, poller_config.merge_policy);
    if let Some(deadline) = poller_config.deadline() {
        arm_deadline(poller.cancel_handle(), deadline);
    }

    let result = {
        let mut sink = TerminalSink::new(&mut *out);
        let result = run_to_completion(
            &mut poller,
            backend,
            &mut sink,
            scheduler,
            poller_config.interval(),
        );
        // Status lines must start on their own line.
        sink.close();
        result
    };

    if !poller.violations().is_empty() {
        let _ = writeln!(
            out,
            "{}",
            format!(
                "warning: backend resent a shorter answer {} time(s); see the log for details",
                poller.violations().len()
            )
            .yellow()
        );
    }

    match result? {
        RunOutcome::Completed(context) => {
            let _ = writeln!(out, "{}", "Query completed.".green());
            Ok(TurnOutcome::Completed(context))
        }
        RunOutcome::Cancelled => {
            let _ = writeln!(out, "{}", "Query cancelled.".yellow());
            Ok(TurnOutcome::Cancelled)
        }
    }
}

/// Cancel the poller behind `handle` once `deadline` has passed.
///
/// Cancelling a poller that already finished has no effect, so the watchdog
/// thread is never joined.
fn arm_deadline(handle: CancelHandle, deadline: Duration) {
    std::thread::spawn(move || {
        std::thread::sleep(deadline);
        if !handle.is_cancelled() {
            tracing::debug!(?deadline, "query deadline reached");
            handle.cancel();
        }
    });
}

/// Interactive loop: read a question per line, answer it, and carry the
/// completed answer into the next question as context.
///
/// Failed turns are reported and the session continues. Returns the number
/// of completed turns.
pub fn chat_loop<B, S, R, W>(
    backend: &B,
    scheduler: &mut S,
    poller_config: &PollerConfig,
    input: R,
    out: &mut W,
) -> Result<usize>
where
    B: Backend + ?Sized,
    S: Scheduler + ?Sized,
    R: BufRead,
    W: Write,
{
    let mut context: Option<ConversationContext> = None;
    let mut completed = 0usize;
    let mut lines = input.lines();

    loop {
        write!(out, "{} ", "you ›".bold().cyan())?;
        out.flush()?;

        let Some(line) = lines.next() else {
            writeln!(out)?;
            break;
        };
        let line = line.context("failed to read from stdin")?;
        let query = line.trim();

        if QUIT_COMMANDS.contains(&query) {
            break;
        }
        if query.is_empty() {
            writeln!(out, "{}", "Please enter a query.".yellow())?;
            continue;
        }

        writeln!(out, "{}", "assistant ›".bold().green())?;
        match run_turn(
            backend,
            scheduler,
            poller_config,
            query,
            context.as_ref(),
            out,
        ) {
            Ok(TurnOutcome::Completed(answer)) => {
                completed += 1;
                context = Some(answer);
            }
            Ok(TurnOutcome::Cancelled) => {}
            Err(TurnError::Submission(e)) => {
                writeln!(out, "{} {}", "Error sending query:".red(), e)?;
            }
            Err(TurnError::Poll(e)) => {
                writeln!(out, "{} {}", "Error:".red(), e)?;
            }
        }
        writeln!(out)?;
    }

    Ok(completed)
}
