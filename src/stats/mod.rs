//! Performance statistics sampler.
//!
//! Polls the backend's statistics endpoint on a fixed cadence and keeps the
//! most recent samples in a [`RollingWindow`]. Sampling failures are logged
//! and skipped; they never stop the sampler.
//!
//! The sampler shares nothing with the query poller.
use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::client::Backend;
use crate::poller::Scheduler;
use crate::protocol::StatsRecord;

/// Default number of samples kept in the window.
pub const DEFAULT_WINDOW: usize = 10;

// ---------------------------------------------------------------------------
// Rolling window
// ---------------------------------------------------------------------------

/// Fixed-capacity FIFO. Pushing past capacity evicts the oldest item.
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T> RollingWindow<T> {
    /// A window holding at most `capacity` items (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    /// Append `item`, returning the evicted oldest item if the window was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    /// Items from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

// ---------------------------------------------------------------------------
// Samples
// ---------------------------------------------------------------------------

/// One statistics record with its capture time.
#[derive(Debug, Clone, Serialize)]
pub struct Sample {
    /// Display label: capture time as `HH:MM:SS`.
    pub label: String,
    pub captured_at: DateTime<Local>,
    #[serde(flatten)]
    pub record: StatsRecord,
}

impl Sample {
    pub fn new(record: StatsRecord, captured_at: DateTime<Local>) -> Self {
        Self {
            label: captured_at.format("%H:%M:%S").to_string(),
            captured_at,
            record,
        }
    }
}

/// What happened on one sampler tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    Recorded,
    Skipped,
}

// ---------------------------------------------------------------------------
// Sampler
// ---------------------------------------------------------------------------

/// Periodic statistics sampler over a rolling window.
#[derive(Debug, Clone)]
pub struct StatsSampler {
    window: RollingWindow<Sample>,
    recorded: u64,
    skipped: u64,
}

impl Default for StatsSampler {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl StatsSampler {
    pub fn new(window: usize) -> Self {
        Self {
            window: RollingWindow::new(window),
            recorded: 0,
            skipped: 0,
        }
    }

    pub fn window(&self) -> &RollingWindow<Sample> {
        &self.window
    }

    /// Samples successfully recorded since creation (including evicted ones).
    pub fn recorded(&self) -> u64 {
        self.recorded
    }

    /// Ticks skipped because the fetch failed.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Fetch one record and append it, labeled with `captured_at`.
    pub fn tick<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        captured_at: DateTime<Local>,
    ) -> SampleOutcome {
        match backend.fetch_stats() {
            Ok(record) => {
                self.window.push(Sample::new(record, captured_at));
                self.recorded += 1;
                SampleOutcome::Recorded
            }
            Err(err) => {
                self.skipped += 1;
                tracing::warn!(error = %err, "statistics sample skipped");
                SampleOutcome::Skipped
            }
        }
    }

    /// Sample every `interval`, calling `on_tick` after each tick.
    ///
    /// Stops after `max_ticks` ticks, or never when `None`.
    pub fn run<B, S, F>(
        &mut self,
        backend: &B,
        scheduler: &mut S,
        interval: Duration,
        max_ticks: Option<usize>,
        mut on_tick: F,
    ) where
        B: Backend + ?Sized,
        S: Scheduler + ?Sized,
        F: FnMut(&Self, SampleOutcome),
    {
        let mut ticks = 0usize;
        while max_ticks.is_none_or(|max| ticks < max) {
            let outcome = self.tick(backend, Local::now());
            ticks += 1;
            on_tick(self, outcome);

            if max_ticks.is_some_and(|max| ticks >= max) {
                break;
            }
            scheduler.sleep(interval);
        }
    }
}
