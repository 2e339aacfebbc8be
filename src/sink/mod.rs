//! Render sinks and merge policies for delivered fragments.
//!
//! A poller hands each delta to a [`MergePolicy`], which decides how the
//! fragments land in a [`RenderSink`]: one unit per fragment, or one running
//! block of space-joined text. The policy only shapes presentation; the
//! poller's reconciliation never looks at it.

use std::fmt;
use std::io::Write;

use colored::Colorize;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Merge policy
// ---------------------------------------------------------------------------

/// How delivered fragments are merged into the sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    /// Each fragment becomes its own unit (one paragraph per fragment).
    #[default]
    #[serde(alias = "discrete-append", alias = "paragraphs")]
    Discrete,
    /// Fragments are joined with a single space into one growing block.
    #[serde(alias = "running-text", alias = "text")]
    Running,
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discrete => write!(f, "discrete"),
            Self::Running => write!(f, "running"),
        }
    }
}

impl MergePolicy {
    /// Deliver `delta` into `sink`. An empty delta never touches the sink.
    pub fn deliver(self, delta: &[String], sink: &mut dyn RenderSink) {
        if delta.is_empty() {
            return;
        }
        match self {
            Self::Discrete => {
                for fragment in delta {
                    sink.push_unit(fragment);
                }
            }
            Self::Running => sink.extend_running(&delta.join(" ")),
        }
    }
}

// ---------------------------------------------------------------------------
// Sink trait
// ---------------------------------------------------------------------------

/// Destination for rendered answer text.
pub trait RenderSink {
    /// Start a new addressable unit containing `text`.
    fn push_unit(&mut self, text: &str);

    /// Append `text` to the running block, separated from earlier text by a
    /// single space.
    fn extend_running(&mut self, text: &str);

    /// The full rendered answer. Called once, when the query completes.
    fn finalize(&mut self) -> String;

    /// End any partially written output without finalizing, e.g. when the
    /// query fails or is cancelled mid-answer.
    fn close(&mut self) {}
}

// ---------------------------------------------------------------------------
// In-memory transcript
// ---------------------------------------------------------------------------

/// In-memory sink. Holds one string per unit.
///
/// With the running policy there is exactly one unit that keeps growing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    units: Vec<String>,
    mutations: usize,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn units(&self) -> &[String] {
        &self.units
    }

    /// Number of times the content was changed.
    pub fn mutations(&self) -> usize {
        self.mutations
    }

    /// Units joined by newlines.
    pub fn text(&self) -> String {
        self.units.join("\n")
    }
}

impl RenderSink for Transcript {
    fn push_unit(&mut self, text: &str) {
        self.units.push(text.to_string());
        self.mutations += 1;
    }

    fn extend_running(&mut self, text: &str) {
        match self.units.last_mut() {
            Some(block) => {
                block.push(' ');
                block.push_str(text);
            }
            None => self.units.push(text.to_string()),
        }
        self.mutations += 1;
    }

    fn finalize(&mut self) -> String {
        self.text()
    }
}

// ---------------------------------------------------------------------------
// Terminal sink
// ---------------------------------------------------------------------------

/// Sink that writes the answer to a terminal as it arrives.
///
/// Keeps a [`Transcript`] alongside the output so the finished answer can be
/// threaded into the next turn. Output is best-effort: a broken pipe never
/// interrupts polling.
pub struct TerminalSink<W: Write> {
    out: W,
    transcript: Transcript,
    open_block: bool,
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            transcript: Transcript::new(),
            open_block: false,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RenderSink for TerminalSink<W> {
    fn push_unit(&mut self, text: &str) {
        let _ = writeln!(self.out, "  {}", text.bright_white());
        let _ = self.out.flush();
        self.transcript.push_unit(text);
    }

    fn extend_running(&mut self, text: &str) {
        // Indent opens the block; later appends only need the separator.
        let lead = if self.open_block { " " } else { "  " };
        let _ = write!(self.out, "{lead}{}", text.bright_white());
        let _ = self.out.flush();
        self.open_block = true;
        self.transcript.extend_running(text);
    }

    fn finalize(&mut self) -> String {
        self.close();
        self.transcript.finalize()
    }

    fn close(&mut self) {
        if self.open_block {
            let _ = writeln!(self.out);
            let _ = self.out.flush();
            self.open_block = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn discrete_policy_makes_one_unit_per_fragment() {
        let mut sink = Transcript::new();
        MergePolicy::Discrete.deliver(&strings(&["a", "b"]), &mut sink);
        MergePolicy::Discrete.deliver(&strings(&["c"]), &mut sink);

        assert_eq!(sink.units(), ["a", "b", "c"]);
        assert_eq!(sink.finalize(), "a\nb\nc");
    }

    #[test]
    fn running_policy_joins_with_single_space() {
        let mut sink = Transcript::new();
        MergePolicy::Running.deliver(&strings(&["a"]), &mut sink);
        MergePolicy::Running.deliver(&strings(&["b", "c"]), &mut sink);

        assert_eq!(sink.units(), ["a b c"]);
        assert_eq!(sink.finalize(), "a b c");
        assert_eq!(sink.mutations(), 2);
    }

    #[test]
    fn empty_delta_never_mutates() {
        let mut sink = Transcript::new();
        MergePolicy::Running.deliver(&[], &mut sink);
        MergePolicy::Discrete.deliver(&[], &mut sink);
        assert_eq!(sink.mutations(), 0);
        assert!(sink.units().is_empty());
    }

    #[test]
    fn terminal_sink_streams_running_text_and_closes_line() {
        colored::control::set_override(false);
        let mut sink = TerminalSink::new(Vec::new());
        MergePolicy::Running.deliver(&strings(&["hello"]), &mut sink);
        MergePolicy::Running.deliver(&strings(&["world"]), &mut sink);
        let text = sink.finalize();

        assert_eq!(text, "hello world");
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out, "  hello world\n");
    }

    #[test]
    fn terminal_sink_close_ends_open_line_once() {
        colored::control::set_override(false);
        let mut sink = TerminalSink::new(Vec::new());
        MergePolicy::Running.deliver(&strings(&["half"]), &mut sink);
        sink.close();
        sink.close();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out, "  half\n");
    }

    #[test]
    fn terminal_sink_prints_discrete_paragraphs() {
        colored::control::set_override(false);
        let mut sink = TerminalSink::new(Vec::new());
        MergePolicy::Discrete.deliver(&strings(&["one", "two"]), &mut sink);
        assert_eq!(sink.transcript().units(), ["one", "two"]);

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out, "  one\n  two\n");
    }

    #[test]
    fn policy_display() {
        assert_eq!(MergePolicy::Discrete.to_string(), "discrete");
        assert_eq!(MergePolicy::Running.to_string(), "running");
    }
}
