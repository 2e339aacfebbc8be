//! `chatpoll stats`: sample performance statistics and render the window.

use std::fmt::Write as _;

use anyhow::Result;
use colored::Colorize;

use crate::stats::{Sample, SampleOutcome, StatsSampler};

use super::OutputFormat;

/// Width of the average-value bar in the table view.
const BAR_WIDTH: usize = 24;

/// Render the current window as a table with a bar per sample.
///
/// Bars are scaled to the largest average in the window.
pub fn render_table(sampler: &StatsSampler) -> String {
    let window = sampler.window();
    let mut out = String::new();

    let _ = writeln!(out, "{}", "Performance Statistics".bold().cyan());
    let _ = writeln!(out, "{}", "=".repeat(78));

    if window.is_empty() {
        let _ = writeln!(out, "{}", "No samples yet.".yellow());
        return out;
    }

    let peak = window
        .iter()
        .map(|s| s.record.average)
        .fold(0.0_f64, f64::max);

    let _ = writeln!(
        out,
        "  {:<8} {:>10} {:>8} {:>10} {:>10} {:>12}  Average",
        "Time", "Average", "Count", "Min", "Max", "Total"
    );
    let _ = writeln!(out, "  {}", "-".repeat(76));

    for (i, sample) in window.iter().enumerate() {
        let line = format!(
            "  {:<8} {:>10.2} {:>8} {:>10.2} {:>10.2} {:>12.2}  {}",
            sample.label,
            sample.record.average,
            sample.record.count,
            sample.record.min,
            sample.record.max,
            sample.record.total,
            bar(sample.record.average, peak),
        );
        if i % 2 == 0 {
            let _ = writeln!(out, "{line}");
        } else {
            let _ = writeln!(out, "{}", line.dimmed());
        }
    }

    let _ = writeln!(
        out,
        "  {}",
        format!(
            "{} of {} samples shown · {} recorded · {} skipped",
            window.len(),
            window.capacity(),
            sampler.recorded(),
            sampler.skipped()
        )
        .dimmed()
    );
    out
}

/// Header line for CSV output.
pub fn csv_header() -> &'static str {
    "time,average,count,min,max,total"
}

pub fn csv_row(sample: &Sample) -> String {
    format!(
        "{},{},{},{},{},{}",
        sample.captured_at.to_rfc3339(),
        sample.record.average,
        sample.record.count,
        sample.record.min,
        sample.record.max,
        sample.record.total,
    )
}

/// Render the result of one tick in `format`.
///
/// Table output redraws the whole window; JSON and CSV emit one line per
/// recorded sample and nothing for skipped ticks.
pub fn render_tick(
    sampler: &StatsSampler,
    outcome: SampleOutcome,
    format: OutputFormat,
) -> Result<Option<String>> {
    match format {
        OutputFormat::Table => Ok(Some(render_table(sampler))),
        OutputFormat::Json => match (outcome, sampler.window().latest()) {
            (SampleOutcome::Recorded, Some(sample)) => Ok(Some(serde_json::to_string(sample)?)),
            _ => Ok(None),
        },
        OutputFormat::Csv => match (outcome, sampler.window().latest()) {
            (SampleOutcome::Recorded, Some(sample)) => Ok(Some(csv_row(sample))),
            _ => Ok(None),
        },
    }
}

fn bar(value: f64, peak: f64) -> String {
    if peak <= 0.0 || !value.is_finite() || value <= 0.0 {
        return String::new();
    }
    let filled = ((value / peak) * BAR_WIDTH as f64).round() as usize;
    "█".repeat(filled.clamp(1, BAR_WIDTH))
}
