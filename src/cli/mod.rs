//! CLI command implementations for chatpoll.
//!
//! Provides subcommand handlers for:
//! - `chatpoll ask "question"`: submit one query and stream the answer
//! - `chatpoll chat`: interactive conversation with context threading
//! - `chatpoll stats`: sample performance statistics into a rolling window
//! - `chatpoll health`: check backend reachability and config sources
//! - `chatpoll config show|init|set|reset`: configuration management

pub mod chat;
pub mod stats;

use std::io::{self, IsTerminal, Write};

use anyhow::{Context, Result};
use colored::Colorize;

use crate::client::{Backend, HttpBackend};
use crate::config::{self, ChatpollConfig};
use crate::poller::ThreadScheduler;
use crate::stats::StatsSampler;

pub use chat::{TurnError, TurnOutcome, chat_loop, run_turn};

/// Output format for the stats command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl OutputFormat {
    pub fn from_str_opt(s: Option<&str>) -> Self {
        match s {
            Some("json") => Self::Json,
            Some("csv") => Self::Csv,
            _ => Self::Table,
        }
    }
}

/// Per-invocation overrides shared by `ask` and `chat`.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub url: Option<String>,
    pub policy: Option<String>,
    pub interval_ms: Option<u64>,
    pub deadline_secs: Option<u64>,
}

impl QueryOptions {
    /// Apply command-line overrides on top of the loaded config.
    pub fn apply(&self, cfg: &mut ChatpollConfig) -> Result<()> {
        if let Some(url) = &self.url {
            cfg.backend.base_url = url.clone();
        }
        if let Some(policy) = &self.policy {
            cfg.poller.merge_policy = config::parse_merge_policy(policy).with_context(|| {
                format!("unknown merge policy '{policy}' (expected 'discrete' or 'running')")
            })?;
        }
        if let Some(ms) = self.interval_ms {
            cfg.poller.interval_ms = ms;
        }
        if let Some(secs) = self.deadline_secs {
            cfg.poller.deadline_secs = secs;
        }
        Ok(())
    }
}

fn resolve_config(options: &QueryOptions) -> Result<ChatpollConfig> {
    let mut cfg = config::load();
    options.apply(&mut cfg)?;
    Ok(cfg)
}

// ---------------------------------------------------------------------------
// chatpoll ask
// ---------------------------------------------------------------------------

/// Submit one query and stream its answer to stdout.
pub fn run_ask(query: &str, options: &QueryOptions) -> Result<()> {
    let cfg = resolve_config(options)?;
    let backend = HttpBackend::from_config(&cfg.backend);
    let mut stdout = io::stdout().lock();

    match run_turn(
        &backend,
        &mut ThreadScheduler,
        &cfg.poller,
        query,
        None,
        &mut stdout,
    ) {
        Ok(TurnOutcome::Completed(_)) => Ok(()),
        Ok(TurnOutcome::Cancelled) => anyhow::bail!(
            "query did not complete within {} seconds",
            cfg.poller.deadline_secs
        ),
        Err(TurnError::Submission(e)) => Err(e).context("error sending query"),
        Err(TurnError::Poll(e)) => Err(e.into()),
    }
}

// ---------------------------------------------------------------------------
// chatpoll chat
// ---------------------------------------------------------------------------

/// Interactive conversation on stdin/stdout.
pub fn run_chat(options: &QueryOptions) -> Result<()> {
    let cfg = resolve_config(options)?;
    let backend = HttpBackend::from_config(&cfg.backend);

    println!("{}", "chatpoll".bold().cyan());
    println!(
        "  {}",
        format!(
            "backend {} · {} rendering · /quit to leave",
            backend.base_url(),
            cfg.poller.merge_policy
        )
        .dimmed()
    );
    println!();

    let stdin = io::stdin().lock();
    let mut stdout = io::stdout().lock();
    let turns = chat_loop(
        &backend,
        &mut ThreadScheduler,
        &cfg.poller,
        stdin,
        &mut stdout,
    )?;
    tracing::info!(turns, "chat session ended");
    Ok(())
}

// ---------------------------------------------------------------------------
// chatpoll stats
// ---------------------------------------------------------------------------

/// Sample statistics every interval, redrawing after each tick.
pub fn run_stats(
    format: OutputFormat,
    samples: Option<usize>,
    interval_ms: Option<u64>,
    url: Option<String>,
) -> Result<()> {
    let mut cfg = config::load();
    if let Some(url) = url {
        cfg.backend.base_url = url;
    }
    if let Some(ms) = interval_ms {
        cfg.stats.interval_ms = ms;
    }

    let backend = HttpBackend::from_config(&cfg.backend);
    let mut sampler = StatsSampler::new(cfg.stats.window);
    let mut stdout = io::stdout().lock();
    let redraw = format == OutputFormat::Table && stdout.is_terminal();

    if format == OutputFormat::Csv {
        writeln!(stdout, "{}", stats::csv_header())?;
    }

    let mut write_error: Option<io::Error> = None;
    sampler.run(
        &backend,
        &mut ThreadScheduler,
        cfg.stats.interval(),
        samples,
        |sampler, outcome| {
            if write_error.is_some() {
                return;
            }
            let rendered = match stats::render_tick(sampler, outcome, format) {
                Ok(Some(text)) => text,
                Ok(None) => return,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to render sample");
                    return;
                }
            };
            let result = if redraw {
                write!(stdout, "\x1B[2J\x1B[H{rendered}")
            } else {
                writeln!(stdout, "{}", rendered.trim_end())
            };
            if let Err(e) = result.and_then(|()| stdout.flush()) {
                write_error = Some(e);
            }
        },
    );

    match write_error {
        Some(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        Some(e) => Err(e).context("failed to write statistics"),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// chatpoll health
// ---------------------------------------------------------------------------

/// Check backend reachability and show where configuration comes from.
pub fn run_health() -> Result<()> {
    println!("{}", "chatpoll Health Check".bold().cyan());
    println!("{}", "=".repeat(40));

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let cfg = config::load();

    print_health_item(
        "Global config",
        global_exists,
        if global_exists {
            "~/.chatpoll/config.toml found"
        } else {
            "not found (run `chatpoll config init` to create)"
        },
    );
    print_health_item(
        "Project config",
        project_exists,
        if project_exists {
            ".chatpoll.toml found"
        } else {
            "none (optional)"
        },
    );
    print_health_item(
        "Polling",
        true,
        &format!(
            "every {} ms, {} rendering",
            cfg.poller.interval().as_millis(),
            cfg.poller.merge_policy
        ),
    );

    let backend = HttpBackend::from_config(&cfg.backend);
    let (reachable, detail) = match backend.fetch_stats() {
        Ok(record) => (
            true,
            format!(
                "reachable at {} ({} requests recorded)",
                backend.base_url(),
                record.count
            ),
        ),
        Err(e) => (false, format!("{}: {e}", backend.base_url())),
    };
    print_health_item("Backend", reachable, &detail);

    let log_path = crate::logging::default_log_path();
    print_health_item(
        "Log file",
        true,
        &match (std::env::var("CHATPOLL_LOG").ok(), log_path) {
            (Some(target), _) => format!("CHATPOLL_LOG={target}"),
            (None, Some(path)) => path.display().to_string(),
            (None, None) => "disabled".to_string(),
        },
    );

    Ok(())
}

fn print_health_item(name: &str, ok: bool, detail: &str) {
    let status = if ok {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    println!("  {} {:<16} {}", status, name, detail.dimmed());
}

// ---------------------------------------------------------------------------
// chatpoll config show | init | set | reset
// ---------------------------------------------------------------------------

/// Show the effective (merged) configuration as TOML.
pub fn run_config_show() -> Result<()> {
    let toml_str = config::show_effective_config()?;
    println!("{}", "Effective chatpoll Configuration".bold().cyan());
    println!("{}", "=".repeat(50));
    println!();
    println!("{toml_str}");

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    println!("{}", "Sources (highest priority last):".dimmed());
    println!("  {} built-in defaults", "·".dimmed());
    print_source("~/.chatpoll/config.toml", global_exists);
    print_source(".chatpoll.toml", project_exists);
    println!(
        "  {} {}",
        "·".dimmed(),
        "CHATPOLL_* environment variables".dimmed()
    );
    println!("  {} {}", "·".dimmed(), "command-line flags".dimmed());

    Ok(())
}

fn print_source(name: &str, exists: bool) {
    if exists {
        println!("  {} {}", "✓".green(), name.dimmed());
    } else {
        println!("  {} {}", "·".dimmed(), format!("{name} (not found)").dimmed());
    }
}

/// Initialize a default config file at `~/.chatpoll/config.toml`.
pub fn run_config_init(force: bool) -> Result<()> {
    let path = config::init_config(force)?;
    println!(
        "{} Config written to {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}

/// Set a single configuration value in the global config file.
pub fn run_config_set(key: &str, value: &str) -> Result<()> {
    config::set_config_value(key, value)?;
    println!("{} Set {} = {}", "✓".green().bold(), key.bold(), value);
    Ok(())
}

/// Reset configuration to defaults.
pub fn run_config_reset() -> Result<()> {
    let path = config::reset_config()?;
    println!(
        "{} Config reset to defaults at {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}
