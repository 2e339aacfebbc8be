//! Diagnostic logging setup.
//!
//! Diagnostics go through `tracing`. `CHATPOLL_LOG` picks the destination:
//! `stderr`, `stdout`, or a file path. When unset, logs go to
//! `chatpoll.log` under the user state directory, and are dropped if that
//! file cannot be opened. Terminal output never mixes with diagnostics
//! unless asked for.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `level` is the default filter directive;
/// `RUST_LOG` overrides it when set.
pub fn init(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let target = std::env::var("CHATPOLL_LOG").ok();
    match target.as_deref() {
        Some("stderr") => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        Some("stdout") => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stdout)
                .init();
        }
        Some(path) => {
            let file = open_log_file(Path::new(path))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => match default_log_path().map(|p| open_log_file(&p)) {
            Some(Ok(file)) => {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .init();
            }
            _ => {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(std::io::sink)
                    .init();
            }
        },
    }
    Ok(())
}

/// `$XDG_STATE_HOME/chatpoll/chatpoll.log`, else `~/.local/state/chatpoll/chatpoll.log`.
pub fn default_log_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("XDG_STATE_HOME")
        && !path.is_empty()
    {
        return Some(PathBuf::from(path).join("chatpoll").join("chatpoll.log"));
    }
    dirs::home_dir().map(|home| {
        home.join(".local")
            .join("state")
            .join("chatpoll")
            .join("chatpoll.log")
    })
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}
