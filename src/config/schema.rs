//! Configuration schema and defaults for chatpoll.
//!
//! Defines the TOML-serializable configuration with sections `[backend]`,
//! `[poller]`, `[stats]`, and `[logging]`. Every field has a built-in
//! default; users only set what they want to change.
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::poller::driver::MIN_POLL_INTERVAL;
use crate::sink::MergePolicy;
use crate::stats::DEFAULT_WINDOW;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level chatpoll configuration.
///
/// Maps directly to `~/.chatpoll/config.toml` and `.chatpoll.toml`. Missing
/// sections and fields fall back to built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatpollConfig {
    pub backend: BackendConfig,
    pub poller: PollerConfig,
    pub stats: StatsConfig,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// [backend]
// ---------------------------------------------------------------------------

/// Where the query backend lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL; endpoints are appended to it.
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            timeout_ms: 5000,
        }
    }
}

// ---------------------------------------------------------------------------
// [poller]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Delay between status polls in milliseconds.
    pub interval_ms: u64,
    /// `discrete` (one paragraph per fragment) or `running` (one text block).
    pub merge_policy: MergePolicy,
    /// Cancel a query that has not completed after this many seconds.
    /// `0` disables the deadline.
    pub deadline_secs: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            merge_policy: MergePolicy::default(),
            deadline_secs: 0,
        }
    }
}

impl PollerConfig {
    /// Polling interval, never below the busy-loop floor.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms).max(MIN_POLL_INTERVAL)
    }

    pub fn deadline(&self) -> Option<Duration> {
        (self.deadline_secs > 0).then(|| Duration::from_secs(self.deadline_secs))
    }
}

// ---------------------------------------------------------------------------
// [stats]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Delay between statistics samples in milliseconds.
    pub interval_ms: u64,
    /// Number of samples kept for display.
    pub window: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            window: DEFAULT_WINDOW,
        }
    }
}

impl StatsConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms).max(MIN_POLL_INTERVAL)
    }
}

// ---------------------------------------------------------------------------
// [logging]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive for diagnostics (`error`, `warn`, `info`, `debug`, `trace`).
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Annotated default file
// ---------------------------------------------------------------------------

impl ChatpollConfig {
    /// The default config as annotated TOML, written by `chatpoll config init`.
    pub fn default_toml() -> String {
        r#"# chatpoll configuration
#
# Configuration hierarchy (highest precedence wins):
#   1. Command-line flags
#   2. Environment variables (CHATPOLL_*)
#   3. Project config (.chatpoll.toml in current directory)
#   4. User global config (~/.chatpoll/config.toml)
#   5. Built-in defaults

[backend]
base_url = "http://127.0.0.1:8080"
timeout_ms = 5000

[poller]
interval_ms = 1000           # floor: 100
merge_policy = "discrete"    # discrete | running
deadline_secs = 0            # 0 = wait until the backend finishes

[stats]
interval_ms = 1000
window = 10

[logging]
level = "info"               # error | warn | info | debug | trace
"#
        .to_string()
    }
}
