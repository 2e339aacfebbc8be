//! Configuration system for chatpoll.
//!
//! Provides a layered configuration hierarchy:
//!
//! 1. **Built-in defaults**: [`schema::ChatpollConfig::default()`]
//! 2. **User global config**: `~/.chatpoll/config.toml`
//! 3. **Project local config**: `.chatpoll.toml` in the current directory
//! 4. **Environment variables**: `CHATPOLL_*` overrides
//!
//! Command-line flags are applied by the CLI on top of the loaded config.
//! Malformed files are ignored so a bad file never blocks a query.
pub mod schema;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::sink::MergePolicy;

pub use schema::ChatpollConfig;

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the fully resolved configuration.
///
/// Merges defaults → global TOML → project TOML → environment variables.
pub fn load() -> ChatpollConfig {
    let mut merged = toml::Value::Table(toml::Table::new());

    for path in [global_config_path(), project_config_path()] {
        if let Some(layer) = load_toml_file(path) {
            merge_values(&mut merged, layer);
        }
    }

    let mut config = merged.try_into::<ChatpollConfig>().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "merged config is invalid, using defaults");
        ChatpollConfig::default()
    });

    apply_env_overrides(&mut config);

    config
}

/// Load one TOML config layer. `None` if missing, unreadable, or malformed.
///
/// A layer must deserialize on its own, so one bad file cannot poison the
/// values contributed by the others.
fn load_toml_file(path: Option<PathBuf>) -> Option<toml::Value> {
    let path = path?;
    let content = fs::read_to_string(&path).ok()?;
    let value: toml::Value = match toml::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring malformed config file");
            return None;
        }
    };
    if let Err(e) = value.clone().try_into::<ChatpollConfig>() {
        tracing::warn!(path = %path.display(), error = %e, "ignoring invalid config file");
        return None;
    }
    Some(value)
}

/// Merge `overlay` into `base` key by key. Tables merge recursively; any
/// other value in the overlay replaces the base value.
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

// ---------------------------------------------------------------------------
// File paths
// ---------------------------------------------------------------------------

/// Path to the user global config: `~/.chatpoll/config.toml`.
fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".chatpoll").join("config.toml"))
}

/// Path to the project local config: `.chatpoll.toml` in the current directory.
fn project_config_path() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .map(|cwd| cwd.join(".chatpoll.toml"))
}

/// Return the path to the global config file for display/init purposes.
pub fn global_config_file() -> Option<PathBuf> {
    global_config_path()
}

/// Return the path to the project config file for display purposes.
pub fn project_config_file() -> Option<PathBuf> {
    project_config_path()
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides (highest file-independent layer).
///
/// Supported variables:
/// - `CHATPOLL_URL`: backend base URL
/// - `CHATPOLL_TIMEOUT_MS`: per-request timeout
/// - `CHATPOLL_POLL_INTERVAL_MS`: status poll interval
/// - `CHATPOLL_MERGE_POLICY`: `discrete` or `running`
/// - `CHATPOLL_STATS_INTERVAL_MS`: statistics sample interval
fn apply_env_overrides(config: &mut ChatpollConfig) {
    if let Ok(val) = std::env::var("CHATPOLL_URL")
        && !val.is_empty()
    {
        config.backend.base_url = val;
    }
    if let Ok(val) = std::env::var("CHATPOLL_TIMEOUT_MS")
        && let Ok(ms) = val.parse::<u64>()
    {
        config.backend.timeout_ms = ms;
    }
    if let Ok(val) = std::env::var("CHATPOLL_POLL_INTERVAL_MS")
        && let Ok(ms) = val.parse::<u64>()
    {
        config.poller.interval_ms = ms;
    }
    if let Ok(val) = std::env::var("CHATPOLL_MERGE_POLICY")
        && let Some(policy) = parse_merge_policy(&val)
    {
        config.poller.merge_policy = policy;
    }
    if let Ok(val) = std::env::var("CHATPOLL_STATS_INTERVAL_MS")
        && let Ok(ms) = val.parse::<u64>()
    {
        config.stats.interval_ms = ms;
    }
}

/// Parse a merge policy name.
pub fn parse_merge_policy(val: &str) -> Option<MergePolicy> {
    match val.to_ascii_lowercase().as_str() {
        "discrete" | "discrete-append" | "paragraphs" => Some(MergePolicy::Discrete),
        "running" | "running-text" | "text" => Some(MergePolicy::Running),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Config init / set / reset
// ---------------------------------------------------------------------------

/// Write the default annotated config to `~/.chatpoll/config.toml`.
///
/// Fails if the file exists unless `force` is set.
pub fn init_config(force: bool) -> Result<PathBuf> {
    let path = global_config_path().context("could not determine home directory")?;

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create ~/.chatpoll/ directory")?;
    }

    fs::write(&path, ChatpollConfig::default_toml()).context("failed to write config file")?;

    Ok(path)
}

/// Set a dotted key (e.g. `poller.interval_ms`) in the global config file.
///
/// Starts from the existing file, or from serialized defaults when there is
/// none. The value is parsed according to the type already stored at that key.
pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let path = global_config_path().context("could not determine home directory")?;

    let content = if path.exists() {
        fs::read_to_string(&path).context("failed to read config file")?
    } else {
        toml::to_string_pretty(&ChatpollConfig::default())
            .context("failed to serialize default config")?
    };

    let mut root: toml::Value =
        toml::from_str(&content).context("failed to parse config as TOML value")?;
    set_toml_value(&mut root, key, value)?;

    // Refuse to write something the loader would silently ignore.
    let rendered = toml::to_string_pretty(&root).context("failed to serialize config")?;
    toml::from_str::<ChatpollConfig>(&rendered)
        .with_context(|| format!("invalid value '{value}' for '{key}'"))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    fs::write(&path, rendered).context("failed to write config file")?;

    Ok(())
}

/// Set a value in a TOML value tree using a dotted key path.
fn set_toml_value(root: &mut toml::Value, key: &str, raw_value: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();
    let Some((leaf, sections)) = parts.split_last() else {
        anyhow::bail!("empty config key");
    };

    let mut current = root;
    for &part in sections {
        current = current
            .get_mut(part)
            .with_context(|| format!("config key not found: section '{part}' in '{key}'"))?;
    }

    let table = current.as_table_mut().with_context(|| {
        format!(
            "expected table at '{}'",
            key.rsplit_once('.').map(|(s, _)| s).unwrap_or("")
        )
    })?;

    let new_value = match table.get(*leaf) {
        Some(toml::Value::Integer(_)) => {
            let n: i64 = raw_value
                .parse()
                .with_context(|| format!("expected integer for '{key}', got '{raw_value}'"))?;
            toml::Value::Integer(n)
        }
        Some(_) => toml::Value::String(raw_value.to_string()),
        None => anyhow::bail!("unknown config key: '{key}'"),
    };

    table.insert((*leaf).to_string(), new_value);
    Ok(())
}

/// Reset the global config to defaults (overwrite the file).
pub fn reset_config() -> Result<PathBuf> {
    init_config(true)
}

/// Show the effective (fully resolved) config as TOML.
pub fn show_effective_config() -> Result<String> {
    let config = load();
    toml::to_string_pretty(&config).context("failed to serialize effective config")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_merge_policy_handles_variants() {
        assert_eq!(parse_merge_policy("discrete"), Some(MergePolicy::Discrete));
        assert_eq!(parse_merge_policy("Running"), Some(MergePolicy::Running));
        assert_eq!(parse_merge_policy("running-text"), Some(MergePolicy::Running));
        assert_eq!(parse_merge_policy("paragraphs"), Some(MergePolicy::Discrete));
        assert_eq!(parse_merge_policy("bogus"), None);
    }

    #[test]
    fn set_toml_value_updates_integer() {
        let mut root: toml::Value = toml::from_str(
            r#"
[poller]
interval_ms = 1000
"#,
        )
        .unwrap();
        set_toml_value(&mut root, "poller.interval_ms", "250").unwrap();
        assert_eq!(root["poller"]["interval_ms"].as_integer(), Some(250));
    }

    #[test]
    fn set_toml_value_updates_string() {
        let mut root: toml::Value = toml::from_str(
            r#"
[poller]
merge_policy = "discrete"
"#,
        )
        .unwrap();
        set_toml_value(&mut root, "poller.merge_policy", "running").unwrap();
        assert_eq!(root["poller"]["merge_policy"].as_str(), Some("running"));
    }

    #[test]
    fn policy_aliases_accepted_on_the_command_line_are_valid_in_files() {
        for alias in ["discrete-append", "paragraphs", "running-text", "text"] {
            let mut root: toml::Value =
                toml::from_str("[poller]\nmerge_policy = \"discrete\"\n").unwrap();
            set_toml_value(&mut root, "poller.merge_policy", alias).unwrap();

            let config: ChatpollConfig = root.try_into().unwrap();
            assert_eq!(Some(config.poller.merge_policy), parse_merge_policy(alias));
        }
    }

    #[test]
    fn set_toml_value_rejects_bad_integer() {
        let mut root: toml::Value = toml::from_str("[stats]\nwindow = 10\n").unwrap();
        assert!(set_toml_value(&mut root, "stats.window", "ten").is_err());
    }

    #[test]
    fn set_toml_value_rejects_unknown_keys() {
        let mut root: toml::Value = toml::from_str("[backend]\ntimeout_ms = 1\n").unwrap();
        assert!(set_toml_value(&mut root, "nonexistent.key", "value").is_err());
        assert!(set_toml_value(&mut root, "backend.nope", "value").is_err());
    }

    #[test]
    fn project_layer_only_overrides_its_own_keys() {
        let mut merged: toml::Value = toml::from_str(
            r#"
[backend]
base_url = "http://global:9000"

[poller]
interval_ms = 500
"#,
        )
        .unwrap();
        let project: toml::Value = toml::from_str("[poller]\nmerge_policy = \"running\"\n").unwrap();
        merge_values(&mut merged, project);

        let config: ChatpollConfig = merged.try_into().unwrap();
        assert_eq!(config.backend.base_url, "http://global:9000");
        assert_eq!(config.poller.interval_ms, 500);
        assert_eq!(config.poller.merge_policy, MergePolicy::Running);
        assert_eq!(config.stats.window, 10);
    }

    #[test]
    fn show_effective_config_returns_toml() {
        let toml_str = show_effective_config().unwrap();
        let _: ChatpollConfig = toml::from_str(&toml_str).unwrap();
    }
}
