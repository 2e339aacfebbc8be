use anyhow::Result;
use clap::{Parser, Subcommand};

use chatpoll::cli::{self, QueryOptions};
use chatpoll::{config, logging};

#[derive(Debug, Parser)]
#[command(name = "chatpoll")]
#[command(about = "Ask a chat backend questions and stream the answers as they arrive")]
struct App {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Args)]
struct QueryArgs {
    /// Backend base URL (overrides config and CHATPOLL_URL)
    #[arg(long)]
    url: Option<String>,
    /// Rendering of streamed fragments: discrete or running
    #[arg(long)]
    policy: Option<String>,
    /// Poll interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,
    /// Cancel the query after this many seconds (0 = no deadline)
    #[arg(long)]
    deadline_secs: Option<u64>,
}

impl From<QueryArgs> for QueryOptions {
    fn from(args: QueryArgs) -> Self {
        Self {
            url: args.url,
            policy: args.policy,
            interval_ms: args.interval_ms,
            deadline_secs: args.deadline_secs,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Submit one query and stream the answer
    Ask {
        /// The query text
        #[arg(required = true)]
        query: Vec<String>,
        #[command(flatten)]
        options: QueryArgs,
    },
    /// Interactive conversation; each answer becomes context for the next query
    Chat {
        #[command(flatten)]
        options: QueryArgs,
    },
    /// Sample backend performance statistics
    Stats {
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
        /// Stop after N samples (default: run until interrupted)
        #[arg(long)]
        samples: Option<usize>,
        /// Sampling interval in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Backend base URL
        #[arg(long)]
        url: Option<String>,
    },
    /// Check backend reachability and configuration
    Health,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Write a default config file to ~/.chatpoll/config.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Set a value, e.g. `poller.interval_ms 500`
    Set { key: String, value: String },
    /// Reset the global config file to defaults
    Reset,
}

fn main() -> Result<()> {
    let app = App::parse();

    let settings = config::load();
    if let Err(e) = logging::init(&settings.logging.level) {
        eprintln!("warning: logging disabled: {e:#}");
    }

    match app.command {
        Commands::Ask { query, options } => cli::run_ask(&query.join(" "), &options.into()),
        Commands::Chat { options } => cli::run_chat(&options.into()),
        Commands::Stats {
            format,
            samples,
            interval_ms,
            url,
        } => {
            let fmt = cli::OutputFormat::from_str_opt(Some(&format));
            cli::run_stats(fmt, samples, interval_ms, url)
        }
        Commands::Health => cli::run_health(),
        Commands::Config { action } => match action {
            ConfigAction::Show => cli::run_config_show(),
            ConfigAction::Init { force } => cli::run_config_init(force),
            ConfigAction::Set { key, value } => cli::run_config_set(&key, &value),
            ConfigAction::Reset => cli::run_config_reset(),
        },
    }
}
