// coinmerge CLI - ingest market feeds into one deduplicated asset store

mod exit_codes;
mod ingest;
mod store_ops;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use exit_codes::{EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "coinmerge")]
#[command(about = "Reconcile crypto market feeds into one record per asset")]
#[command(version)]
struct Cli {
    /// Log level filter (overrides the config's log_level; RUST_LOG wins over both)
    #[arg(long, global = true, env = "COINMERGE_LOG")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load every feed in a config and reconcile them as one batch
    #[command(after_help = "\
Examples:
  coinmerge ingest ingest.toml
  coinmerge ingest ingest.toml --feed gecko --feed manual
  coinmerge ingest ingest.toml --json
  coinmerge ingest ingest.toml --db /var/lib/coinmerge/coins.db --output run.json")]
    Ingest {
        /// Path to the ingest .toml config
        config: PathBuf,

        /// Only ingest the named feed (repeatable)
        #[arg(long = "feed", value_name = "NAME")]
        feeds: Vec<String>,

        /// Output JSON to stdout instead of human summary
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Store path (overrides [store].path)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Validate an ingest config without running
    Validate {
        /// Path to the ingest .toml config
        config: PathBuf,
    },

    /// List canonical assets in a store
    Assets {
        /// Path to the SQLite store
        db: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// List source-to-canonical mappings in a store
    Mappings {
        /// Path to the SQLite store
        db: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Delete every asset and mapping in a store
    Clear {
        /// Path to the SQLite store
        db: PathBuf,

        /// Confirm the bulk delete
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let log_level = cli.log_level;

    let result = match cli.command {
        Commands::Ingest { config, feeds, json, output, db } => {
            ingest::cmd_ingest(config, feeds, json, output, db, log_level)
        }
        Commands::Validate { config } => {
            init_logging(log_level.as_deref());
            ingest::cmd_validate(config)
        }
        Commands::Assets { db, json } => {
            init_logging(log_level.as_deref());
            store_ops::cmd_assets(db, json)
        }
        Commands::Mappings { db, json } => {
            init_logging(log_level.as_deref());
            store_ops::cmd_mappings(db, json)
        }
        Commands::Clear { db, yes } => {
            init_logging(log_level.as_deref());
            store_ops::cmd_clear(db, yes)
        }
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

/// Install the stderr subscriber. `RUST_LOG` wins, then `level`, then `info`.
pub(crate) fn init_logging(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or("info")));
    // A second init (tests, nested calls) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
