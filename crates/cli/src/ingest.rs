//! `coinmerge ingest` / `coinmerge validate`: config-driven feed ingestion.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::error;

use coinmerge_io::{load_csv_file, SqliteStore};
use coinmerge_recon::evidence::summary_line;
use coinmerge_recon::{IngestConfig, RawRecord, ReconError, ReconciliationResult, Reconciler, SourceKind};

use crate::exit_codes::{
    EXIT_INGEST_INVALID_CONFIG, EXIT_INGEST_IO, EXIT_INGEST_NO_FEEDS, EXIT_INGEST_STORAGE,
};
use crate::{init_logging, CliError};

/// What happened to one feed before reconciliation.
#[derive(Debug, Serialize)]
struct FeedReport {
    feed: String,
    source: SourceKind,
    file: String,
    records: usize,
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct IngestReport {
    config_name: String,
    store: String,
    engine_version: String,
    feeds: Vec<FeedReport>,
    result: ReconciliationResult,
}

fn read_config(config_path: &Path) -> Result<IngestConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        CliError::new(EXIT_INGEST_IO, format!("cannot read config {}: {e}", config_path.display()))
    })?;
    IngestConfig::from_toml(&config_str)
        .map_err(|e| CliError::new(EXIT_INGEST_INVALID_CONFIG, e.to_string()))
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = read_config(&config_path)?;
    eprintln!(
        "config '{}' is valid: {} feed(s), {} alias(es)",
        config.name,
        config.feeds.len(),
        config.normalizer.aliases.len()
    );
    Ok(())
}

pub fn cmd_ingest(
    config_path: PathBuf,
    feed_names: Vec<String>,
    json_output: bool,
    output_file: Option<PathBuf>,
    db: Option<PathBuf>,
    log_level: Option<String>,
) -> Result<(), CliError> {
    let config = read_config(&config_path)?;
    init_logging(log_level.as_deref().or(config.log_level.as_deref()));

    let selected = config.select_feeds(&feed_names).map_err(|e| match e {
        ReconError::UnknownFeed(_) => CliError::usage(e.to_string()).with_hint(format!(
            "available feeds: {}",
            config.feeds.keys().cloned().collect::<Vec<_>>().join(", ")
        )),
        other => CliError::general(other.to_string()),
    })?;

    // Resolve file paths relative to config file's directory
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let now = chrono::Utc::now();

    // One feed failing must not block the others
    let mut batch: Vec<RawRecord> = Vec::new();
    let mut feeds = Vec::new();
    for (feed_name, feed) in selected {
        let path = base_dir.join(&feed.file);
        let mut report = FeedReport {
            feed: feed_name.clone(),
            source: feed.source.clone(),
            file: path.display().to_string(),
            records: 0,
            warnings: Vec::new(),
            error: None,
        };
        match load_csv_file(feed_name, &feed.source, &path, &feed.columns, feed.limit, now) {
            Ok(load) => {
                report.records = load.records.len();
                report.warnings = load
                    .warnings
                    .iter()
                    .map(|w| format!("line {}: {}", w.line, w.message))
                    .collect();
                batch.extend(load.records);
            }
            Err(e) => {
                error!(feed = %feed_name, "feed failed to load: {e}");
                report.error = Some(e.to_string());
            }
        }
        feeds.push(report);
    }

    if feeds.iter().all(|f| f.error.is_some()) {
        return Err(CliError::new(EXIT_INGEST_NO_FEEDS, "no feed could be loaded")
            .with_hint("check the feed file paths; they are relative to the config file"));
    }

    let db_path = db.unwrap_or_else(|| base_dir.join(&config.store.path));
    let store = SqliteStore::open(&db_path)
        .map_err(|e| CliError::new(EXIT_INGEST_STORAGE, e.to_string()))?;
    let reconciler = Reconciler::new(&store, config.normalizer.build());
    let result = reconciler
        .reconcile(&batch)
        .map_err(|e| CliError::new(EXIT_INGEST_STORAGE, e.to_string())
            .with_hint("no partial-commit guarantee; re-run the whole ingestion"))?;

    let report = IngestReport {
        config_name: config.name.clone(),
        store: db_path.display().to_string(),
        engine_version: format!("{} ({})", env!("CARGO_PKG_VERSION"), env!("COINMERGE_BUILD_COMMIT")),
        feeds,
        result,
    };

    let json_str = serde_json::to_string_pretty(&report)
        .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = output_file {
        std::fs::write(path, &json_str)
            .map_err(|e| CliError::new(EXIT_INGEST_IO, format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    } else {
        print_human(&report);
    }

    Ok(())
}

fn print_human(report: &IngestReport) {
    println!("ingest '{}' -> {}", report.config_name, report.store);
    for feed in &report.feeds {
        match &feed.error {
            Some(err) => println!("  feed {} ({}): FAILED {err}", feed.feed, feed.source),
            None => println!(
                "  feed {} ({}): {} records, {} warnings",
                feed.feed,
                feed.source,
                feed.records,
                feed.warnings.len()
            ),
        }
    }

    let result = &report.result;
    println!("{}", summary_line(&result.summary));
    for c in &result.mapping_conflicts {
        println!(
            "  conflict: {}:{} kept '{}' (attempted '{}')",
            c.source, c.source_id, c.kept_canonical_id, c.attempted_canonical_id
        );
    }
    for invalid in &result.invalid_records {
        println!(
            "  invalid: #{} {}:{} {}",
            invalid.input.position, invalid.input.source, invalid.input.source_id, invalid.reason
        );
    }
}
