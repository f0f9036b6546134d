//! Store inspection and bulk clear.

use std::path::{Path, PathBuf};

use coinmerge_io::SqliteStore;
use coinmerge_recon::Store;

use crate::exit_codes::EXIT_INGEST_STORAGE;
use crate::CliError;

fn open_existing(db: &Path) -> Result<SqliteStore, CliError> {
    // Opening creates the file; refuse so a typo doesn't leave an empty db behind
    if !db.exists() {
        return Err(CliError::usage(format!("store not found: {}", db.display()))
            .with_hint("run `coinmerge ingest` first or pass the right --db path"));
    }
    SqliteStore::open(db).map_err(|e| CliError::new(EXIT_INGEST_STORAGE, e.to_string()))
}

fn storage_err(e: impl std::fmt::Display) -> CliError {
    CliError::new(EXIT_INGEST_STORAGE, e.to_string())
}

fn fmt_num(v: Option<f64>) -> String {
    v.map(|n| n.to_string()).unwrap_or_else(|| "-".into())
}

pub fn cmd_assets(db: PathBuf, json: bool) -> Result<(), CliError> {
    let store = open_existing(&db)?;
    let assets = store.assets().map_err(storage_err)?;

    if json {
        let out = serde_json::to_string_pretty(&assets)
            .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
        println!("{out}");
        return Ok(());
    }

    println!(
        "{:<16} {:<10} {:>18} {:>20} {:<12} {}",
        "canonical_id", "symbol", "price", "market_cap", "source", "last_updated"
    );
    for a in &assets {
        println!(
            "{:<16} {:<10} {:>18} {:>20} {:<12} {}",
            a.canonical_id,
            a.symbol,
            fmt_num(a.market.current_price),
            fmt_num(a.market.market_cap),
            a.source,
            a.last_updated.to_rfc3339(),
        );
    }
    eprintln!("{} asset(s)", assets.len());
    Ok(())
}

pub fn cmd_mappings(db: PathBuf, json: bool) -> Result<(), CliError> {
    let store = open_existing(&db)?;
    let mappings = store.mappings().map_err(storage_err)?;

    if json {
        let out = serde_json::to_string_pretty(&mappings)
            .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
        println!("{out}");
        return Ok(());
    }

    for m in &mappings {
        println!("{}:{} -> {}", m.source, m.source_id, m.canonical_id);
    }
    eprintln!("{} mapping(s)", mappings.len());
    Ok(())
}

pub fn cmd_clear(db: PathBuf, yes: bool) -> Result<(), CliError> {
    if !yes {
        return Err(CliError::usage("refusing to clear without confirmation")
            .with_hint("pass --yes to delete every asset and mapping"));
    }
    let store = open_existing(&db)?;
    store.clear().map_err(storage_err)?;
    eprintln!("cleared {}", db.display());
    Ok(())
}
