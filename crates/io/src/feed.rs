// CSV feed import: flat files exported from market APIs or maintained by hand

use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::{info, warn};

use coinmerge_recon::config::ColumnMapping;
use coinmerge_recon::model::{MarketFields, RawRecord};
use coinmerge_recon::SourceKind;

use crate::error::IoError;

/// Percentage moves beyond this are kept but flagged.
const SUSPICIOUS_CHANGE_PCT: f64 = 1000.0;

/// Feed files above this size are refused before reading.
pub const MAX_FEED_BYTES: u64 = 100 * 1024 * 1024;

/// A cell that was dropped or a value that looks wrong. The row itself is
/// still loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowWarning {
    /// 1-based line in the file, header included.
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct CsvLoad {
    pub records: Vec<RawRecord>,
    pub warnings: Vec<RowWarning>,
}

/// Read a feed file (UTF-8, falling back to Windows-1252) and parse it.
pub fn load_csv_file(
    feed: &str,
    source: &SourceKind,
    path: &Path,
    columns: &ColumnMapping,
    limit: Option<usize>,
    now: DateTime<Utc>,
) -> Result<CsvLoad, IoError> {
    let content = read_file_as_utf8(path)?;
    let load = load_csv_records(feed, source, &content, columns, limit, now)?;
    info!(
        feed,
        path = %path.display(),
        records = load.records.len(),
        warnings = load.warnings.len(),
        "loaded feed"
    );
    Ok(load)
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1, etc.)
/// Files over [`MAX_FEED_BYTES`] are refused.
pub fn read_file_as_utf8(path: &Path) -> Result<String, IoError> {
    read_capped(path, MAX_FEED_BYTES)
}

fn read_capped(path: &Path, max_bytes: u64) -> Result<String, IoError> {
    let mut file = std::fs::File::open(path)
        .map_err(|e| IoError::Io(format!("cannot open {}: {e}", path.display())))?;
    let size = file
        .metadata()
        .map_err(|e| IoError::Io(format!("cannot stat {}: {e}", path.display())))?
        .len();
    if size > max_bytes {
        return Err(IoError::TooLarge {
            path: path.display().to_string(),
            size,
            limit: max_bytes,
        });
    }
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| IoError::Io(format!("cannot read {}: {e}", path.display())))?;

    // Try UTF-8 first; on failure, recover the buffer from the error
    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            warn!(path = %path.display(), "feed is not UTF-8, decoding as Windows-1252");
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

/// Parse CSV text into raw records for `source`.
///
/// Structural problems (bad header, missing `symbol`/`name` column) fail the
/// whole feed. Cell-level problems become warnings. Blank symbols are passed
/// through so the engine can report them.
pub fn load_csv_records(
    feed: &str,
    source: &SourceKind,
    csv_data: &str,
    columns: &ColumnMapping,
    limit: Option<usize>,
    now: DateTime<Utc>,
) -> Result<CsvLoad, IoError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let find = |name: &str| headers.iter().position(|h| h == name);
    let require = |name: &str| {
        find(name).ok_or_else(|| IoError::MissingColumn {
            feed: feed.into(),
            column: name.into(),
        })
    };

    let symbol_idx = require(&columns.symbol)?;
    let name_idx = require(&columns.name)?;
    let source_id_idx = find(&columns.source_id);
    let observed_idx = find(&columns.observed_at);
    let numeric = [
        (find(&columns.current_price), &columns.current_price, false),
        (find(&columns.market_cap), &columns.market_cap, false),
        (find(&columns.total_volume), &columns.total_volume, false),
        (find(&columns.price_change_24h), &columns.price_change_24h, true),
        (
            find(&columns.price_change_percentage_24h),
            &columns.price_change_percentage_24h,
            true,
        ),
    ];

    let mut load = CsvLoad::default();

    for (row_idx, result) in reader.records().enumerate() {
        if limit.is_some_and(|max| row_idx >= max) {
            break;
        }
        let record = result?;
        let line = row_idx + 2;
        let cell = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("");

        let symbol = cell(Some(symbol_idx)).to_string();
        let name = cell(Some(name_idx)).to_string();
        let source_id = match cell(source_id_idx) {
            "" => symbol.to_lowercase(),
            id => id.to_lowercase(),
        };

        let mut values = [None; 5];
        for (slot, (idx, column, allow_negative)) in values.iter_mut().zip(&numeric) {
            match parse_number(cell(*idx), *allow_negative) {
                Ok(v) => *slot = v,
                Err(msg) => {
                    warn!(feed, line, column = %column, "{msg}");
                    load.warnings.push(RowWarning {
                        line,
                        message: format!("{column}: {msg}"),
                    });
                }
            }
        }
        let [current_price, market_cap, total_volume, price_change_24h, price_change_percentage_24h] =
            values;

        if let Some(pct) = price_change_percentage_24h {
            if pct.abs() > SUSPICIOUS_CHANGE_PCT {
                warn!(feed, line, pct, "suspicious 24h price change");
                load.warnings.push(RowWarning {
                    line,
                    message: format!("suspicious 24h change {pct}%"),
                });
            }
        }

        let observed_at = parse_timestamp(cell(observed_idx)).unwrap_or(now);

        load.records.push(RawRecord {
            source: source.clone(),
            source_id,
            symbol,
            name,
            market: MarketFields {
                current_price,
                market_cap,
                total_volume,
                price_change_24h,
                price_change_percentage_24h,
            },
            observed_at,
        });
    }

    Ok(load)
}

/// Parse a numeric cell. `Ok(None)` for blanks and null markers.
fn parse_number(raw: &str, allow_negative: bool) -> Result<Option<f64>, String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    if cleaned.is_empty()
        || ["null", "nan", "none", "n/a"]
            .iter()
            .any(|marker| cleaned.eq_ignore_ascii_case(marker))
    {
        return Ok(None);
    }

    let value: f64 = cleaned
        .parse()
        .map_err(|_| format!("'{raw}' is not a number"))?;
    if !value.is_finite() {
        return Err(format!("'{raw}' is not a finite number"));
    }
    if !allow_negative && value < 0.0 {
        return Err(format!("{value} is negative"));
    }
    Ok(Some(value))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    // Day-first is tried before month-first, so "03/04/2026" is 3 April.
    ["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
