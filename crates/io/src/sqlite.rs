// SQLite-backed store for canonical assets and source mappings

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use coinmerge_recon::model::{CanonicalAsset, MarketFields, SourceMapping};
use coinmerge_recon::{SourceKind, Store, StoreError};

use crate::error::IoError;
use crate::STORE_SCHEMA_VERSION;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS assets (
    canonical_id TEXT PRIMARY KEY,
    symbol TEXT NOT NULL,
    name TEXT NOT NULL,
    current_price REAL,
    market_cap REAL,
    total_volume REAL,
    price_change_24h REAL,
    price_change_percentage_24h REAL,
    source TEXT NOT NULL,          -- source whose values are stored
    last_updated TEXT NOT NULL,    -- RFC 3339
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_assets_symbol ON assets (symbol);
CREATE INDEX IF NOT EXISTS idx_assets_market_cap ON assets (market_cap);

CREATE TABLE IF NOT EXISTS source_mappings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    source_id TEXT NOT NULL,
    canonical_id TEXT NOT NULL REFERENCES assets (canonical_id),
    created_at TEXT NOT NULL,
    UNIQUE (source, source_id)
);

CREATE INDEX IF NOT EXISTS idx_mappings_canonical ON source_mappings (canonical_id);
"#;

const ASSET_COLUMNS: &str = "canonical_id, symbol, name, current_price, market_cap, total_volume, \
     price_change_24h, price_change_percentage_24h, source, last_updated, created_at, updated_at";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, IoError> {
        let conn = Connection::open(path).map_err(backend)?;
        debug!(path = %path.display(), "opened store");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, IoError> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, IoError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;").map_err(backend)?;

        let version: i32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(backend)?;
        if version > STORE_SCHEMA_VERSION {
            return Err(IoError::Store(StoreError::Backend(format!(
                "store schema version {version} is newer than supported version {STORE_SCHEMA_VERSION}"
            ))));
        }

        conn.execute_batch(SCHEMA).map_err(backend)?;
        conn.execute_batch(&format!("PRAGMA user_version = {STORE_SCHEMA_VERSION};"))
            .map_err(backend)?;
        Ok(Self { conn })
    }
}

impl Store for SqliteStore {
    fn find_mapping(&self, source: &SourceKind, source_id: &str) -> Result<Option<String>, StoreError> {
        self.conn
            .query_row(
                "SELECT canonical_id FROM source_mappings WHERE source = ?1 AND source_id = ?2",
                params![source.as_str(), source_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(backend)
    }

    fn insert_if_absent(&self, mapping: &SourceMapping) -> Result<bool, StoreError> {
        let changed = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO source_mappings (source, source_id, canonical_id, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    mapping.source.as_str(),
                    mapping.source_id,
                    mapping.canonical_id,
                    mapping.created_at.to_rfc3339(),
                ],
            )
            .map_err(backend)?;
        Ok(changed == 1)
    }

    fn find_asset(&self, canonical_id: &str) -> Result<Option<CanonicalAsset>, StoreError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {ASSET_COLUMNS} FROM assets WHERE canonical_id = ?1"),
                params![canonical_id],
                AssetRow::from_row,
            )
            .optional()
            .map_err(backend)?;
        row.map(AssetRow::into_asset).transpose()
    }

    fn upsert(&self, asset: &CanonicalAsset) -> Result<(), StoreError> {
        let m = &asset.market;
        self.conn
            .execute(
                &format!(
                    "INSERT INTO assets ({ASSET_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                     ON CONFLICT (canonical_id) DO UPDATE SET
                         symbol = excluded.symbol,
                         name = excluded.name,
                         current_price = excluded.current_price,
                         market_cap = excluded.market_cap,
                         total_volume = excluded.total_volume,
                         price_change_24h = excluded.price_change_24h,
                         price_change_percentage_24h = excluded.price_change_percentage_24h,
                         source = excluded.source,
                         last_updated = excluded.last_updated,
                         updated_at = excluded.updated_at"
                ),
                params![
                    asset.canonical_id,
                    asset.symbol,
                    asset.name,
                    m.current_price,
                    m.market_cap,
                    m.total_volume,
                    m.price_change_24h,
                    m.price_change_percentage_24h,
                    asset.source.as_str(),
                    asset.last_updated.to_rfc3339(),
                    asset.created_at.to_rfc3339(),
                    asset.updated_at.to_rfc3339(),
                ],
            )
            .map_err(backend)?;
        Ok(())
    }

    fn assets(&self) -> Result<Vec<CanonicalAsset>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {ASSET_COLUMNS} FROM assets ORDER BY canonical_id"))
            .map_err(backend)?;
        let rows = stmt.query_map([], AssetRow::from_row).map_err(backend)?;

        let mut assets = Vec::new();
        for row in rows {
            assets.push(row.map_err(backend)?.into_asset()?);
        }
        Ok(assets)
    }

    fn mappings(&self) -> Result<Vec<SourceMapping>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT source, source_id, canonical_id, created_at FROM source_mappings
                 ORDER BY source, source_id",
            )
            .map_err(backend)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(backend)?;

        let mut mappings = Vec::new();
        for row in rows {
            let (source, source_id, canonical_id, created_at) = row.map_err(backend)?;
            mappings.push(SourceMapping {
                source: SourceKind::from(source),
                source_id,
                canonical_id,
                created_at: parse_ts("source_mappings", &created_at)?,
            });
        }
        Ok(mappings)
    }

    fn clear(&self) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction().map_err(backend)?;
        tx.execute("DELETE FROM source_mappings", []).map_err(backend)?;
        tx.execute("DELETE FROM assets", []).map_err(backend)?;
        tx.commit().map_err(backend)
    }
}

/// Column values as stored, before timestamp decoding.
struct AssetRow {
    canonical_id: String,
    symbol: String,
    name: String,
    market: MarketFields,
    source: String,
    last_updated: String,
    created_at: String,
    updated_at: String,
}

impl AssetRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            canonical_id: row.get(0)?,
            symbol: row.get(1)?,
            name: row.get(2)?,
            market: MarketFields {
                current_price: row.get(3)?,
                market_cap: row.get(4)?,
                total_volume: row.get(5)?,
                price_change_24h: row.get(6)?,
                price_change_percentage_24h: row.get(7)?,
            },
            source: row.get(8)?,
            last_updated: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    fn into_asset(self) -> Result<CanonicalAsset, StoreError> {
        Ok(CanonicalAsset {
            canonical_id: self.canonical_id,
            symbol: self.symbol,
            name: self.name,
            market: self.market,
            source: SourceKind::from(self.source),
            last_updated: parse_ts("assets", &self.last_updated)?,
            created_at: parse_ts("assets", &self.created_at)?,
            updated_at: parse_ts("assets", &self.updated_at)?,
        })
    }
}

fn parse_ts(table: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            table: table.into(),
            detail: format!("bad timestamp '{raw}': {e}"),
        })
}

fn backend(err: rusqlite::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}
