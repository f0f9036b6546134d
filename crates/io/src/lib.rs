// Feed readers and storage backends for the reconciliation engine

pub mod error;
pub mod feed;
pub mod sqlite;

pub use error::IoError;
pub use feed::{load_csv_file, load_csv_records, CsvLoad, RowWarning, MAX_FEED_BYTES};
pub use sqlite::SqliteStore;

/// SQLite schema version, stored in `PRAGMA user_version`.
/// Increment when the schema changes in a way old versions can't read.
pub const STORE_SCHEMA_VERSION: i32 = 1;
