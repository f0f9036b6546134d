//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 3-9     | ingest           | Config, feed and storage failures        |
//!
//! Invalid records and mapping conflicts are reported in the output and do
//! not change the exit code.

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unknown feed, missing confirmation.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Ingest (3-9)
// =============================================================================

/// Config file could not be parsed or failed validation.
pub const EXIT_INGEST_INVALID_CONFIG: u8 = 3;

/// Config or output file could not be read or written.
pub const EXIT_INGEST_IO: u8 = 4;

/// Every selected feed failed to load; nothing was reconciled.
pub const EXIT_INGEST_NO_FEEDS: u8 = 5;

/// The store could not be opened or a write failed mid-batch.
/// No partial-commit guarantee: re-run the whole ingestion.
pub const EXIT_INGEST_STORAGE: u8 = 6;
