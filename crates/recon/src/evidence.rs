use crate::model::{InvalidRecord, MappingConflict, Outranked, ReconSummary};

/// Write counters collected while persisting a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteTally {
    pub assets_created: usize,
    pub assets_updated: usize,
    /// Won priority but matched the stored row exactly; not rewritten.
    pub assets_unchanged: usize,
    pub mappings_created: usize,
}

/// Compute summary statistics for one reconciliation run.
pub fn compute_summary(
    records_seen: usize,
    writes: WriteTally,
    invalid: &[InvalidRecord],
    conflicts: &[MappingConflict],
    outranked: &[Outranked],
) -> ReconSummary {
    ReconSummary {
        records_seen,
        valid_records: records_seen - invalid.len(),
        assets_created: writes.assets_created,
        assets_updated: writes.assets_updated,
        assets_unchanged: writes.assets_unchanged,
        mappings_created: writes.mappings_created,
        conflicts: conflicts.len(),
        invalid: invalid.len(),
        outranked: outranked.len(),
    }
}

/// One-line human rendering, shared by the batch log event and the CLI.
pub fn summary_line(summary: &ReconSummary) -> String {
    format!(
        "{} records ({} valid, {} invalid): {} created, {} updated, {} unchanged, {} outranked, {} new mappings, {} conflicts",
        summary.records_seen,
        summary.valid_records,
        summary.invalid,
        summary.assets_created,
        summary.assets_updated,
        summary.assets_unchanged,
        summary.outranked,
        summary.mappings_created,
        summary.conflicts,
    )
}
