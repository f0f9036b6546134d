use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::source::SourceKind;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Market values reported for one asset. Every field is optional: sources
/// routinely omit some of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketFields {
    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub total_volume: Option<f64>,
    pub price_change_24h: Option<f64>,
    pub price_change_percentage_24h: Option<f64>,
}

/// One observation from one source. Lives only for the duration of a
/// reconciliation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub source: SourceKind,
    pub source_id: String,
    pub symbol: String,
    pub name: String,
    #[serde(flatten)]
    pub market: MarketFields,
    pub observed_at: DateTime<Utc>,
}

impl RawRecord {
    pub fn new(
        source: SourceKind,
        source_id: impl Into<String>,
        symbol: impl Into<String>,
        name: impl Into<String>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source,
            source_id: source_id.into(),
            symbol: symbol.into(),
            name: name.into(),
            market: MarketFields::default(),
            observed_at,
        }
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.market.current_price = Some(price);
        self
    }

    pub fn with_market(mut self, market: MarketFields) -> Self {
        self.market = market;
        self
    }
}

// ---------------------------------------------------------------------------
// Durable entities
// ---------------------------------------------------------------------------

/// The deduplicated row for one real-world asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalAsset {
    pub canonical_id: String,
    pub symbol: String,
    pub name: String,
    #[serde(flatten)]
    pub market: MarketFields,
    /// Source whose values are currently stored.
    pub source: SourceKind,
    pub last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Provenance binding `(source, source_id) -> canonical_id`. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMapping {
    pub source: SourceKind,
    pub source_id: String,
    pub canonical_id: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// An attempt to rebind an existing mapping. The existing binding is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingConflict {
    pub source: SourceKind,
    pub source_id: String,
    pub attempted_canonical_id: String,
    pub kept_canonical_id: String,
}

/// Echo of a rejected record, enough to find it again in the source data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordRef {
    /// Zero-based position in the batch.
    pub position: usize,
    pub source: SourceKind,
    pub source_id: String,
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidRecord {
    pub input: RecordRef,
    pub reason: String,
}

/// A record whose values were ignored because a higher-priority source
/// already holds the canonical row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outranked {
    pub canonical_id: String,
    pub source: SourceKind,
    pub held_by: SourceKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconSummary {
    pub records_seen: usize,
    pub valid_records: usize,
    pub assets_created: usize,
    pub assets_updated: usize,
    pub assets_unchanged: usize,
    pub mappings_created: usize,
    pub conflicts: usize,
    pub invalid: usize,
    pub outranked: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationResult {
    pub upserted_canonical_ids: BTreeSet<String>,
    pub mapping_conflicts: Vec<MappingConflict>,
    pub invalid_records: Vec<InvalidRecord>,
    pub outranked: Vec<Outranked>,
    pub summary: ReconSummary,
    pub run_at: DateTime<Utc>,
}
