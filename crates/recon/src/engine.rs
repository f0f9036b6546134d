use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::ReconError;
use crate::evidence::{compute_summary, summary_line, WriteTally};
use crate::model::{
    CanonicalAsset, InvalidRecord, MappingConflict, Outranked, RawRecord, RecordRef,
    ReconciliationResult, SourceMapping,
};
use crate::normalize::{source_key, Normalizer};
use crate::source::SourceKind;
use crate::store::Store;

type MappingKey = (SourceKind, String);

/// Records in one batch that resolved to the same canonical id.
#[derive(Default)]
struct Group {
    /// Batch position of the record whose values will be written.
    candidate: Option<usize>,
    /// Pairs first seen in this batch, to be inserted after the asset.
    new_mappings: Vec<MappingKey>,
}

impl Group {
    /// Higher priority replaces the candidate; equal priority replaces it
    /// too, so the later record in input order wins a tie.
    fn offer(&mut self, position: usize, batch: &[RawRecord]) {
        let replace = match self.candidate {
            None => true,
            Some(current) => batch[position].source.outranks_or_ties(&batch[current].source),
        };
        if replace {
            self.candidate = Some(position);
        }
    }
}

/// Reconciles batches of raw records into a [`Store`].
pub struct Reconciler<S> {
    store: S,
    normalizer: Normalizer,
}

impl<S: Store> Reconciler<S> {
    pub fn new(store: S, normalizer: Normalizer) -> Self {
        Self { store, normalizer }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Run reconciliation for one batch. Malformed records are reported in
    /// the result; only a storage failure aborts the batch.
    pub fn reconcile(&self, batch: &[RawRecord]) -> Result<ReconciliationResult, ReconError> {
        self.reconcile_at(batch, Utc::now())
    }

    /// As [`Reconciler::reconcile`], with an explicit write timestamp.
    pub fn reconcile_at(
        &self,
        batch: &[RawRecord],
        now: DateTime<Utc>,
    ) -> Result<ReconciliationResult, ReconError> {
        let mut invalid_records = Vec::new();
        let mut mapping_conflicts = Vec::new();
        let mut bindings: HashMap<MappingKey, String> = HashMap::new();
        let mut groups: BTreeMap<String, Group> = BTreeMap::new();

        for (position, record) in batch.iter().enumerate() {
            let computed = match self.normalizer.canonical_id(record) {
                Ok(id) => id,
                Err(err) => {
                    let reason = match err {
                        ReconError::InvalidRecord { reason } => reason,
                        other => other.to_string(),
                    };
                    warn!(
                        position,
                        source = %record.source,
                        source_id = %record.source_id,
                        %reason,
                        "skipping invalid record"
                    );
                    invalid_records.push(InvalidRecord {
                        input: record_ref(position, record),
                        reason,
                    });
                    continue;
                }
            };

            let key: MappingKey = (record.source.clone(), source_key(&record.source_id));
            let canonical_id = match bindings.get(&key) {
                Some(bound) => bound.clone(),
                None => {
                    let bound = match self.store.find_mapping(&key.0, &key.1)? {
                        Some(existing) => existing,
                        None => {
                            groups
                                .entry(computed.clone())
                                .or_default()
                                .new_mappings
                                .push(key.clone());
                            computed.clone()
                        }
                    };
                    bindings.insert(key.clone(), bound.clone());
                    bound
                }
            };

            if canonical_id != computed {
                warn!(
                    source = %record.source,
                    source_id = %record.source_id,
                    attempted = %computed,
                    kept = %canonical_id,
                    "mapping conflict: keeping existing binding"
                );
                mapping_conflicts.push(MappingConflict {
                    source: key.0.clone(),
                    source_id: key.1.clone(),
                    attempted_canonical_id: computed,
                    kept_canonical_id: canonical_id.clone(),
                });
            }

            debug!(
                source = %record.source,
                source_id = %record.source_id,
                canonical_id = %canonical_id,
                "normalized record"
            );
            groups.entry(canonical_id).or_default().offer(position, batch);
        }

        let mut upserted_canonical_ids = BTreeSet::new();
        let mut outranked = Vec::new();
        let mut writes = WriteTally::default();

        for (canonical_id, group) in groups {
            if let Some(position) = group.candidate {
                let winner = &batch[position];
                match self.store.find_asset(&canonical_id)? {
                    None => {
                        self.store.upsert(&new_asset(&canonical_id, winner, now))?;
                        writes.assets_created += 1;
                        upserted_canonical_ids.insert(canonical_id.clone());
                    }
                    Some(existing) if holds_same_values(&existing, winner) => {
                        debug!(canonical_id = %canonical_id, "stored values already current");
                        writes.assets_unchanged += 1;
                    }
                    Some(existing) if winner.source.outranks_or_ties(&existing.source) => {
                        self.store.upsert(&overwrite(existing, winner, now))?;
                        writes.assets_updated += 1;
                        upserted_canonical_ids.insert(canonical_id.clone());
                    }
                    Some(existing) => {
                        debug!(
                            canonical_id = %canonical_id,
                            source = %winner.source,
                            held_by = %existing.source,
                            "outranked by stored source"
                        );
                        outranked.push(Outranked {
                            canonical_id: canonical_id.clone(),
                            source: winner.source.clone(),
                            held_by: existing.source,
                        });
                    }
                }
            }

            for (source, source_id) in group.new_mappings {
                let mapping = SourceMapping {
                    source,
                    source_id,
                    canonical_id: canonical_id.clone(),
                    created_at: now,
                };
                if self.store.insert_if_absent(&mapping)? {
                    writes.mappings_created += 1;
                }
            }
        }

        let summary = compute_summary(
            batch.len(),
            writes,
            &invalid_records,
            &mapping_conflicts,
            &outranked,
        );
        info!("reconciled batch: {}", summary_line(&summary));

        Ok(ReconciliationResult {
            upserted_canonical_ids,
            mapping_conflicts,
            invalid_records,
            outranked,
            summary,
            run_at: now,
        })
    }
}

fn record_ref(position: usize, record: &RawRecord) -> RecordRef {
    RecordRef {
        position,
        source: record.source.clone(),
        source_id: record.source_id.clone(),
        symbol: record.symbol.clone(),
    }
}

fn new_asset(canonical_id: &str, record: &RawRecord, now: DateTime<Utc>) -> CanonicalAsset {
    CanonicalAsset {
        canonical_id: canonical_id.to_string(),
        symbol: canonical_id.to_ascii_uppercase(),
        name: record.name.trim().to_string(),
        market: record.market.clone(),
        source: record.source.clone(),
        last_updated: record.observed_at,
        created_at: now,
        updated_at: now,
    }
}

/// True when writing `record` would change nothing but `updated_at`.
fn holds_same_values(asset: &CanonicalAsset, record: &RawRecord) -> bool {
    asset.source == record.source
        && asset.last_updated == record.observed_at
        && asset.name == record.name.trim()
        && asset.market == record.market
}

/// Replace values with the winner's. Identity and `created_at` stay.
fn overwrite(mut asset: CanonicalAsset, record: &RawRecord, now: DateTime<Utc>) -> CanonicalAsset {
    asset.name = record.name.trim().to_string();
    asset.market = record.market.clone();
    asset.source = record.source.clone();
    asset.last_updated = record.observed_at;
    asset.updated_at = now;
    asset
}
