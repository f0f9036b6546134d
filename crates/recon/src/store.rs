use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::error::StoreError;
use crate::model::{CanonicalAsset, SourceMapping};
use crate::source::SourceKind;

/// Durable owner of canonical assets and source mappings.
///
/// Each call must be atomic on its own. The engine holds no locks across
/// calls, so concurrent ingestion relies on `upsert` and `insert_if_absent`
/// being guarded by the backend's uniqueness rules.
pub trait Store {
    fn find_mapping(&self, source: &SourceKind, source_id: &str) -> Result<Option<String>, StoreError>;

    /// Insert unless `(source, source_id)` already exists. Returns whether a
    /// row was written.
    fn insert_if_absent(&self, mapping: &SourceMapping) -> Result<bool, StoreError>;

    fn find_asset(&self, canonical_id: &str) -> Result<Option<CanonicalAsset>, StoreError>;

    /// Insert or replace by `canonical_id`. `created_at` of an existing row is
    /// preserved.
    fn upsert(&self, asset: &CanonicalAsset) -> Result<(), StoreError>;

    /// All assets ordered by canonical id.
    fn assets(&self) -> Result<Vec<CanonicalAsset>, StoreError>;

    /// All mappings ordered by `(source name, source_id)`.
    fn mappings(&self) -> Result<Vec<SourceMapping>, StoreError>;

    /// Bulk clear of both tables.
    fn clear(&self) -> Result<(), StoreError>;
}

impl<S: Store + ?Sized> Store for &S {
    fn find_mapping(&self, source: &SourceKind, source_id: &str) -> Result<Option<String>, StoreError> {
        (**self).find_mapping(source, source_id)
    }
    fn insert_if_absent(&self, mapping: &SourceMapping) -> Result<bool, StoreError> {
        (**self).insert_if_absent(mapping)
    }
    fn find_asset(&self, canonical_id: &str) -> Result<Option<CanonicalAsset>, StoreError> {
        (**self).find_asset(canonical_id)
    }
    fn upsert(&self, asset: &CanonicalAsset) -> Result<(), StoreError> {
        (**self).upsert(asset)
    }
    fn assets(&self) -> Result<Vec<CanonicalAsset>, StoreError> {
        (**self).assets()
    }
    fn mappings(&self) -> Result<Vec<SourceMapping>, StoreError> {
        (**self).mappings()
    }
    fn clear(&self) -> Result<(), StoreError> {
        (**self).clear()
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Tables {
    assets: BTreeMap<String, CanonicalAsset>,
    /// Keyed by `(source name, source_id)` so iteration order matches SQL `ORDER BY`.
    mappings: BTreeMap<(String, String), SourceMapping>,
}

/// Process-local store for tests and single-run deployments.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asset_count(&self) -> usize {
        self.tables.lock().assets.len()
    }

    pub fn mapping_count(&self) -> usize {
        self.tables.lock().mappings.len()
    }
}

impl Store for MemoryStore {
    fn find_mapping(&self, source: &SourceKind, source_id: &str) -> Result<Option<String>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .mappings
            .get(&(source.to_string(), source_id.to_string()))
            .map(|m| m.canonical_id.clone()))
    }

    fn insert_if_absent(&self, mapping: &SourceMapping) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock();
        if !tables.assets.contains_key(&mapping.canonical_id) {
            return Err(StoreError::Backend(format!(
                "mapping {}:{} references missing asset '{}'",
                mapping.source, mapping.source_id, mapping.canonical_id
            )));
        }
        let key = (mapping.source.to_string(), mapping.source_id.clone());
        if tables.mappings.contains_key(&key) {
            return Ok(false);
        }
        tables.mappings.insert(key, mapping.clone());
        Ok(true)
    }

    fn find_asset(&self, canonical_id: &str) -> Result<Option<CanonicalAsset>, StoreError> {
        Ok(self.tables.lock().assets.get(canonical_id).cloned())
    }

    fn upsert(&self, asset: &CanonicalAsset) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        let mut row = asset.clone();
        if let Some(existing) = tables.assets.get(&asset.canonical_id) {
            row.created_at = existing.created_at;
        }
        tables.assets.insert(row.canonical_id.clone(), row);
        Ok(())
    }

    fn assets(&self) -> Result<Vec<CanonicalAsset>, StoreError> {
        Ok(self.tables.lock().assets.values().cloned().collect())
    }

    fn mappings(&self) -> Result<Vec<SourceMapping>, StoreError> {
        Ok(self.tables.lock().mappings.values().cloned().collect())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        tables.mappings.clear();
        tables.assets.clear();
        Ok(())
    }
}
