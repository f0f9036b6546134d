//! `coinmerge-recon`: canonical identity normalization and source-priority
//! reconciliation for crypto market records.
//!
//! Pure engine crate: receives already-parsed records, writes through the
//! [`Store`] trait, returns a [`ReconciliationResult`]. No file or database IO.

pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod model;
pub mod normalize;
pub mod source;
pub mod store;

pub use config::IngestConfig;
pub use engine::Reconciler;
pub use error::{ReconError, StoreError};
pub use model::{CanonicalAsset, MarketFields, RawRecord, ReconciliationResult, SourceMapping};
pub use normalize::Normalizer;
pub use source::{SourceKind, SourcePriority};
pub use store::{MemoryStore, Store};
