use chrono::{DateTime, TimeZone, Utc};

use coinmerge_recon::model::{MarketFields, RawRecord};
use coinmerge_recon::{MemoryStore, Normalizer, Reconciler, SourceKind, Store};

fn ts(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 1, hour, 0, 0).unwrap()
}

fn record(source: SourceKind, source_id: &str, symbol: &str, price: f64) -> RawRecord {
    RawRecord::new(source, source_id, symbol, symbol.trim(), ts(8)).with_price(price)
}

fn fresh() -> Reconciler<MemoryStore> {
    Reconciler::new(MemoryStore::new(), Normalizer::new())
}

// -------------------------------------------------------------------------
// Priority law
// -------------------------------------------------------------------------

#[test]
fn coingecko_beats_csv_in_either_order() {
    let csv = record(SourceKind::Csv, "btc", "BTC", 100.0);
    let gecko = record(SourceKind::Coingecko, "bitcoin", "BTC", 200.0);

    for batch in [vec![csv.clone(), gecko.clone()], vec![gecko.clone(), csv.clone()]] {
        let r = fresh();
        let result = r.reconcile_at(&batch, ts(9)).unwrap();
        assert_eq!(result.upserted_canonical_ids.len(), 1);

        let btc = r.store().find_asset("btc").unwrap().unwrap();
        assert_eq!(btc.market.current_price, Some(200.0));
        assert_eq!(btc.source, SourceKind::Coingecko);
        assert_eq!(r.store().mapping_count(), 2);
    }
}

#[test]
fn higher_priority_overwrites_across_runs() {
    let r = fresh();
    r.reconcile_at(&[record(SourceKind::Csv, "btc", "BTC", 100.0)], ts(9)).unwrap();
    let result = r
        .reconcile_at(&[record(SourceKind::Coinpaprika, "btc-bitcoin", "BTC", 120.0)], ts(10))
        .unwrap();
    assert_eq!(result.summary.assets_updated, 1);
    let btc = r.store().find_asset("btc").unwrap().unwrap();
    assert_eq!(btc.market.current_price, Some(120.0));
}

#[test]
fn unknown_source_never_overwrites_ranked_source() {
    let r = fresh();
    r.reconcile_at(&[record(SourceKind::Csv, "sol", "SOL", 10.0)], ts(9)).unwrap();
    let result = r
        .reconcile_at(&[record(SourceKind::from("kraken"), "SOLUSD", "SOL", 11.0)], ts(10))
        .unwrap();
    assert_eq!(result.outranked.len(), 1);
    let sol = r.store().find_asset("sol").unwrap().unwrap();
    assert_eq!(sol.market.current_price, Some(10.0));
}

#[test]
fn equal_priority_latest_write_wins_across_runs() {
    let r = fresh();
    r.reconcile_at(&[record(SourceKind::Coingecko, "bitcoin", "BTC", 100.0)], ts(9)).unwrap();

    // Older observation, same tier: priority alone decides, so it still wins.
    let mut stale = record(SourceKind::Coingecko, "bitcoin", "BTC", 90.0);
    stale.observed_at = ts(1);
    r.reconcile_at(&[stale], ts(10)).unwrap();

    let btc = r.store().find_asset("btc").unwrap().unwrap();
    assert_eq!(btc.market.current_price, Some(90.0));
    assert_eq!(btc.last_updated, ts(1));
}

// -------------------------------------------------------------------------
// First-writer law
// -------------------------------------------------------------------------

#[test]
fn csv_creates_unseen_asset() {
    let r = fresh();
    let market = MarketFields {
        current_price: Some(1.25),
        market_cap: Some(5_000_000.0),
        total_volume: Some(42_000.0),
        price_change_24h: Some(-0.05),
        price_change_percentage_24h: Some(-3.8),
    };
    let xyz = RawRecord::new(SourceKind::Csv, "xyz", "XYZ", "Xyz Token", ts(8)).with_market(market.clone());
    let result = r.reconcile_at(&[xyz], ts(9)).unwrap();

    assert_eq!(result.summary.assets_created, 1);
    let asset = r.store().find_asset("xyz").unwrap().unwrap();
    assert_eq!(asset.market, market);
    assert_eq!(asset.name, "Xyz Token");
    assert_eq!(asset.source, SourceKind::Csv);
}

// -------------------------------------------------------------------------
// Mapping immutability
// -------------------------------------------------------------------------

#[test]
fn remap_attempt_keeps_original_binding() {
    let r = fresh();
    r.reconcile_at(&[record(SourceKind::Coingecko, "bitcoin", "BTC", 100.0)], ts(9)).unwrap();

    let result = r
        .reconcile_at(&[record(SourceKind::Coingecko, "bitcoin", "XBT", 101.0)], ts(10))
        .unwrap();

    assert_eq!(result.mapping_conflicts.len(), 1);
    let conflict = &result.mapping_conflicts[0];
    assert_eq!(conflict.source, SourceKind::Coingecko);
    assert_eq!(conflict.source_id, "bitcoin");
    assert_eq!(conflict.attempted_canonical_id, "xbt");
    assert_eq!(conflict.kept_canonical_id, "btc");

    assert_eq!(
        r.store().find_mapping(&SourceKind::Coingecko, "bitcoin").unwrap().as_deref(),
        Some("btc")
    );
    assert!(r.store().find_asset("xbt").unwrap().is_none());
    assert_eq!(r.store().mapping_count(), 1);
}

// -------------------------------------------------------------------------
// Idempotence
// -------------------------------------------------------------------------

#[test]
fn rerun_is_idempotent() {
    let r = fresh();
    let batch = vec![
        record(SourceKind::Coinpaprika, "eth-ethereum", "ETH", 3000.0),
        record(SourceKind::Coingecko, "ethereum", "eth", 3010.0),
        record(SourceKind::Csv, "ada", "ADA", 0.5),
    ];
    r.reconcile_at(&batch, ts(9)).unwrap();
    let assets_before = r.store().assets().unwrap();
    let mappings_before = r.store().mappings().unwrap();

    let second = r.reconcile_at(&batch, ts(10)).unwrap();
    assert_eq!(second.summary.mappings_created, 0);
    assert_eq!(second.summary.assets_created, 0);
    assert_eq!(second.summary.assets_updated, 0);
    assert_eq!(second.summary.assets_unchanged, 2);
    assert!(second.upserted_canonical_ids.is_empty());
    assert!(second.mapping_conflicts.is_empty());

    assert_eq!(r.store().mappings().unwrap(), mappings_before);
    // Nothing rewritten, so updated_at still carries the first run's time.
    assert_eq!(r.store().assets().unwrap(), assets_before);
    assert!(assets_before.iter().all(|a| a.updated_at == ts(9)));
}

#[test]
fn rerun_with_new_price_updates() {
    let r = fresh();
    r.reconcile_at(&[record(SourceKind::Csv, "ada", "ADA", 0.5)], ts(9)).unwrap();
    let result = r.reconcile_at(&[record(SourceKind::Csv, "ada", "ADA", 0.6)], ts(10)).unwrap();
    assert_eq!(result.summary.assets_updated, 1);
    assert!(result.upserted_canonical_ids.contains("ada"));
    assert_eq!(r.store().find_asset("ada").unwrap().unwrap().updated_at, ts(10));
}

// -------------------------------------------------------------------------
// Source id keys
// -------------------------------------------------------------------------

#[test]
fn source_id_case_does_not_split_mappings() {
    let r = fresh();
    r.reconcile_at(&[record(SourceKind::Coingecko, "Bitcoin", "BTC", 100.0)], ts(9)).unwrap();
    let second = r
        .reconcile_at(&[record(SourceKind::Coingecko, " bitcoin", "BTC", 101.0)], ts(10))
        .unwrap();

    assert_eq!(second.summary.mappings_created, 0);
    assert_eq!(r.store().mapping_count(), 1);
    assert_eq!(
        r.store().find_mapping(&SourceKind::Coingecko, "bitcoin").unwrap().as_deref(),
        Some("btc")
    );
}

#[test]
fn symbol_change_under_recased_id_is_a_conflict() {
    let r = fresh();
    r.reconcile_at(&[record(SourceKind::Coingecko, "bitcoin", "BTC", 100.0)], ts(9)).unwrap();
    let result = r
        .reconcile_at(&[record(SourceKind::Coingecko, "BITCOIN", "XBT", 101.0)], ts(10))
        .unwrap();

    assert_eq!(result.mapping_conflicts.len(), 1);
    assert_eq!(result.mapping_conflicts[0].source_id, "bitcoin");
    assert_eq!(result.mapping_conflicts[0].kept_canonical_id, "btc");
    assert!(r.store().find_asset("xbt").unwrap().is_none());
}

// -------------------------------------------------------------------------
// Invalid input
// -------------------------------------------------------------------------

#[test]
fn empty_symbol_reported_without_writes() {
    let r = fresh();
    let result = r
        .reconcile_at(&[record(SourceKind::Csv, "ghost", "", 1.0)], ts(9))
        .unwrap();

    assert_eq!(result.invalid_records.len(), 1);
    assert_eq!(result.invalid_records[0].input.source_id, "ghost");
    assert_eq!(result.invalid_records[0].reason, "empty symbol");
    assert!(result.upserted_canonical_ids.is_empty());
    assert_eq!(r.store().asset_count(), 0);
    assert_eq!(r.store().mapping_count(), 0);
}

#[test]
fn blank_name_never_erases_stored_name() {
    let r = fresh();
    let csv = RawRecord::new(SourceKind::Csv, "btc", "BTC", "Bitcoin", ts(8)).with_price(100.0);
    r.reconcile_at(&[csv], ts(9)).unwrap();

    let nameless = RawRecord::new(SourceKind::Coingecko, "bitcoin", "BTC", "   ", ts(8)).with_price(200.0);
    let result = r.reconcile_at(&[nameless], ts(10)).unwrap();

    assert_eq!(result.invalid_records.len(), 1);
    assert_eq!(result.invalid_records[0].reason, "empty name");
    let btc = r.store().find_asset("btc").unwrap().unwrap();
    assert_eq!(btc.name, "Bitcoin");
    assert_eq!(btc.market.current_price, Some(100.0));
    assert_eq!(r.store().mapping_count(), 1);
}

#[test]
fn bad_record_does_not_abort_batch() {
    let r = fresh();
    let batch = vec![
        record(SourceKind::Csv, "a", "   ", 1.0),
        record(SourceKind::Csv, "doge", "DOGE", 0.1),
        record(SourceKind::Csv, "b", "??", 1.0),
    ];
    let result = r.reconcile_at(&batch, ts(9)).unwrap();
    assert_eq!(result.summary.invalid, 2);
    assert_eq!(result.summary.valid_records, 1);
    let positions: Vec<usize> = result.invalid_records.iter().map(|i| i.input.position).collect();
    assert_eq!(positions, vec![0, 2]);
    assert!(r.store().find_asset("doge").unwrap().is_some());
}

#[test]
fn empty_batch_is_a_no_op() {
    let r = fresh();
    let result = r.reconcile_at(&[], ts(9)).unwrap();
    assert_eq!(result.summary.records_seen, 0);
    assert!(result.upserted_canonical_ids.is_empty());
}

// -------------------------------------------------------------------------
// Scenario
// -------------------------------------------------------------------------

#[test]
fn paprika_then_gecko_bitcoin() {
    let r = fresh();
    let batch = vec![
        record(SourceKind::Coinpaprika, "btc-bitcoin", "BTC", 50000.0),
        record(SourceKind::Coingecko, "bitcoin", "btc", 50500.0),
    ];
    let result = r.reconcile_at(&batch, ts(9)).unwrap();

    assert_eq!(result.upserted_canonical_ids.iter().collect::<Vec<_>>(), vec!["btc"]);
    assert_eq!(r.store().asset_count(), 1);
    let btc = r.store().find_asset("btc").unwrap().unwrap();
    assert_eq!(btc.market.current_price, Some(50500.0));

    let mappings = r.store().mappings().unwrap();
    assert_eq!(mappings.len(), 2);
    assert!(mappings.iter().all(|m| m.canonical_id == "btc"));
}

#[test]
fn clear_resets_state_machine() {
    let r = fresh();
    r.reconcile_at(&[record(SourceKind::Coingecko, "bitcoin", "BTC", 1.0)], ts(9)).unwrap();
    r.store().clear().unwrap();

    // After a clear the pair is unseen again and may bind afresh.
    let result = r
        .reconcile_at(&[record(SourceKind::Coingecko, "bitcoin", "XBT", 2.0)], ts(10))
        .unwrap();
    assert!(result.mapping_conflicts.is_empty());
    assert!(r.store().find_asset("xbt").unwrap().is_some());
}

#[test]
fn borrowed_store_stays_usable_by_caller() {
    let store = MemoryStore::new();
    {
        let r = Reconciler::new(&store, Normalizer::new());
        r.reconcile_at(&[record(SourceKind::Csv, "ltc", "LTC", 70.0)], ts(9)).unwrap();
    }
    assert_eq!(store.asset_count(), 1);
}
