//! Canonical identity derivation.
//!
//! A canonical id is the ticker with whitespace removed, resolved through the
//! alias table, lower-cased. Matching is identifier-based only: two sources
//! that use different tickers for the same asset will not merge unless an
//! alias says so.

use std::collections::HashMap;

use crate::error::ReconError;
use crate::model::RawRecord;

#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    /// Upper-cased ticker -> upper-cased ticker.
    aliases: HashMap<String, String>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build with an alias table. Keys and targets are cleaned the same way
    /// symbols are, so `" wbtc"` and `"WBTC"` are the same alias. Entries
    /// that do not clean to a usable ticker are dropped; config validation
    /// rejects them earlier.
    pub fn with_aliases<I, K, V>(aliases: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let aliases = aliases
            .into_iter()
            .filter_map(|(from, to)| {
                let from = clean_symbol(from.as_ref()).ok()?;
                let to = clean_symbol(to.as_ref()).ok()?;
                Some((from, to))
            })
            .collect();
        Self { aliases }
    }

    /// Derive the canonical id for a record. Pure: no IO, no state change.
    ///
    /// A record without a name is rejected too: it could otherwise win
    /// priority and blank out the stored display name.
    pub fn canonical_id(&self, record: &RawRecord) -> Result<String, ReconError> {
        let canonical_id = self.canonical_id_for_symbol(&record.symbol)?;
        if source_key(&record.source_id).is_empty() {
            return Err(ReconError::invalid("empty source_id"));
        }
        if record.name.trim().is_empty() {
            return Err(ReconError::invalid("empty name"));
        }
        Ok(canonical_id)
    }

    pub fn canonical_id_for_symbol(&self, symbol: &str) -> Result<String, ReconError> {
        let cleaned = clean_symbol(symbol)?;
        let resolved = self.aliases.get(&cleaned).unwrap_or(&cleaned);
        Ok(resolved.to_ascii_lowercase())
    }
}

/// Mapping key form of a source id: trimmed and lower-cased, so `Bitcoin`
/// and `bitcoin ` from two exports of the same feed bind once.
pub fn source_key(source_id: &str) -> String {
    source_id.trim().to_lowercase()
}

/// Drop all whitespace and upper-case. No charset check.
pub fn fold_symbol(symbol: &str) -> String {
    symbol
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Fold, then check the charset.
fn clean_symbol(symbol: &str) -> Result<String, ReconError> {
    let cleaned = fold_symbol(symbol);

    if cleaned.is_empty() {
        return Err(ReconError::invalid("empty symbol"));
    }
    if !cleaned
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(ReconError::invalid(format!("unusable symbol '{}'", symbol.trim())));
    }
    Ok(cleaned)
}

/// True when `symbol` cleans to a usable ticker. Used by config validation.
pub fn is_usable_symbol(symbol: &str) -> bool {
    clean_symbol(symbol).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceKind;
    use chrono::Utc;

    fn record(symbol: &str) -> RawRecord {
        RawRecord::new(SourceKind::Csv, "id-1", symbol, "Name", Utc::now())
    }

    #[test]
    fn case_and_whitespace_fold() {
        let n = Normalizer::new();
        assert_eq!(n.canonical_id(&record("BTC")).unwrap(), "btc");
        assert_eq!(n.canonical_id(&record("  btc ")).unwrap(), "btc");
        assert_eq!(n.canonical_id(&record("B t C")).unwrap(), "btc");
    }

    #[test]
    fn empty_and_blank_rejected() {
        let n = Normalizer::new();
        assert!(matches!(
            n.canonical_id(&record("")),
            Err(ReconError::InvalidRecord { .. })
        ));
        let err = n.canonical_id(&record(" \t ")).unwrap_err();
        assert_eq!(err.to_string(), "invalid record: empty symbol");
    }

    #[test]
    fn punctuation_rejected() {
        let n = Normalizer::new();
        let err = n.canonical_id(&record("BTC/USD")).unwrap_err();
        assert!(err.to_string().contains("unusable symbol 'BTC/USD'"));
        assert_eq!(n.canonical_id(&record("BRK.B")).unwrap(), "brk.b");
    }

    #[test]
    fn blank_source_id_rejected() {
        let n = Normalizer::new();
        let mut r = record("ETH");
        r.source_id = "  ".into();
        let err = n.canonical_id(&r).unwrap_err();
        assert_eq!(err.to_string(), "invalid record: empty source_id");
    }

    #[test]
    fn blank_name_rejected() {
        let n = Normalizer::new();
        let mut r = record("BTC");
        r.name = "   ".into();
        let err = n.canonical_id(&r).unwrap_err();
        assert_eq!(err.to_string(), "invalid record: empty name");
    }

    #[test]
    fn source_key_folds_case_and_padding() {
        assert_eq!(source_key(" Bitcoin "), "bitcoin");
        assert_eq!(source_key("BTC-Bitcoin"), "btc-bitcoin");
        assert_eq!(source_key("\t"), "");
    }

    #[test]
    fn fold_symbol_matches_clean_symbol() {
        assert_eq!(fold_symbol(" w b t c "), "WBTC");
        assert_eq!(clean_symbol(" w b t c ").unwrap(), fold_symbol(" w b t c "));
    }

    #[test]
    fn aliases_resolve_case_insensitively() {
        let n = Normalizer::with_aliases([("wbtc", "BTC"), ("WETH", "eth")]);
        assert_eq!(n.canonical_id(&record("WBTC")).unwrap(), "btc");
        assert_eq!(n.canonical_id(&record("weth")).unwrap(), "eth");
        assert_eq!(n.canonical_id(&record("SOL")).unwrap(), "sol");
    }

    #[test]
    fn usable_symbol_check() {
        assert!(is_usable_symbol("usdt"));
        assert!(!is_usable_symbol("   "));
        assert!(!is_usable_symbol("$$"));
    }
}
