use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::ReconError;
use crate::normalize::{fold_symbol, is_usable_symbol, Normalizer};
use crate::source::SourceKind;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    pub name: String,
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    pub feeds: BTreeMap<String, FeedConfig>,
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NormalizerConfig {
    /// Ticker -> ticker, e.g. `WBTC = "BTC"`.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

impl NormalizerConfig {
    pub fn build(&self) -> Normalizer {
        Normalizer::with_aliases(&self.aliases)
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> String {
    "coinmerge.db".into()
}

// ---------------------------------------------------------------------------
// Feeds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub source: SourceKind,
    pub file: String,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub columns: ColumnMapping,
}

/// Header names for each record field. Unset fields use the names the
/// market APIs export.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub source_id: String,
    pub symbol: String,
    pub name: String,
    pub current_price: String,
    pub market_cap: String,
    pub total_volume: String,
    pub price_change_24h: String,
    pub price_change_percentage_24h: String,
    pub observed_at: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            source_id: "id".into(),
            symbol: "symbol".into(),
            name: "name".into(),
            current_price: "current_price".into(),
            market_cap: "market_cap".into(),
            total_volume: "total_volume".into(),
            price_change_24h: "price_change_24h".into(),
            price_change_percentage_24h: "price_change_percentage_24h".into(),
            observed_at: "last_updated".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl IngestConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: IngestConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.name.trim().is_empty() {
            return Err(ReconError::ConfigValidation("name must not be empty".into()));
        }

        if self.feeds.is_empty() {
            return Err(ReconError::ConfigValidation(
                "at least one feed is required".into(),
            ));
        }

        for (feed_name, feed) in &self.feeds {
            if feed.file.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "feed '{feed_name}': file must not be empty"
                )));
            }
            if feed.source.as_str().is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "feed '{feed_name}': source must not be empty"
                )));
            }
            if feed.limit == Some(0) {
                return Err(ReconError::ConfigValidation(format!(
                    "feed '{feed_name}': limit must be positive"
                )));
            }
        }

        let aliases = &self.normalizer.aliases;
        for (from, to) in aliases {
            if !is_usable_symbol(from) || !is_usable_symbol(to) {
                return Err(ReconError::ConfigValidation(format!(
                    "alias '{from}' -> '{to}' is not a usable ticker pair"
                )));
            }
        }
        // Aliases resolve in one step; a target that is itself an alias
        // would make the result depend on lookup order.
        let keys: Vec<String> = aliases.keys().map(|k| fold_symbol(k)).collect();
        for (from, to) in aliases {
            if keys.contains(&fold_symbol(to)) {
                return Err(ReconError::ConfigValidation(format!(
                    "alias '{from}' -> '{to}' points at another alias"
                )));
            }
        }

        Ok(())
    }

    /// Feeds to ingest: all of them, or the named subset in config order.
    pub fn select_feeds(&self, names: &[String]) -> Result<Vec<(&String, &FeedConfig)>, ReconError> {
        if names.is_empty() {
            return Ok(self.feeds.iter().collect());
        }
        for name in names {
            if !self.feeds.contains_key(name) {
                return Err(ReconError::UnknownFeed(name.clone()));
            }
        }
        Ok(self
            .feeds
            .iter()
            .filter(|(name, _)| names.contains(name))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
