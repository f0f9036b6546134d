use std::convert::Infallible;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Where a record came from. Unknown names are kept verbatim (lower-cased)
/// and rank below every known source. Compare sources through
/// [`SourceKind::priority`], never by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceKind {
    Coingecko,
    Coinpaprika,
    Csv,
    Other(String),
}

/// Conflict-resolution rank. Declaration order is the total order:
/// `Unranked < Csv < Coinpaprika < Coingecko`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourcePriority {
    Unranked,
    Csv,
    Coinpaprika,
    Coingecko,
}

impl SourceKind {
    pub fn priority(&self) -> SourcePriority {
        match self {
            Self::Coingecko => SourcePriority::Coingecko,
            Self::Coinpaprika => SourcePriority::Coinpaprika,
            Self::Csv => SourcePriority::Csv,
            Self::Other(_) => SourcePriority::Unranked,
        }
    }

    /// True when a record from `self` may overwrite values stored by `held`.
    pub fn outranks_or_ties(&self, held: &SourceKind) -> bool {
        self.priority() >= held.priority()
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Coingecko => "coingecko",
            Self::Coinpaprika => "coinpaprika",
            Self::Csv => "csv",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for SourceKind {
    fn from(raw: &str) -> Self {
        let name = raw.trim().to_ascii_lowercase();
        match name.as_str() {
            "coingecko" => Self::Coingecko,
            "coinpaprika" => Self::Coinpaprika,
            "csv" => Self::Csv,
            _ => Self::Other(name),
        }
    }
}

impl From<String> for SourceKind {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

impl From<SourceKind> for String {
    fn from(source: SourceKind) -> Self {
        source.as_str().to_string()
    }
}

impl FromStr for SourceKind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::fmt::Display for SourcePriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unranked => write!(f, "unranked"),
            Self::Csv => write!(f, "csv"),
            Self::Coinpaprika => write!(f, "coinpaprika"),
            Self::Coingecko => write!(f, "coingecko"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order() {
        assert!(SourcePriority::Coingecko > SourcePriority::Coinpaprika);
        assert!(SourcePriority::Coinpaprika > SourcePriority::Csv);
        assert!(SourcePriority::Csv > SourcePriority::Unranked);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(SourceKind::from(" CoinGecko "), SourceKind::Coingecko);
        assert_eq!(SourceKind::from("CSV"), SourceKind::Csv);
        assert_eq!(
            SourceKind::from("Binance"),
            SourceKind::Other("binance".into())
        );
    }

    #[test]
    fn unknown_sources_tie_with_each_other() {
        let a = SourceKind::from("kraken");
        let b = SourceKind::from("binance");
        assert!(a.outranks_or_ties(&b));
        assert!(b.outranks_or_ties(&a));
        assert!(!a.outranks_or_ties(&SourceKind::Csv));
        assert!(SourceKind::Csv.outranks_or_ties(&a));
    }

    #[test]
    fn serde_uses_plain_names() {
        let json = serde_json::to_string(&SourceKind::Coinpaprika).unwrap();
        assert_eq!(json, "\"coinpaprika\"");
        let back: SourceKind = serde_json::from_str("\"Kraken\"").unwrap();
        assert_eq!(back, SourceKind::Other("kraken".into()));
    }
}
