use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconError {
    /// Record cannot be resolved to a canonical identity. Recoverable: the
    /// engine skips the record and keeps going.
    InvalidRecord { reason: String },
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (no feeds, blank alias, alias chain, etc.).
    ConfigValidation(String),
    /// A feed name requested by the caller is not in the config.
    UnknownFeed(String),
    /// Storage collaborator failed while persisting a batch.
    Storage(StoreError),
}

impl ReconError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRecord { reason: reason.into() }
    }
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRecord { reason } => write!(f, "invalid record: {reason}"),
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::UnknownFeed(feed) => write!(f, "unknown feed: {feed}"),
            Self::Storage(err) => write!(f, "storage failure: {err}"),
        }
    }
}

impl std::error::Error for ReconError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for ReconError {
    fn from(err: StoreError) -> Self {
        Self::Storage(err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend rejected or failed an operation.
    Backend(String),
    /// A stored row could not be decoded.
    Corrupt { table: String, detail: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(msg) => write!(f, "backend error: {msg}"),
            Self::Corrupt { table, detail } => write!(f, "corrupt row in '{table}': {detail}"),
        }
    }
}

impl std::error::Error for StoreError {}
