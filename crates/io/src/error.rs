use std::fmt;

use coinmerge_recon::StoreError;

#[derive(Debug)]
pub enum IoError {
    /// Malformed CSV structure (bad quoting, unreadable header).
    Csv(String),
    /// A required column is absent from the feed's header row.
    MissingColumn { feed: String, column: String },
    /// Opening or migrating the database failed.
    Store(StoreError),
    /// Feed file is over the size cap.
    TooLarge { path: String, size: u64, limit: u64 },
    /// File read error.
    Io(String),
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv(msg) => write!(f, "CSV error: {msg}"),
            Self::MissingColumn { feed, column } => {
                write!(f, "feed '{feed}': missing column '{column}'")
            }
            Self::Store(err) => write!(f, "store error: {err}"),
            Self::TooLarge { path, size, limit } => write!(
                f,
                "{path} is {size} bytes, exceeds the {} MB feed limit",
                limit / (1024 * 1024)
            ),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for IoError {}

impl From<StoreError> for IoError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<csv::Error> for IoError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err.to_string())
    }
}
