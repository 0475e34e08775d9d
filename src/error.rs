use thiserror::Error;

use crate::config::Table;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Error type covering the different failure cases that can occur while the
/// tables are fetched, normalised, cached, or exported.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network or HTTP failure while fetching a table.
    #[error("transport error while fetching {table}: {source}")]
    Transport {
        table: Table,
        #[source]
        source: reqwest::Error,
    },

    /// The remote endpoint answered with a non-success HTTP status.
    #[error("{table} endpoint returned HTTP {status}")]
    HttpStatus { table: Table, status: u16 },

    /// The payload parsed but does not follow the `{success, data}` envelope.
    #[error("malformed {table} payload: {reason}")]
    Schema { table: Table, reason: String },

    /// A fallback was requested but nothing usable was persisted.
    #[error("no cached data available")]
    CacheMiss,

    /// Wrapper for IO failures such as reading or writing cache files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Raised when a workbook is missing one of the expected sheets.
    #[error("invalid workbook structure: {0}")]
    InvalidWorkbook(String),

    /// Raised when the configuration cannot be used to reach the backend.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Raised when a lookup by id or serial number finds nothing.
    #[error("no product matches '{0}'")]
    ProductNotFound(String),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

/// Coarse classification used by callers that only care about why a refresh
/// did not commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Schema,
    CacheMiss,
    Other,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Transport { .. } | SyncError::HttpStatus { .. } => ErrorKind::Transport,
            SyncError::Schema { .. } => ErrorKind::Schema,
            SyncError::CacheMiss => ErrorKind::CacheMiss,
            _ => ErrorKind::Other,
        }
    }

    pub(crate) fn schema(table: Table, reason: impl Into<String>) -> Self {
        SyncError::Schema {
            table,
            reason: reason.into(),
        }
    }
}
