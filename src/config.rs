use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// The four remote tables that make up one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Table {
    Products,
    Repairs,
    Maintenance,
    Specs,
}

impl Table {
    /// Every table, in fetch order.
    pub const ALL: [Table; 4] = [
        Table::Products,
        Table::Repairs,
        Table::Maintenance,
        Table::Specs,
    ];

    /// Name of the sheet on the backend.
    pub fn sheet_name(self) -> &'static str {
        match self {
            Table::Products => "Products",
            Table::Repairs => "Product_Repairs",
            Table::Maintenance => "Product_Maintenance",
            Table::Specs => "Product_Specs",
        }
    }

    /// Key the table's collection is persisted under.
    pub fn cache_key(self) -> &'static str {
        match self {
            Table::Products => "products",
            Table::Repairs => "repairsData",
            Table::Maintenance => "maintenanceData",
            Table::Specs => "specsData",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sheet_name())
    }
}

/// Settings needed to reach the backend and persist snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Endpoint serving `?sheet=<name>` requests.
    pub base_url: String,
    /// Directory holding the JSON cache files.
    pub cache_dir: PathBuf,
    /// Per-request timeout handed to the HTTP client. `None` leaves timeouts
    /// to the transport defaults.
    pub request_timeout: Option<Duration>,
}

impl SyncConfig {
    pub fn new(base_url: impl Into<String>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.into(),
            cache_dir: cache_dir.into(),
            request_timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Rejects configurations that can never produce a request.
    pub fn validate(&self) -> Result<()> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(SyncError::InvalidConfig("base URL is empty".into()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(SyncError::InvalidConfig(format!(
                "base URL '{url}' must use http or https"
            )));
        }
        if url.contains('?') {
            return Err(SyncError::InvalidConfig(format!(
                "base URL '{url}' must not carry a query string"
            )));
        }
        Ok(())
    }
}
