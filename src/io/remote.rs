use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::{SyncConfig, Table};
use crate::error::{Result, SyncError};
use crate::io::TableSource;
use crate::model::RawTable;

/// Fetches tables from the `GET <base>?sheet=<name>&timestamp=<ms>` endpoint.
#[derive(Debug, Clone)]
pub struct HttpTableSource {
    client: Client,
    base_url: String,
}

impl HttpTableSource {
    pub fn new(config: &SyncConfig) -> Result<Self> {
        config.validate()?;
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| SyncError::InvalidConfig(format!("HTTP client: {err}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim().to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl TableSource for HttpTableSource {
    #[instrument(level = "debug", skip(self), fields(sheet = table.sheet_name()))]
    async fn fetch_table(&self, table: Table) -> Result<RawTable> {
        let cache_buster = Utc::now().timestamp_millis().to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("sheet", table.sheet_name()), ("timestamp", cache_buster.as_str())])
            .send()
            .await
            .map_err(|source| SyncError::Transport { table, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::HttpStatus {
                table,
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|source| SyncError::Transport { table, source })?;
        let raw = parse_payload(table, &body)?;
        debug!(columns = raw.header.len(), rows = raw.rows.len(), "table fetched");
        Ok(raw)
    }
}

/// Validates the `{success, data}` envelope and extracts the grid.
///
/// Scalar cells are stringified and `null` reads as blank; nested arrays or
/// objects inside a row are rejected.
pub fn parse_payload(table: Table, body: &str) -> Result<RawTable> {
    let envelope: Value = serde_json::from_str(body)
        .map_err(|err| SyncError::schema(table, format!("invalid JSON: {err}")))?;
    let Value::Object(fields) = envelope else {
        return Err(SyncError::schema(table, "payload is not a JSON object"));
    };

    match fields.get("success") {
        Some(Value::Bool(true)) => {}
        Some(Value::Bool(false)) => {
            let reason = fields
                .get("error")
                .or_else(|| fields.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("backend reported failure");
            return Err(SyncError::schema(table, format!("success=false: {reason}")));
        }
        _ => return Err(SyncError::schema(table, "missing boolean 'success' flag")),
    }

    let Some(Value::Array(rows)) = fields.get("data") else {
        return Err(SyncError::schema(table, "'data' is missing or not an array"));
    };

    let grid = rows
        .iter()
        .enumerate()
        .map(|(row_idx, row)| {
            let Value::Array(cells) = row else {
                return Err(SyncError::schema(table, format!("row {row_idx} is not an array")));
            };
            cells
                .iter()
                .map(|value| {
                    cell_to_string(value).ok_or_else(|| {
                        SyncError::schema(table, format!("row {row_idx} holds a nested value"))
                    })
                })
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RawTable::from_grid(grid))
}

fn cell_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(value) => Some(value.clone()),
        Value::Number(value) => Some(value.to_string()),
        Value::Bool(value) => Some(value.to_string()),
        Value::Null => Some(String::new()),
        Value::Array(_) | Value::Object(_) => None,
    }
}
