//! Adapters that produce raw tables: the remote sheet endpoint and local
//! workbook exports.

pub mod remote;
pub mod workbook;

use async_trait::async_trait;
use futures::future::join4;

use crate::config::Table;
use crate::error::Result;
use crate::model::RawTable;
use crate::snapshot::TableSet;

pub use remote::HttpTableSource;
pub use workbook::{WorkbookSource, export_snapshot};

/// Anything that can hand back the raw payload of one table.
#[async_trait]
pub trait TableSource: Send + Sync {
    async fn fetch_table(&self, table: Table) -> Result<RawTable>;
}

/// Fetches the four tables concurrently and waits for every fetch to settle.
/// The first failure, in table order, is returned.
pub async fn fetch_all(source: &dyn TableSource) -> Result<TableSet> {
    let (products, repairs, maintenance, specs) = join4(
        source.fetch_table(Table::Products),
        source.fetch_table(Table::Repairs),
        source.fetch_table(Table::Maintenance),
        source.fetch_table(Table::Specs),
    )
    .await;

    Ok(TableSet {
        products: products?,
        repairs: repairs?,
        maintenance: maintenance?,
        specs: specs?,
    })
}
