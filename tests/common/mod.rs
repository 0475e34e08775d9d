#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use asset_sync::io::TableSource;
use asset_sync::snapshot::TableSet;
use asset_sync::{RawTable, Result, SyncError, Table};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

pub fn table(header: &[&str], rows: &[&[&str]]) -> RawTable {
    RawTable::new(
        header.iter().map(|cell| cell.to_string()).collect(),
        rows.iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect(),
    )
}

pub fn products_table() -> RawTable {
    table(
        &["Serial No", "Product Name", "Category", "Status", "Cost", "Part 1", "Part 2", "Location"],
        &[
            &["SN-001", "Laptop", "IT", "", "1200", "Battery", "-", "HQ"],
            &["SN-002", "Printer", "Office", "Retired", "abc", "", "", "Branch"],
            &["SN-003", "Router", "IT", "Active", "350.5", "Antenna", "PSU", "HQ"],
        ],
    )
}

pub fn repairs_table() -> RawTable {
    table(
        &["Product SN", "Repair Date", "Repair Cost", "Technician", "Part Changed", "Created Date"],
        &[
            &["SN-001", "2024-01-10", "500", "Ann", "No", "2024-01-10"],
            &["Product SN", "Repair Date", "Repair Cost", "Technician", "Part Changed", "Created Date"],
            &["SN-001", "2024-03-05", "1200", "Raj", "Yes", "2024-03-06"],
            &["", "2024-02-01", "90", "Lee", "No", ""],
            &["SN-999", "2024-02-02", "75", "Lee", "No", ""],
        ],
    )
}

pub fn maintenance_table() -> RawTable {
    table(
        &["Product SN", "Maintenance Required", "Maintenance Type", "Frequency", "Next Service Date"],
        &[
            &["SN-001", "Yes", "Preventive", "Quarterly", "2024-06-01"],
            &["SN-003", "No", "", "", ""],
        ],
    )
}

pub fn specs_table() -> RawTable {
    table(
        &["Product SN", "Spec Name", "Spec Value"],
        &[
            &["SN-001", "RAM", "16GB"],
            &["SN-001", "CPU", "i7"],
            &["SN-003", "Ports", "4"],
        ],
    )
}

pub fn table_set() -> TableSet {
    TableSet {
        products: products_table(),
        repairs: repairs_table(),
        maintenance: maintenance_table(),
        specs: specs_table(),
    }
}

/// Lets a test hold the first products fetch open until it says so.
#[derive(Default)]
pub struct Gate {
    pub started: Notify,
    pub release: Notify,
}

/// In-memory table source whose contents and failures tests can change
/// between refreshes.
pub struct ScriptedSource {
    tables: Mutex<TableSet>,
    failing: Mutex<Vec<Table>>,
    product_fetches: AtomicUsize,
    gate: Option<Gate>,
}

impl ScriptedSource {
    pub fn new(tables: TableSet) -> Self {
        Self {
            tables: Mutex::new(tables),
            failing: Mutex::new(Vec::new()),
            product_fetches: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub fn gated(tables: TableSet) -> Self {
        Self {
            gate: Some(Gate::default()),
            ..Self::new(tables)
        }
    }

    pub fn gate(&self) -> &Gate {
        self.gate.as_ref().expect("source built with ScriptedSource::gated")
    }

    pub fn set_products(&self, products: RawTable) {
        self.tables.lock().products = products;
    }

    pub fn fail(&self, tables: &[Table]) {
        *self.failing.lock() = tables.to_vec();
    }

    pub fn product_fetches(&self) -> usize {
        self.product_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TableSource for ScriptedSource {
    async fn fetch_table(&self, table: Table) -> Result<RawTable> {
        if self.failing.lock().contains(&table) {
            return Err(SyncError::HttpStatus { table, status: 503 });
        }

        let raw = {
            let tables = self.tables.lock();
            match table {
                Table::Products => tables.products.clone(),
                Table::Repairs => tables.repairs.clone(),
                Table::Maintenance => tables.maintenance.clone(),
                Table::Specs => tables.specs.clone(),
            }
        };

        if table == Table::Products {
            let call = self.product_fetches.fetch_add(1, Ordering::SeqCst);
            if let (0, Some(gate)) = (call, &self.gate) {
                gate.started.notify_one();
                gate.release.notified().await;
            }
        }
        Ok(raw)
    }
}
