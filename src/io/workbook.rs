use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use calamine::{DataType, Reader, Xlsx, open_workbook};
use chrono::{NaiveDate, NaiveTime, TimeDelta};
use rust_xlsxwriter::{Workbook, Worksheet};
use tracing::{debug, instrument};

use crate::config::Table;
use crate::error::{Result, SyncError};
use crate::io::TableSource;
use crate::mapping::FieldDictionary;
use crate::model::{FieldValue, PRODUCT_SN_FIELD, RawTable, Record, RelationIndex, SN_FIELD, SyncSnapshot};

/// Reads the four tables from a local `.xlsx` export holding one sheet per
/// table, named as on the backend.
#[derive(Debug, Clone)]
pub struct WorkbookSource {
    path: PathBuf,
}

impl WorkbookSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TableSource for WorkbookSource {
    async fn fetch_table(&self, table: Table) -> Result<RawTable> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_table(&path, table))
            .await
            .map_err(|err| SyncError::Io(std::io::Error::other(err)))?
    }
}

/// Reads one table's sheet from the workbook at `path`.
#[instrument(level = "debug", skip_all, fields(path = %path.display(), sheet = table.sheet_name()))]
pub fn read_table(path: &Path, table: Table) -> Result<RawTable> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let range = workbook
        .worksheet_range(table.sheet_name())
        .ok_or_else(|| {
            SyncError::InvalidWorkbook(format!("missing sheet '{}'", table.sheet_name()))
        })?
        .map_err(SyncError::from)?;

    let grid: Vec<Vec<String>> = range
        .rows()
        .map(|row| row.iter().map(|cell| cell_to_string(Some(cell))).collect())
        .collect();
    debug!(rows = grid.len(), "sheet read");
    Ok(RawTable::from_grid(grid))
}

fn cell_to_string(cell: Option<&DataType>) -> String {
    match cell {
        Some(DataType::String(value)) => value.clone(),
        Some(DataType::Float(value)) => value.to_string(),
        Some(DataType::Int(value)) => value.to_string(),
        Some(DataType::Bool(value)) => value.to_string(),
        Some(DataType::DateTime(serial)) => excel_serial_to_string(*serial),
        Some(DataType::Empty) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Excel stores dates as days since 1899-12-30.
fn excel_serial_to_string(serial: f64) -> String {
    let moment = NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|epoch| epoch.and_hms_opt(0, 0, 0))
        .zip(TimeDelta::try_milliseconds((serial * 86_400_000.0).round() as i64))
        .and_then(|(epoch, offset)| epoch.checked_add_signed(offset));
    match moment {
        Some(moment) if moment.time() == NaiveTime::MIN => moment.format("%Y-%m-%d").to_string(),
        Some(moment) => moment.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => serial.to_string(),
    }
}

/// Writes `snapshot` into a workbook that [`WorkbookSource`] can read back.
///
/// Field ids are written under a header the dictionary maps back to the same
/// id. Product rows keep their source row, so `id` and `rowIndex` survive a
/// re-import; relation rows are written densely in index order.
#[instrument(level = "info", skip_all, fields(output = %path.display()))]
pub fn export_snapshot(path: &Path, snapshot: &SyncSnapshot, dictionary: &FieldDictionary) -> Result<()> {
    let mut workbook = Workbook::new();

    let products: Vec<(u32, &Record)> = snapshot
        .products
        .iter()
        .map(|product| (product.row_index.saturating_sub(1) as u32, &product.record))
        .collect();
    write_sheet(workbook.add_worksheet(), Table::Products, SN_FIELD, &products, dictionary)?;

    for (table, index) in [
        (Table::Repairs, &snapshot.repairs),
        (Table::Maintenance, &snapshot.maintenance),
        (Table::Specs, &snapshot.specs),
    ] {
        let records = flatten_index(index);
        write_sheet(workbook.add_worksheet(), table, PRODUCT_SN_FIELD, &records, dictionary)?;
    }

    workbook.save(path)?;
    debug!(products = snapshot.products.len(), "snapshot exported");
    Ok(())
}

fn flatten_index(index: &RelationIndex) -> Vec<(u32, &Record)> {
    index
        .iter()
        .flat_map(|(_, records)| records.iter())
        .enumerate()
        .map(|(row_idx, record)| ((row_idx + 1) as u32, record))
        .collect()
}

fn write_sheet(
    worksheet: &mut Worksheet,
    table: Table,
    key_field: &str,
    rows: &[(u32, &Record)],
    dictionary: &FieldDictionary,
) -> Result<()> {
    worksheet.set_name(table.sheet_name())?;

    let mut remaining: BTreeSet<&str> = rows
        .iter()
        .flat_map(|(_, record)| record.fields.keys().map(String::as_str))
        .collect();
    let mut columns = Vec::with_capacity(remaining.len());
    if remaining.remove(key_field) {
        columns.push(key_field);
    }
    columns.extend(remaining);

    for (col_idx, field) in columns.iter().enumerate() {
        worksheet.write_string(0, col_idx as u16, dictionary.export_header(field))?;
    }

    for &(row, record) in rows {
        for (col_idx, field) in columns.iter().enumerate() {
            match record.get(field) {
                Some(FieldValue::Number(value)) => {
                    worksheet.write_number(row, col_idx as u16, *value)?;
                }
                Some(FieldValue::Text(value)) if !value.is_empty() => {
                    worksheet.write_string(row, col_idx as u16, value)?;
                }
                _ => {}
            }
        }
    }

    Ok(())
}
