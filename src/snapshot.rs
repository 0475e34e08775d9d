use std::collections::HashSet;

use tracing::{debug, warn};

use crate::mapping::FieldDictionary;
use crate::model::{
    FieldId, PRODUCT_SN_FIELD, Product, RawTable, Record, RelationIndex, SN_FIELD, SyncSnapshot,
};

/// Field ids the builder assigns to products itself; columns mapping onto
/// them are ignored.
const PRODUCT_RESERVED: &[&str] = &["id", "rowIndex", "partNames"];

/// Raw payloads of the four tables, as fetched together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableSet {
    pub products: RawTable,
    pub repairs: RawTable,
    pub maintenance: RawTable,
    pub specs: RawTable,
}

/// Builds all four collections of a snapshot from one fetch round.
pub fn build_snapshot(dictionary: &FieldDictionary, tables: &TableSet) -> SyncSnapshot {
    SyncSnapshot {
        products: build_products(dictionary, &tables.products),
        repairs: build_relation_index(dictionary, &tables.repairs),
        maintenance: build_relation_index(dictionary, &tables.maintenance),
        specs: build_relation_index(dictionary, &tables.specs),
    }
}

/// Column index → field id for every usable header cell.
fn resolve_columns(
    dictionary: &FieldDictionary,
    header: &[String],
    reserved: &[&str],
) -> Vec<(usize, FieldId)> {
    header
        .iter()
        .enumerate()
        .filter_map(|(col_idx, cell)| {
            let field = dictionary.map_header(cell);
            if field.is_empty() {
                return None;
            }
            if reserved.contains(&field.as_str()) {
                debug!(header = %cell, %field, "ignoring column mapped onto a reserved field");
                return None;
            }
            Some((col_idx, field))
        })
        .collect()
}

fn cell(row: &[String], col_idx: usize) -> &str {
    row.get(col_idx).map(String::as_str).unwrap_or("")
}

fn build_record(dictionary: &FieldDictionary, columns: &[(usize, FieldId)], row: &[String]) -> Record {
    let mut record = Record::default();
    for (col_idx, field) in columns {
        record.insert(field.clone(), dictionary.coerce(field, cell(row, *col_idx)));
    }
    record
}

fn part_names(dictionary: &FieldDictionary, columns: &[(usize, FieldId)], row: &[String]) -> Vec<String> {
    columns
        .iter()
        .filter_map(|(col_idx, field)| dictionary.part_name(field, cell(row, *col_idx)))
        .map(str::to_string)
        .collect()
}

/// Converts every data row of `table` into a record, in source order.
///
/// Columns with blank headers are skipped and cells missing from short rows
/// are read as blank.
pub fn build_records(dictionary: &FieldDictionary, table: &RawTable) -> Vec<Record> {
    let columns = resolve_columns(dictionary, &table.header, &[]);
    table
        .rows
        .iter()
        .map(|row| build_record(dictionary, &columns, row))
        .collect()
}

/// Builds the primary collection.
///
/// Blank rows and header echoes are skipped. `id` and `rowIndex` follow the
/// source row position, so skipped rows leave gaps rather than renumbering.
/// When two rows share a non-blank serial number the first one wins.
pub fn build_products(dictionary: &FieldDictionary, table: &RawTable) -> Vec<Product> {
    let columns = resolve_columns(dictionary, &table.header, PRODUCT_RESERVED);
    let sn_column = columns
        .iter()
        .find(|(_, field)| field == SN_FIELD)
        .map(|(col_idx, _)| *col_idx);

    let mut seen: HashSet<&str> = HashSet::new();
    let mut products = Vec::with_capacity(table.rows.len());

    for (index, row) in table.rows.iter().enumerate() {
        if row.iter().all(|value| value.trim().is_empty()) {
            continue;
        }
        if let Some(col_idx) = sn_column {
            let sn = cell(row, col_idx);
            if is_header_echo(&table.header, col_idx, sn) {
                debug!(row = index + 2, "skipping header row repeated in data");
                continue;
            }
            if !sn.trim().is_empty() && !seen.insert(sn) {
                warn!(row = index + 2, sn, "duplicate serial number, keeping first occurrence");
                continue;
            }
        }

        products.push(Product {
            id: index as u64 + 1,
            row_index: index as u64 + 2,
            record: build_record(dictionary, &columns, row),
            part_names: part_names(dictionary, &columns, row),
        });
    }

    debug!(rows = table.rows.len(), products = products.len(), "products table built");
    products
}

fn is_header_echo(header: &[String], col_idx: usize, value: &str) -> bool {
    header
        .get(col_idx)
        .is_some_and(|label| !label.trim().is_empty() && label.trim() == value.trim())
}

/// Column carrying the product serial number in a relation table: the
/// `productSn` column when present, otherwise the first column.
pub fn relation_key_column(dictionary: &FieldDictionary, header: &[String]) -> Option<(usize, FieldId)> {
    let columns = resolve_columns(dictionary, header, &[]);
    columns
        .iter()
        .find(|(_, field)| field == PRODUCT_SN_FIELD)
        .or_else(|| columns.iter().find(|(col_idx, _)| *col_idx == 0))
        .cloned()
}

/// Builds the records of a relation table, dropping rows whose key cell is
/// blank or repeats the key header's own label.
pub fn build_relation_records(dictionary: &FieldDictionary, table: &RawTable) -> (FieldId, Vec<Record>) {
    let Some((key_col, key_field)) = relation_key_column(dictionary, &table.header) else {
        if !table.rows.is_empty() {
            warn!(rows = table.rows.len(), "relation table has no key column, dropping all rows");
        }
        return (PRODUCT_SN_FIELD.to_string(), Vec::new());
    };

    let columns = resolve_columns(dictionary, &table.header, &[]);
    let records = table
        .rows
        .iter()
        .filter(|row| {
            let key = cell(row, key_col);
            !key.trim().is_empty() && !is_header_echo(&table.header, key_col, key)
        })
        .map(|row| build_record(dictionary, &columns, row))
        .collect();
    (key_field, records)
}

/// Groups `records` by their value at `key_field`, preserving input order
/// within each bucket. Records with a blank or non-text key are dropped.
pub fn index_records<I>(records: I, key_field: &str) -> RelationIndex
where
    I: IntoIterator<Item = Record>,
{
    let mut index = RelationIndex::new();
    for record in records {
        let key = record.text(key_field);
        if key.trim().is_empty() {
            continue;
        }
        let key = key.to_string();
        index.push(key, record);
    }
    index
}

/// Builds the serial-number index of one relation table.
pub fn build_relation_index(dictionary: &FieldDictionary, table: &RawTable) -> RelationIndex {
    let (key_field, records) = build_relation_records(dictionary, table);
    let index = index_records(records, &key_field);
    debug!(
        rows = table.rows.len(),
        keys = index.len(),
        records = index.record_count(),
        "relation index built"
    );
    index
}
