use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identifier a column header maps to, e.g. `productSn` or `repairCost`.
pub type FieldId = String;

/// Wire shape of one table: the header row plus the data rows beneath it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { header, rows }
    }

    /// Splits a `[header, row, row, ...]` grid. An empty grid yields an
    /// empty table.
    pub fn from_grid(mut grid: Vec<Vec<String>>) -> Self {
        if grid.is_empty() {
            return Self::default();
        }
        let header = grid.remove(0);
        Self { header, rows: grid }
    }
}

/// Typed value of one recognised field.
///
/// Serialised untagged so cached collections keep the plain
/// `{"sn": "A1", "cost": 1200}` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Coerced numeric field. Never NaN or infinite.
    Number(f64),
    /// Raw cell text, empty when the source cell was absent.
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(value) => Some(value),
            FieldValue::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(value) => Some(*value),
            FieldValue::Text(_) => None,
        }
    }

    /// Renders the value the way it would appear in a spreadsheet cell.
    pub fn to_cell(&self) -> String {
        match self {
            FieldValue::Text(value) => value.clone(),
            FieldValue::Number(value) => value.to_string(),
        }
    }
}

/// One normalised row of any of the four tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Field id → typed value, for every non-blank header of the source table.
    #[serde(flatten)]
    pub fields: BTreeMap<FieldId, FieldValue>,
}

/// Field id of the foreign key carried by repair, maintenance and spec rows.
pub const PRODUCT_SN_FIELD: &str = "productSn";
/// Field id of a product's serial number.
pub const SN_FIELD: &str = "sn";

impl Record {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Text of a field, or `""` when absent or numeric.
    pub fn text(&self, field: &str) -> &str {
        self.fields
            .get(field)
            .and_then(FieldValue::as_text)
            .unwrap_or("")
    }

    /// Number of a field, or `0` when absent or textual.
    pub fn number(&self, field: &str) -> f64 {
        self.fields
            .get(field)
            .and_then(FieldValue::as_number)
            .unwrap_or(0.0)
    }

    pub fn insert(&mut self, field: impl Into<FieldId>, value: FieldValue) {
        self.fields.insert(field.into(), value);
    }
}

/// Row of the `Product_Repairs` table: `productSn`, `repairDate`,
/// `repairCost`, `technician`, `part1..part5`, `partChanged`, `remarks`,
/// `createdDate`.
pub type RepairRecord = Record;
/// Row of the `Product_Maintenance` table: `productSn`,
/// `maintenanceRequired`, `maintenanceType`, `frequency`,
/// `nextServiceDate`, `technician`, `notes`.
pub type MaintenanceRecord = Record;
/// Row of the `Product_Specs` table: `productSn`, `specName`, `specValue`.
pub type SpecEntry = Record;

/// The primary entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// 1-based position among the data rows.
    pub id: u64,
    /// Sheet row the product was read from (header is row 1).
    #[serde(rename = "rowIndex")]
    pub row_index: u64,
    #[serde(flatten)]
    pub record: Record,
    /// Non-empty `part1..part5` values in column order, `-` excluded.
    #[serde(rename = "partNames", default)]
    pub part_names: Vec<String>,
}

impl Product {
    pub fn sn(&self) -> &str {
        self.record.text(SN_FIELD)
    }
}

/// Serial number → relation rows in source-row order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationIndex(BTreeMap<String, Vec<Record>>);

impl RelationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records for `sn`, empty when the key has no bucket.
    pub fn get(&self, sn: &str) -> &[Record] {
        self.0.get(sn).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn push(&mut self, key: String, record: Record) {
        self.0.entry(key).or_default().push(record);
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of records across all buckets.
    pub fn record_count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Record])> {
        self.0.iter().map(|(key, records)| (key.as_str(), records.as_slice()))
    }
}

/// The four collections committed together after a successful sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncSnapshot {
    pub products: Vec<Product>,
    pub repairs: RelationIndex,
    pub maintenance: RelationIndex,
    pub specs: RelationIndex,
}

impl SyncSnapshot {
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
            && self.repairs.is_empty()
            && self.maintenance.is_empty()
            && self.specs.is_empty()
    }
}

/// Derived repair statistics for one product. Computed on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairSummary {
    pub repair_count: usize,
    pub total_repair_cost: f64,
    pub last_repair_date: Option<String>,
    pub last_repair_cost: f64,
    pub part_changed: String,
}

impl Default for RepairSummary {
    fn default() -> Self {
        Self {
            repair_count: 0,
            total_repair_cost: 0.0,
            last_repair_date: None,
            last_repair_cost: 0.0,
            part_changed: "No".to_string(),
        }
    }
}
