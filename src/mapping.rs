//! Header → field id mapping and per-field value coercion.
//!
//! Both operations are total: unknown headers degrade to a derived camelCase
//! id and unparseable numbers become `0`, so schema drift on the backend
//! never fails a sync.

use std::collections::{BTreeSet, HashMap};

use crate::model::{FieldId, FieldValue};

/// Headers emitted by the four sheets and the field ids they map to.
const STANDARD_HEADERS: &[(&str, &str)] = &[
    // Products
    ("Timestamp", "timestamp"),
    ("Serial No", "sn"),
    ("Product Name", "productName"),
    ("Category", "category"),
    ("Type", "type"),
    ("Brand", "brand"),
    ("Model", "model"),
    ("SKU", "sku"),
    ("Mfg Date", "mfgDate"),
    ("Origin", "origin"),
    ("Status", "status"),
    ("Asset Date", "assetDate"),
    ("Invoice No", "invoiceNo"),
    ("Cost", "cost"),
    ("Qty", "qty"),
    ("Supplier", "supplier"),
    ("Payment", "payment"),
    ("Location", "location"),
    ("Department", "department"),
    ("Assigned To", "assignedTo"),
    ("Responsible", "responsible"),
    ("Warranty", "warranty"),
    ("AMC", "amc"),
    ("Maintenance", "maintenance"),
    ("Priority", "priority"),
    ("Last Repair", "lastRepair"),
    ("Last Cost", "lastCost"),
    ("Part Chg?", "partChg"),
    ("Part 1", "part1"),
    ("Part 2", "part2"),
    ("Part 3", "part3"),
    ("Part 4", "part4"),
    ("Part 5", "part5"),
    ("Count", "count"),
    ("Total Cost", "totalCost"),
    ("Asset Value", "assetValue"),
    ("Dep. Method", "depMethod"),
    ("Created By", "createdBy"),
    // Product_Repairs
    ("Product SN", "productSn"),
    ("Repair Date", "repairDate"),
    ("Repair Cost", "repairCost"),
    ("Part Changed", "partChanged"),
    ("Technician", "technician"),
    ("Remarks", "remarks"),
    ("Created Date", "createdDate"),
    // Product_Maintenance
    ("Maintenance Required", "maintenanceRequired"),
    ("Maintenance Type", "maintenanceType"),
    ("Frequency", "frequency"),
    ("Next Service Date", "nextServiceDate"),
    ("Notes", "notes"),
    // Product_Specs
    ("Spec Name", "specName"),
    ("Spec Value", "specValue"),
];

const NUMERIC_FIELDS: &[&str] = &[
    "cost",
    "qty",
    "lastCost",
    "totalCost",
    "assetValue",
    "count",
    "repairCost",
];

const PART_FIELDS: &[&str] = &["part1", "part2", "part3", "part4", "part5"];

const STATUS_FIELD: &str = "status";
const STATUS_DEFAULT: &str = "Active";
const PART_PLACEHOLDER: &str = "-";

/// Immutable configuration driving [`FieldDictionary::map_header`] and
/// [`FieldDictionary::coerce`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDictionary {
    headers: HashMap<String, FieldId>,
    numeric: BTreeSet<FieldId>,
    parts: BTreeSet<FieldId>,
    status_field: FieldId,
    status_default: String,
}

impl Default for FieldDictionary {
    fn default() -> Self {
        Self::standard()
    }
}

impl FieldDictionary {
    /// Dictionary covering every header the four sheets are known to emit.
    pub fn standard() -> Self {
        Self {
            headers: STANDARD_HEADERS
                .iter()
                .map(|(header, field)| (header.to_string(), field.to_string()))
                .collect(),
            numeric: NUMERIC_FIELDS.iter().map(|field| field.to_string()).collect(),
            parts: PART_FIELDS.iter().map(|field| field.to_string()).collect(),
            status_field: STATUS_FIELD.to_string(),
            status_default: STATUS_DEFAULT.to_string(),
        }
    }

    /// Adds or overrides a header mapping.
    pub fn with_header(mut self, header: impl Into<String>, field: impl Into<FieldId>) -> Self {
        self.headers.insert(header.into(), field.into());
        self
    }

    /// Marks an additional field id as numeric.
    pub fn with_numeric_field(mut self, field: impl Into<FieldId>) -> Self {
        self.numeric.insert(field.into());
        self
    }

    /// Maps a raw header cell to its field id.
    ///
    /// Returns an empty id for blank headers; callers skip those columns.
    pub fn map_header(&self, header: &str) -> FieldId {
        if header.trim().is_empty() {
            return FieldId::new();
        }
        if let Some(field) = self
            .headers
            .get(header)
            .or_else(|| self.headers.get(header.trim()))
        {
            return field.clone();
        }
        derive_field_id(header)
    }

    /// Header label that maps onto `field`, used when writing tables back out.
    /// Picks the lexicographically smallest label when several map to it.
    pub fn header_for(&self, field: &str) -> Option<&str> {
        self.headers
            .iter()
            .filter(|(_, mapped)| mapped.as_str() == field)
            .map(|(header, _)| header.as_str())
            .min()
    }

    /// Header to write for `field` so that [`FieldDictionary::map_header`]
    /// reads it back as the same id. Unknown camelCase ids are split into
    /// words (`warrantyYears` → `Warranty Years`); ids that cannot be
    /// reproduced that way are written as-is.
    pub fn export_header(&self, field: &str) -> String {
        if let Some(header) = self.header_for(field) {
            return header.to_string();
        }
        let words = split_camel_case(field);
        if self.map_header(&words) == field {
            words
        } else {
            field.to_string()
        }
    }

    pub fn is_numeric(&self, field: &str) -> bool {
        self.numeric.contains(field)
    }

    pub fn is_part(&self, field: &str) -> bool {
        self.parts.contains(field)
    }

    /// Turns one raw cell into the typed value stored under `field`.
    pub fn coerce(&self, field: &str, raw: &str) -> FieldValue {
        if self.is_numeric(field) {
            return FieldValue::Number(parse_leading_decimal(raw).unwrap_or(0.0));
        }
        if field == self.status_field && raw.trim().is_empty() {
            return FieldValue::Text(self.status_default.clone());
        }
        FieldValue::Text(raw.to_string())
    }

    /// Part name contributed by a `partN` cell, if any.
    pub fn part_name<'a>(&self, field: &str, raw: &'a str) -> Option<&'a str> {
        if !self.is_part(field) {
            return None;
        }
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == PART_PLACEHOLDER {
            None
        } else {
            Some(raw)
        }
    }
}

/// Fallback id for headers missing from the dictionary: lower-case, keep
/// ASCII letters and digits, upper-case the first kept character after
/// whitespace.
pub fn derive_field_id(header: &str) -> FieldId {
    let mut field = String::with_capacity(header.len());
    let mut after_space = false;
    for ch in header.to_lowercase().chars() {
        if ch.is_whitespace() {
            after_space = true;
            continue;
        }
        if !ch.is_ascii_alphanumeric() {
            continue;
        }
        if after_space && !field.is_empty() {
            field.push(ch.to_ascii_uppercase());
        } else {
            field.push(ch);
        }
        after_space = false;
    }
    field
}

fn split_camel_case(field: &str) -> String {
    let mut words = String::with_capacity(field.len() + 4);
    for ch in field.chars() {
        if words.is_empty() {
            words.extend(ch.to_uppercase());
            continue;
        }
        if ch.is_uppercase() {
            words.push(' ');
        }
        words.push(ch);
    }
    words
}

/// Reads the longest decimal prefix of `raw`, the way spreadsheet front-ends
/// read typed-in numbers: `"12.5kg"` is 12.5, `"1,200"` is 1, `"abc"` is
/// `None`. Non-finite results are rejected.
pub fn parse_leading_decimal(raw: &str) -> Option<f64> {
    let text = raw.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    text[..end]
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}
