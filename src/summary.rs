use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::model::{Record, RepairSummary};

const REPAIR_DATE: &str = "repairDate";
const CREATED_DATE: &str = "createdDate";
const REPAIR_COST: &str = "repairCost";
const PART_CHANGED: &str = "partChanged";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d %b %Y", "%b %d, %Y"];

/// Text of the date a repair is ordered by: the repair date, else the date
/// the row was logged.
pub fn effective_date_text(record: &Record) -> Option<&str> {
    [REPAIR_DATE, CREATED_DATE]
        .into_iter()
        .map(|field| record.text(field))
        .find(|value| !value.trim().is_empty())
}

/// Parses the date formats the sheets are known to emit. `None` sorts after
/// every real date.
pub fn parse_sheet_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn sort_key(record: &Record) -> Option<NaiveDateTime> {
    effective_date_text(record).and_then(parse_sheet_date)
}

/// Repairs ordered most recent first. Records with equal or unparseable
/// dates keep their relative order; unparseable ones come last.
pub fn newest_first(records: &[Record]) -> Vec<&Record> {
    let mut keyed: Vec<(Option<NaiveDateTime>, &Record)> =
        records.iter().map(|record| (sort_key(record), record)).collect();
    keyed.sort_by(|lhs, rhs| rhs.0.cmp(&lhs.0));
    keyed.into_iter().map(|(_, record)| record).collect()
}

/// Summary statistics over one product's repairs.
pub fn summarize(records: &[Record]) -> RepairSummary {
    let Some(latest) = newest_first(records).into_iter().next() else {
        return RepairSummary::default();
    };

    let part_changed = latest.text(PART_CHANGED);
    RepairSummary {
        repair_count: records.len(),
        total_repair_cost: records.iter().map(|record| record.number(REPAIR_COST)).sum(),
        last_repair_date: effective_date_text(latest).map(str::to_string),
        last_repair_cost: latest.number(REPAIR_COST),
        part_changed: if part_changed.trim().is_empty() {
            "No".to_string()
        } else {
            part_changed.to_string()
        },
    }
}
