mod common;

use std::collections::BTreeSet;

use asset_sync::mapping::FieldDictionary;
use asset_sync::snapshot::{
    build_products, build_records, build_relation_index, build_snapshot, index_records,
};
use asset_sync::{FieldValue, Record};
use common::{products_table, repairs_table, table, table_set};

#[test]
fn products_get_positional_ids_and_coerced_fields() {
    let dictionary = FieldDictionary::standard();
    let products = build_products(&dictionary, &products_table());

    assert_eq!(products.len(), 3);
    let laptop = &products[0];
    assert_eq!((laptop.id, laptop.row_index), (1, 2));
    assert_eq!(laptop.sn(), "SN-001");
    assert_eq!(laptop.record.get("cost"), Some(&FieldValue::Number(1200.0)));
    assert_eq!(laptop.record.text("status"), "Active");
    assert_eq!(laptop.record.text("part2"), "-");
    assert_eq!(laptop.part_names, vec!["Battery".to_string()]);

    let printer = &products[1];
    assert_eq!(printer.record.number("cost"), 0.0);
    assert_eq!(printer.record.text("status"), "Retired");
    assert!(printer.part_names.is_empty());

    assert_eq!(products[2].part_names, vec!["Antenna", "PSU"]);
}

#[test]
fn record_fields_come_only_from_the_header_row() {
    let dictionary = FieldDictionary::standard();
    let raw = table(
        &["Serial No", "", "Custom Field", "Cost"],
        &[&["SN-1", "ignored", "x", "5", "overflow"], &["SN-2"]],
    );

    let allowed: BTreeSet<String> = raw
        .header
        .iter()
        .map(|header| dictionary.map_header(header))
        .filter(|field| !field.is_empty())
        .collect();

    for record in build_records(&dictionary, &raw) {
        let fields: BTreeSet<String> = record.fields.keys().cloned().collect();
        assert_eq!(fields, allowed);

        let json = serde_json::to_value(&record).expect("record serialised");
        let keys: BTreeSet<String> = json
            .as_object()
            .expect("record is a JSON object")
            .keys()
            .cloned()
            .collect();
        assert_eq!(keys, allowed);
    }

    let products = build_products(&dictionary, &raw);
    assert_eq!(products[1].record.text("customField"), "");
    assert_eq!(products[1].record.number("cost"), 0.0);
}

#[test]
fn reserved_columns_do_not_clobber_synthetic_fields() {
    let dictionary = FieldDictionary::standard();
    let raw = table(&["ID", "Serial No", "Part Names"], &[&["77", "SN-1", "a,b"]]);

    let products = build_products(&dictionary, &raw);

    assert_eq!(products[0].id, 1);
    assert!(products[0].record.get("id").is_none());
    assert!(products[0].record.get("partNames").is_none());
}

#[test]
fn blank_and_echoed_product_rows_are_skipped_without_renumbering() {
    let dictionary = FieldDictionary::standard();
    let raw = table(
        &["Serial No", "Product Name"],
        &[
            &["SN-1", "First"],
            &["", "  "],
            &["Serial No", "Product Name"],
            &["SN-4", "Fourth"],
        ],
    );

    let products = build_products(&dictionary, &raw);

    let ids: Vec<u64> = products.iter().map(|product| product.id).collect();
    assert_eq!(ids, vec![1, 4]);
    assert_eq!(products[1].row_index, 5);
}

#[test]
fn duplicate_serial_numbers_keep_the_first_row() {
    let dictionary = FieldDictionary::standard();
    let raw = table(
        &["Serial No", "Product Name"],
        &[
            &["SN-1", "Original"],
            &["", "No serial"],
            &["SN-1", "Duplicate"],
            &["", "Also no serial"],
        ],
    );

    let products = build_products(&dictionary, &raw);

    let names: Vec<&str> = products
        .iter()
        .map(|product| product.record.text("productName"))
        .collect();
    assert_eq!(names, vec!["Original", "No serial", "Also no serial"]);
}

#[test]
fn relation_rows_with_blank_or_echoed_keys_are_dropped() {
    let dictionary = FieldDictionary::standard();
    let index = build_relation_index(&dictionary, &repairs_table());

    let keys: Vec<&str> = index.keys().collect();
    assert_eq!(keys, vec!["SN-001", "SN-999"]);
    assert!(index.get("Product SN").is_empty());
    assert!(index.get("").is_empty());

    let dates: Vec<&str> = index
        .get("SN-001")
        .iter()
        .map(|repair| repair.text("repairDate"))
        .collect();
    assert_eq!(dates, vec!["2024-01-10", "2024-03-05"]);
    assert_eq!(index.get("SN-001")[1].number("repairCost"), 1200.0);
}

#[test]
fn relation_key_column_is_found_by_header_not_position() {
    let dictionary = FieldDictionary::standard();
    let raw = table(
        &["Timestamp", "Product SN", "Spec Name", "Spec Value"],
        &[
            &["2024-01-01", "SN-1", "RAM", "8GB"],
            &["2024-01-02", "Product SN", "Spec Name", "Spec Value"],
            &["2024-01-03", " ", "Disk", "1TB"],
        ],
    );

    let index = build_relation_index(&dictionary, &raw);

    assert_eq!(index.len(), 1);
    assert_eq!(index.record_count(), 1);
    assert_eq!(index.get("SN-1")[0].text("specValue"), "8GB");
}

#[test]
fn relation_tables_without_a_product_sn_header_key_on_the_first_column() {
    let dictionary = FieldDictionary::standard();
    let raw = table(&["Asset", "Note"], &[&["SN-1", "a"], &["Asset", "b"], &["SN-1", "c"]]);

    let index = build_relation_index(&dictionary, &raw);

    let notes: Vec<&str> = index.get("SN-1").iter().map(|record| record.text("note")).collect();
    assert_eq!(notes, vec!["a", "c"]);
}

#[test]
fn index_records_skips_blank_keys_and_keeps_order() {
    let mut first = Record::default();
    first.insert("productSn", FieldValue::Text("A".into()));
    first.insert("n", FieldValue::Number(1.0));
    let mut blank = Record::default();
    blank.insert("productSn", FieldValue::Text("  ".into()));
    let mut numeric_key = Record::default();
    numeric_key.insert("productSn", FieldValue::Number(4.0));
    let mut second = Record::default();
    second.insert("productSn", FieldValue::Text("A".into()));
    second.insert("n", FieldValue::Number(2.0));

    let index = index_records(vec![first, blank, numeric_key, second], "productSn");

    assert_eq!(index.len(), 1);
    let order: Vec<f64> = index.get("A").iter().map(|record| record.number("n")).collect();
    assert_eq!(order, vec![1.0, 2.0]);
}

#[test]
fn empty_tables_build_an_empty_snapshot() {
    let dictionary = FieldDictionary::standard();
    let snapshot = build_snapshot(&dictionary, &Default::default());

    assert!(snapshot.is_empty());
}

#[test]
fn snapshot_queries_join_by_serial_number() {
    let dictionary = FieldDictionary::standard();
    let snapshot = build_snapshot(&dictionary, &table_set());

    assert_eq!(snapshot.repairs_by_sn("SN-001").len(), 2);
    assert_eq!(snapshot.maintenance_by_sn("SN-003").len(), 1);
    assert_eq!(snapshot.specs_by_sn("SN-001").len(), 2);
    assert!(snapshot.repairs_by_sn("SN-002").is_empty());
    // orphan repair rows stay queryable
    assert_eq!(snapshot.repairs_by_sn("SN-999").len(), 1);

    assert_eq!(snapshot.find_product("2").map(|product| product.sn()), Some("SN-002"));
    assert_eq!(snapshot.find_product("SN-003").map(|product| product.id), Some(3));
    assert!(snapshot.find_product(" ").is_none());

    let hq: Vec<&str> = snapshot
        .search_products("hq")
        .into_iter()
        .map(|product| product.sn())
        .collect();
    assert_eq!(hq, vec!["SN-001", "SN-003"]);
    assert_eq!(snapshot.search_products("").len(), 3);
    assert!(snapshot.search_products("nothing matches").is_empty());
}

#[test]
fn cached_json_keeps_the_flat_record_shape() {
    let dictionary = FieldDictionary::standard();
    let snapshot = build_snapshot(&dictionary, &table_set());

    let json = serde_json::to_value(&snapshot.products[0]).expect("product serialised");
    assert_eq!(json["id"], 1);
    assert_eq!(json["rowIndex"], 2);
    assert_eq!(json["sn"], "SN-001");
    assert_eq!(json["cost"], 1200.0);
    assert_eq!(json["partNames"], serde_json::json!(["Battery"]));

    let restored: asset_sync::Product = serde_json::from_value(json).expect("product restored");
    assert_eq!(restored, snapshot.products[0]);

    let specs = serde_json::to_value(&snapshot.specs).expect("specs serialised");
    let ram = &specs["SN-001"][0];
    assert_eq!(ram["productSn"], "SN-001");
    assert!(ram.get("partNames").is_none());
    let repairs = serde_json::to_string(&snapshot.repairs).expect("repairs serialised");
    assert!(!repairs.contains("partNames"));
}

#[test]
fn products_without_part_columns_still_carry_empty_part_names() {
    let dictionary = FieldDictionary::standard();
    let products = build_products(&dictionary, &table(&["Serial No"], &[&["SN-1"]]));

    let json = serde_json::to_value(&products[0]).expect("product serialised");
    assert_eq!(json["partNames"], serde_json::json!([]));
}
