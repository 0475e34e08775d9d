use crate::model::{
    MaintenanceRecord, Product, RepairRecord, RepairSummary, SpecEntry, SyncSnapshot,
};
use crate::summary;

/// Product fields matched by [`SyncSnapshot::search_products`].
const SEARCHABLE_FIELDS: &[&str] = &[
    "productName",
    "sn",
    "category",
    "brand",
    "model",
    "location",
    "department",
];

impl SyncSnapshot {
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn repairs_by_sn(&self, sn: &str) -> &[RepairRecord] {
        self.repairs.get(sn)
    }

    pub fn maintenance_by_sn(&self, sn: &str) -> &[MaintenanceRecord] {
        self.maintenance.get(sn)
    }

    pub fn specs_by_sn(&self, sn: &str) -> &[SpecEntry] {
        self.specs.get(sn)
    }

    pub fn repair_summary(&self, sn: &str) -> RepairSummary {
        summary::summarize(self.repairs_by_sn(sn))
    }

    /// Repairs of `sn`, most recent first.
    pub fn repairs_newest_first(&self, sn: &str) -> Vec<&RepairRecord> {
        summary::newest_first(self.repairs_by_sn(sn))
    }

    /// Looks a product up by its synthetic id or its serial number.
    pub fn find_product(&self, id_or_sn: &str) -> Option<&Product> {
        let needle = id_or_sn.trim();
        if needle.is_empty() {
            return None;
        }
        self.products
            .iter()
            .find(|product| product.id.to_string() == needle || product.sn() == needle)
    }

    /// Case-insensitive substring search over the descriptive product fields.
    /// A blank term matches everything.
    pub fn search_products(&self, term: &str) -> Vec<&Product> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return self.products.iter().collect();
        }
        self.products
            .iter()
            .filter(|product| {
                SEARCHABLE_FIELDS
                    .iter()
                    .any(|field| product.record.text(field).to_lowercase().contains(&term))
            })
            .collect()
    }
}
