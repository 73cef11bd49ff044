//! # OrderCalc API
//!
//! Read-only data access over the remote inventory service: the
//! [`InventoryApi`] capability trait, its HTTP implementation, and the
//! per-run memoizing [`Dal`] facade.

pub mod client;
pub mod config;
pub mod dal;
pub mod retry;

pub use client::*;
pub use config::*;
pub use dal::*;
pub use retry::*;

use async_trait::async_trait;
use ordercalc_core::{BomLine, PartId, PartMeta, PartSummary, Result};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};

/// Read-only view of the inventory service
///
/// Implementations must be shareable across concurrent fetches; every
/// operation maps one-to-one onto a service endpoint.
#[async_trait]
pub trait InventoryApi: Send + Sync {
    /// Look up one part; `Ok(None)` when the service has no such part
    async fn part(&self, id: PartId) -> Result<Option<PartMeta>>;

    /// BOM lines of a parent; empty for parts without a BOM, never an error
    async fn bom_lines(&self, parent_id: PartId) -> Result<Vec<BomLine>>;

    /// Quantity of a part already committed to other consumers
    async fn part_requirements(&self, id: PartId) -> Result<Decimal>;

    /// Remaining quantity on open purchase orders, per part
    async fn open_purchase_orders(&self, ids: &[PartId]) -> Result<HashMap<PartId, Decimal>>;

    /// Remaining quantity on open build orders, per part
    async fn open_build_orders(&self, ids: &[PartId]) -> Result<HashMap<PartId, Decimal>>;

    /// Supplier names per part, used only for display filtering
    async fn supplier_names(&self, ids: &[PartId]) -> Result<HashMap<PartId, BTreeSet<String>>>;

    /// Manufacturer name per part, used only for display filtering
    async fn manufacturer_names(&self, ids: &[PartId]) -> Result<HashMap<PartId, String>>;

    /// Assemblies in a category, bounding the choice of demand roots
    async fn assemblies_in_category(&self, category: i64) -> Result<Vec<PartSummary>>;
}

/// In-memory inventory for testing and simple use cases
pub mod memory {
    use super::*;
    use std::sync::RwLock;

    #[derive(Default)]
    pub struct InMemoryInventory {
        parts: RwLock<HashMap<PartId, PartMeta>>,
        bom: RwLock<HashMap<PartId, Vec<BomLine>>>,
        required: RwLock<HashMap<PartId, Decimal>>,
        purchase_open: RwLock<HashMap<PartId, Decimal>>,
        build_in_progress: RwLock<HashMap<PartId, Decimal>>,
        suppliers: RwLock<HashMap<PartId, BTreeSet<String>>>,
        manufacturers: RwLock<HashMap<PartId, String>>,
    }

    impl InMemoryInventory {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_part(&self, part: PartMeta) {
            let mut parts = self.parts.write().unwrap();
            parts.insert(part.id, part);
        }

        pub fn add_bom_line(&self, line: BomLine) {
            let mut bom = self.bom.write().unwrap();
            bom.entry(line.parent_id).or_insert_with(Vec::new).push(line);
        }

        pub fn set_required(&self, id: PartId, quantity: Decimal) {
            let mut required = self.required.write().unwrap();
            required.insert(id, quantity);
        }

        pub fn add_purchase_open(&self, id: PartId, quantity: Decimal) {
            let mut open = self.purchase_open.write().unwrap();
            *open.entry(id).or_insert(Decimal::ZERO) += quantity;
        }

        pub fn add_build_in_progress(&self, id: PartId, quantity: Decimal) {
            let mut open = self.build_in_progress.write().unwrap();
            *open.entry(id).or_insert(Decimal::ZERO) += quantity;
        }

        pub fn add_supplier(&self, id: PartId, name: impl Into<String>) {
            let mut suppliers = self.suppliers.write().unwrap();
            suppliers
                .entry(id)
                .or_insert_with(BTreeSet::new)
                .insert(name.into());
        }

        pub fn set_manufacturer(&self, id: PartId, name: impl Into<String>) {
            let mut manufacturers = self.manufacturers.write().unwrap();
            manufacturers.insert(id, name.into());
        }
    }

    #[async_trait]
    impl InventoryApi for InMemoryInventory {
        async fn part(&self, id: PartId) -> Result<Option<PartMeta>> {
            let parts = self.parts.read().unwrap();
            Ok(parts.get(&id).cloned())
        }

        async fn bom_lines(&self, parent_id: PartId) -> Result<Vec<BomLine>> {
            let bom = self.bom.read().unwrap();
            Ok(bom.get(&parent_id).cloned().unwrap_or_default())
        }

        async fn part_requirements(&self, id: PartId) -> Result<Decimal> {
            let required = self.required.read().unwrap();
            Ok(required.get(&id).copied().unwrap_or(Decimal::ZERO))
        }

        async fn open_purchase_orders(&self, ids: &[PartId]) -> Result<HashMap<PartId, Decimal>> {
            let open = self.purchase_open.read().unwrap();
            Ok(ids
                .iter()
                .filter_map(|id| open.get(id).map(|qty| (*id, *qty)))
                .collect())
        }

        async fn open_build_orders(&self, ids: &[PartId]) -> Result<HashMap<PartId, Decimal>> {
            let open = self.build_in_progress.read().unwrap();
            Ok(ids
                .iter()
                .filter_map(|id| open.get(id).map(|qty| (*id, *qty)))
                .collect())
        }

        async fn supplier_names(&self, ids: &[PartId]) -> Result<HashMap<PartId, BTreeSet<String>>> {
            let suppliers = self.suppliers.read().unwrap();
            Ok(ids
                .iter()
                .filter_map(|id| suppliers.get(id).map(|names| (*id, names.clone())))
                .collect())
        }

        async fn manufacturer_names(&self, ids: &[PartId]) -> Result<HashMap<PartId, String>> {
            let manufacturers = self.manufacturers.read().unwrap();
            Ok(ids
                .iter()
                .filter_map(|id| manufacturers.get(id).map(|name| (*id, name.clone())))
                .collect())
        }

        async fn assemblies_in_category(&self, _category: i64) -> Result<Vec<PartSummary>> {
            let parts = self.parts.read().unwrap();
            let mut summaries: Vec<PartSummary> = parts
                .values()
                .filter(|part| part.is_assembly)
                .map(|part| PartSummary {
                    id: part.id,
                    name: part.name.clone(),
                })
                .collect();
            summaries.sort_by_key(|summary| summary.id);
            Ok(summaries)
        }
    }
}
