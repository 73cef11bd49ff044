use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier for parts in the inventory service
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PartId(pub i64);

impl PartId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for PartId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Part master data snapshot for one calculation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartMeta {
    /// Part ID (primary key in the inventory service)
    pub id: PartId,

    /// Part name
    pub name: String,

    /// Whether the part has a BOM and is produced in-house (組裝件)
    pub is_assembly: bool,

    /// Template parts are schematic entries; concrete variants descend from them
    pub is_template: bool,

    /// Quantity physically on hand
    pub in_stock: Decimal,

    /// Stock held by the template's variants
    /// Pools into the template's availability only under BOM line rules
    pub variant_stock: Decimal,
}

/// One line of a parent's BOM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomLine {
    /// Parent assembly ID
    pub parent_id: PartId,

    /// Child part ID
    pub sub_part_id: PartId,

    /// Quantity of the sub part per unit of the parent (基礎用量)
    pub quantity_per: Decimal,

    /// Whether variant stock may substitute for a template sub part on this line
    pub allow_variants: bool,
}

/// User-requested build of a top-level assembly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demand {
    /// Root assembly ID
    pub root_id: PartId,

    /// Quantity to build
    pub quantity: Decimal,
}

impl Demand {
    pub fn new(root_id: PartId, quantity: Decimal) -> Self {
        Self { root_id, quantity }
    }
}

/// Open order quantities for one part, summed over non-terminal statuses
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenOrders {
    /// Ordered from suppliers but not yet received
    pub purchase_open: Decimal,

    /// Being manufactured but not yet completed
    pub build_in_progress: Decimal,
}

/// A short part listing entry, used to bound the selection of demand roots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartSummary {
    pub id: PartId,
    pub name: String,
}

/// Purchase recommendation row for a base component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Part ID
    pub part_id: PartId,

    /// Part name
    pub name: String,

    /// Net quantity this run demands (after sub-assembly stock netting)
    pub required: Decimal,

    /// In-stock quantity, pooled variants included, minus committed demand
    pub available: Decimal,

    /// Quantity already on open purchase orders
    pub on_order: Decimal,

    /// Quantity that must be purchased
    pub to_order: Decimal,

    /// First root assembly whose traversal demanded this part
    pub root_id: PartId,

    /// Name of that root assembly
    pub root_name: String,
}

/// Manufacturing recommendation row for an intermediate sub-assembly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildLine {
    /// Part ID
    pub part_id: PartId,

    /// Part name
    pub name: String,

    /// Gross quantity demanded across all roots, ignoring stock
    pub total_needed: Decimal,

    /// Quantity physically on hand
    pub in_stock: Decimal,

    /// Quantity on open build orders
    pub in_progress: Decimal,

    /// In-stock quantity, pooled variants included, minus committed demand
    pub available: Decimal,

    /// Quantity that must be manufactured
    pub to_build: Decimal,
}

/// Non-fatal observation collected during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub message: String,
    pub part_id: Option<PartId>,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            part_id: None,
        }
    }

    pub fn for_part(part_id: PartId, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            part_id: Some(part_id),
        }
    }
}

/// Output of one calculation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeResult {
    /// Base components that must be purchased, sorted by name
    pub order_lines: Vec<OrderLine>,

    /// Sub-assemblies that must be manufactured, sorted by name
    pub build_lines: Vec<BuildLine>,

    /// Non-fatal warnings gathered along the way
    pub diagnostics: Vec<Diagnostic>,

    /// Run ID for log correlation
    pub run_id: Uuid,

    /// Calculation timestamp
    pub calculated_at: DateTime<Utc>,
}

/// Display filters applied after order/build decisions are made
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Filters {
    /// Parts carrying any of these supplier names are omitted from output
    pub exclude_suppliers: BTreeSet<String>,

    /// Parts carrying any of these manufacturer names are omitted from output
    pub exclude_manufacturers: BTreeSet<String>,
}

impl Filters {
    pub fn is_empty(&self) -> bool {
        self.exclude_suppliers.is_empty() && self.exclude_manufacturers.is_empty()
    }
}

/// Tuning knobs for one calculation run
#[derive(Debug, Clone, Default)]
pub struct CalcOptions {
    /// Display filters
    pub filters: Filters,

    /// Count in-progress builds toward assembly availability in the net pass
    /// Off by default; in-progress quantity is still a display column
    pub count_in_progress: bool,

    /// Overall run deadline
    pub timeout: Option<Duration>,
}
