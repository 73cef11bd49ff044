use crate::snapshot::RunSnapshot;
use crate::traversal::{GrossDemand, NetDemand};
use ordercalc_core::{BuildLine, Filters, OrderLine, PartId, Result};
use rust_decimal::Decimal;
use std::collections::BTreeSet;

/// Quantities at or below this threshold are decimal noise, not demand
pub const EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

/// Final decision rows before presentation
#[derive(Debug, Default)]
pub struct Aggregation {
    pub order_lines: Vec<OrderLine>,
    pub build_lines: Vec<BuildLine>,
}

/// Convert the two traversal outputs into purchase and build decisions
///
/// Base parts order against net demand; assemblies build against gross
/// demand. Filters drop rows after the arithmetic, never before.
pub fn aggregate(
    snapshot: &RunSnapshot,
    gross: &GrossDemand,
    net: &NetDemand,
    filters: &Filters,
) -> Result<Aggregation> {
    let mut order_lines = Vec::new();

    let mut base_ids: BTreeSet<PartId> = gross.base.keys().copied().collect();
    base_ids.extend(net.base.keys().copied());

    for part_id in base_ids {
        let meta = snapshot.part(part_id)?;
        let required = net.base.get(&part_id).copied().unwrap_or(Decimal::ZERO);
        let available = snapshot.available(meta);
        let on_order = snapshot.open_orders(part_id).purchase_open;
        let to_order = (required - available - on_order).max(Decimal::ZERO);

        if to_order <= EPSILON || is_excluded(snapshot, part_id, filters) {
            continue;
        }

        let root_id = gross.first_root.get(&part_id).copied().unwrap_or(part_id);
        let root_name = snapshot.part(root_id)?.name.clone();
        order_lines.push(OrderLine {
            part_id,
            name: meta.name.clone(),
            required,
            available,
            on_order,
            to_order,
            root_id,
            root_name,
        });
    }

    let mut build_lines = Vec::new();
    let assembly_ids: BTreeSet<PartId> = gross.assemblies.keys().copied().collect();

    for part_id in assembly_ids {
        let meta = snapshot.part(part_id)?;
        let total_needed = gross.assemblies[&part_id];
        let open = snapshot.open_orders(part_id);
        let available = snapshot.available(meta);
        let to_build = (total_needed - available - open.build_in_progress).max(Decimal::ZERO);

        if to_build <= EPSILON || is_excluded(snapshot, part_id, filters) {
            continue;
        }

        build_lines.push(BuildLine {
            part_id,
            name: meta.name.clone(),
            total_needed,
            in_stock: meta.in_stock,
            in_progress: open.build_in_progress,
            available,
            to_build,
        });
    }

    order_lines.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then(a.part_id.cmp(&b.part_id))
    });
    build_lines.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then(a.part_id.cmp(&b.part_id))
    });

    Ok(Aggregation {
        order_lines,
        build_lines,
    })
}

fn is_excluded(snapshot: &RunSnapshot, part_id: PartId, filters: &Filters) -> bool {
    if filters.is_empty() {
        return false;
    }
    if let Some(names) = snapshot.supplier_names(part_id) {
        if names
            .iter()
            .any(|name| filters.exclude_suppliers.contains(name))
        {
            return true;
        }
    }
    if let Some(name) = snapshot.manufacturer_name(part_id) {
        if filters.exclude_manufacturers.contains(name) {
            return true;
        }
    }
    false
}
