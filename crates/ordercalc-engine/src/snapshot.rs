use ordercalc_core::{BomLine, CalcError, OpenOrders, PartId, PartMeta, Result};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Immutable part facts gathered for one calculation run
pub struct RunSnapshot {
    parts: HashMap<PartId, PartMeta>,
    bom: HashMap<PartId, Arc<Vec<BomLine>>>,
    required: HashMap<PartId, Decimal>,
    open_orders: HashMap<PartId, OpenOrders>,
    suppliers: HashMap<PartId, BTreeSet<String>>,
    manufacturers: HashMap<PartId, String>,

    /// Templates demanded by at least one variant-restricted BOM line.
    /// A single restrictive consumer disables pooling for the whole run.
    template_only: HashSet<PartId>,
}

impl RunSnapshot {
    pub fn new(
        parts: HashMap<PartId, PartMeta>,
        bom: HashMap<PartId, Arc<Vec<BomLine>>>,
    ) -> Result<Self> {
        let mut template_only = HashSet::new();
        for lines in bom.values() {
            for line in lines.iter() {
                if line.quantity_per <= Decimal::ZERO {
                    return Err(CalcError::InvalidQuantity(format!(
                        "BOM line {} -> {} has non-positive quantity {}",
                        line.parent_id, line.sub_part_id, line.quantity_per
                    )));
                }
                if !line.allow_variants {
                    if let Some(sub) = parts.get(&line.sub_part_id) {
                        if sub.is_template {
                            template_only.insert(line.sub_part_id);
                        }
                    }
                }
            }
        }

        Ok(Self {
            parts,
            bom,
            required: HashMap::new(),
            open_orders: HashMap::new(),
            suppliers: HashMap::new(),
            manufacturers: HashMap::new(),
            template_only,
        })
    }

    /// Attach the bulk-fetched committed quantities and open orders
    pub fn attach_facts(
        &mut self,
        required: HashMap<PartId, Decimal>,
        open_orders: HashMap<PartId, OpenOrders>,
    ) -> Result<()> {
        for (id, quantity) in &required {
            if *quantity < Decimal::ZERO {
                return Err(CalcError::InvalidQuantity(format!(
                    "committed quantity for part {} is negative: {}",
                    id, quantity
                )));
            }
        }
        self.required = required;
        self.open_orders = open_orders;
        Ok(())
    }

    /// Attach the display-only supplier and manufacturer names
    pub fn attach_names(
        &mut self,
        suppliers: HashMap<PartId, BTreeSet<String>>,
        manufacturers: HashMap<PartId, String>,
    ) {
        self.suppliers = suppliers;
        self.manufacturers = manufacturers;
    }

    pub fn part(&self, id: PartId) -> Result<&PartMeta> {
        self.parts.get(&id).ok_or(CalcError::PartNotFound(id))
    }

    pub fn parts(&self) -> impl Iterator<Item = (&PartId, &PartMeta)> {
        self.parts.iter()
    }

    /// Every part id touched by the run, ascending
    pub fn part_ids(&self) -> Vec<PartId> {
        let mut ids: Vec<PartId> = self.parts.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Absent parent means no BOM
    pub fn bom_lines(&self, id: PartId) -> &[BomLine] {
        self.bom
            .get(&id)
            .map(|lines| lines.as_slice())
            .unwrap_or(&[])
    }

    /// Absent means zero
    pub fn external_required(&self, id: PartId) -> Decimal {
        self.required.get(&id).copied().unwrap_or(Decimal::ZERO)
    }

    /// Absent means no open orders
    pub fn open_orders(&self, id: PartId) -> OpenOrders {
        self.open_orders.get(&id).copied().unwrap_or_default()
    }

    /// Variant stock counts only for templates no line restricted
    pub fn pooled_variant_stock(&self, meta: &PartMeta) -> Decimal {
        if meta.is_template && !self.template_only.contains(&meta.id) {
            meta.variant_stock
        } else {
            Decimal::ZERO
        }
    }

    /// In-stock plus pooled variants minus externally committed demand
    pub fn available(&self, meta: &PartMeta) -> Decimal {
        meta.in_stock + self.pooled_variant_stock(meta) - self.external_required(meta.id)
    }

    pub fn supplier_names(&self, id: PartId) -> Option<&BTreeSet<String>> {
        self.suppliers.get(&id)
    }

    pub fn manufacturer_name(&self, id: PartId) -> Option<&str> {
        self.manufacturers.get(&id).map(String::as_str)
    }
}

/// Mutable pass-2 view of consumable sub-assembly stock
///
/// Quantity consumed at one demand site is gone before the next site looks;
/// this greedy deduction is what makes shared sub-assemblies correct.
pub struct StockView {
    remaining: HashMap<PartId, Decimal>,
}

impl StockView {
    /// Seed remaining availability for every assembly in the snapshot
    pub fn build(snapshot: &RunSnapshot, count_in_progress: bool) -> Self {
        let mut remaining = HashMap::new();
        for (id, meta) in snapshot.parts() {
            if !meta.is_assembly {
                continue;
            }
            let mut available = snapshot.available(meta);
            if count_in_progress {
                available += snapshot.open_orders(*id).build_in_progress;
            }
            remaining.insert(*id, available.max(Decimal::ZERO));
        }
        Self { remaining }
    }

    /// Greedily consume up to `need`, returning what was actually taken
    pub fn consume(&mut self, id: PartId, need: Decimal) -> Decimal {
        match self.remaining.get_mut(&id) {
            Some(remaining) => {
                let taken = need.min(*remaining);
                *remaining -= taken;
                taken
            }
            None => Decimal::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn part(id: i64, assembly: bool) -> PartMeta {
        PartMeta {
            id: PartId(id),
            name: format!("Part {}", id),
            is_assembly: assembly,
            is_template: false,
            in_stock: Decimal::ZERO,
            variant_stock: Decimal::ZERO,
        }
    }

    fn template(id: i64, in_stock: Decimal, variant_stock: Decimal) -> PartMeta {
        PartMeta {
            id: PartId(id),
            name: format!("Template {}", id),
            is_assembly: false,
            is_template: true,
            in_stock,
            variant_stock,
        }
    }

    fn line(parent: i64, sub: i64, quantity: Decimal, allow_variants: bool) -> BomLine {
        BomLine {
            parent_id: PartId(parent),
            sub_part_id: PartId(sub),
            quantity_per: quantity,
            allow_variants,
        }
    }

    fn snapshot_of(parts: Vec<PartMeta>, lines: Vec<BomLine>) -> RunSnapshot {
        let parts: HashMap<PartId, PartMeta> = parts.into_iter().map(|p| (p.id, p)).collect();
        let mut bom: HashMap<PartId, Vec<BomLine>> = HashMap::new();
        for line in lines {
            bom.entry(line.parent_id).or_default().push(line);
        }
        let bom = bom.into_iter().map(|(k, v)| (k, Arc::new(v))).collect();
        RunSnapshot::new(parts, bom).unwrap()
    }

    #[test]
    fn test_rejects_non_positive_bom_quantity() {
        let parts: HashMap<PartId, PartMeta> =
            [part(1, true), part(2, false)].map(|p| (p.id, p)).into();
        let bom = [(PartId(1), Arc::new(vec![line(1, 2, dec!(0), true)]))]
            .into_iter()
            .collect();

        let result = RunSnapshot::new(parts, bom);
        assert!(matches!(result, Err(CalcError::InvalidQuantity(_))));
    }

    #[test]
    fn test_rejects_negative_committed_quantity() {
        let mut snapshot = snapshot_of(vec![part(1, true)], vec![]);
        let result = snapshot.attach_facts(
            [(PartId(1), dec!(-1))].into_iter().collect(),
            HashMap::new(),
        );
        assert!(matches!(result, Err(CalcError::InvalidQuantity(_))));
    }

    #[test]
    fn test_variant_stock_pools_when_all_lines_allow() {
        let snapshot = snapshot_of(
            vec![part(1, true), template(10, dec!(3), dec!(7))],
            vec![line(1, 10, dec!(1), true)],
        );
        let meta = snapshot.part(PartId(10)).unwrap();
        assert_eq!(snapshot.pooled_variant_stock(meta), dec!(7));
        assert_eq!(snapshot.available(meta), dec!(10));
    }

    #[test]
    fn test_single_restrictive_line_disables_pooling() {
        let snapshot = snapshot_of(
            vec![part(1, true), part(2, true), template(10, dec!(3), dec!(7))],
            vec![line(1, 10, dec!(1), true), line(2, 10, dec!(1), false)],
        );
        let meta = snapshot.part(PartId(10)).unwrap();
        assert_eq!(snapshot.pooled_variant_stock(meta), Decimal::ZERO);
        assert_eq!(snapshot.available(meta), dec!(3));
    }

    #[test]
    fn test_available_subtracts_committed_demand() {
        let mut snapshot = snapshot_of(
            vec![PartMeta {
                in_stock: dec!(10),
                ..part(1, false)
            }],
            vec![],
        );
        snapshot
            .attach_facts([(PartId(1), dec!(4))].into_iter().collect(), HashMap::new())
            .unwrap();
        let meta = snapshot.part(PartId(1)).unwrap();
        assert_eq!(snapshot.available(meta), dec!(6));
    }

    #[test]
    fn test_stock_view_consumes_greedily() {
        let snapshot = snapshot_of(
            vec![PartMeta {
                in_stock: dec!(5),
                ..part(1, true)
            }],
            vec![],
        );
        let mut stock = StockView::build(&snapshot, false);

        assert_eq!(stock.consume(PartId(1), dec!(3)), dec!(3));
        assert_eq!(stock.consume(PartId(1), dec!(4)), dec!(2));
        assert_eq!(stock.consume(PartId(1), dec!(1)), Decimal::ZERO);
    }

    #[test]
    fn test_stock_view_clamps_negative_availability() {
        let mut snapshot = snapshot_of(
            vec![PartMeta {
                in_stock: dec!(2),
                ..part(1, true)
            }],
            vec![],
        );
        snapshot
            .attach_facts([(PartId(1), dec!(9))].into_iter().collect(), HashMap::new())
            .unwrap();
        let mut stock = StockView::build(&snapshot, false);

        assert_eq!(stock.consume(PartId(1), dec!(1)), Decimal::ZERO);
    }

    #[test]
    fn test_stock_view_can_count_builds_in_progress() {
        let mut snapshot = snapshot_of(
            vec![PartMeta {
                in_stock: dec!(1),
                ..part(1, true)
            }],
            vec![],
        );
        snapshot
            .attach_facts(
                HashMap::new(),
                [(
                    PartId(1),
                    OpenOrders {
                        purchase_open: Decimal::ZERO,
                        build_in_progress: dec!(4),
                    },
                )]
                .into_iter()
                .collect(),
            )
            .unwrap();

        let mut without = StockView::build(&snapshot, false);
        assert_eq!(without.consume(PartId(1), dec!(10)), dec!(1));

        let mut with = StockView::build(&snapshot, true);
        assert_eq!(with.consume(PartId(1), dec!(10)), dec!(5));
    }
}
