use crate::snapshot::{RunSnapshot, StockView};
use ordercalc_core::{CalcError, Demand, PartId, Result, RunControl};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Pass-1 output: total demand ignoring all stock
#[derive(Debug, Default)]
pub struct GrossDemand {
    /// Base components, summed across every demand path
    pub base: HashMap<PartId, Decimal>,

    /// Sub-assemblies encountered below the demand roots
    pub assemblies: HashMap<PartId, Decimal>,

    /// First root whose traversal demanded each base part
    pub first_root: HashMap<PartId, PartId>,
}

/// Pass-2 output: demand net of consumable sub-assembly stock
#[derive(Debug, Default)]
pub struct NetDemand {
    /// Residual base-component demand after stock pruning
    pub base: HashMap<PartId, Decimal>,

    /// Residual sub-assembly quantities that must be built
    pub to_build: HashMap<PartId, Decimal>,
}

/// Pass 1: walk every demand root and sum gross contributions
pub fn explode_gross(
    snapshot: &RunSnapshot,
    demands: &[Demand],
    control: &RunControl,
) -> Result<GrossDemand> {
    let mut walker = GrossWalker {
        snapshot,
        control,
        path: Vec::new(),
        gross: GrossDemand::default(),
    };
    for demand in demands {
        walker.walk(demand.root_id, demand.root_id, demand.quantity, true)?;
    }
    Ok(walker.gross)
}

struct GrossWalker<'a> {
    snapshot: &'a RunSnapshot,
    control: &'a RunControl,
    path: Vec<PartId>,
    gross: GrossDemand,
}

impl GrossWalker<'_> {
    fn walk(&mut self, root: PartId, part_id: PartId, multiplier: Decimal, is_root: bool) -> Result<()> {
        self.control.check()?;
        if self.path.contains(&part_id) {
            let mut cycle = self.path.clone();
            cycle.push(part_id);
            return Err(CalcError::CycleDetected(cycle));
        }

        let meta = self.snapshot.part(part_id)?;
        if !meta.is_assembly {
            *self.gross.base.entry(part_id).or_insert(Decimal::ZERO) += multiplier;
            self.gross.first_root.entry(part_id).or_insert(root);
            return Ok(());
        }

        if !is_root {
            *self.gross.assemblies.entry(part_id).or_insert(Decimal::ZERO) += multiplier;
        }

        self.path.push(part_id);
        for line in self.snapshot.bom_lines(part_id) {
            self.walk(root, line.sub_part_id, multiplier * line.quantity_per, false)?;
        }
        self.path.pop();
        Ok(())
    }
}

/// Pass 2: walk every demand root against the consumable stock view
///
/// At each sub-assembly the walk consumes available stock before
/// recursing; only the shortfall flows down to the children.
pub fn explode_net(
    snapshot: &RunSnapshot,
    demands: &[Demand],
    stock: &mut StockView,
    control: &RunControl,
) -> Result<NetDemand> {
    let mut walker = NetWalker {
        snapshot,
        control,
        stock,
        path: Vec::new(),
        net: NetDemand::default(),
    };
    for demand in demands {
        walker.walk(demand.root_id, demand.quantity, true)?;
    }
    Ok(walker.net)
}

struct NetWalker<'a> {
    snapshot: &'a RunSnapshot,
    control: &'a RunControl,
    stock: &'a mut StockView,
    path: Vec<PartId>,
    net: NetDemand,
}

impl NetWalker<'_> {
    fn walk(&mut self, part_id: PartId, multiplier: Decimal, is_root: bool) -> Result<()> {
        self.control.check()?;
        if self.path.contains(&part_id) {
            let mut cycle = self.path.clone();
            cycle.push(part_id);
            return Err(CalcError::CycleDetected(cycle));
        }

        let meta = self.snapshot.part(part_id)?;
        if !meta.is_assembly {
            *self.net.base.entry(part_id).or_insert(Decimal::ZERO) += multiplier;
            return Ok(());
        }

        // Roots are what the caller wants built; their own stock is not netted.
        let residual = if is_root {
            multiplier
        } else {
            let taken = self.stock.consume(part_id, multiplier);
            let residual = multiplier - taken;
            if residual > Decimal::ZERO {
                *self.net.to_build.entry(part_id).or_insert(Decimal::ZERO) += residual;
            }
            residual
        };

        if residual <= Decimal::ZERO {
            // demand fully covered from stock; the subtree is pruned
            return Ok(());
        }

        self.path.push(part_id);
        for line in self.snapshot.bom_lines(part_id) {
            self.walk(line.sub_part_id, residual * line.quantity_per, false)?;
        }
        self.path.pop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordercalc_core::{BomLine, PartMeta};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn part(id: i64, assembly: bool, in_stock: Decimal) -> PartMeta {
        PartMeta {
            id: PartId(id),
            name: format!("Part {}", id),
            is_assembly: assembly,
            is_template: false,
            in_stock,
            variant_stock: Decimal::ZERO,
        }
    }

    fn line(parent: i64, sub: i64, quantity: Decimal) -> BomLine {
        BomLine {
            parent_id: PartId(parent),
            sub_part_id: PartId(sub),
            quantity_per: quantity,
            allow_variants: true,
        }
    }

    fn snapshot_of(parts: Vec<PartMeta>, lines: Vec<BomLine>) -> RunSnapshot {
        let parts: std::collections::HashMap<PartId, PartMeta> =
            parts.into_iter().map(|p| (p.id, p)).collect();
        let mut bom: std::collections::HashMap<PartId, Vec<BomLine>> =
            std::collections::HashMap::new();
        for l in lines {
            bom.entry(l.parent_id).or_default().push(l);
        }
        let bom = bom.into_iter().map(|(k, v)| (k, Arc::new(v))).collect();
        RunSnapshot::new(parts, bom).unwrap()
    }

    #[test]
    fn test_gross_multiplies_down_the_tree() {
        // 100 -> 110 (x2) -> 200 (x4)
        let snapshot = snapshot_of(
            vec![
                part(100, true, dec!(0)),
                part(110, true, dec!(0)),
                part(200, false, dec!(0)),
            ],
            vec![line(100, 110, dec!(2)), line(110, 200, dec!(4))],
        );

        let demands = vec![Demand::new(PartId(100), dec!(3))];
        let gross = explode_gross(&snapshot, &demands, &RunControl::unbounded()).unwrap();

        assert_eq!(gross.base[&PartId(200)], dec!(24));
        assert_eq!(gross.assemblies[&PartId(110)], dec!(6));
        assert!(!gross.assemblies.contains_key(&PartId(100)));
        assert_eq!(gross.first_root[&PartId(200)], PartId(100));
    }

    #[test]
    fn test_gross_sums_shared_subassembly_paths() {
        // 100 -> 110 -> 200 and 100 -> 120 -> 200
        let snapshot = snapshot_of(
            vec![
                part(100, true, dec!(0)),
                part(110, true, dec!(0)),
                part(120, true, dec!(0)),
                part(200, false, dec!(0)),
            ],
            vec![
                line(100, 110, dec!(1)),
                line(100, 120, dec!(1)),
                line(110, 200, dec!(3)),
                line(120, 200, dec!(2)),
            ],
        );

        let demands = vec![Demand::new(PartId(100), dec!(2))];
        let gross = explode_gross(&snapshot, &demands, &RunControl::unbounded()).unwrap();

        assert_eq!(gross.base[&PartId(200)], dec!(10));
    }

    #[test]
    fn test_gross_detects_cycles_with_path() {
        let snapshot = snapshot_of(
            vec![part(100, true, dec!(0)), part(110, true, dec!(0))],
            vec![line(100, 110, dec!(1)), line(110, 100, dec!(1))],
        );

        let demands = vec![Demand::new(PartId(100), dec!(1))];
        let err = explode_gross(&snapshot, &demands, &RunControl::unbounded()).unwrap_err();

        assert_eq!(
            err,
            CalcError::CycleDetected(vec![PartId(100), PartId(110), PartId(100)])
        );
    }

    #[test]
    fn test_net_prunes_fully_stocked_subassembly() {
        // 110 has 10 in stock; demand of 5 never reaches 200
        let snapshot = snapshot_of(
            vec![
                part(100, true, dec!(0)),
                part(110, true, dec!(10)),
                part(200, false, dec!(0)),
            ],
            vec![line(100, 110, dec!(1)), line(110, 200, dec!(4))],
        );

        let demands = vec![Demand::new(PartId(100), dec!(5))];
        let mut stock = StockView::build(&snapshot, false);
        let net = explode_net(&snapshot, &demands, &mut stock, &RunControl::unbounded()).unwrap();

        assert!(net.base.is_empty());
        assert!(net.to_build.is_empty());
    }

    #[test]
    fn test_net_passes_only_the_shortfall_down() {
        let snapshot = snapshot_of(
            vec![
                part(100, true, dec!(0)),
                part(110, true, dec!(10)),
                part(200, false, dec!(0)),
            ],
            vec![line(100, 110, dec!(1)), line(110, 200, dec!(4))],
        );

        let demands = vec![Demand::new(PartId(100), dec!(15))];
        let mut stock = StockView::build(&snapshot, false);
        let net = explode_net(&snapshot, &demands, &mut stock, &RunControl::unbounded()).unwrap();

        assert_eq!(net.to_build[&PartId(110)], dec!(5));
        assert_eq!(net.base[&PartId(200)], dec!(20));
    }

    #[test]
    fn test_net_consumption_is_stateful_across_roots() {
        // both roots demand part 50; the first traversal consumes greedily
        let snapshot = snapshot_of(
            vec![
                part(1, true, dec!(0)),
                part(2, true, dec!(0)),
                part(50, true, dec!(5)),
                part(200, false, dec!(0)),
            ],
            vec![
                line(1, 50, dec!(3)),
                line(2, 50, dec!(4)),
                line(50, 200, dec!(1)),
            ],
        );

        let demands = vec![
            Demand::new(PartId(1), dec!(1)),
            Demand::new(PartId(2), dec!(1)),
        ];
        let mut stock = StockView::build(&snapshot, false);
        let net = explode_net(&snapshot, &demands, &mut stock, &RunControl::unbounded()).unwrap();

        // 3 + 4 demanded, 5 in stock: root 1 fully covered, root 2 short by 2
        assert_eq!(net.to_build[&PartId(50)], dec!(2));
        assert_eq!(net.base[&PartId(200)], dec!(2));
    }

    #[test]
    fn test_net_does_not_consume_root_stock() {
        let snapshot = snapshot_of(
            vec![part(100, true, dec!(50)), part(200, false, dec!(0))],
            vec![line(100, 200, dec!(2))],
        );

        let demands = vec![Demand::new(PartId(100), dec!(3))];
        let mut stock = StockView::build(&snapshot, false);
        let net = explode_net(&snapshot, &demands, &mut stock, &RunControl::unbounded()).unwrap();

        assert_eq!(net.base[&PartId(200)], dec!(6));
    }

    #[test]
    fn test_unknown_sub_part_aborts_the_walk() {
        let snapshot = snapshot_of(
            vec![part(100, true, dec!(0))],
            vec![line(100, 999, dec!(1))],
        );

        let demands = vec![Demand::new(PartId(100), dec!(1))];
        let err = explode_gross(&snapshot, &demands, &RunControl::unbounded()).unwrap_err();

        assert_eq!(err, CalcError::PartNotFound(PartId(999)));
    }
}
