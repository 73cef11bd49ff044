use crate::aggregator::aggregate;
use crate::snapshot::{RunSnapshot, StockView};
use crate::traversal::{explode_gross, explode_net};
use chrono::Utc;
use futures::future::{try_join, try_join_all};
use ordercalc_api::{Dal, InventoryApi};
use ordercalc_core::{
    BomLine, CalcError, CalcOptions, CancelToken, ComputeResult, Demand, Diagnostic, PartId,
    PartMeta, Result, RunControl,
};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Single entry point for requirement calculations
///
/// Owns nothing but the service handle; every call to [`compute`] builds a
/// fresh memoizing DAL, so no state survives between runs.
///
/// [`compute`]: Calculator::compute
pub struct Calculator {
    api: Arc<dyn InventoryApi>,
}

impl Calculator {
    pub fn new(api: Arc<dyn InventoryApi>) -> Self {
        Self { api }
    }

    /// Compute purchase and build requirements for the given demands
    pub async fn compute(&self, demands: &[Demand], options: &CalcOptions) -> Result<ComputeResult> {
        self.compute_with_cancel(demands, options, CancelToken::new())
            .await
    }

    /// Like [`compute`](Calculator::compute), with an external cancel handle
    pub async fn compute_with_cancel(
        &self,
        demands: &[Demand],
        options: &CalcOptions,
        cancel: CancelToken,
    ) -> Result<ComputeResult> {
        let run_id = Uuid::new_v4();
        let started = std::time::Instant::now();
        let control = RunControl::new(options.timeout, cancel);
        let dal = Dal::new(self.api.clone(), control.clone());

        info!(%run_id, demands = demands.len(), "starting requirement calculation");

        if demands.is_empty() {
            return Ok(ComputeResult {
                order_lines: Vec::new(),
                build_lines: Vec::new(),
                diagnostics: Vec::new(),
                run_id,
                calculated_at: Utc::now(),
            });
        }

        // Step 1: validate the demand list
        for demand in demands {
            if demand.quantity <= Decimal::ZERO {
                return Err(CalcError::Validation(format!(
                    "demand for part {} must be positive, got {}",
                    demand.root_id, demand.quantity
                )));
            }
            let meta = dal
                .part_meta(demand.root_id)
                .await?
                .ok_or(CalcError::PartNotFound(demand.root_id))?;
            if !meta.is_assembly {
                return Err(CalcError::Validation(format!(
                    "part {} ({}) is not an assembly",
                    demand.root_id, meta.name
                )));
            }
        }

        // Step 2: prefetch the BOM closure of every root
        let (parts, bom) = prefetch(&dal, demands, &control).await?;
        debug!(parts = parts.len(), "prefetched part graph");
        let mut snapshot = RunSnapshot::new(parts, bom)?;

        // Step 3: pass 1, gross demand ignoring stock
        let gross = explode_gross(&snapshot, demands, &control)?;
        debug!(
            base = gross.base.len(),
            assemblies = gross.assemblies.len(),
            "gross pass complete"
        );

        // Step 4: bulk part facts for everything encountered
        let ids = snapshot.part_ids();
        let (required, open_orders) =
            try_join(dal.external_required(&ids), dal.open_orders(&ids)).await?;
        snapshot.attach_facts(required, open_orders)?;

        let mut diagnostics = Vec::new();
        // name lookups are display-only; failure degrades the filter instead of aborting
        match try_join(dal.supplier_names(&ids), dal.manufacturer_names(&ids)).await {
            Ok((suppliers, manufacturers)) => snapshot.attach_names(suppliers, manufacturers),
            Err(err) => diagnostics.push(Diagnostic::new(format!(
                "supplier lookup failed ({}); exclusion filter may be incomplete",
                err
            ))),
        }

        // Step 5: pass 2, net demand against the consumable stock view
        let mut stock = StockView::build(&snapshot, options.count_in_progress);
        let net = explode_net(&snapshot, demands, &mut stock, &control)?;
        debug!(
            base = net.base.len(),
            shortfalls = net.to_build.len(),
            "net pass complete"
        );

        // Step 6: decisions, filters, ordering
        let aggregation = aggregate(&snapshot, &gross, &net, &options.filters)?;

        let mut empty_boms: Vec<PartId> = snapshot
            .parts()
            .filter(|(id, meta)| meta.is_assembly && snapshot.bom_lines(**id).is_empty())
            .map(|(id, _)| *id)
            .collect();
        empty_boms.sort();
        for id in empty_boms {
            let name = snapshot.part(id)?.name.clone();
            diagnostics.push(Diagnostic::for_part(
                id,
                format!("assembly {} has an empty BOM", name),
            ));
        }

        info!(
            %run_id,
            order_lines = aggregation.order_lines.len(),
            build_lines = aggregation.build_lines.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "calculation complete"
        );

        Ok(ComputeResult {
            order_lines: aggregation.order_lines,
            build_lines: aggregation.build_lines,
            diagnostics,
            run_id,
            calculated_at: Utc::now(),
        })
    }
}

/// Breadth-first closure walk over the part graph
///
/// Sibling lookups fan out concurrently; the DAL memo map collapses
/// repeated ids, so every part and BOM is fetched at most once per run.
async fn prefetch(
    dal: &Dal,
    demands: &[Demand],
    control: &RunControl,
) -> Result<(HashMap<PartId, PartMeta>, HashMap<PartId, Arc<Vec<BomLine>>>)> {
    let mut parts = HashMap::new();
    let mut bom = HashMap::new();
    let mut seen: HashSet<PartId> = HashSet::new();
    let mut frontier: Vec<PartId> = Vec::new();
    for demand in demands {
        if seen.insert(demand.root_id) {
            frontier.push(demand.root_id);
        }
    }

    while !frontier.is_empty() {
        control.check()?;

        let metas = try_join_all(frontier.iter().map(|&id| dal.part_meta(id))).await?;
        let mut assemblies = Vec::new();
        for (&id, meta) in frontier.iter().zip(metas) {
            let meta = meta.ok_or(CalcError::PartNotFound(id))?;
            if meta.is_assembly {
                assemblies.push(id);
            }
            parts.insert(id, meta);
        }

        let line_sets = try_join_all(assemblies.iter().map(|&id| dal.bom_lines(id))).await?;
        let mut next = Vec::new();
        for (&parent, lines) in assemblies.iter().zip(line_sets) {
            for line in lines.iter() {
                if seen.insert(line.sub_part_id) {
                    next.push(line.sub_part_id);
                }
            }
            bom.insert(parent, lines);
        }
        frontier = next;
    }

    Ok((parts, bom))
}
