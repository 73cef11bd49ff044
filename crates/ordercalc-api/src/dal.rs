use crate::InventoryApi;
use futures::future::{try_join, try_join_all};
use moka::future::Cache;
use ordercalc_core::{BomLine, CalcError, OpenOrders, PartId, PartMeta, Result, RunControl};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;

/// Ids per bulk request; larger sets are split and fetched concurrently
pub const CHUNK: usize = 100;

/// Per-run memoizing facade over an [`InventoryApi`]
///
/// Created at run start and dropped at run end. Repeated lookups for the
/// same key within a run hit memory, not the network; concurrent lookups
/// for the same key share one backend call. `Ok` values are cached,
/// including the not-found sentinel; transport errors are not and may be
/// retried by calling again.
pub struct Dal {
    api: Arc<dyn InventoryApi>,
    control: RunControl,
    parts: Cache<PartId, Option<PartMeta>>,
    boms: Cache<PartId, Arc<Vec<BomLine>>>,
}

impl Dal {
    pub fn new(api: Arc<dyn InventoryApi>, control: RunControl) -> Self {
        Self {
            api,
            control,
            parts: Cache::new(100_000),
            boms: Cache::new(100_000),
        }
    }

    /// Look up one part through the memo map
    pub async fn part_meta(&self, id: PartId) -> Result<Option<PartMeta>> {
        self.control.check()?;
        let api = self.api.clone();
        let lookup = self
            .parts
            .try_get_with(id, async move { api.part(id).await });
        self.bounded(lookup).await?.map_err(unshared)
    }

    /// BOM lines of a parent through the memo map; empty for non-assemblies
    pub async fn bom_lines(&self, parent_id: PartId) -> Result<Arc<Vec<BomLine>>> {
        self.control.check()?;
        let api = self.api.clone();
        let lookup = self.boms.try_get_with(parent_id, async move {
            api.bom_lines(parent_id).await.map(Arc::new)
        });
        self.bounded(lookup).await?.map_err(unshared)
    }

    /// Externally committed quantity per part
    ///
    /// The service exposes this per part; fan-out runs one chunk of
    /// concurrent requests at a time.
    pub async fn external_required(&self, ids: &[PartId]) -> Result<HashMap<PartId, Decimal>> {
        let mut merged = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(CHUNK) {
            self.control.check()?;
            let fetches = try_join_all(chunk.iter().map(|&id| self.api.part_requirements(id)));
            let values = self.bounded(fetches).await??;
            for (&id, required) in chunk.iter().zip(values) {
                merged.insert(id, required);
            }
        }
        Ok(merged)
    }

    /// Open purchase and build quantities per part, merged into one map
    pub async fn open_orders(&self, ids: &[PartId]) -> Result<HashMap<PartId, OpenOrders>> {
        self.control.check()?;
        let purchase = try_join_all(ids.chunks(CHUNK).map(|c| self.api.open_purchase_orders(c)));
        let build = try_join_all(ids.chunks(CHUNK).map(|c| self.api.open_build_orders(c)));
        let (purchase_chunks, build_chunks) = self.bounded(try_join(purchase, build)).await??;

        let mut merged: HashMap<PartId, OpenOrders> = HashMap::with_capacity(ids.len());
        for chunk in purchase_chunks {
            for (id, quantity) in chunk {
                merged.entry(id).or_default().purchase_open += quantity;
            }
        }
        for chunk in build_chunks {
            for (id, quantity) in chunk {
                merged.entry(id).or_default().build_in_progress += quantity;
            }
        }
        Ok(merged)
    }

    /// Supplier names per part, chunked and merged
    pub async fn supplier_names(&self, ids: &[PartId]) -> Result<HashMap<PartId, BTreeSet<String>>> {
        self.control.check()?;
        let fetches = try_join_all(ids.chunks(CHUNK).map(|c| self.api.supplier_names(c)));
        let chunks = self.bounded(fetches).await??;

        let mut merged: HashMap<PartId, BTreeSet<String>> = HashMap::new();
        for chunk in chunks {
            for (id, names) in chunk {
                merged.entry(id).or_insert_with(BTreeSet::new).extend(names);
            }
        }
        Ok(merged)
    }

    /// Manufacturer name per part, chunked and merged
    pub async fn manufacturer_names(&self, ids: &[PartId]) -> Result<HashMap<PartId, String>> {
        self.control.check()?;
        let fetches = try_join_all(ids.chunks(CHUNK).map(|c| self.api.manufacturer_names(c)));
        let chunks = self.bounded(fetches).await??;

        let mut merged: HashMap<PartId, String> = HashMap::new();
        for chunk in chunks {
            for (id, name) in chunk {
                merged.entry(id).or_insert(name);
            }
        }
        Ok(merged)
    }

    /// Bound an in-flight fetch by the remaining run deadline
    async fn bounded<F: Future>(&self, fut: F) -> Result<F::Output> {
        match self.control.remaining() {
            Some(remaining) => tokio::time::timeout(remaining, fut)
                .await
                .map_err(|_| CalcError::DeadlineExceeded),
            None => Ok(fut.await),
        }
    }
}

fn unshared(err: Arc<CalcError>) -> CalcError {
    (*err).clone()
}
