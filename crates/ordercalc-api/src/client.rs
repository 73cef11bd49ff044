use crate::config::ApiConfig;
use crate::retry::{with_retry, RetryConfig};
use crate::InventoryApi;
use async_trait::async_trait;
use ordercalc_core::{BomLine, CalcError, PartId, PartMeta, PartSummary, Result};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// HTTP client for the inventory service REST API
///
/// Every operation is a token-authenticated GET with a per-request timeout;
/// transport failures retry with exponential backoff before surfacing.
pub struct HttpInventoryApi {
    client: Client,
    base_url: String,
    token: String,
    open_po_statuses: Vec<i32>,
    open_bo_statuses: Vec<i32>,
    retry: RetryConfig,
}

impl HttpInventoryApi {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| CalcError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            token: config.token.clone(),
            open_po_statuses: config.open_po_statuses.clone(),
            open_bo_statuses: config.open_bo_statuses.clone(),
            retry: RetryConfig::default(),
        })
    }

    /// Override the retry policy (useful for tests)
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// GET and decode a JSON body; `Ok(None)` on 404
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<Option<T>> {
        with_retry(&self.retry, || self.fetch_once(path, query)).await
    }

    async fn fetch_once<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<Option<T>> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "GET");

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Token {}", self.token))
            .query(query)
            .send()
            .await
            .map_err(|e| CalcError::Transport(format!("GET {}: {}", url, e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status.is_server_error() {
            return Err(CalcError::Transport(format!("GET {}: HTTP {}", url, status)));
        }
        if !status.is_success() {
            // remaining 4xx mean the request itself is wrong; retrying cannot help
            return Err(CalcError::Configuration(format!(
                "GET {}: HTTP {}",
                url, status
            )));
        }

        let value = response
            .json::<T>()
            .await
            .map_err(|e| CalcError::Transport(format!("GET {}: invalid response body: {}", url, e)))?;
        Ok(Some(value))
    }
}

#[async_trait]
impl InventoryApi for HttpInventoryApi {
    async fn part(&self, id: PartId) -> Result<Option<PartMeta>> {
        let record: Option<PartRecord> = self.get_json(&format!("/api/part/{}/", id), &[]).await?;
        Ok(record.map(PartMeta::from))
    }

    async fn bom_lines(&self, parent_id: PartId) -> Result<Vec<BomLine>> {
        let query = vec![("part".to_string(), parent_id.to_string())];
        let records: Vec<BomLineRecord> = self
            .get_json("/api/bom/", &query)
            .await?
            .unwrap_or_default();
        Ok(records.into_iter().map(BomLine::from).collect())
    }

    async fn part_requirements(&self, id: PartId) -> Result<Decimal> {
        let record: Option<RequirementsRecord> = self
            .get_json(&format!("/api/part/{}/requirements/", id), &[])
            .await?;
        Ok(record.map(|r| r.required).unwrap_or(Decimal::ZERO))
    }

    async fn open_purchase_orders(&self, ids: &[PartId]) -> Result<HashMap<PartId, Decimal>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let query = vec![
            ("part__in".to_string(), join_ids(ids)),
            (
                "order_status__in".to_string(),
                join_codes(&self.open_po_statuses),
            ),
        ];
        let records: Vec<PoLineRecord> = self
            .get_json("/api/order/po-line/", &query)
            .await?
            .unwrap_or_default();

        let mut open: HashMap<PartId, Decimal> = HashMap::new();
        for record in records {
            let remaining = (record.quantity - record.received).max(Decimal::ZERO);
            *open.entry(PartId(record.part)).or_insert(Decimal::ZERO) += remaining;
        }
        Ok(open)
    }

    async fn open_build_orders(&self, ids: &[PartId]) -> Result<HashMap<PartId, Decimal>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let query = vec![
            ("part__in".to_string(), join_ids(ids)),
            ("status__in".to_string(), join_codes(&self.open_bo_statuses)),
        ];
        let records: Vec<BuildOrderRecord> = self
            .get_json("/api/build/", &query)
            .await?
            .unwrap_or_default();

        let mut open: HashMap<PartId, Decimal> = HashMap::new();
        for record in records {
            let remaining = (record.quantity - record.completed).max(Decimal::ZERO);
            *open.entry(PartId(record.part)).or_insert(Decimal::ZERO) += remaining;
        }
        Ok(open)
    }

    async fn supplier_names(&self, ids: &[PartId]) -> Result<HashMap<PartId, BTreeSet<String>>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let query = vec![("part__in".to_string(), join_ids(ids))];
        let records: Vec<SupplierPartRecord> = self
            .get_json("/api/company/part/", &query)
            .await?
            .unwrap_or_default();

        let mut names: HashMap<PartId, BTreeSet<String>> = HashMap::new();
        for record in records {
            names
                .entry(PartId(record.part))
                .or_insert_with(BTreeSet::new)
                .insert(record.supplier_name);
        }
        Ok(names)
    }

    async fn manufacturer_names(&self, ids: &[PartId]) -> Result<HashMap<PartId, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let query = vec![("part__in".to_string(), join_ids(ids))];
        let records: Vec<ManufacturerPartRecord> = self
            .get_json("/api/company/part/manufacturer/", &query)
            .await?
            .unwrap_or_default();

        let mut names: HashMap<PartId, String> = HashMap::new();
        for record in records {
            names
                .entry(PartId(record.part))
                .or_insert(record.manufacturer_name);
        }
        Ok(names)
    }

    async fn assemblies_in_category(&self, category: i64) -> Result<Vec<PartSummary>> {
        let query = vec![
            ("category".to_string(), category.to_string()),
            ("assembly".to_string(), "true".to_string()),
        ];
        let records: Vec<PartBriefRecord> = self
            .get_json("/api/part/", &query)
            .await?
            .unwrap_or_default();
        Ok(records
            .into_iter()
            .map(|r| PartSummary {
                id: PartId(r.pk),
                name: r.name,
            })
            .collect())
    }
}

fn join_ids(ids: &[PartId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn join_codes(codes: &[i32]) -> String {
    codes
        .iter()
        .map(|code| code.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

// Wire records, shaped by the service's JSON

#[derive(Debug, Deserialize)]
struct PartRecord {
    pk: i64,
    name: String,
    assembly: bool,
    #[serde(default)]
    is_template: bool,
    #[serde(default)]
    in_stock: Decimal,
    #[serde(default)]
    variant_stock: Decimal,
}

impl From<PartRecord> for PartMeta {
    fn from(record: PartRecord) -> Self {
        Self {
            id: PartId(record.pk),
            name: record.name,
            is_assembly: record.assembly,
            is_template: record.is_template,
            in_stock: record.in_stock,
            variant_stock: record.variant_stock,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PartBriefRecord {
    pk: i64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct BomLineRecord {
    part: i64,
    sub_part: i64,
    quantity: Decimal,
    #[serde(default)]
    allow_variants: bool,
}

impl From<BomLineRecord> for BomLine {
    fn from(record: BomLineRecord) -> Self {
        Self {
            parent_id: PartId(record.part),
            sub_part_id: PartId(record.sub_part),
            quantity_per: record.quantity,
            allow_variants: record.allow_variants,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RequirementsRecord {
    #[serde(default)]
    required: Decimal,
}

#[derive(Debug, Deserialize)]
struct PoLineRecord {
    part: i64,
    quantity: Decimal,
    #[serde(default)]
    received: Decimal,
}

#[derive(Debug, Deserialize)]
struct BuildOrderRecord {
    part: i64,
    quantity: Decimal,
    #[serde(default)]
    completed: Decimal,
}

#[derive(Debug, Deserialize)]
struct SupplierPartRecord {
    part: i64,
    supplier_name: String,
}

#[derive(Debug, Deserialize)]
struct ManufacturerPartRecord {
    part: i64,
    manufacturer_name: String,
}
