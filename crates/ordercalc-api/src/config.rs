use ordercalc_core::{CalcError, Result};
use std::env;
use std::time::Duration;

const ENV_SERVICE_URL: &str = "ORDERCALC_SERVICE_URL";
const ENV_SERVICE_TOKEN: &str = "ORDERCALC_SERVICE_TOKEN";
const ENV_ASSEMBLY_CATEGORY: &str = "ORDERCALC_ASSEMBLY_CATEGORY";
const ENV_REQUEST_TIMEOUT: &str = "ORDERCALC_REQUEST_TIMEOUT_SECS";
const ENV_OPEN_PO_STATUSES: &str = "ORDERCALC_OPEN_PO_STATUSES";
const ENV_OPEN_BO_STATUSES: &str = "ORDERCALC_OPEN_BO_STATUSES";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Pending, Placed, OnHold
const DEFAULT_OPEN_PO_STATUSES: &[i32] = &[10, 20, 25];

/// Pending, Production, OnHold
const DEFAULT_OPEN_BO_STATUSES: &[i32] = &[10, 20, 25];

/// Connection settings for the inventory service
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Service base URL, without a trailing slash
    pub base_url: String,

    /// API token, sent as `Authorization: Token …`
    pub token: String,

    /// Category id bounding the assembly listing
    pub assembly_category: i64,

    /// Timeout applied to every individual request
    pub request_timeout: Duration,

    /// Purchase-order status codes that count as open
    pub open_po_statuses: Vec<i32>,

    /// Build-order status codes that count as open
    pub open_bo_statuses: Vec<i32>,
}

impl ApiConfig {
    /// Load the configuration from the environment
    ///
    /// Missing URL or token aborts startup with a configuration error.
    pub fn from_env() -> Result<Self> {
        let base_url = require(ENV_SERVICE_URL)?;
        let token = require(ENV_SERVICE_TOKEN)?;
        let assembly_category = require(ENV_ASSEMBLY_CATEGORY)?.parse::<i64>().map_err(|_| {
            CalcError::Configuration(format!("{} must be an integer", ENV_ASSEMBLY_CATEGORY))
        })?;

        let request_timeout = match env::var(ENV_REQUEST_TIMEOUT) {
            Ok(raw) => Duration::from_secs(raw.parse::<u64>().map_err(|_| {
                CalcError::Configuration(format!("{} must be an integer", ENV_REQUEST_TIMEOUT))
            })?),
            Err(_) => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        let open_po_statuses = match env::var(ENV_OPEN_PO_STATUSES) {
            Ok(raw) => parse_status_list(ENV_OPEN_PO_STATUSES, &raw)?,
            Err(_) => DEFAULT_OPEN_PO_STATUSES.to_vec(),
        };
        let open_bo_statuses = match env::var(ENV_OPEN_BO_STATUSES) {
            Ok(raw) => parse_status_list(ENV_OPEN_BO_STATUSES, &raw)?,
            Err(_) => DEFAULT_OPEN_BO_STATUSES.to_vec(),
        };

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            assembly_category,
            request_timeout,
            open_po_statuses,
            open_bo_statuses,
        })
    }
}

fn require(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(CalcError::Configuration(format!("{} is not set", name))),
    }
}

fn parse_status_list(name: &str, raw: &str) -> Result<Vec<i32>> {
    let codes: std::result::Result<Vec<i32>, _> = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::parse::<i32>)
        .collect();

    match codes {
        Ok(codes) if !codes.is_empty() => Ok(codes),
        _ => Err(CalcError::Configuration(format!(
            "{} must be a comma-separated list of status codes, got {:?}",
            name, raw
        ))),
    }
}
