use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use ordercalc_api::{ApiConfig, HttpInventoryApi, InventoryApi};
use ordercalc_core::{CalcError, CalcOptions, CancelToken, Demand, PartId};
use ordercalc_engine::Calculator;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

mod output;

#[derive(Parser)]
#[command(name = "ordercalc")]
#[command(about = "Purchase and build requirements calculator")]
#[command(version)]
struct Cli {
    /// Verbose tracing output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute requirements for one or more assembly demands
    Calc {
        /// Demand as PART_ID=QUANTITY, repeatable
        #[arg(short, long = "demand", value_name = "ID=QTY", required = true)]
        demands: Vec<String>,

        /// Output format (table, csv, json)
        #[arg(short, long, default_value = "table")]
        format: String,

        /// Write the purchase list as CSV to this path
        #[arg(long, value_name = "FILE")]
        order_csv: Option<PathBuf>,

        /// Write the build list as CSV to this path
        #[arg(long, value_name = "FILE")]
        build_csv: Option<PathBuf>,

        /// Suppliers whose parts are omitted from the output
        #[arg(long = "exclude-supplier", value_name = "NAME")]
        exclude_suppliers: Vec<String>,

        /// Manufacturers whose parts are omitted from the output
        #[arg(long = "exclude-manufacturer", value_name = "NAME")]
        exclude_manufacturers: Vec<String>,

        /// Overall run deadline in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Count in-progress builds toward assembly availability
        #[arg(long)]
        count_in_progress: bool,
    },

    /// List assemblies in the configured category
    Parts {
        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        eprintln!("{}", format!("error: {:#}", err).red());
        let code = err
            .downcast_ref::<CalcError>()
            .map(|e| e.exit_code())
            .unwrap_or(1);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = ApiConfig::from_env()?;
    let api = Arc::new(HttpInventoryApi::new(&config)?);

    match cli.command {
        Commands::Calc {
            demands,
            format,
            order_csv,
            build_csv,
            exclude_suppliers,
            exclude_manufacturers,
            timeout,
            count_in_progress,
        } => {
            let demands = parse_demands(&demands)?;

            let mut options = CalcOptions {
                count_in_progress,
                timeout: timeout.map(Duration::from_secs),
                ..CalcOptions::default()
            };
            options.filters.exclude_suppliers.extend(exclude_suppliers);
            options
                .filters
                .exclude_manufacturers
                .extend(exclude_manufacturers);

            let cancel = CancelToken::new();
            {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        cancel.cancel();
                    }
                });
            }

            let result = Calculator::new(api)
                .compute_with_cancel(&demands, &options, cancel)
                .await?;

            for diagnostic in &result.diagnostics {
                eprintln!("{}", format!("warning: {}", diagnostic.message).yellow());
            }

            if let Some(path) = order_csv {
                std::fs::write(&path, output::order_lines_csv(&result.order_lines)?)?;
            }
            if let Some(path) = build_csv {
                std::fs::write(&path, output::build_lines_csv(&result.build_lines)?)?;
            }

            print!("{}", output::render_result(&result, &format)?);
        }

        Commands::Parts { format } => {
            let assemblies = api.assemblies_in_category(config.assembly_category).await?;
            print!("{}", output::render_parts(&assemblies, &format)?);
        }
    }

    Ok(())
}

/// Parse `PART_ID=QUANTITY` demand arguments
fn parse_demands(raw: &[String]) -> Result<Vec<Demand>, CalcError> {
    raw.iter()
        .map(|entry| {
            let (id, quantity) = entry.split_once('=').ok_or_else(|| {
                CalcError::Validation(format!("expected PART_ID=QUANTITY, got {:?}", entry))
            })?;
            let id = id.trim().parse::<i64>().map_err(|_| {
                CalcError::Validation(format!("invalid part id in demand {:?}", entry))
            })?;
            let quantity = Decimal::from_str(quantity.trim()).map_err(|_| {
                CalcError::Validation(format!("invalid quantity in demand {:?}", entry))
            })?;
            Ok(Demand::new(PartId(id), quantity))
        })
        .collect()
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_demands() {
        let demands = parse_demands(&["100=3".to_string(), "110=2.5".to_string()]).unwrap();
        assert_eq!(demands.len(), 2);
        assert_eq!(demands[0].root_id, PartId(100));
        assert_eq!(demands[0].quantity, dec!(3));
        assert_eq!(demands[1].quantity, dec!(2.5));
    }

    #[test]
    fn test_parse_demands_rejects_malformed_entries() {
        assert!(parse_demands(&["100".to_string()]).is_err());
        assert!(parse_demands(&["abc=3".to_string()]).is_err());
        assert!(parse_demands(&["100=xyz".to_string()]).is_err());
    }
}
