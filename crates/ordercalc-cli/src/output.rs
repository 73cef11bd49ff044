use anyhow::Result;
use colored::*;
use ordercalc_core::{BuildLine, ComputeResult, OrderLine, PartSummary};
use rust_decimal::Decimal;

pub const ORDER_HEADERS: [&str; 8] = [
    "part_id",
    "name",
    "required",
    "available",
    "on_order",
    "to_order",
    "root_id",
    "root_name",
];

pub const BUILD_HEADERS: [&str; 7] = [
    "part_id",
    "name",
    "total_needed",
    "in_stock",
    "in_progress",
    "available",
    "to_build",
];

/// Decimals are rendered with three fractional digits
fn decimal(value: Decimal) -> String {
    format!("{:.3}", value.round_dp(3))
}

pub fn order_lines_csv(lines: &[OrderLine]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(ORDER_HEADERS)?;
    for line in lines {
        wtr.write_record(&[
            line.part_id.to_string(),
            line.name.clone(),
            decimal(line.required),
            decimal(line.available),
            decimal(line.on_order),
            decimal(line.to_order),
            line.root_id.to_string(),
            line.root_name.clone(),
        ])?;
    }
    Ok(String::from_utf8(wtr.into_inner()?)?)
}

pub fn build_lines_csv(lines: &[BuildLine]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(BUILD_HEADERS)?;
    for line in lines {
        wtr.write_record(&[
            line.part_id.to_string(),
            line.name.clone(),
            decimal(line.total_needed),
            decimal(line.in_stock),
            decimal(line.in_progress),
            decimal(line.available),
            decimal(line.to_build),
        ])?;
    }
    Ok(String::from_utf8(wtr.into_inner()?)?)
}

pub fn render_result(result: &ComputeResult, format: &str) -> Result<String> {
    match format {
        "json" => Ok(serde_json::to_string_pretty(result)?),
        "csv" => Ok(format!(
            "{}\n{}",
            order_lines_csv(&result.order_lines)?,
            build_lines_csv(&result.build_lines)?
        )),
        _ => Ok(render_table(result)),
    }
}

pub fn render_parts(parts: &[PartSummary], format: &str) -> Result<String> {
    match format {
        "json" => Ok(serde_json::to_string_pretty(parts)?),
        _ => {
            let mut out = String::new();
            out.push_str(&format!(
                "{} | {}\n",
                "id".bold().cyan(),
                "name".bold().cyan()
            ));
            out.push_str(&format!("{}\n", "─".repeat(40).dimmed()));
            for part in parts {
                out.push_str(&format!("{} | {}\n", part.id, part.name));
            }
            Ok(out)
        }
    }
}

fn render_table(result: &ComputeResult) -> String {
    let mut out = String::new();

    out.push_str(&format!("\n{}\n", "To order".bold().green()));
    out.push_str(&format!(
        "{}\n",
        ORDER_HEADERS
            .iter()
            .map(|h| h.bold().cyan().to_string())
            .collect::<Vec<_>>()
            .join(" | ")
    ));
    out.push_str(&format!("{}\n", "─".repeat(100).dimmed()));
    for line in &result.order_lines {
        out.push_str(&format!(
            "{} | {} | {} | {} | {} | {} | {} | {}\n",
            line.part_id,
            line.name,
            decimal(line.required),
            decimal(line.available),
            decimal(line.on_order),
            decimal(line.to_order),
            line.root_id,
            line.root_name,
        ));
    }
    if result.order_lines.is_empty() {
        out.push_str("(nothing to order)\n");
    }

    out.push_str(&format!("\n{}\n", "To build".bold().green()));
    out.push_str(&format!(
        "{}\n",
        BUILD_HEADERS
            .iter()
            .map(|h| h.bold().cyan().to_string())
            .collect::<Vec<_>>()
            .join(" | ")
    ));
    out.push_str(&format!("{}\n", "─".repeat(100).dimmed()));
    for line in &result.build_lines {
        out.push_str(&format!(
            "{} | {} | {} | {} | {} | {} | {}\n",
            line.part_id,
            line.name,
            decimal(line.total_needed),
            decimal(line.in_stock),
            decimal(line.in_progress),
            decimal(line.available),
            decimal(line.to_build),
        ));
    }
    if result.build_lines.is_empty() {
        out.push_str("(nothing to build)\n");
    }

    out
}
