//! Command implementations for the `tally` binary.

use std::fmt::Write as _;

use anyhow::{Context, Result};

use crate::catalog::{Catalog, CountStrategy};
use crate::error::QueryError;
use crate::query::{QueryComposer, QueryIntent};

/// Split a `key=value` command-line parameter.
pub fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}

/// Tabular listing of every registered dataset.
pub fn cmd_datasets(catalog: &Catalog) -> String {
    let width = catalog
        .datasets()
        .map(|d| d.name().len())
        .max()
        .unwrap_or(0)
        .max("DATASET".len());

    let mut out = String::new();
    let _ = writeln!(out, "{:<width$}  {:<8}  {:<9}  FILTERS", "DATASET", "SORT", "COUNT");
    for dataset in catalog.datasets() {
        let sort = if dataset.multi_sort() { "multi" } else { "single" };
        let count = match dataset.count_strategy() {
            CountStrategy::Returned => "returned",
            CountStrategy::Exact => "exact",
            CountStrategy::Estimated { .. } => "estimated",
        };
        let filters: Vec<&str> = dataset
            .filters()
            .iter()
            .flat_map(|f| f.fields())
            .collect();
        let _ = writeln!(
            out,
            "{:<width$}  {:<8}  {:<9}  {}",
            dataset.name(),
            sort,
            count,
            filters.join(",")
        );
    }
    out
}

/// Run one query and render the page as JSON.
pub async fn cmd_query(
    composer: &QueryComposer,
    dataset: &str,
    params: &[(String, String)],
    pretty: bool,
) -> Result<String, QueryError> {
    let intent = QueryIntent::from_params(composer.catalog(), dataset, params)?;
    let page = composer.execute(&intent).await?;
    let rendered = if pretty {
        serde_json::to_string_pretty(&page)
    } else {
        serde_json::to_string(&page)
    };
    // Rows hold only strings, numbers and nested objects.
    Ok(rendered.unwrap_or_default())
}

/// Render the SQL a query would run, without executing it.
pub fn cmd_explain(
    composer: &QueryComposer,
    dataset: &str,
    params: &[(String, String)],
) -> Result<String, QueryError> {
    let intent = QueryIntent::from_params(composer.catalog(), dataset, params)?;
    let composed = composer.compose(&intent)?;
    let mut out = composed.plan.to_sql();
    out.push('\n');
    match composed.plan.count {
        CountStrategy::Returned => {}
        CountStrategy::Exact => {
            out.push_str(&composed.plan.count_sql());
            out.push('\n');
        }
        CountStrategy::Estimated { exact_below } => {
            out.push_str(&composed.plan.estimate_sql());
            out.push('\n');
            let _ = writeln!(out, "-- when the estimate is below {exact_below}:");
            out.push_str(&composed.plan.count_sql());
            out.push('\n');
        }
    }
    Ok(out)
}

/// Format a query error for the terminal.
pub fn describe_error(err: &QueryError) -> String {
    format!("{}: {err}", err.kind().as_str())
}

/// Read an optional JSON list of `[key, value]` pairs from a file, for
/// parameter sets too long for the command line.
pub fn load_params(path: &std::path::Path) -> Result<Vec<(String, String)>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid parameter file {}", path.display()))
}
