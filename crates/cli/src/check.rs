//! `snapfix check`: parse a golden dataset and summarize it.

use std::path::Path;

use serde::Serialize;
use snapfix_dataset::{parse_file, Dataset, KeyStrategy};

use crate::CliError;

#[derive(Debug, Serialize)]
struct TableSummary<'a> {
    table: &'a str,
    strategy: KeyStrategy,
    columns: usize,
    records: usize,
}

pub fn cmd_check(path: &Path, json: bool) -> Result<(), CliError> {
    let dataset = parse_file(path)?;
    let summaries = summarize(&dataset);

    if json {
        let out = serde_json::to_string_pretty(&summaries)
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        println!("{out}");
        return Ok(());
    }

    let width = summaries.iter().map(|s| s.table.len()).max().unwrap_or(0);
    for s in &summaries {
        println!(
            "{:<width$}  {:<10}  {} column(s), {} record(s)",
            s.table,
            s.strategy.to_string(),
            s.columns,
            s.records
        );
    }
    eprintln!("{}: {} table(s) ok", path.display(), summaries.len());
    Ok(())
}

fn summarize(dataset: &Dataset) -> Vec<TableSummary<'_>> {
    dataset
        .tables
        .iter()
        .map(|t| TableSummary {
            table: &t.name,
            strategy: t.strategy,
            columns: t.columns.len(),
            records: t.records.len(),
        })
        .collect()
}
