//! `snapfix verify`: reconcile a SQLite database against a golden dataset.

use std::path::Path;

use snapfix_dataset::parse_file;
use snapfix_fixture::FixtureContext;
use snapfix_recon::{render_with, RenderOptions, XmlComparator};

use crate::{load_config, open_database, CliError};

pub fn cmd_verify(
    dataset_path: &Path,
    database: &Path,
    json: bool,
    config_path: Option<&Path>,
) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let dataset = parse_file(dataset_path)?;
    let conn = open_database(database)?;

    let options = RenderOptions {
        max_value_width: config.report.max_value_width,
    };
    let report = FixtureContext::new(config).reconcile(&dataset, &conn)?;

    if json {
        let out = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        println!("{out}");
    } else {
        print!("{}", render_with(&report, &options, &XmlComparator));
    }

    if report.is_clean() {
        return Ok(());
    }
    let summary = report.summary();
    Err(CliError::mismatch(format!(
        "{} of {} table(s) differ",
        summary.failing_tables, summary.tables
    )))
}
