//! `snapfix export`: dump database tables as a golden dataset.

use std::path::Path;

use snapfix_dataset::{write_dataset, Dataset, DatasetTable};
use snapfix_fixture::Connection;

use crate::{open_database, CliError};

pub fn cmd_export(database: &Path, tables: &[String], output: Option<&Path>) -> Result<(), CliError> {
    let conn = open_database(database)?;
    let available = conn.tables()?;

    let selected: Vec<String> = if tables.is_empty() {
        available.clone()
    } else {
        tables.to_vec()
    };
    if let Some(unknown) = selected.iter().find(|t| !available.contains(t)) {
        return Err(CliError::usage(format!("no table named '{unknown}'"))
            .with_hint(format!("available: {}", available.join(", "))));
    }

    let mut dataset = Dataset::default();
    for name in &selected {
        let columns = conn.columns(name)?;
        let rows = conn.query(name)?;
        dataset.tables.push(DatasetTable::from_records(name.as_str(), columns, &rows));
    }
    let text = write_dataset(&dataset)?;

    match output {
        Some(path) => {
            std::fs::write(path, &text)
                .map_err(|e| CliError::io(format!("cannot write {}: {e}", path.display())))?;
            eprintln!("wrote {} table(s) to {}", dataset.tables.len(), path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}
