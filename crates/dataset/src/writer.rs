//! Golden dataset writer.
//!
//! Null and wildcard are written bare. Every other non-numeric cell is
//! quoted, so a literal `NULL` or `\*` reads back as text and a first cell
//! starting with `#` never reads back as a comment.

use crate::error::DatasetError;
use crate::model::{Dataset, DatasetTable, FieldValue, NULL, WILDCARD};

pub fn write_table(table: &DatasetTable) -> Result<String, DatasetError> {
    let mut out = format!("{}:\n", table.name);

    let header = table
        .columns
        .iter()
        .map(|c| quote_cell(c))
        .collect::<Result<Vec<_>, _>>()?;
    push_line(&mut out, &header);

    for record in &table.records {
        let cells = table
            .columns
            .iter()
            .map(|c| match record.get(c) {
                Some(FieldValue::Null) => Ok(NULL.to_string()),
                Some(FieldValue::Wildcard) => Ok(WILDCARD.to_string()),
                Some(value) => quote_cell(value.as_cell()),
                None => quote_cell(""),
            })
            .collect::<Result<Vec<_>, _>>()?;
        push_line(&mut out, &cells);
    }
    Ok(out)
}

pub fn write_dataset(dataset: &Dataset) -> Result<String, DatasetError> {
    let mut sections = Vec::with_capacity(dataset.tables.len());
    for table in &dataset.tables {
        sections.push(write_table(table)?);
    }
    Ok(sections.join("\n"))
}

fn push_line(out: &mut String, cells: &[String]) {
    out.push_str(&cells.join(","));
    out.push('\n');
}

/// One cell as the csv writer would emit it, without the record terminator.
fn quote_cell(text: &str) -> Result<String, DatasetError> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::NonNumeric)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record([text])?;
    let mut bytes = writer
        .into_inner()
        .map_err(|e| DatasetError::Io(e.to_string()))?;
    bytes.pop();
    String::from_utf8(bytes).map_err(|e| DatasetError::Csv(e.to_string()))
}
