//! Golden dataset parser.
//!
//! ```text
//! pages:
//! uid,pid,title
//! 1,0,"Home"
//! 2,1,\*
//! ```
//!
//! A line whose only non-empty cell ends in `:` opens a table section. The
//! next row is the header, every following row until the next section is a
//! record. Cells use standard CSV quoting. Blank lines and lines starting
//! with `#` are skipped (quote a first cell that really starts with `#`).
//!
//! Markers only count when bare: `NULL` and `\*` are null and wildcard,
//! `"NULL"` and `"\*"` are literal text.

use std::path::Path;

use crate::error::DatasetError;
use crate::model::{Dataset, DatasetRecord, DatasetTable, FieldValue};

pub fn parse(source: &str) -> Result<Dataset, DatasetError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(source.as_bytes());

    let bytes = source.as_bytes();
    let mut lines = LineCounter::default();
    let mut tables: Vec<DatasetTable> = Vec::new();
    // Table line seen, header row not yet.
    let mut pending: Option<(String, u64)> = None;
    let mut current: Option<DatasetTable> = None;

    for result in reader.records() {
        let record = result?;
        let offset = record.position().map(|p| p.byte() as usize).unwrap_or(0);
        let raw = RawRecord::scan(bytes, offset);
        let line = lines.line_at(bytes, raw.start);

        if raw.is_blank(bytes) {
            continue;
        }

        if let Some(name) = table_name(&record) {
            if let Some((open, open_line)) = pending.take() {
                return Err(DatasetError::malformed(
                    open_line,
                    format!("table '{open}' has no header row"),
                ));
            }
            if let Some(done) = current.take() {
                finish_table(&mut tables, done);
            }
            if tables.iter().any(|t| t.name == name) {
                return Err(DatasetError::DuplicateTable { line, table: name });
            }
            pending = Some((name, line));
            continue;
        }

        if let Some((name, _)) = pending.take() {
            let columns = parse_header(&record, &name, line)?;
            current = Some(DatasetTable::new(name, columns));
            continue;
        }

        let Some(table) = current.as_mut() else {
            return Err(DatasetError::malformed(line, "data row before any table section"));
        };

        if record.len() != table.columns.len() {
            return Err(DatasetError::malformed(
                line,
                format!(
                    "table '{}': expected {} cells, found {}",
                    table.name,
                    table.columns.len(),
                    record.len()
                ),
            ));
        }

        let fields = table
            .columns
            .iter()
            .zip(record.iter())
            .enumerate()
            .map(|(i, (column, cell))| {
                let value = if raw.is_quoted(i) {
                    FieldValue::from_quoted_cell(cell)
                } else {
                    FieldValue::from_cell(cell)
                };
                (column.clone(), value)
            })
            .collect();
        table.records.push(DatasetRecord::new(fields));
    }

    if let Some((name, line)) = pending {
        return Err(DatasetError::malformed(
            line,
            format!("table '{name}' is not terminated by a header row"),
        ));
    }
    if let Some(done) = current {
        finish_table(&mut tables, done);
    }

    Ok(Dataset { tables })
}

pub fn parse_file(path: &Path) -> Result<Dataset, DatasetError> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| DatasetError::Io(format!("cannot read {}: {e}", path.display())))?;
    parse(&source)
}

fn finish_table(tables: &mut Vec<DatasetTable>, table: DatasetTable) {
    log::debug!(
        "parsed table '{}' ({}, {} records)",
        table.name,
        table.strategy,
        table.records.len()
    );
    tables.push(table);
}

/// Source span of one record and which of its cells were quoted.
///
/// `csv` reports where it started reading, which may sit before empty and
/// comment lines it skipped; `scan` skips them the same way.
struct RawRecord {
    start: usize,
    end: usize,
    quoted: Vec<bool>,
}

impl RawRecord {
    fn scan(src: &[u8], mut pos: usize) -> Self {
        loop {
            match src.get(pos) {
                Some(b'\r' | b'\n') => pos += 1,
                Some(b'#') => {
                    while let Some(&b) = src.get(pos) {
                        pos += 1;
                        if b == b'\n' {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }

        let start = pos;
        let mut quoted = Vec::new();
        loop {
            let is_quoted = src.get(pos) == Some(&b'"');
            if is_quoted {
                pos += 1;
                while let Some(&b) = src.get(pos) {
                    pos += 1;
                    if b == b'"' {
                        if src.get(pos) == Some(&b'"') {
                            pos += 1;
                        } else {
                            break;
                        }
                    }
                }
            }
            while let Some(&b) = src.get(pos) {
                if matches!(b, b',' | b'\r' | b'\n') {
                    break;
                }
                pos += 1;
            }
            quoted.push(is_quoted);
            if src.get(pos) == Some(&b',') {
                pos += 1;
            } else {
                break;
            }
        }
        Self { start, end: pos, quoted }
    }

    fn is_quoted(&self, cell: usize) -> bool {
        self.quoted.get(cell).copied().unwrap_or(false)
    }

    /// Whitespace only. `""` and `,` are records, not blank lines.
    fn is_blank(&self, src: &[u8]) -> bool {
        src[self.start..self.end].iter().all(u8::is_ascii_whitespace)
    }
}

/// 1-based line numbers for increasing byte offsets.
#[derive(Default)]
struct LineCounter {
    offset: usize,
    newlines: u64,
}

impl LineCounter {
    fn line_at(&mut self, src: &[u8], offset: usize) -> u64 {
        let offset = offset.min(src.len());
        if offset >= self.offset {
            self.newlines += src[self.offset..offset].iter().filter(|&&b| b == b'\n').count() as u64;
            self.offset = offset;
        }
        self.newlines + 1
    }
}

/// `name:` in the first cell, every other cell empty.
fn table_name(record: &csv::StringRecord) -> Option<String> {
    let first = record.get(0)?.trim();
    let name = first.strip_suffix(':')?.trim();
    if name.is_empty() || record.iter().skip(1).any(|c| !c.trim().is_empty()) {
        return None;
    }
    Some(name.to_string())
}

fn parse_header(record: &csv::StringRecord, table: &str, line: u64) -> Result<Vec<String>, DatasetError> {
    let columns: Vec<String> = record.iter().map(|c| c.trim().to_string()).collect();
    for (i, column) in columns.iter().enumerate() {
        if column.is_empty() {
            return Err(DatasetError::malformed(
                line,
                format!("table '{table}': header column {} is empty", i + 1),
            ));
        }
        if columns[..i].contains(column) {
            return Err(DatasetError::malformed(
                line,
                format!("table '{table}': duplicate column '{column}'"),
            ));
        }
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KeyStrategy;

    #[test]
    fn parse_basic_table() {
        let src = "\
pages:
uid,field_a,field_b
1,\"value one\",\"value two\"
2,\\*,\"value three\"
";
        let ds = parse(src).unwrap();
        assert_eq!(ds.tables.len(), 1);
        let pages = ds.table("pages").unwrap();
        assert_eq!(pages.strategy, KeyStrategy::ById);
        assert_eq!(pages.columns, vec!["uid", "field_a", "field_b"]);
        assert_eq!(pages.records.len(), 2);
        assert_eq!(pages.records[0].get("field_b"), Some(&FieldValue::Literal("value two".into())));
        assert_eq!(pages.records[1].get("field_a"), Some(&FieldValue::Wildcard));
    }

    #[test]
    fn parse_multiple_tables_keeps_order() {
        let src = "\
tt_content:
hash,bodytext
abc,Hello

pages:
pid,title
0,Root
";
        let ds = parse(src).unwrap();
        let names: Vec<&str> = ds.table_names().collect();
        assert_eq!(names, vec!["tt_content", "pages"]);
        assert_eq!(ds.tables[0].strategy, KeyStrategy::ByHash);
        assert_eq!(ds.tables[1].strategy, KeyStrategy::Positional);
    }

    #[test]
    fn null_is_distinct_from_empty() {
        let src = "t:\nuid,a,b\n1,NULL,\n";
        let ds = parse(src).unwrap();
        let rec = &ds.tables[0].records[0];
        assert_eq!(rec.get("a"), Some(&FieldValue::Null));
        assert_eq!(rec.get("b"), Some(&FieldValue::Literal(String::new())));
    }

    #[test]
    fn quoted_markers_are_literal_text() {
        let src = "t:\nuid,a,b\n1,\"NULL\",\"\\*\"\n2,NULL,\\*\n";
        let ds = parse(src).unwrap();
        let recs = &ds.tables[0].records;
        assert_eq!(recs[0].get("a"), Some(&FieldValue::Literal("NULL".into())));
        assert_eq!(recs[0].get("b"), Some(&FieldValue::Literal("\\*".into())));
        assert_eq!(recs[1].get("a"), Some(&FieldValue::Null));
        assert_eq!(recs[1].get("b"), Some(&FieldValue::Wildcard));
    }

    #[test]
    fn quoted_cells_after_comments_and_blank_lines() {
        let src = "t:\nuid,a\n\n# note, \"quoted\"\n\n1,\"NULL\"\n";
        let ds = parse(src).unwrap();
        assert_eq!(
            ds.tables[0].records[0].get("a"),
            Some(&FieldValue::Literal("NULL".into()))
        );
    }

    #[test]
    fn empty_quoted_cell_is_a_record() {
        let ds = parse("t:\ntitle\n\"\"\n   \n\"x\"\n").unwrap();
        let recs = &ds.tables[0].records;
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].get("title"), Some(&FieldValue::Literal(String::new())));
    }

    #[test]
    fn error_line_skips_comments() {
        let err = parse("pages:\nuid,title\n# two\n# three\n1\n").unwrap_err();
        assert!(matches!(err, DatasetError::Malformed { line: 5, .. }), "{err}");
    }

    #[test]
    fn markup_cell_spans_lines() {
        let src = "t:\nuid,config\n1,\"<?xml version=\"\"1.0\"\"?>\n<T3><a>1</a></T3>\"\n";
        let ds = parse(src).unwrap();
        match ds.tables[0].records[0].get("config") {
            Some(FieldValue::Markup(xml)) => assert!(xml.contains("<a>1</a>")),
            other => panic!("expected markup, got {other:?}"),
        }
    }

    #[test]
    fn table_line_with_trailing_cells_and_comments() {
        let src = "# exported fixture\npages:,,\nuid,title\n1,Home\n";
        let ds = parse(src).unwrap();
        assert_eq!(ds.tables[0].name, "pages");
        assert_eq!(ds.tables[0].records.len(), 1);
    }

    #[test]
    fn empty_table_is_valid() {
        let ds = parse("sys_log:\nuid,details\n").unwrap();
        assert!(ds.tables[0].is_empty());
    }

    #[test]
    fn reject_inconsistent_cell_count() {
        let err = parse("pages:\nuid,title\n1,Home\n2\n").unwrap_err();
        match err {
            DatasetError::Malformed { line, ref message } => {
                assert_eq!(line, 4);
                assert!(message.contains("expected 2 cells, found 1"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn reject_unterminated_table() {
        let err = parse("pages:\n").unwrap_err();
        assert!(err.to_string().contains("not terminated"));

        let err = parse("pages:\nusers:\nuid\n").unwrap_err();
        assert!(err.to_string().contains("'pages' has no header row"));
    }

    #[test]
    fn reject_rows_outside_table() {
        let err = parse("uid,title\n1,Home\n").unwrap_err();
        assert!(err.to_string().contains("before any table"));
    }

    #[test]
    fn reject_duplicate_table() {
        let err = parse("pages:\nuid\n1\npages:\nuid\n2\n").unwrap_err();
        assert!(matches!(err, DatasetError::DuplicateTable { ref table, .. } if table == "pages"));
    }

    #[test]
    fn reject_duplicate_column() {
        let err = parse("pages:\nuid,uid\n").unwrap_err();
        assert!(err.to_string().contains("duplicate column 'uid'"));
    }

    #[test]
    fn parse_file_reads_and_reports_io() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pages.csv");
        std::fs::write(&path, "pages:\nuid,title\n1,\"Home\"\n").unwrap();
        let ds = parse_file(&path).unwrap();
        assert_eq!(ds.table("pages").unwrap().len(), 1);

        let err = parse_file(&dir.path().join("missing.csv")).unwrap_err();
        assert!(matches!(err, DatasetError::Io(_)));
        assert!(!err.is_malformed());
    }
}
