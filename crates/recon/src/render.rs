//! Human-readable failure output for a [`DiffReport`].
//!
//! One aligned `field | expected | actual` block per failing record. Values
//! that are markup, multi-line, or wider than `max_value_width` print as
//! `[see diff]` and get a line diff below the block.

use std::fmt::Write as _;

use snapfix_dataset::{DatasetRecord, FieldValue, KeyStrategy, Record};
use unicode_width::UnicodeWidthStr;

use crate::markup::{MarkupComparator, XmlComparator};
use crate::model::{
    ActualValue, CandidateDiff, DiffReport, FieldMismatch, MissingReason, RecordFailure, TableDiff,
};
use crate::textdiff;

pub const SEE_DIFF: &str = "[see diff]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub max_value_width: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { max_value_width: 40 }
    }
}

pub fn render(report: &DiffReport) -> String {
    render_with(report, &RenderOptions::default(), &XmlComparator)
}

pub fn render_with(
    report: &DiffReport,
    options: &RenderOptions,
    comparator: &dyn MarkupComparator,
) -> String {
    let summary = report.summary();
    let mut out = String::new();

    if report.is_clean() {
        let _ = writeln!(
            out,
            "All {} table(s) match ({} record(s)).",
            summary.tables, summary.matched
        );
        return out;
    }

    let _ = writeln!(
        out,
        "Dataset mismatch: {} of {} table(s) differ ({} missing, {} mismatched, {} unexpected)",
        summary.failing_tables,
        summary.tables,
        summary.missing,
        summary.mismatched,
        summary.unexpected
    );

    let r = Renderer { options, comparator };
    for table in report.tables.iter().filter(|t| !t.is_clean()) {
        out.push('\n');
        r.table(table, &mut out);
    }
    out
}

struct Renderer<'a> {
    options: &'a RenderOptions,
    comparator: &'a dyn MarkupComparator,
}

/// A `[see diff]` cell's full content, printed after the aligned block.
struct Deferred {
    label: String,
    body: String,
}

impl Renderer<'_> {
    fn table(&self, table: &TableDiff, out: &mut String) {
        let _ = writeln!(
            out,
            "Table \"{}\" ({}, {} expected, {} actual, {} matched)",
            table.table,
            table.strategy,
            table.expected_count,
            table.actual_count,
            table.matched.len()
        );
        for failure in &table.failures {
            self.failure(table.strategy, failure, out);
        }
    }

    fn failure(&self, strategy: KeyStrategy, failure: &RecordFailure, out: &mut String) {
        match failure {
            RecordFailure::Mismatch { expected_index, key, fields, candidates, .. } => {
                let label = key_label(strategy, Some(key), *expected_index);
                let _ = writeln!(out, "  Record {label}: fields differ");
                self.mismatch_block(&label, fields, "    ", out);
                for candidate in candidates {
                    self.candidate_block(&label, candidate, out);
                }
            }
            RecordFailure::Missing { expected_index, key, reason, expected, candidates } => {
                let label = key_label(strategy, key.as_deref(), *expected_index);
                let why = match reason {
                    MissingReason::NotFound => "not found",
                    MissingReason::KeyAlreadyClaimed => "not found (key already matched by an earlier record)",
                    MissingReason::NoMatch => "no matching record",
                };
                let _ = writeln!(out, "  Record {label}: {why}");
                self.expected_block(&label, expected, out);
                for candidate in candidates {
                    self.candidate_block(&label, candidate, out);
                }
            }
            RecordFailure::Unexpected { actual_index, key, actual } => {
                let label = match key {
                    Some(k) if strategy.key_field().is_some() => {
                        format!("{}={k}", strategy.key_field().unwrap_or("key"))
                    }
                    _ => format!("actual row #{}", actual_index + 1),
                };
                let _ = writeln!(out, "  Unexpected record {label}");
                self.actual_block(&label, actual, out);
            }
        }
    }

    fn mismatch_block(&self, label: &str, fields: &[FieldMismatch], indent: &str, out: &mut String) {
        let mut rows = Vec::with_capacity(fields.len());
        let mut deferred = Vec::new();
        for f in fields {
            let expected = f.expected.as_cell();
            let actual = f.actual.as_str();
            if self.needs_diff(&f.expected, expected) || self.is_long(actual) {
                let body = if f.expected.is_markup() {
                    self.comparator.render_diff(expected, actual)
                } else {
                    textdiff::unified(expected, actual)
                };
                deferred.push(Deferred {
                    label: format!("{label} field \"{}\"", f.field),
                    body,
                });
                rows.push(vec![f.field.clone(), SEE_DIFF.into(), SEE_DIFF.into()]);
            } else {
                rows.push(vec![f.field.clone(), expected.into(), actual.into()]);
            }
        }
        out.push_str(&aligned(&["field", "expected", "actual"], &rows, indent));
        write_deferred(&deferred, indent, out);
    }

    fn expected_block(&self, label: &str, record: &DatasetRecord, out: &mut String) {
        let mut rows = Vec::new();
        let mut deferred = Vec::new();
        for (field, value) in record.iter() {
            let text = value.as_cell();
            if self.needs_diff(value, text) {
                deferred.push(Deferred {
                    label: format!("{label} field \"{field}\""),
                    body: textdiff::unified(text, ""),
                });
                rows.push(vec![field.to_string(), SEE_DIFF.into()]);
            } else {
                rows.push(vec![field.to_string(), text.into()]);
            }
        }
        out.push_str(&aligned(&["field", "expected"], &rows, "    "));
        write_deferred(&deferred, "    ", out);
    }

    fn actual_block(&self, label: &str, record: &Record, out: &mut String) {
        let mut rows = Vec::new();
        let mut deferred = Vec::new();
        for field in record.keys() {
            let value = ActualValue::of(record, field);
            let text = value.as_str();
            if self.is_long(text) {
                deferred.push(Deferred {
                    label: format!("{label} field \"{field}\""),
                    body: textdiff::unified("", text),
                });
                rows.push(vec![field.clone(), SEE_DIFF.into()]);
            } else {
                rows.push(vec![field.clone(), text.into()]);
            }
        }
        out.push_str(&aligned(&["field", "actual"], &rows, "    "));
        write_deferred(&deferred, "    ", out);
    }

    fn candidate_block(&self, label: &str, candidate: &CandidateDiff, out: &mut String) {
        let _ = writeln!(
            out,
            "    Rejected candidate actual row #{}:",
            candidate.actual_index + 1
        );
        let candidate_label = format!("{label} vs actual row #{}", candidate.actual_index + 1);
        self.mismatch_block(&candidate_label, &candidate.fields, "      ", out);
    }

    fn needs_diff(&self, value: &FieldValue, text: &str) -> bool {
        value.is_markup() || self.is_long(text)
    }

    fn is_long(&self, text: &str) -> bool {
        text.contains('\n') || text.width() > self.options.max_value_width
    }
}

fn key_label(strategy: KeyStrategy, key: Option<&str>, expected_index: usize) -> String {
    match (strategy.key_field(), key) {
        (Some(field), Some(k)) => format!("{field}={k}"),
        _ => format!("#{}", expected_index + 1),
    }
}

fn write_deferred(deferred: &[Deferred], indent: &str, out: &mut String) {
    for d in deferred {
        let _ = writeln!(out, "{indent}Diff for {}:", d.label);
        for line in d.body.lines() {
            let _ = writeln!(out, "{indent}  {line}");
        }
    }
}

/// Column-aligned table. Column width is the widest display width in that column.
fn aligned(headers: &[&str], rows: &[Vec<String>], indent: &str) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.width()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.width());
            }
        }
    }

    let mut out = String::new();
    let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    push_row(&mut out, indent, &header_cells, &widths);

    out.push_str(indent);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&rule.join("-+-"));
    out.push('\n');

    for row in rows {
        push_row(&mut out, indent, row, &widths);
    }
    out
}

fn push_row(out: &mut String, indent: &str, cells: &[String], widths: &[usize]) {
    out.push_str(indent);
    let last = widths.len().saturating_sub(1);
    for (i, w) in widths.iter().enumerate() {
        let cell = cells.get(i).map(String::as_str).unwrap_or("");
        out.push_str(cell);
        if i < last {
            out.push_str(&" ".repeat(w.saturating_sub(cell.width())));
            out.push_str(" | ");
        }
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MatchedPair, TableDiff};

    fn mismatch(field: &str, expected: FieldValue, actual: &str) -> FieldMismatch {
        FieldMismatch {
            field: field.into(),
            expected,
            actual: ActualValue::Value(actual.into()),
        }
    }

    fn report(failures: Vec<RecordFailure>) -> DiffReport {
        DiffReport {
            tables: vec![TableDiff {
                table: "pages".into(),
                strategy: KeyStrategy::ById,
                expected_count: 2,
                actual_count: 2,
                matched: vec![MatchedPair { expected_index: 1, actual_index: 1 }],
                failures,
            }],
        }
    }

    #[test]
    fn clean_report_is_one_line() {
        let out = render(&report(Vec::new()));
        assert_eq!(out, "All 1 table(s) match (1 record(s)).\n");
    }

    #[test]
    fn columns_are_aligned() {
        let out = render(&report(vec![RecordFailure::Mismatch {
            expected_index: 0,
            actual_index: 0,
            key: "1".into(),
            fields: vec![
                mismatch("title", FieldValue::Literal("Home".into()), "Start"),
                mismatch("nav_title", FieldValue::Null, "x"),
            ],
            candidates: Vec::new(),
        }]));
        assert!(out.contains("  Record uid=1: fields differ\n"));
        assert!(out.contains("    field     | expected | actual\n"));
        assert!(out.contains("    ----------+----------+-------\n"), "{out}");
        assert!(out.contains("    title     | Home     | Start\n"));
        assert!(out.contains("    nav_title | NULL     | x\n"));
    }

    #[test]
    fn long_values_are_deferred_to_a_diff() {
        let long_expected = "a".repeat(50);
        let long_actual = format!("{}b", "a".repeat(49));
        let out = render(&report(vec![RecordFailure::Mismatch {
            expected_index: 0,
            actual_index: 0,
            key: "1".into(),
            fields: vec![mismatch("bodytext", FieldValue::Literal(long_expected.clone()), &long_actual)],
            candidates: Vec::new(),
        }]));
        assert!(out.contains("bodytext | [see diff] | [see diff]"));
        assert!(out.contains("Diff for uid=1 field \"bodytext\":"));
        assert!(out.contains(&format!("-{long_expected}")));
        assert!(out.contains(&format!("+{long_actual}")));
    }

    #[test]
    fn markup_values_use_comparator_diff() {
        let out = render(&report(vec![RecordFailure::Mismatch {
            expected_index: 0,
            actual_index: 0,
            key: "1".into(),
            fields: vec![mismatch(
                "pi_flexform",
                FieldValue::Markup("<?xml version=\"1.0\"?><r><a>1</a></r>".into()),
                "<?xml version=\"1.0\"?><r><a>2</a></r>",
            )],
            candidates: Vec::new(),
        }]));
        assert!(out.contains("pi_flexform | [see diff] | [see diff]"));
        assert!(out.contains("-  <a>1</a>"));
        assert!(out.contains("+  <a>2</a>"));
    }

    #[test]
    fn mismatch_lists_rejected_rows_with_same_key() {
        let out = render(&report(vec![RecordFailure::Mismatch {
            expected_index: 0,
            actual_index: 0,
            key: "1".into(),
            fields: vec![mismatch("title", FieldValue::Literal("Home".into()), "Start")],
            candidates: vec![CandidateDiff {
                actual_index: 2,
                fields: vec![mismatch("pid", FieldValue::Literal("0".into()), "7")],
            }],
        }]));
        assert!(out.contains("    title | Home     | Start\n"), "{out}");
        assert!(out.contains("    Rejected candidate actual row #3:\n"));
        assert!(out.contains("      pid   | 0        | 7\n"), "{out}");
    }

    #[test]
    fn missing_and_unexpected_are_labelled() {
        let mut actual = Record::new();
        actual.insert("uid".into(), Some("3".into()));
        actual.insert("title".into(), None);
        let out = render(&report(vec![
            RecordFailure::Missing {
                expected_index: 1,
                key: Some("2".into()),
                reason: MissingReason::NotFound,
                expected: DatasetRecord::new(vec![("uid".into(), FieldValue::Literal("2".into()))]),
                candidates: Vec::new(),
            },
            RecordFailure::Unexpected { actual_index: 0, key: Some("3".into()), actual },
        ]));
        assert!(out.starts_with("Dataset mismatch: 1 of 1 table(s) differ (1 missing, 0 mismatched, 1 unexpected)"));
        assert!(out.contains("  Record uid=2: not found\n"));
        assert!(out.contains("  Unexpected record uid=3\n"));
        assert!(out.contains("    title | NULL\n"));
    }
}
