use std::collections::HashMap;

use snapfix_dataset::{Dataset, DatasetRecord, DatasetTable, FieldValue, KeyStrategy, Record};

use crate::markup::{MarkupComparator, XmlComparator};
use crate::model::{
    ActualValue, CandidateDiff, DiffReport, FieldMismatch, MatchedPair, MissingReason,
    RecordFailure, TableDiff,
};

/// Reconcile one expected table against fetched rows with the default
/// markup comparator.
pub fn reconcile(expected: &DatasetTable, actual: &[Record]) -> TableDiff {
    Differ::default().reconcile(expected, actual)
}

/// Field-by-field outcome of comparing one expected record with one actual record.
#[derive(Debug, Default)]
pub struct Comparison {
    pub mismatches: Vec<FieldMismatch>,
    /// Non-wildcard fields that agreed.
    pub agreed: usize,
}

impl Comparison {
    pub fn is_match(&self) -> bool {
        self.mismatches.is_empty()
    }
}

pub struct Differ {
    comparator: Box<dyn MarkupComparator>,
}

impl Default for Differ {
    fn default() -> Self {
        Self::with_comparator(Box::new(XmlComparator))
    }
}

impl Differ {
    pub fn with_comparator(comparator: Box<dyn MarkupComparator>) -> Self {
        Self { comparator }
    }

    pub fn comparator(&self) -> &dyn MarkupComparator {
        self.comparator.as_ref()
    }

    /// Reconcile every table of `dataset`. Tables absent from `actual` are
    /// treated as empty; actual tables the dataset does not name are ignored.
    pub fn reconcile_dataset(
        &self,
        dataset: &Dataset,
        actual: &HashMap<String, Vec<Record>>,
    ) -> DiffReport {
        let tables = dataset
            .tables
            .iter()
            .map(|t| {
                let rows = actual.get(&t.name).map(|v| v.as_slice()).unwrap_or(&[]);
                self.reconcile(t, rows)
            })
            .collect();
        DiffReport { tables }
    }

    pub fn reconcile(&self, expected: &DatasetTable, actual: &[Record]) -> TableDiff {
        let strategy = expected.strategy;
        let mut pass = TablePass {
            differ: self,
            strategy,
            actual,
            claimed: vec![false; actual.len()],
            index: build_key_index(strategy, actual),
            matched: Vec::new(),
            failures: Vec::new(),
        };

        for (ei, record) in expected.records.iter().enumerate() {
            match record.key(strategy) {
                Some(key) => pass.match_by_key(ei, key, record),
                None => pass.match_first_fit(ei, record),
            }
        }

        let TablePass { claimed, matched, mut failures, .. } = pass;

        for (ai, row) in actual.iter().enumerate() {
            if claimed[ai] {
                continue;
            }
            failures.push(RecordFailure::Unexpected {
                actual_index: ai,
                key: actual_key(strategy, row).map(str::to_string),
                actual: row.clone(),
            });
        }

        let diff = TableDiff {
            table: expected.name.clone(),
            strategy,
            expected_count: expected.records.len(),
            actual_count: actual.len(),
            matched,
            failures,
        };
        log::debug!(
            "reconciled '{}' ({}): {} matched, {} missing, {} mismatched, {} unexpected",
            diff.table,
            diff.strategy,
            diff.matched.len(),
            diff.missing(),
            diff.mismatched(),
            diff.unexpected()
        );
        diff
    }

    /// Compare every expected field that is not a wildcard. Actual fields the
    /// expectation does not name are ignored.
    pub fn compare(&self, expected: &DatasetRecord, actual: &Record) -> Comparison {
        let mut out = Comparison::default();
        for (field, want) in expected.iter() {
            if want.is_wildcard() {
                continue;
            }
            let got = ActualValue::of(actual, field);
            if self.field_matches(want, &got) {
                out.agreed += 1;
            } else {
                out.mismatches.push(FieldMismatch {
                    field: field.to_string(),
                    expected: want.clone(),
                    actual: got,
                });
            }
        }
        out
    }

    fn field_matches(&self, want: &FieldValue, got: &ActualValue) -> bool {
        match (want, got) {
            (FieldValue::Wildcard, _) => true,
            (FieldValue::Null, ActualValue::Null) => true,
            (FieldValue::Literal(w), ActualValue::Value(g)) => w == g,
            (FieldValue::Markup(w), ActualValue::Value(g)) => {
                self.comparator.structurally_equal(w, g)
            }
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-table matching state
// ---------------------------------------------------------------------------

struct TablePass<'a> {
    differ: &'a Differ,
    strategy: KeyStrategy,
    actual: &'a [Record],
    /// Claimed bitset over `actual`, indexed by position.
    claimed: Vec<bool>,
    /// Key value -> positions in `actual`, in input order.
    index: HashMap<&'a str, Vec<usize>>,
    matched: Vec<MatchedPair>,
    failures: Vec<RecordFailure>,
}

impl TablePass<'_> {
    fn claim(&mut self, expected_index: usize, actual_index: usize) {
        self.claimed[actual_index] = true;
        self.matched.push(MatchedPair { expected_index, actual_index });
    }

    /// Index lookup, then full-field verification. A key hit that fails
    /// verification consumes the first such row and reports a field mismatch,
    /// listing the other rejected rows with the same key as candidates.
    fn match_by_key(&mut self, ei: usize, key: &str, record: &DatasetRecord) {
        let positions: Vec<usize> = self.index.get(key).cloned().unwrap_or_default();
        if positions.is_empty() {
            self.failures.push(RecordFailure::Missing {
                expected_index: ei,
                key: Some(key.to_string()),
                reason: MissingReason::NotFound,
                expected: record.clone(),
                candidates: Vec::new(),
            });
            return;
        }

        let open: Vec<usize> = positions.into_iter().filter(|&ai| !self.claimed[ai]).collect();
        let mut rejected: Vec<(usize, Comparison)> = Vec::new();
        for ai in open {
            let cmp = self.differ.compare(record, &self.actual[ai]);
            if cmp.is_match() {
                self.claim(ei, ai);
                return;
            }
            rejected.push((ai, cmp));
        }

        let mut rejected = rejected.into_iter();
        match rejected.next() {
            Some((ai, cmp)) => {
                self.claimed[ai] = true;
                // rows sharing the key stay unclaimed
                let candidates = rejected
                    .map(|(actual_index, cmp)| CandidateDiff {
                        actual_index,
                        fields: cmp.mismatches,
                    })
                    .collect();
                self.failures.push(RecordFailure::Mismatch {
                    expected_index: ei,
                    actual_index: ai,
                    key: key.to_string(),
                    fields: cmp.mismatches,
                    candidates,
                });
            }
            None => self.failures.push(RecordFailure::Missing {
                expected_index: ei,
                key: Some(key.to_string()),
                reason: MissingReason::KeyAlreadyClaimed,
                expected: record.clone(),
                candidates: Vec::new(),
            }),
        }
    }

    /// First unclaimed row, in input order, that matches every field.
    fn match_first_fit(&mut self, ei: usize, record: &DatasetRecord) {
        let mut candidates = Vec::new();
        for ai in 0..self.actual.len() {
            if self.claimed[ai] {
                continue;
            }
            let cmp = self.differ.compare(record, &self.actual[ai]);
            if cmp.is_match() {
                self.claim(ei, ai);
                return;
            }
            if cmp.agreed > 0 {
                candidates.push(CandidateDiff {
                    actual_index: ai,
                    fields: cmp.mismatches,
                });
            }
        }

        self.failures.push(RecordFailure::Missing {
            expected_index: ei,
            key: None,
            reason: MissingReason::NoMatch,
            expected: record.clone(),
            candidates,
        });
    }
}

fn build_key_index(strategy: KeyStrategy, actual: &[Record]) -> HashMap<&str, Vec<usize>> {
    let mut index: HashMap<&str, Vec<usize>> = HashMap::new();
    if strategy.key_field().is_none() {
        return index;
    }
    for (ai, row) in actual.iter().enumerate() {
        if let Some(key) = actual_key(strategy, row) {
            index.entry(key).or_default().push(ai);
        }
    }
    index
}

fn actual_key(strategy: KeyStrategy, row: &Record) -> Option<&str> {
    let field = strategy.key_field()?;
    row.get(field)?.as_deref()
}
