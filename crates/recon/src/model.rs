use serde::Serialize;
use snapfix_dataset::{DatasetRecord, FieldValue, KeyStrategy, Record};

// ---------------------------------------------------------------------------
// Field level
// ---------------------------------------------------------------------------

/// The actual side of a compared field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ActualValue {
    Value(String),
    Null,
    /// The actual record has no such field.
    Absent,
}

impl ActualValue {
    pub fn of(record: &Record, field: &str) -> Self {
        match record.get(field) {
            Some(Some(v)) => Self::Value(v.clone()),
            Some(None) => Self::Null,
            None => Self::Absent,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Value(v) => v,
            Self::Null => "NULL",
            Self::Absent => "<absent>",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMismatch {
    pub field: String,
    pub expected: FieldValue,
    pub actual: ActualValue,
}

// ---------------------------------------------------------------------------
// Record level
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingReason {
    /// Keyed table: no actual record carries the key.
    NotFound,
    /// Keyed table: every actual record with the key was consumed by an earlier expectation.
    KeyAlreadyClaimed,
    /// First-fit: no remaining actual record matched every field.
    NoMatch,
}

/// A rejected actual record that agreed with the expectation on at least one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateDiff {
    pub actual_index: usize,
    pub fields: Vec<FieldMismatch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordFailure {
    Missing {
        expected_index: usize,
        key: Option<String>,
        reason: MissingReason,
        expected: DatasetRecord,
        candidates: Vec<CandidateDiff>,
    },
    /// Keyed table: the key was found but other fields differ.
    Mismatch {
        expected_index: usize,
        actual_index: usize,
        key: String,
        fields: Vec<FieldMismatch>,
        /// Other rows with the same key, also rejected.
        candidates: Vec<CandidateDiff>,
    },
    Unexpected {
        actual_index: usize,
        key: Option<String>,
        actual: Record,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatchedPair {
    pub expected_index: usize,
    pub actual_index: usize,
}

// ---------------------------------------------------------------------------
// Table + report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct TableDiff {
    pub table: String,
    pub strategy: KeyStrategy,
    pub expected_count: usize,
    pub actual_count: usize,
    pub matched: Vec<MatchedPair>,
    pub failures: Vec<RecordFailure>,
}

impl TableDiff {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn missing(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| matches!(f, RecordFailure::Missing { .. }))
            .count()
    }

    pub fn mismatched(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| matches!(f, RecordFailure::Mismatch { .. }))
            .count()
    }

    pub fn unexpected(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| matches!(f, RecordFailure::Unexpected { .. }))
            .count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub tables: usize,
    pub failing_tables: usize,
    pub matched: usize,
    pub missing: usize,
    pub mismatched: usize,
    pub unexpected: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DiffReport {
    pub tables: Vec<TableDiff>,
}

impl DiffReport {
    pub fn is_clean(&self) -> bool {
        self.tables.iter().all(TableDiff::is_clean)
    }

    pub fn table(&self, name: &str) -> Option<&TableDiff> {
        self.tables.iter().find(|t| t.table == name)
    }

    pub fn summary(&self) -> DiffSummary {
        let mut summary = DiffSummary {
            tables: self.tables.len(),
            ..DiffSummary::default()
        };
        for t in &self.tables {
            if !t.is_clean() {
                summary.failing_tables += 1;
            }
            summary.matched += t.matched.len();
            summary.missing += t.missing();
            summary.mismatched += t.mismatched();
            summary.unexpected += t.unexpected();
        }
        summary
    }
}
