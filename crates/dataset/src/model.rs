use std::collections::BTreeMap;

use serde::Serialize;

/// Bare cell text that marks a field as "ignore this field".
pub const WILDCARD: &str = "\\*";
/// Bare cell text for an explicit null. Quoted, it is literal text.
pub const NULL: &str = "NULL";
/// Prefix that turns a cell into a markup fragment.
pub const MARKUP_PROLOGUE: &str = "<?xml";

pub const UID_FIELD: &str = "uid";
pub const HASH_FIELD: &str = "hash";

// ---------------------------------------------------------------------------
// Actual records
// ---------------------------------------------------------------------------

/// A row fetched from a live connection: field name to value, `None` for NULL.
pub type Record = BTreeMap<String, Option<String>>;

// ---------------------------------------------------------------------------
// Expected values
// ---------------------------------------------------------------------------

/// One expected cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Literal(String),
    Null,
    /// Matches any actual value, including an absent field.
    Wildcard,
    /// Compared by structure, not bytes.
    Markup(String),
}

impl FieldValue {
    /// Classify a bare (unquoted) cell from the golden format.
    pub fn from_cell(cell: &str) -> Self {
        if cell == WILDCARD {
            Self::Wildcard
        } else if cell == NULL {
            Self::Null
        } else if cell.starts_with(MARKUP_PROLOGUE) {
            Self::Markup(cell.to_string())
        } else {
            Self::Literal(cell.to_string())
        }
    }

    /// Classify a quoted cell. Quoting turns the markers into literal text.
    pub fn from_quoted_cell(cell: &str) -> Self {
        if cell.starts_with(MARKUP_PROLOGUE) {
            Self::Markup(cell.to_string())
        } else {
            Self::Literal(cell.to_string())
        }
    }

    /// Lift a fetched value into an expected value (used when exporting live tables).
    pub fn from_actual(value: Option<&str>) -> Self {
        match value {
            None => Self::Null,
            Some(v) if v.starts_with(MARKUP_PROLOGUE) => Self::Markup(v.to_string()),
            Some(v) => Self::Literal(v.to_string()),
        }
    }

    /// Text used in the golden format and in reports.
    pub fn as_cell(&self) -> &str {
        match self {
            Self::Literal(s) | Self::Markup(s) => s,
            Self::Null => NULL,
            Self::Wildcard => WILDCARD,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard)
    }

    pub fn is_markup(&self) -> bool {
        matches!(self, Self::Markup(_))
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_cell())
    }
}

// ---------------------------------------------------------------------------
// Key strategy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrategy {
    /// Keyed by the `uid` column.
    ById,
    /// Keyed by the `hash` column.
    ByHash,
    /// No stable key: order-independent first-fit compare.
    Positional,
}

impl KeyStrategy {
    /// `uid` wins over `hash` when a table has both.
    pub fn infer<S: AsRef<str>>(columns: &[S]) -> Self {
        if columns.iter().any(|c| c.as_ref() == UID_FIELD) {
            Self::ById
        } else if columns.iter().any(|c| c.as_ref() == HASH_FIELD) {
            Self::ByHash
        } else {
            Self::Positional
        }
    }

    pub fn key_field(&self) -> Option<&'static str> {
        match self {
            Self::ById => Some(UID_FIELD),
            Self::ByHash => Some(HASH_FIELD),
            Self::Positional => None,
        }
    }
}

impl std::fmt::Display for KeyStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ById => write!(f, "byId"),
            Self::ByHash => write!(f, "byHash"),
            Self::Positional => write!(f, "positional"),
        }
    }
}

// ---------------------------------------------------------------------------
// Records + tables
// ---------------------------------------------------------------------------

/// Expected record. Fields keep header order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DatasetRecord {
    pub fields: Vec<(String, FieldValue)>,
}

impl DatasetRecord {
    pub fn new(fields: Vec<(String, FieldValue)>) -> Self {
        Self { fields }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(name, _)| name == field).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, v)| (name.as_str(), v))
    }

    /// The literal key under `strategy`, if this record has one.
    /// Wildcard and NULL keys yield `None`.
    pub fn key(&self, strategy: KeyStrategy) -> Option<&str> {
        let field = strategy.key_field()?;
        match self.get(field)? {
            FieldValue::Literal(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetTable {
    pub name: String,
    pub columns: Vec<String>,
    pub records: Vec<DatasetRecord>,
    pub strategy: KeyStrategy,
}

impl DatasetTable {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        let strategy = KeyStrategy::infer(&columns);
        Self {
            name: name.into(),
            columns,
            records: Vec::new(),
            strategy,
        }
    }

    /// Build a table from fetched rows, keeping only `columns`.
    /// Columns missing from a row become NULL.
    pub fn from_records(name: impl Into<String>, columns: Vec<String>, rows: &[Record]) -> Self {
        let mut table = Self::new(name, columns);
        for row in rows {
            let fields = table
                .columns
                .iter()
                .map(|c| {
                    let value = row.get(c).and_then(|v| v.as_deref());
                    (c.clone(), FieldValue::from_actual(value))
                })
                .collect();
            table.records.push(DatasetRecord::new(fields));
        }
        table
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parsed golden dataset. Tables keep source order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Dataset {
    pub tables: Vec<DatasetTable>,
}

impl Dataset {
    pub fn table(&self, name: &str) -> Option<&DatasetTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name.as_str())
    }
}
