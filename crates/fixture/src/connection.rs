use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use snapfix_dataset::Record;

use crate::error::FixtureError;

/// How a backend produces its snapshot image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Image is a byte copy of the database file.
    Sqlite,
    /// Image is a data dump; sequences must be reset after loading it.
    InMemory,
}

impl Platform {
    /// File-backed images carry their sequence counters with them.
    pub fn is_file_backed(&self) -> bool {
        matches!(self, Self::Sqlite)
    }

    pub fn image_file_name(&self) -> &'static str {
        match self {
            Self::Sqlite => "database.sqlite",
            Self::InMemory => "dump.json",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite => write!(f, "sqlite"),
            Self::InMemory => write!(f, "in-memory"),
        }
    }
}

/// A test database the fixture layer can populate, query and snapshot.
pub trait Connection {
    fn platform(&self) -> Platform;

    /// User tables, sorted by name.
    fn tables(&self) -> Result<Vec<String>, FixtureError>;

    /// All rows of `table`. Row order is unspecified.
    fn query(&self, table: &str) -> Result<Vec<Record>, FixtureError>;

    /// Insert a row and return its `uid`/row id.
    fn insert(&mut self, table: &str, row: &Record) -> Result<i64, FixtureError>;

    /// Apply `changes` to rows where `key_field = key_value`. Returns the
    /// number of rows touched.
    fn update(
        &mut self,
        table: &str,
        key_field: &str,
        key_value: &str,
        changes: &Record,
    ) -> Result<usize, FixtureError>;

    fn delete(&mut self, table: &str, key_field: &str, key_value: &str)
        -> Result<usize, FixtureError>;

    /// Set the auto-increment counter so the next insert gets `max(uid) + 1`.
    fn reset_sequences(&mut self, table: &str) -> Result<(), FixtureError>;

    /// Write the full database state to `dest`.
    fn write_image(&self, dest: &Path) -> Result<(), FixtureError>;

    /// Replace the full database state with the image at `src`.
    fn read_image(&mut self, src: &Path) -> Result<(), FixtureError>;
}
