// In-memory connection. Images are JSON dumps of each table's rows and its
// next id, so ids handed out after a restore match a fresh build.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use snapfix_dataset::model::UID_FIELD;
use snapfix_dataset::Record;

use crate::connection::{Connection, Platform};
use crate::error::FixtureError;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MemoryTable {
    rows: Vec<Record>,
    next_id: i64,
}

impl Default for MemoryTable {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            next_id: 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryConnection {
    tables: BTreeMap<String, MemoryTable>,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// No-op when the table already exists.
    pub fn create_table(&mut self, name: &str) {
        self.tables.entry(name.to_string()).or_default();
    }

    /// Id the next insert without an explicit `uid` will receive.
    pub fn next_id(&self, table: &str) -> Option<i64> {
        self.tables.get(table).map(|t| t.next_id)
    }

    fn table(&self, name: &str) -> Result<&MemoryTable, FixtureError> {
        self.tables
            .get(name)
            .ok_or_else(|| FixtureError::Connection(format!("no such table: {name}")))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut MemoryTable, FixtureError> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| FixtureError::Connection(format!("no such table: {name}")))
    }
}

fn uid_of(row: &Record) -> Option<i64> {
    row.get(UID_FIELD)?.as_deref()?.parse().ok()
}

impl Connection for MemoryConnection {
    fn platform(&self) -> Platform {
        Platform::InMemory
    }

    fn tables(&self) -> Result<Vec<String>, FixtureError> {
        Ok(self.tables.keys().cloned().collect())
    }

    fn query(&self, table: &str) -> Result<Vec<Record>, FixtureError> {
        Ok(self.table(table)?.rows.clone())
    }

    fn insert(&mut self, table: &str, row: &Record) -> Result<i64, FixtureError> {
        let t = self.table_mut(table)?;
        let mut row = row.clone();
        let uid = match uid_of(&row) {
            Some(uid) => {
                if t.rows.iter().any(|r| uid_of(r) == Some(uid)) {
                    return Err(FixtureError::Connection(format!(
                        "duplicate {UID_FIELD} {uid} in {table}"
                    )));
                }
                uid
            }
            None => {
                row.insert(UID_FIELD.to_string(), Some(t.next_id.to_string()));
                t.next_id
            }
        };
        t.next_id = t.next_id.max(uid + 1);
        t.rows.push(row);
        Ok(uid)
    }

    fn update(
        &mut self,
        table: &str,
        key_field: &str,
        key_value: &str,
        changes: &Record,
    ) -> Result<usize, FixtureError> {
        let t = self.table_mut(table)?;
        let mut touched = 0;
        for row in t
            .rows
            .iter_mut()
            .filter(|r| r.get(key_field).and_then(|v| v.as_deref()) == Some(key_value))
        {
            for (field, value) in changes {
                row.insert(field.clone(), value.clone());
            }
            touched += 1;
        }
        Ok(touched)
    }

    fn delete(
        &mut self,
        table: &str,
        key_field: &str,
        key_value: &str,
    ) -> Result<usize, FixtureError> {
        let t = self.table_mut(table)?;
        let before = t.rows.len();
        t.rows
            .retain(|r| r.get(key_field).and_then(|v| v.as_deref()) != Some(key_value));
        Ok(before - t.rows.len())
    }

    /// Never moves the counter below what the table already handed out.
    fn reset_sequences(&mut self, table: &str) -> Result<(), FixtureError> {
        let t = self.table_mut(table)?;
        let floor = t.rows.iter().filter_map(uid_of).max().unwrap_or(0) + 1;
        t.next_id = t.next_id.max(floor);
        Ok(())
    }

    fn write_image(&self, dest: &Path) -> Result<(), FixtureError> {
        let json = serde_json::to_vec(&self.tables)
            .map_err(|e| FixtureError::Connection(format!("cannot serialize dump: {e}")))?;
        fs::write(dest, json)
            .map_err(|e| FixtureError::Connection(format!("cannot write {}: {e}", dest.display())))
    }

    fn read_image(&mut self, src: &Path) -> Result<(), FixtureError> {
        let bytes = fs::read(src)
            .map_err(|e| FixtureError::Connection(format!("cannot read {}: {e}", src.display())))?;
        self.tables = serde_json::from_slice(&bytes)
            .map_err(|e| FixtureError::Connection(format!("corrupt dump {}: {e}", src.display())))?;
        Ok(())
    }
}
