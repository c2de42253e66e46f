// SQLite connection. Images are page copies made with the online backup API,
// so sqlite_sequence travels with the image.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::backup::Backup;
use rusqlite::types::ValueRef;
use rusqlite::OpenFlags;
use snapfix_dataset::Record;

use crate::connection::{Connection, Platform};
use crate::error::FixtureError;

const PAGES_PER_STEP: i32 = 256;

pub struct SqliteConnection {
    conn: rusqlite::Connection,
    path: Option<PathBuf>,
}

impl SqliteConnection {
    pub fn open(path: &Path) -> Result<Self, FixtureError> {
        let conn = rusqlite::Connection::open(path)
            .map_err(|e| FixtureError::Connection(format!("cannot open {}: {e}", path.display())))?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> Result<Self, FixtureError> {
        Ok(Self {
            conn: rusqlite::Connection::open_in_memory()?,
            path: None,
        })
    }

    /// Database file, `None` for an in-memory database.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn execute_batch(&self, sql: &str) -> Result<(), FixtureError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Column names in declaration order.
    pub fn columns(&self, table: &str) -> Result<Vec<String>, FixtureError> {
        let stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {} LIMIT 0", quote_ident(table)))?;
        Ok(stmt.column_names().iter().map(|c| c.to_string()).collect())
    }

    fn has_sequence_table(&self) -> Result<bool, FixtureError> {
        let n: i64 = self.conn.query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = 'sqlite_sequence'",
            [],
            |row| row.get(0),
        )?;
        Ok(n > 0)
    }
}

impl Connection for SqliteConnection {
    fn platform(&self) -> Platform {
        Platform::Sqlite
    }

    fn tables(&self) -> Result<Vec<String>, FixtureError> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn query(&self, table: &str) -> Result<Vec<Record>, FixtureError> {
        let mut stmt = self.conn.prepare(&format!("SELECT * FROM {}", quote_ident(table)))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Record::new();
            for (i, name) in columns.iter().enumerate() {
                record.insert(name.clone(), cell_text(row.get_ref(i)?));
            }
            out.push(record);
        }
        log::trace!("query {table}: {} row(s)", out.len());
        Ok(out)
    }

    fn insert(&mut self, table: &str, row: &Record) -> Result<i64, FixtureError> {
        let sql = if row.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote_ident(table))
        } else {
            let columns: Vec<String> = row.keys().map(|k| quote_ident(k)).collect();
            let params: Vec<String> = (1..=row.len()).map(|i| format!("?{i}")).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_ident(table),
                columns.join(", "),
                params.join(", ")
            )
        };
        self.conn.execute(&sql, rusqlite::params_from_iter(row.values()))?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update(
        &mut self,
        table: &str,
        key_field: &str,
        key_value: &str,
        changes: &Record,
    ) -> Result<usize, FixtureError> {
        if changes.is_empty() {
            return Ok(0);
        }
        let assignments: Vec<String> = changes
            .keys()
            .enumerate()
            .map(|(i, k)| format!("{} = ?{}", quote_ident(k), i + 1))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            quote_ident(table),
            assignments.join(", "),
            quote_ident(key_field),
            changes.len() + 1
        );
        let key = Some(key_value.to_string());
        let params = changes.values().chain(std::iter::once(&key));
        Ok(self.conn.execute(&sql, rusqlite::params_from_iter(params))?)
    }

    fn delete(
        &mut self,
        table: &str,
        key_field: &str,
        key_value: &str,
    ) -> Result<usize, FixtureError> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1",
            quote_ident(table),
            quote_ident(key_field)
        );
        Ok(self.conn.execute(&sql, [key_value])?)
    }

    fn reset_sequences(&mut self, table: &str) -> Result<(), FixtureError> {
        // Tables without AUTOINCREMENT already continue at max(rowid) + 1.
        if !self.has_sequence_table()? {
            return Ok(());
        }
        let sql = format!(
            "UPDATE sqlite_sequence SET seq = (SELECT COALESCE(MAX(rowid), 0) FROM {}) \
             WHERE name = ?1",
            quote_ident(table)
        );
        self.conn.execute(&sql, [table])?;
        Ok(())
    }

    fn write_image(&self, dest: &Path) -> Result<(), FixtureError> {
        let mut target = rusqlite::Connection::open(dest)?;
        let backup = Backup::new(&self.conn, &mut target)?;
        backup.run_to_completion(PAGES_PER_STEP, Duration::ZERO, None)?;
        Ok(())
    }

    fn read_image(&mut self, src: &Path) -> Result<(), FixtureError> {
        let source = rusqlite::Connection::open_with_flags(
            src,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let backup = Backup::new(&source, &mut self.conn)?;
        backup.run_to_completion(PAGES_PER_STEP, Duration::ZERO, None)?;
        Ok(())
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn cell_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) | ValueRef::Blob(t) => Some(String::from_utf8_lossy(t).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages() -> SqliteConnection {
        let conn = SqliteConnection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE pages (uid INTEGER PRIMARY KEY AUTOINCREMENT, pid INTEGER, title TEXT);",
        )
        .unwrap();
        conn
    }

    fn row(pairs: &[(&str, Option<&str>)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
            .collect()
    }

    #[test]
    fn insert_and_query() {
        let mut conn = pages();
        let uid = conn
            .insert("pages", &row(&[("pid", Some("0")), ("title", Some("Home"))]))
            .unwrap();
        assert_eq!(uid, 1);
        conn.insert("pages", &row(&[("pid", Some("1")), ("title", None)])).unwrap();

        let rows = conn.query("pages").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["uid"].as_deref(), Some("1"));
        assert_eq!(rows[0]["title"].as_deref(), Some("Home"));
        assert_eq!(rows[1]["title"], None);
    }

    #[test]
    fn update_and_delete_by_key() {
        let mut conn = pages();
        conn.insert("pages", &row(&[("title", Some("Home"))])).unwrap();
        conn.insert("pages", &row(&[("title", Some("About"))])).unwrap();

        let n = conn
            .update("pages", "uid", "2", &row(&[("title", Some("Team"))]))
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(conn.delete("pages", "uid", "1").unwrap(), 1);

        let rows = conn.query("pages").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["title"].as_deref(), Some("Team"));
    }

    #[test]
    fn tables_skip_internal() {
        let mut conn = pages();
        conn.insert("pages", &row(&[("title", Some("Home"))])).unwrap();
        conn.execute_batch("CREATE TABLE be_users (uid INTEGER PRIMARY KEY, username TEXT);")
            .unwrap();
        assert_eq!(conn.tables().unwrap(), ["be_users", "pages"]);
    }

    #[test]
    fn columns_keep_declaration_order() {
        let conn = pages();
        assert_eq!(conn.columns("pages").unwrap(), ["uid", "pid", "title"]);
    }

    #[test]
    fn query_unknown_table_is_connection_error() {
        let conn = pages();
        assert!(matches!(conn.query("nope"), Err(FixtureError::Connection(_))));
    }

    #[test]
    fn reset_sequences_follows_max_uid() {
        let mut conn = pages();
        for _ in 0..3 {
            conn.insert("pages", &row(&[("title", Some("x"))])).unwrap();
        }
        conn.delete("pages", "uid", "3").unwrap();
        conn.reset_sequences("pages").unwrap();
        let uid = conn.insert("pages", &row(&[("title", Some("y"))])).unwrap();
        assert_eq!(uid, 3);
    }

    #[test]
    fn image_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("db.sqlite");

        let mut conn = pages();
        conn.insert("pages", &row(&[("title", Some("Home"))])).unwrap();
        conn.write_image(&image).unwrap();

        conn.insert("pages", &row(&[("title", Some("Later"))])).unwrap();
        conn.read_image(&image).unwrap();
        assert_eq!(conn.query("pages").unwrap().len(), 1);

        // sqlite_sequence came back with the image
        let uid = conn.insert("pages", &row(&[("title", Some("Next"))])).unwrap();
        assert_eq!(uid, 2);
    }
}
