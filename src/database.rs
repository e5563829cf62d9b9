//! A directory of table files: connect, create/open/drop tables, and close
//! everything cleanly.
//!
//! Grounded on `mermoldy-mysqlite`'s `database.rs::Database`, trimmed to
//! the single-open-handle-per-table discipline the core actually promises
//! (the teacher's version hands out `Arc<Mutex<Table>>` for concurrent SQL
//! sessions; this engine's concurrency model is single-threaded per table,
//! so `Database` just owns each `Table` outright once opened).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::errors::{Error, Result};
use crate::storage::{Table, TableOptions, TableSchema};

const TABLE_EXTENSION: &str = "db";

pub struct Database {
    dir: PathBuf,
    open_tables: HashMap<String, Table>,
}

impl Database {
    /// Ensures `dir` exists and returns a handle with no tables open yet.
    pub fn connect(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Database {
            dir,
            open_tables: HashMap::new(),
        })
    }

    fn table_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, TABLE_EXTENSION))
    }

    /// Creates a new table file. Fails with `AlreadyExists` if the file, or
    /// an already-open handle under this name, is present.
    pub fn create_table(&mut self, name: &str, schema: TableSchema, options: TableOptions) -> Result<()> {
        if self.open_tables.contains_key(name) || self.table_path(name).exists() {
            return Err(Error::AlreadyExists(name.to_string()));
        }
        let table = Table::open(self.table_path(name), name, schema, options)?;
        info!(table = name, "created table");
        self.open_tables.insert(name.to_string(), table);
        Ok(())
    }

    /// Opens an existing table file, given its schema (the core does not
    /// persist schemas — see §4.7). Fails with `NotFound` if the file is
    /// absent, or `AlreadyExists` if it is already open.
    pub fn open_table(&mut self, name: &str, schema: TableSchema, options: TableOptions) -> Result<()> {
        if self.open_tables.contains_key(name) {
            return Err(Error::AlreadyExists(format!("table '{}' is already open", name)));
        }
        if !self.table_path(name).exists() {
            return Err(Error::NotFound(format!("table '{}'", name)));
        }
        let table = Table::open(self.table_path(name), name, schema, options)?;
        self.open_tables.insert(name.to_string(), table);
        Ok(())
    }

    pub fn table(&mut self, name: &str) -> Result<&mut Table> {
        self.open_tables
            .get_mut(name)
            .ok_or_else(|| Error::NotFound(format!("table '{}' is not open", name)))
    }

    pub fn is_open(&self, name: &str) -> bool {
        self.open_tables.contains_key(name)
    }

    /// Closes (flushing) and unlinks a table's file.
    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        if let Some(table) = self.open_tables.remove(name) {
            table.close()?;
        }
        let path = self.table_path(name);
        if !path.exists() {
            return Err(Error::NotFound(format!("table '{}'", name)));
        }
        std::fs::remove_file(path)?;
        info!(table = name, "dropped table");
        Ok(())
    }

    /// Closes an open table's handle without deleting its file.
    pub fn close_table(&mut self, name: &str) -> Result<()> {
        match self.open_tables.remove(name) {
            Some(table) => table.close(),
            None => Err(Error::NotFound(format!("table '{}' is not open", name))),
        }
    }

    /// Every `<name>.db` file in the directory, open or not.
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(TABLE_EXTENSION) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Closes every open table, flushing each. Collects (rather than
    /// short-circuits on) per-table flush failures so one bad table doesn't
    /// leave the rest unflushed.
    pub fn close(&mut self) -> Result<()> {
        let names: Vec<String> = self.open_tables.keys().cloned().collect();
        let mut first_err = None;
        for name in names {
            if let Some(table) = self.open_tables.remove(&name) {
                if let Err(e) = table.close() {
                    warn!(table = %name, error = %e, "failed to flush table on close");
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ColumnSchema, ColumnType};

    fn schema() -> TableSchema {
        TableSchema::new(vec![ColumnSchema {
            name: "id".into(),
            type_: ColumnType::U32,
        }])
        .unwrap()
    }

    #[test]
    fn create_then_reopen_fails_while_open() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::connect(dir.path()).unwrap();
        db.create_table("users", schema(), TableOptions::default()).unwrap();
        let err = db.create_table("users", schema(), TableOptions::default());
        assert!(matches!(err, Err(Error::AlreadyExists(_))));
    }

    #[test]
    fn drop_table_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::connect(dir.path()).unwrap();
        db.create_table("users", schema(), TableOptions::default()).unwrap();
        db.drop_table("users").unwrap();
        assert!(!dir.path().join("users.db").exists());
        assert!(matches!(db.drop_table("users"), Err(Error::NotFound(_))));
    }

    #[test]
    fn list_tables_reflects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::connect(dir.path()).unwrap();
        db.create_table("a", schema(), TableOptions::default()).unwrap();
        db.create_table("b", schema(), TableOptions::default()).unwrap();
        assert_eq!(db.list_tables().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn open_table_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::connect(dir.path()).unwrap();
        let err = db.open_table("ghost", schema(), TableOptions::default());
        assert!(matches!(err, Err(Error::NotFound(_))));
    }
}
