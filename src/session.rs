//! The REPL's and server's shared notion of "the currently open database",
//! plus the schemas it has been told about (the core itself never persists
//! them — see §4.7).

use std::collections::HashMap;
use std::path::Path;

use leafdb::database::Database;
use leafdb::errors::Result;
use leafdb::storage::TableSchema;

pub struct Session {
    pub database: Database,
    schemas: HashMap<String, TableSchema>,
}

impl Session {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        Ok(Session {
            database: Database::connect(dir)?,
            schemas: HashMap::new(),
        })
    }

    pub fn remember_schema(&mut self, table: &str, schema: TableSchema) {
        self.schemas.insert(table.to_string(), schema);
    }

    pub fn schema(&self, table: &str) -> Option<&TableSchema> {
        self.schemas.get(table)
    }

    pub fn forget_schema(&mut self, table: &str) {
        self.schemas.remove(table);
    }

    pub fn close(mut self) -> Result<()> {
        self.database.close()
    }
}
