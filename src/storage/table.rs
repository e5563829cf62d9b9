//! Binds a `Schema` to a B+ tree over one file: CRUD, primary-key
//! discipline, and the three read modes.
//!
//! Grounded on `mermoldy-mysqlite`'s `storage/table.rs::Table` for the
//! overall shape (one table owns one pager, sequences every operation
//! through it) while replacing its SQL-statement-shaped methods
//! (`insert_row`/`select`) with the point/range/scan contract this engine
//! exposes directly.

use tracing::{info, instrument};

use super::btree;
use super::column::ColumnValue;
use super::encoding::{decode_record, encode_record};
use super::page::SyncConfig;
use super::pager::Pager;
use super::row::Record;
use super::schema::TableSchema;
use crate::errors::{Error, Result};

#[derive(Debug, Clone)]
pub struct TableOptions {
    pub sync: SyncConfig,
    pub cache_capacity: usize,
    pub pool_capacity: usize,
}

impl Default for TableOptions {
    fn default() -> Self {
        TableOptions {
            sync: SyncConfig::default(),
            cache_capacity: 64,
            pool_capacity: 16,
        }
    }
}

/// An equality predicate applied in memory to fields outside the primary
/// key, per §4.6's "post-filter by equality predicates on non-key fields".
pub type Filter = Vec<(String, ColumnValue)>;

#[derive(Debug, Clone)]
pub enum ReadCriteria {
    Point(u32),
    Range {
        gte: u32,
        lte: u32,
        limit: usize,
        offset: usize,
        filter: Filter,
    },
    Scan {
        limit: usize,
        offset: usize,
        filter: Filter,
    },
}

pub struct Table {
    name: String,
    schema: TableSchema,
    options: TableOptions,
    pager: Pager,
}

impl Table {
    pub fn open(
        path: impl AsRef<std::path::Path>,
        name: impl Into<String>,
        schema: TableSchema,
        options: TableOptions,
    ) -> Result<Self> {
        let pager = Pager::open(
            path,
            schema.row_size(),
            options.sync,
            options.cache_capacity,
            options.pool_capacity,
        )?;
        Ok(Table {
            name: name.into(),
            schema,
            options,
            pager,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    #[instrument(skip(self, record), fields(table = %self.name))]
    pub fn create(&mut self, record: &Record) -> Result<()> {
        record.validate(&self.schema)?;
        let pk = record.primary_key(&self.schema)?;
        let bytes = encode_record(&self.schema, record)?;
        btree::insert(&mut self.pager, pk, bytes, false)?;
        if self.options.sync.immediate_sync {
            self.pager.flush()?;
        }
        Ok(())
    }

    pub fn read(&mut self, criteria: ReadCriteria) -> Result<Vec<Record>> {
        match criteria {
            ReadCriteria::Point(pk) => {
                let bytes = btree::lookup(&mut self.pager, pk)?;
                Ok(vec![decode_record(&self.schema, &bytes)?])
            }
            ReadCriteria::Range {
                gte,
                lte,
                limit,
                offset,
                filter,
            } => self.read_range(gte, lte, limit, offset, &filter),
            ReadCriteria::Scan {
                limit,
                offset,
                filter,
            } => self.read_range(u32::MIN, u32::MAX, limit, offset, &filter),
        }
    }

    fn read_range(&mut self, gte: u32, lte: u32, limit: usize, offset: usize, filter: &Filter) -> Result<Vec<Record>> {
        let mut out = Vec::new();
        if limit == 0 {
            return Ok(out);
        }
        let mut skipped = 0usize;
        for item in btree::range_iter(&mut self.pager, gte, lte, usize::MAX)? {
            let (_, bytes) = item?;
            let record = decode_record(&self.schema, &bytes)?;
            if !matches_filter(&record, filter) {
                continue;
            }
            if skipped < offset {
                skipped += 1;
                continue;
            }
            out.push(record);
            if out.len() >= limit {
                break;
            }
        }
        Ok(out)
    }

    /// Merges `delta` onto the stored record and overwrites it. Fails with
    /// `ImmutablePrimaryKey` if `delta` sets the primary key field at all.
    #[instrument(skip(self, delta), fields(table = %self.name, pk))]
    pub fn update(&mut self, pk: u32, delta: &Record) -> Result<(Record, Record)> {
        if delta.get(self.schema.primary_key_name()).is_some() {
            return Err(Error::ImmutablePrimaryKey);
        }
        let old_bytes = btree::lookup(&mut self.pager, pk)?;
        let old = decode_record(&self.schema, &old_bytes)?;
        let merged = old.merged_with(delta);
        merged.validate(&self.schema)?;
        let new_bytes = encode_record(&self.schema, &merged)?;
        btree::insert(&mut self.pager, pk, new_bytes, true)?;
        if self.options.sync.immediate_sync {
            self.pager.flush()?;
        }
        Ok((old, merged))
    }

    #[instrument(skip(self), fields(table = %self.name, pk))]
    pub fn delete(&mut self, pk: u32) -> Result<Record> {
        let bytes = btree::delete(&mut self.pager, pk)?;
        let record = decode_record(&self.schema, &bytes)?;
        if self.options.sync.immediate_sync {
            self.pager.flush()?;
        }
        Ok(record)
    }

    pub fn count(&mut self) -> Result<u64> {
        btree::count(&mut self.pager)
    }

    /// Sorts `records` by primary key and inserts them in ascending order,
    /// flushing once at the end (single fsync).
    #[instrument(skip(self, records), fields(table = %self.name, n = records.len()))]
    pub fn batch_create(&mut self, records: &[Record]) -> Result<()> {
        let mut keyed = Vec::with_capacity(records.len());
        for record in records {
            record.validate(&self.schema)?;
            let pk = record.primary_key(&self.schema)?;
            keyed.push((pk, record));
        }
        keyed.sort_by_key(|(pk, _)| *pk);

        for (pk, record) in &keyed {
            let bytes = encode_record(&self.schema, record)?;
            btree::insert(&mut self.pager, *pk, bytes, false)?;
        }
        self.pager.flush_batch()?;
        info!(table = %self.name, n = keyed.len(), "batch_create flushed");
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.pager.flush()
    }

    pub fn close(mut self) -> Result<()> {
        self.pager.flush()
    }
}

fn matches_filter(record: &Record, filter: &Filter) -> bool {
    filter.iter().all(|(name, value)| record.get(name) == Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::column::ColumnType;
    use crate::storage::schema::ColumnSchema;

    fn test_schema() -> TableSchema {
        TableSchema::new(vec![
            ColumnSchema {
                name: "id".into(),
                type_: ColumnType::U32,
            },
            ColumnSchema {
                name: "name".into(),
                type_: ColumnType::Varchar(16),
            },
            ColumnSchema {
                name: "age".into(),
                type_: ColumnType::U32,
            },
        ])
        .unwrap()
    }

    fn open_table(dir: &tempfile::TempDir) -> Table {
        Table::open(dir.path().join("t.db"), "t", test_schema(), TableOptions::default()).unwrap()
    }

    fn record(id: u32, name: &str, age: u32) -> Record {
        Record::new()
            .with("id", ColumnValue::U32(id))
            .with("name", ColumnValue::Varchar(name.into()))
            .with("age", ColumnValue::U32(age))
    }

    #[test]
    fn create_then_point_read() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = open_table(&dir);
        table.create(&record(1, "alice", 30)).unwrap();
        let rows = table.read(ReadCriteria::Point(1)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&ColumnValue::Varchar("alice".into())));
    }

    #[test]
    fn create_duplicate_key_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = open_table(&dir);
        table.create(&record(1, "alice", 30)).unwrap();
        let err = table.create(&record(1, "bob", 40));
        assert!(matches!(err, Err(Error::DuplicateKey(1))));
    }

    #[test]
    fn update_rejects_primary_key_change() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = open_table(&dir);
        table.create(&record(1, "alice", 30)).unwrap();
        let delta = Record::new().with("id", ColumnValue::U32(2));
        let err = table.update(1, &delta);
        assert!(matches!(err, Err(Error::ImmutablePrimaryKey)));
    }

    #[test]
    fn update_merges_and_returns_old_and_new() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = open_table(&dir);
        table.create(&record(1, "alice", 30)).unwrap();
        let delta = Record::new().with("age", ColumnValue::U32(31));
        let (old, new) = table.update(1, &delta).unwrap();
        assert_eq!(old.get("age"), Some(&ColumnValue::U32(30)));
        assert_eq!(new.get("age"), Some(&ColumnValue::U32(31)));
        assert_eq!(new.get("name"), Some(&ColumnValue::Varchar("alice".into())));
    }

    #[test]
    fn delete_returns_value_and_forgets_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = open_table(&dir);
        table.create(&record(1, "alice", 30)).unwrap();
        let deleted = table.delete(1).unwrap();
        assert_eq!(deleted.get("name"), Some(&ColumnValue::Varchar("alice".into())));
        assert!(matches!(table.read(ReadCriteria::Point(1)), Err(Error::NotFound(_))));
    }

    #[test]
    fn range_applies_filter_offset_and_limit() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = open_table(&dir);
        for i in 1..=10u32 {
            let age = if i % 2 == 0 { 20 } else { 30 };
            table.create(&record(i, "x", age)).unwrap();
        }
        let rows = table
            .read(ReadCriteria::Range {
                gte: 1,
                lte: 10,
                limit: 2,
                offset: 1,
                filter: vec![("age".to_string(), ColumnValue::U32(20))],
            })
            .unwrap();
        // even ids 2,4,6,8,10 match age=20; offset 1 skips id 2, limit 2 keeps 4 and 6
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("id"), Some(&ColumnValue::U32(4)));
        assert_eq!(rows[1].get("id"), Some(&ColumnValue::U32(6)));
    }

    #[test]
    fn zero_limit_returns_no_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = open_table(&dir);
        table.create(&record(1, "alice", 30)).unwrap();
        let rows = table
            .read(ReadCriteria::Range {
                gte: 0,
                lte: u32::MAX,
                limit: 0,
                offset: 0,
                filter: vec![],
            })
            .unwrap();
        assert!(rows.is_empty());
        let rows = table
            .read(ReadCriteria::Scan {
                limit: 0,
                offset: 0,
                filter: vec![],
            })
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn batch_create_inserts_out_of_order_records_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = open_table(&dir);
        let records = vec![record(3, "c", 1), record(1, "a", 1), record(2, "b", 1)];
        table.batch_create(&records).unwrap();
        assert_eq!(table.count().unwrap(), 3);
        let rows = table
            .read(ReadCriteria::Scan {
                limit: 10,
                offset: 0,
                filter: vec![],
            })
            .unwrap();
        let ids: Vec<u32> = rows
            .iter()
            .map(|r| match r.get("id") {
                Some(ColumnValue::U32(v)) => *v,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn many_inserts_force_splits_and_stay_readable() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = open_table(&dir);
        for i in 1..=500u32 {
            table.create(&record(i, "row", i)).unwrap();
        }
        assert_eq!(table.count().unwrap(), 500);
        for i in [1u32, 250, 500] {
            let rows = table.read(ReadCriteria::Point(i)).unwrap();
            assert_eq!(rows[0].get("age"), Some(&ColumnValue::U32(i)));
        }
    }

    #[test]
    fn deletes_across_many_keys_keep_tree_consistent() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = open_table(&dir);
        for i in 1..=200u32 {
            table.create(&record(i, "row", i)).unwrap();
        }
        for i in (1..=200u32).step_by(2) {
            table.delete(i).unwrap();
        }
        assert_eq!(table.count().unwrap(), 100);
        for i in (2..=200u32).step_by(2) {
            assert!(table.read(ReadCriteria::Point(i)).is_ok());
        }
        for i in (1..=199u32).step_by(2) {
            assert!(table.read(ReadCriteria::Point(i)).is_err());
        }
    }
}
