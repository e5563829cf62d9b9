//! In-memory typed records, independent of their on-disk byte encoding.
//!
//! Grounded on `mermoldy-mysqlite`'s `storage/row.rs::Row`, trimmed to the
//! closed column set and field-validation rule this engine actually needs:
//! a missing non-key field is filled with its type's zero/empty value at
//! encode time (§4.4), so only the primary key is required up front.

use std::collections::HashMap;

use super::column::{ColumnType, ColumnValue};
use super::schema::TableSchema;
use crate::errors::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub fields: HashMap<String, ColumnValue>,
}

impl Record {
    pub fn new() -> Self {
        Record::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: ColumnValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ColumnValue> {
        self.fields.get(name)
    }

    /// The primary key value, read from the schema's first field. Fails if
    /// the field is absent or not a `u32`.
    pub fn primary_key(&self, schema: &TableSchema) -> Result<u32> {
        let pk_name = schema.primary_key_name();
        match self.fields.get(pk_name) {
            Some(ColumnValue::U32(v)) => Ok(*v),
            Some(_) => Err(Error::InvalidRecord(format!(
                "primary key field '{}' is not a u32",
                pk_name
            ))),
            None => Err(Error::InvalidRecord(format!(
                "record is missing primary key field '{}'",
                pk_name
            ))),
        }
    }

    /// Rejects records that declare a field not in `schema`, or declare a
    /// field under a value variant that doesn't match its column type. Does
    /// not require every field to be present — §4.4 fills gaps at encode
    /// time.
    pub fn validate(&self, schema: &TableSchema) -> Result<()> {
        self.primary_key(schema)?;
        for (name, value) in &self.fields {
            let Some((_, type_)) = schema.field(name) else {
                return Err(Error::InvalidRecord(format!("unknown field '{}'", name)));
            };
            if !value_matches_type(value, type_) {
                return Err(Error::InvalidRecord(format!(
                    "field '{}' does not match declared type {}",
                    name, type_
                )));
            }
        }
        Ok(())
    }

    /// Overlays `delta`'s fields onto `self`, returning the merged record.
    /// Used by `Table::update`.
    pub fn merged_with(&self, delta: &Record) -> Record {
        let mut merged = self.clone();
        for (name, value) in &delta.fields {
            merged.fields.insert(name.clone(), value.clone());
        }
        merged
    }
}

fn value_matches_type(value: &ColumnValue, type_: ColumnType) -> bool {
    matches!(
        (value, type_),
        (ColumnValue::I32(_), ColumnType::I32)
            | (ColumnValue::U32(_), ColumnType::U32)
            | (ColumnValue::I64(_), ColumnType::I64)
            | (ColumnValue::F32(_), ColumnType::F32)
            | (ColumnValue::F64(_), ColumnType::F64)
            | (ColumnValue::Bool(_), ColumnType::Bool)
            | (ColumnValue::Varchar(_), ColumnType::Varchar(_))
            | (ColumnValue::Binary(_), ColumnType::Binary(_))
            | (ColumnValue::Json(_), ColumnType::Json(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::ColumnSchema;

    fn schema() -> TableSchema {
        TableSchema::new(vec![
            ColumnSchema {
                name: "id".into(),
                type_: ColumnType::U32,
            },
            ColumnSchema {
                name: "name".into(),
                type_: ColumnType::Varchar(16),
            },
        ])
        .unwrap()
    }

    #[test]
    fn validate_requires_primary_key() {
        let record = Record::new().with("name", ColumnValue::Varchar("a".into()));
        assert!(record.validate(&schema()).is_err());
    }

    #[test]
    fn validate_rejects_unknown_field() {
        let record = Record::new()
            .with("id", ColumnValue::U32(1))
            .with("ghost", ColumnValue::Bool(true));
        assert!(record.validate(&schema()).is_err());
    }

    #[test]
    fn merge_overlays_fields() {
        let base = Record::new()
            .with("id", ColumnValue::U32(1))
            .with("name", ColumnValue::Varchar("a".into()));
        let delta = Record::new().with("name", ColumnValue::Varchar("b".into()));
        let merged = base.merged_with(&delta);
        assert_eq!(merged.get("name"), Some(&ColumnValue::Varchar("b".into())));
        assert_eq!(merged.get("id"), Some(&ColumnValue::U32(1)));
    }
}
