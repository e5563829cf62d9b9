//! A table's fixed, ordered field list and the byte offsets derived from it.
//!
//! Grounded on `mermoldy-mysqlite`'s `storage/schema.rs::{TableSchema,
//! ColumnSchema}`; `row_size`/`offsets` are computed once at construction
//! instead of re-summed on every encode, since this engine's row size also
//! fixes `max_leaf` for the lifetime of the table file.

use super::column::ColumnType;
use crate::errors::{Error, Result};

#[derive(Debug, Clone)]
pub struct ColumnSchema {
    pub name: String,
    pub type_: ColumnType,
}

#[derive(Debug, Clone)]
pub struct TableSchema {
    pub columns: Vec<ColumnSchema>,
    offsets: Vec<usize>,
    row_size: usize,
}

impl TableSchema {
    /// Builds a schema from an ordered field list. The first field is the
    /// primary key by convention and must be `u32` (the tree's key type).
    pub fn new(columns: Vec<ColumnSchema>) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::InvalidSchema("schema has no fields".into()));
        }
        if columns[0].type_ != ColumnType::U32 {
            return Err(Error::InvalidSchema(format!(
                "primary key field '{}' must be u32, got {}",
                columns[0].name, columns[0].type_
            )));
        }
        for col in &columns {
            if field_size(col.type_) == 0 {
                return Err(Error::InvalidSchema(format!(
                    "field '{}' has zero-length type {}",
                    col.name, col.type_
                )));
            }
        }

        let mut offsets = Vec::with_capacity(columns.len());
        let mut offset = 0;
        for col in &columns {
            offsets.push(offset);
            offset += field_size(col.type_);
        }

        Ok(TableSchema {
            columns,
            offsets,
            row_size: offset,
        })
    }

    pub fn row_size(&self) -> usize {
        self.row_size
    }

    pub fn primary_key_name(&self) -> &str {
        &self.columns[0].name
    }

    /// The byte offset and declared type of `name`, if the schema has it.
    pub fn field(&self, name: &str) -> Option<(usize, ColumnType)> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .map(|idx| (self.offsets[idx], self.columns[idx].type_))
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, usize, ColumnType)> {
        self.columns
            .iter()
            .zip(&self.offsets)
            .map(|(c, &off)| (c.name.as_str(), off, c.type_))
    }
}

fn field_size(type_: ColumnType) -> usize {
    match type_ {
        ColumnType::I32 | ColumnType::U32 | ColumnType::F32 => 4,
        ColumnType::I64 | ColumnType::F64 => 8,
        ColumnType::Bool => 1,
        ColumnType::Varchar(len) | ColumnType::Binary(len) | ColumnType::Json(len) => len as usize,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
            ColumnSchema {
                name: "age".into(),
                type_: ColumnType::U32,
            },
        ])
        .unwrap()
    }

    #[test]
    fn computes_offsets_and_row_size() {
        let schema = schema();
        assert_eq!(schema.row_size(), 4 + 16 + 4);
        assert_eq!(schema.field("id"), Some((0, ColumnType::U32)));
        assert_eq!(schema.field("name"), Some((4, ColumnType::Varchar(16))));
        assert_eq!(schema.field("age"), Some((20, ColumnType::U32)));
    }

    #[test]
    fn rejects_non_u32_primary_key() {
        let err = TableSchema::new(vec![ColumnSchema {
            name: "id".into(),
            type_: ColumnType::I64,
        }]);
        assert!(matches!(err, Err(Error::InvalidSchema(_))));
    }

    #[test]
    fn rejects_zero_length_field() {
        let err = TableSchema::new(vec![
            ColumnSchema {
                name: "id".into(),
                type_: ColumnType::U32,
            },
            ColumnSchema {
                name: "blob".into(),
                type_: ColumnType::Binary(0),
            },
        ]);
        assert!(matches!(err, Err(Error::InvalidSchema(_))));
    }
}
