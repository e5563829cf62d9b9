//! The closed column type/value set rows are built from.
//!
//! Grounded on `mermoldy-mysqlite`'s `storage/column.rs::{ColumnType,
//! ColumnValue}`, narrowed to the fixed-width-encodable set this engine
//! supports (no `TEXT`/`DATETIME`/`TIMESTAMP`, which the teacher never
//! actually gives a fixed width) and extended with `Json(L)`, stored as
//! NUL-terminated `serde_json`-encoded bytes the same way `Varchar` stores
//! NUL-terminated UTF-8.

use std::fmt;

use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    I32,
    U32,
    I64,
    F32,
    F64,
    Bool,
    /// UTF-8 text, NUL-terminated, at most `L` bytes including the NUL.
    Varchar(u16),
    /// Opaque bytes, exactly `L` bytes, zero-padded.
    Binary(u16),
    /// `serde_json`-encoded text, NUL-terminated, at most `L` bytes
    /// including the NUL.
    Json(u16),
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::I32 => write!(f, "i32"),
            ColumnType::U32 => write!(f, "u32"),
            ColumnType::I64 => write!(f, "i64"),
            ColumnType::F32 => write!(f, "f32"),
            ColumnType::F64 => write!(f, "f64"),
            ColumnType::Bool => write!(f, "bool"),
            ColumnType::Varchar(len) => write!(f, "varchar({})", len),
            ColumnType::Binary(len) => write!(f, "binary({})", len),
            ColumnType::Json(len) => write!(f, "json({})", len),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    I32(i32),
    U32(u32),
    I64(i64),
    F32(f32),
    F64(f64),
    Bool(bool),
    Varchar(String),
    Binary(Vec<u8>),
    Json(JsonValue),
}

impl ColumnValue {
    /// The `ColumnType` this value would be encoded as.
    pub fn column_type(&self, declared: ColumnType) -> ColumnType {
        match (self, declared) {
            (ColumnValue::Varchar(_), ColumnType::Varchar(l)) => ColumnType::Varchar(l),
            (ColumnValue::Binary(_), ColumnType::Binary(l)) => ColumnType::Binary(l),
            (ColumnValue::Json(_), ColumnType::Json(l)) => ColumnType::Json(l),
            _ => declared,
        }
    }
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::I32(v) => write!(f, "{}", v),
            ColumnValue::U32(v) => write!(f, "{}", v),
            ColumnValue::I64(v) => write!(f, "{}", v),
            ColumnValue::F32(v) => write!(f, "{}", v),
            ColumnValue::F64(v) => write!(f, "{}", v),
            ColumnValue::Bool(v) => write!(f, "{}", v),
            ColumnValue::Varchar(v) => write!(f, "{}", v),
            ColumnValue::Binary(v) => write!(f, "{}", hex_preview(v)),
            ColumnValue::Json(v) => write!(f, "{}", v),
        }
    }
}

fn hex_preview(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
