//! Fixed-width encode/decode for each column type, and the record-level
//! `encode_record`/`decode_record` built on top of them.
//!
//! Grounded on `mermoldy-mysqlite`'s `storage/encoding.rs::{fixed_size,
//! from_fixed_bytes, to_fixed_bytes, encode_row, decode_row}`, dropping its
//! `bincode` round trip for numeric types (bincode's varint framing isn't
//! fixed-width, so it can't back a schema whose whole point is a constant
//! `row_size`) in favor of `to_le_bytes`/`from_le_bytes` directly, per §4.4.
//! `json(L)` is new: NUL-terminated `serde_json` text, following the same
//! truncate-and-terminate shape as `varchar(L)`.

use serde_json::Value as JsonValue;

use super::column::{ColumnType, ColumnValue};
use super::row::Record;
use super::schema::TableSchema;
use crate::errors::{Error, Result};

fn encode_value(value: &ColumnValue, type_: ColumnType, buf: &mut [u8]) -> Result<()> {
    match (value, type_) {
        (ColumnValue::I32(v), ColumnType::I32) => buf.copy_from_slice(&v.to_le_bytes()),
        (ColumnValue::U32(v), ColumnType::U32) => buf.copy_from_slice(&v.to_le_bytes()),
        (ColumnValue::I64(v), ColumnType::I64) => buf.copy_from_slice(&v.to_le_bytes()),
        (ColumnValue::F32(v), ColumnType::F32) => buf.copy_from_slice(&v.to_le_bytes()),
        (ColumnValue::F64(v), ColumnType::F64) => buf.copy_from_slice(&v.to_le_bytes()),
        (ColumnValue::Bool(v), ColumnType::Bool) => buf[0] = *v as u8,
        (ColumnValue::Varchar(s), ColumnType::Varchar(len)) => {
            write_nul_terminated(s.as_bytes(), len as usize, buf)
        }
        (ColumnValue::Binary(bytes), ColumnType::Binary(len)) => {
            let n = bytes.len().min(len as usize);
            buf[..n].copy_from_slice(&bytes[..n]);
        }
        (ColumnValue::Json(v), ColumnType::Json(len)) => {
            let text = serde_json::to_vec(v).map_err(|e| Error::InvalidRecord(e.to_string()))?;
            write_nul_terminated(&text, len as usize, buf);
        }
        (value, type_) => {
            return Err(Error::InvalidRecord(format!(
                "value {} does not match declared type {}",
                value, type_
            )))
        }
    }
    Ok(())
}

/// Copies `bytes`, truncated to `len - 1`, then writes a NUL at the next
/// offset (the remaining tail is left as whatever `buf` already held, which
/// is zero for a freshly allocated row buffer).
fn write_nul_terminated(bytes: &[u8], len: usize, buf: &mut [u8]) {
    let n = bytes.len().min(len.saturating_sub(1));
    buf[..n].copy_from_slice(&bytes[..n]);
    if n < len {
        buf[n] = 0;
    }
}

fn decode_value(type_: ColumnType, buf: &[u8]) -> Result<ColumnValue> {
    Ok(match type_ {
        ColumnType::I32 => ColumnValue::I32(i32::from_le_bytes(buf.try_into().unwrap())),
        ColumnType::U32 => ColumnValue::U32(u32::from_le_bytes(buf.try_into().unwrap())),
        ColumnType::I64 => ColumnValue::I64(i64::from_le_bytes(buf.try_into().unwrap())),
        ColumnType::F32 => ColumnValue::F32(f32::from_le_bytes(buf.try_into().unwrap())),
        ColumnType::F64 => ColumnValue::F64(f64::from_le_bytes(buf.try_into().unwrap())),
        ColumnType::Bool => ColumnValue::Bool(buf[0] != 0),
        ColumnType::Varchar(_) => {
            let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
            ColumnValue::Varchar(String::from_utf8_lossy(&buf[..end]).into_owned())
        }
        ColumnType::Binary(_) => ColumnValue::Binary(buf.to_vec()),
        ColumnType::Json(_) => {
            let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
            let value = serde_json::from_slice::<JsonValue>(&buf[..end]).unwrap_or(JsonValue::Null);
            ColumnValue::Json(value)
        }
    })
}

/// Encodes `record` into a zeroed `schema.row_size()`-byte buffer. A field
/// the record doesn't set is left at its type's zero/empty representation.
pub fn encode_record(schema: &TableSchema, record: &Record) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; schema.row_size()];
    for (name, offset, type_) in schema.fields() {
        if let Some(value) = record.get(name) {
            encode_value(value, type_, &mut buf[offset..offset + field_width(type_)])?;
        }
    }
    Ok(buf)
}

pub fn decode_record(schema: &TableSchema, bytes: &[u8]) -> Result<Record> {
    if bytes.len() != schema.row_size() {
        return Err(Error::Corruption(format!(
            "row size mismatch: expected {}, got {}",
            schema.row_size(),
            bytes.len()
        )));
    }
    let mut record = Record::new();
    for (name, offset, type_) in schema.fields() {
        let width = field_width(type_);
        let value = decode_value(type_, &bytes[offset..offset + width])?;
        record.fields.insert(name.to_string(), value);
    }
    Ok(record)
}

fn field_width(type_: ColumnType) -> usize {
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
    use crate::storage::schema::ColumnSchema;
    use serde_json::json;

    fn schema() -> TableSchema {
        TableSchema::new(vec![
            ColumnSchema {
                name: "id".into(),
                type_: ColumnType::U32,
            },
            ColumnSchema {
                name: "name".into(),
                type_: ColumnType::Varchar(8),
            },
            ColumnSchema {
                name: "tags".into(),
                type_: ColumnType::Json(32),
            },
        ])
        .unwrap()
    }

    #[test]
    fn round_trips_a_full_record() {
        let schema = schema();
        let record = Record::new()
            .with("id", ColumnValue::U32(7))
            .with("name", ColumnValue::Varchar("bob".into()))
            .with("tags", ColumnValue::Json(json!(["a", "b"])));
        let bytes = encode_record(&schema, &record).unwrap();
        assert_eq!(bytes.len(), schema.row_size());
        let decoded = decode_record(&schema, &bytes).unwrap();
        assert_eq!(decoded.get("id"), Some(&ColumnValue::U32(7)));
        assert_eq!(decoded.get("name"), Some(&ColumnValue::Varchar("bob".into())));
        assert_eq!(decoded.get("tags"), Some(&ColumnValue::Json(json!(["a", "b"]))));
    }

    #[test]
    fn missing_fields_decode_to_zero_value() {
        let schema = schema();
        let record = Record::new().with("id", ColumnValue::U32(1));
        let bytes = encode_record(&schema, &record).unwrap();
        let decoded = decode_record(&schema, &bytes).unwrap();
        assert_eq!(decoded.get("name"), Some(&ColumnValue::Varchar(String::new())));
        assert_eq!(decoded.get("tags"), Some(&ColumnValue::Json(JsonValue::Null)));
    }

    #[test]
    fn varchar_truncates_to_capacity_minus_one() {
        let schema = schema();
        let record = Record::new()
            .with("id", ColumnValue::U32(1))
            .with("name", ColumnValue::Varchar("abcdefghij".into()));
        let bytes = encode_record(&schema, &record).unwrap();
        let decoded = decode_record(&schema, &bytes).unwrap();
        assert_eq!(decoded.get("name"), Some(&ColumnValue::Varchar("abcdefg".into())));
    }
}
