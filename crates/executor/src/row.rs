//! Fixed-layout row codec.
//!
//! A row occupies exactly `schema.row_size` bytes: a 9-byte header
//! (`deleted` flag, row id, reserved next-row pointer) followed by the
//! column values at the schema's fixed offsets. Text columns are
//! zero-padded to their declared width. A slot whose row id is 0 is empty.

use catalog::TableSchema;
use common::{DbError, DbResult, RowId};
use types::{SqlType, Value};

const DELETED_OFFSET: usize = 0;
const ROW_ID_OFFSET: usize = 1;
const NEXT_ROW_OFFSET: usize = 5;

/// Check `values` against the schema: arity, per-column type, text width.
pub fn validate(schema: &TableSchema, values: &[Value]) -> DbResult<()> {
    if values.len() != schema.columns.len() {
        return Err(DbError::Executor(format!(
            "table '{}' expects {} values, got {}",
            schema.name,
            schema.columns.len(),
            values.len()
        )));
    }
    for (col, value) in schema.columns.iter().zip(values) {
        if value.sql_type() != col.ty {
            return Err(DbError::Executor(format!(
                "column '{}' expects {}, got {}",
                col.name,
                col.ty,
                value.sql_type()
            )));
        }
        if let Value::Text(s) = value {
            if s.len() > col.length as usize {
                return Err(DbError::Executor(format!(
                    "value for column '{}' exceeds {} bytes",
                    col.name, col.length
                )));
            }
        }
    }
    Ok(())
}

/// Encode a live row into `out`, which must be exactly `row_size` bytes.
pub fn encode(
    schema: &TableSchema,
    row_id: RowId,
    values: &[Value],
    out: &mut [u8],
) -> DbResult<()> {
    debug_assert_eq!(out.len(), schema.row_size as usize);
    validate(schema, values)?;

    out.fill(0);
    out[DELETED_OFFSET] = 0;
    out[ROW_ID_OFFSET..ROW_ID_OFFSET + 4].copy_from_slice(&row_id.0.to_le_bytes());
    // next_row is reserved and stays 0.

    for (idx, value) in values.iter().enumerate() {
        let start = schema.column_offset(idx) as usize;
        match value {
            Value::Int(i) => out[start..start + 4].copy_from_slice(&i.to_le_bytes()),
            Value::Float(x) => out[start..start + 4].copy_from_slice(&x.to_le_bytes()),
            Value::Bool(b) => out[start] = *b as u8,
            Value::Text(s) => out[start..start + s.len()].copy_from_slice(s.as_bytes()),
        }
    }
    Ok(())
}

/// Decode the column values of the row stored in `buf`.
pub fn decode(schema: &TableSchema, buf: &[u8]) -> DbResult<Vec<Value>> {
    debug_assert_eq!(buf.len(), schema.row_size as usize);
    let mut values = Vec::with_capacity(schema.columns.len());
    for (idx, col) in schema.columns.iter().enumerate() {
        let start = schema.column_offset(idx) as usize;
        let value = match col.ty {
            SqlType::Int => {
                Value::Int(i32::from_le_bytes(buf[start..start + 4].try_into().unwrap()))
            }
            SqlType::Float => {
                Value::Float(f32::from_le_bytes(buf[start..start + 4].try_into().unwrap()))
            }
            SqlType::Bool => Value::Bool(buf[start] != 0),
            SqlType::Text => {
                let field = &buf[start..start + col.length as usize];
                let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
                let text = std::str::from_utf8(&field[..end]).map_err(|_| {
                    DbError::Executor(format!("column '{}' holds invalid utf-8", col.name))
                })?;
                Value::Text(text.to_string())
            }
        };
        values.push(value);
    }
    Ok(values)
}

/// Row id stored in a slot; 0 means the slot is empty.
pub fn slot_row_id(buf: &[u8]) -> u32 {
    u32::from_le_bytes(buf[ROW_ID_OFFSET..ROW_ID_OFFSET + 4].try_into().unwrap())
}

pub fn is_deleted(buf: &[u8]) -> bool {
    buf[DELETED_OFFSET] != 0
}

pub fn mark_deleted(buf: &mut [u8]) {
    buf[DELETED_OFFSET] = 1;
}

/// Reserved forward pointer within the row header; always 0 in this
/// version.
pub fn next_row(buf: &[u8]) -> u32 {
    u32::from_le_bytes(buf[NEXT_ROW_OFFSET..NEXT_ROW_OFFSET + 4].try_into().unwrap())
}
