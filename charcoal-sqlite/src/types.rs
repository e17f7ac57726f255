//! Conversions between Charcoal values and SQLite values.

use charcoal_query::{Row, Value};
use rusqlite::types::{Value as SqliteValue, ValueRef};

/// Convert a bound parameter to a SQLite value.
///
/// Lists bind as their comma-joined text, the shape `FIND_IN_SET` expects.
pub fn to_sqlite(value: &Value) -> SqliteValue {
    match value {
        Value::Null => SqliteValue::Null,
        Value::Bool(b) => SqliteValue::Integer(i64::from(*b)),
        Value::Int(i) => SqliteValue::Integer(*i),
        Value::Float(f) => SqliteValue::Real(*f),
        Value::String(s) => SqliteValue::Text(s.clone()),
        Value::List(_) => SqliteValue::Text(value.to_plain_string()),
        Value::Json(json) => SqliteValue::Text(json.to_string()),
    }
}

/// Convert a column value read from SQLite.
pub fn from_sqlite(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

/// Read a full result row into a column-ordered map.
pub fn read_row(row: &rusqlite::Row<'_>, columns: &[String]) -> rusqlite::Result<Row> {
    let mut out = Row::with_capacity(columns.len());
    for (index, name) in columns.iter().enumerate() {
        out.insert(name.clone(), from_sqlite(row.get_ref(index)?));
    }
    Ok(out)
}
