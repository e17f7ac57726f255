//! Conversions between Charcoal values and MySQL values.

use charcoal_query::{Row, Value};
use chrono::{NaiveDate, NaiveDateTime};
use mysql_async::Value as MysqlValue;

/// Convert a bound parameter to a MySQL value.
pub fn to_mysql(value: &Value) -> MysqlValue {
    match value {
        Value::Null => MysqlValue::NULL,
        Value::Bool(b) => MysqlValue::from(*b),
        Value::Int(i) => MysqlValue::from(*i),
        Value::Float(f) => MysqlValue::from(*f),
        Value::String(s) => MysqlValue::from(s.as_str()),
        Value::List(_) => MysqlValue::from(value.to_plain_string()),
        Value::Json(json) => MysqlValue::from(json.to_string()),
    }
}

/// Convert a column value read from MySQL.
///
/// Dates come back as `YYYY-MM-DD HH:MM:SS`, the text MySQL itself prints
/// for `DATETIME` columns.
pub fn from_mysql(value: MysqlValue) -> Value {
    match value {
        MysqlValue::NULL => Value::Null,
        MysqlValue::Bytes(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
        MysqlValue::Int(i) => Value::Int(i),
        MysqlValue::UInt(u) => {
            i64::try_from(u).map_or_else(|_| Value::String(u.to_string()), Value::Int)
        }
        MysqlValue::Float(f) => Value::Float(f64::from(f)),
        MysqlValue::Double(d) => Value::Float(d),
        MysqlValue::Date(year, month, day, hour, minute, second, micro) => {
            match to_datetime(year, month, day, hour, minute, second, micro) {
                Some(dt) if micro == 0 => Value::String(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
                Some(dt) => Value::String(dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string()),
                // Zero dates such as 0000-00-00 have no calendar value.
                None => Value::String(format!(
                    "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                    year, month, day, hour, minute, second
                )),
            }
        }
        MysqlValue::Time(negative, days, hours, minutes, seconds, _) => {
            let sign = if negative { "-" } else { "" };
            Value::String(format!(
                "{}{:02}:{:02}:{:02}",
                sign,
                days * 24 + u32::from(hours),
                minutes,
                seconds
            ))
        }
    }
}

fn to_datetime(
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
    micro: u32,
) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))?.and_hms_micro_opt(
        u32::from(hour),
        u32::from(minute),
        u32::from(second),
        micro,
    )
}

/// Read a result row into a column-ordered map.
pub fn read_row(mut row: mysql_async::Row) -> Row {
    let columns: Vec<String> = row
        .columns_ref()
        .iter()
        .map(|c| c.name_str().into_owned())
        .collect();

    columns
        .into_iter()
        .enumerate()
        .map(|(index, name)| {
            let value = row.take::<MysqlValue, _>(index).unwrap_or(MysqlValue::NULL);
            (name, from_mysql(value))
        })
        .collect()
}
