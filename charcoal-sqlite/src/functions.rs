//! MySQL-compatible scalar functions registered on every SQLite connection.
//!
//! Filters and orders compile to MySQL-flavored SQL. SQLite has no
//! `FIELD`, `FIND_IN_SET` or `RAND`, so they are provided here with
//! MySQL's semantics.

use rand::Rng;
use rusqlite::Connection;
use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::ValueRef;

/// Register `FIELD`, `FIND_IN_SET` and `RAND` on a connection.
pub fn register(conn: &Connection) -> rusqlite::Result<()> {
    let deterministic = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

    conn.create_scalar_function("FIELD", -1, deterministic, field)?;
    conn.create_scalar_function("FIND_IN_SET", 2, deterministic, find_in_set)?;
    conn.create_scalar_function("RAND", 0, FunctionFlags::SQLITE_UTF8, |_| Ok(random_unit()))?;
    Ok(())
}

/// `FIELD(needle, a, b, ...)`: 1-based index of the first argument equal
/// to `needle`, or 0.
fn field(ctx: &Context<'_>) -> rusqlite::Result<i64> {
    if ctx.len() < 2 {
        return Err(rusqlite::Error::UserFunctionError(
            "FIELD requires at least two arguments".into(),
        ));
    }
    let needle = ctx.get_raw(0);
    if matches!(needle, ValueRef::Null) {
        return Ok(0);
    }
    for i in 1..ctx.len() {
        if values_equal(needle, ctx.get_raw(i))? {
            return Ok(i as i64);
        }
    }
    Ok(0)
}

/// `FIND_IN_SET(needle, list)`: 1-based position of `needle` in the
/// comma-separated `list`. A needle containing a comma never matches.
fn find_in_set(ctx: &Context<'_>) -> rusqlite::Result<Option<i64>> {
    let (Some(needle), Some(list)) = (text(ctx.get_raw(0))?, text(ctx.get_raw(1))?) else {
        return Ok(None);
    };
    if needle.contains(',') || list.is_empty() {
        return Ok(Some(0));
    }
    let position = list
        .split(',')
        .position(|item| item == needle)
        .map_or(0, |p| p as i64 + 1);
    Ok(Some(position))
}

fn values_equal(a: ValueRef<'_>, b: ValueRef<'_>) -> rusqlite::Result<bool> {
    match (number(a), number(b)) {
        (Some(x), Some(y)) => Ok(x == y),
        _ => Ok(text(a)? == text(b)?),
    }
}

fn number(value: ValueRef<'_>) -> Option<f64> {
    match value {
        ValueRef::Integer(i) => Some(i as f64),
        ValueRef::Real(f) => Some(f),
        _ => None,
    }
}

fn text(value: ValueRef<'_>) -> rusqlite::Result<Option<String>> {
    Ok(match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => Some(
            std::str::from_utf8(bytes)
                .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))?
                .to_string(),
        ),
    })
}

/// A float in `[0, 1)`.
fn random_unit() -> f64 {
    rand::rng().random::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        register(&conn).unwrap();
        conn
    }

    fn scalar<T: rusqlite::types::FromSql>(conn: &Connection, sql: &str) -> T {
        conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn test_field() {
        let conn = conn();
        assert_eq!(scalar::<i64>(&conn, "SELECT FIELD(3, 1, 2, 3)"), 3);
        assert_eq!(scalar::<i64>(&conn, "SELECT FIELD('b', 'a', 'b')"), 2);
        assert_eq!(scalar::<i64>(&conn, "SELECT FIELD('2', 1, 2)"), 2);
        assert_eq!(scalar::<i64>(&conn, "SELECT FIELD(9, 1, 2)"), 0);
        assert_eq!(scalar::<i64>(&conn, "SELECT FIELD(NULL, 1)"), 0);
    }

    #[test]
    fn test_find_in_set() {
        let conn = conn();
        assert_eq!(scalar::<i64>(&conn, "SELECT FIND_IN_SET('b', 'a,b,c')"), 2);
        assert_eq!(scalar::<i64>(&conn, "SELECT FIND_IN_SET('d', 'a,b,c')"), 0);
        assert_eq!(scalar::<i64>(&conn, "SELECT FIND_IN_SET('a,b', 'a,b,c')"), 0);
        assert_eq!(scalar::<i64>(&conn, "SELECT FIND_IN_SET('a', '')"), 0);
        assert_eq!(scalar::<Option<i64>>(&conn, "SELECT FIND_IN_SET(NULL, 'a')"), None);
    }

    #[test]
    fn test_rand_range() {
        let conn = conn();
        for _ in 0..20 {
            let r: f64 = scalar(&conn, "SELECT RAND()");
            assert!((0.0..1.0).contains(&r));
        }
    }

    #[test]
    fn test_order_by_field() {
        let conn = conn();
        conn.execute_batch(
            "CREATE TABLE t (id INTEGER); INSERT INTO t VALUES (1), (2), (3);",
        )
        .unwrap();
        let mut stmt = conn
            .prepare("SELECT id FROM t ORDER BY FIELD(id, 3,1,2) ASC")
            .unwrap();
        let ids: Vec<i64> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(ids, vec![3, 1, 2]);
    }
}
