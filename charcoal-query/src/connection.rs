//! The database connection seam.
//!
//! Sources and loaders talk to the database only through [`Connection`].
//! Driver crates implement it; tests can implement it with a recording fake.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::QueryResult;
use crate::model::Row;
use crate::value::Value;

/// SQL dialect spoken by a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// MySQL / MariaDB.
    Mysql,
    /// SQLite with the MySQL-compatibility functions registered.
    Sqlite,
}

impl Dialect {
    /// Dialect name as used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An async database connection.
///
/// Statements use `?` placeholders; `params` are bound in order.
#[async_trait]
pub trait Connection: Send + Sync {
    /// The dialect for DDL generation.
    fn dialect(&self) -> Dialect;

    /// Run a query and fetch every row.
    async fn query(&self, sql: &str, params: &[Value]) -> QueryResult<Vec<Row>>;

    /// Run a statement and return the number of affected rows.
    async fn execute(&self, sql: &str, params: &[Value]) -> QueryResult<u64>;

    /// Run an INSERT and return the generated identifier, if any.
    async fn insert(&self, sql: &str, params: &[Value]) -> QueryResult<Option<i64>>;

    /// Whether a table exists.
    async fn table_exists(&self, table: &str) -> QueryResult<bool>;

    /// Column names of a table, in table order.
    async fn table_columns(&self, table: &str) -> QueryResult<Vec<String>>;
}

impl fmt::Debug for dyn Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("dialect", &self.dialect())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<C: Connection + ?Sized> Connection for Arc<C> {
    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }

    async fn query(&self, sql: &str, params: &[Value]) -> QueryResult<Vec<Row>> {
        (**self).query(sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> QueryResult<u64> {
        (**self).execute(sql, params).await
    }

    async fn insert(&self, sql: &str, params: &[Value]) -> QueryResult<Option<i64>> {
        (**self).insert(sql, params).await
    }

    async fn table_exists(&self, table: &str) -> QueryResult<bool> {
        (**self).table_exists(table).await
    }

    async fn table_columns(&self, table: &str) -> QueryResult<Vec<String>> {
        (**self).table_columns(table).await
    }
}

/// A connection handle shared between sources.
pub type SharedConnection = Arc<dyn Connection>;
