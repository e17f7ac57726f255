//! A recording connection for unit tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::connection::{Connection, Dialect};
use crate::error::QueryResult;
use crate::model::Row;
use crate::value::Value;

#[derive(Debug, Default)]
pub(crate) struct RecordingConnection {
    pub statements: Mutex<Vec<(String, Vec<Value>)>>,
    pub results: Mutex<VecDeque<Vec<Row>>>,
    pub affected: Mutex<u64>,
    pub last_insert_id: Mutex<Option<i64>>,
    pub tables: Mutex<Vec<String>>,
    pub columns: Mutex<Vec<String>>,
}

impl RecordingConnection {
    pub fn new() -> Self {
        Self {
            affected: Mutex::new(1),
            ..Default::default()
        }
    }

    pub fn push_result(&self, rows: Vec<Row>) {
        self.results.lock().push_back(rows);
    }

    pub fn statements(&self) -> Vec<(String, Vec<Value>)> {
        self.statements.lock().clone()
    }

    pub fn last_sql(&self) -> String {
        self.statements
            .lock()
            .last()
            .map(|(sql, _)| sql.clone())
            .unwrap_or_default()
    }

    fn record(&self, sql: &str, params: &[Value]) {
        self.statements.lock().push((sql.to_string(), params.to_vec()));
    }
}

pub(crate) fn row(cells: &[(&str, Value)]) -> Row {
    cells
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[async_trait]
impl Connection for RecordingConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn query(&self, sql: &str, params: &[Value]) -> QueryResult<Vec<Row>> {
        self.record(sql, params);
        Ok(self.results.lock().pop_front().unwrap_or_default())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> QueryResult<u64> {
        self.record(sql, params);
        Ok(*self.affected.lock())
    }

    async fn insert(&self, sql: &str, params: &[Value]) -> QueryResult<Option<i64>> {
        self.record(sql, params);
        Ok(*self.last_insert_id.lock())
    }

    async fn table_exists(&self, table: &str) -> QueryResult<bool> {
        Ok(self.tables.lock().iter().any(|t| t == table))
    }

    async fn table_columns(&self, _table: &str) -> QueryResult<Vec<String>> {
        Ok(self.columns.lock().clone())
    }
}
