//! SQLite implementation of the Charcoal [`Connection`] trait.

use std::fmt;
use std::time::Duration;

use charcoal_query::{Connection, Dialect, QueryResult, Row, Value, async_trait};
use tracing::{debug, info, instrument};

use crate::config::{DatabasePath, SqliteConfig};
use crate::error::{SqliteError, SqliteResult};
use crate::functions;
use crate::types::{read_row, to_sqlite};

/// A shared SQLite connection.
///
/// All statements run on one background thread owned by
/// `tokio_rusqlite`. Cloning is cheap and every clone sees the same
/// database, which keeps in-memory databases usable across a loader and
/// its sources.
#[derive(Clone)]
pub struct SqliteConnection {
    conn: tokio_rusqlite::Connection,
    config: SqliteConfig,
}

impl SqliteConnection {
    /// Open a connection with the given configuration.
    pub async fn open(config: SqliteConfig) -> SqliteResult<Self> {
        let conn = match &config.path {
            DatabasePath::Memory => tokio_rusqlite::Connection::open_in_memory().await?,
            DatabasePath::File(path) => tokio_rusqlite::Connection::open(path).await?,
        };

        let settings = config.clone();
        conn.call(move |conn| {
            conn.pragma_update(None, "foreign_keys", settings.foreign_keys)?;
            if let Some(ms) = settings.busy_timeout_ms {
                conn.busy_timeout(Duration::from_millis(u64::from(ms)))?;
            }
            if !settings.path.is_memory() {
                conn.pragma_update_and_check(
                    None,
                    "journal_mode",
                    settings.journal_mode.as_pragma(),
                    |row| row.get::<_, String>(0),
                )?;
            }
            functions::register(conn)?;
            Ok(())
        })
        .await?;

        info!(path = ?config.path, "SQLite connection opened");
        Ok(Self { conn, config })
    }

    /// Open an in-memory database.
    pub async fn memory() -> SqliteResult<Self> {
        Self::open(SqliteConfig::memory()).await
    }

    /// Open a database from a URL such as `sqlite://app.db`.
    pub async fn from_url(url: impl AsRef<str>) -> SqliteResult<Self> {
        Self::open(SqliteConfig::from_url(url)?).await
    }

    /// The configuration this connection was opened with.
    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    /// Run a batch of statements without parameters.
    pub async fn execute_batch(&self, sql: impl Into<String>) -> SqliteResult<()> {
        let sql = sql.into();
        self.conn
            .call(move |conn| Ok(conn.execute_batch(&sql)?))
            .await
            .map_err(SqliteError::from)
    }

    async fn run_query(&self, sql: &str, params: &[Value]) -> SqliteResult<Vec<Row>> {
        let sql = sql.to_string();
        let params: Vec<_> = params.iter().map(to_sqlite).collect();

        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let columns: Vec<String> =
                    stmt.column_names().iter().map(|s| s.to_string()).collect();
                let rows = stmt
                    .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                        read_row(row, &columns)
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    async fn run_execute(&self, sql: &str, params: &[Value]) -> SqliteResult<(u64, i64)> {
        let sql = sql.to_string();
        let params: Vec<_> = params.iter().map(to_sqlite).collect();

        let result = self
            .conn
            .call(move |conn| {
                let affected = conn.execute(&sql, rusqlite::params_from_iter(params.iter()))?;
                Ok((affected as u64, conn.last_insert_rowid()))
            })
            .await?;
        Ok(result)
    }
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.config.path)
            .finish()
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    #[instrument(skip(self, params), fields(params = params.len()))]
    async fn query(&self, sql: &str, params: &[Value]) -> QueryResult<Vec<Row>> {
        let rows = self
            .run_query(sql, params)
            .await
            .map_err(|e| charcoal_query::QueryError::from(e).with_sql(sql))?;
        debug!(rows = rows.len(), "Query returned");
        Ok(rows)
    }

    #[instrument(skip(self, params), fields(params = params.len()))]
    async fn execute(&self, sql: &str, params: &[Value]) -> QueryResult<u64> {
        let (affected, _) = self
            .run_execute(sql, params)
            .await
            .map_err(|e| charcoal_query::QueryError::from(e).with_sql(sql))?;
        debug!(affected, "Statement executed");
        Ok(affected)
    }

    #[instrument(skip(self, params), fields(params = params.len()))]
    async fn insert(&self, sql: &str, params: &[Value]) -> QueryResult<Option<i64>> {
        let (affected, rowid) = self
            .run_execute(sql, params)
            .await
            .map_err(|e| charcoal_query::QueryError::from(e).with_sql(sql))?;
        debug!(affected, rowid, "Row inserted");
        Ok((affected > 0).then_some(rowid))
    }

    async fn table_exists(&self, table: &str) -> QueryResult<bool> {
        let rows = self
            .run_query(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
                &[Value::from(table)],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn table_columns(&self, table: &str) -> QueryResult<Vec<String>> {
        let rows = self
            .run_query(
                "SELECT name FROM pragma_table_info(?)",
                &[Value::from(table)],
            )
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.get("name").and_then(Value::as_str).map(str::to_string))
            .collect())
    }
}
