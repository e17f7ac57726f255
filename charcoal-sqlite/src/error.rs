//! Error types for SQLite operations.

use charcoal_query::QueryError;
use thiserror::Error;

/// Result type for SQLite operations.
pub type SqliteResult<T> = Result<T, SqliteError>;

/// Error type for SQLite operations.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite driver error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SqliteError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// The underlying rusqlite error, if any.
    pub fn rusqlite(&self) -> Option<&rusqlite::Error> {
        match self {
            Self::Sqlite(tokio_rusqlite::Error::Rusqlite(e)) => Some(e),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for SqliteError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Sqlite(tokio_rusqlite::Error::Rusqlite(err))
    }
}

impl From<SqliteError> for QueryError {
    fn from(err: SqliteError) -> Self {
        let message = err.to_string();
        let converted = match &err {
            SqliteError::Config(msg) => QueryError::configuration(msg.clone()),
            SqliteError::Sqlite(tokio_rusqlite::Error::ConnectionClosed) => {
                QueryError::connection(message)
            }
            SqliteError::Sqlite(_) => match err.rusqlite() {
                Some(rusqlite::Error::SqliteFailure(failure, _))
                    if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    QueryError::constraint_violation(message)
                }
                Some(rusqlite::Error::SqlInputError { sql, .. }) => {
                    QueryError::sql_syntax(message, sql.clone())
                }
                Some(rusqlite::Error::SqliteFailure(_, Some(detail)))
                    if detail.contains("syntax error") =>
                {
                    QueryError::sql_syntax(message, String::new())
                }
                _ => QueryError::database(message),
            },
        };
        converted.with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use charcoal_query::ErrorCode;

    #[test]
    fn test_error_display() {
        let err = SqliteError::config("invalid path");
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("invalid path"));
    }

    #[test]
    fn test_conversion_codes() {
        let err: QueryError = SqliteError::config("x").into();
        assert_eq!(err.code, ErrorCode::InvalidConfiguration);

        let err: QueryError = SqliteError::Sqlite(tokio_rusqlite::Error::ConnectionClosed).into();
        assert!(err.is_connection_error());

        let err: QueryError = SqliteError::from(rusqlite::Error::QueryReturnedNoRows).into();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }
}
