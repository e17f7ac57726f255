//! Error types for MySQL operations.

use std::fmt;

use charcoal_query::QueryError;

/// Result type for MySQL operations.
pub type MysqlResult<T> = Result<T, MysqlError>;

/// Server error codes with a dedicated mapping.
const ER_DUP_ENTRY: u16 = 1062;
const ER_PARSE_ERROR: u16 = 1064;
const ER_ROW_IS_REFERENCED_2: u16 = 1451;
const ER_NO_REFERENCED_ROW_2: u16 = 1452;
const ER_BAD_NULL_ERROR: u16 = 1048;

/// Error type for MySQL operations.
#[derive(Debug)]
pub enum MysqlError {
    /// MySQL driver error.
    Mysql(mysql_async::Error),
    /// Configuration error.
    Config(String),
}

impl MysqlError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// The server error code, when the server rejected the statement.
    pub fn server_code(&self) -> Option<u16> {
        match self {
            Self::Mysql(mysql_async::Error::Server(e)) => Some(e.code),
            _ => None,
        }
    }
}

impl fmt::Display for MysqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mysql(e) => write!(f, "MySQL error: {}", e),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for MysqlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Mysql(e) => Some(e),
            _ => None,
        }
    }
}

impl From<mysql_async::Error> for MysqlError {
    fn from(err: mysql_async::Error) -> Self {
        Self::Mysql(err)
    }
}

impl From<MysqlError> for QueryError {
    fn from(err: MysqlError) -> Self {
        let message = err.to_string();
        let converted = match (&err, err.server_code()) {
            (MysqlError::Config(msg), _) => QueryError::configuration(msg.clone()),
            (_, Some(ER_PARSE_ERROR)) => QueryError::sql_syntax(message, String::new()),
            (
                _,
                Some(
                    ER_DUP_ENTRY | ER_ROW_IS_REFERENCED_2 | ER_NO_REFERENCED_ROW_2
                    | ER_BAD_NULL_ERROR,
                ),
            ) => QueryError::constraint_violation(message),
            (MysqlError::Mysql(mysql_async::Error::Io(_)), _) => QueryError::connection(message),
            (MysqlError::Mysql(mysql_async::Error::Url(_)), _) => QueryError::configuration(message),
            _ => QueryError::database(message),
        };
        converted.with_source(err)
    }
}
