//! Error types for query compilation and execution.
//!
//! Errors fall into two families:
//! - Configuration errors (a filter without a property, an empty raw
//!   condition, an unknown operator or order mode). These are raised while
//!   compiling SQL and are never retried.
//! - Execution errors (connection failures, malformed SQL, constraint
//!   violations) reported by a driver and bubbled to the caller.
//!
//! A missing row is not an error: `load_item` hands back an empty model.
//!
//! Error codes follow a pattern: C{category}{number}
//! - 1xxx: Expression errors (filter, order, pagination)
//! - 3xxx: Connection errors
//! - 5xxx: Execution errors
//! - 6xxx: Data errors
//! - 7xxx: Configuration errors
//!
//! ```rust
//! use charcoal_query::{ErrorCode, QueryError};
//!
//! let err = QueryError::invalid_filter("filter property is required");
//! assert_eq!(err.code, ErrorCode::InvalidFilter);
//! assert!(err.is_configuration_error());
//! ```

use std::fmt;
use thiserror::Error;

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Expression errors (1xxx)
    /// Invalid filter expression (C1001).
    InvalidFilter = 1001,
    /// Invalid order expression (C1002).
    InvalidOrder = 1002,
    /// Invalid pagination (C1003).
    InvalidPagination = 1003,
    /// Required field missing (C1004).
    RequiredFieldMissing = 1004,

    // Connection errors (3xxx)
    /// Database connection failed (C3001).
    ConnectionFailed = 3001,

    // Query execution errors (5xxx)
    /// SQL syntax error (C5001).
    SqlSyntax = 5001,
    /// Constraint violation reported by the database (C5002).
    ConstraintViolation = 5002,
    /// General database error (C5003).
    DatabaseError = 5003,

    // Data errors (6xxx)
    /// Deserialization error (C6002).
    DeserializationError = 6002,

    // Configuration errors (7xxx)
    /// Invalid configuration (C7001).
    InvalidConfiguration = 7001,
    /// Unknown model type (C7002).
    UnknownModel = 7002,
}

impl ErrorCode {
    /// Get the error code string (e.g., "C1001").
    pub fn code(&self) -> String {
        format!("C{}", *self as u16)
    }

    /// Get a short description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::InvalidFilter => "Invalid filter expression",
            Self::InvalidOrder => "Invalid order expression",
            Self::InvalidPagination => "Invalid pagination",
            Self::RequiredFieldMissing => "Required field missing",
            Self::ConnectionFailed => "Database connection failed",
            Self::SqlSyntax => "SQL syntax error",
            Self::ConstraintViolation => "Constraint violation",
            Self::DatabaseError => "Database error",
            Self::DeserializationError => "Deserialization error",
            Self::InvalidConfiguration => "Invalid configuration",
            Self::UnknownModel => "Unknown model type",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Additional context for an error.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation that was being performed.
    pub operation: Option<String>,
    /// The model type involved.
    pub model: Option<String>,
    /// The property involved.
    pub property: Option<String>,
    /// The SQL statement (if available).
    pub sql: Option<String>,
    /// Suggestions for fixing the error.
    pub suggestions: Vec<String>,
}

/// Errors that can occur while compiling or executing a query.
#[derive(Error, Debug)]
pub struct QueryError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
    /// Additional context.
    pub context: ErrorContext,
    /// The source error (if any).
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl QueryError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Add context about the operation.
    pub fn with_context(mut self, operation: impl Into<String>) -> Self {
        self.context.operation = Some(operation.into());
        self
    }

    /// Add a suggestion for fixing the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context.suggestions.push(suggestion.into());
        self
    }

    /// Set the model type.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.context.model = Some(model.into());
        self
    }

    /// Set the property.
    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.context.property = Some(property.into());
        self
    }

    /// Set the SQL statement.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.context.sql = Some(sql.into());
        self
    }

    /// Set the source error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // ============== Constructor Functions ==============

    /// Create an invalid filter error.
    pub fn invalid_filter(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidFilter, message)
    }

    /// Create an invalid order error.
    pub fn invalid_order(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidOrder, message)
    }

    /// Create an invalid pagination error.
    pub fn invalid_pagination(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidPagination, message)
    }

    /// Create a missing field error.
    pub fn required_field(model: impl Into<String>, field: impl Into<String>) -> Self {
        let model = model.into();
        let field = field.into();
        Self::new(
            ErrorCode::RequiredFieldMissing,
            format!("{} requires a value for {}", model, field),
        )
        .with_model(&model)
        .with_property(&field)
    }

    /// Create an unknown model error.
    pub fn unknown_model(obj_type: impl Into<String>) -> Self {
        let obj_type = obj_type.into();
        Self::new(
            ErrorCode::UnknownModel,
            format!("No model registered for type '{}'", obj_type),
        )
        .with_model(&obj_type)
        .with_suggestion("Register the model type on the ModelRegistry at startup")
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfiguration, message)
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCode::ConnectionFailed, format!("Connection error: {}", message))
            .with_suggestion("Check that the database server is running")
            .with_suggestion("Verify the connection URL is correct")
    }

    /// Create an SQL syntax error.
    pub fn sql_syntax(message: impl Into<String>, sql: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCode::SqlSyntax, format!("SQL syntax error: {}", message)).with_sql(sql)
    }

    /// Create a constraint violation error.
    pub fn constraint_violation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConstraintViolation, message)
    }

    /// Create a general database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
            .with_suggestion("Check the database logs for more details")
    }

    /// Create a deserialization error.
    pub fn deserialization(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(
            ErrorCode::DeserializationError,
            format!("Failed to deserialize result: {}", message),
        )
        .with_suggestion("Check that the model metadata matches the table structure")
    }

    // ============== Error Checks ==============

    /// Check if this error comes from an invalid query configuration.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::InvalidFilter
                | ErrorCode::InvalidOrder
                | ErrorCode::InvalidPagination
                | ErrorCode::RequiredFieldMissing
                | ErrorCode::InvalidConfiguration
                | ErrorCode::UnknownModel
        )
    }

    /// Check if this error was raised while talking to the database.
    pub fn is_execution_error(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::ConnectionFailed
                | ErrorCode::SqlSyntax
                | ErrorCode::ConstraintViolation
                | ErrorCode::DatabaseError
                | ErrorCode::DeserializationError
        )
    }

    /// Check if this is a connection error.
    pub fn is_connection_error(&self) -> bool {
        self.code == ErrorCode::ConnectionFailed
    }

    /// Display the full error with all context and suggestions.
    pub fn display_full(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Error [{}]: {}\n", self.code.code(), self.message));

        if let Some(ref op) = self.context.operation {
            output.push_str(&format!("  → While: {}\n", op));
        }
        if let Some(ref model) = self.context.model {
            output.push_str(&format!("  → Model: {}\n", model));
        }
        if let Some(ref property) = self.context.property {
            output.push_str(&format!("  → Property: {}\n", property));
        }

        // Long statements are truncated.
        if let Some(ref sql) = self.context.sql {
            let sql_display = if sql.chars().count() > 200 {
                format!("{}...", sql.chars().take(200).collect::<String>())
            } else {
                sql.clone()
            };
            output.push_str(&format!("  → SQL: {}\n", sql_display));
        }

        if !self.context.suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for (i, suggestion) in self.context.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion));
            }
        }

        output
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        QueryError::deserialization(err.to_string()).with_source(err)
    }
}
