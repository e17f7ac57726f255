//! # charcoal-query
//!
//! Query expressions and collection loading for Charcoal models.
//!
//! This crate provides:
//! - Filter, order and pagination expression trees that compile to
//!   MySQL-flavored SQL fragments
//! - Model metadata, a dynamic [`Record`] model and a [`ModelRegistry`]
//! - [`DatabaseSource`] for table-level CRUD and DDL
//! - [`CollectionLoader`] for building and running collection queries
//! - An optional row cache, `charcoal.toml` configuration and logging setup
//!
//! ## Filters
//!
//! ```rust
//! use charcoal_query::{Expression, Filter, Operand, Operator};
//!
//! let filter = Filter::group([
//!     Filter::raw("`a` = 1").operand(Operand::Or),
//!     Filter::predicate("b", Operator::In, vec![1, 2]),
//! ]);
//! assert_eq!(filter.sql().unwrap(), "(`a` = 1 OR (`b` IN ('1','2')))");
//! ```
//!
//! ## Orders and pagination
//!
//! ```rust
//! use charcoal_query::{Expression, Order, Pagination};
//!
//! assert_eq!(Order::desc("date").sql().unwrap(), "`date` DESC");
//! assert_eq!(Pagination::paged(5, 50).sql().unwrap(), " LIMIT 200, 50");
//! ```
//!
//! ## Execution
//!
//! Statements run through a [`Connection`] supplied by a driver crate
//! (`charcoal-sqlite`, `charcoal-mysql`). Sources always bind values as
//! `?` parameters; [`Expression::sql`] inlines them for display and tests.

pub mod cache;
pub mod collection;
pub mod config;
pub mod connection;
pub mod error;
pub mod expression;
pub mod filter;
pub mod loader;
pub mod logging;
pub mod model;
pub mod order;
pub mod pagination;
pub mod source;
pub mod value;

#[cfg(test)]
mod testing;

pub use cache::{CacheStats, MemoryCache, QueryCache, SharedCache};
pub use collection::Collection;
pub use config::CharcoalConfig;
pub use connection::{Connection, Dialect, SharedConnection};
pub use error::{ErrorCode, ErrorContext, QueryError, QueryResult};
pub use expression::{DEFAULT_TABLE_ALIAS, Expression, ExpressionMeta, SqlCompiler, ValueMode};
pub use filter::{Filter, FilterKind, FilterOptions, FilterSpec, Operand, Operator, Predicate};
pub use loader::{CollectionLoader, KeywordSpec, LoadCallback, LoaderSpec};
pub use model::{
    BoxedModel, FieldDef, Model, ModelFactory, ModelMetadata, ModelRegistry, PropertyDef, Record,
    Row, SqlType,
};
pub use order::{Direction, Order, OrderKind, OrderSpec};
pub use pagination::Pagination;
pub use source::DatabaseSource;
pub use value::Value;

// Re-export async_trait for driver implementations.
pub use async_trait::async_trait;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::collection::Collection;
    pub use crate::connection::{Connection, Dialect, SharedConnection};
    pub use crate::error::{QueryError, QueryResult};
    pub use crate::expression::Expression;
    pub use crate::filter::{Filter, FilterOptions, Operand, Operator};
    pub use crate::loader::CollectionLoader;
    pub use crate::model::{Model, ModelFactory, ModelMetadata, ModelRegistry, PropertyDef, Record, SqlType};
    pub use crate::order::{Direction, Order};
    pub use crate::pagination::Pagination;
    pub use crate::source::DatabaseSource;
    pub use crate::value::Value;
}
