//! SQLite driver for Charcoal collection loading.
//!
//! Implements [`charcoal_query::Connection`] on top of `tokio-rusqlite`.
//! Every connection registers MySQL-compatible `FIELD`, `FIND_IN_SET` and
//! `RAND` functions so compiled filters and orders run unchanged.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use charcoal_query::prelude::*;
//! use charcoal_sqlite::SqliteConnection;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let conn = SqliteConnection::from_url("sqlite://./news.db").await?;
//!     let metadata = Arc::new(ModelMetadata::new("news", "news"));
//!     let items = CollectionLoader::new(Arc::new(conn), Record::factory(metadata))
//!         .add_order("id", Direction::Desc)
//!         .num_per_page(10)
//!         .load()
//!         .await?;
//!     println!("{} items", items.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod functions;
pub mod types;

pub use config::{DatabasePath, JournalMode, SqliteConfig};
pub use connection::SqliteConnection;
pub use error::{SqliteError, SqliteResult};
