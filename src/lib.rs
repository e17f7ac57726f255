//! # Charcoal
//!
//! Collection loading for Charcoal models.
//!
//! Charcoal provides:
//! - Filter, order and pagination expression trees compiled to SQL
//! - A [`CollectionLoader`](query::CollectionLoader) that runs them and
//!   hydrates models into an ordered [`Collection`](query::Collection)
//! - Table-level CRUD and DDL through a
//!   [`DatabaseSource`](query::DatabaseSource)
//! - SQLite and MySQL drivers behind the `sqlite` and `mysql` features
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use charcoal::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let metadata = Arc::new(
//!         ModelMetadata::new("charcoal/news", "news")
//!             .property(PropertyDef::new("title", SqlType::Varchar(255)))
//!             .property(PropertyDef::new("position", SqlType::Integer)),
//!     );
//!     let conn = SqliteConnection::memory().await?;
//!
//!     let news = CollectionLoader::new(Arc::new(conn), Record::factory(metadata))
//!         .add_filter("position", 10, FilterOptions::new().operator(Operator::Lt))
//!         .add_order("position", Direction::Asc)
//!         .num_per_page(10)
//!         .load()
//!         .await?;
//!
//!     for item in &news {
//!         println!("{:?}", item.get("title"));
//!     }
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Expressions, models, sources and loaders.
pub mod query {
    pub use charcoal_query::*;
}

/// SQLite driver.
#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub mod sqlite {
    pub use charcoal_sqlite::*;
}

/// MySQL driver.
#[cfg(feature = "mysql")]
#[cfg_attr(docsrs, doc(cfg(feature = "mysql")))]
pub mod mysql {
    pub use charcoal_mysql::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use charcoal_query::prelude::*;

    #[cfg(feature = "mysql")]
    pub use charcoal_mysql::MysqlConnection;
    #[cfg(feature = "sqlite")]
    pub use charcoal_sqlite::SqliteConnection;
}

// Re-export key types at the crate root
pub use charcoal_query::{CharcoalConfig, QueryError, QueryResult};

use charcoal_query::SharedConnection;

/// Open a connection for the database named in `config`.
///
/// The provider's driver feature must be enabled.
pub async fn connect(config: &CharcoalConfig) -> QueryResult<SharedConnection> {
    let url = config
        .database_url()
        .ok_or_else(|| QueryError::configuration("database.url is not set"))?;

    match config.database.provider {
        #[cfg(feature = "sqlite")]
        charcoal_query::Dialect::Sqlite => Ok(std::sync::Arc::new(
            charcoal_sqlite::SqliteConnection::from_url(url).await?,
        )),
        #[cfg(feature = "mysql")]
        charcoal_query::Dialect::Mysql => Ok(std::sync::Arc::new(
            charcoal_mysql::MysqlConnection::from_url(url)?,
        )),
        #[allow(unreachable_patterns)]
        provider => Err(QueryError::configuration(format!(
            "the '{}' driver is not enabled",
            provider
        ))),
    }
}
