//! Collection loading.
//!
//! [`CollectionLoader`] is the builder-style entry point for reading models:
//! set a projection, append filters and orders, pick a page, then `load()`.
//!
//! ```rust,no_run
//! # async fn example(
//! #     connection: charcoal_query::SharedConnection,
//! #     factory: charcoal_query::ModelFactory<charcoal_query::Record>,
//! # ) -> charcoal_query::QueryResult<()> {
//! use charcoal_query::{CollectionLoader, Direction, FilterOptions, Operator};
//!
//! let news = CollectionLoader::new(connection, factory)
//!     .add_filter("x", 10, FilterOptions::new().operator(Operator::Lt))
//!     .add_filter("y", 1, FilterOptions::new().operator(Operator::Gte))
//!     .add_order("x", Direction::Asc)
//!     .page(1)
//!     .num_per_page(10)
//!     .load()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{SharedCache, cache_key};
use crate::collection::Collection;
use crate::config::CharcoalConfig;
use crate::connection::SharedConnection;
use crate::error::{QueryError, QueryResult};
use crate::filter::{Filter, FilterOptions, FilterSpec, Operand, Operator};
use crate::model::{BoxedModel, Model, ModelFactory, ModelRegistry, Row, SqlType};
use crate::order::{Direction, Order, OrderSpec};
use crate::source::DatabaseSource;
use crate::value::Value;

/// Callback applied to every loaded model.
pub type LoadCallback<M> = Arc<dyn Fn(&mut M) + Send + Sync>;

/// Builds and runs collection queries for one model type.
pub struct CollectionLoader<M> {
    source: DatabaseSource<M>,
    callback: Option<LoadCallback<M>>,
    cache: Option<SharedCache>,
    log_queries: bool,
    slow_query_threshold: Duration,
}

impl<M: Model> CollectionLoader<M> {
    /// Create a loader for the factory's model.
    pub fn new(connection: SharedConnection, factory: ModelFactory<M>) -> Self {
        Self::from_source(DatabaseSource::new(connection, factory))
    }

    /// Create a loader over an existing source.
    pub fn from_source(source: DatabaseSource<M>) -> Self {
        Self {
            source,
            callback: None,
            cache: None,
            log_queries: false,
            slow_query_threshold: Duration::from_secs(1),
        }
    }

    /// The underlying source.
    pub fn source(&self) -> &DatabaseSource<M> {
        &self.source
    }

    /// The underlying source, mutably.
    pub fn source_mut(&mut self) -> &mut DatabaseSource<M> {
        &mut self.source
    }

    /// Apply loader, cache and debug settings.
    ///
    /// A cache already attached (by [`ModelRegistry::loader`], for instance)
    /// is kept; otherwise an enabled cache section gives this loader its own.
    pub fn with_config(mut self, config: &CharcoalConfig) -> Self {
        self.source.set_table_alias(config.loader.table_alias.clone());
        if config.loader.num_per_page > 0 {
            self.source
                .pagination_mut()
                .set_num_per_page(config.loader.num_per_page);
        }
        if self.cache.is_none() {
            self.cache = config.cache.build();
        }
        self.log_queries = config.debug.log_queries;
        self.slow_query_threshold = config.debug.slow_query_threshold();
        self
    }

    /// Replace the projection.
    pub fn properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source.set_properties(properties);
        self
    }

    /// Add a property to the projection.
    pub fn add_property(mut self, property: impl Into<String>) -> Self {
        self.source.add_property(property);
        self
    }

    /// Append a predicate filter.
    pub fn add_filter(
        mut self,
        property: impl Into<String>,
        value: impl Into<Value>,
        options: FilterOptions,
    ) -> Self {
        self.source.add_filter(options.into_filter(property, value));
        self
    }

    /// Append a filter.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.source.add_filter(filter);
        self
    }

    /// Append a property order.
    pub fn add_order(mut self, property: impl Into<String>, direction: Direction) -> Self {
        self.source.add_order(Order::by(property, direction));
        self
    }

    /// Append an order.
    pub fn order(mut self, order: Order) -> Self {
        self.source.add_order(order);
        self
    }

    /// Set the page, starting at 1.
    pub fn page(mut self, page: u64) -> Self {
        self.source.pagination_mut().set_page(page);
        self
    }

    /// Set the rows per page; 0 loads everything.
    pub fn num_per_page(mut self, num_per_page: u64) -> Self {
        self.source.pagination_mut().set_num_per_page(num_per_page);
        self
    }

    /// Match `keyword` against `properties` with LIKE, any property matching.
    ///
    /// With no properties, every text property of the model is searched.
    pub fn add_keyword(mut self, keyword: &str, properties: &[&str]) -> Self {
        let properties: Vec<String> = if properties.is_empty() {
            self.source
                .metadata()
                .properties
                .values()
                .filter(|p| {
                    p.fields
                        .iter()
                        .any(|f| matches!(f.sql_type, SqlType::Varchar(_) | SqlType::Text))
                })
                .map(|p| p.ident.clone())
                .collect()
        } else {
            properties.iter().map(|p| p.to_string()).collect()
        };

        if properties.is_empty() {
            warn!(keyword, "No searchable properties for keyword");
            return self;
        }

        let pattern = format!("%{}%", keyword);
        let group = Filter::group(properties.into_iter().map(|property| {
            Filter::predicate(property, Operator::Like, pattern.as_str()).operand(Operand::Or)
        }));
        self.source.add_filter(group);
        self
    }

    /// Run `callback` on every loaded model.
    pub fn callback(mut self, callback: impl Fn(&mut M) + Send + Sync + 'static) -> Self {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Cache loaded rows.
    pub fn cache(mut self, cache: SharedCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Configure from a serializable specification.
    ///
    /// Filters and orders are appended; properties and pagination replace
    /// the current values when present.
    pub fn set_data(mut self, spec: LoaderSpec) -> QueryResult<Self> {
        if !spec.properties.is_empty() {
            self.source.set_properties(spec.properties);
        }
        for filter in spec.filters {
            self.source.add_filter(Filter::try_from(filter)?);
        }
        for order in spec.orders {
            self.source.add_order(Order::try_from(order)?);
        }
        if let Some(page) = spec.page {
            self.source.pagination_mut().set_page(page);
        }
        if let Some(num_per_page) = spec.num_per_page {
            self.source.pagination_mut().set_num_per_page(num_per_page);
        }
        for keyword in spec.keywords {
            let properties = keyword
                .properties
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>();
            self = self.add_keyword(&keyword.keyword, &properties);
        }
        Ok(self)
    }

    /// Clear projection, filters, orders and pagination.
    pub fn reset(mut self) -> Self {
        self.source.reset();
        self
    }

    /// Load the configured collection.
    pub async fn load(&self) -> QueryResult<Collection<M>> {
        let (sql, params) = self.source.select_sql()?;
        let rows = self.fetch(&sql, &params).await?;
        self.collect(rows)
    }

    /// Load from an arbitrary SELECT.
    pub async fn load_from_query(&self, sql: &str, params: &[Value]) -> QueryResult<Collection<M>> {
        let rows = self.fetch(sql, params).await?;
        self.collect(rows)
    }

    /// Count the rows matching the configured filters, ignoring pagination.
    pub async fn load_count(&self) -> QueryResult<u64> {
        let started = Instant::now();
        let count = self.source.load_count().await?;
        self.observe("count", started.elapsed());
        Ok(count)
    }

    async fn fetch(&self, sql: &str, params: &[Value]) -> QueryResult<Vec<Row>> {
        let key = self.cache.as_ref().map(|_| cache_key(sql, params));
        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(rows) = cache.get(key) {
                debug!(sql = %sql, rows = rows.len(), "Cache hit");
                return Ok(rows);
            }
        }

        if self.log_queries {
            info!(table = %self.source.table(), sql = %sql, "Loading collection");
        } else {
            debug!(table = %self.source.table(), sql = %sql, "Loading collection");
        }

        let started = Instant::now();
        let rows = self
            .source
            .connection()
            .query(sql, params)
            .await
            .map_err(|e| {
                e.with_model(self.source.metadata().obj_type.clone())
                    .with_context("load collection")
            })?;
        self.observe("load", started.elapsed());

        if let (Some(cache), Some(key)) = (&self.cache, key) {
            cache.put(key, rows.clone());
        }
        Ok(rows)
    }

    fn observe(&self, operation: &str, elapsed: Duration) {
        if elapsed >= self.slow_query_threshold {
            warn!(
                table = %self.source.table(),
                operation,
                elapsed_ms = elapsed.as_millis() as u64,
                "Slow query detected"
            );
        }
    }

    fn collect(&self, rows: Vec<Row>) -> QueryResult<Collection<M>> {
        let mut collection = self.source.hydrate(rows)?;
        if let Some(callback) = &self.callback {
            let models = collection.into_vec();
            collection = models
                .into_iter()
                .map(|mut model| {
                    callback(&mut model);
                    model
                })
                .collect();
        }
        Ok(collection)
    }
}

impl<M> std::fmt::Debug for CollectionLoader<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionLoader")
            .field("source", &self.source)
            .field("cache", &self.cache)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

/// Serializable loader configuration.
///
/// ```rust
/// use charcoal_query::LoaderSpec;
///
/// let spec = LoaderSpec::from_json(serde_json::json!({
///     "properties": ["id", "title"],
///     "filters": [{ "property": "active", "value": 1 }],
///     "orders": [{ "property": "position", "mode": "asc" }],
///     "page": 2,
///     "num_per_page": 20
/// }))
/// .unwrap();
///
/// assert_eq!(spec.filters.len(), 1);
/// assert_eq!(spec.page, Some(2));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderSpec {
    /// Projection.
    pub properties: Vec<String>,
    /// Filters to append.
    pub filters: Vec<FilterSpec>,
    /// Orders to append.
    pub orders: Vec<OrderSpec>,
    /// Page.
    pub page: Option<u64>,
    /// Rows per page.
    #[serde(alias = "numPerPage")]
    pub num_per_page: Option<u64>,
    /// Keyword searches.
    pub keywords: Vec<KeywordSpec>,
}

impl LoaderSpec {
    /// Parse from JSON.
    pub fn from_json(json: serde_json::Value) -> QueryResult<Self> {
        serde_json::from_value(json).map_err(|e| {
            QueryError::configuration(format!("invalid loader specification: {}", e))
        })
    }
}

/// A keyword search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordSpec {
    /// Text to search for.
    pub keyword: String,
    /// Properties to search; empty searches every text property.
    pub properties: Vec<String>,
}

impl ModelRegistry {
    /// Create a loader for a registered model type.
    ///
    /// Loaders created here share the registry's cache, if any.
    pub fn loader(
        &self,
        obj_type: &str,
        connection: SharedConnection,
    ) -> QueryResult<CollectionLoader<BoxedModel>> {
        let loader = CollectionLoader::new(connection, self.factory(obj_type)?);
        Ok(match self.cache() {
            Some(cache) => loader.cache(cache.clone()),
            None => loader,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::model::{ModelMetadata, PropertyDef, Record};
    use crate::testing::{RecordingConnection, row};
    use pretty_assertions::assert_eq;

    fn metadata() -> ModelMetadata {
        ModelMetadata::new("charcoal/news", "news")
            .property(PropertyDef::new("title", SqlType::Varchar(255)))
            .property(PropertyDef::new("body", SqlType::Text))
            .property(PropertyDef::new("x", SqlType::Integer))
            .property(PropertyDef::new("y", SqlType::Integer))
    }

    fn loader() -> (Arc<RecordingConnection>, CollectionLoader<Record>) {
        let connection = Arc::new(RecordingConnection::new());
        let loader = CollectionLoader::new(connection.clone(), Record::factory(Arc::new(metadata())));
        (connection, loader)
    }

    #[tokio::test]
    async fn test_load_compiles_filters_in_order() {
        let (connection, loader) = loader();
        let loader = loader
            .add_filter("x", 10, FilterOptions::new().operator(Operator::Lt))
            .add_filter("y", 1, FilterOptions::new().operator(Operator::Gte))
            .add_order("x", Direction::Asc)
            .page(1)
            .num_per_page(10);

        loader.load().await.unwrap();
        let (sql, params) = connection.statements().pop().unwrap();
        assert_eq!(
            sql,
            "SELECT `objTable`.* FROM `news` AS `objTable` \
             WHERE ((`objTable`.`x` < ?) AND (`objTable`.`y` >= ?)) \
             ORDER BY `objTable`.`x` ASC LIMIT 0, 10"
        );
        assert_eq!(params, vec![Value::Int(10), Value::Int(1)]);
    }

    #[tokio::test]
    async fn test_repeated_load_issues_same_statement() {
        let (connection, loader) = loader();
        let loader = loader.add_filter("x", 1, FilterOptions::new());
        loader.load().await.unwrap();
        loader.load().await.unwrap();

        let statements = connection.statements();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0], statements[1]);
    }

    #[tokio::test]
    async fn test_cache_short_circuits() {
        let (connection, loader) = loader();
        let cache = Arc::new(MemoryCache::default());
        let loader = loader.cache(cache.clone());
        connection.push_result(vec![row(&[("id", Value::Int(1))])]);

        assert_eq!(loader.load().await.unwrap().len(), 1);
        assert_eq!(loader.load().await.unwrap().len(), 1);
        assert_eq!(connection.statements().len(), 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_registry_loaders_share_cache() {
        let connection = Arc::new(RecordingConnection::new());
        let config: CharcoalConfig = "[cache]\nenabled = true\n".parse().unwrap();
        let mut registry = ModelRegistry::new();
        registry.register_record(metadata()).configure(&config);

        let first = registry
            .loader("charcoal/news", connection.clone())
            .unwrap()
            .with_config(&config);
        let second = registry
            .loader("charcoal/news", connection.clone())
            .unwrap()
            .with_config(&config);
        connection.push_result(vec![row(&[("id", Value::Int(1))])]);

        assert_eq!(first.load().await.unwrap().len(), 1);
        assert_eq!(second.load().await.unwrap().len(), 1);
        assert_eq!(connection.statements().len(), 1);
    }

    #[tokio::test]
    async fn test_with_config_cache_per_loader() {
        let connection = Arc::new(RecordingConnection::new());
        let config: CharcoalConfig = "[cache]\nenabled = true\n".parse().unwrap();
        let factory = Record::factory(Arc::new(metadata()));
        let first = CollectionLoader::new(connection.clone(), factory.clone()).with_config(&config);
        let second = CollectionLoader::new(connection.clone(), factory).with_config(&config);
        connection.push_result(vec![row(&[("id", Value::Int(1))])]);

        assert_eq!(first.load().await.unwrap().len(), 1);
        first.load().await.unwrap();
        second.load().await.unwrap();
        assert_eq!(connection.statements().len(), 2);
    }

    #[tokio::test]
    async fn test_callback_applies_to_each_model() {
        let (connection, loader) = loader();
        connection.push_result(vec![
            row(&[("id", Value::Int(1))]),
            row(&[("id", Value::Int(2))]),
        ]);
        let loader = loader.callback(|record: &mut Record| record.set("seen", true));

        let items = loader.load().await.unwrap();
        assert!(items.iter().all(|r| r.get("seen") == Some(&Value::Bool(true))));
    }

    #[tokio::test]
    async fn test_keyword_searches_text_properties() {
        let (connection, loader) = loader();
        let loader = loader
            .add_keyword("rust", &[])
            .add_filter("x", 1, FilterOptions::new());
        loader.load().await.unwrap();

        let (sql, params) = connection.statements().pop().unwrap();
        assert!(sql.contains(
            "WHERE (((`objTable`.`title` LIKE ?) OR (`objTable`.`body` LIKE ?)) AND (`objTable`.`x` = ?))"
        ));
        assert_eq!(params[0], Value::from("%rust%"));
    }

    #[tokio::test]
    async fn test_set_data() {
        let (connection, loader) = loader();
        let spec = LoaderSpec::from_json(serde_json::json!({
            "properties": ["title"],
            "filters": [{ "property": "x", "operator": ">", "value": 2 }],
            "orders": [{ "property": "y", "mode": "desc" }],
            "page": 3,
            "numPerPage": 5
        }))
        .unwrap();

        loader.set_data(spec).unwrap().load().await.unwrap();
        assert_eq!(
            connection.last_sql(),
            "SELECT `objTable`.`title` FROM `news` AS `objTable` \
             WHERE (`objTable`.`x` > ?) ORDER BY `objTable`.`y` DESC LIMIT 10, 5"
        );
    }

    #[test]
    fn test_set_data_rejects_bad_operator() {
        let (_, loader) = loader();
        let spec = LoaderSpec::from_json(serde_json::json!({
            "filters": [{ "property": "x", "operator": "~~", "value": 2 }]
        }))
        .unwrap();
        assert!(loader.set_data(spec).is_err());
    }

    #[tokio::test]
    async fn test_with_config_and_reset() {
        let (connection, loader) = loader();
        let config: CharcoalConfig = "[loader]\ntable_alias = \"n\"\nnum_per_page = 20\n"
            .parse()
            .unwrap();

        let loader = loader.with_config(&config).add_filter("x", 1, FilterOptions::new());
        loader.load().await.unwrap();
        assert_eq!(
            connection.last_sql(),
            "SELECT `n`.* FROM `news` AS `n` WHERE (`n`.`x` = ?) LIMIT 0, 20"
        );

        let loader = loader.reset();
        loader.load().await.unwrap();
        assert_eq!(connection.last_sql(), "SELECT `n`.* FROM `news` AS `n`");
    }

    #[tokio::test]
    async fn test_load_count() {
        let (connection, loader) = loader();
        connection.push_result(vec![row(&[("count", Value::Int(3))])]);
        let loader = loader.num_per_page(1);
        assert_eq!(loader.load_count().await.unwrap(), 3);
        assert!(!connection.last_sql().contains("LIMIT"));
    }

    #[tokio::test]
    async fn test_registry_loader() {
        let mut registry = ModelRegistry::new();
        registry.register_record(metadata());
        let connection = Arc::new(RecordingConnection::new());
        connection.push_result(vec![row(&[("id", Value::Int(5)), ("x", Value::Int(1))])]);

        let loader = registry.loader("charcoal/news", connection.clone()).unwrap();
        let items = loader.load().await.unwrap();
        assert_eq!(items.first().map(|m| m.id()), Some(Value::Int(5)));

        assert!(registry.loader("charcoal/unknown", connection).is_err());
    }
}
