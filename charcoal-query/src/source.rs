//! Binding of a model type to its backing table.
//!
//! A [`DatabaseSource`] holds the projection, filter tree, order tree and
//! pagination of one query, compiles them into a single SELECT with bound
//! parameters, and runs the CRUD and DDL statements for its model.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::collection::Collection;
use crate::connection::SharedConnection;
use crate::error::{QueryError, QueryResult};
use crate::expression::{DEFAULT_TABLE_ALIAS, Expression, SqlCompiler, quote_identifier};
use crate::filter::Filter;
use crate::model::{Model, ModelFactory, ModelMetadata, Row, SqlType};
use crate::order::Order;
use crate::pagination::Pagination;
use crate::value::Value;

/// A table-backed source of models.
pub struct DatabaseSource<M> {
    connection: SharedConnection,
    factory: ModelFactory<M>,
    metadata: Arc<ModelMetadata>,
    table: String,
    table_alias: String,
    properties: Vec<String>,
    filters: Filter,
    orders: Order,
    pagination: Pagination,
}

impl<M: Model> DatabaseSource<M> {
    /// Create a source for the factory's model, on the model's table.
    pub fn new(connection: SharedConnection, factory: ModelFactory<M>) -> Self {
        let metadata = Arc::new(factory.create().metadata().clone());
        Self {
            connection,
            table: metadata.table.clone(),
            metadata,
            factory,
            table_alias: DEFAULT_TABLE_ALIAS.to_string(),
            properties: Vec::new(),
            filters: Filter::empty(),
            orders: Order::empty(),
            pagination: Pagination::new(),
        }
    }

    /// The connection.
    pub fn connection(&self) -> &SharedConnection {
        &self.connection
    }

    /// The model metadata.
    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// The backing table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Use another table.
    pub fn set_table(&mut self, table: impl Into<String>) {
        self.table = table.into();
    }

    /// Alias of the table in SELECT statements.
    pub fn table_alias(&self) -> &str {
        &self.table_alias
    }

    /// Set the table alias.
    pub fn set_table_alias(&mut self, alias: impl Into<String>) {
        self.table_alias = alias.into();
    }

    /// Projected properties; empty selects every column.
    pub fn properties(&self) -> &[String] {
        &self.properties
    }

    /// Replace the projection.
    pub fn set_properties<I, S>(&mut self, properties: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties = properties.into_iter().map(Into::into).collect();
    }

    /// Add a property to the projection.
    pub fn add_property(&mut self, property: impl Into<String>) {
        let property = property.into();
        if !self.properties.contains(&property) {
            self.properties.push(property);
        }
    }

    /// The root filter group.
    pub fn filters(&self) -> &Filter {
        &self.filters
    }

    /// Append a filter to the root group.
    pub fn add_filter(&mut self, filter: Filter) {
        self.filters.push(filter);
    }

    /// The root order group.
    pub fn orders(&self) -> &Order {
        &self.orders
    }

    /// Append an order to the root group.
    pub fn add_order(&mut self, order: Order) {
        self.orders.push(order);
    }

    /// The pagination.
    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    /// The pagination, mutably.
    pub fn pagination_mut(&mut self) -> &mut Pagination {
        &mut self.pagination
    }

    /// Replace the pagination.
    pub fn set_pagination(&mut self, pagination: Pagination) {
        self.pagination = pagination;
    }

    /// Clear projection, filters, orders and pagination.
    pub fn reset(&mut self) {
        self.properties.clear();
        self.filters = Filter::empty();
        self.orders = Order::empty();
        self.pagination = Pagination::new();
    }

    fn compiler(&self) -> SqlCompiler<'_> {
        SqlCompiler::bound()
            .with_table_alias(&self.table_alias)
            .with_metadata(&self.metadata)
            .with_dialect(self.connection.dialect())
    }

    fn from_clause(&self) -> String {
        format!(
            "FROM {} AS {}",
            quote_identifier(&self.table),
            quote_identifier(&self.table_alias)
        )
    }

    fn projection(&self, compiler: &SqlCompiler<'_>) -> String {
        if self.properties.is_empty() {
            return format!("{}.*", quote_identifier(&self.table_alias));
        }
        self.properties
            .iter()
            .flat_map(|property| compiler.field_identifiers(None, property))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn where_clause(&self, compiler: &mut SqlCompiler<'_>) -> QueryResult<String> {
        let condition = self.filters.compile(compiler)?;
        if condition.is_empty() {
            Ok(String::new())
        } else {
            Ok(format!(" WHERE {}", condition))
        }
    }

    /// Compile the SELECT for the current configuration.
    pub fn select_sql(&self) -> QueryResult<(String, Vec<Value>)> {
        let mut compiler = self.compiler();
        let mut sql = format!("SELECT {} {}", self.projection(&compiler), self.from_clause());

        let where_clause = self.where_clause(&mut compiler)?;
        sql.push_str(&where_clause);

        let order = self.orders.compile(&mut compiler)?;
        if !order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order);
        }

        let limit = self.pagination.compile(&mut compiler)?;
        sql.push_str(&limit);

        Ok((sql, compiler.into_params()))
    }

    /// Compile the COUNT over the current filters.
    pub fn count_sql(&self) -> QueryResult<(String, Vec<Value>)> {
        let mut compiler = self.compiler();
        let mut sql = format!("SELECT COUNT(*) AS `count` {}", self.from_clause());
        let where_clause = self.where_clause(&mut compiler)?;
        sql.push_str(&where_clause);
        Ok((sql, compiler.into_params()))
    }

    /// Hydrate rows into a collection.
    pub fn hydrate(&self, rows: Vec<Row>) -> QueryResult<Collection<M>> {
        let mut collection = Collection::new();
        for row in rows {
            let mut model = self.factory.create();
            model.apply_row(&row)?;
            collection.push(model);
        }
        Ok(collection)
    }

    /// Load every model matching the current configuration.
    pub async fn load_items(&self) -> QueryResult<Collection<M>> {
        let (sql, params) = self.select_sql()?;
        self.load_items_from_query(&sql, &params).await
    }

    /// Load models from an arbitrary SELECT.
    pub async fn load_items_from_query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> QueryResult<Collection<M>> {
        debug!(table = %self.table, sql = %sql, "Loading items");
        let rows = self.connection.query(sql, params).await?;
        self.hydrate(rows)
    }

    /// Load one model by identifier.
    ///
    /// A missing row is not an error: the returned model has no identifier.
    pub async fn load_item(&self, ident: impl Into<Value>) -> QueryResult<M> {
        let key = self.metadata.key_field().name;
        let sql = format!(
            "SELECT * {} WHERE {}.{} = ? LIMIT 1",
            self.from_clause(),
            quote_identifier(&self.table_alias),
            quote_identifier(&key)
        );
        self.load_item_from_query(&sql, &[ident.into()]).await
    }

    /// Load the first model returned by an arbitrary SELECT.
    pub async fn load_item_from_query(&self, sql: &str, params: &[Value]) -> QueryResult<M> {
        debug!(table = %self.table, sql = %sql, "Loading item");
        let rows = self.connection.query(sql, params).await?;
        let mut model = self.factory.create();
        if let Some(row) = rows.first() {
            model.apply_row(row)?;
        }
        Ok(model)
    }

    /// Count the models matching the current filters.
    pub async fn load_count(&self) -> QueryResult<u64> {
        let (sql, params) = self.count_sql()?;
        debug!(table = %self.table, sql = %sql, "Counting items");
        let rows = self.connection.query(&sql, &params).await?;
        let count = rows
            .first()
            .and_then(|row| row.values().next())
            .and_then(Value::as_i64)
            .unwrap_or(0);
        Ok(count.max(0) as u64)
    }

    /// Insert a model and store the generated identifier on it.
    ///
    /// An integer key left empty is generated by the database. An empty text
    /// key wide enough for a UUID gets a fresh v4 UUID before the insert.
    /// Returns the model's identifier after the insert.
    pub async fn save_item(&self, model: &mut M) -> QueryResult<Value> {
        let key_field = self.metadata.key_field();
        let key = key_field.name;
        let mut row = model.to_row();
        let missing_key = row.get(&key).is_none_or(Value::is_empty_ident);

        if missing_key {
            match key_field.sql_type {
                SqlType::Integer | SqlType::BigInt => {
                    row.shift_remove(&key);
                }
                SqlType::Text => {
                    row.insert(key.clone(), self.generate_key(model));
                }
                SqlType::Varchar(len) if len >= 36 => {
                    row.insert(key.clone(), self.generate_key(model));
                }
                _ => {
                    return Err(QueryError::required_field(
                        self.metadata.obj_type.clone(),
                        self.metadata.key.clone(),
                    ));
                }
            }
        }

        let columns = row
            .keys()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; row.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(&self.table),
            columns,
            placeholders
        );
        let params = row.into_values().collect::<Vec<_>>();

        debug!(table = %self.table, sql = %sql, "Saving item");
        let generated = self
            .connection
            .insert(&sql, &params)
            .await
            .map_err(|e| e.with_model(self.metadata.obj_type.clone()))?;

        if missing_key && key_field.sql_type.is_integer() {
            if let Some(id) = generated {
                model.set_id(Value::Int(id));
            }
        }
        Ok(model.id())
    }

    fn generate_key(&self, model: &mut M) -> Value {
        let key = Value::String(Uuid::new_v4().to_string());
        model.set_id(key.clone());
        key
    }

    /// Update a model, restricted to `properties` when given.
    pub async fn update_item(&self, model: &M, properties: Option<&[&str]>) -> QueryResult<bool> {
        let id = self.require_id(model)?;
        let key = self.metadata.key_field().name;
        let mut row = model.to_row();
        row.shift_remove(&key);

        if let Some(properties) = properties {
            let wanted = properties
                .iter()
                .flat_map(|p| self.metadata.field_names(p))
                .collect::<Vec<_>>();
            row.retain(|column, _| wanted.contains(column));
        }

        if row.is_empty() {
            return Err(QueryError::configuration("no properties to update")
                .with_model(self.metadata.obj_type.clone()));
        }

        let assignments = row
            .keys()
            .map(|c| format!("{} = ?", quote_identifier(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            quote_identifier(&self.table),
            assignments,
            quote_identifier(&key)
        );
        let mut params = row.into_values().collect::<Vec<_>>();
        params.push(id);

        debug!(table = %self.table, sql = %sql, "Updating item");
        self.connection.execute(&sql, &params).await?;
        Ok(true)
    }

    /// Delete a model. Fails when the model has no identifier.
    ///
    /// Returns whether a row was deleted.
    pub async fn delete_item(&self, model: &M) -> QueryResult<bool> {
        let id = self.require_id(model)?;
        let key = self.metadata.key_field().name;
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            quote_identifier(&self.table),
            quote_identifier(&key)
        );

        debug!(table = %self.table, sql = %sql, "Deleting item");
        let affected = self.connection.execute(&sql, &[id]).await?;
        Ok(affected > 0)
    }

    fn require_id(&self, model: &M) -> QueryResult<Value> {
        let id = model.id();
        if id.is_empty_ident() {
            return Err(QueryError::required_field(
                self.metadata.obj_type.clone(),
                self.metadata.key.clone(),
            ));
        }
        Ok(id)
    }

    /// Whether the backing table exists.
    pub async fn table_exists(&self) -> QueryResult<bool> {
        self.connection.table_exists(&self.table).await
    }

    /// Create the backing table from the model metadata.
    ///
    /// Returns `false` without touching the database when it already exists.
    pub async fn create_table(&self) -> QueryResult<bool> {
        if self.table_exists().await? {
            return Ok(false);
        }

        let sql = self
            .metadata
            .create_table_sql(&self.table, self.connection.dialect());
        info!(table = %self.table, "Creating table");
        debug!(sql = %sql, "Create table statement");
        self.connection.execute(&sql, &[]).await?;
        Ok(true)
    }

    /// Add columns declared in the metadata but missing from the table.
    ///
    /// Returns the names of the added columns.
    pub async fn alter_table(&self) -> QueryResult<Vec<String>> {
        let existing = self.connection.table_columns(&self.table).await?;
        let dialect = self.connection.dialect();
        let mut added = Vec::new();

        for field in self.metadata.fields().iter().skip(1) {
            if existing.iter().any(|c| c.eq_ignore_ascii_case(&field.name)) {
                continue;
            }
            let sql = format!(
                "ALTER TABLE {} ADD COLUMN {}",
                quote_identifier(&self.table),
                field.column_sql(dialect, false)
            );
            info!(table = %self.table, column = %field.name, "Adding column");
            self.connection.execute(&sql, &[]).await?;
            added.push(field.name.clone());
        }

        Ok(added)
    }
}

impl<M> std::fmt::Debug for DatabaseSource<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSource")
            .field("table", &self.table)
            .field("table_alias", &self.table_alias)
            .field("properties", &self.properties)
            .field("filters", &self.filters)
            .field("orders", &self.orders)
            .field("pagination", &self.pagination)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::filter::{Operand, Operator};
    use crate::model::{PropertyDef, Record, SqlType};
    use crate::testing::{RecordingConnection, row};
    use pretty_assertions::assert_eq;

    fn metadata() -> Arc<ModelMetadata> {
        Arc::new(
            ModelMetadata::new("charcoal/news", "news")
                .property(PropertyDef::localized("title", SqlType::Varchar(255), &["en", "fr"]))
                .property(PropertyDef::new("x", SqlType::Integer))
                .property(PropertyDef::new("y", SqlType::Integer)),
        )
    }

    fn source() -> (Arc<RecordingConnection>, DatabaseSource<Record>) {
        let connection = Arc::new(RecordingConnection::new());
        let source = DatabaseSource::new(connection.clone(), Record::factory(metadata()));
        (connection, source)
    }

    #[test]
    fn test_select_defaults() {
        let (_, source) = source();
        let (sql, params) = source.select_sql().unwrap();
        assert_eq!(sql, "SELECT `objTable`.* FROM `news` AS `objTable`");
        assert!(params.is_empty());
    }

    #[test]
    fn test_select_full() {
        let (_, mut source) = source();
        source.set_properties(["title", "x"]);
        source.add_filter(Filter::predicate("x", Operator::Lt, 10).operand(Operand::Or));
        source.add_filter(Filter::predicate("y", Operator::Gte, 1));
        source.add_order(Order::asc("x"));
        source.set_pagination(Pagination::paged(2, 10));

        let (sql, params) = source.select_sql().unwrap();
        assert_eq!(
            sql,
            "SELECT `objTable`.`title_en`, `objTable`.`title_fr`, `objTable`.`x` \
             FROM `news` AS `objTable` \
             WHERE ((`objTable`.`x` < ?) OR (`objTable`.`y` >= ?)) \
             ORDER BY `objTable`.`x` ASC LIMIT 10, 10"
        );
        assert_eq!(params, vec![Value::Int(10), Value::Int(1)]);
    }

    #[test]
    fn test_select_is_deterministic() {
        let (_, mut source) = source();
        source.add_filter(Filter::equals("x", 1));
        assert_eq!(source.select_sql().unwrap(), source.select_sql().unwrap());
    }

    #[test]
    fn test_invalid_filter_surfaces() {
        let (_, mut source) = source();
        source.add_filter(Filter::equals("", 1));
        let err = source.select_sql().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidFilter);
    }

    #[test]
    fn test_reset() {
        let (_, mut source) = source();
        source.add_property("x");
        source.add_filter(Filter::equals("x", 1));
        source.reset();
        assert_eq!(
            source.select_sql().unwrap().0,
            "SELECT `objTable`.* FROM `news` AS `objTable`"
        );
    }

    #[tokio::test]
    async fn test_load_items_hydrates() {
        let (connection, source) = source();
        connection.push_result(vec![
            row(&[("id", Value::Int(1)), ("x", Value::Int(5))]),
            row(&[("id", Value::Int(2)), ("x", Value::Int(7))]),
        ]);

        let items = source.load_items().await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items.get("2").and_then(|r| r.get("x")), Some(&Value::Int(7)));
    }

    #[tokio::test]
    async fn test_load_item_missing_is_empty() {
        let (connection, source) = source();
        let item = source.load_item(42).await.unwrap();
        assert!(!item.has_id());
        assert_eq!(
            connection.last_sql(),
            "SELECT * FROM `news` AS `objTable` WHERE `objTable`.`id` = ? LIMIT 1"
        );
    }

    #[tokio::test]
    async fn test_load_count() {
        let (connection, mut source) = source();
        source.add_filter(Filter::predicate("x", Operator::Gt, 3));
        source.add_order(Order::asc("x"));
        connection.push_result(vec![row(&[("count", Value::Int(12))])]);

        assert_eq!(source.load_count().await.unwrap(), 12);
        assert_eq!(
            connection.last_sql(),
            "SELECT COUNT(*) AS `count` FROM `news` AS `objTable` WHERE (`objTable`.`x` > ?)"
        );
    }

    #[tokio::test]
    async fn test_save_item_sets_generated_id() {
        let (connection, source) = source();
        *connection.last_insert_id.lock() = Some(9);

        let mut record = Record::new(metadata()).with("x", 1).with("title_en", "Hi");
        let id = source.save_item(&mut record).await.unwrap();

        assert_eq!(id, Value::Int(9));
        assert_eq!(record.id(), Value::Int(9));
        let (sql, params) = connection.statements().pop().unwrap();
        assert_eq!(
            sql,
            "INSERT INTO `news` (`title_en`, `title_fr`, `x`, `y`) VALUES (?, ?, ?, ?)"
        );
        assert_eq!(params[0], Value::from("Hi"));
    }

    #[tokio::test]
    async fn test_save_item_generates_text_key() {
        let connection = Arc::new(RecordingConnection::new());
        *connection.last_insert_id.lock() = Some(1);
        let metadata = Arc::new(
            ModelMetadata::new("charcoal/session", "sessions")
                .key("token")
                .property(PropertyDef::new("token", SqlType::Varchar(36)))
                .property(PropertyDef::new("user", SqlType::Integer)),
        );
        let source = DatabaseSource::new(connection.clone(), Record::factory(metadata.clone()));

        let mut record = Record::new(metadata).with("user", 5);
        let id = source.save_item(&mut record).await.unwrap();

        let token = id.as_str().unwrap().to_string();
        assert_eq!(token.len(), 36);
        assert_eq!(record.id(), id);
        let (sql, params) = connection.statements().pop().unwrap();
        assert_eq!(sql, "INSERT INTO `sessions` (`token`, `user`) VALUES (?, ?)");
        assert_eq!(params, vec![Value::String(token), Value::Int(5)]);
    }

    #[tokio::test]
    async fn test_save_item_short_text_key_is_required() {
        let connection = Arc::new(RecordingConnection::new());
        let metadata = Arc::new(
            ModelMetadata::new("charcoal/tag", "tags")
                .key("code")
                .property(PropertyDef::new("code", SqlType::Varchar(8))),
        );
        let source = DatabaseSource::new(connection.clone(), Record::factory(metadata.clone()));

        let err = source.save_item(&mut Record::new(metadata)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::RequiredFieldMissing);
        assert!(connection.statements().is_empty());
    }

    #[tokio::test]
    async fn test_update_item_subset() {
        let (connection, source) = source();
        let record = Record::new(metadata()).with("id", 3).with("x", 2).with("y", 4);

        assert!(source.update_item(&record, Some(&["y"])).await.unwrap());
        let (sql, params) = connection.statements().pop().unwrap();
        assert_eq!(sql, "UPDATE `news` SET `y` = ? WHERE `id` = ?");
        assert_eq!(params, vec![Value::Int(4), Value::Int(3)]);
    }

    #[tokio::test]
    async fn test_delete_requires_id() {
        let (connection, source) = source();
        let err = source.delete_item(&Record::new(metadata())).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::RequiredFieldMissing);
        assert!(connection.statements().is_empty());

        let record = Record::new(metadata()).with("id", 3);
        assert!(source.delete_item(&record).await.unwrap());
        assert_eq!(connection.last_sql(), "DELETE FROM `news` WHERE `id` = ?");
    }

    #[tokio::test]
    async fn test_create_table_is_idempotent() {
        let (connection, source) = source();
        assert!(source.create_table().await.unwrap());
        assert!(connection.last_sql().starts_with("CREATE TABLE IF NOT EXISTS `news`"));

        connection.tables.lock().push("news".into());
        let before = connection.statements().len();
        assert!(!source.create_table().await.unwrap());
        assert_eq!(connection.statements().len(), before);
    }

    #[tokio::test]
    async fn test_alter_table_adds_missing_columns() {
        let (connection, source) = source();
        *connection.columns.lock() = vec!["id".into(), "title_en".into(), "x".into()];

        let added = source.alter_table().await.unwrap();
        assert_eq!(added, vec!["title_fr", "y"]);
        assert_eq!(
            connection.last_sql(),
            "ALTER TABLE `news` ADD COLUMN `y` INTEGER"
        );
    }
}
