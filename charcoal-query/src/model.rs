//! Model metadata, the [`Model`] trait and the model registry.
//!
//! Metadata declares which columns back each property of a model. Most
//! properties map to a single column; localized properties map to one
//! column per language (`title_en`, `title_fr`, ...).
//!
//! ```rust
//! use charcoal_query::{ModelMetadata, PropertyDef, SqlType};
//!
//! let metadata = ModelMetadata::new("charcoal/news", "news")
//!     .property(PropertyDef::new("slug", SqlType::Varchar(255)))
//!     .property(PropertyDef::localized("title", SqlType::Varchar(255), &["en", "fr"]));
//!
//! assert_eq!(metadata.field_names("title"), vec!["title_en", "title_fr"]);
//! assert_eq!(metadata.field_names("unknown"), vec!["unknown"]);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::cache::SharedCache;
use crate::config::CharcoalConfig;
use crate::connection::Dialect;
use crate::error::{QueryError, QueryResult};
use crate::expression::{literal, quote_identifier};
use crate::value::Value;

/// A row keyed by column name.
pub type Row = IndexMap<String, Value>;

/// Column storage type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlType {
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInt,
    /// Double precision float.
    Float,
    /// Boolean flag.
    Boolean,
    /// Bounded string.
    Varchar(u32),
    /// Unbounded string.
    Text,
    /// Date and time.
    DateTime,
    /// JSON document.
    Json,
}

impl SqlType {
    /// Column type name in the given dialect.
    pub fn sql_name(&self, dialect: Dialect) -> String {
        match (self, dialect) {
            (Self::Integer, Dialect::Mysql) => "INT".to_string(),
            (Self::Integer | Self::BigInt | Self::Boolean, Dialect::Sqlite) => "INTEGER".to_string(),
            (Self::BigInt, Dialect::Mysql) => "BIGINT".to_string(),
            (Self::Float, Dialect::Mysql) => "DOUBLE".to_string(),
            (Self::Float, Dialect::Sqlite) => "REAL".to_string(),
            (Self::Boolean, Dialect::Mysql) => "TINYINT(1)".to_string(),
            (Self::Varchar(len), _) => format!("VARCHAR({})", len),
            (Self::Text, _) => "TEXT".to_string(),
            (Self::DateTime, Dialect::Mysql) => "DATETIME".to_string(),
            (Self::Json, Dialect::Mysql) => "JSON".to_string(),
            (Self::DateTime | Self::Json, Dialect::Sqlite) => "TEXT".to_string(),
        }
    }

    /// Whether auto-increment applies to this type.
    pub fn is_integer(&self) -> bool {
        matches!(self, Self::Integer | Self::BigInt)
    }
}

/// One storage column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Column name.
    pub name: String,
    /// Storage type.
    pub sql_type: SqlType,
    /// Whether NULL is allowed.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Column default.
    #[serde(default)]
    pub default: Option<Value>,
    /// Whether the database generates the value.
    #[serde(default)]
    pub auto_increment: bool,
}

fn default_nullable() -> bool {
    true
}

impl FieldDef {
    /// Create a nullable column.
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable: true,
            default: None,
            auto_increment: false,
        }
    }

    /// Column definition for CREATE TABLE / ALTER TABLE.
    ///
    /// `primary` marks the key column; SQLite declares the key inline while
    /// MySQL gets a separate `PRIMARY KEY` clause from the table definition.
    pub fn column_sql(&self, dialect: Dialect, primary: bool) -> String {
        let mut sql = format!(
            "{} {}",
            quote_identifier(&self.name),
            self.sql_type.sql_name(dialect)
        );

        if primary {
            match dialect {
                Dialect::Sqlite => {
                    sql.push_str(" PRIMARY KEY");
                    if self.auto_increment && self.sql_type.is_integer() {
                        sql.push_str(" AUTOINCREMENT");
                    }
                }
                Dialect::Mysql => {
                    sql.push_str(" NOT NULL");
                    if self.auto_increment && self.sql_type.is_integer() {
                        sql.push_str(" AUTO_INCREMENT");
                    }
                }
            }
            return sql;
        }

        if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&literal(default, dialect));
        }
        sql
    }
}

/// A model property and the columns that store it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDef {
    /// Property identifier.
    pub ident: String,
    /// Backing columns, at least one.
    pub fields: Vec<FieldDef>,
}

impl PropertyDef {
    /// A property stored in one column named after it.
    pub fn new(ident: impl Into<String>, sql_type: SqlType) -> Self {
        let ident = ident.into();
        Self {
            fields: vec![FieldDef::new(ident.clone(), sql_type)],
            ident,
        }
    }

    /// A property stored in one `ident_<lang>` column per language.
    pub fn localized(ident: impl Into<String>, sql_type: SqlType, langs: &[&str]) -> Self {
        let ident = ident.into();
        Self {
            fields: langs
                .iter()
                .map(|lang| FieldDef::new(format!("{}_{}", ident, lang), sql_type))
                .collect(),
            ident,
        }
    }

    /// A property with explicit columns.
    pub fn with_fields(ident: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self {
            ident: ident.into(),
            fields,
        }
    }

    /// Disallow NULL in every column.
    pub fn required(mut self) -> Self {
        for field in &mut self.fields {
            field.nullable = false;
        }
        self
    }

    /// Set a default on every column.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        let value = value.into();
        for field in &mut self.fields {
            field.default = Some(value.clone());
        }
        self
    }

    /// Let the database generate the value.
    pub fn auto_increment(mut self) -> Self {
        for field in &mut self.fields {
            field.auto_increment = true;
        }
        self
    }

    /// Column names.
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }
}

/// Storage description of a model type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model type identifier, e.g. `charcoal/news`.
    pub obj_type: String,
    /// Backing table.
    pub table: String,
    /// Key property.
    pub key: String,
    /// Declared properties in declaration order.
    pub properties: IndexMap<String, PropertyDef>,
}

impl ModelMetadata {
    /// Create metadata with an `id` key and no properties.
    pub fn new(obj_type: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            obj_type: obj_type.into(),
            table: table.into(),
            key: "id".to_string(),
            properties: IndexMap::new(),
        }
    }

    /// Set the key property.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Declare a property. Redeclaring an identifier replaces it.
    pub fn property(mut self, property: PropertyDef) -> Self {
        self.properties.insert(property.ident.clone(), property);
        self
    }

    /// Look up a property.
    pub fn get_property(&self, ident: &str) -> Option<&PropertyDef> {
        self.properties.get(ident)
    }

    /// Columns backing `property`, or the property name itself when undeclared.
    pub fn field_names(&self, property: &str) -> Vec<String> {
        match self.properties.get(property) {
            Some(def) if !def.fields.is_empty() => def.field_names(),
            _ => vec![property.to_string()],
        }
    }

    /// The key column. Undeclared keys are auto-increment integers.
    pub fn key_field(&self) -> FieldDef {
        self.properties
            .get(&self.key)
            .and_then(|def| def.fields.first().cloned())
            .unwrap_or_else(|| FieldDef {
                auto_increment: true,
                ..FieldDef::new(self.key.clone(), SqlType::Integer)
            })
    }

    /// Every column, key first.
    pub fn fields(&self) -> Vec<FieldDef> {
        let mut fields = vec![self.key_field()];
        for (ident, def) in &self.properties {
            if *ident == self.key {
                continue;
            }
            fields.extend(def.fields.iter().cloned());
        }
        fields
    }

    /// Every column name, key first.
    pub fn column_names(&self) -> Vec<String> {
        self.fields().into_iter().map(|f| f.name).collect()
    }

    /// CREATE TABLE statement for `table`.
    pub fn create_table_sql(&self, table: &str, dialect: Dialect) -> String {
        let key = self.key_field();
        let mut columns = vec![key.column_sql(dialect, true)];
        for field in self.fields().iter().skip(1) {
            columns.push(field.column_sql(dialect, false));
        }

        match dialect {
            Dialect::Mysql => {
                columns.push(format!("PRIMARY KEY ({})", quote_identifier(&key.name)));
                format!(
                    "CREATE TABLE IF NOT EXISTS {} ({}) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
                    quote_identifier(table),
                    columns.join(", ")
                )
            }
            Dialect::Sqlite => format!(
                "CREATE TABLE IF NOT EXISTS {} ({})",
                quote_identifier(table),
                columns.join(", ")
            ),
        }
    }
}

/// A persistable model.
pub trait Model: Send + Sync {
    /// Storage description.
    fn metadata(&self) -> &ModelMetadata;

    /// Current column values. The key may be null for unsaved models.
    fn to_row(&self) -> Row;

    /// Hydrate from a row. Implementations decide what to do with columns
    /// outside the metadata.
    fn apply_row(&mut self, row: &Row) -> QueryResult<()>;

    /// The identifier, `Value::Null` when unset.
    fn id(&self) -> Value;

    /// Set the identifier.
    fn set_id(&mut self, id: Value);

    /// Whether the model has an identifier.
    fn has_id(&self) -> bool {
        !self.id().is_empty_ident()
    }
}

impl fmt::Debug for dyn Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("obj_type", &self.metadata().obj_type)
            .field("id", &self.id())
            .finish_non_exhaustive()
    }
}

/// A type-erased model.
pub type BoxedModel = Box<dyn Model>;

impl Model for BoxedModel {
    fn metadata(&self) -> &ModelMetadata {
        (**self).metadata()
    }

    fn to_row(&self) -> Row {
        (**self).to_row()
    }

    fn apply_row(&mut self, row: &Row) -> QueryResult<()> {
        (**self).apply_row(row)
    }

    fn id(&self) -> Value {
        (**self).id()
    }

    fn set_id(&mut self, id: Value) {
        (**self).set_id(id)
    }
}

/// A model whose properties are described entirely by its metadata.
///
/// ```rust
/// use std::sync::Arc;
/// use charcoal_query::{Model, ModelMetadata, PropertyDef, Record, SqlType, Value};
///
/// let metadata = Arc::new(
///     ModelMetadata::new("charcoal/tag", "tags")
///         .property(PropertyDef::new("label", SqlType::Varchar(64))),
/// );
///
/// let tag = Record::new(metadata).with("label", "rust");
/// assert_eq!(tag.get("label"), Some(&Value::from("rust")));
/// assert!(!tag.has_id());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    metadata: Arc<ModelMetadata>,
    values: Row,
}

impl Record {
    /// Create an empty record.
    pub fn new(metadata: Arc<ModelMetadata>) -> Self {
        Self {
            metadata,
            values: Row::new(),
        }
    }

    /// Set a column value, builder style.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Get a column value.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Set a column value.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(column.into(), value.into());
    }

    /// All values held.
    pub fn values(&self) -> &Row {
        &self.values
    }

    /// A factory producing empty records of this metadata.
    pub fn factory(metadata: Arc<ModelMetadata>) -> ModelFactory<Record> {
        ModelFactory::new(move || Record::new(Arc::clone(&metadata)))
    }
}

impl Model for Record {
    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn to_row(&self) -> Row {
        self.metadata
            .column_names()
            .into_iter()
            .map(|column| {
                let value = self.values.get(&column).cloned().unwrap_or(Value::Null);
                (column, value)
            })
            .collect()
    }

    /// Keeps every column, including ones outside the metadata such as
    /// computed aliases.
    fn apply_row(&mut self, row: &Row) -> QueryResult<()> {
        for (column, value) in row {
            self.values.insert(column.clone(), value.clone());
        }
        Ok(())
    }

    fn id(&self) -> Value {
        self.values
            .get(&self.metadata.key)
            .cloned()
            .unwrap_or(Value::Null)
    }

    fn set_id(&mut self, id: Value) {
        self.values.insert(self.metadata.key.clone(), id);
    }
}

/// A typed model constructor.
pub struct ModelFactory<M> {
    create: Arc<dyn Fn() -> M + Send + Sync>,
}

impl<M> ModelFactory<M> {
    /// Wrap a constructor.
    pub fn new(create: impl Fn() -> M + Send + Sync + 'static) -> Self {
        Self {
            create: Arc::new(create),
        }
    }

    /// Build a fresh model.
    pub fn create(&self) -> M {
        (self.create)()
    }
}

impl<M: Model + 'static> ModelFactory<M> {
    /// Erase the model type.
    pub fn boxed(self) -> ModelFactory<BoxedModel> {
        ModelFactory::new(move || Box::new(self.create()) as BoxedModel)
    }
}

impl<M: Default + 'static> Default for ModelFactory<M> {
    fn default() -> Self {
        Self::new(M::default)
    }
}

impl<M> Clone for ModelFactory<M> {
    fn clone(&self) -> Self {
        Self {
            create: Arc::clone(&self.create),
        }
    }
}

impl<M> fmt::Debug for ModelFactory<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelFactory")
            .field("model", &std::any::type_name::<M>())
            .finish()
    }
}

/// Maps model type identifiers to constructors.
///
/// Filled once at startup; lookups of unregistered types fail with
/// [`ErrorCode::UnknownModel`](crate::ErrorCode::UnknownModel).
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    factories: HashMap<String, ModelFactory<BoxedModel>>,
    cache: Option<SharedCache>,
}

impl ModelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed model.
    pub fn register<M: Model + 'static>(
        &mut self,
        obj_type: impl Into<String>,
        factory: ModelFactory<M>,
    ) -> &mut Self {
        self.factories.insert(obj_type.into(), factory.boxed());
        self
    }

    /// Register a [`Record`] model under its metadata's type.
    pub fn register_record(&mut self, metadata: ModelMetadata) -> &mut Self {
        let obj_type = metadata.obj_type.clone();
        self.register(obj_type, Record::factory(Arc::new(metadata)))
    }

    /// Whether a type is registered.
    pub fn contains(&self, obj_type: &str) -> bool {
        self.factories.contains_key(obj_type)
    }

    /// Registered type identifiers.
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Get the factory for a type.
    pub fn factory(&self, obj_type: &str) -> QueryResult<ModelFactory<BoxedModel>> {
        self.factories
            .get(obj_type)
            .cloned()
            .ok_or_else(|| QueryError::unknown_model(obj_type))
    }

    /// Build a fresh model of a type.
    pub fn create(&self, obj_type: &str) -> QueryResult<BoxedModel> {
        Ok(self.factory(obj_type)?.create())
    }

    /// Share one cache between every loader the registry creates.
    pub fn set_cache(&mut self, cache: Option<SharedCache>) -> &mut Self {
        self.cache = cache;
        self
    }

    /// Build the shared cache from configuration.
    pub fn configure(&mut self, config: &CharcoalConfig) -> &mut Self {
        self.set_cache(config.cache.build())
    }

    /// The shared cache.
    pub fn cache(&self) -> Option<&SharedCache> {
        self.cache.as_ref()
    }
}
