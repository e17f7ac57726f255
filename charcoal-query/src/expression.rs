//! Shared expression plumbing: metadata, the [`Expression`] trait and the
//! [`SqlCompiler`] that carries compile context.
//!
//! Every clause in a query (a filter, an order, the pagination) is an
//! expression with an optional name, an `active` flag and a free-form data
//! bag. Inactive expressions compile to an empty string, children included.
//!
//! ```rust
//! use charcoal_query::{Expression, Filter};
//!
//! let filter = Filter::raw("`status` = 'published'").inactive();
//! assert_eq!(filter.sql().unwrap(), "");
//! ```

use serde::{Deserialize, Serialize};

use crate::connection::Dialect;
use crate::error::QueryResult;
use crate::model::ModelMetadata;
use crate::value::Value;

/// Alias given to the primary table in every statement built by a source.
pub const DEFAULT_TABLE_ALIAS: &str = "objTable";

/// Fields common to every expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionMeta {
    /// Name, unique within its parent collection.
    #[serde(default)]
    pub name: Option<String>,
    /// Inactive expressions contribute nothing to compiled output.
    #[serde(default = "default_active")]
    pub active: bool,
    /// Arbitrary data carried along with the expression.
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

fn default_active() -> bool {
    true
}

impl Default for ExpressionMeta {
    fn default() -> Self {
        Self {
            name: None,
            active: true,
            data: serde_json::Map::new(),
        }
    }
}

/// A query clause that compiles to an SQL fragment.
pub trait Expression {
    /// Shared expression fields.
    fn meta(&self) -> &ExpressionMeta;

    /// Shared expression fields, mutably.
    fn meta_mut(&mut self) -> &mut ExpressionMeta;

    /// Compile within the given context.
    fn compile(&self, compiler: &mut SqlCompiler<'_>) -> QueryResult<String>;

    /// Compile without table alias or model metadata, with literals inlined
    /// for MySQL.
    fn sql(&self) -> QueryResult<String> {
        self.compile(&mut SqlCompiler::inline())
    }

    /// The expression name, if any.
    fn name(&self) -> Option<&str> {
        self.meta().name.as_deref()
    }

    /// Whether the expression takes part in compilation.
    fn is_active(&self) -> bool {
        self.meta().active
    }
}

/// Where literal values go when an expression is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueMode {
    /// Quote and escape literals directly into the SQL text.
    Inline,
    /// Emit `?` placeholders and collect the values as parameters.
    Bound,
}

/// Compile context threaded through expression trees.
#[derive(Debug)]
pub struct SqlCompiler<'a> {
    table_alias: Option<&'a str>,
    metadata: Option<&'a ModelMetadata>,
    mode: ValueMode,
    dialect: Dialect,
    params: Vec<Value>,
}

impl<'a> SqlCompiler<'a> {
    /// A compiler that inlines literals and uses bare field names.
    pub fn inline() -> Self {
        Self {
            table_alias: None,
            metadata: None,
            mode: ValueMode::Inline,
            dialect: Dialect::Mysql,
            params: Vec::new(),
        }
    }

    /// A compiler that binds values as `?` parameters.
    pub fn bound() -> Self {
        Self {
            mode: ValueMode::Bound,
            ..Self::inline()
        }
    }

    /// Qualify fields without an explicit table with this alias.
    pub fn with_table_alias(mut self, alias: &'a str) -> Self {
        self.table_alias = Some(alias);
        self
    }

    /// Resolve properties to columns through this metadata.
    pub fn with_metadata(mut self, metadata: &'a ModelMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Quote inlined literals for this dialect.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// The value mode.
    pub fn mode(&self) -> ValueMode {
        self.mode
    }

    /// The dialect inlined literals are quoted for.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Parameters collected so far, in placeholder order.
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Take the collected parameters.
    pub fn into_params(self) -> Vec<Value> {
        self.params
    }

    /// Quoted identifiers for every column backing `property`.
    ///
    /// A property declared with several fields (a localized property, for
    /// instance) yields one identifier per field.
    pub fn field_identifiers(&self, table: Option<&str>, property: &str) -> Vec<String> {
        let table = table.or(self.table_alias);
        let fields = match self.metadata {
            Some(metadata) => metadata.field_names(property),
            None => vec![property.to_string()],
        };
        fields
            .iter()
            .map(|field| match table {
                Some(table) => format!("{}.{}", quote_identifier(table), quote_identifier(field)),
                None => quote_identifier(field),
            })
            .collect()
    }

    /// Render a value: an escaped literal or a bound placeholder.
    ///
    /// Inlined values are always quoted, except `NULL`.
    pub fn value(&mut self, value: Value) -> String {
        match self.mode {
            ValueMode::Inline if value.is_null() => "NULL".to_string(),
            ValueMode::Inline => quote_literal(&value.to_plain_string(), self.dialect),
            ValueMode::Bound => {
                self.params.push(value);
                "?".to_string()
            }
        }
    }
}

/// Quote an identifier with backticks.
///
/// ```rust
/// use charcoal_query::expression::quote_identifier;
///
/// assert_eq!(quote_identifier("title"), "`title`");
/// assert_eq!(quote_identifier("we`ird"), "`we``ird`");
/// ```
pub fn quote_identifier(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

/// Quote a string literal.
///
/// MySQL treats backslashes inside literals as escapes; SQLite does not.
///
/// ```rust
/// use charcoal_query::Dialect;
/// use charcoal_query::expression::quote_literal;
///
/// assert_eq!(quote_literal("a\\b", Dialect::Mysql), "'a\\\\b'");
/// assert_eq!(quote_literal("a\\b", Dialect::Sqlite), "'a\\b'");
/// ```
pub fn quote_literal(value: &str, dialect: Dialect) -> String {
    let quoted = value.replace('\'', "''");
    match dialect {
        Dialect::Mysql => format!("'{}'", quoted.replace('\\', "\\\\")),
        Dialect::Sqlite => format!("'{}'", quoted),
    }
}

/// Render a value as a literal, leaving numbers bare.
pub fn literal(value: &Value, dialect: Dialect) -> String {
    match value {
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        Value::Null => "NULL".to_string(),
        other => quote_literal(&other.to_plain_string(), dialect),
    }
}

/// Whether `name` is a plain SQL identifier such as a function name.
pub(crate) fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelMetadata, PropertyDef, SqlType};

    #[test]
    fn test_meta_default_is_active() {
        assert!(ExpressionMeta::default().active);

        let meta: ExpressionMeta = serde_json::from_str("{}").unwrap();
        assert!(meta.active);
        assert!(meta.name.is_none());
    }

    #[test]
    fn test_quote_literal_escapes() {
        assert_eq!(quote_literal("it's", Dialect::Mysql), "'it''s'");
        assert_eq!(quote_literal("it's", Dialect::Sqlite), "'it''s'");
        assert_eq!(quote_literal("a\\b", Dialect::Mysql), "'a\\\\b'");
        assert_eq!(quote_literal("a\\b", Dialect::Sqlite), "'a\\b'");
    }

    #[test]
    fn test_literal_leaves_numbers_bare() {
        assert_eq!(literal(&Value::Int(3), Dialect::Mysql), "3");
        assert_eq!(literal(&Value::from("x"), Dialect::Sqlite), "'x'");
        assert_eq!(literal(&Value::Null, Dialect::Mysql), "NULL");
    }

    #[test]
    fn test_inline_value_follows_dialect() {
        let mut mysql = SqlCompiler::inline();
        assert_eq!(mysql.value(Value::from("a\\b")), "'a\\\\b'");
        assert_eq!(mysql.value(Value::Null), "NULL");

        let mut sqlite = SqlCompiler::inline().with_dialect(Dialect::Sqlite);
        assert_eq!(sqlite.dialect(), Dialect::Sqlite);
        assert_eq!(sqlite.value(Value::from("a\\b")), "'a\\b'");
        assert!(sqlite.params().is_empty());
    }

    #[test]
    fn test_field_identifiers_with_alias() {
        let compiler = SqlCompiler::inline().with_table_alias(DEFAULT_TABLE_ALIAS);
        assert_eq!(
            compiler.field_identifiers(None, "title"),
            vec!["`objTable`.`title`".to_string()]
        );
        assert_eq!(
            compiler.field_identifiers(Some("other"), "title"),
            vec!["`other`.`title`".to_string()]
        );
    }

    #[test]
    fn test_field_identifiers_expand_localized_property() {
        let metadata = ModelMetadata::new("charcoal/news", "news")
            .property(PropertyDef::localized("title", SqlType::Varchar(255), &["en", "fr"]));
        let compiler = SqlCompiler::inline().with_metadata(&metadata);

        assert_eq!(
            compiler.field_identifiers(None, "title"),
            vec!["`title_en`".to_string(), "`title_fr`".to_string()]
        );
    }

    #[test]
    fn test_bound_values_collect_params() {
        let mut compiler = SqlCompiler::bound();
        assert_eq!(compiler.value(Value::Int(1)), "?");
        assert_eq!(compiler.value(Value::from("a")), "?");
        assert_eq!(compiler.params(), &[Value::Int(1), Value::from("a")]);
    }

    #[test]
    fn test_plain_identifier() {
        assert!(is_plain_identifier("ABS"));
        assert!(is_plain_identifier("date_format"));
        assert!(!is_plain_identifier("1abs"));
        assert!(!is_plain_identifier("ABS(x); DROP"));
        assert!(!is_plain_identifier(""));
    }
}
