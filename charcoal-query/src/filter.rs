//! Filter expressions for building WHERE clauses.
//!
//! A [`Filter`] is one of three things:
//! - a raw condition string, emitted verbatim;
//! - a group of child filters, joined by each child's operand;
//! - a structured predicate on a property.
//!
//! ```rust
//! use charcoal_query::{Expression, Filter, Operand, Operator};
//!
//! let filter = Filter::group([
//!     Filter::predicate("status", Operator::Eq, "published").operand(Operand::Or),
//!     Filter::is_null("published_at"),
//! ]);
//!
//! assert_eq!(
//!     filter.sql().unwrap(),
//!     "((`status` = 'published') OR (`published_at` IS NULL))"
//! );
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};
use crate::expression::{Expression, ExpressionMeta, SqlCompiler, is_plain_identifier};
use crate::value::Value;

/// Comparison operator of a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Operator {
    /// `=`
    #[default]
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `LIKE`
    Like,
    /// `NOT LIKE`
    NotLike,
    /// `IN`
    In,
    /// `NOT IN`
    NotIn,
    /// `IS NULL`
    IsNull,
    /// `IS NOT NULL`
    IsNotNull,
    /// `FIND_IN_SET`
    FindInSet,
}

impl Operator {
    /// Get the SQL keyword for this operator.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
            Self::FindInSet => "FIND_IN_SET",
        }
    }

    /// Operators that take no value.
    pub fn is_null_check(&self) -> bool {
        matches!(self, Self::IsNull | Self::IsNotNull)
    }

    /// Operators that take a list of values.
    pub fn is_set(&self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Operator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
        Ok(match normalized.as_str() {
            "=" => Self::Eq,
            "!=" | "<>" => Self::NotEq,
            "<" => Self::Lt,
            "<=" => Self::Lte,
            ">" => Self::Gt,
            ">=" => Self::Gte,
            "LIKE" => Self::Like,
            "NOT LIKE" => Self::NotLike,
            "IN" => Self::In,
            "NOT IN" => Self::NotIn,
            "IS NULL" => Self::IsNull,
            "IS NOT NULL" => Self::IsNotNull,
            "FIND_IN_SET" => Self::FindInSet,
            _ => {
                return Err(QueryError::invalid_filter(format!(
                    "unsupported filter operator '{}'",
                    s
                )));
            }
        })
    }
}

/// Logical connector between a filter and its next sibling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Operand {
    /// `AND`
    #[default]
    And,
    /// `OR`
    Or,
}

impl Operand {
    /// Get the SQL keyword for this operand.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

impl FromStr for Operand {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "AND" | "&&" => Ok(Self::And),
            "OR" | "||" => Ok(Self::Or),
            _ => Err(QueryError::invalid_filter(format!(
                "unsupported filter operand '{}'",
                s
            ))),
        }
    }
}

/// A structured condition on a property.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Predicate {
    /// Property (or column) identifier.
    pub property: String,
    /// Table alias; the compiler's default alias when unset.
    pub table: Option<String>,
    /// Comparison operator.
    pub operator: Operator,
    /// Operand value. Required unless the operator is a null check.
    pub value: Option<Value>,
    /// SQL function wrapped around the field, e.g. `ABS`.
    pub function: Option<String>,
}

impl Predicate {
    fn compile(&self, compiler: &mut SqlCompiler<'_>) -> QueryResult<String> {
        let property = self.property.trim();
        if property.is_empty() {
            return Err(QueryError::invalid_filter("filter property is required")
                .with_suggestion("Set a property or a raw condition on the filter"));
        }

        let function = match &self.function {
            Some(function) => {
                let function = function.trim();
                if !is_plain_identifier(function) {
                    return Err(QueryError::invalid_filter(format!(
                        "invalid filter function '{}'",
                        function
                    ))
                    .with_property(property));
                }
                Some(function.to_uppercase())
            }
            None => None,
        };

        let fields = compiler.field_identifiers(self.table.as_deref(), property);
        let mut conditions = Vec::with_capacity(fields.len());

        for field in fields {
            let target = match &function {
                Some(function) => format!("{}({})", function, field),
                None => field,
            };
            conditions.push(self.condition(&target, property, compiler)?);
        }

        if conditions.len() > 1 {
            Ok(format!("({})", conditions.join(" OR ")))
        } else {
            Ok(conditions.concat())
        }
    }

    fn condition(
        &self,
        target: &str,
        property: &str,
        compiler: &mut SqlCompiler<'_>,
    ) -> QueryResult<String> {
        let operator = self.operator;
        if operator.is_null_check() {
            return Ok(format!("({} {})", target, operator));
        }

        let value = self.value.clone().ok_or_else(|| {
            QueryError::invalid_filter(format!("operator {} requires a value", operator))
                .with_property(property)
        })?;

        if value.is_null() {
            return match operator {
                Operator::Eq => Ok(format!("({} IS NULL)", target)),
                Operator::NotEq => Ok(format!("({} IS NOT NULL)", target)),
                _ => Err(QueryError::invalid_filter(format!(
                    "operator {} cannot compare against NULL",
                    operator
                ))
                .with_property(property)),
            };
        }

        match operator {
            Operator::FindInSet => {
                let set = compiler.value(Value::String(value.to_plain_string()));
                Ok(format!("{}({}, {})", operator, set, target))
            }
            Operator::In | Operator::NotIn => {
                let mut items = value.into_items();
                if items.is_empty() {
                    items.push(Value::String(String::new()));
                }
                let list = items
                    .into_iter()
                    .map(|item| compiler.value(item))
                    .collect::<Vec<_>>()
                    .join(",");
                Ok(format!("({} {} ({}))", target, operator, list))
            }
            _ => {
                if matches!(value, Value::List(_)) {
                    return Err(QueryError::invalid_filter(format!(
                        "operator {} expects a single value, got a list",
                        operator
                    ))
                    .with_property(property));
                }
                let value = compiler.value(value);
                Ok(format!("({} {} {})", target, operator, value))
            }
        }
    }
}

/// What a filter compiles from.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterKind {
    /// A raw SQL condition, emitted verbatim.
    Raw(String),
    /// Nested filters, compiled as a parenthesized group.
    Group(Vec<Filter>),
    /// A structured predicate.
    Predicate(Predicate),
}

/// A filter expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Name, active flag and data bag.
    pub meta: ExpressionMeta,
    /// Connector to the next sibling.
    pub operand: Operand,
    /// Rendering path.
    pub kind: FilterKind,
}

impl Filter {
    /// Create a filter of the given kind.
    pub fn new(kind: FilterKind) -> Self {
        Self {
            meta: ExpressionMeta::default(),
            operand: Operand::default(),
            kind,
        }
    }

    /// Create a raw condition filter.
    pub fn raw(condition: impl Into<String>) -> Self {
        Self::new(FilterKind::Raw(condition.into()))
    }

    /// Create a group of filters.
    pub fn group(filters: impl IntoIterator<Item = Filter>) -> Self {
        let mut group = Self::new(FilterKind::Group(Vec::new()));
        for filter in filters {
            group.push(filter);
        }
        group
    }

    /// Create an empty group.
    pub fn empty() -> Self {
        Self::new(FilterKind::Group(Vec::new()))
    }

    /// Create a predicate filter.
    pub fn predicate(
        property: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> Self {
        Self::new(FilterKind::Predicate(Predicate {
            property: property.into(),
            operator,
            value: Some(value.into()),
            ..Default::default()
        }))
    }

    /// Create an equality filter.
    pub fn equals(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::predicate(property, Operator::Eq, value)
    }

    /// Create an `IS NULL` filter.
    pub fn is_null(property: impl Into<String>) -> Self {
        Self::null_check(property, Operator::IsNull)
    }

    /// Create an `IS NOT NULL` filter.
    pub fn is_not_null(property: impl Into<String>) -> Self {
        Self::null_check(property, Operator::IsNotNull)
    }

    fn null_check(property: impl Into<String>, operator: Operator) -> Self {
        Self::new(FilterKind::Predicate(Predicate {
            property: property.into(),
            operator,
            ..Default::default()
        }))
    }

    /// Set the name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.meta.name = Some(name.into());
        self
    }

    /// Set the active flag.
    pub fn active(mut self, active: bool) -> Self {
        self.meta.active = active;
        self
    }

    /// Deactivate the filter.
    pub fn inactive(self) -> Self {
        self.active(false)
    }

    /// Set the connector to the next sibling.
    pub fn operand(mut self, operand: Operand) -> Self {
        self.operand = operand;
        self
    }

    /// Set the table alias of a predicate.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        if let FilterKind::Predicate(ref mut predicate) = self.kind {
            predicate.table = Some(table.into());
        }
        self
    }

    /// Set the SQL function of a predicate.
    pub fn function(mut self, function: impl Into<String>) -> Self {
        if let FilterKind::Predicate(ref mut predicate) = self.kind {
            predicate.function = Some(function.into());
        }
        self
    }

    /// Attach a data entry.
    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.meta.data.insert(key.into(), value);
        self
    }

    /// Child filters, if this is a group.
    pub fn children(&self) -> &[Filter] {
        match &self.kind {
            FilterKind::Group(children) => children,
            _ => &[],
        }
    }

    /// Whether this is a group with no children.
    pub fn is_empty(&self) -> bool {
        matches!(&self.kind, FilterKind::Group(children) if children.is_empty())
    }

    /// Append a filter to this group.
    ///
    /// A named filter replaces an earlier sibling of the same name in place.
    /// Appending to a non-group turns this filter into a group of both.
    pub fn push(&mut self, filter: Filter) {
        if !matches!(self.kind, FilterKind::Group(_)) {
            let previous = std::mem::replace(self, Self::empty());
            self.operand = previous.operand;
            self.kind = FilterKind::Group(vec![previous]);
        }

        if let FilterKind::Group(ref mut children) = self.kind {
            let existing = filter
                .meta
                .name
                .as_deref()
                .and_then(|name| children.iter().position(|c| c.name() == Some(name)));
            match existing {
                Some(index) => children[index] = filter,
                None => children.push(filter),
            }
        }
    }

    /// Find a direct child by name.
    pub fn get(&self, name: &str) -> Option<&Filter> {
        self.children().iter().find(|f| f.name() == Some(name))
    }

    /// Remove a direct child by name.
    pub fn remove(&mut self, name: &str) -> Option<Filter> {
        match self.kind {
            FilterKind::Group(ref mut children) => {
                let index = children.iter().position(|f| f.name() == Some(name))?;
                Some(children.remove(index))
            }
            _ => None,
        }
    }

    /// Build a filter from a JSON specification.
    ///
    /// ```rust
    /// use charcoal_query::{Expression, Filter};
    ///
    /// let filter = Filter::from_json(serde_json::json!({
    ///     "property": "price",
    ///     "operator": ">=",
    ///     "value": 10,
    ///     "function": "abs"
    /// }))
    /// .unwrap();
    ///
    /// assert_eq!(filter.sql().unwrap(), "(ABS(`price`) >= '10')");
    /// ```
    pub fn from_json(json: serde_json::Value) -> QueryResult<Self> {
        let spec: FilterSpec = serde_json::from_value(json)
            .map_err(|e| QueryError::invalid_filter(format!("invalid filter specification: {}", e)))?;
        Self::try_from(spec)
    }
}

impl Default for Filter {
    fn default() -> Self {
        Self::empty()
    }
}

impl Expression for Filter {
    fn meta(&self) -> &ExpressionMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ExpressionMeta {
        &mut self.meta
    }

    fn compile(&self, compiler: &mut SqlCompiler<'_>) -> QueryResult<String> {
        if !self.meta.active {
            return Ok(String::new());
        }

        match &self.kind {
            FilterKind::Raw(condition) => {
                let condition = condition.trim();
                if condition.is_empty() {
                    return Err(QueryError::invalid_filter("raw filter condition is empty"));
                }
                Ok(condition.to_string())
            }
            FilterKind::Group(children) => compile_group(children, compiler),
            FilterKind::Predicate(predicate) => predicate.compile(compiler),
        }
    }
}

// The connector between two emitted terms is the operand of the earlier one.
fn compile_group(children: &[Filter], compiler: &mut SqlCompiler<'_>) -> QueryResult<String> {
    let mut sql = String::new();
    let mut terms = 0usize;
    let mut connector: Option<Operand> = None;

    for child in children {
        let part = child.compile(compiler)?;
        if part.is_empty() {
            continue;
        }
        if let Some(operand) = connector {
            sql.push(' ');
            sql.push_str(operand.as_sql());
            sql.push(' ');
        }
        sql.push_str(&part);
        terms += 1;
        connector = Some(child.operand);
    }

    if terms > 1 {
        Ok(format!("({})", sql))
    } else {
        Ok(sql)
    }
}

/// Serializable description of a filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    /// Filter name.
    pub name: Option<String>,
    /// Active flag; defaults to true.
    pub active: Option<bool>,
    /// Raw condition. Takes precedence over everything else.
    pub condition: Option<String>,
    /// Property identifier.
    pub property: Option<String>,
    /// Table alias.
    pub table: Option<String>,
    /// Operator string, e.g. `">="` or `"NOT IN"`.
    pub operator: Option<String>,
    /// Operand value.
    pub value: Option<Value>,
    /// SQL function.
    #[serde(alias = "func")]
    pub function: Option<String>,
    /// `AND` or `OR`.
    pub operand: Option<String>,
    /// Child filters.
    #[serde(alias = "conditions")]
    pub filters: Vec<FilterSpec>,
    /// Extra data.
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl TryFrom<FilterSpec> for Filter {
    type Error = QueryError;

    fn try_from(spec: FilterSpec) -> Result<Self, Self::Error> {
        let kind = if let Some(condition) = spec.condition {
            FilterKind::Raw(condition)
        } else if !spec.filters.is_empty() {
            let children = spec
                .filters
                .into_iter()
                .map(Filter::try_from)
                .collect::<QueryResult<Vec<_>>>()?;
            let mut group = Filter::empty();
            for child in children {
                group.push(child);
            }
            group.kind
        } else {
            let operator = match spec.operator.as_deref() {
                Some(operator) => operator.parse()?,
                None => Operator::default(),
            };
            FilterKind::Predicate(Predicate {
                property: spec.property.unwrap_or_default(),
                table: spec.table,
                operator,
                value: spec.value,
                function: spec.function,
            })
        };

        let operand = match spec.operand.as_deref() {
            Some(operand) => operand.parse()?,
            None => Operand::default(),
        };

        Ok(Filter {
            meta: ExpressionMeta {
                name: spec.name,
                active: spec.active.unwrap_or(true),
                data: spec.data,
            },
            operand,
            kind,
        })
    }
}

/// Options accepted by `CollectionLoader::add_filter`.
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    /// Operator; `=` when unset.
    pub operator: Option<Operator>,
    /// SQL function.
    pub function: Option<String>,
    /// Connector to the next filter.
    pub operand: Option<Operand>,
    /// Table alias.
    pub table: Option<String>,
    /// Filter name.
    pub name: Option<String>,
}

impl FilterOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the operator.
    pub fn operator(mut self, operator: Operator) -> Self {
        self.operator = Some(operator);
        self
    }

    /// Set the SQL function.
    pub fn function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }

    /// Set the operand.
    pub fn operand(mut self, operand: Operand) -> Self {
        self.operand = Some(operand);
        self
    }

    /// Set the table alias.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Set the filter name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Build the filter these options describe.
    pub fn into_filter(self, property: impl Into<String>, value: impl Into<Value>) -> Filter {
        let operator = self.operator.unwrap_or_default();
        let value = value.into();
        let mut filter = Filter::new(FilterKind::Predicate(Predicate {
            property: property.into(),
            table: self.table,
            operator,
            value: if operator.is_null_check() { None } else { Some(value) },
            function: self.function,
        }));
        filter.operand = self.operand.unwrap_or_default();
        filter.meta.name = self.name;
        filter
    }
}
