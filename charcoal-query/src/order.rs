//! Order expressions for building ORDER BY clauses.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};
use crate::expression::{Expression, ExpressionMeta, SqlCompiler, literal};
use crate::value::Value;

/// Sort mode of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Ascending order.
    #[default]
    Asc,
    /// Descending order.
    Desc,
    /// Random order.
    Rand,
    /// Explicit ranking by a list of values.
    Values,
}

impl Direction {
    /// Get the SQL keyword for a field direction.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
            Self::Rand => "RAND()",
            Self::Values => "FIELD",
        }
    }

    /// Get the mode name as accepted by [`FromStr`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
            Self::Rand => "rand",
            Self::Values => "values",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Direction {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            "rand" => Ok(Self::Rand),
            "values" => Ok(Self::Values),
            _ => Err(QueryError::invalid_order(format!("unsupported order mode '{}'", s))
                .with_suggestion("Use one of: asc, desc, rand, values")),
        }
    }
}

/// What an order compiles from.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderKind {
    /// A raw ORDER BY fragment, emitted verbatim.
    Raw(String),
    /// Nested orders, comma-joined.
    Group(Vec<Order>),
    /// Sort on a property.
    Field {
        /// Property identifier.
        property: String,
        /// Table alias.
        table: Option<String>,
        /// `Asc` or `Desc`.
        mode: Direction,
    },
    /// `RAND()`.
    Random,
    /// `FIELD(property, v1,v2,...)`.
    Values {
        /// Property identifier.
        property: String,
        /// Table alias.
        table: Option<String>,
        /// Ranking values, first ranked first.
        values: Vec<Value>,
    },
}

/// An order expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    /// Name, active flag and data bag.
    pub meta: ExpressionMeta,
    /// Rendering path.
    pub kind: OrderKind,
}

impl Order {
    /// Create an order of the given kind.
    pub fn new(kind: OrderKind) -> Self {
        Self {
            meta: ExpressionMeta::default(),
            kind,
        }
    }

    /// Create an empty group.
    pub fn empty() -> Self {
        Self::new(OrderKind::Group(Vec::new()))
    }

    /// Create a group of orders.
    pub fn group(orders: impl IntoIterator<Item = Order>) -> Self {
        let mut group = Self::empty();
        for order in orders {
            group.push(order);
        }
        group
    }

    /// Create a raw order.
    pub fn raw(clause: impl Into<String>) -> Self {
        Self::new(OrderKind::Raw(clause.into()))
    }

    /// Sort on a property.
    ///
    /// `Rand` and `Values` modes produce a random and an (empty) ranking
    /// order respectively.
    pub fn by(property: impl Into<String>, mode: Direction) -> Self {
        let property = property.into();
        match mode {
            Direction::Rand => Self::random(),
            Direction::Values => Self::new(OrderKind::Values {
                property,
                table: None,
                values: Vec::new(),
            }),
            mode => Self::new(OrderKind::Field {
                property,
                table: None,
                mode,
            }),
        }
    }

    /// Sort ascending.
    pub fn asc(property: impl Into<String>) -> Self {
        Self::by(property, Direction::Asc)
    }

    /// Sort descending.
    pub fn desc(property: impl Into<String>) -> Self {
        Self::by(property, Direction::Desc)
    }

    /// Random order.
    pub fn random() -> Self {
        Self::new(OrderKind::Random)
    }

    /// Rank rows by the position of a property's value in `values`.
    ///
    /// ```rust
    /// use charcoal_query::{Expression, Order};
    ///
    /// let order = Order::values("test", vec![1, 2, 3]);
    /// assert_eq!(order.sql().unwrap(), "FIELD(`test`, 1,2,3)");
    /// ```
    pub fn values<V: Into<Value>>(property: impl Into<String>, values: Vec<V>) -> Self {
        Self::new(OrderKind::Values {
            property: property.into(),
            table: None,
            values: values.into_iter().map(Into::into).collect(),
        })
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

    /// Deactivate the order.
    pub fn inactive(self) -> Self {
        self.active(false)
    }

    /// Set the table alias of a field or values order.
    pub fn table(mut self, alias: impl Into<String>) -> Self {
        match self.kind {
            OrderKind::Field { ref mut table, .. } | OrderKind::Values { ref mut table, .. } => {
                *table = Some(alias.into());
            }
            _ => {}
        }
        self
    }

    /// Child orders, if this is a group.
    pub fn children(&self) -> &[Order] {
        match &self.kind {
            OrderKind::Group(children) => children,
            _ => &[],
        }
    }

    /// Whether this is a group with no children.
    pub fn is_empty(&self) -> bool {
        matches!(&self.kind, OrderKind::Group(children) if children.is_empty())
    }

    /// Append an order to this group, replacing a same-named sibling in place.
    pub fn push(&mut self, order: Order) {
        if !matches!(self.kind, OrderKind::Group(_)) {
            let previous = std::mem::replace(self, Self::empty());
            self.kind = OrderKind::Group(vec![previous]);
        }

        if let OrderKind::Group(ref mut children) = self.kind {
            let existing = order
                .meta
                .name
                .as_deref()
                .and_then(|name| children.iter().position(|c| c.name() == Some(name)));
            match existing {
                Some(index) => children[index] = order,
                None => children.push(order),
            }
        }
    }

    /// Build an order from a JSON specification.
    pub fn from_json(json: serde_json::Value) -> QueryResult<Self> {
        let spec: OrderSpec = serde_json::from_value(json)
            .map_err(|e| QueryError::invalid_order(format!("invalid order specification: {}", e)))?;
        Self::try_from(spec)
    }
}

impl Default for Order {
    fn default() -> Self {
        Self::empty()
    }
}

fn require_property<'p>(property: &'p str, mode: Direction) -> QueryResult<&'p str> {
    let property = property.trim();
    if property.is_empty() {
        return Err(QueryError::invalid_order(format!(
            "order mode '{}' requires a property",
            mode.as_str()
        )));
    }
    Ok(property)
}

impl Expression for Order {
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
            OrderKind::Raw(clause) => {
                let clause = clause.trim();
                if clause.is_empty() {
                    return Err(QueryError::invalid_order("raw order clause is empty"));
                }
                Ok(clause.to_string())
            }
            OrderKind::Group(children) => {
                let mut parts = Vec::with_capacity(children.len());
                for child in children {
                    let part = child.compile(compiler)?;
                    if !part.is_empty() {
                        parts.push(part);
                    }
                }
                Ok(parts.join(", "))
            }
            OrderKind::Random => Ok("RAND()".to_string()),
            OrderKind::Field {
                property,
                table,
                mode,
            } => {
                let property = require_property(property, *mode)?;
                let field = first_field(compiler, table.as_deref(), property);
                Ok(format!("{} {}", field, mode.as_sql()))
            }
            OrderKind::Values {
                property,
                table,
                values,
            } => {
                let property = require_property(property, Direction::Values)?;
                if values.is_empty() {
                    return Err(QueryError::invalid_order(
                        "order mode 'values' requires a non-empty list of values",
                    )
                    .with_property(property));
                }
                let field = first_field(compiler, table.as_deref(), property);
                let dialect = compiler.dialect();
                let values = values
                    .iter()
                    .map(|value| literal(value, dialect))
                    .collect::<Vec<_>>()
                    .join(",");
                Ok(format!("FIELD({}, {})", field, values))
            }
        }
    }
}

fn first_field(compiler: &SqlCompiler<'_>, table: Option<&str>, property: &str) -> String {
    compiler
        .field_identifiers(table, property)
        .into_iter()
        .next()
        .unwrap_or_default()
}

/// Serializable description of an order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderSpec {
    /// Order name.
    pub name: Option<String>,
    /// Active flag; defaults to true.
    pub active: Option<bool>,
    /// Raw clause. Takes precedence over everything else.
    pub condition: Option<String>,
    /// Property identifier.
    pub property: Option<String>,
    /// Table alias.
    pub table: Option<String>,
    /// `asc`, `desc`, `rand` or `values`.
    #[serde(alias = "direction")]
    pub mode: Option<String>,
    /// Ranking values for `values` mode.
    pub values: Vec<Value>,
    /// Child orders.
    pub orders: Vec<OrderSpec>,
    /// Extra data.
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl TryFrom<OrderSpec> for Order {
    type Error = QueryError;

    fn try_from(spec: OrderSpec) -> Result<Self, Self::Error> {
        let kind = if let Some(condition) = spec.condition {
            OrderKind::Raw(condition)
        } else if !spec.orders.is_empty() {
            let mut group = Order::empty();
            for child in spec.orders {
                group.push(Order::try_from(child)?);
            }
            group.kind
        } else {
            let mode = match spec.mode.as_deref() {
                Some(mode) => mode.parse()?,
                None => Direction::default(),
            };
            let property = spec.property.unwrap_or_default();
            match mode {
                Direction::Rand => OrderKind::Random,
                Direction::Values => OrderKind::Values {
                    property,
                    table: spec.table,
                    values: spec.values,
                },
                mode => OrderKind::Field {
                    property,
                    table: spec.table,
                    mode,
                },
            }
        };

        Ok(Order {
            meta: ExpressionMeta {
                name: spec.name,
                active: spec.active.unwrap_or(true),
                data: spec.data,
            },
            kind,
        })
    }
}
