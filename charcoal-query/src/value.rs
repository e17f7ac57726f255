//! Dynamic values used for filter operands, bound parameters and row cells.

use serde::{Deserialize, Serialize};

/// A value that can be compared against, bound to a statement or read from a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// String value.
    String(String),
    /// List of values.
    List(Vec<Value>),
    /// Structured JSON value.
    Json(serde_json::Value),
}

impl Value {
    /// Check if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Check if this value cannot serve as an object identifier.
    pub fn is_empty_ident(&self) -> bool {
        match self {
            Self::Null => true,
            Self::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Get the value as an integer, parsing numeric strings.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Bool(b) => Some(i64::from(*b)),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Get the value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Render the value the way a list join would.
    ///
    /// ```rust
    /// use charcoal_query::Value;
    ///
    /// assert_eq!(Value::from(vec![1, 2, 3]).to_plain_string(), "1,2,3");
    /// assert_eq!(Value::Bool(true).to_plain_string(), "1");
    /// assert_eq!(Value::Null.to_plain_string(), "");
    /// ```
    pub fn to_plain_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) => s.clone(),
            Self::List(list) => list
                .iter()
                .map(Value::to_plain_string)
                .collect::<Vec<_>>()
                .join(","),
            Self::Json(j) => j.to_string(),
        }
    }

    /// Flatten the value into list items. Scalars become a single item.
    pub fn into_items(self) -> Vec<Value> {
        match self {
            Self::List(list) => list,
            other => vec![other],
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => Self::List(items.into_iter().map(Value::from).collect()),
            obj @ serde_json::Value::Object(_) => Self::Json(obj),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_from() {
        assert_eq!(Value::from(42i32), Value::Int(42));
        assert_eq!(Value::from("hello"), Value::String("hello".to_string()));
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn test_empty_ident() {
        assert!(Value::Null.is_empty_ident());
        assert!(Value::from("  ").is_empty_ident());
        assert!(!Value::from(0).is_empty_ident());
        assert!(!Value::from("abc").is_empty_ident());
    }

    #[test]
    fn test_as_i64_parses_strings() {
        assert_eq!(Value::from("17").as_i64(), Some(17));
        assert_eq!(Value::from("x").as_i64(), None);
        assert_eq!(Value::Float(1.5).as_i64(), None);
    }

    #[test]
    fn test_from_json() {
        let value = Value::from(serde_json::json!([1, "a", null, 2.5]));
        assert_eq!(
            value,
            Value::List(vec![
                Value::Int(1),
                Value::String("a".into()),
                Value::Null,
                Value::Float(2.5)
            ])
        );
        assert!(matches!(Value::from(serde_json::json!({"a": 1})), Value::Json(_)));
    }

    #[test]
    fn test_deserialize_untagged() {
        let value: Value = serde_json::from_str("[1, 2]").unwrap();
        assert_eq!(value, Value::List(vec![Value::Int(1), Value::Int(2)]));

        let value: Value = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(value, Value::String("abc".into()));
    }

    #[test]
    fn test_into_items() {
        assert_eq!(Value::from(5).into_items(), vec![Value::Int(5)]);
        assert_eq!(Value::from(vec!["a", "b"]).into_items().len(), 2);
    }
}
