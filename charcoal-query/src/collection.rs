//! Ordered, keyed containers of loaded models.

use indexmap::IndexMap;
use indexmap::map::{IntoValues, Values};

use crate::model::Model;

/// Models keyed by identifier, in load order.
///
/// A model without an identifier is keyed by its insertion position.
/// Inserting a model whose identifier is already present replaces the
/// earlier entry in place.
#[derive(Debug, Clone)]
pub struct Collection<M> {
    items: IndexMap<String, M>,
    next_position: usize,
}

impl<M> Default for Collection<M> {
    fn default() -> Self {
        Self {
            items: IndexMap::new(),
            next_position: 0,
        }
    }
}

impl<M: Model> Collection<M> {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a model.
    pub fn push(&mut self, model: M) {
        let id = model.id();
        let key = if id.is_empty_ident() {
            format!("#{}", self.next_position)
        } else {
            id.to_plain_string()
        };
        self.next_position += 1;
        self.items.insert(key, model);
    }

    /// Get a model by identifier.
    pub fn get(&self, key: &str) -> Option<&M> {
        self.items.get(key)
    }

    /// Get a model by identifier, mutably.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut M> {
        self.items.get_mut(key)
    }

    /// Whether an identifier is present.
    pub fn contains(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    /// Keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    /// First model.
    pub fn first(&self) -> Option<&M> {
        self.items.first().map(|(_, m)| m)
    }

    /// Last model.
    pub fn last(&self) -> Option<&M> {
        self.items.last().map(|(_, m)| m)
    }

    /// Number of models.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate models in order.
    pub fn iter(&self) -> Values<'_, String, M> {
        self.items.values()
    }

    /// Remove every model.
    pub fn clear(&mut self) {
        self.items.clear();
        self.next_position = 0;
    }

    /// Take the models as a vector.
    pub fn into_vec(self) -> Vec<M> {
        self.items.into_values().collect()
    }
}

impl<M: Model> IntoIterator for Collection<M> {
    type Item = M;
    type IntoIter = IntoValues<String, M>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_values()
    }
}

impl<'a, M: Model> IntoIterator for &'a Collection<M> {
    type Item = &'a M;
    type IntoIter = Values<'a, String, M>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.values()
    }
}

impl<M: Model> FromIterator<M> for Collection<M> {
    fn from_iter<I: IntoIterator<Item = M>>(iter: I) -> Self {
        let mut collection = Self::new();
        collection.extend(iter);
        collection
    }
}

impl<M: Model> Extend<M> for Collection<M> {
    fn extend<I: IntoIterator<Item = M>>(&mut self, iter: I) {
        for model in iter {
            self.push(model);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelMetadata, PropertyDef, Record, SqlType};
    use crate::value::Value;
    use std::sync::Arc;

    fn record(id: Option<i64>, label: &str) -> Record {
        let metadata = Arc::new(
            ModelMetadata::new("charcoal/tag", "tags")
                .property(PropertyDef::new("label", SqlType::Varchar(32))),
        );
        let record = Record::new(metadata).with("label", label);
        match id {
            Some(id) => record.with("id", id),
            None => record,
        }
    }

    #[test]
    fn test_keyed_by_id() {
        let collection: Collection<Record> =
            [record(Some(3), "a"), record(Some(1), "b")].into_iter().collect();

        assert_eq!(collection.keys().collect::<Vec<_>>(), vec!["3", "1"]);
        assert_eq!(collection.get("1").and_then(|r| r.get("label")), Some(&Value::from("b")));
    }

    #[test]
    fn test_same_id_replaces_in_place() {
        let mut collection = Collection::new();
        collection.push(record(Some(1), "a"));
        collection.push(record(Some(2), "b"));
        collection.push(record(Some(1), "c"));

        assert_eq!(collection.len(), 2);
        assert_eq!(
            collection.first().and_then(|r| r.get("label")),
            Some(&Value::from("c"))
        );
    }

    #[test]
    fn test_missing_id_uses_position() {
        let mut collection = Collection::new();
        collection.push(record(None, "a"));
        collection.push(record(Some(9), "b"));
        collection.push(record(None, "c"));

        assert_eq!(collection.keys().collect::<Vec<_>>(), vec!["#0", "9", "#2"]);
        assert_eq!(collection.into_vec().len(), 3);
    }
}
