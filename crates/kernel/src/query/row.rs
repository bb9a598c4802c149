//! Result rows.

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, Serializer};

use super::value::Value;

static NULL: Value = Value::Null;

/// One dataset record: column values plus eager-loaded related records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: BTreeMap<String, Value>,
    related: BTreeMap<String, Option<Row>>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(column.into(), value.into());
    }

    /// Value of `column`; a missing column reads as null.
    pub fn get(&self, column: &str) -> &Value {
        self.values.get(column).unwrap_or(&NULL)
    }

    /// Value of `column` if the row carries it at all.
    pub fn get_opt(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Eager-loaded record for `relation`. Outer `None` when the relation
    /// was never loaded, inner `None` when it was loaded but matched nothing.
    pub fn related(&self, relation: &str) -> Option<Option<&Row>> {
        self.related.get(relation).map(Option::as_ref)
    }

    pub fn set_related(&mut self, relation: impl Into<String>, row: Option<Row>) {
        self.related.insert(relation.into(), row);
    }

    /// Keep only the listed columns (used for selecting columns in memory).
    pub fn project(&self, columns: &[String]) -> Row {
        let values = columns
            .iter()
            .filter_map(|c| self.values.get(c).map(|v| (c.clone(), v.clone())))
            .collect();
        Row {
            values,
            related: BTreeMap::new(),
        }
    }
}

// Related records flatten into the row object under their relation name.
impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + self.related.len()))?;
        for (column, value) in &self.values {
            map.serialize_entry(column, value)?;
        }
        for (relation, row) in &self.related {
            map.serialize_entry(relation, row)?;
        }
        map.end()
    }
}
