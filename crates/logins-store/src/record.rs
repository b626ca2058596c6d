//! Untyped row model for the record-store contract.
//!
//! Backends speak in `Record`s (ordered column/value maps); the typed
//! login models in `models` convert to and from them at the façade
//! boundary. `Filter` is the only selection shape the façade ever builds:
//! a conjunction of equality and IS NULL terms.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single column value. Text, integers and NULL cover the whole schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Text(String),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    /// Text value, or NULL when absent.
    pub fn opt_text(value: Option<&str>) -> Self {
        match value {
            Some(text) => Value::Text(text.to_string()),
            None => Value::Null,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// An untyped row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, column: &str, value: Value) {
        self.0.insert(column.to_string(), value);
    }

    pub fn put_text(&mut self, column: &str, value: impl Into<String>) {
        self.put(column, Value::Text(value.into()));
    }

    pub fn put_opt_text(&mut self, column: &str, value: Option<&str>) {
        self.put(column, Value::opt_text(value));
    }

    pub fn put_integer(&mut self, column: &str, value: i64) {
        self.put(column, Value::Integer(value));
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    /// Text content of `column`; `None` for NULL, absent, or non-text values.
    pub fn text(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }

    pub fn integer(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(Value::as_integer)
    }

    /// Overwrite this row's columns with every column `other` carries.
    pub fn merge(&mut self, other: &Record) {
        for (column, value) in &other.0 {
            self.0.insert(column.clone(), value.clone());
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One filter term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    /// `column = value`
    Eq(String, Value),
    /// `column IS NULL`
    IsNull(String),
}

impl Term {
    pub fn column(&self) -> &str {
        match self {
            Term::Eq(column, _) | Term::IsNull(column) => column,
        }
    }
}

/// Conjunction of filter terms. An empty filter matches every row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    terms: Vec<Term>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: Value) -> Self {
        self.terms.push(Term::Eq(column.to_string(), value));
        self
    }

    pub fn is_null(mut self, column: &str) -> Self {
        self.terms.push(Term::IsNull(column.to_string()));
        self
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Evaluate the conjunction against one row. An absent column counts
    /// as NULL.
    pub fn matches(&self, record: &Record) -> bool {
        self.terms.iter().all(|term| match term {
            Term::Eq(column, value) => record.get(column) == Some(value),
            Term::IsNull(column) => record.get(column).map_or(true, Value::is_null),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Filter, Record, Value};

    fn row(host: &str, realm: Option<&str>) -> Record {
        let mut record = Record::new();
        record.put_text("hostname", host);
        record.put_opt_text("http_realm", realm);
        record
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Filter::new().matches(&row("example.com", None)));
    }

    #[test]
    fn eq_and_is_null_terms_conjoin() {
        let filter = Filter::new()
            .eq("hostname", Value::text("example.com"))
            .is_null("http_realm");

        assert!(filter.matches(&row("example.com", None)));
        assert!(!filter.matches(&row("example.com", Some("realm"))));
        assert!(!filter.matches(&row("other.com", None)));
    }

    #[test]
    fn absent_column_counts_as_null() {
        let filter = Filter::new().is_null("guid");
        assert!(filter.matches(&row("example.com", None)));
    }

    #[test]
    fn merge_overwrites_supplied_columns_only() {
        let mut base = row("example.com", Some("realm"));
        let mut update = Record::new();
        update.put_text("hostname", "new.example.com");
        base.merge(&update);

        assert_eq!(base.text("hostname"), Some("new.example.com"));
        assert_eq!(base.text("http_realm"), Some("realm"));
    }
}
