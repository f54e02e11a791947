//! Filter map (key -> predicate factory) and the predicate builder over sparse filter values.

use crate::config::TableDescription;
use crate::error::ConfigError;
use crate::sql::Predicate;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Sparse filter values keyed by filter name. Null entries mean "not supplied".
pub type FilterValues = Map<String, Value>;

type Factory = Arc<dyn Fn(&Value) -> Predicate + Send + Sync>;

#[derive(Clone)]
struct FilterEntry {
    key: String,
    /// Field the factory targets, when known; checked against the table at service construction.
    target: Option<String>,
    factory: Factory,
}

/// Per-entity mapping from filter key to predicate factory. Authored once, immutable after.
#[derive(Clone, Default)]
pub struct FilterMap {
    entries: Vec<FilterEntry>,
}

impl FilterMap {
    pub fn new() -> Self {
        FilterMap::default()
    }

    fn insert(mut self, key: String, target: Option<String>, factory: Factory) -> Self {
        self.entries.retain(|e| e.key != key);
        self.entries.push(FilterEntry {
            key,
            target,
            factory,
        });
        self
    }

    /// Arbitrary factory under `key`. Fields it names are checked when rendered.
    pub fn with<F>(self, key: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&Value) -> Predicate + Send + Sync + 'static,
    {
        self.insert(key.into(), None, Arc::new(factory))
    }

    /// `field = value`, keyed by the field name.
    pub fn eq(self, field: impl Into<String>) -> Self {
        let field = field.into();
        let f = field.clone();
        self.insert(
            field.clone(),
            Some(field),
            Arc::new(move |v| Predicate::eq(f.clone(), v.clone())),
        )
    }

    /// Substring match: `field LIKE %value%`.
    pub fn like(self, field: impl Into<String>) -> Self {
        let field = field.into();
        let f = field.clone();
        self.insert(
            field.clone(),
            Some(field),
            Arc::new(move |v| Predicate::like(f.clone(), format!("%{}%", text_of(v)))),
        )
    }

    /// Case-insensitive substring match.
    pub fn ilike(self, field: impl Into<String>) -> Self {
        let field = field.into();
        let f = field.clone();
        self.insert(
            field.clone(),
            Some(field),
            Arc::new(move |v| Predicate::ilike(f.clone(), format!("%{}%", text_of(v)))),
        )
    }

    /// Lower bound on `field` under a separate key (e.g. `minYear` -> `year >= v`).
    pub fn gte(self, key: impl Into<String>, field: impl Into<String>) -> Self {
        let field = field.into();
        let f = field.clone();
        self.insert(
            key.into(),
            Some(field),
            Arc::new(move |v| Predicate::gte(f.clone(), v.clone())),
        )
    }

    /// Upper bound on `field` under a separate key.
    pub fn lte(self, key: impl Into<String>, field: impl Into<String>) -> Self {
        let field = field.into();
        let f = field.clone();
        self.insert(
            key.into(),
            Some(field),
            Arc::new(move |v| Predicate::lte(f.clone(), v.clone())),
        )
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }

    /// Field targeted by `key`, when it was registered through a field helper.
    pub fn target(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .and_then(|e| e.target.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every known target must be a declared field of `table`.
    pub fn check_against(&self, table: &TableDescription) -> Result<(), ConfigError> {
        for e in &self.entries {
            if let Some(target) = &e.target {
                if table.column(target).is_none() {
                    return Err(ConfigError::UnknownFilterField {
                        table: table.name().to_string(),
                        key: target.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FilterMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.keys()).finish()
    }
}

fn text_of(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// AND of the factories for every supplied, non-null value whose key is in `map`.
/// `None` is "no restriction", distinct from a predicate matching nothing.
pub fn build_filters(map: &FilterMap, values: Option<&FilterValues>) -> Option<Predicate> {
    let values = values?;
    let predicates = map.entries.iter().filter_map(|e| match values.get(&e.key) {
        Some(v) if !v.is_null() => Some((e.factory)(v)),
        _ => None,
    });
    Predicate::and(predicates)
}
