//! Primary key resolution: key predicates and the not-found message convention.

use crate::config::TableDescription;
use crate::error::{AppError, ConfigError};
use crate::sql::Predicate;
use serde_json::{Map, Value};

/// Primary-key values keyed by field name. Extra keys are ignored.
pub type KeyValues = Map<String, Value>;

#[derive(Clone, Debug)]
pub struct PrimaryKeyResolver {
    table: String,
    fields: Vec<String>,
}

impl PrimaryKeyResolver {
    pub fn new(table: &TableDescription) -> Result<Self, ConfigError> {
        if table.primary_key().is_empty() {
            return Err(ConfigError::MissingPrimaryKey {
                table: table.name().to_string(),
            });
        }
        Ok(PrimaryKeyResolver {
            table: table.name().to_string(),
            fields: table.primary_key().to_vec(),
        })
    }

    /// Key fields in declared order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Equality on each key field; AND for composite keys. A missing or null component fails fast.
    pub fn key_predicate(&self, keys: &KeyValues) -> Result<Predicate, AppError> {
        let mut parts = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            match keys.get(field) {
                Some(v) if !v.is_null() => parts.push(Predicate::eq(field.clone(), v.clone())),
                _ => {
                    return Err(AppError::bad_request(format!(
                        "missing value for primary key field {}",
                        field
                    )))
                }
            }
        }
        Predicate::and(parts).ok_or_else(|| {
            AppError::bad_request(format!("{} has no primary key fields", self.table))
        })
    }

    /// `<table> with k1=v1 and k2=v2 not found`, keys in declared order.
    pub fn not_found(&self, keys: &KeyValues) -> AppError {
        let rendered: Vec<String> = self
            .fields
            .iter()
            .map(|f| format!("{}={}", f, display_value(keys.get(f))))
            .collect();
        AppError::not_found(format!(
            "{} with {} not found",
            self.table,
            rendered.join(" and ")
        ))
    }
}

fn display_value(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "null".to_string(),
    }
}
