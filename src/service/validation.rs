//! Request body validation against per-field rules.

use crate::error::{AppError, ValidationIssue};
use crate::service::crud::Record;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

impl ValidationRule {
    pub fn required() -> Self {
        ValidationRule {
            required: Some(true),
            ..Default::default()
        }
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn length(mut self, min: Option<u32>, max: Option<u32>) -> Self {
        self.min_length = min;
        self.max_length = max;
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn allowed(mut self, values: Vec<Value>) -> Self {
        self.allowed = Some(values);
        self
    }

    pub fn range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.minimum = min;
        self.maximum = max;
        self
    }
}

/// Rules keyed by field name. Ordered so issues come back in a stable order.
pub type ValidationRules = BTreeMap<String, ValidationRule>;

pub struct RequestValidator;

impl RequestValidator {
    /// Validate a full body (create). Required fields must be present and non-null.
    pub fn validate(body: &Record, rules: &ValidationRules) -> Result<(), AppError> {
        let mut issues = Vec::new();
        for (field, rule) in rules {
            let val = body.get(field);
            if rule.required == Some(true) && val.map_or(true, Value::is_null) {
                issues.push(ValidationIssue::new(field, format!("{} is required", field)));
                continue;
            }
            if let Some(v) = val {
                validate_field(field, v, rule, &mut issues);
            }
        }
        into_result(issues)
    }

    /// Validate only the fields present in body (update). Required is not enforced for missing fields.
    pub fn validate_partial(body: &Record, rules: &ValidationRules) -> Result<(), AppError> {
        let mut issues = Vec::new();
        for (field, rule) in rules {
            let Some(v) = body.get(field) else { continue };
            if rule.required == Some(true) && v.is_null() {
                issues.push(ValidationIssue::new(field, format!("{} is required", field)));
                continue;
            }
            validate_field(field, v, rule, &mut issues);
        }
        into_result(issues)
    }
}

fn into_result(issues: Vec<ValidationIssue>) -> Result<(), AppError> {
    if issues.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(issues))
    }
}

fn validate_field(field: &str, v: &Value, rule: &ValidationRule, issues: &mut Vec<ValidationIssue>) {
    if v.is_null() {
        return;
    }
    let mut fail = |message: String| issues.push(ValidationIssue::new(field, message));
    if let Some(format) = &rule.format {
        if let Some(message) = check_format(field, v, format) {
            fail(message);
        }
    }
    if let Some(s) = v.as_str() {
        let len = s.chars().count();
        if let Some(max) = rule.max_length {
            if len > max as usize {
                fail(format!("{} must be at most {} characters", field, max));
            }
        }
        if let Some(min) = rule.min_length {
            if len < min as usize {
                fail(format!("{} must be at least {} characters", field, min));
            }
        }
        if let Some(pattern) = &rule.pattern {
            match Regex::new(pattern) {
                Ok(re) if !re.is_match(s) => {
                    fail(format!("{} does not match required pattern", field))
                }
                Ok(_) => {}
                Err(_) => fail(format!("invalid pattern for {}", field)),
            }
        }
    }
    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            fail(format!(
                "{} must be one of: {}",
                field,
                allowed
                    .iter()
                    .take(5)
                    .map(|a| a.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
    }
    if let Some(n) = v.as_f64() {
        if let Some(min) = rule.minimum {
            if n < min {
                fail(format!("{} must be at least {}", field, min));
            }
        }
        if let Some(max) = rule.maximum {
            if n > max {
                fail(format!("{} must be at most {}", field, max));
            }
        }
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn check_format(field: &str, v: &Value, format: &str) -> Option<String> {
    let s = v.as_str()?;
    match format.to_lowercase().as_str() {
        "email" => {
            let ok = s
                .split_once('@')
                .map_or(false, |(user, domain)| !user.is_empty() && domain.contains('.'));
            (!ok).then(|| format!("{} must be a valid email", field))
        }
        "uuid" => uuid::Uuid::parse_str(s)
            .is_err()
            .then(|| format!("{} must be a valid UUID", field)),
        "date" => chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .is_err()
            .then(|| format!("{} must be a date (YYYY-MM-DD)", field)),
        _ => None,
    }
}
