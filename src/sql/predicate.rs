//! Composable boolean conditions over a table's fields, rendered to parameterized SQL.
//!
//! Predicates name *fields* (record names); rendering resolves them to quoted storage
//! columns of the target table and binds every value as a parameter with a cast to the
//! column's type.

use crate::config::TableDescription;
use crate::error::{AppError, ConfigError};
use crate::sql::builder::{quoted, QueryBuf};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    fn sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
    Like {
        field: String,
        pattern: String,
        case_insensitive: bool,
    },
    In {
        field: String,
        values: Vec<Value>,
    },
    IsNull(String),
    IsNotNull(String),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Gte, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Lte, value)
    }

    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Predicate::Like {
            field: field.into(),
            pattern: pattern.into(),
            case_insensitive: false,
        }
    }

    pub fn ilike(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Predicate::Like {
            field: field.into(),
            pattern: pattern.into(),
            case_insensitive: true,
        }
    }

    pub fn in_list(field: impl Into<String>, values: Vec<Value>) -> Self {
        Predicate::In {
            field: field.into(),
            values,
        }
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Predicate::IsNull(field.into())
    }

    pub fn is_not_null(field: impl Into<String>) -> Self {
        Predicate::IsNotNull(field.into())
    }

    /// AND of all inputs. `None` when there is nothing to combine ("no restriction").
    pub fn and<I>(predicates: I) -> Option<Predicate>
    where
        I: IntoIterator<Item = Predicate>,
    {
        let mut parts = Vec::new();
        for p in predicates {
            match p {
                Predicate::And(inner) => parts.extend(inner),
                other => parts.push(other),
            }
        }
        match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(Predicate::And(parts)),
        }
    }

    /// OR of all inputs. `None` when empty.
    pub fn or<I>(predicates: I) -> Option<Predicate>
    where
        I: IntoIterator<Item = Predicate>,
    {
        let mut parts: Vec<Predicate> = predicates.into_iter().collect();
        match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(Predicate::Or(parts)),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(predicate: Predicate) -> Predicate {
        Predicate::Not(Box::new(predicate))
    }

    /// Render into `q`, resolving fields against `table`. `alias` qualifies column references.
    pub fn render(
        &self,
        table: &TableDescription,
        alias: Option<&str>,
        q: &mut QueryBuf,
    ) -> Result<String, AppError> {
        match self {
            Predicate::Compare { field, op, value } => {
                let (col, cast) = column_ref(table, alias, field)?;
                if value.is_null() {
                    return match op {
                        CompareOp::Eq => Ok(format!("{} IS NULL", col)),
                        CompareOp::Ne => Ok(format!("{} IS NOT NULL", col)),
                        _ => Err(AppError::bad_request(format!(
                            "{} cannot be compared with null",
                            field
                        ))),
                    };
                }
                let n = q.push_param(value);
                Ok(format!("{} {} ${}::{}", col, op.sql(), n, cast))
            }
            Predicate::Like {
                field,
                pattern,
                case_insensitive,
            } => {
                let (col, _) = column_ref(table, alias, field)?;
                let n = q.push_param(&Value::String(pattern.clone()));
                let op = if *case_insensitive { "ILIKE" } else { "LIKE" };
                Ok(format!("{}::text {} ${}::text", col, op, n))
            }
            Predicate::In { field, values } => {
                let (col, cast) = column_ref(table, alias, field)?;
                if values.is_empty() {
                    return Ok("FALSE".to_string());
                }
                let placeholders: Vec<String> = values
                    .iter()
                    .map(|v| format!("${}::{}", q.push_param(v), cast))
                    .collect();
                Ok(format!("{} IN ({})", col, placeholders.join(", ")))
            }
            Predicate::IsNull(field) => {
                let (col, _) = column_ref(table, alias, field)?;
                Ok(format!("{} IS NULL", col))
            }
            Predicate::IsNotNull(field) => {
                let (col, _) = column_ref(table, alias, field)?;
                Ok(format!("{} IS NOT NULL", col))
            }
            Predicate::And(parts) => render_joined(parts, " AND ", "TRUE", table, alias, q),
            Predicate::Or(parts) => render_joined(parts, " OR ", "FALSE", table, alias, q),
            Predicate::Not(inner) => Ok(format!("NOT ({})", inner.render(table, alias, q)?)),
        }
    }
}

fn render_joined(
    parts: &[Predicate],
    sep: &str,
    empty: &str,
    table: &TableDescription,
    alias: Option<&str>,
    q: &mut QueryBuf,
) -> Result<String, AppError> {
    if parts.is_empty() {
        return Ok(empty.to_string());
    }
    let mut clauses = Vec::with_capacity(parts.len());
    for p in parts {
        clauses.push(format!("({})", p.render(table, alias, q)?));
    }
    Ok(clauses.join(sep))
}

fn column_ref(
    table: &TableDescription,
    alias: Option<&str>,
    field: &str,
) -> Result<(String, &'static str), AppError> {
    let c = table.column(field).ok_or_else(|| ConfigError::UnknownFilterField {
        table: table.name().to_string(),
        key: field.to_string(),
    })?;
    let col = match alias {
        Some(a) => format!("{}.{}", a, quoted(&c.column)),
        None => quoted(&c.column),
    };
    Ok((col, c.ty.pg_cast()))
}
