//! Convert serde_json::Value to parameters that sqlx can bind.
//!
//! Every parameter is sent as TEXT and the builder adds an explicit `$n::<column type>` cast,
//! so the server does the conversion and a statement's parameter types never vary between calls.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::{Database, Type};

#[derive(Clone, Debug, PartialEq)]
pub enum BindValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Json(Value),
}

impl BindValue {
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => BindValue::Null,
            Value::Bool(b) => BindValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => BindValue::I64(i),
                None => BindValue::F64(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => BindValue::String(s.clone()),
            Value::Array(_) | Value::Object(_) => BindValue::Json(v.clone()),
        }
    }

    /// Text form sent to the server; `None` for SQL NULL.
    pub fn as_text(&self) -> Option<String> {
        match self {
            BindValue::Null => None,
            BindValue::Bool(b) => Some(b.to_string()),
            BindValue::I64(n) => Some(n.to_string()),
            BindValue::F64(n) => Some(n.to_string()),
            BindValue::String(s) => Some(s.clone()),
            BindValue::Timestamp(t) => Some(t.to_rfc3339_opts(SecondsFormat::Micros, true)),
            BindValue::Json(v) => Some(v.to_string()),
        }
    }
}

impl From<&Value> for BindValue {
    fn from(v: &Value) -> Self {
        BindValue::from_json(v)
    }
}

impl<'q> Encode<'q, Postgres> for BindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, BoxDynError> {
        match self.as_text() {
            None => Ok(IsNull::Yes),
            Some(text) => <&str as Encode<Postgres>>::encode_by_ref(&text.as_str(), buf),
        }
    }
}

impl Type<Postgres> for BindValue {
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }
}
