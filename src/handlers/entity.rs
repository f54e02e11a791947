//! Entity handlers: list, create, read, update, delete over one `CrudService`.

use crate::config::{ColumnType, TableDescription};
use crate::error::{AppError, ValidationIssue};
use crate::response;
use crate::service::{FilterValues, KeyValues, Pagination, Record, RequestValidator};
use crate::state::EntityState;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use std::collections::HashMap;

const PAGE_PARAM: &str = "page";
const PAGE_SIZE_PARAM: &str = "pageSize";

fn body_to_record(value: Value) -> Result<Record, AppError> {
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::bad_request("body must be a JSON object")),
    }
}

/// Parse a path or query string into the JSON type the column expects.
fn coerce(field: &str, ty: Option<ColumnType>, raw: &str) -> Result<Value, ValidationIssue> {
    let invalid = |what: &str| ValidationIssue::new(field, format!("{} must be {}", field, what));
    let Some(ty) = ty else {
        return Ok(Value::String(raw.to_string()));
    };
    if ty.is_integer() {
        return raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| invalid("an integer"));
    }
    if ty.is_float() {
        return raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| invalid("a number"));
    }
    match ty {
        ColumnType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(invalid("true or false")),
        },
        ColumnType::Uuid => uuid::Uuid::parse_str(raw.trim())
            .map(|u| Value::String(u.to_string()))
            .map_err(|_| invalid("a valid UUID")),
        _ => Ok(Value::String(raw.to_string())),
    }
}

fn column_type(table: &TableDescription, field: &str) -> Option<ColumnType> {
    table.column(field).map(|c| c.ty)
}

fn parse_page_param(
    params: &HashMap<String, String>,
    name: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<u32> {
    let raw = params.get(name)?;
    match raw.trim().parse::<u32>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            issues.push(ValidationIssue::new(
                name,
                format!("{} must be a positive integer", name),
            ));
            None
        }
    }
}

/// Path parameters are primary-key fields; coerce each by its column type.
fn path_to_keys(
    table: &TableDescription,
    path: HashMap<String, String>,
) -> Result<KeyValues, AppError> {
    let mut keys = KeyValues::new();
    let mut issues = Vec::new();
    for (field, raw) in path {
        match coerce(&field, column_type(table, &field), &raw) {
            Ok(v) => {
                keys.insert(field, v);
            }
            Err(issue) => issues.push(issue),
        }
    }
    if issues.is_empty() {
        Ok(keys)
    } else {
        Err(AppError::Validation(issues))
    }
}

pub async fn list(
    State(state): State<EntityState>,
    path: Option<Path<HashMap<String, String>>>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let mut params = path.map(|Path(p)| p).unwrap_or_default();
    params.extend(query);

    let mut issues = Vec::new();
    let page = parse_page_param(&params, PAGE_PARAM, &mut issues).unwrap_or(1);
    let page_size = parse_page_param(&params, PAGE_SIZE_PARAM, &mut issues).unwrap_or(0);

    let table = state.service.table();
    let filter_map = state.service.filters();
    let mut filters = FilterValues::new();
    for (key, raw) in &params {
        if !filter_map.contains_key(key) {
            continue;
        }
        let ty = column_type(table, filter_map.target(key).unwrap_or(key.as_str()));
        match coerce(key, ty, raw) {
            Ok(v) => {
                filters.insert(key.clone(), v);
            }
            Err(issue) => issues.push(issue),
        }
    }
    if !issues.is_empty() {
        return Err(AppError::Validation(issues));
    }

    let page = state
        .service
        .find_page(Some(&filters), Pagination::new(page, page_size))
        .await?;
    Ok(response::list(page))
}

pub async fn create(
    State(state): State<EntityState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(body) = body?;
    let body = body_to_record(body)?;
    RequestValidator::validate(&body, &state.rules)?;
    let row = state.service.create(body, None).await?;
    Ok(response::created(row))
}

pub async fn read(
    State(state): State<EntityState>,
    Path(path): Path<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let keys = path_to_keys(state.service.table(), path)?;
    let row = state.service.find_one(&keys).await?;
    Ok(response::ok(row))
}

pub async fn update(
    State(state): State<EntityState>,
    Path(path): Path<HashMap<String, String>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let keys = path_to_keys(state.service.table(), path)?;
    let Json(body) = body?;
    let body = body_to_record(body)?;
    RequestValidator::validate_partial(&body, &state.rules)?;
    let row = state.service.update(&keys, body, None).await?;
    Ok(response::ok(row))
}

pub async fn delete(
    State(state): State<EntityState>,
    Path(path): Path<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let keys = path_to_keys(state.service.table(), path)?;
    state.service.delete(&keys, None).await?;
    Ok(StatusCode::NO_CONTENT)
}
