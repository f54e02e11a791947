//! Builds parameterized SELECT, COUNT, INSERT, UPDATE and DELETE from a table description.
//!
//! Identifiers come from table descriptions only; values are always bound parameters.

use crate::config::{Column, TableDescription};
use crate::error::AppError;
use crate::sql::params::BindValue;
use crate::sql::predicate::Predicate;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Alias of the root table in include-selects.
pub const MAIN_ALIAS: &str = "main";
const RELATED_ALIAS: &str = "rel";

/// Quote identifier for PostgreSQL.
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(table: &TableDescription) -> String {
    match table.schema() {
        Some(schema) => format!("{}.{}", quoted(schema), quoted(table.name())),
        None => quoted(table.name()),
    }
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<BindValue>,
}

impl QueryBuf {
    pub fn new() -> Self {
        QueryBuf::default()
    }

    /// Append a parameter; returns its 1-based placeholder number.
    pub fn push_param(&mut self, v: &Value) -> usize {
        self.push_bind(BindValue::from_json(v))
    }

    pub fn push_bind(&mut self, v: BindValue) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

/// LIMIT/OFFSET pair for one page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub limit: u64,
    pub offset: u64,
}

/// Direction of an eager-loaded relation: to_one (we hold the key to them) or to_many (they hold it to us).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IncludeDirection {
    ToOne,
    ToMany,
}

/// One include for a single-query select: related rows come back as a JSON column named `name`.
pub struct IncludeSelect<'a> {
    pub name: &'a str,
    pub direction: IncludeDirection,
    pub related: &'a TableDescription,
    pub our_key: &'a Column,
    pub their_key: &'a Column,
}

/// Column expression for SELECT lists: aliased to the field name, numeric read back as text.
fn select_expr(c: &Column, alias: Option<&str>) -> String {
    let mut expr = match alias {
        Some(a) => format!("{}.{}", a, quoted(&c.column)),
        None => quoted(&c.column),
    };
    if c.ty.select_as_text() {
        expr.push_str("::text");
    }
    if alias.is_some() || c.column != c.field || c.ty.select_as_text() {
        format!("{} AS {}", expr, quoted(&c.field))
    } else {
        expr
    }
}

fn select_column_list(table: &TableDescription, alias: Option<&str>) -> String {
    table
        .columns()
        .iter()
        .map(|c| select_expr(c, alias))
        .collect::<Vec<_>>()
        .join(", ")
}

fn where_clause(
    table: &TableDescription,
    alias: Option<&str>,
    predicate: Option<&Predicate>,
    q: &mut QueryBuf,
) -> Result<String, AppError> {
    match predicate {
        Some(p) => Ok(format!(" WHERE {}", p.render(table, alias, q)?)),
        None => Ok(String::new()),
    }
}

fn order_by_pk(table: &TableDescription, alias: Option<&str>) -> String {
    let cols: Vec<String> = table
        .primary_key()
        .iter()
        .filter_map(|f| table.column(f))
        .map(|c| match alias {
            Some(a) => format!("{}.{}", a, quoted(&c.column)),
            None => quoted(&c.column),
        })
        .collect();
    format!(" ORDER BY {}", cols.join(", "))
}

fn window_clause(window: Option<Window>) -> String {
    window
        .map(|w| format!(" LIMIT {} OFFSET {}", w.limit, w.offset))
        .unwrap_or_default()
}

/// SELECT rows matching `predicate`, ordered by primary key, optionally windowed.
pub fn select(
    table: &TableDescription,
    predicate: Option<&Predicate>,
    window: Option<Window>,
) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(table, None, predicate, &mut q)?;
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}",
        select_column_list(table, None),
        qualified_table(table),
        where_sql,
        order_by_pk(table, None),
        window_clause(window)
    );
    Ok(q)
}

/// SELECT COUNT(*) of rows matching `predicate`. Result column is `count`.
pub fn select_count(
    table: &TableDescription,
    predicate: Option<&Predicate>,
) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(table, None, predicate, &mut q)?;
    q.sql = format!(
        "SELECT COUNT(*) AS \"count\" FROM {}{}",
        qualified_table(table),
        where_sql
    );
    Ok(q)
}

/// SELECT with includes in a single query: root aliased as `main`, each include a scalar
/// subquery (`row_to_json` for to_one, `json_agg` for to_many). Soft-deleted related rows are skipped.
pub fn select_with_includes(
    table: &TableDescription,
    predicate: Option<&Predicate>,
    window: Option<Window>,
    includes: &[IncludeSelect<'_>],
) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let mut select_parts = vec![select_column_list(table, Some(MAIN_ALIAS))];
    for inc in includes {
        let mut sub_where = format!(
            "{}.{} = {}.{}",
            RELATED_ALIAS,
            quoted(&inc.their_key.column),
            MAIN_ALIAS,
            quoted(&inc.our_key.column)
        );
        if let Some(marker) = inc.related.soft_delete_column() {
            sub_where.push_str(&format!(
                " AND {}.{} IS NULL",
                RELATED_ALIAS,
                quoted(&marker.column)
            ));
        }
        let sub_from = format!(
            "SELECT {} FROM {} {} WHERE {}{}",
            select_column_list(inc.related, Some(RELATED_ALIAS)),
            qualified_table(inc.related),
            RELATED_ALIAS,
            sub_where,
            order_by_pk(inc.related, Some(RELATED_ALIAS))
        );
        let subquery = match inc.direction {
            IncludeDirection::ToOne => format!(
                "(SELECT row_to_json(sub) FROM ({} LIMIT 1) sub)",
                sub_from
            ),
            IncludeDirection::ToMany => format!(
                "(SELECT COALESCE(json_agg(row_to_json(sub)), '[]'::json) FROM ({}) sub)",
                sub_from
            ),
        };
        select_parts.push(format!("{} AS {}", subquery, quoted(inc.name)));
    }
    let where_sql = where_clause(table, Some(MAIN_ALIAS), predicate, &mut q)?;
    q.sql = format!(
        "SELECT {} FROM {} {}{}{}{}",
        select_parts.join(", "),
        qualified_table(table),
        MAIN_ALIAS,
        where_sql,
        order_by_pk(table, Some(MAIN_ALIAS)),
        window_clause(window)
    );
    Ok(q)
}

/// INSERT the declared fields present in `data`; absent columns take their storage default.
pub fn insert(table: &TableDescription, data: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in table.columns() {
        let Some(val) = data.get(&c.field) else { continue };
        let n = q.push_param(val);
        cols.push(quoted(&c.column));
        placeholders.push(format!("${}::{}", n, c.ty.pg_cast()));
    }
    let returning = select_column_list(table, None);
    q.sql = if cols.is_empty() {
        format!(
            "INSERT INTO {} DEFAULT VALUES RETURNING {}",
            qualified_table(table),
            returning
        )
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            qualified_table(table),
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE rows matching `predicate`: SET only declared fields present in `data`.
pub fn update(
    table: &TableDescription,
    data: &Map<String, Value>,
    predicate: &Predicate,
) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for c in table.columns() {
        let Some(val) = data.get(&c.field) else { continue };
        let n = q.push_param(val);
        sets.push(format!("{} = ${}::{}", quoted(&c.column), n, c.ty.pg_cast()));
    }
    if sets.is_empty() {
        return Err(AppError::bad_request("update needs at least one field"));
    }
    let where_sql = where_clause(table, None, Some(predicate), &mut q)?;
    q.sql = format!(
        "UPDATE {} SET {}{} RETURNING {}",
        qualified_table(table),
        sets.join(", "),
        where_sql,
        select_column_list(table, None)
    );
    Ok(q)
}

/// Mark rows matching `predicate` as deleted at `now`. Table must have a soft-delete marker.
pub fn soft_delete(
    table: &TableDescription,
    predicate: &Predicate,
    now: DateTime<Utc>,
) -> Result<QueryBuf, AppError> {
    let marker = table.soft_delete_column().ok_or_else(|| {
        AppError::bad_request(format!("{} does not support soft delete", table.name()))
    })?;
    let mut q = QueryBuf::new();
    let n = q.push_bind(BindValue::Timestamp(now));
    let set = format!("{} = ${}::{}", quoted(&marker.column), n, marker.ty.pg_cast());
    let where_sql = where_clause(table, None, Some(predicate), &mut q)?;
    q.sql = format!("UPDATE {} SET {}{}", qualified_table(table), set, where_sql);
    Ok(q)
}

/// DELETE rows matching `predicate`.
pub fn delete(table: &TableDescription, predicate: &Predicate) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(table, None, Some(predicate), &mut q)?;
    q.sql = format!("DELETE FROM {}{}", qualified_table(table), where_sql);
    Ok(q)
}
