//! Generic CRUD execution against PostgreSQL for one described table.

use crate::config::{TableDescription, DEFAULT_PAGE_SIZE};
use crate::error::{AppError, ConfigError};
use crate::service::classify::{ErrorClassifier, PgErrorClassifier};
use crate::service::filters::{build_filters, FilterMap, FilterValues};
use crate::service::keys::{KeyValues, PrimaryKeyResolver};
use crate::sql::{self, BindValue, Predicate, QueryBuf, Window};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgConnection, PgPool, Postgres};
use std::sync::Arc;

/// One row as a JSON object keyed by field name.
pub type Record = Map<String, Value>;

/// Transforms write input before it reaches storage. Output replaces the input entirely.
#[async_trait]
pub trait WriteHook: Send + Sync {
    async fn apply(&self, data: Record) -> Result<Record, AppError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteStrategy {
    Soft,
    Hard,
}

/// Requested page. Zero values fall back to defaults.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    pub fn new(page: u32, page_size: u32) -> Self {
        Pagination { page, page_size }
    }

    /// Clamp to `1..` pages; zero size takes `default_size`. Sizes are unbounded unless `max_size` is set.
    pub fn normalized(self, default_size: u32, max_size: Option<u32>) -> Self {
        let page = self.page.max(1);
        let page_size = if self.page_size == 0 {
            default_size
        } else {
            self.page_size
        };
        Pagination {
            page,
            page_size: max_size.map_or(page_size, |m| page_size.min(m)).max(1),
        }
    }

    pub fn window(&self) -> Window {
        Window {
            limit: u64::from(self.page_size),
            offset: u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationResult {
    pub page: u32,
    pub page_size: u32,
    /// Rows matching the filters, ignoring the window.
    pub total: i64,
    /// Rows in this page.
    pub count: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: PaginationResult,
}

/// CRUD over one table. Immutable after construction; cheap to share behind `Arc`.
pub struct CrudService {
    pool: PgPool,
    table: Arc<TableDescription>,
    filters: FilterMap,
    keys: PrimaryKeyResolver,
    delete_strategy: DeleteStrategy,
    active: Option<Predicate>,
    classifier: Arc<dyn ErrorClassifier>,
    create_hook: Option<Arc<dyn WriteHook>>,
    update_hook: Option<Arc<dyn WriteHook>>,
    default_page_size: u32,
    max_page_size: Option<u32>,
}

impl CrudService {
    pub fn new(
        pool: PgPool,
        table: TableDescription,
        filters: FilterMap,
    ) -> Result<Self, ConfigError> {
        let keys = PrimaryKeyResolver::new(&table)?;
        filters.check_against(&table)?;
        let active = active_condition(&table);
        let delete_strategy = if table.has_soft_delete() {
            DeleteStrategy::Soft
        } else {
            DeleteStrategy::Hard
        };
        tracing::debug!(
            table = %table.name(),
            primary_key = ?keys.fields(),
            delete_strategy = ?delete_strategy,
            filters = ?filters,
            "crud service ready"
        );
        Ok(CrudService {
            pool,
            table: Arc::new(table),
            filters,
            keys,
            delete_strategy,
            active,
            classifier: Arc::new(PgErrorClassifier),
            create_hook: None,
            update_hook: None,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: None,
        })
    }

    pub fn with_classifier(mut self, classifier: impl ErrorClassifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn with_create_hook(mut self, hook: impl WriteHook + 'static) -> Self {
        self.create_hook = Some(Arc::new(hook));
        self
    }

    pub fn with_update_hook(mut self, hook: impl WriteHook + 'static) -> Self {
        self.update_hook = Some(Arc::new(hook));
        self
    }

    /// Default page size, and an optional cap on requested sizes (`None` leaves them unbounded).
    pub fn with_page_limits(mut self, default_page_size: u32, max_page_size: Option<u32>) -> Self {
        self.default_page_size = default_page_size.max(1);
        self.max_page_size = max_page_size.map(|m| m.max(self.default_page_size));
        self
    }

    pub fn table(&self) -> &TableDescription {
        &self.table
    }

    pub fn filters(&self) -> &FilterMap {
        &self.filters
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn delete_strategy(&self) -> DeleteStrategy {
        self.delete_strategy
    }

    /// Active-row condition AND supplied filters.
    pub fn filter_condition(&self, values: Option<&FilterValues>) -> Option<Predicate> {
        Predicate::and(
            self.active
                .iter()
                .cloned()
                .chain(build_filters(&self.filters, values)),
        )
    }

    /// Active-row condition AND primary-key equality.
    pub fn key_condition(&self, keys: &KeyValues) -> Result<Predicate, AppError> {
        let key = self.keys.key_predicate(keys)?;
        Predicate::and(self.active.iter().cloned().chain(Some(key)))
            .ok_or_else(|| self.keys.not_found(keys))
    }

    pub fn page_for(&self, pagination: Pagination) -> Pagination {
        pagination.normalized(self.default_page_size, self.max_page_size)
    }

    pub async fn create(
        &self,
        data: Record,
        conn: Option<&mut PgConnection>,
    ) -> Result<Record, AppError> {
        let data = match &self.create_hook {
            Some(hook) => hook.apply(data).await?,
            None => data,
        };
        let q = sql::insert(&self.table, &data);
        let row = fetch_optional(&self.pool, conn, &q)
            .await
            .map_err(|e| self.classifier.classify(e))?;
        row.map(|r| row_to_record(&r))
            .ok_or_else(|| AppError::Db(sqlx::Error::RowNotFound))
    }

    pub async fn find_one(&self, keys: &KeyValues) -> Result<Record, AppError> {
        let condition = self.key_condition(keys)?;
        let q = sql::select(&self.table, Some(&condition), None)?;
        let row = fetch_optional(&self.pool, None, &q).await?;
        row.map(|r| row_to_record(&r))
            .ok_or_else(|| self.keys.not_found(keys))
    }

    /// Every matching row, ordered by primary key.
    pub async fn find_all(&self, filters: Option<&FilterValues>) -> Result<Vec<Record>, AppError> {
        let condition = self.filter_condition(filters);
        let q = sql::select(&self.table, condition.as_ref(), None)?;
        let rows = fetch_all(&self.pool, &q).await?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    /// One page plus the total; page and count run concurrently.
    pub async fn find_page(
        &self,
        filters: Option<&FilterValues>,
        pagination: Pagination,
    ) -> Result<Page<Record>, AppError> {
        let p = self.page_for(pagination);
        let condition = self.filter_condition(filters);
        let page_q = sql::select(&self.table, condition.as_ref(), Some(p.window()))?;
        let count_q = sql::select_count(&self.table, condition.as_ref())?;
        let (rows, total) = tokio::try_join!(fetch_all(&self.pool, &page_q), fetch_count(&self.pool, &count_q))?;
        let items: Vec<Record> = rows.iter().map(row_to_record).collect();
        Ok(Page {
            pagination: PaginationResult {
                page: p.page,
                page_size: p.page_size,
                total,
                count: items.len(),
            },
            items,
        })
    }

    pub async fn count(&self, filters: Option<&FilterValues>) -> Result<i64, AppError> {
        let condition = self.filter_condition(filters);
        let q = sql::select_count(&self.table, condition.as_ref())?;
        Ok(fetch_count(&self.pool, &q).await?)
    }

    pub async fn update(
        &self,
        keys: &KeyValues,
        data: Record,
        conn: Option<&mut PgConnection>,
    ) -> Result<Record, AppError> {
        if data.is_empty() {
            return Err(AppError::bad_request("update needs at least one field"));
        }
        let condition = self.key_condition(keys)?;
        let data = match &self.update_hook {
            Some(hook) => hook.apply(data).await?,
            None => data,
        };
        let q = sql::update(&self.table, &data, &condition)?;
        let row = fetch_optional(&self.pool, conn, &q)
            .await
            .map_err(|e| self.classifier.classify(e))?;
        row.map(|r| row_to_record(&r))
            .ok_or_else(|| self.keys.not_found(keys))
    }

    /// Soft or hard delete, fixed by whether the table has a soft-delete marker.
    pub async fn delete(
        &self,
        keys: &KeyValues,
        conn: Option<&mut PgConnection>,
    ) -> Result<(), AppError> {
        match self.delete_strategy {
            DeleteStrategy::Soft => self.soft_delete(keys, conn).await,
            DeleteStrategy::Hard => self.hard_delete(keys, conn).await,
        }
    }

    /// Stamp the marker on the active row. Already deleted and never existed both yield NotFound.
    pub async fn soft_delete(
        &self,
        keys: &KeyValues,
        conn: Option<&mut PgConnection>,
    ) -> Result<(), AppError> {
        let condition = self.key_condition(keys)?;
        let q = sql::soft_delete(&self.table, &condition, Utc::now())?;
        let affected = execute(&self.pool, conn, &q).await?;
        if affected == 0 {
            return Err(self.keys.not_found(keys));
        }
        Ok(())
    }

    /// Remove the row. A row still referenced elsewhere fails as `Db`, not NotFound: it exists.
    pub async fn hard_delete(
        &self,
        keys: &KeyValues,
        conn: Option<&mut PgConnection>,
    ) -> Result<(), AppError> {
        let condition = self.key_condition(keys)?;
        let q = sql::delete(&self.table, &condition)?;
        let affected = execute(&self.pool, conn, &q).await?;
        if affected == 0 {
            return Err(self.keys.not_found(keys));
        }
        Ok(())
    }
}

/// `marker IS NULL` for soft-deletable tables.
pub(crate) fn active_condition(table: &TableDescription) -> Option<Predicate> {
    table
        .soft_delete_column()
        .map(|c| Predicate::is_null(c.field.clone()))
}

fn bind_all<'q>(sql: &'q str, params: &[BindValue]) -> Query<'q, Postgres, PgArguments> {
    let mut query = sqlx::query(sql);
    for p in params {
        query = query.bind(p.clone());
    }
    query
}

pub(crate) async fn fetch_all(pool: &PgPool, q: &QueryBuf) -> Result<Vec<PgRow>, sqlx::Error> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    bind_all(&q.sql, &q.params).fetch_all(pool).await
}

pub(crate) async fn fetch_count(pool: &PgPool, q: &QueryBuf) -> Result<i64, sqlx::Error> {
    use sqlx::Row;
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let row = bind_all(&q.sql, &q.params).fetch_one(pool).await?;
    row.try_get::<i64, _>("count")
}

pub(crate) async fn fetch_optional(
    pool: &PgPool,
    conn: Option<&mut PgConnection>,
    q: &QueryBuf,
) -> Result<Option<PgRow>, sqlx::Error> {
    let query = bind_all(&q.sql, &q.params);
    match conn {
        Some(conn) => {
            tracing::debug!(sql = %q.sql, params = ?q.params, "query (tx)");
            query.fetch_optional(conn).await
        }
        None => {
            tracing::debug!(sql = %q.sql, params = ?q.params, "query");
            query.fetch_optional(pool).await
        }
    }
}

async fn execute(
    pool: &PgPool,
    conn: Option<&mut PgConnection>,
    q: &QueryBuf,
) -> Result<u64, sqlx::Error> {
    let query = bind_all(&q.sql, &q.params);
    let result = match conn {
        Some(conn) => {
            tracing::debug!(sql = %q.sql, params = ?q.params, "execute (tx)");
            query.execute(conn).await?
        }
        None => {
            tracing::debug!(sql = %q.sql, params = ?q.params, "execute");
            query.execute(pool).await?
        }
    };
    Ok(result.rows_affected())
}

pub(crate) fn row_to_record(row: &PgRow) -> Record {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    map
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(f64::from(n)) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}
