//! Read-only queries over a root table that eager-load related rows in the same statement.

use crate::config::{TableDescription, DEFAULT_PAGE_SIZE};
use crate::error::{AppError, ConfigError};
use crate::service::crud::{
    active_condition, fetch_all, fetch_count, fetch_optional, row_to_record, Page, Pagination,
    PaginationResult, Record,
};
use crate::service::filters::{build_filters, FilterMap, FilterValues};
use crate::service::keys::{KeyValues, PrimaryKeyResolver};
use crate::sql::{self, IncludeDirection, IncludeSelect, Predicate, Window};
use sqlx::PgPool;
use std::collections::HashSet;

/// Related rows attached to each root row under `name`.
#[derive(Clone, Debug)]
pub struct Include {
    pub name: String,
    pub direction: IncludeDirection,
    pub related: TableDescription,
    /// Field of the root table.
    pub local_field: String,
    /// Field of the related table matched against `local_field`.
    pub foreign_field: String,
}

impl Include {
    /// The root holds the key: at most one related row, `null` when absent.
    pub fn to_one(
        name: impl Into<String>,
        related: TableDescription,
        local_field: impl Into<String>,
        foreign_field: impl Into<String>,
    ) -> Self {
        Include {
            name: name.into(),
            direction: IncludeDirection::ToOne,
            related,
            local_field: local_field.into(),
            foreign_field: foreign_field.into(),
        }
    }

    /// The related table holds the key: an array, empty when nothing matches.
    pub fn to_many(
        name: impl Into<String>,
        related: TableDescription,
        local_field: impl Into<String>,
        foreign_field: impl Into<String>,
    ) -> Self {
        Include {
            name: name.into(),
            direction: IncludeDirection::ToMany,
            related,
            local_field: local_field.into(),
            foreign_field: foreign_field.into(),
        }
    }

    fn check(&self, root: &TableDescription) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidInclude {
            name: self.name.clone(),
            reason,
        };
        if root.column(&self.name).is_some() {
            return Err(invalid(format!("shadows field of {}", root.name())));
        }
        if root.column(&self.local_field).is_none() {
            return Err(invalid(format!(
                "{} is not a field of {}",
                self.local_field,
                root.name()
            )));
        }
        if self.related.column(&self.foreign_field).is_none() {
            return Err(invalid(format!(
                "{} is not a field of {}",
                self.foreign_field,
                self.related.name()
            )));
        }
        Ok(())
    }
}

pub struct RelationalService {
    pool: PgPool,
    root: TableDescription,
    filters: FilterMap,
    keys: PrimaryKeyResolver,
    active: Option<Predicate>,
    includes: Vec<Include>,
    default_page_size: u32,
    max_page_size: Option<u32>,
}

impl RelationalService {
    pub fn new(
        pool: PgPool,
        root: TableDescription,
        filters: FilterMap,
        includes: Vec<Include>,
    ) -> Result<Self, ConfigError> {
        let keys = PrimaryKeyResolver::new(&root)?;
        filters.check_against(&root)?;
        let mut names = HashSet::new();
        for inc in &includes {
            inc.check(&root)?;
            if !names.insert(inc.name.as_str()) {
                return Err(ConfigError::InvalidInclude {
                    name: inc.name.clone(),
                    reason: "declared twice".into(),
                });
            }
        }
        tracing::debug!(
            table = %root.name(),
            includes = ?includes.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(),
            "relational service ready"
        );
        let active = active_condition(&root);
        Ok(RelationalService {
            pool,
            root,
            filters,
            keys,
            active,
            includes,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: None,
        })
    }

    pub fn with_page_limits(mut self, default_page_size: u32, max_page_size: Option<u32>) -> Self {
        self.default_page_size = default_page_size.max(1);
        self.max_page_size = max_page_size.map(|m| m.max(self.default_page_size));
        self
    }

    pub fn table(&self) -> &TableDescription {
        &self.root
    }

    fn filter_condition(&self, values: Option<&FilterValues>) -> Option<Predicate> {
        Predicate::and(
            self.active
                .iter()
                .cloned()
                .chain(build_filters(&self.filters, values)),
        )
    }

    fn include_selects(&self) -> Result<Vec<IncludeSelect<'_>>, AppError> {
        self.includes
            .iter()
            .map(|inc| {
                let our_key = self.root.column(&inc.local_field);
                let their_key = inc.related.column(&inc.foreign_field);
                match (our_key, their_key) {
                    (Some(our_key), Some(their_key)) => Ok(IncludeSelect {
                        name: &inc.name,
                        direction: inc.direction,
                        related: &inc.related,
                        our_key,
                        their_key,
                    }),
                    _ => Err(AppError::Config(ConfigError::InvalidInclude {
                        name: inc.name.clone(),
                        reason: "key field no longer declared".into(),
                    })),
                }
            })
            .collect()
    }

    fn select(
        &self,
        condition: Option<&Predicate>,
        window: Option<Window>,
    ) -> Result<sql::QueryBuf, AppError> {
        let includes = self.include_selects()?;
        sql::select_with_includes(&self.root, condition, window, &includes)
    }

    pub async fn find_one(&self, keys: &KeyValues) -> Result<Record, AppError> {
        let key = self.keys.key_predicate(keys)?;
        let condition = Predicate::and(self.active.iter().cloned().chain(Some(key)));
        let q = self.select(condition.as_ref(), None)?;
        let row = fetch_optional(&self.pool, None, &q).await?;
        row.map(|r| row_to_record(&r))
            .ok_or_else(|| self.keys.not_found(keys))
    }

    pub async fn find_all(&self, filters: Option<&FilterValues>) -> Result<Vec<Record>, AppError> {
        let condition = self.filter_condition(filters);
        let q = self.select(condition.as_ref(), None)?;
        let rows = fetch_all(&self.pool, &q).await?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    pub async fn find_page(
        &self,
        filters: Option<&FilterValues>,
        pagination: Pagination,
    ) -> Result<Page<Record>, AppError> {
        let p = pagination.normalized(self.default_page_size, self.max_page_size);
        let condition = self.filter_condition(filters);
        let page_q = self.select(condition.as_ref(), Some(p.window()))?;
        let count_q = sql::select_count(&self.root, condition.as_ref())?;
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
        let q = sql::select_count(&self.root, condition.as_ref())?;
        Ok(fetch_count(&self.pool, &q).await?)
    }
}
