//! tablecrud: table-driven CRUD services for PostgreSQL.
//!
//! Describe a table once, pair it with a filter map, and get create / find / page / count /
//! update / delete with soft-delete awareness, composite keys and storage error translation.

pub mod case;
pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;

pub use config::{Column, ColumnType, Settings, TableDescription};
pub use error::{AppError, ConfigError, ValidationIssue};
pub use routes::{common_routes, common_routes_with_ready, entity_routes};
pub use service::{
    CrudService, ErrorClassifier, FilterMap, FilterValues, Include, KeyValues, Page, Pagination,
    PgErrorClassifier, Record, RelationalService, RequestValidator, ValidationRule,
    ValidationRules, WriteHook,
};
pub use sql::{IncludeDirection, Predicate};
pub use state::EntityState;
