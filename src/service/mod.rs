//! Table services: filters, key resolution, error classification, CRUD and relational reads.

pub mod classify;
mod crud;
pub mod filters;
pub mod keys;
mod relational;
mod validation;

pub use classify::{classify_message, ErrorClassifier, PgErrorClassifier};
pub use crud::{
    CrudService, DeleteStrategy, Page, Pagination, PaginationResult, Record, WriteHook,
};
pub use filters::{build_filters, FilterMap, FilterValues};
pub use keys::{KeyValues, PrimaryKeyResolver};
pub use relational::{Include, RelationalService};
pub use validation::{RequestValidator, ValidationRule, ValidationRules};
