//! Storage failure classification into domain errors.

use crate::error::AppError;
use regex::Regex;
use sqlx::postgres::PgDatabaseError;
use std::sync::LazyLock;

static DUPLICATE_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)duplicate key").expect("duplicate key regex is valid"));

static FOREIGN_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)foreign key constraint").expect("foreign key regex is valid")
});

/// Turns a storage failure into a domain error. Never retries.
pub trait ErrorClassifier: Send + Sync {
    fn classify(&self, err: sqlx::Error) -> AppError;
}

/// Rules for PostgreSQL messages: duplicate key first, then foreign key; anything else passes through.
#[derive(Clone, Copy, Debug, Default)]
pub struct PgErrorClassifier;

impl ErrorClassifier for PgErrorClassifier {
    fn classify(&self, err: sqlx::Error) -> AppError {
        let classified = err.as_database_error().and_then(|db| {
            let detail = db
                .try_downcast_ref::<PgDatabaseError>()
                .and_then(|pg| pg.detail());
            classify_message(db.message(), detail)
        });
        match classified {
            Some(domain) => {
                tracing::debug!(error = %err, classified = %domain, "storage error classified");
                domain
            }
            None => {
                tracing::warn!(error = %err, "unclassified storage error");
                AppError::Db(err)
            }
        }
    }
}

/// Pure form of the PostgreSQL rules over a message and its optional DETAIL.
pub fn classify_message(message: &str, detail: Option<&str>) -> Option<AppError> {
    let detail = detail.filter(|d| !d.trim().is_empty());
    if DUPLICATE_KEY.is_match(message) {
        return Some(AppError::duplicate(
            detail.unwrap_or("object already exists"),
        ));
    }
    if FOREIGN_KEY.is_match(message) {
        return Some(AppError::not_found(
            detail.unwrap_or("foreign key object does not exist"),
        ));
    }
    None
}
