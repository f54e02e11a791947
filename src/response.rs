//! Response envelopes for the web binding.

use crate::service::{Page, PaginationResult};
use axum::{http::StatusCode, Json};
use serde::Serialize;

/// List body: `{pagination, items, total}`.
#[derive(Serialize, Debug)]
pub struct ListBody<T> {
    pub pagination: PaginationResult,
    pub items: Vec<T>,
    pub total: i64,
}

impl<T> From<Page<T>> for ListBody<T> {
    fn from(page: Page<T>) -> Self {
        ListBody {
            total: page.pagination.total,
            pagination: page.pagination,
            items: page.items,
        }
    }
}

pub fn list<T: Serialize>(page: Page<T>) -> (StatusCode, Json<ListBody<T>>) {
    (StatusCode::OK, Json(ListBody::from(page)))
}

pub fn created<T: Serialize>(item: T) -> (StatusCode, Json<T>) {
    (StatusCode::CREATED, Json(item))
}

pub fn ok<T: Serialize>(item: T) -> (StatusCode, Json<T>) {
    (StatusCode::OK, Json(item))
}
