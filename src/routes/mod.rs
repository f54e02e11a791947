//! Route builders.

pub mod common;
pub mod entity;

pub use common::{common_routes, common_routes_with_ready};
pub use entity::{entity_routes, entity_routes_with_limit, DEFAULT_BODY_LIMIT};
