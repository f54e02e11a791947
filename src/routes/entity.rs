//! Entity CRUD routes for one service.
//! Item path parameters are named after the primary-key fields, e.g. `/:id` or
//! `/student/:idStudent/event/:idEvent`.

use crate::handlers::entity::{create, delete as delete_handler, list, read, update};
use crate::state::EntityState;
use axum::{routing::get, Router};
use tower_http::limit::RequestBodyLimitLayer;

/// Request bodies above this are rejected with 413.
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

pub fn entity_routes(state: EntityState, collection_path: &str, item_path: &str) -> Router {
    entity_routes_with_limit(state, collection_path, item_path, DEFAULT_BODY_LIMIT)
}

pub fn entity_routes_with_limit(
    state: EntityState,
    collection_path: &str,
    item_path: &str,
    body_limit: usize,
) -> Router {
    Router::new()
        .route(collection_path, get(list).post(create))
        .route(
            item_path,
            get(read).patch(update).put(update).delete(delete_handler),
        )
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Column, ColumnType, TableDescription};
    use crate::service::{CrudService, FilterMap};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    fn app() -> Router {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let table = TableDescription::builder("inscription")
            .column(Column::new("idStudent", ColumnType::Integer))
            .column(Column::new("idEvent", ColumnType::Integer))
            .primary_key(["idStudent", "idEvent"])
            .build()
            .unwrap();
        let svc = CrudService::new(pool, table, FilterMap::new().eq("idStudent")).unwrap();
        entity_routes(
            EntityState::new(svc),
            "/inscriptions",
            "/inscriptions/student/:idStudent/event/:idEvent",
        )
    }

    async fn body_json(resp: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_unparsable_page_is_validation_failure() {
        let resp = app()
            .oneshot(
                Request::get("/inscriptions?page=abc&idStudent=x")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["code"], json!(400));
        assert_eq!(body["message"], json!("Validation failed"));
        assert_eq!(body["errors"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_key_is_validation_failure() {
        let resp = app()
            .oneshot(
                Request::get("/inscriptions/student/abc/event/7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["errors"][0]["field"], json!("idStudent"));
    }

    #[tokio::test]
    async fn test_empty_update_is_bad_request() {
        let resp = app()
            .oneshot(
                Request::patch("/inscriptions/student/9999/event/7")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["message"], json!("update needs at least one field"));
        assert!(body.get("errors").is_none());
    }

    #[tokio::test]
    async fn test_non_object_body_is_bad_request() {
        let resp = app()
            .oneshot(
                Request::post("/inscriptions")
                    .header("content-type", "application/json")
                    .body(Body::from("[1, 2]"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_json_keeps_error_shape() {
        for req in [
            Request::post("/inscriptions")
                .header("content-type", "application/json")
                .body(Body::from("{\"idStudent\": "))
                .unwrap(),
            Request::patch("/inscriptions/student/1/event/7")
                .header("content-type", "application/json")
                .body(Body::from("not json"))
                .unwrap(),
            Request::post("/inscriptions")
                .body(Body::from("{}"))
                .unwrap(),
        ] {
            let resp = app().oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            let body = body_json(resp).await;
            assert_eq!(body["success"], json!(false));
            assert_eq!(body["code"], json!(400));
            assert!(!body["message"].as_str().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_body_limit() {
        let svc_app = {
            let pool = PgPoolOptions::new()
                .connect_lazy("postgres://localhost/unused")
                .unwrap();
            let table = TableDescription::builder("t")
                .column(Column::new("id", ColumnType::Serial).primary_key())
                .build()
                .unwrap();
            let svc = CrudService::new(pool, table, FilterMap::new()).unwrap();
            entity_routes_with_limit(EntityState::new(svc), "/t", "/t/:id", 16)
        };
        let payload = format!("{{\"pad\": \"{}\"}}", "x".repeat(64));
        let resp = svc_app
            .oneshot(
                Request::post("/t")
                    .header("content-type", "application/json")
                    .header("content-length", payload.len())
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_streamed_body_over_limit_keeps_error_shape() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let table = TableDescription::builder("t")
            .column(Column::new("id", ColumnType::Serial).primary_key())
            .build()
            .unwrap();
        let svc = CrudService::new(pool, table, FilterMap::new()).unwrap();
        let app = entity_routes_with_limit(EntityState::new(svc), "/t", "/t/:id", 16);
        let chunks: Vec<Result<String, std::io::Error>> =
            vec![Ok("{\"pad\": \"".to_string()), Ok("x".repeat(64)), Ok("\"}".to_string())];
        let resp = app
            .oneshot(
                Request::post("/t")
                    .header("content-type", "application/json")
                    .body(Body::from_stream(futures::stream::iter(chunks)))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body_json(resp).await["code"], json!(413));
    }

    #[tokio::test]
    async fn test_health_and_version() {
        let resp = crate::routes::common_routes()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!({"status": "ok"}));

        let resp = crate::routes::common_routes()
            .oneshot(Request::get("/version").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(resp).await["name"], json!("tablecrud"));
    }
}
