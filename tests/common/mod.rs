//! Shared fixtures for the PostgreSQL integration tests.

#![allow(dead_code)]

use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tablecrud::Record;

/// Get a unique test prefix for this test run
pub fn test_prefix() -> String {
    format!(
        "test_{}",
        uuid::Uuid::new_v4().to_string().replace('-', "_")[..8].to_lowercase()
    )
}

/// Get the database URL from environment
pub fn get_database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL").ok()
}

/// Connect and run `ddl` (with `{p}` replaced by a fresh prefix). None only when no database is reachable.
pub async fn setup(ddl: &str) -> Option<(PgPool, String)> {
    let db_url = get_database_url()?;
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(&db_url)
        .await
        .ok()?;
    let prefix = test_prefix();
    sqlx::raw_sql(&ddl.replace("{p}", &prefix))
        .execute(&pool)
        .await
        .expect("Should create schema");
    Some((pool, prefix))
}

/// Drop the prefixed tables, dependents first.
pub async fn cleanup(pool: &PgPool, prefix: &str, tables: &[&str]) {
    for t in tables {
        let drop_table = format!("DROP TABLE IF EXISTS \"{}_{}\" CASCADE", prefix, t);
        let _ = sqlx::query(&drop_table).execute(pool).await;
    }
}

pub fn rec(v: Value) -> Record {
    v.as_object().cloned().unwrap_or_default()
}

pub async fn raw_count(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM \"{}\"", table))
        .fetch_one(pool)
        .await
        .unwrap()
}
