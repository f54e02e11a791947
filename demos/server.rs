//! Demo server: students, events and their inscriptions (composite key), plus users with soft delete.
//!
//! Run with `DATABASE_URL=postgres://... cargo run --example server`.

use async_trait::async_trait;
use axum::Router;
use serde_json::{json, Value};
use tablecrud::{
    common_routes_with_ready, entity_routes, AppError, Column, ColumnType, CrudService,
    EntityState, FilterMap, Include, Predicate, Record, RelationalService, Settings,
    TableDescription, ValidationRule, ValidationRules, WriteHook,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

const SETUP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS student (
    id serial PRIMARY KEY,
    legajo varchar NOT NULL,
    doc varchar NOT NULL,
    name varchar NOT NULL,
    lastname varchar NOT NULL
);
CREATE TABLE IF NOT EXISTS event (
    id serial PRIMARY KEY,
    year integer NOT NULL,
    min_capacity integer NOT NULL,
    max_capacity integer NOT NULL,
    cod varchar NOT NULL,
    duration integer NOT NULL,
    day_of_week integer NOT NULL
);
CREATE TABLE IF NOT EXISTS inscription (
    "idStudent" integer NOT NULL REFERENCES student(id),
    "idEvent" integer NOT NULL REFERENCES event(id),
    PRIMARY KEY ("idStudent", "idEvent")
);
CREATE TABLE IF NOT EXISTS users (
    id serial PRIMARY KEY,
    name varchar NOT NULL,
    email varchar NOT NULL UNIQUE,
    password varchar NOT NULL,
    role varchar NOT NULL,
    deleted_at timestamptz
);
"#;

struct DefaultRole;

#[async_trait]
impl WriteHook for DefaultRole {
    async fn apply(&self, mut data: Record) -> Result<Record, AppError> {
        data.entry("role").or_insert_with(|| json!("user"));
        Ok(data)
    }
}

fn student() -> Result<TableDescription, tablecrud::ConfigError> {
    TableDescription::builder("student")
        .column(Column::new("id", ColumnType::Serial).primary_key())
        .column(Column::new("legajo", ColumnType::Varchar))
        .column(Column::new("doc", ColumnType::Varchar))
        .column(Column::new("name", ColumnType::Varchar))
        .column(Column::new("lastname", ColumnType::Varchar))
        .build()
}

fn event() -> Result<TableDescription, tablecrud::ConfigError> {
    TableDescription::builder("event")
        .column(Column::new("id", ColumnType::Serial).primary_key())
        .column(Column::new("year", ColumnType::Integer))
        .column(Column::new("minCapacity", ColumnType::Integer))
        .column(Column::new("maxCapacity", ColumnType::Integer))
        .column(Column::new("cod", ColumnType::Varchar))
        .column(Column::new("duration", ColumnType::Integer))
        .column(Column::new("dayOfWeek", ColumnType::Integer))
        .snake_case_columns()
        .build()
}

fn inscription() -> Result<TableDescription, tablecrud::ConfigError> {
    TableDescription::builder("inscription")
        .column(Column::new("idStudent", ColumnType::Integer))
        .column(Column::new("idEvent", ColumnType::Integer))
        .primary_key(["idStudent", "idEvent"])
        .build()
}

fn users() -> Result<TableDescription, tablecrud::ConfigError> {
    TableDescription::builder("users")
        .column(Column::new("id", ColumnType::Serial).primary_key())
        .column(Column::new("name", ColumnType::Varchar))
        .column(Column::new("email", ColumnType::Varchar))
        .column(Column::new("password", ColumnType::Varchar))
        .column(Column::new("role", ColumnType::Varchar))
        .column(Column::new("deletedAt", ColumnType::TimestampTz))
        .snake_case_columns()
        .build()
}

fn search(v: &Value) -> Predicate {
    let term = format!("%{}%", v.as_str().unwrap_or_default());
    Predicate::Or(vec![
        Predicate::ilike("name", term.clone()),
        Predicate::ilike("lastname", term),
    ])
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("tablecrud=info".parse()?))
        .init();

    let settings = Settings::from_env()?;
    let pool = settings.connect().await?;
    sqlx::raw_sql(SETUP_SQL).execute(&pool).await?;

    let students = CrudService::new(
        pool.clone(),
        student()?,
        FilterMap::new().eq("legajo").eq("doc").with("search", search),
    )?
    .with_page_limits(settings.default_page_size, settings.max_page_size);

    let events = CrudService::new(
        pool.clone(),
        event()?,
        FilterMap::new()
            .eq("cod")
            .eq("dayOfWeek")
            .gte("minYear", "year")
            .lte("maxYear", "year"),
    )?
    .with_page_limits(settings.default_page_size, settings.max_page_size);

    let inscriptions = CrudService::new(
        pool.clone(),
        inscription()?,
        FilterMap::new().eq("idStudent").eq("idEvent"),
    )?;

    let mut user_rules = ValidationRules::new();
    user_rules.insert("name".into(), ValidationRule::required().length(Some(2), Some(80)));
    user_rules.insert("email".into(), ValidationRule::required().format("email"));
    user_rules.insert("password".into(), ValidationRule::required().length(Some(8), None));
    user_rules.insert(
        "role".into(),
        ValidationRule::default().allowed(vec![json!("admin"), json!("user")]),
    );
    let users = CrudService::new(
        pool.clone(),
        users()?,
        FilterMap::new().ilike("name").eq("role"),
    )?
    .with_create_hook(DefaultRole);

    let student_inscriptions = RelationalService::new(
        pool.clone(),
        inscription()?,
        FilterMap::new().eq("idStudent"),
        vec![
            Include::to_one("student", student()?, "idStudent", "id"),
            Include::to_one("event", event()?, "idEvent", "id"),
        ],
    )?;
    let page = student_inscriptions
        .find_page(None, Default::default())
        .await?;
    tracing::info!(total = page.pagination.total, "inscriptions on startup");

    let api = Router::new()
        .merge(entity_routes(EntityState::new(students), "/students", "/students/:id"))
        .merge(entity_routes(EntityState::new(events), "/events", "/events/:id"))
        .merge(entity_routes(
            EntityState::new(inscriptions),
            "/inscriptions",
            "/inscriptions/student/:idStudent/event/:idEvent",
        ))
        .merge(entity_routes(
            EntityState::new(users).with_rules(user_rules),
            "/users",
            "/users/:id",
        ));

    let app = Router::new()
        .merge(common_routes_with_ready(pool))
        .nest("/api/v1", api);

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
