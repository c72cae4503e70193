// handlers/mod.rs - HTTP handlers
//
// Every handler that accepts input follows the same order:
// decode -> validate -> look up -> authorize -> mutate.
// Nothing touches storage until the record has passed validation.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::validation::{SchemaError, SchemaRegistry, Validate};

pub mod tasks;
pub mod users;

/// Register the schema of every request record. Called once at startup.
pub fn schemas() -> Result<SchemaRegistry, SchemaError> {
    SchemaRegistry::new()
        .register::<users::CreateUserRequest>()?
        .register::<users::LoginUserRequest>()?
        .register::<tasks::CreateTaskRequest>()?
        .register::<tasks::UpdateTaskRequest>()?
        .register::<tasks::ListTasksQuery>()
}

/// Validate `record` against its registered schema.
pub(crate) fn validate<R: Validate>(schemas: &SchemaRegistry, record: &R) -> Result<(), ApiError> {
    schemas.get::<R>()?.validate(record)?;
    Ok(())
}

/// GET / - service information
pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Devora Tasks",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "users": "/users, /users/login (public), /users/:id (protected)",
                "tasks": "/tasks[/:id] (protected)",
                "health": "/health (public)",
            }
        }
    }))
}

/// GET /health - storage connectivity
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": { "status": "ok", "timestamp": now, "database": "ok" }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            let err = ApiError::service_unavailable("database unavailable");
            (err.status_code(), Json(err.to_json()))
        }
    }
}
