use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Extension, Json,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::auth::Payload;
use crate::database::{NewTask, Task, TaskChanges};
use crate::gate;
use crate::middleware::{ApiResponse, ApiResult};
use crate::validation::{Schema, SchemaError, Validate};

use super::validate;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: String,
}

impl Validate for CreateTaskRequest {
    fn schema() -> Result<Schema<Self>, SchemaError> {
        Schema::<Self>::builder("create_task")
            .text("title", |r| r.title.as_str(), "required;max=200")
            .text("description", |r| r.description.as_str(), "max=2000")
            .build()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateTaskRequest {
    pub title: String,
    pub description: String,
    pub done: bool,
}

impl Validate for UpdateTaskRequest {
    fn schema() -> Result<Schema<Self>, SchemaError> {
        Schema::<Self>::builder("update_task")
            .text("title", |r| r.title.as_str(), "required;max=200")
            .text("description", |r| r.description.as_str(), "max=2000")
            .boolean("done", |r| r.done, "")
            .build()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListTasksQuery {
    pub limit: i64,
    pub offset: i64,
}

impl Validate for ListTasksQuery {
    fn schema() -> Result<Schema<Self>, SchemaError> {
        Schema::<Self>::builder("list_tasks")
            .integer("limit", |r| r.limit, "required;min=1;max=100")
            .integer("offset", |r| r.offset, "min=0")
            .build()
    }
}

/// POST /tasks - create a task owned by the caller
pub async fn create(
    State(state): State<AppState>,
    Extension(payload): Extension<Payload>,
    body: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> ApiResult<Task> {
    let Json(req) = body?;
    validate(&state.schemas, &req)?;

    let task = state
        .store
        .create_task(NewTask {
            user_id: payload.user_id,
            title: req.title,
            description: req.description,
        })
        .await?;

    tracing::info!(task_id = task.id, user_id = task.user_id, "task created");
    Ok(ApiResponse::created(task))
}

/// GET /tasks?limit=&offset= - the caller's tasks
pub async fn list(
    State(state): State<AppState>,
    Extension(payload): Extension<Payload>,
    query: Result<Query<ListTasksQuery>, QueryRejection>,
) -> ApiResult<Vec<Task>> {
    let Query(query) = query?;
    validate(&state.schemas, &query)?;

    let tasks = state
        .store
        .list_tasks(payload.user_id, query.limit, query.offset)
        .await?;
    Ok(ApiResponse::success(tasks))
}

/// GET /tasks/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(payload): Extension<Payload>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Task> {
    let Path(id) = path?;

    let task = gate::authorize(&payload, state.store.get_task(id).await?)?;
    Ok(ApiResponse::success(task))
}

/// PUT /tasks/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(payload): Extension<Payload>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> ApiResult<Task> {
    let Path(id) = path?;
    let Json(req) = body?;
    validate(&state.schemas, &req)?;

    let task = gate::authorize(&payload, state.store.get_task(id).await?)?;

    let updated = state
        .store
        .update_task(
            task.id,
            TaskChanges {
                title: req.title,
                description: req.description,
                done: req.done,
            },
        )
        .await?;

    tracing::info!(task_id = updated.id, user_id = payload.user_id, "task updated");
    Ok(ApiResponse::success(updated))
}

/// DELETE /tasks/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(payload): Extension<Payload>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<()> {
    let Path(id) = path?;

    let task = gate::authorize(&payload, state.store.get_task(id).await?)?;
    state.store.delete_task(task.id).await?;

    tracing::info!(task_id = task.id, user_id = payload.user_id, "task deleted");
    Ok(ApiResponse::no_content())
}
