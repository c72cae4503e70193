use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::auth::Payload;
use crate::database::{NewUser, User};
use crate::error::ApiError;
use crate::gate;
use crate::middleware::{ApiResponse, ApiResult};
use crate::validation::{Schema, SchemaError, Validate};

use super::validate;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Validate for CreateUserRequest {
    fn schema() -> Result<Schema<Self>, SchemaError> {
        Schema::<Self>::builder("create_user")
            .text("username", |r| r.username.as_str(), "required;min=3;max=30")
            .text("email", |r| r.email.as_str(), "required;email")
            .text("password", |r| r.password.as_str(), "required;min=8;max=64")
            .build()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginUserRequest {
    pub username: String,
    pub password: String,
}

impl Validate for LoginUserRequest {
    fn schema() -> Result<Schema<Self>, SchemaError> {
        Schema::<Self>::builder("login_user")
            .text("username", |r| r.username.as_str(), "required")
            .text("password", |r| r.password.as_str(), "required")
            .build()
    }
}

#[derive(Debug, Serialize)]
pub struct LoginUserResponse {
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub user: User,
}

/// POST /users - register a new account
pub async fn create(
    State(state): State<AppState>,
    body: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<User> {
    let Json(req) = body?;
    validate(&state.schemas, &req)?;

    let hashed_password = state.passwords.hash(&req.password).await?;

    let user = state
        .store
        .create_user(NewUser {
            username: req.username,
            email: req.email,
            hashed_password,
        })
        .await?;

    tracing::info!(user_id = user.id, username = %user.username, "user registered");
    Ok(ApiResponse::created(user))
}

/// POST /users/login - exchange credentials for an access token
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginUserRequest>, JsonRejection>,
) -> ApiResult<LoginUserResponse> {
    let Json(req) = body?;
    validate(&state.schemas, &req)?;

    let found = state.store.get_user_by_username(&req.username).await?;
    let matched = state
        .passwords
        .verify(&req.password, found.as_ref().map(|u| u.hashed_password.as_str()))
        .await?;

    let user = match found {
        Some(user) if matched => user,
        _ => {
            tracing::warn!(username = %req.username, "login rejected");
            return Err(ApiError::unauthorized("invalid username or password"));
        }
    };

    let (access_token, payload) = state
        .tokens
        .create_token(
            user.id,
            &user.username,
            state.config.security.access_token_duration(),
        )
        .map_err(|e| {
            tracing::error!("Failed to issue access token: {}", e);
            ApiError::internal_server_error("failed to issue access token")
        })?;

    tracing::info!(user_id = user.id, "user logged in");
    Ok(ApiResponse::success(LoginUserResponse {
        access_token,
        access_token_expires_at: payload.expired_at,
        user,
    }))
}

/// GET /users/:id - a user may only read their own profile
pub async fn get(
    State(state): State<AppState>,
    Extension(payload): Extension<Payload>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<User> {
    let Path(id) = path?;

    let user = gate::authorize(&payload, state.store.get_user(id).await?)?;
    Ok(ApiResponse::success(user))
}
