use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::{PasswordHasher, TokenMaker};
use crate::config::{AppConfig, SecurityConfig};
use crate::database::Store;
use crate::handlers::{self, tasks, users};
use crate::middleware::require_auth;
use crate::validation::SchemaRegistry;

/// Everything a handler needs, built once by the entry point and handed down.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub tokens: Arc<dyn TokenMaker>,
    pub passwords: PasswordHasher,
    pub schemas: Arc<SchemaRegistry>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn Store>,
        tokens: Arc<dyn TokenMaker>,
        passwords: PasswordHasher,
        schemas: SchemaRegistry,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            tokens,
            passwords,
            schemas: Arc::new(schemas),
        }
    }
}

pub fn app(state: AppState) -> Router {
    let body_limit = state.config.api.max_request_size_bytes;
    let cors = cors_layer(&state.config.security);

    Router::new()
        // Public
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .merge(user_public_routes())
        // Protected
        .merge(protected_routes(state.clone()))
        // Global middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn user_public_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(users::create))
        .route("/users/login", post(users::login))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/users/:id", get(users::get))
        .route("/tasks", post(tasks::create).get(tasks::list))
        .route(
            "/tasks/:id",
            get(tasks::get).put(tasks::update).delete(tasks::delete),
        )
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if security.cors_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::CONTENT_LENGTH,
            header::ACCEPT_ENCODING,
        ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtMaker;
    use crate::database::MemoryStore;
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    fn test_router() -> Router {
        let config = AppConfig::development();
        let tokens = JwtMaker::new(&config.security.token_symmetric_key).unwrap();
        let state = AppState::new(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(tokens),
            PasswordHasher::new(4).unwrap(),
            handlers::schemas().unwrap(),
        );
        app(state)
    }

    #[tokio::test]
    async fn preflight_allows_configured_origin() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/tasks")
            .header(header::ORIGIN, "http://localhost:5173")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();

        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("http://localhost:5173"))
        );
    }

    #[tokio::test]
    async fn protected_route_without_token_is_unauthorized() {
        let request = Request::builder()
            .uri("/tasks?limit=10")
            .body(Body::empty())
            .unwrap();

        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let request = Request::builder().uri("/nope").body(Body::empty()).unwrap();

        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
