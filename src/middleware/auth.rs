use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::error::{ApiError, UNAUTHENTICATED};

const AUTHORIZATION_TYPE_BEARER: &str = "bearer";

/// Bearer token middleware: verifies the token and injects its [`Payload`](crate::auth::Payload)
/// into the request extensions for the handler.
pub async fn require_auth(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(&headers).map_err(|reason| {
        tracing::debug!("Rejected authorization header: {}", reason);
        ApiError::unauthorized(UNAUTHENTICATED)
    })?;

    let payload = state.tokens.verify_token(token)?;
    tracing::debug!(user_id = payload.user_id, "request authenticated");

    request.extensions_mut().insert(payload);
    Ok(next.run(request).await)
}

/// Extract the token from an `Authorization: Bearer <token>` header
fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, &'static str> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or("authorization header is not provided")?;

    let value = header
        .to_str()
        .map_err(|_| "invalid authorization header format")?;

    let fields: Vec<&str> = value.split_whitespace().collect();
    let [scheme, token] = fields.as_slice() else {
        return Err("invalid authorization header format");
    };

    if !scheme.eq_ignore_ascii_case(AUTHORIZATION_TYPE_BEARER) {
        return Err("unsupported authorization type");
    }

    Ok(*token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(value).unwrap(),
        );
        headers
    }

    #[test]
    fn bearer_token_is_extracted() {
        assert_eq!(extract_bearer_token(&headers("Bearer abc.def")), Ok("abc.def"));
        assert_eq!(extract_bearer_token(&headers("bearer abc.def")), Ok("abc.def"));
    }

    #[test]
    fn missing_or_malformed_header_is_rejected() {
        assert!(extract_bearer_token(&HeaderMap::new()).is_err());
        assert!(extract_bearer_token(&headers("Bearer")).is_err());
        assert!(extract_bearer_token(&headers("Bearer a b")).is_err());
        assert_eq!(
            extract_bearer_token(&headers("Basic dXNlcjpwYXNz")),
            Err("unsupported authorization type")
        );
    }
}
