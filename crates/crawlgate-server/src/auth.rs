use std::sync::Arc;

use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use crate::dto::ErrorResponse;
use crate::state::AppState;

/// Header carrying the shared secret.
pub const TOKEN_HEADER: &str = "x-token";

/// Middleware that validates the `x-token` header against the configured secret.
///
/// Runs before any body extraction, so unauthenticated requests never reach
/// the translator or the engine.
pub async fn require_token<E: Send + Sync + 'static>(
    State(state): State<Arc<AppState<E>>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let authenticated = request
        .headers()
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|token| bool::from(token.as_bytes().ct_eq(state.api_token.as_bytes())));

    if !authenticated {
        tracing::debug!(path = %request.uri().path(), "Rejected request with missing or invalid token");
        let body = ErrorResponse {
            error: "unauthorized".to_string(),
            message: "Unauthorized".to_string(),
            field: None,
        };
        return (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response();
    }

    next.run(request).await
}
