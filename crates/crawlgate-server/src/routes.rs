use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crawlgate_core::{CrawlEngine, CrawlService, translate};

use crate::auth::require_token;
use crate::dto::{CrawlRequest, CrawlResponse, HealthResponse};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Build the full router with all routes and middleware.
pub fn router<E: CrawlEngine + 'static>(state: Arc<AppState<E>>) -> Router {
    let api = Router::new()
        .route("/crawl", post(crawl::<E>))
        .layer(middleware::from_fn_with_state(state.clone(), require_token::<E>));

    let public = Router::new()
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public.merge(api).with_state(state)
}

// ---------------------------------------------------------------------------
// Crawl
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/crawl",
    request_body = CrawlRequest,
    responses(
        (status = 200, description = "Crawl result", body = CrawlResponse),
        (status = 401, description = "Missing or invalid x-token", body = crate::dto::ErrorResponse),
        (status = 422, description = "Invalid request or extraction schema", body = crate::dto::ErrorResponse),
        (status = 500, description = "Crawl failed", body = crate::dto::ErrorResponse),
    ),
    security(("x-token" = [])),
    tag = "crawl"
)]
pub async fn crawl<E: CrawlEngine + 'static>(
    State(state): State<Arc<AppState<E>>>,
    body: Result<Json<CrawlRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body?;

    let translation = translate(
        &request.url,
        request.browser.unwrap_or_default(),
        request.config.unwrap_or_default(),
    )?;

    let service = CrawlService::new(state.engine.clone());
    let result = service.crawl(&translation).await?;

    Ok(Json(CrawlResponse {
        url: request.url,
        result: serde_json::to_value(&result).map_err(crawlgate_core::AppError::from)?,
    }))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}
