use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crawlgate_core::error::AppError;

use crate::dto::ErrorResponse;

/// Wrapper so we can implement `IntoResponse` for `AppError`.
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = rejection.body_text();
        let field = match &rejection {
            JsonRejection::JsonDataError(_) => data_error_path(&message).map(str::to_string),
            _ => None,
        };
        Self(AppError::validation(field.unwrap_or_else(|| "body".to_string()), message))
    }
}

/// Path of the offending value in a body that parsed as JSON but did not
/// match the request shape, e.g. `browser.viewport_width`.
///
/// axum renders these as `<prefix>: <path>: <serde message>`; the path part
/// is missing when the error is at the root (such as a missing `url`).
fn data_error_path(message: &str) -> Option<&str> {
    let (_, detail) = message.split_once(": ")?;
    let (path, _) = detail.split_once(": ")?;
    (!path.is_empty() && !path.contains(char::is_whitespace)).then_some(path)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, field) = match &self.0 {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::Validation { field, .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                Some(field.clone()),
            ),
            AppError::Schema(e) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "schema_error",
                Some(e.path().to_string()),
            ),
            AppError::Engine(_) | AppError::Timeout(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "crawl_error", None)
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None),
        };

        let message = match &self.0 {
            // No detail on auth failures.
            AppError::Unauthorized => "Unauthorized".to_string(),
            e if e.is_engine_failure() => format!("Error crawling URL: {e}"),
            e => e.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            field,
        };

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crawlgate_core::SchemaError;
    use http_body_util::BodyExt;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = ApiError(err).into_response();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_validation_maps_to_422_with_field() {
        let (status, json) = render(AppError::validation("browser.viewport_width", "must be >= 0")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["error"], "validation_error");
        assert_eq!(json["field"], "browser.viewport_width");
    }

    #[tokio::test]
    async fn test_schema_error_carries_path() {
        let err = AppError::Schema(SchemaError::MissingAttributeName {
            path: "fields[1]".into(),
        });
        let (status, json) = render(err).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["error"], "schema_error");
        assert_eq!(json["field"], "fields[1]");
    }

    #[tokio::test]
    async fn test_engine_failure_is_generic_500() {
        let (status, json) = render(AppError::Engine("net::ERR_NAME_NOT_RESOLVED".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "crawl_error");
        assert_eq!(json["message"], "Error crawling URL: net::ERR_NAME_NOT_RESOLVED");

        let (_, json) = render(AppError::Timeout(500)).await;
        assert_eq!(json["message"], "Error crawling URL: Crawl timed out after 500 ms");
    }

    #[test]
    fn test_data_error_path() {
        assert_eq!(
            data_error_path(
                "Failed to deserialize the JSON body into the target type: browser.viewport_width: \
                 invalid type: string \"wide\", expected i64 at line 1 column 40"
            ),
            Some("browser.viewport_width")
        );
        assert_eq!(
            data_error_path(
                "Failed to deserialize the JSON body into the target type: missing field `url` at line 1 column 15"
            ),
            None
        );
    }

    #[tokio::test]
    async fn test_unauthorized_has_no_detail() {
        let (status, json) = render(AppError::Unauthorized).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["message"], "Unauthorized");
        assert!(json.get("field").is_none());
    }
}
