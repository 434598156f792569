use thiserror::Error;

/// Application-wide error types for crawlgate.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or wrong `x-token`. Carries no detail on purpose.
    #[error("Unauthorized")]
    Unauthorized,

    /// A request field failed its type or range constraint.
    #[error("Invalid value for {field}: {message}")]
    Validation { field: String, message: String },

    /// The extraction schema is malformed.
    #[error("Invalid extraction schema: {0}")]
    Schema(#[from] SchemaError),

    /// Any failure raised by the crawl engine (launch, navigation, rendering).
    #[error("{0}")]
    Engine(String),

    /// The engine did not finish within the page timeout.
    #[error("Crawl timed out after {0} ms")]
    Timeout(u64),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Server misconfiguration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Shorthand for a [`AppError::Validation`] on `field`.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// True for errors raised by the engine boundary rather than by the request.
    pub fn is_engine_failure(&self) -> bool {
        matches!(self, AppError::Engine(_) | AppError::Timeout(_))
    }
}

/// Errors raised while building an extraction schema.
///
/// `path` is the location of the offending node, e.g. `fields[2].fields[0]`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("{path}: unknown field type '{found}'")]
    UnknownType { path: String, found: String },

    #[error("{path}: field of type '{kind}' requires a non-empty 'fields' list")]
    MissingChildren { path: String, kind: String },

    #[error("{path}: field of type 'attribute' requires an 'attribute' name")]
    MissingAttributeName { path: String },

    #[error("{path}: duplicate field name '{name}'")]
    DuplicateName { path: String, name: String },

    #[error("{path}: nesting exceeds {limit} levels")]
    TooDeep { path: String, limit: usize },

    #[error("{path}: {message}")]
    Malformed { path: String, message: String },
}

impl SchemaError {
    /// Path of the node that failed to build.
    pub fn path(&self) -> &str {
        match self {
            SchemaError::UnknownType { path, .. }
            | SchemaError::MissingChildren { path, .. }
            | SchemaError::MissingAttributeName { path }
            | SchemaError::DuplicateName { path, .. }
            | SchemaError::TooDeep { path, .. }
            | SchemaError::Malformed { path, .. } => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_field() {
        let err = AppError::validation("browser.viewport_width", "must be >= 0");
        assert_eq!(
            err.to_string(),
            "Invalid value for browser.viewport_width: must be >= 0"
        );
    }

    #[test]
    fn test_schema_error_converts_and_keeps_path() {
        let err: AppError = SchemaError::MissingAttributeName {
            path: "baseFields[0]".into(),
        }
        .into();
        match &err {
            AppError::Schema(inner) => assert_eq!(inner.path(), "baseFields[0]"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("baseFields[0]"));
    }

    #[test]
    fn test_engine_failures() {
        assert!(AppError::Engine("net::ERR_NAME_NOT_RESOLVED".into()).is_engine_failure());
        assert!(AppError::Timeout(60_000).is_engine_failure());
        assert!(!AppError::Unauthorized.is_engine_failure());
        assert!(!AppError::validation("url", "bad").is_engine_failure());
    }
}
