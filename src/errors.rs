use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
#[derive(Debug)]
pub enum AppError {
    /// Database-related errors.
    DatabaseError(sqlx::Error),
    /// Resource not found error.
    NotFound(String),
    /// Bad request error (invalid input).
    BadRequest(String),
    /// Error interacting with an external API.
    ExternalApiError(String),
    /// Internal server error.
    InternalError(String),
    /// Unauthorized access error.
    Unauthorized(String),
    /// Verification facet name is not one of the supported facets.
    InvalidFacet(String),
    /// An SMS or email delivery collaborator failed.
    DeliveryFailure(String),
    /// Submitted OTP code does not match the issued challenge.
    OtpMismatch,
    /// OTP confirmation attempted with no challenge pending for the session.
    NoChallengeInProgress,
    /// Share recipient email is not syntactically valid.
    InvalidRecipient(String),
    /// Share token is malformed or was never issued.
    TokenNotFound,
    /// Share token exists but its validity window has passed.
    TokenExpired,
    /// Required request fields are empty or out of range.
    MissingField(Vec<String>),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(e) => write!(f, "Database error: {}", e),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::ExternalApiError(msg) => write!(f, "External API error: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::InvalidFacet(facet) => write!(f, "Invalid verification facet: {}", facet),
            AppError::DeliveryFailure(msg) => write!(f, "Delivery failure: {}", msg),
            AppError::OtpMismatch => write!(f, "Invalid verification code"),
            AppError::NoChallengeInProgress => write!(f, "No verification in progress"),
            AppError::InvalidRecipient(email) => write!(f, "Invalid recipient email: {}", email),
            AppError::TokenNotFound => write!(f, "Invalid share token"),
            AppError::TokenExpired => write!(f, "This link has expired"),
            AppError::MissingField(fields) => {
                write!(f, "Missing or invalid fields: {}", fields.join(", "))
            }
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Maps each error variant to an appropriate HTTP status code and JSON body.
    /// Logs errors appropriately based on their severity.
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::DatabaseError(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::ExternalApiError(msg) => {
                tracing::error!("External API error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "External service error".to_string(),
                )
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Unauthorized(msg) => {
                tracing::warn!("Unauthorized access: {}", msg);
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            AppError::InvalidFacet(facet) => (
                StatusCode::BAD_REQUEST,
                format!("Invalid verification facet: {}", facet),
            ),
            AppError::DeliveryFailure(msg) => {
                tracing::error!("Delivery failure: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "Failed to deliver verification code".to_string(),
                )
            }
            AppError::OtpMismatch => (
                StatusCode::BAD_REQUEST,
                "Invalid verification code".to_string(),
            ),
            AppError::NoChallengeInProgress => (
                StatusCode::BAD_REQUEST,
                "No verification in progress".to_string(),
            ),
            AppError::InvalidRecipient(email) => (
                StatusCode::BAD_REQUEST,
                format!("Invalid recipient email: {}", email),
            ),
            AppError::TokenNotFound => {
                (StatusCode::NOT_FOUND, "Invalid share token".to_string())
            }
            AppError::TokenExpired => {
                (StatusCode::BAD_REQUEST, "This link has expired".to_string())
            }
            AppError::MissingField(fields) => (
                StatusCode::BAD_REQUEST,
                format!("Missing or invalid fields: {}", fields.join(", ")),
            ),
            AppError::WithContext { source, context } => {
                // Log full context chain for debugging
                tracing::error!("Error with context: {} -> {}", context, source);
                // Delegate to underlying error's response
                return source.clone().into_response();
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

// Make AppError cloneable for WithContext variant
impl Clone for AppError {
    /// Clones the error.
    ///
    /// Note: `sqlx::Error` is not cloneable, so `DatabaseError` is simplified to `RowNotFound` during cloning.
    fn clone(&self) -> Self {
        match self {
            AppError::DatabaseError(_e) => AppError::DatabaseError(sqlx::Error::RowNotFound), // Simplified clone
            AppError::NotFound(msg) => AppError::NotFound(msg.clone()),
            AppError::BadRequest(msg) => AppError::BadRequest(msg.clone()),
            AppError::ExternalApiError(msg) => AppError::ExternalApiError(msg.clone()),
            AppError::InternalError(msg) => AppError::InternalError(msg.clone()),
            AppError::Unauthorized(msg) => AppError::Unauthorized(msg.clone()),
            AppError::InvalidFacet(facet) => AppError::InvalidFacet(facet.clone()),
            AppError::DeliveryFailure(msg) => AppError::DeliveryFailure(msg.clone()),
            AppError::OtpMismatch => AppError::OtpMismatch,
            AppError::NoChallengeInProgress => AppError::NoChallengeInProgress,
            AppError::InvalidRecipient(email) => AppError::InvalidRecipient(email.clone()),
            AppError::TokenNotFound => AppError::TokenNotFound,
            AppError::TokenExpired => AppError::TokenExpired,
            AppError::MissingField(fields) => AppError::MissingField(fields.clone()),
            AppError::WithContext { source, context } => AppError::WithContext {
                source: source.clone(),
                context: context.clone(),
            },
        }
    }
}

impl From<sqlx::Error> for AppError {
    /// Converts a `sqlx::Error` into an `AppError`.
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err)
    }
}

impl From<reqwest::Error> for AppError {
    /// Converts a `reqwest::Error` into an `AppError`.
    fn from(err: reqwest::Error) -> Self {
        AppError::ExternalApiError(err.to_string())
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    #[allow(dead_code)]
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

/// Extension for sqlx::Error to add context
impl<T> ResultExt<T> for Result<T, sqlx::Error> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::DatabaseError(e)),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::DatabaseError(e)),
            context: f(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = AppError::DeliveryFailure("SMS gateway timeout".to_string());
        let display = format!("{}", error);
        assert!(display.contains("Delivery failure"));
        assert!(display.contains("SMS gateway timeout"));

        let error = AppError::TokenExpired;
        assert_eq!(format!("{}", error), "This link has expired");

        let error = AppError::MissingField(vec!["rating".to_string(), "comment".to_string()]);
        let display = format!("{}", error);
        assert!(display.contains("rating"));
        assert!(display.contains("comment"));
    }

    #[test]
    fn test_context_chain() {
        let base: Result<(), AppError> = Err(AppError::TokenNotFound);
        let wrapped = base.context("resolving share");
        let display = format!("{}", wrapped.unwrap_err());
        assert!(display.contains("resolving share"));
        assert!(display.contains("Invalid share token"));
    }
}
