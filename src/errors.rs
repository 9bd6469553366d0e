use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Standard error body returned by the diagnostics endpoints.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

/// Errors raised by the isolation engine.
///
/// Scoping-path errors (`UnknownEntityType`, `InvalidIsolationMode`) are
/// recovered locally by the enforcer, which falls back to the most
/// restrictive scope instead of propagating. Schema-audit errors are
/// surfaced through health reports, never to end users.
#[derive(Debug, thiserror::Error, Serialize)]
pub enum PolicyError {
    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("Invalid isolation mode: {0}")]
    InvalidIsolationMode(String),

    #[error("Invalid pricing model: {0}")]
    InvalidPricingModel(String),

    #[error("Missing isolation column: {0}")]
    MissingIsolationColumn(String),

    #[error("Schema check timed out after {0}s")]
    SchemaCheckTimeout(u64),

    #[error("Schema check unavailable: {0}")]
    SchemaCheckUnavailable(String),

    #[error("Transfer target references unknown branch: {0}")]
    DanglingBranchReference(Uuid),

    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        DbErr,
    ),
}

impl PolicyError {
    /// Returns the HTTP status code for this error.
    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UnknownEntityType(_)
            | Self::InvalidPricingModel(_)
            | Self::DanglingBranchReference(_) => StatusCode::BAD_REQUEST,
            Self::InvalidIsolationMode(_) | Self::MissingIsolationColumn(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::SchemaCheckTimeout(_) | Self::SchemaCheckUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            _ => self.to_string(),
        }
    }

    /// True when the error concerns the per-query scoping path, where the
    /// enforcer must fall back to `OwnBranchOnly` rather than surface it.
    pub fn is_scoping_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownEntityType(_) | Self::InvalidIsolationMode(_)
        )
    }
}

impl IntoResponse for PolicyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoping_errors_are_flagged() {
        assert!(PolicyError::UnknownEntityType("warranties".into()).is_scoping_error());
        assert!(PolicyError::InvalidIsolationMode("federated".into()).is_scoping_error());
        assert!(!PolicyError::SchemaCheckTimeout(5).is_scoping_error());
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = PolicyError::DatabaseError(DbErr::Custom("password in dsn".into()));
        assert_eq!(err.response_message(), "Database error");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn scoping_errors_keep_their_message() {
        let err = PolicyError::UnknownEntityType("warranties".into());
        assert_eq!(err.response_message(), "Unknown entity type: warranties");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
