//! HTTP error payloads and mapping from domain errors.
//!
//! Keeps the domain free of transport concerns: the translation from
//! [`Error`] variants to status codes and the `{success, message}` failure
//! envelope happens here, with the ambient trace identifier attached.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use tracing::error;

use crate::domain::Error;
use crate::middleware::TraceId;
use crate::middleware::trace::TRACE_ID_HEADER;

use super::response::ApiResponse;

/// Transport-level error produced from a domain failure.
#[derive(Debug, Clone)]
pub struct ApiError {
    error: Error,
    trace_id: Option<String>,
}

impl ApiError {
    /// Capture the ambient trace identifier alongside the domain failure.
    #[must_use]
    pub fn from_domain(error: Error) -> Self {
        Self {
            error,
            trace_id: TraceId::current().map(|id| id.to_string()),
        }
    }

    /// Shorthand for a validation failure raised at the HTTP boundary.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::from_domain(Error::validation(message))
    }

    fn to_status_code(&self) -> StatusCode {
        match self.error {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(value: Error) -> Self {
        Self::from_domain(value)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for ApiError {}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.to_status_code()
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        if let Some(id) = &self.trace_id {
            builder.insert_header((TRACE_ID_HEADER, id.clone()));
        }
        // Store internals stay in the logs, not in client payloads.
        let message = if matches!(self.error, Error::Internal(_)) {
            error!(error = %self.error, "internal error surfaced to client");
            "Internal server error".to_owned()
        } else {
            self.error.to_string()
        };
        builder.json(ApiResponse::<()>::failure(message))
    }
}

/// Convenience alias for HTTP handlers.
pub type ApiResult<T> = Result<T, ApiError>;
