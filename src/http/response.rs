//! Response bodies and error mapping for the HTTP pipeline.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// Body of an accepted request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedBody {
    /// Fixed acknowledgement text
    pub message: String,
    /// Absent when the request was let through without consulting the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_in_window: Option<u64>,
}

impl AcceptedBody {
    /// Create the body reporting `remaining_in_window`.
    pub fn new(remaining_in_window: Option<u64>) -> Self {
        Self {
            message: "Request accepted".to_string(),
            remaining_in_window,
        }
    }
}

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human readable reason for the refusal
    pub detail: String,
    /// Remaining quota, only reported on rate limited responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u64>,
}

/// Ways the pipeline can refuse a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Missing or unknown API key
    Unauthorized,
    /// Identity or origin budget exhausted
    RateLimited { remaining: u64 },
    /// A dependency could not be reached
    Unavailable(String),
}

impl ApiError {
    /// HTTP status reported for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            ApiError::Unauthorized => ErrorBody {
                detail: "Invalid or missing API key".to_string(),
                remaining: None,
            },
            ApiError::RateLimited { remaining } => ErrorBody {
                detail: format!("Rate limit exceeded. Remaining requests: {}", remaining),
                remaining: Some(*remaining),
            },
            ApiError::Unavailable(dependency) => ErrorBody {
                detail: format!("Service unavailable: {}", dependency),
                remaining: None,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
