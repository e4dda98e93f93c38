//! Route handlers.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tracing::{error, info, instrument, warn};

use super::auth::require_api_key;
use super::response::{AcceptedBody, ApiError};
use super::state::AppState;
use crate::audit::AuditRecord;
use crate::config::FailurePolicy;

/// Origin reported when the peer address is unknown.
const UNKNOWN_ORIGIN: &str = "unknown";

/// Liveness probe.
pub async fn liveness() -> Json<Value> {
    Json(json!({ "status": "alive" }))
}

/// Readiness probe: the counter store must answer a ping.
pub async fn readiness(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.store.ping().await.map_err(|e| {
        warn!(error = %e, "Readiness check failed");
        ApiError::Unavailable(format!("Dependency error: {}", e))
    })?;

    Ok(Json(json!({ "status": "ready" })))
}

/// Rate limited endpoint.
///
/// Authenticates the caller, charges the identity and origin budgets and
/// records the final status to the audit log.
#[instrument(skip_all, fields(endpoint = %request.uri().path()))]
pub async fn limited(State(state): State<AppState>, request: Request<Body>) -> Response {
    let endpoint = request.uri().path().to_string();
    let client_ip = resolve_origin(&request);

    let api_key = match require_api_key(request.headers(), &state.api_keys) {
        Ok(api_key) => api_key,
        Err(err) => {
            warn!(client_ip = %client_ip, "Rejected request with invalid API key");
            return err.into_response();
        }
    };

    let result = admit(&state, &api_key, &client_ip).await;
    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(err) => err.status(),
    };

    let record = AuditRecord::new(&api_key, &client_ip, &endpoint, status.as_u16());
    if let Err(e) = state.audit.record(&record).await {
        error!(error = %e, status = status.as_u16(), "Failed to write audit record");
    }

    match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Run the admission policy and apply the failure policy to store errors.
async fn admit(state: &AppState, api_key: &str, client_ip: &str) -> Result<AcceptedBody, ApiError> {
    match state.policy.check(api_key, client_ip).await {
        Ok(outcome) if outcome.allowed => Ok(AcceptedBody::new(Some(outcome.remaining))),
        Ok(outcome) => {
            info!(client_ip = %client_ip, remaining = outcome.remaining, "Request rate limited");
            Err(ApiError::RateLimited {
                remaining: outcome.remaining,
            })
        }
        Err(err) => match state.failure_policy {
            FailurePolicy::FailOpen => {
                warn!(error = %err, "Counter store unavailable, failing open");
                Ok(AcceptedBody::new(None))
            }
            FailurePolicy::FailClosed => {
                error!(error = %err, "Counter store unavailable, failing closed");
                Err(ApiError::Unavailable("counter store".to_string()))
            }
        },
    }
}

/// Network origin of the request, taken from the peer address.
fn resolve_origin(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_ORIGIN.to_string())
}
