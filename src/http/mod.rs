//! HTTP request pipeline: authentication, admission, audit and response.

mod auth;
mod handlers;
mod response;
mod server;
mod state;

pub use auth::{require_api_key, ApiKeys, API_KEY_HEADER};
pub use handlers::{limited, liveness, readiness};
pub use response::{AcceptedBody, ApiError};
pub use server::{build_router, HttpServer};
pub use state::AppState;
