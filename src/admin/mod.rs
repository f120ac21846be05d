//! Registry API.
//!
//! Services announce themselves here and the gateway is the single writer
//! of the registry file. Mutating routes take the `AdminKey` extractor.

pub mod auth;
pub mod handlers;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::http::server::AppState;
use self::handlers::*;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/registry", get(list_registry).post(register_service))
        .route("/registry/{name}", delete(unregister_service))
        .route("/registry/{name}/heartbeat", post(heartbeat))
}
