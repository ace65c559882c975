//! HTTP route definitions and handlers.
//!
//! This module organizes all HTTP endpoints into logical groups:
//! login, sessions, trees, the owner's dashboard, provider information,
//! metrics and health checks.

mod auth_routes;
mod dashboard_routes;
mod health_routes;
mod metrics_routes;
mod provider_routes;
mod session_routes;
mod tree_routes;

use crate::state::AppState;
use axum::Router;

/// Creates the application router with all configured routes.
///
/// Combines all route modules into a single router and attaches
/// the application state for access in handlers.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(auth_routes::routes())
        .merge(session_routes::routes())
        .merge(tree_routes::routes())
        .merge(dashboard_routes::routes())
        .merge(provider_routes::routes())
        .merge(metrics_routes::routes())
        .merge(health_routes::routes())
        .with_state(state)
}
