//! Router composition
//!
//! The gateway toggle is resolved exactly once, here: `build_router` hands back
//! either the full admission-gated router or a health-only router. No other code
//! consults the toggle.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::trace::TraceLayer;

use crate::handlers::{health_check, transcribe};
use crate::middleware::{admission_middleware, auth_middleware};
use crate::state::AppState;

/// Build the router for this deployment.
///
/// With the gateway enabled the single functional route is
/// `POST /transcribe`, layered (outer to inner) auth → admission → handler, so
/// a request pays for throttle/quota only after its key was accepted. With the
/// gateway disabled there is no HTTP front door at all beyond the health check;
/// the function must be invoked by another mechanism.
pub fn build_router(state: Arc<AppState>) -> Router {
    if state.config.gateway_enabled {
        gateway_router(state)
    } else {
        health_router(state)
    }
}

fn gateway_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/transcribe", post(transcribe::transcribe_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admission_middleware,
        ))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/", get(health_check))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn health_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
