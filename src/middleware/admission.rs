//! Usage-plan admission middleware
//!
//! Applies the active plan's throttle and quota to every authenticated request.
//! Layered after `auth_middleware`: the key identity must already be attached.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::admission::{AdmissionError, KeyIdentity};
use crate::state::AppState;

/// Throttle/quota enforcement for the bound usage plan.
///
/// Rejections are per-request and distinguishable: 429 `throttle_exceeded` for a
/// burst above capacity, 429 `quota_exceeded` (with `retry-after`) once the
/// period's cumulative count is spent.
pub async fn admission_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AdmissionError> {
    // Auth runs first; a missing identity means the layering is wrong, and
    // failing closed is the only safe answer.
    let identity = request
        .extensions()
        .get::<KeyIdentity>()
        .cloned()
        .ok_or(AdmissionError::InvalidKey)?;

    if let Err(e) = state.plan.admit() {
        tracing::warn!(
            key_id = %identity.key_id,
            plan = %state.plan.name(),
            code = %e.code(),
            "request rejected by usage plan"
        );
        return Err(e);
    }

    tracing::debug!(
        key_id = %identity.key_id,
        plan = %state.plan.name(),
        quota_used = %state.plan.quota().used(),
        "request admitted"
    );

    Ok(next.run(request).await)
}
