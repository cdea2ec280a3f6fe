//! Request admission: API keys and usage plans
//!
//! Everything that decides whether a request may reach the compute function lives
//! here. Admission is two independent gates applied in order:
//!
//! 1. **Key check** ([`KeyStore`]): the caller-supplied API key must be known,
//!    enabled, and bound to the deployment's active usage plan. Possession of *a*
//!    key is not sufficient.
//! 2. **Usage plan** ([`UsagePlan`]): a token-bucket throttle (steady rate + burst)
//!    and a period quota, enforced independently. Throttle rejections are instant
//!    and do not consume quota; quota rejections persist until the period rolls over.
//!
//! Both gates are process-wide shared state and safe under arbitrary concurrent
//! access; every request against a plan contends on the same bucket and counter.

pub mod api_key;
pub mod usage_plan;

pub use api_key::{ApiKey, KeyIdentity, KeyStore};
pub use usage_plan::{QuotaCounter, Throttle, UsagePlan};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Per-request admission failures.
///
/// These are non-fatal to the system: each request fails independently and the
/// gateway returns a distinguishable rejection instead of forwarding.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// No API key was supplied in the header or query parameter.
    #[error("missing api key")]
    MissingKey,

    /// The supplied key is unknown, disabled, or not bound to the active plan.
    /// The response body does not distinguish these; logs do.
    #[error("invalid api key")]
    InvalidKey,

    /// The token bucket is empty: instantaneous rate above the configured burst.
    #[error("throttle exceeded")]
    ThrottleExceeded,

    /// The period quota is spent; admission resumes at period rollover.
    #[error("quota exceeded, retry in {retry_after_secs}s")]
    QuotaExceeded { retry_after_secs: u64 },
}

impl AdmissionError {
    /// Stable machine-readable code carried in the rejection body.
    pub fn code(&self) -> &'static str {
        match self {
            AdmissionError::MissingKey => "missing_key",
            AdmissionError::InvalidKey => "invalid_key",
            AdmissionError::ThrottleExceeded => "throttle_exceeded",
            AdmissionError::QuotaExceeded { .. } => "quota_exceeded",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AdmissionError::MissingKey | AdmissionError::InvalidKey => StatusCode::FORBIDDEN,
            AdmissionError::ThrottleExceeded | AdmissionError::QuotaExceeded { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
        }
    }
}

impl IntoResponse for AdmissionError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Key failures get a constant body: nothing in the response distinguishes
        // an unknown key from a disabled or unbound one.
        let message = match &self {
            AdmissionError::MissingKey | AdmissionError::InvalidKey => "Forbidden".to_string(),
            other => other.to_string(),
        };
        let body = Json(serde_json::json!({
            "error": { "code": self.code(), "message": message }
        }));

        let mut response = (status, body).into_response();
        if let AdmissionError::QuotaExceeded { retry_after_secs } = self {
            if let Ok(value) = retry_after_secs.to_string().parse() {
                response.headers_mut().insert(http::header::RETRY_AFTER, value);
            }
        }
        response
    }
}
