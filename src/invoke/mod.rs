//! Compute function invocation
//!
//! The transcription handler is an opaque collaborator behind a fixed
//! request/response contract: the gateway hands it the request body verbatim and
//! relays whatever comes back, successful or not. The only policy this layer adds
//! is the hard wall-clock ceiling; there are no retries at this level.

mod http;

pub use http::HttpFunctionInvoker;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use thiserror::Error;

/// Per-invocation failures.
///
/// These cover only the transport to the function. An error *response* from the
/// function (4xx/5xx) is not an `InvokeError`: it is relayed verbatim.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The invocation exceeded the configured wall-clock ceiling and was aborted.
    #[error("function invocation timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The function endpoint could not be reached or the response could not be read.
    #[error("function invocation failed: {0}")]
    Transport(String),
}

impl IntoResponse for InvokeError {
    fn into_response(self) -> Response {
        let status = match self {
            InvokeError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            InvokeError::Transport(_) => StatusCode::BAD_GATEWAY,
        };
        let body = Json(serde_json::json!({
            "error": { "code": "invocation_failed", "message": self.to_string() }
        }));
        (status, body).into_response()
    }
}

/// Verbatim response from the compute function.
#[derive(Debug, Clone)]
pub struct InvokeResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Invocation seam between the gateway and the compute function.
///
/// Implementations must enforce the wall-clock ceiling themselves and must not
/// transform the payload in either direction.
#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    async fn invoke(
        &self,
        body: Bytes,
        content_type: Option<&str>,
    ) -> Result<InvokeResponse, InvokeError>;
}
