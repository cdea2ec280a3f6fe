//! API key authentication middleware
//!
//! Validates the caller-supplied key before anything else touches the request.
//! Authorization happens here at the gateway, never inside the compute function.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::admission::AdmissionError;
use crate::state::AppState;

/// Extract the API key from a request.
///
/// Supported key sources, in priority order:
/// 1. `x-api-key` header (preferred)
/// 2. `api_key` query parameter (for clients that cannot set headers)
fn extract_key(request: &Request) -> Result<String, AdmissionError> {
    if let Some(header) = request.headers().get("x-api-key") {
        let value = header.to_str().map_err(|_| AdmissionError::InvalidKey)?;
        if !value.is_empty() {
            tracing::debug!("api key extracted from x-api-key header");
            return Ok(value.to_string());
        }
    }

    if let Some(query) = request.uri().query() {
        for pair in query.split('&') {
            if let Some((name, value)) = pair.split_once('=') {
                if name == "api_key" && !value.is_empty() {
                    tracing::debug!("api key extracted from query parameter");
                    return Ok(value.to_string());
                }
            }
        }
    }

    Err(AdmissionError::MissingKey)
}

/// Authentication middleware that validates API keys against the key store.
///
/// The middleware:
/// 1. Extracts the key from the `x-api-key` header or `api_key` query parameter
/// 2. Validates it in constant time against the configured key set
/// 3. Checks the enabled flag and the active usage-plan binding
/// 4. Inserts a [`KeyIdentity`](crate::admission::KeyIdentity) into request
///    extensions on success
/// 5. Returns 403 before the compute function is ever invoked otherwise
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AdmissionError> {
    let request_method = request.method().to_string();
    let request_path = request.uri().path().to_string();

    let key = match extract_key(&request) {
        Ok(key) => key,
        Err(e) => {
            tracing::warn!(
                method = %request_method,
                path = %request_path,
                "request rejected: no api key supplied"
            );
            return Err(e);
        }
    };

    match state.key_store.authenticate(&key) {
        Ok(identity) => {
            tracing::info!(
                method = %request_method,
                path = %request_path,
                key_id = %identity.key_id,
                plan = %identity.plan,
                "api key authentication successful"
            );
            request.extensions_mut().insert(identity);
            Ok(next.run(request).await)
        }
        Err(e) => {
            tracing::warn!(
                method = %request_method,
                path = %request_path,
                "api key authentication failed"
            );
            Err(e)
        }
    }
}
