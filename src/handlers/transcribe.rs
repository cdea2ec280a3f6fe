//! Transcription proxy handler
//!
//! Pure pass-through: the admitted request body goes to the compute function
//! verbatim and the function's response comes back verbatim, status and all.
//! The gateway adds no transformation, no retries, and no interpretation of the
//! payload; the wire contract below belongs to the function.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http_body_util::BodyExt as _;
use serde::{Deserialize, Serialize};

use crate::invoke::InvokeError;
use crate::state::AppState;

/// Request body the transcription function expects.
///
/// Documented here for integrators; the gateway itself never parses it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscribeRequest {
    /// Base64-encoded audio payload.
    pub audio: String,
    /// MIME type of the audio, e.g. `audio/wav`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Original filename; used by the function to infer the container format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Response body the transcription function produces on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscribeResponse {
    pub transcription: String,
    /// Model tier that produced the transcription.
    pub model: String,
    pub file_type: String,
}

/// `POST /transcribe`
///
/// Runs after key authentication and usage-plan admission. Invocation errors map
/// to 502, the wall-clock ceiling to 504; anything the function itself answers,
/// including its own error responses, is relayed unchanged.
pub async fn transcribe_handler(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Response, InvokeError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let body = request
        .into_body()
        .collect()
        .await
        .map_err(|e| InvokeError::Transport(format!("failed to read request body: {e}")))?
        .to_bytes();

    let invoked = state
        .invoker
        .invoke(body, content_type.as_deref())
        .await?;

    Ok(relay(invoked.status, invoked.content_type, invoked.body))
}

fn relay(
    status: axum::http::StatusCode,
    content_type: Option<String>,
    body: Bytes,
) -> Response {
    let mut response = Response::builder().status(status);
    if let Some(ct) = content_type {
        response = response.header(CONTENT_TYPE, ct);
    }
    response
        .body(Body::from(body))
        .unwrap_or_else(|_| status.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_contract_round_trips() {
        let request = TranscribeRequest {
            audio: "UklGRg==".to_string(),
            content_type: Some("audio/wav".to_string()),
            filename: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contentType"], "audio/wav");
        assert!(json.get("filename").is_none());

        let response: TranscribeResponse = serde_json::from_str(
            r#"{"transcription": "hello world", "model": "tiny.en", "fileType": "wav"}"#,
        )
        .unwrap();
        assert_eq!(response.model, "tiny.en");
        assert_eq!(response.file_type, "wav");
    }
}
