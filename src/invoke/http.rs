//! HTTP-backed function invoker
//!
//! Posts the request body to the function's invocation endpoint and reads the
//! response back, all under one `tokio::time::timeout` so the configured ceiling
//! bounds the whole exchange, not just connection setup.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use bytes::Bytes;

use crate::config::FunctionConfig;

use super::{FunctionInvoker, InvokeError, InvokeResponse};

pub struct HttpFunctionInvoker {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpFunctionInvoker {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            // Connect timeout stays short; the overall ceiling is enforced per call.
            client: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default(),
            url: url.into(),
            timeout,
        }
    }

    pub fn from_config(config: &FunctionConfig) -> Self {
        Self::new(config.url.clone(), config.timeout())
    }

    async fn send(
        &self,
        body: Bytes,
        content_type: Option<&str>,
    ) -> Result<InvokeResponse, InvokeError> {
        let mut request = self.client.post(&self.url).body(body);
        if let Some(ct) = content_type {
            request = request.header(reqwest::header::CONTENT_TYPE, ct);
        }

        let response = request
            .send()
            .await
            .map_err(|e| InvokeError::Transport(e.to_string()))?;

        let status = StatusCode::from_u16(response.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        let response_content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let body = response
            .bytes()
            .await
            .map_err(|e| InvokeError::Transport(e.to_string()))?;

        Ok(InvokeResponse {
            status,
            content_type: response_content_type,
            body,
        })
    }
}

#[async_trait]
impl FunctionInvoker for HttpFunctionInvoker {
    async fn invoke(
        &self,
        body: Bytes,
        content_type: Option<&str>,
    ) -> Result<InvokeResponse, InvokeError> {
        let started = std::time::Instant::now();
        match tokio::time::timeout(self.timeout, self.send(body, content_type)).await {
            Ok(result) => {
                if let Ok(response) = &result {
                    tracing::debug!(
                        status = %response.status,
                        duration_ms = %started.elapsed().as_millis(),
                        "function invocation completed"
                    );
                }
                result
            }
            Err(_) => {
                // Forced abort: the in-flight request is dropped, never retried here.
                tracing::warn!(
                    timeout_secs = %self.timeout.as_secs(),
                    "function invocation aborted at wall-clock ceiling"
                );
                Err(InvokeError::Timeout {
                    timeout_secs: self.timeout.as_secs(),
                })
            }
        }
    }
}
