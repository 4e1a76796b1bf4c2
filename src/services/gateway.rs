//! Thin HTTP client shared by the platform adapters.
//!
//! Every call is bounded by the configured timeout and produces one tracing
//! record with the method, URL, elapsed time and a masked payload. Outcomes
//! are classified into [`GatewayError`] for the callers to translate.

use std::time::{Duration, Instant};

use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::services::mask::mask_sensitive_data;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Upstream transport failure: {0}")]
    Transport(String),

    #[error("Upstream call timed out: {0}")]
    Timeout(String),

    #[error("Upstream returned status {code}")]
    Status { code: u16, body: String },

    #[error("Upstream response body was malformed: {0}")]
    MalformedBody(String),
}

/// Default translation into the service taxonomy. The linker replaces this
/// with its own mapping for the sync-specific status codes.
impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Transport(detail) => AppError::GatewayUnavailable(detail),
            GatewayError::Timeout(detail) => AppError::GatewayTimeout(detail),
            GatewayError::Status { code, body } => AppError::UpstreamRejected {
                code,
                detail: body,
            },
            GatewayError::MalformedBody(detail) => AppError::MalformedUpstreamResponse(detail),
        }
    }
}

#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(base_url: &str, timeout_seconds: u64) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, GatewayError> {
        let url = self.url(path);
        let request = self.http.get(&url).query(query);
        self.execute("GET", &url, None, request).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, GatewayError> {
        let url = self.url(path);
        let request = self.http.post(&url).json(body);
        self.execute("POST", &url, Some(body), request).await
    }

    pub async fn patch(&self, path: &str, body: &Value) -> Result<Value, GatewayError> {
        let url = self.url(path);
        let request = self.http.patch(&url).json(body);
        self.execute("PATCH", &url, Some(body), request).await
    }

    async fn execute(
        &self,
        method: &str,
        url: &str,
        body: Option<&Value>,
        request: reqwest::RequestBuilder,
    ) -> Result<Value, GatewayError> {
        let started = Instant::now();

        if let Some(payload) = body {
            tracing::debug!(
                method,
                url,
                payload = %mask_sensitive_data(payload),
                "Sending upstream request"
            );
        } else {
            tracing::debug!(method, url, "Sending upstream request");
        }

        let response = request.send().await.map_err(|e| {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            if e.is_timeout() {
                tracing::warn!(method, url, elapsed_ms, "Upstream call timed out");
                GatewayError::Timeout(url.to_string())
            } else {
                tracing::warn!(method, url, elapsed_ms, error = %e, "Upstream call failed");
                GatewayError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            tracing::warn!(
                method,
                url,
                elapsed_ms,
                status = status.as_u16(),
                "Upstream returned error status"
            );
            return Err(GatewayError::Status {
                code: status.as_u16(),
                body: body_text,
            });
        }

        tracing::debug!(
            method,
            url,
            elapsed_ms,
            status = status.as_u16(),
            "Upstream call succeeded"
        );

        let body_text = response
            .text()
            .await
            .map_err(|e| GatewayError::MalformedBody(e.to_string()))?;

        serde_json::from_str(&body_text).map_err(|e| GatewayError::MalformedBody(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn get_parses_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/thing"))
            .and(query_param("limit", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let client = GatewayClient::new(&server.uri(), 5).unwrap();
        let value = client
            .get("/api/thing", &[("limit", "20".to_string())])
            .await
            .unwrap();
        assert_eq!(value["ok"], true);
    }

    #[tokio::test]
    async fn error_status_carries_code_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
            .mount(&server)
            .await;

        let client = GatewayClient::new(&server.uri(), 5).unwrap();
        let err = client.post("/api/sync", &json!({})).await.unwrap_err();
        match err {
            GatewayError::Status { code, body } => {
                assert_eq!(code, 401);
                assert_eq!(body, "bad credentials");
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn non_json_success_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = GatewayClient::new(&server.uri(), 5).unwrap();
        let err = client.get("/api/thing", &[]).await.unwrap_err();
        assert!(matches!(err, GatewayError::MalformedBody(_)));
    }
}
