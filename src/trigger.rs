//! Webhook trigger client.
//!
//! Sends one JSON POST per call with a bounded timeout and classifies the
//! failure. There are no retries; callers decide whether to try again.
//!
//! # Example
//!
//! ```rust,no_run
//! use guided_workflow::{TriggerClient, TriggerConfig};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), guided_workflow::TriggerError> {
//! let client = TriggerClient::new(
//!     TriggerConfig::new()
//!         .with_endpoint("https://hooks.example.com/webhook/report")
//!         .with_timeout(Duration::from_secs(10)),
//! )?;
//!
//! let response = client
//!     .trigger(&serde_json::json!({"userId": "u1", "recordId": "r1"}))
//!     .await?;
//! assert!(response.success);
//! # Ok(())
//! # }
//! ```

use crate::error::TriggerError;
use crate::submission::CancelSignal;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Endpoint used when no explicit endpoint is configured.
pub const DEFAULT_WEBHOOK_URL: &str = "https://hooks.guided-workflow.dev/webhook/trigger";

/// Environment variable holding the endpoint.
pub const ENDPOINT_ENV: &str = "WORKFLOW_WEBHOOK_URL";

/// Environment variable holding the timeout in seconds.
pub const TIMEOUT_ENV: &str = "WORKFLOW_WEBHOOK_TIMEOUT_SECS";

/// Configuration for the trigger client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Explicit endpoint; falls back to [`DEFAULT_WEBHOOK_URL`].
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Timeout covering the whole call, including reading the body.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

impl TriggerConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self {
            endpoint: None,
            timeout: default_timeout(),
        }
    }

    /// Read the configuration from the environment.
    ///
    /// Missing or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        let mut config = Self::new();
        if let Ok(endpoint) = std::env::var(ENDPOINT_ENV) {
            config.endpoint = Some(endpoint);
        }
        if let Some(secs) = std::env::var(TIMEOUT_ENV)
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }
        config
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The endpoint that will be called.
    pub fn resolved_endpoint(&self) -> &str {
        match self.endpoint.as_deref() {
            Some(endpoint) if !endpoint.trim().is_empty() => endpoint.trim(),
            _ => DEFAULT_WEBHOOK_URL,
        }
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(45)
}

/// A successful webhook response: `{"success": true, ...payload}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub success: bool,

    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

/// HTTP client for the trigger endpoint.
#[derive(Debug, Clone)]
pub struct TriggerClient {
    endpoint: String,
    timeout: Duration,
    client: Client,
}

impl TriggerClient {
    /// Create a client. The endpoint is resolved once, here.
    pub fn new(config: TriggerConfig) -> Result<Self, TriggerError> {
        let client = Client::builder().build().map_err(TriggerError::network)?;

        Ok(Self {
            endpoint: config.resolved_endpoint().to_string(),
            timeout: config.timeout,
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// POST `payload` as JSON and interpret the response.
    pub async fn trigger<T>(&self, payload: &T) -> Result<TriggerResponse, TriggerError>
    where
        T: Serialize + ?Sized,
    {
        self.trigger_with_cancel(payload, &CancelSignal::never())
            .await
    }

    /// Like [`trigger`](Self::trigger), aborting the call when `cancel` fires.
    pub async fn trigger_with_cancel<T>(
        &self,
        payload: &T,
        cancel: &CancelSignal,
    ) -> Result<TriggerResponse, TriggerError>
    where
        T: Serialize + ?Sized,
    {
        tracing::debug!(endpoint = %self.endpoint, "Triggering webhook");

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TriggerError::cancelled()),
            outcome = tokio::time::timeout(self.timeout, self.send(payload)) => match outcome {
                Ok(result) => result,
                Err(_) => Err(TriggerError::timeout()),
            },
        };

        match &result {
            Ok(_) => tracing::debug!(endpoint = %self.endpoint, "Webhook accepted request"),
            Err(err) => tracing::warn!(
                endpoint = %self.endpoint,
                code = ?err.code,
                status = ?err.status_code,
                error = %err.message,
                "Webhook trigger failed"
            ),
        }

        result
    }

    async fn send<T>(&self, payload: &T) -> Result<TriggerResponse, TriggerError>
    where
        T: Serialize + ?Sized,
    {
        let response = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .map_err(TriggerError::network)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TriggerError::http_status(
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown status"),
                body,
            ));
        }

        let body = response.text().await.map_err(TriggerError::network)?;
        let parsed: Value = serde_json::from_str(&body).map_err(|_| TriggerError::invalid_json())?;

        interpret(parsed)
    }
}

/// Turn a parsed body into a response or a business-level error.
fn interpret(body: Value) -> Result<TriggerResponse, TriggerError> {
    match body {
        Value::Object(mut map) if map.get("success") == Some(&Value::Bool(true)) => {
            map.remove("success");
            Ok(TriggerResponse {
                success: true,
                payload: map,
            })
        }
        other => {
            let message = ["error", "message"]
                .iter()
                .find_map(|key| {
                    other
                        .get(*key)
                        .and_then(Value::as_str)
                        .filter(|m| !m.trim().is_empty())
                })
                .unwrap_or("Webhook reported a failure")
                .to_string();
            Err(TriggerError::webhook(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::CancelHandle;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/hook", addr)
    }

    fn client(endpoint: &str) -> TriggerClient {
        TriggerClient::new(TriggerConfig::new().with_endpoint(endpoint)).unwrap()
    }

    #[test]
    fn test_endpoint_fallback() {
        assert_eq!(TriggerConfig::new().resolved_endpoint(), DEFAULT_WEBHOOK_URL);
        assert_eq!(
            TriggerConfig::new().with_endpoint("  ").resolved_endpoint(),
            DEFAULT_WEBHOOK_URL
        );
        assert_eq!(
            TriggerConfig::new().with_endpoint("http://x/hook").resolved_endpoint(),
            "http://x/hook"
        );
        assert_eq!(TriggerConfig::default().timeout, Duration::from_secs(45));
    }

    #[tokio::test]
    async fn test_success_echoes_payload() {
        let url = serve(Router::new().route(
            "/hook",
            post(|Json(body): Json<Value>| async move {
                Json(json!({"success": true, "jobId": "job-1", "echo": body["recordId"]}))
            }),
        ))
        .await;

        let response = client(&url)
            .trigger(&json!({"userId": "u1", "recordId": "r1"}))
            .await
            .unwrap();

        assert!(response.success);
        assert_eq!(response.payload["jobId"], json!("job-1"));
        assert_eq!(response.payload["echo"], json!("r1"));
    }

    #[tokio::test]
    async fn test_non_2xx_status() {
        let url = serve(Router::new().route(
            "/hook",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        ))
        .await;

        let err = client(&url).trigger(&json!({})).await.unwrap_err();
        assert_eq!(err.status_code, Some(500));
        assert_eq!(err.code.as_deref(), Some("boom"));
        assert_eq!(err.message, "Webhook request failed: Internal Server Error");
    }

    #[tokio::test]
    async fn test_invalid_json() {
        let url = serve(Router::new().route("/hook", post(|| async { "not json" }))).await;

        let err = client(&url).trigger(&json!({})).await.unwrap_err();
        assert_eq!(err.code.as_deref(), Some("INVALID_JSON"));
        assert_eq!(err.status_code, Some(502));
    }

    #[tokio::test]
    async fn test_logical_failure_despite_http_success() {
        let url = serve(Router::new().route(
            "/hook",
            post(|| async { Json(json!({"success": false, "error": "quota exceeded"})) }),
        ))
        .await;

        let err = client(&url).trigger(&json!({})).await.unwrap_err();
        assert_eq!(err.code.as_deref(), Some("WEBHOOK_ERROR"));
        assert_eq!(err.message, "quota exceeded");
    }

    #[tokio::test]
    async fn test_timeout() {
        let url = serve(Router::new().route(
            "/hook",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({"success": true}))
            }),
        ))
        .await;

        let client = TriggerClient::new(
            TriggerConfig::new()
                .with_endpoint(url)
                .with_timeout(Duration::from_millis(200)),
        )
        .unwrap();

        let err = client.trigger(&json!({})).await.unwrap_err();
        assert_eq!(err.code.as_deref(), Some("TIMEOUT"));
        assert_eq!(err.status_code, Some(408));
    }

    #[tokio::test]
    async fn test_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(&format!("http://{}/hook", addr))
            .trigger(&json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.code.as_deref(), Some("NETWORK_ERROR"));
        assert!(err.message.starts_with("Network error: "));
    }

    #[tokio::test]
    async fn test_cancel_aborts_call() {
        let url = serve(Router::new().route(
            "/hook",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({"success": true}))
            }),
        ))
        .await;

        let handle = CancelHandle::new();
        let signal = handle.signal();
        let client = client(&url);
        let call = tokio::spawn(async move { client.trigger_with_cancel(&json!({}), &signal).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();

        let err = call.await.unwrap().unwrap_err();
        assert_eq!(err.code.as_deref(), Some("CANCELLED"));
    }

    #[test]
    fn test_interpret_fallback_message() {
        let err = interpret(json!({"success": false, "message": "bad input"})).unwrap_err();
        assert_eq!(err.message, "bad input");

        let err = interpret(json!({"success": false, "error": "  ", "message": "bad input"}))
            .unwrap_err();
        assert_eq!(err.message, "bad input");

        let err = interpret(json!([1, 2])).unwrap_err();
        assert_eq!(err.code.as_deref(), Some("WEBHOOK_ERROR"));
        assert_eq!(err.message, "Webhook reported a failure");
    }
}
