//! CDP client implementation
//!
//! This module provides a high-level CDP client with typed methods for common operations.

use super::traits::*;
use super::types::*;
use crate::Error;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// CDP client implementation
#[derive(Debug, Clone)]
pub struct CdpClientImpl {
    /// Underlying CDP connection
    connection: Arc<dyn CdpConnection>,
    /// Budget for `document.readyState` to reach `complete` after navigation
    load_timeout: Duration,
}

impl CdpClientImpl {
    /// Create a new CDP client
    ///
    /// # Arguments
    /// * `connection` - CDP connection instance
    pub fn new(connection: Arc<dyn CdpConnection>) -> Self {
        Self {
            connection,
            load_timeout: Duration::from_secs(30),
        }
    }

    /// Set the page load budget used by `navigate` and `reload`
    pub fn with_load_timeout(mut self, load_timeout: Duration) -> Self {
        self.load_timeout = load_timeout;
        self
    }

    /// Poll `document.readyState` until it is `complete` or the budget runs out
    async fn wait_for_ready_state(&self) -> bool {
        let start = Instant::now();
        let poll_interval = Duration::from_millis(100);

        while start.elapsed() < self.load_timeout {
            tokio::time::sleep(poll_interval).await;

            match self.evaluate("document.readyState", false).await {
                Ok(EvaluationResult::String(state)) if state == "complete" => return true,
                Ok(other) => debug!("Document ready state: {:?}", other),
                Err(e) if e.is_session_fatal() => return false,
                // The execution context is replaced mid-navigation; keep polling.
                Err(e) => debug!("Error checking ready state: {}", e),
            }
        }

        false
    }

    /// Parse remote object value to evaluation result
    fn parse_remote_object(obj: &RemoteObject) -> EvaluationResult {
        match obj.r#type.as_str() {
            "string" => EvaluationResult::String(
                obj.value
                    .as_ref()
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string(),
            ),
            "number" => EvaluationResult::Number(
                obj.value.as_ref().and_then(|v| v.as_f64()).unwrap_or(0.0),
            ),
            "boolean" => EvaluationResult::Bool(
                obj.value.as_ref().and_then(|v| v.as_bool()).unwrap_or(false),
            ),
            "object" if obj.subtype.as_deref() == Some("null") => EvaluationResult::Null,
            "object" => {
                EvaluationResult::Object(obj.value.clone().unwrap_or(serde_json::Value::Null))
            }
            _ => EvaluationResult::Null,
        }
    }
}

#[async_trait]
impl CdpClient for CdpClientImpl {
    /// Get the underlying connection
    fn connection(&self) -> Arc<dyn CdpConnection> {
        Arc::clone(&self.connection)
    }

    /// Navigate to a URL
    async fn navigate(&self, url: &str) -> Result<NavigationResult, Error> {
        info!("Navigating to {}", url);

        let params = NavigateParams {
            url: url.to_string(),
        };

        let result = self
            .call_method("Page.navigate", serde_json::to_value(params)?)
            .await?;

        if let Some(error_text) = result.get("errorText").and_then(|v| v.as_str()) {
            return Err(Error::navigation_failed(format!("{}: {}", url, error_text)));
        }

        let loaded = self.wait_for_ready_state().await;
        if !loaded {
            warn!("Page load polling timed out for {} - continuing anyway", url);
        }

        Ok(NavigationResult {
            url: url.to_string(),
            loaded,
        })
    }

    /// Evaluate JavaScript in the page
    async fn evaluate(&self, script: &str, await_promise: bool) -> Result<EvaluationResult, Error> {
        let params = EvaluateParams {
            expression: script.to_string(),
            await_promise: Some(await_promise),
            return_by_value: Some(true),
        };

        let result = self
            .call_method("Runtime.evaluate", serde_json::to_value(params)?)
            .await?;

        let response: EvaluateResponse = serde_json::from_value(result)
            .map_err(|e| Error::cdp(format!("Failed to parse EvaluateResponse: {}", e)))?;

        if let Some(exception) = response.exception_details {
            return Err(Error::script_execution_failed(
                exception
                    .get("exception")
                    .and_then(|e| e.get("description"))
                    .and_then(|d| d.as_str())
                    .or_else(|| exception.get("text").and_then(|t| t.as_str()))
                    .unwrap_or("Unknown error")
                    .to_string(),
            ));
        }

        Ok(Self::parse_remote_object(&response.result))
    }

    /// Capture a PNG screenshot
    async fn screenshot(&self) -> Result<Vec<u8>, Error> {
        debug!("Capturing screenshot");

        let result = self
            .call_method("Page.captureScreenshot", serde_json::json!({ "format": "png" }))
            .await?;

        let data = result
            .get("data")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::cdp("No data in screenshot result"))?;

        BASE64
            .decode(data)
            .map_err(|e| Error::cdp(format!("Failed to decode screenshot: {}", e)))
    }

    /// Reload the page
    async fn reload(&self, ignore_cache: bool) -> Result<(), Error> {
        info!("Reloading page (ignore_cache: {})", ignore_cache);

        self.call_method("Page.reload", serde_json::json!({ "ignoreCache": ignore_cache }))
            .await?;

        if !self.wait_for_ready_state().await {
            warn!("Page load polling timed out after reload - continuing anyway");
        }

        Ok(())
    }

    /// Enable a domain
    async fn enable_domain(&self, domain: &str) -> Result<(), Error> {
        debug!("Enabling domain: {}", domain);

        let method = format!("{}.enable", domain);
        self.call_method(&method, serde_json::json!({})).await?;

        Ok(())
    }

    /// Call a raw CDP method
    async fn call_method(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value, Error> {
        let response = self.connection.send_command(method, params).await?;

        response.result.ok_or_else(|| Error::cdp("No result in response"))
    }

    /// Subscribe to events
    async fn subscribe_events(&self, event_type: &str) -> Result<tokio::sync::mpsc::Receiver<CdpEvent>, Error> {
        debug!("Subscribing to events: {}", event_type);

        let mut event_receiver = self.connection.listen_events().await?;

        // Filter events by type
        let (tx, rx) = tokio::sync::mpsc::channel(100);
        let filter_event_type = event_type.to_string();

        tokio::spawn(async move {
            while let Some(event) = event_receiver.recv().await {
                if (event.method == filter_event_type || filter_event_type == "*")
                    && tx.send(event).await.is_err()
                {
                    break;
                }
            }
        });

        Ok(rx)
    }
}
