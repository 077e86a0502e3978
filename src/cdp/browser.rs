//! CDP browser control implementation
//!
//! Target discovery goes through the DevTools HTTP endpoints
//! (`/json/version`, `/json/new`, `/json/close`); page traffic goes through a
//! per-target WebSocket connection.

use super::client::CdpClientImpl;
use super::connection::CdpWebSocketConnection;
use super::traits::*;
use crate::Error;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Duration;
use tracing::{debug, info, warn};

/// CDP browser implementation
#[derive(Debug)]
pub struct CdpBrowserImpl {
    /// DevTools HTTP endpoint (e.g., "http://localhost:9222")
    endpoint: String,
    /// Page load budget handed to every client
    load_timeout: Duration,
    /// HTTP client for discovery endpoints
    http: reqwest::Client,
    /// Active connections (target ws url -> connection)
    connections: Mutex<HashMap<String, Arc<dyn CdpConnection>>>,
}

impl CdpBrowserImpl {
    /// Create a new CDP browser controller
    ///
    /// # Arguments
    /// * `endpoint` - DevTools endpoint; `ws://` and `wss://` schemes are
    ///   rewritten to their HTTP equivalents
    pub fn new<S: Into<String>>(endpoint: S) -> Self {
        let endpoint = Self::http_endpoint(&endpoint.into());
        debug!("Creating CDP browser controller for endpoint: {}", endpoint);
        Self {
            endpoint,
            load_timeout: Duration::from_secs(30),
            http: reqwest::Client::new(),
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Set the page load budget used by clients created from this browser
    pub fn with_load_timeout(mut self, load_timeout: Duration) -> Self {
        self.load_timeout = load_timeout;
        self
    }

    /// DevTools HTTP endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn http_endpoint(endpoint: &str) -> String {
        let endpoint = endpoint
            .replacen("ws://", "http://", 1)
            .replacen("wss://", "https://", 1);
        // Browser-level ws URLs carry a /devtools/browser/<id> path.
        match endpoint.find("/devtools/") {
            Some(idx) => endpoint[..idx].to_string(),
            None => endpoint.trim_end_matches('/').to_string(),
        }
    }

    async fn get_json(&self, path: &str) -> Result<serde_json::Value, Error> {
        let url = format!("{}{}", self.endpoint, path);
        debug!("GET {}", url);

        self.http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::http(format!("Failed to reach {}: {}", url, e)))?
            .error_for_status()
            .map_err(|e| Error::http(format!("{} returned an error: {}", url, e)))?
            .json()
            .await
            .map_err(|e| Error::http(format!("Invalid JSON from {}: {}", url, e)))
    }

    fn str_field(json: &serde_json::Value, key: &str) -> String {
        json.get(key)
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string()
    }
}

#[async_trait]
impl CdpBrowser for CdpBrowserImpl {
    /// Create a new CDP client for a target
    async fn create_client(&self, target_ws_url: &str) -> Result<Arc<dyn CdpClient>, Error> {
        info!("Creating CDP client for target: {}", target_ws_url);

        let connection = CdpWebSocketConnection::new(target_ws_url).await?;

        self.connections.lock().await.insert(
            target_ws_url.to_string(),
            Arc::clone(&connection) as Arc<dyn CdpConnection>,
        );

        let client = Arc::new(CdpClientImpl::new(connection).with_load_timeout(self.load_timeout));

        // Page for navigation and dialog events, Runtime for evaluate.
        client.enable_domain("Page").await?;
        client.enable_domain("Runtime").await?;

        Ok(client)
    }

    /// Close every connection opened through this browser
    async fn close(&self) -> Result<(), Error> {
        let mut connections = self.connections.lock().await;
        info!("Closing {} CDP connections on {}", connections.len(), self.endpoint);

        for (target, connection) in connections.drain() {
            if let Err(e) = connection.close().await {
                warn!("Failed to close connection to {}: {}", target, e);
            }
        }

        Ok(())
    }

    /// Get browser version
    async fn get_version(&self) -> Result<BrowserVersion, Error> {
        let version = self.get_json("/json/version").await?;

        Ok(BrowserVersion {
            protocol_version: Self::str_field(&version, "Protocol-Version"),
            product: Self::str_field(&version, "Browser"),
            ws_url: version
                .get("webSocketDebuggerUrl")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
        })
    }

    /// Open a new page target via `/json/new`
    async fn create_target(&self, url: &str) -> Result<TargetInfo, Error> {
        let new_url = format!("{}/json/new?{}", self.endpoint, url);
        debug!("Creating new page via HTTP API: {}", new_url);

        let response = self
            .http
            .put(&new_url)
            .send()
            .await
            .map_err(|e| {
                Error::http(format!(
                    "Failed to connect to DevTools endpoint at {}. Start the browser with \
                     --remote-debugging-port or set CDP_ENDPOINT. Original error: {}",
                    self.endpoint, e
                ))
            })?;

        let target: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::http(format!("Failed to parse new target response: {}", e)))?;

        let ws_url = target
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::http("No webSocketDebuggerUrl in new target response"))?;

        Ok(TargetInfo {
            target_id: Self::str_field(&target, "id"),
            url: Self::str_field(&target, "url"),
            ws_url: ws_url.to_string(),
        })
    }

    /// Close a page target via `/json/close/{id}`
    async fn close_target(&self, target_id: &str) -> Result<(), Error> {
        let url = format!("{}/json/close/{}", self.endpoint, target_id);
        debug!("Closing target via HTTP API: {}", url);

        self.http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::http(format!("Failed to close target {}: {}", target_id, e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_normalisation() {
        assert_eq!(
            CdpBrowserImpl::new("ws://localhost:9222").endpoint(),
            "http://localhost:9222"
        );
        assert_eq!(
            CdpBrowserImpl::new("wss://remote.example.com:9222/").endpoint(),
            "https://remote.example.com:9222"
        );
        assert_eq!(
            CdpBrowserImpl::new("ws://127.0.0.1:9222/devtools/browser/abc").endpoint(),
            "http://127.0.0.1:9222"
        );
        assert_eq!(
            CdpBrowserImpl::new("http://127.0.0.1:9333").endpoint(),
            "http://127.0.0.1:9333"
        );
    }

    #[tokio::test]
    async fn test_version_against_closed_port_is_http_error() {
        let browser = CdpBrowserImpl::new("http://127.0.0.1:1");
        let err = browser.get_version().await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }
}
