//! Seams of the DevTools layer
//!
//! [`CdpConnection`] moves JSON-RPC frames, [`CdpClient`] turns them into the
//! few page operations the session needs, and [`CdpBrowser`] owns target
//! discovery over the HTTP endpoints.

use crate::Error;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Unsolicited message pushed by the browser
#[derive(Debug, Clone)]
pub struct CdpEvent {
    /// e.g. "Page.javascriptDialogOpening"
    pub method: String,
    pub params: Value,
}

/// Reply to one command, matched by id
#[derive(Debug, Clone)]
pub struct CdpResponse {
    pub id: u64,
    pub result: Option<Value>,
    pub error: Option<CdpError>,
}

/// Protocol-level failure reported by the browser
#[derive(Debug, Clone)]
pub struct CdpError {
    pub code: i32,
    pub message: String,
}

/// One WebSocket to one page target
#[async_trait]
pub trait CdpConnection: Send + Sync + std::fmt::Debug {
    /// Send `method` and wait for the matching reply
    async fn send_command(&self, method: &str, params: Value) -> Result<CdpResponse, Error>;

    /// New receiver for every event arriving from now on
    async fn listen_events(&self) -> Result<mpsc::Receiver<CdpEvent>, Error>;

    async fn close(&self) -> Result<(), Error>;

    fn is_active(&self) -> bool;
}

/// Page-level operations on top of a connection
#[async_trait]
pub trait CdpClient: Send + Sync + std::fmt::Debug {
    fn connection(&self) -> Arc<dyn CdpConnection>;

    /// Navigate and poll `document.readyState` within the load budget
    async fn navigate(&self, url: &str) -> Result<NavigationResult, Error>;

    /// Evaluate an expression, returning the result by value
    async fn evaluate(&self, script: &str, await_promise: bool) -> Result<EvaluationResult, Error>;

    /// PNG bytes of the current viewport
    async fn screenshot(&self) -> Result<Vec<u8>, Error>;

    async fn reload(&self, ignore_cache: bool) -> Result<(), Error>;

    /// Send `<domain>.enable`
    async fn enable_domain(&self, domain: &str) -> Result<(), Error>;

    /// Raw command; protocol errors become [`Error::Cdp`]
    async fn call_method(&self, method: &str, params: Value) -> Result<Value, Error>;

    /// Events named `event_type`, or all of them for `"*"`
    async fn subscribe_events(&self, event_type: &str) -> Result<mpsc::Receiver<CdpEvent>, Error>;
}

#[derive(Debug, Clone)]
pub struct NavigationResult {
    pub url: String,
    /// `false` when the ready state never reached `complete`
    pub loaded: bool,
}

/// Value produced by `Runtime.evaluate`
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationResult {
    String(String),
    Number(f64),
    Bool(bool),
    /// `null` and `undefined`
    Null,
    /// Objects and arrays, as JSON
    Object(Value),
}

impl EvaluationResult {
    pub fn into_value(self) -> Value {
        match self {
            EvaluationResult::String(s) => Value::String(s),
            EvaluationResult::Number(n) => serde_json::json!(n),
            EvaluationResult::Bool(b) => Value::Bool(b),
            EvaluationResult::Null => Value::Null,
            EvaluationResult::Object(v) => v,
        }
    }
}

/// Browser reachable through its DevTools HTTP endpoint
#[async_trait]
pub trait CdpBrowser: Send + Sync + std::fmt::Debug {
    /// Connect to a page target and enable the domains the session listens on
    async fn create_client(&self, target_ws_url: &str) -> Result<Arc<dyn CdpClient>, Error>;

    /// Close every connection opened through this browser
    async fn close(&self) -> Result<(), Error>;

    async fn get_version(&self) -> Result<BrowserVersion, Error>;

    async fn create_target(&self, url: &str) -> Result<TargetInfo, Error>;

    async fn close_target(&self, target_id: &str) -> Result<(), Error>;
}

/// Answer of `/json/version`
#[derive(Debug, Clone)]
pub struct BrowserVersion {
    pub protocol_version: String,
    /// e.g. "Chrome/120.0.6099.109"
    pub product: String,
    pub ws_url: Option<String>,
}

/// Page target opened through `/json/new`
#[derive(Debug, Clone)]
pub struct TargetInfo {
    pub target_id: String,
    pub url: String,
    pub ws_url: String,
}
