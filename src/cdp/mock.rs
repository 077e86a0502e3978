//! Mock CDP connection for testing
//!
//! Records every command it receives and answers from a list of scripted
//! rules, so the client and session layers can be exercised without a
//! browser.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::cdp::traits::*;
use crate::Error;

/// 1x1 transparent PNG
pub const MOCK_PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

#[derive(Debug, Clone)]
struct Rule {
    method: String,
    needle: String,
    result: Value,
}

/// Mock CDP connection
#[derive(Debug)]
pub struct MockCdpConnection {
    is_active: AtomicBool,
    next_id: AtomicU64,
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<(String, Value)>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<CdpEvent>>>,
}

impl Default for MockCdpConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCdpConnection {
    /// Create a new mock CDP connection
    pub fn new() -> Self {
        Self {
            is_active: AtomicBool::new(true),
            next_id: AtomicU64::new(1),
            rules: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Answer `method` with `result` whenever the serialised params contain `needle`.
    ///
    /// Later rules win over earlier ones.
    pub fn respond_to(&self, method: &str, needle: &str, result: Value) {
        if let Ok(mut rules) = self.rules.lock() {
            rules.push(Rule {
                method: method.to_string(),
                needle: needle.to_string(),
                result,
            });
        }
    }

    /// Answer `Runtime.evaluate` calls containing `needle` with a by-value result
    pub fn evaluate_returns(&self, needle: &str, value: Value) {
        let kind = match &value {
            Value::String(_) => "string",
            Value::Number(_) => "number",
            Value::Bool(_) => "boolean",
            Value::Null => "undefined",
            _ => "object",
        };
        self.respond_to(
            "Runtime.evaluate",
            needle,
            json!({ "result": { "type": kind, "value": value } }),
        );
    }

    /// Deliver an event to every listener
    pub fn emit(&self, method: &str, params: Value) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            let event = CdpEvent {
                method: method.to_string(),
                params,
            };
            subscribers.retain(|s| s.send(event.clone()).is_ok());
        }
    }

    /// Every command received so far
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Commands received for one method
    pub fn calls_to(&self, method: &str) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p)
            .collect()
    }

    fn default_result(method: &str, params: &Value) -> Value {
        match method {
            "Page.navigate" => json!({
                "frameId": uuid::Uuid::new_v4().to_string(),
                "loaderId": uuid::Uuid::new_v4().to_string(),
            }),
            "Runtime.evaluate" => {
                let expression = params
                    .get("expression")
                    .and_then(|e| e.as_str())
                    .unwrap_or_default();
                if expression == "document.readyState" {
                    json!({ "result": { "type": "string", "value": "complete" } })
                } else {
                    json!({ "result": { "type": "undefined" } })
                }
            }
            "Page.captureScreenshot" => json!({ "data": MOCK_PNG_BASE64 }),
            _ => json!({}),
        }
    }
}

#[async_trait]
impl CdpConnection for MockCdpConnection {
    async fn send_command(&self, method: &str, params: Value) -> Result<CdpResponse, Error> {
        if !self.is_active.load(Ordering::SeqCst) {
            return Err(Error::session_closed("Mock connection is closed"));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((method.to_string(), params.clone()));
        }

        let serialized = params.to_string();
        let scripted = self.rules.lock().ok().and_then(|rules| {
            rules
                .iter()
                .rev()
                .find(|r| r.method == method && serialized.contains(&r.needle))
                .map(|r| r.result.clone())
        });

        Ok(CdpResponse {
            id,
            result: Some(scripted.unwrap_or_else(|| Self::default_result(method, &params))),
            error: None,
        })
    }

    async fn listen_events(&self) -> Result<mpsc::Receiver<CdpEvent>, Error> {
        let (tx, rx) = mpsc::channel(100);
        let (unbounded_tx, mut unbounded_rx) = mpsc::unbounded_channel();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(unbounded_tx);
        }

        tokio::spawn(async move {
            while let Some(event) = unbounded_rx.recv().await {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }

    async fn close(&self) -> Result<(), Error> {
        self.is_active.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }
}
