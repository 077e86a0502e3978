//! DevTools wire frames
//!
//! The JSON-RPC envelope plus the parameter blocks for the few commands the
//! client builds by hand. Everything else travels as `serde_json::Value`.

use serde::{Deserialize, Serialize};

/// Outgoing command
#[derive(Debug, Clone, Serialize)]
pub struct CdpRequest {
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

/// Incoming frame without an `id`
#[derive(Debug, Clone, Deserialize)]
pub struct CdpNotification {
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Incoming frame answering a command
#[derive(Debug, Clone, Deserialize)]
pub struct CdpRpcResponse {
    pub id: u64,
    #[serde(default)]
    pub result: serde_json::Value,
    #[serde(default)]
    pub error: Option<CdpErrorDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CdpErrorDetail {
    pub code: i32,
    pub message: String,
}

/// `Page.navigate`
#[derive(Debug, Clone, Serialize)]
pub struct NavigateParams {
    pub url: String,
}

/// `Runtime.evaluate`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateParams {
    pub expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub await_promise: Option<bool>,
    /// Always `Some(true)`; handles to remote objects are never kept
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_by_value: Option<bool>,
}

/// Evaluated value as the protocol describes it
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RemoteObject {
    /// `string`, `number`, `boolean`, `undefined` or `object`
    #[serde(default)]
    pub r#type: String,
    /// `null` and `array` live here for objects
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponse {
    #[serde(default)]
    pub result: RemoteObject,
    /// Present when the expression threw
    #[serde(default)]
    pub exception_details: Option<serde_json::Value>,
}

/// `Input.dispatchKeyEvent`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyEventParams {
    /// `keyDown`, `keyUp` or `char`
    pub r#type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub windows_virtual_key_code: Option<u32>,
}
