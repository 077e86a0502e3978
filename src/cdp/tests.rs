//! CDP layer tests against a live browser
//!
//! These tests only run when a browser with remote debugging is reachable.
//! Start one with: chrome --remote-debugging-port=9222

use super::browser::CdpBrowserImpl;
use super::traits::*;

/// Test helper: Get the DevTools endpoint from environment or use default
fn get_chrome_url() -> String {
    std::env::var("CDP_ENDPOINT").unwrap_or_else(|_| "http://localhost:9222".to_string())
}

/// Test helper: Check if Chrome is available
async fn is_chrome_available() -> bool {
    CdpBrowserImpl::new(get_chrome_url()).get_version().await.is_ok()
}

#[tokio::test]
async fn test_browser_get_version() {
    if !is_chrome_available().await {
        eprintln!("Skipping test: Chrome not available");
        return;
    }

    let browser = CdpBrowserImpl::new(get_chrome_url());
    let version = browser.get_version().await.expect("Failed to get browser version");

    assert!(!version.protocol_version.is_empty());
    assert!(!version.product.is_empty());
}

#[tokio::test]
async fn test_target_roundtrip() {
    if !is_chrome_available().await {
        eprintln!("Skipping test: Chrome not available");
        return;
    }

    let browser = CdpBrowserImpl::new(get_chrome_url());
    let target = browser
        .create_target("about:blank")
        .await
        .expect("Failed to create target");
    assert!(target.ws_url.starts_with("ws://"));

    let client = browser
        .create_client(&target.ws_url)
        .await
        .expect("Failed to create client");

    let value = client
        .evaluate("1 + 2", false)
        .await
        .expect("Failed to evaluate");
    assert_eq!(value, EvaluationResult::Number(3.0));

    let png = client
        .screenshot()
        .await
        .expect("Failed to capture screenshot");
    assert_eq!(&png[1..4], b"PNG");

    browser.close().await.expect("Failed to close connections");
    assert!(!client.connection().is_active());
    browser
        .close_target(&target.target_id)
        .await
        .expect("Failed to close target");
}

#[tokio::test]
async fn test_dialog_event_is_broadcast() {
    if !is_chrome_available().await {
        eprintln!("Skipping test: Chrome not available");
        return;
    }

    let browser = CdpBrowserImpl::new(get_chrome_url());
    let target = browser.create_target("about:blank").await.expect("target");
    let client = browser.create_client(&target.ws_url).await.expect("client");

    let mut dialogs = client
        .subscribe_events("Page.javascriptDialogOpening")
        .await
        .expect("subscribe");

    client
        .evaluate("setTimeout(() => alert('x'), 0)", false)
        .await
        .expect("evaluate");

    let event = tokio::time::timeout(std::time::Duration::from_secs(5), dialogs.recv())
        .await
        .expect("dialog event timed out")
        .expect("channel closed");
    assert_eq!(event.params["message"], "x");

    client
        .call_method("Page.handleJavaScriptDialog", serde_json::json!({ "accept": true }))
        .await
        .expect("dismiss");
    browser.close().await.ok();
    browser.close_target(&target.target_id).await.ok();
}
