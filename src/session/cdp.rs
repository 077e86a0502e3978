//! CDP-backed browser session
//!
//! Elements are located with injected JavaScript and tagged with a
//! `data-pom-id` attribute; that attribute is the handle id. A node that has
//! been re-rendered loses its tag, which surfaces as a stale element.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::process::Child;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cdp::traits::{CdpBrowser, CdpClient};
use crate::cdp::types::KeyEventParams;
use crate::locator::{js_str, Locator};
use crate::session::traits::{BrowserSession, ElementHandle, ElementState, Key};
use crate::{Error, Result};

const POM_ATTR: &str = "data-pom-id";

/// Browser session over a CDP page target
pub struct CdpSession {
    id: String,
    client: Arc<dyn CdpClient>,
    dialogs: Arc<Mutex<VecDeque<String>>>,
    closed: AtomicBool,
    browser: Option<(Arc<dyn CdpBrowser>, String)>,
    process: tokio::sync::Mutex<Option<(Child, TempDir)>>,
}

impl std::fmt::Debug for CdpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdpSession")
            .field("id", &self.id)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl CdpSession {
    /// Wrap a connected client and start watching for JavaScript dialogs
    pub async fn attach(client: Arc<dyn CdpClient>) -> Result<Self> {
        let dialogs = Arc::new(Mutex::new(VecDeque::new()));

        let mut events = client.subscribe_events("Page.javascriptDialogOpening").await?;
        let watcher_client = Arc::clone(&client);
        let watcher_dialogs = Arc::clone(&dialogs);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let message = event
                    .params
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or_default()
                    .to_string();
                warn!("JavaScript dialog opened: {:?}", message);
                if let Ok(mut queue) = watcher_dialogs.lock() {
                    queue.push_back(message);
                }
                // An open dialog blocks the page until it is handled.
                if let Err(e) = watcher_client
                    .call_method("Page.handleJavaScriptDialog", json!({ "accept": true }))
                    .await
                {
                    debug!("Failed to dismiss dialog: {}", e);
                }
            }
        });

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            client,
            dialogs,
            closed: AtomicBool::new(false),
            browser: None,
            process: tokio::sync::Mutex::new(None),
        })
    }

    /// Close `target_id` through `browser` when the session is released
    pub fn with_target(mut self, browser: Arc<dyn CdpBrowser>, target_id: String) -> Self {
        self.browser = Some((browser, target_id));
        self
    }

    /// Kill `child` and delete its `profile` directory when the session is released
    pub fn with_process(self, child: Child, profile: TempDir) -> Self {
        Self {
            process: tokio::sync::Mutex::new(Some((child, profile))),
            ..self
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::session_closed(format!("Session {} has been released", self.id)));
        }
        Ok(())
    }

    async fn eval(&self, script: &str) -> Result<Value> {
        self.ensure_open()?;
        Ok(self.client.evaluate(script, false).await?.into_value())
    }

    /// Run `body` with `el` bound to the tagged element.
    ///
    /// `body` must `return` the value of interest.
    async fn on_element(&self, element: &ElementHandle, body: &str) -> Result<Value> {
        let script = format!(
            "(() => {{ const el = document.querySelector('[{attr}=' + {id} + ']'); \
             if (!el) return {{ stale: true }}; \
             const out = (() => {{ {body} }})(); \
             return {{ stale: false, value: out === undefined ? null : out }}; }})()",
            attr = POM_ATTR,
            id = js_str(&js_str(element.id())),
            body = body
        );

        let result = self.eval(&script).await?;
        if result.get("stale").and_then(Value::as_bool).unwrap_or(true) {
            return Err(Error::stale_element(element.id()));
        }
        Ok(result.get("value").cloned().unwrap_or(Value::Null))
    }

    fn query_script(locator: &Locator, scope: Option<&ElementHandle>) -> String {
        let root = match scope {
            Some(scope) => format!(
                "document.querySelector('[{}=' + {} + ']')",
                POM_ATTR,
                js_str(&js_str(scope.id()))
            ),
            None => "document".to_string(),
        };

        format!(
            "(() => {{ const root = {root}; if (!root) return null; let nodes = []; {collect} \
             return nodes.filter(n => n.nodeType === 1).map(n => {{ \
               if (!n.hasAttribute('{attr}')) {{ window.__pomSeq = (window.__pomSeq || 0) + 1; \
                 n.setAttribute('{attr}', 'pom-' + window.__pomSeq); }} \
               return n.getAttribute('{attr}'); }}); }})()",
            root = root,
            collect = locator.collect_script(),
            attr = POM_ATTR
        )
    }

    async fn dispatch_key(&self, params: KeyEventParams) -> Result<()> {
        self.client
            .call_method("Input.dispatchKeyEvent", serde_json::to_value(params)?)
            .await?;
        Ok(())
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl BrowserSession for CdpSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        self.ensure_open()?;
        self.client.navigate(url).await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(value_to_string(&self.eval("window.location.href").await?).unwrap_or_default())
    }

    async fn title(&self) -> Result<String> {
        Ok(value_to_string(&self.eval("document.title").await?).unwrap_or_default())
    }

    async fn refresh(&self) -> Result<()> {
        self.ensure_open()?;
        self.client.reload(false).await
    }

    async fn query(&self, locator: &Locator, scope: Option<&ElementHandle>) -> Result<Vec<ElementHandle>> {
        let result = self.eval(&Self::query_script(locator, scope)).await?;

        match result {
            Value::Array(ids) => Ok(ids
                .iter()
                .filter_map(Value::as_str)
                .map(ElementHandle::new)
                .collect()),
            Value::Null => match scope {
                Some(scope) => Err(Error::stale_element(scope.id())),
                None => Ok(Vec::new()),
            },
            other => Err(Error::script_execution_failed(format!(
                "Unexpected query result for {}: {}",
                locator, other
            ))),
        }
    }

    async fn element_state(&self, element: &ElementHandle) -> Result<ElementState> {
        let value = self
            .on_element(
                element,
                "const style = window.getComputedStyle(el); \
                 const displayed = el.getClientRects().length > 0 \
                   && style.visibility !== 'hidden' && style.display !== 'none'; \
                 return { displayed, enabled: !el.disabled };",
            )
            .await?;

        Ok(ElementState {
            displayed: value.get("displayed").and_then(Value::as_bool).unwrap_or(false),
            enabled: value.get("enabled").and_then(Value::as_bool).unwrap_or(false),
        })
    }

    async fn click(&self, element: &ElementHandle) -> Result<()> {
        let rect = self
            .on_element(
                element,
                "el.scrollIntoView({ block: 'center', inline: 'center' }); \
                 const r = el.getBoundingClientRect(); \
                 return { x: r.left + r.width / 2, y: r.top + r.height / 2 };",
            )
            .await?;

        let x = rect.get("x").and_then(Value::as_f64).unwrap_or(0.0);
        let y = rect.get("y").and_then(Value::as_f64).unwrap_or(0.0);

        for kind in ["mousePressed", "mouseReleased"] {
            self.client
                .call_method(
                    "Input.dispatchMouseEvent",
                    json!({
                        "type": kind,
                        "x": x,
                        "y": y,
                        "button": "left",
                        "clickCount": 1,
                    }),
                )
                .await?;
        }

        Ok(())
    }

    async fn clear(&self, element: &ElementHandle) -> Result<()> {
        self.on_element(
            element,
            "el.focus(); \
             if ('value' in el) { el.value = ''; } else { el.textContent = ''; } \
             el.dispatchEvent(new Event('input', { bubbles: true })); \
             el.dispatchEvent(new Event('change', { bubbles: true }));",
        )
        .await?;
        Ok(())
    }

    async fn send_keys(&self, element: &ElementHandle, text: &str) -> Result<()> {
        self.on_element(element, "el.focus();").await?;
        self.client
            .call_method("Input.insertText", json!({ "text": text }))
            .await?;
        Ok(())
    }

    async fn press_key(&self, element: &ElementHandle, key: Key) -> Result<()> {
        self.on_element(element, "el.focus();").await?;

        let (name, code, text) = match key {
            Key::Enter => ("Enter", 13, Some("\r")),
            Key::Tab => ("Tab", 9, None),
            Key::Escape => ("Escape", 27, None),
        };

        for kind in ["keyDown", "keyUp"] {
            self.dispatch_key(KeyEventParams {
                r#type: kind.to_string(),
                key: Some(name.to_string()),
                code: Some(name.to_string()),
                text: if kind == "keyDown" { text.map(str::to_string) } else { None },
                windows_virtual_key_code: Some(code),
            })
            .await?;
        }

        Ok(())
    }

    async fn text(&self, element: &ElementHandle) -> Result<String> {
        let value = self
            .on_element(element, "return (el.innerText ?? el.textContent ?? '').trim();")
            .await?;
        Ok(value_to_string(&value).unwrap_or_default())
    }

    async fn property(&self, element: &ElementHandle, name: &str) -> Result<Option<String>> {
        let body = format!(
            "const name = {}; const v = el[name]; \
             if (v !== undefined && v !== null && typeof v !== 'object' && typeof v !== 'function') return v; \
             return el.getAttribute(name);",
            js_str(name)
        );
        let value = self.on_element(element, &body).await?;
        Ok(value_to_string(&value))
    }

    async fn scroll_into_view(&self, element: &ElementHandle) -> Result<()> {
        self.on_element(element, "el.scrollIntoView({ block: 'center', inline: 'center' });")
            .await?;
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.ensure_open()?;
        self.client.screenshot().await
    }

    async fn take_dialogs(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        Ok(self
            .dialogs
            .lock()
            .map(|mut queue| queue.drain(..).collect())
            .unwrap_or_default())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!("Releasing browser session {}", self.id);

        if let Err(e) = self.client.connection().close().await {
            warn!("Failed to close CDP connection: {}", e);
        }

        if let Some((browser, target_id)) = &self.browser {
            if let Err(e) = browser.close_target(target_id).await {
                debug!("Failed to close target {}: {}", target_id, e);
            }
        }

        if let Some((mut child, profile)) = self.process.lock().await.take() {
            if let Err(e) = child.kill().await {
                warn!("Failed to stop browser process: {}", e);
            }
            let path = profile.path().to_path_buf();
            if let Err(e) = profile.close() {
                warn!("Failed to remove browser profile {}: {}", path.display(), e);
            }
        }

        Ok(())
    }

    fn is_active(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.client.connection().is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdp::{CdpClientImpl, MockCdpConnection};

    async fn session() -> (Arc<MockCdpConnection>, CdpSession) {
        let connection = Arc::new(MockCdpConnection::new());
        let client = Arc::new(CdpClientImpl::new(connection.clone()));
        let session = CdpSession::attach(client).await.unwrap();
        (connection, session)
    }

    #[tokio::test]
    async fn test_query_returns_tagged_handles() {
        let (connection, session) = session().await;
        connection.evaluate_returns("querySelectorAll", json!(["pom-1", "pom-2"]));

        let handles = session
            .query(&Locator::css("ng2-smart-table tbody tr"), None)
            .await
            .unwrap();
        assert_eq!(handles, vec![ElementHandle::new("pom-1"), ElementHandle::new("pom-2")]);
    }

    #[tokio::test]
    async fn test_missing_scope_is_stale() {
        let (connection, session) = session().await;
        connection.evaluate_returns("querySelectorAll", Value::Null);

        let err = session
            .query(&Locator::tag("td"), Some(&ElementHandle::new("pom-9")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StaleElement(ref id) if id == "pom-9"));
    }

    #[tokio::test]
    async fn test_stale_element_operation() {
        let (connection, session) = session().await;
        connection.evaluate_returns("innerText", json!({ "stale": true }));

        let err = session.text(&ElementHandle::new("pom-3")).await.unwrap_err();
        assert!(matches!(err, Error::StaleElement(_)));
    }

    #[tokio::test]
    async fn test_click_dispatches_mouse_at_centre() {
        let (connection, session) = session().await;
        connection.evaluate_returns(
            "getBoundingClientRect",
            json!({ "stale": false, "value": { "x": 40.0, "y": 12.5 } }),
        );

        session.click(&ElementHandle::new("pom-1")).await.unwrap();

        let events = connection.calls_to("Input.dispatchMouseEvent");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["type"], "mousePressed");
        assert_eq!(events[1]["type"], "mouseReleased");
        assert_eq!(events[0]["x"], 40.0);
    }

    #[tokio::test]
    async fn test_enter_key_sends_down_and_up() {
        let (connection, session) = session().await;
        connection.evaluate_returns("el.focus()", json!({ "stale": false, "value": null }));

        session
            .press_key(&ElementHandle::new("pom-1"), Key::Enter)
            .await
            .unwrap();

        let keys = connection.calls_to("Input.dispatchKeyEvent");
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0]["key"], "Enter");
        assert_eq!(keys[0]["text"], "\r");
        assert!(keys[1].get("text").is_none());
    }

    #[tokio::test]
    async fn test_dialogs_are_recorded_and_dismissed() {
        let (connection, session) = session().await;

        connection.emit("Page.javascriptDialogOpening", json!({ "message": "x", "type": "alert" }));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(session.take_dialogs().await.unwrap(), vec!["x".to_string()]);
        assert!(session.take_dialogs().await.unwrap().is_empty());
        assert_eq!(connection.calls_to("Page.handleJavaScriptDialog").len(), 1);
    }

    #[tokio::test]
    async fn test_operations_fail_after_close() {
        let (_connection, session) = session().await;
        session.close().await.unwrap();

        assert!(!session.is_active());
        let err = session.current_url().await.unwrap_err();
        assert!(matches!(err, Error::SessionClosed(_)));
        // Releasing twice is harmless.
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_removes_browser_profile() {
        let (_connection, session) = session().await;
        let profile = tempfile::Builder::new().prefix("admin-pom-").tempdir().unwrap();
        let path = profile.path().to_path_buf();
        std::fs::write(path.join("Local State"), "{}").unwrap();
        let child = tokio::process::Command::new("sleep")
            .arg("30")
            .kill_on_drop(true)
            .spawn()
            .unwrap();

        let session = session.with_process(child, profile);
        assert!(path.exists());
        session.close().await.unwrap();
        assert!(!path.exists());
    }
}
