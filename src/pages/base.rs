//! Element interaction layer
//!
//! Every verb here is bounded by the page's [`Wait`] and turns "not there in
//! time" into a sentinel (`None`, `false`, `""`, empty list) instead of an
//! error. The only errors that escape are session-level failures, after
//! which the session is unusable anyway.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::locator::Locator;
use crate::session::{BrowserSession, ElementHandle, Key};
use crate::wait::Wait;
use crate::Result;

/// Shared element verbs for every page object
#[derive(Debug, Clone)]
pub struct BasePage {
    session: Arc<dyn BrowserSession>,
    wait: Wait,
    settle_delay: Duration,
    screenshots_dir: PathBuf,
}

impl BasePage {
    /// Page over `session` using the configured timeouts
    pub fn new(session: Arc<dyn BrowserSession>, config: &Config) -> Self {
        Self {
            session,
            wait: Wait::new(config.default_timeout(), config.poll_interval()),
            settle_delay: config.settle_delay(),
            screenshots_dir: config.screenshots_dir.clone(),
        }
    }

    /// Same page with a different timeout for the verbs called on it
    pub fn within(&self, timeout: Duration) -> Self {
        Self {
            wait: self.wait.with_timeout(timeout),
            ..self.clone()
        }
    }

    /// Same page with the timeout lowered to at most `limit`
    pub fn capped(&self, limit: Duration) -> Self {
        self.within(limit.min(self.timeout()))
    }

    /// Underlying session
    pub fn session(&self) -> &Arc<dyn BrowserSession> {
        &self.session
    }

    /// Polling policy
    pub fn wait(&self) -> Wait {
        self.wait
    }

    /// Current timeout
    pub fn timeout(&self) -> Duration {
        self.wait.timeout()
    }

    /// First element matching `locator`, once present
    #[instrument(skip(self))]
    pub async fn find(&self, locator: &Locator) -> Result<Option<ElementHandle>> {
        let session = &self.session;
        let found = self
            .wait
            .until(|| async move { Ok(session.query(locator, None).await?.into_iter().next()) })
            .await?;

        if found.is_none() {
            warn!("Element {} not found within {:?}", locator, self.timeout());
        }
        Ok(found)
    }

    /// Every element matching `locator`, once at least one is present
    #[instrument(skip(self))]
    pub async fn find_all(&self, locator: &Locator) -> Result<Vec<ElementHandle>> {
        let session = &self.session;
        let found = self
            .wait
            .until(|| async move {
                let elements = session.query(locator, None).await?;
                Ok((!elements.is_empty()).then_some(elements))
            })
            .await?;

        match found {
            Some(elements) => Ok(elements),
            None => {
                warn!("Elements {} not found within {:?}", locator, self.timeout());
                Ok(Vec::new())
            }
        }
    }

    /// Click the first element matching `locator` once it is displayed and enabled
    #[instrument(skip(self))]
    pub async fn click(&self, locator: &Locator) -> Result<bool> {
        let session = &self.session;
        let clicked = self
            .wait
            .until(|| async move {
                let Some(element) = session.query(locator, None).await?.into_iter().next() else {
                    return Ok(None);
                };
                if !session.element_state(&element).await?.is_clickable() {
                    return Ok(None);
                }
                session.click(&element).await?;
                Ok(Some(()))
            })
            .await?;

        if clicked.is_none() {
            warn!("Element {} not clickable within {:?}", locator, self.timeout());
        }
        Ok(clicked.is_some())
    }

    /// Replace the content of the first element matching `locator` with `text`
    #[instrument(skip(self, text))]
    pub async fn type_text(&self, locator: &Locator, text: &str) -> Result<bool> {
        let session = &self.session;
        let typed = self
            .wait
            .until(|| async move {
                let Some(element) = session.query(locator, None).await?.into_iter().next() else {
                    return Ok(None);
                };
                session.clear(&element).await?;
                session.send_keys(&element, text).await?;
                Ok(Some(()))
            })
            .await?;

        if typed.is_none() {
            warn!("Cannot type into {} within {:?}", locator, self.timeout());
        }
        Ok(typed.is_some())
    }

    /// Rendered text of the first element matching `locator`; empty when absent
    #[instrument(skip(self))]
    pub async fn read_text(&self, locator: &Locator) -> Result<String> {
        let session = &self.session;
        let text = self
            .wait
            .until(|| async move {
                match session.query(locator, None).await?.into_iter().next() {
                    Some(element) => Ok(Some(session.text(&element).await?)),
                    None => Ok(None),
                }
            })
            .await?;

        if text.is_none() {
            warn!("Cannot read text of {} within {:?}", locator, self.timeout());
        }
        Ok(text.unwrap_or_default())
    }

    /// Whether the first element matching `locator` becomes displayed.
    ///
    /// A `false` here is an expected answer, not a failure, so it is not
    /// logged as a warning.
    #[instrument(skip(self))]
    pub async fn is_visible(&self, locator: &Locator) -> Result<bool> {
        let session = &self.session;
        let visible = self
            .wait
            .until_true(|| async move {
                match session.query(locator, None).await?.into_iter().next() {
                    Some(element) => Ok(session.element_state(&element).await?.displayed),
                    None => Ok(false),
                }
            })
            .await?;

        if !visible {
            debug!("Element {} not visible within {:?}", locator, self.timeout());
        }
        Ok(visible)
    }

    /// Whether any element matching `locator` becomes present
    pub async fn is_present(&self, locator: &Locator) -> Result<bool> {
        let session = &self.session;
        self.wait
            .until_true(|| async move { Ok(!session.query(locator, None).await?.is_empty()) })
            .await
    }

    /// Click the `index`-th element matching `locator`
    pub async fn click_nth(&self, locator: &Locator, index: usize) -> Result<bool> {
        let session = &self.session;
        let clicked = self
            .wait
            .until(|| async move {
                let Some(element) = session.query(locator, None).await?.into_iter().nth(index) else {
                    return Ok(None);
                };
                session.click(&element).await?;
                Ok(Some(()))
            })
            .await?;

        if clicked.is_none() {
            warn!("No element {} at position {} within {:?}", locator, index, self.timeout());
        }
        Ok(clicked.is_some())
    }

    /// Click the first clickable element matching `locator` whose text passes `accept`
    pub async fn click_where<F>(&self, locator: &Locator, accept: F) -> Result<bool>
    where
        F: Fn(&str) -> bool,
    {
        let session = &self.session;
        let accept = &accept;
        let clicked = self
            .wait
            .until(|| async move {
                for element in session.query(locator, None).await? {
                    if !session.element_state(&element).await?.is_clickable() {
                        continue;
                    }
                    if accept(&session.text(&element).await?) {
                        session.click(&element).await?;
                        return Ok(Some(()));
                    }
                }
                Ok(None)
            })
            .await?;
        Ok(clicked.is_some())
    }

    /// Current `value` of the first input matching `locator`; empty when absent
    pub async fn value(&self, locator: &Locator) -> Result<String> {
        Ok(self.attribute(locator, "value").await?.unwrap_or_default())
    }

    /// Property or attribute `name` of the first element matching `locator`
    pub async fn attribute(&self, locator: &Locator, name: &str) -> Result<Option<String>> {
        let session = &self.session;
        let value = self
            .wait
            .until(|| async move {
                match session.query(locator, None).await?.into_iter().next() {
                    Some(element) => Ok(Some(session.property(&element, name).await?)),
                    None => Ok(None),
                }
            })
            .await?;
        Ok(value.flatten())
    }

    /// Scroll the first element matching `locator` into view
    pub async fn scroll_to(&self, locator: &Locator) -> Result<bool> {
        let session = &self.session;
        let scrolled = self
            .wait
            .until(|| async move {
                match session.query(locator, None).await?.into_iter().next() {
                    Some(element) => {
                        session.scroll_into_view(&element).await?;
                        Ok(Some(()))
                    }
                    None => Ok(None),
                }
            })
            .await?;
        Ok(scrolled.is_some())
    }

    /// Press `key` inside the first element matching `locator`
    pub async fn press_key(&self, locator: &Locator, key: Key) -> Result<bool> {
        let session = &self.session;
        let pressed = self
            .wait
            .until(|| async move {
                match session.query(locator, None).await?.into_iter().next() {
                    Some(element) => {
                        session.press_key(&element, key).await?;
                        Ok(Some(()))
                    }
                    None => Ok(None),
                }
            })
            .await?;

        if pressed.is_none() {
            warn!("Cannot press {:?} in {} within {:?}", key, locator, self.timeout());
        }
        Ok(pressed.is_some())
    }

    /// First alternative that resolves, with its position in `chain`
    pub async fn find_first(&self, chain: &[Locator]) -> Result<Option<(usize, ElementHandle)>> {
        for (index, locator) in chain.iter().enumerate() {
            if let Some(element) = self.find(locator).await? {
                debug!("Resolved alternative {} ({})", index, locator);
                return Ok(Some((index, element)));
            }
        }
        Ok(None)
    }

    /// Click the first alternative that becomes clickable
    pub async fn click_first(&self, chain: &[Locator]) -> Result<Option<usize>> {
        for (index, locator) in chain.iter().enumerate() {
            if self.click(locator).await? {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// Type into the first alternative that resolves
    pub async fn type_first(&self, chain: &[Locator], text: &str) -> Result<Option<usize>> {
        for (index, locator) in chain.iter().enumerate() {
            if self.type_text(locator, text).await? {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// First alternative that becomes visible
    pub async fn visible_first(&self, chain: &[Locator]) -> Result<Option<usize>> {
        for (index, locator) in chain.iter().enumerate() {
            if self.is_visible(locator).await? {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// Navigate the session
    pub async fn navigate(&self, url: &str) -> Result<()> {
        info!("Navigating to {}", url);
        self.session.navigate(url).await
    }

    /// Reload the current document
    pub async fn refresh(&self) -> Result<()> {
        self.session.refresh().await
    }

    /// Current URL
    pub async fn current_url(&self) -> Result<String> {
        self.session.current_url().await
    }

    /// Document title
    pub async fn title(&self) -> Result<String> {
        self.session.title().await
    }

    /// Dialog messages raised since the last call
    pub async fn take_dialogs(&self) -> Result<Vec<String>> {
        self.session.take_dialogs().await
    }

    /// Fixed delay for client-side re-rendering after data fetches
    pub async fn settle(&self) {
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }
    }

    /// Save a viewport screenshot as `<name>_<timestamp>.png`
    pub async fn screenshot(&self, name: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.screenshots_dir).await?;

        let bytes = self.session.screenshot().await?;
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%3f");
        let path = self
            .screenshots_dir
            .join(format!("{}_{}.png", sanitize(name), timestamp));

        tokio::fs::write(&path, &bytes).await?;
        info!("Screenshot saved: {}", path.display());
        Ok(path)
    }
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "screenshot".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{MockSession, NodeSpec};
    use crate::Error;

    const BUTTON: Locator = Locator::css("button.save");
    const INPUT: Locator = Locator::name("q");
    const MISSING: Locator = Locator::id("nowhere");

    fn page(session: MockSession) -> (Arc<MockSession>, BasePage) {
        let session = Arc::new(session);
        let config = Config {
            default_timeout_secs: 0.3,
            poll_interval_ms: 10,
            settle_delay_ms: 0,
            ..Config::default()
        };
        let page = BasePage::new(session.clone(), &config);
        (session, page)
    }

    #[tokio::test]
    async fn test_missing_element_yields_sentinels() {
        let (_, page) = page(MockSession::new("http://localhost/"));

        assert!(page.find(&MISSING).await.unwrap().is_none());
        assert!(page.find_all(&MISSING).await.unwrap().is_empty());
        assert!(!page.click(&MISSING).await.unwrap());
        assert!(!page.type_text(&MISSING, "x").await.unwrap());
        assert_eq!(page.read_text(&MISSING).await.unwrap(), "");
        assert!(!page.is_visible(&MISSING).await.unwrap());
    }

    #[tokio::test]
    async fn test_disabled_element_is_not_clicked() {
        let session = MockSession::new("http://localhost/");
        session.add(NodeSpec::new(BUTTON).key("save").disabled());
        let (mock, page) = page(session);

        assert!(!page.click(&BUTTON).await.unwrap());
        assert_eq!(mock.clicks_on("save"), 0);
    }

    #[tokio::test]
    async fn test_delayed_element_is_found() {
        let session = MockSession::new("http://localhost/");
        session.add(
            NodeSpec::new(BUTTON)
                .key("save")
                .text("  Save ")
                .appears_after(Duration::from_millis(50)),
        );
        let (mock, page) = page(session);

        assert!(page.click(&BUTTON).await.unwrap());
        assert_eq!(mock.clicks_on("save"), 1);
        assert_eq!(page.read_text(&BUTTON).await.unwrap(), "Save");
    }

    #[tokio::test]
    async fn test_type_text_replaces_value() {
        let session = MockSession::new("http://localhost/");
        session.add(NodeSpec::new(INPUT).key("q").property("value", "old"));
        let (mock, page) = page(session);

        assert!(page.type_text(&INPUT, "new").await.unwrap());
        assert_eq!(mock.value_of("q").as_deref(), Some("new"));
        assert_eq!(page.value(&INPUT).await.unwrap(), "new");
    }

    #[tokio::test]
    async fn test_hidden_element_is_present_but_not_visible() {
        let session = MockSession::new("http://localhost/");
        session.add(NodeSpec::new(BUTTON).hidden());
        let (_, page) = page(session);

        assert!(page.find(&BUTTON).await.unwrap().is_some());
        assert!(!page.is_visible(&BUTTON).await.unwrap());
    }

    #[tokio::test]
    async fn test_scroll_to_reports_presence() {
        let session = MockSession::new("http://localhost/");
        session.add(NodeSpec::new(BUTTON).hidden());
        let (_, page) = page(session);

        assert!(page.scroll_to(&BUTTON).await.unwrap());
        assert!(!page.within(Duration::from_millis(20)).scroll_to(&MISSING).await.unwrap());
    }

    #[tokio::test]
    async fn test_first_alternative_wins() {
        let session = MockSession::new("http://localhost/");
        session
            .add(NodeSpec::new(Locator::id("username")).key("by-id"))
            .add(NodeSpec::new(Locator::css("input[type='email']")).key("by-type"));
        let (mock, page) = page(session);
        let chain = [
            Locator::css("input[placeholder='Username']"),
            Locator::id("username"),
            Locator::css("input[type='email']"),
        ];

        let fast = page.within(Duration::from_millis(20));
        assert_eq!(fast.type_first(&chain, "admin").await.unwrap(), Some(1));
        assert_eq!(mock.value_of("by-id").as_deref(), Some("admin"));
        assert_eq!(mock.value_of("by-type").as_deref(), Some(""));
        assert_eq!(fast.click_first(&[MISSING]).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_closed_session_propagates() {
        let (mock, page) = page(MockSession::new("http://localhost/"));
        mock.close().await.unwrap();

        let err = page.find(&BUTTON).await.unwrap_err();
        assert!(matches!(err, Error::SessionClosed(_)));
    }

    #[tokio::test]
    async fn test_screenshot_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(MockSession::new("http://localhost/"));
        let config = Config {
            screenshots_dir: dir.path().join("shots"),
            ..Config::default()
        };
        let page = BasePage::new(session, &config);

        let path = page.screenshot("login page").await.unwrap();
        assert!(path.starts_with(dir.path().join("shots")));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("login_page_"));
        assert!(name.ends_with(".png"));
        assert!(!std::fs::read(&path).unwrap().is_empty());
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("failure_login/page"), "failure_login_page");
        assert_eq!(sanitize(""), "screenshot");
    }
}
