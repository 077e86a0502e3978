//! Browser session traits
//!
//! [`BrowserSession`] is the driver handle every page object talks to. It is
//! deliberately small: element lookup, a few primitive interactions and page
//! level queries. Waiting, fallbacks and sentinel conversion live above it.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::Config;
use crate::locator::Locator;
use crate::Result;

/// Opaque reference to an element inside one session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    id: String,
}

impl ElementHandle {
    /// Wrap a backend element id
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self { id: id.into() }
    }

    /// Backend element id
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Rendering state of an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ElementState {
    /// Rendered with a non-empty box and not hidden
    pub displayed: bool,
    /// Not disabled
    pub enabled: bool,
}

impl ElementState {
    /// Displayed and enabled
    pub fn is_clickable(&self) -> bool {
        self.displayed && self.enabled
    }
}

/// Special keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Enter / Return
    Enter,
    /// Tab
    Tab,
    /// Escape
    Escape,
}

/// A live browser session
///
/// After [`BrowserSession::close`] every operation fails with
/// [`crate::Error::SessionClosed`].
#[async_trait]
pub trait BrowserSession: Send + Sync + std::fmt::Debug {
    /// Session identifier
    fn id(&self) -> &str;

    /// Navigate the current tab
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Current URL
    async fn current_url(&self) -> Result<String>;

    /// Document title
    async fn title(&self) -> Result<String>;

    /// Reload the current document
    async fn refresh(&self) -> Result<()>;

    /// All elements matching `locator`, in document order, optionally below `scope`
    async fn query(&self, locator: &Locator, scope: Option<&ElementHandle>) -> Result<Vec<ElementHandle>>;

    /// Displayed/enabled state
    async fn element_state(&self, element: &ElementHandle) -> Result<ElementState>;

    /// Click the element's centre
    async fn click(&self, element: &ElementHandle) -> Result<()>;

    /// Clear an input's value
    async fn clear(&self, element: &ElementHandle) -> Result<()>;

    /// Type text into an element
    async fn send_keys(&self, element: &ElementHandle, text: &str) -> Result<()>;

    /// Press a special key with the element focused
    async fn press_key(&self, element: &ElementHandle, key: Key) -> Result<()>;

    /// Rendered text
    async fn text(&self, element: &ElementHandle) -> Result<String>;

    /// DOM property, falling back to the attribute of the same name
    async fn property(&self, element: &ElementHandle, name: &str) -> Result<Option<String>>;

    /// Scroll the element into the viewport
    async fn scroll_into_view(&self, element: &ElementHandle) -> Result<()>;

    /// PNG screenshot of the viewport
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// Messages of JavaScript dialogs opened since the last call
    async fn take_dialogs(&self) -> Result<Vec<String>>;

    /// Release the session and everything it owns
    async fn close(&self) -> Result<()>;

    /// Whether the session is still usable
    fn is_active(&self) -> bool;
}

/// Creates fresh browser sessions
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    /// Start a new session configured by `config`
    async fn launch(&self, config: &Config) -> Result<Arc<dyn BrowserSession>>;
}
