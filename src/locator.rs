//! Element locators
//!
//! A [`Locator`] is a strategy plus a selector string. Page objects declare
//! theirs as constants; fallback alternatives are plain slices tried in order.

use std::borrow::Cow;
use std::fmt;

/// Locator strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum By {
    /// CSS selector
    Css,
    /// XPath expression
    XPath,
    /// `name` attribute
    Name,
    /// `id` attribute
    Id,
    /// Tag name
    TagName,
}

/// Strategy and selector identifying zero or more elements
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    by: By,
    selector: Cow<'static, str>,
}

impl Locator {
    /// CSS selector locator
    pub const fn css(selector: &'static str) -> Self {
        Self { by: By::Css, selector: Cow::Borrowed(selector) }
    }

    /// XPath locator
    pub const fn xpath(selector: &'static str) -> Self {
        Self { by: By::XPath, selector: Cow::Borrowed(selector) }
    }

    /// `name` attribute locator
    pub const fn name(name: &'static str) -> Self {
        Self { by: By::Name, selector: Cow::Borrowed(name) }
    }

    /// `id` attribute locator
    pub const fn id(id: &'static str) -> Self {
        Self { by: By::Id, selector: Cow::Borrowed(id) }
    }

    /// Tag name locator
    pub const fn tag(tag: &'static str) -> Self {
        Self { by: By::TagName, selector: Cow::Borrowed(tag) }
    }

    /// Locator built at runtime
    pub fn new<S: Into<String>>(by: By, selector: S) -> Self {
        Self { by, selector: Cow::Owned(selector.into()) }
    }

    /// Strategy
    pub fn by(&self) -> By {
        self.by
    }

    /// Raw selector string
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// CSS selector equivalent, if the strategy has one
    pub fn to_css(&self) -> Option<String> {
        match self.by {
            By::Css | By::TagName => Some(self.selector.to_string()),
            By::Name => Some(format!("[name={}]", js_str(&self.selector))),
            By::Id => Some(format!("[id={}]", js_str(&self.selector))),
            By::XPath => None,
        }
    }

    /// JavaScript that collects matching element nodes into `nodes`,
    /// searching below `root`.
    pub(crate) fn collect_script(&self) -> String {
        match self.to_css() {
            Some(css) => format!("nodes = Array.from(root.querySelectorAll({}));", js_str(&css)),
            None => {
                // Scoped XPath must be relative to the scope node.
                format!(
                    "const xp = root === document ? {sel} : ({sel}.startsWith('/') ? '.' + {sel} : {sel}); \
                     const snap = document.evaluate(xp, root, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); \
                     for (let i = 0; i < snap.snapshotLength; i++) nodes.push(snap.snapshotItem(i));",
                    sel = js_str(&self.selector)
                )
            }
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let by = match self.by {
            By::Css => "css",
            By::XPath => "xpath",
            By::Name => "name",
            By::Id => "id",
            By::TagName => "tag",
        };
        write!(f, "{}={}", by, self.selector)
    }
}

/// Quote a string as a JavaScript string literal
pub(crate) fn js_str(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}
