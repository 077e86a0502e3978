//! Login screen

use tokio::time::Duration;
use tracing::{debug, info, warn};

use crate::locator::Locator;
use crate::pages::base::BasePage;
use crate::session::Key;
use crate::Result;

/// Username field alternatives, most specific first
pub const USERNAME_FIELDS: [Locator; 4] = [
    Locator::css("input[placeholder='Username']"),
    Locator::name("username"),
    Locator::id("username"),
    Locator::css("input[type='email']"),
];

/// Password field alternatives, most specific first
pub const PASSWORD_FIELDS: [Locator; 4] = [
    Locator::css("input[placeholder='Password']"),
    Locator::name("password"),
    Locator::id("password"),
    Locator::css("input[type='password']"),
];

/// Submit control alternatives
pub const SUBMIT_BUTTONS: [Locator; 4] = [
    Locator::css("button[type='submit']"),
    Locator::xpath(
        "//button[contains(text(), 'LOGIN') or contains(text(), 'Login') or contains(text(), 'login')]",
    ),
    Locator::css(".login-btn"),
    Locator::css("button.ui-button"),
];

/// "Remember me" checkbox
pub const REMEMBER_ME: Locator = Locator::css("input[type='checkbox']");

/// Elements that only exist once logged in
pub const SUCCESS_MARKERS: [Locator; 3] = [
    Locator::css("nb-sidebar"),
    Locator::css("a[title='Logout']"),
    Locator::css("nb-layout-header"),
];

/// Login error banner
pub const ERROR_MESSAGE: Locator = Locator::css(".error, .alert-danger, .notification-error");

/// Budget for recognising the login form after a navigation
pub const FORM_CHECK_BUDGET: Duration = Duration::from_secs(3);

/// Budget for spotting the error banner
pub const ERROR_CHECK_BUDGET: Duration = Duration::from_secs(3);

/// How a login attempt was judged successful
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The URL left the auth screens
    UrlChanged(String),
    /// A post-login element appeared
    MarkerPresent,
    /// No signal and no error banner; success is assumed
    AssumedSuccess,
}

impl LoginOutcome {
    /// Whether success was inferred rather than observed
    pub fn is_assumed(&self) -> bool {
        matches!(self, LoginOutcome::AssumedSuccess)
    }
}

/// Whether `url` is one of the authentication screens
pub fn is_auth_url(url: &str) -> bool {
    let url = url.to_lowercase();
    url.contains("auth") || url.contains("/login")
}

/// Login page object
#[derive(Debug, Clone)]
pub struct LoginPage {
    base: BasePage,
}

impl LoginPage {
    /// Login page over `base`
    pub fn new(base: BasePage) -> Self {
        Self { base }
    }

    /// Element layer
    pub fn base(&self) -> &BasePage {
        &self.base
    }

    /// Open the first candidate URL that shows a login form.
    ///
    /// Returns the URL that worked, or `None` when every candidate failed.
    pub async fn open(&self, base_url: &str, paths: &[String]) -> Result<Option<String>> {
        let root = base_url.trim_end_matches('/');

        for path in paths {
            let url = format!("{}{}", root, path);
            if let Err(e) = self.base.navigate(&url).await {
                if e.is_session_fatal() {
                    return Err(e);
                }
                warn!("Cannot open {}: {}", url, e);
                continue;
            }

            if self.is_loaded().await? {
                info!("Login form found at {}", url);
                return Ok(Some(url));
            }
            warn!("No login form at {}", url);
        }

        Ok(None)
    }

    /// Whether a username and a password field are both visible
    pub async fn is_loaded(&self) -> Result<bool> {
        let quick = self.base.capped(FORM_CHECK_BUDGET);
        Ok(quick.visible_first(&USERNAME_FIELDS).await?.is_some()
            && quick.visible_first(&PASSWORD_FIELDS).await?.is_some())
    }

    /// Type the user name into the first username alternative that resolves
    pub async fn enter_username(&self, username: &str) -> Result<bool> {
        let used = self
            .base
            .capped(FORM_CHECK_BUDGET)
            .type_first(&USERNAME_FIELDS, username)
            .await?;
        debug!("Username field alternative: {:?}", used);
        Ok(used.is_some())
    }

    /// Type the password into the first password alternative that resolves
    pub async fn enter_password(&self, password: &str) -> Result<bool> {
        let used = self
            .base
            .capped(FORM_CHECK_BUDGET)
            .type_first(&PASSWORD_FIELDS, password)
            .await?;
        debug!("Password field alternative: {:?}", used);
        Ok(used.is_some())
    }

    /// Tick "remember me"
    pub async fn click_remember_me(&self) -> Result<bool> {
        self.base.capped(FORM_CHECK_BUDGET).click(&REMEMBER_ME).await
    }

    /// Click the first submit control; press Enter in the password field if none resolves
    pub async fn submit(&self) -> Result<bool> {
        let quick = self.base.capped(FORM_CHECK_BUDGET);
        if let Some(index) = quick.click_first(&SUBMIT_BUTTONS).await? {
            debug!("Submitted with {}", SUBMIT_BUTTONS[index]);
            return Ok(true);
        }

        warn!("No submit control resolved, pressing Enter in the password field");
        for field in &PASSWORD_FIELDS {
            if quick.press_key(field, Key::Enter).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Wait for the URL to leave the auth screens or a post-login marker to appear
    pub async fn wait_for_login_outcome(&self, timeout: Duration) -> Result<Option<LoginOutcome>> {
        let session = self.base.session();
        self.base
            .wait()
            .with_timeout(timeout)
            .until(|| async move {
                let url = session.current_url().await?;
                if !is_auth_url(&url) {
                    return Ok(Some(LoginOutcome::UrlChanged(url)));
                }
                for marker in &SUCCESS_MARKERS {
                    if !session.query(marker, None).await?.is_empty() {
                        return Ok(Some(LoginOutcome::MarkerPresent));
                    }
                }
                Ok(None)
            })
            .await
    }

    /// Text of the visible error banner, if any
    pub async fn error_message(&self) -> Result<Option<String>> {
        let quick = self.base.capped(ERROR_CHECK_BUDGET);
        if !quick.is_visible(&ERROR_MESSAGE).await? {
            return Ok(None);
        }
        let text = quick.read_text(&ERROR_MESSAGE).await?;
        Ok(Some(text))
    }

    /// Empty both credential fields
    pub async fn clear_form(&self) -> Result<bool> {
        let username = self.enter_username("").await?;
        let password = self.enter_password("").await?;
        Ok(username && password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::session::{Effect, MockSession, NodeSpec};
    use std::sync::Arc;

    fn login_page(session: &Arc<MockSession>) -> LoginPage {
        let config = Config {
            default_timeout_secs: 0.2,
            poll_interval_ms: 10,
            settle_delay_ms: 0,
            ..Config::default()
        };
        LoginPage::new(BasePage::new(session.clone(), &config))
    }

    #[test]
    fn test_auth_url_detection() {
        assert!(is_auth_url("http://localhost/#/auth"));
        assert!(is_auth_url("http://localhost/#/AUTH/login"));
        assert!(is_auth_url("http://localhost/#/login"));
        assert!(!is_auth_url("http://localhost/#/pages/home"));
    }

    #[tokio::test]
    async fn test_open_falls_through_candidates() {
        let session = Arc::new(MockSession::new("about:blank"));
        session
            .add(NodeSpec::new(Locator::name("username")).route("#/auth/login"))
            .add(NodeSpec::new(Locator::name("password")).route("#/auth/login"));
        let page = login_page(&session);

        let paths: Vec<String> = ["/#/auth", "/#/auth/login"].iter().map(|s| s.to_string()).collect();
        let opened = page.open("http://localhost/", &paths).await.unwrap();
        assert_eq!(opened.as_deref(), Some("http://localhost/#/auth/login"));
        assert_eq!(
            session.navigations(),
            vec!["http://localhost/#/auth", "http://localhost/#/auth/login"]
        );
    }

    #[tokio::test]
    async fn test_open_reports_exhaustion() {
        let session = Arc::new(MockSession::new("about:blank"));
        let page = login_page(&session);
        let paths = vec!["/#/auth".to_string()];
        assert_eq!(page.open("http://localhost", &paths).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_submit_falls_back_to_enter() {
        let session = Arc::new(MockSession::new("http://localhost/#/auth"));
        session.add(
            NodeSpec::new(Locator::css("input[type='password']"))
                .on_enter(vec![Effect::Navigate("http://localhost/#/pages".into())]),
        );
        let page = login_page(&session);

        assert!(page.submit().await.unwrap());
        assert_eq!(session.url(), "http://localhost/#/pages");
        assert_eq!(
            page.wait_for_login_outcome(Duration::from_millis(50)).await.unwrap(),
            Some(LoginOutcome::UrlChanged("http://localhost/#/pages".into()))
        );
    }

    #[tokio::test]
    async fn test_marker_signal_and_error_banner() {
        let session = Arc::new(MockSession::new("http://localhost/#/auth"));
        session.add(NodeSpec::new(ERROR_MESSAGE).text("Invalid credentials"));
        let page = login_page(&session);

        assert_eq!(
            page.wait_for_login_outcome(Duration::from_millis(30)).await.unwrap(),
            None
        );
        assert_eq!(
            page.error_message().await.unwrap().as_deref(),
            Some("Invalid credentials")
        );

        session.add(NodeSpec::new(Locator::css("a[title='Logout']")));
        assert_eq!(
            page.wait_for_login_outcome(Duration::from_millis(30)).await.unwrap(),
            Some(LoginOutcome::MarkerPresent)
        );
    }

    #[tokio::test]
    async fn test_remember_me_and_clear_form() {
        let session = Arc::new(MockSession::new("http://localhost/#/auth"));
        session
            .add(NodeSpec::new(Locator::name("username")).key("user"))
            .add(NodeSpec::new(Locator::name("password")).key("pass"))
            .add(NodeSpec::new(REMEMBER_ME).key("remember"));
        let page = login_page(&session);

        assert!(page.click_remember_me().await.unwrap());
        assert_eq!(session.clicks_on("remember"), 1);

        assert!(page.enter_username("admin").await.unwrap());
        assert!(page.enter_password("secret").await.unwrap());
        assert_eq!(session.value_of("user").as_deref(), Some("admin"));

        assert!(page.clear_form().await.unwrap());
        assert_eq!(session.value_of("user").as_deref(), Some(""));
        assert_eq!(session.value_of("pass").as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_missing_remember_me_is_not_clicked() {
        let session = Arc::new(MockSession::new("http://localhost/#/auth"));
        let page = login_page(&session);
        assert!(!page.click_remember_me().await.unwrap());
    }
}
