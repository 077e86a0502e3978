//! Configuration management for Admin-POM
//!
//! Values come from process environment variables ([`Config::from_env`]) or a
//! TOML file ([`Config::from_file`]). Every field has a default so the suite
//! runs against a local Shopizer admin with no configuration at all.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Browser family the launcher drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    /// Google Chrome
    Chrome,
    /// Chromium
    Chromium,
    /// Microsoft Edge
    Edge,
    /// Mozilla Firefox (not drivable over CDP)
    Firefox,
}

impl BrowserKind {
    /// Lowercase name, as accepted by `BROWSER`
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chrome => "chrome",
            BrowserKind::Chromium => "chromium",
            BrowserKind::Edge => "edge",
            BrowserKind::Firefox => "firefox",
        }
    }

    /// Executable names looked up on `PATH` when no explicit path is configured
    pub fn executable_candidates(&self) -> &'static [&'static str] {
        match self {
            BrowserKind::Chrome => &["google-chrome", "google-chrome-stable", "chrome"],
            BrowserKind::Chromium => &["chromium", "chromium-browser"],
            BrowserKind::Edge => &["microsoft-edge", "microsoft-edge-stable", "msedge"],
            BrowserKind::Firefox => &["firefox"],
        }
    }
}

impl FromStr for BrowserKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "chrome" => Ok(BrowserKind::Chrome),
            "chromium" => Ok(BrowserKind::Chromium),
            "edge" => Ok(BrowserKind::Edge),
            "firefox" => Ok(BrowserKind::Firefox),
            other => Err(Error::configuration(format!("Invalid BROWSER: {}", other))),
        }
    }
}

/// UI language of the admin panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English
    English,
    /// French
    French,
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "english" | "en" => Ok(Language::English),
            "french" | "fr" => Ok(Language::French),
            other => Err(Error::configuration(format!(
                "Invalid TARGET_LANGUAGE: {}",
                other
            ))),
        }
    }
}

/// Deployment the suite points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// `BASE_URL`
    Base,
    /// `STAGING_URL`
    Staging,
}

/// Suite configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Browser family
    pub browser: BrowserKind,

    /// Run without a visible window
    pub headless: bool,

    /// Admin application root
    pub base_url: String,

    /// Staging application root
    pub staging_url: String,

    /// Login user name
    pub username: String,

    /// Login password
    pub password: String,

    /// Attach to an already running browser instead of spawning one
    pub cdp_endpoint: Option<String>,

    /// Browser executable override
    pub browser_path: Option<PathBuf>,

    /// Remote debugging port for spawned browsers
    pub debug_port: u16,

    /// Default wait for element-level operations (seconds)
    pub default_timeout_secs: f64,

    /// Longer wait for explicit synchronisation points (seconds)
    pub explicit_wait_secs: f64,

    /// Page load budget (seconds)
    pub page_load_timeout_secs: f64,

    /// Poll interval for wait loops (milliseconds)
    pub poll_interval_ms: u64,

    /// Fixed post-render settle delay (milliseconds)
    pub settle_delay_ms: u64,

    /// Screenshot output directory
    pub screenshots_dir: PathBuf,

    /// HTML report output directory
    pub reports_dir: PathBuf,

    /// Language the home page is normalised to
    pub target_language: Language,

    /// Ordered login URL suffixes tried against `base_url`
    pub login_paths: Vec<String>,

    /// Log level
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser: BrowserKind::Chrome,
            headless: false,
            base_url: "http://localhost".to_string(),
            staging_url: "https://staging.example.com".to_string(),
            username: "admin@shopizer.com".to_string(),
            password: "password".to_string(),
            cdp_endpoint: None,
            browser_path: None,
            debug_port: 9222,
            default_timeout_secs: 10.0,
            explicit_wait_secs: 15.0,
            page_load_timeout_secs: 30.0,
            poll_interval_ms: 500,
            settle_delay_ms: 1000,
            screenshots_dir: PathBuf::from("screenshots"),
            reports_dir: PathBuf::from("reports"),
            target_language: Language::English,
            login_paths: vec![
                "/#/auth".to_string(),
                "/#/auth/login".to_string(),
                "/#/login".to_string(),
            ],
            log_level: "INFO".to_string(),
        }
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_default()
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::configuration(format!("Invalid {}", name)))
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(browser) = lookup("BROWSER") {
            config.browser = browser.parse()?;
        }

        if let Some(headless) = lookup("HEADLESS") {
            config.headless = headless.trim().eq_ignore_ascii_case("true");
        }

        if let Some(base_url) = lookup("BASE_URL") {
            config.base_url = base_url;
        }

        if let Some(staging_url) = lookup("STAGING_URL") {
            config.staging_url = staging_url;
        }

        if let Some(username) = lookup("VALID_USERNAME") {
            config.username = username;
        }

        if let Some(password) = lookup("VALID_PASSWORD") {
            config.password = password;
        }

        if let Some(endpoint) = lookup("CDP_ENDPOINT") {
            config.cdp_endpoint = Some(endpoint);
        }

        if let Some(path) = lookup("BROWSER_PATH") {
            config.browser_path = Some(PathBuf::from(path));
        }

        if let Some(port) = lookup("DEBUG_PORT") {
            config.debug_port = parse_var("DEBUG_PORT", &port)?;
        }

        if let Some(timeout) = lookup("DEFAULT_TIMEOUT") {
            config.default_timeout_secs = parse_var("DEFAULT_TIMEOUT", &timeout)?;
        }

        if let Some(wait) = lookup("EXPLICIT_WAIT") {
            config.explicit_wait_secs = parse_var("EXPLICIT_WAIT", &wait)?;
        }

        if let Some(timeout) = lookup("PAGE_LOAD_TIMEOUT") {
            config.page_load_timeout_secs = parse_var("PAGE_LOAD_TIMEOUT", &timeout)?;
        }

        if let Some(interval) = lookup("POLL_INTERVAL_MS") {
            config.poll_interval_ms = parse_var("POLL_INTERVAL_MS", &interval)?;
        }

        if let Some(delay) = lookup("SETTLE_DELAY_MS") {
            config.settle_delay_ms = parse_var("SETTLE_DELAY_MS", &delay)?;
        }

        if let Some(dir) = lookup("SCREENSHOTS_DIR") {
            config.screenshots_dir = PathBuf::from(dir);
        }

        if let Some(dir) = lookup("REPORTS_DIR") {
            config.reports_dir = PathBuf::from(dir);
        }

        if let Some(language) = lookup("TARGET_LANGUAGE") {
            config.target_language = language.parse()?;
        }

        if let Some(log_level) = lookup("LOG_LEVEL") {
            config.log_level = log_level;
        }

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::configuration(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::configuration(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Application root for an environment
    pub fn url_for(&self, environment: Environment) -> &str {
        match environment {
            Environment::Staging => &self.staging_url,
            Environment::Base => &self.base_url,
        }
    }

    /// Absolute URL for a hash route such as `/#/pages/catalogue/brands/brands-list`
    pub fn route(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Default wait for element-level operations
    pub fn default_timeout(&self) -> Duration {
        seconds(self.default_timeout_secs)
    }

    /// Wait for explicit synchronisation points
    pub fn explicit_wait(&self) -> Duration {
        seconds(self.explicit_wait_secs)
    }

    /// Page load budget
    pub fn page_load_timeout(&self) -> Duration {
        seconds(self.page_load_timeout_secs)
    }

    /// Poll interval for wait loops
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Post-render settle delay
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}
