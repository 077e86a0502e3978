//! Browser session launcher
//!
//! Attaches to `CDP_ENDPOINT` when one is configured, otherwise spawns a
//! Chromium-family browser with remote debugging enabled and waits for its
//! DevTools endpoint.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::process::{Child, Command};
use tokio::time::Duration;
use tracing::{debug, info, warn};

use crate::cdp::{CdpBrowser, CdpBrowserImpl};
use crate::config::{BrowserKind, Config};
use crate::session::cdp::CdpSession;
use crate::session::traits::{BrowserSession, SessionLauncher};
use crate::wait::Wait;
use crate::{Error, Result};

/// Launches [`CdpSession`]s
#[derive(Debug, Clone, Default)]
pub struct CdpLauncher;

impl CdpLauncher {
    /// Create a launcher
    pub fn new() -> Self {
        Self
    }

    /// Command line for a spawned browser
    pub fn browser_args(config: &Config, user_data_dir: &std::path::Path) -> Vec<String> {
        let mut args = vec![
            format!("--remote-debugging-port={}", config.debug_port),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--window-size=1920,1080".to_string(),
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            format!("--user-data-dir={}", user_data_dir.display()),
        ];
        if config.headless {
            args.push("--headless=new".to_string());
        }
        args.push("about:blank".to_string());
        args
    }

    /// Fresh user-data directory, deleted when the returned guard drops
    pub fn profile_dir() -> Result<TempDir> {
        Ok(tempfile::Builder::new().prefix("admin-pom-").tempdir()?)
    }

    fn spawn(config: &Config) -> Result<(Child, TempDir)> {
        let candidates: Vec<PathBuf> = match &config.browser_path {
            Some(path) => vec![path.clone()],
            None => config
                .browser
                .executable_candidates()
                .iter()
                .map(PathBuf::from)
                .collect(),
        };

        let profile = Self::profile_dir()?;
        let args = Self::browser_args(config, profile.path());

        let mut last_error = None;
        for executable in &candidates {
            debug!("Trying browser executable {}", executable.display());
            match Command::new(executable)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .spawn()
            {
                Ok(child) => {
                    info!("Spawned {} (pid {:?})", executable.display(), child.id());
                    return Ok((child, profile));
                }
                Err(e) => last_error = Some(format!("{}: {}", executable.display(), e)),
            }
        }

        Err(Error::configuration(format!(
            "Could not start {}. Set BROWSER_PATH or CDP_ENDPOINT. Last error: {}",
            config.browser.as_str(),
            last_error.unwrap_or_else(|| "no candidate executable".to_string())
        )))
    }

    async fn open_page(browser: Arc<dyn CdpBrowser>) -> Result<CdpSession> {
        let target = browser.create_target("about:blank").await?;
        let client = browser.create_client(&target.ws_url).await?;
        Ok(CdpSession::attach(client)
            .await?
            .with_target(browser, target.target_id))
    }
}

#[async_trait]
impl SessionLauncher for CdpLauncher {
    async fn launch(&self, config: &Config) -> Result<Arc<dyn BrowserSession>> {
        if config.browser == BrowserKind::Firefox {
            return Err(Error::configuration(
                "Firefox cannot be driven over the DevTools protocol; use chrome, chromium or edge",
            ));
        }

        if let Some(endpoint) = &config.cdp_endpoint {
            info!("Attaching to running browser at {}", endpoint);
            let browser: Arc<dyn CdpBrowser> =
                Arc::new(CdpBrowserImpl::new(endpoint.as_str()).with_load_timeout(config.page_load_timeout()));
            let session = Self::open_page(browser).await?;
            return Ok(Arc::new(session));
        }

        let (mut child, profile) = Self::spawn(config)?;
        let endpoint = format!("http://127.0.0.1:{}", config.debug_port);
        let browser = Arc::new(CdpBrowserImpl::new(endpoint.as_str()).with_load_timeout(config.page_load_timeout()));

        let wait = Wait::new(config.page_load_timeout(), Duration::from_millis(200));
        let endpoint_browser = &browser;
        let version = wait
            .until(|| async move { Ok(endpoint_browser.get_version().await.ok()) })
            .await?;

        let Some(version) = version else {
            if let Err(e) = child.kill().await {
                warn!("Failed to stop browser process: {}", e);
            }
            return Err(Error::timeout(format!(
                "DevTools endpoint {} not available after {:?}",
                endpoint,
                config.page_load_timeout()
            )));
        };
        info!("Browser ready: {}", version.product);

        let browser: Arc<dyn CdpBrowser> = browser;
        match Self::open_page(browser).await {
            Ok(session) => Ok(Arc::new(session.with_process(child, profile))),
            Err(e) => {
                if let Err(kill_err) = child.kill().await {
                    warn!("Failed to stop browser process: {}", kill_err);
                }
                Err(e)
            }
        }
    }
}
