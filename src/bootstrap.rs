//! Session bootstrap
//!
//! Turns a fresh browser session into one that is logged in, on a rendered
//! home page and in the configured UI language. Login problems are fatal;
//! readiness and language problems are logged and tolerated.
//!
//! The authentication state is tracked explicitly as an [`AuthState`]. The
//! lenient fallbacks ([`LoginOutcome::AssumedSuccess`],
//! [`HomeReadiness::Assumed`]) are explicit transitions and are logged as
//! warnings.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::config::{Config, Language};
use crate::pages::{BasePage, CatalogPage, CatalogScreen, HomePage, HomeReadiness, LoginOutcome, LoginPage};
use crate::session::{BrowserSession, SessionLauncher};
use crate::{Error, Result};

/// Authentication progress of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No credentials submitted yet
    LoggedOut,
    /// Credentials submitted, outcome pending
    LoggingIn,
    /// Logged in, home page not yet confirmed
    LoggedInHomeUnverified,
    /// Logged in on a rendered home page
    Ready,
}

/// What the bootstrap observed
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapReport {
    /// Login URL that showed the form
    pub login_url: String,
    /// How login success was decided
    pub login: LoginOutcome,
    /// How home readiness was decided
    pub readiness: HomeReadiness,
    /// Language before normalisation
    pub language_before: Option<Language>,
    /// Language after normalisation
    pub language_after: Option<Language>,
    /// Whether a language switch was performed and took effect
    pub language_switched: bool,
    /// Time spent bootstrapping
    pub elapsed: Duration,
}

impl BootstrapReport {
    /// Whether any step fell back to an assumption
    pub fn is_lenient(&self) -> bool {
        self.login.is_assumed() || self.readiness == HomeReadiness::Assumed
    }
}

/// Login, home readiness and language normalisation over one session
#[derive(Debug)]
pub struct Bootstrap<'a> {
    config: &'a Config,
    base: BasePage,
    state: AuthState,
}

impl<'a> Bootstrap<'a> {
    /// Bootstrap `session` with `config`
    pub fn new(session: Arc<dyn BrowserSession>, config: &'a Config) -> Self {
        Self {
            base: BasePage::new(session, config),
            config,
            state: AuthState::LoggedOut,
        }
    }

    /// Current state
    pub fn state(&self) -> AuthState {
        self.state
    }

    fn transition(&mut self, next: AuthState) {
        info!("Auth state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Open the login form, submit credentials and decide the outcome
    pub async fn login(&mut self) -> Result<(String, LoginOutcome)> {
        let login = LoginPage::new(self.base.clone());

        let Some(login_url) = login.open(&self.config.base_url, &self.config.login_paths).await? else {
            return Err(Error::login_page_unreachable(format!(
                "No login form at {} under {}",
                self.config.login_paths.join(", "),
                self.config.base_url
            )));
        };

        if !login.enter_username(&self.config.username).await?
            || !login.enter_password(&self.config.password).await?
        {
            return Err(Error::login_page_unreachable(format!(
                "Login form at {} does not accept credentials",
                login_url
            )));
        }

        self.transition(AuthState::LoggingIn);
        if !login.submit().await? {
            warn!("Neither a submit control nor Enter could submit the form");
        }

        let outcome = match login.wait_for_login_outcome(self.config.default_timeout()).await? {
            Some(outcome) => outcome,
            None => {
                if let Some(message) = login.error_message().await? {
                    return Err(Error::login_rejected(message));
                }
                warn!("No login signal and no error shown, assuming login succeeded");
                LoginOutcome::AssumedSuccess
            }
        };

        info!("Logged in ({:?})", outcome);
        self.transition(AuthState::LoggedInHomeUnverified);
        self.base.settle().await;
        Ok((login_url, outcome))
    }

    /// Confirm the home page rendered
    pub async fn verify_home(&mut self) -> Result<HomeReadiness> {
        let readiness = HomePage::new(self.base.clone()).wait_until_ready().await?;
        self.transition(AuthState::Ready);
        Ok(readiness)
    }

    /// Bring the UI to the configured language; never fails on a missed switch
    pub async fn normalize_language(&self) -> Result<(Option<Language>, Option<Language>, bool)> {
        let home = HomePage::new(self.base.clone());
        let target = self.config.target_language;

        let before = home.current_language().await?;
        if before == Some(target) {
            return Ok((before, before, false));
        }

        let switched = home.switch_language(target).await?;
        if !switched {
            warn!("Could not switch language from {:?} to {:?}", before, target);
        }
        let after = home.current_language().await?;
        Ok((before, after, switched))
    }

    /// Run every step; fatal failures leave a screenshot behind
    pub async fn run(mut self) -> Result<BootstrapReport> {
        let started = Instant::now();

        match self.steps().await {
            Ok(mut report) => {
                report.elapsed = started.elapsed();
                info!("Session ready in {:?}", report.elapsed);
                Ok(report)
            }
            Err(e) => {
                error!("Bootstrap failed in state {:?}: {}", self.state, e);
                if !e.is_session_fatal() {
                    match self.base.screenshot("bootstrap_failure").await {
                        Ok(path) => info!("Bootstrap failure screenshot: {}", path.display()),
                        Err(shot) => warn!("Could not capture bootstrap failure: {}", shot),
                    }
                }
                Err(e)
            }
        }
    }

    async fn steps(&mut self) -> Result<BootstrapReport> {
        let (login_url, login) = self.login().await?;
        let readiness = self.verify_home().await?;
        let (language_before, language_after, language_switched) = self.normalize_language().await?;

        Ok(BootstrapReport {
            login_url,
            login,
            readiness,
            language_before,
            language_after,
            language_switched,
            elapsed: Duration::ZERO,
        })
    }
}

/// A logged-in session owned by one scenario
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    session: Arc<dyn BrowserSession>,
    config: Arc<Config>,
    report: BootstrapReport,
}

impl AuthenticatedSession {
    /// Launch a session and bootstrap it. The session is released again if
    /// bootstrapping fails.
    pub async fn establish(launcher: &dyn SessionLauncher, config: &Config) -> Result<Self> {
        let session = launcher.launch(config).await?;

        match Bootstrap::new(Arc::clone(&session), config).run().await {
            Ok(report) => Ok(Self {
                session,
                config: Arc::new(config.clone()),
                report,
            }),
            Err(e) => {
                if let Err(close_err) = session.close().await {
                    warn!("Failed to release session after bootstrap failure: {}", close_err);
                }
                Err(e)
            }
        }
    }

    /// Browser session
    pub fn session(&self) -> &Arc<dyn BrowserSession> {
        &self.session
    }

    /// Configuration the session was bootstrapped with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Bootstrap observations
    pub fn report(&self) -> &BootstrapReport {
        &self.report
    }

    /// Element layer over this session
    pub fn base_page(&self) -> BasePage {
        BasePage::new(Arc::clone(&self.session), &self.config)
    }

    /// Home page object
    pub fn home_page(&self) -> HomePage {
        HomePage::new(self.base_page())
    }

    /// Catalogue page object for `screen`
    pub fn catalog_page(&self, screen: CatalogScreen) -> CatalogPage {
        CatalogPage::new(self.base_page(), &self.config, screen)
    }

    /// Save a `failure_<name>` screenshot; `None` if it could not be taken
    pub async fn capture_failure(&self, name: &str) -> Option<PathBuf> {
        match self.base_page().screenshot(&format!("failure_{}", name)).await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Could not capture failure screenshot for {}: {}", name, e);
                None
            }
        }
    }

    /// Close the browser session
    pub async fn release(self) -> Result<()> {
        info!("Releasing session {}", self.session.id());
        self.session.close().await
    }
}

/// Run `body` with a freshly bootstrapped session.
///
/// A failing body leaves a `failure_<name>` screenshot. The session is
/// released whatever the outcome.
pub async fn with_authenticated_session<F, Fut, T>(
    launcher: &dyn SessionLauncher,
    config: &Config,
    name: &str,
    body: F,
) -> Result<T>
where
    F: FnOnce(AuthenticatedSession) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let session = AuthenticatedSession::establish(launcher, config).await?;
    let result = body(session.clone()).await;

    if result.is_err() && session.session().is_active() {
        session.capture_failure(name).await;
    }
    if let Err(e) = session.release().await {
        warn!("Failed to release session for {}: {}", name, e);
    }
    result
}
