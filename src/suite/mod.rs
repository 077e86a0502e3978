//! # Scenario suite
//!
//! A registry of UI scenarios over the catalogue screens, a runner that gives
//! every scenario its own freshly bootstrapped session, and an HTML report.
//!
//! ## Module structure
//! - `scenarios`: what each scenario kind does
//! - `report`: self-contained HTML report writer

pub mod scenarios;
pub mod report;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::bootstrap::AuthenticatedSession;
use crate::config::Config;
use crate::pages::CatalogScreen;
use crate::session::SessionLauncher;
use crate::{Error, Result};

pub use report::write_html_report;

/// Filter value that matches nothing
pub const NON_EXISTENT_TERM: &str = "XYZNEVEREXISTS123";
/// SQL injection attempts
pub const SQL_PAYLOADS: [&str; 5] = [
    "'; DROP TABLE brands; --",
    "' OR '1'='1",
    "' UNION SELECT * FROM users --",
    "admin'--",
    "' OR 1=1 --",
];
/// Script and HTML injection attempts
pub const MARKUP_PAYLOADS: [&str; 10] = [
    "<script>alert('x')</script>",
    "<script>alert('test')</script>",
    "<img src=x onerror=alert('XSS')>",
    "javascript:alert('XSS')",
    "<svg onload=alert('XSS')>",
    "';alert('XSS');//",
    "<h1>test</h1>",
    "<b>bold</b>",
    "<iframe src='http://evil.com'></iframe>",
    "<div onclick='alert(1)'>click</div>",
];
/// Punctuation-heavy filter value
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";
/// Length of the oversized filter value
pub const LARGE_INPUT_LEN: usize = 1000;
/// Filter value typed before a page reset
pub const RESET_TERM: &str = "test";

/// Scenario category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Quick core checks
    Smoke,
    /// Broad functional checks
    Regression,
    /// Injection and input hardening
    Security,
    /// Login flow
    Auth,
}

impl Tag {
    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Smoke => "smoke",
            Tag::Regression => "regression",
            Tag::Security => "security",
            Tag::Auth => "auth",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "smoke" => Ok(Tag::Smoke),
            "regression" => Ok(Tag::Regression),
            "security" => Ok(Tag::Security),
            "auth" => Ok(Tag::Auth),
            other => Err(Error::configuration(format!("Unknown tag: {}", other))),
        }
    }
}

/// What a scenario checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioKind {
    /// Bootstrap leaves the session past the login screen
    LoginReachesHome,
    /// The screen opens and renders
    PageLoads,
    /// An empty filter does not narrow the table
    EmptyFilterShowsRows,
    /// A term that matches nothing empties the table
    NonExistentFilterShowsNoRows,
    /// A very long filter value is accepted
    LargeInputAccepted,
    /// A script tag typed into a filter never runs
    ScriptPayloadDoesNotExecute,
    /// An SQL fragment is treated as plain text
    SqlPayloadHandledSafely,
    /// Header clicks sort ascending, then descending
    SortAscendingThenDescending,
    /// Punctuation is accepted verbatim
    SpecialCharactersAccepted,
    /// Padding around a term does not break filtering
    LeadingTrailingSpaces,
    /// A term taken from the table keeps only rows containing it
    ValidSearchNarrowsRows,
    /// A third header click drops the sort
    SortBackToDefault,
    /// Sorting a filtered table keeps the filter and sorts the rest
    SortWithFilterApplied,
    /// Filtering a sorted table keeps the sort
    FilterWithSortApplied,
    /// A reload clears filters and sorting
    PageReset,
    /// The "create" button is shown above the table
    CreateButtonVisible,
    /// Every row carries edit and delete icons
    ActionButtonsPresent,
    /// The availability checkbox flips and flips back
    AvailabilityToggle,
}

impl ScenarioKind {
    /// Whether the kind needs a filter input
    pub fn needs_filter(&self) -> bool {
        matches!(
            self,
            ScenarioKind::EmptyFilterShowsRows
                | ScenarioKind::NonExistentFilterShowsNoRows
                | ScenarioKind::LargeInputAccepted
                | ScenarioKind::ScriptPayloadDoesNotExecute
                | ScenarioKind::SqlPayloadHandledSafely
                | ScenarioKind::SpecialCharactersAccepted
                | ScenarioKind::LeadingTrailingSpaces
                | ScenarioKind::ValidSearchNarrowsRows
                | ScenarioKind::SortWithFilterApplied
                | ScenarioKind::FilterWithSortApplied
        )
    }

    /// Whether the kind needs a sortable text column
    pub fn needs_sortable_column(&self) -> bool {
        matches!(
            self,
            ScenarioKind::SortAscendingThenDescending
                | ScenarioKind::SortBackToDefault
                | ScenarioKind::SortWithFilterApplied
                | ScenarioKind::FilterWithSortApplied
        )
    }

    fn slug(&self) -> &'static str {
        match self {
            ScenarioKind::LoginReachesHome => "login_reaches_home",
            ScenarioKind::PageLoads => "page_loads",
            ScenarioKind::EmptyFilterShowsRows => "empty_filter_shows_rows",
            ScenarioKind::NonExistentFilterShowsNoRows => "non_existent_filter_shows_no_rows",
            ScenarioKind::LargeInputAccepted => "large_input_accepted",
            ScenarioKind::ScriptPayloadDoesNotExecute => "script_payload_does_not_execute",
            ScenarioKind::SqlPayloadHandledSafely => "sql_payload_handled_safely",
            ScenarioKind::SortAscendingThenDescending => "sort_ascending_then_descending",
            ScenarioKind::SpecialCharactersAccepted => "special_characters_accepted",
            ScenarioKind::LeadingTrailingSpaces => "leading_trailing_spaces",
            ScenarioKind::ValidSearchNarrowsRows => "valid_search_narrows_rows",
            ScenarioKind::SortBackToDefault => "sort_back_to_default",
            ScenarioKind::SortWithFilterApplied => "sort_with_filter_applied",
            ScenarioKind::FilterWithSortApplied => "filter_with_sort_applied",
            ScenarioKind::PageReset => "page_reset",
            ScenarioKind::CreateButtonVisible => "create_button_visible",
            ScenarioKind::ActionButtonsPresent => "action_buttons_present",
            ScenarioKind::AvailabilityToggle => "availability_toggle",
        }
    }

    fn tags(&self) -> &'static [Tag] {
        match self {
            ScenarioKind::LoginReachesHome => &[Tag::Smoke, Tag::Auth],
            ScenarioKind::PageLoads
            | ScenarioKind::ValidSearchNarrowsRows
            | ScenarioKind::ActionButtonsPresent => &[Tag::Smoke, Tag::Regression],
            ScenarioKind::CreateButtonVisible => &[Tag::Smoke],
            ScenarioKind::EmptyFilterShowsRows
            | ScenarioKind::NonExistentFilterShowsNoRows
            | ScenarioKind::SortAscendingThenDescending
            | ScenarioKind::LeadingTrailingSpaces
            | ScenarioKind::SortBackToDefault
            | ScenarioKind::SortWithFilterApplied
            | ScenarioKind::FilterWithSortApplied
            | ScenarioKind::PageReset
            | ScenarioKind::AvailabilityToggle => &[Tag::Regression],
            ScenarioKind::LargeInputAccepted | ScenarioKind::SpecialCharactersAccepted => {
                &[Tag::Regression, Tag::Security]
            }
            ScenarioKind::ScriptPayloadDoesNotExecute | ScenarioKind::SqlPayloadHandledSafely => {
                &[Tag::Security]
            }
        }
    }
}

/// One registered scenario
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    /// Unique name, `<screen>::<kind>`
    pub name: String,
    /// Categories
    pub tags: Vec<Tag>,
    /// Screen under test
    pub screen: Option<CatalogScreen>,
    /// What is checked
    pub kind: ScenarioKind,
}

impl Scenario {
    /// Scenario of `kind`, optionally bound to `screen`
    pub fn new(kind: ScenarioKind, screen: Option<CatalogScreen>) -> Self {
        let name = match screen {
            Some(screen) => format!("{}::{}", screen, kind.slug()),
            None => format!("session::{}", kind.slug()),
        };
        Self {
            name,
            tags: kind.tags().to_vec(),
            screen,
            kind,
        }
    }

    /// Whether the scenario carries `tag`
    pub fn has_tag(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }
}

const SCREEN_KINDS: [ScenarioKind; 17] = [
    ScenarioKind::PageLoads,
    ScenarioKind::CreateButtonVisible,
    ScenarioKind::ActionButtonsPresent,
    ScenarioKind::ValidSearchNarrowsRows,
    ScenarioKind::EmptyFilterShowsRows,
    ScenarioKind::NonExistentFilterShowsNoRows,
    ScenarioKind::LargeInputAccepted,
    ScenarioKind::ScriptPayloadDoesNotExecute,
    ScenarioKind::SqlPayloadHandledSafely,
    ScenarioKind::SortAscendingThenDescending,
    ScenarioKind::SortBackToDefault,
    ScenarioKind::SortWithFilterApplied,
    ScenarioKind::FilterWithSortApplied,
    ScenarioKind::SpecialCharactersAccepted,
    ScenarioKind::LeadingTrailingSpaces,
    ScenarioKind::AvailabilityToggle,
    ScenarioKind::PageReset,
];

/// Every scenario, in execution order.
///
/// Filter scenarios are only registered for screens with a filter; sort
/// scenarios only for screens with a sortable text column. Row action and
/// checkbox scenarios need the matching column.
pub fn catalog() -> Vec<Scenario> {
    let mut registry = vec![Scenario::new(ScenarioKind::LoginReachesHome, None)];

    let applicable: Vec<(ScenarioKind, Vec<CatalogScreen>)> = SCREEN_KINDS
        .into_iter()
        .map(|kind| (kind, scenarios::screens_for(kind)))
        .collect();

    for screen in CatalogScreen::ALL {
        for (kind, screens) in &applicable {
            if screens.contains(&screen) {
                registry.push(Scenario::new(*kind, Some(screen)));
            }
        }
    }

    registry
}

/// Which scenarios to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Everything
    All,
    /// Scenarios carrying the tag
    Tagged(Tag),
    /// Scenarios of one screen, optionally narrowed to a tag
    Screen(CatalogScreen, Option<Tag>),
}

impl Selection {
    /// Same selection restricted to `screen`
    pub fn scoped(self, screen: CatalogScreen) -> Self {
        match self {
            Selection::All => Selection::Screen(screen, None),
            Selection::Tagged(tag) => Selection::Screen(screen, Some(tag)),
            Selection::Screen(_, tag) => Selection::Screen(screen, tag),
        }
    }

    /// Suite name used for the report file
    pub fn name(&self) -> String {
        match self {
            Selection::All => "all".to_string(),
            Selection::Tagged(tag) => tag.as_str().to_string(),
            Selection::Screen(screen, None) => screen.as_str().to_string(),
            Selection::Screen(screen, Some(tag)) => format!("{}_{}", screen, tag),
        }
    }

    /// Whether `scenario` is selected
    pub fn matches(&self, scenario: &Scenario) -> bool {
        match self {
            Selection::All => true,
            Selection::Tagged(tag) => scenario.has_tag(*tag),
            Selection::Screen(screen, tag) => {
                scenario.screen == Some(*screen) && tag.map_or(true, |t| scenario.has_tag(t))
            }
        }
    }

    /// Selected scenarios from the full catalog
    pub fn scenarios(&self) -> Vec<Scenario> {
        catalog().into_iter().filter(|s| self.matches(s)).collect()
    }
}

/// Scenario verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Every check held
    Passed,
    /// A check failed in the scenario body
    Failed,
    /// The session could not be set up
    Error,
}

impl Status {
    /// Uppercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Passed => "PASSED",
            Status::Failed => "FAILED",
            Status::Error => "ERROR",
        }
    }
}

/// Outcome of one scenario
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario name
    pub name: String,
    /// Scenario tags
    pub tags: Vec<Tag>,
    /// Verdict
    pub status: Status,
    /// Wall time including bootstrap
    pub duration: Duration,
    /// Failure reason
    pub message: Option<String>,
    /// Failure screenshot
    pub screenshot: Option<PathBuf>,
}

/// Outcome of a suite run
#[derive(Debug, Clone)]
pub struct SuiteReport {
    /// Suite name
    pub name: String,
    /// Start time
    pub started_at: chrono::DateTime<chrono::Local>,
    /// Total wall time
    pub duration: Duration,
    /// Per-scenario results, in execution order
    pub results: Vec<ScenarioResult>,
}

impl SuiteReport {
    /// Number of results with `status`
    pub fn count(&self, status: Status) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    /// Whether every scenario passed
    pub fn success(&self) -> bool {
        self.results.iter().all(|r| r.status == Status::Passed)
    }
}

/// Runs scenarios, one fresh session each
pub struct SuiteRunner {
    launcher: Arc<dyn SessionLauncher>,
    config: Config,
}

impl fmt::Debug for SuiteRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuiteRunner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SuiteRunner {
    /// Runner launching sessions through `launcher`
    pub fn new(launcher: Arc<dyn SessionLauncher>, config: Config) -> Self {
        Self { launcher, config }
    }

    /// Configuration every session is bootstrapped with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the selected scenarios in order, calling `on_result` after each
    pub async fn run<F>(&self, selection: Selection, mut on_result: F) -> SuiteReport
    where
        F: FnMut(&ScenarioResult),
    {
        let started_at = chrono::Local::now();
        let started = Instant::now();
        let scenarios = selection.scenarios();
        info!("Running {} {} scenarios", scenarios.len(), selection.name());

        let mut results = Vec::with_capacity(scenarios.len());
        for scenario in &scenarios {
            let result = self.run_scenario(scenario).await;
            on_result(&result);
            results.push(result);
        }

        SuiteReport {
            name: selection.name(),
            started_at,
            duration: started.elapsed(),
            results,
        }
    }

    /// Run one scenario with its own session
    pub async fn run_scenario(&self, scenario: &Scenario) -> ScenarioResult {
        let started = Instant::now();
        info!("Scenario {} started", scenario.name);

        let session = match AuthenticatedSession::establish(self.launcher.as_ref(), &self.config).await {
            Ok(session) => session,
            Err(e) => {
                error!("Scenario {} could not start: {}", scenario.name, e);
                return ScenarioResult {
                    name: scenario.name.clone(),
                    tags: scenario.tags.clone(),
                    status: Status::Error,
                    duration: started.elapsed(),
                    message: Some(e.to_string()),
                    screenshot: None,
                };
            }
        };

        let outcome = scenarios::execute(scenario, &session).await;

        let (status, message, screenshot) = match outcome {
            Ok(()) => (Status::Passed, None, None),
            Err(e) => {
                warn!("Scenario {} failed: {}", scenario.name, e);
                let screenshot = if session.session().is_active() {
                    session.capture_failure(&scenario.name).await
                } else {
                    None
                };
                (Status::Failed, Some(e.to_string()), screenshot)
            }
        };

        if let Err(e) = session.release().await {
            warn!("Failed to release session for {}: {}", scenario.name, e);
        }

        ScenarioResult {
            name: scenario.name.clone(),
            tags: scenario.tags.clone(),
            status,
            duration: started.elapsed(),
            message,
            screenshot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_names_are_unique() {
        let scenarios = catalog();
        let mut names: Vec<&str> = scenarios.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), scenarios.len());
    }

    #[test]
    fn test_option_sets_have_no_filter_scenarios() {
        let scenarios = catalog();
        let option_sets: Vec<&Scenario> = scenarios
            .iter()
            .filter(|s| s.screen == Some(CatalogScreen::OptionSets))
            .collect();
        assert!(option_sets.iter().all(|s| !s.kind.needs_filter()));
        assert!(option_sets
            .iter()
            .any(|s| s.kind == ScenarioKind::SortAscendingThenDescending));
    }

    #[test]
    fn test_selection_by_tag() {
        let security = Selection::Tagged(Tag::Security).scenarios();
        assert!(!security.is_empty());
        assert!(security.iter().all(|s| s.has_tag(Tag::Security)));
        assert!(security
            .iter()
            .any(|s| s.name == "brands::script_payload_does_not_execute"));

        let smoke = Selection::Tagged(Tag::Smoke).scenarios();
        assert_eq!(smoke[0].name, "session::login_reaches_home");
        assert_eq!(Selection::All.scenarios().len(), catalog().len());
    }

    #[test]
    fn test_selection_by_screen() {
        let brands = Selection::All.scoped(CatalogScreen::Brands);
        assert_eq!(brands.name(), "brands");
        let scenarios = brands.scenarios();
        assert!(!scenarios.is_empty());
        assert!(scenarios.iter().all(|s| s.screen == Some(CatalogScreen::Brands)));

        let smoke = Selection::Tagged(Tag::Smoke).scoped(CatalogScreen::Products);
        assert_eq!(smoke.name(), "products_smoke");
        let scenarios = smoke.scenarios();
        assert!(scenarios
            .iter()
            .all(|s| s.screen == Some(CatalogScreen::Products) && s.has_tag(Tag::Smoke)));
        assert!(scenarios.iter().any(|s| s.kind == ScenarioKind::CreateButtonVisible));

        // The login scenario belongs to no screen.
        assert!(Selection::Tagged(Tag::Auth)
            .scoped(CatalogScreen::Brands)
            .scenarios()
            .is_empty());
    }

    #[test]
    fn test_column_bound_kinds() {
        let scenarios = catalog();
        let screens_of = |kind: ScenarioKind| -> Vec<CatalogScreen> {
            scenarios
                .iter()
                .filter(|s| s.kind == kind)
                .filter_map(|s| s.screen)
                .collect()
        };
        assert_eq!(screens_of(ScenarioKind::AvailabilityToggle), vec![CatalogScreen::Products]);
        assert!(!screens_of(ScenarioKind::ActionButtonsPresent).contains(&CatalogScreen::Products));
        assert!(screens_of(ScenarioKind::ActionButtonsPresent).contains(&CatalogScreen::OptionSets));
        assert_eq!(screens_of(ScenarioKind::PageReset).len(), CatalogScreen::ALL.len());
        assert!(!screens_of(ScenarioKind::SortWithFilterApplied).contains(&CatalogScreen::OptionSets));
    }

    #[test]
    fn test_tag_parsing() {
        assert_eq!("Smoke".parse::<Tag>().unwrap(), Tag::Smoke);
        assert!("ui".parse::<Tag>().is_err());
    }
}
