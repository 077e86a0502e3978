//! Home screen: readiness and UI language

use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::Language;
use crate::locator::{By, Locator};
use crate::pages::base::BasePage;
use crate::Result;

/// Elements that show the home page has rendered
pub const HOME_INDICATORS: [Locator; 4] = [
    Locator::css("nb-layout-header"),
    Locator::css("nb-sidebar"),
    Locator::css(".dashboard"),
    Locator::css("a[href*='catalogue']"),
];

/// URL fragments that only appear past the login screen
pub const HOME_URL_KEYWORDS: [&str; 3] = ["pages", "dashboard", "home"];

/// Language switcher in the header; its text names the active language
pub const LANGUAGE_INDICATOR: Locator = Locator::css("nb-action[nbcontextmenutag='language']");

/// Entries of the open language menu
pub const LANGUAGE_MENU_ENTRIES: Locator = Locator::css("nb-context-menu nb-menu a");

/// Budget per readiness indicator
pub const INDICATOR_BUDGET: Duration = Duration::from_secs(2);

/// Budget per language menu strategy
pub const LANGUAGE_STRATEGY_BUDGET: Duration = Duration::from_millis(1500);

/// How the home page was judged ready
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HomeReadiness {
    /// A readiness indicator appeared
    Indicator(Locator),
    /// No indicator, but the URL contains a home keyword
    UrlKeyword(&'static str),
    /// Nothing conclusive; readiness is assumed
    Assumed,
}

/// Language named by the indicator text, if any.
///
/// French UIs list "Anglais" as an option, so "Français" wins when both
/// appear.
pub fn detect_language(text: &str) -> Option<Language> {
    let text = text.to_lowercase();
    if text.contains("français") || text.contains("francais") {
        Some(Language::French)
    } else if text.contains("english") || text.contains("anglais") {
        Some(Language::English)
    } else {
        None
    }
}

/// Labels a language's menu entry may carry, in either UI language
fn menu_labels(language: Language) -> &'static [&'static str] {
    match language {
        Language::English => &["Anglais", "English"],
        Language::French => &["Français", "French"],
    }
}

/// Ordered ways of finding the menu entry for `language`
fn menu_strategies(language: Language) -> Vec<Locator> {
    let labels = menu_labels(language);
    let mut strategies: Vec<Locator> = labels
        .iter()
        .map(|label| Locator::new(By::Css, format!("a[title='{}']", label)))
        .collect();
    strategies.extend(labels.iter().map(|label| {
        Locator::new(
            By::XPath,
            format!("//li[contains(normalize-space(.), '{}')]//a", label),
        )
    }));
    strategies
}

/// Home page object
#[derive(Debug, Clone)]
pub struct HomePage {
    base: BasePage,
}

impl HomePage {
    /// Home page over `base`
    pub fn new(base: BasePage) -> Self {
        Self { base }
    }

    /// Element layer
    pub fn base(&self) -> &BasePage {
        &self.base
    }

    /// Poll the readiness indicators until one appears or the page timeout
    /// runs out, then fall back to the URL and finally to assuming readiness
    pub async fn wait_until_ready(&self) -> Result<HomeReadiness> {
        let deadline = Instant::now() + self.base.timeout();

        loop {
            for indicator in &HOME_INDICATORS {
                let remaining = deadline.saturating_duration_since(Instant::now());
                let budget = INDICATOR_BUDGET.min(remaining);
                if self.base.within(budget).is_present(indicator).await? {
                    info!("Home page ready: {}", indicator);
                    return Ok(HomeReadiness::Indicator(indicator.clone()));
                }
            }
            if Instant::now() >= deadline {
                break;
            }
        }

        let url = self.base.current_url().await?.to_lowercase();
        if let Some(keyword) = HOME_URL_KEYWORDS.iter().find(|k| url.contains(*k)) {
            warn!("No home indicator found, URL {} contains {:?}", url, keyword);
            return Ok(HomeReadiness::UrlKeyword(*keyword));
        }

        warn!("Home page readiness inconclusive at {}, assuming loaded", url);
        Ok(HomeReadiness::Assumed)
    }

    /// Language shown by the header switcher
    pub async fn current_language(&self) -> Result<Option<Language>> {
        let text = self
            .base
            .capped(INDICATOR_BUDGET)
            .read_text(&LANGUAGE_INDICATOR)
            .await?;
        let language = detect_language(&text);
        debug!("Language indicator {:?} reads as {:?}", text, language);
        Ok(language)
    }

    /// Switch the UI to `target`.
    ///
    /// Returns whether the indicator shows `target` afterwards. Failing to
    /// switch is not an error.
    pub async fn switch_language(&self, target: Language) -> Result<bool> {
        if self.current_language().await? == Some(target) {
            debug!("Already in {:?}", target);
            return Ok(true);
        }

        if !self.base.capped(INDICATOR_BUDGET).click(&LANGUAGE_INDICATOR).await? {
            warn!("Language switcher not clickable");
            return Ok(false);
        }

        let quick = self.base.capped(LANGUAGE_STRATEGY_BUDGET);
        let mut clicked = None;
        for strategy in menu_strategies(target) {
            if quick.click(&strategy).await? {
                clicked = Some(strategy.to_string());
                break;
            }
        }

        if clicked.is_none() {
            // Last resort: any visible entry not naming the active language.
            let current = self.current_language().await?;
            let other = |text: &str| current.is_none() || detect_language(text) != current;
            if quick.click_where(&LANGUAGE_MENU_ENTRIES, other).await? {
                clicked = Some(LANGUAGE_MENU_ENTRIES.to_string());
            }
        }

        let Some(strategy) = clicked else {
            warn!("No language menu entry for {:?} could be clicked", target);
            return Ok(false);
        };

        self.base.settle().await;
        let switched = self.current_language().await? == Some(target);
        if switched {
            info!("Switched language to {:?} via {}", target, strategy);
        } else {
            warn!("Clicked {} but language is not {:?}", strategy, target);
        }
        Ok(switched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::session::{Effect, MockSession, NodeSpec};
    use std::sync::Arc;

    fn home_page(session: &Arc<MockSession>) -> HomePage {
        let config = Config {
            default_timeout_secs: 0.2,
            poll_interval_ms: 10,
            settle_delay_ms: 0,
            ..Config::default()
        };
        HomePage::new(BasePage::new(session.clone(), &config))
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language("Langues - (Français)"), Some(Language::French));
        assert_eq!(detect_language("Languages - (English)"), Some(Language::English));
        assert_eq!(detect_language("Anglais"), Some(Language::English));
        assert_eq!(detect_language("Français Anglais"), Some(Language::French));
        assert_eq!(detect_language(""), None);
    }

    #[tokio::test]
    async fn test_readiness_falls_back_to_url_then_assumption() {
        let session = Arc::new(MockSession::new("http://localhost/#/pages/home"));
        let page = home_page(&session);
        assert_eq!(
            page.wait_until_ready().await.unwrap(),
            HomeReadiness::UrlKeyword("pages")
        );

        let session = Arc::new(MockSession::new("http://localhost/#/somewhere"));
        let page = home_page(&session);
        assert_eq!(page.wait_until_ready().await.unwrap(), HomeReadiness::Assumed);
    }

    #[tokio::test]
    async fn test_readiness_by_indicator() {
        let session = Arc::new(MockSession::new("http://localhost/#/pages/home"));
        session.add(NodeSpec::new(Locator::css("nb-sidebar")).appears_after(Duration::from_millis(30)));
        let page = home_page(&session);
        assert_eq!(
            page.wait_until_ready().await.unwrap(),
            HomeReadiness::Indicator(Locator::css("nb-sidebar"))
        );
    }

    #[tokio::test]
    async fn test_switch_from_french_via_title() {
        let session = Arc::new(MockSession::new("http://localhost/#/pages/home"));
        session
            .add(
                NodeSpec::new(LANGUAGE_INDICATOR)
                    .key("lang")
                    .text("Langues - (Français)")
                    .on_click(vec![Effect::Show("menu".into())]),
            )
            .add(
                NodeSpec::new(Locator::css("a[title='Anglais']"))
                    .also(LANGUAGE_MENU_ENTRIES)
                    .key("menu")
                    .text("Anglais")
                    .detached()
                    .on_click(vec![Effect::SetText("lang".into(), "Languages - (English)".into())]),
            );
        let page = home_page(&session);

        assert_eq!(page.current_language().await.unwrap(), Some(Language::French));
        assert!(page.switch_language(Language::English).await.unwrap());
        assert_eq!(session.text_of("lang").as_deref(), Some("Languages - (English)"));
        assert_eq!(session.clicks_on("menu"), 1);
    }

    #[tokio::test]
    async fn test_already_in_target_language() {
        let session = Arc::new(MockSession::new("http://localhost/#/pages/home"));
        session.add(NodeSpec::new(LANGUAGE_INDICATOR).key("lang").text("Languages - (English)"));
        let page = home_page(&session);

        assert!(page.switch_language(Language::English).await.unwrap());
        assert_eq!(session.clicks_on("lang"), 0);
    }

    #[tokio::test]
    async fn test_switch_failure_is_not_an_error() {
        let session = Arc::new(MockSession::new("http://localhost/#/pages/home"));
        session.add(NodeSpec::new(LANGUAGE_INDICATOR).key("lang").text("Langues - (Français)"));
        let page = home_page(&session);

        assert!(!page.switch_language(Language::English).await.unwrap());
        assert_eq!(session.clicks_on("lang"), 1);
    }
}
