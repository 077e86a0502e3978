//! Common test utilities
//!
//! A scripted Shopizer admin panel on top of [`MockSession`]: login form,
//! home page with a language switcher and every catalogue list screen.

#![allow(dead_code)]

use admin_pom::config::{Config, Language};
use admin_pom::locator::Locator;
use admin_pom::pages::catalog::{CREATE_BUTTON, NO_DATA_MESSAGE, PAGINATION_INFO, TABLE_CELLS, TABLE_ROWS};
use admin_pom::pages::home::{LANGUAGE_INDICATOR, LANGUAGE_MENU_ENTRIES};
use admin_pom::pages::login::ERROR_MESSAGE;
use admin_pom::pages::{CatalogScreen, CellKind};
use admin_pom::session::{
    BrowserSession, Effect, MockColumn, MockRow, MockSession, NodeSpec, SessionLauncher, TableSpec,
};
use admin_pom::{Error, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::time::Duration;

pub const BASE_URL: &str = "http://admin.test";
pub const USERNAME: &str = "admin@shopizer.com";
pub const PASSWORD: &str = "password";
pub const HOME_URL: &str = "http://admin.test/#/pages/home";
pub const LOGIN_ERROR: &str = "Invalid username or password";

/// Names used to fill text cells; unsorted on purpose
pub const ROW_NAMES: [&str; 3] = ["Nike", "Adidas", "Puma"];
/// Pagination counter shown below the brands table
pub const BRANDS_PAGE_COUNTS: &str = "1 - 3 of 3";

/// Config with budgets small enough for tests
pub fn fast_config(screenshots: &Path) -> Config {
    Config {
        base_url: BASE_URL.to_string(),
        username: USERNAME.to_string(),
        password: PASSWORD.to_string(),
        default_timeout_secs: 0.3,
        explicit_wait_secs: 0.3,
        page_load_timeout_secs: 0.3,
        poll_interval_ms: 10,
        settle_delay_ms: 0,
        screenshots_dir: screenshots.join("screenshots"),
        reports_dir: screenshots.join("reports"),
        ..Config::default()
    }
}

/// Shape of the fake admin panel
#[derive(Debug, Clone)]
pub struct AdminApp {
    /// Language the UI starts in
    pub language: Language,
    /// Filter inputs execute typed `<script>` tags
    pub xss_sink: bool,
    /// The submit button does nothing at all
    pub silent_submit: bool,
    /// Every catalogue table starts without rows
    pub empty_tables: bool,
    /// Filter inputs hold their text but never narrow the table
    pub inert_filters: bool,
    /// Filter inputs drop every keystroke
    pub blank_inputs: bool,
}

impl Default for AdminApp {
    fn default() -> Self {
        Self {
            language: Language::English,
            xss_sink: false,
            silent_submit: false,
            empty_tables: false,
            inert_filters: false,
            blank_inputs: false,
        }
    }
}

fn route_of(screen: CatalogScreen) -> &'static str {
    screen.descriptor().route.trim_start_matches('/')
}

fn indicator_text(language: Language) -> &'static str {
    match language {
        Language::English => "Languages - (English)",
        Language::French => "Langues - (Français)",
    }
}

/// Cell text for `column` of row `index`
pub fn cell_value(column: &str, index: usize) -> String {
    let name = ROW_NAMES[index % ROW_NAMES.len()];
    match column {
        "id" => (index + 1).to_string(),
        "qty" => ((index + 1) * 10).to_string(),
        "price" => format!("{}.99", (ROW_NAMES.len() - index) * 5),
        _ => format!("{} {}", name, column),
    }
}

impl AdminApp {
    /// Fresh session showing a blank page
    pub fn session(&self) -> MockSession {
        let session = MockSession::new("about:blank");
        self.add_login(&session);
        self.add_home(&session);
        for screen in CatalogScreen::ALL {
            self.add_screen(&session, screen);
        }
        session
    }

    fn add_login(&self, session: &MockSession) {
        let succeed = vec![Effect::NavigateAfter(HOME_URL.to_string(), Duration::from_millis(20))];
        let reject = vec![Effect::Show("login_error".to_string())];
        let on_submit = if self.silent_submit {
            Vec::new()
        } else {
            vec![Effect::When {
                key: "username".to_string(),
                equals: USERNAME.to_string(),
                then: vec![Effect::When {
                    key: "password".to_string(),
                    equals: PASSWORD.to_string(),
                    then: succeed,
                    otherwise: reject.clone(),
                }],
                otherwise: reject,
            }]
        };

        session
            .add(
                NodeSpec::new(Locator::css("input[placeholder='Username']"))
                    .also(Locator::name("username"))
                    .key("username")
                    .route("#/auth"),
            )
            .add(
                NodeSpec::new(Locator::css("input[placeholder='Password']"))
                    .also(Locator::css("input[type='password']"))
                    .key("password")
                    .route("#/auth"),
            )
            .add(
                NodeSpec::new(Locator::css("button[type='submit']"))
                    .key("submit")
                    .text("LOGIN")
                    .route("#/auth")
                    .on_click(on_submit),
            )
            .add(
                NodeSpec::new(ERROR_MESSAGE)
                    .key("login_error")
                    .text(LOGIN_ERROR)
                    .route("#/auth")
                    .detached(),
            );
    }

    fn add_home(&self, session: &MockSession) {
        session
            .add(NodeSpec::new(Locator::css("nb-layout-header")).route("#/pages"))
            .add(NodeSpec::new(Locator::css("nb-sidebar")).route("#/pages"))
            .add(
                NodeSpec::new(LANGUAGE_INDICATOR)
                    .key("language")
                    .text(indicator_text(self.language))
                    .route("#/pages")
                    .on_click(vec![Effect::Show("language_menu".to_string())]),
            )
            .add(
                NodeSpec::new(Locator::css("nb-context-menu"))
                    .key("language_menu")
                    .route("#/pages")
                    .detached(),
            )
            .add(
                NodeSpec::new(Locator::css("a[title='Anglais']"))
                    .also(LANGUAGE_MENU_ENTRIES)
                    .parent("language_menu")
                    .text("Anglais")
                    .on_click(vec![
                        Effect::SetText("language".to_string(), indicator_text(Language::English).to_string()),
                        Effect::Hide("language_menu".to_string()),
                    ]),
            )
            .add(
                NodeSpec::new(Locator::css("a[title='Français']"))
                    .also(LANGUAGE_MENU_ENTRIES)
                    .parent("language_menu")
                    .text("Français")
                    .on_click(vec![
                        Effect::SetText("language".to_string(), indicator_text(Language::French).to_string()),
                        Effect::Hide("language_menu".to_string()),
                    ]),
            );
    }

    fn add_screen(&self, session: &MockSession, screen: CatalogScreen) {
        let descriptor = screen.descriptor();
        let route = route_of(screen);
        let table = screen.as_str();
        let no_data = format!("{}_no_data", table);

        for field in descriptor.filters {
            let column = descriptor.column(field.column).map(|(i, _)| i).unwrap_or(0);
            let mut node = NodeSpec::new(field.input.clone())
                .key(&format!("{}_{}", table, field.name))
                .route(route);
            if !self.inert_filters {
                node = node.filters(table, column);
            }
            if self.xss_sink {
                node = node.renders_markup();
            }
            if self.blank_inputs {
                node = node.discards_input();
            }
            session.add(node);
        }

        for (index, column) in descriptor.columns.iter().enumerate() {
            if let Some(header) = &column.header {
                session.add(
                    NodeSpec::new(header.clone())
                        .key(&format!("{}_header_{}", table, column.name))
                        .route(route)
                        .sorts(table, index),
                );
            }
        }

        session
            .add(NodeSpec::new(CREATE_BUTTON).route(route).text("Create"))
            .add(
                NodeSpec::new(NO_DATA_MESSAGE)
                    .key(&no_data)
                    .route(route)
                    .text("No data found")
                    .detached(),
            );

        let columns: Vec<MockColumn> = descriptor
            .columns
            .iter()
            .map(|c| match c.cell {
                CellKind::Text => MockColumn::Text,
                CellKind::Actions => MockColumn::Actions,
                CellKind::Checkbox => MockColumn::Checkbox,
            })
            .collect();

        if screen == CatalogScreen::Brands {
            session.add(NodeSpec::new(PAGINATION_INFO).route(route).text(BRANDS_PAGE_COUNTS));
        }

        let row_count = if self.empty_tables { 0 } else { ROW_NAMES.len() };
        let rows = (0..row_count)
            .map(|i| {
                let cells: Vec<String> = descriptor
                    .columns
                    .iter()
                    .map(|c| match c.cell {
                        CellKind::Text => cell_value(c.name, i),
                        _ => String::new(),
                    })
                    .collect();
                MockRow::new(cells).checked(i % 2 == 0)
            })
            .collect();

        session.add_table(
            TableSpec {
                key: table.to_string(),
                route: Some(route.to_string()),
                row: TABLE_ROWS,
                cell: TABLE_CELLS,
                edit: Locator::css("i.nb-edit"),
                trash: Locator::css("i.nb-trash"),
                checkbox: Locator::css("input[type='checkbox']"),
                columns,
                no_data_key: Some(no_data),
            },
            rows,
        );
    }
}

/// Launcher handing out scripted sessions and remembering them
pub struct MockLauncher {
    app: AdminApp,
    launched: Mutex<Vec<Arc<MockSession>>>,
    fail_with: Option<String>,
}

impl MockLauncher {
    pub fn new(app: AdminApp) -> Self {
        Self {
            app,
            launched: Mutex::new(Vec::new()),
            fail_with: None,
        }
    }

    /// Launcher whose every launch fails
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::new(AdminApp::default())
        }
    }

    /// Sessions launched so far
    pub fn launched(&self) -> Vec<Arc<MockSession>> {
        self.launched.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionLauncher for MockLauncher {
    async fn launch(&self, _config: &Config) -> Result<Arc<dyn BrowserSession>> {
        if let Some(message) = &self.fail_with {
            return Err(Error::configuration(message.clone()));
        }
        let session = Arc::new(self.app.session());
        self.launched.lock().unwrap().push(Arc::clone(&session));
        Ok(session)
    }
}
