//! # Admin-POM runner
//!
//! Command line entry point: picks a scenario selection, runs it against the
//! configured admin panel and writes an HTML report.
//!
//! ## Commands
//! - `smoke`, `regression`, `security`, `auth`: scenarios carrying that tag
//! - `all`: every scenario
//! - `chrome`, `edge`, `firefox`: smoke scenarios in that browser
//! - `headless`: smoke scenarios without a window
//!
//! `--screen <name>` narrows any command to one catalogue screen
//! (`brands`, `product_types`, `options`, `option_sets`, `products`).
//!
//! ## Exit codes
//! - `0`: every scenario passed
//! - `1`: at least one scenario failed or could not start
//! - `2`: the run itself could not be set up
//!
//! ## Environment variables
//! - `BASE_URL`, `STAGING_URL`: application roots
//! - `VALID_USERNAME`, `VALID_PASSWORD`: login credentials
//! - `BROWSER`, `HEADLESS`, `BROWSER_PATH`, `CDP_ENDPOINT`: browser selection
//! - `LOG_LEVEL`: log level when `RUST_LOG` is unset

use admin_pom::{
    config::{BrowserKind, Config, Environment},
    pages::CatalogScreen,
    session::CdpLauncher,
    suite::{write_html_report, ScenarioResult, Selection, Status, SuiteRunner, Tag},
};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "admin-pom", version, about = "Shopizer admin panel UI scenarios")]
#[command(arg_required_else_help = true)]
struct Cli {
    /// TOML configuration file; environment variables are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Point the run at STAGING_URL instead of BASE_URL
    #[arg(long, global = true)]
    staging: bool,

    /// Only run scenarios of this catalogue screen
    #[arg(long, global = true, value_parser = parse_screen)]
    screen: Option<CatalogScreen>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Quick core checks
    Smoke,
    /// Injection and input hardening checks
    Security,
    /// Broad functional checks
    Regression,
    /// Login flow checks
    Auth,
    /// Every scenario
    All,
    /// Smoke scenarios in Chrome
    Chrome,
    /// Smoke scenarios in Firefox
    Firefox,
    /// Smoke scenarios in Edge
    Edge,
    /// Smoke scenarios without a browser window
    Headless,
}

fn parse_screen(value: &str) -> Result<CatalogScreen, String> {
    value.parse().map_err(|e: admin_pom::Error| e.to_string())
}

impl Cli {
    fn selection(&self) -> Selection {
        let selection = self.command.selection();
        match self.screen {
            Some(screen) => selection.scoped(screen),
            None => selection,
        }
    }
}

impl Command {
    fn selection(self) -> Selection {
        match self {
            Command::Security => Selection::Tagged(Tag::Security),
            Command::Regression => Selection::Tagged(Tag::Regression),
            Command::Auth => Selection::Tagged(Tag::Auth),
            Command::All => Selection::All,
            Command::Smoke | Command::Chrome | Command::Firefox | Command::Edge | Command::Headless => {
                Selection::Tagged(Tag::Smoke)
            }
        }
    }

    fn apply(self, config: &mut Config) {
        match self {
            Command::Chrome => config.browser = BrowserKind::Chrome,
            Command::Firefox => config.browser = BrowserKind::Firefox,
            Command::Edge => config.browser = BrowserKind::Edge,
            Command::Headless => config.headless = true,
            _ => {}
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(&path.to_string_lossy())
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::from_env().context("reading environment")?,
    };
    if cli.staging {
        config.base_url = config.url_for(Environment::Staging).to_string();
    }
    cli.command.apply(&mut config);
    Ok(config)
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.to_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn print_result(result: &ScenarioResult) {
    let marker = match result.status {
        Status::Passed => "ok",
        Status::Failed => "FAILED",
        Status::Error => "ERROR",
    };
    println!(
        "{:<60} {:<6} {:>7.2}s",
        result.name,
        marker,
        result.duration.as_secs_f64()
    );
    if let Some(message) = &result.message {
        println!("    {}", message);
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = load_config(&cli)?;
    init_tracing(&config);

    info!("Admin-POM v{}", admin_pom::VERSION);
    info!(
        "Configuration loaded: base_url={}, browser={}, headless={}",
        config.base_url,
        config.browser.as_str(),
        config.headless
    );

    let reports_dir = config.reports_dir.clone();
    let runner = SuiteRunner::new(Arc::new(CdpLauncher::new()), config);
    let report = runner.run(cli.selection(), print_result).await;

    println!(
        "\n{} passed, {} failed, {} errors in {:.1}s",
        report.count(Status::Passed),
        report.count(Status::Failed),
        report.count(Status::Error),
        report.duration.as_secs_f64()
    );

    let path = write_html_report(&reports_dir, &report)
        .await
        .context("writing HTML report")?;
    println!("Report: {}", path.display());

    Ok(report.success())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("admin-pom: {:#}", e);
            ExitCode::from(2)
        }
    }
}
