//! Session bootstrap against the scripted admin panel

mod common;

use admin_pom::bootstrap::{with_authenticated_session, AuthState, AuthenticatedSession, Bootstrap};
use admin_pom::config::Language;
use admin_pom::pages::{HomeReadiness, LoginOutcome};
use admin_pom::session::{BrowserSession, MockSession};
use admin_pom::Error;
use common::{fast_config, AdminApp, MockLauncher, HOME_URL, LOGIN_ERROR};
use std::sync::Arc;

#[tokio::test]
async fn test_bootstrap_reaches_home() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config(dir.path());
    let session = Arc::new(AdminApp::default().session());

    let bootstrap = Bootstrap::new(session.clone(), &config);
    assert_eq!(bootstrap.state(), AuthState::LoggedOut);
    let report = bootstrap.run().await.unwrap();

    assert_eq!(report.login_url, "http://admin.test/#/auth");
    assert_eq!(report.login, LoginOutcome::UrlChanged(HOME_URL.to_string()));
    assert!(matches!(report.readiness, HomeReadiness::Indicator(_)));
    assert_eq!(report.language_before, Some(Language::English));
    assert!(!report.language_switched);
    assert!(!report.is_lenient());
    assert_eq!(session.url(), HOME_URL);
}

#[tokio::test]
async fn test_bootstrap_switches_french_ui_to_english() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config(dir.path());
    let app = AdminApp {
        language: Language::French,
        ..AdminApp::default()
    };
    let session = Arc::new(app.session());

    let report = Bootstrap::new(session.clone(), &config).run().await.unwrap();

    assert_eq!(report.language_before, Some(Language::French));
    assert_eq!(report.language_after, Some(Language::English));
    assert!(report.language_switched);
    assert_eq!(session.text_of("language").unwrap(), "Languages - (English)");
}

#[tokio::test]
async fn test_login_steps_advance_state() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config(dir.path());
    let session = Arc::new(AdminApp::default().session());

    let mut bootstrap = Bootstrap::new(session.clone(), &config);
    bootstrap.login().await.unwrap();
    assert_eq!(bootstrap.state(), AuthState::LoggedInHomeUnverified);
    bootstrap.verify_home().await.unwrap();
    assert_eq!(bootstrap.state(), AuthState::Ready);
}

#[tokio::test]
async fn test_wrong_password_is_rejected_with_banner_text() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = fast_config(dir.path());
    config.password = "wrong".to_string();
    let session = Arc::new(AdminApp::default().session());

    let err = Bootstrap::new(session.clone(), &config).run().await.unwrap_err();

    match err {
        Error::LoginRejected(message) => assert_eq!(message, LOGIN_ERROR),
        other => panic!("unexpected error: {}", other),
    }
    // A failed bootstrap leaves a screenshot behind.
    let shots: Vec<_> = std::fs::read_dir(&config.screenshots_dir).unwrap().collect();
    assert_eq!(shots.len(), 1);
}

#[tokio::test]
async fn test_missing_login_form_is_unreachable() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = fast_config(dir.path());
    config.login_paths = vec!["/#/nowhere".to_string(), "/#/also-nowhere".to_string()];
    let session = Arc::new(AdminApp::default().session());

    let err = Bootstrap::new(session.clone(), &config).run().await.unwrap_err();

    assert!(matches!(err, Error::LoginPageUnreachable(_)));
    assert_eq!(
        session.navigations(),
        vec!["http://admin.test/#/nowhere", "http://admin.test/#/also-nowhere"]
    );
}

#[tokio::test]
async fn test_later_login_path_is_used() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = fast_config(dir.path());
    config.login_paths = vec!["/#/nowhere".to_string(), "/#/auth/login".to_string()];
    let session = Arc::new(AdminApp::default().session());

    let report = Bootstrap::new(session, &config).run().await.unwrap();
    assert_eq!(report.login_url, "http://admin.test/#/auth/login");
}

#[tokio::test]
async fn test_silent_login_is_assumed_successful() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config(dir.path());
    let app = AdminApp {
        silent_submit: true,
        ..AdminApp::default()
    };
    let session = Arc::new(app.session());

    let report = Bootstrap::new(session, &config).run().await.unwrap();

    assert_eq!(report.login, LoginOutcome::AssumedSuccess);
    assert_eq!(report.readiness, HomeReadiness::Assumed);
    assert!(report.is_lenient());
}

#[tokio::test]
async fn test_closed_session_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config(dir.path());
    let session = Arc::new(MockSession::new("about:blank"));
    session.close().await.unwrap();

    let err = Bootstrap::new(session, &config).run().await.unwrap_err();
    assert!(err.is_session_fatal());
    assert!(!config.screenshots_dir.exists());
}

#[tokio::test]
async fn test_establish_releases_session_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = fast_config(dir.path());
    config.password = "wrong".to_string();
    let launcher = MockLauncher::new(AdminApp::default());

    let err = AuthenticatedSession::establish(&launcher, &config).await.unwrap_err();

    assert!(matches!(err, Error::LoginRejected(_)));
    let launched = launcher.launched();
    assert_eq!(launched.len(), 1);
    assert!(launched[0].is_closed());
}

#[tokio::test]
async fn test_fixture_releases_and_captures_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config(dir.path());
    let launcher = MockLauncher::new(AdminApp::default());

    let value = with_authenticated_session(&launcher, &config, "passing", |session| async move {
        assert!(session.session().is_active());
        Ok(session.report().language_after)
    })
    .await
    .unwrap();
    assert_eq!(value, Some(Language::English));

    let err = with_authenticated_session(&launcher, &config, "failing", |_session| async move {
        Err::<(), _>(Error::assertion("boom"))
    })
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Assertion(_)));

    let launched = launcher.launched();
    assert_eq!(launched.len(), 2);
    assert!(launched.iter().all(|s| s.is_closed()));

    let shots: Vec<String> = std::fs::read_dir(&config.screenshots_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(shots.len(), 1);
    assert!(shots[0].starts_with("failure_failing_"));
}
