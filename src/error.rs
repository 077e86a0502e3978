//! Unified error types for Admin-POM

use thiserror::Error;

/// Unified Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for Admin-POM
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket errors
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// CDP protocol errors
    #[error("CDP error: {0}")]
    Cdp(String),

    /// HTTP discovery errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The browser session has been released or its transport is gone
    #[error("Session closed: {0}")]
    SessionClosed(String),

    /// An element handle no longer refers to a node in the document
    #[error("Stale element: {0}")]
    StaleElement(String),

    /// Element not found
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Timeout
    #[error("Operation timeout: {0}")]
    Timeout(String),

    /// Navigation failed
    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    /// Script execution failed
    #[error("Script execution failed: {0}")]
    ScriptExecutionFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// None of the candidate login URLs exposed a login form
    #[error("Login page unreachable: {0}")]
    LoginPageUnreachable(String),

    /// The application displayed an authentication error
    #[error("Login rejected: {0}")]
    LoginRejected(String),

    /// A scenario check did not hold
    #[error("Assertion failed: {0}")]
    Assertion(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse failure classes reported by the suite runner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Authentication could not be established; the scenario never ran
    SetupFatal,
    /// The scenario ran and a check failed
    Assertion,
    /// The driver or browser session broke underneath the scenario
    Driver,
    /// Anything else
    Other,
}

impl Error {
    /// Create a new WebSocket error
    pub fn websocket<S: Into<String>>(msg: S) -> Self {
        Error::WebSocket(msg.into())
    }

    /// Create a new CDP error
    pub fn cdp<S: Into<String>>(msg: S) -> Self {
        Error::Cdp(msg.into())
    }

    /// Create a new HTTP error
    pub fn http<S: Into<String>>(msg: S) -> Self {
        Error::Http(msg.into())
    }

    /// Create a new session closed error
    pub fn session_closed<S: Into<String>>(msg: S) -> Self {
        Error::SessionClosed(msg.into())
    }

    /// Create a new stale element error
    pub fn stale_element<S: Into<String>>(id: S) -> Self {
        Error::StaleElement(id.into())
    }

    /// Create a new element not found error
    pub fn element_not_found<S: Into<String>>(id: S) -> Self {
        Error::ElementNotFound(id.into())
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Error::Timeout(msg.into())
    }

    /// Create a new navigation failed error
    pub fn navigation_failed<S: Into<String>>(msg: S) -> Self {
        Error::NavigationFailed(msg.into())
    }

    /// Create a new script execution failed error
    pub fn script_execution_failed<S: Into<String>>(msg: S) -> Self {
        Error::ScriptExecutionFailed(msg.into())
    }

    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a new login page unreachable error
    pub fn login_page_unreachable<S: Into<String>>(msg: S) -> Self {
        Error::LoginPageUnreachable(msg.into())
    }

    /// Create a new login rejected error
    pub fn login_rejected<S: Into<String>>(msg: S) -> Self {
        Error::LoginRejected(msg.into())
    }

    /// Create a new assertion error
    pub fn assertion<S: Into<String>>(msg: S) -> Self {
        Error::Assertion(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    /// Whether the session that produced this error is unusable.
    ///
    /// Wait loops propagate these immediately; every other error observed
    /// while polling is treated as "condition not met yet".
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Error::SessionClosed(_) | Error::WebSocket(_) | Error::Io(_)
        )
    }

    /// Map this error onto the failure taxonomy used in reports
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::LoginPageUnreachable(_) | Error::LoginRejected(_) => ErrorCategory::SetupFatal,
            Error::Assertion(_) => ErrorCategory::Assertion,
            Error::SessionClosed(_)
            | Error::WebSocket(_)
            | Error::Cdp(_)
            | Error::Http(_)
            | Error::Io(_) => ErrorCategory::Driver,
            _ => ErrorCategory::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_fatal_classification() {
        assert!(Error::session_closed("released").is_session_fatal());
        assert!(Error::websocket("reset").is_session_fatal());
        assert!(!Error::stale_element("pom-3").is_session_fatal());
        assert!(!Error::script_execution_failed("TypeError").is_session_fatal());
        assert!(!Error::timeout("slow").is_session_fatal());
    }

    #[test]
    fn test_category_mapping() {
        assert_eq!(
            Error::login_rejected("Invalid credentials").category(),
            ErrorCategory::SetupFatal
        );
        assert_eq!(
            Error::login_page_unreachable("no form").category(),
            ErrorCategory::SetupFatal
        );
        assert_eq!(Error::assertion("rows").category(), ErrorCategory::Assertion);
        assert_eq!(Error::cdp("boom").category(), ErrorCategory::Driver);
        assert_eq!(Error::configuration("x").category(), ErrorCategory::Other);
    }

    #[test]
    fn test_display_includes_context() {
        let err = Error::login_rejected("Invalid username or password");
        assert_eq!(err.to_string(), "Login rejected: Invalid username or password");
    }
}
