//! Admin-POM: page-object UI test automation for the Shopizer admin panel
//!
//! This library drives a Chromium-family browser over the Chrome DevTools
//! Protocol, bootstraps an authenticated session and runs catalogue scenarios
//! against it.

pub mod error;
pub mod config;

pub mod cdp;
pub mod locator;
pub mod session;
pub mod wait;
pub mod sorting;
pub mod pages;
pub mod bootstrap;
pub mod suite;

// Re-exports
pub use error::{Error, Result};

/// Admin-POM library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
