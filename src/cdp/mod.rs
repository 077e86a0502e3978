//! # Chrome DevTools Protocol (CDP) layer
//!
//! WebSocket transport to Chromium-family browsers. Everything above this
//! layer talks to the browser through [`CdpClient`].
//!
//! ## Module structure
//! - `traits`: connection, client and browser traits
//! - `types`: JSON-RPC wire types
//! - `connection`: WebSocket connection with a background reader task
//! - `client`: typed client (navigate, evaluate, screenshot, events)
//! - `browser`: DevTools HTTP discovery and target lifecycle
//! - `mock`: scripted connection for tests
//!
//! ## Example
//! ```rust,no_run
//! use admin_pom::cdp::{CdpBrowser, CdpBrowserImpl, CdpClient};
//!
//! # async fn example() -> Result<(), admin_pom::Error> {
//! let browser = CdpBrowserImpl::new("http://localhost:9222");
//! let target = browser.create_target("about:blank").await?;
//! let client = browser.create_client(&target.ws_url).await?;
//! client.navigate("http://localhost/#/auth").await?;
//! # Ok(())
//! # }
//! ```

pub mod traits;
pub mod types;
pub mod connection;
pub mod client;
pub mod browser;
pub mod mock;

#[cfg(test)]
mod tests;

pub use traits::{
    CdpConnection, CdpClient, CdpBrowser, CdpEvent, CdpResponse, CdpError,
    NavigationResult, EvaluationResult,
    BrowserVersion, TargetInfo,
};

pub use connection::CdpWebSocketConnection;
pub use client::CdpClientImpl;
pub use browser::CdpBrowserImpl;
pub use mock::MockCdpConnection;
