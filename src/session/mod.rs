//! # Session layer
//!
//! One [`BrowserSession`] is one live browser tab owned by exactly one
//! scenario. Page objects only ever see the trait; the backend is either a
//! real browser over CDP or the in-memory [`MockSession`].
//!
//! ## Module structure
//! - `traits`: `BrowserSession`, `SessionLauncher` and element types
//! - `cdp`: session over a CDP page target
//! - `launcher`: attaches to or spawns a browser
//! - `mock`: scriptable in-memory DOM for tests
//!
//! ## Example
//! ```rust,no_run
//! use admin_pom::config::Config;
//! use admin_pom::session::{CdpLauncher, SessionLauncher};
//!
//! # async fn example() -> Result<(), admin_pom::Error> {
//! let config = Config::from_env()?;
//! let session = CdpLauncher::new().launch(&config).await?;
//! session.navigate(&config.route("/#/auth")).await?;
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod traits;
pub mod cdp;
pub mod launcher;
pub mod mock;

pub use traits::{BrowserSession, ElementHandle, ElementState, Key, SessionLauncher};

pub use cdp::CdpSession;
pub use launcher::CdpLauncher;
pub use mock::{Effect, MockColumn, MockRow, MockSession, NodeSpec, TableSpec};
