//! # slate-browser-test
//!
//! A browser-test harness for driving a real browser against a live web
//! application: driver provisioning (local process or remote grid),
//! explicit-wait polling, session injection ("fast login"), element
//! operations with same-origin iframe traversal, and console capture.
//!
//! ## Architecture
//!
//! - **Driver**: owns the browser session for a suite; local/remote is a
//!   tagged mode resolved once from the environment
//! - **Page**: a tab with navigation, waits, element operations, gestures
//! - **fast_login**: server-side session construction mirrored into the
//!   browser as a cookie
//! - **AppServer / AuthBackend**: the seams a fixture application implements
//! - **SiteContract**: cookie name and URL query flags owned by the
//!   application under test, carried as configuration
//!
//! ## Example
//!
//! ```ignore
//! use slate_browser_test::{Driver, DriverConfig, SiteContract, fast_login, Credentials};
//!
//! #[tokio::test]
//! async fn toolbar_appears_after_fast_login() -> slate_browser_test::Result<()> {
//!     let driver = Driver::acquire(DriverConfig::from_env()?).await?;
//!     let page = driver.new_page().await?;
//!
//!     fast_login(&page, &auth, &server, &SiteContract::default(),
//!                &Credentials::new("admin", "admin"), None).await?;
//!     page.wait_for_selector(".slate-toolbar").await?;
//!
//!     driver.release().await
//! }
//! ```
//!
//! Failures are classified so suites can react correctly: provisioning
//! problems are environment conditions and skip the suite; everything else
//! is scoped to a single test.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod console;
pub mod contract;
pub mod driver;
pub mod error;
pub mod page;
pub mod server;
pub mod session;
pub mod wait;

// Re-export main types for convenience
pub use console::{ConsoleEntry, ConsoleLevel, ConsoleLog};
pub use contract::SiteContract;
pub use driver::{Driver, DriverConfig, DriverMode, LocalBrowser, RemoteGrid};
pub use error::{HarnessError, Result};
pub use page::{DragOptions, FrameScope, Page};
pub use server::{AppServer, ExternalServer};
pub use session::{AuthBackend, CookieSpec, Credentials, ServerSession, fast_login};
pub use wait::{DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT, WaitConfig, wait_for, wait_until};
