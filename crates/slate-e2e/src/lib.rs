//! Suite support for the browser-driven scenarios.
//!
//! Each scenario builds its own [`ContentStore`] and fixture server, so
//! tests are independently idempotent given a clean store; the browser is
//! the one shared resource and scenarios serialise on it (`#[serial]`).
//! Environment problems — browser tests disabled, no local browser, grid
//! without credentials — skip the suite instead of failing it.

use once_cell::sync::Lazy;
use slate_browser_test::{
    Credentials, DragOptions, Driver, DriverConfig, HarnessError, Page, SiteContract,
};
use slate_site::{ContentStore, PluginKind, RecordId, SiteConfig, SiteServer, Template};
use tracing_subscriber::EnvFilter;

static TRACING: Lazy<()> = Lazy::new(|| {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_test_writer()
        .init();
});

/// One scenario's worth of provisioned state: a browser session, a live
/// fixture server, and the store both sides share.
pub struct Suite {
    pub driver: Driver,
    pub server: SiteServer,
    pub store: ContentStore,
    pub contract: SiteContract,
}

impl Suite {
    /// Provisions the suite, or returns `None` when the environment cannot
    /// run browser tests (the scenario then reports as skipped).
    ///
    /// # Panics
    ///
    /// Panics when the fixture server cannot start; that is a defect, not
    /// an environment condition.
    pub async fn launch(store: ContentStore) -> Option<Self> {
        Self::launch_with(store, SiteConfig::default()).await
    }

    /// Like [`Suite::launch`], with an explicit site configuration; the
    /// harness contract mirrors the configured cookie and flag names.
    pub async fn launch_with(store: ContentStore, site_config: SiteConfig) -> Option<Self> {
        Lazy::force(&TRACING);

        let contract = SiteContract {
            session_cookie: site_config.session_cookie.clone(),
            edit_flag: site_config.edit_flag.clone(),
            build_flag: site_config.build_flag.clone(),
        };

        let config = match DriverConfig::from_env() {
            Ok(config) => config,
            Err(e) if e.is_environment_skip() => {
                eprintln!("skipping browser suite: {e}");
                return None;
            }
            Err(e) => panic!("driver configuration failed: {e}"),
        };

        let driver = match Driver::acquire(config).await {
            Ok(driver) => driver,
            // A browser that cannot launch or a grid that cannot connect is
            // an environment without prerequisites, same as no credentials.
            Err(
                e @ (HarnessError::LaunchFailed { .. }
                | HarnessError::ConnectionFailed(_)
                | HarnessError::Provision { .. }),
            ) => {
                eprintln!("skipping browser suite: {e}");
                return None;
            }
            Err(e) => panic!("driver provisioning failed: {e}"),
        };

        let server = SiteServer::start_with(store.clone(), site_config)
            .await
            .expect("fixture server failed to start");

        Some(Self {
            driver,
            server,
            store,
            contract,
        })
    }

    /// Drag tuning for the fixture UI, which marks an in-flight drag on the
    /// body element.
    #[must_use]
    pub fn drag_options(&self) -> DragOptions {
        DragOptions {
            active_marker: Some("body.slate-drag-active".to_string()),
            ..DragOptions::default()
        }
    }

    /// Opens the scenario's page.
    pub async fn page(&self) -> Page {
        self.driver.new_page().await.expect("failed to open page")
    }

    /// The edit-mode URL for `path` on the fixture server.
    #[must_use]
    pub fn edit_url(&self, path: &str) -> String {
        self.contract
            .edit_url(slate_browser_test::AppServer::base_url(&self.server), path)
    }

    /// The structure-mode URL for `path` on the fixture server.
    #[must_use]
    pub fn build_url(&self, path: &str) -> String {
        self.contract
            .build_url(slate_browser_test::AppServer::base_url(&self.server), path)
    }

    /// Explicit teardown: deletes page-scoped records, clears the shared
    /// cache, stops the server, and releases the browser.
    pub async fn teardown(self) {
        self.store.reset();
        self.server.stop().await;
        self.driver
            .release()
            .await
            .expect("failed to release driver");
    }
}

/// Creates the standard superuser and returns its credentials. Created per
/// test; credentials are never reused across tests.
pub fn superuser(store: &ContentStore) -> Credentials {
    store.create_user("admin@example.com", "admin", true, true);
    Credentials::new("admin@example.com", "admin")
}

/// Seeds the canonical single-page store: an English page with one text
/// plugin (body "test"). Returns `(page, placeholder, plugin)`.
pub fn seeded_home(store: &ContentStore) -> (RecordId, RecordId, RecordId) {
    let page = store.create_page("Home", Template::Simple, "en");
    let placeholder = store
        .content_placeholder(page)
        .expect("page has a content placeholder");
    let plugin = store.add_plugin(placeholder, "en", PluginKind::Text, "test");
    (page, placeholder, plugin)
}
