//! Driver provisioning: one browser session per suite, local or remote.
//!
//! The local-process and remote-grid paths are mutually exclusive per run and
//! resolved once from the environment at suite setup, as a tagged
//! [`DriverMode`] rather than inline branches. Absent remote credentials are
//! an environment condition, so they surface as [`HarnessError::Provision`]
//! and the suite skips instead of failing.

use crate::error::{HarnessError, Result};
use crate::page::Page;
use crate::wait::WaitConfig;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Disables browser tests entirely when set to `0`.
pub const ENV_BROWSER_TESTS: &str = "SLATE_BROWSER_TESTS";
/// Optional path to the local browser executable.
pub const ENV_CHROME_PATH: &str = "SLATE_CHROME_PATH";
/// Set to `1` to watch the browser while debugging locally.
pub const ENV_HEADFUL: &str = "SLATE_HEADFUL";
/// CI detection; combined with the grid URL it selects remote execution.
pub const ENV_CI: &str = "CI";
/// Websocket endpoint of the remote CDP grid.
pub const ENV_GRID_URL: &str = "SLATE_GRID_URL";
/// Remote grid account name.
pub const ENV_GRID_USERNAME: &str = "SLATE_GRID_USERNAME";
/// Remote grid access key.
pub const ENV_GRID_ACCESS_KEY: &str = "SLATE_GRID_ACCESS_KEY";
/// Build metadata forwarded to the grid session.
pub const ENV_BUILD_TAG: &str = "SLATE_BUILD_TAG";

/// A locally launched browser process.
#[derive(Debug, Clone)]
pub struct LocalBrowser {
    /// Run without a visible window (default: true).
    pub headless: bool,

    /// Browser window size.
    pub window_size: (u32, u32),

    /// Additional browser arguments.
    pub args: Vec<String>,

    /// Browser executable path (None = auto-detect).
    pub chrome_path: Option<String>,
}

impl Default for LocalBrowser {
    fn default() -> Self {
        Self {
            headless: true,
            window_size: (1280, 720),
            args: vec![
                // Required where user namespaces are unavailable (containers).
                "--no-sandbox".to_string(),
                // Prevents /dev/shm exhaustion in containerized environments.
                "--disable-dev-shm-usage".to_string(),
            ],
            chrome_path: None,
        }
    }
}

/// A session on a remote CDP grid.
#[derive(Debug, Clone)]
pub struct RemoteGrid {
    /// Websocket endpoint of the grid.
    pub endpoint: String,

    /// Grid account name.
    pub username: String,

    /// Grid access key.
    pub access_key: String,

    /// Build metadata attached to the session.
    pub build_tag: Option<String>,

    /// Extra provider-specific session capabilities.
    pub capabilities: Vec<(String, String)>,
}

impl RemoteGrid {
    /// Websocket URL with credentials, build metadata and capabilities as
    /// query parameters, the scheme grid providers expect.
    fn session_url(&self) -> String {
        let sep = if self.endpoint.contains('?') { '&' } else { '?' };
        let mut url = format!(
            "{}{}user={}&key={}",
            self.endpoint, sep, self.username, self.access_key
        );
        if let Some(build) = &self.build_tag {
            url.push_str("&build=");
            url.push_str(build);
        }
        for (name, value) in &self.capabilities {
            url.push('&');
            url.push_str(name);
            url.push('=');
            url.push_str(value);
        }
        url
    }
}

/// Local or remote execution, decided once per run.
#[derive(Debug, Clone)]
pub enum DriverMode {
    /// Launch a browser process on this machine.
    Local(LocalBrowser),
    /// Connect to a remote grid session.
    Remote(RemoteGrid),
}

/// Resolved driver configuration for a suite.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Which provisioning path to take.
    pub mode: DriverMode,

    /// Default timeout applied to all element lookups on pages created by
    /// this driver.
    pub implicit_wait: Duration,
}

impl DriverConfig {
    /// A local headless configuration with defaults.
    #[must_use]
    pub fn local() -> Self {
        Self {
            mode: DriverMode::Local(LocalBrowser::default()),
            implicit_wait: Duration::from_secs(5),
        }
    }

    /// Resolves the configuration from the process environment.
    ///
    /// See the `ENV_*` constants for the recognized variables. Returns
    /// [`HarnessError::Provision`] when the environment disables browser
    /// tests or requests remote execution without credentials.
    pub fn from_env() -> Result<Self> {
        Self::resolve(|name| std::env::var(name).ok())
    }

    /// Environment resolution against an arbitrary lookup, so the branch
    /// logic is testable without mutating process state.
    pub(crate) fn resolve(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if get(ENV_BROWSER_TESTS).as_deref() == Some("0") {
            return Err(HarnessError::Provision {
                reason: format!("browser tests disabled via {ENV_BROWSER_TESTS}=0"),
            });
        }

        let in_ci = get(ENV_CI).is_some_and(|v| !v.is_empty());
        if in_ci {
            if let Some(endpoint) = get(ENV_GRID_URL) {
                let (Some(username), Some(access_key)) =
                    (get(ENV_GRID_USERNAME), get(ENV_GRID_ACCESS_KEY))
                else {
                    return Err(HarnessError::Provision {
                        reason: format!(
                            "remote grid requested but {ENV_GRID_USERNAME}/{ENV_GRID_ACCESS_KEY} are absent"
                        ),
                    });
                };
                return Ok(Self {
                    mode: DriverMode::Remote(RemoteGrid {
                        endpoint,
                        username,
                        access_key,
                        build_tag: get(ENV_BUILD_TAG),
                        capabilities: Vec::new(),
                    }),
                    implicit_wait: Duration::from_secs(30),
                });
            }
        }

        let local = LocalBrowser {
            headless: get(ENV_HEADFUL).as_deref() != Some("1"),
            chrome_path: get(ENV_CHROME_PATH),
            ..LocalBrowser::default()
        };
        Ok(Self {
            mode: DriverMode::Local(local),
            implicit_wait: Duration::from_secs(5),
        })
    }
}

fn local_browser_config(local: &LocalBrowser) -> Result<BrowserConfig> {
    let mut config = BrowserConfig::builder();

    if local.headless {
        config = config.arg("--headless");
    }

    config = config.arg(format!(
        "--window-size={},{}",
        local.window_size.0, local.window_size.1
    ));

    // Unique profile dir so parallel suites don't trip over Chrome's
    // ProcessSingleton lock.
    let profile_dir = std::env::temp_dir().join(format!("slate-browser-{}", uuid::Uuid::new_v4()));
    config = config.arg(format!("--user-data-dir={}", profile_dir.display()));

    for arg in &local.args {
        config = config.arg(arg.clone());
    }

    if let Some(path) = &local.chrome_path {
        config = config.chrome_executable(path.clone());
    }

    config.build().map_err(|e| HarnessError::LaunchFailed {
        reason: format!("invalid browser configuration: {e}"),
        source: None,
    })
}

/// A provisioned browser session.
///
/// Created once per suite and released exactly once; `Drop` kills a
/// still-open browser so a panicking test body cannot leak the process.
pub struct Driver {
    inner: Arc<Mutex<Option<Browser>>>,
    handler_task: JoinHandle<()>,
    implicit_wait: Duration,
}

impl Driver {
    /// Provisions a browser session according to `config`.
    ///
    /// Starts an external browser process or opens a remote grid session.
    ///
    /// # Errors
    ///
    /// [`HarnessError::LaunchFailed`] when the local browser cannot start,
    /// [`HarnessError::ConnectionFailed`] when the remote endpoint rejects
    /// the session.
    pub async fn acquire(config: DriverConfig) -> Result<Self> {
        let (browser, mut handler) = match &config.mode {
            DriverMode::Local(local) => {
                debug!(?local, "launching local browser");
                Browser::launch(local_browser_config(local)?)
                    .await
                    .map_err(|e| HarnessError::LaunchFailed {
                        reason: "failed to launch browser process".to_string(),
                        source: Some(Box::new(e)),
                    })?
            }
            DriverMode::Remote(grid) => {
                debug!(endpoint = %grid.endpoint, "connecting to remote grid");
                Browser::connect(grid.session_url())
                    .await
                    .map_err(|e| HarnessError::ConnectionFailed(e.to_string()))?
            }
        };

        // chromiumoxide needs its handler stream driven for CDP traffic.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("browser handler error: {e}");
                }
            }
        });

        Ok(Self {
            inner: Arc::new(Mutex::new(Some(browser))),
            handler_task,
            implicit_wait: config.implicit_wait,
        })
    }

    /// Opens a new page (tab) with this driver's implicit wait.
    ///
    /// # Errors
    ///
    /// [`HarnessError::AlreadyClosed`] if the driver was released.
    pub async fn new_page(&self) -> Result<Page> {
        let guard = self.inner.lock().await;
        let browser = guard.as_ref().ok_or(HarnessError::AlreadyClosed)?;

        let chrome_page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| HarnessError::ConnectionFailed(e.to_string()))?;

        Ok(Page::new(
            chrome_page,
            WaitConfig::with_timeout(self.implicit_wait),
        ))
    }

    /// Releases the browser session, killing the local process or closing
    /// the remote session. Safe to call once; later operations fail with
    /// [`HarnessError::AlreadyClosed`].
    pub async fn release(self) -> Result<()> {
        let mut guard = self.inner.lock().await;

        if let Some(mut browser) = guard.take() {
            debug!("releasing browser session");
            browser
                .close()
                .await
                .map_err(|e| HarnessError::ConnectionFailed(e.to_string()))?;
        }
        self.handler_task.abort();

        Ok(())
    }

    /// True once the session has been released.
    pub async fn is_released(&self) -> bool {
        self.inner.lock().await.is_none()
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        // Dropping the inner Browser makes chromiumoxide kill the process;
        // the handler task just sees its stream end.
        if !self.handler_task.is_finished() {
            self.handler_task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_to_local_headless() {
        let config = DriverConfig::resolve(env(&[])).unwrap();
        match config.mode {
            DriverMode::Local(local) => {
                assert!(local.headless);
                assert!(local.chrome_path.is_none());
            }
            DriverMode::Remote(_) => panic!("expected local mode"),
        }
        assert_eq!(config.implicit_wait, Duration::from_secs(5));
    }

    #[test]
    fn disabled_env_is_a_skip() {
        let err = DriverConfig::resolve(env(&[(ENV_BROWSER_TESTS, "0")])).unwrap_err();
        assert!(err.is_environment_skip());
    }

    #[test]
    fn headful_and_custom_executable() {
        let config = DriverConfig::resolve(env(&[
            (ENV_HEADFUL, "1"),
            (ENV_CHROME_PATH, "/usr/bin/chromium"),
        ]))
        .unwrap();
        match config.mode {
            DriverMode::Local(local) => {
                assert!(!local.headless);
                assert_eq!(local.chrome_path.as_deref(), Some("/usr/bin/chromium"));
            }
            DriverMode::Remote(_) => panic!("expected local mode"),
        }
    }

    #[test]
    fn ci_with_grid_selects_remote() {
        let config = DriverConfig::resolve(env(&[
            (ENV_CI, "true"),
            (ENV_GRID_URL, "wss://grid.example.com/cdp"),
            (ENV_GRID_USERNAME, "slate"),
            (ENV_GRID_ACCESS_KEY, "secret"),
            (ENV_BUILD_TAG, "build-17"),
        ]))
        .unwrap();
        match config.mode {
            DriverMode::Remote(grid) => {
                assert_eq!(
                    grid.session_url(),
                    "wss://grid.example.com/cdp?user=slate&key=secret&build=build-17"
                );
            }
            DriverMode::Local(_) => panic!("expected remote mode"),
        }
        assert_eq!(config.implicit_wait, Duration::from_secs(30));
    }

    #[test]
    fn ci_without_credentials_is_a_skip() {
        let err = DriverConfig::resolve(env(&[
            (ENV_CI, "true"),
            (ENV_GRID_URL, "wss://grid.example.com/cdp"),
            (ENV_GRID_USERNAME, "slate"),
        ]))
        .unwrap_err();
        assert!(err.is_environment_skip());
    }

    #[test]
    fn ci_without_grid_url_stays_local() {
        let config = DriverConfig::resolve(env(&[(ENV_CI, "1")])).unwrap();
        assert!(matches!(config.mode, DriverMode::Local(_)));
    }

    #[test]
    fn session_url_respects_existing_query() {
        let grid = RemoteGrid {
            endpoint: "wss://grid.example.com/cdp?region=eu".into(),
            username: "u".into(),
            access_key: "k".into(),
            build_tag: None,
            capabilities: vec![("platform".into(), "linux".into())],
        };
        assert_eq!(
            grid.session_url(),
            "wss://grid.example.com/cdp?region=eu&user=u&key=k&platform=linux"
        );
    }
}
