//! Session injection: authenticated browser state without the login UI.
//!
//! "Fast login" builds a server-side session directly against the
//! application's auth backend, then mirrors it into the browser as the
//! session cookie. For authorization purposes the result is
//! indistinguishable from a UI-driven login, and it shaves a full form
//! round-trip off every authenticated scenario.

use crate::contract::SiteContract;
use crate::error::Result;
use crate::page::Page;
use crate::server::AppServer;
use async_trait::async_trait;
use tracing::debug;

/// A username/password pair, created per test and never reused.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Account name.
    pub username: String,
    /// Account password.
    pub password: String,
}

impl Credentials {
    /// Creates a credentials pair.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// A persisted server-side authentication session.
///
/// The key is what the browser presents back as the session cookie value,
/// so the backend must have flushed the session to its store before this
/// struct is handed out.
#[derive(Debug, Clone)]
pub struct ServerSession {
    /// Session store key.
    pub key: String,
}

/// Direct access to the application's authentication backend.
///
/// Implementations verify credentials and persist a session without going
/// through the login UI.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Authenticates `credentials`, creating and persisting a session.
    ///
    /// # Errors
    ///
    /// [`HarnessError::AuthenticationFailed`](crate::HarnessError::AuthenticationFailed)
    /// when the credentials are rejected.
    async fn authenticate(&self, credentials: &Credentials) -> Result<ServerSession>;
}

/// A cookie to be injected into the live browser session.
#[derive(Debug, Clone)]
pub struct CookieSpec {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Cookie path.
    pub path: String,
    /// Cookie domain; must equal the hostname of the server under test or
    /// the browser will not present it.
    pub domain: String,
}

impl CookieSpec {
    /// A session cookie scoped to `/` on `domain`.
    pub fn session(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: "/".to_string(),
            domain: domain.into(),
        }
    }

    /// The `document.cookie` assignment string for this cookie.
    #[must_use]
    pub fn header_string(&self) -> String {
        format!(
            "{}={}; path={}; domain={}",
            self.name, self.value, self.path, self.domain
        )
    }
}

/// Logs `credentials` in by injecting a server-side session into `page`.
///
/// 1. Authenticates against `auth` directly, producing a persisted session.
/// 2. Warms up the browser with a navigation to the server origin — cookies
///    can only be set for the currently loaded origin.
/// 3. Adds the session cookie (name from `contract`, value = session key,
///    path `/`, domain = the server's hostname).
/// 4. Navigates to `next_url`, defaulting to the application root with the
///    edit-mode flag.
///
/// # Errors
///
/// [`HarnessError::AuthenticationFailed`](crate::HarnessError::AuthenticationFailed)
/// for bad credentials; no cookie has been set, and callers must not
/// assume a specific browser location on failure.
pub async fn fast_login(
    page: &Page,
    auth: &dyn AuthBackend,
    server: &dyn AppServer,
    contract: &SiteContract,
    credentials: &Credentials,
    next_url: Option<&str>,
) -> Result<()> {
    let session = auth.authenticate(credentials).await?;
    debug!(username = %credentials.username, "authenticated; injecting session");

    // Warm-up: we only care about establishing the origin, but aborting the
    // request confuses the server under test, so wait for the load anyway.
    page.navigate(server.base_url()).await?;

    let cookie = CookieSpec::session(
        contract.session_cookie.clone(),
        session.key,
        server.hostname(),
    );
    page.add_cookie(&cookie).await?;

    let default_url;
    let target = match next_url {
        Some(url) => url,
        None => {
            default_url = contract.edit_url(server.base_url(), "/");
            &default_url
        }
    };
    page.navigate(target).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_header_string() {
        let cookie = CookieSpec::session("slate_sessionid", "abc123", "127.0.0.1");
        assert_eq!(
            cookie.header_string(),
            "slate_sessionid=abc123; path=/; domain=127.0.0.1"
        );
    }

    #[test]
    fn session_cookie_defaults_to_root_path() {
        let cookie = CookieSpec::session("sid", "v", "localhost");
        assert_eq!(cookie.path, "/");
        assert_eq!(cookie.domain, "localhost");
    }
}
