//! The harness-facing authentication seam.
//!
//! Fast login authenticates against the store directly instead of driving
//! the login form; the session it opens is the same record the request
//! handlers resolve from the session cookie.

use crate::store::ContentStore;
use async_trait::async_trait;
use slate_browser_test::{AuthBackend, Credentials, HarnessError, ServerSession};

#[async_trait]
impl AuthBackend for ContentStore {
    async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> slate_browser_test::Result<ServerSession> {
        match self.open_session(&credentials.username, &credentials.password) {
            Some(key) => Ok(ServerSession { key }),
            None => Err(HarnessError::AuthenticationFailed {
                username: credentials.username.clone(),
            }),
        }
    }
}
