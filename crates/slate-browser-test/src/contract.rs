//! Configuration values owned by the application under test.
//!
//! The session-cookie name and the query flags that toggle the editing UI
//! belong to the application, not the harness. Keeping them as data here
//! means a rename on the application side is a one-line change in the suite
//! instead of a grep through every scenario.

/// The URL and cookie contract of the site under test.
#[derive(Debug, Clone)]
pub struct SiteContract {
    /// Name of the authenticated-session cookie.
    pub session_cookie: String,

    /// Query flag that switches the page into edit mode.
    pub edit_flag: String,

    /// Query flag that switches the editing UI into structure/build mode.
    pub build_flag: String,
}

impl SiteContract {
    /// URL for `path` on `base` with the edit-mode flag appended.
    #[must_use]
    pub fn edit_url(&self, base: &str, path: &str) -> String {
        self.flagged_url(base, path, &self.edit_flag)
    }

    /// URL for `path` on `base` with the structure-mode flag appended.
    #[must_use]
    pub fn build_url(&self, base: &str, path: &str) -> String {
        self.flagged_url(base, path, &self.build_flag)
    }

    fn flagged_url(&self, base: &str, path: &str, flag: &str) -> String {
        let base = base.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}?{flag}")
    }
}

impl Default for SiteContract {
    fn default() -> Self {
        Self {
            session_cookie: "slate_sessionid".to_string(),
            edit_flag: "edit".to_string(),
            build_flag: "build".to_string(),
        }
    }
}
