//! Error taxonomy for the harness.
//!
//! The variants map onto distinct handling policies: `Provision` means the
//! environment cannot run browser tests at all and the suite should be
//! skipped, not failed; `AuthenticationFailed`, `WaitTimeout` and
//! `ElementNotFound` are scoped to a single test. `ElementNotFound` is also
//! used positively by scenarios that assert a UI element is correctly absent.

use std::time::Duration;
use thiserror::Error;

/// The error type for all harness operations.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The environment cannot provide a browser session.
    ///
    /// Raised when browser tests are disabled, no usable browser exists, or
    /// remote execution was requested without grid credentials. Suites treat
    /// this as a skip condition, not a failure.
    #[error("cannot provision browser session: {reason}")]
    Provision {
        /// Why the environment is unusable
        reason: String,
    },

    /// The local browser process failed to start.
    #[error("failed to launch browser: {reason}")]
    LaunchFailed {
        /// Human-readable reason for the launch failure
        reason: String,
        /// Optional underlying error that caused the failure
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The CDP connection (local or remote grid) could not be established
    /// or broke mid-session.
    #[error("browser connection failed: {0}")]
    ConnectionFailed(String),

    /// Credentials were rejected by the application's auth backend.
    ///
    /// On failure the browser is left wherever it was (usually the warm-up
    /// page); callers must not assume a specific location.
    #[error("authentication failed for '{username}'")]
    AuthenticationFailed {
        /// The username that failed to authenticate
        username: String,
    },

    /// Navigation to a URL failed outright.
    #[error("navigation to '{url}' failed: {reason}")]
    NavigationFailed {
        /// The URL that failed to load
        url: String,
        /// Reason for the navigation failure
        reason: String,
    },

    /// A wait condition was not satisfied within the timeout.
    #[error("wait condition '{condition}' timed out after {timeout:?}")]
    WaitTimeout {
        /// Description of the condition that timed out
        condition: String,
        /// How long we waited before timing out
        timeout: Duration,
    },

    /// No element matched the given selector at the time of the lookup.
    #[error("no element matches '{selector}'")]
    ElementNotFound {
        /// The CSS selector that matched nothing
        selector: String,
    },

    /// JavaScript execution in the page context failed.
    #[error("script execution failed: {0}")]
    ScriptFailed(String),

    /// An operation was attempted on a released driver.
    #[error("browser session is already released")]
    AlreadyClosed,

    /// Wraps errors from the chromiumoxide library.
    #[error("cdp error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    /// Generic I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    /// True when the failure describes an unusable environment rather than a
    /// defect; suites report these as skipped.
    #[must_use]
    pub fn is_environment_skip(&self) -> bool {
        matches!(self, HarnessError::Provision { .. })
    }

    /// True when a wait ran out of time.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, HarnessError::WaitTimeout { .. })
    }

    /// True when an element lookup found nothing.
    #[must_use]
    pub fn is_element_not_found(&self) -> bool {
        matches!(self, HarnessError::ElementNotFound { .. })
    }
}

/// A specialized Result type for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provision_is_skip() {
        let err = HarnessError::Provision {
            reason: "no grid credentials".into(),
        };
        assert!(err.is_environment_skip());
        assert!(!err.is_timeout());
    }

    #[test]
    fn classification_helpers() {
        let timeout = HarnessError::WaitTimeout {
            condition: "selector '.toolbar'".into(),
            timeout: Duration::from_secs(10),
        };
        assert!(timeout.is_timeout());

        let missing = HarnessError::ElementNotFound {
            selector: ".toolbar-item-logout".into(),
        };
        assert!(missing.is_element_not_found());
        assert!(!missing.is_environment_skip());
    }
}
