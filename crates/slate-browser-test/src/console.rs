//! Capture of in-page console output.
//!
//! Scenarios use this to assert the editing UI ran without JavaScript
//! errors. Entries accumulate in arrival order behind an `Arc<Mutex<_>>`
//! shared between the CDP event listener and test code; ordering matters
//! and test volumes are small, so a channel would buy nothing here.

use chromiumoxide::cdp::js_protocol::runtime::EventConsoleApiCalled;
use std::sync::{Arc, Mutex};

/// Severity of a console entry, mirroring the JavaScript console methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLevel {
    /// `console.log()`
    Log,
    /// `console.info()`
    Info,
    /// `console.warn()`
    Warning,
    /// `console.error()`
    Error,
    /// `console.debug()`
    Debug,
    /// Any other console API
    Other,
}

/// One captured console call.
#[derive(Debug, Clone)]
pub struct ConsoleEntry {
    /// Severity level.
    pub level: ConsoleLevel,

    /// Arguments joined with spaces.
    pub text: String,

    /// Source location when the event carried one, as `url:line:column`.
    pub source: Option<String>,
}

/// Accumulated console output for one page.
///
/// Cheaply cloneable; the clone held by the event-listener task feeds the
/// same buffer the test queries.
#[derive(Debug, Clone, Default)]
pub struct ConsoleLog {
    entries: Arc<Mutex<Vec<ConsoleEntry>>>,
}

impl ConsoleLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // Poisoning means a test already panicked while holding the lock; the
    // lost entry is irrelevant next to that failure.
    pub(crate) fn push(&self, entry: ConsoleEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }

    /// Snapshot of all captured entries.
    #[must_use]
    pub fn entries(&self) -> Vec<ConsoleEntry> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Entries at the given level.
    #[must_use]
    pub fn with_level(&self, level: ConsoleLevel) -> Vec<ConsoleEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.level == level)
            .collect()
    }

    /// All error-level entries.
    #[must_use]
    pub fn errors(&self) -> Vec<ConsoleEntry> {
        self.with_level(ConsoleLevel::Error)
    }

    /// Count of error-level entries, without cloning the buffer.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .filter(|e| e.level == ConsoleLevel::Error)
            .count()
    }

    /// True if any error-level entry was captured.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Drops all captured entries.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    /// Number of captured entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// True when nothing has been captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&EventConsoleApiCalled> for ConsoleLevel {
    fn from(event: &EventConsoleApiCalled) -> Self {
        use chromiumoxide::cdp::js_protocol::runtime::ConsoleApiCalledType;

        match event.r#type {
            ConsoleApiCalledType::Log => ConsoleLevel::Log,
            ConsoleApiCalledType::Info => ConsoleLevel::Info,
            ConsoleApiCalledType::Warning => ConsoleLevel::Warning,
            ConsoleApiCalledType::Error => ConsoleLevel::Error,
            ConsoleApiCalledType::Debug => ConsoleLevel::Debug,
            _ => ConsoleLevel::Other,
        }
    }
}

pub(crate) fn entry_from_event(event: &EventConsoleApiCalled) -> ConsoleEntry {
    let text = event
        .args
        .iter()
        .map(|arg| {
            arg.value
                .as_ref()
                .and_then(|v| v.as_str())
                .unwrap_or("<object>")
                .to_string()
        })
        .collect::<Vec<_>>()
        .join(" ");

    let source = event.stack_trace.as_ref().and_then(|stack| {
        stack.call_frames.first().map(|frame| {
            format!(
                "{}:{}:{}",
                frame.url, frame.line_number, frame.column_number
            )
        })
    });

    ConsoleEntry {
        level: ConsoleLevel::from(event),
        text,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(level: ConsoleLevel, text: &str) -> ConsoleEntry {
        ConsoleEntry {
            level,
            text: text.into(),
            source: None,
        }
    }

    #[test]
    fn accumulates_in_order() {
        let log = ConsoleLog::new();
        log.push(entry(ConsoleLevel::Log, "first"));
        log.push(entry(ConsoleLevel::Error, "second"));

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "first");
        assert_eq!(entries[1].text, "second");
    }

    #[test]
    fn filters_by_level() {
        let log = ConsoleLog::new();
        log.push(entry(ConsoleLevel::Log, "ok"));
        log.push(entry(ConsoleLevel::Error, "boom"));
        log.push(entry(ConsoleLevel::Log, "still ok"));

        assert_eq!(log.errors().len(), 1);
        assert_eq!(log.error_count(), 1);
        assert!(log.has_errors());
        assert_eq!(log.with_level(ConsoleLevel::Log).len(), 2);
    }

    #[test]
    fn clear_empties_the_buffer() {
        let log = ConsoleLog::new();
        log.push(entry(ConsoleLevel::Log, "x"));
        log.clear();
        assert!(log.is_empty());
        assert!(!log.has_errors());
    }
}
