//! Append-only warning sink.
//!
//! The tree builder and the column reclassification passes self-heal
//! structural problems (placeholder rows, auto-sort fallback) instead of
//! failing; each heal appends a human-readable line here for the UI to
//! show. Warnings are never fatal.

use tracing::warn;

/// Append-only list of human-readable warnings.
#[derive(Debug, Clone, Default)]
pub struct WarningSink {
    entries: Vec<String>,
}

impl WarningSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a warning and emit it as a tracing event.
    pub fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(target: "fsheet", "{message}");
        self.entries.push(message);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Take all accumulated warnings, leaving the sink empty.
    pub fn drain(&mut self) -> Vec<String> {
        std::mem::take(&mut self.entries)
    }
}
