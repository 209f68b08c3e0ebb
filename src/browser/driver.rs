//! The browser session capability the engine is written against.
//!
//! The engine never talks to CDP directly; it drives a [`PageDriver`]. The
//! production implementation is [`super::CdpSession`]; tests substitute a
//! scripted fake. Bounded waits resolve to a tri-state: `Ok(Found)`,
//! `Ok(NotFound)` (timeout on an optional element, a normal branch), or
//! `Err` for genuine driver faults.

use std::time::Duration;

use async_trait::async_trait;

use super::AutomationError;

/// Outcome of a bounded wait for an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Located {
    Found,
    NotFound,
}

impl Located {
    pub fn is_found(self) -> bool {
        matches!(self, Located::Found)
    }
}

/// Outcome of a bounded wait for a navigation. A timeout is tolerated for
/// soft transitions (race-then-continue); only login treats it as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavOutcome {
    Completed,
    TimedOut,
}

/// How a visible label is compared against element text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMatch {
    Exact,
    Substring,
    ExactIgnoreCase,
}

impl TextMatch {
    pub fn matches(self, haystack: &str, needle: &str) -> bool {
        let text = haystack.trim();
        match self {
            TextMatch::Exact => text == needle,
            TextMatch::Substring => text.contains(needle),
            TextMatch::ExactIgnoreCase => text.eq_ignore_ascii_case(needle),
        }
    }
}

/// Abstraction over a live browser page.
///
/// All waits take an explicit per-operation timeout. `sleep` lives on the
/// driver so tests can run fixed delays instantaneously.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to a URL and wait for the load to settle.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), AutomationError>;

    /// Wait for an element matching `selector` to appear.
    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Located, AutomationError>;

    /// Click the first element matching `selector`.
    async fn click(&self, selector: &str) -> Result<(), AutomationError>;

    /// Click the first element matching `selector` whose visible text matches
    /// `needle`. Returns whether anything was clicked.
    async fn click_by_text(
        &self,
        selector: &str,
        needle: &str,
        match_mode: TextMatch,
    ) -> Result<bool, AutomationError>;

    /// Type text into the first element matching `selector`.
    async fn type_text(&self, selector: &str, text: &str) -> Result<(), AutomationError>;

    /// Evaluate a script in the page and return its JSON result.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, AutomationError>;

    /// The page's current URL.
    async fn current_url(&self) -> Result<String, AutomationError>;

    /// Wait for the next navigation to complete, up to `timeout`.
    async fn wait_for_navigation(&self, timeout: Duration) -> Result<NavOutcome, AutomationError>;

    /// History back.
    async fn go_back(&self) -> Result<(), AutomationError>;

    /// Scroll down one viewport to reveal below-the-fold content.
    async fn scroll_by_viewport(&self) -> Result<(), AutomationError>;

    /// Visible text of the first element matching `selector`, if present.
    async fn inner_text(&self, selector: &str) -> Result<Option<String>, AutomationError>;

    /// Write a diagnostic snapshot of the current page under `name`.
    /// Best-effort: failures are logged by implementations, not raised.
    async fn capture_diagnostic(&self, name: &str);

    /// Suspend for a fixed settle delay.
    async fn sleep(&self, duration: Duration);

    /// Close the session. Idempotent; must release the browser.
    async fn close(&self) -> Result<(), AutomationError>;
}

/// Supplies one fresh session per account run. The batch runner owns the
/// returned driver exclusively and closes it on every exit path.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<std::sync::Arc<dyn PageDriver>, AutomationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_match_modes() {
        assert!(TextMatch::Exact.matches(" My ", "My"));
        assert!(!TextMatch::Exact.matches("My account", "My"));
        assert!(TextMatch::Substring.matches("Daily Task list", "Task"));
        assert!(TextMatch::ExactIgnoreCase.matches("Submit", "submit"));
        assert!(!TextMatch::ExactIgnoreCase.matches("Submitted", "submit"));
    }
}
