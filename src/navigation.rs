//! Navigation side effects requested by the session subsystem.
//!
//! The subsystem never moves the user itself; it hands a [`Navigation`] to
//! whatever owns the window (a browser shell, a CLI, a test).

use parking_lot::Mutex;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Full-page redirect to an external URL (identity provider screens).
    Redirect(String),
    /// Move to an in-app location such as `/unauthorized`.
    Navigate(String),
    /// Reload the current page.
    Reload,
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, navigation: Navigation);
}

/// Logs every navigation request. Used by the CLI, where the user follows
/// redirects by hand.
#[derive(Debug, Default)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn navigate(&self, navigation: Navigation) {
        match &navigation {
            Navigation::Redirect(url) => info!(url = %url, "Open this URL to continue"),
            Navigation::Navigate(path) => info!(path = %path, "Navigating"),
            Navigation::Reload => info!("Reload requested"),
        }
    }
}

/// Keeps every navigation request in order.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    history: Mutex<Vec<Navigation>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<Navigation> {
        self.history.lock().clone()
    }

    pub fn last(&self) -> Option<Navigation> {
        self.history.lock().last().cloned()
    }

    /// Number of full-page redirects whose URL starts with `prefix`.
    pub fn redirects_to(&self, prefix: &str) -> usize {
        self.history
            .lock()
            .iter()
            .filter(|nav| matches!(nav, Navigation::Redirect(url) if url.starts_with(prefix)))
            .count()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, navigation: Navigation) {
        self.history.lock().push(navigation);
    }
}
