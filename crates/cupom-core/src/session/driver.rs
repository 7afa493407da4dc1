//! Browser abstraction used by the extraction session.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::DriverError;
use crate::models::config::BrowserConfig;

/// Result type for driver operations.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Interval between lookups in [`PortalDriver::wait_for`].
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// How to locate an element on the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    /// Element id attribute.
    Id(String),
    /// CSS selector.
    Css(String),
}

impl Locator {
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// The locator as a CSS selector.
    pub fn to_css(&self) -> String {
        match self {
            Self::Id(id) => format!("[id='{}']", id),
            Self::Css(selector) => selector.clone(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "#{}", id),
            Self::Css(selector) => f.write_str(selector),
        }
    }
}

/// A single browser page driven by the session.
///
/// Lookups return `Ok(None)` when nothing matches; `Err` is reserved for
/// failures of the browser itself.
#[async_trait]
pub trait PortalDriver: Send + Sync {
    /// Handle to an element on the current page.
    type Element: Send + Sync;

    /// Load `url`, failing if it takes longer than `timeout`.
    async fn navigate(&self, url: &str, timeout: Duration) -> DriverResult<()>;

    async fn find(&self, locator: &Locator) -> DriverResult<Option<Self::Element>>;

    async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<Self::Element>>;

    /// Rendered text of the element, trimmed.
    async fn text(&self, element: &Self::Element) -> DriverResult<String>;

    async fn attribute(&self, element: &Self::Element, name: &str)
    -> DriverResult<Option<String>>;

    /// Clear an input and type `text` into it.
    async fn clear_and_type(&self, element: &Self::Element, text: &str) -> DriverResult<()>;

    async fn click(&self, element: &Self::Element) -> DriverResult<()>;

    async fn scroll_into_view(&self, element: &Self::Element) -> DriverResult<()>;

    /// Cell texts of every row of a table, header row included.
    async fn rows(&self, table: &Self::Element) -> DriverResult<Vec<Vec<String>>>;

    /// Release the browser. Calling it again is a no-op.
    async fn close(&self) -> DriverResult<()>;

    /// Poll [`find`](Self::find) until the element appears or `timeout` elapses.
    ///
    /// A zero timeout makes a single attempt.
    async fn wait_for(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> DriverResult<Option<Self::Element>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(element) = self.find(locator).await? {
                return Ok(Some(element));
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}

/// Acquires a fresh browser for each session.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    type Driver: PortalDriver;

    async fn launch(&self, config: &BrowserConfig) -> DriverResult<Self::Driver>;
}
