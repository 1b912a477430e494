//! Browser-surface abstraction: what the account fetcher needs from a rendered page.
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BrowserError {
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("browser session: {0}")]
    Session(String),
    #[error("browser protocol: {0}")]
    Protocol(String),
}

/// Opens pages. One page is used per account attempt.
#[async_trait::async_trait]
pub trait Browser: Send + Sync {
    type Page: Page;

    async fn open_page(&self, user_agent: &str) -> Result<Self::Page, BrowserError>;
}

#[async_trait::async_trait]
pub trait Page: Send + Sync {
    type Element: Element;

    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// `Err(BrowserError::Timeout)` when nothing matches within `timeout`.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError>;

    async fn query_all(&self, selector: &str) -> Result<Vec<Self::Element>, BrowserError>;

    async fn scroll_by(&self, pixels: i64) -> Result<(), BrowserError>;

    /// Current scrollable height of the document.
    async fn scroll_extent(&self) -> Result<i64, BrowserError>;

    async fn close(&self) -> Result<(), BrowserError>;
}

/// A rendered post container. Lookups are scoped to descendants of the element.
#[async_trait::async_trait]
pub trait Element: Send + Sync {
    /// Inner text of the first descendant matching `selector`, `None` if absent.
    async fn text(&self, selector: &str) -> Result<Option<String>, BrowserError>;

    /// Attribute `name` of the first descendant matching `selector`.
    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>, BrowserError>;
}
