//! Browser driver capability.
//!
//! The locator engine only talks to the browser through [`Driver`], so the
//! resolver, navigator and action layer run unchanged against a real WebDriver
//! session or an in-memory double.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Controls the resolver treats as interactive
pub const INTERACTIVE_SELECTOR: &str = "input, select, textarea, button";

/// Raw lookup understood by every driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum By {
    Id(String),
    Name(String),
    Css(String),
    XPath(String),
}

impl fmt::Display for By {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            By::Id(v) => write!(f, "id={}", v),
            By::Name(v) => write!(f, "name={}", v),
            By::Css(v) => write!(f, "css={}", v),
            By::XPath(v) => write!(f, "xpath={}", v),
        }
    }
}

/// Target of a document-order "first element after" lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Following {
    /// First following element matching a CSS selector
    Matching(String),
    /// First following custom element (tag name containing a dash)
    CustomElement,
}

/// Failure reported by a driver command
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriverError {
    #[error("no such element: {0}")]
    NoSuchElement(String),
    #[error("stale element reference: {0}")]
    StaleElement(String),
    #[error("element not interactable: {0}")]
    NotInteractable(String),
    #[error("not supported in this context: {0}")]
    Unsupported(String),
    #[error("WebDriver command failed: {0}")]
    Command(String),
}

impl DriverError {
    /// Errors worth retrying after a short backoff
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DriverError::StaleElement(_) | DriverError::NotInteractable(_)
        )
    }
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Capability surface the locator engine depends on.
///
/// Every lookup is scoped to the browsing context the driver is currently
/// switched into. Element handles belong to that context and must not be used
/// after switching away from it.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Handle to a live DOM element
    type Element: Clone + fmt::Debug + Send + Sync;

    async fn goto(&self, url: &str) -> DriverResult<()>;

    async fn find_all(&self, by: &By) -> DriverResult<Vec<Self::Element>>;

    /// Light-DOM descendants of `scope` matching `by`
    async fn find_all_within(
        &self,
        scope: &Self::Element,
        by: &By,
    ) -> DriverResult<Vec<Self::Element>>;

    /// First element after `origin` in document order, excluding its descendants
    async fn following(
        &self,
        origin: &Self::Element,
        target: &Following,
    ) -> DriverResult<Option<Self::Element>>;

    async fn parent(&self, element: &Self::Element) -> DriverResult<Option<Self::Element>>;

    /// Query through the host's open shadow root; errors when there is none
    async fn shadow_root_query(
        &self,
        host: &Self::Element,
        css: &str,
    ) -> DriverResult<Option<Self::Element>>;

    /// Script query against `host.shadowRoot ?? host`
    async fn script_shadow_query(
        &self,
        host: &Self::Element,
        css: &str,
    ) -> DriverResult<Option<Self::Element>>;

    async fn text(&self, element: &Self::Element) -> DriverResult<String>;

    async fn attribute(&self, element: &Self::Element, name: &str) -> DriverResult<Option<String>>;

    /// Current `value` property (selected option value for selects)
    async fn value(&self, element: &Self::Element) -> DriverResult<String>;

    async fn is_displayed(&self, element: &Self::Element) -> DriverResult<bool>;

    async fn is_enabled(&self, element: &Self::Element) -> DriverResult<bool>;

    async fn is_selected(&self, element: &Self::Element) -> DriverResult<bool>;

    async fn click(&self, element: &Self::Element) -> DriverResult<()>;

    async fn clear(&self, element: &Self::Element) -> DriverResult<()>;

    async fn send_keys(&self, element: &Self::Element, text: &str) -> DriverResult<()>;

    async fn page_source(&self) -> DriverResult<String>;

    async fn switch_to_frame(&self, frame: &Self::Element) -> DriverResult<()>;

    async fn switch_to_default(&self) -> DriverResult<()>;

    /// `document.readyState` of the current context
    async fn ready_state(&self) -> DriverResult<String>;

    /// PNG bytes of the current viewport
    async fn screenshot(&self) -> DriverResult<Vec<u8>>;
}

/// Visible and enabled right now; driver errors count as not interactable
pub async fn is_interactable<D: Driver + ?Sized>(driver: &D, element: &D::Element) -> bool {
    matches!(driver.is_displayed(element).await, Ok(true))
        && matches!(driver.is_enabled(element).await, Ok(true))
}
