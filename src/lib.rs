//! # formprobe
#![allow(clippy::uninlined_format_args)]
//!
//! Resilient element location for end-to-end tests of web registration forms.
//!
//! Form fields are described by ordered chains of locator strategies (id, name,
//! css, xpath, label, placeholder, partial text). The first strategy that yields
//! a visible and enabled element wins; when every strategy fails, the error lists
//! each attempt and a diagnostic screenshot is captured.
//!
//! The same fields are reachable in three places on the page under test:
//!
//! - the main document
//! - an iframe, located by its id or by the heading that precedes it
//! - an open shadow root, located through the heading that precedes its host
//!
//! ## CLI Usage
//!
//! ```bash
//! # Run every scenario against the local registration form
//! formprobe run --url http://127.0.0.1:3000/
//!
//! # Only iframe and shadow DOM scenarios, with Firefox
//! formprobe run --category iframe --category shadow --browser firefox
//!
//! # One scenario, visible browser, JSON report
//! formprobe run --scenario main-submission --no-headless --format json
//!
//! # List scenarios and their categories
//! formprobe list
//! ```
//!
//! Connection and timing settings can also come from `FORMPROBE_*` variables, e.g.
//! `FORMPROBE_BASE_URL`, `FORMPROBE_LOOKUP_TIMEOUT_MS` or `FORMPROBE_SCREENSHOT_DIR`.
//!
//! ## Library Usage
//!
//! ```no_run
//! use formprobe::{FormContext, FormPage, HarnessConfig, WebDriverSession};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = HarnessConfig::from_env()?;
//! let session = WebDriverSession::connect(&config).await?;
//! let sink = formprobe::scenarios::diagnostic_sink(&config);
//! let mut page = FormPage::new(session, config, sink);
//!
//! page.open().await?;
//! let framed = FormContext::iframe_by_id("form-frame");
//! page.enter_first_name(&framed, "John").await?;
//! assert_eq!(page.first_name(&framed).await?, "John");
//! # Ok(())
//! # }
//! ```

/// Best-effort click, type-and-verify, select and checkbox actions
pub mod actions;

/// Field descriptors per form section
pub mod catalog;

/// Harness configuration and environment overrides
pub mod config;

/// Frame and shadow root navigation
pub mod context;

/// Failure screenshots
pub mod diagnostics;

/// Browser driver abstraction
pub mod driver;

pub mod errors;

/// Form facade used by scenarios
pub mod form;

/// Strategy chain resolution
pub mod resolver;

/// Submission data extraction and confirmation
pub mod response;

/// End-to-end scenarios
pub mod scenarios;

pub mod strategy;

/// Type definitions shared with the CLI
pub mod types;

/// WebDriver-backed driver
pub mod webdriver;

#[cfg(test)]
mod fake_driver;

pub use actions::ActionOutcome;
pub use catalog::{Field, FieldCatalog, FieldDescriptor, FieldRole, Section};
pub use config::{HarnessConfig, Timing};
pub use context::{BrowsingContext, ContextNavigator, FormContext, FrameLocator};
pub use errors::{ProbeError, ProbeResult, StrategyAttempt};
pub use form::FormPage;
pub use resolver::ElementResolver;
pub use response::{ResponseInterpreter, SubmissionData};
pub use scenarios::{Category, ScenarioId};
pub use strategy::{LocatorKind, LocatorStrategy, StrategyChain};
pub use types::{OutputFormat, ScenarioReport, ViewportSize};
pub use webdriver::{BrowserType, WebDriverSession};
