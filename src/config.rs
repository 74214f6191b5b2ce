use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{ProbeError, ProbeResult};
use crate::types::ViewportSize;
use crate::webdriver::BrowserType;

/// Default per-strategy lookup timeout (10 seconds)
pub const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 10_000;

/// Default polling interval for bounded waits
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default number of attempts for best-effort actions
pub const DEFAULT_ACTION_RETRIES: u32 = 3;

/// Default fixed backoff between action attempts
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;

/// Default delay after actions that trigger asynchronous page updates
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1_000;

/// Default bound on waiting for `document.readyState == "complete"`
pub const DEFAULT_READY_TIMEOUT_MS: u64 = 2_000;

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "FORMPROBE_";

/// Harness configuration shared by sessions, the locator engine and the CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// URL of the form page under test
    pub base_url: String,
    /// WebDriver endpoint; `None` picks the browser's standard port
    pub webdriver_url: Option<String>,
    pub browser: BrowserType,
    pub headless: bool,
    pub viewport: Option<ViewportSize>,
    pub lookup_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub action_retries: u32,
    pub retry_backoff_ms: u64,
    pub settle_delay_ms: u64,
    pub ready_timeout_ms: u64,
    /// Where failure screenshots land; `None` disables capture
    pub screenshot_dir: Option<PathBuf>,
    /// Heading text that introduces echoed submission data
    pub submission_heading: String,
    /// Keys the response interpreter treats as relevant
    pub expected_keys: Vec<String>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000/".to_string(),
            webdriver_url: None,
            browser: BrowserType::Chrome,
            headless: true,
            viewport: None,
            lookup_timeout_ms: DEFAULT_LOOKUP_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            action_retries: DEFAULT_ACTION_RETRIES,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            ready_timeout_ms: DEFAULT_READY_TIMEOUT_MS,
            screenshot_dir: Some(PathBuf::from("screenshots")),
            submission_heading: "Submitted Data".to_string(),
            expected_keys: [
                "First Name",
                "Last Name",
                "Email",
                "Phone",
                "State",
                "Gender",
                "Terms",
            ]
            .iter()
            .map(|k| k.to_string())
            .collect(),
        }
    }
}

impl HarnessConfig {
    /// Defaults overlaid with `FORMPROBE_*` environment variables
    pub fn from_env() -> ProbeResult<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values from a key lookup (environment-style names)
    pub fn with_overrides<F>(mut self, lookup: F) -> ProbeResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(url) = get("BASE_URL") {
            self.base_url = url;
        }
        if let Some(url) = get("WEBDRIVER_URL") {
            self.webdriver_url = Some(url);
        }
        if let Some(browser) = get("BROWSER") {
            self.browser = browser
                .parse()
                .map_err(|e: anyhow::Error| ProbeError::Config(e.to_string()))?;
        }
        if let Some(headless) = get("HEADLESS") {
            self.headless = parse_bool("HEADLESS", &headless)?;
        }
        if let Some(viewport) = get("VIEWPORT") {
            self.viewport = Some(
                ViewportSize::parse(&viewport).map_err(|e| ProbeError::Config(e.to_string()))?,
            );
        }
        if let Some(v) = get("LOOKUP_TIMEOUT_MS") {
            self.lookup_timeout_ms = parse_num("LOOKUP_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("POLL_INTERVAL_MS") {
            self.poll_interval_ms = parse_num("POLL_INTERVAL_MS", &v)?;
        }
        if let Some(v) = get("ACTION_RETRIES") {
            self.action_retries = parse_num("ACTION_RETRIES", &v)?;
        }
        if let Some(v) = get("RETRY_BACKOFF_MS") {
            self.retry_backoff_ms = parse_num("RETRY_BACKOFF_MS", &v)?;
        }
        if let Some(v) = get("SETTLE_DELAY_MS") {
            self.settle_delay_ms = parse_num("SETTLE_DELAY_MS", &v)?;
        }
        if let Some(v) = get("READY_TIMEOUT_MS") {
            self.ready_timeout_ms = parse_num("READY_TIMEOUT_MS", &v)?;
        }
        if let Some(dir) = get("SCREENSHOT_DIR") {
            self.screenshot_dir = if dir.is_empty() {
                None
            } else {
                Some(PathBuf::from(dir))
            };
        }

        self.validate()?;
        Ok(self)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> ProbeResult<()> {
        url::Url::parse(&self.base_url)
            .map_err(|e| ProbeError::Config(format!("base_url '{}': {}", self.base_url, e)))?;
        if let Some(webdriver_url) = &self.webdriver_url {
            url::Url::parse(webdriver_url).map_err(|e| {
                ProbeError::Config(format!("webdriver_url '{}': {}", webdriver_url, e))
            })?;
        }
        if self.action_retries == 0 {
            return Err(ProbeError::Config(
                "action_retries must be at least 1".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ProbeError::Config(
                "poll_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// WebDriver endpoint to connect to
    pub fn webdriver_endpoint(&self) -> String {
        self.webdriver_url
            .clone()
            .unwrap_or_else(|| self.browser.default_webdriver_url().to_string())
    }

    /// Durations used by the resolver, navigator and action layer
    pub fn timing(&self) -> Timing {
        Timing {
            lookup_timeout: Duration::from_millis(self.lookup_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            action_retries: self.action_retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            ready_timeout: Duration::from_millis(self.ready_timeout_ms),
        }
    }
}

/// Wait and retry bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub lookup_timeout: Duration,
    pub poll_interval: Duration,
    pub action_retries: u32,
    pub retry_backoff: Duration,
    pub settle_delay: Duration,
    pub ready_timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        HarnessConfig::default().timing()
    }
}

fn parse_bool(name: &str, raw: &str) -> ProbeResult<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ProbeError::Config(format!(
            "{}{} must be a boolean, got '{}'",
            ENV_PREFIX, name, raw
        ))),
    }
}

fn parse_num<T: std::str::FromStr>(name: &str, raw: &str) -> ProbeResult<T> {
    raw.trim().parse::<T>().map_err(|_| {
        ProbeError::Config(format!(
            "{}{} must be a non-negative integer, got '{}'",
            ENV_PREFIX, name, raw
        ))
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
