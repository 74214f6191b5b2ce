use anyhow::{Context, Result};
use async_trait::async_trait;
use fantoccini::elements::{Element, ElementRef};
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::config::HarnessConfig;
use crate::driver::{By, Driver, DriverError, DriverResult, Following};
use crate::strategy::css_attr;

/// W3C key under which WebDriver serializes element references
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Supported browser types
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BrowserType {
    /// Mozilla Firefox
    Firefox,
    /// Google Chrome/Chromium
    Chrome,
}

impl std::str::FromStr for BrowserType {
    type Err = anyhow::Error;

    /// Parse browser type from string (case-insensitive)
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "firefox" => Ok(BrowserType::Firefox),
            "chrome" | "chromium" => Ok(BrowserType::Chrome),
            _ => anyhow::bail!("Unsupported browser: {}", s),
        }
    }
}

impl BrowserType {
    /// Standard port of the browser's WebDriver binary
    pub fn default_webdriver_url(&self) -> &'static str {
        match self {
            BrowserType::Firefox => "http://localhost:4444",
            BrowserType::Chrome => "http://localhost:9515",
        }
    }

    pub fn driver_binary(&self) -> &'static str {
        match self {
            BrowserType::Firefox => "geckodriver",
            BrowserType::Chrome => "chromedriver",
        }
    }
}

impl From<CmdError> for DriverError {
    fn from(err: CmdError) -> Self {
        // Classify from the message, WebDriver error codes are embedded in it
        let msg = err.to_string();
        let lower = msg.to_lowercase();

        if lower.contains("no such element") || lower.contains("unable to locate element") {
            DriverError::NoSuchElement(msg)
        } else if lower.contains("stale element") {
            DriverError::StaleElement(msg)
        } else if lower.contains("not interactable")
            || lower.contains("click intercepted")
            || lower.contains("invalid element state")
        {
            DriverError::NotInteractable(msg)
        } else if lower.contains("unsupported operation") || lower.contains("unknown command") {
            DriverError::Unsupported(msg)
        } else {
            DriverError::Command(msg)
        }
    }
}

/// One browser session owned by one test case
pub struct WebDriverSession {
    client: Client,
    browser_type: BrowserType,
}

impl WebDriverSession {
    /// Create a new session against the configured WebDriver endpoint
    pub async fn connect(config: &HarnessConfig) -> Result<Self> {
        let browser_type = config.browser;
        let webdriver_url = config.webdriver_endpoint();
        info!("Connecting to {:?} WebDriver at {}", browser_type, webdriver_url);

        if !Self::is_webdriver_running(&webdriver_url).await {
            anyhow::bail!(
                "Cannot connect to {} WebDriver at {}.\n\
                Please ensure {} is running:\n\
                  For Firefox: geckodriver --port 4444\n\
                  For Chrome: chromedriver --port 9515",
                browser_type.driver_binary(),
                webdriver_url,
                browser_type.driver_binary(),
            );
        }

        let mut caps = serde_json::Map::new();

        match &browser_type {
            BrowserType::Firefox => {
                let mut args = Vec::new();

                if config.headless {
                    args.push("--headless".to_string());
                }

                if let Some(vp) = &config.viewport {
                    args.push(format!("--width={}", vp.width));
                    args.push(format!("--height={}", vp.height));
                }

                caps.insert("moz:firefoxOptions".to_string(), json!({ "args": args }));
            }
            BrowserType::Chrome => {
                let mut args = vec!["--no-sandbox".to_string()];

                if config.headless {
                    args.push("--headless=new".to_string());
                    args.push("--disable-gpu".to_string());
                    // Prevent shared memory issues
                    args.push("--disable-dev-shm-usage".to_string());
                }

                if let Some(vp) = &config.viewport {
                    args.push(format!("--window-size={},{}", vp.width, vp.height));
                }

                caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
            }
        }

        debug!("Requesting session with capabilities {:?}", caps);

        let client = ClientBuilder::rustls()
            .capabilities(caps)
            .connect(&webdriver_url)
            .await
            .context("Failed to connect to WebDriver")?;

        if let Some(vp) = &config.viewport {
            debug!("Setting viewport to {}x{}", vp.width, vp.height);
            if let Err(e) = client.set_window_size(vp.width, vp.height).await {
                // Viewport sizing is best-effort
                debug!("Note: Could not set window size: {}", e);
            }
        }

        Ok(WebDriverSession {
            client,
            browser_type,
        })
    }

    /// Whether a WebDriver answers `/status` at `url`
    pub async fn is_webdriver_running(url: &str) -> bool {
        let status_url = format!("{}/status", url.trim_end_matches('/'));

        match reqwest::get(&status_url).await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    pub fn browser_type(&self) -> BrowserType {
        self.browser_type
    }

    /// Get the current URL - useful for health checks
    pub async fn current_url(&self) -> Result<String> {
        Ok(self.client.current_url().await?.to_string())
    }

    /// End the session and release the browser
    pub async fn close(self) -> Result<()> {
        self.client
            .close()
            .await
            .context("Failed to close WebDriver session")?;
        Ok(())
    }

    async fn find_all_in_client(&self, by: &By) -> DriverResult<Vec<Element>> {
        let found = match by {
            By::Id(id) => self.client.find_all(Locator::Id(id)).await?,
            By::Name(name) => {
                self.client
                    .find_all(Locator::Css(&css_attr("name", name)))
                    .await?
            }
            By::Css(css) => self.client.find_all(Locator::Css(css)).await?,
            By::XPath(xpath) => self.client.find_all(Locator::XPath(xpath)).await?,
        };
        Ok(found)
    }

    fn element_arg(element: &Element) -> DriverResult<Value> {
        serde_json::to_value(element)
            .map_err(|e| DriverError::Command(format!("cannot serialize element: {}", e)))
    }

    /// Turn a script result into an element handle, `null` meaning none
    fn element_from_json(&self, value: Value) -> DriverResult<Option<Element>> {
        match value {
            Value::Null => Ok(None),
            Value::Object(map) => match map.get(ELEMENT_KEY).and_then(Value::as_str) {
                Some(id) => Ok(Some(Element::from_element_id(
                    self.client.clone(),
                    ElementRef::from(id.to_string()),
                ))),
                None => Err(DriverError::Command(format!(
                    "script returned a non-element object: {:?}",
                    map
                ))),
            },
            other => Err(DriverError::Command(format!(
                "script returned a non-element value: {}",
                other
            ))),
        }
    }

    async fn execute_for_element(
        &self,
        script: &str,
        args: Vec<Value>,
    ) -> DriverResult<Option<Element>> {
        let value = self.client.execute(script, args).await?;
        self.element_from_json(value)
    }
}

const FOLLOWING_SCRIPT: &str = r#"
    const origin = arguments[0];
    const selector = arguments[1];
    const root = origin.getRootNode();
    const candidates = selector === null
        ? Array.from(root.querySelectorAll('*')).filter(el => el.tagName.includes('-'))
        : Array.from(root.querySelectorAll(selector));
    return candidates.find(el =>
        (origin.compareDocumentPosition(el) & Node.DOCUMENT_POSITION_FOLLOWING) &&
        !origin.contains(el)) || null;
"#;

const SHADOW_ROOT_QUERY_SCRIPT: &str = r#"
    const host = arguments[0];
    if (!host.shadowRoot) {
        throw new Error('unsupported operation: host has no open shadow root');
    }
    return host.shadowRoot.querySelector(arguments[1]);
"#;

const SCRIPT_SHADOW_QUERY_SCRIPT: &str = r#"
    const host = arguments[0];
    return (host.shadowRoot || host).querySelector(arguments[1]);
"#;

#[async_trait]
impl Driver for WebDriverSession {
    type Element = Element;

    async fn goto(&self, url: &str) -> DriverResult<()> {
        info!("Navigating to {}", url);
        self.client.goto(url).await?;
        Ok(())
    }

    async fn find_all(&self, by: &By) -> DriverResult<Vec<Element>> {
        self.find_all_in_client(by).await
    }

    async fn find_all_within(&self, scope: &Element, by: &By) -> DriverResult<Vec<Element>> {
        let found = match by {
            By::Id(id) => scope.find_all(Locator::Id(id)).await?,
            By::Name(name) => scope.find_all(Locator::Css(&css_attr("name", name))).await?,
            By::Css(css) => scope.find_all(Locator::Css(css)).await?,
            By::XPath(xpath) => scope.find_all(Locator::XPath(xpath)).await?,
        };
        Ok(found)
    }

    async fn following(
        &self,
        origin: &Element,
        target: &Following,
    ) -> DriverResult<Option<Element>> {
        let selector = match target {
            Following::Matching(css) => json!(css),
            Following::CustomElement => Value::Null,
        };
        self.execute_for_element(FOLLOWING_SCRIPT, vec![Self::element_arg(origin)?, selector])
            .await
    }

    async fn parent(&self, element: &Element) -> DriverResult<Option<Element>> {
        self.execute_for_element(
            "return arguments[0].parentElement;",
            vec![Self::element_arg(element)?],
        )
        .await
    }

    async fn shadow_root_query(&self, host: &Element, css: &str) -> DriverResult<Option<Element>> {
        self.execute_for_element(
            SHADOW_ROOT_QUERY_SCRIPT,
            vec![Self::element_arg(host)?, json!(css)],
        )
        .await
    }

    async fn script_shadow_query(
        &self,
        host: &Element,
        css: &str,
    ) -> DriverResult<Option<Element>> {
        self.execute_for_element(
            SCRIPT_SHADOW_QUERY_SCRIPT,
            vec![Self::element_arg(host)?, json!(css)],
        )
        .await
    }

    async fn text(&self, element: &Element) -> DriverResult<String> {
        Ok(element.text().await?)
    }

    async fn attribute(&self, element: &Element, name: &str) -> DriverResult<Option<String>> {
        Ok(element.attr(name).await?)
    }

    async fn value(&self, element: &Element) -> DriverResult<String> {
        Ok(element.prop("value").await?.unwrap_or_default())
    }

    async fn is_displayed(&self, element: &Element) -> DriverResult<bool> {
        Ok(element.is_displayed().await?)
    }

    async fn is_enabled(&self, element: &Element) -> DriverResult<bool> {
        Ok(element.is_enabled().await?)
    }

    async fn is_selected(&self, element: &Element) -> DriverResult<bool> {
        Ok(element.is_selected().await?)
    }

    async fn click(&self, element: &Element) -> DriverResult<()> {
        element.click().await?;
        Ok(())
    }

    async fn clear(&self, element: &Element) -> DriverResult<()> {
        element.clear().await?;
        Ok(())
    }

    async fn send_keys(&self, element: &Element, text: &str) -> DriverResult<()> {
        element.send_keys(text).await?;
        Ok(())
    }

    async fn page_source(&self) -> DriverResult<String> {
        Ok(self.client.source().await?)
    }

    async fn switch_to_frame(&self, frame: &Element) -> DriverResult<()> {
        frame.clone().enter_frame().await?;
        Ok(())
    }

    async fn switch_to_default(&self) -> DriverResult<()> {
        self.client.enter_frame(None).await?;
        Ok(())
    }

    async fn ready_state(&self) -> DriverResult<String> {
        let state = self
            .client
            .execute("return document.readyState;", vec![])
            .await?;
        Ok(state.as_str().unwrap_or_default().to_string())
    }

    async fn screenshot(&self) -> DriverResult<Vec<u8>> {
        match self.client.screenshot().await {
            Ok(png) => Ok(png),
            Err(e) => {
                warn!("Screenshot command failed: {}", e);
                Err(e.into())
            }
        }
    }
}
