//! Browsing-context traversal across iframes and shadow roots.

use std::fmt;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::catalog::Section;
use crate::config::Timing;
use crate::driver::{By, Driver, Following};
use crate::errors::{ProbeError, ProbeResult, StrategyAttempt};

/// Heading tags searched, in order, for an iframe without a stable id
pub const FRAME_HEADING_TAGS: [&str; 3] = ["h1", "h2", "label"];

/// Heading tags searched, in order, for a shadow host
pub const SHADOW_HEADING_TAGS: [&str; 4] = ["h1", "h2", "h3", "h4"];

/// How a frame is found from its parent document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameLocator {
    /// `<iframe id="...">`
    Id(String),
    /// Nearest iframe after a heading with this exact text
    FollowingHeading(String),
}

impl fmt::Display for FrameLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameLocator::Id(id) => write!(f, "iframe #{}", id),
            FrameLocator::FollowingHeading(h) => write!(f, "iframe after '{}'", h),
        }
    }
}

/// The DOM scope lookups are currently evaluated against
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BrowsingContext {
    /// Top-level document
    #[default]
    Root,
    /// Nested frames, outermost first
    Frame(Vec<FrameLocator>),
    /// Shadow root of the host following `heading`, inside `frames`
    Shadow {
        frames: Vec<FrameLocator>,
        heading: String,
    },
}

impl BrowsingContext {
    pub fn frames(&self) -> &[FrameLocator] {
        match self {
            BrowsingContext::Root => &[],
            BrowsingContext::Frame(frames) => frames,
            BrowsingContext::Shadow { frames, .. } => frames,
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, BrowsingContext::Root)
    }
}

impl fmt::Display for BrowsingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrowsingContext::Root => f.write_str("top-level document"),
            BrowsingContext::Frame(frames) => {
                let path: Vec<String> = frames.iter().map(|fr| fr.to_string()).collect();
                f.write_str(&path.join(" > "))
            }
            BrowsingContext::Shadow { frames, heading } => {
                for frame in frames {
                    write!(f, "{} > ", frame)?;
                }
                write!(f, "shadow host after '{}'", heading)
            }
        }
    }
}

/// Where a form section lives, as the facade addresses it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormContext {
    Main,
    Iframe(FrameLocator),
    Shadow { heading: String },
}

impl FormContext {
    pub fn iframe_by_id(id: impl Into<String>) -> Self {
        FormContext::Iframe(FrameLocator::Id(id.into()))
    }

    pub fn iframe_after(heading: impl Into<String>) -> Self {
        FormContext::Iframe(FrameLocator::FollowingHeading(heading.into()))
    }

    pub fn shadow(heading: impl Into<String>) -> Self {
        FormContext::Shadow {
            heading: heading.into(),
        }
    }

    /// Which catalog section describes fields in this context
    pub fn section(&self) -> Section {
        match self {
            FormContext::Main => Section::Main,
            FormContext::Iframe(_) => Section::Iframe,
            FormContext::Shadow { .. } => Section::Shadow,
        }
    }

    /// Browsing context this form section is reached through
    pub fn browsing_context(&self) -> BrowsingContext {
        match self {
            FormContext::Main => BrowsingContext::Root,
            FormContext::Iframe(locator) => BrowsingContext::Frame(vec![locator.clone()]),
            FormContext::Shadow { heading } => BrowsingContext::Shadow {
                frames: Vec::new(),
                heading: heading.clone(),
            },
        }
    }
}

impl fmt::Display for FormContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormContext::Main => f.write_str("main form"),
            FormContext::Iframe(locator) => write!(f, "{}", locator),
            FormContext::Shadow { heading } => write!(f, "shadow form after '{}'", heading),
        }
    }
}

/// Owns the driver and tracks which browsing context is active
pub struct ContextNavigator<D: Driver> {
    driver: D,
    current: BrowsingContext,
    timing: Timing,
}

impl<D: Driver> ContextNavigator<D> {
    pub fn new(driver: D, timing: Timing) -> Self {
        Self {
            driver,
            current: BrowsingContext::Root,
            timing,
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    pub fn current(&self) -> &BrowsingContext {
        &self.current
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    /// Switch into the iframe with this id, then wait for its document
    pub async fn enter_iframe_by_id(&mut self, id: &str) -> ProbeResult<()> {
        let target = format!("iframe #{}", id);
        debug!("Entering {}", target);

        let frames = match self.driver.find_all(&By::Id(id.to_string())).await {
            Ok(found) => found,
            Err(e) => {
                debug!("Id lookup failed for {} ({}), retrying with XPath", target, e);
                self.driver
                    .find_all(&By::XPath(format!("//iframe[@id='{}']", id)))
                    .await
                    .map_err(|e| ProbeError::Context {
                        target: target.clone(),
                        message: e.to_string(),
                    })?
            }
        };

        let Some(frame) = frames.into_iter().next() else {
            return Err(ProbeError::Context {
                target,
                message: "no iframe with this id".to_string(),
            });
        };

        self.switch_into(&frame, &target).await?;
        self.push_frame(FrameLocator::Id(id.to_string()));
        Ok(())
    }

    /// Switch into the nearest iframe following a heading with this text
    pub async fn enter_iframe_following_heading(&mut self, heading: &str) -> ProbeResult<()> {
        let target = format!("iframe after '{}'", heading);
        debug!("Entering {}", target);

        let mut tried = Vec::new();
        for tag in FRAME_HEADING_TAGS {
            for candidate in self.headings(tag, heading).await {
                match self
                    .driver
                    .following(&candidate, &Following::Matching("iframe".to_string()))
                    .await
                {
                    Ok(Some(frame)) => {
                        self.switch_into(&frame, &target).await?;
                        self.push_frame(FrameLocator::FollowingHeading(heading.to_string()));
                        return Ok(());
                    }
                    Ok(None) => tried.push(format!("<{}> has no following iframe", tag)),
                    Err(e) => tried.push(format!("<{}>: {}", tag, e)),
                }
            }
        }

        let message = if tried.is_empty() {
            format!("no {} with text '{}'", FRAME_HEADING_TAGS.join("/"), heading)
        } else {
            tried.join("; ")
        };
        Err(ProbeError::Context { target, message })
    }

    pub async fn enter_frame(&mut self, locator: &FrameLocator) -> ProbeResult<()> {
        match locator {
            FrameLocator::Id(id) => self.enter_iframe_by_id(id).await,
            FrameLocator::FollowingHeading(heading) => {
                self.enter_iframe_following_heading(heading).await
            }
        }
    }

    /// Back to the top-level document; safe to call from any context
    pub async fn return_to_top_level(&mut self) -> ProbeResult<()> {
        if !self.current.is_root() {
            debug!("Returning to top level from {}", self.current);
        }
        self.driver.switch_to_default().await?;
        self.current = BrowsingContext::Root;
        self.wait_ready().await;
        Ok(())
    }

    /// Re-derive a context from the root, entering each frame in turn
    pub async fn restore(&mut self, context: &BrowsingContext) -> ProbeResult<()> {
        self.return_to_top_level().await?;
        for frame in context.frames() {
            self.enter_frame(frame).await?;
        }
        if let BrowsingContext::Shadow { heading, .. } = context {
            self.enter_shadow(heading).await?;
        }
        Ok(())
    }

    /// Mark the shadow host after `heading` as the active scope
    pub async fn enter_shadow(&mut self, heading: &str) -> ProbeResult<D::Element> {
        let host = self.locate_shadow_host(heading).await?;
        self.current = BrowsingContext::Shadow {
            frames: self.current.frames().to_vec(),
            heading: heading.to_string(),
        };
        Ok(host)
    }

    /// Enter the scope of a form section, starting from the top level
    pub async fn enter(&mut self, context: &FormContext) -> ProbeResult<()> {
        match context {
            FormContext::Main => Ok(()),
            FormContext::Iframe(locator) => self.enter_frame(locator).await,
            FormContext::Shadow { heading } => self.enter_shadow(heading).await.map(|_| ()),
        }
    }

    /// Return to the top level after work done in `context`, passing `outcome` through.
    ///
    /// The operation's error takes precedence over a failure to return.
    pub async fn leave<T>(
        &mut self,
        context: &FormContext,
        outcome: ProbeResult<T>,
    ) -> ProbeResult<T> {
        if matches!(context, FormContext::Main) && self.current.is_root() {
            return outcome;
        }

        match (outcome, self.return_to_top_level().await) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(back)) => {
                warn!("Also failed to return to top level: {}", back);
                Err(e)
            }
        }
    }

    /// The custom element that follows a heading with this exact text
    pub async fn locate_shadow_host(&self, heading: &str) -> ProbeResult<D::Element> {
        for tag in SHADOW_HEADING_TAGS {
            for candidate in self.headings(tag, heading).await {
                match self
                    .driver
                    .following(&candidate, &Following::CustomElement)
                    .await
                {
                    Ok(Some(host)) => return Ok(host),
                    Ok(None) => debug!("<{}> '{}' has no following custom element", tag, heading),
                    Err(e) => debug!("Following lookup from <{}> failed: {}", tag, e),
                }
            }
        }

        Err(ProbeError::Context {
            target: format!("shadow host after '{}'", heading),
            message: "no custom element follows this heading".to_string(),
        })
    }

    /// Find `selector` under the shadow host after `heading`.
    ///
    /// Tries the host's light-DOM children, then the shadow-root query, then a
    /// script query against `host.shadowRoot ?? host`.
    pub async fn resolve_in_shadow(
        &self,
        heading: &str,
        selector: &str,
    ) -> ProbeResult<D::Element> {
        let host = self.locate_shadow_host(heading).await?;
        let mut attempts = Vec::with_capacity(3);

        match self
            .driver
            .find_all_within(&host, &By::Css(selector.to_string()))
            .await
        {
            Ok(found) => match found.into_iter().next() {
                Some(first) => {
                    debug!("Found '{}' in light DOM of shadow host", selector);
                    return Ok(first);
                }
                None => attempts.push(StrategyAttempt::new(
                    format!("light DOM '{}'", selector),
                    "no matching child",
                )),
            },
            Err(e) => attempts.push(StrategyAttempt::new(
                format!("light DOM '{}'", selector),
                e.to_string(),
            )),
        }

        match self.driver.shadow_root_query(&host, selector).await {
            Ok(Some(found)) => return Ok(found),
            Ok(None) => attempts.push(StrategyAttempt::new(
                format!("shadow root '{}'", selector),
                "query returned null",
            )),
            Err(e) => attempts.push(StrategyAttempt::new(
                format!("shadow root '{}'", selector),
                e.to_string(),
            )),
        }

        match self.driver.script_shadow_query(&host, selector).await {
            Ok(Some(found)) => return Ok(found),
            Ok(None) => attempts.push(StrategyAttempt::new(
                format!("script query '{}'", selector),
                "query returned null",
            )),
            Err(e) => attempts.push(StrategyAttempt::new(
                format!("script query '{}'", selector),
                e.to_string(),
            )),
        }

        Err(ProbeError::ShadowNotFound {
            host: heading.to_string(),
            attempts,
        })
    }

    /// [`resolve_in_shadow`](Self::resolve_in_shadow) polled until the lookup timeout,
    /// for hosts whose shadow content is attached after the page loads.
    ///
    /// A missing host still fails at once.
    pub async fn wait_in_shadow(&self, heading: &str, selector: &str) -> ProbeResult<D::Element> {
        let deadline = Instant::now() + self.timing.lookup_timeout;
        loop {
            match self.resolve_in_shadow(heading, selector).await {
                Err(ProbeError::ShadowNotFound { .. }) if Instant::now() < deadline => {
                    sleep(self.timing.poll_interval).await;
                }
                outcome => return outcome,
            }
        }
    }

    /// Elements of `tag` whose trimmed text is exactly `text`
    async fn headings(&self, tag: &str, text: &str) -> Vec<D::Element> {
        let wanted = text.trim();
        let Ok(candidates) = self.driver.find_all(&By::Css(tag.to_string())).await else {
            return Vec::new();
        };

        let mut matching = Vec::new();
        for candidate in candidates {
            if let Ok(found) = self.driver.text(&candidate).await
                && found.trim() == wanted
            {
                matching.push(candidate);
            }
        }
        matching
    }

    async fn switch_into(&mut self, frame: &D::Element, target: &str) -> ProbeResult<()> {
        self.driver
            .switch_to_frame(frame)
            .await
            .map_err(|e| ProbeError::Context {
                target: target.to_string(),
                message: e.to_string(),
            })?;
        info!("Entered {}", target);
        self.wait_ready().await;
        Ok(())
    }

    fn push_frame(&mut self, locator: FrameLocator) {
        let mut frames = self.current.frames().to_vec();
        frames.push(locator);
        self.current = BrowsingContext::Frame(frames);
    }

    /// Wait for `document.readyState == "complete"`; proceeds with a warning on timeout
    async fn wait_ready(&self) {
        let deadline = Instant::now() + self.timing.ready_timeout;
        loop {
            match self.driver.ready_state().await {
                Ok(state) if state == "complete" => return,
                Ok(state) => debug!("Document not ready yet ({})", state),
                Err(e) => debug!("Could not read ready state: {}", e),
            }
            if Instant::now() >= deadline {
                warn!(
                    "Document in {} not complete after {}ms, continuing",
                    self.current,
                    self.timing.ready_timeout.as_millis()
                );
                return;
            }
            sleep(self.timing.poll_interval).await;
        }
    }
}

#[cfg(test)]
#[path = "context_test.rs"]
mod context_test;
