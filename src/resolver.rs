//! Fallback-chained element resolution.
//!
//! A [`StrategyChain`] is tried in priority order against the current browsing
//! context. Each strategy gets a bounded polling window; the first element that
//! is both found and interactable wins and no later strategy is consulted.

use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::config::Timing;
use crate::diagnostics::{DiagnosticSink, capture_failure};
use crate::driver::{
    By, Driver, DriverError, DriverResult, Following, INTERACTIVE_SELECTOR, is_interactable,
};
use crate::errors::{ProbeError, ProbeResult, StrategyAttempt};
use crate::strategy::{LocatorKind, LocatorStrategy, StrategyChain, css_attr};

/// Selectors for controls matched by partial visible text
const TEXT_TARGET_SELECTOR: &str =
    "button, input[type='submit'], input[type='button'], a, label";

/// An element found by a strategy and interactable when it was resolved.
///
/// Interactability is re-checked before every action; the flag only records
/// the state at resolution time.
#[derive(Debug, Clone)]
pub struct ResolvedElement<E> {
    pub element: E,
    pub strategy: LocatorStrategy,
    pub interactable: bool,
}

/// Resolves strategy chains in the driver's current context
pub struct ElementResolver<'a, D: Driver> {
    driver: &'a D,
    sink: &'a dyn DiagnosticSink,
    timing: Timing,
}

impl<'a, D: Driver> ElementResolver<'a, D> {
    pub fn new(driver: &'a D, sink: &'a dyn DiagnosticSink, timing: Timing) -> Self {
        Self {
            driver,
            sink,
            timing,
        }
    }

    /// Return the first found-and-interactable element, trying strategies in order.
    ///
    /// When every strategy fails the error lists each attempt in order and a
    /// diagnostic screenshot is captured.
    pub async fn resolve(
        &self,
        target: &str,
        chain: &StrategyChain,
    ) -> ProbeResult<ResolvedElement<D::Element>> {
        let mut attempts = Vec::with_capacity(chain.len());

        for strategy in chain {
            debug!("Resolving {} via {}", target, strategy);
            match self.attempt(strategy).await {
                Ok(element) => {
                    info!("Resolved {} via {}", target, strategy);
                    return Ok(ResolvedElement {
                        element,
                        strategy: strategy.clone(),
                        interactable: true,
                    });
                }
                Err(reason) => {
                    debug!("Strategy {} failed for {}: {}", strategy, target, reason);
                    attempts.push(StrategyAttempt::new(strategy.description(), reason));
                }
            }
        }

        warn!("All {} strategies failed for {}", attempts.len(), target);
        capture_failure(self.driver, self.sink, &format!("resolve {}", target)).await;

        Err(ProbeError::Resolution {
            target: target.to_string(),
            attempts,
        })
    }

    /// Poll one strategy until it yields an interactable element or its window closes
    async fn attempt(&self, strategy: &LocatorStrategy) -> Result<D::Element, String> {
        let deadline = Instant::now() + self.timing.lookup_timeout;

        loop {
            let reason = match self.candidates(strategy).await {
                Ok(found) if found.is_empty() => "no matching element".to_string(),
                Ok(found) if strategy.kind() == LocatorKind::Id && found.len() > 1 => {
                    // Duplicate ids do not resolve themselves by waiting
                    return Err(format!("ambiguous: {} elements share this id", found.len()));
                }
                Ok(found) => {
                    let total = found.len();
                    match self.first_interactable(found).await {
                        Some(element) => return Ok(element),
                        None => format!("{} match(es) but none visible and enabled", total),
                    }
                }
                Err(e) => e.to_string(),
            };

            if Instant::now() >= deadline {
                return Err(format!(
                    "{} (after {}ms)",
                    reason,
                    self.timing.lookup_timeout.as_millis()
                ));
            }
            sleep(self.timing.poll_interval).await;
        }
    }

    async fn first_interactable(&self, candidates: Vec<D::Element>) -> Option<D::Element> {
        for candidate in candidates {
            if is_interactable(self.driver, &candidate).await {
                return Some(candidate);
            }
        }
        None
    }

    /// Elements a strategy points at, in preference order
    pub async fn candidates(&self, strategy: &LocatorStrategy) -> DriverResult<Vec<D::Element>> {
        let value = strategy.value();
        match strategy.kind() {
            LocatorKind::LabelText => self.by_label(value).await,
            LocatorKind::Id => self.driver.find_all(&By::Id(value.to_string())).await,
            LocatorKind::Name => self.driver.find_all(&By::Name(value.to_string())).await,
            LocatorKind::Placeholder => {
                self.driver
                    .find_all(&By::Css(css_attr("placeholder", value)))
                    .await
            }
            LocatorKind::XPath => self.driver.find_all(&By::XPath(value.to_string())).await,
            LocatorKind::CssSelector => self.driver.find_all(&By::Css(value.to_string())).await,
            LocatorKind::PartialText => self.by_partial_text(value).await,
        }
    }

    /// Label association in three tiers: `for` attribute, the first control
    /// following the label, then the first control inside the label's parent.
    async fn by_label(&self, text: &str) -> DriverResult<Vec<D::Element>> {
        let wanted = normalize_label(text);
        let labels = self.driver.find_all(&By::Css("label".to_string())).await?;

        let mut matching = Vec::new();
        for label in labels {
            let label_text = self.driver.text(&label).await.unwrap_or_default();
            if normalize_label(&label_text) == wanted {
                matching.push(label);
            }
        }
        if matching.is_empty() {
            return Err(DriverError::NoSuchElement(format!("label '{}'", text)));
        }

        for label in &matching {
            if let Some(target_id) = self.driver.attribute(label, "for").await?
                && !target_id.is_empty()
            {
                let found = self.driver.find_all(&By::Id(target_id.clone())).await?;
                if !found.is_empty() {
                    return Ok(found);
                }
                debug!("Label '{}' points at missing id '{}'", text, target_id);
                continue;
            }

            if let Some(next) = self
                .driver
                .following(label, &Following::Matching(INTERACTIVE_SELECTOR.to_string()))
                .await?
            {
                return Ok(vec![next]);
            }

            if let Some(container) = self.driver.parent(label).await? {
                let inside = self
                    .driver
                    .find_all_within(&container, &By::Css(INTERACTIVE_SELECTOR.to_string()))
                    .await?;
                if !inside.is_empty() {
                    return Ok(inside);
                }
            }
        }

        Err(DriverError::NoSuchElement(format!(
            "no control associated with label '{}'",
            text
        )))
    }

    async fn by_partial_text(&self, text: &str) -> DriverResult<Vec<D::Element>> {
        let wanted = text.to_lowercase();
        let candidates = self
            .driver
            .find_all(&By::Css(TEXT_TARGET_SELECTOR.to_string()))
            .await?;

        let mut matching = Vec::new();
        for candidate in candidates {
            let visible = self.driver.text(&candidate).await.unwrap_or_default();
            let value = self
                .driver
                .attribute(&candidate, "value")
                .await
                .ok()
                .flatten()
                .unwrap_or_default();
            if visible.to_lowercase().contains(&wanted) || value.to_lowercase().contains(&wanted) {
                matching.push(candidate);
            }
        }
        Ok(matching)
    }
}

/// Label text with whitespace collapsed, case folded and the trailing
/// required-marker or colon removed
pub fn normalize_label(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_end_matches(|c: char| c == '*' || c == ':' || c.is_whitespace())
        .to_lowercase()
}

#[cfg(test)]
#[path = "resolver_test.rs"]
mod resolver_test;
