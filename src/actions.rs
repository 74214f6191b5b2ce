//! Best-effort interaction primitives.
//!
//! Every action waits for the element to be interactable, retries a bounded
//! number of times with a fixed backoff and then returns without error. Callers
//! judge correctness by asserting on the resulting page state.

use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::config::Timing;
use crate::driver::{By, Driver, is_interactable};

/// How a best-effort action ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The action took effect
    Completed,
    /// The element was already in the requested state, nothing was done
    Unchanged,
    /// No option of a select matched by text or value
    NoMatchingOption,
    /// Every attempt failed; the element is left as the last attempt found it
    Exhausted { attempts: u32 },
}

impl ActionOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, ActionOutcome::Completed | ActionOutcome::Unchanged)
    }
}

/// Retrying click/type/select/check wrapper around a driver
pub struct Actions<'a, D: Driver> {
    driver: &'a D,
    timing: Timing,
}

impl<'a, D: Driver> Actions<'a, D> {
    pub fn new(driver: &'a D, timing: Timing) -> Self {
        Self { driver, timing }
    }

    /// Poll until the element is displayed and enabled, bounded by the lookup timeout
    pub async fn wait_interactable(&self, element: &D::Element) -> bool {
        let deadline = Instant::now() + self.timing.lookup_timeout;
        loop {
            if is_interactable(self.driver, element).await {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(self.timing.poll_interval).await;
        }
    }

    pub async fn click(&self, element: &D::Element) -> ActionOutcome {
        let attempts = self.timing.action_retries.max(1);

        for attempt in 1..=attempts {
            if !self.wait_interactable(element).await {
                warn!("Click attempt {}/{}: element not interactable", attempt, attempts);
            } else {
                match self.driver.click(element).await {
                    Ok(()) => {
                        debug!("Clicked element on attempt {}", attempt);
                        return ActionOutcome::Completed;
                    }
                    Err(e) => warn!("Click attempt {}/{} failed: {}", attempt, attempts, e),
                }
            }
            if attempt < attempts {
                sleep(self.timing.retry_backoff).await;
            }
        }

        warn!("Giving up on click after {} attempts", attempts);
        ActionOutcome::Exhausted { attempts }
    }

    /// Clear, type and read the value back, retrying until it matches.
    ///
    /// Inputs that restrict length keep their truncated value after the
    /// retries are exhausted.
    pub async fn type_and_verify(&self, element: &D::Element, text: &str) -> ActionOutcome {
        let attempts = self.timing.action_retries.max(1);

        for attempt in 1..=attempts {
            if !self.wait_interactable(element).await {
                warn!("Type attempt {}/{}: element not interactable", attempt, attempts);
            } else {
                match self.type_once(element, text).await {
                    Ok(actual) if actual == text => {
                        debug!("Typed and verified value on attempt {}", attempt);
                        return ActionOutcome::Completed;
                    }
                    Ok(actual) => warn!(
                        "Type attempt {}/{}: read back '{}' instead of '{}'",
                        attempt, attempts, actual, text
                    ),
                    Err(e) => warn!("Type attempt {}/{} failed: {}", attempt, attempts, e),
                }
            }
            if attempt < attempts {
                sleep(self.timing.retry_backoff).await;
            }
        }

        warn!("Giving up on typing '{}' after {} attempts", text, attempts);
        ActionOutcome::Exhausted { attempts }
    }

    async fn type_once(
        &self,
        element: &D::Element,
        text: &str,
    ) -> crate::driver::DriverResult<String> {
        self.driver.clear(element).await?;
        self.driver.send_keys(element, text).await?;
        self.driver.value(element).await
    }

    /// Select by visible text, falling back to the option's `value`
    pub async fn select_option(&self, select: &D::Element, option: &str) -> ActionOutcome {
        let options = match self
            .driver
            .find_all_within(select, &By::Css("option".to_string()))
            .await
        {
            Ok(options) => options,
            Err(e) => {
                warn!("Could not list options: {}", e);
                return ActionOutcome::Exhausted { attempts: 1 };
            }
        };

        let mut by_value = None;
        let mut by_text = None;
        for candidate in options {
            let text = self.driver.text(&candidate).await.unwrap_or_default();
            if text.trim() == option.trim() {
                by_text = Some(candidate);
                break;
            }
            if by_value.is_none()
                && self
                    .driver
                    .attribute(&candidate, "value")
                    .await
                    .ok()
                    .flatten()
                    .is_some_and(|v| v == option)
            {
                by_value = Some(candidate);
            }
        }

        let Some(target) = by_text.or_else(|| {
            if by_value.is_some() {
                info!("No option with text '{}', selecting by value", option);
            }
            by_value
        }) else {
            warn!("No option matches '{}' by text or value", option);
            return ActionOutcome::NoMatchingOption;
        };

        if matches!(self.driver.is_selected(&target).await, Ok(true)) {
            return ActionOutcome::Unchanged;
        }
        self.click(&target).await
    }

    /// Drive a checkbox or radio to `desired`, clicking only when the state differs
    pub async fn set_checked(&self, element: &D::Element, desired: bool) -> ActionOutcome {
        let attempts = self.timing.action_retries.max(1);

        for attempt in 1..=attempts {
            match self.driver.is_selected(element).await {
                Ok(current) if current == desired => {
                    return if attempt == 1 {
                        debug!("Control already {}", if desired { "checked" } else { "unchecked" });
                        ActionOutcome::Unchanged
                    } else {
                        ActionOutcome::Completed
                    };
                }
                Ok(_) => {
                    if self.wait_interactable(element).await
                        && let Err(e) = self.driver.click(element).await
                    {
                        warn!("Toggle attempt {}/{} failed: {}", attempt, attempts, e);
                    }
                }
                Err(e) => warn!("Could not read selection state: {}", e),
            }

            if matches!(self.driver.is_selected(element).await, Ok(v) if v == desired) {
                return ActionOutcome::Completed;
            }
            if attempt < attempts {
                sleep(self.timing.retry_backoff).await;
            }
        }

        warn!("Giving up on toggling control after {} attempts", attempts);
        ActionOutcome::Exhausted { attempts }
    }
}

#[cfg(test)]
#[path = "actions_test.rs"]
mod actions_test;
