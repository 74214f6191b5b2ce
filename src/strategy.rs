use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{ProbeError, ProbeResult};

/// Classification of a single way to find an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorKind {
    /// Label text associated with the control
    LabelText,
    /// `id` attribute
    Id,
    /// `name` attribute
    Name,
    /// `placeholder` attribute
    Placeholder,
    /// Structural XPath expression
    XPath,
    /// CSS selector
    CssSelector,
    /// Substring of the visible text (buttons, links)
    PartialText,
}

impl LocatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocatorKind::LabelText => "label",
            LocatorKind::Id => "id",
            LocatorKind::Name => "name",
            LocatorKind::Placeholder => "placeholder",
            LocatorKind::XPath => "xpath",
            LocatorKind::CssSelector => "css",
            LocatorKind::PartialText => "text",
        }
    }

    /// Locators tied to markup structure rather than business meaning
    pub fn is_structural(&self) -> bool {
        matches!(self, LocatorKind::XPath | LocatorKind::CssSelector)
    }
}

impl fmt::Display for LocatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable description of one way to find an element.
///
/// `kind` and `value` fully determine lookup behavior; `description` only feeds
/// diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocatorStrategy {
    kind: LocatorKind,
    value: String,
    description: String,
}

impl LocatorStrategy {
    pub fn new(kind: LocatorKind, value: impl Into<String>) -> Self {
        let value = value.into();
        let description = format!("{} '{}'", kind, value);
        Self {
            kind,
            value,
            description,
        }
    }

    pub fn label(text: impl Into<String>) -> Self {
        Self::new(LocatorKind::LabelText, text)
    }

    pub fn id(id: impl Into<String>) -> Self {
        Self::new(LocatorKind::Id, id)
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self::new(LocatorKind::Name, name)
    }

    pub fn placeholder(text: impl Into<String>) -> Self {
        Self::new(LocatorKind::Placeholder, text)
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Self::new(LocatorKind::XPath, expr)
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Self::new(LocatorKind::CssSelector, selector)
    }

    pub fn partial_text(text: impl Into<String>) -> Self {
        Self::new(LocatorKind::PartialText, text)
    }

    /// Replace the diagnostic description, keeping lookup behavior
    #[must_use]
    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn kind(&self) -> LocatorKind {
        self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Equivalent CSS selector, when the strategy has one.
    ///
    /// Shadow roots only accept selector queries, so label, XPath and text
    /// strategies have no shadow-scoped form.
    pub fn to_css(&self) -> Option<String> {
        match self.kind {
            LocatorKind::Id => Some(css_attr("id", &self.value)),
            LocatorKind::Name => Some(css_attr("name", &self.value)),
            LocatorKind::Placeholder => Some(css_attr("placeholder", &self.value)),
            LocatorKind::CssSelector => Some(self.value.clone()),
            LocatorKind::LabelText | LocatorKind::XPath | LocatorKind::PartialText => None,
        }
    }
}

impl fmt::Display for LocatorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

/// Attribute-equality selector with the value quoted for CSS
pub fn css_attr(attr: &str, value: &str) -> String {
    format!("[{}='{}']", attr, value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Ordered, non-empty list of strategies ranked from most to least stable.
///
/// Earlier entries win even when a later one would also match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyChain {
    strategies: Vec<LocatorStrategy>,
}

impl StrategyChain {
    /// Build a chain from a list, rejecting an empty one
    pub fn new(target: &str, strategies: Vec<LocatorStrategy>) -> ProbeResult<Self> {
        if strategies.is_empty() {
            return Err(ProbeError::EmptyChain(target.to_string()));
        }
        Ok(Self { strategies })
    }

    /// Start a chain with its highest-priority strategy
    pub fn starting_with(first: LocatorStrategy) -> Self {
        Self {
            strategies: vec![first],
        }
    }

    /// Append a lower-priority fallback
    #[must_use]
    pub fn then(mut self, next: LocatorStrategy) -> Self {
        self.strategies.push(next);
        self
    }

    pub fn strategies(&self) -> &[LocatorStrategy] {
        &self.strategies
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LocatorStrategy> {
        self.strategies.iter()
    }
}

impl<'a> IntoIterator for &'a StrategyChain {
    type Item = &'a LocatorStrategy;
    type IntoIter = std::slice::Iter<'a, LocatorStrategy>;

    fn into_iter(self) -> Self::IntoIter {
        self.strategies.iter()
    }
}

#[cfg(test)]
#[path = "strategy_test.rs"]
mod strategy_test;
