use serde::Serialize;
use thiserror::Error;

use crate::driver::DriverError;

/// Result alias used across the locator engine
pub type ProbeResult<T> = Result<T, ProbeError>;

/// One failed strategy inside a resolution attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyAttempt {
    /// Human readable name of the strategy that was tried
    pub strategy: String,
    /// Why it did not produce an interactable element
    pub error: String,
}

impl StrategyAttempt {
    pub fn new(strategy: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            error: error.into(),
        }
    }
}

fn summarize(attempts: &[StrategyAttempt]) -> String {
    attempts
        .iter()
        .map(|a| format!("[{}] {}", a.strategy, a.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors surfaced by the locator engine and the form facade
#[derive(Debug, Error)]
pub enum ProbeError {
    /// No strategy in a chain produced an interactable element (exit code 2)
    #[error("Could not resolve {target}: {} strategies failed: {}", .attempts.len(), summarize(.attempts))]
    Resolution {
        target: String,
        attempts: Vec<StrategyAttempt>,
    },

    /// Selector could not be found under a shadow host (exit code 2)
    #[error("Not found in shadow host '{host}': {}", summarize(.attempts))]
    ShadowNotFound {
        host: String,
        attempts: Vec<StrategyAttempt>,
    },

    /// A frame or shadow host could not be located or entered (exit code 3)
    #[error("Failed to enter {target}: {message}")]
    Context { target: String, message: String },

    /// The field catalog has no entry for the requested field (exit code 1)
    #[error("Unknown field '{field}' in {section} section")]
    UnknownField { field: String, section: String },

    /// A strategy chain was built without strategies (exit code 1)
    #[error("Strategy chain for {0} is empty")]
    EmptyChain(String),

    /// Bounded wait elapsed (exit code 5)
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Session could not be created or torn down (exit code 4)
    #[error("WebDriver session failed: {0}")]
    Session(String),

    /// Invalid configuration value (exit code 1)
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Raw driver failure outside of a strategy loop (exit code 1)
    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl ProbeError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ProbeError::Resolution { .. } | ProbeError::ShadowNotFound { .. } => 2,
            ProbeError::Context { .. } => 3,
            ProbeError::Session(_) => 4,
            ProbeError::Timeout(_) => 5,
            ProbeError::UnknownField { .. }
            | ProbeError::EmptyChain(_)
            | ProbeError::Config(_)
            | ProbeError::Driver(_) => 1,
        }
    }

    /// Strategies attempted before giving up, in attempt order
    pub fn attempts(&self) -> &[StrategyAttempt] {
        match self {
            ProbeError::Resolution { attempts, .. }
            | ProbeError::ShadowNotFound { attempts, .. } => attempts,
            _ => &[],
        }
    }

    /// Whether this failure means the target is absent rather than broken
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ProbeError::Resolution { .. } | ProbeError::ShadowNotFound { .. }
        )
    }
}
