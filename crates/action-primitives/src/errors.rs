//! Error types for action primitives

use thiserror::Error;

/// Error types for actuator operations
#[derive(Debug, Error, Clone)]
pub enum ActionError {
    /// Operation exceeded its deadline
    #[error("Action timeout: {0}")]
    Timeout(String),

    /// Element is not clickable (obscured, disabled, or not interactable)
    #[error("Element not clickable: {0}")]
    NotClickable(String),

    /// Element is not enabled for interaction
    #[error("Element not enabled: {0}")]
    NotEnabled(String),

    /// Element id is not part of the latest observation
    #[error("Stale element: {0}")]
    StaleElement(i64),

    /// Screenshot could not be captured
    #[error("Screenshot failed: {0}")]
    Screenshot(String),

    /// Browser transport or protocol error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Operation was cancelled or interrupted
    #[error("Operation interrupted: {0}")]
    Interrupted(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ActionError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ActionError::Timeout(_) | ActionError::NotClickable(_) | ActionError::Transport(_)
        )
    }

    /// Get error severity level (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            ActionError::Internal(_) | ActionError::StaleElement(_) => 3,
            ActionError::Transport(_) | ActionError::Screenshot(_) => 2,
            ActionError::Timeout(_) | ActionError::NotEnabled(_) => 1,
            _ => 0,
        }
    }
}
