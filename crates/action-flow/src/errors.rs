//! Error types for step execution

use action_primitives::ActionError;
use thiserror::Error;

use crate::types::{StepAction, TestStep};

/// Errors that end one OODA attempt
#[derive(Debug, Error, Clone)]
pub enum StepError {
    /// No snapshot could be taken
    #[error("Observe failed: {0}")]
    Observe(String),

    /// The actuator rejected or failed the action
    #[error("Act failed: {0}")]
    Act(#[from] ActionError),

    /// The step declares an action the engine does not perform
    #[error("Action not supported: {0}")]
    ActionUnsupported(StepAction),

    /// The funnel found no element for the instruction
    #[error("target not found: {0}")]
    TargetNotFound(String),

    /// Expected outcome did not hold
    #[error("Verification failed: {0}")]
    Verification(String),

    /// An external call exceeded its deadline
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The step itself is incomplete, e.g. an input without a value
    #[error("Invalid step: {0}")]
    InvalidStep(String),
}

impl StepError {
    /// Check if another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            StepError::Act(err) => err.is_retryable() || matches!(err, ActionError::StaleElement(_)),
            StepError::ActionUnsupported(_) | StepError::InvalidStep(_) => false,
            _ => true,
        }
    }

    /// Get error severity level (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            StepError::Act(err) => err.severity(),
            StepError::ActionUnsupported(_) | StepError::InvalidStep(_) => 3,
            StepError::Observe(_) => 2,
            StepError::Timeout(_) | StepError::Verification(_) => 1,
            StepError::TargetNotFound(_) => 0,
        }
    }
}

/// A failed attempt together with the records it produced before failing
#[derive(Debug, Error, Clone)]
#[error("{error}")]
pub struct StepFailure {
    pub error: StepError,
    /// The step as far as the attempt got, status `Failed`
    pub step: Box<TestStep>,
}

impl StepFailure {
    pub fn new(step: TestStep, error: StepError) -> Self {
        Self {
            error,
            step: Box::new(step),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.error.is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(StepError::TargetNotFound("点击提交按钮".into()).is_retryable());
        assert!(StepError::Observe("no target".into()).is_retryable());
        assert!(StepError::Act(ActionError::StaleElement(3)).is_retryable());
        assert!(!StepError::Act(ActionError::Internal("bug".into())).is_retryable());
        assert!(!StepError::ActionUnsupported(StepAction::Navigate).is_retryable());
        assert!(!StepError::InvalidStep("no value".into()).is_retryable());
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            StepError::TargetNotFound("click save".into()).to_string(),
            "target not found: click save"
        );
        assert_eq!(
            StepError::ActionUnsupported(StepAction::Hover).to_string(),
            "Action not supported: hover"
        );
        assert_eq!(StepError::Act(ActionError::Timeout("click".into())).severity(), 1);
    }
}
