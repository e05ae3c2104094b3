//! Error types for the resolution funnel

use thiserror::Error;

/// Locator error enumeration
///
/// Layer errors never escape the orchestrator; they are logged and recorded
/// as an empty candidate list. Only configuration errors surface to callers.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LocatorError {
    /// Instruction produced an unusable slot
    #[error("recognition failed: {0}")]
    RecognitionFailed(String),

    /// No layer produced an acceptable candidate
    #[error("target not found")]
    NoCandidate,

    /// Reasoning service or screen capture failed
    #[error("External service '{service}' failed: {reason}")]
    ExternalService { service: String, reason: String },

    /// Reasoning reply was not usable
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// External call exceeded its budget
    #[error("Resolution timeout: {0}")]
    Timeout(String),

    /// Thresholds or limits outside their valid range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl LocatorError {
    pub fn external(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExternalService {
            service: service.into(),
            reason: reason.into(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LocatorError::Timeout(_) | LocatorError::ExternalService { .. }
        )
    }

    /// Get error severity (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            LocatorError::InvalidConfig(_) => 3,
            LocatorError::ExternalService { .. } | LocatorError::Timeout(_) => 2,
            LocatorError::MalformedResponse(_) | LocatorError::RecognitionFailed(_) => 1,
            LocatorError::NoCandidate => 0,
        }
    }
}
