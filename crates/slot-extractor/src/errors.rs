//! Error types for slot extraction
use thiserror::Error;

/// Errors raised while building or validating slots.
///
/// Extraction itself never fails; these surface only from constructors fed
/// with invalid values or configuration.
#[derive(Debug, Error)]
pub enum SlotError {
    #[error("confidence {0} outside [0, 1]")]
    InvalidConfidence(f64),

    #[error("invalid lexicon pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid lexicon: {0}")]
    InvalidLexicon(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for slot operations
pub type Result<T> = std::result::Result<T, SlotError>;
