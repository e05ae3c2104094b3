use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReasoningError {
    #[error("missing credentials: {0}")]
    MissingCredentials(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("service returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("reasoner unavailable: {0}")]
    Unavailable(String),
}

impl ReasoningError {
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ReasoningError::Transport(_) | ReasoningError::RateLimited(_) => true,
            ReasoningError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
