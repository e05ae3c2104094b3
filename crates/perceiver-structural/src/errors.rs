use thiserror::Error;

#[derive(Debug, Error)]
pub enum PerceiverError {
    #[error("snapshot unavailable: {0}")]
    SnapshotUnavailable(String),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("invalid fixture: {0}")]
    Fixture(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl PerceiverError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
