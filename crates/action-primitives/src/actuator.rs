//! Actuator traits
//!
//! Implementations must only be invoked against elements from the most recent
//! observation of the same session. Callers wrap every call in a timeout.

use std::sync::Arc;

use async_trait::async_trait;
use uifunnel_core_types::SessionId;

use crate::{
    errors::ActionError,
    types::{ActionReport, ActionTarget},
};

/// Side-effecting browser operations used by the execution engine.
#[async_trait]
pub trait BrowserActuator: Send + Sync {
    /// Click the target element
    async fn click(
        &self,
        session: &SessionId,
        target: &ActionTarget,
    ) -> Result<ActionReport, ActionError>;

    /// Type `value` into the target element, replacing its content
    async fn input(
        &self,
        session: &SessionId,
        target: &ActionTarget,
        value: &str,
    ) -> Result<ActionReport, ActionError>;

    /// Capture a full-page PNG screenshot
    async fn screenshot(&self, session: &SessionId) -> Result<Vec<u8>, ActionError>;
}

/// Screenshot capability on its own, as consumed by visual resolution.
#[async_trait]
pub trait ScreenCapture: Send + Sync {
    async fn capture(&self, session: &SessionId) -> Result<Vec<u8>, ActionError>;
}

/// Exposes any actuator's screenshot primitive as a [`ScreenCapture`].
pub struct ActuatorCapture {
    actuator: Arc<dyn BrowserActuator>,
}

impl ActuatorCapture {
    pub fn new(actuator: Arc<dyn BrowserActuator>) -> Self {
        Self { actuator }
    }
}

#[async_trait]
impl ScreenCapture for ActuatorCapture {
    async fn capture(&self, session: &SessionId) -> Result<Vec<u8>, ActionError> {
        self.actuator.screenshot(session).await
    }
}
