//! In-memory actuator that records every primitive it receives.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uifunnel_core_types::SessionId;

use crate::{
    actuator::{BrowserActuator, ScreenCapture},
    errors::ActionError,
    types::{ActionReport, ActionTarget, PrimitiveKind},
};

/// 1x1 transparent PNG returned when no screenshot was configured.
const BLANK_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// One recorded primitive call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordedCall {
    Click { element_id: i64 },
    Input { element_id: i64, value: String },
    Screenshot,
}

/// Actuator for fixtures and tests.
///
/// Calls always succeed unless failures were queued with
/// [`RecordingActuator::fail_next`]; queued errors are consumed in order by
/// click and input calls.
#[derive(Default)]
pub struct RecordingActuator {
    calls: Mutex<Vec<RecordedCall>>,
    failures: Mutex<VecDeque<ActionError>>,
    screenshot: Mutex<Option<Vec<u8>>>,
    latency: Option<Duration>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every primitive, to exercise caller timeouts.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_screenshot(self, png: Vec<u8>) -> Self {
        *self.screenshot.lock() = Some(png);
        self
    }

    /// Queue an error for the next click or input call.
    pub fn fail_next(&self, error: ActionError) {
        self.failures.lock().push_back(error);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn clicks(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, RecordedCall::Click { .. }))
            .count()
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn perform(
        &self,
        kind: PrimitiveKind,
        target: &ActionTarget,
        call: RecordedCall,
    ) -> Result<ActionReport, ActionError> {
        let started_at = Utc::now();
        if let Some(error) = self.failures.lock().pop_front() {
            debug!(element = target.element_id, %error, "injected actuator failure");
            return Err(error);
        }
        self.calls.lock().push(call);
        Ok(ActionReport::success(kind, started_at).with_target(*target))
    }
}

#[async_trait]
impl BrowserActuator for RecordingActuator {
    async fn click(
        &self,
        session: &SessionId,
        target: &ActionTarget,
    ) -> Result<ActionReport, ActionError> {
        self.pause().await;
        debug!(%session, element = target.element_id, x = target.point.x, y = target.point.y, "click");
        self.perform(
            PrimitiveKind::Click,
            target,
            RecordedCall::Click {
                element_id: target.element_id,
            },
        )
    }

    async fn input(
        &self,
        session: &SessionId,
        target: &ActionTarget,
        value: &str,
    ) -> Result<ActionReport, ActionError> {
        self.pause().await;
        debug!(%session, element = target.element_id, chars = value.chars().count(), "input");
        self.perform(
            PrimitiveKind::Input,
            target,
            RecordedCall::Input {
                element_id: target.element_id,
                value: value.to_string(),
            },
        )
    }

    async fn screenshot(&self, session: &SessionId) -> Result<Vec<u8>, ActionError> {
        self.pause().await;
        debug!(%session, "screenshot");
        self.calls.lock().push(RecordedCall::Screenshot);
        let configured = self.screenshot.lock().clone();
        Ok(configured.unwrap_or_else(|| BLANK_PNG.to_vec()))
    }
}

#[async_trait]
impl ScreenCapture for RecordingActuator {
    async fn capture(&self, session: &SessionId) -> Result<Vec<u8>, ActionError> {
        self.screenshot(session).await
    }
}
