//! Post-action verification

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use perceiver_structural::DomSnapshotProvider;
use tracing::debug;

use crate::errors::StepError;
use crate::types::{ExecutionContext, TestStep, Verification, VerifyStatus};

/// Checks a step's expected outcome after its action ran.
///
/// Only consulted for steps that declare `expected`. A failed check is
/// reported as a [`Verification`] with [`VerifyStatus::Failed`]; errors are
/// reserved for checks that could not run.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(
        &self,
        step: &TestStep,
        ctx: &ExecutionContext,
    ) -> Result<Verification, StepError>;
}

/// Accepts every step without checking anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopVerifier;

#[async_trait]
impl Verifier for NoopVerifier {
    async fn verify(
        &self,
        step: &TestStep,
        _ctx: &ExecutionContext,
    ) -> Result<Verification, StepError> {
        Ok(Verification::skipped(step.expected.clone()))
    }
}

/// Re-observes the page and looks for the expected text
pub struct PageTextVerifier {
    snapshots: Arc<dyn DomSnapshotProvider>,
    timeout: Duration,
}

impl PageTextVerifier {
    pub fn new(snapshots: Arc<dyn DomSnapshotProvider>, timeout: Duration) -> Self {
        Self { snapshots, timeout }
    }
}

#[async_trait]
impl Verifier for PageTextVerifier {
    async fn verify(
        &self,
        step: &TestStep,
        ctx: &ExecutionContext,
    ) -> Result<Verification, StepError> {
        let Some(expected) = step.expected.as_deref().map(|text| ctx.substitute(text)) else {
            return Ok(Verification::skipped(None));
        };

        let snapshot = tokio::time::timeout(self.timeout, self.snapshots.observe(&ctx.session))
            .await
            .map_err(|_| StepError::Timeout(format!("verification snapshot after {:?}", self.timeout)))?
            .map_err(|err| StepError::Observe(err.to_string()))?;

        let text = snapshot.visible_text();
        let status = if text.contains(expected.trim()) {
            VerifyStatus::Passed
        } else {
            VerifyStatus::Failed
        };
        debug!(step = %step.id, ?status, "page text verification");

        let detail = match status {
            VerifyStatus::Passed => format!("found '{}' on page", expected.trim()),
            _ => format!(
                "'{}' not found among {} visible elements",
                expected.trim(),
                snapshot.visible_ids().len()
            ),
        };
        Ok(Verification {
            status,
            expected: Some(expected),
            detail,
        })
    }
}
