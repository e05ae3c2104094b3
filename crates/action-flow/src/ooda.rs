//! OODA step engine
//!
//! One step runs Observe → Orient → Decide → Act → Verify in strict sequence
//! against a single session. Observe and Act failures end the attempt with a
//! [`StepFailure`] that keeps the records built so far; funnel layers never
//! fail a step, they only narrow the Orientation.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use action_locator::FunnelOrchestrator;
use action_primitives::{ActionError, ActionReport, ActionTarget, BrowserActuator};
use perceiver_structural::DomSnapshotProvider;
use tokio::time::{sleep, timeout};
use tracing::{debug, info};
use uifunnel_core_types::ElementRecord;

use crate::errors::{StepError, StepFailure};
use crate::types::*;
use crate::verify::{NoopVerifier, Verifier};

/// Decision reason when the funnel found nothing
pub const TARGET_NOT_FOUND: &str = "target not found";

/// Runs single steps through the resolution funnel and the actuator
pub struct OodaEngine {
    funnel: Arc<FunnelOrchestrator>,
    snapshots: Arc<dyn DomSnapshotProvider>,
    actuator: Arc<dyn BrowserActuator>,
    verifier: Arc<dyn Verifier>,
    config: ExecutionConfig,
}

impl OodaEngine {
    /// Create an engine that skips verification
    pub fn new(
        funnel: Arc<FunnelOrchestrator>,
        snapshots: Arc<dyn DomSnapshotProvider>,
        actuator: Arc<dyn BrowserActuator>,
        config: ExecutionConfig,
    ) -> Self {
        Self {
            funnel,
            snapshots,
            actuator,
            verifier: Arc::new(NoopVerifier),
            config,
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn Verifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Run one attempt of `step`.
    ///
    /// Returns the step with its OODA records filled in and status
    /// `Success`. On failure the error carries the step as far as the
    /// attempt got, with status `Failed` propagated to its action record.
    pub async fn run_step(
        &self,
        step: &TestStep,
        ctx: &ExecutionContext,
    ) -> Result<TestStep, StepFailure> {
        let started_at = chrono::Utc::now();
        let mut step = step.clone();
        let outcome = self.run_phases(&mut step, ctx).await;
        step.duration_ms = elapsed_ms(started_at);

        match outcome {
            Ok(()) => {
                step.status = StepStatus::Success;
                step.error = None;
                step.propagate_status();
                info!(
                    "Step {} succeeded ({} via {}) in {}ms",
                    step.id,
                    step.decision
                        .as_ref()
                        .map_or(StepAction::Click, |decision| decision.action),
                    step.orientation
                        .as_ref()
                        .map_or("none", |orientation| orientation.strategy.as_str()),
                    step.duration_ms
                );
                Ok(step)
            }
            Err(error) => {
                step.status = StepStatus::Failed;
                step.error = Some(error.to_string());
                step.propagate_status();
                debug!("Step {} attempt failed: {}", step.id, error);
                Err(StepFailure::new(step, error))
            }
        }
    }

    /// Action a step performs: the declared one, else the recognised intent
    pub fn planned_action(&self, step: &TestStep, instruction: &str) -> StepAction {
        step.action.unwrap_or_else(|| {
            StepAction::from_intent(self.funnel.extractor().extract(instruction).action)
        })
    }

    async fn run_phases(&self, step: &mut TestStep, ctx: &ExecutionContext) -> Result<(), StepError> {
        let instruction = ctx.substitute(&step.instruction);
        let value = step.value.as_deref().map(|value| ctx.substitute(value));
        let expected = step.expected.as_deref().map(|text| ctx.substitute(text));
        debug!("Running step {}: {}", step.id, instruction);

        let observation = self.observe(ctx).await?;

        let action = self.planned_action(step, &instruction);
        let orientation = if action.needs_target() {
            Some(self.orient(&instruction, ctx, &observation).await)
        } else {
            None
        };

        let mut decision = decide(action, orientation.as_ref(), value, expected);
        if action == StepAction::Wait {
            let wait_ms = step.wait_ms.unwrap_or(self.config.default_wait_ms);
            decision
                .parameters
                .insert("wait_ms".to_string(), wait_ms.to_string());
        }
        step.observation = Some(observation);
        step.orientation = orientation;
        step.decision = Some(decision.clone());

        let record = ActionRecord::new(action);
        if !decision.should_execute {
            let error = match decision.target {
                None => StepError::TargetNotFound(instruction),
                Some(_) => StepError::InvalidStep(decision.reason),
            };
            step.action_record = Some(record.fail(error.to_string()));
            return Err(error);
        }

        match self.act(&decision, ctx).await {
            Ok(report) => {
                let record = match report {
                    Some(report) => record.with_report(report),
                    None => record,
                };
                step.action_record = Some(record.finish(StepStatus::Success));
            }
            Err(error) => {
                step.action_record = Some(record.fail(error.to_string()));
                return Err(error);
            }
        }

        if step.expected.is_some() && action != StepAction::Assert {
            let verification = self.verifier.verify(step, ctx).await?;
            let failed = verification.status == VerifyStatus::Failed;
            let detail = verification.detail.clone();
            step.verification = Some(verification);
            if failed {
                return Err(StepError::Verification(detail));
            }
        }
        Ok(())
    }

    async fn observe(&self, ctx: &ExecutionContext) -> Result<Observation, StepError> {
        let limit = self.config.snapshot_timeout();
        let snapshot = timeout(limit, self.snapshots.observe(&ctx.session))
            .await
            .map_err(|_| StepError::Timeout(format!("snapshot not taken within {limit:?}")))?
            .map_err(|err| StepError::Observe(err.to_string()))?;
        let observation = Observation::from_snapshot(snapshot);
        debug!(
            elements = observation.element_count,
            interactive = observation.interactive_ids.len(),
            url = %observation.page.url,
            "observed page"
        );
        Ok(observation)
    }

    async fn orient(
        &self,
        instruction: &str,
        ctx: &ExecutionContext,
        observation: &Observation,
    ) -> Orientation {
        let funnel = self
            .funnel
            .resolve(instruction, &ctx.session, observation.elements.clone())
            .await;
        Orientation::from_funnel(funnel)
    }

    async fn act(
        &self,
        decision: &Decision,
        ctx: &ExecutionContext,
    ) -> Result<Option<ActionReport>, StepError> {
        match decision.action {
            StepAction::Click => {
                let target = action_target(decision)?;
                let report = self
                    .bounded("click", self.actuator.click(&ctx.session, &target))
                    .await?;
                self.settle().await;
                Ok(Some(report))
            }
            StepAction::Input => {
                let target = action_target(decision)?;
                let value = decision
                    .parameters
                    .get("value")
                    .ok_or_else(|| StepError::InvalidStep("input step has no value".into()))?;
                let report = self
                    .bounded("input", self.actuator.input(&ctx.session, &target, value))
                    .await?;
                Ok(Some(report))
            }
            StepAction::Wait => {
                let wait_ms = decision
                    .parameters
                    .get("wait_ms")
                    .and_then(|value| value.parse::<u64>().ok())
                    .unwrap_or(self.config.default_wait_ms);
                sleep(Duration::from_millis(wait_ms)).await;
                self.settle().await;
                Ok(None)
            }
            StepAction::Assert => {
                let element = decision
                    .target
                    .as_ref()
                    .ok_or_else(|| StepError::TargetNotFound(decision.reason.clone()))?;
                if let Some(expected) = decision.parameters.get("expected") {
                    if !element_mentions(element, expected) {
                        return Err(StepError::Verification(format!(
                            "element {} does not contain '{}'",
                            element.id, expected
                        )));
                    }
                }
                Ok(None)
            }
            other => Err(StepError::ActionUnsupported(other)),
        }
    }

    async fn bounded<F>(&self, what: &str, call: F) -> Result<ActionReport, StepError>
    where
        F: Future<Output = Result<ActionReport, ActionError>>,
    {
        let limit = self.config.action_timeout();
        timeout(limit, call)
            .await
            .map_err(|_| StepError::Timeout(format!("{what} not finished within {limit:?}")))?
            .map_err(StepError::from)
    }

    async fn settle(&self) {
        let settle = self.config.settle();
        if !settle.is_zero() {
            sleep(settle).await;
        }
    }
}

/// Map an orientation to a concrete decision.
///
/// Actions that need a target are not executed when the funnel found
/// nothing; inputs additionally need a value, taken from the step or else
/// from the recognised slot.
pub fn decide(
    action: StepAction,
    orientation: Option<&Orientation>,
    value: Option<String>,
    expected: Option<String>,
) -> Decision {
    let mut parameters = BTreeMap::new();
    if let Some(expected) = expected {
        parameters.insert("expected".to_string(), expected);
    }

    if !action.needs_target() {
        return Decision {
            action,
            target: None,
            parameters,
            should_execute: true,
            reason: format!("{action} needs no target"),
        };
    }

    let Some((orientation, chosen)) = orientation
        .filter(|orientation| orientation.found())
        .and_then(|orientation| orientation.chosen.as_ref().map(|chosen| (orientation, chosen)))
    else {
        return Decision {
            action,
            target: None,
            parameters,
            should_execute: false,
            reason: TARGET_NOT_FOUND.to_string(),
        };
    };

    let slot = &orientation.funnel.slot;
    for (name, hint) in &slot.attributes {
        parameters.insert(format!("hint.{name}"), hint.clone());
    }

    let mut decision = Decision {
        action,
        target: Some(chosen.element.clone()),
        parameters,
        should_execute: true,
        reason: format!(
            "{} element {} via {} ({:.2})",
            action, chosen.element.id, orientation.strategy, orientation.confidence
        ),
    };

    if action == StepAction::Input {
        match value.or_else(|| slot.value.clone()) {
            Some(value) => {
                decision.parameters.insert("value".to_string(), value);
            }
            None => {
                decision.should_execute = false;
                decision.reason = "input step has no value".to_string();
            }
        }
    }
    decision
}

fn action_target(decision: &Decision) -> Result<ActionTarget, StepError> {
    decision
        .target
        .as_ref()
        .map(ActionTarget::from_element)
        .ok_or_else(|| StepError::TargetNotFound(decision.reason.clone()))
}

fn element_mentions(element: &ElementRecord, expected: &str) -> bool {
    let expected = expected.trim();
    element.text.contains(expected)
        || element.attr("value").is_some_and(|value| value.contains(expected))
        || element
            .accessible_name
            .as_deref()
            .is_some_and(|name| name.contains(expected))
}
