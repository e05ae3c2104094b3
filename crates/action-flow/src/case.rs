//! Case executor

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{info, warn};
use uifunnel_core_types::SessionId;

use crate::ooda::OodaEngine;
use crate::retry::with_retry;
use crate::types::*;

/// Runs test cases step by step through one OODA engine
#[derive(Clone)]
pub struct CaseExecutor {
    engine: Arc<OodaEngine>,
}

impl CaseExecutor {
    pub fn new(engine: Arc<OodaEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &OodaEngine {
        &self.engine
    }

    /// Execute a case against `session`.
    ///
    /// Never fails: step failures are reported through the result's status,
    /// stats and error.
    pub async fn execute_case(&self, case: &TestCase, session: &SessionId) -> ExecutionResult {
        let mut ctx = ExecutionContext::new(session.clone(), case.config.clone());
        ctx.variables
            .extend(case.variables.iter().map(|(name, value)| (name.clone(), value.clone())));
        self.execute_in(case, &mut ctx).await
    }

    /// Execute a case with a caller-owned context, e.g. to share variables
    /// with later cases on the same session.
    pub async fn execute_in(&self, case: &TestCase, ctx: &mut ExecutionContext) -> ExecutionResult {
        let started_at = Utc::now();
        info!("Executing case '{}' ({} steps)", case.name, case.steps.len());

        let mut stats = CaseStats::default();
        let mut step_results = Vec::with_capacity(case.steps.len());
        let mut first_error = None;
        let mut halted = false;

        for step in &case.steps {
            let finished = if halted {
                self.skipped(step)
            } else {
                self.run_with_retry(step, ctx).await
            };

            stats.record(&finished);
            if finished.status == StepStatus::Failed {
                if first_error.is_none() {
                    first_error = Some(format!(
                        "step '{}' failed: {}",
                        finished.instruction,
                        finished.error.as_deref().unwrap_or("unknown error")
                    ));
                }
                if ctx.config.stop_on_failure && !halted {
                    warn!("Stopping case '{}' after failed step {}", case.name, finished.id);
                    halted = true;
                }
            }
            if finished.status != StepStatus::Skipped {
                ctx.history.push(finished.clone());
            }
            step_results.push(finished);
        }

        let status = stats.status();
        let duration_ms = elapsed_ms(started_at);
        info!(
            "Case '{}' finished {:?}: {} ok, {} failed, {} skipped in {}ms",
            case.name, status, stats.success, stats.failed, stats.skipped, duration_ms
        );

        ExecutionResult {
            case_id: case.id.clone(),
            name: case.name.clone(),
            success: status == CaseStatus::Success,
            status,
            data: ctx.variables.clone(),
            error: first_error,
            started_at,
            duration_ms,
            step_results,
            stats,
        }
    }

    /// Execute cases in order on one session
    pub async fn execute_batch(&self, cases: &[TestCase], session: &SessionId) -> BatchResult {
        let mut results = Vec::with_capacity(cases.len());
        for case in cases {
            results.push(self.execute_case(case, session).await);
        }
        let batch = BatchResult::from_results(results);
        info!("Batch finished: {}/{} cases succeeded", batch.success_count, batch.total);
        batch
    }

    /// Execute cases on their own sessions concurrently.
    ///
    /// Results keep the input order.
    pub async fn execute_independent(&self, runs: &[(TestCase, SessionId)]) -> BatchResult {
        let results = join_all(
            runs.iter()
                .map(|(case, session)| self.execute_case(case, session)),
        )
        .await;
        let batch = BatchResult::from_results(results);
        info!(
            "Independent batch finished: {}/{} cases succeeded",
            batch.success_count, batch.total
        );
        batch
    }

    async fn run_with_retry(&self, step: &TestStep, ctx: &ExecutionContext) -> TestStep {
        let engine = self.engine.as_ref();
        let outcome = with_retry(
            ctx.config.max_retries,
            ctx.config.retry_backoff(),
            move |attempt| {
                let mut attempt_step = step.clone();
                attempt_step.status = if attempt == 0 {
                    StepStatus::Running
                } else {
                    StepStatus::Retry
                };
                attempt_step.retries = attempt;
                async move { engine.run_step(&attempt_step, ctx).await }
            },
        )
        .await;

        let mut finished = match outcome.result {
            Ok(finished) => finished,
            Err(failure) => {
                warn!(
                    "Step {} failed after {} retries: {}",
                    step.id, outcome.retries, failure.error
                );
                *failure.step
            }
        };
        finished.retries = outcome.retries;
        finished.propagate_status();
        finished
    }

    /// A step that is not executed; its action record is `Skipped`
    fn skipped(&self, step: &TestStep) -> TestStep {
        let mut skipped = step.clone();
        skipped.status = StepStatus::Skipped;
        skipped.error = Some("skipped after an earlier failure".to_string());
        let action = self.engine.planned_action(step, &step.instruction);
        skipped.action_record = Some(ActionRecord::new(action));
        skipped.propagate_status();
        skipped
    }
}
