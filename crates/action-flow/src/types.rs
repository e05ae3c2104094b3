//! Core types for step and case execution

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use action_locator::{FunnelResult, MatchResult};
use action_primitives::ActionReport;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use perceiver_structural::PageSnapshot;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use slot_extractor::ActionKind;
use uifunnel_core_types::{CaseId, ElementRecord, PageMeta, SessionId, StepId};

static VARIABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*\}").expect("static regex"));

/// Action a step performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepAction {
    Click,
    Input,
    Wait,
    Assert,
    Navigate,
    Select,
    Hover,
    Drag,
    Scroll,
    Unknown,
}

impl StepAction {
    pub fn name(&self) -> &'static str {
        match self {
            StepAction::Click => "click",
            StepAction::Input => "input",
            StepAction::Wait => "wait",
            StepAction::Assert => "assert",
            StepAction::Navigate => "navigate",
            StepAction::Select => "select",
            StepAction::Hover => "hover",
            StepAction::Drag => "drag",
            StepAction::Scroll => "scroll",
            StepAction::Unknown => "unknown",
        }
    }

    /// Actions the Act phase can dispatch
    pub fn is_supported(&self) -> bool {
        matches!(
            self,
            StepAction::Click | StepAction::Input | StepAction::Wait | StepAction::Assert
        )
    }

    /// Actions that need a resolved element
    pub fn needs_target(&self) -> bool {
        matches!(
            self,
            StepAction::Click | StepAction::Input | StepAction::Assert
        )
    }

    /// Action for an undeclared step, from the recognised intent.
    ///
    /// An unrecognised intent defaults to a click.
    pub fn from_intent(kind: ActionKind) -> Self {
        match kind {
            ActionKind::Click | ActionKind::Unknown => StepAction::Click,
            ActionKind::Input => StepAction::Input,
            ActionKind::Select => StepAction::Select,
            ActionKind::Navigate => StepAction::Navigate,
            ActionKind::Wait => StepAction::Wait,
            ActionKind::Hover => StepAction::Hover,
            ActionKind::Drag => StepAction::Drag,
            ActionKind::Scroll => StepAction::Scroll,
        }
    }
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle of a step and of its action record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Retry,
    Success,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Success | StepStatus::Failed | StepStatus::Skipped
        )
    }
}

/// Aggregate status of a case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    #[default]
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

/// What the Observe phase saw
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Observation {
    /// Elements in document order, shared read-only with the funnel
    #[serde(skip)]
    pub elements: Arc<Vec<ElementRecord>>,
    pub element_count: usize,
    pub visible_ids: Vec<i64>,
    pub interactive_ids: Vec<i64>,
    pub page: PageMeta,
    pub observed_at: DateTime<Utc>,
}

impl Observation {
    pub fn from_snapshot(snapshot: PageSnapshot) -> Self {
        let visible_ids = snapshot.visible_ids();
        let interactive_ids = snapshot.interactive_ids();
        Self {
            element_count: snapshot.elements.len(),
            visible_ids,
            interactive_ids,
            page: snapshot.page,
            elements: Arc::new(snapshot.elements),
            observed_at: Utc::now(),
        }
    }
}

/// Funnel outcome for one step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Orientation {
    /// Winning layer name, or `"none"`
    pub strategy: String,
    pub confidence: f64,
    pub chosen: Option<MatchResult>,
    pub funnel: FunnelResult,
}

impl Orientation {
    pub fn from_funnel(funnel: FunnelResult) -> Self {
        Self {
            strategy: funnel.strategy().to_string(),
            confidence: funnel.confidence(),
            chosen: funnel.chosen.clone(),
            funnel,
        }
    }

    pub fn found(&self) -> bool {
        self.funnel.success && self.chosen.is_some()
    }
}

/// Concrete action chosen for a step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub action: StepAction,
    pub target: Option<ElementRecord>,
    /// Input value, expected text and attribute hints
    pub parameters: BTreeMap<String, String>,
    pub should_execute: bool,
    pub reason: String,
}

/// Effect of the Act phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action: StepAction,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub retries: u32,
    pub error: Option<String>,
    /// Actuator report, absent for waits and assertions
    pub report: Option<ActionReport>,
}

impl ActionRecord {
    pub fn new(action: StepAction) -> Self {
        Self {
            action,
            status: StepStatus::Running,
            started_at: Utc::now(),
            duration_ms: 0,
            retries: 0,
            error: None,
            report: None,
        }
    }

    pub fn with_report(mut self, report: ActionReport) -> Self {
        self.report = Some(report);
        self
    }

    /// Set the final status and compute the duration
    pub fn finish(mut self, status: StepStatus) -> Self {
        self.status = status;
        self.duration_ms = elapsed_ms(self.started_at);
        self
    }

    /// Finish as `Failed` with `error`
    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self.finish(StepStatus::Failed)
    }
}

/// Outcome of the Verify phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifyStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub status: VerifyStatus,
    pub expected: Option<String>,
    pub detail: String,
}

impl Verification {
    pub fn skipped(expected: Option<String>) -> Self {
        Self {
            status: VerifyStatus::Skipped,
            expected,
            detail: "no verifier configured".to_string(),
        }
    }
}

/// One instruction plus its OODA records
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TestStep {
    pub id: StepId,
    pub instruction: String,
    /// Declared action; recognised from the instruction when absent
    pub action: Option<StepAction>,
    /// Literal input value
    pub value: Option<String>,
    /// Expected text checked after the action
    pub expected: Option<String>,
    /// Wait duration for wait steps
    pub wait_ms: Option<u64>,
    pub status: StepStatus,
    pub observation: Option<Observation>,
    pub orientation: Option<Orientation>,
    pub decision: Option<Decision>,
    pub action_record: Option<ActionRecord>,
    pub verification: Option<Verification>,
    pub retries: u32,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl TestStep {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            ..Self::default()
        }
    }

    pub fn with_action(mut self, action: StepAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    pub fn with_wait(mut self, wait_ms: u64) -> Self {
        self.wait_ms = Some(wait_ms);
        self
    }

    /// Carry a terminal step status, its retries and error into the action
    /// record
    pub fn propagate_status(&mut self) {
        if !self.status.is_terminal() {
            return;
        }
        let (status, retries) = (self.status, self.retries);
        if let Some(record) = self.action_record.as_mut() {
            record.status = status;
            record.retries = retries;
            if status != StepStatus::Success && record.error.is_none() {
                record.error = self.error.clone();
            }
        }
    }
}

/// Per-case execution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseConfig {
    pub stop_on_failure: bool,
    pub max_retries: u32,
    /// Base delay before the first retry; doubles per attempt
    pub retry_backoff_ms: u64,
}

impl Default for CaseConfig {
    fn default() -> Self {
        Self {
            stop_on_failure: true,
            max_retries: 2,
            retry_backoff_ms: 500,
        }
    }
}

impl CaseConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Ordered steps plus aggregate status
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TestCase {
    pub id: CaseId,
    pub name: String,
    pub steps: Vec<TestStep>,
    pub config: CaseConfig,
    /// Initial variables for `${name}` placeholders
    pub variables: HashMap<String, serde_json::Value>,
    pub status: CaseStatus,
    pub duration_ms: u64,
}

impl TestCase {
    pub fn new(name: impl Into<String>, steps: Vec<TestStep>) -> Self {
        Self {
            name: name.into(),
            steps,
            ..Self::default()
        }
    }

    pub fn with_config(mut self, config: CaseConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }
}

/// State carried across the steps of one case
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub session: SessionId,
    pub variables: HashMap<String, serde_json::Value>,
    pub config: CaseConfig,
    pub history: Vec<TestStep>,
}

impl ExecutionContext {
    pub fn new(session: SessionId, config: CaseConfig) -> Self {
        Self {
            session,
            variables: HashMap::new(),
            config,
            history: Vec::new(),
        }
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn get_variable(&self, name: &str) -> Option<&serde_json::Value> {
        self.variables.get(name)
    }

    /// Replace `${name}` placeholders; unknown names are left as written.
    pub fn substitute(&self, text: &str) -> String {
        VARIABLE
            .replace_all(text, |caps: &Captures<'_>| match self.variables.get(&caps[1]) {
                Some(serde_json::Value::String(value)) => value.clone(),
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }
}

/// Step outcome counts for a case
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseStats {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Retries spent across all steps
    pub retries: u32,
}

impl CaseStats {
    pub fn record(&mut self, step: &TestStep) {
        self.total += 1;
        self.retries += step.retries;
        match step.status {
            StepStatus::Success => self.success += 1,
            StepStatus::Skipped => self.skipped += 1,
            _ => self.failed += 1,
        }
    }

    /// Failed if any step failed, Skipped if every step was skipped
    pub fn status(&self) -> CaseStatus {
        if self.failed > 0 {
            CaseStatus::Failed
        } else if self.skipped == self.total {
            CaseStatus::Skipped
        } else {
            CaseStatus::Success
        }
    }
}

/// Result of executing one case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub case_id: CaseId,
    pub name: String,
    pub success: bool,
    pub status: CaseStatus,
    /// Variables at the end of the case
    pub data: HashMap<String, serde_json::Value>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub step_results: Vec<TestStep>,
    pub stats: CaseStats,
}

/// Results of a batch, one per case in input order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResult {
    pub results: Vec<ExecutionResult>,
    pub success_count: usize,
    pub total: usize,
}

impl BatchResult {
    pub fn from_results(results: Vec<ExecutionResult>) -> Self {
        let success_count = results.iter().filter(|result| result.success).count();
        Self {
            total: results.len(),
            success_count,
            results,
        }
    }
}

/// Timeouts and delays of the OODA engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub snapshot_timeout_ms: u64,
    pub action_timeout_ms: u64,
    /// Pause after clicks and waits so the page can settle
    pub settle_ms: u64,
    /// Wait duration for wait steps without `wait_ms`
    pub default_wait_ms: u64,
    /// Settings for cases that do not carry their own
    pub case: CaseConfig,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            snapshot_timeout_ms: 10_000,
            action_timeout_ms: 15_000,
            settle_ms: 300,
            default_wait_ms: 1_000,
            case: CaseConfig::default(),
        }
    }
}

impl ExecutionConfig {
    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_millis(self.snapshot_timeout_ms)
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

pub(crate) fn elapsed_ms(started_at: DateTime<Utc>) -> u64 {
    (Utc::now() - started_at).num_milliseconds().max(0) as u64
}
