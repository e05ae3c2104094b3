use std::sync::Arc;
use std::time::Duration;

use action_flow::{
    CaseConfig, CaseExecutor, CaseStatus, ExecutionConfig, OodaEngine, PageTextVerifier,
    StepAction, StepStatus, TestCase, TestStep, VerifyStatus, TARGET_NOT_FOUND,
};
use action_locator::FunnelOrchestrator;
use action_primitives::{ActionError, RecordedCall, RecordingActuator};
use llm_provider::ScriptedReasoner;
use perceiver_structural::{PageSnapshot, StaticSnapshotProvider};
use slot_extractor::SlotExtractor;
use uifunnel_core_types::{BoundingBox, ElementRecord, PageMeta, SessionId};

fn login_page() -> PageSnapshot {
    PageSnapshot::new(
        vec![
            ElementRecord::new(1, "label")
                .with_text("用户名")
                .with_bbox(BoundingBox::new(100.0, 100.0, 80.0, 32.0)),
            ElementRecord::new(2, "input")
                .with_attr("id", "username")
                .with_attr("placeholder", "请输入用户名")
                .with_bbox(BoundingBox::new(190.0, 100.0, 200.0, 32.0)),
            ElementRecord::new(3, "button")
                .with_attr("class", "icon")
                .with_bbox(BoundingBox::new(400.0, 104.0, 24.0, 24.0)),
            ElementRecord::new(4, "button")
                .with_attr("id", "login")
                .with_text("登录")
                .with_bbox(BoundingBox::new(190.0, 160.0, 80.0, 32.0)),
        ],
        PageMeta::new("https://example.test/login", "Login"),
    )
}

fn home_page() -> PageSnapshot {
    PageSnapshot::new(
        vec![ElementRecord::new(10, "h1").with_text("欢迎回来")],
        PageMeta::new("https://example.test/home", "Home"),
    )
}

fn quiet_config() -> ExecutionConfig {
    ExecutionConfig {
        settle_ms: 0,
        default_wait_ms: 0,
        ..ExecutionConfig::default()
    }
}

fn no_backoff(max_retries: u32, stop_on_failure: bool) -> CaseConfig {
    CaseConfig {
        stop_on_failure,
        max_retries,
        retry_backoff_ms: 0,
    }
}

struct Harness {
    executor: CaseExecutor,
    actuator: Arc<RecordingActuator>,
    snapshots: Arc<StaticSnapshotProvider>,
}

fn harness(snapshots: StaticSnapshotProvider) -> Harness {
    let funnel = FunnelOrchestrator::builder(Arc::new(SlotExtractor::with_defaults().unwrap()))
        .build()
        .unwrap();
    harness_with(funnel, snapshots)
}

fn harness_with(funnel: FunnelOrchestrator, snapshots: StaticSnapshotProvider) -> Harness {
    let actuator = Arc::new(RecordingActuator::new());
    let snapshots = Arc::new(snapshots);
    let engine = OodaEngine::new(
        Arc::new(funnel),
        snapshots.clone(),
        actuator.clone(),
        quiet_config(),
    );
    Harness {
        executor: CaseExecutor::new(Arc::new(engine)),
        actuator,
        snapshots,
    }
}

fn login_case() -> TestCase {
    TestCase::new(
        "login",
        vec![
            TestStep::new("在用户名输入框中输入${user}")
                .with_action(StepAction::Input)
                .with_value("${user}"),
            TestStep::new("点击用户名输入框右边的清除按钮"),
            TestStep::new("点击登录按钮"),
        ],
    )
    .with_config(no_backoff(2, true))
    .with_variable("user", serde_json::json!("alice"))
}

#[tokio::test]
async fn successful_case_reports_strategy_per_step() {
    let h = harness(StaticSnapshotProvider::new(login_page()));
    let result = h
        .executor
        .execute_case(&login_case(), &SessionId::new())
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.status, CaseStatus::Success);
    assert_eq!(result.stats.total, 3);
    assert_eq!(result.stats.success, 3);
    assert_eq!(result.data["user"], serde_json::json!("alice"));

    let strategies: Vec<&str> = result
        .step_results
        .iter()
        .map(|step| step.orientation.as_ref().unwrap().strategy.as_str())
        .collect();
    assert_eq!(strategies, vec!["l2_attribute", "l3_spatial", "l2_attribute"]);

    assert_eq!(
        h.actuator.calls(),
        vec![
            RecordedCall::Input {
                element_id: 2,
                value: "alice".to_string()
            },
            RecordedCall::Click { element_id: 3 },
            RecordedCall::Click { element_id: 4 },
        ]
    );
}

#[tokio::test]
async fn failed_step_stops_the_case() {
    let h = harness(StaticSnapshotProvider::new(login_page()));
    let case = TestCase::new(
        "missing",
        vec![
            TestStep::new("点击登录按钮"),
            TestStep::new("点击删除按钮"),
            TestStep::new("点击登录按钮"),
        ],
    )
    .with_config(no_backoff(0, true));

    let result = h.executor.execute_case(&case, &SessionId::new()).await;

    assert!(!result.success);
    assert_eq!(result.status, CaseStatus::Failed);
    let statuses: Vec<StepStatus> = result.step_results.iter().map(|s| s.status).collect();
    assert_eq!(
        statuses,
        vec![StepStatus::Success, StepStatus::Failed, StepStatus::Skipped]
    );
    assert_eq!((result.stats.success, result.stats.failed, result.stats.skipped), (1, 1, 1));
    assert!(result.error.unwrap().contains("target not found"));
    assert!(result.step_results[2].observation.is_none());
    assert_eq!(h.actuator.clicks(), 1);
}

#[tokio::test]
async fn failed_steps_keep_their_ooda_records() {
    let h = harness(StaticSnapshotProvider::new(login_page()));
    h.actuator.fail_next(ActionError::Internal("boom".into()));
    let case = TestCase::new(
        "records",
        vec![TestStep::new("点击登录按钮"), TestStep::new("点击删除按钮")],
    )
    .with_config(no_backoff(0, false));

    let result = h.executor.execute_case(&case, &SessionId::new()).await;
    assert_eq!(result.status, CaseStatus::Failed);

    let failed_click = &result.step_results[0];
    assert_eq!(failed_click.status, StepStatus::Failed);
    assert!(failed_click.observation.is_some());
    assert_eq!(
        failed_click.orientation.as_ref().unwrap().strategy,
        "l2_attribute"
    );
    let decision = failed_click.decision.as_ref().unwrap();
    assert!(decision.should_execute);
    assert_eq!(decision.target.as_ref().unwrap().id, 4);
    let record = failed_click.action_record.as_ref().unwrap();
    assert_eq!(record.status, StepStatus::Failed);
    assert_eq!(record.error.as_deref(), Some("Act failed: Internal error: boom"));

    let not_found = &result.step_results[1];
    assert_eq!(not_found.status, StepStatus::Failed);
    assert_eq!(
        not_found.decision.as_ref().unwrap().reason,
        TARGET_NOT_FOUND
    );
    assert_eq!(
        not_found.action_record.as_ref().unwrap().status,
        StepStatus::Failed
    );
}

#[tokio::test]
async fn action_records_follow_step_status() {
    let h = harness(StaticSnapshotProvider::new(login_page()));
    h.actuator
        .fail_next(ActionError::NotClickable("covered by toast".into()));
    let case = TestCase::new(
        "propagation",
        vec![
            TestStep::new("点击登录按钮"),
            TestStep::new("点击删除按钮"),
            TestStep::new("点击登录按钮"),
        ],
    )
    .with_config(no_backoff(1, true));

    let result = h.executor.execute_case(&case, &SessionId::new()).await;
    let records: Vec<(StepStatus, u32)> = result
        .step_results
        .iter()
        .map(|step| {
            let record = step.action_record.as_ref().unwrap();
            (record.status, record.retries)
        })
        .collect();
    assert_eq!(
        records,
        vec![
            (StepStatus::Success, 1),
            (StepStatus::Failed, 1),
            (StepStatus::Skipped, 0),
        ]
    );
    let skipped = result.step_results[2].action_record.as_ref().unwrap();
    assert_eq!(skipped.action, StepAction::Click);
}

#[tokio::test]
async fn case_continues_when_not_stopping_on_failure() {
    let h = harness(StaticSnapshotProvider::new(login_page()));
    let case = TestCase::new(
        "lenient",
        vec![TestStep::new("点击删除按钮"), TestStep::new("点击登录按钮")],
    )
    .with_config(no_backoff(0, false));

    let result = h.executor.execute_case(&case, &SessionId::new()).await;
    assert_eq!(result.status, CaseStatus::Failed);
    assert_eq!(result.step_results[1].status, StepStatus::Success);
    assert_eq!(h.actuator.clicks(), 1);
}

#[tokio::test]
async fn transient_actuator_failure_is_retried() {
    let h = harness(StaticSnapshotProvider::new(login_page()));
    h.actuator
        .fail_next(ActionError::NotClickable("covered by toast".into()));
    let case = TestCase::new("retry", vec![TestStep::new("点击登录按钮")])
        .with_config(no_backoff(2, true));

    let result = h.executor.execute_case(&case, &SessionId::new()).await;
    assert!(result.success);
    assert_eq!(result.step_results[0].retries, 1);
    assert_eq!(result.stats.retries, 1);
    assert_eq!(h.snapshots.observations(), 2);
}

#[tokio::test]
async fn exhausted_retries_end_failed() {
    let h = harness(StaticSnapshotProvider::new(login_page()));
    let case = TestCase::new("exhausted", vec![TestStep::new("点击删除按钮")])
        .with_config(no_backoff(2, true));

    let result = h.executor.execute_case(&case, &SessionId::new()).await;
    let step = &result.step_results[0];
    assert_eq!(step.status, StepStatus::Failed);
    assert_eq!(step.retries, 2);
    assert_eq!(h.snapshots.observations(), 3);
}

#[tokio::test]
async fn unsupported_action_is_not_retried() {
    let h = harness(StaticSnapshotProvider::new(login_page()));
    let case = TestCase::new(
        "hover",
        vec![TestStep::new("悬停在登录按钮上").with_action(StepAction::Hover)],
    )
    .with_config(no_backoff(3, true));

    let result = h.executor.execute_case(&case, &SessionId::new()).await;
    assert_eq!(result.status, CaseStatus::Failed);
    assert_eq!(result.step_results[0].retries, 0);
    assert_eq!(
        result.step_results[0].error.as_deref(),
        Some("Action not supported: hover")
    );
}

#[tokio::test]
async fn expected_text_is_verified_on_the_next_page() {
    let funnel = FunnelOrchestrator::builder(Arc::new(SlotExtractor::with_defaults().unwrap()))
        .build()
        .unwrap();
    let snapshots = Arc::new(StaticSnapshotProvider::with_frames(vec![
        login_page(),
        home_page(),
    ]));
    let actuator = Arc::new(RecordingActuator::new());
    let engine = OodaEngine::new(Arc::new(funnel), snapshots.clone(), actuator, quiet_config())
        .with_verifier(Arc::new(PageTextVerifier::new(
            snapshots.clone(),
            Duration::from_secs(1),
        )));
    let executor = CaseExecutor::new(Arc::new(engine));

    let case = TestCase::new(
        "verify",
        vec![TestStep::new("点击登录按钮").with_expected("欢迎")],
    );
    let result = executor.execute_case(&case, &SessionId::new()).await;
    assert!(result.success, "{:?}", result.error);
    let verification = result.step_results[0].verification.as_ref().unwrap();
    assert_eq!(verification.status, VerifyStatus::Passed);
}

#[tokio::test]
async fn semantic_layer_breaks_weak_matches() {
    let reasoner = Arc::new(
        ScriptedReasoner::new().with_reply("{\"selected_index\": 1, \"reason\": \"publish\"}"),
    );
    let funnel = FunnelOrchestrator::builder(Arc::new(SlotExtractor::with_defaults().unwrap()))
        .text_reasoner(reasoner.clone())
        .build()
        .unwrap();
    let page = PageSnapshot::new(
        vec![
            ElementRecord::new(1, "button")
                .with_text("Save draft")
                .with_bbox(BoundingBox::new(0.0, 0.0, 90.0, 30.0)),
            ElementRecord::new(2, "button")
                .with_text("Save and publish")
                .with_bbox(BoundingBox::new(100.0, 0.0, 140.0, 30.0)),
        ],
        PageMeta::default(),
    );
    let h = harness_with(funnel, StaticSnapshotProvider::new(page));

    let case = TestCase::new("publish", vec![TestStep::new("click save")]);
    let result = h.executor.execute_case(&case, &SessionId::new()).await;

    assert!(result.success);
    let orientation = result.step_results[0].orientation.as_ref().unwrap();
    assert_eq!(orientation.strategy, "l4_semantic");
    assert_eq!(orientation.confidence, 0.95);
    assert_eq!(reasoner.calls(), 1);
    assert_eq!(h.actuator.clicks(), 1);
}

#[tokio::test]
async fn empty_case_is_skipped() {
    let h = harness(StaticSnapshotProvider::new(login_page()));
    let result = h
        .executor
        .execute_case(&TestCase::new("empty", Vec::new()), &SessionId::new())
        .await;
    assert_eq!(result.status, CaseStatus::Skipped);
    assert!(!result.success);
    assert_eq!(h.snapshots.observations(), 0);
}

#[tokio::test]
async fn batch_runs_cases_in_order() {
    let h = harness(StaticSnapshotProvider::new(login_page()));
    let failing = TestCase::new("failing", vec![TestStep::new("点击删除按钮")])
        .with_config(no_backoff(0, true));
    let cases = vec![login_case(), failing, login_case()];

    let batch = h.executor.execute_batch(&cases, &SessionId::new()).await;
    assert_eq!(batch.total, 3);
    assert_eq!(batch.success_count, 2);
    let names: Vec<&str> = batch.results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["login", "failing", "login"]);
}

#[test]
fn independent_sessions_run_together() {
    let h = harness(StaticSnapshotProvider::new(login_page()));
    let runs = vec![
        (login_case(), SessionId::new()),
        (login_case(), SessionId::new()),
    ];
    let batch = tokio_test::block_on(h.executor.execute_independent(&runs));
    assert_eq!(batch.success_count, 2);
    assert_eq!(h.actuator.clicks(), 4);
}
