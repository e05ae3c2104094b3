use std::sync::Arc;

use action_locator::{FunnelLayer, FunnelOrchestrator};
use action_primitives::RecordingActuator;
use llm_provider::ScriptedReasoner;
use slot_extractor::{ActionKind, SlotExtractor};
use uifunnel_core_types::{BoundingBox, ElementRecord, SessionId, TargetType, VISUAL_ELEMENT_ID};

fn extractor() -> Arc<SlotExtractor> {
    Arc::new(SlotExtractor::with_defaults().expect("built-in lexicon"))
}

fn login_form() -> Vec<ElementRecord> {
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
    ]
}

#[tokio::test]
async fn submit_button_resolves_at_attribute_layer() {
    let reasoner = Arc::new(ScriptedReasoner::new());
    let funnel = FunnelOrchestrator::builder(extractor())
        .text_reasoner(reasoner.clone())
        .build()
        .unwrap();
    let elements = vec![ElementRecord::new(7, "button")
        .with_attr("id", "submit-btn")
        .with_text("提交")
        .with_bbox(BoundingBox::new(100.0, 300.0, 96.0, 36.0))];

    let result = funnel
        .resolve("点击提交按钮", &SessionId::new(), Arc::new(elements))
        .await;

    assert_eq!(result.slot.action, ActionKind::Click);
    assert_eq!(result.slot.target_type, Some(TargetType::Button));
    assert_eq!(
        result.slot.attributes.get("type").map(String::as_str),
        Some("submit")
    );
    assert_eq!(result.per_layer.l2.len(), 1);
    assert!(result.per_layer.l2[0].score >= 0.8);
    assert!(result.success);
    assert_eq!(result.layer, Some(FunnelLayer::Attribute));
    assert_eq!(result.chosen.as_ref().map(|m| m.element.id), Some(7));
    assert_eq!(reasoner.calls(), 0);
}

#[tokio::test]
async fn clear_button_resolves_relative_to_username_input() {
    let reasoner = Arc::new(ScriptedReasoner::new().with_reply("{\"selected_index\": 0}"));
    let funnel = FunnelOrchestrator::builder(extractor())
        .text_reasoner(reasoner.clone())
        .build()
        .unwrap();
    let result = funnel
        .resolve(
            "点击用户名输入框右边的清除按钮",
            &SessionId::new(),
            Arc::new(login_form()),
        )
        .await;

    assert!(result
        .per_layer
        .l2
        .iter()
        .filter(|m| m.element.id == 3)
        .all(|m| m.score < 0.8));
    assert!(result.success, "{:?}", result.reason);
    assert_eq!(result.layer, Some(FunnelLayer::Spatial));
    let chosen = result.chosen.expect("chosen");
    assert_eq!(chosen.element.id, 3);
    assert!(chosen.reasons.iter().any(|r| r == "direction=right"));
    assert!(chosen.reasons.iter().any(|r| r == "anchor=2"));
    assert!(result.reason.is_none());
    assert_eq!(reasoner.calls(), 0);
    assert!(result.per_layer.l4.is_empty());
}

#[tokio::test]
async fn empty_dom_reports_failure() {
    let funnel = FunnelOrchestrator::builder(extractor()).build().unwrap();
    for instruction in ["点击提交按钮", "点击用户名输入框右边的清除按钮"] {
        let result = funnel
            .resolve(instruction, &SessionId::new(), Arc::new(Vec::new()))
            .await;
        assert!(!result.success);
        assert!(result.per_layer.l2.is_empty());
        assert!(result.per_layer.l3.is_empty());
        assert!(result.chosen.is_none());
    }
}

#[tokio::test]
async fn weak_matches_escalate_to_semantic_layer() {
    let reasoner = Arc::new(
        ScriptedReasoner::new().with_reply("{\"selected_index\": 1, \"reason\": \"second save\"}"),
    );
    let funnel = FunnelOrchestrator::builder(extractor())
        .text_reasoner(reasoner.clone())
        .build()
        .unwrap();
    let elements = vec![
        ElementRecord::new(1, "button")
            .with_text("Save draft")
            .with_bbox(BoundingBox::new(0.0, 0.0, 90.0, 30.0)),
        ElementRecord::new(2, "button")
            .with_text("Save and publish")
            .with_bbox(BoundingBox::new(100.0, 0.0, 140.0, 30.0)),
    ];

    let result = funnel
        .resolve("click save", &SessionId::new(), Arc::new(elements))
        .await;

    assert_eq!(reasoner.calls(), 1);
    assert_eq!(result.layer, Some(FunnelLayer::Semantic));
    let chosen = result.chosen.expect("chosen");
    assert_eq!(chosen.score, 0.95);
    assert_eq!(chosen.element.id, result.per_layer.l2[1].element.id);
}

#[tokio::test]
async fn malformed_semantic_reply_keeps_pipeline_alive() {
    let reasoner = Arc::new(ScriptedReasoner::new().with_reply("I think the first one"));
    let funnel = FunnelOrchestrator::builder(extractor())
        .text_reasoner(reasoner.clone())
        .build()
        .unwrap();
    let elements = vec![ElementRecord::new(1, "button")
        .with_text("Save draft")
        .with_bbox(BoundingBox::new(0.0, 0.0, 90.0, 30.0))];

    let result = funnel
        .resolve("click save", &SessionId::new(), Arc::new(elements))
        .await;
    assert_eq!(reasoner.calls(), 1);
    assert!(result.per_layer.l4.is_empty());
    assert!(!result.success);
}

#[tokio::test]
async fn visual_instruction_uses_screenshot() {
    let vision = Arc::new(ScriptedReasoner::new().with_reply(
        "{\"found\": true, \"x\": 500, \"y\": 40, \"width\": 32, \"height\": 32}",
    ));
    let funnel = FunnelOrchestrator::builder(extractor())
        .visual(Arc::new(RecordingActuator::new()), vision.clone())
        .build()
        .unwrap();

    let result = funnel
        .resolve("点击红色的星形图标", &SessionId::new(), Arc::new(login_form()))
        .await;

    assert_eq!(vision.calls(), 1);
    assert_eq!(result.layer, Some(FunnelLayer::Visual));
    let chosen = result.chosen.expect("chosen");
    assert_eq!(chosen.element.id, VISUAL_ELEMENT_ID);
    assert_eq!(chosen.score, 0.9);
}

#[test]
fn funnel_result_serializes_with_layer_names() {
    let funnel = FunnelOrchestrator::builder(extractor()).build().unwrap();
    let result = tokio_test::block_on(funnel.resolve(
        "点击提交按钮",
        &SessionId::new(),
        Arc::new(vec![ElementRecord::new(1, "button")
            .with_text("提交")
            .with_bbox(BoundingBox::new(0.0, 0.0, 80.0, 30.0))]),
    ));
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["layer"], "l2_attribute");
    assert_eq!(json["chosen"]["layer"], "l2_attribute");
    assert!(json["per_layer"]["l3"].as_array().unwrap().is_empty());
}
