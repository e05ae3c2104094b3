//! Semantic selection among prior candidates via text reasoning

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use llm_provider::{parse_json_reply, ChatRequest, TextReasoner};
use serde::Deserialize;
use tracing::debug;
use uifunnel_core_types::ElementRecord;

use super::{LayerResolver, ATTRIBUTE_WEIGHTS};
use crate::{errors::LocatorError, types::*};

const MAX_TEXT_CHARS: usize = 200;

pub const SEMANTIC_SYSTEM_PROMPT: &str = "You select the web page element that best matches a \
user's instruction. You receive the instruction and a numbered list of candidate elements with \
their tag, key attributes, visible text and position. Choose exactly one candidate. Reply with \
JSON only, in the shape {\"selected_index\": <int>, \"reason\": <string>}.";

#[derive(Debug, Deserialize)]
struct SemanticChoice {
    selected_index: i64,
    #[serde(default)]
    reason: String,
}

/// L4 layer; asks a text reasoner to pick among prior candidates
pub struct SemanticResolver {
    reasoner: Arc<dyn TextReasoner>,
    max_candidates: usize,
    confidence: f64,
    timeout: Duration,
}

impl SemanticResolver {
    pub fn new(reasoner: Arc<dyn TextReasoner>, config: &FunnelConfig) -> Self {
        Self {
            reasoner,
            max_candidates: config.semantic_max_candidates,
            confidence: config.semantic_confidence,
            timeout: config.external_timeout(),
        }
    }

    fn candidates<'a>(&self, ctx: &'a FunnelContext) -> &'a [MatchResult] {
        let prior = ctx.prior_candidates();
        &prior[..prior.len().min(self.max_candidates)]
    }
}

/// User prompt listing the candidates as `[i] <tag> attrs text @ (x,y,w,h)`.
pub(crate) fn build_prompt(ctx: &FunnelContext, candidates: &[MatchResult]) -> String {
    let mut prompt = format!("Instruction: {}\n", ctx.instruction.trim());
    if let Some(target) = ctx.slot.target.as_deref() {
        let _ = writeln!(prompt, "Target description: {target}");
    }
    if let Some(target_type) = ctx.slot.target_type {
        let _ = writeln!(prompt, "Expected element type: {target_type}");
    }
    prompt.push_str("Candidates:\n");
    for (index, candidate) in candidates.iter().enumerate() {
        let _ = writeln!(prompt, "{}", describe_element(index, &candidate.element));
    }
    prompt
}

fn describe_element(index: usize, element: &ElementRecord) -> String {
    let mut line = format!("[{index}] <{}>", element.tag);
    for (name, _) in ATTRIBUTE_WEIGHTS {
        if *name == "text" {
            continue;
        }
        if let Some(value) = element.attr(name).filter(|value| !value.trim().is_empty()) {
            let _ = write!(line, " {name}=\"{}\"", value.trim());
        }
    }
    let text = element.text.trim();
    if !text.is_empty() {
        let truncated: String = text.chars().take(MAX_TEXT_CHARS).collect();
        let _ = write!(line, " text=\"{truncated}\"");
    }
    let bbox = element.bbox;
    let _ = write!(
        line,
        " @ ({:.0},{:.0},{:.0},{:.0})",
        bbox.x, bbox.y, bbox.width, bbox.height
    );
    line
}

#[async_trait]
impl LayerResolver for SemanticResolver {
    fn layer(&self) -> FunnelLayer {
        FunnelLayer::Semantic
    }

    fn applies(&self, ctx: &FunnelContext) -> bool {
        !ctx.prior_candidates().is_empty()
    }

    async fn resolve(&self, ctx: &FunnelContext) -> Result<Vec<MatchResult>, LocatorError> {
        let candidates = self.candidates(ctx);
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let request = ChatRequest::new(SEMANTIC_SYSTEM_PROMPT, build_prompt(ctx, candidates));
        let reply = tokio::time::timeout(self.timeout, self.reasoner.complete(&request))
            .await
            .map_err(|_| {
                LocatorError::Timeout(format!(
                    "{} did not answer within {:?}",
                    self.reasoner.name(),
                    self.timeout
                ))
            })?
            .map_err(|err| LocatorError::external(self.reasoner.name(), err.to_string()))?;

        let choice: SemanticChoice = parse_json_reply(&reply)
            .map_err(|err| LocatorError::MalformedResponse(err.to_string()))?;
        let candidate = usize::try_from(choice.selected_index)
            .ok()
            .and_then(|index| candidates.get(index))
            .ok_or_else(|| {
                LocatorError::MalformedResponse(format!(
                    "selected_index {} outside 0..{}",
                    choice.selected_index,
                    candidates.len()
                ))
            })?;

        debug!(
            element = candidate.element.id,
            index = choice.selected_index,
            offered = candidates.len(),
            "semantic layer selected"
        );
        Ok(vec![MatchResult::new(
            candidate.element.clone(),
            self.confidence,
            FunnelLayer::Semantic,
        )
        .with_reason(format!("ai_selected_index={}", choice.selected_index))
        .with_reason(format!("ai_reason={}", choice.reason.trim()))])
    }

    fn accept_threshold(&self) -> f64 {
        // A pick is accepted whenever one is returned.
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_provider::{ReasoningError, ScriptedReasoner};
    use slot_extractor::ActionSlot;
    use uifunnel_core_types::BoundingBox;

    fn candidate(id: i64, text: &str, layer: FunnelLayer) -> MatchResult {
        MatchResult::new(
            ElementRecord::new(id, "button")
                .with_attr("class", "btn")
                .with_text(text)
                .with_bbox(BoundingBox::new(10.0 * id as f64, 20.0, 80.0, 24.0)),
            0.5,
            layer,
        )
    }

    fn context() -> FunnelContext {
        FunnelContext::new(
            "click the confirm button",
            Default::default(),
            Arc::new(Vec::new()),
            ActionSlot::empty().with_target("confirm button"),
        )
        .with_layer(
            FunnelLayer::Attribute,
            vec![
                candidate(1, "OK", FunnelLayer::Attribute),
                candidate(2, "Confirm order", FunnelLayer::Attribute),
            ],
        )
    }

    fn resolver(reasoner: ScriptedReasoner) -> (SemanticResolver, Arc<ScriptedReasoner>) {
        let reasoner = Arc::new(reasoner);
        (
            SemanticResolver::new(reasoner.clone(), &FunnelConfig::default()),
            reasoner,
        )
    }

    #[tokio::test]
    async fn test_selects_indexed_candidate() {
        let (resolver, reasoner) = resolver(
            ScriptedReasoner::new()
                .with_reply("```json\n{\"selected_index\": 1, \"reason\": \"label matches\"}\n```"),
        );
        let matches = resolver.resolve(&context()).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].element.id, 2);
        assert_eq!(matches[0].score, 0.95);
        assert_eq!(matches[0].layer, FunnelLayer::Semantic);
        assert_eq!(
            matches[0].reasons,
            vec!["ai_selected_index=1".to_string(), "ai_reason=label matches".to_string()]
        );

        let prompt = &reasoner.prompts()[0];
        assert!(prompt.contains("[0] <button> class=\"btn\" text=\"OK\" @ (10,20,80,24)"));
        assert!(prompt.contains("[1] <button>"));
    }

    #[tokio::test]
    async fn test_out_of_range_and_malformed_replies() {
        let (resolver, _) = resolver(
            ScriptedReasoner::new()
                .with_reply("{\"selected_index\": 7, \"reason\": \"?\"}")
                .with_reply("no idea"),
        );
        assert!(matches!(
            resolver.resolve(&context()).await,
            Err(LocatorError::MalformedResponse(_))
        ));
        assert!(matches!(
            resolver.resolve(&context()).await,
            Err(LocatorError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_transport_failure_is_external() {
        let (resolver, _) =
            resolver(ScriptedReasoner::new().with_error(ReasoningError::Transport("reset".into())));
        let err = resolver.resolve(&context()).await.unwrap_err();
        assert!(matches!(err, LocatorError::ExternalService { .. }));
    }

    #[tokio::test]
    async fn test_prefers_spatial_candidates_and_caps_the_list() {
        let spatial: Vec<MatchResult> = (10..18)
            .map(|id| candidate(id, "x", FunnelLayer::Spatial))
            .collect();
        let ctx = context().with_layer(FunnelLayer::Spatial, spatial);
        let (resolver, reasoner) =
            resolver(ScriptedReasoner::new().with_reply("{\"selected_index\": 0, \"reason\": \"\"}"));
        let matches = resolver.resolve(&ctx).await.unwrap();
        assert_eq!(matches[0].element.id, 10);

        let prompt = &reasoner.prompts()[0];
        assert!(prompt.contains("[4] <button>"));
        assert!(!prompt.contains("[5] <button>"));
        assert!(!prompt.contains("Confirm order"));
    }

    #[test]
    fn test_long_text_is_truncated() {
        let element = ElementRecord::new(1, "div").with_text("a".repeat(500));
        let line = describe_element(0, &element);
        assert!(line.contains(&format!("text=\"{}\"", "a".repeat(200))));
        assert!(!line.contains(&"a".repeat(201)));
    }
}
