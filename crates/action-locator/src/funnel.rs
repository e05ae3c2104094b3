//! Funnel orchestration over the layer chain

use std::sync::Arc;
use std::time::Instant;

use action_primitives::ScreenCapture;
use llm_provider::{TextReasoner, VisionReasoner};
use slot_extractor::SlotExtractor;
use tracing::{debug, info, warn};
use uifunnel_core_types::{ElementRecord, SessionId};

use crate::{errors::LocatorError, strategies::*, types::*};

const FALLBACK_REASON: &str = "fallback: best below-threshold candidate";

/// Runs slot extraction, then the layer chain, strictly in order
///
/// The first layer whose best candidate reaches its accept threshold
/// terminates the funnel. Layer errors are logged and recorded as an empty
/// candidate list; `resolve` itself never fails.
pub struct FunnelOrchestrator {
    extractor: Arc<SlotExtractor>,
    config: FunnelConfig,
    layers: Vec<Arc<dyn LayerResolver>>,
}

impl FunnelOrchestrator {
    /// Start building the standard chain
    pub fn builder(extractor: Arc<SlotExtractor>) -> FunnelBuilder {
        FunnelBuilder {
            extractor,
            config: FunnelConfig::default(),
            text_reasoner: None,
            visual: None,
        }
    }

    /// Orchestrator over an explicit chain, run in the given order
    pub fn with_layers(
        extractor: Arc<SlotExtractor>,
        config: FunnelConfig,
        layers: Vec<Arc<dyn LayerResolver>>,
    ) -> Result<Self, LocatorError> {
        config.validate()?;
        Ok(Self {
            extractor,
            config,
            layers,
        })
    }

    pub fn extractor(&self) -> &SlotExtractor {
        &self.extractor
    }

    pub fn config(&self) -> &FunnelConfig {
        &self.config
    }

    /// Layers in the order they run
    pub fn layers(&self) -> Vec<FunnelLayer> {
        self.layers.iter().map(|layer| layer.layer()).collect()
    }

    /// Resolve `instruction` against one observation's elements
    pub async fn resolve(
        &self,
        instruction: &str,
        session: &SessionId,
        elements: Arc<Vec<ElementRecord>>,
    ) -> FunnelResult {
        let started = Instant::now();
        let slot = self.extractor.extract(instruction);
        debug!(
            action = %slot.action,
            target_type = ?slot.target_type,
            keywords = slot.keywords.len(),
            confidence = slot.confidence(),
            "slot extracted"
        );

        if !slot.is_usable(self.config.min_slot_confidence) {
            info!(instruction, confidence = slot.confidence(), "instruction not recognised");
            let reason = LocatorError::RecognitionFailed(format!(
                "confidence {:.2} with {} keywords",
                slot.confidence(),
                slot.keywords.len()
            ));
            let ctx = FunnelContext::new(instruction, session.clone(), elements, slot);
            return finish(ctx, None, Some(reason.to_string()), started);
        }

        let mut ctx = FunnelContext::new(instruction, session.clone(), elements, slot);
        for resolver in &self.layers {
            let layer = resolver.layer();
            if !resolver.applies(&ctx) {
                debug!(layer = %layer, "layer skipped");
                continue;
            }

            let candidates = match resolver.resolve(&ctx).await {
                Ok(candidates) => candidates,
                Err(err) => {
                    warn!(layer = %layer, error = %err, "layer failed; treating as no candidates");
                    Vec::new()
                }
            };
            let accepted = candidates
                .first()
                .filter(|best| best.clears(resolver.accept_threshold()))
                .cloned();
            ctx = ctx.with_layer(layer, candidates);

            if let Some(best) = accepted {
                info!(
                    layer = %layer,
                    element = best.element.id,
                    score = best.score,
                    "target resolved"
                );
                return finish(ctx.with_chosen(best), Some(layer), None, started);
            }
            debug!(
                layer = %layer,
                candidates = ctx.layer(layer).len(),
                "no candidate cleared the layer threshold"
            );
        }

        let fallback = ctx
            .candidates
            .best()
            .filter(|best| best.clears(self.config.fallback_min_score))
            .cloned();
        match fallback {
            Some(best) => {
                let layer = best.layer;
                info!(
                    layer = %layer,
                    element = best.element.id,
                    score = best.score,
                    "target resolved by fallback"
                );
                finish(
                    ctx.with_chosen(best),
                    Some(layer),
                    Some(FALLBACK_REASON.to_string()),
                    started,
                )
            }
            None => {
                info!(
                    instruction,
                    candidates = ctx.candidates.total(),
                    "target not found"
                );
                finish(
                    ctx,
                    None,
                    Some(LocatorError::NoCandidate.to_string()),
                    started,
                )
            }
        }
    }
}

fn finish(
    ctx: FunnelContext,
    layer: Option<FunnelLayer>,
    reason: Option<String>,
    started: Instant,
) -> FunnelResult {
    FunnelResult {
        success: ctx.chosen.is_some(),
        chosen: ctx.chosen,
        layer,
        slot: ctx.slot,
        per_layer: ctx.candidates,
        reason,
        elapsed_ms: started.elapsed().as_millis() as u64,
    }
}

/// Builder for the standard attribute, spatial, semantic, visual chain
///
/// Semantic and visual layers are only part of the chain when their
/// collaborators are supplied.
pub struct FunnelBuilder {
    extractor: Arc<SlotExtractor>,
    config: FunnelConfig,
    text_reasoner: Option<Arc<dyn TextReasoner>>,
    visual: Option<(Arc<dyn ScreenCapture>, Arc<dyn VisionReasoner>)>,
}

impl FunnelBuilder {
    pub fn config(mut self, config: FunnelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn text_reasoner(mut self, reasoner: Arc<dyn TextReasoner>) -> Self {
        self.text_reasoner = Some(reasoner);
        self
    }

    pub fn visual(
        mut self,
        capture: Arc<dyn ScreenCapture>,
        reasoner: Arc<dyn VisionReasoner>,
    ) -> Self {
        self.visual = Some((capture, reasoner));
        self
    }

    /// Validate the configuration and assemble the chain
    pub fn build(self) -> Result<FunnelOrchestrator, LocatorError> {
        self.config.validate()?;
        let mut layers: Vec<Arc<dyn LayerResolver>> = vec![
            Arc::new(AttributeResolver::new(&self.config)),
            Arc::new(SpatialResolver::new(self.extractor.clone(), &self.config)),
        ];
        if let Some(reasoner) = self.text_reasoner {
            layers.push(Arc::new(SemanticResolver::new(reasoner, &self.config)));
        }
        if let Some((capture, reasoner)) = self.visual {
            layers.push(Arc::new(VisualResolver::new(
                self.extractor.clone(),
                capture,
                reasoner,
                &self.config,
            )));
        }
        FunnelOrchestrator::with_layers(self.extractor, self.config, layers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uifunnel_core_types::BoundingBox;

    /// Layer returning a fixed candidate list and counting invocations.
    struct FixedLayer {
        layer: FunnelLayer,
        scores: Vec<f64>,
        threshold: f64,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FixedLayer {
        fn new(layer: FunnelLayer, scores: &[f64], threshold: f64) -> Arc<Self> {
            Arc::new(Self {
                layer,
                scores: scores.to_vec(),
                threshold,
                fail: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(layer: FunnelLayer) -> Arc<Self> {
            Arc::new(Self {
                layer,
                scores: Vec::new(),
                threshold: 0.0,
                fail: true,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LayerResolver for FixedLayer {
        fn layer(&self) -> FunnelLayer {
            self.layer
        }

        fn applies(&self, _ctx: &FunnelContext) -> bool {
            true
        }

        async fn resolve(&self, _ctx: &FunnelContext) -> Result<Vec<MatchResult>, LocatorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LocatorError::external("fixed", "boom"));
            }
            Ok(self
                .scores
                .iter()
                .enumerate()
                .map(|(index, score)| {
                    MatchResult::new(
                        ElementRecord::new(index as i64, "button")
                            .with_bbox(BoundingBox::new(0.0, 0.0, 10.0, 10.0)),
                        *score,
                        self.layer,
                    )
                })
                .collect())
        }

        fn accept_threshold(&self) -> f64 {
            self.threshold
        }
    }

    fn extractor() -> Arc<SlotExtractor> {
        Arc::new(SlotExtractor::with_defaults().unwrap())
    }

    fn orchestrator(layers: Vec<Arc<dyn LayerResolver>>) -> FunnelOrchestrator {
        FunnelOrchestrator::with_layers(extractor(), FunnelConfig::default(), layers).unwrap()
    }

    async fn run(funnel: &FunnelOrchestrator, instruction: &str) -> FunnelResult {
        funnel
            .resolve(instruction, &SessionId::new(), Arc::new(Vec::new()))
            .await
    }

    #[tokio::test]
    async fn test_first_cleared_gate_stops_the_chain() {
        let l2 = FixedLayer::new(FunnelLayer::Attribute, &[0.85], 0.8);
        let l4 = FixedLayer::new(FunnelLayer::Semantic, &[0.95], 0.0);
        let funnel = orchestrator(vec![l2.clone(), l4.clone()]);

        let result = run(&funnel, "点击提交按钮").await;
        assert!(result.success);
        assert_eq!(result.layer, Some(FunnelLayer::Attribute));
        assert_eq!(l4.calls(), 0);
        assert!(result.reason.is_none());
    }

    #[tokio::test]
    async fn test_cleared_spatial_gate_skips_semantic() {
        let l2 = FixedLayer::new(FunnelLayer::Attribute, &[0.6], 0.8);
        let l3 = FixedLayer::new(FunnelLayer::Spatial, &[0.75], 0.7);
        let l4 = FixedLayer::new(FunnelLayer::Semantic, &[0.95], 0.0);
        let funnel = orchestrator(vec![l2.clone(), l3.clone(), l4.clone()]);

        let result = run(&funnel, "点击用户名输入框右边的清除按钮").await;
        assert!(result.success);
        assert_eq!(result.layer, Some(FunnelLayer::Spatial));
        assert_eq!(result.confidence(), 0.75);
        assert_eq!((l2.calls(), l3.calls(), l4.calls()), (1, 1, 0));
        assert!(result.per_layer.get(FunnelLayer::Semantic).is_empty());
    }

    #[tokio::test]
    async fn test_escalates_past_uncleared_layers() {
        let l2 = FixedLayer::new(FunnelLayer::Attribute, &[0.6], 0.8);
        let l3 = FixedLayer::new(FunnelLayer::Spatial, &[0.65], 0.7);
        let l4 = FixedLayer::new(FunnelLayer::Semantic, &[0.95], 0.0);
        let funnel = orchestrator(vec![l2.clone(), l3.clone(), l4.clone()]);

        let result = run(&funnel, "点击提交按钮").await;
        assert_eq!(result.layer, Some(FunnelLayer::Semantic));
        assert_eq!(result.per_layer.l2.len(), 1);
        assert_eq!(result.per_layer.l3.len(), 1);
        assert_eq!((l2.calls(), l3.calls(), l4.calls()), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_layer_errors_degrade_to_no_candidates() {
        let l2 = FixedLayer::new(FunnelLayer::Attribute, &[0.4], 0.8);
        let l4 = FixedLayer::failing(FunnelLayer::Semantic);
        let funnel = orchestrator(vec![l2, l4.clone()]);

        let result = run(&funnel, "点击提交按钮").await;
        assert!(!result.success);
        assert_eq!(l4.calls(), 1);
        assert!(result.per_layer.l4.is_empty());
        assert_eq!(result.per_layer.l2.len(), 1);
        assert_eq!(result.reason.as_deref(), Some("target not found"));
    }

    #[tokio::test]
    async fn test_fallback_returns_best_below_threshold() {
        let l2 = FixedLayer::new(FunnelLayer::Attribute, &[0.55], 0.8);
        let funnel = orchestrator(vec![l2]);

        let result = run(&funnel, "点击提交按钮").await;
        assert!(result.success);
        assert_eq!(result.layer, Some(FunnelLayer::Attribute));
        assert_eq!(result.reason.as_deref(), Some(FALLBACK_REASON));
        assert_eq!(result.confidence(), 0.55);
    }

    #[tokio::test]
    async fn test_unusable_slot_stops_before_layers() {
        let l2 = FixedLayer::new(FunnelLayer::Attribute, &[0.99], 0.8);
        let funnel = orchestrator(vec![l2.clone()]);

        let result = run(&funnel, "   ").await;
        assert!(!result.success);
        assert_eq!(l2.calls(), 0);
        assert!(result
            .reason
            .as_deref()
            .unwrap_or_default()
            .starts_with("recognition failed"));
    }

    #[test]
    fn test_builder_assembles_available_layers() {
        let funnel = FunnelOrchestrator::builder(extractor()).build().unwrap();
        assert_eq!(
            funnel.layers(),
            vec![FunnelLayer::Attribute, FunnelLayer::Spatial]
        );

        let invalid = FunnelConfig {
            spatial_threshold: -0.1,
            ..FunnelConfig::default()
        };
        assert!(FunnelOrchestrator::builder(extractor())
            .config(invalid)
            .build()
            .is_err());
    }
}
