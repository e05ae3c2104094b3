//! Visual location via screenshot reasoning

use std::sync::Arc;
use std::time::Duration;

use action_primitives::ScreenCapture;
use async_trait::async_trait;
use llm_provider::{parse_json_reply, VisionReasoner, VisionRequest};
use serde::Deserialize;
use slot_extractor::SlotExtractor;
use tracing::debug;
use uifunnel_core_types::{BoundingBox, ElementRecord};

use super::LayerResolver;
use crate::{errors::LocatorError, types::*};

pub const VISUAL_SYSTEM_PROMPT: &str = "You locate a single element in a web page screenshot. \
The user describes the element by its appearance. Reply with JSON only, in the shape \
{\"found\": <bool>, \"x\": <number>, \"y\": <number>, \"width\": <number>, \"height\": <number>}, \
with the bounding box in CSS pixels from the top-left corner of the page. Use \"found\": false \
when the element is not visible.";

#[derive(Debug, Deserialize)]
struct VisualLocation {
    found: bool,
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
    #[serde(default)]
    width: f64,
    #[serde(default)]
    height: f64,
}

/// L5 layer; needs both a screen capture and a vision reasoner
pub struct VisualResolver {
    extractor: Arc<SlotExtractor>,
    capture: Arc<dyn ScreenCapture>,
    reasoner: Arc<dyn VisionReasoner>,
    confidence: f64,
    timeout: Duration,
}

impl VisualResolver {
    pub fn new(
        extractor: Arc<SlotExtractor>,
        capture: Arc<dyn ScreenCapture>,
        reasoner: Arc<dyn VisionReasoner>,
        config: &FunnelConfig,
    ) -> Self {
        Self {
            extractor,
            capture,
            reasoner,
            confidence: config.visual_confidence,
            timeout: config.external_timeout(),
        }
    }

    fn description(ctx: &FunnelContext) -> String {
        ctx.slot
            .target
            .clone()
            .filter(|target| !target.trim().is_empty())
            .unwrap_or_else(|| ctx.instruction.trim().to_string())
    }
}

#[async_trait]
impl LayerResolver for VisualResolver {
    fn layer(&self) -> FunnelLayer {
        FunnelLayer::Visual
    }

    fn applies(&self, ctx: &FunnelContext) -> bool {
        self.extractor.is_visual(&ctx.instruction)
    }

    async fn resolve(&self, ctx: &FunnelContext) -> Result<Vec<MatchResult>, LocatorError> {
        let image_png = tokio::time::timeout(self.timeout, self.capture.capture(&ctx.session))
            .await
            .map_err(|_| LocatorError::Timeout("screenshot capture".into()))?
            .map_err(|err| LocatorError::external("screen_capture", err.to_string()))?;

        let request = VisionRequest {
            system_prompt: VISUAL_SYSTEM_PROMPT.to_string(),
            image_png,
            description: Self::description(ctx),
        };
        let reply = tokio::time::timeout(self.timeout, self.reasoner.locate(&request))
            .await
            .map_err(|_| {
                LocatorError::Timeout(format!(
                    "{} did not answer within {:?}",
                    self.reasoner.name(),
                    self.timeout
                ))
            })?
            .map_err(|err| LocatorError::external(self.reasoner.name(), err.to_string()))?;

        let location: VisualLocation = parse_json_reply(&reply)
            .map_err(|err| LocatorError::MalformedResponse(err.to_string()))?;
        if !location.found {
            debug!(description = %request.description, "visual layer found nothing");
            return Ok(Vec::new());
        }
        let values = [location.x, location.y, location.width, location.height];
        if values.iter().any(|v| !v.is_finite()) || location.width <= 0.0 || location.height <= 0.0
        {
            return Err(LocatorError::MalformedResponse(format!(
                "unusable bounding box {values:?}"
            )));
        }

        let bbox = BoundingBox::new(location.x, location.y, location.width, location.height);
        debug!(x = bbox.x, y = bbox.y, width = bbox.width, height = bbox.height, "visual layer located");
        Ok(vec![MatchResult::new(
            ElementRecord::visual(bbox),
            self.confidence,
            FunnelLayer::Visual,
        )
        .with_reason(format!("visual_match:{}", request.description))])
    }

    fn accept_threshold(&self) -> f64 {
        0.0
    }
}
