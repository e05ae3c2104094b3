//! Spatial resolution relative to an anchor element

use std::sync::Arc;

use async_trait::async_trait;
use slot_extractor::{SlotExtractor, SpatialRelation};
use tracing::debug;
use uifunnel_core_types::{ElementRecord, TargetType};

use super::attribute::{type_allows, AttributeMatcher};
use super::LayerResolver;
use crate::geometry::{
    angle_deg, center_distance, is_aligned, main_direction, overlap_ratio, within_direction,
};
use crate::{errors::LocatorError, types::*};

const DIRECTION_BONUS: f64 = 0.2;
const ALIGNMENT_BONUS: f64 = 0.2;
const OVERLAP_PENALTY: f64 = 0.3;

/// Scores elements by their position relative to an anchor
#[derive(Debug, Clone)]
pub struct SpatialScorer {
    max_distance: f64,
    tolerance_deg: f64,
    top_n: usize,
}

impl SpatialScorer {
    pub fn new(max_distance: f64, tolerance_deg: f64, top_n: usize) -> Self {
        Self {
            max_distance,
            tolerance_deg,
            top_n,
        }
    }

    /// Rank every other element around `anchor` for one relation.
    ///
    /// `1/(1 + d/100)` proximity, +0.2 when a directional relation holds,
    /// +0.2 when centres line up across the direction axis, minus
    /// `0.3 * overlap`. The anchor itself is never returned.
    pub fn score(
        &self,
        anchor: &ElementRecord,
        elements: &[ElementRecord],
        relation: &SpatialRelation,
        target_type: Option<TargetType>,
    ) -> Vec<MatchResult> {
        let limit = relation.max_distance.unwrap_or(self.max_distance);
        let origin = anchor.bbox.center();

        let mut matches: Vec<MatchResult> = elements
            .iter()
            .filter(|element| element.id != anchor.id)
            .filter(|element| target_type.map_or(true, |target| type_allows(target, element)))
            .filter_map(|element| {
                let distance = center_distance(&anchor.bbox, &element.bbox);
                if distance > limit {
                    return None;
                }
                let angle = angle_deg(&origin, &element.bbox.center());
                if !within_direction(angle, relation.direction, self.tolerance_deg) {
                    return None;
                }

                let observed = main_direction(angle);
                let directional = relation.direction.canonical_angle().is_some();
                let axis = if directional {
                    relation.direction
                } else {
                    observed
                };
                let proximity = 1.0 / (1.0 + distance / 100.0);
                let aligned = is_aligned(&anchor.bbox, &element.bbox, axis);
                let overlap = overlap_ratio(&anchor.bbox, &element.bbox);

                let mut score = proximity - OVERLAP_PENALTY * overlap;
                if directional {
                    score += DIRECTION_BONUS;
                }
                if aligned {
                    score += ALIGNMENT_BONUS;
                }

                let mut result = MatchResult::new(element.clone(), score, FunnelLayer::Spatial)
                    .with_attribute("proximity", proximity)
                    .with_reason(format!("anchor={}", anchor.id))
                    .with_reason(format!("distance={distance:.1}px"))
                    .with_reason(format!("direction={observed}"));
                if directional {
                    result = result.with_reason(format!("direction_match:{}", relation.direction));
                }
                if aligned {
                    result = result.with_reason("aligned");
                }
                if overlap > 0.0 {
                    result = result
                        .with_attribute("overlap", overlap)
                        .with_reason(format!("overlap={overlap:.2}"));
                }
                Some(result)
            })
            .collect();

        rank(&mut matches);
        matches.truncate(self.top_n);
        matches
    }
}

/// L3 layer; runs only for instructions with a spatial relation
pub struct SpatialResolver {
    extractor: Arc<SlotExtractor>,
    anchors: AttributeMatcher,
    scorer: SpatialScorer,
    threshold: f64,
}

impl SpatialResolver {
    pub fn new(extractor: Arc<SlotExtractor>, config: &FunnelConfig) -> Self {
        Self {
            extractor,
            anchors: AttributeMatcher::new(1),
            scorer: SpatialScorer::new(
                config.max_distance,
                config.direction_tolerance_deg,
                config.spatial_top_n,
            ),
            threshold: config.spatial_threshold,
        }
    }

    /// Best attribute match for the anchor description.
    fn locate_anchor(&self, ctx: &FunnelContext, relation: &SpatialRelation) -> Option<MatchResult> {
        let anchor_slot = self.extractor.describe(&relation.anchor);
        self.anchors
            .match_elements(&ctx.elements, &anchor_slot)
            .into_iter()
            .next()
    }
}

#[async_trait]
impl LayerResolver for SpatialResolver {
    fn layer(&self) -> FunnelLayer {
        FunnelLayer::Spatial
    }

    fn applies(&self, ctx: &FunnelContext) -> bool {
        self.extractor.spatial_relation(&ctx.instruction).is_some()
    }

    async fn resolve(&self, ctx: &FunnelContext) -> Result<Vec<MatchResult>, LocatorError> {
        let Some(relation) = self.extractor.spatial_relation(&ctx.instruction) else {
            return Ok(Vec::new());
        };
        let Some(anchor) = self.locate_anchor(ctx, &relation) else {
            debug!(anchor = %relation.anchor, "spatial anchor not found");
            return Ok(Vec::new());
        };

        let matches = self.scorer.score(
            &anchor.element,
            &ctx.elements,
            &relation,
            ctx.slot.target_type,
        );
        debug!(
            anchor = anchor.element.id,
            anchor_score = anchor.score,
            direction = %relation.direction,
            candidates = matches.len(),
            "spatial layer scored"
        );
        Ok(matches)
    }

    fn accept_threshold(&self) -> f64 {
        self.threshold
    }
}
