//! Core types for the resolution funnel

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use slot_extractor::ActionSlot;
use uifunnel_core_types::{ElementRecord, SessionId};

use crate::errors::LocatorError;

/// Funnel layer enumeration
///
/// Layers run strictly in this order after slot extraction:
/// - Attribute: attribute, text and type scoring over the snapshot
/// - Spatial: relative position to an anchor element
/// - Semantic: text reasoning over prior candidates
/// - Visual: vision reasoning over a screenshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FunnelLayer {
    /// L2 attribute/text/type scorer
    #[serde(rename = "l2_attribute")]
    Attribute,

    /// L3 spatial resolver
    #[serde(rename = "l3_spatial")]
    Spatial,

    /// L4 semantic resolver
    #[serde(rename = "l4_semantic")]
    Semantic,

    /// L5 visual resolver
    #[serde(rename = "l5_visual")]
    Visual,
}

impl FunnelLayer {
    /// Get layer name as string
    pub fn name(&self) -> &'static str {
        match self {
            FunnelLayer::Attribute => "l2_attribute",
            FunnelLayer::Spatial => "l3_spatial",
            FunnelLayer::Semantic => "l4_semantic",
            FunnelLayer::Visual => "l5_visual",
        }
    }

    /// Get all layers in escalation order
    pub fn escalation_chain() -> [FunnelLayer; 4] {
        [
            FunnelLayer::Attribute,
            FunnelLayer::Spatial,
            FunnelLayer::Semantic,
            FunnelLayer::Visual,
        ]
    }
}

impl fmt::Display for FunnelLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One scored element proposed by a layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// The referenced element
    pub element: ElementRecord,

    /// Score in [0, 1]
    pub score: f64,

    /// Attribute name to weighted sub-score
    pub matched_attributes: BTreeMap<String, f64>,

    /// Human-readable justifications, in the order they were found
    pub reasons: Vec<String>,

    /// Layer that produced this match
    pub layer: FunnelLayer,
}

impl MatchResult {
    /// Create a new match; the score is clamped into [0, 1] and NaN becomes 0
    pub fn new(element: ElementRecord, score: f64, layer: FunnelLayer) -> Self {
        Self {
            element,
            score: clamp_score(score),
            matched_attributes: BTreeMap::new(),
            reasons: Vec::new(),
            layer,
        }
    }

    /// Record a matched attribute sub-score
    pub fn with_attribute(mut self, name: impl Into<String>, score: f64) -> Self {
        self.matched_attributes.insert(name.into(), score);
        self
    }

    /// Append a justification
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reasons.push(reason.into());
        self
    }

    /// Check if this match clears `threshold`
    pub fn clears(&self, threshold: f64) -> bool {
        self.score >= threshold
    }
}

pub(crate) fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Stable sort by descending score; equal scores keep discovery order.
pub(crate) fn rank(matches: &mut [MatchResult]) {
    matches.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// Candidate lists produced by each layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerCandidates {
    pub l2: Vec<MatchResult>,
    pub l3: Vec<MatchResult>,
    pub l4: Vec<MatchResult>,
    pub l5: Vec<MatchResult>,
}

impl LayerCandidates {
    /// Get the list for one layer
    pub fn get(&self, layer: FunnelLayer) -> &[MatchResult] {
        match layer {
            FunnelLayer::Attribute => &self.l2,
            FunnelLayer::Spatial => &self.l3,
            FunnelLayer::Semantic => &self.l4,
            FunnelLayer::Visual => &self.l5,
        }
    }

    fn slot_mut(&mut self, layer: FunnelLayer) -> &mut Vec<MatchResult> {
        match layer {
            FunnelLayer::Attribute => &mut self.l2,
            FunnelLayer::Spatial => &mut self.l3,
            FunnelLayer::Semantic => &mut self.l4,
            FunnelLayer::Visual => &mut self.l5,
        }
    }

    /// Total number of candidates across all layers
    pub fn total(&self) -> usize {
        self.l2.len() + self.l3.len() + self.l4.len() + self.l5.len()
    }

    /// Highest-scoring candidate of any layer; earlier layers win ties
    pub fn best(&self) -> Option<&MatchResult> {
        FunnelLayer::escalation_chain()
            .into_iter()
            .filter_map(|layer| self.get(layer).first())
            .fold(None, |best: Option<&MatchResult>, candidate| match best {
                Some(current) if current.score >= candidate.score => Some(current),
                _ => Some(candidate),
            })
    }
}

/// Accumulated state of one resolution request
///
/// Layers read the context and hand back candidates; the orchestrator
/// derives the next context with [`FunnelContext::with_layer`]. The element
/// set is shared read-only between all derived contexts.
#[derive(Debug, Clone)]
pub struct FunnelContext {
    /// Raw instruction text
    pub instruction: String,

    /// Session the snapshot was taken from
    pub session: SessionId,

    /// Elements of one observation, in document order
    pub elements: Arc<Vec<ElementRecord>>,

    /// Slot extracted from the instruction
    pub slot: ActionSlot,

    /// Per-layer candidates so far
    pub candidates: LayerCandidates,

    /// Final pick, once a layer terminates the funnel
    pub chosen: Option<MatchResult>,
}

impl FunnelContext {
    /// Create a fresh context with no candidates
    pub fn new(
        instruction: impl Into<String>,
        session: SessionId,
        elements: Arc<Vec<ElementRecord>>,
        slot: ActionSlot,
    ) -> Self {
        Self {
            instruction: instruction.into(),
            session,
            elements,
            slot,
            candidates: LayerCandidates::default(),
            chosen: None,
        }
    }

    /// Derive a context with `candidates` recorded for `layer`
    pub fn with_layer(mut self, layer: FunnelLayer, candidates: Vec<MatchResult>) -> Self {
        *self.candidates.slot_mut(layer) = candidates;
        self
    }

    /// Derive a context with the final pick set
    pub fn with_chosen(mut self, chosen: MatchResult) -> Self {
        self.chosen = Some(chosen);
        self
    }

    /// Candidates recorded for `layer`
    pub fn layer(&self, layer: FunnelLayer) -> &[MatchResult] {
        self.candidates.get(layer)
    }

    /// Input for semantic reasoning: spatial candidates when present,
    /// attribute candidates otherwise. The two lists are never merged.
    pub fn prior_candidates(&self) -> &[MatchResult] {
        if self.candidates.l3.is_empty() {
            &self.candidates.l2
        } else {
            &self.candidates.l3
        }
    }
}

/// Outcome of one resolution request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelResult {
    /// Whether a target was chosen
    pub success: bool,

    /// Chosen match, if any
    pub chosen: Option<MatchResult>,

    /// Layer that produced the chosen match
    pub layer: Option<FunnelLayer>,

    /// Slot extracted from the instruction
    pub slot: ActionSlot,

    /// Every layer's candidates, kept for diagnostics
    pub per_layer: LayerCandidates,

    /// Why the funnel stopped where it did
    pub reason: Option<String>,

    /// Wall time of the whole resolution
    pub elapsed_ms: u64,
}

impl FunnelResult {
    /// Score of the chosen match
    pub fn confidence(&self) -> f64 {
        self.chosen.as_ref().map_or(0.0, |chosen| chosen.score)
    }

    /// Name of the layer that won, or `"none"`
    pub fn strategy(&self) -> &'static str {
        self.layer.map_or("none", |layer| layer.name())
    }
}

/// Funnel configuration
///
/// Thresholds and scores must lie in [0, 1]; see [`FunnelConfig::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunnelConfig {
    /// Best L2 score that terminates the funnel
    pub attribute_threshold: f64,

    /// Best L3 score that terminates the funnel
    pub spatial_threshold: f64,

    /// Minimum slot confidence for the funnel to run at all
    pub min_slot_confidence: f64,

    /// Minimum score for the below-threshold fallback pick
    pub fallback_min_score: f64,

    /// L2 candidates kept
    pub attribute_top_n: usize,

    /// L3 candidates kept
    pub spatial_top_n: usize,

    /// L3 search radius in CSS pixels
    pub max_distance: f64,

    /// L3 angular tolerance around a direction, in degrees
    pub direction_tolerance_deg: f64,

    /// Prior candidates offered to L4
    pub semantic_max_candidates: usize,

    /// Score given to an L4 pick
    pub semantic_confidence: f64,

    /// Score given to an L5 pick
    pub visual_confidence: f64,

    /// Budget for each reasoning or capture call
    pub external_timeout_ms: u64,
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self {
            attribute_threshold: 0.8,
            spatial_threshold: 0.7,
            min_slot_confidence: slot_extractor::MIN_USABLE_CONFIDENCE,
            fallback_min_score: 0.5,
            attribute_top_n: 10,
            spatial_top_n: 5,
            max_distance: 300.0,
            direction_tolerance_deg: 45.0,
            semantic_max_candidates: 5,
            semantic_confidence: 0.95,
            visual_confidence: 0.90,
            external_timeout_ms: 30_000,
        }
    }
}

impl FunnelConfig {
    /// Reject out-of-range thresholds and zero limits
    pub fn validate(&self) -> Result<(), LocatorError> {
        let unit_values = [
            ("attribute_threshold", self.attribute_threshold),
            ("spatial_threshold", self.spatial_threshold),
            ("min_slot_confidence", self.min_slot_confidence),
            ("fallback_min_score", self.fallback_min_score),
            ("semantic_confidence", self.semantic_confidence),
            ("visual_confidence", self.visual_confidence),
        ];
        for (name, value) in unit_values {
            if !(0.0..=1.0).contains(&value) {
                return Err(LocatorError::InvalidConfig(format!(
                    "{name} must lie in [0, 1], got {value}"
                )));
            }
        }

        let limits = [
            ("attribute_top_n", self.attribute_top_n),
            ("spatial_top_n", self.spatial_top_n),
            ("semantic_max_candidates", self.semantic_max_candidates),
        ];
        for (name, value) in limits {
            if value == 0 {
                return Err(LocatorError::InvalidConfig(format!("{name} must be positive")));
            }
        }

        if !(self.max_distance > 0.0) {
            return Err(LocatorError::InvalidConfig(format!(
                "max_distance must be positive, got {}",
                self.max_distance
            )));
        }
        if !(0.0..=180.0).contains(&self.direction_tolerance_deg) {
            return Err(LocatorError::InvalidConfig(format!(
                "direction_tolerance_deg must lie in [0, 180], got {}",
                self.direction_tolerance_deg
            )));
        }
        if self.external_timeout_ms == 0 {
            return Err(LocatorError::InvalidConfig(
                "external_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Budget for each reasoning or capture call
    pub fn external_timeout(&self) -> Duration {
        Duration::from_millis(self.external_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uifunnel_core_types::BoundingBox;

    fn element(id: i64) -> ElementRecord {
        ElementRecord::new(id, "button").with_bbox(BoundingBox::new(0.0, 0.0, 10.0, 10.0))
    }

    #[test]
    fn test_match_score_is_clamped() {
        assert_eq!(MatchResult::new(element(1), 1.4, FunnelLayer::Attribute).score, 1.0);
        assert_eq!(MatchResult::new(element(1), -0.2, FunnelLayer::Attribute).score, 0.0);
        assert_eq!(MatchResult::new(element(1), f64::NAN, FunnelLayer::Attribute).score, 0.0);
    }

    #[test]
    fn test_rank_is_stable() {
        let mut matches = vec![
            MatchResult::new(element(1), 0.5, FunnelLayer::Attribute),
            MatchResult::new(element(2), 0.9, FunnelLayer::Attribute),
            MatchResult::new(element(3), 0.5, FunnelLayer::Attribute),
        ];
        rank(&mut matches);
        let ids: Vec<i64> = matches.iter().map(|m| m.element.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn test_layer_names_serialize() {
        assert_eq!(
            serde_json::to_string(&FunnelLayer::Spatial).unwrap(),
            "\"l3_spatial\""
        );
        for layer in FunnelLayer::escalation_chain() {
            assert_eq!(
                serde_json::to_value(layer).unwrap(),
                serde_json::Value::String(layer.name().into())
            );
        }
    }

    #[test]
    fn test_context_builder_prefers_spatial_candidates() {
        let ctx = FunnelContext::new(
            "click",
            SessionId::new(),
            Arc::new(vec![element(1), element(2)]),
            ActionSlot::empty(),
        )
        .with_layer(
            FunnelLayer::Attribute,
            vec![MatchResult::new(element(1), 0.6, FunnelLayer::Attribute)],
        );
        assert_eq!(ctx.prior_candidates()[0].element.id, 1);

        let ctx = ctx.with_layer(
            FunnelLayer::Spatial,
            vec![MatchResult::new(element(2), 0.5, FunnelLayer::Spatial)],
        );
        assert_eq!(ctx.prior_candidates().len(), 1);
        assert_eq!(ctx.prior_candidates()[0].element.id, 2);
        assert_eq!(ctx.layer(FunnelLayer::Attribute).len(), 1);
    }

    #[test]
    fn test_best_candidate_prefers_earlier_layer_on_ties() {
        let candidates = LayerCandidates {
            l2: vec![MatchResult::new(element(1), 0.6, FunnelLayer::Attribute)],
            l3: vec![MatchResult::new(element(2), 0.6, FunnelLayer::Spatial)],
            ..LayerCandidates::default()
        };
        assert_eq!(candidates.best().map(|m| m.element.id), Some(1));
        assert_eq!(candidates.total(), 2);
    }

    #[test]
    fn test_config_validation() {
        assert!(FunnelConfig::default().validate().is_ok());

        let bad = FunnelConfig {
            attribute_threshold: 1.2,
            ..FunnelConfig::default()
        };
        assert!(matches!(bad.validate(), Err(LocatorError::InvalidConfig(_))));

        let bad = FunnelConfig {
            spatial_top_n: 0,
            ..FunnelConfig::default()
        };
        assert!(bad.validate().is_err());

        let bad = FunnelConfig {
            max_distance: f64::NAN,
            ..FunnelConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
