//! Layer resolvers
//!
//! Four resolvers in escalation order:
//! 1. Attribute - attribute, text and type scoring
//! 2. Spatial - position relative to an anchor element
//! 3. Semantic - text reasoning over prior candidates
//! 4. Visual - vision reasoning over a screenshot

mod attribute;
mod semantic;
mod spatial;
mod visual;

pub use attribute::{AttributeMatcher, AttributeResolver, ATTRIBUTE_WEIGHTS};
pub use semantic::{SemanticResolver, SEMANTIC_SYSTEM_PROMPT};
pub use spatial::{SpatialResolver, SpatialScorer};
pub use visual::{VisualResolver, VISUAL_SYSTEM_PROMPT};

use async_trait::async_trait;

use crate::{errors::LocatorError, types::*};

/// One funnel layer
///
/// The orchestrator calls `resolve` only when `applies` holds for the current
/// context; the layer's best candidate terminates the funnel when it reaches
/// `accept_threshold`.
#[async_trait]
pub trait LayerResolver: Send + Sync {
    /// Layer this resolver fills
    fn layer(&self) -> FunnelLayer;

    /// Whether the layer should run for `ctx`
    fn applies(&self, ctx: &FunnelContext) -> bool;

    /// Produce ranked candidates
    async fn resolve(&self, ctx: &FunnelContext) -> Result<Vec<MatchResult>, LocatorError>;

    /// Score at which the best candidate is accepted
    fn accept_threshold(&self) -> f64;

    /// Get layer name
    fn name(&self) -> &'static str {
        self.layer().name()
    }
}
