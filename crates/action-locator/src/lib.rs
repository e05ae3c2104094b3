//! Element resolution funnel
//!
//! Resolves a natural-language instruction to one rendered element through
//! confidence-gated layers run strictly in order:
//! - Attribute scoring over the snapshot (terminates at 0.8)
//! - Spatial resolution relative to an anchor (terminates at 0.7)
//! - Semantic selection among prior candidates via text reasoning
//! - Visual location in a screenshot via vision reasoning
//!
//! Layer failures degrade to "no candidates"; the orchestrator always
//! returns a [`FunnelResult`].

pub mod errors;
pub mod funnel;
pub mod geometry;
pub mod strategies;
pub mod types;

pub use errors::*;
pub use funnel::*;
pub use strategies::*;
pub use types::*;
