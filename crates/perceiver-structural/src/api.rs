use async_trait::async_trait;
use uifunnel_core_types::SessionId;

use crate::errors::PerceiverError;
use crate::model::PageSnapshot;

/// Source of element snapshots for a live browser session.
///
/// Implementations must return elements in stable document order with
/// bounding boxes in CSS pixels relative to the top-level document.
#[async_trait]
pub trait DomSnapshotProvider: Send + Sync {
    async fn observe(&self, session: &SessionId) -> Result<PageSnapshot, PerceiverError>;
}
