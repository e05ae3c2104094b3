//! Snapshot provider backed by recorded page fixtures.
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::debug;
use uifunnel_core_types::{ElementRecord, SessionId};

use crate::api::DomSnapshotProvider;
use crate::errors::PerceiverError;
use crate::model::PageSnapshot;

#[derive(Deserialize)]
#[serde(untagged)]
enum FixtureDocument {
    // Elements first: a frame array would also accept element objects.
    Elements(Vec<ElementRecord>),
    Frames(Vec<PageSnapshot>),
    Snapshot(PageSnapshot),
}

/// Replays one or more recorded snapshots.
///
/// Each `observe` returns the current frame and advances to the next one;
/// the last frame repeats forever. A single frame models a static page.
pub struct StaticSnapshotProvider {
    frames: Mutex<VecDeque<PageSnapshot>>,
    observations: AtomicUsize,
}

impl StaticSnapshotProvider {
    pub fn new(snapshot: PageSnapshot) -> Self {
        Self::with_frames(vec![snapshot])
    }

    pub fn with_frames(frames: Vec<PageSnapshot>) -> Self {
        Self {
            frames: Mutex::new(frames.into()),
            observations: AtomicUsize::new(0),
        }
    }

    /// Accepts a snapshot object, an array of snapshot frames, or a bare
    /// array of element records.
    pub fn from_json_str(source: &str) -> Result<Self, PerceiverError> {
        let document: FixtureDocument =
            serde_json::from_str(source).map_err(|err| PerceiverError::Fixture(err.to_string()))?;
        let frames = match document {
            FixtureDocument::Frames(frames) => frames,
            FixtureDocument::Snapshot(snapshot) => vec![snapshot],
            FixtureDocument::Elements(elements) => vec![PageSnapshot {
                elements,
                ..PageSnapshot::default()
            }],
        };
        if frames.is_empty() {
            return Err(PerceiverError::Fixture("fixture contains no frames".into()));
        }
        Ok(Self::with_frames(frames))
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, PerceiverError> {
        let source = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_json_str(&source)
    }

    /// Replace every pending frame with `snapshot`.
    pub fn replace(&self, snapshot: PageSnapshot) {
        let mut frames = self.frames.lock();
        frames.clear();
        frames.push_back(snapshot);
    }

    pub fn observations(&self) -> usize {
        self.observations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DomSnapshotProvider for StaticSnapshotProvider {
    async fn observe(&self, session: &SessionId) -> Result<PageSnapshot, PerceiverError> {
        self.observations.fetch_add(1, Ordering::SeqCst);
        let mut frames = self.frames.lock();
        let snapshot = if frames.len() > 1 {
            frames.pop_front()
        } else {
            frames.front().cloned()
        }
        .ok_or_else(|| PerceiverError::SnapshotUnavailable("no recorded frames".into()))?;
        debug!(%session, elements = snapshot.elements.len(), "replayed fixture snapshot");
        Ok(snapshot)
    }
}
