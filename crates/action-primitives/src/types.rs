//! Core data types for action primitives

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uifunnel_core_types::{ElementRecord, Point};

use crate::errors::ActionError;

/// What an actuator acts on: an observed element id plus the point to hit.
///
/// Coordinate-only records from visual resolution carry the sentinel id and
/// are addressed by point alone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionTarget {
    pub element_id: i64,
    pub point: Point,
}

impl ActionTarget {
    pub fn from_element(element: &ElementRecord) -> Self {
        Self {
            element_id: element.id,
            point: element.bbox.center(),
        }
    }

    pub fn is_coordinate_only(&self) -> bool {
        self.element_id < 0
    }
}

/// Primitive kinds reported by actuators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    Click,
    Input,
    Screenshot,
}

/// Action execution report
///
/// Contains the outcome and timing of one primitive; failed primitives
/// carry the error text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionReport {
    /// Unique identifier for this action
    pub action_id: String,

    pub kind: PrimitiveKind,

    /// Element acted on, if any
    pub target: Option<ActionTarget>,

    /// Whether the action succeeded
    pub ok: bool,

    /// When the action started
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,

    /// When the action finished
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub finished_at: DateTime<Utc>,

    /// Total latency in milliseconds
    pub latency_ms: u64,

    /// Error details (if failed)
    pub error: Option<String>,
}

impl ActionReport {
    /// Create a successful action report
    pub fn success(kind: PrimitiveKind, started_at: DateTime<Utc>) -> Self {
        let finished_at = Utc::now();
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            kind,
            target: None,
            ok: true,
            started_at,
            finished_at,
            latency_ms: latency_between(started_at, finished_at),
            error: None,
        }
    }

    /// Create a failed action report
    pub fn failure(kind: PrimitiveKind, started_at: DateTime<Utc>, error: &ActionError) -> Self {
        Self {
            ok: false,
            error: Some(error.to_string()),
            ..Self::success(kind, started_at)
        }
    }

    pub fn with_target(mut self, target: ActionTarget) -> Self {
        self.target = Some(target);
        self
    }
}

fn latency_between(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    (end - start).num_milliseconds().max(0) as u64
}
