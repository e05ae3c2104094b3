//! Shared primitives for the uifunnel resolution core.
//!
//! Element records are produced by the DOM snapshot collaborator and consumed
//! read-only by every funnel layer; ids correlate sessions, cases and steps.

pub mod element;

pub use element::{BoundingBox, ElementRecord, Point, TargetType, VISUAL_ELEMENT_ID};

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Shared error type for malformed primitive values.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("unknown target type: {0}")]
    UnknownTargetType(String),
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct CaseId(pub String);

impl CaseId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for CaseId {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct StepId(pub String);

impl StepId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for StepId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Page-level metadata captured alongside an element snapshot.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(default))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PageMeta {
    pub url: String,
    pub title: String,
    pub viewport_width: f64,
    pub viewport_height: f64,
}

impl PageMeta {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            viewport_width: 1280.0,
            viewport_height: 800.0,
        }
    }
}
