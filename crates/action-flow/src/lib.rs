//! Action Flow - step and case execution
//!
//! This crate drives the resolution funnel against a live session:
//! - `OodaEngine`: Observe, Orient, Decide, Act and Verify for one step
//! - `CaseExecutor`: sequential steps with bounded retry and case statistics
//! - `with_retry`: the retry wrapper used between attempts
//! - `Verifier`: post-action checks

pub mod case;
pub mod errors;
pub mod ooda;
pub mod retry;
pub mod types;
pub mod verify;

pub use case::*;
pub use errors::*;
pub use ooda::*;
pub use retry::*;
pub use types::*;
pub use verify::*;
