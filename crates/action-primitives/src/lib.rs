//! Action Primitives - browser actuator boundary
//!
//! This crate defines how the execution engine touches the page:
//! - `BrowserActuator`: click, input and screenshot against observed elements
//! - `ScreenCapture`: the screenshot capability on its own, for visual resolution
//! - `ActionReport`: timing and outcome of one primitive
//! - `RecordingActuator`: an in-memory actuator for fixtures and tests

pub mod actuator;
pub mod errors;
pub mod recording;
pub mod types;

pub use actuator::*;
pub use errors::*;
pub use recording::*;
pub use types::*;
