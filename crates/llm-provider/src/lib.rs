//! Reasoning service boundaries used by the semantic and visual resolvers.

pub mod errors;
pub mod json;
pub mod openai;
pub mod provider;
pub mod scripted;

pub use errors::ReasoningError;
pub use json::{extract_json_object, parse_json_reply};
pub use openai::{OpenAiConfig, OpenAiReasoner};
pub use provider::{ChatRequest, TextReasoner, VisionReasoner, VisionRequest};
pub use scripted::ScriptedReasoner;
