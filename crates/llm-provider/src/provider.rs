use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ReasoningError;

/// One text-reasoning exchange: a fixed system instruction plus the task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub system_prompt: String,
    pub user_prompt: String,
}

impl ChatRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
        }
    }
}

/// Screenshot plus a description of the element to find in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionRequest {
    pub system_prompt: String,
    #[serde(skip)]
    pub image_png: Vec<u8>,
    pub description: String,
}

/// Text reasoning service. Returns the raw reply text; callers parse it.
#[async_trait]
pub trait TextReasoner: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: &ChatRequest) -> Result<String, ReasoningError>;
}

/// Vision reasoning service. Returns the raw reply text; callers parse it.
#[async_trait]
pub trait VisionReasoner: Send + Sync {
    fn name(&self) -> &str;

    async fn locate(&self, request: &VisionRequest) -> Result<String, ReasoningError>;
}
