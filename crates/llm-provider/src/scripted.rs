//! Reasoner that replays canned replies.
use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::errors::ReasoningError;
use crate::provider::{ChatRequest, TextReasoner, VisionReasoner, VisionRequest};

/// Replies are consumed in order by both text and vision calls. Once the
/// script runs out every call fails with [`ReasoningError::Unavailable`].
#[derive(Default)]
pub struct ScriptedReasoner {
    replies: Mutex<VecDeque<Result<String, ReasoningError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedReasoner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.replies.lock().push_back(Ok(reply.into()));
        self
    }

    pub fn with_error(self, error: ReasoningError) -> Self {
        self.replies.lock().push_back(Err(error));
        self
    }

    /// User prompts (text calls) and descriptions (vision calls) seen so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }

    fn next(&self, prompt: &str) -> Result<String, ReasoningError> {
        self.prompts.lock().push(prompt.to_string());
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ReasoningError::Unavailable("script exhausted".into())))
    }
}

#[async_trait]
impl TextReasoner for ScriptedReasoner {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, ReasoningError> {
        self.next(&request.user_prompt)
    }
}

#[async_trait]
impl VisionReasoner for ScriptedReasoner {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn locate(&self, request: &VisionRequest) -> Result<String, ReasoningError> {
        self.next(&request.description)
    }
}
