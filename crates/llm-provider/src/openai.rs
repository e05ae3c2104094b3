//! OpenAI-compatible chat-completions provider.
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::ReasoningError;
use crate::provider::{ChatRequest, TextReasoner, VisionReasoner, VisionRequest};

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Tried in order; a rate-limited key hands over to the next one.
    pub api_keys: Vec<String>,
    pub model: String,
    /// Model used for screenshot requests; falls back to `model`.
    pub vision_model: Option<String>,
    pub api_base: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            model: "gpt-4o-mini".to_string(),
            vision_model: None,
            api_base: "https://api.openai.com/v1".to_string(),
            temperature: 0.0,
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct OpenAiReasoner {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiReasoner {
    pub fn new(config: OpenAiConfig) -> Result<Self, ReasoningError> {
        if config.api_keys.iter().all(|key| key.trim().is_empty()) {
            return Err(ReasoningError::MissingCredentials(
                "no API key configured for reasoning provider".into(),
            ));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| ReasoningError::Transport(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    async fn invoke(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<String, ReasoningError> {
        let url = format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        );
        let body = ChatCompletionRequest {
            model: model.to_string(),
            temperature: self.config.temperature,
            messages,
        };

        let keys: Vec<&String> = self
            .config
            .api_keys
            .iter()
            .filter(|key| !key.trim().is_empty())
            .collect();
        let mut last_error: Option<ReasoningError> = None;
        for (index, key) in keys.iter().enumerate() {
            let response = match self.client.post(&url).bearer_auth(key).json(&body).send().await {
                Ok(resp) => resp,
                Err(err) => {
                    last_error = Some(ReasoningError::Transport(format!("request failed: {err}")));
                    continue;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<response unavailable>".to_string());
                if status.as_u16() == 429 {
                    let friendly = rate_limit_message(&text);
                    if index + 1 < keys.len() {
                        warn!(
                            target: "llm",
                            message = %friendly,
                            attempt = index + 1,
                            remaining = keys.len() - index - 1,
                            "reasoning request rate limited; switching API key"
                        );
                    }
                    last_error = Some(ReasoningError::RateLimited(friendly));
                    continue;
                }
                let error = ReasoningError::Http {
                    status: status.as_u16(),
                    body: text,
                };
                if status.as_u16() == 401 && index + 1 < keys.len() {
                    warn!(
                        target: "llm",
                        attempt = index + 1,
                        remaining = keys.len() - index - 1,
                        "reasoning request unauthorized; switching API key"
                    );
                    last_error = Some(error);
                    continue;
                }
                return Err(error);
            }

            let response: ChatCompletionResponse = response
                .json()
                .await
                .map_err(|err| ReasoningError::invalid_response(format!("response invalid: {err}")))?;
            if let Some(usage) = &response.usage {
                debug!(
                    target: "llm",
                    model,
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    "reasoning request completed"
                );
            }
            return response
                .choices
                .first()
                .and_then(|choice| choice.message.content.as_ref())
                .and_then(ChatCompletionContent::as_text)
                .ok_or_else(|| ReasoningError::invalid_response("response missing content"));
        }

        Err(last_error
            .unwrap_or_else(|| ReasoningError::Unavailable("request exhausted all API keys".into())))
    }
}

#[async_trait]
impl TextReasoner for OpenAiReasoner {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, ReasoningError> {
        let messages = vec![
            ChatMessage::text("system", &request.system_prompt),
            ChatMessage::text("user", &request.user_prompt),
        ];
        self.invoke(&self.config.model, messages).await
    }
}

#[async_trait]
impl VisionReasoner for OpenAiReasoner {
    fn name(&self) -> &str {
        "openai"
    }

    async fn locate(&self, request: &VisionRequest) -> Result<String, ReasoningError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&request.image_png);
        let messages = vec![
            ChatMessage::text("system", &request.system_prompt),
            ChatMessage {
                role: "user".to_string(),
                content: MessageContent::Parts(vec![
                    ContentPart::Text {
                        text: request.description.clone(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:image/png;base64,{encoded}"),
                        },
                    },
                ]),
            },
        ];
        let model = self
            .config
            .vision_model
            .as_deref()
            .unwrap_or(&self.config.model);
        self.invoke(model, messages).await
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: MessageContent,
}

impl ChatMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: MessageContent::Text(content.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
    #[serde(default)]
    usage: Option<ChatCompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    #[serde(default)]
    content: Option<ChatCompletionContent>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChatCompletionContent {
    Text(String),
    Parts(Vec<ChatCompletionPart>),
}

impl ChatCompletionContent {
    fn as_text(&self) -> Option<String> {
        let text = match self {
            ChatCompletionContent::Text(value) => value.clone(),
            ChatCompletionContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| part.text.as_deref())
                .collect::<Vec<_>>()
                .join("\n"),
        };
        (!text.trim().is_empty()).then_some(text)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: Option<String>,
}

fn rate_limit_message(raw: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(raw)
        .ok()
        .and_then(|envelope| envelope.error.message)
        .map(|message| format!("rate limit exceeded: {}", message.trim()))
        .unwrap_or_else(|| "rate limit exceeded; retry later".to_string())
}
