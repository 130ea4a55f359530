//! OpenAI Provider Implementation
//!
//! Chat completions in JSON mode. Each call sends one system message and one
//! user message and reads token usage from the response envelope.
//!
//! # Examples
//!
//! ```no_run
//! use quarry_llm::OpenAiProvider;
//!
//! let provider = OpenAiProvider::from_env().unwrap().with_model("gpt-4.1-mini");
//! ```

use crate::LlmError;
use quarry_domain::traits::LlmProvider as LlmProviderTrait;
use quarry_domain::{Completion, TokenUsage};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default OpenAI API endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";

/// Default model
pub const DEFAULT_MODEL: &str = "gpt-4.1";

/// Default timeout for LLM requests (120 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Default completion token cap
pub const DEFAULT_MAX_TOKENS: u32 = 16000;

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// OpenAI chat completions provider
pub struct OpenAiProvider {
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl OpenAiProvider {
    /// Create a provider for `model` using `api_key`
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        Self::with_timeout(api_key, model, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a provider with a custom request timeout
    pub fn with_timeout(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: model.into(),
            api_key: api_key.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            client,
        })
    }

    /// Create a provider for the default model, reading the key from `OPENAI_API_KEY`
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = std::env::var(API_KEY_ENV)
            .map_err(|_| LlmError::Authentication(format!("{} is not set", API_KEY_ENV)))?;
        Self::new(api_key, DEFAULT_MODEL)
    }

    /// Override the API endpoint (for proxies and compatible servers)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Override the completion token cap
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Send one chat completion request
    pub async fn chat(&self, system: &str, user: &str) -> Result<Completion, LlmError> {
        let url = format!("{}/chat/completions", self.endpoint);
        let request_body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| LlmError::Communication(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(match status {
                reqwest::StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimitExceeded,
                reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                    LlmError::Authentication(error_text)
                }
                reqwest::StatusCode::NOT_FOUND => LlmError::ModelNotAvailable(self.model.clone()),
                _ => LlmError::Communication(format!("HTTP {}: {}", status, error_text)),
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        completion_from_response(body)
    }
}

fn completion_from_response(body: ChatResponse) -> Result<Completion, LlmError> {
    let content = body
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| LlmError::InvalidResponse("Response has no message content".to_string()))?;

    let usage = body
        .usage
        .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
        .unwrap_or_default();

    Ok(Completion { content, usage })
}

impl LlmProviderTrait for OpenAiProvider {
    type Error = LlmError;

    fn complete(&self, system: &str, user: &str) -> Result<Completion, Self::Error> {
        crate::block_on(self.chat(system, user))?
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
