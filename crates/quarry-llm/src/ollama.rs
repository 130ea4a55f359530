//! Ollama Provider Implementation
//!
//! Provides integration with Ollama's local chat API, for running the
//! extraction oracle on local models.
//!
//! # Features
//!
//! - JSON-constrained output (`format: "json"`)
//! - Configurable endpoint and model
//! - Token usage from `prompt_eval_count` / `eval_count`
//!
//! Retries are handled by [`OracleClient`](crate::OracleClient), not here.
//!
//! # Examples
//!
//! ```no_run
//! use quarry_llm::OllamaProvider;
//!
//! let provider = OllamaProvider::new("http://localhost:11434", "llama3.1").unwrap();
//! ```

use crate::LlmError;
use quarry_domain::traits::LlmProvider as LlmProviderTrait;
use quarry_domain::{Completion, TokenUsage};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default Ollama API endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Default timeout for LLM requests (300 seconds, local models are slow on large chunks)
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Ollama API provider for local LLM inference
pub struct OllamaProvider {
    endpoint: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Request body for Ollama chat API
#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    format: &'static str,
    stream: bool,
    options: OllamaOptions,
}

/// Response from Ollama chat API
#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaReplyMessage,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

#[derive(Deserialize)]
struct OllamaReplyMessage {
    content: String,
}

impl OllamaProvider {
    /// Create a new Ollama provider
    ///
    /// # Parameters
    ///
    /// - `endpoint`: Ollama API endpoint (e.g., "http://localhost:11434")
    /// - `model`: Model to use (e.g., "llama3.1", "qwen2.5")
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| LlmError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature: crate::openai::DEFAULT_TEMPERATURE,
            client,
        })
    }

    /// Create a new Ollama provider on `http://localhost:11434`
    pub fn default_endpoint(model: impl Into<String>) -> Result<Self, LlmError> {
        Self::new(DEFAULT_ENDPOINT, model)
    }

    /// Override the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Send one chat request
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Ollama is not running
    /// - Model is not available
    /// - Response format is invalid
    pub async fn chat(&self, system: &str, user: &str) -> Result<Completion, LlmError> {
        let url = format!("{}/api/chat", self.endpoint);

        let request_body = OllamaChatRequest {
            model: &self.model,
            messages: vec![
                OllamaMessage {
                    role: "system",
                    content: system,
                },
                OllamaMessage {
                    role: "user",
                    content: user,
                },
            ],
            format: "json",
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| LlmError::Communication(format!("Request failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(LlmError::ModelNotAvailable(self.model.clone()));
        }
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::Communication(format!("HTTP {}: {}", status, error_text)));
        }

        let body: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        Ok(Completion {
            content: body.message.content,
            usage: TokenUsage::new(body.prompt_eval_count, body.eval_count),
        })
    }
}

impl LlmProviderTrait for OllamaProvider {
    type Error = LlmError;

    fn complete(&self, system: &str, user: &str) -> Result<Completion, Self::Error> {
        crate::block_on(self.chat(system, user))?
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
