//! Oracle provider selected at runtime.

use crate::config::{OracleSettings, ProviderKind};
use crate::error::Result;
use quarry_domain::traits::LlmProvider;
use quarry_domain::Completion;
use quarry_llm::{LlmError, OllamaProvider, OpenAiProvider};
use std::time::Duration;

/// Either of the supported providers.
pub enum OracleProvider {
    /// OpenAI chat completions
    OpenAi(OpenAiProvider),
    /// Local Ollama server
    Ollama(OllamaProvider),
}

impl OracleProvider {
    /// Build the provider described by `settings`.
    ///
    /// OpenAI reads its key from `OPENAI_API_KEY`.
    pub fn from_settings(settings: &OracleSettings) -> Result<Self> {
        match settings.provider {
            ProviderKind::OpenAi => {
                let api_key = std::env::var(quarry_llm::openai::API_KEY_ENV).map_err(|_| {
                    LlmError::Authentication(format!(
                        "{} is not set",
                        quarry_llm::openai::API_KEY_ENV
                    ))
                })?;

                let mut provider = OpenAiProvider::with_timeout(
                    api_key,
                    &settings.model,
                    Duration::from_secs(settings.timeout_secs),
                )?
                .with_temperature(settings.temperature)
                .with_max_tokens(settings.max_tokens);
                if let Some(endpoint) = &settings.endpoint {
                    provider = provider.with_endpoint(endpoint);
                }
                Ok(Self::OpenAi(provider))
            }
            ProviderKind::Ollama => {
                let endpoint = settings
                    .endpoint
                    .as_deref()
                    .unwrap_or(quarry_llm::ollama::DEFAULT_ENDPOINT);
                let provider = OllamaProvider::new(endpoint, &settings.model)?
                    .with_temperature(settings.temperature);
                Ok(Self::Ollama(provider))
            }
        }
    }
}

impl LlmProvider for OracleProvider {
    type Error = LlmError;

    fn complete(&self, system: &str, user: &str) -> std::result::Result<Completion, Self::Error> {
        match self {
            Self::OpenAi(provider) => provider.complete(system, user),
            Self::Ollama(provider) => provider.complete(system, user),
        }
    }

    fn model_name(&self) -> &str {
        match self {
            Self::OpenAi(provider) => provider.model_name(),
            Self::Ollama(provider) => provider.model_name(),
        }
    }
}
