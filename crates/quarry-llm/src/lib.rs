//! Quarry LLM Provider Layer
//!
//! Pluggable oracle providers and the retrying oracle client.
//!
//! # Architecture
//!
//! Providers implement the blocking `LlmProvider` trait from `quarry-domain`.
//! [`OracleClient`] wraps a provider, runs each call on tokio's blocking pool,
//! retries transport failures under a [`RetryPolicy`], and converts the reply
//! into a typed response or a distinct parse-failure outcome.
//!
//! # Providers
//!
//! - `MockProvider`: Deterministic mock for testing
//! - `OpenAiProvider`: OpenAI chat completions in JSON mode
//! - `OllamaProvider`: Local Ollama chat API
//!
//! # Examples
//!
//! ```
//! use quarry_llm::MockProvider;
//! use quarry_domain::traits::LlmProvider;
//!
//! let provider = MockProvider::new(r#"{"ok": true}"#);
//! let completion = provider.complete("system", "payload").unwrap();
//! assert_eq!(completion.content, r#"{"ok": true}"#);
//! ```

#![warn(missing_docs)]

pub mod json;
pub mod ollama;
pub mod openai;
pub mod oracle;
pub mod retry;

use quarry_domain::traits::LlmProvider as LlmProviderTrait;
use quarry_domain::{Completion, TokenUsage};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use oracle::{OracleCallFailure, OracleClient, OracleOutcome, OracleReply, OracleResponse};
pub use retry::RetryPolicy;

/// Errors that can occur during LLM operations
#[derive(Error, Debug)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Response envelope could not be read (missing choices, bad body)
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Credentials rejected or missing
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}

impl LlmError {
    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            LlmError::ModelNotAvailable(_) | LlmError::Authentication(_)
        )
    }
}

/// Drive an async request from a blocking provider call
///
/// Inside tokio's blocking pool the current runtime handle is reused;
/// outside any runtime a private current-thread runtime is built.
pub(crate) fn block_on<F: Future>(future: F) -> Result<F::Output, LlmError> {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => Ok(handle.block_on(future)),
        Err(_) => tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map(|runtime| runtime.block_on(future))
            .map_err(|e| LlmError::Other(format!("Failed to start runtime: {}", e))),
    }
}

#[derive(Debug, Clone)]
enum Scripted {
    Reply(String),
    Failure(String),
}

/// A call observed by [`MockProvider`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// System instructions sent
    pub system: String,
    /// User payload sent
    pub user: String,
}

/// Mock LLM provider for deterministic testing
///
/// Replies are chosen in this order: the FIFO script (see
/// [`push_response`](Self::push_response) and
/// [`push_failure`](Self::push_failure)), then the first keyed response whose
/// key occurs in the user payload, then the default response. Clones share
/// all state.
///
/// # Examples
///
/// ```
/// use quarry_llm::MockProvider;
/// use quarry_domain::traits::LlmProvider;
///
/// let mut provider = MockProvider::default();
/// provider.add_response("rows 0-30", r#"{"product_blocks": []}"#);
/// provider.push_failure("connection reset");
///
/// assert!(provider.complete("sys", "rows 0-30").is_err());
/// let reply = provider.complete("sys", "rows 0-30").unwrap();
/// assert_eq!(reply.content, r#"{"product_blocks": []}"#);
/// assert_eq!(provider.call_count(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    default_response: String,
    responses: Arc<Mutex<Vec<(String, String)>>>,
    script: Arc<Mutex<VecDeque<Scripted>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    call_count: Arc<Mutex<usize>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    latency: Duration,
    usage: TokenUsage,
}

impl MockProvider {
    /// Create a new MockProvider with a fixed response for all payloads
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            responses: Arc::new(Mutex::new(Vec::new())),
            script: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(Mutex::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            latency: Duration::ZERO,
            usage: TokenUsage::new(10, 5),
        }
    }

    /// Hold each call for `latency` before replying
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Usage reported for every call
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Reply with `response` whenever the user payload contains `key`
    pub fn add_response(&mut self, key: impl Into<String>, response: impl Into<String>) {
        self.responses
            .lock()
            .unwrap()
            .push((key.into(), response.into()));
    }

    /// Fail whenever the user payload contains `key`
    pub fn add_error(&mut self, key: impl Into<String>) {
        self.responses
            .lock()
            .unwrap()
            .push((key.into(), "ERROR".to_string()));
    }

    /// Queue a reply for the next unscripted call
    pub fn push_response(&self, response: impl Into<String>) {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Reply(response.into()));
    }

    /// Queue a transport failure for the next unscripted call
    pub fn push_failure(&self, message: impl Into<String>) {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Failure(message.into()));
    }

    /// Get the number of times complete was called
    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    /// Reset the call count
    pub fn reset_call_count(&self) {
        *self.call_count.lock().unwrap() = 0;
    }

    /// Every call observed so far
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Highest number of calls that were in flight at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_reply(&self, user: &str) -> Result<String, LlmError> {
        if let Some(scripted) = self.script.lock().unwrap().pop_front() {
            return match scripted {
                Scripted::Reply(response) => Ok(response),
                Scripted::Failure(message) => Err(LlmError::Communication(message)),
            };
        }

        let responses = self.responses.lock().unwrap();
        if let Some((_, response)) = responses.iter().find(|(key, _)| user.contains(key.as_str())) {
            if response == "ERROR" {
                return Err(LlmError::Other("Mock error".to_string()));
            }
            return Ok(response.clone());
        }

        Ok(self.default_response.clone())
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("{}")
    }
}

impl LlmProviderTrait for MockProvider {
    type Error = LlmError;

    fn complete(&self, system: &str, user: &str) -> Result<Completion, Self::Error> {
        *self.call_count.lock().unwrap() += 1;
        self.calls.lock().unwrap().push(RecordedCall {
            system: system.to_string(),
            user: user.to_string(),
        });

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }

        let reply = self.next_reply(user);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        reply.map(|content| Completion {
            content,
            usage: self.usage,
        })
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_provider_default() {
        let provider = MockProvider::new("Test response");
        let result = provider.complete("sys", "any payload");
        assert!(result.is_ok());
        let completion = result.unwrap();
        assert_eq!(completion.content, "Test response");
        assert_eq!(completion.usage, TokenUsage::new(10, 5));
    }

    #[test]
    fn test_mock_provider_keyed_responses() {
        let mut provider = MockProvider::default();
        provider.add_response("hello", "world");
        provider.add_response("foo", "bar");

        assert_eq!(provider.complete("", "say hello").unwrap().content, "world");
        assert_eq!(provider.complete("", "foo!").unwrap().content, "bar");
        assert_eq!(provider.complete("", "unknown").unwrap().content, "{}");
    }

    #[test]
    fn test_mock_provider_script_precedes_keys() {
        let mut provider = MockProvider::new("default");
        provider.add_response("key", "keyed");
        provider.push_failure("timeout");
        provider.push_response("scripted");

        assert!(matches!(
            provider.complete("", "key"),
            Err(LlmError::Communication(_))
        ));
        assert_eq!(provider.complete("", "key").unwrap().content, "scripted");
        assert_eq!(provider.complete("", "key").unwrap().content, "keyed");
    }

    #[test]
    fn test_mock_provider_call_count_and_log() {
        let provider = MockProvider::new("test");
        assert_eq!(provider.call_count(), 0);

        provider.complete("system one", "payload one").unwrap();
        provider.complete("system two", "payload two").unwrap();
        assert_eq!(provider.call_count(), 2);
        assert_eq!(provider.calls()[1].user, "payload two");

        provider.reset_call_count();
        assert_eq!(provider.call_count(), 0);
    }

    #[test]
    fn test_mock_provider_error() {
        let mut provider = MockProvider::default();
        provider.add_error("bad payload");

        let result = provider.complete("", "a bad payload");
        assert!(matches!(result.unwrap_err(), LlmError::Other(_)));
    }

    #[test]
    fn test_mock_provider_clone_shares_state() {
        let provider1 = MockProvider::new("test");
        let provider2 = provider1.clone();

        provider1.complete("", "test").unwrap();
        assert_eq!(provider1.call_count(), 1);
        assert_eq!(provider2.call_count(), 1);
        assert_eq!(provider2.max_in_flight(), 1);
    }

    #[test]
    fn test_retryable_classification() {
        assert!(LlmError::Communication("reset".into()).is_retryable());
        assert!(LlmError::RateLimitExceeded.is_retryable());
        assert!(LlmError::InvalidResponse("no choices".into()).is_retryable());
        assert!(!LlmError::Authentication("bad key".into()).is_retryable());
        assert!(!LlmError::ModelNotAvailable("gpt".into()).is_retryable());
    }
}
