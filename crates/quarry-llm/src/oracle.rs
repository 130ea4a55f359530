//! Extraction oracle client
//!
//! Wraps a blocking provider with retry, backoff and typed reply parsing.
//! Transport failures are retried; an unparseable body is returned once as
//! [`OracleOutcome::ParseFailure`] without retrying.

use crate::json::parse_content;
use crate::retry::RetryPolicy;
use crate::LlmError;
use quarry_domain::traits::LlmProvider;
use quarry_domain::{Completion, TokenUsage};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Raised when every attempt failed at the transport level
#[derive(Error, Debug)]
#[error("Oracle call failed after {attempts} attempt(s): {last_error}")]
pub struct OracleCallFailure {
    /// Attempts made before giving up
    pub attempts: u32,
    /// Error from the final attempt
    pub last_error: LlmError,
}

/// Typed view of an oracle reply
///
/// Each call site (block extraction, boundary merge, header location)
/// defines its own response type and validates the JSON here, at the
/// client boundary.
pub trait OracleResponse: Sized {
    /// Convert the parsed JSON body; `Err` carries the reason it was rejected
    fn from_json(value: Value) -> Result<Self, String>;
}

impl OracleResponse for Value {
    fn from_json(value: Value) -> Result<Self, String> {
        Ok(value)
    }
}

/// Parsed reply or the soft parse-failure sentinel
#[derive(Debug, Clone, PartialEq)]
pub enum OracleOutcome<T> {
    /// Body parsed into the expected shape
    Parsed(T),
    /// Body was not valid structured output; not retried
    ParseFailure {
        /// Raw text content as received
        raw: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Result of one successful transport exchange
#[derive(Debug, Clone, PartialEq)]
pub struct OracleReply<T> {
    /// Parsed body or parse failure
    pub outcome: OracleOutcome<T>,
    /// Tokens reported for the successful attempt
    pub usage: TokenUsage,
    /// Attempts it took, including the successful one
    pub attempts: u32,
}

impl<T> OracleReply<T> {
    /// The parsed body, if any
    pub fn parsed(self) -> Option<T> {
        match self.outcome {
            OracleOutcome::Parsed(value) => Some(value),
            OracleOutcome::ParseFailure { .. } => None,
        }
    }

    /// Whether the body failed to parse
    pub fn is_parse_failure(&self) -> bool {
        matches!(self.outcome, OracleOutcome::ParseFailure { .. })
    }
}

/// Retrying client for the extraction oracle
pub struct OracleClient<P> {
    provider: Arc<P>,
    policy: RetryPolicy,
}

impl<P> Clone for OracleClient<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            policy: self.policy,
        }
    }
}

impl<P> OracleClient<P>
where
    P: LlmProvider<Error = LlmError> + Send + Sync + 'static,
{
    /// Create a client owning `provider`
    pub fn new(provider: P, policy: RetryPolicy) -> Self {
        Self::from_arc(Arc::new(provider), policy)
    }

    /// Create a client sharing `provider`
    pub fn from_arc(provider: Arc<P>, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    /// Retry policy in use
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Underlying provider
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Call the oracle and return the untyped JSON body
    pub async fn infer(
        &self,
        system: &str,
        user: &str,
    ) -> Result<OracleReply<Value>, OracleCallFailure> {
        self.infer_as::<Value>(system, user).await
    }

    /// Call the oracle and convert the body into `T`
    pub async fn infer_as<T: OracleResponse>(
        &self,
        system: &str,
        user: &str,
    ) -> Result<OracleReply<T>, OracleCallFailure> {
        let (completion, attempts) = self.call_with_retry(system, user).await?;

        let outcome = match parse_content(&completion.content).and_then(T::from_json) {
            Ok(value) => OracleOutcome::Parsed(value),
            Err(reason) => {
                warn!(
                    "Oracle reply from {} could not be parsed: {}",
                    self.provider.model_name(),
                    reason
                );
                OracleOutcome::ParseFailure {
                    raw: completion.content,
                    reason,
                }
            }
        };

        Ok(OracleReply {
            outcome,
            usage: completion.usage,
            attempts,
        })
    }

    async fn call_with_retry(
        &self,
        system: &str,
        user: &str,
    ) -> Result<(Completion, u32), OracleCallFailure> {
        let max_attempts = self.policy.attempts();
        let mut last_error = None;

        for attempt in 0..max_attempts {
            match self.call_once(system, user).await {
                Ok(completion) => {
                    debug!(
                        "Oracle call succeeded on attempt {} ({} prompt / {} completion tokens)",
                        attempt + 1,
                        completion.usage.prompt_tokens,
                        completion.usage.completion_tokens
                    );
                    return Ok((completion, attempt + 1));
                }
                Err(e) if !e.is_retryable() => {
                    warn!("Oracle call failed with non-retryable error: {}", e);
                    return Err(OracleCallFailure {
                        attempts: attempt + 1,
                        last_error: e,
                    });
                }
                Err(e) => {
                    if attempt + 1 < max_attempts {
                        let wait = self.policy.backoff(attempt);
                        warn!(
                            "Oracle attempt {}/{} failed: {}. Retrying in {:.2}s",
                            attempt + 1,
                            max_attempts,
                            e,
                            wait.as_secs_f64()
                        );
                        tokio::time::sleep(wait).await;
                    } else {
                        warn!("Oracle attempt {}/{} failed: {}", attempt + 1, max_attempts, e);
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(OracleCallFailure {
            attempts: max_attempts,
            last_error: last_error
                .unwrap_or_else(|| LlmError::Other("No attempts were made".to_string())),
        })
    }

    /// Run one provider call on the blocking pool
    async fn call_once(&self, system: &str, user: &str) -> Result<Completion, LlmError> {
        let provider = Arc::clone(&self.provider);
        let system = system.to_string();
        let user = user.to_string();

        // Call in a blocking context since LlmProvider is not async
        tokio::task::spawn_blocking(move || provider.complete(&system, &user))
            .await
            .map_err(|e| LlmError::Other(format!("Task join error: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockProvider;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::Instant;

    struct Names(Vec<String>);

    impl OracleResponse for Names {
        fn from_json(value: Value) -> Result<Self, String> {
            let items = value
                .get("names")
                .and_then(Value::as_array)
                .ok_or_else(|| "missing 'names' array".to_string())?;
            Ok(Names(
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            ))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fails_twice_then_succeeds() {
        let provider = MockProvider::new(r#"{"ok": true}"#);
        provider.push_failure("connection reset");
        provider.push_failure("timed out");
        let client = OracleClient::new(provider.clone(), RetryPolicy::default());

        let started = Instant::now();
        let reply = client.infer("sys", "payload").await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(reply.attempts, 3);
        assert_eq!(provider.call_count(), 3);
        assert_eq!(reply.parsed(), Some(json!({"ok": true})));
        // 2^0 + 2^1 seconds of backoff plus at most 1s jitter each
        assert!(elapsed >= Duration::from_secs(3), "elapsed {:?}", elapsed);
        assert!(elapsed <= Duration::from_secs(5), "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_raises_after_bound() {
        let provider = MockProvider::default();
        for _ in 0..5 {
            provider.push_failure("unreachable");
        }
        let client = OracleClient::new(provider.clone(), RetryPolicy::default());

        let failure = client.infer("sys", "payload").await.unwrap_err();
        assert_eq!(failure.attempts, 3);
        assert_eq!(provider.call_count(), 3);
        assert!(matches!(failure.last_error, LlmError::Communication(_)));
        assert!(failure.to_string().contains("3 attempt(s)"));
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        struct Unauthorized;

        impl LlmProvider for Unauthorized {
            type Error = LlmError;

            fn complete(&self, _system: &str, _user: &str) -> Result<Completion, LlmError> {
                Err(LlmError::Authentication("invalid key".to_string()))
            }

            fn model_name(&self) -> &str {
                "unauthorized"
            }
        }

        let client = OracleClient::new(Unauthorized, RetryPolicy::default());
        let failure = client.infer("sys", "payload").await.unwrap_err();
        assert_eq!(failure.attempts, 1);
    }

    #[tokio::test]
    async fn test_parse_failure_is_not_retried() {
        let provider = MockProvider::new("I could not find any products.");
        let client = OracleClient::new(provider.clone(), RetryPolicy::immediate(3));

        let reply = client.infer("sys", "payload").await.unwrap();
        assert_eq!(provider.call_count(), 1);
        assert!(reply.is_parse_failure());
        assert_eq!(reply.usage, TokenUsage::new(10, 5));
        match reply.outcome {
            OracleOutcome::ParseFailure { raw, .. } => {
                assert_eq!(raw, "I could not find any products.")
            }
            OracleOutcome::Parsed(_) => panic!("expected parse failure"),
        }
    }

    #[tokio::test]
    async fn test_typed_reply_and_shape_mismatch() {
        let mut provider = MockProvider::default();
        provider.add_response("good", "```json\n{\"names\": [\"a\", \"b\"]}\n```");
        provider.add_response("bad", r#"{"products": []}"#);
        let client = OracleClient::new(provider, RetryPolicy::immediate(1));

        let good = client.infer_as::<Names>("sys", "good").await.unwrap();
        assert_eq!(good.parsed().map(|n| n.0), Some(vec!["a".to_string(), "b".to_string()]));

        let bad = client.infer_as::<Names>("sys", "bad").await.unwrap();
        match bad.outcome {
            OracleOutcome::ParseFailure { reason, .. } => assert!(reason.contains("names")),
            OracleOutcome::Parsed(_) => panic!("expected parse failure"),
        }
    }
}
