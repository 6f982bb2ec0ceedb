//! Prompt-in, text-out completion client.
//!
//! `CompletionClient` is the only path by which the simulation pipeline talks
//! to a model. It sends one user message at a given temperature and returns
//! the raw text of the first choice. It never retries: every failure is
//! surfaced as an [`LlmError`] and the caller's retry stage decides what to
//! do with it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;

use super::openai::{GenerationRequest, LlmProvider, Message};
use crate::error::LlmError;
use crate::metrics::MetricsCollector;

/// Default per-call timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Completion client wrapping an [`LlmProvider`].
#[derive(Clone)]
pub struct CompletionClient {
    provider: Arc<dyn LlmProvider>,
    model: String,
    request_timeout: Duration,
    limiter: Option<Arc<Semaphore>>,
    metrics: MetricsCollector,
}

impl std::fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClient")
            .field("model", &self.model)
            .field("request_timeout", &self.request_timeout)
            .field(
                "available_permits",
                &self.limiter.as_ref().map(|l| l.available_permits()),
            )
            .finish_non_exhaustive()
    }
}

impl CompletionClient {
    /// Creates a client that sends every request to `model`.
    ///
    /// An empty model name defers to the provider's default.
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            limiter: None,
            metrics: MetricsCollector::new(),
        }
    }

    /// Sets the per-call timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Caps the number of in-flight provider calls. Zero means unlimited.
    pub fn with_max_concurrent_requests(mut self, max: usize) -> Self {
        self.limiter = if max == 0 {
            None
        } else {
            Some(Arc::new(Semaphore::new(max)))
        };
        self
    }

    /// Model name sent with every request.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Submits `prompt` as a single user message and returns the raw text of
    /// the first choice, trimmed.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Timeout` if the call exceeds the configured timeout,
    /// `LlmError::EmptyResponse` if the provider returned no text, and any
    /// provider error unchanged.
    pub async fn complete(&self, prompt: &str, temperature: f64) -> Result<String, LlmError> {
        let _permit = match &self.limiter {
            Some(limiter) => Some(
                limiter
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|e| LlmError::Unavailable(e.to_string()))?,
            ),
            None => None,
        };

        let request = GenerationRequest::new(self.model.clone(), vec![Message::user(prompt)])
            .with_temperature(temperature);

        let started = Instant::now();
        let outcome =
            tokio::time::timeout(self.request_timeout, self.provider.generate(request)).await;

        let result = match outcome {
            Err(_) => Err(LlmError::Timeout {
                seconds: self.request_timeout.as_secs(),
            }),
            Ok(Err(e)) => Err(e),
            Ok(Ok(response)) => match response.first_content().map(str::trim) {
                Some(text) if !text.is_empty() => Ok(text.to_string()),
                _ => Err(LlmError::EmptyResponse),
            },
        };

        let status = match &result {
            Ok(_) => "ok",
            Err(LlmError::Timeout { .. }) => "timeout",
            Err(_) => "error",
        };
        self.metrics.record_completion(status, started.elapsed());

        if let Err(ref e) = result {
            tracing::debug!(error = %e, model = %self.model, "Completion request failed");
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Choice, GenerationResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Provider that echoes a fixed reply and remembers the last request.
    struct RecordingProvider {
        reply: String,
        last_request: Mutex<Option<GenerationRequest>>,
    }

    impl RecordingProvider {
        fn new(reply: impl Into<String>) -> Self {
            Self {
                reply: reply.into(),
                last_request: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for RecordingProvider {
        async fn generate(
            &self,
            request: GenerationRequest,
        ) -> Result<GenerationResponse, LlmError> {
            *self.last_request.lock().expect("lock not poisoned") = Some(request);
            Ok(GenerationResponse {
                id: "mock-id".to_string(),
                model: "mock-model".to_string(),
                choices: vec![Choice {
                    index: 0,
                    message: Message::assistant(self.reply.clone()),
                    finish_reason: Some("stop".to_string()),
                }],
                usage: None,
            })
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl LlmProvider for SlowProvider {
        async fn generate(
            &self,
            _request: GenerationRequest,
        ) -> Result<GenerationResponse, LlmError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(LlmError::EmptyResponse)
        }
    }

    /// Tracks the highest number of concurrent `generate` calls.
    struct ConcurrencyProbe {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl LlmProvider for ConcurrencyProbe {
        async fn generate(
            &self,
            _request: GenerationRequest,
        ) -> Result<GenerationResponse, LlmError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(GenerationResponse {
                id: String::new(),
                model: String::new(),
                choices: vec![Choice {
                    index: 0,
                    message: Message::assistant("ok"),
                    finish_reason: None,
                }],
                usage: None,
            })
        }
    }

    #[tokio::test]
    async fn test_complete_sends_prompt_and_temperature() {
        let provider = Arc::new(RecordingProvider::new("  {\"a\": 1}\n"));
        let client = CompletionClient::new(provider.clone(), "gpt-4o");

        let text = client
            .complete("Describe a persona", 0.7)
            .await
            .expect("completion should succeed");
        assert_eq!(text, "{\"a\": 1}");

        let request = provider
            .last_request
            .lock()
            .expect("lock not poisoned")
            .clone()
            .expect("request recorded");
        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.temperature, Some(0.7));
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, "user");
        assert_eq!(request.messages[0].content, "Describe a persona");
    }

    #[tokio::test]
    async fn test_blank_reply_is_empty_response() {
        let client = CompletionClient::new(Arc::new(RecordingProvider::new("   ")), "gpt-4o");
        let result = client.complete("prompt", 0.2).await;
        assert!(matches!(result, Err(LlmError::EmptyResponse)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_reported() {
        let client = CompletionClient::new(Arc::new(SlowProvider), "gpt-4o")
            .with_request_timeout(Duration::from_secs(5));

        let result = client.complete("prompt", 0.2).await;
        assert!(matches!(result, Err(LlmError::Timeout { seconds: 5 })));
    }

    #[tokio::test]
    async fn test_concurrency_limit() {
        let probe = Arc::new(ConcurrencyProbe {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let client = CompletionClient::new(probe.clone(), "gpt-4o").with_max_concurrent_requests(2);

        let calls: Vec<_> = (0..8).map(|_| client.complete("prompt", 0.5)).collect();
        let results = futures::future::join_all(calls).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert!(probe.peak.load(Ordering::SeqCst) <= 2);
    }
}
