//! Retry utilities with exponential backoff.
//!
//! Retries live at the dispatcher boundary: [`RetryingDispatcher`] wraps any
//! [`AnalysisDispatcher`] and re-sends a request when the backend reports a
//! retryable failure. The orchestrator itself never retries.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use framesight_vision::{AnalysisDispatcher, AnalysisOutput, AnalysisRequest, VisionError, VisionResult};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,
    /// Base delay for exponential backoff (doubles each attempt).
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Operation name for logging.
    pub operation_name: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            operation_name: "operation".to_string(),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with the given operation name.
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            ..Default::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay before retry number `attempt` (0-based).
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Execute an async operation, retrying errors accepted by `should_retry`.
///
/// # Example
/// ```ignore
/// let config = RetryConfig::new("vision_request").with_max_retries(3);
/// let text = retry_async(&config, VisionError::is_retryable, || async {
///     client.analyze(request.clone()).await
/// }).await?;
/// ```
pub async fn retry_async<F, Fut, T, E, P>(
    config: &RetryConfig,
    should_retry: P,
    operation: F,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("{} succeeded after {} retries", config.operation_name, attempt);
                }
                return Ok(value);
            }
            Err(e) if attempt < config.max_retries && should_retry(&e) => {
                let delay = config.delay_for_attempt(attempt);
                attempt += 1;
                warn!(
                    "{} attempt {} failed, retrying in {:?}: {}",
                    config.operation_name, attempt, delay, e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Dispatcher that retries retryable backend errors.
pub struct RetryingDispatcher {
    inner: Arc<dyn AnalysisDispatcher>,
    config: RetryConfig,
}

impl RetryingDispatcher {
    pub fn new(inner: Arc<dyn AnalysisDispatcher>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl AnalysisDispatcher for RetryingDispatcher {
    async fn analyze(&self, request: AnalysisRequest) -> VisionResult<AnalysisOutput> {
        retry_async(&self.config, VisionError::is_retryable, || {
            self.inner.analyze(request.clone())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyDispatcher {
        calls: AtomicU32,
        failures: u32,
        error: fn() -> VisionError,
    }

    #[async_trait]
    impl AnalysisDispatcher for FlakyDispatcher {
        async fn analyze(&self, _request: AnalysisRequest) -> VisionResult<AnalysisOutput> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err((self.error)())
            } else {
                Ok(AnalysisOutput::Complete("ok".to_string()))
            }
        }
    }

    fn fast_retries(max_retries: u32) -> RetryConfig {
        RetryConfig::new("test")
            .with_max_retries(max_retries)
            .with_base_delay(Duration::from_millis(1))
    }

    #[test]
    fn test_retry_config_delay_calculation() {
        let config = RetryConfig::new("test").with_base_delay(Duration::from_millis(100));

        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(400));
    }

    #[test]
    fn test_retry_config_max_delay() {
        let config = RetryConfig::new("test")
            .with_base_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5));

        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(5));
        assert_eq!(config.delay_for_attempt(40), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_retry_async_gives_up_on_non_retryable() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = retry_async(&fast_retries(3), |_| false, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("fatal".to_string())
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retrying_dispatcher_recovers() {
        let inner = Arc::new(FlakyDispatcher {
            calls: AtomicU32::new(0),
            failures: 2,
            error: || VisionError::Overloaded("busy".into()),
        });
        let dispatcher = RetryingDispatcher::new(inner.clone(), fast_retries(2));

        let output = dispatcher
            .analyze(AnalysisRequest::new(Vec::new(), "describe"))
            .await
            .unwrap();

        assert_eq!(output.collect_text().await.unwrap(), "ok");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retrying_dispatcher_exhausts_retries() {
        let inner = Arc::new(FlakyDispatcher {
            calls: AtomicU32::new(0),
            failures: 10,
            error: || VisionError::RateLimited("slow down".into()),
        });
        let dispatcher = RetryingDispatcher::new(inner.clone(), fast_retries(1));

        let err = dispatcher
            .analyze(AnalysisRequest::new(Vec::new(), "describe"))
            .await
            .unwrap_err();

        assert!(matches!(err, VisionError::RateLimited(_)));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_retries_by_default() {
        let inner = Arc::new(FlakyDispatcher {
            calls: AtomicU32::new(0),
            failures: 1,
            error: || VisionError::Api("boom".into()),
        });
        let dispatcher = RetryingDispatcher::new(inner.clone(), RetryConfig::default());

        assert!(dispatcher
            .analyze(AnalysisRequest::new(Vec::new(), "describe"))
            .await
            .is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }
}
