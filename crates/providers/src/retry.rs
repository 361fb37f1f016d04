//! Retry wrapper: exponential backoff around any provider.
//!
//! Transient failures ([`ProviderError::is_retryable`]) are retried up to
//! `max_retries` times. Everything else is returned immediately. With a
//! cancellation token attached, a backoff wait ends as soon as the token
//! fires and the last error is returned.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use taskloom_core::Provider;
use taskloom_core::error::ProviderError;
use taskloom_core::provider::{ProviderRequest, ProviderResponse};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct RetryProvider {
    inner: Arc<dyn Provider>,
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    cancel: Option<CancellationToken>,
}

impl std::fmt::Debug for RetryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryProvider")
            .field("inner", &self.inner.name())
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

impl RetryProvider {
    /// Wrap `inner` with 3 retries, 1s base delay, 30s cap.
    pub fn new(inner: Arc<dyn Provider>) -> Self {
        Self {
            inner,
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            cancel: None,
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

    /// Stop waiting between attempts once `token` is cancelled.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Delay before retry number `attempt` (0-indexed): `base * 2^attempt`, capped.
    /// A rate-limit hint from the backend raises the delay, still within the cap.
    pub fn delay_for(&self, attempt: u32, err: &ProviderError) -> Duration {
        let exponential = self.base_delay.saturating_mul(1u32 << attempt.min(16));
        let hinted = match err {
            ProviderError::RateLimited { retry_after_secs } => {
                exponential.max(Duration::from_secs(*retry_after_secs))
            }
            _ => exponential,
        };
        hinted.min(self.max_delay)
    }
}

#[async_trait]
impl Provider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut attempt = 0;
        loop {
            match self.inner.complete(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let delay = self.delay_for(attempt, &err);
                    warn!(
                        provider = %self.inner.name(),
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient provider error, retrying"
                    );
                    match &self.cancel {
                        Some(token) => tokio::select! {
                            biased;
                            _ = token.cancelled() => {
                                debug!(provider = %self.inner.name(), "Retry backoff cancelled");
                                return Err(err);
                            }
                            _ = tokio::time::sleep(delay) => {}
                        },
                        None => tokio::time::sleep(delay).await,
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        self.inner.health_check().await
    }
}
