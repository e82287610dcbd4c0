//! Retrying generator: wraps any [`SpeechGenerator`] and retries transient
//! failures.
//!
//! Only errors for which [`GenerationError::is_retryable`] holds are retried
//! (timeouts, connection errors, 5xx).  Anything else is returned on the
//! first attempt so a missing lesson does not cost several round trips.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::GenerationConfig;
use crate::generation::client::{
    GenerationError, GenerationRequest, GenerationResponse, SpeechGenerator,
};

// ---------------------------------------------------------------------------
// RetryingGenerator
// ---------------------------------------------------------------------------

/// # Example
/// ```rust
/// use lesson_narration::config::GenerationConfig;
/// use lesson_narration::generation::{ApiGenerator, RetryingGenerator};
///
/// let config = GenerationConfig::default();
/// let generator = RetryingGenerator::from_config(ApiGenerator::from_config(&config), &config);
/// assert_eq!(generator.max_attempts(), 2);
/// ```
pub struct RetryingGenerator<G: SpeechGenerator> {
    inner: G,
    max_attempts: u32,
    backoff: Duration,
}

impl<G: SpeechGenerator> RetryingGenerator<G> {
    /// Wrap `inner`; `max_attempts` of 0 is treated as 1.
    pub fn new(inner: G, max_attempts: u32, backoff: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(inner: G, config: &GenerationConfig) -> Self {
        Self::new(
            inner,
            config.max_attempts,
            Duration::from_millis(config.retry_backoff_ms),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Return a reference to the wrapped generator.
    pub fn inner(&self) -> &G {
        &self.inner
    }
}

#[async_trait]
impl<G: SpeechGenerator> SpeechGenerator for RetryingGenerator<G> {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        let mut attempt = 1;
        loop {
            match self.inner.generate(request).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    log::warn!(
                        "generation: attempt {attempt}/{} for lesson {} failed ({err}); retrying",
                        self.max_attempts,
                        request.lesson_id
                    );
                    attempt += 1;
                    tokio::time::sleep(self.backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
