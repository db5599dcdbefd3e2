//! Rate-limited request execution with throttle retry.

use crate::{ProviderResponse, RateLimitHeaders, RateLimitState, RateLimiter};
use qualys_error::{ApiError, ApiErrorKind, HttpError, HttpErrorKind, QualysError, QualysResult};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio_retry2::strategy::FixedInterval;
use tokio_retry2::{Retry, RetryError};
use tracing::{instrument, warn};

/// A successful response together with the post-call rate limit state.
#[derive(Debug)]
pub struct Executed<R> {
    /// The raw response
    pub response: R,
    /// Shared state after this response was folded in
    pub rate_limit_state: RateLimitState,
    /// Attempts it took, including the successful one
    pub attempts: u32,
}

/// Wraps request-issuing operations with admission control, slot tracking
/// and retry on the provider's throttle signal.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    limiter: RateLimiter,
}

impl RequestExecutor {
    /// Create an executor that routes every call through `limiter`.
    pub fn new(limiter: RateLimiter) -> Self {
        Self { limiter }
    }

    /// The limiter shared by every call made through this executor.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Execute an operation under the rate limiter.
    ///
    /// For each attempt:
    /// 1. Waits for admission (advised pause or reserve exhaustion) and a slot
    /// 2. Runs the operation
    /// 3. Releases the slot and folds the response headers into the state
    /// 4. Retries after the cooldown if the status is the throttle signal
    ///
    /// Any other status >= 400 fails immediately, as do transport errors.
    /// A throttle signal on the last allowed attempt becomes
    /// [`ApiErrorKind::RetriesExhausted`].
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let executed = executor
    ///     .execute("/qps/rest/portal/version", || http.get(&url).send())
    ///     .await?;
    /// println!("{} requests left", executed.rate_limit_state.limit_remaining);
    /// ```
    #[instrument(skip(self, operation))]
    pub async fn execute<R, E, F, Fut>(
        &self,
        endpoint: &str,
        operation: F,
    ) -> QualysResult<Executed<R>>
    where
        R: ProviderResponse,
        E: fmt::Display,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let config = *self.limiter.config();
        let strategy = FixedInterval::from_millis(config.cooldown_period).take(config.max_retries());

        let attempts = AtomicU32::new(0);
        let attempts = &attempts;
        let operation = &operation;
        let this = self;

        Retry::spawn(strategy, move || async move {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
            this.attempt(endpoint, attempt, operation).await
        })
        .await
    }

    async fn attempt<R, E, F, Fut>(
        &self,
        endpoint: &str,
        attempt: u32,
        operation: &F,
    ) -> Result<Executed<R>, RetryError<QualysError>>
    where
        R: ProviderResponse,
        E: fmt::Display,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let config = self.limiter.config();
        let observer = self.limiter.observer();

        let guard = self
            .limiter
            .acquire(endpoint)
            .await
            .map_err(|e| RetryError::Permanent(e.into()))?;

        let response = match operation().await {
            Ok(response) => response,
            Err(e) => {
                drop(guard);
                warn!(endpoint, attempt, error = %e, "Transport failure");
                return Err(RetryError::Permanent(
                    HttpError::new(HttpErrorKind::Send {
                        endpoint: endpoint.to_string(),
                        reason: e.to_string(),
                    })
                    .into(),
                ));
            }
        };

        let headers = RateLimitHeaders::from_headers(response.headers());
        let state = guard
            .complete(headers)
            .await
            .map_err(|e| RetryError::Permanent(e.into()))?;

        let status = response.status();
        observer.on_response(endpoint, status, &state);

        if status == config.response_code {
            let status_text = response.status_text();
            if attempt < config.max_attempts {
                observer.on_retry(endpoint, attempt, config.cooldown());
                return Err(RetryError::Transient {
                    err: ApiError::new(ApiErrorKind::Throttled {
                        status,
                        status_text,
                        endpoint: endpoint.to_string(),
                    })
                    .into(),
                    retry_after: None,
                });
            }

            warn!(endpoint, attempts = attempt, status, "Throttle retries exhausted");
            return Err(RetryError::Permanent(
                ApiError::new(ApiErrorKind::RetriesExhausted {
                    status,
                    status_text,
                    endpoint: endpoint.to_string(),
                    attempts: attempt,
                })
                .into(),
            ));
        }

        if status >= 400 {
            let kind = ApiErrorKind::from_status(status, response.status_text(), endpoint);
            warn!(endpoint, status, error = %kind, "Request failed");
            return Err(RetryError::Permanent(ApiError::new(kind).into()));
        }

        Ok(Executed {
            response,
            rate_limit_state: state,
            attempts: attempt,
        })
    }
}
