//! Bounded, sequential retries without delay.

use std::future::Future;

/// `limit` counts attempts, not retries: a limit of 3 means at most 3 calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    limit: u32,
}

/// The operation failed on every attempt.
#[derive(Debug, Clone)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

impl RetryPolicy {
    pub fn new(limit: u32) -> Self {
        Self { limit: limit.max(1) }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Runs `operation` until it succeeds or the limit is reached. The closure
    /// receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, RetryExhausted<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(last_error) if attempt >= self.limit => {
                    return Err(RetryExhausted {
                        attempts: attempt,
                        last_error,
                    });
                }
                Err(_) => {}
            }
        }
    }
}
