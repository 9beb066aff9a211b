use std::time::Duration;
use thiserror::Error;

/// Failure returned by a remote service call.
///
/// `retry_after` is populated from the transport (e.g. the HTTP `Retry-After`
/// header) so that retry logic never has to look at responses itself.
#[derive(Error, Debug, Clone)]
#[error("{message} (status {status})")]
pub struct ApiError {
    pub status: u16,
    pub message: String,
    pub retry_after: Option<Duration>,
}

impl ApiError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self { status, message: message.into(), retry_after: None }
    }

    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }
}

/// Errors that may carry a server-suggested delay before the next attempt.
pub trait RetryAfter {
    fn retry_after(&self) -> Option<Duration>;
}

impl RetryAfter for ApiError {
    fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }
}

impl RetryAfter for anyhow::Error {
    fn retry_after(&self) -> Option<Duration> {
        self.chain()
            .find_map(|e| e.downcast_ref::<ApiError>())
            .and_then(|e| e.retry_after)
    }
}
