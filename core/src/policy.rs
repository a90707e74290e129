//! Timeout and retry policies.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Error;

/// Two independent timers.
///
/// `response` bounds the wait for the response head; `deadline` bounds the
/// whole attempt, redirects and body included. Both restart on retry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timeout {
    pub response: Option<Duration>,
    pub deadline: Option<Duration>,
}

impl Timeout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn response(mut self, after: Duration) -> Self {
        self.response = Some(after);
        self
    }

    pub fn deadline(mut self, after: Duration) -> Self {
        self.deadline = Some(after);
        self
    }
}

/// A bare duration is a deadline.
impl From<Duration> for Timeout {
    fn from(after: Duration) -> Self {
        Timeout::new().deadline(after)
    }
}

/// Called before each re-dispatch with the failure and the 1-based retry number.
pub type RetryCallback = Arc<dyn Fn(&Error, u32) + Send + Sync>;

#[derive(Clone, Default)]
pub struct RetryPolicy {
    pub count: u32,
    pub callback: Option<RetryCallback>,
}

impl RetryPolicy {
    /// Whether a failure on retry number `attempt` (0 = first dispatch) may be retried.
    pub(crate) fn allows(&self, err: &Error, attempt: u32) -> bool {
        err.is_retryable() && attempt < self.count
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("count", &self.count)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}
