//! Error types for request dispatch.
//!
//! # Design
//! One enum covers every way a request can end badly. `kind()` folds the
//! variants into the coarse taxonomy callers branch on, and
//! `is_retryable()` decides which of them the retry loop may re-dispatch:
//! only connection-level failures and timeouts. Errors are `Clone` because a
//! dispatch outcome is memoized and handed to every completion consumer.

use std::fmt;
use std::time::Duration;

use crate::response::Response;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error returned by user-supplied serializers and parsers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Which timer fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// No response head arrived in time.
    Response,
    /// The whole attempt, body included, took too long.
    Deadline,
}

impl fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutKind::Response => f.write_str("response"),
            TimeoutKind::Deadline => f.write_str("deadline"),
        }
    }
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Timeout(TimeoutKind),
    Abort,
    HttpStatus,
    Parse,
    Redirect,
    ResponseSize,
    Request,
    Io,
}

/// Failure reported by a `Transport` implementation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("tls failure: {0}")]
    Tls(String),

    #[error("i/o failure: {0}")]
    Io(String),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The transport could not complete the exchange.
    #[error("network error: {0}")]
    Network(#[from] TransportError),

    #[error("{kind} timeout of {}ms exceeded", .after.as_millis())]
    Timeout { kind: TimeoutKind, after: Duration },

    #[error("request aborted")]
    Aborted,

    /// The ok-predicate rejected the response. The full response is kept.
    #[error("cannot {} {} ({})", .response.method, .response.url, .response.status)]
    HttpStatus { response: Box<Response> },

    /// The body could not be decoded for its content type.
    #[error("failed to parse response body: {message}")]
    Parse {
        message: String,
        text: Option<String>,
    },

    #[error("exceeded maximum of {max} redirects")]
    TooManyRedirects { max: u32, redirects: Vec<String> },

    #[error("maximum response size of {limit} bytes reached")]
    ResponseTooLarge { limit: u64 },

    /// The request could not be built: bad URL, serializer failure,
    /// unreadable attachment, missing transport.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("write failed: {0}")]
    Io(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Network(_) => ErrorKind::Network,
            Error::Timeout { kind, .. } => ErrorKind::Timeout(*kind),
            Error::Aborted => ErrorKind::Abort,
            Error::HttpStatus { .. } => ErrorKind::HttpStatus,
            Error::Parse { .. } => ErrorKind::Parse,
            Error::TooManyRedirects { .. } => ErrorKind::Redirect,
            Error::ResponseTooLarge { .. } => ErrorKind::ResponseSize,
            Error::InvalidRequest(_) => ErrorKind::Request,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// Network failures and timeouts may be re-dispatched.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Timeout { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, Error::Aborted)
    }

    /// Status code of the rejected response, if there was one.
    pub fn status(&self) -> Option<u16> {
        self.response().map(|response| response.status)
    }

    pub fn response(&self) -> Option<&Response> {
        match self {
            Error::HttpStatus { response } => Some(response),
            _ => None,
        }
    }

    pub(crate) fn timeout(kind: TimeoutKind, after: Duration) -> Self {
        Error::Timeout { kind, after }
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::InvalidRequest(format!("invalid url: {e}"))
    }
}
