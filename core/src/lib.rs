//! Fluent HTTP requests over a pluggable transport.
//!
//! # Overview
//! A [`Request`] is configured with chained calls (`set`, `query`, `send`,
//! `timeout`, `retry`...) and performs no I/O until it is completed, either
//! with a callback through [`Request::end`] or by awaiting it. An [`Agent`]
//! carries defaults, plugins and a cookie jar across many requests.
//!
//! # Design
//! - The network belongs to the host. Every wire exchange goes through the
//!   [`Transport`] trait, which receives a plain [`HttpRequest`] and answers
//!   with a status, headers and a body stream. The crate owns everything
//!   around that call: encoding, timers, retries, redirects, cookies and
//!   body decoding.
//! - A request dispatches at most once. Clones and repeated completions
//!   share one memoized outcome.
//! - Errors are classified by [`ErrorKind`]; only network failures and
//!   timeouts are retried.

pub mod agent;
pub mod auth;
pub mod body;
pub mod connect;
pub mod cookie;
mod dispatch;
pub mod encode;
pub mod error;
pub mod events;
pub mod http;
pub mod media;
pub mod multipart;
pub mod plugin;
pub mod policy;
pub mod progress;
pub mod query;
pub mod request;
pub mod response;
pub mod serializer;
pub mod tls;
pub mod transport;

use std::sync::Arc;

pub use agent::Agent;
pub use auth::Auth;
pub use connect::{ConnectOverride, ConnectTarget};
pub use cookie::{Cookie, CookieJar};
pub use error::{BoxError, Error, ErrorKind, Result, TimeoutKind, TransportError};
pub use events::RedirectEvent;
pub use http::{HeaderMap, HttpMethod, HttpRequest};
pub use multipart::AttachOptions;
pub use plugin::Plugin;
pub use policy::{RetryPolicy, Timeout};
pub use progress::{Direction, ProgressEvent};
pub use request::{Request, State};
pub use response::{Response, ResponseBody, StatusClass};
pub use transport::{BodyStream, Transport, TransportResponse};

/// A standalone request sent through `transport`.
pub fn request(transport: Arc<dyn Transport>, method: HttpMethod, url: impl Into<String>) -> Request {
    Request::new(method, url).transport(transport)
}

pub fn get(transport: Arc<dyn Transport>, url: impl Into<String>) -> Request {
    request(transport, HttpMethod::Get, url)
}

pub fn head(transport: Arc<dyn Transport>, url: impl Into<String>) -> Request {
    request(transport, HttpMethod::Head, url)
}

pub fn post(transport: Arc<dyn Transport>, url: impl Into<String>) -> Request {
    request(transport, HttpMethod::Post, url)
}

pub fn put(transport: Arc<dyn Transport>, url: impl Into<String>) -> Request {
    request(transport, HttpMethod::Put, url)
}

pub fn patch(transport: Arc<dyn Transport>, url: impl Into<String>) -> Request {
    request(transport, HttpMethod::Patch, url)
}

pub fn delete(transport: Arc<dyn Transport>, url: impl Into<String>) -> Request {
    request(transport, HttpMethod::Delete, url)
}

/// Alias of [`delete`].
pub fn del(transport: Arc<dyn Transport>, url: impl Into<String>) -> Request {
    delete(transport, url)
}

pub fn options(transport: Arc<dyn Transport>, url: impl Into<String>) -> Request {
    request(transport, HttpMethod::Options, url)
}
