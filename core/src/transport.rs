//! The I/O boundary.
//!
//! # Design
//! The core never opens sockets. A host hands it a `Transport`, which
//! executes one `HttpRequest` and returns the response head together with a
//! stream of body chunks. Reading the body through a stream is what lets the
//! dispatcher report download progress, enforce a response size limit and
//! run the deadline timer over the body as well as the head.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt};

use crate::error::TransportError;
use crate::http::{HeaderMap, HttpRequest};

pub type BodyStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Executes requests on behalf of the core.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and resolve once the response head is available.
    ///
    /// Redirects must not be followed; the core handles them.
    async fn send(&self, request: HttpRequest) -> Result<TransportResponse, TransportError>;
}

pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: BodyStream,
}

impl TransportResponse {
    /// A response whose body is already fully buffered.
    pub fn new(status: u16, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        let chunks = if body.is_empty() { Vec::new() } else { vec![Ok(body)] };
        Self::streaming(status, headers, stream::iter(chunks).boxed())
    }

    pub fn streaming(status: u16, headers: HeaderMap, body: BodyStream) -> Self {
        Self { status, headers, body }
    }
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}
