//! Completed responses and body decoding.
//!
//! # Design
//! A `Response` is assembled once the whole body has been read and is never
//! mutated afterwards. The body is decoded eagerly by content type, or by a
//! caller-supplied parser, so both completion paths hand out the same
//! already-decoded value.

use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::encode;
use crate::error::{BoxError, Error, Result};
use crate::http::{HeaderMap, HttpMethod};
use crate::media;

/// Custom decoder installed with `Request::parse_with`.
pub type Parser = Arc<dyn Fn(&HeaderMap, &[u8]) -> Result<ResponseBody, BoxError> + Send + Sync>;

/// Decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Empty,
    /// JSON documents and urlencoded forms.
    Json(Value),
    Text(String),
    Binary(Bytes),
}

impl ResponseBody {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            ResponseBody::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Status families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Informational,
    Success,
    Redirect,
    ClientError,
    ServerError,
}

#[derive(Debug, Clone)]
pub struct Response {
    pub method: HttpMethod,
    /// Final URL after redirects.
    pub url: String,
    pub status: u16,
    /// Verdict of the ok-predicate.
    pub ok: bool,
    pub headers: HeaderMap,
    pub body: ResponseBody,
    /// Body as text for textual content types.
    pub text: Option<String>,
    pub raw: Bytes,
    /// Every URL visited through redirects, in order.
    pub redirects: Vec<String>,
    /// Media type without parameters.
    pub content_type: String,
    pub charset: Option<String>,
}

pub(crate) struct ResponseParts {
    pub method: HttpMethod,
    pub url: String,
    pub status: u16,
    pub headers: HeaderMap,
    pub raw: Bytes,
    pub redirects: Vec<String>,
}

impl Response {
    pub(crate) fn decode(parts: ResponseParts, parser: Option<&Parser>) -> Result<Response> {
        let header = parts.headers.get("content-type").unwrap_or_default().to_string();
        let content_type = media::essence(&header);
        let charset = media::charset(&header);

        let text = if media::is_text(&header) || media::is_json(&header) || media::is_form(&header) {
            Some(String::from_utf8_lossy(&parts.raw).into_owned())
        } else {
            None
        };

        let body = match parser {
            Some(parser) => parser(&parts.headers, &parts.raw[..]).map_err(|e| Error::Parse {
                message: e.to_string(),
                text: text.clone(),
            })?,
            None if parts.raw.is_empty() => ResponseBody::Empty,
            None if media::is_json(&header) => match serde_json::from_slice(&parts.raw) {
                Ok(value) => ResponseBody::Json(value),
                Err(e) => {
                    return Err(Error::Parse {
                        message: e.to_string(),
                        text,
                    })
                }
            },
            None if media::is_form(&header) => ResponseBody::Json(encode::parse_form(&parts.raw)),
            None => match &text {
                Some(text) => ResponseBody::Text(text.clone()),
                None => ResponseBody::Binary(parts.raw.clone()),
            },
        };

        Ok(Response {
            method: parts.method,
            url: parts.url,
            status: parts.status,
            ok: false,
            headers: parts.headers,
            body,
            text,
            raw: parts.raw,
            redirects: parts.redirects,
            content_type,
            charset,
        })
    }

    /// First value of a header, case-insensitive.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Every value of a header, e.g. `Set-Cookie`.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.headers.get_all(name).collect()
    }

    /// Deserialize the body. Textual bodies are parsed as JSON on demand.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let parsed = match &self.body {
            ResponseBody::Json(value) => serde_json::from_value(value.clone()),
            _ => serde_json::from_slice(&self.raw),
        };
        parsed.map_err(|e| Error::Parse {
            message: e.to_string(),
            text: self.text.clone(),
        })
    }

    pub fn status_class(&self) -> StatusClass {
        match self.status {
            100..=199 => StatusClass::Informational,
            200..=299 => StatusClass::Success,
            300..=399 => StatusClass::Redirect,
            400..=499 => StatusClass::ClientError,
            _ => StatusClass::ServerError,
        }
    }

    pub fn is_info(&self) -> bool {
        self.status_class() == StatusClass::Informational
    }

    pub fn is_redirect(&self) -> bool {
        self.status_class() == StatusClass::Redirect
    }

    pub fn is_client_error(&self) -> bool {
        self.status_class() == StatusClass::ClientError
    }

    pub fn is_server_error(&self) -> bool {
        self.status_class() == StatusClass::ServerError
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    pub fn is_forbidden(&self) -> bool {
        self.status == 403
    }

    /// The error view of this response; `None` when it is ok.
    pub fn error(&self) -> Option<Error> {
        (!self.ok).then(|| Error::HttpStatus {
            response: Box::new(self.clone()),
        })
    }
}

/// Default ok-predicate: 2xx and 3xx.
pub(crate) fn default_ok(response: &Response) -> bool {
    (200..400).contains(&response.status)
}
