//! Turns a request configuration into a response.
//!
//! # Design
//! `run` owns the lifecycle transitions and races the work against the
//! abort signal. Beneath it the work is layered so that each policy wraps
//! exactly what it governs:
//!
//! - `execute` builds the wire request once and loops over retry attempts.
//! - `attempt` puts the deadline timer around one attempt.
//! - `follow` walks the redirect chain, putting the response timer around
//!   each transport call and then streaming the final body.
//!
//! The ok-predicate runs last, after the body is decoded, so an
//! `HttpStatus` failure is never retried.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use percent_encoding::percent_decode_str;
use tracing::{debug, warn};
use url::Url;

use crate::auth::Auth;
use crate::body::Payload;
use crate::error::{Error, Result, TimeoutKind};
use crate::events::RedirectEvent;
use crate::http::{HeaderMap, HttpMethod, HttpRequest};
use crate::media;
use crate::progress::{Direction, ProgressEvent};
use crate::request::{RequestConfig, Shared, State};
use crate::response::{default_ok, Response, ResponseParts};
use crate::serializer;
use crate::transport::{BodyStream, Transport, TransportResponse};

pub(crate) async fn run(config: RequestConfig, shared: Arc<Shared>) -> Result<Response> {
    {
        let mut state = shared.state();
        if *state == State::Aborted {
            return Err(Error::Aborted);
        }
        *state = State::InFlight;
    }

    let mut abort = shared.abort_signal();
    let outcome = tokio::select! {
        outcome = execute(&config) => outcome,
        _ = async { let _ = abort.wait_for(|aborted| *aborted).await; } => Err(Error::Aborted),
    };

    let outcome = {
        let mut state = shared.state();
        if *state == State::Aborted {
            Err(Error::Aborted)
        } else {
            *state = if outcome.is_ok() { State::Complete } else { State::Error };
            outcome
        }
    };

    match &outcome {
        Ok(response) => config.listeners.response(response),
        Err(Error::Aborted) => {}
        Err(err) => config.listeners.error(err),
    }
    outcome
}

async fn execute(config: &RequestConfig) -> Result<Response> {
    if let Some(err) = &config.error {
        return Err(err.clone());
    }
    let transport = config
        .transport
        .clone()
        .ok_or_else(|| Error::InvalidRequest("no transport configured".into()))?;
    let prepared = prepare(config).await?;

    let mut retries = 0;
    loop {
        debug!(method = %prepared.method, url = %prepared.url, retries, "dispatching request");
        match attempt(config, transport.as_ref(), &prepared).await {
            Ok(mut response) => {
                response.ok = match &config.ok {
                    Some(predicate) => predicate(&response),
                    None => default_ok(&response),
                };
                return if response.ok {
                    Ok(response)
                } else {
                    Err(Error::HttpStatus {
                        response: Box::new(response),
                    })
                };
            }
            Err(err) if config.retry.allows(&err, retries) => {
                retries += 1;
                warn!(error = %err, retry = retries, max = config.retry.count, "retrying request");
                if let Some(callback) = &config.retry.callback {
                    callback(&err, retries);
                }
            }
            Err(err) => return Err(err),
        }
    }
}

async fn attempt(config: &RequestConfig, transport: &dyn Transport, prepared: &HttpRequest) -> Result<Response> {
    let exchange = follow(config, transport, prepared.clone());
    match config.timeout.deadline {
        Some(after) => tokio::time::timeout(after, exchange)
            .await
            .map_err(|_| Error::timeout(TimeoutKind::Deadline, after))?,
        None => exchange.await,
    }
}

async fn follow(config: &RequestConfig, transport: &dyn Transport, mut request: HttpRequest) -> Result<Response> {
    let mut url = Url::parse(&request.url)?;
    let mut redirects = Vec::new();

    loop {
        let outgoing = outgoing(config, &request, &url);
        // Re-sent bodies on 307/308 hops are reported once per attempt.
        let uploaded = if redirects.is_empty() {
            outgoing.body.as_ref().map_or(0, |body| body.len() as u64)
        } else {
            0
        };
        let head = send_head(config, transport, outgoing).await?;
        if uploaded > 0 {
            config
                .listeners
                .progress(&ProgressEvent::new(Direction::Upload, uploaded, Some(uploaded)));
        }
        if let Some(jar) = &config.jar {
            jar.store(&url, head.headers.get_all("set-cookie"));
        }

        if is_redirect(head.status) && config.max_redirects > 0 {
            if let Some(location) = head.headers.get("location") {
                if redirects.len() as u32 >= config.max_redirects {
                    return Err(Error::TooManyRedirects {
                        max: config.max_redirects,
                        redirects,
                    });
                }
                let next = url.join(location)?;
                debug!(status = head.status, from = %url, to = %next, "following redirect");
                config.listeners.redirect(&RedirectEvent {
                    status: head.status,
                    from: url.to_string(),
                    to: next.to_string(),
                });
                request = redirected(request, head.status, &url, &next);
                redirects.push(next.to_string());
                url = next;
                continue;
            }
        }

        let total = head
            .headers
            .get("content-length")
            .and_then(|len| len.trim().parse::<u64>().ok());
        let raw = read_body(config, head.body, total).await?;
        let parts = ResponseParts {
            method: request.method,
            url: url.to_string(),
            status: head.status,
            headers: head.headers,
            raw,
            redirects,
        };
        return Response::decode(parts, config.parser.as_ref());
    }
}

async fn send_head(config: &RequestConfig, transport: &dyn Transport, request: HttpRequest) -> Result<TransportResponse> {
    let exchange = transport.send(request);
    let head = match config.timeout.response {
        Some(after) => tokio::time::timeout(after, exchange)
            .await
            .map_err(|_| Error::timeout(TimeoutKind::Response, after))?,
        None => exchange.await,
    };
    Ok(head?)
}

async fn read_body(config: &RequestConfig, mut body: BodyStream, total: Option<u64>) -> Result<Bytes> {
    if let (Some(limit), Some(total)) = (config.max_response_size, total) {
        if total > limit {
            return Err(Error::ResponseTooLarge { limit });
        }
    }
    let mut buf = BytesMut::new();
    while let Some(chunk) = body.next().await {
        buf.extend_from_slice(&chunk?);
        let loaded = buf.len() as u64;
        if let Some(limit) = config.max_response_size {
            if loaded > limit {
                return Err(Error::ResponseTooLarge { limit });
            }
        }
        config
            .listeners
            .progress(&ProgressEvent::new(Direction::Download, loaded, total));
    }
    Ok(buf.freeze())
}

fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

/// Rewrite the request for the next hop of a redirect chain.
fn redirected(mut request: HttpRequest, status: u16, from: &Url, to: &Url) -> HttpRequest {
    let switch_to_get = (status == 303 && request.method != HttpMethod::Head)
        || (matches!(status, 301 | 302) && !request.method.is_safe());
    if switch_to_get {
        request.method = HttpMethod::Get;
        request.body = None;
        for name in ["content-type", "content-length", "transfer-encoding"] {
            request.headers.remove(name);
        }
    }
    if from.host_str() != to.host_str() {
        request.headers.remove("authorization");
        request.headers.remove("cookie");
    }
    request.headers.remove("host");
    request.url = to.to_string();
    request
}

/// Per-hop additions: agent cookies and the DNS override.
fn outgoing(config: &RequestConfig, request: &HttpRequest, url: &Url) -> HttpRequest {
    let mut outgoing = request.clone();
    outgoing.url = url.to_string();

    if let Some(cookies) = config.jar.as_ref().and_then(|jar| jar.header_for(url)) {
        let merged = match outgoing.headers.get("cookie") {
            Some(existing) => format!("{existing}; {cookies}"),
            None => cookies,
        };
        outgoing.headers.insert("Cookie", merged);
    }

    let target = config
        .connect
        .as_ref()
        .zip(url.host_str())
        .and_then(|(rules, host)| rules.resolve(host));
    if let Some(target) = target {
        outgoing.connect_to = Some(target.clone());
        if !outgoing.headers.contains("host") {
            outgoing.headers.insert("Host", host_header(url));
        }
    }
    outgoing
}

fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

/// Build the wire request shared by every attempt.
async fn prepare(config: &RequestConfig) -> Result<HttpRequest> {
    let mut url = resolve_url(config)?;
    let mut headers = config.headers.clone();

    let mut auth = config.auth.clone();
    if !url.username().is_empty() {
        let username = percent_decode_str(url.username()).decode_utf8_lossy().into_owned();
        let password = url
            .password()
            .map(|p| percent_decode_str(p).decode_utf8_lossy().into_owned())
            .unwrap_or_default();
        auth.get_or_insert(Auth::basic(username, password));
        // Only fails for cannot-be-a-base URLs, which carry no credentials.
        let _ = url.set_username("");
        let _ = url.set_password(None);
    }
    if let Some(auth) = &auth {
        headers.insert("Authorization", auth.header_value());
    }

    config.query.apply(&mut url);
    let body = encode_body(config, &mut headers).await?;

    Ok(HttpRequest {
        method: config.method,
        url: url.to_string(),
        headers,
        body,
        tls: config.tls.clone(),
        connect_to: None,
        http2: config.http2,
        with_credentials: config.with_credentials,
    })
}

fn resolve_url(config: &RequestConfig) -> Result<Url> {
    match Url::parse(&config.url) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = config.base_url.as_deref().ok_or_else(|| {
                Error::InvalidRequest(format!("relative url without a base: {}", config.url))
            })?;
            let path = config.url.trim_start_matches('/');
            Ok(Url::parse(&format!("{base}/{path}"))?)
        }
        Err(e) => Err(e.into()),
    }
}

async fn encode_body(config: &RequestConfig, headers: &mut HeaderMap) -> Result<Option<Bytes>> {
    if !config.multipart.is_empty() {
        if config.body.is_some() {
            return Err(Error::InvalidRequest(
                "a request cannot carry both send() data and multipart fields".into(),
            ));
        }
        let form = config.multipart.encode().await?;
        headers.insert("Content-Type", form.content_type);
        return Ok(Some(form.body));
    }

    let Some(payload) = &config.body else {
        return Ok(None);
    };
    let bytes = match payload {
        Payload::Binary(bytes) => bytes.clone(),
        Payload::Text(text) => Bytes::from(text.clone()),
        Payload::Json(value) => {
            let content_type = headers.get("content-type").unwrap_or(media::JSON).to_string();
            let serialize = config
                .serializer
                .clone()
                .or_else(|| serializer::lookup(&content_type))
                .ok_or_else(|| Error::InvalidRequest(format!("no serializer for {content_type}")))?;
            let encoded = serialize(value)
                .map_err(|e| Error::InvalidRequest(format!("cannot serialize body: {e}")))?;
            Bytes::from(encoded)
        }
    };
    Ok(Some(bytes))
}
