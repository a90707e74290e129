//! The fluent request builder and its completion adapters.
//!
//! # Design
//! A `Request` is split in two. `RequestConfig` is plain configuration,
//! owned by each handle and mutated by the builder methods. `Shared` is the
//! lifecycle every clone of a handle points at: the state, the abort signal
//! and the memoized outcome. The first completion call (`end`, `.await`,
//! `response`, `pipe`) snapshots the configuration and spawns the dispatch
//! as its own task. Every caller, on any clone, waits on the same `watch`
//! channel and receives a clone of the same result. Dropping a waiter does
//! not cancel the dispatch, so the transport is hit at most once.
//!
//! Configuration calls after dispatch are ignored with a warning.

use std::fmt;
use std::future::{Future, IntoFuture};
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::auth::Auth;
use crate::body::Payload;
use crate::connect::ConnectOverride;
use crate::cookie::CookieJar;
use crate::dispatch;
use crate::error::{BoxError, Error, Result};
use crate::events::{Listeners, RedirectEvent};
use crate::http::{HeaderMap, HttpMethod};
use crate::media;
use crate::multipart::{AttachOptions, Multipart};
use crate::plugin::Plugin;
use crate::policy::{RetryPolicy, Timeout};
use crate::progress::ProgressEvent;
use crate::query::Query;
use crate::response::{Parser, Response, ResponseBody};
use crate::serializer::Serializer;
use crate::tls::{Pem, Pfx, TlsMaterial};
use crate::transport::Transport;

pub(crate) const DEFAULT_MAX_REDIRECTS: u32 = 5;

pub type OkPredicate = Arc<dyn Fn(&Response) -> bool + Send + Sync>;

/// Lifecycle of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Accepting configuration.
    Building,
    InFlight,
    Complete,
    Error,
    Aborted,
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Complete | State::Error | State::Aborted)
    }
}

#[derive(Clone)]
pub(crate) struct RequestConfig {
    pub method: HttpMethod,
    pub url: String,
    pub base_url: Option<String>,
    pub headers: HeaderMap,
    pub query: Query,
    pub body: Option<Payload>,
    pub multipart: Multipart,
    pub timeout: Timeout,
    pub retry: RetryPolicy,
    pub max_redirects: u32,
    pub max_response_size: Option<u64>,
    pub tls: TlsMaterial,
    pub auth: Option<Auth>,
    pub connect: Option<ConnectOverride>,
    pub ok: Option<OkPredicate>,
    pub parser: Option<Parser>,
    pub serializer: Option<Serializer>,
    pub listeners: Listeners,
    pub with_credentials: bool,
    pub http2: bool,
    pub transport: Option<Arc<dyn Transport>>,
    pub jar: Option<Arc<CookieJar>>,
    /// First builder failure, reported at dispatch.
    pub error: Option<Error>,
}

impl RequestConfig {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            base_url: None,
            headers: HeaderMap::new(),
            query: Query::new(),
            body: None,
            multipart: Multipart::default(),
            timeout: Timeout::default(),
            retry: RetryPolicy::default(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_response_size: None,
            tls: TlsMaterial::default(),
            auth: None,
            connect: None,
            ok: None,
            parser: None,
            serializer: None,
            listeners: Listeners::default(),
            with_credentials: false,
            http2: false,
            transport: None,
            jar: None,
            error: None,
        }
    }

    fn fail(&mut self, err: Error) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn send_value(&mut self, value: Value) {
        let content_type = self.headers.get("content-type").map(str::to_string);
        let payload = Payload::merge(self.body.take(), value, content_type.as_deref());
        if content_type.is_none() {
            self.headers.insert("Content-Type", payload.default_type());
        }
        self.body = Some(payload);
    }
}

pub(crate) struct Shared {
    state: Mutex<State>,
    dispatched: AtomicBool,
    outcome: watch::Sender<Option<Result<Response>>>,
    abort: watch::Sender<bool>,
}

impl Shared {
    fn new() -> Self {
        let (abort, _) = watch::channel(false);
        let (outcome, _) = watch::channel(None);
        Self {
            state: Mutex::new(State::Building),
            dispatched: AtomicBool::new(false),
            outcome,
            abort,
        }
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn abort_signal(&self) -> watch::Receiver<bool> {
        self.abort.subscribe()
    }
}

/// One pending HTTP call.
#[derive(Clone)]
pub struct Request {
    pub(crate) config: RequestConfig,
    shared: Arc<Shared>,
}

impl Request {
    /// A request with no transport; set one with [`Request::transport`] or
    /// create it through an [`Agent`](crate::Agent).
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self::from_config(RequestConfig::new(method, url))
    }

    pub(crate) fn from_config(config: RequestConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared::new()),
        }
    }

    fn configure(mut self, apply: impl FnOnce(&mut RequestConfig)) -> Self {
        let state = *self.shared.state();
        if state == State::Building {
            apply(&mut self.config);
        } else {
            warn!(method = %self.config.method, url = %self.config.url, ?state, "ignoring configuration after dispatch");
        }
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.config.method
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub fn state(&self) -> State {
        *self.shared.state()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.config.headers.get(name)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.config.headers
    }

    /// The `Cookie` header set on this request.
    pub fn cookies(&self) -> Option<&str> {
        self.config.headers.get("cookie")
    }

    pub fn set_url(self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.configure(|c| c.url = url)
    }

    // ---------------------------------------------------------------------
    // Headers and query
    // ---------------------------------------------------------------------

    pub fn set(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let (name, value) = (name.into(), value.into());
        self.configure(|c| c.headers.insert(name, value))
    }

    pub fn set_all<I, K, V>(self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.configure(|c| {
            for (name, value) in headers {
                c.headers.insert(name, value);
            }
        })
    }

    /// Send one header line per value, e.g. several `Cookie` lines.
    pub fn set_values<I, V>(self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.configure(|c| {
            c.headers.remove(name);
            for value in values {
                c.headers.append(name, value);
            }
        })
    }

    pub fn unset(self, name: &str) -> Self {
        self.configure(|c| {
            c.headers.remove(name);
        })
    }

    /// Merge query pairs; a repeated key overrides the earlier value.
    pub fn query<I, K, V>(self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.configure(|c| c.query.merge(pairs))
    }

    /// Merge the fields of a serializable struct or map.
    pub fn query_value<T: Serialize + ?Sized>(self, value: &T) -> Self {
        let value = serde_json::to_value(value);
        self.configure(|c| match value {
            Ok(value) => c.query.merge_value(&value),
            Err(e) => c.fail(Error::InvalidRequest(format!("cannot encode query: {e}"))),
        })
    }

    /// Append a raw query string such as `search=Manny&range=1..5`.
    pub fn query_str(self, raw: &str) -> Self {
        self.configure(|c| c.query.push_raw(raw))
    }

    // ---------------------------------------------------------------------
    // Body
    // ---------------------------------------------------------------------

    /// Add to the body. Objects merge with earlier objects; strings append.
    ///
    /// Without an explicit content type, objects are sent as JSON and
    /// strings as a urlencoded form.
    pub fn send<T: Serialize + ?Sized>(self, body: &T) -> Self {
        let value = serde_json::to_value(body);
        self.configure(|c| match value {
            Ok(value) => c.send_value(value),
            Err(e) => c.fail(Error::InvalidRequest(format!("cannot encode body: {e}"))),
        })
    }

    pub fn send_str(self, body: impl Into<String>) -> Self {
        let body = body.into();
        self.configure(|c| c.send_value(Value::String(body)))
    }

    pub fn send_bytes(self, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        self.configure(|c| c.body = Some(Payload::Binary(body)))
    }

    /// Set `Content-Type`, expanding shorthands like `json` or `png`.
    pub fn type_(self, content_type: &str) -> Self {
        let content_type = media::expand(content_type);
        self.configure(|c| c.headers.insert("Content-Type", content_type))
    }

    pub fn accept(self, accept: &str) -> Self {
        let accept = media::expand(accept);
        self.configure(|c| c.headers.insert("Accept", accept))
    }

    pub fn serialize_with<F>(self, serializer: F) -> Self
    where
        F: Fn(&Value) -> Result<String, BoxError> + Send + Sync + 'static,
    {
        self.configure(|c| c.serializer = Some(Arc::new(serializer)))
    }

    // ---------------------------------------------------------------------
    // Multipart
    // ---------------------------------------------------------------------

    pub fn field(self, name: impl Into<String>, value: impl ToString) -> Self {
        let (name, value) = (name.into(), value.to_string());
        self.configure(|c| c.multipart.field(name, value))
    }

    pub fn fields<I, K, V>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        self.configure(|c| {
            for (name, value) in fields {
                c.multipart.field(name, value.to_string());
            }
        })
    }

    pub fn attach(self, name: impl Into<String>, data: impl Into<Bytes>, options: impl Into<AttachOptions>) -> Self {
        let (name, data, options) = (name.into(), data.into(), options.into());
        self.configure(|c| c.multipart.bytes(name, data, options))
    }

    /// Attach a file read at dispatch time.
    pub fn attach_file(self, name: impl Into<String>, path: impl Into<PathBuf>, options: impl Into<AttachOptions>) -> Self {
        let (name, path, options) = (name.into(), path.into(), options.into());
        self.configure(|c| c.multipart.file(name, path, options))
    }

    // ---------------------------------------------------------------------
    // Auth and TLS
    // ---------------------------------------------------------------------

    pub fn auth(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth_with(Auth::basic(username, password))
    }

    pub fn auth_with(self, auth: Auth) -> Self {
        self.configure(|c| c.auth = Some(auth))
    }

    pub fn bearer(self, token: impl Into<String>) -> Self {
        self.auth_with(Auth::bearer(token))
    }

    pub fn ca(self, ca: impl Into<Pem>) -> Self {
        let ca = ca.into();
        self.configure(|c| c.tls.ca.extend(ca.0))
    }

    pub fn cert(self, cert: impl Into<Pem>) -> Self {
        let cert = cert.into();
        self.configure(|c| c.tls.cert.extend(cert.0))
    }

    pub fn key(self, key: impl Into<Pem>) -> Self {
        let key = key.into();
        self.configure(|c| c.tls.key.extend(key.0))
    }

    pub fn pfx(self, pfx: impl Into<Pem>) -> Self {
        let pfx = pfx.into();
        self.configure(|c| {
            c.tls
                .pfx
                .extend(pfx.0.into_iter().map(|data| Pfx { data, passphrase: None }))
        })
    }

    pub fn pfx_with_passphrase(self, data: impl Into<Bytes>, passphrase: impl Into<String>) -> Self {
        let pfx = Pfx {
            data: data.into(),
            passphrase: Some(passphrase.into()),
        };
        self.configure(|c| c.tls.pfx.push(pfx))
    }

    pub fn disable_tls_certs(self) -> Self {
        self.configure(|c| c.tls.verify_certs = false)
    }

    // ---------------------------------------------------------------------
    // Policies
    // ---------------------------------------------------------------------

    /// Maximum redirects to follow; `0` returns 3xx responses as-is.
    pub fn redirects(self, max: u32) -> Self {
        self.configure(|c| c.max_redirects = max)
    }

    /// Re-dispatch up to `count` times after network failures or timeouts.
    pub fn retry(self, count: u32) -> Self {
        self.configure(|c| c.retry.count = count)
    }

    pub fn retry_with<F>(self, count: u32, callback: F) -> Self
    where
        F: Fn(&Error, u32) + Send + Sync + 'static,
    {
        self.configure(|c| {
            c.retry.count = count;
            c.retry.callback = Some(Arc::new(callback));
        })
    }

    pub fn timeout(self, timeout: impl Into<Timeout>) -> Self {
        let timeout = timeout.into();
        self.configure(|c| c.timeout = timeout)
    }

    pub fn max_response_size(self, bytes: u64) -> Self {
        self.configure(|c| c.max_response_size = Some(bytes))
    }

    pub fn connect(self, rules: impl Into<ConnectOverride>) -> Self {
        let rules = rules.into();
        self.configure(|c| c.connect = Some(rules))
    }

    /// Replace the success test; the default accepts 2xx and 3xx.
    pub fn ok<F>(self, predicate: F) -> Self
    where
        F: Fn(&Response) -> bool + Send + Sync + 'static,
    {
        self.configure(|c| c.ok = Some(Arc::new(predicate)))
    }

    pub fn parse_with<F>(self, parser: F) -> Self
    where
        F: Fn(&HeaderMap, &[u8]) -> Result<ResponseBody, BoxError> + Send + Sync + 'static,
    {
        self.configure(|c| c.parser = Some(Arc::new(parser)))
    }

    pub fn with_credentials(self) -> Self {
        self.configure(|c| c.with_credentials = true)
    }

    pub fn http2(self) -> Self {
        self.configure(|c| c.http2 = true)
    }

    pub fn transport(self, transport: Arc<dyn Transport>) -> Self {
        self.configure(|c| c.transport = Some(transport))
    }

    /// Run `plugin` against this request now.
    pub fn use_plugin<P: Plugin>(self, plugin: P) -> Self {
        plugin.apply(self)
    }

    // ---------------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------------

    pub fn on_progress<F>(self, listener: F) -> Self
    where
        F: Fn(&ProgressEvent) + Send + Sync + 'static,
    {
        self.configure(|c| c.listeners.progress.push(Arc::new(listener)))
    }

    pub fn on_response<F>(self, listener: F) -> Self
    where
        F: Fn(&Response) + Send + Sync + 'static,
    {
        self.configure(|c| c.listeners.response.push(Arc::new(listener)))
    }

    pub fn on_error<F>(self, listener: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.configure(|c| c.listeners.error.push(Arc::new(listener)))
    }

    pub fn on_redirect<F>(self, listener: F) -> Self
    where
        F: Fn(&RedirectEvent) + Send + Sync + 'static,
    {
        self.configure(|c| c.listeners.redirect.push(Arc::new(listener)))
    }

    // ---------------------------------------------------------------------
    // Completion
    // ---------------------------------------------------------------------

    /// Dispatch if nobody has yet, and wait for the shared outcome.
    pub async fn response(&self) -> Result<Response> {
        let mut outcome = self.shared.outcome.subscribe();
        if !self.shared.dispatched.swap(true, Ordering::AcqRel) {
            self.spawn_dispatch();
        }
        let settled = match outcome.wait_for(Option::is_some).await {
            Ok(value) => value.clone(),
            Err(_) => None,
        };
        settled.unwrap_or_else(|| Err(Error::Io("dispatch ended without an outcome".into())))
    }

    fn spawn_dispatch(&self) {
        let shared = Arc::clone(&self.shared);
        let work = tokio::spawn(dispatch::run(self.config.clone(), Arc::clone(&shared)));
        tokio::spawn(async move {
            let outcome = match work.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(error = %err, "dispatch task failed");
                    Err(Error::Io(format!("dispatch task failed: {err}")))
                }
            };
            shared.outcome.send_replace(Some(outcome));
        });
    }

    /// Callback-style completion, run on the current tokio runtime.
    pub fn end<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<Response>) + Send + 'static,
    {
        let request = self.clone();
        tokio::spawn(async move { callback(request.response().await) })
    }

    /// Write the response body into `writer`.
    pub async fn pipe<W>(&self, writer: &mut W) -> Result<Response>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let response = self.response().await?;
        writer
            .write_all(&response.raw)
            .await
            .map_err(|e| Error::Io(e.to_string()))?;
        writer.flush().await.map_err(|e| Error::Io(e.to_string()))?;
        Ok(response)
    }

    /// Cancel the request. A no-op once it has completed.
    pub fn abort(&self) {
        let mut state = self.shared.state();
        if state.is_terminal() {
            return;
        }
        *state = State::Aborted;
        self.shared.abort.send_replace(true);
        debug!(method = %self.config.method, url = %self.config.url, "request aborted");
    }
}

impl IntoFuture for Request {
    type Output = Result<Response>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.response().await })
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.config.method)
            .field("url", &self.config.url)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
