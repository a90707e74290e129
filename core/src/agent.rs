//! Shared defaults and cookies for a family of requests.
//!
//! # Design
//! An `Agent` keeps a template request in the `Building` state. Its setters
//! configure that template; `request` clones the template's configuration
//! into a fresh request, points it at the agent's cookie jar and then runs
//! the agent's plugins over it. Cloning an `Agent` shares the jar and the
//! transport but not later default changes.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::auth::Auth;
use crate::connect::ConnectOverride;
use crate::cookie::CookieJar;
use crate::error::{BoxError, Error};
use crate::events::RedirectEvent;
use crate::http::{HeaderMap, HttpMethod};
use crate::plugin::Plugin;
use crate::policy::Timeout;
use crate::progress::ProgressEvent;
use crate::request::Request;
use crate::response::{Response, ResponseBody};
use crate::tls::Pem;
use crate::transport::Transport;

#[derive(Clone)]
pub struct Agent {
    template: Request,
    plugins: Vec<Arc<dyn Plugin>>,
    jar: Arc<CookieJar>,
}

impl Agent {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            template: Request::new(HttpMethod::Get, "").transport(transport),
            plugins: Vec::new(),
            jar: Arc::new(CookieJar::new()),
        }
    }

    /// Resolve relative request URLs such as `/search` against `base_url`.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.template.config.base_url = Some(base_url.trim_end_matches('/').to_string());
        self
    }

    pub fn request(&self, method: HttpMethod, url: impl Into<String>) -> Request {
        let mut config = self.template.config.clone();
        config.method = method;
        config.url = url.into();
        config.jar = Some(Arc::clone(&self.jar));
        self.plugins
            .iter()
            .fold(Request::from_config(config), |request, plugin| plugin.apply(request))
    }

    pub fn get(&self, url: impl Into<String>) -> Request {
        self.request(HttpMethod::Get, url)
    }

    pub fn head(&self, url: impl Into<String>) -> Request {
        self.request(HttpMethod::Head, url)
    }

    pub fn post(&self, url: impl Into<String>) -> Request {
        self.request(HttpMethod::Post, url)
    }

    pub fn put(&self, url: impl Into<String>) -> Request {
        self.request(HttpMethod::Put, url)
    }

    pub fn patch(&self, url: impl Into<String>) -> Request {
        self.request(HttpMethod::Patch, url)
    }

    pub fn delete(&self, url: impl Into<String>) -> Request {
        self.request(HttpMethod::Delete, url)
    }

    /// Alias of [`Agent::delete`].
    pub fn del(&self, url: impl Into<String>) -> Request {
        self.delete(url)
    }

    pub fn options(&self, url: impl Into<String>) -> Request {
        self.request(HttpMethod::Options, url)
    }

    /// Cookies collected from every response seen by this agent.
    pub fn cookies(&self) -> &CookieJar {
        &self.jar
    }

    /// Register a plugin applied to every request this agent creates.
    pub fn use_plugin<P: Plugin + 'static>(mut self, plugin: P) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    fn defaults(mut self, apply: impl FnOnce(Request) -> Request) -> Self {
        self.template = apply(self.template);
        self
    }

    pub fn set(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults(|r| r.set(name, value))
    }

    pub fn unset(self, name: &str) -> Self {
        self.defaults(|r| r.unset(name))
    }

    pub fn query<I, K, V>(self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.defaults(|r| r.query(pairs))
    }

    pub fn type_(self, content_type: &str) -> Self {
        self.defaults(|r| r.type_(content_type))
    }

    pub fn accept(self, accept: &str) -> Self {
        self.defaults(|r| r.accept(accept))
    }

    pub fn auth(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.defaults(|r| r.auth(username, password))
    }

    pub fn auth_with(self, auth: Auth) -> Self {
        self.defaults(|r| r.auth_with(auth))
    }

    pub fn bearer(self, token: impl Into<String>) -> Self {
        self.defaults(|r| r.bearer(token))
    }

    pub fn ca(self, ca: impl Into<Pem>) -> Self {
        self.defaults(|r| r.ca(ca))
    }

    pub fn cert(self, cert: impl Into<Pem>) -> Self {
        self.defaults(|r| r.cert(cert))
    }

    pub fn key(self, key: impl Into<Pem>) -> Self {
        self.defaults(|r| r.key(key))
    }

    pub fn pfx(self, pfx: impl Into<Pem>) -> Self {
        self.defaults(|r| r.pfx(pfx))
    }

    pub fn disable_tls_certs(self) -> Self {
        self.defaults(Request::disable_tls_certs)
    }

    pub fn redirects(self, max: u32) -> Self {
        self.defaults(|r| r.redirects(max))
    }

    pub fn retry(self, count: u32) -> Self {
        self.defaults(|r| r.retry(count))
    }

    pub fn retry_with<F>(self, count: u32, callback: F) -> Self
    where
        F: Fn(&Error, u32) + Send + Sync + 'static,
    {
        self.defaults(|r| r.retry_with(count, callback))
    }

    pub fn timeout(self, timeout: impl Into<Timeout>) -> Self {
        self.defaults(|r| r.timeout(timeout))
    }

    pub fn max_response_size(self, bytes: u64) -> Self {
        self.defaults(|r| r.max_response_size(bytes))
    }

    pub fn connect(self, rules: impl Into<ConnectOverride>) -> Self {
        self.defaults(|r| r.connect(rules))
    }

    pub fn ok<F>(self, predicate: F) -> Self
    where
        F: Fn(&Response) -> bool + Send + Sync + 'static,
    {
        self.defaults(|r| r.ok(predicate))
    }

    pub fn parse_with<F>(self, parser: F) -> Self
    where
        F: Fn(&HeaderMap, &[u8]) -> Result<ResponseBody, BoxError> + Send + Sync + 'static,
    {
        self.defaults(|r| r.parse_with(parser))
    }

    pub fn serialize_with<F>(self, serializer: F) -> Self
    where
        F: Fn(&Value) -> Result<String, BoxError> + Send + Sync + 'static,
    {
        self.defaults(|r| r.serialize_with(serializer))
    }

    pub fn with_credentials(self) -> Self {
        self.defaults(Request::with_credentials)
    }

    pub fn http2(self) -> Self {
        self.defaults(Request::http2)
    }

    pub fn on_progress<F>(self, listener: F) -> Self
    where
        F: Fn(&ProgressEvent) + Send + Sync + 'static,
    {
        self.defaults(|r| r.on_progress(listener))
    }

    pub fn on_response<F>(self, listener: F) -> Self
    where
        F: Fn(&Response) + Send + Sync + 'static,
    {
        self.defaults(|r| r.on_response(listener))
    }

    pub fn on_error<F>(self, listener: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.defaults(|r| r.on_error(listener))
    }

    pub fn on_redirect<F>(self, listener: F) -> Self
    where
        F: Fn(&RedirectEvent) + Send + Sync + 'static,
    {
        self.defaults(|r| r.on_redirect(listener))
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("base_url", &self.template.config.base_url)
            .field("headers", self.template.headers())
            .field("plugins", &self.plugins.len())
            .finish_non_exhaustive()
    }
}
