//! Transports shared by the integration test binaries.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use errand::{HeaderMap, HttpMethod, HttpRequest, Transport, TransportError, TransportResponse};
use futures_util::stream::{self, StreamExt};

// ---------------------------------------------------------------------------
// Scripted transport
// ---------------------------------------------------------------------------

/// One scripted answer.
#[derive(Clone, Debug)]
pub enum Step {
    Respond {
        status: u16,
        headers: Vec<(&'static str, &'static str)>,
        body: &'static [u8],
    },
    /// Head immediately, then each chunk after its delay.
    Stream {
        status: u16,
        headers: Vec<(&'static str, &'static str)>,
        chunks: Vec<(Duration, &'static [u8])>,
    },
    Fail,
    /// Wait before producing the inner step.
    Delay(Duration, Box<Step>),
    /// Never answer.
    Hang,
}

impl Step {
    pub fn ok(body: &'static [u8]) -> Self {
        Step::Respond {
            status: 200,
            headers: vec![("Content-Type", "text/plain")],
            body,
        }
    }

    pub fn status(status: u16) -> Self {
        Step::Respond {
            status,
            headers: Vec::new(),
            body: b"",
        }
    }

    pub fn redirect(status: u16, location: &'static str) -> Self {
        Step::Respond {
            status,
            headers: vec![("Location", location)],
            body: b"",
        }
    }
}

/// Plays back `Step`s in order and records every request it receives. The
/// last step repeats once the script runs out.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    seen: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new(script: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn seen(&self) -> Vec<HttpRequest> {
        self.seen.lock().unwrap().clone()
    }

    fn next_step(&self) -> Step {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap_or(Step::Hang)
        }
    }
}

async fn play(mut step: Step) -> Result<TransportResponse, TransportError> {
    while let Step::Delay(delay, inner) = step {
        tokio::time::sleep(delay).await;
        step = *inner;
    }
    match step {
        Step::Respond { status, headers, body } => Ok(TransportResponse::new(
            status,
            headers.into_iter().collect(),
            Bytes::from_static(body),
        )),
        Step::Stream { status, headers, chunks } => {
            let body = stream::iter(chunks)
                .then(|(delay, chunk)| async move {
                    tokio::time::sleep(delay).await;
                    Ok::<_, TransportError>(Bytes::from_static(chunk))
                })
                .boxed();
            Ok(TransportResponse::streaming(status, headers.into_iter().collect(), body))
        }
        Step::Fail => Err(TransportError::Connect("connection refused".into())),
        Step::Hang => std::future::pending().await,
        Step::Delay(..) => unreachable!("delays are unwrapped above"),
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<TransportResponse, TransportError> {
        self.seen.lock().unwrap().push(request);
        let step = self.next_step();
        play(step).await
    }
}

// ---------------------------------------------------------------------------
// ureq transport
// ---------------------------------------------------------------------------

/// Blocking ureq client driven from `spawn_blocking`.
///
/// Status codes are returned as data and redirects are left to the core.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Arc<Self> {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(0)
            .build()
            .new_agent();
        Arc::new(Self { agent })
    }
}

fn execute(agent: &ureq::Agent, request: HttpRequest) -> Result<TransportResponse, TransportError> {
    let mut url = url::Url::parse(&request.url).map_err(|e| TransportError::Connect(e.to_string()))?;
    if let Some(target) = &request.connect_to {
        url.set_host(Some(target.host()))
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        if let Some(port) = target.port() {
            let _ = url.set_port(Some(port));
        }
    }

    let mut builder = ureq::http::Request::builder()
        .method(request.method.as_str())
        .uri(url.as_str());
    for (name, value) in request.headers.iter() {
        builder = builder.header(name, value);
    }

    let sent = match request.body {
        Some(body) if request.method != HttpMethod::Get && request.method != HttpMethod::Head => {
            let request = builder.body(body.to_vec()).map_err(|e| TransportError::Io(e.to_string()))?;
            agent.run(request)
        }
        _ => {
            let request = builder.body(()).map_err(|e| TransportError::Io(e.to_string()))?;
            agent.run(request)
        }
    };
    let mut response = sent.map_err(|e| match e {
        ureq::Error::Io(e) => TransportError::Io(e.to_string()),
        other => TransportError::Connect(other.to_string()),
    })?;

    let status = response.status().as_u16();
    let headers: HeaderMap = response
        .headers()
        .iter()
        .map(|(name, value)| (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
        .collect();
    let body = response
        .body_mut()
        .read_to_vec()
        .map_err(|e| TransportError::Io(e.to_string()))?;
    Ok(TransportResponse::new(status, headers, body))
}

#[async_trait]
impl Transport for UreqTransport {
    async fn send(&self, request: HttpRequest) -> Result<TransportResponse, TransportError> {
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || execute(&agent, request))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?
    }
}

/// Start the mock server on a random port.
pub async fn spawn_server() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { mock_server::run(listener).await });
    addr
}
