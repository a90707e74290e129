use std::collections::BTreeMap;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, Query},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
    routing::{any, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::debug;

/// What `/echo` saw of the request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub path: String,
    /// Raw query string, empty when absent.
    pub query: String,
    /// Lowercased names; repeated headers are joined with `, `.
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

pub fn app() -> Router {
    Router::new()
        .route("/echo", any(echo))
        .route("/status/{code}", any(status))
        .route("/redirect/{n}", get(redirect))
        .route("/see-other", post(see_other))
        .route("/cookies/set", get(set_cookies))
        .route("/cookies", get(cookies))
        .route("/bytes/{n}", get(bytes))
        .route("/slow/{ms}", get(slow))
        .route("/text", get(text))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Echo> {
    debug!(%method, %uri, "echo");
    let mut seen: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in &headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        seen.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    Json(Echo {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().unwrap_or_default().to_string(),
        headers: seen,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn status(Path(code): Path<u16>) -> Response {
    match StatusCode::from_u16(code) {
        Ok(code) => (code, format!("status {}", code.as_u16())).into_response(),
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

/// `n` hops of 302 before landing on `/echo`.
async fn redirect(Path(n): Path<u32>) -> Response {
    let location = match n {
        0 | 1 => "/echo".to_string(),
        n => format!("/redirect/{}", n - 1),
    };
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

async fn see_other() -> Redirect {
    Redirect::to("/echo")
}

async fn set_cookies(Query(pairs): Query<BTreeMap<String, String>>) -> Response {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        match HeaderValue::from_str(&format!("{name}={value}; Path=/")) {
            Ok(cookie) => {
                headers.append(header::SET_COOKIE, cookie);
            }
            Err(_) => return StatusCode::BAD_REQUEST.into_response(),
        }
    }
    (headers, "cookies set").into_response()
}

async fn cookies(headers: HeaderMap) -> Json<BTreeMap<String, String>> {
    let jar = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
    Json(jar)
}

async fn bytes(Path(n): Path<usize>) -> impl IntoResponse {
    let body: Vec<u8> = (0..n).map(|i| (i % 256) as u8).collect();
    ([(header::CONTENT_TYPE, "application/octet-stream")], body)
}

async fn slow(Path(ms): Path<u64>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    "done"
}

async fn text() -> &'static str {
    "hello world"
}
