//! Request lifecycle properties checked against a scripted transport.
//!
//! # Design
//! Each test scripts the transport's answers, drives one request and then
//! inspects both the outcome and what reached the wire. Timers run on paused
//! tokio time, so timeout tests finish instantly and deterministically.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{ScriptedTransport, Step};
use errand::{
    Agent, Direction, Error, ErrorKind, HttpMethod, ProgressEvent, ResponseBody, State, Timeout, TimeoutKind,
};
use serde_json::json;

fn recorder<T: Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl Fn(T) + Send + Sync + 'static) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    (log, move |item| sink.lock().unwrap().push(item))
}

// --- building ---

#[tokio::test(start_paused = true)]
async fn query_calls_merge_on_the_wire() {
    let transport = ScriptedTransport::new([Step::ok(b"")]);
    errand::get(transport.clone(), "http://api.test/search")
        .query([("query", "Manny")])
        .query([("range", "1..5")])
        .query([("order", "desc")])
        .await
        .unwrap();
    assert_eq!(transport.seen()[0].url, "http://api.test/search?query=Manny&range=1..5&order=desc");
}

#[tokio::test(start_paused = true)]
async fn raw_query_strings_are_overridden_by_key() {
    let transport = ScriptedTransport::new([Step::ok(b"")]);
    errand::get(transport.clone(), "http://api.test/search")
        .query_str("a=1&b=2")
        .query([("a", "2")])
        .await
        .unwrap();
    assert_eq!(transport.seen()[0].url, "http://api.test/search?a=2&b=2");
}

#[tokio::test(start_paused = true)]
async fn json_body_and_headers_reach_the_transport() {
    let transport = ScriptedTransport::new([Step::ok(b"")]);
    errand::post(transport.clone(), "http://api.test/user")
        .set("X-API-Key", "foobar")
        .send(&json!({ "name": "tj" }))
        .send(&json!({ "pet": "tobi" }))
        .await
        .unwrap();
    let request = &transport.seen()[0];
    assert_eq!(request.method, HttpMethod::Post);
    assert_eq!(request.headers.get("x-api-key"), Some("foobar"));
    assert_eq!(request.headers.get("content-type"), Some("application/json"));
    assert_eq!(request.body.as_deref(), Some(&br#"{"name":"tj","pet":"tobi"}"#[..]));
}

#[tokio::test(start_paused = true)]
async fn missing_transport_is_a_request_error() {
    let err = errand::Request::new(HttpMethod::Get, "http://api.test/").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Request);
}

// --- timeouts ---

#[tokio::test(start_paused = true)]
async fn response_timeout_bounds_the_head() {
    let transport = ScriptedTransport::new([Step::Delay(Duration::from_millis(200), Box::new(Step::ok(b"late")))]);
    let err = errand::get(transport, "http://api.test/slow")
        .timeout(Timeout::new().response(Duration::from_millis(100)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout(TimeoutKind::Response));
    assert!(err.is_timeout());
}

#[tokio::test(start_paused = true)]
async fn deadline_covers_the_body() {
    // Head after 4 s, body finished at 65 s.
    let transport = ScriptedTransport::new([Step::Delay(
        Duration::from_secs(4),
        Box::new(Step::Stream {
            status: 200,
            headers: vec![("Content-Type", "text/plain")],
            chunks: vec![(Duration::from_secs(1), &b"first"[..]), (Duration::from_secs(60), &b"second"[..])],
        }),
    )]);
    let err = errand::get(transport, "http://api.test/stream")
        .timeout(
            Timeout::new()
                .response(Duration::from_secs(5))
                .deadline(Duration::from_secs(60)),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout(TimeoutKind::Deadline));
}

#[tokio::test(start_paused = true)]
async fn duration_sets_the_deadline() {
    let transport = ScriptedTransport::new([Step::Hang]);
    let err = errand::get(transport, "http://api.test/hang")
        .timeout(Duration::from_secs(5))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout(TimeoutKind::Deadline));
}

// --- retry ---

#[tokio::test(start_paused = true)]
async fn retry_makes_n_plus_one_calls() {
    let transport = ScriptedTransport::new([Step::Fail]);
    let (attempts, record) = recorder();
    let err = errand::get(transport.clone(), "http://api.test/flaky")
        .retry_with(2, move |err, attempt| {
            assert_eq!(err.kind(), ErrorKind::Network);
            record(attempt);
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(transport.calls(), 3);
    assert_eq!(*attempts.lock().unwrap(), [1, 2]);
}

#[tokio::test(start_paused = true)]
async fn retry_recovers_after_a_timeout() {
    let transport = ScriptedTransport::new([Step::Hang, Step::ok(b"recovered")]);
    let response = errand::get(transport.clone(), "http://api.test/flaky")
        .timeout(Timeout::new().response(Duration::from_millis(100)))
        .retry(1)
        .await
        .unwrap();
    assert_eq!(response.text.as_deref(), Some("recovered"));
    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn http_status_errors_are_not_retried() {
    let transport = ScriptedTransport::new([Step::status(500)]);
    let err = errand::get(transport.clone(), "http://api.test/broken")
        .retry(3)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(transport.calls(), 1);
}

// --- completion ---

#[tokio::test(start_paused = true)]
async fn every_completion_shares_one_dispatch() {
    let transport = ScriptedTransport::new([Step::ok(b"once")]);
    let request = errand::get(transport.clone(), "http://api.test/once");
    let (results, record) = recorder();
    let record = Arc::new(record);

    let first = {
        let record = Arc::clone(&record);
        request.end(move |res| record(res.map(|r| r.status)))
    };
    let second = {
        let record = Arc::clone(&record);
        request.end(move |res| record(res.map(|r| r.status)))
    };
    first.await.unwrap();
    second.await.unwrap();
    let awaited = request.clone().await.unwrap();

    assert_eq!(transport.calls(), 1);
    assert_eq!(awaited.status, 200);
    assert!(results.lock().unwrap().iter().all(|r| matches!(r, Ok(200))));
    assert_eq!(request.state(), State::Complete);
}

#[tokio::test(start_paused = true)]
async fn cancelled_waiter_does_not_dispatch_again() {
    let transport = ScriptedTransport::new([
        Step::Delay(Duration::from_secs(10), Box::new(Step::ok(b"first"))),
        Step::ok(b"second"),
    ]);
    let request = errand::get(transport.clone(), "http://api.test/slow");

    let gave_up = tokio::time::timeout(Duration::from_secs(1), request.response()).await;
    assert!(gave_up.is_err());
    assert_eq!(request.state(), State::InFlight);

    let response = request.response().await.unwrap();
    assert_eq!(response.text.as_deref(), Some("first"));
    assert_eq!(transport.calls(), 1);
    assert_eq!(request.state(), State::Complete);
}

#[tokio::test(start_paused = true)]
async fn abort_in_flight_resolves_as_aborted() {
    let transport = ScriptedTransport::new([Step::Hang]);
    let request = errand::get(transport.clone(), "http://api.test/hang");
    let (errors, on_error) = recorder();
    let request = request.on_error(move |err: &Error| on_error(err.kind()));

    let pending = {
        let request = request.clone();
        tokio::spawn(async move { request.response().await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    request.abort();

    let err = pending.await.unwrap().unwrap_err();
    assert!(err.is_abort());
    assert_eq!(request.state(), State::Aborted);
    assert_eq!(transport.calls(), 1);
    assert!(errors.lock().unwrap().is_empty());

    request.abort();
    assert_eq!(request.state(), State::Aborted);
}

#[tokio::test(start_paused = true)]
async fn abort_before_dispatch_never_reaches_the_transport() {
    let transport = ScriptedTransport::new([Step::ok(b"")]);
    let request = errand::get(transport.clone(), "http://api.test/");
    request.abort();
    assert!(request.response().await.unwrap_err().is_abort());
    assert_eq!(transport.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn abort_after_completion_is_a_noop() {
    let transport = ScriptedTransport::new([Step::ok(b"")]);
    let request = errand::get(transport, "http://api.test/");
    request.response().await.unwrap();
    request.abort();
    assert_eq!(request.state(), State::Complete);
    assert!(request.response().await.is_ok());
}

// --- ok predicate ---

#[tokio::test(start_paused = true)]
async fn not_found_is_an_error_by_default() {
    let transport = ScriptedTransport::new([Step::status(404)]);
    let (errors, on_error) = recorder();
    let err = errand::get(transport, "http://api.test/missing")
        .on_error(move |err: &Error| on_error(err.status()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HttpStatus);
    assert!(err.response().is_some_and(|r| r.is_not_found() && !r.ok));
    assert_eq!(*errors.lock().unwrap(), [Some(404)]);
}

#[tokio::test(start_paused = true)]
async fn custom_ok_accepts_client_errors() {
    let transport = ScriptedTransport::new([Step::status(404)]);
    let response = errand::get(transport, "http://api.test/missing")
        .ok(|res| res.status < 500)
        .await
        .unwrap();
    assert!(response.ok);
    assert_eq!(response.status, 404);
}

// --- redirects ---

#[tokio::test(start_paused = true)]
async fn see_other_turns_post_into_get() {
    let transport = ScriptedTransport::new([Step::redirect(303, "/done"), Step::ok(b"done")]);
    let (hops, on_redirect) = recorder();
    let response = errand::post(transport.clone(), "http://api.test/submit")
        .send(&json!({ "name": "tj" }))
        .on_redirect(move |event| on_redirect(event.to.clone()))
        .await
        .unwrap();

    let seen = transport.seen();
    assert_eq!(seen[1].method, HttpMethod::Get);
    assert_eq!(seen[1].url, "http://api.test/done");
    assert!(seen[1].body.is_none());
    assert!(seen[1].headers.get("content-type").is_none());
    assert_eq!(response.redirects, ["http://api.test/done"]);
    assert_eq!(response.url, "http://api.test/done");
    assert_eq!(*hops.lock().unwrap(), ["http://api.test/done"]);
}

#[tokio::test(start_paused = true)]
async fn temporary_redirect_keeps_the_body() {
    let transport = ScriptedTransport::new([Step::redirect(307, "/again"), Step::ok(b"")]);
    errand::put(transport.clone(), "http://api.test/start")
        .send_str("name=tj")
        .await
        .unwrap();
    let seen = transport.seen();
    assert_eq!(seen[1].method, HttpMethod::Put);
    assert_eq!(seen[1].body.as_deref(), Some(&b"name=tj"[..]));
}

#[tokio::test(start_paused = true)]
async fn too_many_redirects_is_an_error() {
    let transport = ScriptedTransport::new([Step::redirect(302, "/loop")]);
    let err = errand::get(transport.clone(), "http://api.test/loop")
        .redirects(2)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Redirect);
    assert_eq!(transport.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn zero_redirects_returns_the_3xx() {
    let transport = ScriptedTransport::new([Step::redirect(302, "/elsewhere")]);
    let response = errand::get(transport.clone(), "http://api.test/")
        .redirects(0)
        .await
        .unwrap();
    assert_eq!(response.status, 302);
    assert_eq!(response.get("location"), Some("/elsewhere"));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn cross_host_redirect_drops_authorization() {
    let transport = ScriptedTransport::new([Step::redirect(302, "http://other.test/"), Step::ok(b"")]);
    errand::get(transport.clone(), "http://api.test/")
        .bearer("secret")
        .await
        .unwrap();
    let seen = transport.seen();
    assert_eq!(seen[0].headers.get("authorization"), Some("Bearer secret"));
    assert_eq!(seen[1].headers.get("authorization"), None);
}

// --- progress and size ---

#[tokio::test(start_paused = true)]
async fn progress_reports_upload_then_download() {
    let transport = ScriptedTransport::new([Step::Stream {
        status: 200,
        headers: vec![("Content-Type", "application/octet-stream"), ("Content-Length", "8")],
        chunks: vec![(Duration::ZERO, &b"abcd"[..]), (Duration::ZERO, &b"efgh"[..])],
    }]);
    let (events, record) = recorder::<ProgressEvent>();
    let response = errand::post(transport, "http://api.test/upload")
        .send_str("name=tj")
        .on_progress(move |event| record(*event))
        .await
        .unwrap();

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!((events[0].direction, events[0].loaded, events[0].total), (Direction::Upload, 7, Some(7)));
    assert_eq!((events[1].direction, events[1].loaded), (Direction::Download, 4));
    assert_eq!(events[1].percent, Some(50.0));
    assert_eq!(events[2].percent, Some(100.0));
    assert_eq!(response.body, ResponseBody::Binary(bytes::Bytes::from_static(b"abcdefgh")));
}

#[tokio::test(start_paused = true)]
async fn upload_is_reported_once_across_redirect_hops() {
    let transport = ScriptedTransport::new([
        Step::redirect(307, "/again"),
        Step::redirect(308, "/last"),
        Step::ok(b""),
    ]);
    let (events, record) = recorder::<ProgressEvent>();
    errand::put(transport.clone(), "http://api.test/start")
        .send_str("name=tj")
        .on_progress(move |event| record(*event))
        .await
        .unwrap();

    assert_eq!(transport.calls(), 3);
    let uploads: Vec<_> = events
        .lock()
        .unwrap()
        .iter()
        .filter(|event| event.direction == Direction::Upload)
        .map(|event| event.loaded)
        .collect();
    assert_eq!(uploads, vec![7]);
}

#[tokio::test(start_paused = true)]
async fn oversized_body_is_rejected() {
    let transport = ScriptedTransport::new([Step::ok(b"0123456789")]);
    let err = errand::get(transport, "http://api.test/big")
        .max_response_size(4)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResponseSize);
}

// --- agent ---

#[tokio::test(start_paused = true)]
async fn agent_carries_cookies_between_requests() {
    let transport = ScriptedTransport::new([
        Step::Respond {
            status: 200,
            headers: vec![("Set-Cookie", "session=abc; Path=/")],
            body: b"",
        },
        Step::ok(b""),
    ]);
    let agent = Agent::new(transport.clone()).with_base_url("http://api.test/");
    agent.get("/login").await.unwrap();
    agent.get("/profile").await.unwrap();

    let seen = transport.seen();
    assert_eq!(seen[1].url, "http://api.test/profile");
    assert_eq!(seen[1].headers.get("cookie"), Some("session=abc"));
}

#[tokio::test(start_paused = true)]
async fn response_listener_sees_success() {
    let transport = ScriptedTransport::new([Step::ok(b"hello")]);
    let (seen, record) = recorder();
    errand::get(transport, "http://api.test/")
        .on_response(move |res| record(res.status))
        .await
        .unwrap();
    assert_eq!(*seen.lock().unwrap(), [200]);
}
