//! Integration tests for segment delivery over HTTP

#![cfg(feature = "http")]

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use quago_sdk::network::{NetworkSettings, RETRY_HEADER};
use quago_sdk::{Flavor, Sdk, ServerEnvelope, Settings};
use std::net::SocketAddr;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Requests seen by the collection server: retry header and body.
#[derive(Clone, Default)]
struct Received {
    requests: Arc<Mutex<Vec<(Option<String>, String)>>>,
    /// Number of leading requests answered with 503
    failures: usize,
}

async fn record(State(state): State<Received>, headers: HeaderMap, body: String) -> StatusCode {
    let retry = headers
        .get(RETRY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let mut requests = state.requests.lock().unwrap();
    requests.push((retry, body));
    if requests.len() <= state.failures {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

/// Run a collection server on its own runtime thread.
fn spawn_server(state: Received) -> SocketAddr {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().expect("runtime");
        runtime.block_on(async move {
            let app = Router::new()
                .route("/v1/record", post(record))
                .with_state(state);
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("bind");
            tx.send(listener.local_addr().expect("addr")).unwrap();
            axum::serve(listener, app).await.expect("serve");
        });
    });
    rx.recv_timeout(Duration::from_secs(5)).expect("server started")
}

fn wait_for(state: &Received, count: usize) -> Vec<(Option<String>, String)> {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let requests = state.requests.lock().unwrap().clone();
        if requests.len() >= count || Instant::now() > deadline {
            return requests;
        }
        thread::sleep(Duration::from_millis(20));
    }
}

fn network_sdk(addr: SocketAddr, flavor: Flavor) -> Sdk {
    let network = NetworkSettings::builder()
        .url(format!("http://{addr}/v1/record"))
        .initial_interval(Duration::from_millis(50))
        .randomization_factor(0.0)
        .request_timeout(Duration::from_secs(5))
        .build();
    let settings = Settings::builder("network-token", flavor)
        .disable_init_segment(true)
        .network(network)
        .build()
        .expect("valid settings");
    Sdk::new(settings).expect("SDK started")
}

#[test]
fn test_segment_is_posted_as_envelope() {
    let state = Received::default();
    let addr = spawn_server(state.clone());
    let sdk = network_sdk(addr, Flavor::Production);

    sdk.begin_segment("network");
    sdk.set_key_value("map", "desert");
    sdk.end_segment();

    let requests = wait_for(&state, 1);
    assert_eq!(requests.len(), 1);
    let (retry, body) = &requests[0];
    assert!(retry.is_none());

    let envelope: ServerEnvelope = serde_json::from_str(body).unwrap();
    assert_eq!(envelope.app_token, "network-token");
    assert_eq!(envelope.env, "prod");
    assert_eq!(envelope.sdk_version, quago_sdk::SDK_VERSION_NAME);

    let data = envelope.open().unwrap();
    assert_eq!(data.seg_name.as_deref(), Some("network"));
    assert_eq!(data.key_values, vec![["map".to_string(), "desert".to_string()]]);
    assert_eq!(sdk.stats().snapshot().segments_to_network, 1);
}

#[test]
fn test_unavailable_server_is_retried() {
    let state = Received {
        failures: 2,
        ..Received::default()
    };
    let addr = spawn_server(state.clone());
    let sdk = network_sdk(addr, Flavor::Development);

    sdk.begin_segment("retry");
    sdk.end_segment();

    let requests = wait_for(&state, 3);
    let retries: Vec<Option<&str>> = requests.iter().map(|(r, _)| r.as_deref()).collect();
    assert_eq!(retries, vec![None, Some("1"), Some("2")]);

    // Every attempt carries the same segment.
    assert!(requests.iter().all(|(_, body)| body == &requests[0].1));
    let envelope: ServerEnvelope = serde_json::from_str(&requests[0].1).unwrap();
    assert_eq!(envelope.env, "stage");

    let deadline = Instant::now() + Duration::from_secs(2);
    while sdk.stats().snapshot().payloads_sent == 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(20));
    }
    assert_eq!(sdk.stats().snapshot().payloads_sent, 1);
    assert_eq!(sdk.stats().snapshot().payloads_dropped, 0);
}
