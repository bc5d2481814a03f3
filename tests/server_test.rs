//! Real-listener tests: the server bound to a TCP port, driven with reqwest.

use std::net::SocketAddr;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use cookhound_api::store::MemoryStore;
use cookhound_api::{AppState, HttpServer};
use reqwest::StatusCode;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

mod common;

use common::TEST_ORIGIN;

async fn start_server() -> (SocketAddr, oneshot::Sender<()>, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let state = AppState::new(common::test_config(), Arc::new(MemoryStore::new())).unwrap();
    let routes = common::app_routes(&state, Arc::new(AtomicUsize::new(0)));
    let server = HttpServer::with_routes(state, routes);

    let (tx, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        server
            .run(listener, async {
                let _ = rx.await;
            })
            .await
            .unwrap();
    });

    (addr, tx, handle)
}

#[tokio::test]
async fn test_health_over_tcp() {
    let (addr, shutdown, handle) = start_server().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("http://{addr}/health"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let request_id = res.headers()["x-request-id"].to_str().unwrap().to_string();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["requestId"], request_id.as_str());

    drop(client);
    shutdown.send(()).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_transport_ip_and_origin_guard_over_tcp() {
    let (addr, shutdown, handle) = start_server().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("http://{addr}/recipes"))
        .header("origin", "https://evil.example")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .post(format!("http://{addr}/recipes"))
        .header("origin", TEST_ORIGIN)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["ip"], "127.0.0.1");

    drop(client);
    shutdown.send(()).unwrap();
    handle.await.unwrap();
}
