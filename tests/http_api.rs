//! HTTP API tests against a live server on an ephemeral port.

#![cfg(feature = "server")]

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use coachvault::guard::GuardConfig;
use coachvault::storage::InMemorySnapshotStore;
use coachvault::transport::router;
use coachvault::{
    EconomyConfig, GuardPolicy, Item, RateGuard, Snapshot, UnlockEngine, UnlockService, User,
};

struct Reply {
    status: u16,
    headers: String,
    body: serde_json::Value,
}

async fn spawn_server() -> SocketAddr {
    let store = Arc::new(InMemorySnapshotStore::new(
        Snapshot::new(EconomyConfig::default())
            .with_user(User::new("u1", "Ana", 8))
            .with_item(Item::new("c1", "Coach One", 5).with_risk_flag("booster payments"))
            .with_item(Item::new("c2", "Coach Two", 5))
            .with_item(Item::new("c3", "Coach Three", 1).with_available(false)),
    ));
    let service = UnlockService::new(
        UnlockEngine::new(store),
        Arc::new(RateGuard::new(GuardConfig::default())),
        GuardPolicy::unlock(),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            router(service).into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    addr
}

async fn request(addr: SocketAddr, method: &str, path: &str, body: Option<&str>) -> Reply {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let body = body.unwrap_or("");
    let raw = format!(
        "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\
         Content-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(raw.as_bytes()).await.unwrap();

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    let text = String::from_utf8(buf).unwrap();
    let (head, payload) = text.split_once("\r\n\r\n").unwrap();
    let status = head.split(' ').nth(1).unwrap().parse().unwrap();

    Reply {
        status,
        headers: head.to_ascii_lowercase(),
        body: serde_json::from_str(payload).unwrap_or(serde_json::Value::Null),
    }
}

#[tokio::test]
async fn test_catalog_and_user_reads() {
    let addr = spawn_server().await;

    let reply = request(addr, "GET", "/healthz", None).await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body["status"], "ok");

    let reply = request(addr, "GET", "/catalog", None).await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body.as_array().unwrap().len(), 3);
    assert_eq!(reply.body[0]["hasRedFlag"], true);

    let reply = request(addr, "GET", "/coaches", None).await;
    assert_eq!(reply.body.as_array().unwrap().len(), 3);

    let reply = request(addr, "GET", "/users/u1", None).await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body["tokens"], 8);

    let reply = request(addr, "GET", "/coaches/user/nobody", None).await;
    assert_eq!(reply.status, 404);
    assert_eq!(reply.body["error"], "not_found");
    assert_eq!(reply.body["entity"], "user");
}

#[tokio::test]
async fn test_unlock_then_throttle() {
    let addr = spawn_server().await;

    let reply = request(addr, "POST", "/catalog/c1/unlock", Some(r#"{"userId":"u1"}"#)).await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body["success"], true);
    assert_eq!(reply.body["requiresRiskAcknowledgement"], true);
    assert_eq!(reply.body["updatedUser"]["tokens"], 3);
    assert_eq!(reply.body["updatedUser"]["unlockedCoaches"][0], "c1");

    let reply = request(addr, "POST", "/coaches/c2/unlock", Some(r#"{"userId":"u1"}"#)).await;
    assert_eq!(reply.status, 429);
    assert_eq!(reply.body["error"], "rate_limited");
    let secs = reply.body["retryAfterSeconds"].as_u64().unwrap();
    assert!((1..=5).contains(&secs));
    assert!(reply.headers.contains(&format!("retry-after: {secs}")));

    let reply = request(addr, "GET", "/users/u1/history", None).await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body.as_array().unwrap().len(), 1);
    assert_eq!(reply.body[0]["coachId"], "c1");
}

#[tokio::test]
async fn test_unreadable_unlock_body_is_a_json_bad_request() {
    let addr = spawn_server().await;

    let reply = request(addr, "POST", "/catalog/c2/unlock", Some("{}")).await;
    assert_eq!(reply.status, 400);
    assert!(reply.headers.contains("content-type: application/json"));
    assert_eq!(reply.body["error"], "bad_request");
    assert!(reply.body["message"].as_str().unwrap().contains("userId"));

    let reply = request(addr, "POST", "/coaches/c2/unlock", Some("not json")).await;
    assert_eq!(reply.status, 400);
    assert_eq!(reply.body["error"], "bad_request");

    // Undecodable bodies never reach the guard, so the user's window is untouched.
    let reply = request(addr, "POST", "/catalog/c2/unlock", Some(r#"{"userId":"u1"}"#)).await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body["updatedUser"]["tokens"], 3);
}

#[tokio::test]
async fn test_precondition_failures_are_bad_requests() {
    let addr = spawn_server().await;

    let reply = request(addr, "POST", "/catalog/c3/unlock", Some(r#"{"userId":"u1"}"#)).await;
    assert_eq!(reply.status, 400);
    assert_eq!(reply.body["error"], "precondition_failed");
    assert_eq!(reply.body["reason"], "unavailable");

    let reply = request(addr, "POST", "/catalog/c1/unlock", Some(r#"{"userId":"nobody"}"#)).await;
    assert_eq!(reply.status, 404);
    assert_eq!(reply.body["entity"], "user");
}
