//! Integration test common infrastructure.
//!
//! Provides utilities for spawning test servers, creating test clients, and
//! asserting on wire frames.

pub mod client;
pub mod server;

#[allow(unused_imports)]
pub use client::TestClient;
#[allow(unused_imports)]
pub use server::TestServer;

use serde_json::Value;

/// Send one unary request on a fresh connection and return the response frame.
#[allow(dead_code)]
pub async fn unary(address: &str, frame: Value) -> anyhow::Result<Value> {
    let mut client = TestClient::connect(address).await?;
    client.send(&frame).await?;
    client.recv().await
}

/// Assert a mutation succeeded.
#[allow(dead_code)]
pub fn assert_ok(frame: &Value) {
    assert_eq!(frame["type"], "status", "unexpected frame: {frame}");
    assert_eq!(frame["status"]["ok"], true, "mutation failed: {frame}");
}

/// Assert a mutation failed with the given message.
#[allow(dead_code)]
pub fn assert_failed(frame: &Value, message: &str) {
    assert_eq!(frame["type"], "status", "unexpected frame: {frame}");
    assert_eq!(frame["status"]["ok"], false, "expected failure: {frame}");
    assert_eq!(frame["status"]["message"], message, "wrong reason: {frame}");
}
