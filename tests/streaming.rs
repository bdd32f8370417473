//! Integration tests for the streaming channel: join, chat, tail, history.

mod common;

use common::{TestClient, TestServer, assert_ok, unary};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::time::sleep;

async fn setup_room(address: &str, token: &str, name: &str, room: &str) {
    let response = unary(
        address,
        json!({"type": "set_config", "owner_token": token, "display_name": name}),
    )
    .await
    .expect("set_config failed");
    assert_ok(&response);

    let response = unary(
        address,
        json!({"type": "create_directory", "path": "/a", "owner_token": token}),
    )
    .await
    .expect("create_directory failed");
    assert_ok(&response);

    let response = unary(
        address,
        json!({"type": "create_room", "path": room, "owner_token": token}),
    )
    .await
    .expect("create_room failed");
    assert_ok(&response);
}

fn event(frame: &Value) -> (String, String) {
    assert_eq!(frame["type"], "event", "unexpected frame: {frame}");
    (
        frame["name"].as_str().expect("name").to_string(),
        frame["text"].as_str().expect("text").to_string(),
    )
}

/// Poll the room history until the predicate holds; persistence of stream
/// notices trails their broadcast.
async fn wait_for_history<F>(address: &str, room: &str, predicate: F) -> Vec<String>
where
    F: Fn(&[String]) -> bool,
{
    for _ in 0..40 {
        let response = unary(
            address,
            json!({"type": "list_messages", "room_path": room, "limit": 50}),
        )
        .await
        .expect("list_messages failed");
        if response["type"] == "messages" {
            let contents: Vec<String> = response["messages"]
                .as_array()
                .expect("messages array")
                .iter()
                .map(|m| m["content"].as_str().expect("content").to_string())
                .collect();
            if predicate(&contents) {
                return contents;
            }
        }
        sleep(Duration::from_millis(50)).await;
    }
    panic!("history of {room} did not converge");
}

#[tokio::test]
async fn test_broadcast_between_sessions() {
    let server = TestServer::spawn(17731).await.expect("spawn server");
    let address = server.address();
    setup_room(&address, "T1", "alice", "/a/r").await;

    let mut u1 = TestClient::connect(&address).await.expect("connect u1");
    u1.send(&json!({"type": "join", "name": "u1", "room": "/a/r"}))
        .await
        .expect("join u1");
    assert_eq!(
        event(&u1.recv().await.expect("u1 own join")),
        ("u1".into(), "u1 joined #/a/r".into())
    );

    let mut u2 = TestClient::connect(&address).await.expect("connect u2");
    u2.send(&json!({"type": "join", "name": "u2", "room": "/a/r"}))
        .await
        .expect("join u2");
    assert_eq!(
        event(&u2.recv().await.expect("u2 own join")),
        ("u2".into(), "u2 joined #/a/r".into())
    );
    assert_eq!(
        event(&u1.recv().await.expect("u1 sees u2 join")),
        ("u2".into(), "u2 joined #/a/r".into())
    );

    u1.send(&json!({"type": "chat", "text": "hi"}))
        .await
        .expect("chat");

    // Both sessions, including the sender, receive the broadcast exactly once,
    // after the join notifications.
    for client in [&mut u1, &mut u2] {
        assert_eq!(
            event(&client.recv().await.expect("broadcast")),
            ("u1".into(), "hi".into())
        );
        assert!(
            client.recv_timeout(Duration::from_millis(200)).await.is_err(),
            "unexpected extra frame"
        );
    }
}

#[tokio::test]
async fn test_tail_observer() {
    let server = TestServer::spawn(17732).await.expect("spawn server");
    let address = server.address();
    setup_room(&address, "T1", "alice", "/a/r").await;

    let mut tail = TestClient::connect(&address).await.expect("connect tail");
    tail.send(&json!({"type": "tail", "room_path": "/a/r"}))
        .await
        .expect("tail");

    // Attaching emits nothing for the tail itself.
    assert!(tail.recv_timeout(Duration::from_millis(200)).await.is_err());

    let mut u1 = TestClient::connect(&address).await.expect("connect u1");
    u1.send(&json!({"type": "join", "name": "u1", "room": "/a/r"}))
        .await
        .expect("join u1");

    // The tail observes subsequent broadcasts.
    assert_eq!(
        event(&tail.recv().await.expect("tail sees join")),
        ("u1".into(), "u1 joined #/a/r".into())
    );

    u1.send(&json!({"type": "chat", "text": "hi"}))
        .await
        .expect("chat");
    assert_eq!(
        event(&tail.recv().await.expect("tail sees chat")),
        ("u1".into(), "hi".into())
    );

    // Detaching the tail emits no notice either.
    drop(tail);
    u1.send(&json!({"type": "chat", "text": "after"}))
        .await
        .expect("chat");
    let _ = u1.recv().await.expect("u1 own join");
    let _ = u1.recv().await.expect("u1 own hi");
    assert_eq!(
        event(&u1.recv().await.expect("u1 after")),
        ("u1".into(), "after".into())
    );
    drop(u1);

    let history = wait_for_history(&address, "/a/r", |contents| {
        contents.iter().any(|c| c == "u1 left #/a/r")
    })
    .await;
    assert!(
        history.iter().all(|c| !c.contains("tail")),
        "tail produced notices: {history:?}"
    );
}

#[tokio::test]
async fn test_history_records_join_chat_leave() {
    let server = TestServer::spawn(17733).await.expect("spawn server");
    let address = server.address();
    setup_room(&address, "T1", "alice", "/a/r").await;

    let mut u1 = TestClient::connect(&address).await.expect("connect u1");
    u1.send(&json!({"type": "join", "name": "u1", "room": "/a/r"}))
        .await
        .expect("join");
    let _ = u1.recv().await.expect("own join");
    u1.send(&json!({"type": "chat", "text": "one"}))
        .await
        .expect("chat");
    let _ = u1.recv().await.expect("own chat");
    drop(u1);

    let history = wait_for_history(&address, "/a/r", |contents| {
        contents.iter().any(|c| c == "u1 left #/a/r")
    })
    .await;
    assert_eq!(
        history,
        vec!["u1 joined #/a/r", "one", "u1 left #/a/r"]
    );
}

#[tokio::test]
async fn test_rejoin_is_a_fresh_session() {
    let server = TestServer::spawn(17734).await.expect("spawn server");
    let address = server.address();
    setup_room(&address, "T1", "alice", "/a/r").await;

    for _ in 0..2 {
        let mut u1 = TestClient::connect(&address).await.expect("connect");
        u1.send(&json!({"type": "join", "name": "u1", "room": "/a/r"}))
            .await
            .expect("join");
        let _ = u1.recv().await.expect("own join");
        drop(u1);

        // Let the leave sequence land before reconnecting.
        wait_for_history(&address, "/a/r", |contents| {
            contents.last().map(String::as_str) == Some("u1 left #/a/r")
        })
        .await;
    }

    let history = wait_for_history(&address, "/a/r", |contents| contents.len() == 4).await;
    assert_eq!(
        history,
        vec![
            "u1 joined #/a/r",
            "u1 left #/a/r",
            "u1 joined #/a/r",
            "u1 left #/a/r",
        ]
    );
}

#[tokio::test]
async fn test_stream_protocol_errors() {
    let server = TestServer::spawn(17735).await.expect("spawn server");
    let address = server.address();
    setup_room(&address, "T1", "alice", "/a/r").await;

    // Chat before join is refused.
    let mut client = TestClient::connect(&address).await.expect("connect");
    client
        .send(&json!({"type": "chat", "text": "hi"}))
        .await
        .expect("send");
    let response = client.recv().await.expect("error frame");
    assert_eq!(response["type"], "error");

    // Joining something that is not a room ends the stream without events.
    let mut client = TestClient::connect(&address).await.expect("connect");
    client
        .send(&json!({"type": "join", "name": "u1", "room": "/a"}))
        .await
        .expect("send");
    assert!(client.recv().await.is_err(), "stream should be closed");

    let mut client = TestClient::connect(&address).await.expect("connect");
    client
        .send(&json!({"type": "join", "name": "u1", "room": "/missing"}))
        .await
        .expect("send");
    assert!(client.recv().await.is_err(), "stream should be closed");
}

#[tokio::test]
async fn test_blank_chat_is_ignored() {
    let server = TestServer::spawn(17736).await.expect("spawn server");
    let address = server.address();
    setup_room(&address, "T1", "alice", "/a/r").await;

    let mut u1 = TestClient::connect(&address).await.expect("connect");
    u1.send(&json!({"type": "join", "name": "u1", "room": "/a/r"}))
        .await
        .expect("join");
    let _ = u1.recv().await.expect("own join");

    u1.send(&json!({"type": "chat", "text": "   "}))
        .await
        .expect("blank chat");
    u1.send(&json!({"type": "chat", "text": "  real  "}))
        .await
        .expect("chat");

    // The blank message produced no event; the next one is trimmed.
    assert_eq!(
        event(&u1.recv().await.expect("event")),
        ("u1".into(), "real".into())
    );
}
