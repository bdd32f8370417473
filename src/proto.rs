//! Wire protocol frames.
//!
//! The RPC surface is newline-delimited JSON: each frame is a single JSON
//! object tagged by `type`. One TCP connection carries one call — either a
//! unary request answered by exactly one response frame, or a `join`/`tail`
//! frame opening a bidirectional stream of `chat` and `event` frames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A frame sent by a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    GetConfig {
        owner_token: String,
    },
    SetConfig {
        owner_token: String,
        display_name: String,
    },
    CheckDirectoryExists {
        path: String,
    },
    CreateRoom {
        path: String,
        owner_token: String,
    },
    CreateDirectory {
        path: String,
        owner_token: String,
    },
    DeletePath {
        path: String,
        owner_token: String,
    },
    CopyPath {
        source_path: String,
        destination_path: String,
        owner_token: String,
    },
    MovePath {
        source_path: String,
        destination_path: String,
        owner_token: String,
    },
    ListNodes {
        path: String,
    },
    ListMessages {
        room_path: String,
        #[serde(default)]
        limit: u32,
    },
    SearchMessage {
        path: String,
        pattern: String,
    },
    WriteMessage {
        destination_path: String,
        text_content: String,
        owner_token: String,
    },
    Join {
        #[serde(default)]
        name: String,
        room: String,
    },
    Tail {
        room_path: String,
    },
    Chat {
        text: String,
    },
}

/// A frame sent by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Outcome of a mutation.
    Status { status: Status },
    /// Reply to `get_config`.
    Config { display_name: String },
    /// Reply to `check_directory_exists`.
    Exists { exists: bool },
    /// Reply to `list_nodes`.
    Nodes { entries: Vec<NodeInfo> },
    /// Reply to `list_messages` / `search_message`.
    Messages { messages: Vec<MessageInfo> },
    /// A broadcast delivered on a stream.
    Event { name: String, text: String },
    /// An RPC-level failure (transport, validation, storage).
    Error { message: String },
}

/// Outcome of a mutating call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub ok: bool,
    #[serde(default)]
    pub message: String,
}

impl Status {
    pub fn ok() -> Self {
        Self {
            ok: true,
            message: String::new(),
        }
    }
}

/// Node kind on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    Directory,
    Room,
}

/// A namespace entry as reported by `list_nodes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub owner_name: String,
    pub modified: DateTime<Utc>,
}

/// A stored message as reported by `list_messages` / `search_message`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageInfo {
    pub owner_name: String,
    pub content: String,
    pub created: DateTime<Utc>,
}
