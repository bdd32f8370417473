//! Stream session identity and per-session types.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Server-unique identifier for one streaming RPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Generates session ids from an atomic counter.
pub struct SessionIdGenerator {
    counter: AtomicU64,
}

impl SessionIdGenerator {
    /// Create a new generator.
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(1),
        }
    }

    /// Generate the next unique session id.
    pub fn next(&self) -> SessionId {
        SessionId(self.counter.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SessionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// The server-side state of one streaming RPC.
#[derive(Debug, Clone)]
pub struct StreamSession {
    pub id: SessionId,
    pub display_name: String,
    pub room_path: String,
    pub remote_address: String,
    /// Read-only observer: no join/leave notices are emitted for it.
    pub is_tail: bool,
    pub joined_at: DateTime<Utc>,
}

impl StreamSession {
    pub fn new(
        id: SessionId,
        display_name: String,
        room_path: String,
        remote_address: String,
        is_tail: bool,
    ) -> Self {
        Self {
            id,
            display_name,
            room_path,
            remote_address,
            is_tail,
            joined_at: Utc::now(),
        }
    }
}

/// A client-originated streaming request, decoded from the wire.
#[derive(Debug, Clone)]
pub enum StreamRequest {
    Join { name: String, room: String },
    Tail { room: String },
    Chat { text: String },
}

/// An event delivered to a session's outbound queue.
#[derive(Debug, Clone)]
pub struct StreamEvent {
    pub sender: String,
    pub text: String,
}
