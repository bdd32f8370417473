//! The stream manager: registry of live rooms and sessions, with per-room
//! broadcast fan-out.
//!
//! # Architecture
//!
//! Three concurrent maps hold the live state:
//! - `rooms`: path → runtime room (client set + broadcast queue)
//! - `sessions`: session id → session record
//! - `response_queues`: session id → outbound delivery queue
//!
//! Each room owns a bounded broadcast queue and a dedicated fan-out worker.
//! Every enqueue along the delivery path is a non-blocking offer: a saturated
//! broadcast queue drops the newest event for the whole room, a saturated
//! member queue drops the event for that member only. No sender is ever
//! blocked by a slow receiver.
//!
//! # Lock Order (Deadlock Prevention)
//!
//! When acquiring multiple locks, always follow this order:
//!
//! 1. `rooms` shard lock (acquired during `.get()` / `.entry()` / `.remove_if()`)
//! 2. Room client-set shard lock
//! 3. `response_queues` shard lock
//!
//! Never hold a `rooms` guard while calling back into `rooms` (drop the guard
//! first, as `leave_room` does before `remove_if`).

use crate::state::session::{SessionId, StreamEvent, StreamSession};
use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

/// Broadcast ring capacity per room.
const BROADCAST_CAPACITY: usize = 256;

type ResponseQueues = Arc<DashMap<SessionId, mpsc::Sender<StreamEvent>>>;

/// Registry of active rooms and sessions.
pub struct StreamManager {
    rooms: DashMap<String, Room>,
    sessions: DashMap<SessionId, StreamSession>,
    response_queues: ResponseQueues,
    workers: TaskTracker,
}

/// A runtime room: transient, created on first join, dropped when the last
/// member leaves.
struct Room {
    clients: Arc<DashSet<SessionId>>,
    broadcast: mpsc::Sender<StreamEvent>,
}

impl Room {
    /// Create the room and start its fan-out worker. The worker terminates
    /// when the broadcast queue closes, which happens when the room is
    /// removed from the registry.
    fn new(path: String, queues: ResponseQueues, workers: &TaskTracker) -> Self {
        let (broadcast, mut events) = mpsc::channel::<StreamEvent>(BROADCAST_CAPACITY);
        let clients = Arc::new(DashSet::new());

        let members = Arc::clone(&clients);
        workers.spawn(async move {
            while let Some(event) = events.recv().await {
                for member in members.iter() {
                    let session_id = *member;
                    if let Some(queue) = queues.get(&session_id)
                        && queue.try_send(event.clone()).is_err()
                    {
                        debug!(session = %session_id, room = %path, "outbound queue full, dropping event");
                    }
                }
            }
            debug!(room = %path, "fan-out worker stopped");
        });

        Self { clients, broadcast }
    }
}

impl StreamManager {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            sessions: DashMap::new(),
            response_queues: Arc::new(DashMap::new()),
            workers: TaskTracker::new(),
        }
    }

    /// Record a session's outbound delivery queue.
    pub fn register_session(&self, session_id: SessionId, outbound: mpsc::Sender<StreamEvent>) {
        self.response_queues.insert(session_id, outbound);
    }

    /// Remove a session's delivery queue, dropping the manager's sender.
    pub fn unregister_session(&self, session_id: SessionId) {
        self.response_queues.remove(&session_id);
    }

    /// Add a session to its room, creating the room (and its fan-out worker)
    /// lazily on first join.
    pub fn join_room(&self, session: StreamSession) {
        let session_id = session.id;
        let path = session.room_path.clone();
        debug!(
            session = %session_id,
            room = %session.room_path,
            name = %session.display_name,
            remote = %session.remote_address,
            tail = session.is_tail,
            joined_at = %session.joined_at,
            "session joined room"
        );
        self.sessions.insert(session_id, session);

        self.rooms
            .entry(path.clone())
            .or_insert_with(|| Room::new(path, Arc::clone(&self.response_queues), &self.workers))
            .clients
            .insert(session_id);
    }

    /// Remove a session from its room. When membership reaches zero the room
    /// is dropped, closing its broadcast queue exactly once.
    pub fn leave_room(&self, session_id: SessionId) {
        let Some((_, session)) = self.sessions.remove(&session_id) else {
            return;
        };
        debug!(
            session = %session_id,
            room = %session.room_path,
            name = %session.display_name,
            "session left room"
        );

        if let Some(room) = self.rooms.get(&session.room_path) {
            room.clients.remove(&session_id);
        }
        self.rooms
            .remove_if(&session.room_path, |_, room| room.clients.is_empty());
    }

    /// Enqueue a message event onto a room's broadcast queue.
    ///
    /// Non-blocking offer: when the queue is full the newest event is dropped
    /// for the whole room rather than stalling the broadcaster.
    pub fn broadcast(&self, room_path: &str, sender: &str, text: &str) {
        let Some(room) = self.rooms.get(room_path) else {
            warn!(room = %room_path, "broadcast to inactive room");
            return;
        };

        let event = StreamEvent {
            sender: sender.to_string(),
            text: text.to_string(),
        };
        if room.broadcast.try_send(event).is_err() {
            debug!(room = %room_path, "broadcast queue full, dropping event");
        }
    }

    /// Drop every room and wait for the fan-out workers to drain.
    pub async fn shutdown(&self) {
        self.rooms.clear();
        self.sessions.clear();
        self.response_queues.clear();
        self.workers.close();
        self.workers.wait().await;
    }
}

/// Direct delivery and introspection. The server binary drives everything
/// through the broadcast path; these are exercised by the test suite.
#[allow(dead_code)]
impl StreamManager {
    /// Direct, non-broadcast delivery to a single session.
    pub fn send_to_session(&self, session_id: SessionId, event: StreamEvent) {
        let Some(queue) = self.response_queues.get(&session_id) else {
            warn!(session = %session_id, "send to unregistered session");
            return;
        };
        if queue.try_send(event).is_err() {
            debug!(session = %session_id, "outbound queue full, dropping event");
        }
    }

    /// Look up a live session.
    pub fn get_session(&self, session_id: SessionId) -> Option<StreamSession> {
        self.sessions.get(&session_id).map(|s| s.clone())
    }

    /// Whether a room currently has members.
    pub fn is_room_active(&self, room_path: &str) -> bool {
        self.rooms.contains_key(room_path)
    }

    /// Number of sessions joined to a room.
    pub fn room_client_count(&self, room_path: &str) -> usize {
        self.rooms
            .get(room_path)
            .map(|room| room.clients.len())
            .unwrap_or(0)
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for StreamManager {
    fn default() -> Self {
        Self::new()
    }
}
