//! Streaming session state machine.
//!
//! One call per streaming RPC. The adapter feeds decoded requests into the
//! inbound queue and owns its sender: queue closure is the disconnect signal.
//! Events flow back through the outbound queue, which the stream manager also
//! delivers broadcasts into once the session is registered.
//!
//! States: New --join--> Chatting, New --tail--> Tailing; anything else on
//! the first frame is a protocol error. Join and leave notices are persisted
//! as ordinary messages so reconnecting clients see them in history.

use super::Context;
use super::messages::resolve_room;
use crate::error::DomainError;
use crate::path::NodePath;
use crate::state::{SessionId, StreamEvent, StreamRequest, StreamSession};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Drive one streaming session from first frame to disconnect.
pub async fn handle_stream_session(
    ctx: Context,
    mut inbound: mpsc::Receiver<StreamRequest>,
    outbound: mpsc::Sender<StreamEvent>,
    session_id: SessionId,
    remote: String,
) -> Result<(), DomainError> {
    ctx.streams.register_session(session_id, outbound);
    let result = run_session(&ctx, &mut inbound, session_id, &remote).await;
    ctx.streams.unregister_session(session_id);
    result
}

async fn run_session(
    ctx: &Context,
    inbound: &mut mpsc::Receiver<StreamRequest>,
    session_id: SessionId,
    remote: &str,
) -> Result<(), DomainError> {
    let Some(first) = inbound.recv().await else {
        // Disconnected before the opening frame.
        return Ok(());
    };

    match first {
        StreamRequest::Join { name, room } => {
            chat_session(ctx, inbound, session_id, remote, name, room).await
        }
        StreamRequest::Tail { room } => tail_session(ctx, inbound, session_id, remote, room).await,
        StreamRequest::Chat { .. } => Err(DomainError::Protocol(
            "first frame must be join or tail".to_string(),
        )),
    }
}

async fn chat_session(
    ctx: &Context,
    inbound: &mut mpsc::Receiver<StreamRequest>,
    session_id: SessionId,
    remote: &str,
    name: String,
    room: String,
) -> Result<(), DomainError> {
    let path = NodePath::parse(&room)?;
    let node = resolve_room(ctx, &path).await?;
    let room_path = path.as_string();

    // An unnamed joiner is identified by its remote address.
    let name = if name.trim().is_empty() {
        remote.to_string()
    } else {
        name
    };

    ctx.streams.join_room(StreamSession::new(
        session_id,
        name.clone(),
        room_path.clone(),
        remote.to_string(),
        false,
    ));
    info!(session = %session_id, room = %room_path, name = %name, "session joined");

    announce(ctx, node.id, &room_path, &name, &format!("{name} joined #{room_path}")).await;

    let mut protocol_error = None;
    while let Some(request) = inbound.recv().await {
        match request {
            StreamRequest::Chat { text } => {
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                ctx.streams.broadcast(&room_path, &name, text);
                persist(ctx, node.id, &name, text).await;
            }
            StreamRequest::Join { .. } | StreamRequest::Tail { .. } => {
                protocol_error = Some(DomainError::Protocol(
                    "session already initialised".to_string(),
                ));
                break;
            }
        }
    }

    announce(ctx, node.id, &room_path, &name, &format!("{name} left #{room_path}")).await;
    ctx.streams.leave_room(session_id);
    info!(session = %session_id, room = %room_path, name = %name, "session left");

    match protocol_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

async fn tail_session(
    ctx: &Context,
    inbound: &mut mpsc::Receiver<StreamRequest>,
    session_id: SessionId,
    remote: &str,
    room: String,
) -> Result<(), DomainError> {
    let path = NodePath::parse(&room)?;
    resolve_room(ctx, &path).await?;
    let room_path = path.as_string();

    // Tail observers join silently: no notice on entry or exit.
    ctx.streams.join_room(StreamSession::new(
        session_id,
        remote.to_string(),
        room_path.clone(),
        remote.to_string(),
        true,
    ));
    info!(session = %session_id, room = %room_path, "tail session attached");

    while let Some(request) = inbound.recv().await {
        debug!(session = %session_id, ?request, "ignoring input from tail session");
    }

    ctx.streams.leave_room(session_id);
    info!(session = %session_id, room = %room_path, "tail session detached");
    Ok(())
}

/// Broadcast a notice and persist it as an ordinary message.
async fn announce(ctx: &Context, room_id: i64, room_path: &str, name: &str, text: &str) {
    ctx.streams.broadcast(room_path, name, text);
    if let Err(e) = ctx.db.messages().create_message(room_id, name, text).await {
        warn!(room = %room_path, error = %e, "failed to persist notice");
    }
}

/// Persist a chat message; a storage failure never interrupts the stream.
async fn persist(ctx: &Context, room_id: i64, name: &str, text: &str) {
    if let Err(e) = ctx.db.messages().create_message(room_id, name, text).await {
        warn!(room = %room_id, error = %e, "failed to persist chat message");
    }
}
