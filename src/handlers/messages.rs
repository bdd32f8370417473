//! Message operations: list, search, and write.

use super::Context;
use super::nodes::get_node;
use crate::db::{MessageRecord, NodeKind, NodeRecord};
use crate::error::DomainError;
use crate::path::NodePath;
use crate::proto::{MessageInfo, ServerFrame};
use chrono::DateTime;

/// Resolve a path that must name a room.
pub(crate) async fn resolve_room(
    ctx: &Context,
    path: &NodePath,
) -> Result<NodeRecord, DomainError> {
    let node = get_node(ctx, path).await?;
    if node.kind != NodeKind::Room {
        return Err(DomainError::InvalidArgument(format!(
            "'{path}' is not a room"
        )));
    }
    Ok(node)
}

/// The most recent `limit` messages of a room, oldest first.
pub async fn list_messages(
    ctx: &Context,
    room_path: &str,
    limit: u32,
) -> Result<ServerFrame, DomainError> {
    let path = NodePath::parse(room_path)?;
    let room = resolve_room(ctx, &path).await?;

    let messages = ctx
        .db
        .messages()
        .list_messages(room.id, limit, 0)
        .await?
        .into_iter()
        .map(message_info)
        .collect();
    Ok(ServerFrame::Messages { messages })
}

/// Messages of a room whose content matches the regex.
pub async fn search_message(
    ctx: &Context,
    path: &str,
    pattern: &str,
) -> Result<ServerFrame, DomainError> {
    let path = NodePath::parse(path)?;
    let room = resolve_room(ctx, &path).await?;

    let messages = ctx
        .db
        .messages()
        .search_messages(room.id, pattern)
        .await?
        .into_iter()
        .map(message_info)
        .collect();
    Ok(ServerFrame::Messages { messages })
}

/// Append one message, attributed to the caller's display name resolved from
/// their profile.
pub async fn write_message(
    ctx: &Context,
    destination_path: &str,
    text: &str,
    owner_token: &str,
) -> Result<(), DomainError> {
    let path = NodePath::parse(destination_path)?;
    let room = resolve_room(ctx, &path).await?;

    let config = ctx.db.configs().get_config(owner_token).await?;
    ctx.db
        .messages()
        .create_message(room.id, &config.display_name, text)
        .await?;
    Ok(())
}

fn message_info(message: MessageRecord) -> MessageInfo {
    MessageInfo {
        owner_name: message.display_name,
        content: message.content,
        created: DateTime::from_timestamp_nanos(message.created_at),
    }
}
