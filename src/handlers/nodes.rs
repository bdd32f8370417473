//! Namespace operations: create, delete, copy, move, and list nodes.

use super::Context;
use crate::db::{NodeKind, NodeRecord};
use crate::error::DomainError;
use crate::path::NodePath;
use crate::proto::{NodeInfo, NodeType, ServerFrame};
use chrono::DateTime;

/// Resolve a path to its node, mapping repository errors into the domain.
pub(crate) async fn get_node(ctx: &Context, path: &NodePath) -> Result<NodeRecord, DomainError> {
    Ok(ctx.db.nodes().get_node_by_path(&path.as_string()).await?)
}

/// Split a path into (parent, basename); the root has neither.
fn split(path: &NodePath) -> Result<(NodePath, String), DomainError> {
    match (path.parent(), path.basename()) {
        (Some(parent), Some(name)) => Ok((parent, name.to_string())),
        _ => Err(DomainError::InvalidArgument(
            "path must not be the root".to_string(),
        )),
    }
}

fn require_owner(node: &NodeRecord, owner_token: &str) -> Result<(), DomainError> {
    if node.owner_token.as_deref() != Some(owner_token) {
        return Err(DomainError::PermissionDenied);
    }
    Ok(())
}

/// Resolve the parent of `path`, which must exist and be a directory.
async fn resolve_parent_directory(
    ctx: &Context,
    path: &NodePath,
) -> Result<(NodeRecord, String), DomainError> {
    let (parent, name) = split(path)?;
    let parent_node = get_node(ctx, &parent).await?;
    if parent_node.kind != NodeKind::Directory {
        return Err(DomainError::InvalidArgument(format!(
            "'{parent}' is not a directory"
        )));
    }
    Ok((parent_node, name))
}

pub async fn check_directory_exists(ctx: &Context, path: &str) -> Result<ServerFrame, DomainError> {
    let path = NodePath::parse(path)?;
    let exists = ctx
        .db
        .nodes()
        .check_directory_exists(&path.as_string())
        .await?;
    Ok(ServerFrame::Exists { exists })
}

pub async fn create_directory(
    ctx: &Context,
    path: &str,
    owner_token: &str,
) -> Result<(), DomainError> {
    let path = NodePath::parse(path)?;
    let (parent, name) = resolve_parent_directory(ctx, &path).await?;
    ctx.db
        .nodes()
        .create_directory(parent.id, &parent.path, &name, owner_token)
        .await?;
    Ok(())
}

pub async fn create_room(ctx: &Context, path: &str, owner_token: &str) -> Result<(), DomainError> {
    let path = NodePath::parse(path)?;
    let (parent, name) = resolve_parent_directory(ctx, &path).await?;
    ctx.db
        .nodes()
        .create_room(parent.id, &parent.path, &name, owner_token)
        .await?;
    Ok(())
}

/// Delete a node. Directories must be empty; rooms cascade their messages.
pub async fn delete_path(ctx: &Context, path: &str, owner_token: &str) -> Result<(), DomainError> {
    let path = NodePath::parse(path)?;
    let node = get_node(ctx, &path).await?;
    require_owner(&node, owner_token)?;

    match node.kind {
        NodeKind::Directory => ctx.db.nodes().delete_directory(node.id).await?,
        NodeKind::Room => ctx.db.nodes().delete_room(node.id).await?,
    }
    Ok(())
}

/// Where a copy or move lands: an existing directory keeps the source name,
/// an absent destination names the node by its basename.
struct Destination {
    parent_id: i64,
    parent_path: String,
    name: String,
}

async fn resolve_destination(
    ctx: &Context,
    src: &NodeRecord,
    dst: &NodePath,
) -> Result<Destination, DomainError> {
    let (dst_parent, dst_name) = split(dst)?;
    let parent_node = get_node(ctx, &dst_parent).await?;
    if parent_node.kind != NodeKind::Directory {
        return Err(DomainError::InvalidArgument(format!(
            "'{dst_parent}' is not a directory"
        )));
    }

    match get_node(ctx, dst).await {
        Ok(node) if node.kind == NodeKind::Directory => Ok(Destination {
            parent_id: node.id,
            parent_path: node.path,
            name: src.name.clone(),
        }),
        Ok(_) => Err(DomainError::AlreadyExists),
        Err(DomainError::NotFound) => Ok(Destination {
            parent_id: parent_node.id,
            parent_path: parent_node.path,
            name: dst_name,
        }),
        Err(e) => Err(e),
    }
}

/// Resolve the source of a copy or move: must be a room owned by the caller.
async fn resolve_source_room(
    ctx: &Context,
    src: &NodePath,
    owner_token: &str,
) -> Result<NodeRecord, DomainError> {
    let node = get_node(ctx, src).await?;
    if node.kind != NodeKind::Room {
        return Err(DomainError::InvalidArgument(
            "source path is not a room".to_string(),
        ));
    }
    require_owner(&node, owner_token)?;
    Ok(node)
}

/// Copy a room, duplicating its entire message history atomically.
pub async fn copy_path(
    ctx: &Context,
    source_path: &str,
    destination_path: &str,
    owner_token: &str,
) -> Result<(), DomainError> {
    let src = NodePath::parse(source_path)?;
    let dst = NodePath::parse(destination_path)?;

    let src_node = resolve_source_room(ctx, &src, owner_token).await?;
    let dest = resolve_destination(ctx, &src_node, &dst).await?;

    ctx.db
        .nodes()
        .copy_room(
            src_node.id,
            dest.parent_id,
            &dest.parent_path,
            &dest.name,
            owner_token,
        )
        .await?;
    Ok(())
}

/// Move a room: a single repository rename + reparent.
pub async fn move_path(
    ctx: &Context,
    source_path: &str,
    destination_path: &str,
    owner_token: &str,
) -> Result<(), DomainError> {
    let src = NodePath::parse(source_path)?;
    let dst = NodePath::parse(destination_path)?;

    let src_node = resolve_source_room(ctx, &src, owner_token).await?;
    let dest = resolve_destination(ctx, &src_node, &dst).await?;

    ctx.db
        .nodes()
        .move_room(src_node.id, dest.parent_id, &dest.parent_path, &dest.name)
        .await?;
    Ok(())
}

/// List a directory's children, or the node itself for a room.
pub async fn list_nodes(ctx: &Context, path: &str) -> Result<ServerFrame, DomainError> {
    let path = NodePath::parse(path)?;
    let node = get_node(ctx, &path).await?;

    let entries = match node.kind {
        NodeKind::Room => vec![node_info(node)],
        NodeKind::Directory => ctx
            .db
            .nodes()
            .list_children(node.id)
            .await?
            .into_iter()
            .map(node_info)
            .collect(),
    };
    Ok(ServerFrame::Nodes { entries })
}

fn node_info(node: NodeRecord) -> NodeInfo {
    NodeInfo {
        name: node.name,
        node_type: match node.kind {
            NodeKind::Directory => NodeType::Directory,
            NodeKind::Room => NodeType::Room,
        },
        owner_name: node.owner_display_name,
        modified: DateTime::from_timestamp(node.created_at, 0).unwrap_or(DateTime::UNIX_EPOCH),
    }
}
