//! Request handlers: the use-case layer between the wire and the stores.
//!
//! All mutating operations resolve the target node first, then verify the
//! caller's token against the node's owner. Reads require no token.

pub mod config;
pub mod messages;
pub mod nodes;
pub mod stream;

use crate::db::Database;
use crate::error::DomainError;
use crate::proto::{ClientFrame, ServerFrame, Status};
use crate::state::StreamManager;
use std::sync::Arc;
use tracing::{debug, error};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct Context {
    pub db: Database,
    pub streams: Arc<StreamManager>,
}

/// Dispatch a unary request frame, producing exactly one response frame.
///
/// Domain failures on mutations become `Status { ok: false }`; failures on
/// reads and all storage failures become an error frame, the RPC-error
/// analogue.
pub async fn dispatch(ctx: &Context, frame: ClientFrame) -> ServerFrame {
    match frame {
        ClientFrame::GetConfig { owner_token } => {
            read_reply(config::get_config(ctx, &owner_token).await)
        }
        ClientFrame::SetConfig {
            owner_token,
            display_name,
        } => mutation_reply(config::set_config(ctx, &owner_token, &display_name).await),
        ClientFrame::CheckDirectoryExists { path } => {
            read_reply(nodes::check_directory_exists(ctx, &path).await)
        }
        ClientFrame::CreateRoom { path, owner_token } => {
            mutation_reply(nodes::create_room(ctx, &path, &owner_token).await)
        }
        ClientFrame::CreateDirectory { path, owner_token } => {
            mutation_reply(nodes::create_directory(ctx, &path, &owner_token).await)
        }
        ClientFrame::DeletePath { path, owner_token } => {
            mutation_reply(nodes::delete_path(ctx, &path, &owner_token).await)
        }
        ClientFrame::CopyPath {
            source_path,
            destination_path,
            owner_token,
        } => mutation_reply(nodes::copy_path(ctx, &source_path, &destination_path, &owner_token).await),
        ClientFrame::MovePath {
            source_path,
            destination_path,
            owner_token,
        } => mutation_reply(nodes::move_path(ctx, &source_path, &destination_path, &owner_token).await),
        ClientFrame::ListNodes { path } => read_reply(nodes::list_nodes(ctx, &path).await),
        ClientFrame::ListMessages { room_path, limit } => {
            read_reply(messages::list_messages(ctx, &room_path, limit).await)
        }
        ClientFrame::SearchMessage { path, pattern } => {
            read_reply(messages::search_message(ctx, &path, &pattern).await)
        }
        ClientFrame::WriteMessage {
            destination_path,
            text_content,
            owner_token,
        } => mutation_reply(
            messages::write_message(ctx, &destination_path, &text_content, &owner_token).await,
        ),
        ClientFrame::Join { .. } | ClientFrame::Tail { .. } | ClientFrame::Chat { .. } => {
            ServerFrame::Error {
                message: "stream frame outside a stream".to_string(),
            }
        }
    }
}

fn mutation_reply(result: Result<(), DomainError>) -> ServerFrame {
    match result {
        Ok(()) => ServerFrame::Status {
            status: Status::ok(),
        },
        Err(e) if e.is_storage() => {
            error!(code = e.error_code(), error = %e, "mutation failed");
            ServerFrame::Error {
                message: e.to_string(),
            }
        }
        Err(e) => {
            debug!(code = e.error_code(), error = %e, "mutation rejected");
            ServerFrame::Status {
                status: e.to_status(),
            }
        }
    }
}

fn read_reply(result: Result<ServerFrame, DomainError>) -> ServerFrame {
    result.unwrap_or_else(|e| {
        if e.is_storage() {
            error!(code = e.error_code(), error = %e, "read failed");
        } else {
            debug!(code = e.error_code(), error = %e, "read rejected");
        }
        ServerFrame::Error {
            message: e.to_string(),
        }
    })
}
