//! Profile operations: get and set the display name bound to a token.

use super::Context;
use crate::error::DomainError;
use crate::proto::ServerFrame;

pub async fn get_config(ctx: &Context, owner_token: &str) -> Result<ServerFrame, DomainError> {
    let config = ctx.db.configs().get_config(owner_token).await?;
    Ok(ServerFrame::Config {
        display_name: config.display_name,
    })
}

/// Create the caller's profile. Profiles are created at first use and are
/// immutable afterwards.
pub async fn set_config(
    ctx: &Context,
    owner_token: &str,
    display_name: &str,
) -> Result<(), DomainError> {
    if owner_token.is_empty() {
        return Err(DomainError::InvalidArgument(
            "owner token must not be empty".to_string(),
        ));
    }
    if display_name.trim().is_empty() {
        return Err(DomainError::InvalidArgument(
            "display name must not be empty".to_string(),
        ));
    }

    ctx.db
        .configs()
        .create_config(owner_token, display_name)
        .await?;
    Ok(())
}
