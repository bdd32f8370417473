//! Unified error handling for chatfsd.
//!
//! Domain operations return typed errors; the network layer translates them
//! into wire `Status` payloads for mutations or error frames for reads.

use crate::db::DbError;
use crate::proto::Status;
use thiserror::Error;

/// Errors surfaced by the use-case layer.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("permission denied")]
    PermissionDenied,

    #[error("{0}")]
    InvalidArgument(String),

    #[error("invalid pattern: {0}")]
    InvalidRegex(regex::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("storage error: {0}")]
    Storage(DbError),
}

impl DomainError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::PermissionDenied => "permission_denied",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::InvalidRegex(_) => "invalid_regex",
            Self::Protocol(_) => "protocol_error",
            Self::Storage(_) => "storage_error",
        }
    }

    /// Whether this is an infrastructure failure rather than a domain one.
    ///
    /// Infrastructure failures become RPC error frames even on mutations;
    /// domain failures become `Status { ok: false }`.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Convert to a failed wire `Status`.
    pub fn to_status(&self) -> Status {
        Status {
            ok: false,
            message: self.to_string(),
        }
    }
}

impl From<DbError> for DomainError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound => Self::NotFound,
            DbError::AlreadyExists => Self::AlreadyExists,
            DbError::DirectoryNotEmpty => Self::InvalidArgument("directory not empty".to_string()),
            DbError::MoveIntoSelf => {
                Self::InvalidArgument("cannot move a directory beneath itself".to_string())
            }
            DbError::InvalidRegex(e) => Self::InvalidRegex(e),
            other => Self::Storage(other),
        }
    }
}
