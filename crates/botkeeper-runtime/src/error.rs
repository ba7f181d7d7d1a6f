//! Supervisor error types and their boundary representation.

use serde::Serialize;
use thiserror::Error;

use botkeeper_core::{BotId, OwnerId, StoreError};

/// Coarse classification of a failure, as reported to the boundary layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    /// Informational: `start` on a live bot reports this through
    /// `StartReport::already_running` rather than failing.
    AlreadyConnected,
    NoLiveConnection,
    /// Informational: login failures surface asynchronously as `error` status.
    ConnectionFailure,
    Storage,
}

/// Errors returned by [`Supervisor`](crate::Supervisor) operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SupervisorError {
    /// No bot record with this id.
    #[error("Bot not found: {0}")]
    NotFound(BotId),

    /// The requester neither owns the bot nor is an administrator.
    #[error("Requester {requester} may not manage bot {bot_id}")]
    Unauthorized { bot_id: BotId, requester: OwnerId },

    /// `stop` was called for a bot that is not running.
    #[error("Bot {0} has no live connection")]
    NoLiveConnection(BotId),

    /// The record store failed.
    #[error("Record store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for SupervisorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::Unauthorized { bot_id, requester } => {
                Self::Unauthorized { bot_id, requester }
            }
            other => Self::Store(other),
        }
    }
}

impl SupervisorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::NoLiveConnection(_) => ErrorKind::NoLiveConnection,
            Self::Store(_) => ErrorKind::Storage,
        }
    }
}

/// Serializable error body for the boundary layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&SupervisorError> for ApiError {
    fn from(err: &SupervisorError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<SupervisorError> for ApiError {
    fn from(err: SupervisorError) -> Self {
        Self::from(&err)
    }
}

/// Result type for supervisor operations.
pub type SupervisorResult<T> = Result<T, SupervisorError>;
