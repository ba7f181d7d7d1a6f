//! Error types shared across botkeeper crates.
//!
//! Supervisor-level errors (the ones reported to the API boundary) live in
//! `botkeeper-runtime`.

use thiserror::Error;

use crate::record::{BotId, CommandId, OwnerId};

// =============================================================================
// Store Errors
// =============================================================================

/// Errors that can occur while reading or writing persisted records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No bot with this id exists.
    #[error("bot '{0}' not found")]
    NotFound(BotId),

    /// No owner with this id exists.
    #[error("owner '{0}' not found")]
    OwnerNotFound(OwnerId),

    /// The record was saved by someone else since it was loaded.
    #[error("bot '{id}' was modified concurrently (expected revision {expected}, found {found})")]
    Conflict {
        /// The bot being saved.
        id: BotId,
        /// Revision the caller loaded.
        expected: u64,
        /// Revision currently stored.
        found: u64,
    },

    /// The requester is neither the owner nor an admin.
    #[error("requester '{requester}' may not manage bot '{bot_id}'")]
    Unauthorized {
        /// The bot being accessed.
        bot_id: BotId,
        /// The rejected requester.
        requester: OwnerId,
    },

    /// Another command with the same (case-insensitive) name exists.
    #[error("a command named '{0}' already exists")]
    DuplicateCommand(String),

    /// No command with this id exists on the bot.
    #[error("command '{0}' not found")]
    CommandNotFound(CommandId),

    /// The record violates an invariant.
    #[error("invalid record: {0}")]
    Invalid(String),

    /// The backing store failed.
    #[error("record store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Creates an invalid-record error with the given message.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

// =============================================================================
// Gateway Errors
// =============================================================================

/// Errors returned by outbound gateway actions.
///
/// Session loss is never returned from the event stream; it arrives as a
/// `GatewayEvent::ConnectionError` instead.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The session could not be established.
    #[error("gateway connection failed: {reason}")]
    ConnectionFailed {
        /// Reason for failure.
        reason: String,
    },

    /// The session has been closed.
    #[error("gateway session is closed")]
    Closed,

    /// The text could not be delivered.
    #[error("failed to send message: {0}")]
    SendFailed(String),

    /// The role could not be granted.
    #[error("failed to grant role '{role_id}': {reason}")]
    RoleGrantFailed {
        /// The role that was requested.
        role_id: String,
        /// Reason for failure.
        reason: String,
    },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for gateway actions.
pub type GatewayResult<T> = Result<T, GatewayError>;
