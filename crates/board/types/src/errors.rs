//! Error types for the Board of Directors engine

use crate::{ActionId, Identity};
use serde::{Deserialize, Serialize};

/// Coarse classification of a [`BoardError`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller lacks the required authority
    Unauthorized,
    /// Unknown action
    NotFound,
    /// Operation conflicts with the action's current state
    InvalidState,
    /// Malformed identity or set
    InvalidInput,
    /// The dispatched command failed and the approval was rolled back
    ExecutionFailure,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unauthorized => "unauthorized",
            Self::NotFound => "not_found",
            Self::InvalidState => "invalid_state",
            Self::InvalidInput => "invalid_input",
            Self::ExecutionFailure => "execution_failure",
        };
        f.write_str(s)
    }
}

/// Errors that can occur in board operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error("unauthorized: {0} is not a board member")]
    NotMember(Identity),

    #[error("unauthorized: {0} is not the voting authority")]
    NotVotingAuthority(Identity),

    #[error("unauthorized: only self")]
    OnlySelf,

    #[error("action not found: {0}")]
    ActionNotFound(ActionId),

    #[error("action already executed: {0}")]
    AlreadyExecuted(ActionId),

    #[error("{approver} already approved {action_id}")]
    AlreadyApproved {
        action_id: ActionId,
        approver: Identity,
    },

    #[error("{approver} has not approved {action_id}")]
    NotApproved {
        action_id: ActionId,
        approver: Identity,
    },

    #[error("null identity is not allowed")]
    NullIdentity,

    #[error("owner already exists: {0}")]
    OwnerAlreadyExists(Identity),

    #[error("owner not found: {0}")]
    OwnerNotFound(Identity),

    #[error("{0} set must not be empty")]
    EmptySet(&'static str),

    #[error("target {0} is reserved for the engine itself")]
    ReservedTarget(Identity),

    #[error("{0} cannot run while one of this board's actions is executing")]
    Reentrant(&'static str),

    #[error("execution of {action_id} failed: {reason}")]
    ExecutionFailure { action_id: ActionId, reason: String },
}

impl BoardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotMember(_) | Self::NotVotingAuthority(_) | Self::OnlySelf => {
                ErrorKind::Unauthorized
            }
            Self::ActionNotFound(_) => ErrorKind::NotFound,
            Self::AlreadyExecuted(_)
            | Self::AlreadyApproved { .. }
            | Self::NotApproved { .. }
            | Self::Reentrant(_) => ErrorKind::InvalidState,
            Self::NullIdentity
            | Self::OwnerAlreadyExists(_)
            | Self::OwnerNotFound(_)
            | Self::EmptySet(_)
            | Self::ReservedTarget(_) => ErrorKind::InvalidInput,
            Self::ExecutionFailure { .. } => ErrorKind::ExecutionFailure,
        }
    }

    /// Only a failed execution may succeed if simply attempted again
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ExecutionFailure { .. })
    }
}

/// Result type alias for board operations
pub type BoardResult<T> = Result<T, BoardError>;
