//! Board notifications
//!
//! Every committed state transition produces one [`BoardEvent`]. Events carry
//! enough context (ids, targets, descriptions, full sets) for an activity
//! feed to render history without querying the engine again.

use crate::{ActionId, Identity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A committed state transition
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoardEvent {
    ActionProposed {
        action_id: ActionId,
        proposer: Identity,
        target: Identity,
        description: String,
        command: String,
    },
    ActionApproved {
        action_id: ActionId,
        approver: Identity,
        target: Identity,
        description: String,
        approval_count: usize,
    },
    ApprovalRevoked {
        action_id: ActionId,
        approver: Identity,
        target: Identity,
        description: String,
        approval_count: usize,
    },
    ActionExecuted {
        action_id: ActionId,
        target: Identity,
        description: String,
        approvers: Vec<Identity>,
    },
    MembershipChanged { members: Vec<Identity> },
    OwnersChanged { owners: Vec<Identity> },
}

impl BoardEvent {
    /// Stable snake_case name of the event type
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ActionProposed { .. } => "action_proposed",
            Self::ActionApproved { .. } => "action_approved",
            Self::ApprovalRevoked { .. } => "approval_revoked",
            Self::ActionExecuted { .. } => "action_executed",
            Self::MembershipChanged { .. } => "membership_changed",
            Self::OwnersChanged { .. } => "owners_changed",
        }
    }

    /// The action this event concerns, if any
    pub fn action_id(&self) -> Option<ActionId> {
        match self {
            Self::ActionProposed { action_id, .. }
            | Self::ActionApproved { action_id, .. }
            | Self::ApprovalRevoked { action_id, .. }
            | Self::ActionExecuted { action_id, .. } => Some(*action_id),
            Self::MembershipChanged { .. } | Self::OwnersChanged { .. } => None,
        }
    }
}

/// An event as delivered to sinks
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BoardEventEnvelope {
    pub id: uuid::Uuid,
    /// Monotonic per-engine publication order
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub event: BoardEvent,
}

impl BoardEventEnvelope {
    pub fn new(sequence: u64, event: BoardEvent) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            sequence,
            timestamp: Utc::now(),
            event,
        }
    }
}
