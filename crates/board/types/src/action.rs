//! Actions: proposed operations awaiting quorum approval

use crate::{Command, Identity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Sequential action identifier, never reused
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(pub u64);

impl ActionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "A{}", self.0)
    }
}

/// Lifecycle state of an action
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ActionState {
    /// Collecting approvals
    #[default]
    Proposed,
    /// Dispatched successfully (terminal)
    Executed,
}

/// A proposed operation and its approval state.
///
/// The approval count is derived from `approvers`, so it can never drift
/// from the set it counts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Action {
    pub id: ActionId,
    /// Member that proposed the action
    pub proposer: Identity,
    /// Collaborator the command is dispatched against
    pub target: Identity,
    pub description: String,
    pub command: Command,
    approvers: BTreeSet<Identity>,
    is_executed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
}

impl Action {
    /// Create a proposed action carrying the proposer's implicit approval
    pub fn new(
        id: ActionId,
        proposer: Identity,
        target: Identity,
        description: impl Into<String>,
        command: Command,
    ) -> Self {
        let mut approvers = BTreeSet::new();
        approvers.insert(proposer.clone());
        Self {
            id,
            proposer,
            target,
            description: description.into(),
            command,
            approvers,
            is_executed: false,
            created_at: Utc::now(),
            executed_at: None,
        }
    }

    pub fn approvers(&self) -> &BTreeSet<Identity> {
        &self.approvers
    }

    pub fn approval_count(&self) -> usize {
        self.approvers.len()
    }

    pub fn is_approved_by(&self, identity: &Identity) -> bool {
        self.approvers.contains(identity)
    }

    pub fn is_executed(&self) -> bool {
        self.is_executed
    }

    pub fn state(&self) -> ActionState {
        if self.is_executed {
            ActionState::Executed
        } else {
            ActionState::Proposed
        }
    }

    /// Record an approval. Returns false if it was already recorded.
    pub fn add_approver(&mut self, approver: Identity) -> bool {
        self.approvers.insert(approver)
    }

    /// Drop an approval. Returns false if it was never recorded.
    pub fn remove_approver(&mut self, approver: &Identity) -> bool {
        self.approvers.remove(approver)
    }

    /// Move to the terminal state. There is no way back.
    pub fn mark_executed(&mut self) {
        self.is_executed = true;
        self.executed_at = Some(Utc::now());
    }
}
