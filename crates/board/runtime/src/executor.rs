//! Executor - dispatches approved actions
//!
//! An action addressed to the engine's own identity is a self-call and is
//! routed to the owner registry. Anything else goes to the handler
//! registered for its target. Every failure comes back as a single
//! [`BoardError::ExecutionFailure`] so the ledger can roll the approval back.

use board_types::{Action, BoardError, BoardResult, Command, Identity};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::{info, warn};

use crate::owner_registry::{Caller, OwnerRegistry};

/// Proof that the caller is the executor dispatching a self-call.
///
/// The field is private and the constructor is private to this module, so
/// nothing else can produce one.
#[derive(Debug)]
pub struct SelfCapability {
    _sealed: (),
}

impl SelfCapability {
    fn mint() -> Self {
        Self { _sealed: () }
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self::mint()
    }
}

/// Failure reported by a target collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Why a dispatch failed
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("no handler registered for target {0}")]
    NoHandler(Identity),

    #[error("handler for {target} failed: {source}")]
    Handler {
        target: Identity,
        #[source]
        source: HandlerError,
    },

    #[error("owner update rejected: {0}")]
    Owner(#[from] BoardError),

    #[error("command {0} is not supported on the self target")]
    UnsupportedCommand(String),
}

/// A target collaborator that receives dispatched commands.
///
/// Handlers must be all-or-nothing: an `Err` means nothing was applied.
pub trait ActionHandler: Send + Sync {
    fn handle(&self, action: &Action) -> Result<(), HandlerError>;
}

impl<F> ActionHandler for F
where
    F: Fn(&Action) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(&self, action: &Action) -> Result<(), HandlerError> {
        self(action)
    }
}

pub struct Executor {
    self_identity: Identity,
    owners: Arc<OwnerRegistry>,
    handlers: RwLock<HashMap<Identity, Arc<dyn ActionHandler>>>,
}

impl Executor {
    pub fn new(self_identity: Identity, owners: Arc<OwnerRegistry>) -> BoardResult<Self> {
        Ok(Self {
            self_identity: self_identity.require()?,
            owners,
            handlers: RwLock::new(HashMap::new()),
        })
    }

    pub fn self_identity(&self) -> &Identity {
        &self.self_identity
    }

    /// Route commands for `target` to `handler`, replacing any previous one
    pub fn register_handler(
        &self,
        target: Identity,
        handler: Arc<dyn ActionHandler>,
    ) -> BoardResult<()> {
        let target = target.require()?;
        if target == self.self_identity {
            return Err(BoardError::ReservedTarget(target));
        }
        info!(target = %target, "Handler registered");
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(target, handler);
        Ok(())
    }

    pub fn unregister_handler(&self, target: &Identity) -> bool {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(target)
            .is_some()
    }

    pub fn has_handler(&self, target: &Identity) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(target)
    }

    /// Dispatch the action's command against its target
    pub fn execute(&self, action: &Action) -> BoardResult<()> {
        self.dispatch(action).map_err(|err| {
            warn!(
                action_id = %action.id,
                target = %action.target,
                command = action.command.name(),
                error = %err,
                "Execution failed"
            );
            BoardError::ExecutionFailure {
                action_id: action.id,
                reason: err.to_string(),
            }
        })
    }

    fn dispatch(&self, action: &Action) -> Result<(), ExecutionError> {
        if action.target == self.self_identity {
            return self.dispatch_self(&action.command);
        }

        // Clone the handler out so the table lock is not held during the call
        let handler = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&action.target)
            .cloned()
            .ok_or_else(|| ExecutionError::NoHandler(action.target.clone()))?;

        handler
            .handle(action)
            .map_err(|source| ExecutionError::Handler {
                target: action.target.clone(),
                source,
            })
    }

    fn dispatch_self(&self, command: &Command) -> Result<(), ExecutionError> {
        let caller = Caller::SelfCall(SelfCapability::mint());
        match command {
            Command::AddOwner { owner } => self.owners.add_owner(&caller, owner.clone())?,
            Command::RemoveOwner { owner } => self.owners.remove_owner(&caller, owner)?,
            Command::ReplaceOwners { owners } => {
                self.owners.replace_all(&caller, owners.iter().cloned())?
            }
            other => return Err(ExecutionError::UnsupportedCommand(other.name().to_string())),
        }
        Ok(())
    }
}
