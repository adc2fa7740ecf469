//! Stand-in collaborator for script targets

use board_runtime::{ActionHandler, HandlerError};
use board_types::{Action, ActionId, Command, Identity};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

/// A command the recorder accepted
#[derive(Debug, Clone, Serialize)]
pub struct Dispatch {
    pub action_id: ActionId,
    pub target: Identity,
    pub command: Command,
}

/// Records every command dispatched to it, failing those named in `failing`
pub struct RecordingHandler {
    target: Identity,
    failing: BTreeSet<String>,
    dispatched: Mutex<Vec<Dispatch>>,
}

impl RecordingHandler {
    pub fn new(target: Identity, failing: BTreeSet<String>) -> Self {
        Self {
            target,
            failing,
            dispatched: Mutex::new(Vec::new()),
        }
    }

    pub fn dispatched(&self) -> Vec<Dispatch> {
        self.dispatched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ActionHandler for RecordingHandler {
    fn handle(&self, action: &Action) -> Result<(), HandlerError> {
        let name = action.command.name();
        if self.failing.contains(name) {
            return Err(HandlerError::new(format!(
                "{} refused command {}",
                self.target, name
            )));
        }

        self.dispatched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Dispatch {
                action_id: action.id,
                target: self.target.clone(),
                command: action.command.clone(),
            });
        Ok(())
    }
}
