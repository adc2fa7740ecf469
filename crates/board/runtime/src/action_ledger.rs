//! Action Ledger - proposals, approvals and quorum-triggered execution
//!
//! The ledger is append-only: ids are handed out in order and never reused.
//! Each action sits behind its own mutex, which serializes every approve and
//! revoke on that action while leaving other actions free to proceed.
//!
//! An approval that reaches the threshold executes the action before the
//! approval is committed. If execution fails, the approval is discarded and
//! the action looks exactly as it did before the call.
//!
//! Handlers run on the approving thread and may call back into the engine.
//! Queries on the executing action see its committed state, while approve
//! and revoke on it fail with [`BoardError::Reentrant`].

use board_types::{Action, ActionId, BoardError, BoardEvent, BoardResult, Command, Identity};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, info, warn};

use crate::executor::Executor;
use crate::membership_registry::MembershipRegistry;
use crate::notifier::EventNotifier;

/// Majority test: `approvals * 2 >= board_size`.
///
/// Integer multiplication keeps odd board sizes exact. A zero count never
/// passes, whatever the board size.
pub fn threshold_reached(approvals: usize, board_size: usize) -> bool {
    approvals > 0 && (approvals as u128) * 2 >= board_size as u128
}

type Entry = Arc<Mutex<Action>>;

thread_local! {
    // (ledger address, committed state) of actions executing on this thread
    static RUNNING: RefCell<Vec<(usize, Action)>> = const { RefCell::new(Vec::new()) };
}

pub struct ActionLedger {
    actions: RwLock<BTreeMap<ActionId, Entry>>,
    membership: Arc<MembershipRegistry>,
    executor: Arc<Executor>,
    notifier: Arc<EventNotifier>,
}

impl ActionLedger {
    pub fn new(
        membership: Arc<MembershipRegistry>,
        executor: Arc<Executor>,
        notifier: Arc<EventNotifier>,
    ) -> Self {
        Self {
            actions: RwLock::new(BTreeMap::new()),
            membership,
            executor,
            notifier,
        }
    }

    /// Record a new action with the proposer's approval already counted
    pub fn propose(
        &self,
        proposer: &Identity,
        target: Identity,
        description: impl Into<String>,
        command: Command,
    ) -> BoardResult<ActionId> {
        if !self.membership.contains(proposer) {
            warn!(proposer = %proposer, "Proposal from non-member rejected");
            return Err(BoardError::NotMember(proposer.clone()));
        }
        let target = target.require()?;

        let action = {
            let mut actions = self.actions.write().unwrap_or_else(PoisonError::into_inner);
            // Append-only, so the table length is the next id
            let id = ActionId::new(actions.len() as u64);
            let action = Action::new(id, proposer.clone(), target, description, command);
            actions.insert(id, Arc::new(Mutex::new(action.clone())));
            action
        };

        info!(
            action_id = %action.id,
            proposer = %proposer,
            target = %action.target,
            command = action.command.name(),
            "Action proposed"
        );

        self.notifier.emit(BoardEvent::ActionProposed {
            action_id: action.id,
            proposer: proposer.clone(),
            target: action.target.clone(),
            description: action.description.clone(),
            command: action.command.to_string(),
        });

        Ok(action.id)
    }

    /// Approve an action, executing it if this approval completes the quorum
    pub fn approve(&self, action_id: ActionId, approver: &Identity) -> BoardResult<()> {
        let entry = self.entry(action_id)?;
        self.refuse_running(action_id, "approve")?;
        let mut action = lock(&entry);

        if action.is_executed() {
            return Err(BoardError::AlreadyExecuted(action_id));
        }

        // Held until the approval is settled so the board cannot change
        // between the threshold check and the commit.
        let board = self.membership.read();
        if !board.contains(approver) {
            warn!(
                action_id = %action_id,
                approver = %approver,
                "Approval from non-member rejected"
            );
            return Err(BoardError::NotMember(approver.clone()));
        }
        if action.is_approved_by(approver) {
            return Err(BoardError::AlreadyApproved {
                action_id,
                approver: approver.clone(),
            });
        }

        let mut candidate = action.clone();
        candidate.add_approver(approver.clone());
        let approvals = candidate.approval_count();
        let board_size = board.size();

        if !threshold_reached(approvals, board_size) {
            *action = candidate;
            drop(board);
            debug!(
                action_id = %action_id,
                approver = %approver,
                approvals,
                board_size,
                "Approval recorded"
            );
            self.notify_approved(&action, approver);
            return Ok(());
        }

        let executed = {
            let _pinned = self.membership.pin(&board);
            let _running = self.mark_running(&action);
            self.executor.execute(&candidate)
        };
        if let Err(err) = executed {
            warn!(
                action_id = %action_id,
                approver = %approver,
                approvals,
                board_size,
                "Execution failed, approval rolled back"
            );
            return Err(err);
        }

        candidate.mark_executed();
        *action = candidate;
        drop(board);

        info!(
            action_id = %action_id,
            target = %action.target,
            approvals,
            board_size,
            "Action executed"
        );

        self.notify_approved(&action, approver);
        self.notifier.emit(BoardEvent::ActionExecuted {
            action_id,
            target: action.target.clone(),
            description: action.description.clone(),
            approvers: action.approvers().iter().cloned().collect(),
        });

        Ok(())
    }

    /// Withdraw a previously recorded approval. Never executes anything.
    pub fn revoke(&self, action_id: ActionId, approver: &Identity) -> BoardResult<()> {
        let entry = self.entry(action_id)?;
        self.refuse_running(action_id, "revoke")?;

        if !self.membership.contains(approver) {
            warn!(
                action_id = %action_id,
                approver = %approver,
                "Revocation from non-member rejected"
            );
            return Err(BoardError::NotMember(approver.clone()));
        }

        let mut action = lock(&entry);
        if action.is_executed() {
            return Err(BoardError::AlreadyExecuted(action_id));
        }
        if !action.remove_approver(approver) {
            return Err(BoardError::NotApproved {
                action_id,
                approver: approver.clone(),
            });
        }

        debug!(
            action_id = %action_id,
            approver = %approver,
            approvals = action.approval_count(),
            "Approval revoked"
        );

        self.notifier.emit(BoardEvent::ApprovalRevoked {
            action_id,
            approver: approver.clone(),
            target: action.target.clone(),
            description: action.description.clone(),
            approval_count: action.approval_count(),
        });

        Ok(())
    }

    // --- Query methods ---

    pub fn is_executed(&self, action_id: ActionId) -> BoardResult<bool> {
        self.with_action(action_id, |a| a.is_executed())
    }

    pub fn approval_count(&self, action_id: ActionId) -> BoardResult<usize> {
        self.with_action(action_id, |a| a.approval_count())
    }

    pub fn is_approved(&self, action_id: ActionId, identity: &Identity) -> BoardResult<bool> {
        self.with_action(action_id, |a| a.is_approved_by(identity))
    }

    /// A copy of the action as it stands now
    pub fn action(&self, action_id: ActionId) -> BoardResult<Action> {
        self.with_action(action_id, Action::clone)
    }

    /// Number of actions ever proposed
    pub fn action_count(&self) -> usize {
        self.actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Ids of actions still collecting approvals, ascending
    pub fn pending_actions(&self) -> Vec<ActionId> {
        self.entries()
            .into_iter()
            .filter(|(id, entry)| !self.inspect(*id, entry, Action::is_executed))
            .map(|(id, _)| id)
            .collect()
    }

    /// Every action addressed to `target`, in id order
    pub fn actions_for_target(&self, target: &Identity) -> Vec<Action> {
        self.entries()
            .into_iter()
            .filter_map(|(id, entry)| {
                self.inspect(id, &entry, |action| {
                    (&action.target == target).then(|| action.clone())
                })
            })
            .collect()
    }

    fn entry(&self, action_id: ActionId) -> BoardResult<Entry> {
        self.actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&action_id)
            .cloned()
            .ok_or(BoardError::ActionNotFound(action_id))
    }

    fn entries(&self) -> Vec<(ActionId, Entry)> {
        self.actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, entry)| (*id, Arc::clone(entry)))
            .collect()
    }

    fn with_action<T>(&self, action_id: ActionId, f: impl FnOnce(&Action) -> T) -> BoardResult<T> {
        let entry = self.entry(action_id)?;
        Ok(self.inspect(action_id, &entry, f))
    }

    /// Read an action without locking it if this thread is executing it
    fn inspect<T>(&self, action_id: ActionId, entry: &Entry, f: impl FnOnce(&Action) -> T) -> T {
        match self.running(action_id) {
            Some(action) => f(&action),
            None => f(&*lock(entry)),
        }
    }

    fn key(&self) -> usize {
        self as *const Self as usize
    }

    fn running(&self, action_id: ActionId) -> Option<Action> {
        let key = self.key();
        RUNNING.with(|running| {
            running
                .borrow()
                .iter()
                .find(|(k, action)| *k == key && action.id == action_id)
                .map(|(_, action)| action.clone())
        })
    }

    fn refuse_running(&self, action_id: ActionId, operation: &'static str) -> BoardResult<()> {
        if self.running(action_id).is_some() {
            warn!(action_id = %action_id, operation, "Re-entrant call on executing action rejected");
            return Err(BoardError::Reentrant(operation));
        }
        Ok(())
    }

    fn mark_running(&self, committed: &Action) -> Running {
        let key = self.key();
        RUNNING.with(|running| running.borrow_mut().push((key, committed.clone())));
        Running {
            key,
            action_id: committed.id,
            _thread: PhantomData,
        }
    }

    fn notify_approved(&self, action: &Action, approver: &Identity) {
        self.notifier.emit(BoardEvent::ActionApproved {
            action_id: action.id,
            approver: approver.clone(),
            target: action.target.clone(),
            description: action.description.clone(),
            approval_count: action.approval_count(),
        });
    }
}

fn lock(entry: &Entry) -> MutexGuard<'_, Action> {
    entry.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Running {
    key: usize,
    action_id: ActionId,
    _thread: PhantomData<*const ()>,
}

impl Drop for Running {
    fn drop(&mut self) {
        RUNNING.with(|running| {
            let mut running = running.borrow_mut();
            if let Some(pos) = running
                .iter()
                .rposition(|(k, action)| *k == self.key && action.id == self.action_id)
            {
                running.remove(pos);
            }
        });
    }
}
