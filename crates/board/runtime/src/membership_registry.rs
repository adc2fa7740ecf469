//! Membership Registry - the current board of approvers
//!
//! The board is never edited member by member. The voting authority hands
//! over a complete new set and the registry swaps it in as one value, so
//! readers always see either the old board or the new one.
//!
//! While an approval executes, the board it was counted against is pinned
//! on the executing thread. Reads from that thread see the pinned board
//! without touching the lock, and replacement fails with
//! [`BoardError::Reentrant`] instead of waiting on itself.

use board_types::{identity_set, BoardError, BoardEvent, BoardResult, Identity};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use tracing::{info, warn};

use crate::notifier::EventNotifier;

type Board = Arc<BTreeSet<Identity>>;

thread_local! {
    // (registry address, pinned board), innermost last
    static PINNED: RefCell<Vec<(usize, Board)>> = const { RefCell::new(Vec::new()) };
}

/// Holds the board and the identity allowed to replace it
pub struct MembershipRegistry {
    members: RwLock<Arc<BTreeSet<Identity>>>,
    voting_authority: Identity,
    notifier: Arc<EventNotifier>,
}

impl MembershipRegistry {
    /// Create a registry with a non-empty initial board
    pub fn new<I>(
        voting_authority: Identity,
        initial_members: I,
        notifier: Arc<EventNotifier>,
    ) -> BoardResult<Self>
    where
        I: IntoIterator<Item = Identity>,
    {
        let voting_authority = voting_authority.require()?;
        let members = identity_set(initial_members, "members")?;
        Ok(Self {
            members: RwLock::new(Arc::new(members)),
            voting_authority,
            notifier,
        })
    }

    /// Install a complete new board. Only the voting authority may call this.
    pub fn replace_all<I>(&self, caller: &Identity, new_members: I) -> BoardResult<()>
    where
        I: IntoIterator<Item = Identity>,
    {
        if caller != &self.voting_authority {
            warn!(caller = %caller, "Rejected board replacement from non-authority");
            return Err(BoardError::NotVotingAuthority(caller.clone()));
        }

        if self.is_pinned() {
            warn!(caller = %caller, "Rejected board replacement during execution");
            return Err(BoardError::Reentrant("replace_members"));
        }

        let replacement = Arc::new(identity_set(new_members, "members")?);

        let previous = {
            let mut members = self.members.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *members, Arc::clone(&replacement))
        };

        info!(
            previous = previous.len(),
            current = replacement.len(),
            "Board replaced"
        );

        self.notifier.emit(BoardEvent::MembershipChanged {
            members: replacement.iter().cloned().collect(),
        });

        Ok(())
    }

    /// Hold the board steady for the lifetime of the returned view.
    ///
    /// Replacement blocks until every view is dropped. On a thread where the
    /// board is pinned the view is the pinned board and takes no lock.
    pub fn read(&self) -> MembershipView<'_> {
        let inner = match self.pinned() {
            Some(board) => View::Pinned(board),
            None => View::Locked(self.members.read().unwrap_or_else(PoisonError::into_inner)),
        };
        MembershipView { inner }
    }

    /// Pin `view` on the current thread until the returned guard drops
    pub fn pin(&self, view: &MembershipView<'_>) -> PinnedBoard {
        let key = self.key();
        PINNED.with(|pinned| pinned.borrow_mut().push((key, Arc::clone(view.board()))));
        PinnedBoard {
            key,
            _thread: PhantomData,
        }
    }

    /// Whether the board is pinned on the current thread
    pub fn is_pinned(&self) -> bool {
        self.pinned().is_some()
    }

    pub fn contains(&self, id: &Identity) -> bool {
        self.read().contains(id)
    }

    pub fn size(&self) -> usize {
        self.read().size()
    }

    /// The current board as an immutable snapshot
    pub fn members(&self) -> Arc<BTreeSet<Identity>> {
        Arc::clone(self.read().board())
    }

    pub fn voting_authority(&self) -> &Identity {
        &self.voting_authority
    }

    fn key(&self) -> usize {
        self as *const Self as usize
    }

    fn pinned(&self) -> Option<Board> {
        let key = self.key();
        PINNED.with(|pinned| {
            pinned
                .borrow()
                .iter()
                .rev()
                .find(|(k, _)| *k == key)
                .map(|(_, board)| Arc::clone(board))
        })
    }
}

/// A consistent read of the board
pub struct MembershipView<'a> {
    inner: View<'a>,
}

enum View<'a> {
    Locked(RwLockReadGuard<'a, Board>),
    Pinned(Board),
}

impl MembershipView<'_> {
    pub fn contains(&self, id: &Identity) -> bool {
        self.board().contains(id)
    }

    pub fn size(&self) -> usize {
        self.board().len()
    }

    fn board(&self) -> &Board {
        match &self.inner {
            View::Locked(guard) => &**guard,
            View::Pinned(board) => board,
        }
    }
}

/// Keeps a board pinned on the current thread. Unpins on drop, unwinding included.
#[must_use]
pub struct PinnedBoard {
    key: usize,
    // Thread-local state, so the guard must stay on its thread
    _thread: PhantomData<*const ()>,
}

impl Drop for PinnedBoard {
    fn drop(&mut self) {
        PINNED.with(|pinned| {
            let mut pinned = pinned.borrow_mut();
            if let Some(pos) = pinned.iter().rposition(|(k, _)| *k == self.key) {
                pinned.remove(pos);
            }
        });
    }
}
