//! Owner Registry - the privileged owner tier
//!
//! Owners can only be changed by the engine acting on itself: an executed
//! action whose target is the engine's own identity. The mutators demand a
//! [`Caller::SelfCall`] carrying a [`SelfCapability`], which only the
//! executor can mint. An external caller is always refused, owner or not.

use board_types::{identity_set, BoardError, BoardEvent, BoardResult, Identity};
use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

use crate::executor::SelfCapability;
use crate::notifier::EventNotifier;

/// Who is invoking an owner mutator
#[derive(Debug)]
pub enum Caller {
    /// Anyone outside the executor, identified for logging only
    External(Identity),
    /// The executor dispatching a self-targeted action
    SelfCall(SelfCapability),
}

impl Caller {
    fn authorize(&self) -> BoardResult<()> {
        match self {
            Caller::SelfCall(_) => Ok(()),
            Caller::External(who) => {
                warn!(caller = %who, "Rejected direct owner mutation");
                Err(BoardError::OnlySelf)
            }
        }
    }
}

pub struct OwnerRegistry {
    owners: RwLock<Arc<BTreeSet<Identity>>>,
    notifier: Arc<EventNotifier>,
}

impl OwnerRegistry {
    /// Create a registry with a non-empty initial owner set
    pub fn new<I>(initial_owners: I, notifier: Arc<EventNotifier>) -> BoardResult<Self>
    where
        I: IntoIterator<Item = Identity>,
    {
        let owners = identity_set(initial_owners, "owners")?;
        Ok(Self {
            owners: RwLock::new(Arc::new(owners)),
            notifier,
        })
    }

    pub fn add_owner(&self, caller: &Caller, owner: Identity) -> BoardResult<()> {
        caller.authorize()?;
        let owner = owner.require()?;

        let updated = {
            let mut owners = self.owners.write().unwrap_or_else(PoisonError::into_inner);
            if owners.contains(&owner) {
                return Err(BoardError::OwnerAlreadyExists(owner));
            }
            let mut next = BTreeSet::clone(&owners);
            next.insert(owner.clone());
            let next = Arc::new(next);
            *owners = Arc::clone(&next);
            next
        };

        info!(owner = %owner, owners = updated.len(), "Owner added");
        self.announce(&updated);
        Ok(())
    }

    pub fn remove_owner(&self, caller: &Caller, owner: &Identity) -> BoardResult<()> {
        caller.authorize()?;

        let updated = {
            let mut owners = self.owners.write().unwrap_or_else(PoisonError::into_inner);
            if !owners.contains(owner) {
                return Err(BoardError::OwnerNotFound(owner.clone()));
            }
            let mut next = BTreeSet::clone(&owners);
            next.remove(owner);
            let next = Arc::new(next);
            *owners = Arc::clone(&next);
            next
        };

        info!(owner = %owner, owners = updated.len(), "Owner removed");
        self.announce(&updated);
        Ok(())
    }

    /// Swap in a complete new owner set
    pub fn replace_all<I>(&self, caller: &Caller, new_owners: I) -> BoardResult<()>
    where
        I: IntoIterator<Item = Identity>,
    {
        caller.authorize()?;
        let replacement = Arc::new(identity_set(new_owners, "owners")?);

        {
            let mut owners = self.owners.write().unwrap_or_else(PoisonError::into_inner);
            *owners = Arc::clone(&replacement);
        }

        info!(owners = replacement.len(), "Owners replaced");
        self.announce(&replacement);
        Ok(())
    }

    pub fn is_owner(&self, id: &Identity) -> bool {
        self.snapshot().contains(id)
    }

    pub fn size(&self) -> usize {
        self.snapshot().len()
    }

    pub fn owners(&self) -> Arc<BTreeSet<Identity>> {
        self.snapshot()
    }

    fn snapshot(&self) -> Arc<BTreeSet<Identity>> {
        Arc::clone(&self.owners.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn announce(&self, owners: &BTreeSet<Identity>) {
        self.notifier.emit(BoardEvent::OwnersChanged {
            owners: owners.iter().cloned().collect(),
        });
    }
}
