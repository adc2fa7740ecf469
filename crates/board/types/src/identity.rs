//! Party identities
//!
//! Members, owners, target collaborators and the engine itself are all
//! addressed by an [`Identity`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{BoardError, BoardResult};

/// Opaque, comparable identity of a party
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(pub String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The reserved null identity
    pub fn null() -> Self {
        Self(String::new())
    }

    /// Whitespace-only identities count as null too
    pub fn is_null(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Reject the null identity
    pub fn require(self) -> BoardResult<Self> {
        if self.is_null() {
            Err(BoardError::NullIdentity)
        } else {
            Ok(self)
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_null() {
            write!(f, "<null>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Build a non-empty identity set with no null entries.
///
/// `what` names the set in the error ("members", "owners").
pub fn identity_set<I>(ids: I, what: &'static str) -> BoardResult<BTreeSet<Identity>>
where
    I: IntoIterator<Item = Identity>,
{
    let mut set = BTreeSet::new();
    for id in ids {
        set.insert(id.require()?);
    }
    if set.is_empty() {
        return Err(BoardError::EmptySet(what));
    }
    Ok(set)
}
