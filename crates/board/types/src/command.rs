//! Action payloads
//!
//! A command is what an executed action does. Commands addressed to the
//! engine's own identity mutate the owner set; everything else is forwarded
//! untouched to the target's handler.

use crate::Identity;
use serde::{Deserialize, Serialize};

/// Tagged payload dispatched when an action executes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    /// Move funds held by the target collaborator
    Pay { recipient: Identity, amount: u64 },

    /// Add a single owner (self target only)
    AddOwner { owner: Identity },

    /// Remove a single owner (self target only)
    RemoveOwner { owner: Identity },

    /// Replace the whole owner set (self target only)
    ReplaceOwners { owners: Vec<Identity> },

    /// Opaque call data for a custom collaborator
    Custom {
        name: String,
        #[serde(default)]
        data: Vec<u8>,
    },
}

impl Command {
    pub fn pay(recipient: Identity, amount: u64) -> Self {
        Self::Pay { recipient, amount }
    }

    pub fn add_owner(owner: Identity) -> Self {
        Self::AddOwner { owner }
    }

    pub fn remove_owner(owner: Identity) -> Self {
        Self::RemoveOwner { owner }
    }

    pub fn replace_owners(owners: Vec<Identity>) -> Self {
        Self::ReplaceOwners { owners }
    }

    pub fn custom(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self::Custom {
            name: name.into(),
            data,
        }
    }

    /// Short name used in logs and handler dispatch
    pub fn name(&self) -> &str {
        match self {
            Self::Pay { .. } => "pay",
            Self::AddOwner { .. } => "add_owner",
            Self::RemoveOwner { .. } => "remove_owner",
            Self::ReplaceOwners { .. } => "replace_owners",
            Self::Custom { name, .. } => name,
        }
    }

    /// Whether the command mutates the owner set
    pub fn is_owner_command(&self) -> bool {
        matches!(
            self,
            Self::AddOwner { .. } | Self::RemoveOwner { .. } | Self::ReplaceOwners { .. }
        )
    }

    /// Serialize into opaque payload bytes
    pub fn encode(&self) -> Vec<u8> {
        // Serializing this enum cannot fail: every field is a string, integer or byte list.
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Parse opaque payload bytes
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pay { recipient, amount } => write!(f, "pay {} to {}", amount, recipient),
            Self::AddOwner { owner } => write!(f, "add owner {}", owner),
            Self::RemoveOwner { owner } => write!(f, "remove owner {}", owner),
            Self::ReplaceOwners { owners } => write!(f, "replace owners ({})", owners.len()),
            Self::Custom { name, data } => write!(f, "{} ({} bytes)", name, data.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_uses_kind_tag() {
        let bytes = Command::add_owner(Identity::new("o2")).encode();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["kind"], "add_owner");
        assert_eq!(value["owner"], "o2");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(Command::decode(b"not json").is_err());
        assert!(Command::decode(br#"{"kind":"launch_rockets"}"#).is_err());
    }

    #[test]
    fn test_custom_data_defaults_empty() {
        let cmd = Command::decode(br#"{"kind":"custom","name":"ping"}"#).unwrap();
        assert_eq!(cmd, Command::custom("ping", Vec::new()));
    }

    #[test]
    fn test_owner_command_classification() {
        assert!(Command::remove_owner(Identity::new("o1")).is_owner_command());
        assert!(Command::replace_owners(vec![]).is_owner_command());
        assert!(!Command::pay(Identity::new("r"), 5).is_owner_command());
        assert_eq!(Command::custom("ping", vec![]).name(), "ping");
    }
}
