//! Board of Directors Domain Types
//!
//! This crate defines the domain types for the quorum-gated governance
//! engine: a bounded board of members proposes actions, collects approvals,
//! and an action executes exactly once when a majority has approved it.
//!
//! # Key Concepts
//!
//! - **Identity**: opaque party token. The empty identity is the reserved
//!   null sentinel and is rejected wherever an identity is required.
//! - **Action**: a proposed `(target, description, command)` tuple with its
//!   approver set. `approval_count` is always the size of that set.
//! - **Command**: the tagged payload dispatched against the action's target.
//! - **BoardEvent**: a structured notification for every state transition.
//!
//! # Architecture
//!
//! This is a pure types crate with no runtime dependencies. All types
//! implement `Clone`, `Debug`, `Serialize`, `Deserialize`.

#![deny(unsafe_code)]

mod action;
mod command;
mod errors;
mod event;
mod identity;

pub use action::*;
pub use command::*;
pub use errors::*;
pub use event::*;
pub use identity::*;
