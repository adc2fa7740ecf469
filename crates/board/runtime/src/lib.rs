//! Board of Directors Runtime
//!
//! This crate provides the runtime for the quorum-gated governance engine.
//! Members of a board propose actions against target collaborators; once a
//! majority of the current board has approved an action it executes, exactly
//! once, in the same call that completed the quorum.
//!
//! # Architecture
//!
//! The [`BoardOfDirectors`] is the main entry point. It composes:
//!
//! - [`MembershipRegistry`] - the board, replaced wholesale by the voting authority
//! - [`OwnerRegistry`] - the privileged owner tier, mutable only by self-calls
//! - [`ActionLedger`] - proposals, approvals, revocations and quorum checks
//! - [`Executor`] - dispatches approved commands to registered handlers
//! - [`EventNotifier`] - publishes committed transitions to event sinks
//!
//! # Key Invariants
//!
//! 1. An action's approval count always equals the size of its approver set
//! 2. An action executes at most once and never un-executes
//! 3. A failed execution rolls the triggering approval back
//! 4. Owners change only through an executed action targeting the engine itself
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use board_runtime::{BoardOfDirectors, HandlerError};
//! use board_types::{Action, Command, Identity};
//!
//! let board = BoardOfDirectors::builder("board:self", "board:voting")
//!     .members(["alice", "bob", "carol"])
//!     .owners(["treasurer"])
//!     .handler(
//!         "bank",
//!         Arc::new(|_: &Action| -> Result<(), HandlerError> { Ok(()) }),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let alice = Identity::new("alice");
//! let bob = Identity::new("bob");
//!
//! let id = board
//!     .propose(&alice, Identity::new("bank"), "pay rent", Command::pay(Identity::new("landlord"), 1_000))
//!     .unwrap();
//! assert!(!board.is_executed(id).unwrap());
//!
//! // Two of three is a majority
//! board.approve(id, &bob).unwrap();
//! assert!(board.is_executed(id).unwrap());
//! ```

#![deny(unsafe_code)]

pub mod action_ledger;
pub mod board;
pub mod config;
pub mod executor;
pub mod membership_registry;
pub mod notifier;
pub mod owner_registry;

// Re-export main types for convenience
pub use action_ledger::{threshold_reached, ActionLedger};
pub use board::{BoardBuilder, BoardOfDirectors};
pub use crate::config::{BoardConfig, ConfigError, EngineConfig, EventsConfig, LoggingConfig};
pub use executor::{ActionHandler, ExecutionError, Executor, HandlerError, SelfCapability};
pub use membership_registry::{MembershipRegistry, MembershipView, PinnedBoard};
pub use notifier::{BroadcastSink, EventNotifier, EventSink, JournalSink, TracingSink};
pub use owner_registry::{Caller, OwnerRegistry};
