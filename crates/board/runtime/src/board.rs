//! BoardOfDirectors - the engine facade
//!
//! Wires the membership registry, owner registry, executor and action ledger
//! around one shared [`EventNotifier`], and exposes the engine's operations.

use board_types::{Action, ActionId, BoardEventEnvelope, BoardResult, Command, Identity};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use crate::action_ledger::ActionLedger;
use crate::config::{BoardConfig, ConfigError};
use crate::executor::{ActionHandler, Executor};
use crate::membership_registry::MembershipRegistry;
use crate::notifier::{BroadcastSink, EventNotifier, EventSink, JournalSink, TracingSink};
use crate::owner_registry::{Caller, OwnerRegistry};

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Builder for [`BoardOfDirectors`]
pub struct BoardBuilder {
    self_identity: Identity,
    voting_authority: Identity,
    members: Vec<Identity>,
    owners: Vec<Identity>,
    handlers: Vec<(Identity, Arc<dyn ActionHandler>)>,
    sinks: Vec<Arc<dyn EventSink>>,
    channel_capacity: usize,
    journal: bool,
    trace: bool,
}

impl BoardBuilder {
    pub fn new(self_identity: impl Into<Identity>, voting_authority: impl Into<Identity>) -> Self {
        Self {
            self_identity: self_identity.into(),
            voting_authority: voting_authority.into(),
            members: Vec::new(),
            owners: Vec::new(),
            handlers: Vec::new(),
            sinks: Vec::new(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            journal: false,
            trace: false,
        }
    }

    pub fn members<I>(mut self, members: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Identity>,
    {
        self.members = members.into_iter().map(Into::into).collect();
        self
    }

    pub fn owners<I>(mut self, owners: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Identity>,
    {
        self.owners = owners.into_iter().map(Into::into).collect();
        self
    }

    pub fn handler(mut self, target: impl Into<Identity>, handler: Arc<dyn ActionHandler>) -> Self {
        self.handlers.push((target.into(), handler));
        self
    }

    /// Attach an extra event sink
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Keep an in-memory journal, readable through [`BoardOfDirectors::journal`]
    pub fn with_journal(mut self, enabled: bool) -> Self {
        self.journal = enabled;
        self
    }

    /// Log every event at debug level
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.trace = enabled;
        self
    }

    pub fn build(self) -> BoardResult<BoardOfDirectors> {
        let broadcast = Arc::new(BroadcastSink::new(self.channel_capacity));
        let journal = self.journal.then(|| Arc::new(JournalSink::new()));

        let mut sinks: Vec<Arc<dyn EventSink>> = vec![broadcast.clone() as Arc<dyn EventSink>];
        if let Some(journal) = &journal {
            sinks.push(journal.clone());
        }
        if self.trace {
            sinks.push(Arc::new(TracingSink));
        }
        sinks.extend(self.sinks);
        let notifier = Arc::new(EventNotifier::new(sinks));

        let membership = Arc::new(MembershipRegistry::new(
            self.voting_authority,
            self.members,
            notifier.clone(),
        )?);
        let owners = Arc::new(OwnerRegistry::new(self.owners, notifier.clone())?);
        let executor = Arc::new(Executor::new(self.self_identity, owners.clone())?);
        for (target, handler) in self.handlers {
            executor.register_handler(target, handler)?;
        }
        let ledger = ActionLedger::new(membership.clone(), executor.clone(), notifier.clone());

        info!(
            self_identity = %executor.self_identity(),
            voting_authority = %membership.voting_authority(),
            members = membership.size(),
            owners = owners.size(),
            "Board initialized"
        );

        Ok(BoardOfDirectors {
            membership,
            owners,
            executor,
            ledger,
            notifier,
            broadcast,
            journal,
        })
    }
}

/// Quorum-gated action engine
pub struct BoardOfDirectors {
    membership: Arc<MembershipRegistry>,
    owners: Arc<OwnerRegistry>,
    executor: Arc<Executor>,
    ledger: ActionLedger,
    notifier: Arc<EventNotifier>,
    broadcast: Arc<BroadcastSink>,
    journal: Option<Arc<JournalSink>>,
}

impl BoardOfDirectors {
    pub fn builder(
        self_identity: impl Into<Identity>,
        voting_authority: impl Into<Identity>,
    ) -> BoardBuilder {
        BoardBuilder::new(self_identity, voting_authority)
    }

    /// Build an engine from loaded configuration. Handlers are registered afterwards.
    pub fn from_config(config: &BoardConfig) -> Result<Self, ConfigError> {
        config.engine.validate()?;
        let board = Self::builder(config.engine.self_identity(), config.engine.voting_authority())
            .members(config.engine.members())
            .owners(config.engine.owners())
            .channel_capacity(config.events.channel_capacity)
            .with_journal(config.events.journal)
            .with_tracing(config.events.trace)
            .build()?;
        Ok(board)
    }

    // --- Actions ---

    pub fn propose(
        &self,
        proposer: &Identity,
        target: Identity,
        description: impl Into<String>,
        command: Command,
    ) -> BoardResult<ActionId> {
        self.ledger.propose(proposer, target, description, command)
    }

    pub fn approve(&self, action_id: ActionId, approver: &Identity) -> BoardResult<()> {
        self.ledger.approve(action_id, approver)
    }

    pub fn revoke(&self, action_id: ActionId, approver: &Identity) -> BoardResult<()> {
        self.ledger.revoke(action_id, approver)
    }

    pub fn is_executed(&self, action_id: ActionId) -> BoardResult<bool> {
        self.ledger.is_executed(action_id)
    }

    pub fn approval_count(&self, action_id: ActionId) -> BoardResult<usize> {
        self.ledger.approval_count(action_id)
    }

    pub fn is_approved(&self, action_id: ActionId, identity: &Identity) -> BoardResult<bool> {
        self.ledger.is_approved(action_id, identity)
    }

    pub fn action(&self, action_id: ActionId) -> BoardResult<Action> {
        self.ledger.action(action_id)
    }

    pub fn action_count(&self) -> usize {
        self.ledger.action_count()
    }

    pub fn pending_actions(&self) -> Vec<ActionId> {
        self.ledger.pending_actions()
    }

    pub fn actions_for_target(&self, target: &Identity) -> Vec<Action> {
        self.ledger.actions_for_target(target)
    }

    // --- Board membership ---

    /// Replace the whole board. `caller` must be the voting authority.
    pub fn replace_members<I>(&self, caller: &Identity, new_members: I) -> BoardResult<()>
    where
        I: IntoIterator<Item = Identity>,
    {
        self.membership.replace_all(caller, new_members)
    }

    pub fn is_member(&self, id: &Identity) -> bool {
        self.membership.contains(id)
    }

    pub fn board_size(&self) -> usize {
        self.membership.size()
    }

    pub fn members(&self) -> Arc<BTreeSet<Identity>> {
        self.membership.members()
    }

    pub fn voting_authority(&self) -> &Identity {
        self.membership.voting_authority()
    }

    // --- Owners ---
    //
    // The owner mutators below are the external surface and always refuse:
    // owners change only through an executed action targeting `self_identity`.

    pub fn add_owner(&self, caller: &Identity, owner: Identity) -> BoardResult<()> {
        self.owners
            .add_owner(&Caller::External(caller.clone()), owner)
    }

    pub fn remove_owner(&self, caller: &Identity, owner: &Identity) -> BoardResult<()> {
        self.owners
            .remove_owner(&Caller::External(caller.clone()), owner)
    }

    pub fn replace_owners<I>(&self, caller: &Identity, new_owners: I) -> BoardResult<()>
    where
        I: IntoIterator<Item = Identity>,
    {
        self.owners
            .replace_all(&Caller::External(caller.clone()), new_owners)
    }

    pub fn is_owner(&self, id: &Identity) -> bool {
        self.owners.is_owner(id)
    }

    pub fn owner_count(&self) -> usize {
        self.owners.size()
    }

    pub fn owners(&self) -> Arc<BTreeSet<Identity>> {
        self.owners.owners()
    }

    // --- Execution targets ---

    pub fn self_identity(&self) -> &Identity {
        self.executor.self_identity()
    }

    pub fn register_handler(
        &self,
        target: Identity,
        handler: Arc<dyn ActionHandler>,
    ) -> BoardResult<()> {
        self.executor.register_handler(target, handler)
    }

    pub fn unregister_handler(&self, target: &Identity) -> bool {
        self.executor.unregister_handler(target)
    }

    pub fn has_handler(&self, target: &Identity) -> bool {
        self.executor.has_handler(target)
    }

    // --- Events ---

    /// Receive every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<BoardEventEnvelope> {
        self.broadcast.subscribe()
    }

    /// The in-memory journal, if one was enabled
    pub fn journal(&self) -> Option<&Arc<JournalSink>> {
        self.journal.as_ref()
    }

    pub fn events_emitted(&self) -> u64 {
        self.notifier.emitted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::HandlerError;
    use board_types::{BoardError, BoardEvent, ErrorKind};

    fn id(name: &str) -> Identity {
        Identity::new(name)
    }

    fn board() -> BoardOfDirectors {
        BoardOfDirectors::builder("self", "voting")
            .members(["m1", "m2", "m3"])
            .owners(["o1"])
            .handler(
                "bank",
                Arc::new(|_: &Action| -> Result<(), HandlerError> { Ok(()) }),
            )
            .with_journal(true)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_validates_sets() {
        let no_members = BoardOfDirectors::builder("self", "voting")
            .owners(["o1"])
            .build();
        assert!(matches!(no_members, Err(BoardError::EmptySet("members"))));

        let no_owners = BoardOfDirectors::builder("self", "voting")
            .members(["m1"])
            .build();
        assert!(matches!(no_owners, Err(BoardError::EmptySet("owners"))));
    }

    #[test]
    fn test_builder_rejects_handler_on_self() {
        let result = BoardOfDirectors::builder("self", "voting")
            .members(["m1"])
            .owners(["o1"])
            .handler(
                "self",
                Arc::new(|_: &Action| -> Result<(), HandlerError> { Ok(()) }),
            )
            .build();
        assert!(matches!(result, Err(BoardError::ReservedTarget(_))));
    }

    #[test]
    fn test_self_targeted_action_adds_owner() {
        let board = board();
        let a0 = board
            .propose(&id("m1"), id("self"), "add o2", Command::add_owner(id("o2")))
            .unwrap();

        board.approve(a0, &id("m2")).unwrap();

        assert!(board.is_owner(&id("o2")));
        assert_eq!(board.owner_count(), 2);

        let kinds: Vec<&str> = board
            .journal()
            .unwrap()
            .events()
            .iter()
            .map(BoardEvent::kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                "action_proposed",
                "owners_changed",
                "action_approved",
                "action_executed"
            ]
        );
    }

    #[test]
    fn test_external_owner_mutation_is_unauthorized() {
        let board = board();

        let err = board.add_owner(&id("o1"), id("o2")).unwrap_err();
        assert_eq!(err, BoardError::OnlySelf);
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(board.remove_owner(&id("o1"), &id("o1")), Err(BoardError::OnlySelf));
        assert_eq!(
            board.replace_owners(&id("self"), vec![id("o9")]),
            Err(BoardError::OnlySelf)
        );
        assert_eq!(*board.owners(), BTreeSet::from([id("o1")]));
    }

    #[test]
    fn test_replace_members_through_facade() {
        let board = board();

        assert!(board.replace_members(&id("m1"), vec![id("m1")]).is_err());
        board
            .replace_members(&id("voting"), vec![id("m4"), id("m5")])
            .unwrap();

        assert_eq!(board.board_size(), 2);
        assert!(board.is_member(&id("m4")));
        assert!(!board.is_member(&id("m1")));
    }

    #[test]
    fn test_extra_sink_receives_events() {
        let extra = Arc::new(JournalSink::new());
        let board = BoardOfDirectors::builder("self", "voting")
            .members(["m1", "m2"])
            .owners(["o1"])
            .sink(extra.clone())
            .build()
            .unwrap();

        board
            .replace_members(&id("voting"), vec![id("m3")])
            .unwrap();

        assert_eq!(
            extra.events(),
            vec![BoardEvent::MembershipChanged {
                members: vec![id("m3")]
            }]
        );
    }

    #[test]
    fn test_journal_disabled_by_default() {
        let board = BoardOfDirectors::builder("self", "voting")
            .members(["m1"])
            .owners(["o1"])
            .build()
            .unwrap();
        assert!(board.journal().is_none());
    }

    #[test]
    fn test_from_config() {
        let mut config = BoardConfig::default();
        config.engine.initial_members = vec!["m1".into(), "m2".into()];
        config.engine.initial_owners = vec!["o1".into()];

        let board = BoardOfDirectors::from_config(&config).unwrap();

        assert_eq!(board.self_identity(), &id("board:self"));
        assert_eq!(board.voting_authority(), &id("board:voting"));
        assert_eq!(board.board_size(), 2);
        assert!(board.journal().is_none());
    }

    #[test]
    fn test_from_config_requires_members() {
        let config = BoardConfig::default();
        assert!(matches!(
            BoardOfDirectors::from_config(&config),
            Err(ConfigError::Board(BoardError::EmptySet("members")))
        ));
    }

    #[tokio::test]
    async fn test_subscribe_sees_events() {
        let board = board();
        let mut rx = board.subscribe();

        let a0 = board
            .propose(&id("m1"), id("bank"), "pay", Command::pay(id("alice"), 5))
            .unwrap();

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.event.action_id(), Some(a0));
        assert_eq!(board.events_emitted(), 1);
    }
}
