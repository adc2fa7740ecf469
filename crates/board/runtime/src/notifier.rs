//! Event notifier - fans committed transitions out to sinks
//!
//! Components publish a [`BoardEvent`] only after the state change it
//! describes has committed. The notifier stamps each event with a sequence
//! number and hands the envelope to every registered [`EventSink`].

use board_types::{BoardEvent, BoardEventEnvelope};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tracing::debug;

/// Consumer of board events
pub trait EventSink: Send + Sync {
    fn publish(&self, envelope: &BoardEventEnvelope);
}

/// Real-time distribution over a broadcast channel
pub struct BroadcastSink {
    sender: broadcast::Sender<BoardEventEnvelope>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BoardEventEnvelope> {
        self.sender.subscribe()
    }
}

impl EventSink for BroadcastSink {
    fn publish(&self, envelope: &BoardEventEnvelope) {
        // No subscribers is fine
        let _ = self.sender.send(envelope.clone());
    }
}

/// Append-only in-memory event history
#[derive(Default)]
pub struct JournalSink {
    entries: Mutex<Vec<BoardEventEnvelope>>,
}

impl JournalSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<BoardEventEnvelope> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Just the events, in publication order
    pub fn events(&self) -> Vec<BoardEvent> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|e| e.event.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for JournalSink {
    fn publish(&self, envelope: &BoardEventEnvelope) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(envelope.clone());
    }
}

/// Logs every event at debug level
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&self, envelope: &BoardEventEnvelope) {
        debug!(
            sequence = envelope.sequence,
            event = envelope.event.kind(),
            action_id = ?envelope.event.action_id(),
            "Board event"
        );
    }
}

/// Fans events out to every registered sink
pub struct EventNotifier {
    sinks: Vec<Arc<dyn EventSink>>,
    sequence: AtomicU64,
}

impl EventNotifier {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self {
            sinks,
            sequence: AtomicU64::new(0),
        }
    }

    /// A notifier that drops everything
    pub fn silent() -> Self {
        Self::new(Vec::new())
    }

    pub fn emit(&self, event: BoardEvent) {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = BoardEventEnvelope::new(sequence, event);
        for sink in &self.sinks {
            sink.publish(&envelope);
        }
    }

    /// Number of events emitted so far
    pub fn emitted(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}
