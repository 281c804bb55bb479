//! Engine events - generation progress for external observers
//!
//! The bus uses a tokio broadcast channel so any number of observers (CLI
//! progress output, a future renderer) can follow the run without being able
//! to slow it down: emit is fire-and-forget and slow subscribers lose old
//! events rather than backpressuring the coordinator.

use tokio::sync::broadcast;
use tracing::debug;

/// Default channel capacity (events)
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Observable engine activity
#[derive(Clone, Debug)]
pub enum EngineEvent {
    /// A generation finished and the global grid is consistent again
    GenerationCompleted {
        /// Completed generations so far (1-based)
        generation: u64,
        live_cells: usize,
        duration_ms: u64,
    },
    /// The run reached its generation limit or was stopped
    RunCompleted {
        generations: u64,
        live_cells: usize,
        duration_ms: u64,
    },
}

/// Broadcast bus for engine events
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }

    /// Emit an event to all subscribers; no subscribers is fine
    pub fn emit(&self, event: EngineEvent) {
        debug!(?event, "EventBus::emit");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}
