//! Event emitter abstraction for decoupling the player from transport.
//!
//! The player thread depends on the [`EventEmitter`] trait rather than a
//! concrete broadcast channel, so tests can observe transitions without
//! standing up a subscriber.

use tokio::sync::broadcast;

use super::PlayerStatusEvent;

/// Trait for emitting player status events without knowledge of transport.
pub trait EventEmitter: Send + Sync {
    /// Emits a single status-change event.
    fn emit(&self, event: PlayerStatusEvent);
}

/// No-op emitter; events are silently discarded.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit(&self, _event: PlayerStatusEvent) {}
}

/// Logs every event at debug level. Useful during development.
pub struct LoggingEventEmitter;

impl EventEmitter for LoggingEventEmitter {
    fn emit(&self, event: PlayerStatusEvent) {
        tracing::debug!(?event, "player_status_event");
    }
}

/// Publishes events on a `tokio::sync::broadcast` channel.
///
/// This is the production emitter: the control frontend subscribes with
/// [`BroadcastEventEmitter::subscribe`] and receives exactly one message per
/// `PlayerState` transition, standing in for the original's update-fd.
#[derive(Clone)]
pub struct BroadcastEventEmitter {
    tx: broadcast::Sender<PlayerStatusEvent>,
}

impl BroadcastEventEmitter {
    /// Creates a new emitter with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribes to status events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerStatusEvent> {
        self.tx.subscribe()
    }
}

impl EventEmitter for BroadcastEventEmitter {
    fn emit(&self, event: PlayerStatusEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::trace!("no status-event subscribers: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{PlayerState, RepeatMode};

    fn sample_event(state: PlayerState) -> PlayerStatusEvent {
        PlayerStatusEvent {
            state,
            repeat: RepeatMode::Off,
            shuffle: false,
            now_playing: None,
            timestamp_ms: 0,
        }
    }

    #[test]
    fn broadcast_emitter_delivers_to_subscriber() {
        let emitter = BroadcastEventEmitter::new(8);
        let mut rx = emitter.subscribe();
        emitter.emit(sample_event(PlayerState::Playing));
        let received = rx.try_recv().expect("event should be delivered");
        assert_eq!(received.state, PlayerState::Playing);
    }

    #[test]
    fn broadcast_emitter_with_no_subscribers_does_not_panic() {
        let emitter = BroadcastEventEmitter::new(8);
        emitter.emit(sample_event(PlayerState::Stopped));
    }
}
