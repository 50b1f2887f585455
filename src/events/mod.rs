//! Event system for real-time status notification to the control frontend.
//!
//! Replaces the original's single "write 1 to an update-fd" signal with a
//! typed event broadcast. The contract is the same: exactly one edge per
//! `PlayerState` transition, never a burst, never silence.

mod emitter;

pub use emitter::{BroadcastEventEmitter, EventEmitter, LoggingEventEmitter, NoopEventEmitter};

use serde::Serialize;

use crate::state::{PlayerState, RepeatMode};

/// A status-change notification published whenever `PlayerState` transitions.
///
/// One event is emitted per edge in the transition table (§4.G); repeated
/// commands that don't change `state` (e.g. `seek` while already `Playing`
/// resolves through `Paused` then back to `Playing`, which is two edges, not
/// zero or three) never coalesce into fewer or more events than transitions.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStatusEvent {
    /// The state the engine transitioned into.
    pub state: PlayerState,
    /// Currently selected repeat mode at the time of the transition.
    pub repeat: RepeatMode,
    /// Currently selected shuffle mode at the time of the transition.
    pub shuffle: bool,
    /// The media id now current, if any.
    pub now_playing: Option<u32>,
    /// Unix timestamp in milliseconds.
    pub timestamp_ms: u64,
}
