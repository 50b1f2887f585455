//! Local audio sink collaborator contract.
//!
//! The sink is the reserved device id `0` addressed by the output
//! coordinator (§4.E); unlike remote sessions it is synchronous from the
//! player thread's point of view, but still reports state transitions via a
//! callback so the sync clock can switch sources (§4.A, §4.E).

use crate::error::PlaybackResult;

/// Observed local-sink lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    Closed,
    Open,
    Running,
    Stopping,
    Failed,
}

/// Receives local-sink state transitions.
pub trait SinkStateCallback: Send + Sync {
    fn on_state(&self, state: SinkState);
}

/// A blocking/stateful PCM writer for the local sound card.
pub trait LocalSink: Send + Sync {
    /// Opens the device. Idempotent if already open.
    fn open(&self) -> PlaybackResult<()>;

    /// Closes the device, releasing any OS handle.
    fn close(&self);

    /// Starts playback at `pos`, tagging subsequent writes against `rtptime`.
    fn start(&self, pos: u64, rtptime: u64) -> PlaybackResult<()>;

    /// Stops playback without closing the device.
    fn stop(&self);

    /// Writes one packet of PCM, tagged with the sample index it represents.
    fn write(&self, pcm: &[u8], rtptime: u64) -> PlaybackResult<()>;

    /// Sets output volume, 0..=100.
    fn set_volume(&self, volume: u8) -> PlaybackResult<()>;

    /// Returns the sample index of the most recently emitted sample.
    fn position(&self) -> PlaybackResult<u64>;

    /// Registers the callback notified of `SinkState` transitions (§4.E).
    /// Implementations call it from whatever thread observes the
    /// transition, not necessarily the caller's thread.
    fn set_state_callback(&self, callback: std::sync::Arc<dyn SinkStateCallback>);
}
