//! Remote receiver driver collaborator contract.
//!
//! Per-device sessions with an asynchronous start/stop/flush/probe/volume
//! protocol (§6, §4.E). Modeled with `async_trait` following the teacher's
//! `sonos::traits` convention, since each call may involve real network I/O.

use async_trait::async_trait;

use crate::devices::Device;
use crate::error::PlaybackResult;

/// Opaque handle to an active remote session, returned by a successful
/// [`RemoteDriver::start`] and passed back into subsequent calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

/// Outcome reported by a remote-device callback (§4.E, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    Ok,
    Stopped,
    Failed,
    Password,
}

/// Receives remote-device status callbacks. Implementations must marshal
/// the call onto the player thread (§5), typically by sending a message on
/// the same channel used for control-frontend commands.
pub trait RemoteCallback: Send + Sync {
    fn on_status(&self, device_id: u64, session: SessionId, status: RemoteStatus);
}

/// Drives per-device remote receiver sessions.
///
/// All methods are async because they perform real network I/O; the output
/// coordinator launches them through a `TaskSpawner` (§4.E) so the player
/// thread's dispatch loop never blocks on them.
#[async_trait]
pub trait RemoteDriver: Send + Sync {
    /// Starts streaming to `device`, beginning at `rtptime`.
    async fn start(&self, device: &Device, rtptime: u64) -> PlaybackResult<SessionId>;

    /// Handshake-only check used when the engine is Stopped (§4.E).
    async fn probe(&self, device: &Device) -> PlaybackResult<()>;

    /// Tears down `session`. Never fails observably; completion is reported
    /// via the status callback.
    async fn stop(&self, session: SessionId);

    /// Flushes buffered audio up to `rtptime`. Returns the number of
    /// outstanding device-side acks the caller should wait for.
    async fn flush(&self, session: SessionId, rtptime: u64) -> PlaybackResult<u32>;

    /// Sets device volume, 0..=100. Returns outstanding ack count.
    async fn set_volume(&self, session: SessionId, volume: u8) -> PlaybackResult<u32>;

    /// Writes one packet of PCM tagged with `rtptime`.
    async fn write(&self, session: SessionId, pcm: &[u8], rtptime: u64) -> PlaybackResult<()>;
}
