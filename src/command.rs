//! Command Dispatcher (§4.F, re-expressed per §4.F.1): the mutex/condvar/
//! command-slot trio is replaced by an `mpsc` channel of [`PlayerCommand`]
//! messages, each owning a `oneshot` completion handle. Exclusivity of "one
//! in-flight command" is enforced by the player thread's dispatch loop
//! holding at most one [`PendingCompletion`] at a time, not by a shared
//! mutable slot (§5).

use tokio::sync::{mpsc, oneshot};

use crate::error::PlaybackError;
use crate::remote::{RemoteStatus, SessionId};
use crate::sink::SinkState;
use crate::state::{PlayerState, RepeatMode};

/// A point-in-time view of playback state, returned by `get_status` (§6).
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub state: PlayerState,
    pub shuffle: bool,
    pub repeat: RepeatMode,
    pub volume: u8,
    pub now_playing: Option<u32>,
    pub pos_ms: u64,
    pub pos_pl: Option<usize>,
}

/// The result a command resolves to, delivered through its `oneshot` sender.
#[derive(Debug)]
pub enum CommandOutcome {
    Status(StatusSnapshot),
    NowPlaying(Option<u32>),
    DeviceIds(Vec<u64>),
    /// Generic result code: 0 success, -1 hard failure, -2 password
    /// required for at least one requested device (§4.E, §7).
    Result(i32),
    Error(PlaybackError),
}

/// Every call the control frontend can make, marshaled onto the player
/// thread (§6). Internal device-callback routing (`RemoteStatus`) rides the
/// same channel so every mutation happens on the player thread, without the
/// remote-driver implementation needing to know that thread exists (§4.E).
pub enum PlayerCommand {
    GetStatus {
        reply: oneshot::Sender<CommandOutcome>,
    },
    NowPlaying {
        reply: oneshot::Sender<CommandOutcome>,
    },
    PlaybackStart {
        idx: Option<u32>,
        reply: oneshot::Sender<CommandOutcome>,
    },
    PlaybackStop {
        reply: oneshot::Sender<CommandOutcome>,
    },
    PlaybackPause {
        reply: oneshot::Sender<CommandOutcome>,
    },
    PlaybackSeek {
        ms: u64,
        reply: oneshot::Sender<CommandOutcome>,
    },
    PlaybackNext {
        reply: oneshot::Sender<CommandOutcome>,
    },
    PlaybackPrev {
        reply: oneshot::Sender<CommandOutcome>,
    },
    SpeakerEnumerate {
        reply: oneshot::Sender<CommandOutcome>,
    },
    SpeakerSet {
        ids: Vec<u64>,
        reply: oneshot::Sender<CommandOutcome>,
    },
    VolumeSet {
        volume: u8,
        reply: oneshot::Sender<CommandOutcome>,
    },
    RepeatSet {
        mode: RepeatMode,
        reply: oneshot::Sender<CommandOutcome>,
    },
    ShuffleSet {
        enabled: bool,
        reply: oneshot::Sender<CommandOutcome>,
    },
    QueueAdd {
        media_ids: Vec<u32>,
        reply: oneshot::Sender<CommandOutcome>,
    },
    QueueClear {
        reply: oneshot::Sender<CommandOutcome>,
    },
    /// Routed from a remote-driver callback; no reply channel because
    /// nothing is awaiting it directly (§4.E, §5).
    RemoteStatus {
        device_id: u64,
        session: SessionId,
        status: RemoteStatus,
    },
    /// Routed from the local sink's state callback, same rationale as
    /// `RemoteStatus` (§4.E).
    LocalSinkState {
        state: SinkState,
    },
    Shutdown,
}

/// State the player thread holds for the single in-flight command whose
/// handler launched async device operations (§4.F.1). Lives on the player
/// thread's stack between dispatch and the last device callback — never in
/// a shared mutex.
pub struct PendingCompletion {
    reply: oneshot::Sender<CommandOutcome>,
    outstanding: usize,
    bottom_half: Option<Box<dyn FnOnce() -> CommandOutcome + Send>>,
}

impl PendingCompletion {
    pub fn new(
        reply: oneshot::Sender<CommandOutcome>,
        outstanding: usize,
        bottom_half: Option<Box<dyn FnOnce() -> CommandOutcome + Send>>,
    ) -> Self {
        Self {
            reply,
            outstanding,
            bottom_half,
        }
    }

    /// Call once per device callback. Returns `true` once every outstanding
    /// callback has reported and the bottom half should run.
    pub fn device_callback_completed(&mut self) -> bool {
        self.outstanding = self.outstanding.saturating_sub(1);
        self.outstanding == 0
    }

    /// Runs the bottom half (if any) and delivers the outcome to the caller.
    /// Consumes `self`; call only once `device_callback_completed` returns
    /// `true`.
    pub fn complete(self) {
        let outcome = match self.bottom_half {
            Some(f) => f(),
            None => CommandOutcome::Result(0),
        };
        let _ = self.reply.send(outcome);
    }
}

/// Caller-side handle: clone freely, one clone per control-frontend thread.
/// The channel itself serializes delivery; no mutex is needed on this side
/// (§5).
#[derive(Clone)]
pub struct CommandSender {
    tx: mpsc::Sender<PlayerCommand>,
}

impl CommandSender {
    pub fn new(tx: mpsc::Sender<PlayerCommand>) -> Self {
        Self { tx }
    }

    /// Sends a command and awaits its outcome. Fails only if the player
    /// thread has shut down.
    pub async fn dispatch(&self, build: impl FnOnce(oneshot::Sender<CommandOutcome>) -> PlayerCommand) -> CommandOutcome {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(build(reply)).await.is_err() {
            return CommandOutcome::Error(PlaybackError::ShuttingDown);
        }
        rx.await.unwrap_or(CommandOutcome::Error(PlaybackError::ShuttingDown))
    }

    /// Fire-and-forget send, used by callback routers (`RemoteCallback`,
    /// `SinkStateCallback`) that have no reply channel to wait on. Silently
    /// drops the command if the player thread has shut down.
    pub fn try_notify(&self, command: PlayerCommand) {
        let _ = self.tx.try_send(command);
    }

    /// Tells the player thread's run loop to exit. Unlike `dispatch`, there
    /// is no reply: the caller should await the task's join handle instead
    /// (see `bootstrap::PlayerServices::shutdown`).
    pub async fn shutdown(&self) {
        let _ = self.tx.send(PlayerCommand::Shutdown).await;
    }
}

/// Creates the command channel, returning the caller-side sender and the
/// player-thread-side receiver. `capacity` bounds how many commands may be
/// queued ahead of the player thread processing them.
pub fn command_channel(capacity: usize) -> (CommandSender, mpsc::Receiver<PlayerCommand>) {
    let (tx, rx) = mpsc::channel(capacity);
    (CommandSender::new(tx), rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dispatch_returns_error_once_receiver_dropped() {
        let (sender, rx) = command_channel(4);
        drop(rx);
        let outcome = sender.dispatch(|reply| PlayerCommand::GetStatus { reply }).await;
        assert!(matches!(outcome, CommandOutcome::Error(PlaybackError::ShuttingDown)));
    }

    #[test]
    fn pending_completion_runs_bottom_half_only_once_outstanding_reaches_zero() {
        let (reply, _rx) = oneshot::channel();
        let mut pending = PendingCompletion::new(
            reply,
            2,
            Some(Box::new(|| CommandOutcome::Result(0))),
        );
        assert!(!pending.device_callback_completed());
        assert!(pending.device_callback_completed());
    }
}
