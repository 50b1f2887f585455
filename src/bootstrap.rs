//! Application bootstrap and dependency wiring.
//!
//! This module contains the composition root - the single place where the
//! player thread and its collaborators are instantiated and wired together.
//! This pattern provides:
//!
//! - **Clarity**: all dependency relationships are visible in one place
//! - **Testability**: easy to swap implementations for testing
//! - **Maintainability**: service creation logic is isolated from usage

use std::sync::Arc;

use crate::clock::{MonotonicClock, SystemMonotonicClock};
use crate::command::{command_channel, CommandSender};
use crate::devices::{DeviceRegistry, PasswordStore};
use crate::error::PlaybackResult;
use crate::events::{BroadcastEventEmitter, EventEmitter};
use crate::media::MediaLibrary;
use crate::player::{PlayerCallbackRouter, PlayerDeps, PlayerThread};
use crate::remote::RemoteDriver;
use crate::runtime::TokioSpawner;
use crate::sink::LocalSink;
use crate::state::{Config, ConfigStore, InMemoryConfigStore, JsonFileConfigStore};
use crate::transcode::Transcoder;

/// Capacity of the player thread's command channel. Generous relative to the
/// "one command in flight" exclusivity rule (§4.F) — it only needs to absorb
/// a short burst of callers queuing up while a prior command is dispatched.
const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// Container for the wired player thread and the handles a control frontend
/// needs to talk to it.
///
/// Holds the player task's [`tokio::task::JoinHandle`] so [`PlayerServices::shutdown`]
/// can wait for the run loop to actually exit, not just signal it to.
pub struct PlayerServices {
    /// Sends commands to the player thread and awaits their outcome.
    pub sender: CommandSender,
    /// Broadcasts `PlayerStatusEvent`s; subscribe for a live status feed.
    pub events: Arc<BroadcastEventEmitter>,
    /// The device registry, shared so a control frontend can also observe
    /// it directly (e.g. to render a device picker) without round-tripping
    /// through the player thread.
    pub registry: Arc<DeviceRegistry>,
    /// Persisted configuration (currently just playback volume).
    pub config_store: Arc<dyn ConfigStore>,
    join: tokio::task::JoinHandle<()>,
}

impl PlayerServices {
    /// Signals the player thread to exit its run loop and waits for it to
    /// finish. Any command already in flight still completes; no command
    /// sent after this call will see a reply.
    pub async fn shutdown(self) {
        self.sender.shutdown().await;
        let _ = self.join.await;
    }
}

/// Bootstraps the player thread and its collaborators.
///
/// This is the composition root where every playback-engine service is
/// instantiated and wired together. The wiring order matters — each step
/// depends only on steps above it:
///
/// 1. Persisted configuration store (JSON file if `config.data_dir` is set,
///    otherwise in-memory).
/// 2. Status-event broadcaster.
/// 3. Device registry (depends on the caller-supplied password store).
/// 4. Task spawner and monotonic clock.
/// 5. Command channel and callback router.
/// 6. The player thread itself, spawned onto the current Tokio runtime.
///
/// # Arguments
///
/// The five collaborator traits (`library`, `transcoder`, `local_sink`,
/// `remote`, `password_store`) are supplied by the caller because they are
/// the engine's external seams (§4): a real deployment plugs in a concrete
/// media catalog, decoder, sound-card sink, and device driver, while tests
/// and the demo binary plug in fakes.
///
/// # Errors
///
/// Returns an error if the configuration store or the player thread itself
/// fails to initialize (e.g. a malformed persisted config file).
pub fn bootstrap_player(
    config: &Config,
    library: Arc<dyn MediaLibrary>,
    transcoder: Arc<dyn Transcoder>,
    local_sink: Arc<dyn LocalSink>,
    remote: Arc<dyn RemoteDriver>,
    password_store: Arc<dyn PasswordStore>,
) -> PlaybackResult<PlayerServices> {
    let config_store: Arc<dyn ConfigStore> = match &config.data_dir {
        Some(dir) => Arc::new(JsonFileConfigStore::open(dir.join("player.json"))?),
        None => Arc::new(InMemoryConfigStore::default()),
    };

    let events = Arc::new(BroadcastEventEmitter::new(config.event_channel_capacity));
    let registry = Arc::new(DeviceRegistry::new(password_store));
    let spawner = Arc::new(TokioSpawner::current());
    let monotonic_clock: Arc<dyn MonotonicClock> = Arc::new(SystemMonotonicClock);

    let (sender, rx) = command_channel(COMMAND_CHANNEL_CAPACITY);
    let router = Arc::new(PlayerCallbackRouter::new(sender.clone()));

    let deps = PlayerDeps {
        library,
        transcoder,
        local_sink,
        remote,
        registry: registry.clone(),
        events: events.clone() as Arc<dyn EventEmitter>,
        config_store: config_store.clone(),
        spawner,
        monotonic_clock,
    };

    let player = PlayerThread::new(deps, rx, router)?;
    let join = tokio::spawn(player.run());

    Ok(PlayerServices {
        sender,
        events,
        registry,
        config_store,
        join,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandOutcome;
    use crate::devices::NoPasswords;
    use crate::media::tests::InMemoryLibrary;
    use crate::remote::tests::FakeRemoteDriver;
    use crate::sink::tests::FakeLocalSink;
    use crate::state::PlayerState;
    use crate::transcode::tests::FakeTranscoder;

    #[tokio::test]
    async fn bootstrap_wires_a_responsive_player_thread() {
        let config = Config::default();
        let services = bootstrap_player(
            &config,
            Arc::new(InMemoryLibrary::new(Vec::new())),
            Arc::new(FakeTranscoder::new()),
            Arc::new(FakeLocalSink::new()),
            Arc::new(FakeRemoteDriver::new()),
            Arc::new(NoPasswords),
        )
        .unwrap();

        let outcome = services
            .sender
            .dispatch(|reply| crate::command::PlayerCommand::GetStatus { reply })
            .await;
        match outcome {
            CommandOutcome::Status(snapshot) => assert_eq!(snapshot.state, PlayerState::Stopped),
            other => panic!("expected Status, got {other:?}"),
        }

        services.shutdown().await;
    }
}
