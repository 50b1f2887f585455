//! Player State Machine (§4.G): the single-threaded event loop that owns
//! every piece of mutable playback state and dispatches commands onto it.
//!
//! Everything reachable from [`PlayerThread`] — the queue, the clock, the
//! pump, the output coordinator, the in-flight pending completion — lives on
//! this one task and is touched by nothing else (§5).

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::time::Instant as TokioInstant;

use crate::clock::{MonotonicClock, SyncClock, SyncSource};
use crate::command::{CommandOutcome, CommandSender, PendingCompletion, PlayerCommand, StatusSnapshot};
use crate::devices::DeviceRegistry;
use crate::error::{PlaybackError, PlaybackResult};
use crate::events::{EventEmitter, PlayerStatusEvent};
use crate::media::MediaLibrary;
use crate::output::OutputCoordinator;
use crate::protocol_constants::{INITIAL_STREAMING_LEAD_SAMPLES, PACKET_SAMPLES, SAMPLE_RATE, STREAM_PERIOD};
use crate::pump::{active_remote_targets, AudioPump, TickOutcome};
use crate::queue::{NextOutcome, SourceQueue};
use crate::remote::{RemoteCallback, RemoteDriver, RemoteStatus, SessionId};
use crate::runtime::TaskSpawner;
use crate::sink::{LocalSink, SinkState, SinkStateCallback};
use crate::state::{ConfigStore, PlayerState, RepeatMode, VOLUME_CONFIG_KEY};
use crate::transcode::Transcoder;
use crate::utils::now_millis;

/// Collaborators the player thread is built from, bundled so construction
/// doesn't take a dozen positional arguments (mirrors the teacher's
/// `BootstrappedServices` composition-root pattern).
pub struct PlayerDeps {
    pub library: Arc<dyn MediaLibrary>,
    pub transcoder: Arc<dyn Transcoder>,
    pub local_sink: Arc<dyn LocalSink>,
    pub remote: Arc<dyn RemoteDriver>,
    pub registry: Arc<DeviceRegistry>,
    pub events: Arc<dyn EventEmitter>,
    pub config_store: Arc<dyn ConfigStore>,
    pub spawner: Arc<dyn TaskSpawner>,
    pub monotonic_clock: Arc<dyn MonotonicClock>,
}

/// Routes collaborator callbacks (remote-device status, local-sink state)
/// back onto the player thread's command channel, so every mutation still
/// happens from the single owning task (§4.E, §5) without the collaborator
/// implementations needing to know the player thread exists.
pub struct PlayerCallbackRouter {
    sender: CommandSender,
}

impl PlayerCallbackRouter {
    pub fn new(sender: CommandSender) -> Self {
        Self { sender }
    }
}

impl RemoteCallback for PlayerCallbackRouter {
    fn on_status(&self, device_id: u64, session: SessionId, status: RemoteStatus) {
        self.sender
            .try_notify(PlayerCommand::RemoteStatus { device_id, session, status });
    }
}

impl SinkStateCallback for PlayerCallbackRouter {
    fn on_state(&self, state: SinkState) {
        self.sender.try_notify(PlayerCommand::LocalSinkState { state });
    }
}

/// Owns every piece of player state and runs the single event loop (§4.G,
/// §5). Constructed via [`PlayerThread::new`], driven via
/// [`PlayerThread::run`].
pub struct PlayerThread {
    rx: mpsc::Receiver<PlayerCommand>,
    queue: SourceQueue,
    clock: SyncClock,
    pump: AudioPump,
    registry: Arc<DeviceRegistry>,
    output: OutputCoordinator,
    state: PlayerState,
    repeat: RepeatMode,
    shuffle: bool,
    volume: u8,
    library: Arc<dyn MediaLibrary>,
    transcoder: Arc<dyn Transcoder>,
    local_sink: Arc<dyn LocalSink>,
    remote: Arc<dyn RemoteDriver>,
    callback: Arc<dyn RemoteCallback>,
    events: Arc<dyn EventEmitter>,
    config_store: Arc<dyn ConfigStore>,
    spawner: Arc<dyn TaskSpawner>,
    pending: Option<PendingCompletion>,
    next_deadline: TokioInstant,
}

impl PlayerThread {
    pub fn new(
        deps: PlayerDeps,
        rx: mpsc::Receiver<PlayerCommand>,
        router: Arc<PlayerCallbackRouter>,
    ) -> PlaybackResult<Self> {
        let callback: Arc<dyn RemoteCallback> = router.clone();
        deps.local_sink.set_state_callback(router);
        let clock = SyncClock::new(deps.monotonic_clock.clone())?;
        let volume = deps
            .config_store
            .get_int(VOLUME_CONFIG_KEY)?
            .map(|v| v.clamp(0, 100) as u8)
            .unwrap_or(100);
        let output = OutputCoordinator::new(deps.registry.clone(), deps.spawner.clone());

        Ok(Self {
            rx,
            queue: SourceQueue::new(),
            clock,
            pump: AudioPump::default(),
            registry: deps.registry,
            output,
            state: PlayerState::Stopped,
            repeat: RepeatMode::Off,
            shuffle: false,
            volume,
            library: deps.library,
            transcoder: deps.transcoder,
            local_sink: deps.local_sink,
            remote: deps.remote,
            callback,
            events: deps.events,
            config_store: deps.config_store,
            spawner: deps.spawner,
            pending: None,
            next_deadline: TokioInstant::now(),
        })
    }

    /// Runs the event loop until a `Shutdown` command arrives or every
    /// sender is dropped. The tick timer only competes for the select when
    /// `Playing` — paused/stopped states leave it disarmed, per §5.
    pub async fn run(mut self) {
        loop {
            if self.state == PlayerState::Playing {
                tokio::select! {
                    _ = tokio::time::sleep_until(self.next_deadline) => {
                        self.on_tick();
                        self.next_deadline = self.next_deadline + STREAM_PERIOD;
                    }
                    cmd = self.rx.recv() => {
                        match cmd {
                            Some(PlayerCommand::Shutdown) | None => break,
                            Some(cmd) => self.dispatch(cmd),
                        }
                    }
                }
            } else {
                match self.rx.recv().await {
                    Some(PlayerCommand::Shutdown) | None => break,
                    Some(cmd) => self.dispatch(cmd),
                }
            }
        }
    }

    fn dispatch(&mut self, cmd: PlayerCommand) {
        match cmd {
            PlayerCommand::GetStatus { reply } => {
                let _ = reply.send(CommandOutcome::Status(self.status_snapshot()));
            }
            PlayerCommand::NowPlaying { reply } => {
                let id = self.queue.cur_streaming.map(|i| self.queue.item(i).id);
                let _ = reply.send(CommandOutcome::NowPlaying(id));
            }
            PlayerCommand::PlaybackStart { idx, reply } => {
                let outcome = self.playback_start(idx);
                let _ = reply.send(outcome);
            }
            PlayerCommand::PlaybackStop { reply } => {
                let outcome = self.playback_stop();
                let _ = reply.send(outcome);
            }
            PlayerCommand::PlaybackPause { reply } => {
                let outcome = self.playback_pause();
                let _ = reply.send(outcome);
            }
            PlayerCommand::PlaybackSeek { ms, reply } => {
                let outcome = self.playback_seek(ms);
                let _ = reply.send(outcome);
            }
            PlayerCommand::PlaybackNext { reply } => {
                let outcome = self.playback_next();
                let _ = reply.send(outcome);
            }
            PlayerCommand::PlaybackPrev { reply } => {
                let outcome = self.playback_prev();
                let _ = reply.send(outcome);
            }
            PlayerCommand::SpeakerEnumerate { reply } => {
                let ids = self.registry.snapshot().iter().map(|d| d.id).collect();
                let _ = reply.send(CommandOutcome::DeviceIds(ids));
            }
            PlayerCommand::SpeakerSet { ids, reply } => self.handle_speaker_set(ids, reply),
            PlayerCommand::VolumeSet { volume, reply } => {
                let outcome = self.volume_set(volume);
                let _ = reply.send(outcome);
            }
            PlayerCommand::RepeatSet { mode, reply } => {
                self.repeat = mode;
                let _ = reply.send(CommandOutcome::Result(0));
            }
            PlayerCommand::ShuffleSet { enabled, reply } => {
                if enabled && !self.shuffle {
                    self.queue.reshuffle();
                }
                self.shuffle = enabled;
                let _ = reply.send(CommandOutcome::Result(0));
            }
            PlayerCommand::QueueAdd { media_ids, reply } => {
                let outcome = match self.queue.queue_add(&media_ids) {
                    Ok(()) => CommandOutcome::Result(0),
                    Err(e) => CommandOutcome::Error(e),
                };
                let _ = reply.send(outcome);
            }
            PlayerCommand::QueueClear { reply } => {
                self.queue.clear(&*self.transcoder);
                let _ = reply.send(CommandOutcome::Result(0));
            }
            PlayerCommand::RemoteStatus { device_id, session, status } => {
                self.on_remote_status(device_id, session, status);
            }
            PlayerCommand::LocalSinkState { state } => self.on_local_sink_state(state),
            PlayerCommand::Shutdown => unreachable!("handled by the run loop"),
        }
    }

    // ── status / events ─────────────────────────────────────────────────

    fn status_snapshot(&self) -> StatusSnapshot {
        let pos_ms = self
            .clock
            .position(false, &*self.local_sink)
            .map(|(pos, _)| pos * 1000 / SAMPLE_RATE)
            .unwrap_or(0);
        StatusSnapshot {
            state: self.state,
            shuffle: self.shuffle,
            repeat: self.repeat,
            volume: self.volume,
            now_playing: self.queue.cur_streaming.map(|i| self.queue.item(i).id),
            pos_ms,
            pos_pl: self.queue.cur_streaming.and_then(|i| self.queue.position(i)),
        }
    }

    fn emit_status(&self) {
        self.events.emit(PlayerStatusEvent {
            state: self.state,
            repeat: self.repeat,
            shuffle: self.shuffle,
            now_playing: self.queue.cur_streaming.map(|i| self.queue.item(i).id),
            timestamp_ms: now_millis(),
        });
    }

    // ── playback transitions (§4.G) ─────────────────────────────────────

    fn playback_start(&mut self, idx: Option<u32>) -> CommandOutcome {
        if self.queue.is_empty() {
            return CommandOutcome::Error(PlaybackError::EmptyQueue);
        }

        let mut resuming = false;
        if let Some(steps) = idx {
            self.queue.close_active_chain(&*self.transcoder);
            if self.shuffle {
                self.queue.reshuffle();
            }
            if let Err(e) = self.queue.start_at(steps, self.shuffle, &*self.library, &*self.transcoder) {
                return CommandOutcome::Error(e);
            }
        } else if self.queue.cur_streaming.is_none() {
            match self.queue.next(true, self.repeat, self.shuffle, &*self.library, &*self.transcoder) {
                Ok(NextOutcome::Opened(_)) => {}
                Ok(NextOutcome::Stop) => return CommandOutcome::Error(PlaybackError::EmptyQueue),
                Err(e) => return CommandOutcome::Error(e),
            }
        } else {
            // Resuming an already-open item (e.g. after pause): not a fresh
            // open, so the stale `end` committed by playback_pause must be
            // cleared or source_check will fire a premature crossover once
            // pos catches up to the old pause point.
            resuming = true;
        }

        // Pre-roll: arm the clock 2 seconds behind the first scheduled
        // sample so networked receivers have time to buffer (§3, §4.G).
        let rtptime = self.pump.last_rtptime() + PACKET_SAMPLES;
        let lead_adjusted = rtptime.saturating_sub(INITIAL_STREAMING_LEAD_SAMPLES);
        self.clock.set_position(lead_adjusted, Instant::now());

        if let Some(id) = self.queue.cur_streaming {
            let item = self.queue.item_mut_pub(id);
            item.stream_start = rtptime;
            item.output_start = rtptime;
            if resuming {
                item.end = 0;
            }
        }
        if resuming {
            self.queue.cur_playing = None;
        }

        self.start_outputs(rtptime)
    }

    fn start_outputs(&mut self, rtptime: u64) -> CommandOutcome {
        if let Err(e) = self.local_sink.open() {
            return CommandOutcome::Error(e);
        }
        let pos = self.clock.position(false, &*self.local_sink).map(|(p, _)| p).unwrap_or(0);
        if let Err(e) = self.local_sink.start(pos, rtptime) {
            return CommandOutcome::Error(e);
        }

        let selected: Vec<u64> = self
            .registry
            .snapshot()
            .iter()
            .filter(|d| d.selected)
            .map(|d| d.id)
            .collect();
        self.output
            .speaker_set(&selected, true, rtptime, self.remote.clone(), self.callback.clone());

        self.state = PlayerState::Playing;
        self.next_deadline = TokioInstant::now();
        let now_id = self.queue.cur_streaming.map(|i| self.queue.item(i).id);
        self.emit_status();
        CommandOutcome::NowPlaying(now_id)
    }

    fn playback_stop(&mut self) -> CommandOutcome {
        self.queue.close_active_chain(&*self.transcoder);
        self.local_sink.stop();
        self.local_sink.close();
        self.clock.set_source(SyncSource::Clock);
        self.state = PlayerState::Stopped;
        self.emit_status();

        // Deactivate every remote session; completions marshal back via
        // `RemoteStatus` independently of this reply (§4.E).
        self.output
            .speaker_set(&[], false, self.pump.last_rtptime(), self.remote.clone(), self.callback.clone());

        CommandOutcome::Result(0)
    }

    fn playback_pause(&mut self) -> CommandOutcome {
        if self.state != PlayerState::Playing {
            return CommandOutcome::Result(0);
        }
        let pos = match self.clock.position(true, &*self.local_sink) {
            Ok((pos, _)) => pos,
            Err(e) => return CommandOutcome::Error(e),
        };
        if let Some(playing) = self.queue.cur_playing {
            self.queue.item_mut_pub(playing).end = pos;
        }
        self.local_sink.stop();
        self.state = PlayerState::Paused;
        self.emit_status();

        self.output
            .flush_all(self.pump.last_rtptime(), self.remote.clone(), self.callback.clone());

        CommandOutcome::Result(0)
    }

    fn playback_next(&mut self) -> CommandOutcome {
        self.playback_pause();
        match self.queue.next(true, self.repeat, self.shuffle, &*self.library, &*self.transcoder) {
            Ok(NextOutcome::Opened(_)) => self.playback_start(None),
            Ok(NextOutcome::Stop) => {
                self.state = PlayerState::Stopped;
                self.emit_status();
                CommandOutcome::Result(0)
            }
            Err(e) => CommandOutcome::Error(e),
        }
    }

    fn playback_prev(&mut self) -> CommandOutcome {
        self.playback_pause();
        match self.queue.prev(self.repeat, self.shuffle, &*self.library, &*self.transcoder) {
            Ok(NextOutcome::Opened(_)) => self.playback_start(None),
            Ok(NextOutcome::Stop) => {
                self.state = PlayerState::Stopped;
                self.emit_status();
                CommandOutcome::Result(0)
            }
            Err(e) => CommandOutcome::Error(e),
        }
    }

    fn playback_seek(&mut self, ms: u64) -> CommandOutcome {
        self.playback_pause();

        let Some(streaming) = self.queue.cur_streaming else {
            return CommandOutcome::Error(PlaybackError::EmptyQueue);
        };
        let Some(ctx) = self.queue.item(streaming).ctx else {
            return CommandOutcome::Error(PlaybackError::Transcode("item not open".to_string()));
        };
        let seeked_ms = match self.transcoder.seek(ctx, ms) {
            Ok(v) => v,
            Err(e) => return CommandOutcome::Error(e),
        };

        let rtptime = self.pump.last_rtptime() + PACKET_SAMPLES;
        let seeked_samples = (seeked_ms * SAMPLE_RATE) / 1000;
        {
            let item = self.queue.item_mut_pub(streaming);
            item.stream_start = rtptime.saturating_sub(seeked_samples);
            item.output_start = rtptime;
            item.end = 0;
        }
        self.queue.cur_playing = None;

        self.playback_start(None)
    }

    // ── speaker set / volume ────────────────────────────────────────────

    fn handle_speaker_set(&mut self, ids: Vec<u64>, reply: tokio::sync::oneshot::Sender<CommandOutcome>) {
        if self.pending.is_some() {
            let _ = reply.send(CommandOutcome::Error(PlaybackError::CommandBusy));
            return;
        }

        let playing = self.state == PlayerState::Playing;
        let rtptime = self.pump.last_rtptime();
        let result = self
            .output
            .speaker_set(&ids, playing, rtptime, self.remote.clone(), self.callback.clone());

        if result.pending == 0 {
            let _ = reply.send(CommandOutcome::Result(result.code));
            return;
        }

        let code = result.code;
        self.pending = Some(PendingCompletion::new(
            reply,
            result.pending as usize,
            Some(Box::new(move || CommandOutcome::Result(code))),
        ));
    }

    fn volume_set(&mut self, volume: u8) -> CommandOutcome {
        self.volume = volume;
        if let Err(e) = self.local_sink.set_volume(volume) {
            return CommandOutcome::Error(e);
        }
        if let Err(e) = self.config_store.save_int(VOLUME_CONFIG_KEY, volume as i64) {
            tracing::warn!(error = %e, "failed to persist volume");
        }
        self.output
            .set_volume_all(volume, self.remote.clone(), self.callback.clone());
        CommandOutcome::Result(0)
    }

    // ── device callbacks ────────────────────────────────────────────────

    fn on_remote_status(&mut self, device_id: u64, session: SessionId, status: RemoteStatus) {
        self.output.on_remote_status(device_id, session, status);
        if let Some(pending) = &mut self.pending {
            if pending.device_callback_completed() {
                self.pending.take().unwrap().complete();
            }
        }
    }

    fn on_local_sink_state(&mut self, state: SinkState) {
        match state {
            SinkState::Running => self.clock.set_source(SyncSource::LocalAudio),
            SinkState::Stopping => {
                // Commit the LocalAudio position before switching sources so
                // the Clock source resumes without a discontinuity (§4.A, §9).
                let _ = self.clock.position(true, &*self.local_sink);
                self.clock.set_source(SyncSource::Clock);
            }
            SinkState::Failed => {
                self.clock.set_source(SyncSource::Clock);
                self.local_sink.close();
                let has_remote = self.registry.snapshot().iter().any(|d| d.session.is_some());
                if !has_remote {
                    self.state = PlayerState::Stopped;
                    self.emit_status();
                }
            }
            SinkState::Closed | SinkState::Open => {}
        }
    }

    // ── tick ─────────────────────────────────────────────────────────────

    fn on_tick(&mut self) {
        let outcome = self.pump.tick(
            &mut self.queue,
            &self.clock,
            self.repeat,
            self.shuffle,
            &*self.library,
            &*self.transcoder,
            &*self.local_sink,
        );

        match outcome {
            Ok(TickOutcome::Packet { pcm, rtptime }) => {
                if let Err(e) = self.local_sink.write(&pcm, rtptime) {
                    tracing::warn!(error = %e, "local sink write failed");
                }
                let devices = self.registry.snapshot();
                for target in active_remote_targets(&devices) {
                    let remote = self.remote.clone();
                    let pcm = pcm.clone();
                    self.spawner.spawn(async move {
                        let _ = remote.write(target.session, &pcm, rtptime).await;
                    });
                }
            }
            Ok(TickOutcome::Stopped) => {
                self.state = PlayerState::Stopped;
                self.emit_status();
            }
            Err(e) => {
                tracing::error!(error = %e, "pump tick failed, stopping playback");
                self.state = PlayerState::Stopped;
                self.emit_status();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemMonotonicClock;
    use crate::command::command_channel;
    use crate::devices::NoPasswords;
    use crate::media::tests::InMemoryLibrary;
    use crate::media::MediaMetadata;
    use crate::remote::tests::FakeRemoteDriver;
    use crate::runtime::TokioSpawner;
    use crate::sink::tests::FakeLocalSink;
    use crate::state::InMemoryConfigStore;
    use crate::transcode::tests::FakeTranscoder;
    use crate::events::NoopEventEmitter;
    use crate::discovery::DiscoveryListener;

    fn library(ids: &[u32]) -> Arc<InMemoryLibrary> {
        Arc::new(InMemoryLibrary::new(
            ids.iter()
                .map(|id| MediaMetadata {
                    id: *id,
                    path: format!("{id}.wav"),
                    title: format!("Track {id}"),
                    album: None,
                    disabled: false,
                })
                .collect(),
        ))
    }

    async fn make_player(ids: &[u32]) -> (PlayerThread, Arc<FakeTranscoder>) {
        let lib = library(ids);
        let transcoder = Arc::new(FakeTranscoder::new());
        for id in ids {
            transcoder.set_length_bytes(*id, 1_000_000);
        }
        let (sender, rx) = command_channel(16);
        let router = Arc::new(PlayerCallbackRouter::new(sender));
        let deps = PlayerDeps {
            library: lib.clone(),
            transcoder: transcoder.clone(),
            local_sink: Arc::new(FakeLocalSink::new()),
            remote: Arc::new(FakeRemoteDriver::new()),
            registry: Arc::new(DeviceRegistry::new(Arc::new(NoPasswords))),
            events: Arc::new(NoopEventEmitter),
            config_store: Arc::new(InMemoryConfigStore::default()),
            spawner: Arc::new(TokioSpawner::current()),
            monotonic_clock: Arc::new(SystemMonotonicClock),
        };
        let mut player = PlayerThread::new(deps, rx, router).unwrap();
        player.queue.queue_make(&*lib, ids, &*transcoder).unwrap();
        (player, transcoder)
    }

    #[tokio::test]
    async fn start_from_empty_cursor_plays_playlist_head() {
        // Scenario 1 (§8).
        let (mut player, _t) = make_player(&[1, 2, 3]).await;
        let outcome = player.playback_start(None);
        assert!(matches!(outcome, CommandOutcome::NowPlaying(Some(1))));
        assert_eq!(player.state, PlayerState::Playing);
    }

    #[tokio::test]
    async fn jump_to_item_opens_requested_position() {
        // Scenario 2 (§8): start(idx=2) on [1,2,3] should land on item 3.
        let (mut player, _t) = make_player(&[1, 2, 3]).await;
        let outcome = player.playback_start(Some(2));
        assert!(matches!(outcome, CommandOutcome::NowPlaying(Some(3))));
    }

    #[tokio::test]
    async fn single_item_repeat_off_stops_on_next() {
        // Scenario 4 (§8): a single-item queue under Repeat Off stops on
        // `next` rather than looping.
        let (mut player, _t) = make_player(&[1]).await;
        player.playback_start(None);
        let outcome = player.playback_next();
        assert!(matches!(outcome, CommandOutcome::Result(0)));
        assert_eq!(player.state, PlayerState::Stopped);
    }

    #[tokio::test]
    async fn stop_clears_cursors_and_closes_contexts() {
        let (mut player, _t) = make_player(&[1, 2]).await;
        player.playback_start(None);
        player.playback_stop();
        assert!(player.queue.cur_playing.is_none());
        assert!(player.queue.cur_streaming.is_none());
        assert_eq!(player.state, PlayerState::Stopped);
    }

    #[tokio::test]
    async fn pause_then_start_resumes_without_reopen() {
        // Round-trip property (§8): pause/start resumes at the captured
        // sample index without reopening the context.
        let (mut player, _t) = make_player(&[1]).await;
        player.playback_start(None);
        let streaming = player.queue.cur_streaming.unwrap();
        player.queue.cur_playing = Some(streaming);
        player.playback_pause();
        assert_eq!(player.state, PlayerState::Paused);
        assert!(player.queue.item(streaming).ctx.is_some());
        let outcome = player.playback_start(None);
        assert!(matches!(outcome, CommandOutcome::NowPlaying(Some(1))));
        assert_eq!(player.state, PlayerState::Playing);
    }

    #[tokio::test]
    async fn speaker_set_with_missing_password_reports_partial_failure() {
        // Scenario 5 (§8).
        let (mut player, _t) = make_player(&[1]).await;
        player.registry.on_advertisement(
            "needs-password",
            Some("10.0.0.1".parse().unwrap()),
            Some(7000),
            crate::discovery::DiscoveryAttributes { id: 1, requires_password: true },
        );
        player.registry.on_advertisement(
            "open",
            Some("10.0.0.2".parse().unwrap()),
            Some(7000),
            crate::discovery::DiscoveryAttributes { id: 2, requires_password: false },
        );

        let (sender, reply_rx) = tokio::sync::oneshot::channel();
        player.handle_speaker_set(vec![1, 2], sender);
        assert!(player.pending.is_some());
        drop(reply_rx);
    }

    #[tokio::test]
    async fn shuffle_set_true_twice_does_not_reshuffle_again() {
        let (mut player, _t) = make_player(&[1, 2, 3]).await;

        let (reply, _rx) = tokio::sync::oneshot::channel();
        player.dispatch(PlayerCommand::ShuffleSet { enabled: true, reply });
        let after_first = player.queue.shuffle_head;

        let (reply, _rx) = tokio::sync::oneshot::channel();
        player.dispatch(PlayerCommand::ShuffleSet { enabled: true, reply });
        assert_eq!(player.queue.shuffle_head, after_first);
    }
}
