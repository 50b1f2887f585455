//! Demo binary: wires the playback engine against in-memory fakes and
//! drives a short scripted session, analogous to the teacher's headless
//! server `main.rs`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use parking_lot::Mutex;

use playback_engine::bootstrap::bootstrap_player;
use playback_engine::command::PlayerCommand;
use playback_engine::devices::{Device, NoPasswords};
use playback_engine::error::{PlaybackError, PlaybackResult};
use playback_engine::media::{MediaLibrary, MediaMetadata, MediaSummary, QueryFilter};
use playback_engine::protocol_constants::{BYTES_PER_FRAME, SAMPLE_RATE};
use playback_engine::remote::{RemoteDriver, SessionId};
use playback_engine::sink::{LocalSink, SinkState, SinkStateCallback};
use playback_engine::state::{Config, SortKey};
use playback_engine::transcode::{TranscodeHandle, Transcoder};

/// CLI flags, layered CLI > env > YAML file > defaults, following the
/// teacher's standalone-server config convention.
#[derive(Parser, Debug)]
#[command(name = "playerd", about = "Playback engine demo driver")]
struct Cli {
    /// Path to an optional YAML config file.
    #[arg(long, env = "PLAYERD_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides the configured log level.
    #[arg(long, env = "PLAYERD_LOG_LEVEL")]
    log_level: Option<String>,

    /// Overrides the directory persisted config is read from/written to.
    #[arg(long, env = "PLAYERD_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

/// A handful of fixed demo tracks, standing in for a real catalog.
struct DemoLibrary {
    items: Vec<MediaMetadata>,
}

impl DemoLibrary {
    fn new() -> Self {
        Self {
            items: vec![
                MediaMetadata {
                    id: 1,
                    path: "demo://one".into(),
                    title: "Morning Drift".into(),
                    album: Some("Ambient Sketches".into()),
                    disabled: false,
                },
                MediaMetadata {
                    id: 2,
                    path: "demo://two".into(),
                    title: "Low Tide".into(),
                    album: Some("Ambient Sketches".into()),
                    disabled: false,
                },
                MediaMetadata {
                    id: 3,
                    path: "demo://three".into(),
                    title: "Glasswork".into(),
                    album: Some("Ambient Sketches".into()),
                    disabled: false,
                },
            ],
        }
    }
}

impl MediaLibrary for DemoLibrary {
    fn query(&self, filter: &QueryFilter, _sort: SortKey) -> PlaybackResult<Vec<MediaSummary>> {
        let needle = filter.0.to_lowercase();
        Ok(self
            .items
            .iter()
            .filter(|i| needle == "*" || i.title.to_lowercase().contains(&needle))
            .map(|i| MediaSummary {
                id: i.id,
                title: i.title.clone(),
                album: i.album.clone(),
            })
            .collect())
    }

    fn fetch(&self, id: u32) -> PlaybackResult<MediaMetadata> {
        self.items
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or_else(|| PlaybackError::InvalidQuery(format!("no such demo item {id}")))
    }
}

/// Five seconds of silence per item, rather than decoding real media, so the
/// binary has no external file dependencies.
const DEMO_ITEM_BYTES: u64 = 5 * SAMPLE_RATE * BYTES_PER_FRAME;

struct SilenceTranscoder {
    next_handle: AtomicU64,
    remaining: Mutex<HashMap<u64, u64>>,
}

impl SilenceTranscoder {
    fn new() -> Self {
        Self {
            next_handle: AtomicU64::new(1),
            remaining: Mutex::new(HashMap::new()),
        }
    }
}

impl Transcoder for SilenceTranscoder {
    fn open(&self, metadata: &MediaMetadata) -> PlaybackResult<TranscodeHandle> {
        if metadata.disabled {
            return Err(PlaybackError::Transcode(format!(
                "item {} is disabled",
                metadata.id
            )));
        }
        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        self.remaining.lock().insert(handle, DEMO_ITEM_BYTES);
        Ok(TranscodeHandle(handle))
    }

    fn read(&self, handle: TranscodeHandle, max_bytes: usize) -> PlaybackResult<Vec<u8>> {
        let mut remaining = self.remaining.lock();
        let left = remaining
            .get_mut(&handle.0)
            .ok_or_else(|| PlaybackError::Transcode("unknown handle".to_string()))?;
        let n = (max_bytes as u64).min(*left) as usize;
        *left -= n as u64;
        Ok(vec![0u8; n])
    }

    fn seek(&self, handle: TranscodeHandle, ms: u64) -> PlaybackResult<u64> {
        let consumed = (ms * BYTES_PER_FRAME * SAMPLE_RATE) / 1000;
        if let Some(left) = self.remaining.lock().get_mut(&handle.0) {
            *left = DEMO_ITEM_BYTES.saturating_sub(consumed);
        }
        Ok(ms)
    }

    fn close(&self, handle: TranscodeHandle) {
        self.remaining.lock().remove(&handle.0);
    }
}

/// Logs every sink operation instead of touching real audio hardware.
struct LoggingSink {
    position: AtomicU64,
    callback: Mutex<Option<Arc<dyn SinkStateCallback>>>,
}

impl LoggingSink {
    fn new() -> Self {
        Self {
            position: AtomicU64::new(0),
            callback: Mutex::new(None),
        }
    }

    fn notify(&self, state: SinkState) {
        if let Some(cb) = self.callback.lock().as_ref() {
            cb.on_state(state);
        }
    }
}

impl LocalSink for LoggingSink {
    fn open(&self) -> PlaybackResult<()> {
        tracing::info!("local sink open");
        self.notify(SinkState::Open);
        Ok(())
    }

    fn close(&self) {
        tracing::info!("local sink close");
        self.notify(SinkState::Closed);
    }

    fn start(&self, pos: u64, rtptime: u64) -> PlaybackResult<()> {
        tracing::info!(pos, rtptime, "local sink start");
        self.position.store(pos, Ordering::SeqCst);
        self.notify(SinkState::Running);
        Ok(())
    }

    fn stop(&self) {
        tracing::info!("local sink stop");
        self.notify(SinkState::Stopping);
    }

    fn write(&self, pcm: &[u8], rtptime: u64) -> PlaybackResult<()> {
        self.position
            .store(rtptime + (pcm.len() as u64) / BYTES_PER_FRAME, Ordering::SeqCst);
        Ok(())
    }

    fn set_volume(&self, volume: u8) -> PlaybackResult<()> {
        tracing::info!(volume, "local sink volume");
        Ok(())
    }

    fn position(&self) -> PlaybackResult<u64> {
        Ok(self.position.load(Ordering::SeqCst))
    }

    fn set_state_callback(&self, callback: Arc<dyn SinkStateCallback>) {
        *self.callback.lock() = Some(callback);
    }
}

/// Logs every remote-device operation instead of talking to real receivers.
struct LoggingRemoteDriver {
    next_session: AtomicU64,
}

impl LoggingRemoteDriver {
    fn new() -> Self {
        Self {
            next_session: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl RemoteDriver for LoggingRemoteDriver {
    async fn start(&self, device: &Device, rtptime: u64) -> PlaybackResult<SessionId> {
        tracing::info!(device = device.id, rtptime, "remote start");
        Ok(SessionId(self.next_session.fetch_add(1, Ordering::SeqCst)))
    }

    async fn probe(&self, device: &Device) -> PlaybackResult<()> {
        tracing::info!(device = device.id, "remote probe");
        Ok(())
    }

    async fn stop(&self, session: SessionId) {
        tracing::info!(session = session.0, "remote stop");
    }

    async fn flush(&self, session: SessionId, rtptime: u64) -> PlaybackResult<u32> {
        tracing::info!(session = session.0, rtptime, "remote flush");
        Ok(0)
    }

    async fn set_volume(&self, session: SessionId, volume: u8) -> PlaybackResult<u32> {
        tracing::info!(session = session.0, volume, "remote set_volume");
        Ok(0)
    }

    async fn write(&self, session: SessionId, pcm: &[u8], rtptime: u64) -> PlaybackResult<()> {
        let _ = (session, pcm, rtptime);
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if cli.data_dir.is_some() {
        config.data_dir = cli.data_dir;
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(config.log_level.clone()))
        .init();

    let services = bootstrap_player(
        &config,
        Arc::new(DemoLibrary::new()),
        Arc::new(SilenceTranscoder::new()),
        Arc::new(LoggingSink::new()),
        Arc::new(LoggingRemoteDriver::new()),
        Arc::new(NoPasswords),
    )?;

    let mut status_events = services.events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = status_events.recv().await {
            tracing::info!(?event, "status event");
        }
    });

    let queued = services
        .sender
        .dispatch(|reply| PlayerCommand::QueueAdd {
            media_ids: vec![1, 2, 3],
            reply,
        })
        .await;
    tracing::info!(?queued, "queued demo tracks");

    let started = services
        .sender
        .dispatch(|reply| PlayerCommand::PlaybackStart { idx: None, reply })
        .await;
    tracing::info!(?started, "started playback");

    tokio::time::sleep(Duration::from_secs(3)).await;

    let status = services
        .sender
        .dispatch(|reply| PlayerCommand::GetStatus { reply })
        .await;
    tracing::info!(?status, "status after 3s");

    let advanced = services
        .sender
        .dispatch(|reply| PlayerCommand::PlaybackNext { reply })
        .await;
    tracing::info!(?advanced, "advanced to next track");

    tokio::time::sleep(Duration::from_secs(2)).await;

    let stopped = services
        .sender
        .dispatch(|reply| PlayerCommand::PlaybackStop { reply })
        .await;
    tracing::info!(?stopped, "stopped playback");

    services.shutdown().await;
    Ok(())
}
