//! Sync Clock: derives "current stream position" from one of two sources.
//!
//! The two sync sources share one contract (§4.A): given a commit flag,
//! return `(pos, ts)` and optionally install them as the new reference point.
//! `SyncSource::Clock` extrapolates from the last commit using a monotonic
//! timer; `SyncSource::LocalAudio` asks the local sink directly.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::error::PlaybackResult;
use crate::protocol_constants::SAMPLE_RATE;
use crate::sink::LocalSink;

/// Which source the clock currently derives position from.
///
/// Switched exclusively by the local-sink state callback (§4.E): `Running`
/// switches to `LocalAudio`, `Stopping`/`Failed` switch back to `Clock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSource {
    Clock,
    LocalAudio,
}

/// Trait for reading a monotonic timestamp, injected for testability.
///
/// Mirrors the teacher's `IpDetector`-trait-for-testability convention in
/// `context.rs`: production code uses [`SystemMonotonicClock`], tests use a
/// fake that can be advanced deterministically.
pub trait MonotonicClock: Send + Sync {
    /// Reads the current monotonic instant.
    fn now(&self) -> PlaybackResult<Instant>;
}

/// Production clock backed by `std::time::Instant`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMonotonicClock;

impl MonotonicClock for SystemMonotonicClock {
    fn now(&self) -> PlaybackResult<Instant> {
        Ok(Instant::now())
    }
}

struct Inner {
    /// Last committed sample position.
    pb_pos: u64,
    /// Monotonic timestamp the position above was committed at.
    pb_pos_stamp: Instant,
    pb_sync_source: SyncSource,
}

/// The playback clock: `(pb_pos, pb_pos_stamp)` plus the active sync source.
///
/// Cloneable handle; the inner state is shared so the output coordinator and
/// the pump (both running on the player thread, but logically distinct
/// collaborators) observe the same committed reference point.
#[derive(Clone)]
pub struct SyncClock {
    inner: Arc<Mutex<Inner>>,
    clock: Arc<dyn MonotonicClock>,
}

impl SyncClock {
    /// Creates a new clock anchored at `(0, now)` under the `Clock` source.
    pub fn new(clock: Arc<dyn MonotonicClock>) -> PlaybackResult<Self> {
        let now = clock.now()?;
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                pb_pos: 0,
                pb_pos_stamp: now,
                pb_sync_source: SyncSource::Clock,
            })),
            clock,
        })
    }

    /// Returns the current sync source.
    pub fn source(&self) -> SyncSource {
        self.inner.lock().pb_sync_source
    }

    /// Switches the sync source without touching the committed reference
    /// point. Callers that need the LocalAudio→Clock seam closed (§9) must
    /// call [`SyncClock::position`] with `commit = true` *before* switching.
    pub fn set_source(&self, source: SyncSource) {
        log::trace!("sync source -> {:?}", source);
        self.inner.lock().pb_sync_source = source;
    }

    /// Directly installs a new reference point, used by the pump when
    /// arming a fresh `start` (`pb_pos := last_rtptime + PACKET_SAMPLES -
    /// lead`).
    pub fn set_position(&self, pos: u64, ts: Instant) {
        let mut inner = self.inner.lock();
        inner.pb_pos = pos;
        inner.pb_pos_stamp = ts;
    }

    /// Computes `(pos, ts)` under the active sync source, optionally
    /// committing it as the new reference point.
    ///
    /// `local_sink` is consulted only under `SyncSource::LocalAudio`.
    pub fn position(
        &self,
        commit: bool,
        local_sink: &dyn LocalSink,
    ) -> PlaybackResult<(u64, Instant)> {
        let mut inner = self.inner.lock();
        let (pos, ts) = match inner.pb_sync_source {
            SyncSource::Clock => {
                let ts = self.clock.now()?;
                let delta_us = ts
                    .saturating_duration_since(inner.pb_pos_stamp)
                    .as_micros() as u64;
                let pos = inner.pb_pos + (delta_us * SAMPLE_RATE) / 1_000_000;
                (pos, ts)
            }
            SyncSource::LocalAudio => {
                let pos = local_sink.position()?;
                let ts = self.clock.now()?;
                (pos, ts)
            }
        };
        if commit {
            inner.pb_pos = pos;
            inner.pb_pos_stamp = ts;
        }
        Ok((pos, ts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::tests::FakeLocalSink;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    /// Fake monotonic clock whose `now()` advances only when told to,
    /// so position extrapolation can be tested deterministically.
    struct FakeMonotonicClock {
        base: Instant,
        offset_us: AtomicU64,
    }

    impl FakeMonotonicClock {
        fn new() -> Self {
            Self {
                base: Instant::now(),
                offset_us: AtomicU64::new(0),
            }
        }

        fn advance(&self, d: Duration) {
            self.offset_us
                .fetch_add(d.as_micros() as u64, Ordering::SeqCst);
        }
    }

    impl MonotonicClock for FakeMonotonicClock {
        fn now(&self) -> PlaybackResult<Instant> {
            Ok(self.base + Duration::from_micros(self.offset_us.load(Ordering::SeqCst)))
        }
    }

    #[test]
    fn clock_source_extrapolates_by_elapsed_samples() {
        let fake = Arc::new(FakeMonotonicClock::new());
        let clock = SyncClock::new(fake.clone() as Arc<dyn MonotonicClock>).unwrap();
        let sink = FakeLocalSink::new();

        clock.set_position(1000, fake.now().unwrap());
        fake.advance(Duration::from_secs(1));

        let (pos, _) = clock.position(false, &sink).unwrap();
        assert_eq!(pos, 1000 + SAMPLE_RATE);
    }

    #[test]
    fn commit_updates_reference_point() {
        let fake = Arc::new(FakeMonotonicClock::new());
        let clock = SyncClock::new(fake.clone() as Arc<dyn MonotonicClock>).unwrap();
        let sink = FakeLocalSink::new();

        fake.advance(Duration::from_secs(2));
        let (pos, ts) = clock.position(true, &sink).unwrap();
        assert_eq!(pos, 2 * SAMPLE_RATE);

        // A second read with no further elapsed time should return the same
        // position since we just committed it.
        let (pos2, _) = clock.position(false, &sink).unwrap();
        assert_eq!(pos, pos2);
        assert_eq!(ts, fake.now().unwrap());
    }

    #[test]
    fn local_audio_source_reads_sink_position() {
        let fake = Arc::new(FakeMonotonicClock::new());
        let clock = SyncClock::new(fake as Arc<dyn MonotonicClock>).unwrap();
        let sink = FakeLocalSink::new();
        sink.set_position(5000);
        clock.set_source(SyncSource::LocalAudio);

        let (pos, _) = clock.position(false, &sink).unwrap();
        assert_eq!(pos, 5000);
    }

    #[test]
    fn stopping_commits_under_local_audio_then_switches_to_clock() {
        let fake = Arc::new(FakeMonotonicClock::new());
        let clock = SyncClock::new(fake.clone() as Arc<dyn MonotonicClock>).unwrap();
        let sink = FakeLocalSink::new();
        sink.set_position(7000);
        clock.set_source(SyncSource::LocalAudio);

        // Stopping callback: commit under LocalAudio first...
        clock.position(true, &sink).unwrap();
        // ...then switch to Clock. No seam: the next Clock read starts from
        // the committed LocalAudio position.
        clock.set_source(SyncSource::Clock);
        fake.advance(Duration::from_millis(0));
        let (pos, _) = clock.position(false, &sink).unwrap();
        assert_eq!(pos, 7000);
    }
}
