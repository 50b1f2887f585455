//! Audio Pump (§4.C): the periodic tick that advances the streaming
//! timeline, drains PCM out of the transcoder, and hands packets to every
//! active output.

use crate::clock::SyncClock;
use crate::devices::Device;
use crate::error::PlaybackResult;
use crate::media::MediaLibrary;
use crate::protocol_constants::PACKET_BYTES;
use crate::queue::{ItemId, SourceQueue};
use crate::remote::SessionId;
use crate::sink::LocalSink;
use crate::state::RepeatMode;
use crate::transcode::Transcoder;

/// One remote session's delivery target, as seen by the pump's fan-out step.
pub struct RemoteTarget {
    pub device_id: u64,
    pub session: SessionId,
}

/// Result of one [`AudioPump::tick`].
pub enum TickOutcome {
    /// A packet was produced and should be fanned out to active outputs.
    Packet { pcm: Vec<u8>, rtptime: u64 },
    /// Playback ended (queue exhausted under a non-looping repeat mode).
    Stopped,
}

/// Per-item PCM carryover: bytes already pulled from the transcoder for the
/// current streaming item but not yet placed into a packet.
#[derive(Default)]
struct Carry {
    item: Option<ItemId>,
    bytes: Vec<u8>,
}

/// Owns the scratch packet buffer and per-item carryover; everything else
/// (the queue, the clock) is borrowed in from the player thread each tick.
pub struct AudioPump {
    last_rtptime: u64,
    carry: Carry,
}

impl Default for AudioPump {
    fn default() -> Self {
        Self::new(0)
    }
}

impl AudioPump {
    pub fn new(initial_rtptime: u64) -> Self {
        Self {
            last_rtptime: initial_rtptime,
            carry: Carry::default(),
        }
    }

    pub fn last_rtptime(&self) -> u64 {
        self.last_rtptime
    }

    pub fn set_last_rtptime(&mut self, rtptime: u64) {
        self.last_rtptime = rtptime;
    }

    /// Runs one tick of the algorithm (§4.C, steps 1–6).
    #[allow(clippy::too_many_arguments)]
    pub fn tick(
        &mut self,
        queue: &mut SourceQueue,
        clock: &SyncClock,
        repeat: RepeatMode,
        shuffle: bool,
        library: &dyn MediaLibrary,
        transcoder: &dyn Transcoder,
        local_sink: &dyn LocalSink,
    ) -> PlaybackResult<TickOutcome> {
        // 1. source_check
        if !self.source_check(queue, clock, repeat, shuffle, library, transcoder, local_sink)? {
            return Ok(TickOutcome::Stopped);
        }

        // 2. Abort handled by the `false` return above; state transitions to
        // Stopped are the caller's (player thread's) responsibility.

        // 3. Advance the timeline.
        self.last_rtptime += crate::protocol_constants::PACKET_SAMPLES;

        // 4. Zero the scratch packet.
        let mut packet = vec![0u8; PACKET_BYTES];

        // 5. source_read.
        self.source_read(queue, &mut packet, repeat, shuffle, library, transcoder)?;

        Ok(TickOutcome::Packet {
            pcm: packet,
            rtptime: self.last_rtptime,
        })
    }

    /// Returns `false` if playback should stop.
    #[allow(clippy::too_many_arguments)]
    fn source_check(
        &mut self,
        queue: &mut SourceQueue,
        clock: &SyncClock,
        repeat: RepeatMode,
        shuffle: bool,
        library: &dyn MediaLibrary,
        transcoder: &dyn Transcoder,
        local_sink: &dyn LocalSink,
    ) -> PlaybackResult<bool> {
        let (pos, _ts) = clock.position(false, local_sink)?;

        let Some(streaming) = queue.cur_streaming else {
            return Ok(false);
        };

        if queue.cur_playing.is_none() {
            if pos >= queue.item(streaming).output_start {
                queue.cur_playing = Some(streaming);
                tracing::debug!(item = streaming.into_raw(), "play_playing");
            }
            return Ok(true);
        }

        let playing = queue.cur_playing.unwrap();
        let end = queue.item(playing).end;
        if end == 0 || pos < end {
            return Ok(true);
        }

        // Crossed into the next item.
        let effective = queue.effective_repeat_mode(repeat);
        if effective == RepeatMode::Song {
            if let Some(next) = queue.item(playing).play_next {
                self.cross_boundary(queue, playing, next, transcoder);
                queue.cur_playing = Some(next);
                queue.item_mut_pub(next).play_next = None;
            } else {
                let new_start = queue.item(playing).end + 1;
                let item = queue.item_mut_pub(playing);
                item.stream_start = new_start;
                item.output_start = new_start;
                item.end = 0;
            }
            tracing::debug!("play_playing (song repeat)");
            return Ok(true);
        }

        match queue.item(playing).play_next {
            None => Ok(false),
            Some(next) => {
                self.cross_boundary(queue, playing, next, transcoder);
                let is_head = shuffle
                    && queue.shuffle_head == Some(next)
                    || !shuffle && queue.source_head == Some(next);
                if effective == RepeatMode::Off && is_head {
                    return Ok(false);
                }
                queue.cur_playing = Some(next);
                queue.item_mut_pub(next).play_next = None;
                tracing::debug!(item = next.into_raw(), "play_playing");
                let _ = library;
                Ok(true)
            }
        }
    }

    /// Advances `cur_playing` from `old` to `new`: stamps `new`'s timeline
    /// and closes out `old`'s transcoder context, since `old` has now been
    /// advanced past and §5 requires its handle closed (not just on stop or
    /// queue clear).
    fn cross_boundary(
        &self,
        queue: &mut SourceQueue,
        old: ItemId,
        new: ItemId,
        transcoder: &dyn Transcoder,
    ) {
        let new_start = queue.item(old).end + 1;
        let item = queue.item_mut_pub(new);
        item.stream_start = new_start;
        item.output_start = new_start;

        let old_item = queue.item_mut_pub(old);
        if let Some(ctx) = old_item.ctx.take() {
            transcoder.close(ctx);
        }
        old_item.end = 0;
    }

    /// Drains the transcoder into `packet`, advancing past item boundaries
    /// as needed. The packet is guaranteed fully sized (zeroed tail =
    /// silence) on every exit path, including the "could not open any next
    /// item" path (§4.C step 5, §9).
    fn source_read(
        &mut self,
        queue: &mut SourceQueue,
        packet: &mut [u8],
        repeat: RepeatMode,
        shuffle: bool,
        library: &dyn MediaLibrary,
        transcoder: &dyn Transcoder,
    ) -> PlaybackResult<()> {
        let mut filled = 0usize;

        loop {
            let Some(streaming) = queue.cur_streaming else {
                return Ok(());
            };

            if self.carry.item != Some(streaming) {
                self.carry.item = Some(streaming);
                self.carry.bytes.clear();
            }

            if !self.carry.bytes.is_empty() {
                let n = self.carry.bytes.len().min(packet.len() - filled);
                packet[filled..filled + n].copy_from_slice(&self.carry.bytes[..n]);
                self.carry.bytes.drain(..n);
                filled += n;
                if filled == packet.len() {
                    return Ok(());
                }
            }

            let ctx = match queue.item(streaming).ctx {
                Some(ctx) => ctx,
                None => return Ok(()),
            };

            let want = packet.len() - filled;
            let chunk = transcoder.read(ctx, want)?;

            if chunk.is_empty() {
                // EOF: close out the item and advance.
                let end = self.last_rtptime + filled as u64 - 1;
                queue.item_mut_pub(streaming).end = end;

                match queue.next(false, repeat, shuffle, library, transcoder) {
                    Ok(_) => continue,
                    Err(_) => {
                        // Every candidate failed to open: remaining bytes of
                        // this packet stay silent (already zeroed).
                        return Ok(());
                    }
                }
            }

            let n = chunk.len().min(packet.len() - filled);
            packet[filled..filled + n].copy_from_slice(&chunk[..n]);
            if n < chunk.len() {
                self.carry.bytes.extend_from_slice(&chunk[n..]);
            }
            filled += n;
            if filled == packet.len() {
                return Ok(());
            }
        }
    }
}

/// Targets the pump's fan-out step hands a packet to, beyond the local sink.
pub fn active_remote_targets(devices: &[Device]) -> Vec<RemoteTarget> {
    devices
        .iter()
        .filter_map(|d| d.session.map(|s| RemoteTarget { device_id: d.id, session: s }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemMonotonicClock;
    use crate::media::tests::InMemoryLibrary;
    use crate::media::MediaMetadata;
    use crate::protocol_constants::PACKET_SAMPLES;
    use crate::sink::tests::FakeLocalSink;
    use crate::transcode::tests::FakeTranscoder;
    use std::sync::Arc;

    fn setup(lengths: &[(u32, u64)]) -> (SourceQueue, InMemoryLibrary, FakeTranscoder) {
        let lib = InMemoryLibrary::new(
            lengths
                .iter()
                .map(|(id, _)| MediaMetadata {
                    id: *id,
                    path: format!("{id}.wav"),
                    title: format!("T{id}"),
                    album: None,
                    disabled: false,
                })
                .collect(),
        );
        let transcoder = FakeTranscoder::new();
        for (id, len) in lengths {
            transcoder.set_length_bytes(*id, *len);
        }
        let mut queue = SourceQueue::new();
        let ids: Vec<u32> = lengths.iter().map(|(id, _)| *id).collect();
        queue.queue_make(&lib, &ids, &transcoder).unwrap();
        (queue, lib, transcoder)
    }

    #[test]
    fn tick_emits_silence_when_no_cur_streaming() {
        let (mut queue, lib, transcoder) = setup(&[(1, 10_000)]);
        queue.cur_streaming = None;
        let clock = SyncClock::new(Arc::new(SystemMonotonicClock)).unwrap();
        let sink = FakeLocalSink::new();
        let mut pump = AudioPump::default();

        let outcome = pump
            .tick(&mut queue, &clock, RepeatMode::Off, false, &lib, &transcoder, &sink)
            .unwrap();
        assert!(matches!(outcome, TickOutcome::Stopped));
    }

    #[test]
    fn tick_promotes_cur_playing_once_output_start_reached() {
        let (mut queue, lib, transcoder) = setup(&[(1, 1_000_000)]);
        queue
            .next(true, RepeatMode::Off, false, &lib, &transcoder)
            .unwrap();
        let streaming = queue.cur_streaming.unwrap();
        queue.item_mut_pub(streaming).output_start = 0;

        let clock = SyncClock::new(Arc::new(SystemMonotonicClock)).unwrap();
        let sink = FakeLocalSink::new();
        let mut pump = AudioPump::default();

        let outcome = pump
            .tick(&mut queue, &clock, RepeatMode::Off, false, &lib, &transcoder, &sink)
            .unwrap();
        assert!(matches!(outcome, TickOutcome::Packet { .. }));
        assert_eq!(queue.cur_playing, Some(streaming));
        assert_eq!(pump.last_rtptime(), PACKET_SAMPLES);
    }
}
