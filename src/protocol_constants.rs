//! Fixed protocol constants that should NOT be changed.
//!
//! These values define the engine's sole timebase and packet framing and are
//! assumed throughout the queue, pump, and clock modules.

use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// Audio Timebase
// ─────────────────────────────────────────────────────────────────────────────

/// Sample rate, in Hz, of the engine's sole timebase.
///
/// Every `SourceItem` field (`stream_start`, `output_start`, `end`) and every
/// `last_rtptime` value is a count of stereo frames at this rate.
pub const SAMPLE_RATE: u64 = 44_100;

/// Number of channels the transcoder always yields (stereo).
pub const CHANNELS: u64 = 2;

/// Bytes per sample (16-bit signed little-endian).
pub const BYTES_PER_SAMPLE: u64 = 2;

/// Bytes per stereo frame (one sample per channel).
pub const BYTES_PER_FRAME: u64 = CHANNELS * BYTES_PER_SAMPLE;

/// Number of samples (stereo frames) fanned out to every output per tick.
///
/// This is the sole unit of work for one pump tick: every tick advances
/// `last_rtptime` by exactly this amount.
pub const PACKET_SAMPLES: u64 = 352; // 8ms at 44.1kHz, a common RTP-style packet size

/// Size in bytes of one packet's worth of PCM (the scratch buffer size).
pub const PACKET_BYTES: usize = (PACKET_SAMPLES * BYTES_PER_FRAME) as usize;

/// Wall-clock duration of one packet, and therefore the pump's tick period.
pub const STREAM_PERIOD: Duration =
    Duration::from_nanos(PACKET_SAMPLES * 1_000_000_000 / SAMPLE_RATE);

/// Initial streaming lead: the gap between `stream_start` and `output_start`
/// given to newly (re)started playback so networked receivers have time to
/// buffer before being told "now playing".
pub const INITIAL_STREAMING_LEAD_SAMPLES: u64 = 2 * SAMPLE_RATE; // 88,200 samples
