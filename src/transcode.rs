//! Transcoder collaborator contract.
//!
//! Output is always 16-bit little-endian signed stereo PCM at 44,100 Hz
//! (§6); the trait itself is format-agnostic about the *input*.

use crate::error::PlaybackResult;
use crate::media::MediaMetadata;

/// Opaque handle into an open transcoder session.
///
/// Management of the underlying decoder/file state is entirely the
/// implementor's concern; the queue only ever stores and passes back this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TranscodeHandle(pub u64);

/// Opens, reads, and seeks media items, always emitting 16-bit stereo PCM.
pub trait Transcoder: Send + Sync {
    /// Opens `metadata` for reading. Fails if the item cannot be decoded.
    fn open(&self, metadata: &MediaMetadata) -> PlaybackResult<TranscodeHandle>;

    /// Reads up to `max_bytes` of PCM. An empty return means end of stream.
    fn read(&self, handle: TranscodeHandle, max_bytes: usize) -> PlaybackResult<Vec<u8>>;

    /// Seeks to `ms` milliseconds from the start, returning the position
    /// actually seeked to (decoders may only seek to keyframes).
    fn seek(&self, handle: TranscodeHandle, ms: u64) -> PlaybackResult<u64>;

    /// Releases resources associated with `handle`. Idempotent.
    fn close(&self, handle: TranscodeHandle);
}
