//! Source Queue (§4.B): two coupled cyclic rings over the same set of
//! items — playlist order and shuffle order — addressed through an
//! arena-backed [`ItemId`] rather than raw pointers (§4.B.1, §9).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{PlaybackError, PlaybackResult};
use crate::media::MediaLibrary;
use crate::state::{RepeatMode, SortKey};
use crate::transcode::{TranscodeHandle, Transcoder};

/// Index into the queue's arena. Stable for the lifetime of the item; never
/// reused while the item is live, reused only after `free`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId(usize);

impl ItemId {
    /// Raw arena index, for logging only.
    pub fn into_raw(self) -> usize {
        self.0
    }
}

/// A single queue entry. See §3 for the field-level contract.
#[derive(Debug, Clone)]
pub struct SourceItem {
    pub id: u32,
    pub stream_start: u64,
    pub output_start: u64,
    /// 0 means "not yet ended".
    pub end: u64,
    pub ctx: Option<TranscodeHandle>,
    pl_prev: ItemId,
    pl_next: ItemId,
    shuffle_prev: ItemId,
    shuffle_next: ItemId,
    /// Transient forward linkage between `cur_playing` and `cur_streaming`
    /// (§3, GLOSSARY); `None` outside the pre-roll window.
    pub play_next: Option<ItemId>,
}

/// Outcome of [`SourceQueue::next`] / [`SourceQueue::prev`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextOutcome {
    Opened(ItemId),
    Stop,
}

/// Two cyclic doubly-linked rings over the same arena, plus the playback
/// cursors that track where streaming/playing currently sit.
pub struct SourceQueue {
    arena: Vec<Option<SourceItem>>,
    free: Vec<usize>,
    item_count: usize,
    pub source_head: Option<ItemId>,
    pub shuffle_head: Option<ItemId>,
    pub cur_playing: Option<ItemId>,
    pub cur_streaming: Option<ItemId>,
    rng: StdRng,
}

impl Default for SourceQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceQueue {
    pub fn new() -> Self {
        Self {
            arena: Vec::new(),
            free: Vec::new(),
            item_count: 0,
            source_head: None,
            shuffle_head: None,
            cur_playing: None,
            cur_streaming: None,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn len(&self) -> usize {
        self.item_count
    }

    pub fn is_empty(&self) -> bool {
        self.item_count == 0
    }

    pub fn item(&self, id: ItemId) -> &SourceItem {
        self.arena[id.0].as_ref().expect("ItemId outlived its arena slot")
    }

    fn item_mut(&mut self, id: ItemId) -> &mut SourceItem {
        self.arena[id.0].as_mut().expect("ItemId outlived its arena slot")
    }

    /// Public mutable accessor, used by the pump to update transient
    /// playback fields (`stream_start`/`output_start`/`end`) across item
    /// boundaries without exposing the ring pointers.
    pub fn item_mut_pub(&mut self, id: ItemId) -> &mut SourceItem {
        self.item_mut(id)
    }

    /// Public wrapper over the effective-repeat-mode resolution (§4.B),
    /// used by the pump's `source_check` step.
    pub fn effective_repeat_mode(&self, mode: RepeatMode) -> RepeatMode {
        self.effective_repeat(false, mode)
    }

    fn ring_next(&self, id: ItemId, shuffle: bool) -> ItemId {
        if shuffle {
            self.item(id).shuffle_next
        } else {
            self.item(id).pl_next
        }
    }

    fn ring_prev(&self, id: ItemId, shuffle: bool) -> ItemId {
        if shuffle {
            self.item(id).shuffle_prev
        } else {
            self.item(id).pl_prev
        }
    }

    // ── arena bookkeeping ──────────────────────────────────────────────

    fn alloc_bare(&mut self, media_id: u32) -> ItemId {
        let item = SourceItem {
            id: media_id,
            stream_start: 0,
            output_start: 0,
            end: 0,
            ctx: None,
            pl_prev: ItemId(0),
            pl_next: ItemId(0),
            shuffle_prev: ItemId(0),
            shuffle_next: ItemId(0),
            play_next: None,
        };
        self.item_count += 1;
        let id = if let Some(idx) = self.free.pop() {
            self.arena[idx] = Some(item);
            ItemId(idx)
        } else {
            self.arena.push(Some(item));
            ItemId(self.arena.len() - 1)
        };
        // Singleton ring of one so a freshly-allocated node is always
        // well-formed before `link_ring_*` overwrites the pointers.
        let node = self.item_mut(id);
        node.pl_prev = id;
        node.pl_next = id;
        node.shuffle_prev = id;
        node.shuffle_next = id;
        id
    }

    fn free_one(&mut self, id: ItemId) {
        self.arena[id.0] = None;
        self.free.push(id.0);
        self.item_count -= 1;
    }

    // ── ring construction ──────────────────────────────────────────────

    fn link_ring_pl(&mut self, ids: &[ItemId]) {
        let n = ids.len();
        for i in 0..n {
            let next = ids[(i + 1) % n];
            let prev = ids[(i + n - 1) % n];
            let node = self.item_mut(ids[i]);
            node.pl_next = next;
            node.pl_prev = prev;
        }
    }

    fn link_ring_shuffle(&mut self, ids: &[ItemId]) {
        let n = ids.len();
        for i in 0..n {
            let next = ids[(i + 1) % n];
            let prev = ids[(i + n - 1) % n];
            let node = self.item_mut(ids[i]);
            node.shuffle_next = next;
            node.shuffle_prev = prev;
        }
    }

    fn pl_splice_ring_before(&mut self, head: Option<ItemId>, sub_head: ItemId) -> ItemId {
        match head {
            None => sub_head,
            Some(head) => {
                let a_prev = self.item(head).pl_prev;
                let b_tail = self.item(sub_head).pl_prev;
                self.item_mut(a_prev).pl_next = sub_head;
                self.item_mut(sub_head).pl_prev = a_prev;
                self.item_mut(b_tail).pl_next = head;
                self.item_mut(head).pl_prev = b_tail;
                head
            }
        }
    }

    fn shuffle_splice_ring_before(&mut self, head: Option<ItemId>, sub_head: ItemId) -> ItemId {
        match head {
            None => sub_head,
            Some(head) => {
                let a_prev = self.item(head).shuffle_prev;
                let b_tail = self.item(sub_head).shuffle_prev;
                self.item_mut(a_prev).shuffle_next = sub_head;
                self.item_mut(sub_head).shuffle_prev = a_prev;
                self.item_mut(b_tail).shuffle_next = head;
                self.item_mut(head).shuffle_prev = b_tail;
                head
            }
        }
    }

    fn fisher_yates(&mut self, items: &mut [ItemId]) {
        for i in (1..items.len()).rev() {
            let j = self.rng.gen_range(0..=i);
            items.swap(i, j);
        }
    }

    // ── public operations (§4.B) ───────────────────────────────────────

    /// Builds a brand new queue from a query, replacing anything already
    /// queued. The shuffle ring starts out equal to the playlist ring
    /// (insertion order) — distinct from [`SourceQueue::queue_add`], whose
    /// appended sub-ring gets an independently shuffled order.
    pub fn queue_make(
        &mut self,
        library: &dyn MediaLibrary,
        rows: &[u32],
        transcoder: &dyn Transcoder,
    ) -> PlaybackResult<()> {
        if rows.is_empty() {
            return Err(PlaybackError::EmptyQueue);
        }
        self.clear(transcoder);
        let ids: Vec<ItemId> = rows.iter().map(|id| self.alloc_bare(*id)).collect();
        self.link_ring_pl(&ids);
        self.link_ring_shuffle(&ids);
        self.source_head = Some(ids[0]);
        self.shuffle_head = Some(ids[0]);
        Ok(())
    }

    /// Appends a freshly-queried sub-ring before `source_head` in both
    /// rings (or adopts it outright if the queue was empty). The appended
    /// items get their own Fisher–Yates shuffle order, independent of the
    /// rest of the queue (§4.B).
    pub fn queue_add(&mut self, rows: &[u32]) -> PlaybackResult<()> {
        if rows.is_empty() {
            return Err(PlaybackError::EmptyQueue);
        }
        let ids: Vec<ItemId> = rows.iter().map(|id| self.alloc_bare(*id)).collect();
        self.link_ring_pl(&ids);

        let mut shuffle_order = ids.clone();
        self.fisher_yates(&mut shuffle_order);
        self.link_ring_shuffle(&shuffle_order);

        self.source_head = Some(self.pl_splice_ring_before(self.source_head, ids[0]));
        self.shuffle_head =
            Some(self.shuffle_splice_ring_before(self.shuffle_head, shuffle_order[0]));
        Ok(())
    }

    /// Frees every item (closing any open transcoder context) and resets
    /// both ring heads and both cursors to empty.
    pub fn clear(&mut self, transcoder: &dyn Transcoder) {
        if let Some(head) = self.source_head {
            let mut cur = head;
            loop {
                let next = self.item(cur).pl_next;
                if let Some(ctx) = self.item(cur).ctx {
                    transcoder.close(ctx);
                }
                self.free_one(cur);
                if next == head {
                    break;
                }
                cur = next;
            }
        }
        self.source_head = None;
        self.shuffle_head = None;
        self.cur_playing = None;
        self.cur_streaming = None;
    }

    /// Snapshots the playlist ring, Fisher–Yates shuffles it, and relinks it
    /// as the new shuffle ring. `shuffle_head` becomes `cur_streaming` if
    /// one exists, else the new ring's first element (§4.B).
    pub fn reshuffle(&mut self) {
        let Some(head) = self.source_head else {
            return;
        };
        let mut ids = vec![head];
        let mut cur = self.item(head).pl_next;
        while cur != head {
            ids.push(cur);
            cur = self.item(cur).pl_next;
        }
        self.fisher_yates(&mut ids);
        self.link_ring_shuffle(&ids);
        self.shuffle_head = Some(self.cur_streaming.unwrap_or(ids[0]));
        log::debug!("reshuffled {} item(s)", ids.len());
    }

    /// Resolves `id` to metadata, opens it through the transcoder, and
    /// resets its transient playback fields. Fails (without mutating
    /// anything) if the item is disabled or the transcoder refuses it.
    pub fn open(
        &mut self,
        id: ItemId,
        library: &dyn MediaLibrary,
        transcoder: &dyn Transcoder,
    ) -> PlaybackResult<()> {
        let media_id = self.item(id).id;
        let metadata = library.fetch(media_id)?;
        if metadata.disabled {
            return Err(PlaybackError::Transcode(format!(
                "item {media_id} is disabled"
            )));
        }
        let ctx = transcoder.open(&metadata)?;
        let item = self.item_mut(id);
        item.ctx = Some(ctx);
        item.stream_start = 0;
        item.output_start = 0;
        item.end = 0;
        item.play_next = None;
        Ok(())
    }

    fn effective_repeat(&self, force: bool, mode: RepeatMode) -> RepeatMode {
        if force && mode == RepeatMode::Song {
            return RepeatMode::All;
        }
        if self.item_count == 1 && mode == RepeatMode::All {
            return RepeatMode::Song;
        }
        mode
    }

    /// Advances the streaming cursor per the effective repeat mode (§4.B).
    ///
    /// The ring walked for "advance one step" is chosen solely by `shuffle`
    /// (shuffle ring if on, playlist ring otherwise); this applies to every
    /// repeat mode uniformly, including `Off`, which the distilled wording
    /// leaves implicit — see DESIGN.md for the decision record.
    pub fn next(
        &mut self,
        force: bool,
        mode: RepeatMode,
        shuffle: bool,
        library: &dyn MediaLibrary,
        transcoder: &dyn Transcoder,
    ) -> PlaybackResult<NextOutcome> {
        let Some(head) = (if shuffle { self.shuffle_head } else { self.source_head }) else {
            return Err(PlaybackError::EmptyQueue);
        };
        let effective = self.effective_repeat(force, mode);

        if effective == RepeatMode::Song {
            let target = self.cur_streaming.unwrap_or(head);
            if self.item(target).ctx.is_none() {
                self.open(target, library, transcoder)?;
            }
            self.cur_streaming = Some(target);
            return Ok(NextOutcome::Opened(target));
        }

        let start = self.cur_streaming.unwrap_or(head);
        let mut candidate = self.ring_next(start, shuffle);

        if effective == RepeatMode::Off && candidate == head && self.cur_streaming.is_some() {
            log::trace!("queue wrapped under repeat-off, stopping");
            return Ok(NextOutcome::Stop);
        }

        let mut wrap_limit = match effective {
            RepeatMode::All if !shuffle => self.cur_streaming.unwrap_or(head),
            RepeatMode::All => self.shuffle_head.unwrap_or(head),
            RepeatMode::Off => head,
            RepeatMode::Song => unreachable!(),
        };

        let mut attempts = 0usize;
        loop {
            attempts += 1;
            if attempts > self.item_count {
                return Err(PlaybackError::QueueExhausted);
            }

            if shuffle && effective == RepeatMode::All && candidate == wrap_limit && self.cur_streaming.is_some()
            {
                self.reshuffle();
                wrap_limit = self.shuffle_head.unwrap_or(wrap_limit);
            }

            match self.open(candidate, library, transcoder) {
                Ok(()) => {
                    if !force {
                        if let Some(old) = self.cur_streaming {
                            self.item_mut(old).play_next = Some(candidate);
                        }
                    }
                    self.cur_streaming = Some(candidate);
                    return Ok(NextOutcome::Opened(candidate));
                }
                Err(_) => {
                    let advanced = self.ring_next(candidate, shuffle);
                    if advanced == wrap_limit {
                        if effective == RepeatMode::Off {
                            return Ok(NextOutcome::Stop);
                        }
                        return Err(PlaybackError::QueueExhausted);
                    }
                    candidate = advanced;
                }
            }
        }
    }

    /// Symmetric to [`SourceQueue::next`] but walks backward and never
    /// reshuffles (§4.B, §9).
    pub fn prev(
        &mut self,
        mode: RepeatMode,
        shuffle: bool,
        library: &dyn MediaLibrary,
        transcoder: &dyn Transcoder,
    ) -> PlaybackResult<NextOutcome> {
        let Some(head) = (if shuffle { self.shuffle_head } else { self.source_head }) else {
            return Err(PlaybackError::EmptyQueue);
        };
        let start = self.cur_streaming.unwrap_or(head);
        let mut candidate = self.ring_prev(start, shuffle);

        if mode == RepeatMode::Off && candidate == head {
            return Ok(NextOutcome::Stop);
        }

        let mut attempts = 0usize;
        loop {
            attempts += 1;
            if attempts > self.item_count {
                return Err(PlaybackError::QueueExhausted);
            }
            match self.open(candidate, library, transcoder) {
                Ok(()) => {
                    self.cur_streaming = Some(candidate);
                    return Ok(NextOutcome::Opened(candidate));
                }
                Err(_) => {
                    let retreated = self.ring_prev(candidate, shuffle);
                    if retreated == head && mode == RepeatMode::Off {
                        return Ok(NextOutcome::Stop);
                    }
                    if retreated == start {
                        return Err(PlaybackError::QueueExhausted);
                    }
                    candidate = retreated;
                }
            }
        }
    }

    /// Closes transcoder contexts along the current play-chain (`cur_playing`
    /// through `play_next*` to `cur_streaming`) ahead of a fresh `start`,
    /// without freeing the ring nodes themselves (§4.G).
    pub fn close_active_chain(&mut self, transcoder: &dyn Transcoder) {
        let mut cur = self.cur_playing.or(self.cur_streaming);
        while let Some(id) = cur {
            let next = self.item(id).play_next;
            if let Some(ctx) = self.item(id).ctx {
                transcoder.close(ctx);
            }
            let item = self.item_mut(id);
            item.ctx = None;
            item.play_next = None;
            if Some(id) == self.cur_streaming {
                break;
            }
            cur = next;
        }
        self.cur_playing = None;
        self.cur_streaming = None;
    }

    /// Jumps `cur_streaming` to the item `steps` forward of `source_head`
    /// along the playlist ring and opens it (§4.G `start(idx_id)`). If
    /// `shuffle` is set, `shuffle_head` is moved to the same resolved item.
    pub fn start_at(
        &mut self,
        steps: u32,
        shuffle: bool,
        library: &dyn MediaLibrary,
        transcoder: &dyn Transcoder,
    ) -> PlaybackResult<ItemId> {
        let Some(head) = self.source_head else {
            return Err(PlaybackError::EmptyQueue);
        };
        let mut target = head;
        for _ in 0..steps {
            target = self.item(target).pl_next;
        }
        self.open(target, library, transcoder)?;
        self.cur_streaming = Some(target);
        if shuffle {
            self.shuffle_head = Some(target);
        }
        Ok(target)
    }

    /// Linear scan along the playlist ring from `source_head`, counting
    /// steps until `id` is found.
    pub fn position(&self, id: ItemId) -> Option<usize> {
        let head = self.source_head?;
        let mut cur = head;
        let mut idx = 0;
        loop {
            if cur == id {
                return Some(idx);
            }
            cur = self.item(cur).pl_next;
            idx += 1;
            if cur == head {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::tests::InMemoryLibrary;
    use crate::media::MediaMetadata;
    use crate::transcode::tests::FakeTranscoder;

    fn library(ids: &[u32]) -> InMemoryLibrary {
        InMemoryLibrary::new(
            ids.iter()
                .map(|id| MediaMetadata {
                    id: *id,
                    path: format!("{id}.wav"),
                    title: format!("Track {id}"),
                    album: None,
                    disabled: false,
                })
                .collect(),
        )
    }

    #[test]
    fn queue_make_builds_playlist_and_shuffle_rings_in_insertion_order() {
        let mut queue = SourceQueue::new();
        let lib = library(&[1, 2, 3]);
        let transcoder = FakeTranscoder::new();
        queue.queue_make(&lib, &[1, 2, 3], &transcoder).unwrap();

        let head = queue.source_head.unwrap();
        assert_eq!(queue.item(head).id, 1);
        let second = queue.item(head).pl_next;
        assert_eq!(queue.item(second).id, 2);

        let shuffle_head = queue.shuffle_head.unwrap();
        assert_eq!(queue.item(shuffle_head).id, 1);
    }

    #[test]
    fn queue_make_on_empty_rows_fails() {
        let mut queue = SourceQueue::new();
        let lib = library(&[]);
        let transcoder = FakeTranscoder::new();
        assert!(queue.queue_make(&lib, &[], &transcoder).is_err());
    }

    #[test]
    fn start_from_empty_cursor_opens_playlist_head() {
        // Scenario 1 (§8): queue [A,B,C], repeat off, no shuffle.
        let mut queue = SourceQueue::new();
        let lib = library(&[1, 2, 3]);
        let transcoder = FakeTranscoder::new();
        queue.queue_make(&lib, &[1, 2, 3], &transcoder).unwrap();

        let outcome = queue
            .next(true, RepeatMode::Off, false, &lib, &transcoder)
            .unwrap();
        match outcome {
            NextOutcome::Opened(id) => assert_eq!(queue.item(id).id, 1),
            NextOutcome::Stop => panic!("expected an opened item"),
        }
    }

    #[test]
    fn single_item_repeat_off_stops_after_one_item() {
        // Boundary behavior (§8): single-item queue + Repeat Off ends after
        // the item.
        let mut queue = SourceQueue::new();
        let lib = library(&[1]);
        let transcoder = FakeTranscoder::new();
        queue.queue_make(&lib, &[1], &transcoder).unwrap();
        queue
            .next(true, RepeatMode::Off, false, &lib, &transcoder)
            .unwrap();

        let outcome = queue
            .next(false, RepeatMode::Off, false, &lib, &transcoder)
            .unwrap();
        assert_eq!(outcome, NextOutcome::Stop);
    }

    #[test]
    fn single_item_repeat_all_behaves_as_song() {
        // Boundary behavior (§8): single-item + Repeat All == Repeat Song.
        let mut queue = SourceQueue::new();
        let lib = library(&[1]);
        let transcoder = FakeTranscoder::new();
        queue.queue_make(&lib, &[1], &transcoder).unwrap();
        queue
            .next(true, RepeatMode::All, false, &lib, &transcoder)
            .unwrap();

        let outcome = queue
            .next(false, RepeatMode::All, false, &lib, &transcoder)
            .unwrap();
        match outcome {
            NextOutcome::Opened(id) => assert_eq!(queue.item(id).id, 1),
            NextOutcome::Stop => panic!("repeat-all single item must not stop"),
        }
    }

    #[test]
    fn next_sets_play_next_chain_on_non_forced_advance() {
        let mut queue = SourceQueue::new();
        let lib = library(&[1, 2]);
        let transcoder = FakeTranscoder::new();
        queue.queue_make(&lib, &[1, 2], &transcoder).unwrap();

        let first = match queue.next(true, RepeatMode::Off, false, &lib, &transcoder).unwrap() {
            NextOutcome::Opened(id) => id,
            NextOutcome::Stop => panic!(),
        };
        let second = match queue.next(false, RepeatMode::Off, false, &lib, &transcoder).unwrap() {
            NextOutcome::Opened(id) => id,
            NextOutcome::Stop => panic!(),
        };
        assert_eq!(queue.item(first).play_next, Some(second));
    }

    #[test]
    fn prev_under_shuffle_does_not_reshuffle() {
        let mut queue = SourceQueue::new();
        let lib = library(&[1, 2, 3]);
        let transcoder = FakeTranscoder::new();
        queue.queue_make(&lib, &[1, 2, 3], &transcoder).unwrap();
        queue.reshuffle();
        let shuffle_head_before = queue.shuffle_head;

        queue
            .next(true, RepeatMode::Off, true, &lib, &transcoder)
            .unwrap();
        queue.prev(RepeatMode::Off, true, &lib, &transcoder).ok();

        assert_eq!(queue.shuffle_head, shuffle_head_before);
    }

    #[test]
    fn clear_then_add_then_clear_leaves_both_heads_empty() {
        let mut queue = SourceQueue::new();
        let transcoder = FakeTranscoder::new();
        queue.clear(&transcoder);
        queue.queue_add(&[1, 2]).unwrap();
        assert!(queue.source_head.is_some());
        queue.clear(&transcoder);
        assert!(queue.source_head.is_none());
        assert!(queue.shuffle_head.is_none());
    }

    #[test]
    fn position_counts_steps_from_source_head() {
        let mut queue = SourceQueue::new();
        let lib = library(&[1, 2, 3]);
        let transcoder = FakeTranscoder::new();
        queue.queue_make(&lib, &[1, 2, 3], &transcoder).unwrap();
        let head = queue.source_head.unwrap();
        let third = queue.item(queue.item(head).pl_next).pl_next;
        assert_eq!(queue.position(third), Some(2));
    }
}
