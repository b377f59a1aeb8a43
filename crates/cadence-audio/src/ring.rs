//! Buffer-lifecycle ring over an immutable PCM source.
//!
//! Partitions the unconsumed tail of the source into a small ring of
//! capacity-bounded slots and refills exactly one slot per completion
//! notification, so memory stays bounded regardless of source length.

use crate::sink::CompletionFlags;

/// Minimum number of ring slots; fewer cannot double-buffer.
pub const MIN_BUFFER_COUNT: usize = 2;

/// Maximum number of ring slots.
pub const MAX_BUFFER_COUNT: usize = 16;

/// A chunk of the source to hand to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Refill {
    /// Ring slot the chunk occupies.
    pub slot: usize,
    /// Byte offset of the chunk within the source.
    pub offset: usize,
    /// Chunk length in bytes.
    pub len: usize,
}

/// One ring slot: the source byte range it currently references and whether
/// it is queued with the sink.
#[derive(Debug, Clone, Copy, Default)]
struct BufferSlot {
    offset: usize,
    len: usize,
    queued: bool,
}

/// Fixed-size ordered ring of buffer descriptors over an immutable byte
/// sequence.
///
/// Invariant: taken in submission order, the ranges handed out cover
/// `[start_offset, next_unqueued)` contiguously and monotonically; no byte
/// is referenced twice and no gap is skipped. A slot's completion is tracked
/// in the [`CompletionFlags`] shared with the sink; a slot counts as
/// complete when it was never submitted or its done bit is set.
#[derive(Debug)]
pub struct BufferRing {
    /// Slot descriptors, in ring order.
    slots: Vec<BufferSlot>,
    /// Done bits shared with the sink, one per slot.
    completions: CompletionFlags,
    /// Maximum bytes per slot.
    capacity: usize,
    /// Total source length in bytes.
    source_len: usize,
    /// Next source byte not yet assigned to any slot.
    next_unqueued: usize,
    /// Byte offset at which the current playback pass began.
    start_offset: usize,
}

impl BufferRing {
    /// An empty ring. `capacity` is the fixed per-slot byte limit.
    pub fn new(capacity: usize, completions: CompletionFlags) -> Self {
        assert!(capacity > 0, "buffer capacity must be non-zero");
        Self {
            slots: Vec::new(),
            completions,
            capacity,
            source_len: 0,
            next_unqueued: 0,
            start_offset: 0,
        }
    }

    /// Repartition the source tail from `start_offset` into at most `count`
    /// slots and return the chunks to submit, in submission order.
    ///
    /// A short source yields fewer than `count` chunks; the remaining slots
    /// stay empty and unsubmitted. Panics on a `count` outside
    /// [`MIN_BUFFER_COUNT`]..=[`MAX_BUFFER_COUNT`] or a `start_offset` past
    /// the end of the source; both are caller errors.
    pub fn reset(&mut self, source_len: usize, start_offset: usize, count: usize) -> Vec<Refill> {
        assert!(
            (MIN_BUFFER_COUNT..=MAX_BUFFER_COUNT).contains(&count),
            "buffer count {count} outside [{MIN_BUFFER_COUNT}, {MAX_BUFFER_COUNT}]"
        );
        assert!(
            count <= self.completions.len(),
            "buffer count {count} exceeds the {} completion flags",
            self.completions.len()
        );
        assert!(
            start_offset <= source_len,
            "start offset {start_offset} beyond source length {source_len}"
        );

        self.completions.clear_all();
        self.source_len = source_len;
        self.start_offset = start_offset;
        self.next_unqueued = start_offset;

        self.slots.clear();
        self.slots.resize(count, BufferSlot::default());

        let mut refills = Vec::with_capacity(count);
        for slot in 0..count {
            let len = self.capacity.min(self.source_len - self.next_unqueued);
            if len == 0 {
                break;
            }
            self.slots[slot] = BufferSlot {
                offset: self.next_unqueued,
                len,
                queued: true,
            };
            refills.push(Refill {
                slot,
                offset: self.next_unqueued,
                len,
            });
            self.next_unqueued += len;
        }
        refills
    }

    /// Handle one completion notification.
    ///
    /// Scans the slots in ring order for the first one the sink has finished
    /// and refills it in place with the next unconsumed chunk, returning the
    /// chunk to resubmit. Returns `None` without touching any state when no
    /// slot is finished (a stray or duplicate notification) or when no bytes
    /// remain to queue (the finished slot stays retired).
    ///
    /// At most one slot is refilled per call. If the sink finishes several
    /// buffers before the next call, the later ones are only discovered by
    /// subsequent calls.
    pub fn on_completion(&mut self) -> Option<Refill> {
        for slot in 0..self.slots.len() {
            if !(self.slots[slot].queued && self.completions.is_done(slot)) {
                continue;
            }
            if self.next_unqueued >= self.source_len {
                return None;
            }
            let len = self.capacity.min(self.source_len - self.next_unqueued);
            let refill = Refill {
                slot,
                offset: self.next_unqueued,
                len,
            };
            self.slots[slot] = BufferSlot {
                offset: refill.offset,
                len,
                queued: true,
            };
            self.completions.clear(slot);
            self.next_unqueued += len;
            return Some(refill);
        }
        None
    }

    /// True once every source byte has been assigned to a slot and every
    /// submitted slot reports completion. Idempotent once true.
    pub fn is_fully_drained(&self) -> bool {
        self.next_unqueued >= self.source_len
            && self
                .slots
                .iter()
                .enumerate()
                .all(|(slot, state)| !state.queued || self.completions.is_done(slot))
    }

    /// The source byte range currently referenced by `slot`, or `None` for
    /// an empty slot or an out-of-range index.
    pub fn slot_range(&self, slot: usize) -> Option<std::ops::Range<usize>> {
        let state = self.slots.get(slot)?;
        (state.len > 0).then(|| state.offset..state.offset + state.len)
    }

    /// Next source byte not yet assigned to any slot.
    pub const fn next_unqueued(&self) -> usize {
        self.next_unqueued
    }

    /// Byte offset at which the current playback pass began.
    pub const fn start_offset(&self) -> usize {
        self.start_offset
    }

    /// Drop all descriptors and clear the shared done bits.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.completions.clear_all();
        self.source_len = 0;
        self.next_unqueued = 0;
        self.start_offset = 0;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

    use super::*;

    /// One second of CD-quality stereo per slot.
    const CAPACITY: usize = 176_400;

    fn ring() -> BufferRing {
        BufferRing::new(CAPACITY, CompletionFlags::new(MAX_BUFFER_COUNT))
    }

    /// Mark `slot` done the way the sink would.
    fn complete(ring: &BufferRing, slot: usize) {
        ring.completions.mark_done(slot);
    }

    #[test]
    fn test_reset_partitions_contiguously() {
        let mut ring = ring();
        // 2.5 seconds: two full slots and one partial.
        let refills = ring.reset(441_000, 0, 4);

        assert_eq!(refills.len(), 3);
        assert_eq!(
            refills
                .iter()
                .map(|refill| (refill.offset, refill.len))
                .collect::<Vec<_>>(),
            vec![(0, 176_400), (176_400, 176_400), (352_800, 88_200)]
        );
        assert_eq!(ring.next_unqueued(), 441_000);
        assert_eq!(ring.slot_range(3), None);
    }

    #[test]
    fn test_reset_covers_exactly_the_capped_prefix() {
        let mut ring = ring();
        // Source longer than the ring can hold: coverage stops at N * C.
        let refills = ring.reset(1_000_000, 0, 2);

        assert_eq!(refills.len(), 2);
        let mut expected_offset = 0;
        for refill in &refills {
            assert_eq!(refill.offset, expected_offset);
            expected_offset += refill.len;
        }
        assert_eq!(expected_offset, 2 * CAPACITY);
        assert_eq!(ring.next_unqueued(), 2 * CAPACITY);
    }

    #[test]
    fn test_reset_from_nonzero_offset() {
        let mut ring = ring();
        let refills = ring.reset(441_000, 176_400, 2);

        assert_eq!(refills.len(), 2);
        assert_eq!(refills[0].offset, 176_400);
        assert_eq!(refills[1].offset, 352_800);
        assert_eq!(refills[1].len, 88_200);
        assert_eq!(ring.start_offset(), 176_400);
    }

    #[test]
    fn test_reset_with_empty_tail() {
        let mut ring = ring();
        let refills = ring.reset(441_000, 441_000, 2);
        assert!(refills.is_empty());
        assert!(ring.is_fully_drained());
    }

    #[test]
    #[should_panic(expected = "buffer count")]
    fn test_reset_rejects_single_buffer() {
        ring().reset(441_000, 0, 1);
    }

    #[test]
    #[should_panic(expected = "buffer count")]
    fn test_reset_rejects_oversized_count() {
        ring().reset(441_000, 0, MAX_BUFFER_COUNT + 1);
    }

    #[test]
    #[should_panic(expected = "start offset")]
    fn test_reset_rejects_offset_past_end() {
        ring().reset(441_000, 441_004, 2);
    }

    #[test]
    fn test_refill_advances_cursor() {
        let mut ring = ring();
        // 5 seconds through a 2-slot ring.
        ring.reset(882_000, 0, 2);
        assert_eq!(ring.next_unqueued(), 352_800);

        complete(&ring, 0);
        let refill = ring.on_completion().unwrap();
        assert_eq!(refill, Refill { slot: 0, offset: 352_800, len: 176_400 });
        assert_eq!(ring.next_unqueued(), 529_200);
        // The refilled slot is queued again, so its bit was cleared.
        assert!(!ring.completions.is_done(0));
    }

    #[test]
    fn test_one_refill_per_completion_call() {
        let mut ring = ring();
        ring.reset(882_000, 0, 2);

        // Both buffers finish before the ring hears about either.
        complete(&ring, 0);
        complete(&ring, 1);

        let first = ring.on_completion().unwrap();
        assert_eq!(first.slot, 0);
        let second = ring.on_completion().unwrap();
        assert_eq!(second.slot, 1);
        assert_eq!(second.offset, first.offset + first.len);
    }

    #[test]
    fn test_stray_completion_is_a_fixed_point() {
        let mut ring = ring();
        ring.reset(441_000, 0, 4);

        let cursor = ring.next_unqueued();
        assert_eq!(ring.on_completion(), None);
        assert_eq!(ring.on_completion(), None);
        assert_eq!(ring.next_unqueued(), cursor);
        assert!(!ring.is_fully_drained());
    }

    #[test]
    fn test_retired_slot_is_never_resubmitted() {
        let mut ring = ring();
        // Everything fits up front; completions can only retire slots.
        ring.reset(441_000, 0, 4);

        complete(&ring, 0);
        assert_eq!(ring.on_completion(), None);
        // The retired slot stays done and repeated calls stay no-ops.
        assert!(ring.completions.is_done(0));
        assert_eq!(ring.on_completion(), None);
    }

    #[test]
    fn test_drained_exactly_when_all_slots_finish() {
        let mut ring = ring();
        ring.reset(441_000, 0, 4);

        for slot in 0..3 {
            assert!(!ring.is_fully_drained());
            complete(&ring, slot);
            assert_eq!(ring.on_completion(), None);
        }
        assert!(ring.is_fully_drained());
        // Idempotent once true.
        assert!(ring.is_fully_drained());
    }

    #[test]
    fn test_not_drained_while_tail_unqueued() {
        let mut ring = ring();
        ring.reset(882_000, 0, 2);

        complete(&ring, 0);
        complete(&ring, 1);
        // All slots are done but bytes remain unqueued.
        assert!(!ring.is_fully_drained());
    }

    #[test]
    fn test_full_playback_cycle() {
        let mut ring = ring();
        // 5 seconds through a 2-slot ring: 3 refills after the initial 2.
        ring.reset(882_000, 0, 2);

        let mut refills = 0;
        let mut next_slot = 0;
        while !ring.is_fully_drained() {
            complete(&ring, next_slot);
            if let Some(refill) = ring.on_completion() {
                assert_eq!(refill.slot, next_slot);
                refills += 1;
            }
            next_slot = (next_slot + 1) % 2;
        }
        assert_eq!(refills, 3);
        assert_eq!(ring.next_unqueued(), 882_000);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut ring = ring();
        ring.reset(441_000, 0, 4);
        complete(&ring, 0);

        ring.clear();
        assert_eq!(ring.next_unqueued(), 0);
        assert_eq!(ring.start_offset(), 0);
        assert_eq!(ring.slot_range(0), None);
        assert!(!ring.completions.is_done(0));
    }
}
