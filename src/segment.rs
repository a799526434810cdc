//! Bounded pool of fixed-size byte segments.
//!
//! The pool is an arena of `capacity` slots allocated up front. A [`Segment`] is
//! an owned handle to one slot: it moves from the pool to the filler, from the
//! filler to the parser, and back to the pool. Nothing is ever aliased, so a
//! segment cannot be recycled while a line still borrows from it.
//!
//! The free list is a bounded single-producer/single-consumer channel. Splitting
//! the pool with [`SegmentPool::split`] hands the acquiring end to exactly one
//! filler and the releasing end to exactly one drainer; neither end is `Clone`.
//!
//! ```
//! use linepipe::segment::SegmentPool;
//!
//! let pool = SegmentPool::new(2, 16);
//! let mut seg = pool.try_acquire().unwrap();
//! seg.spare_mut()[..5].copy_from_slice(b"hello");
//! seg.set_filled(5);
//! assert_eq!(seg.filled(), b"hello");
//! pool.release(seg);
//! assert_eq!(pool.available(), 2);
//! ```

use std::fmt;
use std::sync::mpsc::{Receiver, SyncSender, TryRecvError, sync_channel};

/// Index of a segment's slot in the pool arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u32);

/// An owned, fixed-capacity byte buffer plus a valid-length marker.
pub struct Segment {
    slot: SlotId,
    buf: Box<[u8]>,
    len: usize,
}

impl Segment {
    fn new(slot: SlotId, size: usize) -> Self {
        Self {
            slot,
            buf: vec![0u8; size].into_boxed_slice(),
            len: 0,
        }
    }

    /// Slot this segment occupies in the pool arena.
    #[must_use]
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    /// Total bytes the segment can hold.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// The valid bytes written by the filler.
    #[must_use]
    pub fn filled(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Number of valid bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The whole backing buffer, for the filler to write into.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Mark the first `len` bytes as valid. Clamped to the capacity.
    pub fn set_filled(&mut self, len: usize) {
        self.len = len.min(self.buf.len());
    }

    fn reset(&mut self) {
        self.len = 0;
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("slot", &self.slot)
            .field("len", &self.len)
            .field("capacity", &self.buf.len())
            .finish()
    }
}

/// A bounded pool of reusable segments.
pub struct SegmentPool {
    acquirer: SegmentAcquirer,
    releaser: SegmentReleaser,
}

impl SegmentPool {
    /// Allocate `capacity` segments of `segment_size` bytes each.
    ///
    /// Both arguments are clamped to at least 1.
    #[must_use]
    pub fn new(capacity: usize, segment_size: usize) -> Self {
        let capacity = capacity.max(1);
        let segment_size = segment_size.max(1);
        let (tx, rx) = sync_channel(capacity);
        for slot in 0..capacity {
            // The channel holds exactly `capacity` items, so this never blocks.
            let _ = tx.send(Segment::new(SlotId(slot as u32), segment_size));
        }
        Self {
            acquirer: SegmentAcquirer {
                free: rx,
                capacity,
                segment_size,
            },
            releaser: SegmentReleaser { free: tx, capacity },
        }
    }

    /// Number of slots in the arena.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.acquirer.capacity
    }

    #[must_use]
    pub fn segment_size(&self) -> usize {
        self.acquirer.segment_size
    }

    /// Take a free segment, blocking until one is released.
    ///
    /// Returns `None` only once the releasing side has been dropped and no free
    /// segment remains; with an unsplit pool that cannot happen, so callers on a
    /// single thread should prefer [`try_acquire`](Self::try_acquire).
    pub fn acquire(&self) -> Option<Segment> {
        self.acquirer.acquire()
    }

    /// Take a free segment if one is available right now.
    pub fn try_acquire(&self) -> Option<Segment> {
        self.acquirer.try_acquire()
    }

    /// Return a drained segment to the pool.
    pub fn release(&self, segment: Segment) {
        self.releaser.release(segment);
    }

    /// Number of segments currently free.
    #[must_use]
    pub fn available(&self) -> usize {
        // Drain and put back; the pool is not shared while unsplit.
        let drained: Vec<Segment> = self.acquirer.free.try_iter().collect();
        let n = drained.len();
        for seg in drained {
            self.releaser.release_raw(seg);
        }
        n
    }

    /// Split into the filler's end and the drainer's end.
    #[must_use]
    pub fn split(self) -> (SegmentAcquirer, SegmentReleaser) {
        (self.acquirer, self.releaser)
    }
}

/// The filling end of a [`SegmentPool`].
pub struct SegmentAcquirer {
    free: Receiver<Segment>,
    capacity: usize,
    segment_size: usize,
}

impl SegmentAcquirer {
    /// Block until a segment is free. `None` once the releaser is gone and the
    /// free list is empty.
    pub fn acquire(&self) -> Option<Segment> {
        let mut seg = self.free.recv().ok()?;
        seg.reset();
        Some(seg)
    }

    pub fn try_acquire(&self) -> Option<Segment> {
        match self.free.try_recv() {
            Ok(mut seg) => {
                seg.reset();
                Some(seg)
            }
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn segment_size(&self) -> usize {
        self.segment_size
    }
}

/// The draining end of a [`SegmentPool`].
pub struct SegmentReleaser {
    free: SyncSender<Segment>,
    capacity: usize,
}

impl SegmentReleaser {
    /// Return a segment to the free list. If the acquirer is gone the segment is
    /// simply dropped.
    pub fn release(&self, segment: Segment) {
        self.release_raw(segment);
    }

    fn release_raw(&self, segment: Segment) {
        // Never blocks: at most `capacity` segments exist.
        let _ = self.free.try_send(segment);
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn slots_are_distinct_and_bounded() {
        let pool = SegmentPool::new(3, 8);
        let a = pool.try_acquire().unwrap();
        let b = pool.try_acquire().unwrap();
        let c = pool.try_acquire().unwrap();
        assert!(pool.try_acquire().is_none());
        let mut slots = vec![a.slot(), b.slot(), c.slot()];
        slots.sort();
        assert_eq!(slots, vec![SlotId(0), SlotId(1), SlotId(2)]);
    }

    #[test]
    fn reacquired_segment_is_logically_empty() {
        let pool = SegmentPool::new(1, 4);
        let mut seg = pool.try_acquire().unwrap();
        seg.spare_mut().copy_from_slice(b"abcd");
        seg.set_filled(10);
        assert_eq!(seg.len(), 4);
        pool.release(seg);
        let seg = pool.try_acquire().unwrap();
        assert!(seg.is_empty());
        assert_eq!(seg.capacity(), 4);
    }

    #[test]
    fn available_counts_free_slots() {
        let pool = SegmentPool::new(4, 4);
        assert_eq!(pool.available(), 4);
        let seg = pool.try_acquire().unwrap();
        assert_eq!(pool.available(), 3);
        pool.release(seg);
        assert_eq!(pool.available(), 4);
    }

    #[test]
    fn acquire_blocks_until_release() {
        let (acq, rel) = SegmentPool::new(1, 4).split();
        let held = acq.try_acquire().unwrap();
        let waiter = thread::spawn(move || acq.acquire().map(|s| s.slot()));
        thread::sleep(Duration::from_millis(20));
        rel.release(held);
        assert_eq!(waiter.join().unwrap(), Some(SlotId(0)));
    }

    #[test]
    fn acquire_returns_none_when_releaser_dropped() {
        let (acq, rel) = SegmentPool::new(1, 4).split();
        let _held = acq.try_acquire().unwrap();
        drop(rel);
        assert!(acq.acquire().is_none());
    }
}
