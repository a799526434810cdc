//! Pipelined byte source.
//!
//! A [`PipeReader`] owns the input and a dedicated filler thread. The filler
//! acquires free segments from a [`SegmentPool`], reads the input into them and
//! hands them over a bounded channel. The consumer side exposes a
//! read-then-acknowledge API:
//!
//! 1. [`PipeReader::read`] returns every byte received and not yet acknowledged,
//!    as a [`BufferedRange`] over one or more segments, plus whether the input is
//!    exhausted.
//! 2. [`PipeReader::advance`] acknowledges everything before a [`Cursor`];
//!    segments that are fully behind the cursor go back to the pool and the filler
//!    can reuse them.
//! 3. [`PipeReader::complete`] shuts the source down once all input has been
//!    observed and consumed.
//!
//! The filler never runs more than `pool_capacity` segments ahead of the
//! consumer. If an unfinished line ends up holding every segment in the pool, the
//! unread bytes are moved into an owned spill buffer so the filler can continue;
//! this is the only copy the source ever makes.
//!
//! ```no_run
//! use linepipe::config::PipeOptions;
//! use linepipe::source::PipeReader;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut pipe = PipeReader::open("people.csv", PipeOptions::default())?;
//! loop {
//!     let result = pipe.read()?;
//!     let (end, done) = (result.buffer.end(), result.is_completed);
//!     // ... consume bytes up to `end` ...
//!     pipe.advance(end)?;
//!     if done {
//!         break;
//!     }
//! }
//! pipe.complete()?;
//! # Ok(())
//! # }
//! ```

use crate::config::PipeOptions;
use crate::io::compression::auto_detect_reader;
use crate::segment::{Segment, SegmentAcquirer, SegmentPool, SegmentReleaser};
use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::mpsc::{Receiver, SyncSender, TryRecvError, sync_channel};
use std::thread::{self, JoinHandle};

/// Messages from the filler thread.
enum Fill {
    Data(Segment),
    End,
    Failed(io::Error),
}

/// Counters kept by the consumer side of a [`PipeReader`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    /// Bytes received from the filler.
    pub bytes_read: u64,
    /// Bytes acknowledged through [`PipeReader::advance`].
    pub bytes_consumed: u64,
    /// Segments received from the filler.
    pub segments_filled: u64,
    /// Times retained segments were moved into the spill buffer.
    pub spills: u64,
    /// Bytes copied into the spill buffer.
    pub spilled_bytes: u64,
}

/// Position within a [`BufferedRange`]: a chunk index and a byte offset into that
/// chunk. Positions at the end of a chunk are normalized to the start of the next.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cursor {
    chunk: usize,
    offset: usize,
}

impl Cursor {
    #[must_use]
    pub fn new(chunk: usize, offset: usize) -> Self {
        Self { chunk, offset }
    }

    #[must_use]
    pub fn chunk(&self) -> usize {
        self.chunk
    }

    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }
}

#[derive(Clone, Copy)]
enum Chunks<'a> {
    Pipe {
        spill: &'a [u8],
        segments: &'a VecDeque<Segment>,
        first_offset: usize,
    },
    Slices(&'a [&'a [u8]]),
}

/// A logically contiguous view over the unread bytes of one or more segments.
///
/// Chunks are never empty. Concatenated in order, they are exactly the bytes
/// received and not yet acknowledged.
#[derive(Clone, Copy)]
pub struct BufferedRange<'a> {
    chunks: Chunks<'a>,
}

impl<'a> BufferedRange<'a> {
    /// A range over caller-provided slices. Empty slices are not allowed to be
    /// addressed by cursors, so callers should not pass any.
    #[must_use]
    pub fn from_slices(slices: &'a [&'a [u8]]) -> Self {
        Self {
            chunks: Chunks::Slices(slices),
        }
    }

    #[must_use]
    pub fn chunk_count(&self) -> usize {
        match self.chunks {
            Chunks::Pipe {
                spill, segments, ..
            } => segments.len() + usize::from(!spill.is_empty()),
            Chunks::Slices(s) => s.len(),
        }
    }

    /// The `i`-th chunk.
    ///
    /// # Panics
    /// Panics if `i >= chunk_count()`.
    #[must_use]
    pub fn chunk(&self, i: usize) -> &'a [u8] {
        match self.chunks {
            Chunks::Pipe {
                spill,
                segments,
                first_offset,
            } => {
                if spill.is_empty() {
                    let seg = segments[i].filled();
                    if i == 0 { &seg[first_offset..] } else { seg }
                } else if i == 0 {
                    spill
                } else {
                    segments[i - 1].filled()
                }
            }
            Chunks::Slices(s) => s[i],
        }
    }

    pub fn chunks(&self) -> impl Iterator<Item = &'a [u8]> + '_ {
        (0..self.chunk_count()).map(|i| self.chunk(i))
    }

    /// Total number of bytes in the range.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks().map(<[u8]>::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks().all(<[u8]>::is_empty)
    }

    #[must_use]
    pub fn start(&self) -> Cursor {
        Cursor::default()
    }

    #[must_use]
    pub fn end(&self) -> Cursor {
        Cursor::new(self.chunk_count(), 0)
    }

    /// Move positions sitting at the end of a chunk to the start of the next.
    #[must_use]
    pub fn normalize(&self, mut at: Cursor) -> Cursor {
        let n = self.chunk_count();
        while at.chunk < n {
            let len = self.chunk(at.chunk).len();
            if at.offset < len {
                break;
            }
            at.offset -= len;
            at.chunk += 1;
        }
        if at.chunk >= n {
            return self.end();
        }
        at
    }

    /// First occurrence of `byte` at or after `from`.
    #[must_use]
    pub fn find(&self, byte: u8, from: Cursor) -> Option<Cursor> {
        let from = self.normalize(from);
        let mut offset = from.offset;
        for chunk in from.chunk..self.chunk_count() {
            let bytes = self.chunk(chunk);
            if let Some(i) = memchr::memchr(byte, &bytes[offset..]) {
                return Some(Cursor::new(chunk, offset + i));
            }
            offset = 0;
        }
        None
    }

    /// The byte immediately before `at`, if any.
    #[must_use]
    pub fn byte_before(&self, at: Cursor) -> Option<u8> {
        if at.offset > 0 {
            return self.chunk(at.chunk).get(at.offset - 1).copied();
        }
        (0..at.chunk.min(self.chunk_count()))
            .rev()
            .find_map(|i| self.chunk(i).last().copied())
    }

    /// The position one byte before `at`. `at` must not be the range start.
    #[must_use]
    pub fn step_back(&self, at: Cursor) -> Cursor {
        if at.offset > 0 {
            return Cursor::new(at.chunk, at.offset - 1);
        }
        let prev = at.chunk - 1;
        Cursor::new(prev, self.chunk(prev).len() - 1)
    }

    /// Number of bytes between two positions, `start <= end`.
    #[must_use]
    pub fn distance(&self, start: Cursor, end: Cursor) -> usize {
        if start.chunk == end.chunk {
            return end.offset - start.offset;
        }
        let mut total = self.chunk(start.chunk).len() - start.offset;
        for i in start.chunk + 1..end.chunk {
            total += self.chunk(i).len();
        }
        total + end.offset
    }

    /// Copy the bytes between two positions into `dst`, which must be exactly
    /// `distance(start, end)` long.
    pub fn copy_to(&self, start: Cursor, end: Cursor, dst: &mut [u8]) {
        let mut written = 0;
        let mut offset = start.offset;
        for i in start.chunk..=end.chunk.min(self.chunk_count().saturating_sub(1)) {
            let bytes = self.chunk(i);
            let stop = if i == end.chunk { end.offset } else { bytes.len() };
            let part = &bytes[offset..stop];
            dst[written..written + part.len()].copy_from_slice(part);
            written += part.len();
            offset = 0;
        }
        debug_assert_eq!(written, dst.len());
    }

    /// Copy the whole range into a new vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.chunks().flatten().copied().collect()
    }
}

/// Result of [`PipeReader::read`].
pub struct ReadResult<'a> {
    /// All bytes received and not yet acknowledged.
    pub buffer: BufferedRange<'a>,
    /// `true` once the input has been fully read; no further bytes will arrive.
    pub is_completed: bool,
}

/// Consumer handle of the pipelined byte source.
pub struct PipeReader {
    intake: Receiver<Fill>,
    releaser: SegmentReleaser,
    capacity: usize,
    segments: VecDeque<Segment>,
    spill: Vec<u8>,
    head: usize,
    completed: bool,
    filler: Option<JoinHandle<()>>,
    stats: SourceStats,
}

impl PipeReader {
    /// Open `path` (with transparent decompression) and start filling.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or the filler thread cannot
    /// be spawned.
    pub fn open(path: impl AsRef<Path>, options: PipeOptions) -> Result<Self> {
        let path = path.as_ref();
        let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let input = auto_detect_reader(f, path)
            .with_context(|| format!("setup decompression for {}", path.display()))?;
        Self::from_reader(input, options)
    }

    /// Start filling from an arbitrary reader. Each `read` call on `input` fills
    /// at most one segment.
    ///
    /// # Errors
    /// Returns an error if the filler thread cannot be spawned.
    pub fn from_reader<R>(input: R, options: PipeOptions) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let pool = SegmentPool::new(options.pool_capacity, options.segment_size);
        let capacity = pool.capacity();
        let (acquirer, releaser) = pool.split();
        let (tx, rx) = sync_channel(capacity + 1);
        let filler = thread::Builder::new()
            .name("linepipe-filler".into())
            .spawn(move || fill(input, acquirer, tx))
            .context("spawn filler thread")?;
        Ok(Self {
            intake: rx,
            releaser,
            capacity,
            segments: VecDeque::with_capacity(capacity),
            spill: Vec::new(),
            head: 0,
            completed: false,
            filler: Some(filler),
            stats: SourceStats::default(),
        })
    }

    /// Wait for more input and return everything not yet acknowledged.
    ///
    /// Blocks until at least one new segment arrives, unless the input is already
    /// exhausted, in which case the remaining bytes are returned immediately.
    ///
    /// # Errors
    /// Returns the I/O error raised by the filler, or an error if the filler
    /// stopped without signalling end of input.
    pub fn read(&mut self) -> Result<ReadResult<'_>> {
        if !self.completed {
            if self.segments.len() >= self.capacity {
                self.spill_retained();
            }
            let msg = self
                .intake
                .recv()
                .map_err(|_| anyhow!("filler thread stopped before end of input"))?;
            self.accept(msg)?;
            while !self.completed {
                match self.intake.try_recv() {
                    Ok(msg) => self.accept(msg)?,
                    Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
                }
            }
        }
        Ok(ReadResult {
            buffer: self.buffered(),
            is_completed: self.completed,
        })
    }

    /// Acknowledge every byte before `consumed` (a cursor into the range returned
    /// by the last [`read`](Self::read)). Segments entirely behind the cursor are
    /// returned to the pool.
    ///
    /// # Errors
    /// Returns an error if the cursor lies beyond the buffered data.
    pub fn advance(&mut self, consumed: Cursor) -> Result<()> {
        let range = self.buffered();
        let count = range.chunk_count();
        if consumed.chunk > count || (consumed.chunk == count && consumed.offset > 0) {
            bail!(
                "advance past buffered data: cursor {:?}, {} chunks buffered",
                consumed,
                count
            );
        }
        let consumed = range.normalize(consumed);
        let consumed_bytes = range.distance(range.start(), consumed);
        if consumed.chunk == 0 {
            self.head += consumed.offset;
        } else {
            for _ in 0..consumed.chunk {
                if self.spill.is_empty() {
                    if let Some(seg) = self.segments.pop_front() {
                        self.releaser.release(seg);
                    }
                } else {
                    self.spill.clear();
                }
            }
            self.head = consumed.offset;
        }
        self.stats.bytes_consumed += consumed_bytes as u64;
        Ok(())
    }

    /// Bytes received and not yet acknowledged.
    #[must_use]
    pub fn unread(&self) -> usize {
        self.buffered().len()
    }

    /// `true` once the filler has reported end of input.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    #[must_use]
    pub fn stats(&self) -> SourceStats {
        self.stats
    }

    /// Shut down after all input has been observed and consumed.
    ///
    /// # Errors
    /// Returns an error if end of input has not been observed, if unread bytes
    /// remain, or if the filler thread panicked.
    pub fn complete(mut self) -> Result<SourceStats> {
        if !self.completed {
            bail!("complete() called before end of input was observed");
        }
        let unread = self.unread();
        if unread > 0 {
            bail!("complete() called with {unread} unread bytes");
        }
        let stats = self.stats;
        if let Some(handle) = self.filler.take() {
            handle
                .join()
                .map_err(|_| anyhow!("filler thread panicked"))?;
        }
        Ok(stats)
    }

    /// Stop early, dropping any unread bytes. All segments are released and the
    /// filler is joined.
    pub fn cancel(self) -> SourceStats {
        let Self {
            intake,
            releaser,
            segments,
            filler,
            stats,
            ..
        } = self;
        for seg in segments {
            releaser.release(seg);
        }
        drop(intake);
        drop(releaser);
        if let Some(handle) = filler {
            let _ = handle.join();
        }
        log::debug!("byte source cancelled after {} bytes", stats.bytes_read);
        stats
    }

    fn accept(&mut self, msg: Fill) -> Result<()> {
        match msg {
            Fill::Data(seg) => {
                self.stats.bytes_read += seg.len() as u64;
                self.stats.segments_filled += 1;
                self.segments.push_back(seg);
                Ok(())
            }
            Fill::End => {
                self.completed = true;
                Ok(())
            }
            Fill::Failed(e) => Err(anyhow::Error::new(e).context("read input")),
        }
    }

    fn buffered(&self) -> BufferedRange<'_> {
        let (spill, first_offset) = if self.spill.is_empty() {
            (&self.spill[..], self.head)
        } else {
            (&self.spill[self.head..], 0)
        };
        BufferedRange {
            chunks: Chunks::Pipe {
                spill,
                segments: &self.segments,
                first_offset,
            },
        }
    }

    /// Move the unread bytes of every retained segment into the spill buffer and
    /// release the segments, so the filler is never starved by one long line.
    fn spill_retained(&mut self) {
        let head = std::mem::take(&mut self.head);
        let mut skip = if self.spill.is_empty() {
            head
        } else {
            self.spill.drain(..head);
            0
        };
        let mut moved = 0usize;
        while let Some(seg) = self.segments.pop_front() {
            let bytes = &seg.filled()[skip..];
            self.spill.extend_from_slice(bytes);
            moved += bytes.len();
            skip = 0;
            self.releaser.release(seg);
        }
        self.stats.spills += 1;
        self.stats.spilled_bytes += moved as u64;
        log::trace!("spilled {moved} retained bytes; spill buffer now {} bytes", self.spill.len());
    }
}

/// Filler thread body: acquire, read, hand over, until end of input or until the
/// consumer goes away.
fn fill<R: Read>(mut input: R, acquirer: SegmentAcquirer, out: SyncSender<Fill>) {
    log::debug!(
        "filler started: {} segments of {} bytes",
        acquirer.capacity(),
        acquirer.segment_size()
    );
    let mut total = 0u64;
    loop {
        let Some(mut seg) = acquirer.acquire() else {
            log::debug!("segment pool closed; filler exiting after {total} bytes");
            return;
        };
        let n = loop {
            match input.read(seg.spare_mut()) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    log::debug!("filler read failed after {total} bytes: {e}");
                    let _ = out.send(Fill::Failed(e));
                    return;
                }
            }
        };
        if n == 0 {
            log::debug!("end of input after {total} bytes");
            let _ = out.send(Fill::End);
            return;
        }
        seg.set_filled(n);
        total += n as u64;
        log::trace!("filled segment {:?} with {n} bytes", seg.slot());
        if out.send(Fill::Data(seg)).is_err() {
            return;
        }
    }
}
