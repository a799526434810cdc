//! Segment-spanning line reader.
//!
//! [`Lines`] walks a [`BufferedRange`] and yields one [`LineSpan`] per
//! terminated line. A line that lies inside a single chunk is a borrowed slice
//! and costs nothing. A line whose bytes straddle chunk boundaries is described
//! by its start and end positions and has to be materialized before it can be
//! decoded; [`LineReader::with_bytes`] picks the cheapest strategy for it:
//!
//! | span                           | [`Materialization`] |
//! |--------------------------------|---------------------|
//! | single chunk                   | `Borrowed`          |
//! | multi chunk, shorter than the stack threshold | `Stack` |
//! | multi chunk, at or above it    | `Pooled`            |
//!
//! All three strategies hand the exact same bytes to the caller.
//!
//! When the scan reaches bytes with no terminator after them it stops and
//! [`Lines::cursor`] points at the start of that incomplete line, unless the
//! range is final (end of input), in which case the remainder is yielded as the
//! last line.

use crate::source::{BufferedRange, Cursor};
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;

/// Upper bound for stack materialization, in bytes.
pub const STACK_LINE_LIMIT: usize = 256;

const NEWLINE: u8 = b'\n';
const CARRIAGE_RETURN: u8 = b'\r';

/// Line terminator of an input file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// Bare `\n`. A preceding `\r` is kept as data.
    Lf,
    /// `\r\n`. A `\r` right before the `\n` is dropped; a bare `\n` is accepted.
    CrLf,
}

impl LineEnding {
    /// Detect the terminator from the first `\n` in `range`.
    #[must_use]
    pub fn detect(range: &BufferedRange<'_>) -> Option<Self> {
        let nl = range.find(NEWLINE, range.start())?;
        Some(if range.byte_before(nl) == Some(CARRIAGE_RETURN) {
            Self::CrLf
        } else {
            Self::Lf
        })
    }

    fn trim<'a>(self, line: &'a [u8]) -> &'a [u8] {
        match (self, line.split_last()) {
            (Self::CrLf, Some((&CARRIAGE_RETURN, rest))) => rest,
            _ => line,
        }
    }
}

/// How a line's bytes are made contiguous for decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Materialization {
    /// Direct view into a segment.
    Borrowed,
    /// Copied into a fixed buffer on the stack.
    Stack,
    /// Copied into a heap buffer rented from a [`ScratchPool`].
    Pooled,
}

/// One complete line, terminator excluded.
#[derive(Clone, Copy)]
pub enum LineSpan<'a> {
    /// The line lies within one chunk.
    Contiguous(&'a [u8]),
    /// The line crosses chunk boundaries.
    Fragmented {
        range: BufferedRange<'a>,
        start: Cursor,
        end: Cursor,
        len: usize,
    },
}

impl<'a> LineSpan<'a> {
    fn between(range: BufferedRange<'a>, start: Cursor, end: Cursor) -> Self {
        if start.chunk() == end.chunk() {
            return Self::Contiguous(&range.chunk(start.chunk())[start.offset()..end.offset()]);
        }
        if end == Cursor::new(start.chunk() + 1, 0) {
            return Self::Contiguous(&range.chunk(start.chunk())[start.offset()..]);
        }
        Self::Fragmented {
            range,
            start,
            end,
            len: range.distance(start, end),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Contiguous(bytes) => bytes.len(),
            Self::Fragmented { len, .. } => *len,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Strategy [`LineReader::with_bytes`] uses for this span.
    #[must_use]
    pub fn strategy(&self, stack_threshold: usize) -> Materialization {
        match self {
            Self::Contiguous(_) => Materialization::Borrowed,
            Self::Fragmented { len, .. } if *len < stack_threshold.min(STACK_LINE_LIMIT) => {
                Materialization::Stack
            }
            Self::Fragmented { .. } => Materialization::Pooled,
        }
    }

    /// Copy the line into a new vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        match self {
            Self::Contiguous(bytes) => bytes.to_vec(),
            Self::Fragmented {
                range,
                start,
                end,
                len,
            } => {
                let mut out = vec![0u8; *len];
                range.copy_to(*start, *end, &mut out);
                out
            }
        }
    }
}

/// Lazy scan of the complete lines of a [`BufferedRange`].
pub struct Lines<'a> {
    range: BufferedRange<'a>,
    pos: Cursor,
    ending: LineEnding,
    is_final: bool,
    done: bool,
}

impl<'a> Lines<'a> {
    /// Scan `range`. With `is_final` set, trailing bytes without a terminator
    /// form one last line.
    #[must_use]
    pub fn new(range: BufferedRange<'a>, ending: LineEnding, is_final: bool) -> Self {
        Self {
            range,
            pos: range.start(),
            ending,
            is_final,
            done: false,
        }
    }

    /// First byte not covered by a yielded line: the start of an incomplete
    /// trailing line, or the range end.
    #[must_use]
    pub fn cursor(&self) -> Cursor {
        self.pos
    }

    fn trimmed_end(&self, start: Cursor, end: Cursor) -> Cursor {
        if self.ending == LineEnding::CrLf
            && end > start
            && self.range.byte_before(end) == Some(CARRIAGE_RETURN)
        {
            self.range.step_back(end)
        } else {
            end
        }
    }
}

impl<'a> Iterator for Lines<'a> {
    type Item = LineSpan<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let range = self.range;
        let pos = range.normalize(self.pos);
        self.pos = pos;
        if pos.chunk() >= range.chunk_count() {
            self.done = true;
            return None;
        }

        let rest = &range.chunk(pos.chunk())[pos.offset()..];
        if let Some(i) = memchr::memchr(NEWLINE, rest) {
            self.pos = range.normalize(Cursor::new(pos.chunk(), pos.offset() + i + 1));
            return Some(LineSpan::Contiguous(self.ending.trim(&rest[..i])));
        }

        // Not in this chunk; look further along.
        match range.find(NEWLINE, Cursor::new(pos.chunk() + 1, 0)) {
            Some(nl) => {
                let end = self.trimmed_end(pos, nl);
                self.pos = range.normalize(Cursor::new(nl.chunk(), nl.offset() + 1));
                Some(LineSpan::between(range, pos, end))
            }
            None if self.is_final => {
                let end = self.trimmed_end(pos, range.end());
                self.pos = range.end();
                self.done = true;
                Some(LineSpan::between(range, pos, end))
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

/// Reusable heap buffers for long multi-segment lines.
#[derive(Debug)]
pub struct ScratchPool {
    free: Vec<Vec<u8>>,
    max_retained: usize,
}

impl Default for ScratchPool {
    fn default() -> Self {
        Self::new(4)
    }
}

impl ScratchPool {
    #[must_use]
    pub fn new(max_retained: usize) -> Self {
        Self {
            free: Vec::new(),
            max_retained,
        }
    }

    /// A buffer of exactly `len` bytes. Contents are unspecified.
    pub fn rent(&mut self, len: usize) -> Vec<u8> {
        let mut buf = self.free.pop().unwrap_or_default();
        buf.clear();
        buf.resize(len, 0);
        buf
    }

    pub fn give_back(&mut self, buf: Vec<u8>) {
        if self.free.len() < self.max_retained {
            self.free.push(buf);
        }
    }

    /// Buffers waiting to be rented again.
    #[must_use]
    pub fn retained(&self) -> usize {
        self.free.len()
    }
}

/// Counters kept by a [`LineReader`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LineStats {
    pub lines: u64,
    pub multi_segment: u64,
    pub stack_copies: u64,
    pub pooled_copies: u64,
}

/// Outcome of [`LineReader::for_each_line`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinePass {
    /// Where the next pass must start.
    pub cursor: Cursor,
    /// The callback asked to stop.
    pub stopped: bool,
}

/// Turns buffered ranges into contiguous line bytes.
#[derive(Debug)]
pub struct LineReader {
    ending: LineEnding,
    stack_threshold: usize,
    scratch: ScratchPool,
    stats: LineStats,
}

impl LineReader {
    #[must_use]
    pub fn new(ending: LineEnding) -> Self {
        Self {
            ending,
            stack_threshold: STACK_LINE_LIMIT,
            scratch: ScratchPool::default(),
            stats: LineStats::default(),
        }
    }

    /// Lines shorter than `threshold` (and [`STACK_LINE_LIMIT`]) are copied to
    /// the stack; `0` sends every multi-segment line to the scratch pool.
    #[must_use]
    pub fn with_stack_threshold(mut self, threshold: usize) -> Self {
        self.stack_threshold = threshold.min(STACK_LINE_LIMIT);
        self
    }

    #[must_use]
    pub fn line_ending(&self) -> LineEnding {
        self.ending
    }

    pub fn set_line_ending(&mut self, ending: LineEnding) {
        self.ending = ending;
    }

    #[must_use]
    pub fn stats(&self) -> LineStats {
        self.stats
    }

    /// Scan `range` with this reader's terminator.
    #[must_use]
    pub fn lines<'a>(&self, range: BufferedRange<'a>, is_final: bool) -> Lines<'a> {
        Lines::new(range, self.ending, is_final)
    }

    /// Run `f` over the contiguous bytes of `span`, materializing them if needed.
    pub fn with_bytes<R>(&mut self, span: &LineSpan<'_>, f: impl FnOnce(&[u8]) -> R) -> R {
        self.stats.lines += 1;
        let strategy = span.strategy(self.stack_threshold);
        match (span, strategy) {
            (LineSpan::Contiguous(bytes), _) => f(*bytes),
            (
                LineSpan::Fragmented {
                    range, start, end, len,
                },
                Materialization::Stack,
            ) => {
                self.stats.multi_segment += 1;
                self.stats.stack_copies += 1;
                let mut buf = [0u8; STACK_LINE_LIMIT];
                range.copy_to(*start, *end, &mut buf[..*len]);
                f(&buf[..*len])
            }
            (
                LineSpan::Fragmented {
                    range, start, end, len,
                },
                _,
            ) => {
                self.stats.multi_segment += 1;
                self.stats.pooled_copies += 1;
                let mut buf = self.scratch.rent(*len);
                range.copy_to(*start, *end, &mut buf);
                let out = f(&buf);
                self.scratch.give_back(buf);
                out
            }
        }
    }

    /// Feed every complete line of `range` to `f`, in order, until it breaks.
    pub fn for_each_line<F>(&mut self, range: BufferedRange<'_>, is_final: bool, mut f: F) -> LinePass
    where
        F: FnMut(&[u8]) -> ControlFlow<()>,
    {
        let mut lines = self.lines(range, is_final);
        while let Some(span) = lines.next() {
            if self.with_bytes(&span, &mut f).is_break() {
                return LinePass {
                    cursor: lines.cursor(),
                    stopped: true,
                };
            }
        }
        LinePass {
            cursor: lines.cursor(),
            stopped: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(parts: &[&[u8]], ending: LineEnding, is_final: bool) -> (Vec<Vec<u8>>, Cursor) {
        let range = BufferedRange::from_slices(parts);
        let mut reader = LineReader::new(ending);
        let mut out = Vec::new();
        let pass = reader.for_each_line(range, is_final, |line| {
            out.push(line.to_vec());
            ControlFlow::Continue(())
        });
        (out, pass.cursor)
    }

    #[test]
    fn empty_range_yields_nothing() {
        let (lines, cursor) = collect(&[], LineEnding::Lf, false);
        assert!(lines.is_empty());
        assert_eq!(cursor, Cursor::default());
    }

    #[test]
    fn lone_terminator_is_one_empty_line() {
        let (lines, _) = collect(&[b"\n"], LineEnding::Lf, false);
        assert_eq!(lines, vec![Vec::<u8>::new()]);
    }

    #[test]
    fn incomplete_tail_is_left_unconsumed() {
        let (lines, cursor) = collect(&[b"ab\ncd"], LineEnding::Lf, false);
        assert_eq!(lines, vec![b"ab".to_vec()]);
        assert_eq!(cursor, Cursor::new(0, 3));
    }

    #[test]
    fn incomplete_tail_is_flushed_when_final() {
        let (lines, cursor) = collect(&[b"ab\nc", b"d"], LineEnding::Lf, true);
        assert_eq!(lines, vec![b"ab".to_vec(), b"cd".to_vec()]);
        assert_eq!(cursor, Cursor::new(2, 0));
    }

    #[test]
    fn line_across_three_chunks() {
        let (lines, cursor) = collect(&[b"x\nab", b"cd", b"ef\ny"], LineEnding::Lf, false);
        assert_eq!(lines, vec![b"x".to_vec(), b"abcdef".to_vec()]);
        assert_eq!(cursor, Cursor::new(2, 3));
    }

    #[test]
    fn crlf_split_between_chunks() {
        let (lines, _) = collect(&[b"abc\r", b"\ndef\r\n"], LineEnding::CrLf, false);
        assert_eq!(lines, vec![b"abc".to_vec(), b"def".to_vec()]);
    }

    #[test]
    fn lf_keeps_carriage_return() {
        let (lines, _) = collect(&[b"abc\r\n"], LineEnding::Lf, false);
        assert_eq!(lines, vec![b"abc\r".to_vec()]);
    }

    #[test]
    fn terminator_at_chunk_start() {
        let (lines, cursor) = collect(&[b"abc", b"\n"], LineEnding::Lf, false);
        assert_eq!(lines, vec![b"abc".to_vec()]);
        assert_eq!(cursor, Cursor::new(2, 0));
    }

    #[test]
    fn strategies_by_span_shape() {
        let long = vec![b'a'; 300];
        let parts: [&[u8]; 4] = [b"ab", b"c\n", &long, b"\n"];
        let range = BufferedRange::from_slices(&parts);
        let spans: Vec<_> = Lines::new(range, LineEnding::Lf, false).collect();
        assert_eq!(spans[0].strategy(STACK_LINE_LIMIT), Materialization::Stack);
        assert_eq!(spans[0].strategy(0), Materialization::Pooled);
        assert_eq!(spans[1].strategy(STACK_LINE_LIMIT), Materialization::Borrowed);
    }

    #[test]
    fn stack_and_pooled_copies_agree() {
        let parts: [&[u8]; 3] = [b"12;ab", b"cd;e", b"f\n"];
        let range = BufferedRange::from_slices(&parts);
        let mut stacked = LineReader::new(LineEnding::Lf);
        let mut pooled = LineReader::new(LineEnding::Lf).with_stack_threshold(0);
        let span = Lines::new(range, LineEnding::Lf, false).next().unwrap();
        let a = stacked.with_bytes(&span, <[u8]>::to_vec);
        let b = pooled.with_bytes(&span, <[u8]>::to_vec);
        assert_eq!(a, b"12;abcd;ef");
        assert_eq!(a, b);
        assert_eq!(stacked.stats().stack_copies, 1);
        assert_eq!(pooled.stats().pooled_copies, 1);
        assert_eq!(pooled.scratch.retained(), 1);
    }

    #[test]
    fn callback_can_stop_early() {
        let parts: [&[u8]; 1] = [b"a\nb\nc\n"];
        let range = BufferedRange::from_slices(&parts);
        let mut reader = LineReader::new(LineEnding::Lf);
        let mut seen = 0;
        let pass = reader.for_each_line(range, false, |_| {
            seen += 1;
            if seen == 2 { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
        });
        assert!(pass.stopped);
        assert_eq!(pass.cursor, Cursor::new(0, 4));
    }

    #[test]
    fn detects_line_endings() {
        let crlf_parts: [&[u8]; 2] = [b"Id,Guid\r", b"\n1,x"];
        let crlf = BufferedRange::from_slices(&crlf_parts);
        assert_eq!(LineEnding::detect(&crlf), Some(LineEnding::CrLf));
        let lf_parts: [&[u8]; 1] = [b"Id;Guid\n"];
        let lf = BufferedRange::from_slices(&lf_parts);
        assert_eq!(LineEnding::detect(&lf), Some(LineEnding::Lf));
        let none_parts: [&[u8]; 1] = [b"Id;Guid"];
        let none = BufferedRange::from_slices(&none_parts);
        assert_eq!(LineEnding::detect(&none), None);
    }
}
