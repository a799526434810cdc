//! Readers with controlled read sizes and injected failures.
//!
//! The byte source fills at most one segment per `read` call, so the sizes a
//! reader returns decide exactly where segment boundaries fall.

use std::collections::VecDeque;
use std::io::{self, Read};

/// Serves `data` in reads of predetermined sizes.
///
/// Each read returns the next size from the list (capped by the caller's
/// buffer and the remaining data); once the list is used up, reads return as
/// much as fits.
#[derive(Debug, Clone)]
pub struct ChunkedReader {
    data: Vec<u8>,
    pos: usize,
    sizes: VecDeque<usize>,
    repeat: Option<usize>,
}

impl ChunkedReader {
    /// Reads of `sizes[0]`, `sizes[1]`, ... bytes. Zero sizes count as one.
    #[must_use]
    pub fn new(data: Vec<u8>, sizes: Vec<usize>) -> Self {
        Self {
            data,
            pos: 0,
            sizes: sizes.into(),
            repeat: None,
        }
    }

    /// Every read returns `size` bytes (at least one).
    #[must_use]
    pub fn uniform(data: Vec<u8>, size: usize) -> Self {
        Self {
            data,
            pos: 0,
            sizes: VecDeque::new(),
            repeat: Some(size.max(1)),
        }
    }

    /// Reads that split `data` exactly at the given offsets. Offsets outside
    /// the data or out of order are ignored.
    #[must_use]
    pub fn split_at(data: Vec<u8>, offsets: &[usize]) -> Self {
        let mut sizes = Vec::with_capacity(offsets.len());
        let mut last = 0;
        for &at in offsets {
            if at > last && at < data.len() {
                sizes.push(at - last);
                last = at;
            }
        }
        Self::new(data, sizes)
    }

    /// Bytes not yet returned.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl Read for ChunkedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.remaining();
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = self
            .sizes
            .pop_front()
            .map(|s| s.max(1))
            .or(self.repeat)
            .unwrap_or(remaining);
        let n = want.min(buf.len()).min(remaining);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Serves some bytes, then fails every read.
#[derive(Debug, Clone)]
pub struct FailingReader {
    data: Vec<u8>,
    pos: usize,
}

impl FailingReader {
    /// Yield `data`, then an I/O error.
    #[must_use]
    pub fn after(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.data.len() {
            return Err(io::Error::other("injected read failure"));
        }
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
