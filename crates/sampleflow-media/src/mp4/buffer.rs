//! Append-only window over the bytes received so far.
//!
//! Chunks are kept as the `Bytes` segments they arrived in, each tagged with
//! its file offset. Reads that fall inside one segment are zero-copy slices;
//! reads that straddle segments are gathered into a fresh buffer.

use crate::{Error, Result};
use bytes::{Bytes, BytesMut};
use std::collections::VecDeque;

#[derive(Debug)]
struct Segment {
    offset: u64,
    data: Bytes,
}

impl Segment {
    fn end(&self) -> u64 {
        self.offset + self.data.len() as u64
    }
}

/// Contiguous window of buffered file bytes.
#[derive(Debug, Default)]
pub struct ByteWindow {
    segments: VecDeque<Segment>,
    start: u64,
    end: u64,
}

impl ByteWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// File offset of the first byte still buffered.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// File offset one past the last byte received.
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of bytes currently held.
    pub fn buffered(&self) -> u64 {
        self.end - self.start
    }

    /// Append a chunk that must begin exactly at [`end`](Self::end).
    pub fn push(&mut self, data: Bytes, file_start: u64) -> Result<()> {
        if file_start != self.end {
            return Err(Error::NonContiguousAppend {
                expected: self.end,
                got: file_start,
            });
        }
        if data.is_empty() {
            return Ok(());
        }
        if self.segments.is_empty() {
            self.start = file_start;
        }
        self.end += data.len() as u64;
        self.segments.push_back(Segment {
            offset: file_start,
            data,
        });
        Ok(())
    }

    /// Whether `[offset, offset + len)` is fully buffered.
    pub fn contains(&self, offset: u64, len: u64) -> bool {
        offset >= self.start && offset.saturating_add(len) <= self.end
    }

    /// Read `[offset, offset + len)` if it is fully buffered.
    pub fn read(&self, offset: u64, len: u64) -> Option<Bytes> {
        if !self.contains(offset, len) {
            return None;
        }
        if len == 0 {
            return Some(Bytes::new());
        }

        let first = self.segment_index(offset);
        let segment = &self.segments[first];
        let rel = (offset - segment.offset) as usize;
        if offset + len <= segment.end() {
            return Some(segment.data.slice(rel..rel + len as usize));
        }

        let mut out = BytesMut::with_capacity(len as usize);
        let mut cursor = offset;
        let stop = offset + len;
        for segment in self.segments.range(first..) {
            if cursor >= stop {
                break;
            }
            let from = (cursor - segment.offset) as usize;
            let to = (stop.min(segment.end()) - segment.offset) as usize;
            out.extend_from_slice(&segment.data[from..to]);
            cursor = segment.offset + to as u64;
        }
        Some(out.freeze())
    }

    /// Copy up to `dst.len()` bytes starting at `offset`, returning how many
    /// bytes were available.
    pub fn peek(&self, offset: u64, dst: &mut [u8]) -> usize {
        if offset < self.start || offset >= self.end {
            return 0;
        }
        let len = (dst.len() as u64).min(self.end - offset);
        match self.read(offset, len) {
            Some(bytes) => {
                dst[..bytes.len()].copy_from_slice(&bytes);
                bytes.len()
            }
            None => 0,
        }
    }

    /// Drop every segment that ends at or before `offset`.
    pub fn release_before(&mut self, offset: u64) {
        while let Some(front) = self.segments.front() {
            if front.end() > offset {
                break;
            }
            self.segments.pop_front();
        }
        self.start = self
            .segments
            .front()
            .map(|s| s.offset)
            .unwrap_or(self.end);
    }

    fn segment_index(&self, offset: u64) -> usize {
        let idx = self.segments.partition_point(|s| s.offset <= offset);
        idx.saturating_sub(1)
    }
}
