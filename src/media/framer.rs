//! Annex-B stream framer
//!
//! TCP delivers bytes, not NAL units. The framer accumulates arbitrarily
//! sized chunks and emits a unit only once the *next* start code has been
//! seen, so nothing is ever emitted before it is fully received.
//!
//! ```text
//!  accumulator:  [junk][SC unit A][SC unit B][SC partial C...]
//!                      ^          ^          ^
//!                      |          |          last start code: retained
//!                      emitted    emitted
//! ```
//!
//! Scanning resumes where the previous pass stopped, so a confirmed prefix
//! is never scanned twice and the accumulator holds at most one in-flight
//! unit in the steady state.

use bytes::{Buf, BytesMut};

use super::h264::{NalUnit, START_CODE, START_CODE_LEN};

/// Stateful Annex-B framer
///
/// Single-writer: the read loop owns it, so there is no internal locking.
#[derive(Debug, Default)]
pub struct NalFramer {
    /// Bytes not yet resolved into a complete unit
    buffer: BytesMut,
    /// Offset of the first start code in `buffer`, if one has been seen
    first_start: Option<usize>,
    /// Next offset to test for a start code
    scan_pos: usize,
}

impl NalFramer {
    /// Create an empty framer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a framer with a pre-sized accumulator
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            ..Default::default()
        }
    }

    /// Append a chunk and return every unit it completed, in stream order
    pub fn push(&mut self, chunk: &[u8]) -> Vec<NalUnit> {
        self.buffer.extend_from_slice(chunk);

        let mut starts: Vec<usize> = self.first_start.into_iter().collect();
        while self.scan_pos + START_CODE_LEN <= self.buffer.len() {
            if self.buffer[self.scan_pos..self.scan_pos + START_CODE_LEN] == START_CODE {
                starts.push(self.scan_pos);
                self.scan_pos += START_CODE_LEN;
            } else {
                self.scan_pos += 1;
            }
        }

        if starts.len() < 2 {
            self.first_start = starts.first().copied();
            return Vec::new();
        }

        // Anything ahead of the first start code belongs to no unit
        let base = starts[0];
        if base > 0 {
            tracing::debug!(bytes = base, "Discarding bytes before first start code");
            self.buffer.advance(base);
        }

        let mut units = Vec::with_capacity(starts.len() - 1);
        for pair in starts.windows(2) {
            let unit = self.buffer.split_to(pair[1] - pair[0]).freeze();
            tracing::trace!(
                len = unit.len(),
                nal_type = ?unit.get(START_CODE_LEN).map(|b| b & 0x1F),
                "Extracted NAL unit"
            );
            units.push(NalUnit::new(unit));
        }

        // The buffer now starts at the last start code
        let last = starts[starts.len() - 1];
        self.first_start = Some(0);
        self.scan_pos -= last;

        units
    }

    /// Flush whatever is left as one final unit.
    ///
    /// Called on end-of-stream. Best effort: no trailing start code confirms
    /// the unit, and it may not even begin with one.
    pub fn finish(&mut self) -> Option<NalUnit> {
        self.first_start = None;
        self.scan_pos = 0;

        if self.buffer.is_empty() {
            return None;
        }

        let rest = self.buffer.split().freeze();
        tracing::trace!(len = rest.len(), "Flushed trailing NAL unit");
        Some(NalUnit::new(rest))
    }

    /// Number of bytes waiting for a closing start code
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Drop buffered bytes without emitting them
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.first_start = None;
        self.scan_pos = 0;
    }
}
