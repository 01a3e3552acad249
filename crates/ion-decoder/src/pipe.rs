//! Growable byte pipe.
//!
//! A producer appends with [`BytePipe::receive`]; a consumer reads from a
//! read head that only moves forward unless it is rewound to a mark.
//! Storage grows in fixed increments and is reclaimed by shifting live
//! bytes to the front, never by shrinking.
//!
//! ```text
//!  0          read_index      boundary       write_index     capacity
//!  ├─ released ─┼── visible ────┼── received ───┼─── free ──────┤
//!               ▲               ▲               ▲
//!               mark / value    only in         receive() appends
//!               start           boundary mode
//! ```
//!
//! In boundary mode bytes are stored as soon as they arrive but only
//! become readable once [`BytePipe::advance_boundary`] moves past them.

use std::fmt;
use std::io::{self, Read};

use tracing::{debug, trace};

use crate::error::DecodeError;

/// Receives the left-shift amount each time live bytes are moved down.
pub type ShiftConsumer = Box<dyn FnMut(usize) + Send>;

pub struct BytePipe {
    buf: Vec<u8>,
    read_index: usize,
    write_index: usize,
    boundary: Option<usize>,
    mark: Option<usize>,
    value_start: Option<usize>,
    increment: usize,
    maximum: Option<usize>,
    shift_consumer: Option<ShiftConsumer>,
    shifted: usize,
}

impl BytePipe {
    /// A pipe that starts at `initial_size` bytes and grows by the same
    /// amount each time, never past `maximum_size`.
    ///
    /// # Errors
    ///
    /// [`DecodeError::InvalidConfiguration`] when `initial_size` is zero.
    pub fn new(initial_size: usize, maximum_size: Option<usize>) -> Result<Self, DecodeError> {
        if initial_size == 0 {
            return Err(DecodeError::InvalidConfiguration {
                reason: "initial buffer size must be non-zero",
            });
        }
        let initial = maximum_size.map_or(initial_size, |max| initial_size.min(max).max(1));
        Ok(Self {
            buf: vec![0; initial],
            read_index: 0,
            write_index: 0,
            boundary: None,
            mark: None,
            value_start: None,
            increment: initial,
            maximum: maximum_size,
            shift_consumer: None,
            shifted: 0,
        })
    }

    /// A pipe with no maximum size.
    #[must_use]
    pub fn unbounded(initial_size: usize) -> Self {
        let initial = initial_size.max(1);
        Self {
            buf: vec![0; initial],
            read_index: 0,
            write_index: 0,
            boundary: None,
            mark: None,
            value_start: None,
            increment: initial,
            maximum: None,
            shift_consumer: None,
            shifted: 0,
        }
    }

    /// An unbounded pipe already holding `bytes`.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut pipe = Self::unbounded(bytes.len());
        pipe.buf[..bytes.len()].copy_from_slice(bytes);
        pipe.write_index = bytes.len();
        pipe
    }

    /// Append bytes, reclaiming or growing storage as needed.
    ///
    /// # Errors
    ///
    /// [`DecodeError::BufferCapacityExceeded`] when the unreleased bytes
    /// plus `bytes` would not fit within the maximum size.
    pub fn receive(&mut self, bytes: &[u8]) -> Result<(), DecodeError> {
        self.ensure_space(bytes.len())?;
        self.buf[self.write_index..self.write_index + bytes.len()].copy_from_slice(bytes);
        self.write_index += bytes.len();
        Ok(())
    }

    /// Read at most `limit` bytes from `reader` straight into storage.
    ///
    /// `Ok(0)` means the reader had nothing to offer right now, whether it
    /// reported end of input or [`io::ErrorKind::WouldBlock`].
    ///
    /// # Errors
    ///
    /// Capacity errors as for [`receive`](Self::receive), and any I/O
    /// error other than `WouldBlock` or `Interrupted`.
    pub fn receive_from<R: Read>(&mut self, reader: &mut R, limit: usize) -> Result<usize, DecodeError> {
        if limit == 0 {
            return Ok(0);
        }
        self.ensure_space(limit)?;
        let start = self.write_index;
        let n = read_some(reader, &mut self.buf[start..start + limit])?;
        self.write_index += n;
        Ok(n)
    }

    fn ensure_space(&mut self, needed: usize) -> Result<(), DecodeError> {
        if self.buf.len() - self.write_index >= needed {
            return Ok(());
        }
        self.compact();
        if self.buf.len() - self.write_index >= needed {
            return Ok(());
        }

        let required = self.write_index + needed;
        if let Some(maximum) = self.maximum
            && required > maximum
        {
            return Err(DecodeError::BufferCapacityExceeded { required, maximum });
        }
        let steps = (required - self.buf.len()).div_ceil(self.increment);
        let mut capacity = self.buf.len() + steps * self.increment;
        if let Some(maximum) = self.maximum {
            capacity = capacity.min(maximum);
        }
        debug!(from = self.buf.len(), to = capacity, "pipe grew");
        self.buf.resize(capacity, 0);
        Ok(())
    }

    fn visible_end(&self) -> usize {
        self.boundary.unwrap_or(self.write_index)
    }

    /// Bytes that can be read right now.
    #[must_use]
    pub fn available(&self) -> usize {
        self.visible_end().saturating_sub(self.read_index)
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn maximum(&self) -> Option<usize> {
        self.maximum
    }

    #[must_use]
    pub fn read_index(&self) -> usize {
        self.read_index
    }

    #[must_use]
    pub fn write_index(&self) -> usize {
        self.write_index
    }

    /// Total number of bytes shifted out of the front so far.
    ///
    /// `index + shifted()` identifies a byte for as long as it stays in
    /// the pipe, across any number of compactions.
    #[must_use]
    pub fn shifted(&self) -> usize {
        self.shifted
    }

    /// The visible, unread bytes.
    #[must_use]
    pub fn buffered(&self) -> &[u8] {
        &self.buf[self.read_index..self.visible_end().max(self.read_index)]
    }

    /// Byte at a raw storage index, visible or not.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<u8> {
        (index < self.write_index).then(|| self.buf[index])
    }

    /// Received bytes in `[start, end)` by raw storage index.
    #[must_use]
    pub fn slice(&self, start: usize, end: usize) -> Option<&[u8]> {
        (start <= end && end <= self.write_index).then(|| &self.buf[start..end])
    }

    pub fn read(&mut self) -> Option<u8> {
        if self.available() == 0 {
            return None;
        }
        let byte = self.buf[self.read_index];
        self.read_index += 1;
        Some(byte)
    }

    /// Copy visible bytes into `out`, returning how many were copied.
    pub fn read_into(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.available());
        out[..n].copy_from_slice(&self.buf[self.read_index..self.read_index + n]);
        self.read_index += n;
        n
    }

    /// Look at a visible byte without consuming it.
    #[must_use]
    pub fn peek(&self, offset: usize) -> Option<u8> {
        (offset < self.available()).then(|| self.buf[self.read_index + offset])
    }

    /// Consume up to `n` visible bytes, returning how many were skipped.
    pub fn skip(&mut self, n: usize) -> usize {
        let n = n.min(self.available());
        self.read_index += n;
        n
    }

    // ── Marks ───────────────────────────────────────────────────────────

    /// Remember the read head so it can be restored with [`rewind`](Self::rewind).
    pub fn mark(&mut self) {
        self.mark = Some(self.read_index);
    }

    /// Remember where the most recent value starts.
    pub fn set_value_start(&mut self, index: usize) {
        self.value_start = Some(index);
    }

    /// Move the read head back to the mark.
    ///
    /// # Errors
    ///
    /// [`DecodeError::NoMark`] if no mark is set or compaction discarded it.
    pub fn rewind(&mut self) -> Result<(), DecodeError> {
        let mark = self.mark.ok_or(DecodeError::NoMark)?;
        self.read_index = mark;
        Ok(())
    }

    /// Move the read head back to the start of the most recent value.
    ///
    /// # Errors
    ///
    /// [`DecodeError::NoMark`] if no value start is recorded.
    pub fn rewind_to_value_start(&mut self) -> Result<(), DecodeError> {
        let start = self.value_start.ok_or(DecodeError::NoMark)?;
        self.read_index = start;
        Ok(())
    }

    pub fn clear_marks(&mut self) {
        self.mark = None;
        self.value_start = None;
    }

    // ── Reclaiming space ────────────────────────────────────────────────

    /// Move the read head to a raw storage index.
    ///
    /// # Errors
    ///
    /// [`DecodeError::SeekOutOfRange`] past the last received byte.
    pub fn seek_to(&mut self, index: usize) -> Result<(), DecodeError> {
        if index > self.write_index {
            return Err(DecodeError::SeekOutOfRange {
                target: index,
                write_index: self.write_index,
            });
        }
        self.read_index = index;
        Ok(())
    }

    /// Move the bytes in `[from, write_index)` down to `to`, discarding
    /// `[to, from)`. Returns the shift, which is also passed to the
    /// registered shift consumer.
    ///
    /// Indices inside the discarded range collapse to `to`. A mark inside
    /// it is dropped together with the value start.
    pub fn consolidate(&mut self, from: usize, to: usize) -> usize {
        if to >= from || from > self.write_index {
            return 0;
        }
        let shift = from - to;
        self.buf.copy_within(from..self.write_index, to);
        self.write_index -= shift;

        let adjust = |index: usize| {
            if index >= from {
                index - shift
            } else {
                index.min(to)
            }
        };
        let discards = |index: Option<usize>| index.is_some_and(|i| i >= to && i < from);
        if discards(self.mark) || discards(self.value_start) {
            self.clear_marks();
        }
        self.read_index = adjust(self.read_index);
        self.boundary = self.boundary.map(adjust);
        self.mark = self.mark.map(adjust);
        self.value_start = self.value_start.map(adjust);

        self.shifted += shift;
        if let Some(consumer) = &mut self.shift_consumer {
            consumer(shift);
        }
        trace!(from, to, shift, "pipe consolidated");
        shift
    }

    /// Shift everything from the earliest live index (read head or mark)
    /// to the front of storage.
    pub fn compact(&mut self) -> usize {
        let earliest = [Some(self.read_index), self.mark, self.value_start]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(self.read_index);
        self.consolidate(earliest, 0)
    }

    /// Drop every received byte at or after `write_index`, leaving
    /// `available` visible bytes ending at the boundary (or at the new
    /// write index outside boundary mode).
    pub fn truncate(&mut self, write_index: usize, available: usize) {
        let write_index = write_index.min(self.write_index);
        self.write_index = write_index;
        let end = match self.boundary {
            Some(boundary) => {
                let boundary = boundary.min(write_index);
                self.boundary = Some(boundary);
                boundary
            }
            None => write_index,
        };
        self.read_index = end.saturating_sub(available);
        if self.mark.is_some_and(|m| m > write_index)
            || self.value_start.is_some_and(|v| v > write_index)
        {
            self.clear_marks();
        }
        trace!(write_index, available, "pipe truncated");
    }

    pub fn register_shift_consumer(&mut self, consumer: ShiftConsumer) {
        self.shift_consumer = Some(consumer);
    }

    // ── Boundary mode ───────────────────────────────────────────────────

    /// Hide bytes received from now on until the boundary is advanced.
    pub fn enable_boundary(&mut self) {
        self.boundary = Some(self.write_index);
    }

    /// Make everything before raw index `to` readable.
    pub fn advance_boundary(&mut self, to: usize) {
        self.boundary = Some(to.min(self.write_index));
    }

    #[must_use]
    pub fn boundary(&self) -> Option<usize> {
        self.boundary
    }
}

impl fmt::Debug for BytePipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BytePipe")
            .field("capacity", &self.buf.len())
            .field("read_index", &self.read_index)
            .field("write_index", &self.write_index)
            .field("boundary", &self.boundary)
            .field("mark", &self.mark)
            .field("value_start", &self.value_start)
            .field("maximum", &self.maximum)
            .field("shifted", &self.shifted)
            .finish_non_exhaustive()
    }
}

impl Read for BytePipe {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_into(buf))
    }
}

impl io::Write for BytePipe {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.receive(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// One read from `source`, treating `WouldBlock` as "nothing yet".
pub(crate) fn read_some<R: Read>(source: &mut R, buf: &mut [u8]) -> Result<usize, DecodeError> {
    loop {
        match source.read(buf) {
            Ok(n) => {
                if n > 0 {
                    trace!(bytes = n, "source read");
                }
                return Ok(n);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(0),
            Err(e) => return Err(DecodeError::Io(e)),
        }
    }
}
