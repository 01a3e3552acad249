//! Lookahead buffer: one complete top-level unit at a time.
//!
//! A scanning cursor walks the upstream bytes. Each top-level item it has
//! fully buffered is copied into an exposure pipe running in boundary
//! mode, where it stays hidden until the unit it belongs to is complete:
//!
//! ```text
//!   upstream ──▶ scanning cursor ──items──▶ exposure pipe
//!                  │                      [ visible unit │ hidden prefix ]
//!                  │ oversized values            ▲ boundary advanced when
//!                  ▼                             │ the unit's value is ready
//!                discarded, handler invoked
//! ```
//!
//! A unit is the version markers and symbol tables since the previous
//! unit followed by one ordinary value. NOP pads are dropped. After
//! [`LookaheadBuffer::fill_input`] either a whole unit is visible or
//! [`LookaheadBuffer::more_data_required`] is true and nothing new is.

use std::fmt;
use std::io::{self, Read};

use ion_wire::{IVM_SIZE, VersionMarker};
use tracing::{debug, debug_span};

use crate::config::{BufferConfiguration, Handlers};
use crate::cursor::{BinaryCursor, CursorListener, Event, Marker, OversizedValue};
use crate::error::DecodeError;
use crate::pipe::BytePipe;
use crate::symbols::{is_symbol_table, might_be_symbol_table};

/// What the scanning cursor passed over during one instruction.
enum Notice {
    Ivm(VersionMarker),
    Oversized(OversizedValue),
}

struct LookaheadListener {
    handlers: Handlers,
    notices: Vec<Notice>,
}

impl CursorListener for LookaheadListener {
    fn on_ivm(&mut self, marker: VersionMarker, _position: usize) {
        self.notices.push(Notice::Ivm(marker));
    }

    fn on_data(&mut self, bytes: usize) {
        self.handlers.data(bytes);
    }

    fn on_oversized(&mut self, value: &OversizedValue) {
        if might_be_symbol_table(value) {
            self.handlers.oversized_symbol_table();
        } else {
            self.handlers.oversized_value();
        }
        self.notices.push(Notice::Oversized(value.clone()));
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Scan {
    Header,
    Body,
}

/// Buffers exactly one top-level unit at a time, within the configured
/// maximum size.
///
/// Markers are offsets into [`unit`](Self::unit). They are recomputed on
/// every [`fill_input`](Self::fill_input).
///
/// # Rewinding
///
/// [`rewind`](Self::rewind) returns to the last [`mark`](Self::mark),
/// normally the start of the unit, so a reader sees the unit's symbol
/// tables again. A symbol table that appends is then applied twice and its
/// symbols are duplicated. [`rewind_to_value_start`](Self::rewind_to_value_start)
/// rereads only the value. Choosing between them is up to the caller.
///
/// # Example
///
/// ```rust
/// use ion_decoder::{BufferConfiguration, BytePipe, LookaheadBuffer};
///
/// let mut lookahead =
///     LookaheadBuffer::new(BytePipe::unbounded(16), BufferConfiguration::default()).unwrap();
/// lookahead.source_mut().receive(&[0xE0, 0x01, 0x00, 0xEA, 0x21]).unwrap();
/// lookahead.fill_input().unwrap();
/// assert!(lookahead.more_data_required());
///
/// lookahead.source_mut().receive(&[0x07]).unwrap();
/// lookahead.fill_input().unwrap();
/// assert!(!lookahead.more_data_required());
/// assert_eq!(lookahead.unit(), &[0xE0, 0x01, 0x00, 0xEA, 0x21, 0x07]);
/// ```
pub struct LookaheadBuffer<R = BytePipe> {
    cursor: BinaryCursor<R, LookaheadListener>,
    exposure: BytePipe,
    scan: Scan,
    complete: bool,
    /// Pipe position (index plus shift) where the current unit starts.
    unit_start: usize,
    ivm: Option<Marker>,
    symbol_tables: Vec<Marker>,
    value: Option<Marker>,
    annotation_sids: Vec<usize>,
    /// Stream offset just past the last completed value.
    value_end: usize,
    invalidated: bool,
}

impl<R: Read> LookaheadBuffer<R> {
    /// A lookahead buffer over `upstream`.
    ///
    /// # Errors
    ///
    /// [`DecodeError::InvalidConfiguration`] for an unusable initial size.
    pub fn new(upstream: R, config: BufferConfiguration) -> Result<Self, DecodeError> {
        let (limits, handlers) = config.into_parts();
        let listener = LookaheadListener {
            handlers,
            notices: Vec::new(),
        };
        let mut cursor = BinaryCursor::new(upstream, limits, listener)?;
        cursor.set_auto_unit(false);
        let mut exposure = BytePipe::unbounded(limits.initial);
        exposure.enable_boundary();
        Ok(Self {
            cursor,
            exposure,
            scan: Scan::Header,
            complete: false,
            unit_start: 0,
            ivm: None,
            symbol_tables: Vec::new(),
            value: None,
            annotation_sids: Vec::new(),
            value_end: 0,
            invalidated: false,
        })
    }

    /// Buffer the next unit.
    ///
    /// A unit made visible by the previous call is released first; bytes
    /// of it that were not read stay readable ahead of the new unit.
    ///
    /// # Errors
    ///
    /// Malformed-data errors from the scanning cursor, capacity errors for
    /// headers that do not fit, and I/O errors from the upstream.
    pub fn fill_input(&mut self) -> Result<(), DecodeError> {
        let _span = debug_span!("fill_input").entered();
        if self.complete {
            self.release();
        }

        loop {
            let event = match self.scan {
                Scan::Header => self.cursor.next_value()?,
                Scan::Body => self.cursor.fill_value()?,
            };
            self.apply_notices()?;

            match event {
                Event::NeedsData => return Ok(()),
                Event::StartScalar | Event::StartContainer => self.scan = Scan::Body,
                Event::NeedsInstruction | Event::EndContainer => self.scan = Scan::Header,
                Event::ValueReady => {
                    self.scan = Scan::Header;
                    let marker = self.expose_current()?;
                    if is_symbol_table(&self.cursor) {
                        self.symbol_tables.push(marker);
                        continue;
                    }
                    self.complete_unit(marker);
                    return Ok(());
                }
            }
        }
    }

    fn release(&mut self) {
        self.complete = false;
        self.exposure.clear_marks();
        self.unit_start = self.position();
        self.ivm = None;
        self.symbol_tables.clear();
        self.value = None;
        self.annotation_sids.clear();
        self.cursor.set_unit_start(self.value_end);
    }

    /// Pipe position of the next byte to land in the exposure pipe.
    fn position(&self) -> usize {
        self.exposure.write_index() + self.exposure.shifted()
    }

    /// Copy the current top-level value into the hidden part of the pipe.
    fn expose_current(&mut self) -> Result<Marker, DecodeError> {
        let start = self.position();
        let bytes = self.cursor.encoded_value()?;
        self.exposure.receive(bytes)?;
        Ok(Marker {
            start,
            end: self.position(),
        })
    }

    fn complete_unit(&mut self, marker: Marker) {
        let shifted = self.exposure.shifted();
        self.exposure.advance_boundary(marker.end - shifted);
        self.exposure.set_value_start(marker.start - shifted);
        self.value = Some(marker);
        self.annotation_sids = self.cursor.annotation_sids().to_vec();
        self.value_end = self.cursor.value_span().map_or(self.value_end, |s| s.end);
        self.complete = true;
        debug!(
            unit = marker.end - self.unit_start,
            symbol_tables = self.symbol_tables.len(),
            "lookahead unit completed"
        );
    }

    fn apply_notices(&mut self) -> Result<(), DecodeError> {
        let notices = std::mem::take(&mut self.cursor.listener_mut().notices);
        for notice in notices {
            match notice {
                Notice::Ivm(marker) => {
                    let start = self.position();
                    let mut bytes = [0u8; IVM_SIZE];
                    marker.write_to(&mut bytes)?;
                    self.exposure.receive(&bytes)?;
                    self.ivm = Some(Marker {
                        start,
                        end: self.position(),
                    });
                }
                Notice::Oversized(value) => self.drop_oversized(&value),
            }
        }
        Ok(())
    }

    /// Account for a value the cursor is skipping.
    ///
    /// The prefix gathered so far stays hidden and carries over to the next
    /// value, except after a symbol table: the symbols that follow cannot
    /// be resolved anyway, so the prefix is truncated away and the reader
    /// is told to invalidate.
    fn drop_oversized(&mut self, value: &OversizedValue) {
        if might_be_symbol_table(value) {
            let start = self.unit_start - self.exposure.shifted();
            self.exposure.truncate(start, self.exposure.available());
            self.ivm = None;
            self.symbol_tables.clear();
            self.invalidated = true;
        }
        let prefix = self.position() - self.unit_start;
        self.cursor.set_unit_start(value.end.saturating_sub(prefix));
        self.value_end = value.end;
    }

    // ── Accessors ───────────────────────────────────────────────────────

    /// Whether no complete unit is visible.
    #[must_use]
    pub fn more_data_required(&self) -> bool {
        !self.complete
    }

    /// Visible bytes not yet read.
    #[must_use]
    pub fn available(&self) -> usize {
        self.exposure.available()
    }

    /// The bytes of the completed unit, whether read or not. Empty while
    /// more data is required.
    #[must_use]
    pub fn unit(&self) -> &[u8] {
        if !self.complete {
            return &[];
        }
        let shifted = self.exposure.shifted();
        let end = self.exposure.boundary().unwrap_or(0);
        self.unit_start
            .checked_sub(shifted)
            .and_then(|start| self.exposure.slice(start, end))
            .unwrap_or(&[])
    }

    fn relative(&self, marker: Marker) -> Marker {
        Marker {
            start: marker.start - self.unit_start,
            end: marker.end - self.unit_start,
        }
    }

    /// The last version marker in the unit.
    #[must_use]
    pub fn ivm_marker(&self) -> Option<Marker> {
        self.ivm.map(|m| self.relative(m))
    }

    /// Each symbol table in the unit, in stream order.
    #[must_use]
    pub fn symbol_table_markers(&self) -> Vec<Marker> {
        self.symbol_tables.iter().map(|&m| self.relative(m)).collect()
    }

    /// The unit's value, annotations included.
    #[must_use]
    pub fn value_marker(&self) -> Option<Marker> {
        self.value.map(|m| self.relative(m))
    }

    /// Annotation SIDs on the unit's value.
    #[must_use]
    pub fn annotation_sids(&self) -> &[usize] {
        &self.annotation_sids
    }

    /// Whether an oversized symbol table was skipped since the last call.
    pub fn take_symbol_table_invalidation(&mut self) -> bool {
        std::mem::take(&mut self.invalidated)
    }

    pub fn source_mut(&mut self) -> &mut R {
        self.cursor.source_mut()
    }

    /// Whether the upstream stopped partway through an item.
    #[must_use]
    pub fn is_value_incomplete(&self) -> bool {
        self.cursor.is_value_incomplete()
    }

    /// Confirm the upstream ended on an item boundary.
    ///
    /// # Errors
    ///
    /// [`DecodeError::UnexpectedEof`] when it did not.
    pub fn end_stream(&self) -> Result<(), DecodeError> {
        if self.is_value_incomplete() {
            return Err(DecodeError::UnexpectedEof {
                position: self.cursor.total_offset(),
            });
        }
        Ok(())
    }

    // ── Reading the unit ────────────────────────────────────────────────

    /// Remember the read position, normally the start of the unit.
    pub fn mark(&mut self) {
        self.exposure.mark();
    }

    /// Go back to the mark, symbol tables included.
    ///
    /// # Errors
    ///
    /// [`DecodeError::NoMark`] without a mark for this unit.
    pub fn rewind(&mut self) -> Result<(), DecodeError> {
        self.exposure.rewind()
    }

    /// Go back to the start of the unit's value.
    ///
    /// # Errors
    ///
    /// [`DecodeError::NoMark`] while no unit is complete.
    pub fn rewind_to_value_start(&mut self) -> Result<(), DecodeError> {
        self.exposure.rewind_to_value_start()
    }

    /// Discard whatever is visible and unread.
    pub fn consume(&mut self) {
        self.exposure.skip(self.exposure.available());
    }
}

impl<R: Read> Read for LookaheadBuffer<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.exposure.read_into(buf))
    }
}

impl<R> fmt::Debug for LookaheadBuffer<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookaheadBuffer")
            .field("exposure", &self.exposure)
            .field("complete", &self.complete)
            .field("unit_start", &self.unit_start)
            .field("invalidated", &self.invalidated)
            .finish_non_exhaustive()
    }
}
