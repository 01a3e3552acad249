//! Top-level incremental reader.
//!
//! [`IncrementalReader`] puts symbol resolution and typed accessors on top
//! of a [`BinaryCursor`]. Version markers and symbol tables are consumed
//! on the way and never surface as values.
//!
//! ```text
//!   bytes ──▶ BinaryCursor ──events──▶ IncrementalReader ──▶ next() / step_in()
//!                                           │                  int_value() ...
//!                                           ▼
//!                                   SymbolTableResolver
//! ```
//!
//! `next()` returns `None` both at the end of a container and when the
//! next value has not fully arrived; [`IncrementalReader::more_data_required`]
//! tells the two apart.

use std::io::{self, Read};
use std::sync::Arc;

use ion_types::{Catalog, Decimal, IonType, SymbolTable, SymbolToken, Timestamp};
use ion_wire::varint::decode_uint;
use ion_wire::{IVM_SIZE, TypeCode, VersionMarker};

use crate::config::{BufferLimits, Handlers, ReaderOptions};
use crate::cursor::{BinaryCursor, CursorListener, Event, OversizedValue};
use crate::error::DecodeError;
use crate::lookahead::LookaheadBuffer;
use crate::pipe::BytePipe;
use crate::symbols::{SymbolTableResolver, is_symbol_table, might_be_symbol_table};
use crate::transfer::ByteTransfer;

/// Absolute byte range of a value, from its field name or annotation
/// wrapper to its last byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A top-level value the cursor skipped for being over the maximum.
#[derive(Clone, Copy)]
struct Skipped {
    end: usize,
    symbol_table: bool,
}

struct ReaderListener {
    handlers: Handlers,
    /// Version markers passed since the owner last looked.
    ivms: usize,
    skipped: Option<Skipped>,
}

impl ReaderListener {
    fn new(handlers: Handlers) -> Self {
        Self {
            handlers,
            ivms: 0,
            skipped: None,
        }
    }
}

impl CursorListener for ReaderListener {
    fn on_ivm(&mut self, _marker: VersionMarker, _position: usize) {
        self.ivms += 1;
    }

    fn on_data(&mut self, bytes: usize) {
        self.handlers.data(bytes);
    }

    fn on_oversized(&mut self, value: &OversizedValue) {
        let symbol_table = might_be_symbol_table(value);
        if symbol_table {
            self.handlers.oversized_symbol_table();
        } else {
            self.handlers.oversized_value();
        }
        self.skipped = Some(Skipped {
            end: value.end,
            symbol_table,
        });
    }
}

/// Pull reader over a binary stream that may still be arriving.
///
/// At the top level a value is only returned once it is completely
/// buffered, so its children can be read without further input. Below the
/// top level values are returned as soon as their headers are parsed.
///
/// With a maximum buffer size, the limit applies to a whole top-level
/// unit: the version marker and symbol tables since the previous value,
/// plus the value itself. NOP pads before a skipped value do not count.
/// A [`LookaheadBuffer`] measures units the same way, so both readers
/// skip the same values.
///
/// # Example
///
/// ```rust
/// use ion_decoder::{IncrementalReader, ReaderOptions};
/// use ion_types::IonType;
///
/// let mut reader = IncrementalReader::push(ReaderOptions::default()).unwrap();
/// reader.receive(&[0xE0, 0x01, 0x00, 0xEA, 0xD3]).unwrap();
/// assert_eq!(reader.next().unwrap(), None);
/// assert!(reader.more_data_required());
///
/// reader.receive(&[0x84, 0x21, 0x01]).unwrap();
/// assert_eq!(reader.next().unwrap(), Some(IonType::Struct));
/// reader.step_in().unwrap();
/// assert_eq!(reader.next().unwrap(), Some(IonType::Int));
/// assert_eq!(reader.field_name_text().unwrap().as_deref(), Some("name"));
/// assert_eq!(reader.int_value().unwrap(), 1);
/// assert_eq!(reader.next().unwrap(), None);
/// reader.step_out().unwrap();
/// ```
pub struct IncrementalReader<R = BytePipe> {
    cursor: BinaryCursor<R, ReaderListener>,
    resolver: SymbolTableResolver,
    passed: Option<SymbolTable>,
    /// A top-level header is parsed but its value is not buffered yet.
    /// The cursor's value is not surfaced while this holds.
    filling: bool,
    /// Bytes of version markers and symbol tables read since the last
    /// top-level value; they belong to the next value's unit.
    prefix: usize,
}

impl IncrementalReader<io::Empty> {
    /// A reader over a complete in-memory stream.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::from_bytes_range(bytes, 0, bytes.len())
    }

    /// A reader over `bytes[start..end]`. Spans are offsets into `bytes`.
    #[must_use]
    pub fn from_bytes_range(bytes: &[u8], start: usize, end: usize) -> Self {
        let listener = ReaderListener::new(Handlers::default());
        let options = ReaderOptions::default();
        Self::with_cursor(
            BinaryCursor::from_bytes_range_with(bytes, start, end, listener),
            options.catalog,
        )
    }
}

impl IncrementalReader<BytePipe> {
    /// A reader fed through [`receive`](Self::receive).
    ///
    /// # Errors
    ///
    /// [`DecodeError::InvalidConfiguration`] for a zero initial size.
    pub fn push(options: ReaderOptions) -> Result<Self, DecodeError> {
        let initial = options.buffer.initial_buffer_size();
        Self::new(BytePipe::unbounded(initial), options)
    }

    /// Push bytes onto the end of the stream.
    ///
    /// # Errors
    ///
    /// Capacity errors from the input pipe.
    pub fn receive(&mut self, bytes: &[u8]) -> Result<(), DecodeError> {
        self.cursor.receive(bytes)
    }
}

impl<U: Read> IncrementalReader<LookaheadBuffer<U>> {
    /// A reader over the units of a lookahead buffer. The buffer enforces
    /// the maximum size, so the reader itself is unbounded.
    ///
    /// # Errors
    ///
    /// [`DecodeError::InvalidConfiguration`] only for a zero buffer size.
    pub fn with_lookahead(
        lookahead: LookaheadBuffer<U>,
        catalog: Arc<dyn Catalog>,
    ) -> Result<Self, DecodeError> {
        let listener = ReaderListener::new(Handlers::default());
        let cursor = BinaryCursor::new(lookahead, BufferLimits::default(), listener)?;
        Ok(Self::with_cursor(cursor, catalog))
    }

    /// Have the lookahead buffer make the next unit visible.
    ///
    /// # Errors
    ///
    /// As for [`LookaheadBuffer::fill_input`].
    pub fn fill_input(&mut self) -> Result<(), DecodeError> {
        let lookahead = self.cursor.source_mut();
        lookahead.fill_input()?;
        if lookahead.take_symbol_table_invalidation() {
            self.resolver.invalidate();
        }
        Ok(())
    }

    /// The buffer feeding this reader.
    pub fn lookahead(&self) -> &LookaheadBuffer<U> {
        self.cursor.source()
    }

    /// For pushing input upstream of the buffer, or rewinding it.
    pub fn lookahead_mut(&mut self) -> &mut LookaheadBuffer<U> {
        self.cursor.source_mut()
    }
}

impl<R: Read> IncrementalReader<R> {
    /// A reader pulling from `source`, with the buffer limits, handlers and
    /// catalog in `options`.
    ///
    /// # Errors
    ///
    /// [`DecodeError::InvalidConfiguration`] for a zero initial size.
    pub fn new(source: R, options: ReaderOptions) -> Result<Self, DecodeError> {
        let (limits, handlers) = options.buffer.into_parts();
        let cursor = BinaryCursor::new(source, limits, ReaderListener::new(handlers))?;
        Ok(Self::with_cursor(cursor, options.catalog))
    }

    fn with_cursor(mut cursor: BinaryCursor<R, ReaderListener>, catalog: Arc<dyn Catalog>) -> Self {
        cursor.set_auto_unit(false);
        Self {
            cursor,
            resolver: SymbolTableResolver::new(catalog),
            passed: None,
            filling: false,
            prefix: 0,
        }
    }

    // ── Navigation ──────────────────────────────────────────────────────

    /// Move to the next value at the current depth.
    ///
    /// Returns `None` at the end of the container, or at the top level when
    /// the next value is not complete yet.
    ///
    /// # Errors
    ///
    /// Malformed-data, capacity and I/O errors. After any of them the
    /// stream cannot be read further.
    pub fn next(&mut self) -> Result<Option<IonType>, DecodeError> {
        if self.cursor.depth() > 0 {
            let event = self.cursor.next_value()?;
            return Ok(match event {
                Event::StartScalar | Event::StartContainer => self.cursor.ion_type(),
                _ => None,
            });
        }

        loop {
            let event = if self.filling {
                self.cursor.fill_value()?
            } else {
                self.cursor.next_value()?
            };
            self.apply_system_events();

            match event {
                Event::StartScalar | Event::StartContainer => self.filling = true,
                Event::NeedsInstruction => self.filling = false,
                Event::NeedsData | Event::EndContainer => return Ok(None),
                Event::ValueReady => {
                    self.filling = false;
                    let span = self.cursor.value_span();
                    if is_symbol_table(&self.cursor) {
                        self.prefix += span.map_or(0, |s| s.len());
                        let table = self.resolver.read_symbol_table(&mut self.cursor)?;
                        self.passed = Some(table.clone());
                        continue;
                    }
                    self.prefix = 0;
                    if let Some(span) = span {
                        self.cursor.set_unit_start(span.end);
                    }
                    return Ok(self.cursor.ion_type());
                }
            }
        }
    }

    fn apply_system_events(&mut self) {
        let listener = self.cursor.listener_mut();
        let ivms = std::mem::take(&mut listener.ivms);
        let skipped = listener.skipped.take();
        if ivms > 0 {
            self.resolver.reset();
            self.passed = Some(SymbolTable::System);
            self.prefix += ivms * IVM_SIZE;
        }
        if let Some(skipped) = skipped {
            // A skipped value leaves the prefix to the next one; a skipped
            // symbol table makes it useless.
            if skipped.symbol_table {
                self.resolver.invalidate();
                self.prefix = 0;
            }
            self.cursor
                .set_unit_start(skipped.end.saturating_sub(self.prefix));
        }
    }

    /// Enter the current list, sexp or struct.
    ///
    /// # Errors
    ///
    /// [`DecodeError::NoCurrentValue`] or [`DecodeError::StepIntoScalar`].
    pub fn step_in(&mut self) -> Result<(), DecodeError> {
        if self.filling {
            return Err(DecodeError::NoCurrentValue);
        }
        self.cursor.step_into_container()?;
        Ok(())
    }

    /// Leave the current container, skipping what is left of it.
    ///
    /// # Errors
    ///
    /// [`DecodeError::StepOutAtTopLevel`] at depth 0.
    pub fn step_out(&mut self) -> Result<(), DecodeError> {
        self.cursor.step_out_of_container()?;
        Ok(())
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.cursor.depth()
    }

    /// Whether the last `next()` stopped for lack of input rather than at
    /// the end of a container.
    #[must_use]
    pub fn more_data_required(&self) -> bool {
        self.cursor.event() == Event::NeedsData
    }

    /// Confirm the input ended between values.
    ///
    /// # Errors
    ///
    /// [`DecodeError::UnexpectedEof`] when a value was left incomplete.
    pub fn end_stream(&self) -> Result<(), DecodeError> {
        if self.cursor.is_value_incomplete() {
            return Err(DecodeError::UnexpectedEof {
                position: self.cursor.total_offset(),
            });
        }
        Ok(())
    }

    // ── Current value ───────────────────────────────────────────────────

    /// Type of the value the last `next()` returned; `None` after it
    /// returned `None`.
    #[must_use]
    pub fn ion_type(&self) -> Option<IonType> {
        self.current().and_then(BinaryCursor::ion_type)
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.current().is_some_and(BinaryCursor::is_null)
    }

    #[must_use]
    pub fn has_annotations(&self) -> bool {
        self.current().is_some_and(BinaryCursor::has_annotations)
    }

    /// The cursor, unless its value has not been surfaced yet.
    fn current(&self) -> Option<&BinaryCursor<R, ReaderListener>> {
        (!self.filling).then_some(&self.cursor)
    }

    /// The current value's annotations, resolved.
    ///
    /// # Errors
    ///
    /// Unknown or invalidated symbol IDs. The reader stays usable.
    pub fn annotations(&self) -> Result<Vec<SymbolToken>, DecodeError> {
        self.current()
            .map_or(&[][..], |cursor| cursor.annotation_sids())
            .iter()
            .map(|&sid| self.resolver.resolve(sid))
            .collect()
    }

    /// Annotation texts; `None` for annotations without known text.
    ///
    /// # Errors
    ///
    /// As for [`annotations`](Self::annotations).
    pub fn annotation_texts(&self) -> Result<Vec<Option<String>>, DecodeError> {
        Ok(self.annotations()?.into_iter().map(|t| t.text).collect())
    }

    /// The field name of the current struct member.
    ///
    /// # Errors
    ///
    /// Unknown or invalidated symbol IDs.
    pub fn field_name(&self) -> Result<Option<SymbolToken>, DecodeError> {
        self.current()
            .and_then(BinaryCursor::field_sid)
            .map(|sid| self.resolver.resolve(sid))
            .transpose()
    }

    /// # Errors
    ///
    /// As for [`field_name`](Self::field_name).
    pub fn field_name_text(&self) -> Result<Option<String>, DecodeError> {
        Ok(self.field_name()?.and_then(|t| t.text))
    }

    /// Offsets of the current value, field name and annotations included.
    #[must_use]
    pub fn current_span(&self) -> Option<Span> {
        self.current()?.value_span().map(|m| Span {
            start: m.start,
            end: m.end,
        })
    }

    // ── Scalars ─────────────────────────────────────────────────────────

    /// Body bytes of a non-null value of type `expected`.
    fn body(&self, expected: IonType) -> Result<&[u8], DecodeError> {
        let found = self.ion_type().ok_or(DecodeError::NoCurrentValue)?;
        if found != expected {
            return Err(DecodeError::TypeMismatch {
                expected: expected.name(),
                found,
            });
        }
        if self.cursor.is_null() {
            return Err(DecodeError::NullValue { ion_type: found });
        }
        self.cursor.value_bytes()
    }

    fn position(&self) -> usize {
        self.cursor.value_start().unwrap_or_default()
    }

    /// # Errors
    ///
    /// Usage errors for a missing, null or differently typed value.
    pub fn bool_value(&self) -> Result<bool, DecodeError> {
        self.body(IonType::Bool)?;
        let descriptor = self.cursor.type_descriptor().ok_or(DecodeError::NoCurrentValue)?;
        descriptor
            .bool_value()
            .ok_or(DecodeError::InvalidTypeDescriptor {
                byte: descriptor.raw(),
                position: self.position(),
            })
    }

    /// # Errors
    ///
    /// Usage errors as for [`bool_value`](Self::bool_value);
    /// [`DecodeError::NegativeZeroInt`] and [`DecodeError::IntegerOverflow`].
    pub fn int_value(&self) -> Result<i64, DecodeError> {
        let body = self.body(IonType::Int)?;
        let position = self.position();
        let negative = self
            .cursor
            .type_descriptor()
            .is_some_and(|d| d.code == TypeCode::NegativeInt);
        let magnitude =
            decode_uint(body).map_err(|_| DecodeError::IntegerOverflow { position })?;
        if negative && magnitude == 0 {
            return Err(DecodeError::NegativeZeroInt { position });
        }
        ion_wire::SignedMagnitude::new(magnitude, negative)
            .to_i64()
            .ok_or(DecodeError::IntegerOverflow { position })
    }

    /// 32-bit floats are widened.
    ///
    /// # Errors
    ///
    /// Usage errors as for [`bool_value`](Self::bool_value).
    pub fn float_value(&self) -> Result<f64, DecodeError> {
        let body = self.body(IonType::Float)?;
        match *body {
            [] => Ok(0.0),
            [a, b, c, d] => Ok(f64::from(f32::from_be_bytes([a, b, c, d]))),
            [a, b, c, d, e, f, g, h] => Ok(f64::from_be_bytes([a, b, c, d, e, f, g, h])),
            _ => Err(DecodeError::InvalidTypeDescriptor {
                byte: self.cursor.type_descriptor().map_or(0, |d| d.raw()),
                position: self.position(),
            }),
        }
    }

    /// # Errors
    ///
    /// Usage errors, and [`TypeError`](ion_types::TypeError) for bodies
    /// that do not decode.
    pub fn decimal_value(&self) -> Result<Decimal, DecodeError> {
        Ok(Decimal::decode(self.body(IonType::Decimal)?)?)
    }

    /// # Errors
    ///
    /// As for [`decimal_value`](Self::decimal_value).
    pub fn timestamp_value(&self) -> Result<Timestamp, DecodeError> {
        Ok(Timestamp::decode(self.body(IonType::Timestamp)?)?)
    }

    /// # Errors
    ///
    /// Usage errors and [`DecodeError::InvalidUtf8`].
    pub fn string_value(&self) -> Result<&str, DecodeError> {
        let body = self.body(IonType::String)?;
        std::str::from_utf8(body).map_err(|_| DecodeError::InvalidUtf8 {
            position: self.position(),
        })
    }

    /// The symbol ID of a symbol value, unresolved.
    ///
    /// # Errors
    ///
    /// Usage errors and [`DecodeError::IntegerOverflow`].
    pub fn symbol_id(&self) -> Result<usize, DecodeError> {
        let body = self.body(IonType::Symbol)?;
        let position = self.position();
        decode_uint(body)
            .ok()
            .and_then(|sid| usize::try_from(sid).ok())
            .ok_or(DecodeError::IntegerOverflow { position })
    }

    /// # Errors
    ///
    /// As for [`symbol_id`](Self::symbol_id), plus unknown or invalidated
    /// symbol IDs. Resolution failures leave the reader usable.
    pub fn symbol_value(&self) -> Result<SymbolToken, DecodeError> {
        self.resolver.resolve(self.symbol_id()?)
    }

    /// The bytes of a clob or blob.
    ///
    /// # Errors
    ///
    /// Usage errors for anything but a non-null clob or blob.
    pub fn lob_value(&self) -> Result<&[u8], DecodeError> {
        match self.ion_type() {
            Some(IonType::Clob) => self.body(IonType::Clob),
            _ => self.body(IonType::Blob),
        }
    }

    // ── Symbol tables ───────────────────────────────────────────────────

    /// Snapshot of the current symbol table.
    #[must_use]
    pub fn symbol_table(&self) -> SymbolTable {
        self.resolver.current().clone()
    }

    /// The table installed since the previous call, if any.
    pub fn pop_passed_symbol_table(&mut self) -> Option<SymbolTable> {
        self.passed.take()
    }

    /// Treat local symbols as unknowable until the next version marker or
    /// replacing symbol table.
    pub fn invalidate_symbol_table(&mut self) {
        self.resolver.invalidate();
    }

    /// Version markers read so far.
    #[must_use]
    pub fn ivm_count(&self) -> usize {
        self.cursor.ivm_count()
    }

    // ── Transfer ────────────────────────────────────────────────────────

    /// Hand the current value's encoding to `sink` as it is.
    ///
    /// Returns `false`, leaving the value to be read normally, when it has
    /// annotations, is a struct field, or `sink` does not accept the
    /// current symbol table.
    ///
    /// # Errors
    ///
    /// [`DecodeError::NoCurrentValue`], or whatever `sink` fails with.
    pub fn transfer_current_value(&mut self, sink: &mut dyn ByteTransfer) -> Result<bool, DecodeError> {
        if self.ion_type().is_none() {
            return Err(DecodeError::NoCurrentValue);
        }
        if self.cursor.has_annotations()
            || self.cursor.field_sid().is_some()
            || !sink.accepts(self.resolver.current())
        {
            return Ok(false);
        }
        sink.transfer(self.cursor.encoded_value()?)?;
        Ok(true)
    }
}

impl<R> std::fmt::Debug for IncrementalReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncrementalReader")
            .field("resolver", &self.resolver)
            .field("filling", &self.filling)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}
