//! Low-level binary cursor.
//!
//! [`BinaryCursor`] walks a binary Ion stream one instruction at a time
//! and reports structural [`Event`]s. It never blocks: when the bytes an
//! instruction needs have not arrived it returns [`Event::NeedsData`] and
//! picks up where it stopped on the next call.
//!
//! ```text
//!            next_value()                 fill_value()
//!  ┌──────────┐ header parsed ┌───────────────┐ body buffered ┌────────────┐
//!  │ (start)  │──────────────▶│ StartScalar / │──────────────▶│ ValueReady │
//!  └──────────┘               │ StartContainer│               └────────────┘
//!       │ ▲                   └───────────────┘
//!       │ │ more bytes             │ step_into_container()
//!       ▼ │                        ▼
//!  ┌───────────┐           ┌──────────────────┐  next_value() at the end
//!  │ NeedsData │           │ NeedsInstruction │──────────────▶ EndContainer
//!  └───────────┘           └──────────────────┘
//! ```
//!
//! Every position the cursor reports is an absolute stream offset: the
//! number of bytes before it since the first byte the cursor ever saw.

use std::io::{self, Read};

use ion_types::IonType;
use ion_wire::varint::{MAX_VAR_INT_BYTES, decode_var_uint};
use ion_wire::version_marker::IVM_START;
use ion_wire::{IVM_SIZE, LengthCode, TypeCode, TypeDescriptor, VersionMarker, WireError};
use tracing::{debug, trace};

use crate::config::BufferLimits;
use crate::error::DecodeError;
use crate::pipe::{BytePipe, read_some};

/// Scratch size for discarding bytes that are skipped without buffering.
const SKIP_CHUNK: usize = 4096;

/// What the cursor reached, or what it is waiting for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    /// The current instruction needs bytes that have not arrived.
    NeedsData,
    /// A step or skip finished; the caller decides what comes next.
    NeedsInstruction,
    StartScalar,
    StartContainer,
    EndContainer,
    /// The current value, including any children, is fully buffered.
    ValueReady,
}

/// Half-open range of absolute stream offsets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Marker {
    pub start: usize,
    pub end: usize,
}

impl Marker {
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A top-level value that would not fit within the maximum buffer size.
///
/// `annotation_sids` and `ion_type` are `None` when the header itself was
/// too large to buffer; only the value's extent is known then.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OversizedValue {
    pub depth: usize,
    pub annotation_sids: Option<Vec<usize>>,
    pub ion_type: Option<IonType>,
    /// First byte of the value (its annotation wrapper, if any).
    pub start: usize,
    pub end: usize,
}

/// Observer for what the cursor passes over.
///
/// All methods default to doing nothing; `()` is the silent listener.
pub trait CursorListener {
    /// A version marker was consumed at `position`.
    fn on_ivm(&mut self, marker: VersionMarker, position: usize) {
        let _ = (marker, position);
    }

    /// `bytes` more bytes of the stream have been consumed.
    fn on_data(&mut self, bytes: usize) {
        let _ = bytes;
    }

    /// A value exceeded the maximum buffer size and is being skipped.
    fn on_oversized(&mut self, value: &OversizedValue) {
        let _ = value;
    }
}

impl CursorListener for () {}

#[derive(Clone, Debug)]
struct ValueHeader {
    start: usize,
    descriptor: TypeDescriptor,
    ion_type: IonType,
    field_sid: Option<usize>,
    annotations: Vec<usize>,
    body_start: usize,
    end: usize,
}

#[derive(Clone, Copy, Debug)]
struct Container {
    end: usize,
    is_struct: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pending {
    Ready,
    Fill(usize),
    Seek { target: usize, completes_unit: bool },
}

enum Header {
    Ivm(VersionMarker),
    NopPad { end: usize },
    Value(ValueHeader),
}

/// Why header parsing stopped short of a [`Header`].
enum Interrupt {
    Incomplete,
    Oversized(OversizedValue),
    Fatal(DecodeError),
}

impl From<DecodeError> for Interrupt {
    fn from(error: DecodeError) -> Self {
        Self::Fatal(error)
    }
}

impl From<WireError> for Interrupt {
    fn from(error: WireError) -> Self {
        Self::Fatal(error.into())
    }
}

/// What is known about a header while it is still being parsed.
#[derive(Default)]
struct Partial {
    annotations: Option<Vec<usize>>,
    ion_type: Option<IonType>,
    end: Option<usize>,
}

/// Pull-based binary cursor over a byte source.
///
/// The cursor reads from `source` into its own [`BytePipe`], only as far
/// as the current instruction needs, so a source that is shared with
/// something else (a socket, a lookahead buffer) is never read ahead of the value
/// being parsed.
///
/// ```text
///   source ──read──▶ buffer [ retained │ current value │ ... ]
///                              ▲ released once the cursor moves past
/// ```
///
/// # Example
///
/// ```rust
/// use ion_decoder::{BinaryCursor, Event};
///
/// // IVM, then the struct {$4: 1}
/// let bytes = [0xE0, 0x01, 0x00, 0xEA, 0xD3, 0x84, 0x21, 0x01];
/// let mut cursor = BinaryCursor::from_bytes(&bytes);
/// assert_eq!(cursor.next_value().unwrap(), Event::StartContainer);
/// cursor.step_into_container().unwrap();
/// assert_eq!(cursor.next_value().unwrap(), Event::StartScalar);
/// assert_eq!(cursor.field_sid(), Some(4));
/// assert_eq!(cursor.value_bytes().unwrap(), &[0x01]);
/// assert_eq!(cursor.next_value().unwrap(), Event::EndContainer);
/// ```
pub struct BinaryCursor<R = BytePipe, L = ()> {
    source: R,
    buffer: BytePipe,
    listener: L,
    maximum: Option<usize>,
    /// Bytes discarded straight from the source without being buffered.
    skipped: usize,
    position: usize,
    /// Earliest position the buffer must keep.
    retain: usize,
    containers: Vec<Container>,
    value: Option<ValueHeader>,
    event: Event,
    pending: Pending,
    ivm_count: usize,
    unit_start: usize,
    auto_unit: bool,
    reported: usize,
    skipping: bool,
}

impl BinaryCursor<io::Empty, ()> {
    /// A cursor over an in-memory stream.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::from_bytes_range(bytes, 0, bytes.len())
    }

    /// A cursor over `bytes[start..end]`. Offsets are counted in `bytes`,
    /// so the first value is at `start`.
    #[must_use]
    pub fn from_bytes_range(bytes: &[u8], start: usize, end: usize) -> Self {
        BinaryCursor::from_bytes_range_with(bytes, start, end, ())
    }
}

impl<L: CursorListener> BinaryCursor<io::Empty, L> {
    /// As [`BinaryCursor::from_bytes_range`], reporting to `listener`.
    pub fn from_bytes_range_with(bytes: &[u8], start: usize, end: usize, listener: L) -> Self {
        let end = end.min(bytes.len());
        let start = start.min(end);
        let mut cursor =
            Self::with_buffer(io::empty(), BytePipe::from_bytes(&bytes[start..end]), listener);
        cursor.skipped = start;
        cursor.position = start;
        cursor.retain = start;
        cursor.unit_start = start;
        cursor.reported = start;
        cursor
    }
}

impl<L: CursorListener> BinaryCursor<BytePipe, L> {
    /// Push bytes into the source pipe.
    ///
    /// # Errors
    ///
    /// Capacity errors from the source pipe.
    pub fn receive(&mut self, bytes: &[u8]) -> Result<(), DecodeError> {
        self.source.receive(bytes)
    }
}

impl<R: Read, L: CursorListener> BinaryCursor<R, L> {
    /// A cursor reading from `source`, buffering at most `limits.maximum`
    /// bytes of one top-level unit.
    ///
    /// # Errors
    ///
    /// [`DecodeError::InvalidConfiguration`] for a zero initial size.
    pub fn new(source: R, limits: BufferLimits, listener: L) -> Result<Self, DecodeError> {
        let buffer = BytePipe::new(limits.initial, limits.maximum)?;
        Ok(Self::with_buffer(source, buffer, listener))
    }

    fn with_buffer(source: R, buffer: BytePipe, listener: L) -> Self {
        Self {
            source,
            maximum: buffer.maximum(),
            buffer,
            listener,
            skipped: 0,
            position: 0,
            retain: 0,
            containers: Vec::new(),
            value: None,
            event: Event::NeedsInstruction,
            pending: Pending::Ready,
            ivm_count: 0,
            unit_start: 0,
            auto_unit: true,
            reported: 0,
            skipping: false,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────────

    /// The byte source the cursor pulls from.
    pub fn source(&self) -> &R {
        &self.source
    }

    /// Mutable access to the source, e.g. to push more bytes into a pipe.
    /// Bytes already pulled into the cursor's buffer are not affected.
    pub fn source_mut(&mut self) -> &mut R {
        &mut self.source
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    /// Owners drain what their listener recorded after each instruction.
    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    /// The event returned by the most recent instruction.
    pub fn event(&self) -> Event {
        self.event
    }

    /// Number of containers stepped into; 0 at the top level.
    pub fn depth(&self) -> usize {
        self.containers.len()
    }

    /// Type of the current value, known as soon as its header is parsed.
    /// `None` between values.
    ///
    /// | Type descriptor | `ion_type()`           | `is_null()` |
    /// |-----------------|------------------------|-------------|
    /// | `0x0F`          | `Some(Null)`           | `true`      |
    /// | `0x2F`          | `Some(Int)`            | `true`      |
    /// | `0x21 0x05`     | `Some(Int)`            | `false`     |
    /// | `0xE_` wrapper  | of the wrapped value   | as wrapped  |
    pub fn ion_type(&self) -> Option<IonType> {
        self.value.as_ref().map(|v| v.ion_type)
    }

    /// Whether the current value is a typed null (`null.int`, ...).
    pub fn is_null(&self) -> bool {
        self.value.as_ref().is_some_and(|v| v.descriptor.is_null())
    }

    /// The current value's type descriptor, after any annotation wrapper.
    pub fn type_descriptor(&self) -> Option<TypeDescriptor> {
        self.value.as_ref().map(|v| v.descriptor)
    }

    /// The current value's field name SID. Only set inside a struct.
    pub fn field_sid(&self) -> Option<usize> {
        self.value.as_ref().and_then(|v| v.field_sid)
    }

    pub fn has_annotations(&self) -> bool {
        self.value.as_ref().is_some_and(|v| !v.annotations.is_empty())
    }

    /// Annotation SIDs of the current value, outermost first; empty when
    /// there is no current value.
    pub fn annotation_sids(&self) -> &[usize] {
        self.value.as_ref().map_or(&[], |v| v.annotations.as_slice())
    }

    /// The current value's body.
    pub fn value_marker(&self) -> Option<Marker> {
        self.value.as_ref().map(|v| Marker {
            start: v.body_start,
            end: v.end,
        })
    }

    /// First byte of the current value: its field name, annotation
    /// wrapper or type descriptor, whichever comes first.
    pub fn value_start(&self) -> Option<usize> {
        self.value.as_ref().map(|v| v.start)
    }

    /// The current value including its field name and annotations.
    pub fn value_span(&self) -> Option<Marker> {
        self.value.as_ref().map(|v| Marker {
            start: v.start,
            end: v.end,
        })
    }

    /// The current value's body bytes.
    ///
    /// # Errors
    ///
    /// [`DecodeError::NoCurrentValue`] or [`DecodeError::ValueNotBuffered`].
    pub fn value_bytes(&self) -> Result<&[u8], DecodeError> {
        let marker = self.value_marker().ok_or(DecodeError::NoCurrentValue)?;
        self.bytes_at(marker.start, marker.end)
            .ok_or(DecodeError::ValueNotBuffered)
    }

    /// The complete encoding of the current value, from
    /// [`value_start`](Self::value_start) to its end.
    ///
    /// # Errors
    ///
    /// As for [`value_bytes`](Self::value_bytes).
    pub fn encoded_value(&self) -> Result<&[u8], DecodeError> {
        let span = self.value_span().ok_or(DecodeError::NoCurrentValue)?;
        self.bytes_at(span.start, span.end)
            .ok_or(DecodeError::ValueNotBuffered)
    }

    /// Bytes of the stream consumed so far.
    pub fn total_offset(&self) -> usize {
        self.position
    }

    /// Version markers consumed so far.
    pub fn ivm_count(&self) -> usize {
        self.ivm_count
    }

    /// Whether an oversized value is still being discarded.
    pub fn is_skipping(&self) -> bool {
        self.skipping
    }

    /// Whether the stream stopped partway through something: a header, a
    /// value body, a container or a skip.
    pub fn is_value_incomplete(&self) -> bool {
        let have = self.buffered_end();
        let waiting = match self.pending {
            Pending::Ready => false,
            Pending::Fill(end) => end > have,
            Pending::Seek { target, .. } => target > have,
        };
        waiting
            || self.value.as_ref().is_some_and(|v| v.end > have)
            || self.containers.iter().any(|c| c.end > have)
            || (self.value.is_none() && have > self.position)
    }

    /// Start of the top-level unit the maximum buffer size applies to.
    pub fn unit_start(&self) -> usize {
        self.unit_start
    }

    /// Move the start of the current unit.
    pub fn set_unit_start(&mut self, position: usize) {
        self.unit_start = position;
    }

    /// Whether each completed top-level value starts a new unit. On by
    /// default; an owner that groups values into units itself turns it
    /// off and calls [`set_unit_start`](Self::set_unit_start).
    pub fn set_auto_unit(&mut self, auto: bool) {
        self.auto_unit = auto;
    }

    fn origin(&self) -> usize {
        self.buffer.shifted() + self.skipped
    }

    fn buffered_end(&self) -> usize {
        self.origin() + self.buffer.write_index()
    }

    fn byte_at(&self, position: usize) -> Option<u8> {
        position
            .checked_sub(self.origin())
            .and_then(|index| self.buffer.get(index))
    }

    fn bytes_at(&self, start: usize, end: usize) -> Option<&[u8]> {
        let origin = self.origin();
        let start = start.checked_sub(origin)?;
        self.buffer.slice(start, end.checked_sub(origin)?)
    }

    fn emit(&mut self, event: Event) -> Event {
        trace!(?event, position = self.position, depth = self.containers.len(), "cursor event");
        self.event = event;
        event
    }

    fn report(&mut self, upto: usize) {
        if upto > self.reported {
            self.listener.on_data(upto - self.reported);
            self.reported = upto;
        }
    }

    // ── Instructions ────────────────────────────────────────────────────

    /// Advance to the next value at the current depth.
    ///
    /// The current value is skipped, NOP pads are passed over and, at the
    /// top level, version markers are consumed and reported. Returns
    /// `StartScalar` or `StartContainer` as soon as the next header is
    /// parsed, even if its body has not arrived. A top-level header too
    /// large for the maximum buffer size is reported to the listener and
    /// skipped, and the call returns `NeedsInstruction`.
    ///
    /// # Errors
    ///
    /// Malformed-data errors for invalid headers, capacity errors when a
    /// header does not fit in the maximum buffer size, and I/O errors from
    /// the source.
    pub fn next_value(&mut self) -> Result<Event, DecodeError> {
        if let Pending::Fill(_) = self.pending {
            self.pending = Pending::Ready;
        }
        if !self.continue_seek()? {
            return Ok(self.emit(Event::NeedsData));
        }
        if let Some(value) = self.value.take() {
            self.begin_seek(value.end, self.containers.is_empty());
            if !self.continue_seek()? {
                return Ok(self.emit(Event::NeedsData));
            }
        }

        loop {
            if let Some(container) = self.containers.last()
                && self.position >= container.end
            {
                return Ok(self.emit(Event::EndContainer));
            }

            self.retain = self.position;
            let header = match self.read_header() {
                Ok(header) => header,
                Err(Interrupt::Incomplete) => return Ok(self.emit(Event::NeedsData)),
                Err(Interrupt::Fatal(error)) => return Err(error),
                Err(Interrupt::Oversized(value)) => {
                    self.skip_oversized(&value);
                    self.continue_seek()?;
                    return Ok(self.emit(Event::NeedsInstruction));
                }
            };

            match header {
                Header::Ivm(marker) => {
                    let start = self.position;
                    self.position += IVM_SIZE;
                    self.ivm_count += 1;
                    debug!(position = start, "version marker");
                    self.listener.on_ivm(marker, start);
                    self.report(self.position);
                }
                Header::NopPad { end } => {
                    trace!(start = self.position, end, "nop pad");
                    self.begin_seek(end, false);
                    if !self.continue_seek()? {
                        return Ok(self.emit(Event::NeedsData));
                    }
                }
                Header::Value(value) => {
                    let event = if value.descriptor.is_container() && !value.descriptor.is_null() {
                        Event::StartContainer
                    } else {
                        Event::StartScalar
                    };
                    self.value = Some(value);
                    return Ok(self.emit(event));
                }
            }
        }
    }

    /// Enter the current container.
    ///
    /// # Errors
    ///
    /// [`DecodeError::NoCurrentValue`], or [`DecodeError::StepIntoScalar`]
    /// for scalars and null containers.
    pub fn step_into_container(&mut self) -> Result<Event, DecodeError> {
        let Some(value) = &self.value else {
            return Err(DecodeError::NoCurrentValue);
        };
        if !value.descriptor.is_container() || value.descriptor.is_null() {
            return Err(DecodeError::StepIntoScalar);
        }
        let container = Container {
            end: value.end,
            is_struct: value.ion_type == IonType::Struct,
        };
        self.position = value.body_start;
        self.value = None;
        self.pending = Pending::Ready;
        self.containers.push(container);
        Ok(self.emit(Event::NeedsInstruction))
    }

    /// Leave the current container, skipping whatever is left of it.
    ///
    /// # Errors
    ///
    /// [`DecodeError::StepOutAtTopLevel`] at depth 0, or I/O errors while
    /// discarding the remainder.
    pub fn step_out_of_container(&mut self) -> Result<Event, DecodeError> {
        let Some(container) = self.containers.pop() else {
            return Err(DecodeError::StepOutAtTopLevel);
        };
        self.value = None;
        self.begin_seek(container.end, self.containers.is_empty());
        let event = if self.continue_seek()? {
            Event::NeedsInstruction
        } else {
            Event::NeedsData
        };
        Ok(self.emit(event))
    }

    /// Buffer the whole current value, children included.
    ///
    /// At the top level with a maximum buffer size, a value whose unit
    /// would exceed it is reported to the listener and skipped instead;
    /// this returns `NeedsInstruction` and the value is gone.
    ///
    /// # Errors
    ///
    /// [`DecodeError::NoCurrentValue`] without a current value, capacity
    /// errors below the top level, and I/O errors.
    pub fn fill_value(&mut self) -> Result<Event, DecodeError> {
        if let Pending::Seek { .. } = self.pending {
            let event = if self.continue_seek()? {
                Event::NeedsInstruction
            } else {
                Event::NeedsData
            };
            return Ok(self.emit(event));
        }
        let Some(value) = &self.value else {
            return Err(DecodeError::NoCurrentValue);
        };
        let end = value.end;

        if self.containers.is_empty()
            && let Some(maximum) = self.maximum
            && end - self.unit_start > maximum
        {
            let oversized = OversizedValue {
                depth: 0,
                annotation_sids: Some(value.annotations.clone()),
                ion_type: Some(value.ion_type),
                start: value.start,
                end,
            };
            self.skip_oversized(&oversized);
            self.continue_seek()?;
            return Ok(self.emit(Event::NeedsInstruction));
        }

        self.pending = Pending::Fill(end);
        if self.fill_to(end)? {
            self.pending = Pending::Ready;
            Ok(self.emit(Event::ValueReady))
        } else {
            Ok(self.emit(Event::NeedsData))
        }
    }

    /// Carry on with an unfinished skip or fill without starting anything
    /// new. Returns the event that instruction would have returned.
    ///
    /// # Errors
    ///
    /// As for the interrupted instruction.
    pub fn resume(&mut self) -> Result<Event, DecodeError> {
        match self.pending {
            Pending::Ready => Ok(self.event),
            Pending::Seek { .. } => {
                let event = if self.continue_seek()? {
                    Event::NeedsInstruction
                } else {
                    Event::NeedsData
                };
                Ok(self.emit(event))
            }
            Pending::Fill(end) => {
                if self.fill_to(end)? {
                    self.pending = Pending::Ready;
                    Ok(self.emit(Event::ValueReady))
                } else {
                    Ok(self.emit(Event::NeedsData))
                }
            }
        }
    }

    // ── Buffering ───────────────────────────────────────────────────────

    fn release(&mut self) -> Result<(), DecodeError> {
        let index = self.retain.saturating_sub(self.origin());
        self.buffer.seek_to(index.min(self.buffer.write_index()))
    }

    /// Make sure every byte before `end` is buffered.
    fn fill_to(&mut self, end: usize) -> Result<bool, DecodeError> {
        let have = self.buffered_end();
        if end <= have {
            return Ok(true);
        }
        if let Some(maximum) = self.maximum {
            let required = end - self.retain;
            if required > maximum {
                return Err(DecodeError::BufferCapacityExceeded { required, maximum });
            }
        }
        self.release()?;

        let mut missing = end - have;
        while missing > 0 {
            let n = self.buffer.receive_from(&mut self.source, missing)?;
            if n == 0 {
                return Ok(false);
            }
            missing -= n;
        }
        Ok(true)
    }

    fn begin_seek(&mut self, target: usize, completes_unit: bool) {
        self.position = target;
        self.pending = Pending::Seek {
            target,
            completes_unit,
        };
    }

    /// Work towards a pending seek. Bytes beyond the buffer are read and
    /// thrown away without growing it.
    fn continue_seek(&mut self) -> Result<bool, DecodeError> {
        let Pending::Seek {
            target,
            completes_unit,
        } = self.pending
        else {
            return Ok(true);
        };

        loop {
            let have = self.buffered_end();
            if target <= have {
                break;
            }
            self.retain = have;
            self.release()?;
            self.buffer.compact();

            let mut scratch = [0u8; SKIP_CHUNK];
            let want = (target - have).min(SKIP_CHUNK);
            let n = read_some(&mut self.source, &mut scratch[..want])?;
            if n == 0 {
                if self.containers.is_empty() {
                    self.report(have);
                }
                return Ok(false);
            }
            self.skipped += n;
        }

        self.retain = target;
        self.release()?;
        self.pending = Pending::Ready;
        if self.containers.is_empty() {
            self.report(target);
            if completes_unit {
                self.skipping = false;
                if self.auto_unit {
                    self.unit_start = target;
                }
            }
        }
        Ok(true)
    }

    fn skip_oversized(&mut self, value: &OversizedValue) {
        debug!(
            start = value.start,
            end = value.end,
            maximum = ?self.maximum,
            "skipping oversized value"
        );
        self.listener.on_oversized(value);
        self.value = None;
        self.skipping = true;
        self.begin_seek(value.end, true);
    }

    // ── Header parsing ──────────────────────────────────────────────────

    /// Parse the header at the current position.
    ///
    /// Parsing starts over on every attempt; the bytes read so far stay
    /// buffered because `retain` is the header's first byte.
    fn read_header(&mut self) -> Result<Header, Interrupt> {
        let start = self.position;
        let parent = self.containers.last().copied();
        let mut partial = Partial::default();
        let mut at = start;

        let mut field_sid = None;
        if parent.is_some_and(|c| c.is_struct) {
            let (sid, len) = self.fetch_var_uint(at, &partial)?;
            field_sid = Some(sid);
            at += len;
        }

        let byte = self.fetch(at, &partial)?;
        if byte == IVM_START {
            if parent.is_some() {
                return Err(DecodeError::IvmBelowTopLevel { position: at }.into());
            }
            if !self.fill_to(start + IVM_SIZE)? {
                return Err(Interrupt::Incomplete);
            }
            let bytes = self
                .bytes_at(start, start + IVM_SIZE)
                .ok_or(Interrupt::Incomplete)?;
            return Ok(Header::Ivm(VersionMarker::read_from(bytes)?));
        }

        let mut descriptor = descriptor_at(byte, at)?;
        at += 1;

        if descriptor.is_nop_pad() {
            let (len, body_start) = self.fetch_length(descriptor, at, &partial)?;
            let end = checked_end(body_start, len)?;
            if parent.is_some_and(|c| end > c.end) {
                return Err(DecodeError::NopPadOverflow { position: start }.into());
            }
            return Ok(Header::NopPad { end });
        }

        let mut annotations = Vec::new();
        let mut wrapper_end = None;
        if descriptor.is_annotation_wrapper() {
            let wrapper_at = at - 1;
            let (len, after_len) = self.fetch_length(descriptor, at, &partial)?;
            let end = checked_end(after_len, len)?;
            check_parent(parent, start, end)?;
            partial.end = Some(end);

            let (list_len, n) = self.fetch_var_uint(after_len, &partial)?;
            let list_start = after_len + n;
            let list_end = checked_end(list_start, list_len)?;
            if list_len == 0 || list_end >= end {
                return Err(DecodeError::EmptyAnnotationWrapper { position: wrapper_at }.into());
            }
            let mut p = list_start;
            while p < list_end {
                let (sid, n) = self.fetch_var_uint(p, &partial)?;
                annotations.push(sid);
                p += n;
            }
            if p != list_end {
                return Err(DecodeError::AnnotationWrapperLength { position: wrapper_at }.into());
            }
            partial.annotations = Some(annotations.clone());

            let byte = self.fetch(list_end, &partial)?;
            if byte >> 4 == TypeCode::Annotation.nibble() {
                return Err(DecodeError::NestedAnnotationWrapper { position: list_end }.into());
            }
            descriptor = descriptor_at(byte, list_end)?;
            if descriptor.is_nop_pad() {
                return Err(DecodeError::NopPadInAnnotationWrapper { position: list_end }.into());
            }
            at = list_end + 1;
            wrapper_end = Some(end);
        }

        let ion_type = IonType::from_type_code(descriptor.code).ok_or(
            DecodeError::InvalidTypeDescriptor {
                byte: descriptor.raw(),
                position: at - 1,
            },
        )?;
        partial.ion_type = Some(ion_type);

        let (len, body_start) = self.fetch_length(descriptor, at, &partial)?;
        let end = checked_end(body_start, len)?;
        match wrapper_end {
            Some(wrapper_end) if end != wrapper_end => {
                return Err(DecodeError::AnnotationWrapperLength { position: start }.into());
            }
            Some(_) => {}
            None => check_parent(parent, start, end)?,
        }
        if descriptor.is_ordered_struct() && len == 0 {
            return Err(DecodeError::EmptyOrderedStruct { position: at - 1 }.into());
        }

        Ok(Header::Value(ValueHeader {
            start,
            descriptor,
            ion_type,
            field_sid,
            annotations,
            body_start,
            end,
        }))
    }

    /// One header byte, pulling it from the source if necessary.
    fn fetch(&mut self, at: usize, partial: &Partial) -> Result<u8, Interrupt> {
        if let Some(byte) = self.byte_at(at) {
            return Ok(byte);
        }
        if self.containers.is_empty()
            && let (Some(maximum), Some(end)) = (self.maximum, partial.end)
            && at + 1 - self.retain > maximum
        {
            // The header alone overflows the buffer, but its extent is known.
            return Err(Interrupt::Oversized(OversizedValue {
                depth: 0,
                annotation_sids: partial.annotations.clone(),
                ion_type: partial.ion_type,
                start: self.retain,
                end,
            }));
        }
        if !self.fill_to(at + 1)? {
            return Err(Interrupt::Incomplete);
        }
        self.byte_at(at).ok_or(Interrupt::Incomplete)
    }

    /// A VarUInt at `at`: its value and encoded length.
    fn fetch_var_uint(&mut self, at: usize, partial: &Partial) -> Result<(usize, usize), Interrupt> {
        let mut len = 0;
        loop {
            let byte = self.fetch(at + len, partial)?;
            len += 1;
            if byte & 0x80 != 0 {
                break;
            }
            if len == MAX_VAR_INT_BYTES {
                return Err(WireError::VarIntTooLong.into());
            }
        }
        let bytes = self.bytes_at(at, at + len).ok_or(Interrupt::Incomplete)?;
        let (value, _) = decode_var_uint(bytes)?;
        let value = usize::try_from(value).map_err(|_| WireError::VarIntTooLong)?;
        Ok((value, len))
    }

    /// The body length of a descriptor and where its body starts.
    fn fetch_length(
        &mut self,
        descriptor: TypeDescriptor,
        at: usize,
        partial: &Partial,
    ) -> Result<(usize, usize), Interrupt> {
        match descriptor.length {
            LengthCode::Literal(n) => Ok((usize::from(n), at)),
            LengthCode::Null => Ok((0, at)),
            LengthCode::VarUInt => {
                let (len, n) = self.fetch_var_uint(at, partial)?;
                Ok((len, at + n))
            }
        }
    }
}

fn descriptor_at(byte: u8, position: usize) -> Result<TypeDescriptor, Interrupt> {
    TypeDescriptor::from_byte(byte)
        .map_err(|_| DecodeError::InvalidTypeDescriptor { byte, position }.into())
}

fn checked_end(start: usize, len: usize) -> Result<usize, Interrupt> {
    start
        .checked_add(len)
        .ok_or_else(|| WireError::VarIntTooLong.into())
}

fn check_parent(parent: Option<Container>, start: usize, end: usize) -> Result<(), Interrupt> {
    match parent {
        Some(container) if end > container.end => Err(DecodeError::ContainerOverflow {
            position: start,
            end,
            limit: container.end,
        }
        .into()),
        _ => Ok(()),
    }
}
