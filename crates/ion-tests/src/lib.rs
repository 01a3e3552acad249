//! Shared harness for the integration tests and benches.
//!
//! Values are modelled as a small [`Element`] tree that can be written
//! with [`BinaryWriter`] and read back through an [`IncrementalReader`],
//! either from one buffer or pushed in chunks.

#![warn(clippy::pedantic)]

use std::fmt::Write as _;
use std::io::Read;
use std::sync::{Arc, Mutex, PoisonError};

use ion_decoder::{
    BufferConfiguration, BytePipe, ByteTransfer, DecodeError, IncrementalReader, LookaheadBuffer,
    ReaderOptions,
};
use ion_encoder::BinaryWriter;
use ion_types::{Decimal, IonType, MemoryCatalog, SymbolTable, Timestamp};

// ── Element model ─────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null(IonType),
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Timestamp(Timestamp),
    String(String),
    Symbol(usize),
    Clob(Vec<u8>),
    Blob(Vec<u8>),
    List(Vec<Element>),
    Sexp(Vec<Element>),
    Struct(Vec<Element>),
}

/// A value with its field name and annotations, as symbol IDs.
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    pub field: Option<usize>,
    pub annotations: Vec<usize>,
    pub value: Value,
}

impl Element {
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self {
            field: None,
            annotations: Vec::new(),
            value,
        }
    }
}

/// Encode `elements` as a stream, with a leading version marker.
///
/// # Panics
///
/// If a struct member has no field name.
#[must_use]
pub fn encode(elements: &[Element]) -> Vec<u8> {
    let mut writer = BinaryWriter::new();
    writer.ivm();
    for element in elements {
        write_element(&mut writer, element);
    }
    writer.finish().unwrap()
}

pub fn write_element(writer: &mut BinaryWriter, element: &Element) {
    if let Some(field) = element.field {
        writer.field(field);
    }
    for &sid in &element.annotations {
        writer.annotate(sid);
    }
    match &element.value {
        Value::Null(ion_type) => writer.null(*ion_type),
        Value::Bool(b) => writer.bool(*b),
        Value::Int(i) => writer.int(*i),
        Value::Float(f) => writer.float64(*f),
        Value::Decimal(d) => writer.decimal(d),
        Value::Timestamp(t) => writer.timestamp(t),
        Value::String(s) => writer.string(s),
        Value::Symbol(sid) => writer.symbol_id(*sid),
        Value::Clob(bytes) => writer.clob(bytes),
        Value::Blob(bytes) => writer.blob(bytes),
        Value::List(children) | Value::Sexp(children) | Value::Struct(children) => {
            match &element.value {
                Value::List(_) => writer.start_list(),
                Value::Sexp(_) => writer.start_sexp(),
                _ => writer.start_struct(),
            };
            for child in children {
                write_element(writer, child);
            }
            writer.end_container()
        }
    };
}

// ── Reading ───────────────────────────────────────────────────────────────────

/// Read the value the reader is positioned on, children included.
///
/// # Errors
///
/// Whatever the reader reports.
pub fn read_current<R: Read>(reader: &mut IncrementalReader<R>, ion_type: IonType) -> Result<Element, DecodeError> {
    let field = reader.field_name()?.map(|t| t.sid);
    let annotations = reader.annotations()?.into_iter().map(|t| t.sid).collect();
    let value = if reader.is_null() {
        Value::Null(ion_type)
    } else {
        match ion_type {
            IonType::Null => Value::Null(IonType::Null),
            IonType::Bool => Value::Bool(reader.bool_value()?),
            IonType::Int => Value::Int(reader.int_value()?),
            IonType::Float => Value::Float(reader.float_value()?),
            IonType::Decimal => Value::Decimal(reader.decimal_value()?),
            IonType::Timestamp => Value::Timestamp(reader.timestamp_value()?),
            IonType::String => Value::String(reader.string_value()?.to_owned()),
            IonType::Symbol => Value::Symbol(reader.symbol_id()?),
            IonType::Clob => Value::Clob(reader.lob_value()?.to_vec()),
            IonType::Blob => Value::Blob(reader.lob_value()?.to_vec()),
            IonType::List | IonType::Sexp | IonType::Struct => {
                let mut children = Vec::new();
                reader.step_in()?;
                while let Some(child) = reader.next()? {
                    children.push(read_current(reader, child)?);
                }
                reader.step_out()?;
                match ion_type {
                    IonType::List => Value::List(children),
                    IonType::Sexp => Value::Sexp(children),
                    _ => Value::Struct(children),
                }
            }
        }
    };
    Ok(Element {
        field,
        annotations,
        value,
    })
}

/// Read every top-level value available right now.
///
/// # Errors
///
/// Whatever the reader reports.
pub fn drain<R: Read>(reader: &mut IncrementalReader<R>, out: &mut Vec<Element>) -> Result<(), DecodeError> {
    while let Some(ion_type) = reader.next()? {
        out.push(read_current(reader, ion_type)?);
    }
    Ok(())
}

/// Decode a complete in-memory stream.
///
/// # Errors
///
/// Whatever the reader reports, including an unexpected end of stream.
pub fn decode_whole(bytes: &[u8]) -> Result<Vec<Element>, DecodeError> {
    let mut reader = IncrementalReader::from_bytes(bytes);
    let mut out = Vec::new();
    drain(&mut reader, &mut out)?;
    reader.end_stream()?;
    Ok(out)
}

/// Decode a stream pushed in chunks, cycling through `sizes` (zero sizes
/// count as one byte).
///
/// # Errors
///
/// Whatever the reader reports, including an unexpected end of stream.
pub fn decode_chunked(bytes: &[u8], sizes: &[usize], options: ReaderOptions) -> Result<Vec<Element>, DecodeError> {
    let mut reader = IncrementalReader::push(options)?;
    let mut out = Vec::new();
    for chunk in chunks(bytes, sizes) {
        reader.receive(chunk)?;
        drain(&mut reader, &mut out)?;
    }
    drain(&mut reader, &mut out)?;
    reader.end_stream()?;
    Ok(out)
}

/// Decode a stream pushed in chunks into a [`LookaheadBuffer`], reading
/// each unit it completes.
///
/// # Errors
///
/// Whatever the buffer or the reader reports, including an unexpected end
/// of stream.
pub fn decode_through_lookahead(
    bytes: &[u8],
    sizes: &[usize],
    config: BufferConfiguration,
) -> Result<Vec<Element>, DecodeError> {
    let lookahead = LookaheadBuffer::new(BytePipe::unbounded(16), config)?;
    let mut reader = IncrementalReader::with_lookahead(lookahead, Arc::new(MemoryCatalog::new()))?;
    let mut out = Vec::new();
    for chunk in chunks(bytes, sizes) {
        reader.lookahead_mut().source_mut().receive(chunk)?;
        loop {
            reader.fill_input()?;
            if reader.lookahead().more_data_required() {
                break;
            }
            drain(&mut reader, &mut out)?;
        }
    }
    reader.lookahead_mut().end_stream()?;
    Ok(out)
}

/// Split `bytes` cycling through `sizes`; zero sizes count as one byte.
fn chunks<'a>(bytes: &'a [u8], sizes: &'a [usize]) -> impl Iterator<Item = &'a [u8]> + 'a {
    let mut sizes = sizes.iter().copied().cycle();
    let mut rest = bytes;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let size = sizes.next().unwrap_or(1).clamp(1, rest.len());
        let (chunk, tail) = rest.split_at(size);
        rest = tail;
        Some(chunk)
    })
}

// ── Event trace ───────────────────────────────────────────────────────────────

/// Render every value in `bytes` one per line, indented by depth, with
/// field names and annotations resolved where their text is known.
///
/// # Errors
///
/// Whatever the reader reports.
pub fn render_trace(bytes: &[u8]) -> Result<String, DecodeError> {
    let mut reader = IncrementalReader::from_bytes(bytes);
    let mut out = String::new();
    render_level(&mut reader, &mut out)?;
    reader.end_stream()?;
    Ok(out)
}

fn render_level<R: Read>(reader: &mut IncrementalReader<R>, out: &mut String) -> Result<(), DecodeError> {
    while let Some(ion_type) = reader.next()? {
        let indent = "  ".repeat(reader.depth());
        let mut line = indent;
        if let Some(field) = reader.field_name()? {
            line.push_str(&symbol_text(field.text.as_deref(), field.sid));
            line.push_str(": ");
        }
        for annotation in reader.annotations()? {
            line.push_str(&symbol_text(annotation.text.as_deref(), annotation.sid));
            line.push_str("::");
        }
        if reader.is_null() {
            let _ = writeln!(out, "{line}null.{}", ion_type.name());
            continue;
        }
        let value = match ion_type {
            IonType::Bool => reader.bool_value()?.to_string(),
            IonType::Int => reader.int_value()?.to_string(),
            IonType::Float => format!("{:e}", reader.float_value()?),
            IonType::Decimal => {
                let d = reader.decimal_value()?;
                format!("{}d{}", d.coefficient, d.exponent)
            }
            IonType::Timestamp => {
                let t = reader.timestamp_value()?;
                format!("{:04}-{:02}-{:02} {:?}", t.year, t.month, t.day, t.precision)
            }
            IonType::String => format!("{:?}", reader.string_value()?),
            IonType::Symbol => {
                let token = reader.symbol_value()?;
                symbol_text(token.text.as_deref(), token.sid)
            }
            IonType::Clob | IonType::Blob => hex::encode(reader.lob_value()?),
            IonType::List | IonType::Sexp | IonType::Struct => {
                let _ = writeln!(out, "{line}{}", ion_type.name());
                reader.step_in()?;
                render_level(reader, out)?;
                reader.step_out()?;
                continue;
            }
            IonType::Null => String::new(),
        };
        let _ = writeln!(out, "{line}{} {value}", ion_type.name());
    }
    Ok(())
}

fn symbol_text(text: Option<&str>, sid: usize) -> String {
    text.map_or_else(|| format!("${sid}"), str::to_owned)
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// What the buffer handlers have reported so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HandlerCounts {
    pub data: usize,
    pub oversized_values: usize,
    pub oversized_symbol_tables: usize,
}

/// Handlers that tally into shared [`HandlerCounts`].
#[derive(Clone, Debug, Default)]
pub struct HandlerLog(Arc<Mutex<HandlerCounts>>);

impl HandlerLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A bounded configuration reporting to this log.
    ///
    /// # Errors
    ///
    /// [`DecodeError::InvalidConfiguration`] for a maximum below the minimum.
    pub fn config(&self, initial: usize, maximum: usize) -> Result<BufferConfiguration, DecodeError> {
        let (data, value, table) = (self.clone(), self.clone(), self.clone());
        BufferConfiguration::builder()
            .initial_buffer_size(initial)
            .maximum_buffer_size(maximum)
            .on_data(move |n| data.update(|c| c.data += n))
            .on_oversized_value(move || value.update(|c| c.oversized_values += 1))
            .on_oversized_symbol_table(move || table.update(|c| c.oversized_symbol_tables += 1))
            .build()
    }

    #[must_use]
    pub fn counts(&self) -> HandlerCounts {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, f: impl FnOnce(&mut HandlerCounts)) {
        f(&mut self.0.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

// ── Transfer ──────────────────────────────────────────────────────────────────

/// Copies transferred values into a [`BinaryWriter`].
///
/// The writer has no local symbols of its own, so only values encoded
/// against the system table are taken.
pub struct WriterTransfer<'a>(pub &'a mut BinaryWriter);

impl ByteTransfer for WriterTransfer<'_> {
    fn accepts(&self, table: &SymbolTable) -> bool {
        table.is_system()
    }

    fn transfer(&mut self, encoded: &[u8]) -> Result<(), DecodeError> {
        self.0.write_raw(encoded);
        Ok(())
    }
}
