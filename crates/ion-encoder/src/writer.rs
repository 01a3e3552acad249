use ion_types::{Decimal, IonType, Timestamp};
use ion_wire::{IVM_SIZE, SignedMagnitude, TypeCode, VersionMarker};

use crate::error::EncodeError;
use crate::table_decl::LocalTableDecl;
use crate::value_writer::{
    write_annotated, write_bool, write_decimal, write_float32, write_float64, write_int,
    write_nop_pad, write_null, write_ordered_struct, write_symbol_id, write_timestamp, write_value,
    write_var_uint,
};

/// Binary stream builder.
///
/// Produces byte-exact Ion 1.0 binary for tests, benchmarks and fuzz
/// seeds. Methods chain on `&mut Self`; [`annotate`](Self::annotate) and
/// [`field`](Self::field) attach to the next value written, and container
/// bodies are buffered until [`end_container`](Self::end_container) knows
/// their length.
///
/// Structural mistakes do not panic. The first one is kept and returned by
/// [`finish`](Self::finish).
///
/// # Usage
///
/// ```rust
/// use ion_encoder::{BinaryWriter, LocalTableDecl};
///
/// let bytes = BinaryWriter::new()
///     .ivm()
///     .symbol_table(&LocalTableDecl::with_symbols(["greeting"]))
///     .start_struct()
///     .field(10)
///     .string("hello")
///     .end_container()
///     .finish()
///     .unwrap();
/// assert_eq!(&bytes[..4], &[0xE0, 0x01, 0x00, 0xEA]);
/// ```
///
/// # Output layout
///
/// ```text
/// ┌────────────┬──────────────────────────────────────────────┐
/// │ [4 bytes]  │ version marker, when ivm() is called         │
/// │ [N bytes]  │ top-level values in call order               │
/// └────────────┴──────────────────────────────────────────────┘
/// ```
#[derive(Default)]
pub struct BinaryWriter {
    out: Vec<u8>,
    frames: Vec<Frame>,
    field: Option<usize>,
    annotations: Vec<usize>,
    error: Option<EncodeError>,
}

/// An open container whose body is still being written.
struct Frame {
    kind: FrameKind,
    field: Option<usize>,
    annotations: Vec<usize>,
    body: Vec<u8>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    List,
    Sexp,
    Struct,
    OrderedStruct,
}

impl FrameKind {
    fn is_struct(self) -> bool {
        matches!(self, Self::Struct | Self::OrderedStruct)
    }
}

impl BinaryWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written at top level so far. Open containers are not counted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.out.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    // ── Stream-level items ──────────────────────────────────────────────

    /// Write an Ion 1.0 version marker.
    ///
    /// Inside a container the bytes are written as they are, which no
    /// reader accepts; this is how malformed input is produced for tests.
    pub fn ivm(&mut self) -> &mut Self {
        self.version_marker(VersionMarker::ION_1_0)
    }

    /// Write a version marker for an arbitrary version.
    pub fn version_marker(&mut self, marker: VersionMarker) -> &mut Self {
        let mut buf = [0u8; IVM_SIZE];
        if let Err(e) = marker.write_to(&mut buf) {
            return self.fail(e.into());
        }
        self.sink().extend_from_slice(&buf);
        self
    }

    /// Write a local symbol table declaration.
    pub fn symbol_table(&mut self, decl: &LocalTableDecl) -> &mut Self {
        let mut encoded = Vec::new();
        decl.encode(&mut encoded);
        self.out.extend_from_slice(&encoded);
        self
    }

    /// Append bytes verbatim to the current container or the top level.
    pub fn write_raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.sink().extend_from_slice(bytes);
        self
    }

    /// Write NOP padding of exactly `total` bytes.
    ///
    /// Inside a struct the padding takes a field name, SID 0 unless
    /// [`field`](Self::field) set one, and the field name is not counted
    /// in `total`.
    pub fn nop_pad(&mut self, total: usize) -> &mut Self {
        let in_struct = self.frames.last().is_some_and(|f| f.kind.is_struct());
        if in_struct {
            let sid = self.field.take().unwrap_or(0);
            write_var_uint(self.sink(), sid as u64);
        }
        write_nop_pad(self.sink(), total);
        self
    }

    // ── Modifiers ───────────────────────────────────────────────────────

    /// Add an annotation to the next value.
    pub fn annotate(&mut self, sid: usize) -> &mut Self {
        self.annotations.push(sid);
        self
    }

    /// Set the field name of the next value. Only valid inside a struct.
    pub fn field(&mut self, sid: usize) -> &mut Self {
        if !self.frames.last().is_some_and(|f| f.kind.is_struct()) {
            return self.fail(EncodeError::FieldOutsideStruct);
        }
        if self.field.is_some() {
            return self.fail(EncodeError::DanglingFieldName);
        }
        self.field = Some(sid);
        self
    }

    // ── Scalars ─────────────────────────────────────────────────────────

    pub fn null(&mut self, ion_type: IonType) -> &mut Self {
        let mut value = Vec::with_capacity(1);
        write_null(&mut value, type_code(ion_type));
        self.place(&value)
    }

    pub fn bool(&mut self, value: bool) -> &mut Self {
        let mut encoded = Vec::with_capacity(1);
        write_bool(&mut encoded, value);
        self.place(&encoded)
    }

    pub fn int(&mut self, value: i64) -> &mut Self {
        self.int_magnitude(SignedMagnitude::from_i64(value))
    }

    /// Write an integer from sign and magnitude, covering the full `u64`
    /// range and negative zero.
    pub fn int_magnitude(&mut self, value: SignedMagnitude) -> &mut Self {
        let mut encoded = Vec::new();
        write_int(&mut encoded, value);
        self.place(&encoded)
    }

    pub fn float32(&mut self, value: f32) -> &mut Self {
        let mut encoded = Vec::new();
        write_float32(&mut encoded, value);
        self.place(&encoded)
    }

    pub fn float64(&mut self, value: f64) -> &mut Self {
        let mut encoded = Vec::new();
        write_float64(&mut encoded, value);
        self.place(&encoded)
    }

    pub fn decimal(&mut self, value: &Decimal) -> &mut Self {
        let mut encoded = Vec::new();
        write_decimal(&mut encoded, value);
        self.place(&encoded)
    }

    pub fn timestamp(&mut self, value: &Timestamp) -> &mut Self {
        let mut encoded = Vec::new();
        write_timestamp(&mut encoded, value);
        self.place(&encoded)
    }

    pub fn string(&mut self, value: &str) -> &mut Self {
        self.scalar(TypeCode::String, value.as_bytes())
    }

    pub fn symbol_id(&mut self, sid: usize) -> &mut Self {
        let mut encoded = Vec::new();
        write_symbol_id(&mut encoded, sid);
        self.place(&encoded)
    }

    pub fn clob(&mut self, value: &[u8]) -> &mut Self {
        self.scalar(TypeCode::Clob, value)
    }

    pub fn blob(&mut self, value: &[u8]) -> &mut Self {
        self.scalar(TypeCode::Blob, value)
    }

    // ── Containers ──────────────────────────────────────────────────────

    pub fn start_list(&mut self) -> &mut Self {
        self.open(FrameKind::List)
    }

    pub fn start_sexp(&mut self) -> &mut Self {
        self.open(FrameKind::Sexp)
    }

    pub fn start_struct(&mut self) -> &mut Self {
        self.open(FrameKind::Struct)
    }

    /// Start a struct written with the sorted-fields descriptor `0xD1`.
    /// Fields are written in call order; sorting is the caller's job.
    pub fn start_ordered_struct(&mut self) -> &mut Self {
        self.open(FrameKind::OrderedStruct)
    }

    pub fn end_container(&mut self) -> &mut Self {
        let Some(frame) = self.frames.pop() else {
            return self.fail(EncodeError::NoOpenContainer);
        };
        if self.field.take().is_some() {
            self.fail(EncodeError::DanglingFieldName);
        }
        if !self.annotations.is_empty() {
            self.annotations.clear();
            self.fail(EncodeError::DanglingAnnotations);
        }

        let mut encoded = Vec::with_capacity(frame.body.len() + 4);
        match frame.kind {
            FrameKind::List => write_value(&mut encoded, TypeCode::List, &frame.body),
            FrameKind::Sexp => write_value(&mut encoded, TypeCode::Sexp, &frame.body),
            FrameKind::Struct => write_value(&mut encoded, TypeCode::Struct, &frame.body),
            FrameKind::OrderedStruct if frame.body.is_empty() => {
                return self.fail(EncodeError::EmptyOrderedStruct);
            }
            FrameKind::OrderedStruct => write_ordered_struct(&mut encoded, &frame.body),
        }
        emit(self.sink(), frame.field, &frame.annotations, &encoded);
        self
    }

    // ── Finish ──────────────────────────────────────────────────────────

    /// Return the stream bytes.
    ///
    /// # Errors
    ///
    /// - The first structural error recorded by an earlier call.
    /// - [`EncodeError::UnclosedContainer`] if containers are still open.
    /// - [`EncodeError::DanglingAnnotations`] if annotations were set last.
    pub fn finish(&mut self) -> Result<Vec<u8>, EncodeError> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }
        if !self.frames.is_empty() {
            return Err(EncodeError::UnclosedContainer {
                depth: self.frames.len(),
            });
        }
        if !self.annotations.is_empty() {
            return Err(EncodeError::DanglingAnnotations);
        }
        Ok(std::mem::take(&mut self.out))
    }

    // ── Internal helpers ────────────────────────────────────────────────

    fn scalar(&mut self, code: TypeCode, body: &[u8]) -> &mut Self {
        let mut encoded = Vec::with_capacity(body.len() + 3);
        write_value(&mut encoded, code, body);
        self.place(&encoded)
    }

    /// Emit an encoded value with the pending field name and annotations.
    fn place(&mut self, encoded: &[u8]) -> &mut Self {
        let Some(field) = self.take_field() else {
            return self;
        };
        let annotations = std::mem::take(&mut self.annotations);
        emit(self.sink(), field, &annotations, encoded);
        self
    }

    fn open(&mut self, kind: FrameKind) -> &mut Self {
        let Some(field) = self.take_field() else {
            return self;
        };
        let annotations = std::mem::take(&mut self.annotations);
        self.frames.push(Frame {
            kind,
            field,
            annotations,
            body: Vec::new(),
        });
        self
    }

    /// The field name for the next value: `Some(Some(sid))` inside a
    /// struct, `Some(None)` elsewhere, `None` after recording an error.
    fn take_field(&mut self) -> Option<Option<usize>> {
        let in_struct = self.frames.last().is_some_and(|f| f.kind.is_struct());
        match (in_struct, self.field.take()) {
            (true, Some(sid)) => Some(Some(sid)),
            (true, None) => {
                self.fail(EncodeError::MissingFieldName);
                None
            }
            (false, _) => Some(None),
        }
    }

    fn sink(&mut self) -> &mut Vec<u8> {
        match self.frames.last_mut() {
            Some(frame) => &mut frame.body,
            None => &mut self.out,
        }
    }

    fn fail(&mut self, error: EncodeError) -> &mut Self {
        if self.error.is_none() {
            self.error = Some(error);
        }
        self
    }
}

fn emit(out: &mut Vec<u8>, field: Option<usize>, annotations: &[usize], encoded: &[u8]) {
    if let Some(sid) = field {
        write_var_uint(out, sid as u64);
    }
    if annotations.is_empty() {
        out.extend_from_slice(encoded);
    } else {
        write_annotated(out, annotations, encoded);
    }
}

fn type_code(ion_type: IonType) -> TypeCode {
    match ion_type {
        IonType::Null => TypeCode::NullOrPad,
        IonType::Bool => TypeCode::Bool,
        IonType::Int => TypeCode::PositiveInt,
        IonType::Float => TypeCode::Float,
        IonType::Decimal => TypeCode::Decimal,
        IonType::Timestamp => TypeCode::Timestamp,
        IonType::Symbol => TypeCode::Symbol,
        IonType::String => TypeCode::String,
        IonType::Clob => TypeCode::Clob,
        IonType::Blob => TypeCode::Blob,
        IonType::List => TypeCode::List,
        IonType::Sexp => TypeCode::Sexp,
        IonType::Struct => TypeCode::Struct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table_decl::{ImportDecl, TableImports};

    // ── Acceptance tests ────────────────────────────────────────────────

    #[test]
    fn annotated_string_after_ivm() {
        let bytes = BinaryWriter::new()
            .ivm()
            .annotate(4)
            .string("a")
            .finish()
            .unwrap();
        assert_eq!(bytes, [0xE0, 0x01, 0x00, 0xEA, 0xE4, 0x81, 0x84, 0x81, b'a']);
    }

    #[test]
    fn nested_containers() {
        let bytes = BinaryWriter::new()
            .start_struct()
            .field(4)
            .start_list()
            .int(1)
            .int(-2)
            .end_container()
            .end_container()
            .finish()
            .unwrap();
        // {name: [1, -2]}
        assert_eq!(bytes, [0xD6, 0x84, 0xB4, 0x21, 0x01, 0x31, 0x02]);
    }

    #[test]
    fn annotated_container() {
        let bytes = BinaryWriter::new()
            .annotate(3)
            .start_struct()
            .end_container()
            .finish()
            .unwrap();
        assert_eq!(bytes, [0xE3, 0x81, 0x83, 0xD0]);
    }

    #[test]
    fn typed_nulls() {
        let bytes = BinaryWriter::new()
            .null(IonType::Null)
            .null(IonType::Struct)
            .null(IonType::Int)
            .finish()
            .unwrap();
        assert_eq!(bytes, [0x0F, 0xDF, 0x2F]);
    }

    #[test]
    fn pad_inside_struct_takes_field_name() {
        let bytes = BinaryWriter::new()
            .start_struct()
            .nop_pad(2)
            .end_container()
            .finish()
            .unwrap();
        assert_eq!(bytes, [0xD3, 0x80, 0x01, 0x00]);
    }

    #[test]
    fn len_tracks_top_level_only() {
        let mut writer = BinaryWriter::new();
        writer.ivm().start_list().int(5);
        assert_eq!(writer.len(), 4);
        assert_eq!(writer.depth(), 1);
        writer.end_container();
        assert_eq!(writer.len(), 7);
    }

    #[test]
    fn symbol_table_declaration_bytes() {
        let decl = LocalTableDecl {
            imports: TableImports::List(vec![ImportDecl::new("foo", 1, 2)]),
            symbols: vec![Some("x".into())],
        };
        let bytes = BinaryWriter::new().symbol_table(&decl).finish().unwrap();
        let mut expected = Vec::new();
        decl.encode(&mut expected);
        assert_eq!(bytes, expected);
    }

    // ── Error reporting ─────────────────────────────────────────────────

    #[test]
    fn missing_field_name() {
        let result = BinaryWriter::new().start_struct().int(1).end_container().finish();
        assert!(matches!(result, Err(EncodeError::MissingFieldName)));
    }

    #[test]
    fn field_outside_struct() {
        let result = BinaryWriter::new().field(4).int(1).finish();
        assert!(matches!(result, Err(EncodeError::FieldOutsideStruct)));
    }

    #[test]
    fn unclosed_and_unopened() {
        let result = BinaryWriter::new().start_list().finish();
        assert!(matches!(result, Err(EncodeError::UnclosedContainer { depth: 1 })));
        let result = BinaryWriter::new().end_container().finish();
        assert!(matches!(result, Err(EncodeError::NoOpenContainer)));
    }

    #[test]
    fn dangling_annotations() {
        let result = BinaryWriter::new().int(1).annotate(4).finish();
        assert!(matches!(result, Err(EncodeError::DanglingAnnotations)));
    }

    #[test]
    fn empty_ordered_struct() {
        let result = BinaryWriter::new().start_ordered_struct().end_container().finish();
        assert!(matches!(result, Err(EncodeError::EmptyOrderedStruct)));
    }

    #[test]
    fn first_error_wins() {
        let result = BinaryWriter::new()
            .end_container()
            .field(1)
            .finish();
        assert!(matches!(result, Err(EncodeError::NoOpenContainer)));
    }
}
