use ion_types::IonType;
use ion_types::error::TypeError;
use ion_wire::WireError;

/// Errors that can occur while incrementally decoding a binary Ion stream.
///
/// Running out of input is never an error: the cursor reports
/// [`Event::NeedsData`](crate::Event::NeedsData) instead. Everything here
/// falls into one of four classes, reported by [`DecodeError::kind`]:
///
/// ```text
///   DecodeError
///   ├── Malformed                   ← the stream itself is broken
///   │   ├── InvalidTypeDescriptor   ← octet no value may start with
///   │   ├── NestedAnnotationWrapper ← wrapper directly inside a wrapper
///   │   ├── AnnotationWrapperLength ← lengths inside a wrapper disagree
///   │   ├── EmptyAnnotationWrapper  ← no annotations, or no wrapped value
///   │   ├── ContainerOverflow       ← child runs past its parent's end
///   │   ├── NopPadOverflow          ← pad runs past its parent's end
///   │   ├── NopPadInAnnotationWrapper
///   │   ├── IvmBelowTopLevel        ← 0xE0 inside a container
///   │   ├── NegativeZeroInt         ← 0x3_ with a zero magnitude
///   │   ├── IntegerOverflow         ← int does not fit in i64
///   │   ├── InvalidUtf8             ← string body is not UTF-8
///   │   ├── DuplicateSymbolTableField
///   │   ├── MissingImportMaxId      ← import without max_id, not in catalog
///   │   ├── SymbolIdOverflow        ← imports and symbols pass usize::MAX
///   │   ├── EmptyOrderedStruct      ← 0xD1 with length 0
///   │   ├── UnexpectedEof           ← stream ended inside a value
///   │   └── SymbolTableInvalidated  ← local SID after a skipped table
///   ├── Capacity
///   │   ├── BufferCapacityExceeded  ← growth past the maximum buffer size
///   │   └── InvalidConfiguration    ← rejected by the configuration builder
///   ├── Usage                       ← the caller broke the reader's contract
///   │   ├── StepIntoScalar, StepOutAtTopLevel, NoCurrentValue
///   │   ├── TypeMismatch, NullValue, ValueNotBuffered
///   │   └── NoMark, SeekOutOfRange
///   ├── Type(TypeError)             ← from ion-types (symbols, timestamps)
///   ├── Wire(WireError)             ← from ion-wire (VarUInts, version marker)
///   └── Io(std::io::Error)          ← from the byte source
/// ```
///
/// Malformed and capacity errors end the stream: the reader must not be
/// used to continue past them. Usage errors leave the reader as it was.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid type descriptor 0x{byte:02X} at offset {position}")]
    InvalidTypeDescriptor { byte: u8, position: usize },

    #[error("annotation wrapper nested directly inside another at offset {position}")]
    NestedAnnotationWrapper { position: usize },

    /// The wrapper's declared length does not match its annotation list
    /// plus the wrapped value, or the annotation SIDs overrun their list.
    #[error("annotation wrapper length mismatch at offset {position}")]
    AnnotationWrapperLength { position: usize },

    #[error("annotation wrapper at offset {position} has no annotations or no value")]
    EmptyAnnotationWrapper { position: usize },

    /// A value's declared end lies beyond the end of its container.
    #[error("value at offset {position} ends at {end}, past its container's end at {limit}")]
    ContainerOverflow {
        position: usize,
        end: usize,
        limit: usize,
    },

    #[error("NOP pad at offset {position} runs past its container's end")]
    NopPadOverflow { position: usize },

    #[error("NOP pad inside an annotation wrapper at offset {position}")]
    NopPadInAnnotationWrapper { position: usize },

    #[error("version marker below the top level at offset {position}")]
    IvmBelowTopLevel { position: usize },

    #[error("negative zero int at offset {position}")]
    NegativeZeroInt { position: usize },

    #[error("int at offset {position} does not fit in 64 bits")]
    IntegerOverflow { position: usize },

    #[error("invalid UTF-8 in string at offset {position}")]
    InvalidUtf8 { position: usize },

    /// A symbol table struct has a second `imports` or `symbols` field.
    #[error("symbol table declares the `{field}` field more than once")]
    DuplicateSymbolTableField { field: &'static str },

    /// An import omits `max_id` and the catalog has no exact match to
    /// take the size from.
    #[error("import {name:?} version {version} has no max_id and is not in the catalog")]
    MissingImportMaxId { name: String, version: u32 },

    /// The declared import sizes plus the local symbols add up to more
    /// SIDs than a `usize` can number.
    #[error("symbol table declares more symbol IDs than fit in a usize")]
    SymbolIdOverflow,

    #[error("ordered struct at offset {position} is empty")]
    EmptyOrderedStruct { position: usize },

    /// The stream ended while a value was only partially received.
    #[error("stream ended inside a value (offset {position})")]
    UnexpectedEof { position: usize },

    /// A local symbol was requested after an oversized symbol table was
    /// skipped, so its text can no longer be known.
    #[error("symbol ID {sid} cannot be resolved: the symbol table defining it was skipped")]
    SymbolTableInvalidated { sid: usize },

    #[error("buffer needs {required} bytes but the maximum is {maximum}")]
    BufferCapacityExceeded { required: usize, maximum: usize },

    #[error("invalid buffer configuration: {reason}")]
    InvalidConfiguration { reason: &'static str },

    #[error("cannot step into a scalar or null value")]
    StepIntoScalar,

    #[error("cannot step out at the top level")]
    StepOutAtTopLevel,

    #[error("the reader is not positioned on a value")]
    NoCurrentValue,

    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: IonType,
    },

    #[error("current value is a null {ion_type}")]
    NullValue { ion_type: IonType },

    #[error("no mark has been set, or it was discarded by compaction")]
    NoMark,

    /// The current value's body has not been filled into the buffer.
    #[error("the current value is not fully buffered")]
    ValueNotBuffered,

    #[error("cannot seek to index {target}: only {write_index} bytes are buffered")]
    SeekOutOfRange { target: usize, write_index: usize },

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The four classes of [`DecodeError`].
///
/// ```text
/// ┌───────────┬──────────────────────────────────────────────────────┐
/// │ Kind      │ Consequence                                          │
/// ├───────────┼──────────────────────────────────────────────────────┤
/// │ Malformed │ Stream is broken; stop reading it                    │
/// │ Capacity  │ Configuration or memory ceiling; stop reading        │
/// │ Usage     │ Caller mistake; the reader is unchanged              │
/// │ Io        │ The byte source failed                               │
/// └───────────┴──────────────────────────────────────────────────────┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Malformed,
    Capacity,
    Usage,
    Io,
}

impl DecodeError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BufferCapacityExceeded { .. } | Self::InvalidConfiguration { .. } => {
                ErrorKind::Capacity
            }
            Self::StepIntoScalar
            | Self::StepOutAtTopLevel
            | Self::NoCurrentValue
            | Self::TypeMismatch { .. }
            | Self::NullValue { .. }
            | Self::NoMark
            | Self::ValueNotBuffered
            | Self::SeekOutOfRange { .. } => ErrorKind::Usage,
            Self::Io(_) | Self::Wire(WireError::Io(_)) => ErrorKind::Io,
            _ => ErrorKind::Malformed,
        }
    }

    /// Whether the reader may keep going after this error.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::Usage
    }
}

impl From<DecodeError> for std::io::Error {
    fn from(error: DecodeError) -> Self {
        match error {
            DecodeError::Io(inner) => inner,
            DecodeError::BufferCapacityExceeded { .. } => {
                std::io::Error::new(std::io::ErrorKind::OutOfMemory, error)
            }
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(
            DecodeError::IvmBelowTopLevel { position: 3 }.kind(),
            ErrorKind::Malformed
        );
        assert_eq!(
            DecodeError::BufferCapacityExceeded {
                required: 9,
                maximum: 8
            }
            .kind(),
            ErrorKind::Capacity
        );
        assert_eq!(DecodeError::StepIntoScalar.kind(), ErrorKind::Usage);
        assert_eq!(
            DecodeError::Wire(WireError::VarIntTooLong).kind(),
            ErrorKind::Malformed
        );
        let io = std::io::Error::other("boom");
        assert_eq!(DecodeError::from(io).kind(), ErrorKind::Io);
    }

    #[test]
    fn only_usage_errors_are_recoverable() {
        assert!(DecodeError::NoCurrentValue.is_recoverable());
        assert!(!DecodeError::UnexpectedEof { position: 0 }.is_recoverable());
    }

    #[test]
    fn capacity_maps_to_out_of_memory() {
        let err: std::io::Error = DecodeError::BufferCapacityExceeded {
            required: 10,
            maximum: 5,
        }
        .into();
        assert_eq!(err.kind(), std::io::ErrorKind::OutOfMemory);
    }
}
