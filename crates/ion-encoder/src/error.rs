use ion_wire::WireError;

/// Errors that can occur while building a binary stream.
///
/// The writer's chaining methods never fail on the spot; the first
/// structural mistake is remembered and returned from
/// [`BinaryWriter::finish`](crate::BinaryWriter::finish).
///
/// Error hierarchy:
///
/// ```text
///   EncodeError
///   ├── UnclosedContainer   ← finish() with containers still open
///   ├── NoOpenContainer     ← end_container() at top level
///   ├── MissingFieldName    ← struct child written without field()
///   ├── FieldOutsideStruct  ← field() while not inside a struct
///   ├── DanglingFieldName   ← field() not followed by a value
///   ├── DanglingAnnotations ← annotate() not followed by a value
///   ├── EmptyOrderedStruct  ← ordered struct closed with no fields
///   └── Wire(WireError)     ← from ion-wire serialization
/// ```
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("{depth} container(s) still open at finish")]
    UnclosedContainer { depth: usize },

    #[error("end_container called with no open container")]
    NoOpenContainer,

    #[error("struct field written without a field name")]
    MissingFieldName,

    #[error("field name set outside a struct")]
    FieldOutsideStruct,

    #[error("field name set but no value followed")]
    DanglingFieldName,

    #[error("annotations set but no value followed")]
    DanglingAnnotations,

    #[error("ordered struct must contain at least one field")]
    EmptyOrderedStruct,

    #[error(transparent)]
    Wire(#[from] WireError),
}
