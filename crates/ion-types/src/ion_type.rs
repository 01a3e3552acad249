use ion_wire::TypeCode;

/// The data model types a value can have.
///
/// Positive and negative integers share [`IonType::Int`]; the sign lives in
/// the type code on the wire but not in the data model. `Null` is only the
/// untyped `null.null`; a typed null (`null.string`) reports its own type
/// and is detected with `is_null`.
///
/// ```text
/// ┌───────────┬────────────┬────────────────────────────┐
/// │ Variant   │ Type codes │ Container                  │
/// ├───────────┼────────────┼────────────────────────────┤
/// │ Null      │ 0x0F       │ no                         │
/// │ Bool      │ 0x1        │ no                         │
/// │ Int       │ 0x2, 0x3   │ no                         │
/// │ Float     │ 0x4        │ no                         │
/// │ Decimal   │ 0x5        │ no                         │
/// │ Timestamp │ 0x6        │ no                         │
/// │ Symbol    │ 0x7        │ no                         │
/// │ String    │ 0x8        │ no                         │
/// │ Clob      │ 0x9        │ no                         │
/// │ Blob      │ 0xA        │ no                         │
/// │ List      │ 0xB        │ yes                        │
/// │ Sexp      │ 0xC        │ yes                        │
/// │ Struct    │ 0xD        │ yes (fields carry names)   │
/// └───────────┴────────────┴────────────────────────────┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IonType {
    Null,
    Bool,
    Int,
    Float,
    Decimal,
    Timestamp,
    Symbol,
    String,
    Clob,
    Blob,
    List,
    Sexp,
    Struct,
}

impl IonType {
    /// The data model type of a value type code.
    ///
    /// Returns `None` for the codes that never denote a value: annotation
    /// wrappers and the reserved row. NOP pads map to `Null` here; callers
    /// check for padding before asking for a type.
    #[must_use]
    pub fn from_type_code(code: TypeCode) -> Option<Self> {
        let ion_type = match code {
            TypeCode::NullOrPad => Self::Null,
            TypeCode::Bool => Self::Bool,
            TypeCode::PositiveInt | TypeCode::NegativeInt => Self::Int,
            TypeCode::Float => Self::Float,
            TypeCode::Decimal => Self::Decimal,
            TypeCode::Timestamp => Self::Timestamp,
            TypeCode::Symbol => Self::Symbol,
            TypeCode::String => Self::String,
            TypeCode::Clob => Self::Clob,
            TypeCode::Blob => Self::Blob,
            TypeCode::List => Self::List,
            TypeCode::Sexp => Self::Sexp,
            TypeCode::Struct => Self::Struct,
            TypeCode::Annotation | TypeCode::Reserved => return None,
        };
        Some(ion_type)
    }

    #[must_use]
    pub fn is_container(self) -> bool {
        matches!(self, Self::List | Self::Sexp | Self::Struct)
    }

    #[must_use]
    pub fn is_text(self) -> bool {
        matches!(self, Self::String | Self::Symbol)
    }

    #[must_use]
    pub fn is_lob(self) -> bool {
        matches!(self, Self::Clob | Self::Blob)
    }

    /// Lowercase keyword, as used in `null.<type>`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Decimal => "decimal",
            Self::Timestamp => "timestamp",
            Self::Symbol => "symbol",
            Self::String => "string",
            Self::Clob => "clob",
            Self::Blob => "blob",
            Self::List => "list",
            Self::Sexp => "sexp",
            Self::Struct => "struct",
        }
    }
}

impl std::fmt::Display for IonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
