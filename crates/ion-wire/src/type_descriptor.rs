use crate::error::WireError;

/// Length code meaning "the length follows as a VarUInt".
pub const LENGTH_VAR_UINT: u8 = 0x0E;

/// Length code meaning "this is a null of the given type".
pub const LENGTH_NULL: u8 = 0x0F;

/// The high nibble of a type descriptor octet.
///
/// ```text
/// ┌──────┬────────────────────┬──────┬────────────────────┐
/// │ Code │ Meaning            │ Code │ Meaning            │
/// ├──────┼────────────────────┼──────┼────────────────────┤
/// │ 0x0  │ null.null / NOP    │ 0x8  │ string             │
/// │ 0x1  │ bool               │ 0x9  │ clob               │
/// │ 0x2  │ int (positive)     │ 0xA  │ blob               │
/// │ 0x3  │ int (negative)     │ 0xB  │ list               │
/// │ 0x4  │ float              │ 0xC  │ sexp               │
/// │ 0x5  │ decimal            │ 0xD  │ struct             │
/// │ 0x6  │ timestamp          │ 0xE  │ annotation wrapper │
/// │ 0x7  │ symbol             │ 0xF  │ reserved           │
/// └──────┴────────────────────┴──────┴────────────────────┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeCode {
    NullOrPad,
    Bool,
    PositiveInt,
    NegativeInt,
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
    Annotation,
    Reserved,
}

impl TypeCode {
    /// Map a high nibble (0–15) to its type code.
    #[must_use]
    pub fn from_nibble(nibble: u8) -> Self {
        match nibble & 0x0F {
            0x0 => Self::NullOrPad,
            0x1 => Self::Bool,
            0x2 => Self::PositiveInt,
            0x3 => Self::NegativeInt,
            0x4 => Self::Float,
            0x5 => Self::Decimal,
            0x6 => Self::Timestamp,
            0x7 => Self::Symbol,
            0x8 => Self::String,
            0x9 => Self::Clob,
            0xA => Self::Blob,
            0xB => Self::List,
            0xC => Self::Sexp,
            0xD => Self::Struct,
            0xE => Self::Annotation,
            _ => Self::Reserved,
        }
    }

    #[must_use]
    pub fn nibble(self) -> u8 {
        match self {
            Self::NullOrPad => 0x0,
            Self::Bool => 0x1,
            Self::PositiveInt => 0x2,
            Self::NegativeInt => 0x3,
            Self::Float => 0x4,
            Self::Decimal => 0x5,
            Self::Timestamp => 0x6,
            Self::Symbol => 0x7,
            Self::String => 0x8,
            Self::Clob => 0x9,
            Self::Blob => 0xA,
            Self::List => 0xB,
            Self::Sexp => 0xC,
            Self::Struct => 0xD,
            Self::Annotation => 0xE,
            Self::Reserved => 0xF,
        }
    }

    #[must_use]
    pub fn is_container(self) -> bool {
        matches!(self, Self::List | Self::Sexp | Self::Struct)
    }
}

/// How the length of a value is encoded, decoded from the low nibble.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LengthCode {
    /// The payload length is the nibble itself (or zero for bools).
    Literal(u8),
    /// A VarUInt length follows the descriptor octet.
    VarUInt,
    /// A typed null; no payload.
    Null,
}

/// A validated type descriptor octet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub code: TypeCode,
    pub length: LengthCode,
    raw: u8,
}

impl TypeDescriptor {
    /// Decode and validate one octet against the Ion 1.0 type table.
    ///
    /// The octet `0xE0` is accepted here as the first byte of a version
    /// marker only by the caller; as a type descriptor it is invalid,
    /// because an annotation wrapper needs at least three bytes of body.
    ///
    /// # Errors
    ///
    /// [`WireError::InvalidTypeDescriptor`] for octets no Ion 1.0 value
    /// may start with.
    pub fn from_byte(byte: u8) -> Result<Self, WireError> {
        let code = TypeCode::from_nibble(byte >> 4);
        let low = byte & 0x0F;
        let invalid = Err(WireError::InvalidTypeDescriptor { byte });

        let length = match (code, low) {
            (TypeCode::Reserved, _) => return invalid,
            (_, LENGTH_NULL) if code == TypeCode::Annotation => return invalid,
            (_, LENGTH_NULL) => LengthCode::Null,
            (TypeCode::Bool, 0 | 1) => LengthCode::Literal(0),
            (TypeCode::Bool, _) => return invalid,
            (TypeCode::NegativeInt, 0) => return invalid,
            (TypeCode::Float, 0 | 4 | 8) => LengthCode::Literal(low),
            (TypeCode::Float, _) => return invalid,
            (TypeCode::Timestamp, 0 | 1) => return invalid,
            (TypeCode::Annotation, 0..=2) => return invalid,
            // Ordered struct: length follows, and the struct is non-empty.
            (TypeCode::Struct, 1) => LengthCode::VarUInt,
            (_, LENGTH_VAR_UINT) => LengthCode::VarUInt,
            (_, _) => LengthCode::Literal(low),
        };

        Ok(Self {
            code,
            length,
            raw: byte,
        })
    }

    #[must_use]
    pub fn raw(self) -> u8 {
        self.raw
    }

    #[must_use]
    pub fn low_nibble(self) -> u8 {
        self.raw & 0x0F
    }

    /// `0x00`–`0x0E`: filler with no value.
    #[must_use]
    pub fn is_nop_pad(self) -> bool {
        self.code == TypeCode::NullOrPad && self.length != LengthCode::Null
    }

    #[must_use]
    pub fn is_null(self) -> bool {
        self.length == LengthCode::Null
    }

    #[must_use]
    pub fn is_container(self) -> bool {
        self.code.is_container()
    }

    #[must_use]
    pub fn is_annotation_wrapper(self) -> bool {
        self.code == TypeCode::Annotation
    }

    /// Struct with low nibble 1: fields sorted by SID, never empty.
    #[must_use]
    pub fn is_ordered_struct(self) -> bool {
        self.code == TypeCode::Struct && self.low_nibble() == 1
    }

    /// The value of a non-null bool descriptor.
    #[must_use]
    pub fn bool_value(self) -> Option<bool> {
        (self.code == TypeCode::Bool && !self.is_null()).then_some(self.low_nibble() == 1)
    }
}
