/// Errors raised while decoding the primitive wire encodings.
///
/// Offsets are relative to the slice handed to the decoding function.
/// Callers that track absolute stream positions translate them before
/// reporting.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// A VarUInt/VarInt ran past 10 bytes or overflowed 64 bits.
    #[error("variable-length integer too long: exceeded 10 bytes or 64 bits")]
    VarIntTooLong,

    /// A fixed-width UInt/Int does not fit in 64 bits.
    #[error("fixed-width integer of {len} bytes does not fit in 64 bits")]
    IntTooLong { len: usize },

    /// Input ended before a complete integer or header could be read.
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEof { offset: usize },

    /// The octet is not a legal type descriptor in Ion 1.0.
    #[error("invalid type descriptor {byte:#04X}")]
    InvalidTypeDescriptor { byte: u8 },

    /// The four bytes started like a version marker but did not end with 0xEA.
    #[error("invalid version marker: {found:02X?}")]
    InvalidVersionMarker { found: [u8; 4] },

    /// A well-formed version marker for a version this crate cannot read.
    #[error("unsupported version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
