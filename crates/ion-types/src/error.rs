use ion_wire::WireError;

/// Errors raised by the value and symbol-table types.
///
/// These sit above [`WireError`]: they concern what decoded numbers
/// *mean* (a symbol ID outside the table, a month of 13) rather than
/// how the bytes were framed.
///
/// # Error hierarchy
///
/// ```text
/// ┌─────────────────────────────────────────────────────┐
/// │ TypeError (this crate)                              │
/// │   ├── UnknownSymbol for SIDs beyond the max id      │
/// │   ├── InvalidTimestamp for out-of-range fields      │
/// │   ├── DecimalOverflow for unrepresentable decimals  │
/// │   └── wraps WireError for low-level parse failures  │
/// └─────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, thiserror::Error)]
pub enum TypeError {
  /// A symbol ID is larger than the current symbol table's max id.
  ///
  /// Raised when the text of the symbol is requested, never when the
  /// SID is merely encountered.
  #[error("symbol ID {sid} is out of range (max id {max_id})")]
  UnknownSymbol { sid: usize, max_id: usize },

  /// A timestamp field is outside its calendar range.
  #[error("invalid timestamp: {reason}")]
  InvalidTimestamp { reason: &'static str },

  /// A decimal exponent does not fit in 32 bits or its coefficient in 64.
  #[error("decimal does not fit in a 64-bit coefficient and 32-bit exponent")]
  DecimalOverflow,

  #[error(transparent)]
  Wire(#[from] WireError),
}
