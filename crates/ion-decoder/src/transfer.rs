use ion_types::SymbolTable;

use crate::error::DecodeError;

/// Destination that can take a value's encoded bytes as they are, without
/// the reader materializing the value first.
///
/// Handed to [`IncrementalReader::transfer_current_value`](crate::IncrementalReader::transfer_current_value).
/// Symbol IDs inside the bytes are only meaningful against the reader's
/// current symbol table, so a destination that interprets them should
/// refuse tables it does not share.
pub trait ByteTransfer {
    /// Whether bytes encoded against `table` can be taken as they are.
    fn accepts(&self, table: &SymbolTable) -> bool {
        let _ = table;
        true
    }

    /// Take one complete value encoding.
    ///
    /// # Errors
    ///
    /// Whatever the destination fails with.
    fn transfer(&mut self, encoded: &[u8]) -> Result<(), DecodeError>;
}

impl ByteTransfer for Vec<u8> {
    fn transfer(&mut self, encoded: &[u8]) -> Result<(), DecodeError> {
        self.extend_from_slice(encoded);
        Ok(())
    }
}
