//! The Ion 1.0 system symbol table.
//!
//! ```text
//! ┌─────┬──────────────────────────────┐
//! │ SID │ Text                         │
//! ├─────┼──────────────────────────────┤
//! │ 0   │ (unknown text)               │
//! │ 1   │ $ion                         │
//! │ 2   │ $ion_1_0                     │
//! │ 3   │ $ion_symbol_table            │
//! │ 4   │ name                         │
//! │ 5   │ version                      │
//! │ 6   │ imports                      │
//! │ 7   │ symbols                      │
//! │ 8   │ max_id                       │
//! │ 9   │ $ion_shared_symbol_table     │
//! └─────┴──────────────────────────────┘
//! ```

pub const ION: usize = 1;
pub const ION_1_0: usize = 2;
pub const ION_SYMBOL_TABLE: usize = 3;
pub const NAME: usize = 4;
pub const VERSION: usize = 5;
pub const IMPORTS: usize = 6;
pub const SYMBOLS: usize = 7;
pub const MAX_ID: usize = 8;
pub const ION_SHARED_SYMBOL_TABLE: usize = 9;

/// Name of the system table, which user imports may not reuse.
pub const SYSTEM_TABLE_NAME: &str = "$ion";

/// Largest SID defined by the system table.
pub const SYSTEM_MAX_ID: usize = 9;

const TEXT: [&str; SYSTEM_MAX_ID] = [
    "$ion",
    "$ion_1_0",
    "$ion_symbol_table",
    "name",
    "version",
    "imports",
    "symbols",
    "max_id",
    "$ion_shared_symbol_table",
];

/// Text of a system SID, or `None` for 0 and anything above the system range.
#[must_use]
pub fn text(sid: usize) -> Option<&'static str> {
    sid.checked_sub(1).and_then(|i| TEXT.get(i)).copied()
}

/// SID of a system symbol's text.
#[must_use]
pub fn sid(text: &str) -> Option<usize> {
    TEXT.iter().position(|t| *t == text).map(|i| i + 1)
}
