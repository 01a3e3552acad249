#![warn(clippy::pedantic)]

pub mod catalog;
pub mod decimal;
pub mod error;
pub mod ion_type;
pub mod shared_table;
pub mod symbol_table;
pub mod symbol_token;
pub mod system_symbols;
pub mod timestamp;

pub use catalog::{Catalog, MemoryCatalog};
pub use decimal::Decimal;
pub use error::TypeError;
pub use ion_type::IonType;
pub use shared_table::SharedSymbolTable;
pub use symbol_table::{ImportList, ImportedTable, LocalSymbolTable, SymbolTable};
pub use symbol_token::{ImportLocation, SymbolToken};
pub use timestamp::{Timestamp, TimestampPrecision};
