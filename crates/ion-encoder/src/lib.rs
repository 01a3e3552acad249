#![warn(clippy::pedantic)]

pub mod error;
pub mod table_decl;
pub mod value_writer;
pub mod writer;

pub use error::EncodeError;
pub use table_decl::{ImportDecl, LocalTableDecl, TableImports};
pub use writer::BinaryWriter;
