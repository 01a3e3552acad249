#![warn(clippy::pedantic)]

pub mod error;
pub mod type_descriptor;
pub mod varint;
pub mod version_marker;

pub use error::WireError;
pub use type_descriptor::{LengthCode, TypeCode, TypeDescriptor};
pub use varint::SignedMagnitude;
pub use version_marker::{IVM, IVM_SIZE, VersionMarker};
