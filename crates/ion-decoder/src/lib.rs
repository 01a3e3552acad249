#![warn(clippy::pedantic)]

pub mod config;
pub mod cursor;
pub mod error;
pub mod lookahead;
pub mod pipe;
pub mod reader;
pub mod streaming;
pub mod symbols;
pub mod transfer;

pub use config::{
    BufferConfiguration, BufferConfigurationBuilder, BufferLimits, DEFAULT_INITIAL_BUFFER_SIZE,
    DataHandler, MINIMUM_MAXIMUM_BUFFER_SIZE, OversizedHandler, ReaderOptions,
};
pub use cursor::{BinaryCursor, CursorListener, Event, Marker, OversizedValue};
pub use error::{DecodeError, ErrorKind};
pub use lookahead::LookaheadBuffer;
pub use pipe::{BytePipe, ShiftConsumer};
pub use reader::{IncrementalReader, Span};
pub use streaming::{StreamingReader, Unit};
pub use symbols::SymbolTableResolver;
pub use transfer::ByteTransfer;
