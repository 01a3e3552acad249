use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use crate::config::BufferConfiguration;
use crate::error::DecodeError;
use crate::lookahead::LookaheadBuffer;
use crate::pipe::BytePipe;

/// Size of each read from the async source.
const CHUNK_SIZE: usize = 8 * 1024;

/// One complete top-level unit: any version marker and symbol tables it
/// depends on, then the value.
///
/// ```text
///   bytes: [ IVM? │ symbol tables* │ value ]
///                                   ▲
///                              value_start
/// ```
///
/// `bytes` can be handed to [`IncrementalReader::from_bytes`](crate::IncrementalReader::from_bytes)
/// on its own, or unit after unit to a single push-fed reader.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unit {
    pub bytes: Bytes,
    pub value_start: usize,
}

impl Unit {
    /// Just the value's bytes, annotations included.
    #[must_use]
    pub fn value(&self) -> Bytes {
        self.bytes.slice(self.value_start..)
    }
}

/// Asynchronous adapter yielding one [`Unit`] at a time from any
/// `AsyncRead`.
///
/// Chunks read from the source are pushed into a [`LookaheadBuffer`]; a
/// unit is yielded as soon as the buffer has one complete. Backpressure
/// comes from the caller: the source is only read while awaiting
/// [`next`](Self::next).
///
/// # Example
///
/// ```rust,no_run
/// use ion_decoder::{BufferConfiguration, StreamingReader};
/// use tokio::io::AsyncRead;
///
/// async fn count_units(source: impl AsyncRead + Unpin) -> usize {
///     let mut stream = StreamingReader::new(source, BufferConfiguration::default()).unwrap();
///     let mut count = 0;
///     while let Some(unit) = stream.next().await.transpose().unwrap() {
///         println!("value at {} of {} bytes", unit.value_start, unit.bytes.len());
///         count += 1;
///     }
///     count
/// }
/// ```
pub struct StreamingReader<S> {
    source: S,
    lookahead: LookaheadBuffer<BytePipe>,
    chunk: BytesMut,
    done: bool,
}

impl<S: AsyncRead + Unpin> StreamingReader<S> {
    /// # Errors
    ///
    /// [`DecodeError::InvalidConfiguration`] for an unusable initial size.
    pub fn new(source: S, config: BufferConfiguration) -> Result<Self, DecodeError> {
        let upstream = BytePipe::unbounded(config.initial_buffer_size());
        Ok(Self {
            source,
            lookahead: LookaheadBuffer::new(upstream, config)?,
            chunk: BytesMut::with_capacity(CHUNK_SIZE),
            done: false,
        })
    }

    /// The next complete unit.
    ///
    /// Returns `None` once the source is exhausted on an item boundary.
    /// A source that ends partway through a value yields
    /// [`DecodeError::UnexpectedEof`] once, then `None`.
    pub async fn next(&mut self) -> Option<Result<Unit, DecodeError>> {
        if self.done {
            return None;
        }
        match self.read_unit().await {
            Ok(Some(unit)) => Some(Ok(unit)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }

    async fn read_unit(&mut self) -> Result<Option<Unit>, DecodeError> {
        let mut eof = false;
        loop {
            self.lookahead.fill_input()?;
            if !self.lookahead.more_data_required() {
                let unit = Unit {
                    bytes: Bytes::copy_from_slice(self.lookahead.unit()),
                    value_start: self.lookahead.value_marker().map_or(0, |m| m.start),
                };
                self.lookahead.consume();
                return Ok(Some(unit));
            }
            if eof {
                self.lookahead.end_stream()?;
                return Ok(None);
            }

            self.chunk.clear();
            let read = self.source.read_buf(&mut self.chunk).await?;
            trace!(read, "streaming chunk");
            if read == 0 {
                eof = true;
            } else {
                self.lookahead.source_mut().receive(&self.chunk)?;
            }
        }
    }

    /// Give back the source.
    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S> std::fmt::Debug for StreamingReader<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingReader")
            .field("lookahead", &self.lookahead)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use ion_encoder::{BinaryWriter, LocalTableDecl};
    use ion_types::IonType;

    use super::*;
    use crate::reader::IncrementalReader;

    async fn collect(bytes: Vec<u8>) -> Vec<Result<Unit, DecodeError>> {
        let source = tokio::io::BufReader::with_capacity(3, std::io::Cursor::new(bytes));
        let mut stream = StreamingReader::new(source, BufferConfiguration::default()).unwrap();
        let mut units = Vec::new();
        while let Some(unit) = stream.next().await {
            units.push(unit);
        }
        units
    }

    #[tokio::test]
    async fn units_are_yielded_with_their_prefix() {
        let bytes = BinaryWriter::new()
            .ivm()
            .symbol_table(&LocalTableDecl::with_symbols(["a"]))
            .symbol_id(10)
            .string("plain")
            .finish()
            .unwrap();
        let units: Vec<Unit> = collect(bytes.clone()).await.into_iter().map(Result::unwrap).collect();

        assert_eq!(units.len(), 2);
        assert_eq!(&units[0].value()[..], &[0x71, 0x0A]);
        assert_eq!(units[0].bytes.len() + units[1].bytes.len(), bytes.len());
        assert_eq!(units[1].value_start, 0);

        let mut reader = IncrementalReader::from_bytes(&units[0].bytes);
        assert_eq!(reader.next().unwrap(), Some(IonType::Symbol));
        assert_eq!(reader.symbol_value().unwrap().text.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn truncated_source_is_an_error() {
        let bytes = BinaryWriter::new().int(1).string("abcdef").finish().unwrap();
        let units = collect(bytes[..bytes.len() - 2].to_vec()).await;
        assert_eq!(units.len(), 2);
        assert!(units[0].is_ok());
        assert!(matches!(units[1], Err(DecodeError::UnexpectedEof { .. })));
    }

    #[tokio::test]
    async fn empty_source_yields_nothing() {
        assert!(collect(Vec::new()).await.is_empty());
    }
}
