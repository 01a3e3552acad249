use std::fmt;
use std::sync::Arc;

use ion_types::{Catalog, MemoryCatalog};

use crate::error::DecodeError;

/// Initial buffer size when none is configured.
pub const DEFAULT_INITIAL_BUFFER_SIZE: usize = 32 * 1024;

/// Smallest bounded maximum the builder accepts.
///
/// One type byte plus a four-byte VarUInt length, which covers value
/// lengths up to 2^28 − 1.
pub const MINIMUM_MAXIMUM_BUFFER_SIZE: usize = 5;

/// Receives the number of bytes consumed since the previous call.
pub type DataHandler = Box<dyn FnMut(usize) + Send>;

/// Invoked once per skipped oversized value or symbol table.
pub type OversizedHandler = Box<dyn FnMut() + Send>;

/// Buffer sizing and the callbacks that report on it.
///
/// ```text
/// ┌─────────────────────────────┬──────────────────────────────────────────┐
/// │ Field                       │ Purpose                                  │
/// ├─────────────────────────────┼──────────────────────────────────────────┤
/// │ initial_buffer_size         │ First allocation and growth increment    │
/// │ maximum_buffer_size         │ Ceiling on one top-level unit, or None   │
/// │ on_data                     │ Byte counts as the stream is consumed    │
/// │ on_oversized_value          │ A value was too large and was skipped    │
/// │ on_oversized_symbol_table   │ A symbol table was too large; the local  │
/// │                             │ symbols that follow cannot be resolved   │
/// └─────────────────────────────┴──────────────────────────────────────────┘
/// ```
///
/// A bounded maximum needs all three handlers: without them an oversized
/// value would vanish silently. The builder refuses such a configuration.
pub struct BufferConfiguration {
    initial_buffer_size: usize,
    maximum_buffer_size: Option<usize>,
    pub(crate) handlers: Handlers,
}

impl Default for BufferConfiguration {
    /// 32 KiB initial size, unbounded, no handlers.
    fn default() -> Self {
        Self {
            initial_buffer_size: DEFAULT_INITIAL_BUFFER_SIZE,
            maximum_buffer_size: None,
            handlers: Handlers::default(),
        }
    }
}

impl fmt::Debug for BufferConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferConfiguration")
            .field("initial_buffer_size", &self.initial_buffer_size)
            .field("maximum_buffer_size", &self.maximum_buffer_size)
            .field("handlers", &self.handlers)
            .finish()
    }
}

impl BufferConfiguration {
    #[must_use]
    pub fn builder() -> BufferConfigurationBuilder {
        BufferConfigurationBuilder::default()
    }

    #[must_use]
    pub fn initial_buffer_size(&self) -> usize {
        self.initial_buffer_size
    }

    #[must_use]
    pub fn maximum_buffer_size(&self) -> Option<usize> {
        self.maximum_buffer_size
    }

    #[must_use]
    pub fn limits(&self) -> BufferLimits {
        BufferLimits {
            initial: self.initial_buffer_size,
            maximum: self.maximum_buffer_size,
        }
    }

    /// Separate the sizes from the callbacks.
    pub(crate) fn into_parts(self) -> (BufferLimits, Handlers) {
        (self.limits(), self.handlers)
    }
}

/// Just the sizes of a [`BufferConfiguration`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferLimits {
    pub initial: usize,
    pub maximum: Option<usize>,
}

impl BufferLimits {
    #[must_use]
    pub fn unbounded(initial: usize) -> Self {
        Self {
            initial,
            maximum: None,
        }
    }
}

impl Default for BufferLimits {
    fn default() -> Self {
        Self::unbounded(DEFAULT_INITIAL_BUFFER_SIZE)
    }
}

/// Builder for [`BufferConfiguration`].
///
/// ```rust
/// use ion_decoder::BufferConfiguration;
///
/// let config = BufferConfiguration::builder()
///     .initial_buffer_size(64)
///     .maximum_buffer_size(1024)
///     .on_data(|_| {})
///     .on_oversized_value(|| eprintln!("value skipped"))
///     .on_oversized_symbol_table(|| eprintln!("symbol table skipped"))
///     .build()
///     .unwrap();
/// assert_eq!(config.maximum_buffer_size(), Some(1024));
/// ```
#[derive(Default)]
pub struct BufferConfigurationBuilder {
    initial_buffer_size: Option<usize>,
    maximum_buffer_size: Option<usize>,
    handlers: Handlers,
}

impl BufferConfigurationBuilder {
    #[must_use]
    pub fn initial_buffer_size(mut self, size: usize) -> Self {
        self.initial_buffer_size = Some(size);
        self
    }

    #[must_use]
    pub fn maximum_buffer_size(mut self, size: usize) -> Self {
        self.maximum_buffer_size = Some(size);
        self
    }

    #[must_use]
    pub fn on_data(mut self, handler: impl FnMut(usize) + Send + 'static) -> Self {
        self.handlers.on_data = Some(Box::new(handler));
        self
    }

    #[must_use]
    pub fn on_oversized_value(mut self, handler: impl FnMut() + Send + 'static) -> Self {
        self.handlers.on_oversized_value = Some(Box::new(handler));
        self
    }

    #[must_use]
    pub fn on_oversized_symbol_table(mut self, handler: impl FnMut() + Send + 'static) -> Self {
        self.handlers.on_oversized_symbol_table = Some(Box::new(handler));
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// [`DecodeError::InvalidConfiguration`] when the initial size is
    /// zero, the maximum is below [`MINIMUM_MAXIMUM_BUFFER_SIZE`], or a
    /// bounded maximum is missing any of the three handlers.
    pub fn build(self) -> Result<BufferConfiguration, DecodeError> {
        let mut initial = self.initial_buffer_size.unwrap_or(DEFAULT_INITIAL_BUFFER_SIZE);
        if initial == 0 {
            return Err(DecodeError::InvalidConfiguration {
                reason: "initial buffer size must be non-zero",
            });
        }

        if let Some(maximum) = self.maximum_buffer_size {
            if maximum < MINIMUM_MAXIMUM_BUFFER_SIZE {
                return Err(DecodeError::InvalidConfiguration {
                    reason: "maximum buffer size is below the minimum of 5 bytes",
                });
            }
            if !self.handlers.is_complete() {
                return Err(DecodeError::InvalidConfiguration {
                    reason: "a bounded maximum buffer size requires all three handlers",
                });
            }
            initial = initial.min(maximum);
        }

        Ok(BufferConfiguration {
            initial_buffer_size: initial,
            maximum_buffer_size: self.maximum_buffer_size,
            handlers: self.handlers,
        })
    }
}

/// The callbacks of a [`BufferConfiguration`]. Absent handlers are no-ops.
#[derive(Default)]
pub(crate) struct Handlers {
    on_data: Option<DataHandler>,
    on_oversized_value: Option<OversizedHandler>,
    on_oversized_symbol_table: Option<OversizedHandler>,
}

impl Handlers {
    fn is_complete(&self) -> bool {
        self.on_data.is_some()
            && self.on_oversized_value.is_some()
            && self.on_oversized_symbol_table.is_some()
    }

    pub(crate) fn data(&mut self, bytes: usize) {
        if let Some(handler) = &mut self.on_data {
            handler(bytes);
        }
    }

    pub(crate) fn oversized_value(&mut self) {
        if let Some(handler) = &mut self.on_oversized_value {
            handler();
        }
    }

    pub(crate) fn oversized_symbol_table(&mut self) {
        if let Some(handler) = &mut self.on_oversized_symbol_table {
            handler();
        }
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("on_data", &self.on_data.is_some())
            .field("on_oversized_value", &self.on_oversized_value.is_some())
            .field(
                "on_oversized_symbol_table",
                &self.on_oversized_symbol_table.is_some(),
            )
            .finish()
    }
}

/// Everything an [`IncrementalReader`](crate::IncrementalReader) is built from.
pub struct ReaderOptions {
    pub buffer: BufferConfiguration,
    pub catalog: Arc<dyn Catalog>,
}

impl Default for ReaderOptions {
    /// Default buffer configuration and an empty in-memory catalog.
    fn default() -> Self {
        Self {
            buffer: BufferConfiguration::default(),
            catalog: Arc::new(MemoryCatalog::new()),
        }
    }
}

impl ReaderOptions {
    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<dyn Catalog>) -> Self {
        self.catalog = catalog;
        self
    }

    #[must_use]
    pub fn with_buffer(mut self, buffer: BufferConfiguration) -> Self {
        self.buffer = buffer;
        self
    }
}

impl fmt::Debug for ReaderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderOptions")
            .field("buffer", &self.buffer)
            .finish_non_exhaustive()
    }
}
