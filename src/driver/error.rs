//! Error types for the DMA ring engine
//!
//! Errors are organized by domain for better diagnostics:
//! - [`ConfigError`]: Initialization and configuration failures
//! - [`DmaError`]: Ring storage, capacity and mapping issues
//! - [`IoError`]: Runtime and hardware failures
//!
//! The unified [`Error`] enum wraps all domain errors and is returned
//! by most engine methods. Hardware-reported fault classes are a separate
//! bit set, [`ErrorCategories`], since several can be raised at once.

use bitflags::bitflags;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Configuration and initialization errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Engine already initialized
    AlreadyInitialized,
    /// Engine not initialized yet
    NotInitialized,
    /// Invalid configuration parameter
    InvalidConfig,
    /// Channel index out of range
    InvalidChannel,
    /// Ring capacity below 2 or above the device maximum
    InvalidCapacity,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ConfigError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConfigError::AlreadyInitialized => "already initialized",
            ConfigError::NotInitialized => "not initialized",
            ConfigError::InvalidConfig => "invalid configuration",
            ConfigError::InvalidChannel => "invalid channel",
            ConfigError::InvalidCapacity => "invalid ring capacity",
        }
    }
}

// =============================================================================
// DMA Errors
// =============================================================================

/// Ring storage and buffer errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaError {
    /// Descriptor or slot storage could not be allocated
    AllocationFailed,
    /// Ring is full; retry after reclaiming
    ResourceExhausted,
    /// Buffer could not be mapped for the device
    MappingFailed,
    /// Buffer length is zero or exceeds the descriptor length field
    InvalidLength,
}

impl core::fmt::Display for DmaError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DmaError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            DmaError::AllocationFailed => "allocation failed",
            DmaError::ResourceExhausted => "ring full",
            DmaError::MappingFailed => "buffer mapping failed",
            DmaError::InvalidLength => "invalid buffer length",
        }
    }
}

impl From<crate::hal::mapping::MappingError> for DmaError {
    fn from(_: crate::hal::mapping::MappingError) -> Self {
        DmaError::MappingFailed
    }
}

// =============================================================================
// I/O Errors
// =============================================================================

/// Runtime and hardware errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IoError {
    /// Hardware did not reach the expected state before the deadline
    HardwareTimeout,
    /// Invalid state for operation (e.g., ring not enabled)
    InvalidState,
    /// Channel exhausted its recovery budget or hit a fatal fault
    ChannelDown,
    /// Unrecoverable device fault
    Fatal,
}

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl IoError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            IoError::HardwareTimeout => "hardware timeout",
            IoError::InvalidState => "invalid state for operation",
            IoError::ChannelDown => "channel down",
            IoError::Fatal => "fatal device error",
        }
    }
}

// =============================================================================
// Unified Error Type
// =============================================================================

/// This enum wraps all domain-specific errors for unified error handling.
///
/// Match on the inner domain error for specific handling:
/// ```ignore
/// match result {
///     Err(Error::Dma(DmaError::ResourceExhausted)) => { /* back off */ }
///     Err(Error::Io(IoError::ChannelDown)) => { /* reinit_channel */ }
///     _ => {}
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Configuration error
    Config(ConfigError),
    /// DMA error
    Dma(DmaError),
    /// I/O error
    Io(IoError),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Config(e) => write!(f, "config: {}", e.as_str()),
            Error::Dma(e) => write!(f, "dma: {}", e.as_str()),
            Error::Io(e) => write!(f, "io: {}", e.as_str()),
        }
    }
}

impl core::error::Error for Error {}

// From impls for automatic conversion
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<DmaError> for Error {
    fn from(e: DmaError) -> Self {
        Error::Dma(e)
    }
}

impl From<IoError> for Error {
    fn from(e: IoError) -> Self {
        Error::Io(e)
    }
}

impl From<crate::hal::mapping::MappingError> for Error {
    fn from(e: crate::hal::mapping::MappingError) -> Self {
        Error::Dma(e.into())
    }
}

/// Result type alias for engine operations
pub type Result<T> = core::result::Result<T, Error>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = core::result::Result<T, ConfigError>;

/// Result type alias for DMA operations
pub type DmaResult<T> = core::result::Result<T, DmaError>;

/// Result type alias for I/O operations
pub type IoResult<T> = core::result::Result<T, IoError>;

// =============================================================================
// Rejected Enqueue
// =============================================================================

/// A failed enqueue: the error together with the caller's buffer.
///
/// The engine never keeps a buffer it could not post, so the caller can
/// retry or recycle it.
#[derive(Debug)]
pub struct Rejected<B> {
    /// Why the buffer was not posted
    pub error: Error,
    /// The buffer, returned untouched
    pub buffer: B,
}

impl<B> Rejected<B> {
    /// Pair an error with the buffer it rejected
    pub fn new(error: impl Into<Error>, buffer: B) -> Self {
        Self {
            error: error.into(),
            buffer,
        }
    }

    /// Whether the rejection is ring-full backpressure
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.error == Error::Dma(DmaError::ResourceExhausted)
    }

    /// Split into error and buffer
    pub fn into_parts(self) -> (Error, B) {
        (self.error, self.buffer)
    }
}

impl<B> From<Rejected<B>> for Error {
    fn from(rejected: Rejected<B>) -> Self {
        rejected.error
    }
}

// =============================================================================
// Hardware Error Categories
// =============================================================================

bitflags! {
    /// Fault classes reported by a channel's error-status register.
    ///
    /// Bit positions match the register, so a raw status word converts with
    /// [`ErrorCategories::from_bits_truncate`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ErrorCategories: u32 {
        /// Malformed or inconsistent descriptor
        const DESCRIPTOR = 1 << 0;
        /// Device found the ring full
        const RING_FULL = 1 << 1;
        /// Descriptor pointed outside mapped memory
        const INVALID_ADDRESS = 1 << 2;
        /// Bus transaction error
        const BUS = 1 << 3;
        /// Data integrity error
        const DATA = 1 << 4;
        /// FIFO overflow or underflow
        const FIFO = 1 << 5;
        /// Internal hardware fault
        const HARDWARE_FAULT = 1 << 6;
        /// No progress within the stall threshold
        const WATCHDOG_TIMEOUT = 1 << 7;
        /// Unrecoverable; the channel needs reinitialization
        const FATAL = 1 << 31;
    }
}

impl ErrorCategories {
    /// Categories a recovery action may clear
    pub const RECOVERABLE: Self = Self::all().difference(Self::FATAL);

    /// Categories that require discarding in-flight descriptors
    pub const RING_CORRUPTING: Self = Self::DESCRIPTOR.union(Self::RING_FULL);

    /// Whether any fatal category is present
    #[inline(always)]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        self.contains(Self::FATAL)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ErrorCategories {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "ErrorCategories({=u32:#x})", self.bits());
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
