//! Buffer mapping HAL
//!
//! Translates upper-layer buffers into device-visible bus addresses. The
//! engine never assumes an identity mapping: every buffer handed to a ring
//! is mapped on enqueue and unmapped on reclaim or discard.

use core::fmt;

// =============================================================================
// Transfer Direction
// =============================================================================

/// Direction of a ring, and of the transfers it carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Host memory to device (transmit)
    ToDevice,
    /// Device to host memory (receive)
    FromDevice,
}

impl Direction {
    /// Both directions, TX first
    pub const ALL: [Direction; 2] = [Direction::ToDevice, Direction::FromDevice];

    /// Short name used in logs
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ToDevice => "tx",
            Self::FromDevice => "rx",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Bus Address
// =============================================================================

/// Device-visible address of a mapped buffer or descriptor array
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusAddr(pub u64);

impl BusAddr {
    /// The null bus address
    pub const NULL: BusAddr = BusAddr(0);

    /// Low 32 bits
    #[inline(always)]
    #[must_use]
    pub const fn low(self) -> u32 {
        self.0 as u32
    }

    /// High 32 bits
    #[inline(always)]
    #[must_use]
    pub const fn high(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Reassemble an address from its two words
    #[inline(always)]
    #[must_use]
    pub const fn from_words(low: u32, high: u32) -> Self {
        Self(((high as u64) << 32) | low as u64)
    }

    /// Address `bytes` past this one
    #[inline(always)]
    #[must_use]
    pub const fn offset(self, bytes: usize) -> Self {
        Self(self.0 + bytes as u64)
    }
}

// =============================================================================
// Mapper Trait
// =============================================================================

/// A buffer could not be made visible to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MappingError;

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("buffer mapping failed")
    }
}

/// Buffer-to-bus-address translation supplied by the platform.
///
/// `Buffer` is the upper layer's owned buffer handle. The engine holds the
/// handle while the device owns the matching descriptor and gives it back
/// on reclaim, so a mapping stays valid for exactly that span.
pub trait BufferMapper {
    /// Owned buffer handle carried through the rings
    type Buffer;

    /// Make `buffer` visible to the device and return its bus address.
    ///
    /// For [`Direction::ToDevice`] the implementation flushes caches as
    /// needed; for [`Direction::FromDevice`] it prepares the buffer to be
    /// written by the device.
    fn map(&self, buffer: &mut Self::Buffer, direction: Direction) -> Result<BusAddr, MappingError>;

    /// Release a mapping created by [`map`](Self::map).
    ///
    /// `len` is the length the buffer was posted with.
    fn unmap(&self, addr: BusAddr, len: usize, direction: Direction);

    /// Bus address of a descriptor array in host memory.
    ///
    /// The default is an identity mapping of the pointer.
    fn map_descriptors(&self, ptr: *const u8, bytes: usize) -> Result<BusAddr, MappingError> {
        let _ = bytes;
        Ok(BusAddr(ptr as usize as u64))
    }
}

impl<T: BufferMapper + ?Sized> BufferMapper for &T {
    type Buffer = T::Buffer;

    #[inline(always)]
    fn map(&self, buffer: &mut Self::Buffer, direction: Direction) -> Result<BusAddr, MappingError> {
        (**self).map(buffer, direction)
    }

    #[inline(always)]
    fn unmap(&self, addr: BusAddr, len: usize, direction: Direction) {
        (**self).unmap(addr, len, direction);
    }

    #[inline(always)]
    fn map_descriptors(&self, ptr: *const u8, bytes: usize) -> Result<BusAddr, MappingError> {
        (**self).map_descriptors(ptr, bytes)
    }
}
