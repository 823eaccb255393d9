//! Device interrupt status decoding.
//!
//! The interrupt status register carries one completion bit per channel in
//! its low half and one error bit per channel in its high half.
//! [`InterruptStatus`] splits a raw word into two channel sets.

use crate::internal::register::device::{INT_ERROR_SHIFT, int_channels};
use crate::sync::ChannelMask;

// =============================================================================
// Interrupt Status
// =============================================================================

/// Interrupt sources decoded from the device status register.
///
/// # Example
///
/// ```ignore
/// let status = InterruptStatus::from_raw(raw);
/// for ch in status.error.iter() {
///     // read the channel's error status
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterruptStatus {
    /// Channels that signalled completions
    pub complete: ChannelMask,
    /// Channels that signalled an error
    pub error: ChannelMask,
}

impl InterruptStatus {
    /// Decode a raw status word
    #[inline]
    pub const fn from_raw(status: u32) -> Self {
        Self {
            complete: ChannelMask(status & 0xFFFF),
            error: ChannelMask(status >> INT_ERROR_SHIFT),
        }
    }

    /// Raw value for acknowledging (write-1-to-clear)
    #[inline]
    pub const fn to_raw(&self) -> u32 {
        (self.complete.0 & 0xFFFF) | (self.error.0 << INT_ERROR_SHIFT)
    }

    /// Drop sources belonging to channels at or above `count`
    #[inline]
    pub const fn limit(self, count: usize) -> Self {
        Self::from_raw(self.to_raw() & int_channels(count))
    }

    /// Whether any source is set
    #[inline]
    pub const fn any(&self) -> bool {
        !self.complete.is_empty() || !self.error.is_empty()
    }

    /// Whether any channel signalled an error
    #[inline]
    pub const fn has_error(&self) -> bool {
        !self.error.is_empty()
    }

    /// Channels with any source set
    #[inline]
    pub const fn channels(&self) -> ChannelMask {
        ChannelMask(self.complete.0 | self.error.0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal::register::device::{int_complete, int_error};

    #[test]
    fn zero_has_no_sources() {
        let status = InterruptStatus::from_raw(0);
        assert!(!status.any());
        assert!(!status.has_error());
        assert_eq!(status, InterruptStatus::default());
    }

    #[test]
    fn halves_split_into_channel_sets() {
        let status = InterruptStatus::from_raw(int_complete(2) | int_error(5) | int_complete(5));

        assert_eq!(status.complete, ChannelMask::single(2) | ChannelMask::single(5));
        assert_eq!(status.error, ChannelMask::single(5));
        assert!(status.has_error());
        assert_eq!(status.channels().count(), 2);
    }

    #[test]
    fn to_raw_restores_word() {
        let raw = int_complete(0) | int_error(15) | int_complete(7);
        assert_eq!(InterruptStatus::from_raw(raw).to_raw(), raw);
    }

    #[test]
    fn limit_drops_unknown_channels() {
        let raw = int_complete(1) | int_complete(9) | int_error(3) | int_error(12);
        let status = InterruptStatus::from_raw(raw).limit(4);

        assert_eq!(status.complete, ChannelMask::single(1));
        assert_eq!(status.error, ChannelMask::single(3));
    }
}
