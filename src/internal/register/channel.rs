//! Per-channel register view.
//!
//! Each channel has a private window holding its ring control, error status,
//! descriptor control, and the base/size/head registers of both rings.

use super::{RegisterMap, reg_bit_ops, reg_ro, reg_rw};
use crate::hal::mapping::{BusAddr, Direction};
use crate::hal::registers::{RegisterIo, RegisterWindow};

// =============================================================================
// Ring Control Register Bits
// =============================================================================

/// TX ring fetch enabled
pub const RING_TX_EN: u32 = 1 << 0;
/// RX ring fetch enabled
pub const RING_RX_EN: u32 = 1 << 1;
/// Both ring enables
pub const RING_EN_ALL: u32 = RING_TX_EN | RING_RX_EN;
/// Channel-local reset: held while set
pub const RING_RESET: u32 = 1 << 8;

// =============================================================================
// Ring Status Register Bits
// =============================================================================

/// TX engine is fetching descriptors
pub const RING_STATUS_TX_ACTIVE: u32 = 1 << 0;
/// RX engine is fetching descriptors
pub const RING_STATUS_RX_ACTIVE: u32 = 1 << 1;

// =============================================================================
// Descriptor Control Register Bits
// =============================================================================

/// Descriptors are fetched as a contiguous chain
pub const DESC_CHAINED: u32 = 1 << 0;
/// Hardware writes completion timestamps
pub const DESC_TIMESTAMP: u32 = 1 << 1;
/// Descriptor size in 32-bit words, shift
pub const DESC_WORDS_SHIFT: u32 = 4;
/// Descriptor size in 32-bit words, mask
pub const DESC_WORDS_MASK: u32 = 0xF << 4;

// =============================================================================
// Channel Register View
// =============================================================================

/// Typed view over one channel's register window
pub struct ChannelRegs<'a, R: RegisterIo> {
    window: RegisterWindow<'a, R>,
    map: &'a RegisterMap,
}

impl<'a, R: RegisterIo> ChannelRegs<'a, R> {
    /// Create a view of the channel window at absolute offset `window`
    #[inline(always)]
    pub fn new(io: &'a R, map: &'a RegisterMap, window: usize) -> Self {
        Self {
            window: RegisterWindow::new(io, window),
            map,
        }
    }

    reg_rw!(ring_control, set_ring_control, ring_control, "ring control register");
    reg_ro!(ring_status, ring_status, "ring status register");
    reg_rw!(error_status, set_error_status, error_status, "error status register");
    reg_rw!(desc_control, set_desc_control, desc_control, "descriptor control register");

    reg_bit_ops!(
        enable_rings,
        disable_rings,
        ring_control,
        RING_EN_ALL,
        "both ring engines",
        "Enable",
        "Disable"
    );
    reg_bit_ops!(
        assert_reset,
        release_reset,
        ring_control,
        RING_RESET,
        "channel-local reset",
        "Assert",
        "Release"
    );

    /// Acknowledge error status bits (write-1-to-clear)
    #[inline(always)]
    pub fn clear_errors(&self, bits: u32) {
        self.set_error_status(bits);
    }

    /// Program a ring's base address and size
    pub fn set_ring_base(&self, direction: Direction, base: BusAddr, size: usize) {
        let (lo, hi, sz) = match direction {
            Direction::ToDevice => (self.map.tx_base_lo, self.map.tx_base_hi, self.map.tx_size),
            Direction::FromDevice => (self.map.rx_base_lo, self.map.rx_base_hi, self.map.rx_size),
        };
        self.window.write(lo, base.low());
        self.window.write(hi, base.high());
        self.window.write(sz, size as u32);
    }

    /// Write a ring's head doorbell
    #[inline(always)]
    pub fn ring_doorbell(&self, direction: Direction, head: usize) {
        let offset = match direction {
            Direction::ToDevice => self.map.tx_head,
            Direction::FromDevice => self.map.rx_head,
        };
        self.window.write(offset, head as u32);
    }
}
