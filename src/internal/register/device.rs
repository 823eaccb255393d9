//! Device-wide register view.
//!
//! The device block owns reset, the global DMA enable and feature mask, the
//! performance counters, and the shared interrupt mask/status pair.

use super::{RegisterMap, reg_bit_ops, reg_ro, reg_rw};
use crate::hal::registers::{RegisterIo, RegisterWindow};

// =============================================================================
// Control Register Bits
// =============================================================================

/// Device reset: held while set
pub const CTRL_RESET: u32 = 1 << 0;
/// Global DMA enable
pub const CTRL_DMA_ENABLE: u32 = 1 << 1;

// =============================================================================
// Status Register Bits
// =============================================================================

/// Device is out of reset and accepts configuration
pub const STATUS_READY: u32 = 1 << 0;
/// Reset sequence still running
pub const STATUS_RESET_ACTIVE: u32 = 1 << 1;

// =============================================================================
// DMA Configuration Register Bits
// =============================================================================

/// Burst transfers enabled
pub const DMACFG_BURST: u32 = 1 << 0;
/// Chained descriptor fetch
pub const DMACFG_CHAINED: u32 = 1 << 1;
/// Performance counters enabled
pub const DMACFG_PERF_COUNTERS: u32 = 1 << 2;
/// Completion timestamps written back into descriptors
pub const DMACFG_TIMESTAMPS: u32 = 1 << 3;
/// Burst length shift
pub const DMACFG_BURST_LEN_SHIFT: u32 = 8;
/// Burst length mask
pub const DMACFG_BURST_LEN_MASK: u32 = 0x3F << 8;

// =============================================================================
// Performance Control Register Bits
// =============================================================================

/// Counters running
pub const PERF_ENABLE: u32 = 1 << 0;
/// Clear all counters (self-clearing)
pub const PERF_CLEAR: u32 = 1 << 1;

// =============================================================================
// Interrupt Status / Mask Bits
// =============================================================================

/// Shift of the per-channel error bits in the interrupt registers
pub const INT_ERROR_SHIFT: u32 = 16;
/// Every interrupt source
pub const INT_ALL: u32 = 0xFFFF_FFFF;

/// Completion interrupt bit for a channel
#[inline(always)]
#[must_use]
pub const fn int_complete(channel: usize) -> u32 {
    1 << channel
}

/// Error interrupt bit for a channel
#[inline(always)]
#[must_use]
pub const fn int_error(channel: usize) -> u32 {
    1 << (INT_ERROR_SHIFT as usize + channel)
}

/// Both interrupt bits of every channel below `count`
#[must_use]
pub const fn int_channels(count: usize) -> u32 {
    let low = if count >= 16 {
        0xFFFF
    } else {
        (1u32 << count) - 1
    };
    low | (low << INT_ERROR_SHIFT)
}

// =============================================================================
// Device Register View
// =============================================================================

/// Typed view over the device register block
pub struct DeviceRegs<'a, R: RegisterIo> {
    window: RegisterWindow<'a, R>,
    map: &'a RegisterMap,
}

impl<'a, R: RegisterIo> DeviceRegs<'a, R> {
    /// Create a view of the device block at `base`
    #[inline(always)]
    pub fn new(io: &'a R, map: &'a RegisterMap, base: usize) -> Self {
        Self {
            window: RegisterWindow::new(io, base),
            map,
        }
    }

    reg_rw!(control, set_control, control, "device control register");
    reg_ro!(status, status, "device status register");
    reg_rw!(int_mask, set_int_mask, int_mask, "interrupt mask register");
    reg_rw!(int_status, set_int_status, int_status, "interrupt status register");
    reg_rw!(dma_config, set_dma_config, dma_config, "DMA configuration register");
    reg_rw!(perf_control, set_perf_control, perf_control, "performance control register");

    reg_bit_ops!(
        assert_reset,
        release_reset,
        control,
        CTRL_RESET,
        "device reset",
        "Assert",
        "Release"
    );
    reg_bit_ops!(
        enable_dma,
        disable_dma,
        control,
        CTRL_DMA_ENABLE,
        "device-wide DMA",
        "Enable",
        "Disable"
    );

    /// Check the READY bit
    #[inline(always)]
    pub fn is_ready(&self) -> bool {
        (self.status() & STATUS_READY) != 0
    }

    /// Acknowledge interrupt sources (write-1-to-clear)
    #[inline(always)]
    pub fn ack_interrupts(&self, bits: u32) {
        self.set_int_status(bits);
    }

    /// Mask every interrupt source
    #[inline(always)]
    pub fn mask_all_interrupts(&self) {
        self.set_int_mask(INT_ALL);
    }

    /// Unmask the given sources, leaving the rest masked
    #[inline(always)]
    pub fn unmask_interrupts(&self, bits: u32) {
        self.window.clear_bits(self.map.int_mask, bits);
    }
}
