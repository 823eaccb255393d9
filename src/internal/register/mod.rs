//! Register map and typed register views.
//!
//! Offsets are not compile-time constants: they come from the
//! [`RegisterMap`] carried by the engine's capability description, so one
//! engine drives every silicon variant. Bit definitions are fixed.

pub mod channel;
pub mod device;

/// Register offsets for one device family.
///
/// Device-wide offsets are relative to the engine's register base. Channel
/// offsets are relative to a channel window, which sits at
/// `channel_base + id * channel_stride` from the register base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterMap {
    /// Device control register (reset, DMA enable)
    pub control: usize,
    /// Device status register (ready)
    pub status: usize,
    /// Interrupt mask register (set bit = source masked)
    pub int_mask: usize,
    /// Interrupt status register (write-1-to-clear)
    pub int_status: usize,
    /// DMA configuration / feature mask register
    pub dma_config: usize,
    /// Performance counter control register
    pub perf_control: usize,
    /// Offset of channel 0's window
    pub channel_base: usize,
    /// Distance between consecutive channel windows
    pub channel_stride: usize,
    /// Channel ring control register (enables, local reset)
    pub ring_control: usize,
    /// Channel ring status register
    pub ring_status: usize,
    /// Channel error status register (write-1-to-clear)
    pub error_status: usize,
    /// Channel descriptor control register
    pub desc_control: usize,
    /// TX ring base address, low word
    pub tx_base_lo: usize,
    /// TX ring base address, high word
    pub tx_base_hi: usize,
    /// TX ring size in descriptors
    pub tx_size: usize,
    /// TX head doorbell
    pub tx_head: usize,
    /// RX ring base address, low word
    pub rx_base_lo: usize,
    /// RX ring base address, high word
    pub rx_base_hi: usize,
    /// RX ring size in descriptors
    pub rx_size: usize,
    /// RX head doorbell
    pub rx_head: usize,
}

impl RegisterMap {
    /// Default register layout
    #[must_use]
    pub const fn new() -> Self {
        Self {
            control: 0x00,
            status: 0x04,
            int_mask: 0x08,
            int_status: 0x0C,
            dma_config: 0x10,
            perf_control: 0x14,
            channel_base: crate::internal::constants::DEFAULT_CHANNEL_BASE,
            channel_stride: crate::internal::constants::DEFAULT_CHANNEL_STRIDE,
            ring_control: 0x00,
            ring_status: 0x04,
            error_status: 0x08,
            desc_control: 0x0C,
            tx_base_lo: 0x10,
            tx_base_hi: 0x14,
            tx_size: 0x18,
            tx_head: 0x1C,
            rx_base_lo: 0x20,
            rx_base_hi: 0x24,
            rx_size: 0x28,
            rx_head: 0x2C,
        }
    }

    /// Offset of a channel's register window from the device base
    #[inline(always)]
    #[must_use]
    pub const fn channel_offset(&self, channel: usize) -> usize {
        self.channel_base + channel * self.channel_stride
    }
}

impl Default for RegisterMap {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Register Access Macros
// =============================================================================

/// Generate read/write accessor methods for a register named in the map.
///
/// # Example
/// ```ignore
/// impl<R: RegisterIo> DeviceRegs<'_, R> {
///     reg_rw!(control, set_control, control, "device control register");
/// }
/// ```
macro_rules! reg_rw {
    ($read_fn:ident, $write_fn:ident, $field:ident, $doc:expr) => {
        #[doc = concat!("Read the ", $doc)]
        #[inline(always)]
        pub fn $read_fn(&self) -> u32 {
            self.window.read(self.map.$field)
        }

        #[doc = concat!("Write the ", $doc)]
        #[inline(always)]
        pub fn $write_fn(&self, value: u32) {
            self.window.write(self.map.$field, value)
        }
    };
}

/// Generate a read-only accessor method for a register named in the map.
macro_rules! reg_ro {
    ($read_fn:ident, $field:ident, $doc:expr) => {
        #[doc = concat!("Read the ", $doc)]
        #[inline(always)]
        pub fn $read_fn(&self) -> u32 {
            self.window.read(self.map.$field)
        }
    };
}

/// Generate set/clear bit operation methods for a register named in the map.
macro_rules! reg_bit_ops {
    ($set_fn:ident, $clear_fn:ident, $field:ident, $bit:expr, $what:expr, $set_verb:expr, $clear_verb:expr) => {
        #[doc = concat!($set_verb, " ", $what)]
        #[inline(always)]
        pub fn $set_fn(&self) {
            self.window.set_bits(self.map.$field, $bit)
        }

        #[doc = concat!($clear_verb, " ", $what)]
        #[inline(always)]
        pub fn $clear_fn(&self) {
            self.window.clear_bits(self.map.$field, $bit)
        }
    };
}

pub(crate) use reg_bit_ops;
pub(crate) use reg_ro;
pub(crate) use reg_rw;
