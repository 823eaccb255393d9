//! Descriptor bit layout.
//!
//! Word order within a descriptor is fixed; where the control and status
//! bits sit inside those words is described by a [`DescriptorLayout`] so
//! variants with different encodings share one ring implementation.

/// Default ownership bit (set = device owns)
pub const OWN: u32 = 1 << 31;
/// Default interrupt-on-completion bit
pub const IRQ: u32 = 1 << 30;
/// Default start-of-packet bit
pub const SOP: u32 = 1 << 29;
/// Default end-of-packet bit
pub const EOP: u32 = 1 << 28;
/// Default buffer length mask
pub const LEN_MASK: u32 = 0xFFFF;
/// Default buffer length shift
pub const LEN_SHIFT: u32 = 0;
/// Default status error bits
pub const STATUS_ERRORS: u32 = 0x0000_FFFF;
/// Default timestamp-valid status bit
pub const STATUS_TS_VALID: u32 = 1 << 31;

/// Position of control and status fields within a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DescriptorLayout {
    /// Ownership bit in the control word
    pub own: u32,
    /// Start-of-packet bit in the control word
    pub sop: u32,
    /// End-of-packet bit in the control word
    pub eop: u32,
    /// Interrupt-request bit in the control word
    pub irq: u32,
    /// Length field mask, before shifting
    pub len_mask: u32,
    /// Length field shift in the control word
    pub len_shift: u32,
    /// Error bits in the status word
    pub status_error_mask: u32,
    /// Timestamp-valid bit in the status word
    pub ts_valid: u32,
}

impl DescriptorLayout {
    /// Default layout
    #[must_use]
    pub const fn new() -> Self {
        Self {
            own: OWN,
            sop: SOP,
            eop: EOP,
            irq: IRQ,
            len_mask: LEN_MASK,
            len_shift: LEN_SHIFT,
            status_error_mask: STATUS_ERRORS,
            ts_valid: STATUS_TS_VALID,
        }
    }

    /// Largest buffer length the length field can carry
    #[inline(always)]
    #[must_use]
    pub const fn max_len(&self) -> usize {
        self.len_mask as usize
    }

    /// Encode a length into control-word position
    #[inline(always)]
    #[must_use]
    pub const fn encode_len(&self, len: usize) -> u32 {
        ((len as u32) & self.len_mask) << self.len_shift
    }

    /// Decode the length field of a control word
    #[inline(always)]
    #[must_use]
    pub const fn decode_len(&self, control: u32) -> usize {
        ((control >> self.len_shift) & self.len_mask) as usize
    }

    /// Control bits of a single-buffer packet, without ownership
    #[inline(always)]
    #[must_use]
    pub const fn packet_flags(&self) -> u32 {
        self.sop | self.eop | self.irq
    }

    /// Whether the control flags overlap each other or the length field
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        let len_bits = self.len_mask << self.len_shift;
        let flags = [self.own, self.sop, self.eop, self.irq];
        let mut seen = len_bits;
        let mut i = 0;
        while i < flags.len() {
            if flags[i] == 0 || seen & flags[i] != 0 {
                return false;
            }
            seen |= flags[i];
            i += 1;
        }
        self.len_mask != 0 && self.status_error_mask & self.ts_valid == 0
    }
}

impl Default for DescriptorLayout {
    fn default() -> Self {
        Self::new()
    }
}
