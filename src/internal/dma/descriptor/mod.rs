//! DMA descriptor record.
//!
//! A descriptor points to one data buffer and carries the control/status
//! bits that hand it between software and the device. Exactly one side owns
//! a descriptor at a time; only the owner writes it.

pub mod layout;

use core::sync::atomic::{Ordering, fence};

pub use layout::DescriptorLayout;

use crate::hal::mapping::BusAddr;

/// Volatile cell wrapper for descriptor fields
///
/// Ensures all accesses are volatile to prevent compiler optimization
/// from reordering or caching descriptor field accesses.
#[repr(transparent)]
pub(crate) struct VolatileCell<T: Copy> {
    value: core::cell::UnsafeCell<T>,
}

// SAFETY: all access is through volatile operations on naturally aligned
// 32-bit words, and ring locking serializes software writers.
unsafe impl<T: Copy> Sync for VolatileCell<T> {}

impl<T: Copy> VolatileCell<T> {
    /// Create a new volatile cell with the given initial value
    #[inline(always)]
    pub const fn new(value: T) -> Self {
        Self {
            value: core::cell::UnsafeCell::new(value),
        }
    }

    /// Read the value (volatile read)
    #[inline(always)]
    pub fn get(&self) -> T {
        // SAFETY: the pointer comes from our own UnsafeCell.
        unsafe { core::ptr::read_volatile(self.value.get()) }
    }

    /// Write a value (volatile write)
    #[inline(always)]
    pub fn set(&self, value: T) {
        // SAFETY: the pointer comes from our own UnsafeCell.
        unsafe { core::ptr::write_volatile(self.value.get(), value) }
    }

    /// Update the value using a function (read-modify-write)
    #[inline(always)]
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(T) -> T,
    {
        let old = self.get();
        self.set(f(old));
    }
}

/// Hardware DMA descriptor: eight little-endian 32-bit words.
#[repr(C, align(16))]
pub struct Descriptor {
    /// Ownership, packet flags and buffer length
    control: VolatileCell<u32>,
    /// Completion status written back by the device
    status: VolatileCell<u32>,
    /// Buffer bus address, low word
    addr_lo: VolatileCell<u32>,
    /// Buffer bus address, high word
    addr_hi: VolatileCell<u32>,
    /// Completion timestamp, low word
    ts_lo: VolatileCell<u32>,
    /// Completion timestamp, high word
    ts_hi: VolatileCell<u32>,
    _reserved: [u32; 2],
}

impl Descriptor {
    /// Size of the descriptor in bytes
    pub const SIZE: usize = 32;

    /// Size of the descriptor in 32-bit words
    pub const WORDS: usize = Self::SIZE / 4;

    /// Create a new zeroed, software-owned descriptor.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            control: VolatileCell::new(0),
            status: VolatileCell::new(0),
            addr_lo: VolatileCell::new(0),
            addr_hi: VolatileCell::new(0),
            ts_lo: VolatileCell::new(0),
            ts_hi: VolatileCell::new(0),
            _reserved: [0; 2],
        }
    }

    /// Check if the device owns the descriptor.
    #[inline(always)]
    #[must_use]
    pub fn is_owned(&self, layout: &DescriptorLayout) -> bool {
        (self.control.get() & layout.own) != 0
    }

    /// Fill in a single-buffer packet and hand it to the device.
    ///
    /// Ownership is set last, after a release fence, so the device never
    /// observes a half-written descriptor.
    pub fn arm(&self, layout: &DescriptorLayout, addr: BusAddr, len: usize) {
        self.addr_lo.set(addr.low());
        self.addr_hi.set(addr.high());
        self.status.set(0);
        self.ts_lo.set(0);
        self.ts_hi.set(0);
        self.control
            .set(layout.packet_flags() | layout.encode_len(len));

        fence(Ordering::Release);
        self.control.update(|v| v | layout.own);
    }

    /// Acquire barrier after observing software ownership.
    ///
    /// Reads of the written-back fields must not be satisfied before the
    /// ownership check.
    #[inline(always)]
    pub fn acquire(&self) {
        fence(Ordering::Acquire);
    }

    /// Length field (requested on arm, transferred after completion)
    #[inline(always)]
    #[must_use]
    pub fn length(&self, layout: &DescriptorLayout) -> usize {
        layout.decode_len(self.control.get())
    }

    /// Raw status word
    #[inline(always)]
    #[must_use]
    pub fn status(&self) -> u32 {
        self.status.get()
    }

    /// Error bits of the status word
    #[inline(always)]
    #[must_use]
    pub fn error_bits(&self, layout: &DescriptorLayout) -> u32 {
        self.status.get() & layout.status_error_mask
    }

    /// Timestamp, if the device marked one valid
    #[inline(always)]
    #[must_use]
    pub fn timestamp(&self, layout: &DescriptorLayout) -> Option<u64> {
        if self.status.get() & layout.ts_valid == 0 {
            return None;
        }
        Some((u64::from(self.ts_hi.get()) << 32) | u64::from(self.ts_lo.get()))
    }

    /// Buffer bus address
    #[inline(always)]
    #[must_use]
    pub fn addr(&self) -> BusAddr {
        BusAddr::from_words(self.addr_lo.get(), self.addr_hi.get())
    }

    /// Raw control word
    #[inline(always)]
    #[must_use]
    pub fn raw_control(&self) -> u32 {
        self.control.get()
    }

    /// Zero every field, leaving the descriptor software-owned.
    pub fn clear(&self) {
        self.control.set(0);
        self.status.set(0);
        self.addr_lo.set(0);
        self.addr_hi.set(0);
        self.ts_lo.set(0);
        self.ts_hi.set(0);
    }

    /// Device-side completion: write back length, status and timestamp,
    /// then return ownership to software.
    #[cfg(test)]
    pub(crate) fn complete(
        &self,
        layout: &DescriptorLayout,
        len: usize,
        status: u32,
        timestamp: Option<u64>,
    ) {
        let mut status = status & !layout.ts_valid;
        if let Some(ts) = timestamp {
            self.ts_lo.set(ts as u32);
            self.ts_hi.set((ts >> 32) as u32);
            status |= layout.ts_valid;
        }
        self.status.set(status);
        let control = self.control.get() & !(layout.len_mask << layout.len_shift);
        self.control.set(control | layout.encode_len(len));
        fence(Ordering::Release);
        self.control.update(|v| v & !layout.own);
    }
}

impl Default for Descriptor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_is_32_bytes_16_aligned() {
        assert_eq!(core::mem::size_of::<Descriptor>(), Descriptor::SIZE);
        assert_eq!(core::mem::align_of::<Descriptor>(), 16);
        assert_eq!(Descriptor::WORDS, 8);
    }

    #[test]
    fn new_descriptor_is_software_owned() {
        let layout = DescriptorLayout::new();
        let desc = Descriptor::new();
        assert!(!desc.is_owned(&layout));
        assert_eq!(desc.raw_control(), 0);
    }

    #[test]
    fn arm_sets_fields_then_ownership() {
        let layout = DescriptorLayout::new();
        let desc = Descriptor::new();

        desc.arm(&layout, BusAddr(0x1_2000_0040), 1514);

        assert!(desc.is_owned(&layout));
        assert_eq!(desc.addr(), BusAddr(0x1_2000_0040));
        assert_eq!(desc.length(&layout), 1514);
        let control = desc.raw_control();
        assert_ne!(control & layout.sop, 0);
        assert_ne!(control & layout.eop, 0);
        assert_ne!(control & layout.irq, 0);
    }

    #[test]
    fn completion_returns_ownership_with_status() {
        let layout = DescriptorLayout::new();
        let desc = Descriptor::new();

        desc.arm(&layout, BusAddr(0x1000), 2048);
        desc.complete(&layout, 60, 0x4, Some(0xAABB_CCDD_0011_2233));
        desc.acquire();

        assert!(!desc.is_owned(&layout));
        assert_eq!(desc.length(&layout), 60);
        assert_eq!(desc.error_bits(&layout), 0x4);
        assert_eq!(desc.timestamp(&layout), Some(0xAABB_CCDD_0011_2233));
    }

    #[test]
    fn timestamp_absent_without_valid_bit() {
        let layout = DescriptorLayout::new();
        let desc = Descriptor::new();

        desc.arm(&layout, BusAddr(0x1000), 64);
        desc.complete(&layout, 64, 0, None);
        assert_eq!(desc.timestamp(&layout), None);
    }

    #[test]
    fn clear_zeroes_everything() {
        let layout = DescriptorLayout::new();
        let desc = Descriptor::new();

        desc.arm(&layout, BusAddr(0xDEAD_0000), 100);
        desc.clear();
        assert!(!desc.is_owned(&layout));
        assert_eq!(desc.addr(), BusAddr::NULL);
        assert_eq!(desc.status(), 0);
    }
}
