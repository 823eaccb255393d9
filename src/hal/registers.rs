//! Register access shim.
//!
//! The engine never dereferences device memory itself. Every register access
//! goes through [`RegisterIo`], which maps a byte offset to a 32-bit read or
//! write. [`Mmio`] is the memory-mapped implementation; tests substitute a
//! recording mock.

/// Opaque 32-bit register read/write primitive.
///
/// Offsets are byte offsets in the device's register space. Implementations
/// must perform each access exactly once and in program order (volatile
/// semantics for MMIO).
pub trait RegisterIo {
    /// Read the 32-bit register at `offset`
    fn read32(&self, offset: usize) -> u32;

    /// Write `value` to the 32-bit register at `offset`
    fn write32(&self, offset: usize, value: u32);
}

impl<T: RegisterIo + ?Sized> RegisterIo for &T {
    #[inline(always)]
    fn read32(&self, offset: usize) -> u32 {
        (**self).read32(offset)
    }

    #[inline(always)]
    fn write32(&self, offset: usize, value: u32) {
        (**self).write32(offset, value);
    }
}

/// Memory-mapped register space starting at a fixed address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mmio {
    base: usize,
}

impl Mmio {
    /// Create a register space rooted at `base`.
    ///
    /// # Safety
    ///
    /// `base` must be the start of a mapped, 4-byte aligned register block
    /// that stays valid for the lifetime of this value, and every offset the
    /// engine derives from its [`RegisterMap`](crate::RegisterMap) must fall
    /// inside that block.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    /// Base address of the register block
    #[inline(always)]
    pub const fn base(&self) -> usize {
        self.base
    }
}

impl RegisterIo for Mmio {
    #[inline(always)]
    fn read32(&self, offset: usize) -> u32 {
        // SAFETY: `Mmio::new` requires the block to be mapped and aligned.
        unsafe { core::ptr::read_volatile((self.base + offset) as *const u32) }
    }

    #[inline(always)]
    fn write32(&self, offset: usize, value: u32) {
        // SAFETY: `Mmio::new` requires the block to be mapped and aligned.
        unsafe { core::ptr::write_volatile((self.base + offset) as *mut u32, value) }
    }
}

/// A register window: a [`RegisterIo`] plus a base offset.
///
/// Provides the read-modify-write helpers used by the typed register views.
pub(crate) struct RegisterWindow<'a, R: RegisterIo> {
    io: &'a R,
    base: usize,
}

impl<'a, R: RegisterIo> RegisterWindow<'a, R> {
    /// Create a window at `base` within `io`
    #[inline(always)]
    pub(crate) fn new(io: &'a R, base: usize) -> Self {
        Self { io, base }
    }

    /// Read a register relative to the window base
    #[inline(always)]
    pub(crate) fn read(&self, offset: usize) -> u32 {
        self.io.read32(self.base + offset)
    }

    /// Write a register relative to the window base
    #[inline(always)]
    pub(crate) fn write(&self, offset: usize, value: u32) {
        self.io.write32(self.base + offset, value);
    }

    /// Read-modify-write a register
    #[inline(always)]
    pub(crate) fn modify<F>(&self, offset: usize, f: F)
    where
        F: FnOnce(u32) -> u32,
    {
        let value = self.read(offset);
        self.write(offset, f(value));
    }

    /// Set bits in a register (read-modify-write)
    #[inline(always)]
    pub(crate) fn set_bits(&self, offset: usize, bits: u32) {
        self.modify(offset, |v| v | bits);
    }

    /// Clear bits in a register (read-modify-write)
    #[inline(always)]
    pub(crate) fn clear_bits(&self, offset: usize, bits: u32) {
        self.modify(offset, |v| v & !bits);
    }
}
