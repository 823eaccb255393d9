//! Testing utilities and mock implementations
//!
//! Host-side stand-ins for the hardware and platform services the engine
//! reaches through its HAL traits: a register file, a buffer mapper, a
//! simulated clock with a matching delay, and a loopback device model that
//! moves bytes between rings through descriptor bus addresses.
//!
//! Only available when running `cargo test`.

#![allow(missing_docs)]
#![allow(clippy::std_instead_of_core, clippy::std_instead_of_alloc)]

extern crate std;

use core::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::vec::Vec;

use crate::driver::channel::Channel;
use crate::hal::clock::{Clock, Instant};
use crate::hal::mapping::{BufferMapper, BusAddr, Direction, MappingError};
use crate::hal::registers::RegisterIo;
use crate::internal::constants::MAX_CHANNELS;
use crate::internal::register::RegisterMap;
use crate::internal::register::device::{
    CTRL_RESET, STATUS_READY, STATUS_RESET_ACTIVE, int_complete, int_error,
};

// =============================================================================
// Mock Registers
// =============================================================================

/// In-memory register file with the device's side effects.
///
/// - The interrupt status and every channel's error status are
///   write-1-to-clear.
/// - Releasing the device reset raises READY (unless disabled with
///   [`set_ready_on_reset`](Self::set_ready_on_reset)).
/// - Sticky error bits reappear in a channel's error status however often
///   they are cleared.
///
/// Offsets follow the default [`RegisterMap`] with the device at offset 0.
#[derive(Debug)]
pub struct MockRegisters {
    map: RegisterMap,
    values: RefCell<BTreeMap<usize, u32>>,
    write_log: RefCell<Vec<(usize, u32)>>,
    sticky: RefCell<BTreeMap<usize, u32>>,
    ready_on_reset: Cell<bool>,
}

impl Default for MockRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRegisters {
    pub fn new() -> Self {
        Self {
            map: RegisterMap::new(),
            values: RefCell::new(BTreeMap::new()),
            write_log: RefCell::new(Vec::new()),
            sticky: RefCell::new(BTreeMap::new()),
            ready_on_reset: Cell::new(true),
        }
    }

    /// Whether releasing the device reset raises READY
    pub fn set_ready_on_reset(&self, ready: bool) {
        self.ready_on_reset.set(ready);
    }

    /// Current value of a register, without logging
    pub fn peek(&self, offset: usize) -> u32 {
        let value = self.values.borrow().get(&offset).copied().unwrap_or(0);
        value | self.sticky.borrow().get(&offset).copied().unwrap_or(0)
    }

    /// Set a register without logging or side effects
    pub fn poke(&self, offset: usize, value: u32) {
        self.values.borrow_mut().insert(offset, value);
    }

    /// Every write so far, in order
    pub fn writes(&self) -> Vec<(usize, u32)> {
        self.write_log.borrow().clone()
    }

    /// Number of writes so far
    pub fn write_count(&self) -> usize {
        self.write_log.borrow().len()
    }

    /// Forget logged writes
    pub fn clear_log(&self) {
        self.write_log.borrow_mut().clear();
    }

    /// Absolute offset of a channel's error status register
    pub fn error_status_offset(&self, channel: usize) -> usize {
        self.map.channel_offset(channel) + self.map.error_status
    }

    /// Latch error bits that survive clearing. Zero removes them.
    pub fn set_sticky_error(&self, channel: usize, bits: u32) {
        let offset = self.error_status_offset(channel);
        if bits == 0 {
            self.sticky.borrow_mut().remove(&offset);
        } else {
            self.sticky.borrow_mut().insert(offset, bits);
        }
    }

    /// Latch error bits in a channel and raise its error interrupt
    pub fn inject_error(&self, channel: usize, bits: u32) {
        let offset = self.error_status_offset(channel);
        self.set_bits(offset, bits);
        self.raise_interrupt(int_error(channel));
    }

    /// Set interrupt status bits
    pub fn raise_interrupt(&self, bits: u32) {
        self.set_bits(self.map.int_status, bits);
    }

    fn set_bits(&self, offset: usize, bits: u32) {
        let mut values = self.values.borrow_mut();
        let entry = values.entry(offset).or_insert(0);
        *entry |= bits;
    }

    fn is_w1c(&self, offset: usize) -> bool {
        offset == self.map.int_status
            || (0..MAX_CHANNELS).any(|ch| offset == self.error_status_offset(ch))
    }
}

impl RegisterIo for MockRegisters {
    fn read32(&self, offset: usize) -> u32 {
        self.peek(offset)
    }

    fn write32(&self, offset: usize, value: u32) {
        self.write_log.borrow_mut().push((offset, value));

        if self.is_w1c(offset) {
            let mut values = self.values.borrow_mut();
            let entry = values.entry(offset).or_insert(0);
            *entry &= !value;
            return;
        }

        self.poke(offset, value);

        if offset == self.map.control {
            let status = self.peek(self.map.status);
            let status = if value & CTRL_RESET != 0 {
                (status & !STATUS_READY) | STATUS_RESET_ACTIVE
            } else if self.ready_on_reset.get() {
                (status & !STATUS_RESET_ACTIVE) | STATUS_READY
            } else {
                status & !STATUS_RESET_ACTIVE
            };
            self.poke(self.map.status, status);
        }
    }
}

// =============================================================================
// Mock Mapper
// =============================================================================

/// Identity mapper for `Vec<u8>` buffers: the bus address is the heap
/// pointer.
#[derive(Debug, Default)]
pub struct MockMapper {
    mapped: Cell<usize>,
    unmapped: Cell<usize>,
    fail_next: Cell<bool>,
}

impl MockMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `map` call fail
    pub fn fail_next(&self, fail: bool) {
        self.fail_next.set(fail);
    }

    /// Successful `map` calls so far
    pub fn mapped(&self) -> usize {
        self.mapped.get()
    }

    /// `unmap` calls so far
    pub fn unmapped(&self) -> usize {
        self.unmapped.get()
    }
}

impl BufferMapper for MockMapper {
    type Buffer = Vec<u8>;

    fn map(&self, buffer: &mut Vec<u8>, _direction: Direction) -> Result<BusAddr, MappingError> {
        if self.fail_next.replace(false) {
            return Err(MappingError);
        }
        self.mapped.set(self.mapped.get() + 1);
        Ok(BusAddr(buffer.as_mut_ptr() as usize as u64))
    }

    fn unmap(&self, _addr: BusAddr, _len: usize, _direction: Direction) {
        self.unmapped.set(self.unmapped.get() + 1);
    }

    fn map_descriptors(&self, ptr: *const u8, _bytes: usize) -> Result<BusAddr, MappingError> {
        if self.fail_next.replace(false) {
            return Err(MappingError);
        }
        Ok(BusAddr(ptr as usize as u64))
    }
}

// =============================================================================
// Mock Clock and Delay
// =============================================================================

/// Simulated monotonic clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct MockClock {
    now_ns: Rc<Cell<u64>>,
    step_ns: Rc<Cell<u64>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_us(&self, us: u64) {
        self.advance_ns(us * 1_000);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance_ns(ms * 1_000_000);
    }

    fn advance_ns(&self, ns: u64) {
        self.now_ns.set(self.now_ns.get() + ns);
    }

    /// Advance by `us` on every [`Clock::now`] call, so spin loops end
    pub fn auto_advance_us(&self, us: u64) {
        self.step_ns.set(us * 1_000);
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        let now = Instant::from_micros(self.now_ns.get() / 1_000);
        self.advance_ns(self.step_ns.get());
        now
    }
}

/// Delay that advances a [`MockClock`] instead of waiting
#[derive(Debug)]
pub struct MockDelay {
    clock: MockClock,
    total_ns: u64,
}

impl MockDelay {
    pub fn new(clock: &MockClock) -> Self {
        Self {
            clock: clock.clone(),
            total_ns: 0,
        }
    }

    /// Total time "delayed"
    pub fn total_us(&self) -> u64 {
        self.total_ns / 1_000
    }
}

impl embedded_hal::delay::DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
        self.clock.advance_ns(u64::from(ns));
    }
}

// =============================================================================
// Loopback Device Model
// =============================================================================

/// Act as the device for one TX→RX hop.
///
/// Every TX descriptor the device owns is copied into the next RX
/// descriptor the device owns, through the bus addresses in the
/// descriptors. Both descriptors are completed and the completion
/// interrupts of both channels are raised. Returns the number of frames
/// moved.
pub fn loopback(regs: &MockRegisters, tx: &Channel<Vec<u8>>, rx: &Channel<Vec<u8>>) -> usize {
    let mut moved = 0;

    tx.with_ring(Direction::ToDevice, |tx_ring| {
        rx.with_ring(Direction::FromDevice, |rx_ring| {
            let tx_layout = *tx_ring.layout();
            let rx_layout = *rx_ring.layout();
            let mut rx_index = rx_ring.tail();

            let mut tx_index = tx_ring.tail();
            while tx_index != tx_ring.head() {
                let src = tx_ring.descriptor(tx_index);
                tx_index = (tx_index + 1) % tx_ring.capacity();
                if !src.is_owned(&tx_layout) {
                    continue;
                }

                while rx_index != rx_ring.head() && !rx_ring.descriptor(rx_index).is_owned(&rx_layout)
                {
                    rx_index = (rx_index + 1) % rx_ring.capacity();
                }
                if rx_index == rx_ring.head() {
                    break;
                }
                let dst = rx_ring.descriptor(rx_index);
                rx_index = (rx_index + 1) % rx_ring.capacity();

                let len = src.length(&tx_layout).min(dst.length(&rx_layout));
                // SAFETY: MockMapper addresses are the heap pointers of
                // buffers held by the rings' slot tables for as long as the
                // descriptors stay device-owned, and `len` fits both.
                unsafe {
                    core::ptr::copy_nonoverlapping(
                        src.addr().0 as usize as *const u8,
                        dst.addr().0 as usize as *mut u8,
                        len,
                    );
                }
                src.complete(&tx_layout, len, 0, None);
                dst.complete(&rx_layout, len, 0, None);
                moved += 1;
            }
        });
    });

    if moved > 0 {
        regs.raise_interrupt(int_complete(tx.id()) | int_complete(rx.id()));
    }
    moved
}

/// Act as the device for every TX descriptor it owns: complete each with
/// its posted length and raise the channel's completion interrupt.
pub fn complete_tx(regs: &MockRegisters, channel: &Channel<Vec<u8>>) -> usize {
    let completed = channel.with_ring(Direction::ToDevice, |ring| {
        let layout = *ring.layout();
        let mut count = 0;
        let mut index = ring.tail();
        while index != ring.head() {
            let desc = ring.descriptor(index);
            if desc.is_owned(&layout) {
                desc.complete(&layout, desc.length(&layout), 0, None);
                count += 1;
            }
            index = (index + 1) % ring.capacity();
        }
        count
    });
    if completed > 0 {
        regs.raise_interrupt(int_complete(channel.id()));
    }
    completed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn w1c_registers_clear_written_bits() {
        let regs = MockRegisters::new();
        let map = RegisterMap::new();
        regs.raise_interrupt(0b1011);
        regs.write32(map.int_status, 0b0001);
        assert_eq!(regs.peek(map.int_status), 0b1010);
    }

    #[test]
    fn sticky_errors_survive_clearing() {
        let regs = MockRegisters::new();
        let offset = regs.error_status_offset(2);
        regs.set_sticky_error(2, 0x8);
        regs.inject_error(2, 0x1);
        regs.write32(offset, u32::MAX);
        assert_eq!(regs.read32(offset), 0x8);
    }

    #[test]
    fn reset_release_raises_ready() {
        let regs = MockRegisters::new();
        let map = RegisterMap::new();
        regs.write32(map.control, CTRL_RESET);
        assert_eq!(regs.peek(map.status) & STATUS_READY, 0);
        regs.write32(map.control, 0);
        assert_ne!(regs.peek(map.status) & STATUS_READY, 0);
    }

    #[test]
    fn delay_advances_shared_clock() {
        use embedded_hal::delay::DelayNs;

        let clock = MockClock::new();
        let mut delay = MockDelay::new(&clock);
        delay.delay_us(250);
        assert_eq!(clock.now().as_micros(), 250);
        assert_eq!(delay.total_us(), 250);
    }
}
