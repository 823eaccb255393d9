//! Descriptor ring for one direction of one channel.
//!
//! Storage is a descriptor array plus a parallel slot table holding the
//! buffer handle, bus address and posted length of every in-flight
//! descriptor. Software advances `head` on enqueue and `tail` on reclaim;
//! one slot always stays empty so `head == tail` means empty.

use alloc::vec::Vec;

use super::descriptor::{Descriptor, DescriptorLayout};
use crate::driver::error::{ConfigError, DmaError, Error, IoError, Rejected, Result};
use crate::hal::mapping::{BufferMapper, BusAddr, Direction};
use crate::internal::constants::MIN_RING_SIZE;

/// A finished transfer handed back by [`Ring::reclaim`]
#[derive(Debug)]
pub struct Completion<B> {
    /// The buffer originally posted
    pub buffer: B,
    /// Bytes transferred, as written back by the device
    pub length: usize,
    /// Error bits of the descriptor status word
    pub status: u32,
    /// Completion timestamp, when the device recorded one
    pub timestamp: Option<u64>,
}

impl<B> Completion<B> {
    /// Whether the device flagged an error for this transfer
    #[inline(always)]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status != 0
    }
}

/// In-flight bookkeeping for one descriptor
struct Slot<B> {
    buffer: B,
    addr: BusAddr,
    len: usize,
}

/// Circular descriptor ring with owned buffer slots.
pub struct Ring<B> {
    direction: Direction,
    layout: DescriptorLayout,
    descriptors: Vec<Descriptor>,
    slots: Vec<Option<Slot<B>>>,
    head: usize,
    tail: usize,
    enabled: bool,
    base: BusAddr,
}

impl<B> Ring<B> {
    /// Allocate a disabled ring of `capacity` software-owned descriptors.
    ///
    /// Returns [`ConfigError::InvalidCapacity`] if `capacity` is below 2 or
    /// above `max_capacity`, and [`DmaError::AllocationFailed`] if storage
    /// cannot be reserved.
    pub fn new(
        direction: Direction,
        capacity: usize,
        max_capacity: usize,
        layout: DescriptorLayout,
    ) -> Result<Self> {
        if capacity < MIN_RING_SIZE || capacity > max_capacity {
            return Err(ConfigError::InvalidCapacity.into());
        }

        let mut descriptors = Vec::new();
        descriptors
            .try_reserve_exact(capacity)
            .map_err(|_| DmaError::AllocationFailed)?;
        descriptors.resize_with(capacity, Descriptor::new);

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| DmaError::AllocationFailed)?;
        slots.resize_with(capacity, || None);

        Ok(Self {
            direction,
            layout,
            descriptors,
            slots,
            head: 0,
            tail: 0,
            enabled: false,
            base: BusAddr::NULL,
        })
    }

    /// Resolve the bus address of the descriptor array.
    pub fn map_storage<M>(&mut self, mapper: &M) -> Result<BusAddr>
    where
        M: BufferMapper<Buffer = B> + ?Sized,
    {
        let bytes = self.descriptors.len() * Descriptor::SIZE;
        self.base = mapper.map_descriptors(self.descriptors.as_ptr() as *const u8, bytes)?;
        Ok(self.base)
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Ring direction
    #[inline(always)]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Number of descriptors (zero after release)
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.descriptors.len()
    }

    /// Descriptors currently owned by the device or awaiting reclaim
    #[inline(always)]
    pub fn len(&self) -> usize {
        let cap = self.capacity();
        if cap == 0 {
            return 0;
        }
        (self.head + cap - self.tail) % cap
    }

    /// No descriptors in flight
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// No room for another enqueue
    #[inline(always)]
    pub fn is_full(&self) -> bool {
        let cap = self.capacity();
        cap == 0 || (self.head + 1) % cap == self.tail
    }

    /// Descriptors available to enqueue
    #[inline(always)]
    pub fn free_slots(&self) -> usize {
        self.capacity().saturating_sub(1) - self.len()
    }

    /// Next index software will fill
    #[inline(always)]
    pub fn head(&self) -> usize {
        self.head
    }

    /// Oldest in-flight index
    #[inline(always)]
    pub fn tail(&self) -> usize {
        self.tail
    }

    /// Whether enqueue is allowed
    #[inline(always)]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Bus address of the descriptor array
    #[inline(always)]
    pub fn base_address(&self) -> BusAddr {
        self.base
    }

    /// Descriptor layout in use
    #[inline(always)]
    pub fn layout(&self) -> &DescriptorLayout {
        &self.layout
    }

    /// Allow or refuse further enqueues
    #[inline(always)]
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Descriptor at `index`, wrapping
    #[inline(always)]
    pub(crate) fn descriptor(&self, index: usize) -> &Descriptor {
        &self.descriptors[index % self.descriptors.len()]
    }

    // -------------------------------------------------------------------------
    // Data path
    // -------------------------------------------------------------------------

    /// Post `buffer` for a transfer of `length` bytes.
    ///
    /// On success returns the new head index, which the caller writes to the
    /// head doorbell. On failure the buffer comes back in the [`Rejected`].
    pub fn enqueue<M>(
        &mut self,
        mut buffer: B,
        length: usize,
        mapper: &M,
    ) -> core::result::Result<usize, Rejected<B>>
    where
        M: BufferMapper<Buffer = B> + ?Sized,
    {
        if !self.enabled {
            return Err(Rejected::new(IoError::InvalidState, buffer));
        }
        if self.is_full() {
            return Err(Rejected::new(DmaError::ResourceExhausted, buffer));
        }
        if length == 0 || length > self.layout.max_len() {
            return Err(Rejected::new(DmaError::InvalidLength, buffer));
        }

        let addr = match mapper.map(&mut buffer, self.direction) {
            Ok(addr) => addr,
            Err(e) => return Err(Rejected::new(Error::from(e), buffer)),
        };

        let index = self.head;
        self.descriptors[index].arm(&self.layout, addr, length);
        self.slots[index] = Some(Slot {
            buffer,
            addr,
            len: length,
        });
        self.head = (index + 1) % self.capacity();
        Ok(self.head)
    }

    /// Take back the oldest finished transfer.
    ///
    /// Returns `None` if the ring is empty or the device still owns the
    /// tail descriptor.
    pub fn reclaim<M>(&mut self, mapper: &M) -> Option<Completion<B>>
    where
        M: BufferMapper<Buffer = B> + ?Sized,
    {
        if self.is_empty() {
            return None;
        }

        let index = self.tail;
        let desc = &self.descriptors[index];
        if desc.is_owned(&self.layout) {
            return None;
        }
        desc.acquire();

        let length = desc.length(&self.layout);
        let status = desc.error_bits(&self.layout);
        let timestamp = desc.timestamp(&self.layout);
        desc.clear();

        let slot = self.slots[index].take()?;
        mapper.unmap(slot.addr, slot.len, self.direction);
        self.tail = (index + 1) % self.capacity();

        Some(Completion {
            buffer: slot.buffer,
            length,
            status,
            timestamp,
        })
    }

    // -------------------------------------------------------------------------
    // Reset and teardown
    // -------------------------------------------------------------------------

    /// Discard every in-flight transfer and rewind to index zero.
    ///
    /// Buffers are unmapped and dropped. Returns how many were discarded.
    pub fn reset_indices<M>(&mut self, mapper: &M) -> usize
    where
        M: BufferMapper<Buffer = B> + ?Sized,
    {
        let mut discarded = 0;
        for (desc, slot) in self.descriptors.iter().zip(self.slots.iter_mut()) {
            desc.clear();
            if let Some(slot) = slot.take() {
                mapper.unmap(slot.addr, slot.len, self.direction);
                discarded += 1;
            }
        }
        self.head = 0;
        self.tail = 0;
        discarded
    }

    /// Discard everything and free the ring storage.
    pub fn release<M>(&mut self, mapper: &M) -> usize
    where
        M: BufferMapper<Buffer = B> + ?Sized,
    {
        let discarded = self.reset_indices(mapper);
        self.enabled = false;
        self.descriptors = Vec::new();
        self.slots = Vec::new();
        self.base = BusAddr::NULL;
        discarded
    }
}

// =============================================================================
// Tests
// =============================================================================
