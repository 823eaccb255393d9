//! Interrupt-to-worker hand-off.
//!
//! The interrupt handler only records which channels need attention. A
//! deferred worker later claims the pending bits and does the buffer and
//! recovery work. Teardown closes the queue and waits until no worker is
//! inside it before ring memory is released.

use bitflags::bitflags;

use super::primitives::CriticalSectionCell;
#[cfg(feature = "async")]
use super::primitives::WakerSlot;
use crate::hal::clock::{Clock, Deadline};

bitflags! {
    /// Kinds of deferred work a channel can request
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Work: u8 {
        /// Completed descriptors are waiting to be reclaimed
        const RECLAIM = 1 << 0;
        /// The receive ring wants fresh buffers
        const REFILL = 1 << 1;
        /// The channel faulted and needs a recovery attempt
        const RECOVER = 1 << 2;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Work {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Work({=u8:#x})", self.bits());
    }
}

// =============================================================================
// Channel Mask
// =============================================================================

/// Set of channel indices, one bit per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelMask(pub u32);

impl ChannelMask {
    /// No channels
    pub const EMPTY: ChannelMask = ChannelMask(0);

    /// Mask with one channel
    #[inline(always)]
    #[must_use]
    pub const fn single(channel: usize) -> Self {
        Self(1 << channel)
    }

    /// Add a channel
    #[inline(always)]
    pub fn insert(&mut self, channel: usize) {
        self.0 |= 1 << channel;
    }

    /// Whether the channel is in the set
    #[inline(always)]
    #[must_use]
    pub const fn contains(&self, channel: usize) -> bool {
        self.0 & (1 << channel) != 0
    }

    /// Whether the set is empty
    #[inline(always)]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Number of channels in the set
    #[inline(always)]
    #[must_use]
    pub const fn count(&self) -> u32 {
        self.0.count_ones()
    }

    /// Channel indices in ascending order
    pub fn iter(self) -> impl Iterator<Item = usize> {
        let mut bits = self.0;
        core::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let channel = bits.trailing_zeros() as usize;
            bits &= bits - 1;
            Some(channel)
        })
    }
}

impl core::ops::BitOr for ChannelMask {
    type Output = ChannelMask;

    fn bitor(self, rhs: ChannelMask) -> ChannelMask {
        ChannelMask(self.0 | rhs.0)
    }
}

// =============================================================================
// Work Queue
// =============================================================================

/// Work claimed by one pass of a deferred worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PendingWork {
    /// Channels with completions to reclaim
    pub reclaim: ChannelMask,
    /// Channels whose receive ring wants refilling
    pub refill: ChannelMask,
    /// Channels needing a recovery attempt
    pub recover: ChannelMask,
}

impl PendingWork {
    /// Whether nothing is pending
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.reclaim.is_empty() && self.refill.is_empty() && self.recover.is_empty()
    }
}

#[derive(Debug, Default)]
struct QueueState {
    pending: PendingWork,
    open: bool,
    active: usize,
}

/// Pending-work bitmap shared between interrupt and deferred contexts.
pub struct WorkQueue {
    state: CriticalSectionCell<QueueState>,
    #[cfg(feature = "async")]
    pub(super) waker: WakerSlot,
}

impl WorkQueue {
    /// Create a closed, empty queue
    pub const fn new() -> Self {
        Self {
            state: CriticalSectionCell::new(QueueState {
                pending: PendingWork {
                    reclaim: ChannelMask::EMPTY,
                    refill: ChannelMask::EMPTY,
                    recover: ChannelMask::EMPTY,
                },
                open: false,
                active: 0,
            }),
            #[cfg(feature = "async")]
            waker: WakerSlot::new(),
        }
    }

    /// Accept work and workers
    pub fn open(&self) {
        self.state.with(|s| s.open = true);
    }

    /// Refuse new workers and drop anything pending.
    ///
    /// Workers already inside keep running until their guard drops.
    pub fn close(&self) {
        self.state.with(|s| {
            s.open = false;
            s.pending = PendingWork::default();
        });
        #[cfg(feature = "async")]
        self.waker.wake();
    }

    /// Whether the queue accepts work
    pub fn is_open(&self) -> bool {
        self.state.with_ref(|s| s.open)
    }

    /// Record work for a channel. Safe to call from interrupt context.
    pub fn post(&self, channel: usize, work: Work) {
        let posted = self.state.with(|s| {
            if !s.open {
                return false;
            }
            if work.contains(Work::RECLAIM) {
                s.pending.reclaim.insert(channel);
            }
            if work.contains(Work::REFILL) {
                s.pending.refill.insert(channel);
            }
            if work.contains(Work::RECOVER) {
                s.pending.recover.insert(channel);
            }
            true
        });
        #[cfg(feature = "async")]
        if posted {
            self.waker.wake();
        }
        #[cfg(not(feature = "async"))]
        let _ = posted;
    }

    /// Whether any work is waiting
    pub fn has_pending(&self) -> bool {
        self.state.with_ref(|s| !s.pending.is_empty())
    }

    /// Number of workers currently inside the queue
    pub fn active(&self) -> usize {
        self.state.with_ref(|s| s.active)
    }

    /// Enter as a worker. Returns `None` once the queue is closed.
    pub fn begin(&self) -> Option<WorkGuard<'_>> {
        let entered = self.state.with(|s| {
            if s.open {
                s.active += 1;
            }
            s.open
        });
        if entered {
            Some(WorkGuard { queue: self })
        } else {
            None
        }
    }

    /// Spin until no worker is inside or `timeout_us` elapses.
    ///
    /// Returns `false` on timeout.
    pub fn wait_idle<C: Clock + ?Sized>(&self, clock: &C, timeout_us: u64) -> bool {
        let deadline = Deadline::after(clock, timeout_us);
        loop {
            if self.active() == 0 {
                return true;
            }
            if deadline.is_expired(clock) {
                return false;
            }
            core::hint::spin_loop();
        }
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Proof that a worker is inside the queue; leaving is automatic on drop.
pub struct WorkGuard<'a> {
    queue: &'a WorkQueue,
}

impl WorkGuard<'_> {
    /// Claim and clear everything pending
    pub fn take(&self) -> PendingWork {
        self.queue
            .state
            .with(|s| core::mem::take(&mut s.pending))
    }
}

impl Drop for WorkGuard<'_> {
    fn drop(&mut self) {
        self.queue.state.with(|s| s.active = s.active.saturating_sub(1));
    }
}
