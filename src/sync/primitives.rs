//! Interrupt-safe interior mutability.
//!
//! Every lock in the engine is a [`CriticalSectionCell`]: the device lock,
//! one per ring, one per channel monitor and one per recovery policy.
//! Closures passed to these cells run with interrupts masked and must not
//! block, delay or touch the same cell again.

use core::cell::RefCell;
#[cfg(feature = "async")]
use core::task::Waker;
use critical_section::Mutex;

/// A value shared between thread and interrupt context.
///
/// Each access enters a critical section for the length of the closure.
pub struct CriticalSectionCell<T> {
    inner: Mutex<RefCell<T>>,
}

impl<T> CriticalSectionCell<T> {
    /// Usable in `static` items
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(value)),
        }
    }

    /// Mutable access.
    ///
    /// # Panics
    ///
    /// If called again on the same cell from inside `f`.
    #[inline]
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }

    /// Shared access
    #[inline]
    pub fn with_ref<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        critical_section::with(|cs| f(&self.inner.borrow_ref(cs)))
    }

    /// Store `value` and hand back what was there
    #[inline]
    pub fn replace(&self, value: T) -> T {
        self.with(|slot| core::mem::replace(slot, value))
    }
}

impl<T: Copy> CriticalSectionCell<T> {
    /// Copy out
    #[inline]
    pub fn get(&self) -> T {
        self.with_ref(|value| *value)
    }
}

// SAFETY: every access goes through a critical section, so at most one
// context touches the value at a time. `T: Send` because that context may
// be an interrupt handler or another core.
unsafe impl<T: Send> Sync for CriticalSectionCell<T> {}

/// Single waker slot, registered by an async worker and fired from the
/// interrupt handler.
#[cfg(feature = "async")]
pub struct WakerSlot {
    slot: CriticalSectionCell<Option<Waker>>,
}

#[cfg(feature = "async")]
impl WakerSlot {
    /// Empty slot
    pub const fn new() -> Self {
        Self {
            slot: CriticalSectionCell::new(None),
        }
    }

    /// Keep `waker`, unless the stored one already wakes the same task
    pub fn register(&self, waker: &Waker) {
        self.slot.with(|slot| {
            if !slot.as_ref().is_some_and(|w| w.will_wake(waker)) {
                *slot = Some(waker.clone());
            }
        });
    }

    /// Take the stored waker and wake it outside the critical section
    #[inline]
    pub fn wake(&self) {
        if let Some(waker) = self.slot.with(Option::take) {
            waker.wake();
        }
    }

    /// Whether a waker is waiting
    pub fn is_registered(&self) -> bool {
        self.slot.with_ref(Option::is_some)
    }
}

#[cfg(feature = "async")]
impl Default for WakerSlot {
    fn default() -> Self {
        Self::new()
    }
}
