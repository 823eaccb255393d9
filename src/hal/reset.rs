//! Reset and polling HAL
//!
//! Deadline-bounded polling used by device bring-up and channel recovery.
//! A poll loop never counts iterations: it checks the condition, then the
//! deadline, then sleeps one interval.

use embedded_hal::delay::DelayNs;

use crate::driver::error::{IoError, Result};
use crate::hal::clock::{Clock, Deadline};
use crate::hal::registers::RegisterIo;
use crate::internal::register::RegisterMap;
use crate::internal::register::device::DeviceRegs;

// =============================================================================
// Polling
// =============================================================================

/// Poll `done` every `interval_us` until it returns true or `timeout_us`
/// elapses on `clock`.
///
/// The condition is checked once more after the deadline passes, so a
/// condition that becomes true during the final sleep is not reported as a
/// timeout.
pub fn poll_until<C, D, F>(
    clock: &C,
    delay: &mut D,
    timeout_us: u64,
    interval_us: u32,
    mut done: F,
) -> Result<()>
where
    C: Clock + ?Sized,
    D: DelayNs + ?Sized,
    F: FnMut() -> bool,
{
    let deadline = Deadline::after(clock, timeout_us);
    loop {
        if done() {
            return Ok(());
        }
        if deadline.is_expired(clock) {
            return Err(IoError::HardwareTimeout.into());
        }
        delay.delay_us(interval_us.max(1));
    }
}

// =============================================================================
// Device Reset Sequence
// =============================================================================

/// Timing of a device reset sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ResetTiming {
    /// Time reset is held asserted
    pub settle_us: u32,
    /// Deadline for READY after reset is released
    pub ready_timeout_us: u64,
    /// Poll interval while waiting for READY
    pub poll_interval_us: u32,
}

/// Assert device reset, hold it for the settle time, release it and wait for
/// the device to report READY.
///
/// Returns [`IoError::HardwareTimeout`] if READY does not appear before the
/// deadline.
pub fn reset_device<R, C, D>(
    io: &R,
    map: &RegisterMap,
    base: usize,
    clock: &C,
    delay: &mut D,
    timing: ResetTiming,
) -> Result<()>
where
    R: RegisterIo,
    C: Clock + ?Sized,
    D: DelayNs + ?Sized,
{
    let regs = DeviceRegs::new(io, map, base);

    regs.assert_reset();
    delay.delay_us(timing.settle_us);
    regs.release_reset();

    poll_until(
        clock,
        delay,
        timing.ready_timeout_us,
        timing.poll_interval_us,
        || regs.is_ready(),
    )
}
