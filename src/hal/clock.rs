//! Monotonic time HAL
//!
//! Every wait in the engine is bounded by a [`Deadline`] taken from an
//! injected [`Clock`], so timeouts behave the same on hardware and under a
//! simulated clock in tests.

use core::ops::{Add, Sub};

/// Point on the monotonic clock, in microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Instant(pub u64);

impl Instant {
    /// Clock origin
    pub const ZERO: Instant = Instant(0);

    /// Create an instant from microseconds
    #[inline(always)]
    pub const fn from_micros(us: u64) -> Self {
        Self(us)
    }

    /// Create an instant from milliseconds
    #[inline(always)]
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms * 1_000)
    }

    /// Microseconds since the clock origin
    #[inline(always)]
    pub const fn as_micros(self) -> u64 {
        self.0
    }

    /// Milliseconds since the clock origin
    #[inline(always)]
    pub const fn as_millis(self) -> u64 {
        self.0 / 1_000
    }

    /// Microseconds elapsed from `earlier` to `self`, zero if `earlier` is later
    #[inline(always)]
    pub const fn micros_since(self, earlier: Instant) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Milliseconds elapsed from `earlier` to `self`
    #[inline(always)]
    pub const fn millis_since(self, earlier: Instant) -> u64 {
        self.micros_since(earlier) / 1_000
    }
}

impl Add<u64> for Instant {
    type Output = Instant;

    fn add(self, us: u64) -> Instant {
        Instant(self.0.saturating_add(us))
    }
}

impl Sub for Instant {
    type Output = u64;

    fn sub(self, rhs: Instant) -> u64 {
        self.micros_since(rhs)
    }
}

/// Monotonic microsecond clock
pub trait Clock {
    /// Current time
    fn now(&self) -> Instant;
}

impl<T: Clock + ?Sized> Clock for &T {
    #[inline(always)]
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Absolute expiry time on a [`Clock`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Deadline {
    expires: Instant,
}

impl Deadline {
    /// Deadline `timeout_us` from now
    pub fn after<C: Clock + ?Sized>(clock: &C, timeout_us: u64) -> Self {
        Self {
            expires: clock.now() + timeout_us,
        }
    }

    /// Deadline at a fixed instant
    pub const fn at(expires: Instant) -> Self {
        Self { expires }
    }

    /// Expiry instant
    pub const fn expires(&self) -> Instant {
        self.expires
    }

    /// Whether the deadline has passed
    pub fn is_expired<C: Clock + ?Sized>(&self, clock: &C) -> bool {
        clock.now() >= self.expires
    }

    /// Microseconds left, zero once expired
    pub fn remaining_us<C: Clock + ?Sized>(&self, clock: &C) -> u64 {
        self.expires.micros_since(clock.now())
    }
}
