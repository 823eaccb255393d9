//! Hardware Abstraction Layer
//!
//! The engine reaches hardware and platform services only through the
//! traits in this module, which keeps it testable on the host.
//!
//! # Modules
//!
//! - [`registers`]: 32-bit register read/write shim and MMIO implementation
//! - [`mapping`]: Buffer to bus-address translation
//! - [`clock`]: Monotonic clock and deadlines
//! - [`reset`]: Deadline-bounded polling and the device reset sequence
//!
//! # Delay Integration
//!
//! All operations that wait take an `embedded_hal::delay::DelayNs` directly.
//! Pass any delay implementation from your HAL.

pub mod clock;
pub mod mapping;
pub mod registers;
pub mod reset;

pub use clock::{Clock, Deadline, Instant};
pub use mapping::{BufferMapper, BusAddr, Direction, MappingError};
pub use registers::{Mmio, RegisterIo};
pub use reset::{ResetTiming, poll_until, reset_device};
