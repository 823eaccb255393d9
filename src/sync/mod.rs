//! Synchronization and Concurrency Support
//!
//! - **Primitives** (`primitives`): Low-level synchronization types
//!   - [`CriticalSectionCell`] - ISR-safe interior mutability
//!   - [`WakerSlot`] - Waker handed from an async worker to the ISR (`async` feature)
//!
//! - **Work queue** (`work`): Interrupt to deferred-worker hand-off
//!   - [`WorkQueue`] - Pending-work bitmap with teardown draining
//!   - [`ChannelMask`] - One bit per channel
//!
//! - **Async Support** (`asynch`): [`WorkReady`] future for async workers
//!
//! # Feature Flags
//!
//! - `async`: Enables `asynch` and the queue's waker

mod primitives;
pub mod work;

pub use primitives::CriticalSectionCell;
#[cfg(feature = "async")]
pub use primitives::WakerSlot;
pub use work::{ChannelMask, PendingWork, Work, WorkGuard, WorkQueue};

#[cfg(feature = "async")]
pub mod asynch;

#[cfg(feature = "async")]
pub use asynch::WorkReady;
