//! Centralized Constants
//!
//! Single source of truth for the magic numbers used throughout the DMA
//! engine.
//!
//! # Organization
//!
//! - **Rings and channels**: default ring sizes and hard limits
//! - **Timing**: settle delays, poll windows, watchdog periods
//! - **Recovery**: default retry budget
//!
//! # Note
//!
//! Register offsets and bit definitions live in `internal::register`, and the
//! descriptor bit layout in `internal::dma::descriptor`, because those belong
//! to a particular hardware description rather than to the engine.

// =============================================================================
// Rings and Channels
// =============================================================================

/// Maximum number of channels an engine can drive.
///
/// The device interrupt status register carries one completion bit and one
/// error bit per channel in two 16-bit halves.
pub const MAX_CHANNELS: usize = 16;

/// Smallest usable ring capacity (one slot is always kept empty)
pub const MIN_RING_SIZE: usize = 2;

/// Default number of transmit descriptors per channel
pub const DEFAULT_TX_RING_SIZE: usize = 64;

/// Default number of receive descriptors per channel
pub const DEFAULT_RX_RING_SIZE: usize = 64;

/// Default largest ring the hardware size registers accept
pub const DEFAULT_MAX_RING_SIZE: usize = 4096;

/// Default register window stride between consecutive channels
pub const DEFAULT_CHANNEL_STRIDE: usize = 0x100;

/// Default offset of channel 0's register window from the device base
pub const DEFAULT_CHANNEL_BASE: usize = 0x1000;

// =============================================================================
// Timing Constants
// =============================================================================

/// Settle delay between asserting and releasing the device reset
pub const RESET_SETTLE_US: u32 = 10;

/// Bounded window for the device READY bit after reset
pub const READY_TIMEOUT_US: u32 = 100_000;

/// Poll interval while waiting on a hardware status bit
pub const POLL_INTERVAL_US: u32 = 100;

/// Hold time for a channel-local reset during recovery
pub const CHANNEL_RESET_US: u32 = 10;

/// Elapsed time without interrupts after which a running channel is stalled
pub const STALL_THRESHOLD_MS: u32 = 5_000;

/// Nominal watchdog period
pub const WATCHDOG_PERIOD_MS: u32 = 1_000;

/// Interval at which the sliding error and ring-full windows are halved
pub const WINDOW_DECAY_MS: u32 = 1_000;

/// Bound on how long teardown waits for deferred workers to leave
pub const WORKER_DRAIN_TIMEOUT_US: u32 = 10_000;

// =============================================================================
// Recovery Defaults
// =============================================================================

/// Default number of recovery attempts before a channel is reported down
pub const DEFAULT_MAX_RETRIES: u8 = 3;

/// Default minimum spacing between two recovery attempts
pub const DEFAULT_RETRY_INTERVAL_MS: u32 = 100;
