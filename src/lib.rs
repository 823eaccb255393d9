//! NIC DMA Ring Engine
//!
//! A `no_std` descriptor-ring DMA engine for network interface controllers,
//! with per-channel fault monitoring and automatic recovery.
//!
//! The engine drives a device with up to 16 channels. Each channel has a
//! transmit ring and a receive ring of 32-byte descriptors. Buffers are
//! posted by the caller, handed to the device by flipping the ownership
//! bit, and handed back once the device writes the descriptor back.
//!
//! # Architecture
//!
//! The crate is organized into three layers:
//!
//! 1. **Engine Layer** ([`driver`]): channels, the monitor state machine,
//!    recovery policies and the [`Engine`] facade
//! 2. **HAL Layer** ([`hal`]): register access, buffer mapping, clock and
//!    the reset sequence, all behind traits
//! 3. **Sync Layer** ([`sync`]): interrupt-safe cells and the work queue
//!    between the interrupt handler and the deferred worker
//!
//! # Execution Contexts
//!
//! - **Interrupt**: [`Engine::on_interrupt`] acknowledges and classifies
//!   interrupts, then posts work. It never blocks.
//! - **Deferred worker**: [`Engine::run_deferred`] reclaims completions,
//!   refills receive rings and runs recovery.
//! - **Watchdog**: [`Engine::watchdog_tick`] detects stalls and latched
//!   faults once per watchdog period.
//!
//! # Features
//!
//! - `defmt`: Enable defmt formatting and logging
//! - `log`: Enable logging through the `log` facade
//! - `async`: Enable the waker-based [`sync::WorkReady`] future
//!
//! # Example
//!
//! ```ignore
//! use ph_nic_dma::{Direction, Engine, EngineConfig, Mmio};
//!
//! let io = unsafe { Mmio::new(NIC_BASE) };
//! let mut engine = Engine::new(io, mapper, clock, EngineConfig::new());
//! engine.init(0, 4, &mut delay)?;
//! engine.start()?;
//!
//! engine.enqueue(0, Direction::ToDevice, frame, frame_len)?;
//!
//! // in the interrupt handler
//! engine.on_interrupt();
//!
//! // in the worker task
//! engine.run_deferred(&mut sink, &mut delay);
//! ```

#![no_std]
#![deny(missing_docs)]
#![allow(unsafe_code)]
#![deny(unsafe_op_in_unsafe_fn)]
// Clippy lint levels live here.
#![deny(clippy::correctness)]
#![warn(
    clippy::suspicious,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::cloned_instead_of_copied,
    clippy::explicit_iter_loop,
    clippy::implicit_clone,
    clippy::inconsistent_struct_constructor,
    clippy::manual_assert,
    clippy::manual_let_else,
    clippy::match_same_arms,
    clippy::needless_pass_by_value,
    clippy::semicolon_if_nothing_returned,
    clippy::uninlined_format_args,
    clippy::unnested_or_patterns,
    clippy::std_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::alloc_instead_of_core
)]
#![allow(
    clippy::mod_module_files,
    clippy::self_named_module_files,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::struct_excessive_bools,
    clippy::fn_params_excessive_bools,
    clippy::type_complexity,
    clippy::must_use_candidate,
    clippy::assertions_on_constants,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_lossless,
    clippy::panic_in_result_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::module_name_repetitions,
    clippy::wildcard_imports,
    clippy::items_after_statements,
    clippy::let_underscore_future
)]

extern crate alloc;

// =============================================================================
// Modules
// =============================================================================

pub mod driver;
pub mod hal;
pub mod sync;

// Internal implementation details (pub(crate) only)
mod internal;

// Test utilities (only available during testing)
#[cfg(test)]
pub mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use driver::config::{Capabilities, DmaBurstLen, EngineConfig, Features};
pub use driver::engine::{
    CompletionSink, Engine, EngineStats, RecoveryOutcome, ServiceReport, WatchdogReport,
};
pub use driver::error::{
    ConfigError, ConfigResult, DmaError, DmaResult, Error, ErrorCategories, IoError, IoResult,
    Rejected, Result,
};
pub use driver::interrupt::InterruptStatus;
pub use driver::monitor::{ChannelState, ChannelStats};
pub use driver::recovery::{RecoveryAction, RecoveryPolicy};
pub use hal::{
    BufferMapper, BusAddr, Clock, Deadline, Direction, Instant, MappingError, Mmio, RegisterIo,
};
pub use internal::dma::{Completion, Descriptor, DescriptorLayout};
pub use internal::register::RegisterMap;

/// Low-level register accessors for advanced use.
///
/// These are intentionally separated from the primary facade. Most users should
/// prefer the engine APIs instead of touching registers directly.
///
/// # Safety
///
/// Direct register access bypasses engine invariants. Use only if you fully
/// understand the device and accept responsibility for correct sequencing and
/// synchronization.
pub mod unsafe_registers {
    pub use crate::internal::register::channel::ChannelRegs;
    pub use crate::internal::register::device::DeviceRegs;
}

/// Shared engine constants.
///
/// These are grouped into a dedicated module to keep the top-level facade
/// focused on engine types.
pub mod constants {
    pub use crate::internal::constants::{
        // Timing
        CHANNEL_RESET_US,
        // Ring geometry
        DEFAULT_CHANNEL_BASE,
        DEFAULT_CHANNEL_STRIDE,
        DEFAULT_MAX_RETRIES,
        DEFAULT_MAX_RING_SIZE,
        DEFAULT_RETRY_INTERVAL_MS,
        DEFAULT_RX_RING_SIZE,
        DEFAULT_TX_RING_SIZE,
        // Limits
        MAX_CHANNELS,
        MIN_RING_SIZE,
        POLL_INTERVAL_US,
        READY_TIMEOUT_US,
        RESET_SETTLE_US,
        STALL_THRESHOLD_MS,
        WATCHDOG_PERIOD_MS,
        WINDOW_DECAY_MS,
        WORKER_DRAIN_TIMEOUT_US,
    };
}
