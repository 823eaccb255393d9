//! Core engine components.
//!
//! - [`config`] - Capabilities, engine configuration and builders
//! - [`error`] - Error types, fault categories and result aliases
//! - [`channel`] - One channel's register window and ring pair
//! - [`monitor`] - Channel state machine, counters and stall detection
//! - [`recovery`] - Recovery policies and the recovery sequence
//! - [`interrupt`] - Interrupt status decoding
//! - [`engine`] - The [`Engine`] facade tying it all together
//!
//! # Example
//!
//! ```ignore
//! use ph_nic_dma::driver::{EngineConfig, RecoveryAction, RecoveryPolicy};
//!
//! let config = EngineConfig::new()
//!     .with_ring_sizes(128, 256)
//!     .with_default_policy(RecoveryPolicy::new().with_action(RecoveryAction::Reinitialize));
//! ```

// Submodules
pub mod channel;
pub mod config;
pub mod engine;
pub mod error;
pub mod interrupt;
pub mod monitor;
pub mod recovery;

// Re-exports for convenience
pub use channel::Channel;
pub use config::{Capabilities, DmaBurstLen, EngineConfig, Features};
pub use engine::{
    CompletionSink, Engine, EngineStats, RecoveryOutcome, ServiceReport, WatchdogReport,
};
pub use error::{
    ConfigError, ConfigResult, DmaError, DmaResult, Error, ErrorCategories, IoError, IoResult,
    Rejected, Result,
};
pub use interrupt::InterruptStatus;
pub use monitor::{ChannelState, ChannelStats};
pub use recovery::{RecoveryAction, RecoveryPolicy};
