//! Configuration types for the DMA ring engine
//!
//! [`Capabilities`] describes the silicon: register offsets, descriptor
//! bit layout, optional features and limits. [`EngineConfig`] adds the
//! tunables: ring sizes, timing and the default recovery policy.

use bitflags::bitflags;

use crate::driver::error::{ConfigError, ConfigResult};
use crate::driver::recovery::RecoveryPolicy;
use crate::internal::constants::{
    CHANNEL_RESET_US, DEFAULT_MAX_RING_SIZE, DEFAULT_RX_RING_SIZE, DEFAULT_TX_RING_SIZE,
    MAX_CHANNELS, MIN_RING_SIZE, POLL_INTERVAL_US, READY_TIMEOUT_US, RESET_SETTLE_US,
    STALL_THRESHOLD_MS, WATCHDOG_PERIOD_MS, WINDOW_DECAY_MS,
};
use crate::internal::dma::DescriptorLayout;
use crate::internal::register::RegisterMap;
use crate::internal::register::device::{DMACFG_BURST_LEN_MASK, DMACFG_BURST_LEN_SHIFT};

/// DMA burst length configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DmaBurstLen {
    /// 1 beat burst
    Burst1 = 1,
    /// 2 beat burst
    Burst2 = 2,
    /// 4 beat burst
    Burst4 = 4,
    /// 8 beat burst
    Burst8 = 8,
    /// 16 beat burst
    Burst16 = 16,
    /// 32 beat burst (default, best performance)
    #[default]
    Burst32 = 32,
}

impl DmaBurstLen {
    /// Convert to the programmable burst length value for the DMA register
    #[must_use]
    pub const fn to_pbl(self) -> u32 {
        self as u32
    }
}

bitflags! {
    /// Optional DMA features, in DMA configuration register positions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Features: u32 {
        /// Burst transfers
        const BURST = 1 << 0;
        /// Chained descriptor fetch
        const CHAINED = 1 << 1;
        /// Performance counters
        const PERF_COUNTERS = 1 << 2;
        /// Completion timestamps
        const TIMESTAMPS = 1 << 3;
    }
}

impl Features {
    /// DMA configuration register value enabling these features
    #[must_use]
    pub const fn dma_config(self, burst: DmaBurstLen) -> u32 {
        let mut value = self.bits();
        if self.contains(Self::BURST) {
            value |= (burst.to_pbl() << DMACFG_BURST_LEN_SHIFT) & DMACFG_BURST_LEN_MASK;
        }
        value
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Features {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Features({=u32:#x})", self.bits());
    }
}

// =============================================================================
// Capabilities
// =============================================================================

/// Description of one device variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Capabilities {
    /// Register offsets
    pub registers: RegisterMap,
    /// Features to enable at init
    pub features: Features,
    /// Descriptor bit layout
    pub layout: DescriptorLayout,
    /// Number of channels the device implements
    pub max_channels: usize,
    /// Largest ring the size registers accept
    pub max_ring_size: usize,
}

impl Capabilities {
    /// Default device description: every feature, full channel count
    #[must_use]
    pub const fn new() -> Self {
        Self {
            registers: RegisterMap::new(),
            features: Features::all(),
            layout: DescriptorLayout::new(),
            max_channels: MAX_CHANNELS,
            max_ring_size: DEFAULT_MAX_RING_SIZE,
        }
    }

    /// Set the register map
    #[must_use]
    pub const fn with_registers(mut self, registers: RegisterMap) -> Self {
        self.registers = registers;
        self
    }

    /// Set the feature mask
    #[must_use]
    pub const fn with_features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }

    /// Set the descriptor layout
    #[must_use]
    pub const fn with_layout(mut self, layout: DescriptorLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Set the channel count
    #[must_use]
    pub const fn with_max_channels(mut self, max_channels: usize) -> Self {
        self.max_channels = max_channels;
        self
    }

    /// Set the ring size limit
    #[must_use]
    pub const fn with_max_ring_size(mut self, max_ring_size: usize) -> Self {
        self.max_ring_size = max_ring_size;
        self
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Engine Configuration
// =============================================================================

/// Engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EngineConfig {
    /// Device description
    pub capabilities: Capabilities,
    /// Transmit descriptors per channel
    pub tx_ring_size: usize,
    /// Receive descriptors per channel
    pub rx_ring_size: usize,
    /// DMA burst length
    pub burst_len: DmaBurstLen,
    /// Time device reset is held
    pub reset_settle_us: u32,
    /// Deadline for READY after reset
    pub ready_timeout_us: u32,
    /// Poll interval for hardware status bits
    pub poll_interval_us: u32,
    /// Time a channel-local reset is held during recovery
    pub channel_reset_us: u32,
    /// Silence after which a running channel counts as stalled. At least
    /// `watchdog_period_ms`.
    pub stall_threshold_ms: u32,
    /// Spacing at which the owner calls
    /// [`watchdog_tick`](crate::Engine::watchdog_tick). The engine keeps no
    /// timer of its own; this bounds how late a stall is noticed.
    pub watchdog_period_ms: u32,
    /// Interval at which the sliding windows are halved
    pub window_decay_ms: u32,
    /// Recovery policy installed on every channel at init
    pub default_policy: RecoveryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    /// Create a new configuration with defaults
    #[must_use]
    pub const fn new() -> Self {
        Self {
            capabilities: Capabilities::new(),
            tx_ring_size: DEFAULT_TX_RING_SIZE,
            rx_ring_size: DEFAULT_RX_RING_SIZE,
            burst_len: DmaBurstLen::Burst32,
            reset_settle_us: RESET_SETTLE_US,
            ready_timeout_us: READY_TIMEOUT_US,
            poll_interval_us: POLL_INTERVAL_US,
            channel_reset_us: CHANNEL_RESET_US,
            stall_threshold_ms: STALL_THRESHOLD_MS,
            watchdog_period_ms: WATCHDOG_PERIOD_MS,
            window_decay_ms: WINDOW_DECAY_MS,
            default_policy: RecoveryPolicy::new(),
        }
    }

    // =========================================================================
    // Builder Methods
    // =========================================================================

    /// Set the device description
    #[must_use]
    pub const fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Set both ring sizes
    #[must_use]
    pub const fn with_ring_sizes(mut self, tx: usize, rx: usize) -> Self {
        self.tx_ring_size = tx;
        self.rx_ring_size = rx;
        self
    }

    /// Set the transmit ring size
    #[must_use]
    pub const fn with_tx_ring_size(mut self, size: usize) -> Self {
        self.tx_ring_size = size;
        self
    }

    /// Set the receive ring size
    #[must_use]
    pub const fn with_rx_ring_size(mut self, size: usize) -> Self {
        self.rx_ring_size = size;
        self
    }

    /// Set the DMA burst length
    #[must_use]
    pub const fn with_burst_len(mut self, burst_len: DmaBurstLen) -> Self {
        self.burst_len = burst_len;
        self
    }

    /// Set the device reset settle time
    #[must_use]
    pub const fn with_reset_settle_us(mut self, us: u32) -> Self {
        self.reset_settle_us = us;
        self
    }

    /// Set the READY deadline
    #[must_use]
    pub const fn with_ready_timeout_us(mut self, us: u32) -> Self {
        self.ready_timeout_us = us;
        self
    }

    /// Set the status poll interval
    #[must_use]
    pub const fn with_poll_interval_us(mut self, us: u32) -> Self {
        self.poll_interval_us = us;
        self
    }

    /// Set the channel-local reset hold time
    #[must_use]
    pub const fn with_channel_reset_us(mut self, us: u32) -> Self {
        self.channel_reset_us = us;
        self
    }

    /// Set the stall threshold
    #[must_use]
    pub const fn with_stall_threshold_ms(mut self, ms: u32) -> Self {
        self.stall_threshold_ms = ms;
        self
    }

    /// Set the watchdog period
    #[must_use]
    pub const fn with_watchdog_period_ms(mut self, ms: u32) -> Self {
        self.watchdog_period_ms = ms;
        self
    }

    /// Set the window decay interval
    #[must_use]
    pub const fn with_window_decay_ms(mut self, ms: u32) -> Self {
        self.window_decay_ms = ms;
        self
    }

    /// Set the default recovery policy
    #[must_use]
    pub const fn with_default_policy(mut self, policy: RecoveryPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    /// Check the configuration for consistency.
    ///
    /// Ring sizes outside `2..=max_ring_size` are
    /// [`ConfigError::InvalidCapacity`]; every other problem is
    /// [`ConfigError::InvalidConfig`].
    pub fn validate(&self) -> ConfigResult<()> {
        let caps = &self.capabilities;

        if caps.max_channels == 0 || caps.max_channels > MAX_CHANNELS {
            return Err(ConfigError::InvalidConfig);
        }
        if caps.max_ring_size < MIN_RING_SIZE || !caps.layout.is_consistent() {
            return Err(ConfigError::InvalidConfig);
        }
        if caps.registers.channel_stride == 0 {
            return Err(ConfigError::InvalidConfig);
        }
        for size in [self.tx_ring_size, self.rx_ring_size] {
            if size < MIN_RING_SIZE || size > caps.max_ring_size {
                return Err(ConfigError::InvalidCapacity);
            }
        }
        if self.poll_interval_us == 0
            || self.stall_threshold_ms == 0
            || self.window_decay_ms == 0
            || self.watchdog_period_ms == 0
            || self.stall_threshold_ms < self.watchdog_period_ms
        {
            return Err(ConfigError::InvalidConfig);
        }
        Ok(())
    }

    /// Check a channel count against the device
    pub fn validate_channel_count(&self, count: usize) -> ConfigResult<()> {
        if count == 0 || count > self.capabilities.max_channels {
            return Err(ConfigError::InvalidChannel);
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
