//! Recovery policies and the per-channel recovery sequence.
//!
//! A [`RecoveryPolicy`] says which fault categories a channel may recover
//! from, which [`RecoveryAction`] to take, and how many attempts to spend
//! before the channel is reported down. [`RecoveryController`] keeps one
//! policy per channel and runs the hardware side of an attempt.

use alloc::vec::Vec;

use embedded_hal::delay::DelayNs;

use crate::driver::channel::Channel;
use crate::driver::config::EngineConfig;
use crate::driver::error::{DmaError, DmaResult, ErrorCategories, Result};
use crate::hal::mapping::BufferMapper;
use crate::hal::registers::RegisterIo;
use crate::internal::constants::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_INTERVAL_MS};
use crate::internal::fmt::log_debug;
use crate::sync::CriticalSectionCell;

/// What a recovery attempt does to the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecoveryAction {
    /// Record the fault only; the channel stays in `Error`
    None,
    /// Channel-local reset, then restart. In-flight descriptors survive
    /// unless the fault corrupted the ring.
    #[default]
    Reset,
    /// Channel-local reset, rings rewound to empty, then restart
    Reinitialize,
    /// Stop and start without a reset
    Restart,
    /// Channel-local reset with freshly allocated rings
    Reload,
}

impl RecoveryAction {
    /// Short name used in logs
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Reset => "reset",
            Self::Reinitialize => "reinitialize",
            Self::Restart => "restart",
            Self::Reload => "reload",
        }
    }

    /// Whether the action asserts the channel-local reset
    #[inline(always)]
    pub const fn resets_channel(&self) -> bool {
        matches!(self, Self::Reset | Self::Reinitialize | Self::Reload)
    }
}

/// Per-channel recovery policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RecoveryPolicy {
    /// Fault categories this policy handles
    pub categories: ErrorCategories,
    /// Action taken on a fault
    pub action: RecoveryAction,
    /// Attempts before the channel is reported down
    pub max_retries: u8,
    /// Minimum spacing between attempts
    pub retry_interval_ms: u32,
    /// Whether faults trigger recovery without the owner asking
    pub auto_recover: bool,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl RecoveryPolicy {
    /// Reset on any recoverable fault, three attempts, 100 ms apart
    #[must_use]
    pub const fn new() -> Self {
        Self {
            categories: ErrorCategories::RECOVERABLE,
            action: RecoveryAction::Reset,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_interval_ms: DEFAULT_RETRY_INTERVAL_MS,
            auto_recover: true,
        }
    }

    /// Set the handled categories
    #[must_use]
    pub const fn with_categories(mut self, categories: ErrorCategories) -> Self {
        self.categories = categories;
        self
    }

    /// Set the action
    #[must_use]
    pub const fn with_action(mut self, action: RecoveryAction) -> Self {
        self.action = action;
        self
    }

    /// Set the attempt budget
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u8) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the minimum spacing between attempts
    #[must_use]
    pub const fn with_retry_interval_ms(mut self, ms: u32) -> Self {
        self.retry_interval_ms = ms;
        self
    }

    /// Enable or disable automatic recovery
    #[must_use]
    pub const fn with_auto_recover(mut self, auto_recover: bool) -> Self {
        self.auto_recover = auto_recover;
        self
    }
}

/// Per-channel policies plus the recovery sequence
pub struct RecoveryController {
    policies: Vec<CriticalSectionCell<RecoveryPolicy>>,
}

impl RecoveryController {
    /// One copy of `default` per channel
    pub fn new(count: usize, default: RecoveryPolicy) -> DmaResult<Self> {
        let mut policies = Vec::new();
        policies
            .try_reserve_exact(count)
            .map_err(|_| DmaError::AllocationFailed)?;
        policies.resize_with(count, || CriticalSectionCell::new(default));
        Ok(Self { policies })
    }

    /// A controller with no channels
    pub const fn empty() -> Self {
        Self {
            policies: Vec::new(),
        }
    }

    /// Policy for a channel
    pub fn policy(&self, channel: usize) -> Option<RecoveryPolicy> {
        self.policies.get(channel).map(CriticalSectionCell::get)
    }

    /// Replace a channel's policy. Returns `false` for an unknown channel.
    pub fn set_policy(&self, channel: usize, policy: RecoveryPolicy) -> bool {
        match self.policies.get(channel) {
            Some(cell) => {
                cell.replace(policy);
                true
            }
            None => false,
        }
    }

    /// Run one recovery attempt on `channel`.
    ///
    /// The channel is stopped, optionally reset, has its error status
    /// cleared, its rings handled as `action` and `categories` require, and
    /// is restarted. Returns whether the error status reads clean
    /// afterwards. The caller owns the monitor bookkeeping.
    pub fn execute<R, M, D>(
        &self,
        channel: &Channel<M::Buffer>,
        io: &R,
        mapper: &M,
        delay: &mut D,
        action: RecoveryAction,
        categories: ErrorCategories,
        config: &EngineConfig,
    ) -> Result<bool>
    where
        R: RegisterIo,
        M: BufferMapper + ?Sized,
        D: DelayNs + ?Sized,
    {
        if action == RecoveryAction::None {
            return Ok(false);
        }
        log_debug!(
            "ch{}: recovery {} for {:#x}",
            channel.id(),
            action.as_str(),
            categories.bits()
        );

        channel.stop(io);

        if action.resets_channel() {
            channel.assert_reset(io);
            delay.delay_us(config.channel_reset_us);
            channel.release_reset(io);
        }

        channel.clear_error_status(io, ErrorCategories::all());

        match action {
            RecoveryAction::Reload => {
                channel.reload_rings(config, mapper)?;
                channel.program(io);
            }
            RecoveryAction::Reinitialize => {
                channel.reset_rings(mapper);
                channel.program(io);
            }
            RecoveryAction::Reset => {
                if categories.intersects(ErrorCategories::RING_CORRUPTING) {
                    channel.reset_rings(mapper);
                }
                channel.program(io);
            }
            RecoveryAction::Restart | RecoveryAction::None => {}
        }

        channel.start(io)?;

        Ok(channel.error_status(io).is_empty())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::vec;
    use std::vec::Vec;

    use super::*;
    use crate::hal::clock::Clock;
    use crate::hal::mapping::Direction;
    use crate::internal::register::channel::{RING_EN_ALL, RING_RESET};
    use crate::testing::{MockClock, MockDelay, MockMapper, MockRegisters};

    fn setup(regs: &MockRegisters, mapper: &MockMapper) -> (EngineConfig, Channel<Vec<u8>>) {
        let config = EngineConfig::new().with_ring_sizes(4, 4);
        let map = config.capabilities.registers;
        let channel = Channel::new(0, map.channel_offset(0), &config, mapper).unwrap();
        channel.program(regs);
        channel.start(regs).unwrap();
        (config, channel)
    }

    #[test]
    fn default_policy_values() {
        let policy = RecoveryPolicy::default();
        assert_eq!(policy.action, RecoveryAction::Reset);
        assert_eq!(policy.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(policy.retry_interval_ms, DEFAULT_RETRY_INTERVAL_MS);
        assert!(policy.auto_recover);
        assert!(!policy.categories.contains(ErrorCategories::FATAL));
    }

    #[test]
    fn controller_policies_are_per_channel() {
        let ctrl = RecoveryController::new(2, RecoveryPolicy::new()).unwrap();
        let custom = RecoveryPolicy::new().with_action(RecoveryAction::Restart);

        assert!(ctrl.set_policy(1, custom));
        assert!(!ctrl.set_policy(2, custom));
        assert_eq!(ctrl.policy(0), Some(RecoveryPolicy::new()));
        assert_eq!(ctrl.policy(1), Some(custom));
        assert_eq!(ctrl.policy(2), None);
    }

    #[test]
    fn reset_pulses_channel_reset_and_restarts() {
        let regs = MockRegisters::new();
        let mapper = MockMapper::new();
        let clock = MockClock::new();
        let mut delay = MockDelay::new(&clock);
        let (config, channel) = setup(&regs, &mapper);
        let window = config.capabilities.registers.channel_offset(0);
        let ctl = window + config.capabilities.registers.ring_control;
        regs.set_sticky_error(0, 0);
        regs.inject_error(0, ErrorCategories::BUS.bits());

        let ctrl = RecoveryController::new(1, RecoveryPolicy::new()).unwrap();
        regs.clear_log();
        let clean = ctrl
            .execute(
                &channel,
                &regs,
                &mapper,
                &mut delay,
                RecoveryAction::Reset,
                ErrorCategories::BUS,
                &config,
            )
            .unwrap();

        assert!(clean);
        assert!(regs.writes().iter().any(|&(off, v)| off == ctl && v & RING_RESET != 0));
        assert_eq!(regs.peek(ctl), RING_EN_ALL);
        assert!(clock.now().as_micros() >= u64::from(config.channel_reset_us));
        assert!(channel.is_running());
    }

    #[test]
    fn sticky_error_reports_unclean() {
        let regs = MockRegisters::new();
        let mapper = MockMapper::new();
        let clock = MockClock::new();
        let mut delay = MockDelay::new(&clock);
        let (config, channel) = setup(&regs, &mapper);
        regs.set_sticky_error(0, ErrorCategories::BUS.bits());

        let ctrl = RecoveryController::new(1, RecoveryPolicy::new()).unwrap();
        let clean = ctrl
            .execute(
                &channel,
                &regs,
                &mapper,
                &mut delay,
                RecoveryAction::Reset,
                ErrorCategories::BUS,
                &config,
            )
            .unwrap();
        assert!(!clean);
    }

    #[test]
    fn descriptor_fault_discards_in_flight() {
        let regs = MockRegisters::new();
        let mapper = MockMapper::new();
        let clock = MockClock::new();
        let mut delay = MockDelay::new(&clock);
        let (config, channel) = setup(&regs, &mapper);

        channel
            .enqueue(&regs, Direction::ToDevice, vec![0u8; 16], 16, &mapper)
            .unwrap();
        channel
            .enqueue(&regs, Direction::ToDevice, vec![0u8; 16], 16, &mapper)
            .unwrap();

        let ctrl = RecoveryController::new(1, RecoveryPolicy::new()).unwrap();

        // A bus fault leaves the ring alone.
        ctrl.execute(
            &channel,
            &regs,
            &mapper,
            &mut delay,
            RecoveryAction::Reset,
            ErrorCategories::BUS,
            &config,
        )
        .unwrap();
        assert_eq!(channel.with_ring(Direction::ToDevice, |r| r.len()), 2);

        ctrl.execute(
            &channel,
            &regs,
            &mapper,
            &mut delay,
            RecoveryAction::Reset,
            ErrorCategories::DESCRIPTOR,
            &config,
        )
        .unwrap();
        assert_eq!(channel.with_ring(Direction::ToDevice, |r| r.len()), 0);
        assert_eq!(mapper.unmapped(), 2);
    }

    #[test]
    fn restart_skips_reset() {
        let regs = MockRegisters::new();
        let mapper = MockMapper::new();
        let clock = MockClock::new();
        let mut delay = MockDelay::new(&clock);
        let (config, channel) = setup(&regs, &mapper);
        let ctl = config.capabilities.registers.channel_offset(0)
            + config.capabilities.registers.ring_control;

        let ctrl = RecoveryController::new(1, RecoveryPolicy::new()).unwrap();
        regs.clear_log();
        ctrl.execute(
            &channel,
            &regs,
            &mapper,
            &mut delay,
            RecoveryAction::Restart,
            ErrorCategories::FIFO,
            &config,
        )
        .unwrap();

        assert!(!regs.writes().iter().any(|&(off, v)| off == ctl && v & RING_RESET != 0));
        assert_eq!(clock.now().as_micros(), 0);
        assert!(channel.is_running());
    }

    #[test]
    fn reload_replaces_ring_storage() {
        let regs = MockRegisters::new();
        let mapper = MockMapper::new();
        let clock = MockClock::new();
        let mut delay = MockDelay::new(&clock);
        let (config, channel) = setup(&regs, &mapper);
        channel
            .enqueue(&regs, Direction::FromDevice, vec![0u8; 16], 16, &mapper)
            .unwrap();

        let ctrl = RecoveryController::new(1, RecoveryPolicy::new()).unwrap();
        ctrl.execute(
            &channel,
            &regs,
            &mapper,
            &mut delay,
            RecoveryAction::Reload,
            ErrorCategories::DATA,
            &config,
        )
        .unwrap();

        assert_eq!(mapper.unmapped(), 1);
        channel.with_ring(Direction::FromDevice, |r| {
            assert!(r.is_empty());
            assert_eq!(r.capacity(), 4);
            assert!(r.is_enabled());
        });
    }

    #[test]
    fn none_action_does_nothing() {
        let regs = MockRegisters::new();
        let mapper = MockMapper::new();
        let clock = MockClock::new();
        let mut delay = MockDelay::new(&clock);
        let (config, channel) = setup(&regs, &mapper);

        let ctrl = RecoveryController::new(1, RecoveryPolicy::new()).unwrap();
        regs.clear_log();
        let clean = ctrl
            .execute(
                &channel,
                &regs,
                &mapper,
                &mut delay,
                RecoveryAction::None,
                ErrorCategories::BUS,
                &config,
            )
            .unwrap();
        assert!(!clean);
        assert_eq!(regs.write_count(), 0);
    }
}
