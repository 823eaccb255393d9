//! Per-channel health monitor.
//!
//! Tracks each channel's lifecycle state, interrupt and fault counters, the
//! sliding error and ring-full windows, and the bookkeeping behind recovery
//! attempts. Everything here is plain state behind one lock per channel;
//! the monitor never touches hardware.
//!
//! # State Machine
//!
//! ```text
//! Stopped ──start──▶ Running ──fault──▶ Error ──claim──▶ Recovering
//!    ▲                 │  ▲                ▲                 │
//!    └──────stop───────┘  └────success─────┼─────────────────┘
//!                      │                   └─────failure─────┘
//!                      └──suspend──▶ Suspended ──resume──▶ Running
//! ```
//!
//! Faults reported while `Suspended` are held as pending; `resume` then
//! lands in `Error` instead of `Running`.

use alloc::vec::Vec;

use crate::driver::config::EngineConfig;
use crate::driver::error::{DmaError, DmaResult, ErrorCategories, IoError, IoResult};
use crate::driver::recovery::RecoveryPolicy;
use crate::hal::clock::Instant;
use crate::sync::{ChannelMask, CriticalSectionCell};

/// Channel lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelState {
    /// Rings disabled
    #[default]
    Stopped,
    /// Moving traffic
    Running,
    /// Faulted; awaiting recovery, or down
    Error,
    /// A recovery attempt is in progress
    Recovering,
    /// Paused by the owner; in-flight descriptors kept
    Suspended,
}

impl ChannelState {
    /// Short name used in logs
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Error => "error",
            Self::Recovering => "recovering",
            Self::Suspended => "suspended",
        }
    }
}

/// Per-channel counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelStats {
    /// Interrupts attributed to the channel
    pub total_interrupts: u32,
    /// Of those, error interrupts
    pub error_interrupts: u32,
    /// Time of the last interrupt
    pub last_interrupt: Option<Instant>,
    /// Time of the last error interrupt or recorded fault
    pub last_error: Option<Instant>,
    /// Decaying count of recent errors
    pub error_window: u32,
    /// Decaying count of recent ring-full events
    pub ring_full_window: u32,
    /// Ring-full events since the last reset
    pub ring_full_events: u32,
    /// Watchdog stall detections
    pub timeouts: u32,
    /// Recovery attempts started
    pub recovery_attempts: u32,
    /// Recovery attempts that left the channel clean
    pub recovery_successes: u32,
}

/// Result of trying to claim a channel for recovery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecoveryClaim {
    /// Channel is now `Recovering`; these categories are to be handled
    Claimed(ErrorCategories),
    /// Channel is not in `Error`
    NotNeeded,
    /// Last attempt was less than the retry interval ago
    TooSoon,
    /// Pending categories fall outside the policy
    NotCovered(ErrorCategories),
    /// Channel is down; only reinitialization helps
    Down,
}

#[derive(Debug, Default)]
struct ChannelMonitor {
    state: ChannelState,
    stats: ChannelStats,
    pending: ErrorCategories,
    retries: u8,
    last_attempt: Option<Instant>,
    down: bool,
    fatal: bool,
    baseline: Instant,
}

impl ChannelMonitor {
    fn last_activity(&self) -> Instant {
        match self.stats.last_interrupt {
            Some(t) if t > self.baseline => t,
            _ => self.baseline,
        }
    }
}

/// Health monitor for every channel of an engine
pub struct Monitor {
    channels: Vec<CriticalSectionCell<ChannelMonitor>>,
    stall_threshold_us: u64,
    window_decay_us: u64,
    last_decay: CriticalSectionCell<Instant>,
}

impl Monitor {
    /// Create a monitor for `count` channels, all `Stopped`
    pub fn new(count: usize, config: &EngineConfig, now: Instant) -> DmaResult<Self> {
        let mut channels = Vec::new();
        channels
            .try_reserve_exact(count)
            .map_err(|_| DmaError::AllocationFailed)?;
        channels.resize_with(count, || CriticalSectionCell::new(ChannelMonitor::default()));

        Ok(Self {
            channels,
            stall_threshold_us: u64::from(config.stall_threshold_ms) * 1_000,
            window_decay_us: u64::from(config.window_decay_ms) * 1_000,
            last_decay: CriticalSectionCell::new(now),
        })
    }

    /// A monitor with no channels
    pub const fn empty() -> Self {
        Self {
            channels: Vec::new(),
            stall_threshold_us: 0,
            window_decay_us: 0,
            last_decay: CriticalSectionCell::new(Instant::ZERO),
        }
    }

    /// Number of monitored channels
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether no channels are monitored
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    fn with<T>(&self, channel: usize, f: impl FnOnce(&mut ChannelMonitor) -> T) -> Option<T> {
        self.channels.get(channel).map(|cell| cell.with(f))
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Current state
    pub fn state(&self, channel: usize) -> Option<ChannelState> {
        self.with(channel, |m| m.state)
    }

    /// Whether the channel has been given up on
    pub fn is_down(&self, channel: usize) -> bool {
        self.with(channel, |m| m.down).unwrap_or(false)
    }

    /// Error a data-path call against a down channel should see.
    ///
    /// `Fatal` if a `FATAL` fault took the channel down, `ChannelDown` if
    /// the retry budget ran out, `None` if the channel is usable.
    pub fn down_error(&self, channel: usize) -> Option<IoError> {
        self.with(channel, |m| match (m.down, m.fatal) {
            (false, _) => None,
            (true, true) => Some(IoError::Fatal),
            (true, false) => Some(IoError::ChannelDown),
        })
        .flatten()
    }

    /// Categories recorded but not yet handled
    pub fn pending(&self, channel: usize) -> ErrorCategories {
        self.with(channel, |m| m.pending).unwrap_or_default()
    }

    /// Recovery attempts since the last success or reinitialization
    pub fn retries(&self, channel: usize) -> u8 {
        self.with(channel, |m| m.retries).unwrap_or(0)
    }

    /// Counter snapshot
    pub fn stats(&self, channel: usize) -> Option<ChannelStats> {
        self.with(channel, |m| m.stats)
    }

    /// Zero the counters, keeping state
    pub fn reset_stats(&self, channel: usize) {
        self.with(channel, |m| m.stats = ChannelStats::default());
    }

    // -------------------------------------------------------------------------
    // Owner-driven transitions
    // -------------------------------------------------------------------------

    /// `Stopped → Running`; a running channel is left alone
    pub fn mark_started(&self, channel: usize, now: Instant) -> IoResult<()> {
        self.with(channel, |m| match m.state {
            ChannelState::Running => Ok(()),
            ChannelState::Stopped => {
                m.state = ChannelState::Running;
                m.baseline = now;
                Ok(())
            }
            _ => Err(IoError::InvalidState),
        })
        .unwrap_or(Err(IoError::InvalidState))
    }

    /// Any state except `Recovering` → `Stopped`
    pub fn mark_stopped(&self, channel: usize) -> IoResult<()> {
        self.with(channel, |m| match m.state {
            ChannelState::Recovering => Err(IoError::InvalidState),
            _ => {
                m.state = ChannelState::Stopped;
                Ok(())
            }
        })
        .unwrap_or(Err(IoError::InvalidState))
    }

    /// `Running → Suspended`
    pub fn suspend(&self, channel: usize) -> IoResult<()> {
        self.with(channel, |m| match m.state {
            ChannelState::Running => {
                m.state = ChannelState::Suspended;
                Ok(())
            }
            _ => Err(IoError::InvalidState),
        })
        .unwrap_or(Err(IoError::InvalidState))
    }

    /// Leave `Suspended`, restarting the stall clock.
    ///
    /// Returns the new state: `Running`, or `Error` if faults were recorded
    /// while suspended.
    pub fn resume(&self, channel: usize, now: Instant) -> IoResult<ChannelState> {
        self.with(channel, |m| match m.state {
            ChannelState::Suspended => {
                m.state = if m.pending.is_empty() {
                    ChannelState::Running
                } else {
                    ChannelState::Error
                };
                m.baseline = now;
                Ok(m.state)
            }
            _ => Err(IoError::InvalidState),
        })
        .unwrap_or(Err(IoError::InvalidState))
    }

    /// Clear fault and recovery state ahead of a reinitialization.
    ///
    /// Leaves the channel `Stopped` and no longer down. Refused while a
    /// recovery attempt is running.
    pub fn reset_channel(&self, channel: usize) -> IoResult<()> {
        self.with(channel, |m| {
            if m.state == ChannelState::Recovering {
                return Err(IoError::InvalidState);
            }
            m.state = ChannelState::Stopped;
            m.pending = ErrorCategories::empty();
            m.retries = 0;
            m.last_attempt = None;
            m.down = false;
            m.fatal = false;
            Ok(())
        })
        .unwrap_or(Err(IoError::InvalidState))
    }

    // -------------------------------------------------------------------------
    // Event intake
    // -------------------------------------------------------------------------

    /// Count an interrupt for the channel
    pub fn on_interrupt(&self, channel: usize, is_error: bool, now: Instant) {
        self.with(channel, |m| {
            m.stats.total_interrupts = m.stats.total_interrupts.saturating_add(1);
            m.stats.last_interrupt = Some(now);
            if is_error {
                m.stats.error_interrupts = m.stats.error_interrupts.saturating_add(1);
                m.stats.error_window = m.stats.error_window.saturating_add(1);
                m.stats.last_error = Some(now);
            }
        });
    }

    /// Count a ring-full rejection
    pub fn on_ring_full(&self, channel: usize) {
        self.with(channel, |m| {
            m.stats.ring_full_window = m.stats.ring_full_window.saturating_add(1);
            m.stats.ring_full_events = m.stats.ring_full_events.saturating_add(1);
        });
    }

    /// Record hardware-reported fault categories.
    ///
    /// A running channel moves to `Error`; a suspended one stays suspended
    /// with the categories pending. `FATAL` marks the channel down at once.
    /// Returns `true` if this call moved the channel into `Error`.
    pub fn record_fault(&self, channel: usize, categories: ErrorCategories, now: Instant) -> bool {
        if categories.is_empty() {
            return false;
        }
        self.with(channel, |m| {
            m.pending |= categories;
            m.stats.last_error = Some(now);
            if categories.is_fatal() && m.state != ChannelState::Stopped {
                m.down = true;
                m.fatal = true;
            }
            if m.state == ChannelState::Running {
                m.state = ChannelState::Error;
                true
            } else {
                false
            }
        })
        .unwrap_or(false)
    }

    /// Mark the channel down without a recovery attempt
    pub fn mark_down(&self, channel: usize) {
        self.with(channel, |m| {
            m.down = true;
            if m.state == ChannelState::Recovering {
                m.state = ChannelState::Error;
            }
        });
    }

    // -------------------------------------------------------------------------
    // Watchdog
    // -------------------------------------------------------------------------

    /// Periodic check: decay the sliding windows and flag stalled channels.
    ///
    /// A `Running` channel with no interrupt for at least the stall
    /// threshold (measured from its last interrupt or from when it started
    /// running, whichever is later) counts one timeout, moves to `Error`
    /// with `WATCHDOG_TIMEOUT` pending, and is returned in the mask.
    pub fn watchdog_tick(&self, now: Instant) -> ChannelMask {
        let halvings = self.last_decay.with(|last| {
            if self.window_decay_us == 0 {
                return 0;
            }
            let periods = now.micros_since(*last) / self.window_decay_us;
            *last = *last + periods * self.window_decay_us;
            periods.min(32) as u32
        });

        let mut stalled = ChannelMask::EMPTY;
        for (id, cell) in self.channels.iter().enumerate() {
            let stall = cell.with(|m| {
                if halvings > 0 {
                    m.stats.error_window = m.stats.error_window.checked_shr(halvings).unwrap_or(0);
                    m.stats.ring_full_window =
                        m.stats.ring_full_window.checked_shr(halvings).unwrap_or(0);
                }
                if m.state != ChannelState::Running {
                    return false;
                }
                if now.micros_since(m.last_activity()) < self.stall_threshold_us {
                    return false;
                }
                m.stats.timeouts = m.stats.timeouts.saturating_add(1);
                m.stats.last_error = Some(now);
                m.pending |= ErrorCategories::WATCHDOG_TIMEOUT;
                m.state = ChannelState::Error;
                true
            });
            if stall {
                stalled.insert(id);
            }
        }
        stalled
    }

    // -------------------------------------------------------------------------
    // Recovery bookkeeping
    // -------------------------------------------------------------------------

    /// Claim an `Error` channel for one recovery attempt.
    ///
    /// On success the channel is `Recovering`, the attempt is counted and
    /// the pending categories are handed to the caller.
    pub fn begin_recovery(
        &self,
        channel: usize,
        policy: &RecoveryPolicy,
        now: Instant,
    ) -> RecoveryClaim {
        self.with(channel, |m| {
            if m.down {
                return RecoveryClaim::Down;
            }
            if m.state != ChannelState::Error {
                return RecoveryClaim::NotNeeded;
            }
            if m.pending.is_fatal() || m.retries >= policy.max_retries {
                m.down = true;
                m.fatal |= m.pending.is_fatal();
                return RecoveryClaim::Down;
            }
            if !m.pending.is_empty() && !policy.categories.intersects(m.pending) {
                return RecoveryClaim::NotCovered(m.pending);
            }
            if let Some(last) = m.last_attempt {
                if now.micros_since(last) < u64::from(policy.retry_interval_ms) * 1_000 {
                    return RecoveryClaim::TooSoon;
                }
            }
            m.state = ChannelState::Recovering;
            m.retries += 1;
            m.last_attempt = Some(now);
            m.stats.recovery_attempts = m.stats.recovery_attempts.saturating_add(1);
            RecoveryClaim::Claimed(core::mem::take(&mut m.pending))
        })
        .unwrap_or(RecoveryClaim::NotNeeded)
    }

    /// Close a recovery attempt.
    ///
    /// Success returns the channel to `Running` with a fresh retry budget and
    /// stall baseline. Failure puts it back in `Error` with `residual`
    /// pending, and marks it down once the budget is spent. Returns `true`
    /// if the channel is down afterwards.
    pub fn finish_recovery(
        &self,
        channel: usize,
        success: bool,
        residual: ErrorCategories,
        max_retries: u8,
        now: Instant,
    ) -> bool {
        self.with(channel, |m| {
            if success {
                m.state = ChannelState::Running;
                m.retries = 0;
                m.pending = ErrorCategories::empty();
                m.baseline = now;
                m.stats.recovery_successes = m.stats.recovery_successes.saturating_add(1);
            } else {
                m.state = ChannelState::Error;
                m.pending |= residual;
                if m.retries >= max_retries || residual.is_fatal() {
                    m.down = true;
                    m.fatal |= residual.is_fatal();
                }
            }
            m.down
        })
        .unwrap_or(false)
    }
}
