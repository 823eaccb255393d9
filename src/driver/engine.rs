//! The DMA ring engine.
//!
//! [`Engine`] owns the register shim, the buffer mapper, the clock, and one
//! [`Channel`] per hardware channel. It exposes three kinds of entry points:
//!
//! - **Owner context**: `init`, `deinit`, channel lifecycle, policies and
//!   statistics.
//! - **Interrupt context**: [`Engine::on_interrupt`] reads and acknowledges
//!   the interrupt status, updates the monitor and posts work. It never
//!   allocates, blocks or delays.
//! - **Deferred context**: [`Engine::run_deferred`] reclaims completions,
//!   refills receive rings and runs recovery; [`Engine::watchdog_tick`]
//!   detects stalls and sticky faults.
//!
//! # Example
//!
//! ```ignore
//! let mut engine = Engine::new(io, mapper, clock, EngineConfig::new());
//! engine.init(NIC_BASE, 4, &mut delay)?;
//! engine.start()?;
//!
//! engine.enqueue(0, Direction::ToDevice, frame, len)?;
//!
//! // interrupt handler
//! engine.on_interrupt();
//!
//! // worker task
//! engine.run_deferred(&mut sink, &mut delay);
//! ```

use alloc::vec::Vec;

use embedded_hal::delay::DelayNs;

use crate::driver::channel::Channel;
use crate::driver::config::{EngineConfig, Features};
use crate::driver::error::{ConfigError, DmaError, ErrorCategories, IoError, Rejected, Result};
use crate::driver::interrupt::InterruptStatus;
use crate::driver::monitor::{ChannelState, ChannelStats, Monitor, RecoveryClaim};
use crate::driver::recovery::{RecoveryAction, RecoveryController, RecoveryPolicy};
use crate::hal::clock::Clock;
use crate::hal::mapping::{BufferMapper, Direction};
use crate::hal::registers::RegisterIo;
use crate::hal::reset::{ResetTiming, reset_device};
use crate::internal::constants::WORKER_DRAIN_TIMEOUT_US;
use crate::internal::dma::Completion;
use crate::internal::fmt::{log_debug, log_error, log_info, log_trace, log_warn};
use crate::internal::register::device::{
    DeviceRegs, INT_ALL, PERF_CLEAR, PERF_ENABLE, int_channels,
};
use crate::sync::{ChannelMask, CriticalSectionCell, Work, WorkQueue};

// =============================================================================
// Upper-layer Hooks
// =============================================================================

/// Receiver of completed transfers and supplier of receive buffers.
///
/// Implemented by the upper layer and passed to [`Engine::run_deferred`].
pub trait CompletionSink<B> {
    /// A transfer finished
    fn complete(&mut self, channel: usize, direction: Direction, completion: Completion<B>);

    /// A fresh receive buffer and its usable length, or `None` to stop
    /// refilling for now
    fn rx_buffer(&mut self, channel: usize) -> Option<(B, usize)> {
        let _ = channel;
        None
    }

    /// A buffer from [`rx_buffer`](Self::rx_buffer) that could not be posted
    fn give_back(&mut self, channel: usize, buffer: B) {
        let _ = (channel, buffer);
    }
}

// =============================================================================
// Statistics and Reports
// =============================================================================

/// Engine-wide counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EngineStats {
    /// Interrupts with at least one source set
    pub interrupts: u32,
    /// Channel completion sources seen
    pub completion_events: u32,
    /// Channel error sources seen
    pub error_events: u32,
    /// Buffers posted
    pub enqueued: u32,
    /// Transfers reclaimed
    pub completed: u32,
    /// Reclaimed transfers with descriptor error bits
    pub completion_errors: u32,
    /// Enqueues refused because a ring was full
    pub ring_full: u32,
    /// Recovery attempts started
    pub recoveries_attempted: u32,
    /// Recovery attempts that left the channel clean
    pub recoveries_succeeded: u32,
    /// Stalls detected by the watchdog
    pub watchdog_timeouts: u32,
}

/// Result of one recovery attempt request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecoveryOutcome {
    /// The channel is running again
    Recovered,
    /// The attempt did not clear the fault; the channel stays in `Error`
    Failed,
    /// The channel is down and needs [`Engine::reinit_channel`]
    Down,
    /// Too soon after the previous attempt
    Deferred,
    /// The channel is not in `Error`
    NotNeeded,
    /// The policy does not cover the fault, or its action is `None`
    Skipped,
}

/// What one pass of [`Engine::run_deferred`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ServiceReport {
    /// Completions handed to the sink
    pub reclaimed: usize,
    /// Receive buffers posted
    pub refilled: usize,
    /// Channels recovered
    pub recovered: ChannelMask,
    /// Channels whose recovery attempt failed
    pub failed: ChannelMask,
    /// Channels found or declared down
    pub down: ChannelMask,
}

/// What one [`Engine::watchdog_tick`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WatchdogReport {
    /// Channels flagged as stalled
    pub stalled: ChannelMask,
    /// Channels with faults latched in their error status
    pub faulted: ChannelMask,
    /// Channels recovered
    pub recovered: ChannelMask,
    /// Channels whose recovery attempt failed
    pub failed: ChannelMask,
    /// Channels found or declared down
    pub down: ChannelMask,
}

impl ServiceReport {
    fn record(&mut self, channel: usize, outcome: RecoveryOutcome) {
        match outcome {
            RecoveryOutcome::Recovered => self.recovered.insert(channel),
            RecoveryOutcome::Failed => self.failed.insert(channel),
            RecoveryOutcome::Down => self.down.insert(channel),
            _ => {}
        }
    }
}

impl WatchdogReport {
    fn record(&mut self, channel: usize, outcome: RecoveryOutcome) {
        match outcome {
            RecoveryOutcome::Recovered => self.recovered.insert(channel),
            RecoveryOutcome::Failed => self.failed.insert(channel),
            RecoveryOutcome::Down => self.down.insert(channel),
            _ => {}
        }
    }
}

#[derive(Debug, Default)]
struct DeviceState {
    enabled: bool,
    stats: EngineStats,
}

// =============================================================================
// Engine
// =============================================================================

/// Descriptor-ring DMA engine
pub struct Engine<R, M, C>
where
    R: RegisterIo,
    M: BufferMapper,
    C: Clock,
{
    io: R,
    mapper: M,
    clock: C,
    config: EngineConfig,
    base: usize,
    device: CriticalSectionCell<DeviceState>,
    channels: Vec<Channel<M::Buffer>>,
    monitor: Monitor,
    recovery: RecoveryController,
    work: WorkQueue,
    initialized: bool,
}

impl<R, M, C> Engine<R, M, C>
where
    R: RegisterIo,
    M: BufferMapper,
    C: Clock,
{
    /// Create an engine. No hardware is touched until [`init`](Self::init).
    pub const fn new(io: R, mapper: M, clock: C, config: EngineConfig) -> Self {
        Self {
            io,
            mapper,
            clock,
            config,
            base: 0,
            device: CriticalSectionCell::new(DeviceState {
                enabled: false,
                stats: EngineStats {
                    interrupts: 0,
                    completion_events: 0,
                    error_events: 0,
                    enqueued: 0,
                    completed: 0,
                    completion_errors: 0,
                    ring_full: 0,
                    recoveries_attempted: 0,
                    recoveries_succeeded: 0,
                    watchdog_timeouts: 0,
                },
            }),
            channels: Vec::new(),
            monitor: Monitor::empty(),
            recovery: RecoveryController::empty(),
            work: WorkQueue::new(),
            initialized: false,
        }
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Bring up the device and `channel_count` channels.
    ///
    /// Resets the device and waits for READY, enables DMA with the
    /// configured features, allocates and programs every channel, then
    /// clears and unmasks the channels' interrupt sources. Channels are left
    /// stopped.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::AlreadyInitialized`] on a second call
    /// - [`ConfigError::InvalidConfig`], [`ConfigError::InvalidCapacity`] or
    ///   [`ConfigError::InvalidChannel`] from validation
    /// - [`IoError::HardwareTimeout`] if READY never rises
    /// - [`DmaError::AllocationFailed`] or [`DmaError::MappingFailed`] while
    ///   building rings; nothing stays allocated
    pub fn init<D: DelayNs + ?Sized>(
        &mut self,
        register_base: usize,
        channel_count: usize,
        delay: &mut D,
    ) -> Result<()> {
        if self.initialized {
            return Err(ConfigError::AlreadyInitialized.into());
        }
        self.config.validate()?;
        self.config.validate_channel_count(channel_count)?;

        let map = self.config.capabilities.registers;
        let timing = ResetTiming {
            settle_us: self.config.reset_settle_us,
            ready_timeout_us: u64::from(self.config.ready_timeout_us),
            poll_interval_us: self.config.poll_interval_us,
        };
        if let Err(e) = reset_device(&self.io, &map, register_base, &self.clock, delay, timing) {
            log_error!("device not ready within {} us", self.config.ready_timeout_us);
            return Err(e);
        }

        let monitor = Monitor::new(channel_count, &self.config, self.clock.now())?;
        let recovery = RecoveryController::new(channel_count, self.config.default_policy)?;

        let dev = DeviceRegs::new(&self.io, &map, register_base);
        dev.mask_all_interrupts();
        let features = self.config.capabilities.features;
        dev.set_dma_config(features.dma_config(self.config.burst_len));
        dev.enable_dma();
        if features.contains(Features::PERF_COUNTERS) {
            dev.set_perf_control(PERF_CLEAR | PERF_ENABLE);
        }

        let channels = match self.build_channels(register_base, channel_count) {
            Ok(channels) => channels,
            Err(e) => {
                dev.disable_dma();
                return Err(e);
            }
        };
        for channel in &channels {
            channel.program(&self.io);
        }

        dev.ack_interrupts(INT_ALL);
        dev.unmask_interrupts(int_channels(channel_count));

        self.channels = channels;
        self.monitor = monitor;
        self.recovery = recovery;
        self.base = register_base;
        self.device.with(|d| d.enabled = true);
        self.work.open();
        self.initialized = true;

        log_info!(
            "engine up: {} channels, tx={} rx={}",
            channel_count,
            self.config.tx_ring_size,
            self.config.rx_ring_size
        );
        Ok(())
    }

    fn build_channels(&self, base: usize, count: usize) -> Result<Vec<Channel<M::Buffer>>> {
        let map = &self.config.capabilities.registers;
        let mut channels = Vec::new();
        channels
            .try_reserve_exact(count)
            .map_err(|_| DmaError::AllocationFailed)?;

        for id in 0..count {
            match Channel::new(id, base + map.channel_offset(id), &self.config, &self.mapper) {
                Ok(channel) => channels.push(channel),
                Err(e) => {
                    log_warn!("ch{}: ring allocation failed", id);
                    for channel in &channels {
                        channel.deinit(&self.io, &self.mapper);
                    }
                    return Err(e);
                }
            }
        }
        Ok(channels)
    }

    /// Stop everything and release all ring memory.
    ///
    /// Channels are stopped, the work queue is closed and drained, the
    /// device is disabled with interrupts masked, and the rings are freed.
    /// In-flight buffers are unmapped and dropped. Calling it again does
    /// nothing.
    pub fn deinit(&mut self) {
        if !self.initialized {
            return;
        }

        for channel in &self.channels {
            channel.stop(&self.io);
            let _ = self.monitor.mark_stopped(channel.id());
        }

        self.work.close();
        if !self
            .work
            .wait_idle(&self.clock, u64::from(WORKER_DRAIN_TIMEOUT_US))
        {
            log_warn!("{} workers still active at teardown", self.work.active());
        }

        let dev = self.device_regs();
        dev.disable_dma();
        dev.mask_all_interrupts();
        dev.ack_interrupts(INT_ALL);

        let mut discarded = 0;
        for channel in &self.channels {
            discarded += channel.deinit(&self.io, &self.mapper);
        }
        self.channels = Vec::new();
        self.monitor = Monitor::empty();
        self.recovery = RecoveryController::empty();
        self.device.with(|d| d.enabled = false);
        self.initialized = false;

        log_info!("engine down, {} buffers discarded", discarded);
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Whether [`init`](Self::init) has completed
    #[inline(always)]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Whether the device DMA is enabled
    pub fn is_enabled(&self) -> bool {
        self.device.with_ref(|d| d.enabled)
    }

    /// Number of channels
    #[inline(always)]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Active configuration
    #[inline(always)]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register shim
    #[inline(always)]
    pub fn io(&self) -> &R {
        &self.io
    }

    /// Buffer mapper
    #[inline(always)]
    pub fn mapper(&self) -> &M {
        &self.mapper
    }

    /// Queue between [`on_interrupt`](Self::on_interrupt) and the deferred
    /// worker
    #[inline(always)]
    pub fn work_queue(&self) -> &WorkQueue {
        &self.work
    }

    fn device_regs(&self) -> DeviceRegs<'_, R> {
        DeviceRegs::new(&self.io, &self.config.capabilities.registers, self.base)
    }

    fn channel(&self, channel: usize) -> Result<&Channel<M::Buffer>> {
        if !self.initialized {
            return Err(ConfigError::NotInitialized.into());
        }
        self.channels
            .get(channel)
            .ok_or_else(|| ConfigError::InvalidChannel.into())
    }

    /// Refuse channels that are down
    fn usable(&self, channel: usize) -> Result<()> {
        match self.monitor.down_error(channel) {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    #[cfg(test)]
    pub(crate) fn channel_ref(&self, channel: usize) -> &Channel<M::Buffer> {
        &self.channels[channel]
    }

    // =========================================================================
    // Channel Lifecycle
    // =========================================================================

    /// Start every channel
    pub fn start(&self) -> Result<()> {
        if !self.initialized {
            return Err(ConfigError::NotInitialized.into());
        }
        for id in 0..self.channels.len() {
            self.start_channel(id)?;
        }
        Ok(())
    }

    /// Stop every channel. In-flight descriptors stay posted.
    pub fn stop(&self) -> Result<()> {
        if !self.initialized {
            return Err(ConfigError::NotInitialized.into());
        }
        for id in 0..self.channels.len() {
            self.stop_channel(id)?;
        }
        Ok(())
    }

    /// `Stopped → Running`. Starting a running channel is a no-op.
    pub fn start_channel(&self, channel: usize) -> Result<()> {
        let ch = self.channel(channel)?;
        self.usable(channel)?;
        match self.monitor.state(channel) {
            Some(ChannelState::Running) => return Ok(()),
            Some(ChannelState::Stopped) => {}
            _ => return Err(IoError::InvalidState.into()),
        }
        ch.start(&self.io)?;
        self.monitor.mark_started(channel, self.clock.now())?;
        log_debug!("ch{}: running", channel);
        Ok(())
    }

    /// Any state except `Recovering` → `Stopped`. Idempotent.
    pub fn stop_channel(&self, channel: usize) -> Result<()> {
        let ch = self.channel(channel)?;
        self.monitor.mark_stopped(channel)?;
        ch.stop(&self.io);
        Ok(())
    }

    /// `Running → Suspended`: rings disabled, in-flight descriptors kept
    pub fn suspend_channel(&self, channel: usize) -> Result<()> {
        let ch = self.channel(channel)?;
        self.monitor.suspend(channel)?;
        ch.stop(&self.io);
        Ok(())
    }

    /// Leave `Suspended`.
    ///
    /// A channel that faulted while suspended comes back in `Error` with its
    /// rings still stopped, and recovery is queued for the deferred worker.
    pub fn resume_channel(&self, channel: usize) -> Result<()> {
        let ch = self.channel(channel)?;
        self.usable(channel)?;
        match self.monitor.resume(channel, self.clock.now())? {
            ChannelState::Running => ch.start(&self.io),
            _ => {
                self.work.post(channel, Work::RECOVER);
                log_debug!("ch{}: resumed with faults pending", channel);
                Ok(())
            }
        }
    }

    /// Bring a channel back from `Down` or any other state except
    /// `Recovering`.
    ///
    /// Stops the channel, pulses its local reset, clears its error status,
    /// discards in-flight transfers and reprograms the rings. The retry
    /// budget starts over. A channel that was stopped stays stopped; any
    /// other channel is restarted.
    pub fn reinit_channel<D: DelayNs + ?Sized>(&self, channel: usize, delay: &mut D) -> Result<()> {
        let ch = self.channel(channel)?;
        let was_stopped = self.monitor.state(channel) == Some(ChannelState::Stopped);
        self.monitor.reset_channel(channel)?;

        ch.stop(&self.io);
        ch.assert_reset(&self.io);
        delay.delay_us(self.config.channel_reset_us);
        ch.release_reset(&self.io);
        ch.clear_error_status(&self.io, ErrorCategories::all());
        let discarded = ch.reset_rings(&self.mapper);
        ch.program(&self.io);

        log_info!("ch{}: reinitialized, {} buffers discarded", channel, discarded);
        if was_stopped {
            return Ok(());
        }
        self.start_channel(channel)
    }

    // =========================================================================
    // Data Path
    // =========================================================================

    /// Post a buffer on one ring of a channel.
    ///
    /// On failure the buffer comes back in the [`Rejected`]. A full ring is
    /// [`DmaError::ResourceExhausted`]; a down channel is
    /// [`IoError::Fatal`] or [`IoError::ChannelDown`].
    pub fn enqueue(
        &self,
        channel: usize,
        direction: Direction,
        buffer: M::Buffer,
        length: usize,
    ) -> core::result::Result<(), Rejected<M::Buffer>> {
        let ch = match self.channel(channel) {
            Ok(ch) => ch,
            Err(e) => return Err(Rejected::new(e, buffer)),
        };
        if let Err(e) = self.usable(channel) {
            return Err(Rejected::new(e, buffer));
        }

        match ch.enqueue(&self.io, direction, buffer, length, &self.mapper) {
            Ok(()) => {
                self.device
                    .with(|d| d.stats.enqueued = d.stats.enqueued.saturating_add(1));
                Ok(())
            }
            Err(rejected) => {
                if rejected.is_full() {
                    self.monitor.on_ring_full(channel);
                    self.device
                        .with(|d| d.stats.ring_full = d.stats.ring_full.saturating_add(1));
                }
                Err(rejected)
            }
        }
    }

    /// Take back the oldest finished transfer on one ring.
    ///
    /// `Ok(None)` means nothing is ready yet.
    pub fn poll_reclaim(
        &self,
        channel: usize,
        direction: Direction,
    ) -> Result<Option<Completion<M::Buffer>>> {
        let ch = self.channel(channel)?;
        self.usable(channel)?;
        let completion = ch.reclaim(direction, &self.mapper);
        if let Some(c) = &completion {
            let failed = c.is_error();
            self.device.with(|d| {
                d.stats.completed = d.stats.completed.saturating_add(1);
                if failed {
                    d.stats.completion_errors = d.stats.completion_errors.saturating_add(1);
                }
            });
        }
        Ok(completion)
    }

    // =========================================================================
    // Management
    // =========================================================================

    /// Snapshot of the engine counters
    pub fn stats(&self) -> EngineStats {
        self.device.with_ref(|d| d.stats)
    }

    /// Zero the engine counters
    pub fn clear_stats(&self) {
        self.device.with(|d| d.stats = EngineStats::default());
    }

    /// Replace a channel's recovery policy
    pub fn set_recovery_policy(&self, channel: usize, policy: RecoveryPolicy) -> Result<()> {
        self.channel(channel)?;
        self.recovery.set_policy(channel, policy);
        Ok(())
    }

    /// A channel's recovery policy
    pub fn recovery_policy(&self, channel: usize) -> Result<RecoveryPolicy> {
        self.channel(channel)?;
        self.recovery
            .policy(channel)
            .ok_or_else(|| ConfigError::InvalidChannel.into())
    }

    /// A channel's lifecycle state
    pub fn channel_state(&self, channel: usize) -> Result<ChannelState> {
        self.channel(channel)?;
        self.monitor
            .state(channel)
            .ok_or_else(|| ConfigError::InvalidChannel.into())
    }

    /// Whether a channel has been given up on
    pub fn is_channel_down(&self, channel: usize) -> bool {
        self.monitor.is_down(channel)
    }

    /// Every channel currently down
    pub fn down_channels(&self) -> ChannelMask {
        let mut mask = ChannelMask::EMPTY;
        for id in 0..self.channels.len() {
            if self.monitor.is_down(id) {
                mask.insert(id);
            }
        }
        mask
    }

    /// A channel's counters
    pub fn channel_stats(&self, channel: usize) -> Result<ChannelStats> {
        self.channel(channel)?;
        self.monitor
            .stats(channel)
            .ok_or_else(|| ConfigError::InvalidChannel.into())
    }

    /// Zero a channel's counters
    pub fn reset_channel_stats(&self, channel: usize) -> Result<()> {
        self.channel(channel)?;
        self.monitor.reset_stats(channel);
        Ok(())
    }

    // =========================================================================
    // Interrupt Context
    // =========================================================================

    /// Service the device interrupt.
    ///
    /// Reads and acknowledges the interrupt status, counts events in the
    /// monitor, records faults latched in the error status of channels that
    /// raised an error, and posts reclaim/refill/recover work. Returns the
    /// decoded status.
    pub fn on_interrupt(&self) -> InterruptStatus {
        if !self.initialized {
            return InterruptStatus::default();
        }

        let dev = self.device_regs();
        let raw = dev.int_status();
        if raw == 0 {
            return InterruptStatus::default();
        }
        dev.ack_interrupts(raw);

        let status = InterruptStatus::from_raw(raw).limit(self.channels.len());
        let now = self.clock.now();
        self.device.with(|d| {
            d.stats.interrupts = d.stats.interrupts.saturating_add(1);
            d.stats.completion_events =
                d.stats.completion_events.saturating_add(status.complete.count());
            d.stats.error_events = d.stats.error_events.saturating_add(status.error.count());
        });

        for id in status.channels().iter() {
            let is_error = status.error.contains(id);
            self.monitor.on_interrupt(id, is_error, now);

            if status.complete.contains(id) {
                self.work.post(id, Work::RECLAIM | Work::REFILL);
            }
            if is_error {
                let categories = self.channels[id].error_status(&self.io);
                self.monitor.record_fault(id, categories, now);
                if self.monitor.is_down(id) {
                    self.channels[id].stop(&self.io);
                }
                self.work.post(id, Work::RECOVER);
                log_trace!("ch{}: error irq {:#x}", id, categories.bits());
            }
        }
        status
    }

    // =========================================================================
    // Deferred Context
    // =========================================================================

    /// One pass of the deferred worker.
    ///
    /// Claims pending work, hands every finished transfer to `sink`,
    /// refills receive rings from `sink`, and runs one recovery attempt for
    /// each faulted channel whose policy allows automatic recovery. Returns
    /// an empty report once the queue is closed.
    pub fn run_deferred<S, D>(&self, sink: &mut S, delay: &mut D) -> ServiceReport
    where
        S: CompletionSink<M::Buffer> + ?Sized,
        D: DelayNs + ?Sized,
    {
        let mut report = ServiceReport::default();
        let Some(guard) = self.work.begin() else {
            return report;
        };
        let work = guard.take();

        for id in work.reclaim.iter() {
            report.reclaimed += self.drain_channel(id, sink);
        }
        for id in work.refill.iter() {
            report.refilled += self.refill_channel(id, sink);
        }
        for id in work.recover.iter() {
            if self.recovery.policy(id).is_some_and(|p| p.auto_recover) {
                report.record(id, self.attempt_recovery(id, delay));
            }
        }

        drop(guard);
        report
    }

    /// Periodic health check, nominally every `watchdog_period_ms`.
    ///
    /// Decays the sliding windows, flags channels that have been silent for
    /// the stall threshold, records faults latched in the error status of
    /// running channels, and runs at most one recovery attempt per faulted
    /// channel.
    pub fn watchdog_tick<D: DelayNs + ?Sized>(&self, delay: &mut D) -> WatchdogReport {
        let mut report = WatchdogReport::default();
        let Some(guard) = self.work.begin() else {
            return report;
        };

        let now = self.clock.now();
        report.stalled = self.monitor.watchdog_tick(now);
        if !report.stalled.is_empty() {
            let stalled = report.stalled.count();
            self.device.with(|d| {
                d.stats.watchdog_timeouts = d.stats.watchdog_timeouts.saturating_add(stalled);
            });
            for id in report.stalled.iter() {
                log_warn!("ch{}: no progress for {} ms", id, self.config.stall_threshold_ms);
            }
        }

        for channel in &self.channels {
            let id = channel.id();
            if !channel.is_running() {
                continue;
            }
            if !self.monitor.is_down(id) {
                let categories = channel.error_status(&self.io);
                if !categories.is_empty() {
                    report.faulted.insert(id);
                    self.monitor.record_fault(id, categories, now);
                }
            }
            if self.monitor.is_down(id) {
                channel.stop(&self.io);
                report.down.insert(id);
                log_error!("ch{}: down, rings stopped", id);
            }
        }

        for id in 0..self.channels.len() {
            if self.monitor.state(id) != Some(ChannelState::Error) {
                continue;
            }
            if self.recovery.policy(id).is_some_and(|p| p.auto_recover) {
                report.record(id, self.attempt_recovery(id, delay));
            }
        }

        drop(guard);
        report
    }

    /// Run one recovery attempt on a channel now, whatever its policy's
    /// `auto_recover` setting.
    pub fn recover_channel<D: DelayNs + ?Sized>(
        &self,
        channel: usize,
        delay: &mut D,
    ) -> Result<RecoveryOutcome> {
        self.channel(channel)?;
        Ok(self.attempt_recovery(channel, delay))
    }

    fn drain_channel<S>(&self, id: usize, sink: &mut S) -> usize
    where
        S: CompletionSink<M::Buffer> + ?Sized,
    {
        let Some(ch) = self.channels.get(id) else {
            return 0;
        };

        let mut count = 0u32;
        let mut errors = 0u32;
        for direction in Direction::ALL {
            while let Some(completion) = ch.reclaim(direction, &self.mapper) {
                count += 1;
                if completion.is_error() {
                    errors += 1;
                }
                sink.complete(id, direction, completion);
            }
        }

        if count > 0 {
            self.device.with(|d| {
                d.stats.completed = d.stats.completed.saturating_add(count);
                d.stats.completion_errors = d.stats.completion_errors.saturating_add(errors);
            });
        }
        count as usize
    }

    fn refill_channel<S>(&self, id: usize, sink: &mut S) -> usize
    where
        S: CompletionSink<M::Buffer> + ?Sized,
    {
        let Some(ch) = self.channels.get(id) else {
            return 0;
        };
        if self.monitor.state(id) != Some(ChannelState::Running) {
            return 0;
        }

        let mut posted = 0;
        while ch.with_ring(Direction::FromDevice, |r| r.free_slots()) > 0 {
            let Some((buffer, length)) = sink.rx_buffer(id) else {
                break;
            };
            match ch.enqueue(&self.io, Direction::FromDevice, buffer, length, &self.mapper) {
                Ok(()) => posted += 1,
                Err(rejected) => {
                    sink.give_back(id, rejected.buffer);
                    break;
                }
            }
        }

        if posted > 0 {
            self.device
                .with(|d| d.stats.enqueued = d.stats.enqueued.saturating_add(posted as u32));
        }
        posted
    }

    fn attempt_recovery<D: DelayNs + ?Sized>(&self, id: usize, delay: &mut D) -> RecoveryOutcome {
        let (Some(ch), Some(policy)) = (self.channels.get(id), self.recovery.policy(id)) else {
            return RecoveryOutcome::NotNeeded;
        };
        if policy.action == RecoveryAction::None && !self.monitor.is_down(id) {
            return RecoveryOutcome::Skipped;
        }

        let categories = match self.monitor.begin_recovery(id, &policy, self.clock.now()) {
            RecoveryClaim::Claimed(categories) => categories,
            RecoveryClaim::NotNeeded => return RecoveryOutcome::NotNeeded,
            RecoveryClaim::TooSoon => return RecoveryOutcome::Deferred,
            RecoveryClaim::NotCovered(pending) => {
                log_debug!("ch{}: {:#x} not covered by policy", id, pending.bits());
                return RecoveryOutcome::Skipped;
            }
            RecoveryClaim::Down => {
                if ch.stop(&self.io) {
                    log_error!("ch{}: down, reinit required", id);
                }
                return RecoveryOutcome::Down;
            }
        };

        self.device.with(|d| {
            d.stats.recoveries_attempted = d.stats.recoveries_attempted.saturating_add(1);
        });

        let result = self.recovery.execute(
            ch,
            &self.io,
            &self.mapper,
            delay,
            policy.action,
            categories,
            &self.config,
        );
        let (success, residual) = match result {
            Ok(true) => (true, ErrorCategories::empty()),
            Ok(false) => {
                let status = ch.error_status(&self.io);
                (false, if status.is_empty() { categories } else { status })
            }
            Err(_) => (false, categories),
        };

        let down =
            self.monitor
                .finish_recovery(id, success, residual, policy.max_retries, self.clock.now());

        if success {
            self.device.with(|d| {
                d.stats.recoveries_succeeded = d.stats.recoveries_succeeded.saturating_add(1);
            });
            self.work.post(id, Work::REFILL);
            log_info!("ch{}: recovered ({})", id, policy.action.as_str());
            RecoveryOutcome::Recovered
        } else if down {
            ch.stop(&self.io);
            log_error!(
                "ch{}: down after {} attempts, faults {:#x}",
                id,
                self.monitor.retries(id),
                residual.bits()
            );
            RecoveryOutcome::Down
        } else {
            log_warn!("ch{}: recovery failed, faults {:#x}", id, residual.bits());
            RecoveryOutcome::Failed
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    extern crate std;
    use std::vec;
    use std::vec::Vec;

    use super::*;
    use crate::driver::error::Error;
    use crate::internal::register::device::{int_complete, int_error};
    use crate::testing::{MockClock, MockDelay, MockMapper, MockRegisters, complete_tx, loopback};

    type TestEngine = Engine<MockRegisters, MockMapper, MockClock>;

    fn engine_with(config: EngineConfig) -> (TestEngine, MockClock, MockDelay) {
        let clock = MockClock::new();
        let delay = MockDelay::new(&clock);
        let engine = Engine::new(MockRegisters::new(), MockMapper::new(), clock.clone(), config);
        (engine, clock, delay)
    }

    fn running(count: usize) -> (TestEngine, MockClock, MockDelay) {
        let (mut engine, clock, mut delay) = engine_with(EngineConfig::new().with_ring_sizes(4, 4));
        engine.init(0, count, &mut delay).unwrap();
        engine.start().unwrap();
        (engine, clock, delay)
    }

    #[derive(Default)]
    struct Collector {
        done: Vec<(usize, Direction, Completion<Vec<u8>>)>,
        spare: Vec<Vec<u8>>,
        returned: usize,
    }

    impl CompletionSink<Vec<u8>> for Collector {
        fn complete(&mut self, channel: usize, direction: Direction, completion: Completion<Vec<u8>>) {
            self.done.push((channel, direction, completion));
        }

        fn rx_buffer(&mut self, _channel: usize) -> Option<(Vec<u8>, usize)> {
            self.spare.pop().map(|b| {
                let len = b.len();
                (b, len)
            })
        }

        fn give_back(&mut self, _channel: usize, _buffer: Vec<u8>) {
            self.returned += 1;
        }
    }

    // -------------------------------------------------------------------------
    // Bring-up and teardown
    // -------------------------------------------------------------------------

    #[test]
    fn init_leaves_channels_stopped() {
        let (mut engine, _clock, mut delay) = engine_with(EngineConfig::new());
        engine.init(0, 2, &mut delay).unwrap();

        assert!(engine.is_initialized());
        assert!(engine.is_enabled());
        assert_eq!(engine.channel_count(), 2);
        assert_eq!(engine.channel_state(1), Ok(ChannelState::Stopped));
        assert!(engine.work_queue().is_open());
    }

    #[test]
    fn init_twice_is_rejected() {
        let (mut engine, _clock, mut delay) = engine_with(EngineConfig::new());
        engine.init(0, 1, &mut delay).unwrap();
        assert_eq!(
            engine.init(0, 1, &mut delay),
            Err(Error::Config(ConfigError::AlreadyInitialized))
        );
    }

    #[test]
    fn init_times_out_without_ready() {
        let (mut engine, _clock, mut delay) =
            engine_with(EngineConfig::new().with_ready_timeout_us(1_000));
        engine.io().set_ready_on_reset(false);

        assert_eq!(
            engine.init(0, 1, &mut delay),
            Err(Error::Io(IoError::HardwareTimeout))
        );
        assert!(!engine.is_initialized());
        assert_eq!(engine.mapper().mapped(), 0);
    }

    #[test]
    fn init_rejects_too_many_channels() {
        let (mut engine, _clock, mut delay) = engine_with(EngineConfig::new());
        assert!(engine.init(0, 17, &mut delay).is_err());
        assert!(!engine.is_initialized());
    }

    #[test]
    fn init_rejects_stall_threshold_below_watchdog_period() {
        let config = EngineConfig::new()
            .with_watchdog_period_ms(2_000)
            .with_stall_threshold_ms(1_000);
        let (mut engine, _clock, mut delay) = engine_with(config);
        assert_eq!(
            engine.init(0, 1, &mut delay),
            Err(Error::Config(ConfigError::InvalidConfig))
        );
        assert!(!engine.is_initialized());
    }

    #[test]
    fn init_mapping_failure_releases_everything() {
        let (mut engine, _clock, mut delay) = engine_with(EngineConfig::new());
        engine.mapper().fail_next(true);

        assert_eq!(
            engine.init(0, 2, &mut delay),
            Err(Error::Dma(DmaError::MappingFailed))
        );
        assert!(!engine.is_initialized());
        assert!(!engine.is_enabled());
    }

    #[test]
    fn deinit_is_idempotent() {
        let (mut engine, _clock, _delay) = running(2);
        engine
            .enqueue(0, Direction::ToDevice, vec![1u8; 16], 16)
            .unwrap();

        engine.deinit();
        assert!(!engine.is_initialized());
        assert!(!engine.is_enabled());
        assert_eq!(engine.mapper().unmapped(), 1);

        let writes = engine.io().write_count();
        engine.deinit();
        assert_eq!(engine.io().write_count(), writes);
    }

    #[test]
    fn deinit_after_stop() {
        let (mut engine, _clock, _delay) = running(2);
        engine.stop().unwrap();
        engine.stop().unwrap();
        engine.deinit();
        assert!(!engine.is_initialized());
        assert_eq!(engine.channel_count(), 0);
    }

    #[test]
    fn operations_before_init_fail() {
        let (engine, _clock, _delay) = engine_with(EngineConfig::new());
        assert_eq!(engine.start(), Err(Error::Config(ConfigError::NotInitialized)));
        let rejected = engine
            .enqueue(0, Direction::ToDevice, vec![0u8; 4], 4)
            .unwrap_err();
        assert_eq!(rejected.error, Error::Config(ConfigError::NotInitialized));
        assert_eq!(engine.on_interrupt(), InterruptStatus::default());
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    #[test]
    fn stop_twice_writes_once() {
        let (engine, _clock, _delay) = running(1);

        engine.stop_channel(0).unwrap();
        let writes = engine.io().write_count();
        engine.stop_channel(0).unwrap();

        assert_eq!(engine.io().write_count(), writes);
        assert_eq!(engine.channel_state(0), Ok(ChannelState::Stopped));
    }

    #[test]
    fn suspend_and_resume() {
        let (engine, _clock, _delay) = running(1);

        engine.suspend_channel(0).unwrap();
        assert_eq!(engine.channel_state(0), Ok(ChannelState::Suspended));
        let rejected = engine
            .enqueue(0, Direction::ToDevice, vec![0u8; 8], 8)
            .unwrap_err();
        assert_eq!(rejected.error, Error::Io(IoError::InvalidState));

        engine.resume_channel(0).unwrap();
        assert_eq!(engine.channel_state(0), Ok(ChannelState::Running));
        assert_eq!(engine.resume_channel(0), Err(Error::Io(IoError::InvalidState)));
    }

    #[test]
    fn unknown_channel_is_rejected() {
        let (engine, _clock, _delay) = running(1);
        assert_eq!(
            engine.start_channel(3),
            Err(Error::Config(ConfigError::InvalidChannel))
        );
    }

    // -------------------------------------------------------------------------
    // Data path
    // -------------------------------------------------------------------------

    #[test]
    fn loopback_round_trip() {
        let (engine, _clock, mut delay) = running(2);
        engine
            .enqueue(1, Direction::FromDevice, vec![0u8; 64], 64)
            .unwrap();
        engine
            .enqueue(0, Direction::ToDevice, vec![0xA5, 1, 2, 3, 4], 5)
            .unwrap();

        assert_eq!(loopback(engine.io(), engine.channel_ref(0), engine.channel_ref(1)), 1);

        let status = engine.on_interrupt();
        assert_eq!(status.complete, ChannelMask::single(0) | ChannelMask::single(1));

        let mut sink = Collector::default();
        let report = engine.run_deferred(&mut sink, &mut delay);
        assert_eq!(report.reclaimed, 2);

        let (_, _, rx) = sink
            .done
            .iter()
            .find(|(ch, dir, _)| *ch == 1 && *dir == Direction::FromDevice)
            .unwrap();
        assert_eq!(rx.length, 5);
        assert_eq!(&rx.buffer[..5], &[0xA5u8, 1, 2, 3, 4][..]);
        assert!(!rx.is_error());

        let stats = engine.stats();
        assert_eq!(stats.enqueued, 2);
        assert_eq!(stats.completed, 2);
        assert_eq!(engine.mapper().unmapped(), 2);
    }

    #[test]
    fn ring_of_four_holds_three() {
        let (engine, _clock, _delay) = running(1);
        for _ in 0..3 {
            engine
                .enqueue(0, Direction::ToDevice, vec![0u8; 64], 64)
                .unwrap();
        }

        let rejected = engine
            .enqueue(0, Direction::ToDevice, vec![7u8; 64], 64)
            .unwrap_err();
        assert!(rejected.is_full());
        assert_eq!(rejected.buffer[0], 7);
        assert_eq!(engine.stats().ring_full, 1);
        assert_eq!(engine.channel_stats(0).unwrap().ring_full_events, 1);
    }

    #[test]
    fn reclaim_frees_a_slot() {
        let (engine, _clock, _delay) = running(1);
        for _ in 0..3 {
            engine
                .enqueue(0, Direction::ToDevice, vec![0u8; 64], 64)
                .unwrap();
        }
        assert!(engine.poll_reclaim(0, Direction::ToDevice).unwrap().is_none());

        assert_eq!(complete_tx(engine.io(), engine.channel_ref(0)), 3);
        let first = engine.poll_reclaim(0, Direction::ToDevice).unwrap().unwrap();
        assert_eq!(first.length, 64);
        engine
            .enqueue(0, Direction::ToDevice, vec![0u8; 64], 64)
            .unwrap();
    }

    #[test]
    fn refill_posts_sink_buffers() {
        let (engine, _clock, mut delay) = running(1);
        engine.io().raise_interrupt(int_complete(0));
        engine.on_interrupt();

        let mut sink = Collector {
            spare: vec![vec![0u8; 128]; 5],
            ..Collector::default()
        };
        let report = engine.run_deferred(&mut sink, &mut delay);

        assert_eq!(report.refilled, 3);
        assert_eq!(sink.spare.len(), 2);
        assert_eq!(sink.returned, 0);
        assert_eq!(engine.channel_ref(0).in_flight(Direction::FromDevice), 3);
    }

    // -------------------------------------------------------------------------
    // Interrupt context
    // -------------------------------------------------------------------------

    #[test]
    fn interrupt_acks_and_posts_work() {
        let (engine, _clock, _delay) = running(2);
        engine.io().raise_interrupt(int_complete(1));

        let status = engine.on_interrupt();
        assert_eq!(status.complete, ChannelMask::single(1));
        assert_eq!(engine.io().peek(engine.config().capabilities.registers.int_status), 0);

        let guard = engine.work_queue().begin().unwrap();
        let work = guard.take();
        assert_eq!(work.reclaim, ChannelMask::single(1));
        assert_eq!(work.refill, ChannelMask::single(1));
        assert!(work.recover.is_empty());
    }

    #[test]
    fn interrupt_ignores_channels_out_of_range() {
        let (engine, _clock, _delay) = running(2);
        engine.io().raise_interrupt(int_complete(9) | int_error(12));

        let status = engine.on_interrupt();
        assert!(!status.any());
        assert!(!engine.work_queue().has_pending());
    }

    #[test]
    fn error_interrupt_records_fault() {
        let (engine, _clock, _delay) = running(1);
        engine.io().inject_error(0, ErrorCategories::DATA.bits());

        let status = engine.on_interrupt();
        assert!(status.has_error());
        assert_eq!(engine.channel_state(0), Ok(ChannelState::Error));
        assert_eq!(engine.stats().error_events, 1);
        assert_eq!(engine.channel_stats(0).unwrap().error_interrupts, 1);
    }

    // -------------------------------------------------------------------------
    // Watchdog and recovery
    // -------------------------------------------------------------------------

    #[test]
    fn silent_channel_stalls_and_recovers() {
        let (engine, clock, mut delay) = running(1);

        clock.advance_ms(4_000);
        assert!(engine.watchdog_tick(&mut delay).stalled.is_empty());

        clock.advance_ms(2_000);
        let report = engine.watchdog_tick(&mut delay);
        assert_eq!(report.stalled, ChannelMask::single(0));
        assert_eq!(report.recovered, ChannelMask::single(0));
        assert_eq!(engine.channel_state(0), Ok(ChannelState::Running));

        let stats = engine.stats();
        assert_eq!(stats.watchdog_timeouts, 1);
        assert_eq!(stats.recoveries_succeeded, 1);
        assert_eq!(engine.channel_stats(0).unwrap().timeouts, 1);
    }

    #[test]
    fn interrupts_keep_the_watchdog_quiet() {
        let (engine, clock, mut delay) = running(1);
        for _ in 0..4 {
            clock.advance_ms(3_000);
            engine.io().raise_interrupt(int_complete(0));
            engine.on_interrupt();
            assert!(engine.watchdog_tick(&mut delay).stalled.is_empty());
        }
    }

    #[test]
    fn sticky_fault_exhausts_retry_budget() {
        let (engine, clock, mut delay) = running(1);
        engine.io().set_sticky_error(0, ErrorCategories::DATA.bits());

        let mut outcomes = Vec::new();
        for _ in 0..3 {
            clock.advance_ms(500);
            let before = engine.stats().recoveries_attempted;
            let report = engine.watchdog_tick(&mut delay);
            assert_eq!(engine.stats().recoveries_attempted, before + 1);
            outcomes.push(report);
        }

        assert_eq!(outcomes[0].failed, ChannelMask::single(0));
        assert_eq!(outcomes[1].failed, ChannelMask::single(0));
        assert_eq!(outcomes[2].down, ChannelMask::single(0));
        assert!(engine.is_channel_down(0));
        assert_eq!(engine.down_channels(), ChannelMask::single(0));
        assert_eq!(engine.channel_state(0), Ok(ChannelState::Error));
        assert!(!engine.channel_ref(0).is_running());

        clock.advance_ms(500);
        engine.watchdog_tick(&mut delay);
        assert_eq!(engine.stats().recoveries_attempted, 3);

        let rejected = engine
            .enqueue(0, Direction::ToDevice, vec![0u8; 8], 8)
            .unwrap_err();
        assert_eq!(rejected.error, Error::Io(IoError::ChannelDown));
    }

    #[test]
    fn retry_interval_defers_attempts() {
        let (engine, clock, mut delay) = running(1);
        engine.io().set_sticky_error(0, ErrorCategories::FIFO.bits());

        clock.advance_ms(10);
        engine.watchdog_tick(&mut delay);
        clock.advance_ms(10);
        engine.watchdog_tick(&mut delay);

        assert_eq!(engine.stats().recoveries_attempted, 1);
        assert_eq!(engine.recover_channel(0, &mut delay), Ok(RecoveryOutcome::Deferred));
    }

    #[test]
    fn fatal_fault_goes_down_until_reinit() {
        let (engine, _clock, mut delay) = running(1);
        engine
            .enqueue(0, Direction::ToDevice, vec![0u8; 8], 8)
            .unwrap();
        engine.io().inject_error(0, ErrorCategories::FATAL.bits());
        engine.on_interrupt();
        assert!(engine.is_channel_down(0));

        let mut sink = Collector::default();
        let report = engine.run_deferred(&mut sink, &mut delay);
        assert_eq!(report.down, ChannelMask::single(0));
        assert_eq!(engine.stats().recoveries_attempted, 0);
        assert_eq!(engine.start_channel(0), Err(Error::Io(IoError::Fatal)));
        let rejected = engine
            .enqueue(0, Direction::ToDevice, vec![0u8; 8], 8)
            .unwrap_err();
        assert_eq!(rejected.error, Error::Io(IoError::Fatal));

        engine.reinit_channel(0, &mut delay).unwrap();
        assert!(!engine.is_channel_down(0));
        assert_eq!(engine.channel_state(0), Ok(ChannelState::Running));
        assert_eq!(engine.channel_ref(0).in_flight(Direction::ToDevice), 0);
        assert_eq!(engine.mapper().unmapped(), 1);
        assert!(engine.channel_ref(0).error_status(engine.io()).is_empty());
    }

    #[test]
    fn fatal_fault_stops_rings_without_auto_recover() {
        let (engine, _clock, mut delay) = running(1);
        engine
            .set_recovery_policy(0, RecoveryPolicy::new().with_auto_recover(false))
            .unwrap();
        engine.io().inject_error(0, ErrorCategories::FATAL.bits());

        engine.on_interrupt();
        assert!(engine.is_channel_down(0));
        assert!(!engine.channel_ref(0).is_running());

        engine.run_deferred(&mut Collector::default(), &mut delay);
        engine.watchdog_tick(&mut delay);
        assert!(!engine.channel_ref(0).is_running());
        assert_eq!(engine.stats().recoveries_attempted, 0);
        assert_eq!(
            engine.poll_reclaim(0, Direction::ToDevice).err(),
            Some(Error::Io(IoError::Fatal))
        );
    }

    #[test]
    fn fault_while_suspended_waits_for_resume() {
        let (engine, _clock, mut delay) = running(1);
        engine.suspend_channel(0).unwrap();
        engine.io().inject_error(0, ErrorCategories::BUS.bits());

        engine.on_interrupt();
        assert_eq!(engine.channel_state(0), Ok(ChannelState::Suspended));

        let report = engine.run_deferred(&mut Collector::default(), &mut delay);
        assert!(report.recovered.is_empty());
        assert_eq!(engine.channel_state(0), Ok(ChannelState::Suspended));
        assert!(!engine.channel_ref(0).is_running());
        assert_eq!(engine.stats().recoveries_attempted, 0);

        engine.resume_channel(0).unwrap();
        assert_eq!(engine.channel_state(0), Ok(ChannelState::Error));
        assert!(!engine.channel_ref(0).is_running());

        let report = engine.run_deferred(&mut Collector::default(), &mut delay);
        assert_eq!(report.recovered, ChannelMask::single(0));
        assert_eq!(engine.channel_state(0), Ok(ChannelState::Running));
        assert!(engine.channel_ref(0).is_running());
    }

    #[test]
    fn uncovered_fault_is_skipped() {
        let (engine, _clock, mut delay) = running(1);
        engine
            .set_recovery_policy(0, RecoveryPolicy::new().with_categories(ErrorCategories::BUS))
            .unwrap();
        engine.io().inject_error(0, ErrorCategories::DATA.bits());
        engine.on_interrupt();

        assert_eq!(engine.recover_channel(0, &mut delay), Ok(RecoveryOutcome::Skipped));
        assert_eq!(engine.channel_state(0), Ok(ChannelState::Error));
    }

    #[test]
    fn manual_recovery_without_auto() {
        let (engine, _clock, mut delay) = running(1);
        engine
            .set_recovery_policy(0, RecoveryPolicy::new().with_auto_recover(false))
            .unwrap();
        engine.io().inject_error(0, ErrorCategories::DESCRIPTOR.bits());
        engine.on_interrupt();

        let report = engine.run_deferred(&mut Collector::default(), &mut delay);
        assert!(report.recovered.is_empty());
        assert_eq!(engine.channel_state(0), Ok(ChannelState::Error));

        assert_eq!(engine.recover_channel(0, &mut delay), Ok(RecoveryOutcome::Recovered));
        assert_eq!(engine.channel_state(0), Ok(ChannelState::Running));
        assert_eq!(engine.recover_channel(0, &mut delay), Ok(RecoveryOutcome::NotNeeded));
    }
}
