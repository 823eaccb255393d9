//! One DMA channel: a TX ring, an RX ring and their register window.
//!
//! Each ring sits behind its own critical-section lock so the data path of
//! one direction never waits on the other. The lock also covers the head
//! doorbell write, which keeps doorbell values in enqueue order.

use crate::driver::config::{EngineConfig, Features};
use crate::driver::error::{ConfigError, ErrorCategories, Rejected, Result};
use crate::hal::mapping::{BufferMapper, Direction};
use crate::hal::registers::RegisterIo;
use crate::internal::dma::{Completion, Descriptor, Ring};
use crate::internal::fmt::{log_debug, log_trace};
use crate::internal::register::RegisterMap;
use crate::internal::register::channel::{
    ChannelRegs, DESC_CHAINED, DESC_TIMESTAMP, DESC_WORDS_MASK, DESC_WORDS_SHIFT,
};
use crate::sync::CriticalSectionCell;

#[derive(Debug, Clone, Copy, Default)]
struct ChannelFlags {
    initialized: bool,
    running: bool,
}

/// A channel's rings and register window
pub struct Channel<B> {
    id: usize,
    window: usize,
    map: RegisterMap,
    features: Features,
    tx: CriticalSectionCell<Ring<B>>,
    rx: CriticalSectionCell<Ring<B>>,
    flags: CriticalSectionCell<ChannelFlags>,
}

impl<B> Channel<B> {
    /// Allocate and map both rings of channel `id`.
    ///
    /// `window` is the absolute offset of the channel's register window.
    /// Either both rings are created or neither: a TX ring built before an
    /// RX failure is released again.
    pub fn new<M>(id: usize, window: usize, config: &EngineConfig, mapper: &M) -> Result<Self>
    where
        M: BufferMapper<Buffer = B> + ?Sized,
    {
        let tx = Self::build_ring(Direction::ToDevice, config.tx_ring_size, config, mapper)?;
        let rx = match Self::build_ring(Direction::FromDevice, config.rx_ring_size, config, mapper)
        {
            Ok(rx) => rx,
            Err(e) => {
                let mut tx = tx;
                tx.release(mapper);
                return Err(e);
            }
        };

        log_debug!(
            "ch{}: rings tx={} rx={} at {:#x}",
            id,
            tx.capacity(),
            rx.capacity(),
            window
        );

        Ok(Self {
            id,
            window,
            map: config.capabilities.registers,
            features: config.capabilities.features,
            tx: CriticalSectionCell::new(tx),
            rx: CriticalSectionCell::new(rx),
            flags: CriticalSectionCell::new(ChannelFlags {
                initialized: true,
                running: false,
            }),
        })
    }

    fn build_ring<M>(
        direction: Direction,
        capacity: usize,
        config: &EngineConfig,
        mapper: &M,
    ) -> Result<Ring<B>>
    where
        M: BufferMapper<Buffer = B> + ?Sized,
    {
        let caps = &config.capabilities;
        let mut ring = Ring::new(direction, capacity, caps.max_ring_size, caps.layout)?;
        if let Err(e) = ring.map_storage(mapper) {
            ring.release(mapper);
            return Err(e);
        }
        Ok(ring)
    }

    fn ring(&self, direction: Direction) -> &CriticalSectionCell<Ring<B>> {
        match direction {
            Direction::ToDevice => &self.tx,
            Direction::FromDevice => &self.rx,
        }
    }

    fn regs<'a, R: RegisterIo>(&'a self, io: &'a R) -> ChannelRegs<'a, R> {
        ChannelRegs::new(io, &self.map, self.window)
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Channel index
    #[inline(always)]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Absolute offset of the register window
    #[inline(always)]
    pub fn window(&self) -> usize {
        self.window
    }

    /// Whether the rings are allocated
    pub fn is_initialized(&self) -> bool {
        self.flags.with_ref(|f| f.initialized)
    }

    /// Whether the ring engines are enabled
    pub fn is_running(&self) -> bool {
        self.flags.with_ref(|f| f.running)
    }

    /// Descriptors in flight in one direction
    pub fn in_flight(&self, direction: Direction) -> usize {
        self.ring(direction).with_ref(Ring::len)
    }

    /// Run `f` with one ring locked
    pub(crate) fn with_ring<T>(&self, direction: Direction, f: impl FnOnce(&mut Ring<B>) -> T) -> T {
        self.ring(direction).with(f)
    }

    // -------------------------------------------------------------------------
    // Hardware programming
    // -------------------------------------------------------------------------

    /// Write ring bases, sizes, head doorbells and descriptor control
    pub fn program<R: RegisterIo>(&self, io: &R) {
        let regs = self.regs(io);

        for direction in Direction::ALL {
            self.ring(direction).with_ref(|ring| {
                regs.set_ring_base(direction, ring.base_address(), ring.capacity());
                regs.ring_doorbell(direction, ring.head());
            });
        }

        let mut desc = ((Descriptor::WORDS as u32) << DESC_WORDS_SHIFT) & DESC_WORDS_MASK;
        if self.features.contains(Features::CHAINED) {
            desc |= DESC_CHAINED;
        }
        if self.features.contains(Features::TIMESTAMPS) {
            desc |= DESC_TIMESTAMP;
        }
        regs.set_desc_control(desc);
    }

    /// Enable both ring engines. A running channel is left untouched.
    pub fn start<R: RegisterIo>(&self, io: &R) -> Result<()> {
        let proceed = self.flags.with(|f| {
            if !f.initialized {
                return Err(ConfigError::NotInitialized);
            }
            if f.running {
                return Ok(false);
            }
            f.running = true;
            Ok(true)
        })?;
        if !proceed {
            return Ok(());
        }

        self.tx.with(|r| r.set_enabled(true));
        self.rx.with(|r| r.set_enabled(true));
        self.regs(io).enable_rings();
        log_trace!("ch{}: started", self.id);
        Ok(())
    }

    /// Disable both ring engines.
    ///
    /// Returns `false` without touching hardware if the channel was not
    /// running.
    pub fn stop<R: RegisterIo>(&self, io: &R) -> bool {
        let was_running = self.flags.with(|f| core::mem::replace(&mut f.running, false));
        if !was_running {
            return false;
        }

        self.tx.with(|r| r.set_enabled(false));
        self.rx.with(|r| r.set_enabled(false));
        self.regs(io).disable_rings();
        log_trace!("ch{}: stopped", self.id);
        true
    }

    /// Stop the channel and free both rings.
    ///
    /// Returns the number of in-flight buffers discarded. A second call does
    /// nothing.
    pub fn deinit<R, M>(&self, io: &R, mapper: &M) -> usize
    where
        R: RegisterIo,
        M: BufferMapper<Buffer = B> + ?Sized,
    {
        if !self.is_initialized() {
            return 0;
        }
        self.stop(io);
        let discarded = self.tx.with(|r| r.release(mapper)) + self.rx.with(|r| r.release(mapper));
        self.flags.with(|f| f.initialized = false);
        log_debug!("ch{}: deinit, {} buffers discarded", self.id, discarded);
        discarded
    }

    // -------------------------------------------------------------------------
    // Data path
    // -------------------------------------------------------------------------

    /// Post a buffer and ring the direction's head doorbell
    pub fn enqueue<R, M>(
        &self,
        io: &R,
        direction: Direction,
        buffer: B,
        length: usize,
        mapper: &M,
    ) -> core::result::Result<(), Rejected<B>>
    where
        R: RegisterIo,
        M: BufferMapper<Buffer = B> + ?Sized,
    {
        if !self.is_initialized() {
            return Err(Rejected::new(ConfigError::NotInitialized, buffer));
        }
        let regs = self.regs(io);
        self.ring(direction).with(|ring| {
            let head = ring.enqueue(buffer, length, mapper)?;
            regs.ring_doorbell(direction, head);
            Ok(())
        })
    }

    /// Take back the oldest finished transfer in one direction
    pub fn reclaim<M>(&self, direction: Direction, mapper: &M) -> Option<Completion<B>>
    where
        M: BufferMapper<Buffer = B> + ?Sized,
    {
        self.ring(direction).with(|ring| ring.reclaim(mapper))
    }

    // -------------------------------------------------------------------------
    // Recovery support
    // -------------------------------------------------------------------------

    /// Discard in-flight transfers on both rings and rewind to index zero
    pub fn reset_rings<M>(&self, mapper: &M) -> usize
    where
        M: BufferMapper<Buffer = B> + ?Sized,
    {
        self.tx.with(|r| r.reset_indices(mapper)) + self.rx.with(|r| r.reset_indices(mapper))
    }

    /// Replace both rings with freshly allocated ones.
    ///
    /// New storage is built before the old is released, so on failure the
    /// channel keeps its current rings.
    pub fn reload_rings<M>(&self, config: &EngineConfig, mapper: &M) -> Result<usize>
    where
        M: BufferMapper<Buffer = B> + ?Sized,
    {
        let tx = Self::build_ring(Direction::ToDevice, config.tx_ring_size, config, mapper)?;
        let rx = match Self::build_ring(Direction::FromDevice, config.rx_ring_size, config, mapper)
        {
            Ok(rx) => rx,
            Err(e) => {
                let mut tx = tx;
                tx.release(mapper);
                return Err(e);
            }
        };

        let mut discarded = 0;
        for (cell, fresh) in [(&self.tx, tx), (&self.rx, rx)] {
            let mut old = cell.replace(fresh);
            cell.with(|r| r.set_enabled(old.is_enabled()));
            discarded += old.release(mapper);
        }
        Ok(discarded)
    }

    /// Fault categories currently reported by the channel
    pub fn error_status<R: RegisterIo>(&self, io: &R) -> ErrorCategories {
        ErrorCategories::from_bits_truncate(self.regs(io).error_status())
    }

    /// Acknowledge error status bits (write-1-to-clear)
    pub fn clear_error_status<R: RegisterIo>(&self, io: &R, categories: ErrorCategories) {
        self.regs(io).clear_errors(categories.bits());
    }

    /// Hold the channel-local reset
    pub fn assert_reset<R: RegisterIo>(&self, io: &R) {
        self.regs(io).assert_reset();
    }

    /// Release the channel-local reset
    pub fn release_reset<R: RegisterIo>(&self, io: &R) {
        self.regs(io).release_reset();
    }
}
