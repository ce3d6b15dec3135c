// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! ISI host controller
//!
//! [`Isi`] ties the pieces together: it negotiates formats with the attached
//! [`Sensor`], binds caller buffers to DMA descriptors, runs the buffer
//! queue and services the controller interrupt.
//!
//! All mutable streaming state lives behind one mutex that both the public
//! methods and [`Isi::handle_interrupt`] take. Register writes that arm a
//! transfer happen while that mutex is held, handshake waits never do.

use crate::{
    buffer::{Buffer, BufferId, BufferSink, BufferState, CompletedBuffer, Plane},
    bus::{self, BusFlags, PlatformData},
    completion::Completion,
    descriptor::{DescriptorPool, DescriptorTable, MAX_BUFFER_NUM},
    format::{find_by_fourcc, translations, Translation},
    fourcc::FourCC,
    geometry::{clamp_to_hardware, DataPath, Geometry},
    queue::{BufferQueue, StreamState},
    regs::{cfg1, ctrl, dma, status, IrqReturn, Register, Registers},
    sensor::{enum_formats, Colorspace, Field, MbusFrameFormat, Sensor},
    Error, Handshake,
};
use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread,
    time::{Duration, Instant},
};

/// Lowest sensor frame rate the drain budget is sized for.
pub const MIN_FRAME_RATE: u64 = 15;
/// One frame at [`MIN_FRAME_RATE`].
pub const FRAME_INTERVAL: Duration = Duration::from_millis(1000 / MIN_FRAME_RATE);
/// Reset and disable acknowledgement budget.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(100);
/// Upper bound of all buffers of one queue together.
pub const VID_LIMIT_BYTES: usize = 16 * 1024 * 1024;
/// Default physical address of the descriptor table.
pub const DEFAULT_DESCRIPTOR_BASE: u32 = 0x2ff0_0000;

/// Controller configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsiConfig {
    /// board wiring of the ISI
    platform: PlatformData,

    /// how long reset and disable may take to be acknowledged
    handshake_timeout: Duration,

    /// how long a stop waits for an in-flight codec frame
    drain_budget: Duration,

    /// sleep between polls of the codec request flag
    drain_poll: Duration,

    /// physical address of the DMA descriptor table
    descriptor_base: u32,
}

impl Default for IsiConfig {
    fn default() -> Self {
        IsiConfig {
            platform: PlatformData::default(),
            handshake_timeout: HANDSHAKE_TIMEOUT,
            drain_budget: FRAME_INTERVAL,
            drain_poll: Duration::from_millis(1),
            descriptor_base: DEFAULT_DESCRIPTOR_BASE,
        }
    }
}

impl IsiConfig {
    pub fn with_platform(self, platform: PlatformData) -> IsiConfig {
        IsiConfig { platform, ..self }
    }

    pub fn with_handshake_timeout(self, handshake_timeout: Duration) -> IsiConfig {
        IsiConfig {
            handshake_timeout,
            ..self
        }
    }

    pub fn with_drain_budget(self, drain_budget: Duration) -> IsiConfig {
        IsiConfig {
            drain_budget,
            ..self
        }
    }

    pub fn with_descriptor_base(self, descriptor_base: u32) -> IsiConfig {
        IsiConfig {
            descriptor_base,
            ..self
        }
    }

    pub fn platform(&self) -> &PlatformData {
        &self.platform
    }

    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    pub fn drain_budget(&self) -> Duration {
        self.drain_budget
    }

    pub fn descriptor_base(&self) -> u32 {
        self.descriptor_base
    }

    /// Allocates the descriptor table at the configured base.
    pub fn descriptor_table(&self) -> Arc<DescriptorTable> {
        DescriptorTable::new(self.descriptor_base)
    }
}

/// Frame format in memory as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixFormat {
    pub width: u32,
    pub height: u32,
    pub fourcc: FourCC,
    pub field: Field,
    pub colorspace: Colorspace,
    pub bytes_per_line: u32,
    pub size_image: usize,
}

impl PixFormat {
    pub fn new(width: u32, height: u32, fourcc: FourCC) -> Self {
        PixFormat {
            width,
            height,
            fourcc,
            field: Field::Any,
            colorspace: Colorspace::Default,
            bytes_per_line: 0,
            size_image: 0,
        }
    }

    fn fill_sizes(&mut self, xlate: &Translation) {
        self.bytes_per_line = xlate.bytes_per_line(self.width);
        self.size_image = xlate.frame_size(self.width, self.height);
    }
}

impl fmt::Display for PixFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{} {}", self.width, self.height, self.fourcc)
    }
}

/// Negotiated interface configuration.
#[derive(Debug, Clone, Copy)]
pub struct InterfaceConfig {
    pub xlate: Translation,
    /// sensor output
    pub sensor: MbusFrameFormat,
    /// memory output
    pub pix: PixFormat,
    pub geometry: Geometry,
}

impl InterfaceConfig {
    pub fn path(&self) -> DataPath {
        self.geometry.path
    }
}

/// Receiver of controller interrupts.
pub trait InterruptHandler: Send + Sync {
    fn handle_interrupt(&self) -> IrqReturn;
}

struct Inner {
    queue: BufferQueue,
    buffers: BTreeMap<BufferId, Buffer>,
    next_id: u32,
    pool: DescriptorPool,
    current: Option<InterfaceConfig>,
    sink: Box<dyn BufferSink>,
}

impl Inner {
    fn path(&self) -> DataPath {
        self.current.map(|c| c.path()).unwrap_or_default()
    }

    fn frame_size(&self) -> Result<usize, Error> {
        self.current
            .map(|c| c.pix.size_image)
            .ok_or(Error::InvalidState("format not set"))
    }

    fn set_state(&mut self, id: BufferId, state: BufferState) {
        if let Some(buffer) = self.buffers.get_mut(&id) {
            buffer.state = state;
        }
    }

    fn abort(&mut self, id: BufferId) {
        self.set_state(id, BufferState::Error);
        self.sink.buffer_done(CompletedBuffer::aborted(id));
    }

    /// Streaming, draining, or holding a leased buffer. The frame format
    /// and the queue size are frozen while busy.
    fn is_busy(&self) -> bool {
        self.queue.is_streaming()
            || self.queue.state() == StreamState::Draining
            || self.buffers.values().any(|b| b.state.is_leased())
    }
}

/// DMA channel enable bit of a datapath.
fn dma_channel(path: DataPath) -> u32 {
    match path {
        DataPath::Preview => dma::CHSR_P_CH,
        DataPath::Codec => dma::CHSR_C_CH,
    }
}

/// Atmel ISI host controller.
pub struct Isi<R: Registers> {
    regs: Arc<R>,
    config: IsiConfig,
    inner: Mutex<Inner>,
    sensor: Mutex<Option<Box<dyn Sensor>>>,
    completion: Completion,
    /// serialises reset and disable handshakes
    handshake: Mutex<()>,
}

impl<R: Registers> fmt::Debug for Isi<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Isi")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

impl<R: Registers> Isi<R> {
    /// Creates the controller and leaves the hardware disabled.
    ///
    /// Fails if the platform data lacks a data width or a sensor clock.
    pub fn new<S: BufferSink + 'static>(
        regs: Arc<R>,
        table: Arc<DescriptorTable>,
        config: IsiConfig,
        sink: S,
    ) -> Result<Self, Error> {
        config.platform.validate()?;
        regs.write(Register::Ctrl, ctrl::DIS);
        log::debug!(
            "ISI ready, descriptors at {:#010x}, mck {} Hz",
            table.base(),
            config.platform.mck_hz
        );

        Ok(Isi {
            regs,
            config,
            inner: Mutex::new(Inner {
                queue: BufferQueue::new(),
                buffers: BTreeMap::new(),
                next_id: 0,
                pool: DescriptorPool::new(table),
                current: None,
                sink: Box::new(sink),
            }),
            sensor: Mutex::new(None),
            completion: Completion::new(),
            handshake: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &IsiConfig {
        &self.config
    }

    pub fn registers(&self) -> &Arc<R> {
        &self.regs
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_sensor(&self) -> MutexGuard<'_, Option<Box<dyn Sensor>>> {
        self.sensor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attaches the sensor. Only one sensor can be attached.
    pub fn attach(&self, sensor: Box<dyn Sensor>) -> Result<(), Error> {
        let mut slot = self.lock_sensor();
        if slot.is_some() {
            return Err(Error::Busy);
        }
        log::debug!("Atmel ISI attached to sensor {}", sensor.name());
        *slot = Some(sensor);
        Ok(())
    }

    /// Detaches and returns the sensor. Refused while streaming.
    pub fn detach(&self) -> Result<Box<dyn Sensor>, Error> {
        if self.is_streaming() {
            return Err(Error::Busy);
        }
        let sensor = self
            .lock_sensor()
            .take()
            .ok_or(Error::InvalidState("no sensor attached"))?;
        self.lock().current = None;
        log::debug!("Atmel ISI detached from sensor {}", sensor.name());
        Ok(sensor)
    }

    /// Host formats reachable from every code the sensor offers.
    pub fn formats(&self) -> Result<Vec<Translation>, Error> {
        let slot = self.lock_sensor();
        let sensor = slot
            .as_deref()
            .ok_or(Error::InvalidState("no sensor attached"))?;
        Ok(self.sensor_translations(sensor))
    }

    fn sensor_translations(&self, sensor: &dyn Sensor) -> Vec<Translation> {
        let mut out = Vec::new();
        for code in enum_formats(sensor) {
            let bits = code.pixel_format().bits_per_sample;
            if let Err(err) = self.check_bus(sensor, bits) {
                log::error!("Fail to try the bus parameters for {}: {}", code, err);
                continue;
            }
            for xlate in translations(code) {
                log::debug!(
                    "Providing format {} using code {}",
                    xlate.host.name,
                    code
                );
                out.push(xlate);
            }
        }
        out
    }

    fn check_bus(&self, sensor: &dyn Sensor, buswidth: u8) -> Result<(), Error> {
        bus::negotiate(sensor.bus_config())?;
        if self.config.platform.supports_buswidth(buswidth) {
            Ok(())
        } else {
            Err(Error::InvalidFormat(format!(
                "{}-bit bus not wired",
                buswidth
            )))
        }
    }

    /// Checks that the sensor bus is compatible and `buswidth` is wired.
    pub fn try_bus_param(&self, buswidth: u8) -> Result<(), Error> {
        let slot = self.lock_sensor();
        let sensor = slot
            .as_deref()
            .ok_or(Error::InvalidState("no sensor attached"))?;
        self.check_bus(sensor, buswidth)
    }

    /// Agrees on bus polarities with the sensor and programs CFG1.
    pub fn set_bus_param(&self) -> Result<BusFlags, Error> {
        if self.is_streaming() || self.state() == StreamState::Draining {
            return Err(Error::Busy);
        }
        let mut slot = self.lock_sensor();
        let sensor = slot
            .as_deref_mut()
            .ok_or(Error::InvalidState("no sensor attached"))?;

        let common = bus::negotiate(sensor.bus_config())?;
        let flags = self.config.platform.resolve(common);
        log::debug!(
            "Flags host: {} common: {} chosen: {}",
            bus::ISI_BUS_PARAM,
            common,
            flags
        );
        sensor.set_bus_config(flags)?;

        let value = self.config.platform.cfg1(flags);
        let _inner = self.lock();
        self.regs.write(Register::Ctrl, ctrl::DIS);
        self.regs.write(Register::Cfg1, value);
        Ok(flags)
    }

    fn lookup(&self, sensor: &dyn Sensor, fourcc: FourCC) -> Result<Translation, Error> {
        let list = self.sensor_translations(sensor);
        find_by_fourcc(&list, fourcc).copied().ok_or_else(|| {
            log::warn!("Format {} not found", fourcc);
            Error::InvalidFormat(format!("{} not offered by sensor", fourcc))
        })
    }

    /// Adjusts `pix` to a format the hardware and the sensor can deliver
    /// without applying it.
    pub fn try_format(&self, pix: &mut PixFormat) -> Result<(), Error> {
        let mut slot = self.lock_sensor();
        let sensor = slot
            .as_deref_mut()
            .ok_or(Error::InvalidState("no sensor attached"))?;
        let xlate = self.lookup(sensor, pix.fourcc)?;

        let (width, height) = clamp_to_hardware(pix.width, pix.height, xlate.is_output_rgb565());
        pix.width = width;
        pix.height = height;

        let mut mf = MbusFrameFormat {
            width,
            height,
            code: xlate.code,
            field: pix.field,
            colorspace: pix.colorspace,
        };
        sensor.try_format(&mut mf)?;

        keep_or_use_sensor_size(pix, &xlate, &mf);
        pix.colorspace = mf.colorspace;
        pix.field = progressive(mf.field)?;
        pix.fill_sizes(&xlate);
        Ok(())
    }

    /// Negotiates `pix` with the sensor and programs the geometry.
    ///
    /// On success `pix` holds the format that will be delivered. On failure
    /// the hardware is left disabled. Refused while any buffer is leased,
    /// those were sized for the current format.
    pub fn set_format(&self, pix: &mut PixFormat) -> Result<(), Error> {
        if self.lock().is_busy() {
            return Err(Error::Busy);
        }
        let mut slot = self.lock_sensor();
        let sensor = slot
            .as_deref_mut()
            .ok_or(Error::InvalidState("no sensor attached"))?;
        let xlate = self.lookup(sensor, pix.fourcc)?;
        log::debug!("Plan to set format {}", pix);

        let (width, height) = clamp_to_hardware(pix.width, pix.height, xlate.is_output_rgb565());
        pix.width = width;
        pix.height = height;

        let mut mf = MbusFrameFormat {
            width,
            height,
            code: xlate.code,
            field: pix.field,
            colorspace: pix.colorspace,
        };
        sensor.set_format(&mut mf)?;
        if mf.code != xlate.code {
            return Err(Error::InvalidFormat(format!(
                "sensor answered {} for {}",
                mf.code, xlate.code
            )));
        }
        let field = progressive(mf.field)?;
        keep_or_use_sensor_size(pix, &xlate, &mf);

        let mut inner = self.lock();
        if inner.is_busy() {
            return Err(Error::Busy);
        }
        let geometry = match Geometry::compute(mf.width, mf.height, &xlate, pix.width, pix.height)
        {
            Ok(geometry) => geometry,
            Err(err) => {
                self.regs.write(Register::Ctrl, ctrl::DIS);
                return Err(err);
            }
        };
        geometry.write(self.regs.as_ref());

        pix.field = field;
        pix.colorspace = mf.colorspace;
        pix.fill_sizes(&xlate);
        inner.current = Some(InterfaceConfig {
            xlate,
            sensor: mf,
            pix: *pix,
            geometry,
        });
        log::debug!("Finally set format {} on {} path", pix, geometry.path);
        Ok(())
    }

    /// Currently negotiated interface configuration.
    pub fn current(&self) -> Option<InterfaceConfig> {
        self.lock().current
    }

    /// Sizes a buffer queue: returns the buffer count the caller should
    /// allocate and the size of each buffer.
    ///
    /// Restarts sequence numbering.
    pub fn queue_setup(&self, count: u32) -> Result<(u32, usize), Error> {
        let mut inner = self.lock();
        if inner.is_busy() {
            return Err(Error::Busy);
        }
        let size = inner.frame_size()?;
        if size == 0 || size > VID_LIMIT_BYTES {
            return Err(Error::InvalidFormat(format!(
                "frame of {} bytes cannot be buffered",
                size
            )));
        }

        let mut count = count as usize;
        if count == 0 || count > MAX_BUFFER_NUM {
            count = MAX_BUFFER_NUM;
        }
        if size * count > VID_LIMIT_BYTES {
            count = VID_LIMIT_BYTES / size;
        }

        inner.queue.reset();
        log::debug!("queue_setup, count={}, size={}", count, size);
        Ok((count as u32, size))
    }

    /// Registers a caller plane; fails if it cannot hold a frame.
    pub fn register_buffer(&self, plane: Plane) -> Result<BufferId, Error> {
        let mut inner = self.lock();
        let required = inner.frame_size()?;
        if plane.size < required {
            log::error!(
                "data will not fit into plane ({} < {})",
                plane.size,
                required
            );
            return Err(Error::BufferTooSmall {
                size: plane.size,
                required,
            });
        }
        let id = BufferId(inner.next_id);
        inner.next_id += 1;
        inner.buffers.insert(id, Buffer::new(plane));
        Ok(id)
    }

    /// Binds a descriptor to the buffer on first use.
    pub fn prepare_buffer(&self, id: BufferId) -> Result<(), Error> {
        let mut inner = self.lock();
        Self::prepare(&mut inner, id)
    }

    fn prepare(inner: &mut Inner, id: BufferId) -> Result<(), Error> {
        let required = inner.frame_size()?;
        let Inner { buffers, pool, .. } = inner;
        let buffer = buffers.get_mut(&id).ok_or(Error::UnknownBuffer(id))?;
        if buffer.plane.size < required {
            return Err(Error::BufferTooSmall {
                size: buffer.plane.size,
                required,
            });
        }
        if buffer.descriptor.is_none() {
            let handle = pool.acquire()?;
            pool.bind(&handle, buffer.plane.paddr);
            buffer.descriptor = Some(handle);
        }
        Ok(())
    }

    /// Releases a buffer and its descriptor. Refused while leased.
    pub fn unregister_buffer(&self, id: BufferId) -> Result<(), Error> {
        let mut inner = self.lock();
        let buffer = inner.buffers.get(&id).ok_or(Error::UnknownBuffer(id))?;
        if buffer.state.is_leased() {
            return Err(Error::Busy);
        }
        if let Some(handle) = inner.buffers.remove(&id).and_then(|b| b.descriptor) {
            inner.pool.release(handle);
        }
        Ok(())
    }

    /// Leases a buffer to the controller.
    ///
    /// While streaming with nothing in flight the buffer is armed at once,
    /// otherwise it waits in the queue.
    pub fn queue_buffer(&self, id: BufferId) -> Result<(), Error> {
        let mut inner = self.lock();
        let state = inner
            .buffers
            .get(&id)
            .map(|b| b.state)
            .ok_or(Error::UnknownBuffer(id))?;
        if state.is_leased() {
            return Err(Error::InvalidState("buffer already queued"));
        }
        Self::prepare(&mut inner, id)?;

        inner.set_state(id, BufferState::Queued);
        if let Some(next) = inner.queue.enqueue(id) {
            self.start_dma(&mut inner, next);
        }
        Ok(())
    }

    /// Resets the controller and arms the first queued buffer when
    /// `count > 0`. Only valid from Idle: a stop that is still draining
    /// makes this `Busy`.
    pub fn start_streaming(&self, count: u32) -> Result<(), Error> {
        if self.is_streaming() || self.state() == StreamState::Draining {
            return Err(Error::Busy);
        }

        if let Err(err) = self.reset() {
            log::error!("Reset ISI timed out");
            return Err(err);
        }
        self.regs.write(Register::IntDis, !0);

        let mut inner = self.lock();
        if inner.queue.is_streaming() || inner.queue.state() == StreamState::Draining {
            return Err(Error::Busy);
        }
        // clear pending events
        let _ = self.regs.read(Register::Status);

        if let Some(first) = inner.queue.start(count) {
            self.start_dma(&mut inner, first);
        }
        if inner.queue.is_empty() && inner.queue.active().is_none() {
            log::debug!("streaming started on {} path, no buffers", inner.path());
        } else {
            log::debug!(
                "streaming started on {} path, {} queued",
                inner.path(),
                inner.queue.len() + usize::from(inner.queue.active().is_some())
            );
        }
        Ok(())
    }

    /// Stops streaming and hands every leased buffer back as aborted.
    ///
    /// Queued buffers are aborted at once. On the codec path the frame in
    /// flight is allowed to finish first, up to one frame interval; the
    /// preview path does not wait. Then the DMA channel and the controller
    /// are disabled.
    /// Stopping a stopped controller is a no-op.
    pub fn stop_streaming(&self) -> Result<(), Error> {
        let (stopped, path) = {
            let mut inner = self.lock();
            match inner.queue.state() {
                StreamState::Draining => return Err(Error::Busy),
                _ if !inner.queue.is_streaming() => {
                    // buffers queued while stopped go straight back
                    let pending = inner.queue.stop();
                    for id in pending.aborted {
                        inner.abort(id);
                    }
                    inner.queue.finish_stop();
                    return Ok(());
                }
                _ => {}
            }
            let stopped = inner.queue.stop();
            for id in &stopped.aborted {
                inner.abort(*id);
            }
            (stopped, inner.path())
        };

        let mut result = Ok(());
        if path == DataPath::Codec {
            result = self.wait_codec_drain();
        }

        if result.is_ok() {
            self.regs
                .write(Register::IntDis, status::CXFR_DONE | status::PXFR_DONE);
            self.regs.write(Register::DmaChdr, dma_channel(path));
            if let Err(err) = self.disable() {
                log::error!("Disable ISI timed out");
                result = Err(err);
            }
        }

        let mut inner = self.lock();
        if let Some(id) = stopped.in_flight {
            inner.abort(id);
        }
        inner.queue.finish_stop();
        log::debug!("streaming stopped, {} aborted", stopped.aborted.len());
        result
    }

    fn wait_codec_drain(&self) -> Result<(), Error> {
        let deadline = Instant::now() + self.config.drain_budget;
        loop {
            if self.regs.read(Register::Status) & status::CDC_PND == 0 {
                return Ok(());
            }
            if Instant::now() >= deadline {
                log::error!("Timeout waiting for finishing codec request");
                return Err(Error::Timeout(Handshake::CodecDrain));
            }
            thread::sleep(self.config.drain_poll);
        }
    }

    /// Software reset with acknowledgement.
    pub fn reset(&self) -> Result<(), Error> {
        self.handshake(Handshake::Reset)
    }

    /// Channel disable with acknowledgement.
    pub fn disable(&self) -> Result<(), Error> {
        self.handshake(Handshake::Disable)
    }

    fn handshake(&self, kind: Handshake) -> Result<(), Error> {
        let _serial = self.handshake.lock().unwrap_or_else(PoisonError::into_inner);
        // the acknowledgement only arrives while the sensor clocks pixels
        let ticket = self.completion.arm();
        let bit = match kind {
            Handshake::Reset => ctrl::SRST,
            _ => ctrl::DIS,
        };
        self.regs.write(Register::IntEn, bit);
        self.regs.write(Register::Ctrl, bit);

        if self
            .completion
            .wait_timeout(ticket, self.config.handshake_timeout)
        {
            log::trace!("{} acknowledged", kind);
            Ok(())
        } else {
            Err(Error::Timeout(kind))
        }
    }

    /// Full arm: interrupts, DMA channel, frame-rate divisor and enable.
    fn start_dma(&self, inner: &mut Inner, id: BufferId) {
        let path = inner.path();
        let cfg = self.regs.read(Register::Cfg1);
        self.regs
            .write(Register::IntEn, status::CXFR_DONE | status::PXFR_DONE);

        if path == DataPath::Codec && self.regs.read(Register::Status) & status::CDC_PND != 0 {
            log::error!("Already in frame handling.");
            inner.queue.unarm(id);
            inner.set_state(id, BufferState::Queued);
            return;
        }

        self.arm_channel(inner, id);

        let cfg = (cfg & !cfg1::FRATE_DIV_MASK) | self.config.platform.frate_bits() | cfg1::DISCR;
        let mut value = ctrl::EN;
        if path == DataPath::Codec {
            value |= ctrl::CDC;
        }
        self.regs.write(Register::Ctrl, value);
        self.regs.write(Register::Cfg1, cfg);
    }

    /// Points the selected channel at the buffer's descriptor.
    fn arm_channel(&self, inner: &mut Inner, id: BufferId) {
        let path = inner.path();
        let Some(buffer) = inner.buffers.get_mut(&id) else {
            log::error!("armed buffer {} is not registered", id);
            return;
        };
        let Some(descriptor) = buffer.descriptor.as_ref() else {
            log::error!("armed buffer {} has no descriptor", id);
            return;
        };
        let (dscr, dctrl) = match path {
            DataPath::Preview => (Register::DmaPDscr, Register::DmaPCtrl),
            DataPath::Codec => (Register::DmaCDscr, Register::DmaCCtrl),
        };
        self.regs.write(dscr, descriptor.phys());
        self.regs.write(dctrl, dma::CTRL_FETCH | dma::CTRL_DONE);
        self.regs.write(Register::DmaCher, dma_channel(path));
        buffer.state = BufferState::Active;
        log::trace!("armed {} on {} path", id, path);
    }

    /// Services one controller interrupt.
    pub fn handle_interrupt(&self) -> IrqReturn {
        let mut inner = self.lock();

        let pending = self.regs.read(Register::Status) & self.regs.read(Register::IntMask);
        if pending & status::SRST != 0 {
            self.completion.complete();
            self.regs.write(Register::IntDis, status::SRST);
            IrqReturn::Handled
        } else if pending & status::DIS_DONE != 0 {
            self.completion.complete();
            self.regs.write(Register::IntDis, status::DIS_DONE);
            IrqReturn::Handled
        } else if pending & (status::CXFR_DONE | status::PXFR_DONE) != 0 {
            self.handle_streaming(&mut inner);
            IrqReturn::Handled
        } else {
            IrqReturn::None
        }
    }

    fn handle_streaming(&self, inner: &mut Inner) {
        let Some(retired) = inner.queue.complete() else {
            log::trace!("transfer done with no active buffer");
            return;
        };
        let bytesused = inner.frame_size().unwrap_or(0);
        inner.set_state(retired.id, BufferState::Done);
        if let Some(next) = retired.next {
            self.arm_channel(inner, next);
        }
        log::trace!("retired {} sequence {}", retired.id, retired.sequence);
        inner
            .sink
            .buffer_done(CompletedBuffer::done(retired.id, retired.sequence, bytesused));
    }

    pub fn state(&self) -> StreamState {
        self.lock().queue.state()
    }

    pub fn is_streaming(&self) -> bool {
        self.lock().queue.is_streaming()
    }

    /// Buffer bound to the armed transfer.
    pub fn active(&self) -> Option<BufferId> {
        self.lock().queue.active()
    }

    /// Queued buffers in FIFO order, excluding the active one.
    pub fn queued(&self) -> Vec<BufferId> {
        self.lock().queue.queued().collect()
    }

    pub fn buffer_state(&self, id: BufferId) -> Option<BufferState> {
        self.lock().buffers.get(&id).map(|b| b.state)
    }

    pub fn free_descriptors(&self) -> usize {
        self.lock().pool.free_count()
    }
}

impl<R: Registers> InterruptHandler for Isi<R> {
    fn handle_interrupt(&self) -> IrqReturn {
        Isi::handle_interrupt(self)
    }
}

/// Keeps the requested size only when the preview path downscales.
fn keep_or_use_sensor_size(pix: &mut PixFormat, xlate: &Translation, mf: &MbusFrameFormat) {
    if !xlate.is_output_rgb565() || pix.width > mf.width || pix.height > mf.height {
        pix.width = mf.width;
        pix.height = mf.height;
    }
}

fn progressive(field: Field) -> Result<Field, Error> {
    match field {
        Field::Any | Field::None => Ok(Field::None),
        other => {
            log::error!("Field type {} unsupported.", other);
            Err(Error::InvalidFormat(format!("field {}", other)))
        }
    }
}
