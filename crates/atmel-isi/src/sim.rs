// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! In-process model of the ISI controller and a sensor
//!
//! [`SimulatedIsi`] implements [`Registers`] with the side effects the
//! capture core relies on:
//!
//! - STATUS event bits are cleared when read.
//! - INTEN/INTDIS maintain INTMASK, a masked event raises an interrupt.
//! - CTRL SRST and DIS are acknowledged only while the sensor supplies a
//!   pixel clock, see [`SimulatedIsi::set_pixel_clock`].
//! - DMA is single shot: [`SimulatedIsi::frame`] resolves the armed
//!   channel's descriptor through the shared [`DescriptorTable`], records
//!   the frame-buffer address and clears the channel.
//! - A codec request (CTRL CDC) stays pending until the next frame
//!   boundary, which is the next frame or the next STATUS read, unless
//!   [`SimulatedIsi::hold_codec_busy`] keeps it stuck.
//!
//! Interrupts are delivered on a dedicated `isi-irq` thread, never on the
//! thread that wrote the register.

use crate::{
    bus::BusFlags,
    descriptor::DescriptorTable,
    device::InterruptHandler,
    format::MbusCode,
    geometry::DataPath,
    regs::{ctrl, dma, status, IrqReturn, Register, Registers},
    sensor::{Colorspace, Field, MbusFrameFormat, Sensor},
    Error,
};
use std::{
    sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError, Weak},
    thread,
    time::Duration,
};

/// STATUS bits that latch until read.
const EVENTS: u32 = status::DIS_DONE
    | status::SRST
    | status::VSYNC
    | status::PXFR_DONE
    | status::CXFR_DONE
    | status::P_OVR
    | status::C_OVR
    | status::CRC_ERR
    | status::FR_OVR;

const WINDOW: usize = (Register::DmaCDscr.offset() / 4) as usize + 1;

type IrqRequest = Option<mpsc::Sender<IrqReturn>>;

#[derive(Debug)]
struct Model {
    regs: [u32; WINDOW],
    events: u32,
    mask: u32,
    channels: u32,
    enabled: bool,
    codec_request: bool,
    hold_codec: bool,
    pixel_clock: bool,
    written: Vec<u32>,
}

impl Model {
    fn status(&self) -> u32 {
        let mut value = self.events;
        if self.enabled {
            value |= status::ENABLE;
        }
        if self.codec_request || self.hold_codec {
            value |= status::CDC_PND;
        }
        value
    }

    fn raised(&self) -> bool {
        self.events & self.mask != 0
    }
}

/// Simulated ISI register window.
#[derive(Debug)]
pub struct SimulatedIsi {
    table: Arc<DescriptorTable>,
    model: Mutex<Model>,
    irq: Mutex<Option<mpsc::Sender<IrqRequest>>>,
}

impl SimulatedIsi {
    pub fn new(table: Arc<DescriptorTable>) -> Self {
        SimulatedIsi {
            table,
            model: Mutex::new(Model {
                regs: [0; WINDOW],
                events: 0,
                mask: 0,
                channels: 0,
                enabled: false,
                codec_request: false,
                hold_codec: false,
                pixel_clock: true,
                written: Vec::new(),
            }),
            irq: Mutex::new(None),
        }
    }

    fn model(&self) -> MutexGuard<'_, Model> {
        self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Routes interrupts to `handler` on a new `isi-irq` thread.
    ///
    /// The thread holds only a weak reference and exits once the handler
    /// or this model is dropped.
    pub fn connect<H: InterruptHandler + 'static>(&self, handler: &Arc<H>) {
        let weak: Weak<H> = Arc::downgrade(handler);
        let (tx, rx) = mpsc::channel::<IrqRequest>();
        let spawned = thread::Builder::new()
            .name("isi-irq".to_owned())
            .spawn(move || {
                for ack in rx {
                    let Some(handler) = weak.upgrade() else {
                        break;
                    };
                    let ret = handler.handle_interrupt();
                    if ret == IrqReturn::None {
                        log::trace!("interrupt not handled");
                    }
                    if let Some(ack) = ack {
                        let _ = ack.send(ret);
                    }
                }
            });
        match spawned {
            Ok(_) => *self.irq.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx),
            Err(err) => log::error!("failed to spawn isi-irq thread: {}", err),
        }
    }

    fn fire(&self, ack: IrqRequest) -> bool {
        match self
            .irq
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            Some(tx) => tx.send(ack).is_ok(),
            None => false,
        }
    }

    /// Sensor pixel clock; without it reset and disable are never
    /// acknowledged and no frames complete.
    pub fn set_pixel_clock(&self, present: bool) {
        self.model().pixel_clock = present;
    }

    /// Keeps STATUS.CDC_PND high as if a codec frame never ended.
    pub fn hold_codec_busy(&self, hold: bool) {
        self.model().hold_codec = hold;
    }

    /// Ends the current frame.
    ///
    /// Completes the armed channel's transfer and waits until the raised
    /// interrupt has been serviced. Returns false when no transfer was
    /// armed, the controller is disabled or there is no pixel clock.
    pub fn frame(&self) -> bool {
        let raise = {
            let mut model = self.model();
            if !model.enabled || !model.pixel_clock {
                return false;
            }
            let (bit, dscr, done) = if model.channels & dma::CHSR_C_CH != 0 {
                (dma::CHSR_C_CH, Register::DmaCDscr, status::CXFR_DONE)
            } else if model.channels & dma::CHSR_P_CH != 0 {
                (dma::CHSR_P_CH, Register::DmaPDscr, status::PXFR_DONE)
            } else {
                return false;
            };

            let phys = model.regs[(dscr.offset() / 4) as usize];
            let Some(fbd) = self.table.fetch(phys) else {
                log::warn!("dma fetched bad descriptor {:#010x}", phys);
                return false;
            };
            if fbd.dma_ctrl & dma::CTRL_WB != 0 {
                self.table.update(phys, |fbd| fbd.dma_ctrl |= dma::CTRL_DONE);
            }
            model.written.push(fbd.fb_address);
            model.channels &= !bit;
            if bit == dma::CHSR_C_CH {
                model.codec_request = false;
            }
            model.events |= done;
            model.raised()
        };

        if raise {
            let (tx, rx) = mpsc::channel();
            if self.fire(Some(tx)) && rx.recv_timeout(Duration::from_secs(1)).is_err() {
                log::warn!("frame interrupt not serviced");
            }
        }
        true
    }

    /// Latches arbitrary STATUS event bits and raises the interrupt if any
    /// is unmasked.
    pub fn inject(&self, events: u32) -> Option<IrqReturn> {
        let raise = {
            let mut model = self.model();
            model.events |= events & EVENTS;
            model.raised()
        };
        if !raise {
            return None;
        }
        let (tx, rx) = mpsc::channel();
        if !self.fire(Some(tx)) {
            return None;
        }
        rx.recv_timeout(Duration::from_secs(1)).ok()
    }

    /// Frame-buffer addresses written by completed transfers, in order.
    pub fn written(&self) -> Vec<u32> {
        self.model().written.clone()
    }

    /// Register value without read side effects.
    pub fn register(&self, reg: Register) -> u32 {
        let model = self.model();
        match reg {
            Register::Status => model.status(),
            Register::IntMask => model.mask,
            Register::DmaChsr => model.channels,
            _ => model.regs[(reg.offset() / 4) as usize],
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.model().enabled
    }

    /// Channel with an armed transfer.
    pub fn armed(&self) -> Option<DataPath> {
        let channels = self.model().channels;
        if channels & dma::CHSR_C_CH != 0 {
            Some(DataPath::Codec)
        } else if channels & dma::CHSR_P_CH != 0 {
            Some(DataPath::Preview)
        } else {
            None
        }
    }
}

impl Registers for SimulatedIsi {
    fn read(&self, reg: Register) -> u32 {
        let mut model = self.model();
        match reg {
            Register::Status => {
                let value = model.status();
                model.events = 0;
                model.codec_request = false;
                value
            }
            Register::IntMask => model.mask,
            Register::DmaChsr => model.channels,
            _ => model.regs[(reg.offset() / 4) as usize],
        }
    }

    fn write(&self, reg: Register, value: u32) {
        let raise = {
            let mut model = self.model();
            model.regs[(reg.offset() / 4) as usize] = value;
            match reg {
                Register::IntEn => model.mask |= value,
                Register::IntDis => model.mask &= !value,
                Register::DmaCher => model.channels |= value & (dma::CHSR_P_CH | dma::CHSR_C_CH),
                Register::DmaChdr => model.channels &= !value,
                Register::Ctrl => {
                    if value & ctrl::SRST != 0 && model.pixel_clock {
                        model.enabled = false;
                        model.channels = 0;
                        model.codec_request = false;
                        model.events |= status::SRST;
                    }
                    if value & ctrl::DIS != 0 && model.pixel_clock {
                        model.enabled = false;
                        model.codec_request = false;
                        model.events |= status::DIS_DONE;
                    }
                    if value & ctrl::EN != 0 {
                        model.enabled = true;
                    }
                    if value & ctrl::CDC != 0 && model.enabled {
                        model.codec_request = true;
                    }
                }
                _ => {}
            }
            matches!(reg, Register::IntEn | Register::Ctrl) && model.raised()
        };
        if raise {
            self.fire(None);
        }
    }
}

#[derive(Debug, Default)]
struct Applied {
    format: Option<MbusFrameFormat>,
    bus: Option<BusFlags>,
}

/// Simulated parallel sensor.
///
/// Clones share what has been applied, so a clone kept aside observes the
/// sensor after the original is attached to a controller.
#[derive(Debug, Clone)]
pub struct SimSensor {
    codes: Vec<MbusCode>,
    max_width: u32,
    max_height: u32,
    fixed_size: bool,
    bus: Option<BusFlags>,
    applied: Arc<Mutex<Applied>>,
}

impl Default for SimSensor {
    fn default() -> Self {
        SimSensor::new(
            vec![
                MbusCode::YUYV8_2X8,
                MbusCode::UYVY8_2X8,
                MbusCode::RGB565_2X8_LE,
                MbusCode::Y8_1X8,
            ],
            1280,
            960,
        )
    }
}

impl SimSensor {
    pub fn new(codes: Vec<MbusCode>, max_width: u32, max_height: u32) -> Self {
        SimSensor {
            codes,
            max_width,
            max_height,
            fixed_size: false,
            bus: None,
            applied: Arc::default(),
        }
    }

    /// Always answers with the full sensor resolution.
    pub fn with_fixed_size(self) -> Self {
        SimSensor {
            fixed_size: true,
            ..self
        }
    }

    /// Reports `flags` as the sensor bus capability.
    pub fn with_bus_flags(self, flags: BusFlags) -> Self {
        SimSensor {
            bus: Some(flags),
            ..self
        }
    }

    pub fn max_size(&self) -> (u32, u32) {
        (self.max_width, self.max_height)
    }

    fn applied_state(&self) -> MutexGuard<'_, Applied> {
        self.applied.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Format applied by the last successful `set_format`.
    pub fn applied(&self) -> Option<MbusFrameFormat> {
        self.applied_state().format
    }

    /// Bus flags applied by the last successful `set_bus_config`.
    pub fn bus_applied(&self) -> Option<BusFlags> {
        self.applied_state().bus
    }
}

impl Sensor for SimSensor {
    fn name(&self) -> &str {
        "sim-sensor"
    }

    fn enum_format(&self, index: usize) -> Option<MbusCode> {
        self.codes.get(index).copied()
    }

    fn try_format(&mut self, format: &mut MbusFrameFormat) -> Result<(), Error> {
        if !self.codes.contains(&format.code) {
            format.code = *self
                .codes
                .first()
                .ok_or_else(|| Error::Sensor("sensor has no formats".to_owned()))?;
        }
        if self.fixed_size {
            format.width = self.max_width;
            format.height = self.max_height;
        } else {
            format.width = format.width.clamp(2, self.max_width);
            format.height = format.height.clamp(2, self.max_height);
        }
        if format.field == Field::Any {
            format.field = Field::None;
        }
        format.colorspace = if format.code.is_yuv_2x8() {
            Colorspace::Jpeg
        } else {
            Colorspace::Srgb
        };
        Ok(())
    }

    fn set_format(&mut self, format: &mut MbusFrameFormat) -> Result<(), Error> {
        self.try_format(format)?;
        self.applied_state().format = Some(*format);
        Ok(())
    }

    fn bus_config(&self) -> Option<BusFlags> {
        self.bus
    }

    fn set_bus_config(&mut self, flags: BusFlags) -> Result<(), Error> {
        if let Some(bus) = self.bus {
            if !bus.contains(flags) {
                return Err(Error::Sensor(format!(
                    "bus flags {} not supported, sensor offers {}",
                    flags, bus
                )));
            }
        }
        self.applied_state().bus = Some(flags);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{DescriptorPool, Fbd};

    fn model() -> (Arc<DescriptorTable>, SimulatedIsi) {
        let table = DescriptorTable::new(0x1000);
        let hw = SimulatedIsi::new(table.clone());
        (table, hw)
    }

    #[test]
    fn test_status_read_clears_events() {
        let (_table, hw) = model();
        hw.write(Register::Ctrl, ctrl::SRST);
        assert_ne!(hw.read(Register::Status) & status::SRST, 0);
        assert_eq!(hw.read(Register::Status) & status::SRST, 0);
    }

    #[test]
    fn test_mask_tracking() {
        let (_table, hw) = model();
        hw.write(Register::IntEn, status::SRST | status::CXFR_DONE);
        hw.write(Register::IntDis, status::SRST);
        assert_eq!(hw.read(Register::IntMask), status::CXFR_DONE);
    }

    #[test]
    fn test_no_ack_without_pixel_clock() {
        let (_table, hw) = model();
        hw.set_pixel_clock(false);
        hw.write(Register::Ctrl, ctrl::DIS);
        assert_eq!(hw.read(Register::Status) & status::DIS_DONE, 0);
    }

    #[test]
    fn test_codec_request_until_boundary() {
        let (_table, hw) = model();
        hw.write(Register::Ctrl, ctrl::EN | ctrl::CDC);
        assert_ne!(hw.register(Register::Status) & status::CDC_PND, 0);
        assert_ne!(hw.read(Register::Status) & status::CDC_PND, 0);
        assert_eq!(hw.read(Register::Status) & status::CDC_PND, 0);

        hw.hold_codec_busy(true);
        assert_ne!(hw.read(Register::Status) & status::CDC_PND, 0);
        assert_ne!(hw.read(Register::Status) & status::CDC_PND, 0);
    }

    #[test]
    fn test_single_shot_frame() {
        let (table, hw) = model();
        let mut pool = DescriptorPool::new(table.clone());
        let handle = pool.acquire().unwrap();
        pool.bind(&handle, 0x2000_0000);

        assert!(!hw.frame());
        hw.write(Register::Ctrl, ctrl::EN);
        hw.write(Register::DmaPDscr, handle.phys());
        hw.write(Register::DmaCher, dma::CHSR_P_CH);
        assert_eq!(hw.armed(), Some(DataPath::Preview));
        assert!(hw.frame());
        assert_eq!(hw.armed(), None);
        assert!(!hw.frame());
        assert_eq!(hw.written(), vec![0x2000_0000]);
        assert_ne!(hw.read(Register::Status) & status::PXFR_DONE, 0);

        let fbd: Fbd = table.read(handle.index());
        assert_ne!(fbd.dma_ctrl & dma::CTRL_DONE, 0);
    }

    #[test]
    fn test_sensor_adjusts() {
        let mut sensor = SimSensor::new(vec![MbusCode::UYVY8_2X8], 800, 600);
        let mut mf = MbusFrameFormat::new(1920, 1080, MbusCode::RGB565_2X8_LE);
        sensor.try_format(&mut mf).unwrap();
        assert_eq!(mf.code, MbusCode::UYVY8_2X8);
        assert_eq!((mf.width, mf.height), (800, 600));
        assert_eq!(mf.field, Field::None);
        assert!(sensor.applied().is_none());

        let mut sensor = sensor.with_fixed_size();
        let mut mf = MbusFrameFormat::new(320, 240, MbusCode::UYVY8_2X8);
        sensor.set_format(&mut mf).unwrap();
        assert_eq!((mf.width, mf.height), (800, 600));
        assert_eq!(sensor.applied(), Some(mf));
    }

    #[test]
    fn test_sensor_bus_config() {
        let offered = BusFlags::MASTER
            | BusFlags::HSYNC_ACTIVE_HIGH
            | BusFlags::VSYNC_ACTIVE_HIGH
            | BusFlags::PCLK_SAMPLE_RISING
            | BusFlags::DATA_ACTIVE_HIGH;
        let observer = SimSensor::default().with_bus_flags(offered);
        let mut sensor = observer.clone();

        let low = BusFlags::MASTER | BusFlags::HSYNC_ACTIVE_LOW;
        assert!(matches!(sensor.set_bus_config(low), Err(Error::Sensor(_))));
        assert_eq!(observer.bus_applied(), None);

        sensor.set_bus_config(offered).unwrap();
        assert_eq!(observer.bus_applied(), Some(offered));
    }
}
