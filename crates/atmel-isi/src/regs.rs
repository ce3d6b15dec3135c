// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! ISI register map
//!
//! Offsets and bitfields of the controller register window, plus the
//! [`Registers`] seam through which the capture core touches hardware.
//! Field constants are grouped per register so call sites read like the
//! datasheet: `ctrl::EN`, `status::CXFR_DONE`, `cfg2::IM_HSIZE_MASK`.

use std::{fmt, ptr::NonNull};

/// Named ISI registers.
///
/// The discriminant is the byte offset from the start of the register window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Register {
    /// Sync polarity, pixel clock polarity, frame-rate divisor, embedded sync
    Cfg1 = 0x00,
    /// Image size, colorspace, RGB mode, YCC swap
    Cfg2 = 0x04,
    /// Preview size
    Psize = 0x08,
    /// Preview decimation factor
    Pdecf = 0x0c,
    /// Enable, disable, software reset, codec request
    Ctrl = 0x24,
    /// Status and interrupt events
    Status = 0x28,
    /// Interrupt enable
    IntEn = 0x2c,
    /// Interrupt disable
    IntDis = 0x30,
    /// Interrupt mask (enabled sources)
    IntMask = 0x34,
    /// DMA channel enable
    DmaCher = 0x38,
    /// DMA channel disable
    DmaChdr = 0x3c,
    /// DMA channel status
    DmaChsr = 0x40,
    /// Preview channel frame-buffer address
    DmaPAddr = 0x44,
    /// Preview channel DMA control
    DmaPCtrl = 0x48,
    /// Preview channel descriptor pointer
    DmaPDscr = 0x4c,
    /// Codec channel frame-buffer address
    DmaCAddr = 0x50,
    /// Codec channel DMA control
    DmaCCtrl = 0x54,
    /// Codec channel descriptor pointer
    DmaCDscr = 0x58,
}

impl Register {
    /// All registers in offset order.
    pub const ALL: [Register; 18] = [
        Register::Cfg1,
        Register::Cfg2,
        Register::Psize,
        Register::Pdecf,
        Register::Ctrl,
        Register::Status,
        Register::IntEn,
        Register::IntDis,
        Register::IntMask,
        Register::DmaCher,
        Register::DmaChdr,
        Register::DmaChsr,
        Register::DmaPAddr,
        Register::DmaPCtrl,
        Register::DmaPDscr,
        Register::DmaCAddr,
        Register::DmaCCtrl,
        Register::DmaCDscr,
    ];

    /// Byte offset of the register.
    pub const fn offset(self) -> u32 {
        self as u32
    }

    pub fn name(&self) -> &'static str {
        match self {
            Register::Cfg1 => "CFG1",
            Register::Cfg2 => "CFG2",
            Register::Psize => "PSIZE",
            Register::Pdecf => "PDECF",
            Register::Ctrl => "CTRL",
            Register::Status => "STATUS",
            Register::IntEn => "INTEN",
            Register::IntDis => "INTDIS",
            Register::IntMask => "INTMASK",
            Register::DmaCher => "DMA_CHER",
            Register::DmaChdr => "DMA_CHDR",
            Register::DmaChsr => "DMA_CHSR",
            Register::DmaPAddr => "DMA_P_ADDR",
            Register::DmaPCtrl => "DMA_P_CTRL",
            Register::DmaPDscr => "DMA_P_DSCR",
            Register::DmaCAddr => "DMA_C_ADDR",
            Register::DmaCCtrl => "DMA_C_CTRL",
            Register::DmaCDscr => "DMA_C_DSCR",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// CFG1 bitfields
pub mod cfg1 {
    pub const HSYNC_POL_ACTIVE_LOW: u32 = 1 << 2;
    pub const VSYNC_POL_ACTIVE_LOW: u32 = 1 << 3;
    pub const PIXCLK_POL_ACTIVE_FALLING: u32 = 1 << 4;
    pub const EMB_SYNC: u32 = 1 << 6;
    pub const CRC_SYNC: u32 = 1 << 7;
    pub const FRATE_DIV_OFFSET: u32 = 8;
    pub const FRATE_DIV_MASK: u32 = 7 << FRATE_DIV_OFFSET;
    /// Linked-list (descriptor) mode disabled
    pub const DISCR: u32 = 1 << 11;
    pub const FULL_MODE: u32 = 1 << 12;
}

/// CFG2 bitfields
pub mod cfg2 {
    pub const IM_VSIZE_OFFSET: u32 = 0;
    pub const IM_HSIZE_OFFSET: u32 = 16;
    pub const IM_VSIZE_MASK: u32 = 0x7ff << IM_VSIZE_OFFSET;
    pub const IM_HSIZE_MASK: u32 = 0x7ff << IM_HSIZE_OFFSET;
    pub const RGB_MODE_565: u32 = 1 << 12;
    pub const GRAYSCALE: u32 = 1 << 13;
    pub const COL_SPACE_YCBCR: u32 = 0;
    pub const COL_SPACE_RGB: u32 = 1 << 15;
    pub const YCC_SWAP_OFFSET: u32 = 28;
    pub const YCC_SWAP_MASK: u32 = 3 << YCC_SWAP_OFFSET;
    pub const YCC_SWAP_DEFAULT: u32 = 0;
    pub const YCC_SWAP_MODE_1: u32 = 1 << YCC_SWAP_OFFSET;
    pub const YCC_SWAP_MODE_2: u32 = 2 << YCC_SWAP_OFFSET;
    pub const YCC_SWAP_MODE_3: u32 = 3 << YCC_SWAP_OFFSET;
    pub const RGB_CFG_OFFSET: u32 = 30;
    pub const RGB_CFG_MODE_3: u32 = 3 << RGB_CFG_OFFSET;
}

/// PSIZE bitfields
pub mod psize {
    pub const PREV_VSIZE_OFFSET: u32 = 0;
    pub const PREV_HSIZE_OFFSET: u32 = 16;
    pub const PREV_VSIZE_MASK: u32 = 0x3ff << PREV_VSIZE_OFFSET;
    pub const PREV_HSIZE_MASK: u32 = 0x3ff << PREV_HSIZE_OFFSET;
}

/// PDECF bitfields
pub mod pdecf {
    pub const DEC_FACTOR_MASK: u32 = 0xff;
}

/// CTRL bitfields
pub mod ctrl {
    pub const EN: u32 = 1 << 0;
    pub const DIS: u32 = 1 << 1;
    pub const SRST: u32 = 1 << 2;
    /// Codec request
    pub const CDC: u32 = 1 << 8;
}

/// STATUS, INTEN, INTDIS and INTMASK bitfields
pub mod status {
    pub const ENABLE: u32 = 1 << 0;
    pub const DIS_DONE: u32 = 1 << 1;
    pub const SRST: u32 = 1 << 2;
    /// Codec request pending; high while a codec frame is being transferred
    pub const CDC_PND: u32 = 1 << 8;
    pub const VSYNC: u32 = 1 << 10;
    pub const PXFR_DONE: u32 = 1 << 16;
    pub const CXFR_DONE: u32 = 1 << 17;
    pub const SIP: u32 = 1 << 19;
    pub const P_OVR: u32 = 1 << 24;
    pub const C_OVR: u32 = 1 << 25;
    pub const CRC_ERR: u32 = 1 << 26;
    pub const FR_OVR: u32 = 1 << 27;
}

/// DMA channel and descriptor control bitfields
pub mod dma {
    /// Preview channel in CHER/CHDR/CHSR
    pub const CHSR_P_CH: u32 = 1 << 0;
    /// Codec channel in CHER/CHDR/CHSR
    pub const CHSR_C_CH: u32 = 1 << 1;
    /// Fetch the descriptor pointed to by DSCR
    pub const CTRL_FETCH: u32 = 1 << 0;
    /// Write back the descriptor after transfer
    pub const CTRL_WB: u32 = 1 << 1;
    pub const CTRL_IEN: u32 = 1 << 2;
    pub const CTRL_DONE: u32 = 1 << 3;
}

/// Return value of an interrupt handler on a possibly shared line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrqReturn {
    /// Interrupt was not raised by this device
    None,
    /// Interrupt was serviced
    Handled,
}

/// Register access seam.
///
/// Implementations must tolerate concurrent use from a caller thread and
/// the interrupt context; the capture core serialises everything that arms
/// a transfer under its own lock.
pub trait Registers: Send + Sync {
    fn read(&self, reg: Register) -> u32;
    fn write(&self, reg: Register, value: u32);
}

/// Volatile accessor over a mapped ISI register window.
#[derive(Debug)]
pub struct MmioRegisters {
    base: NonNull<u32>,
}

// SAFETY: MMIO accesses are single volatile 32-bit loads and stores, the
// window itself carries no Rust-visible state.
unsafe impl Send for MmioRegisters {}
unsafe impl Sync for MmioRegisters {}

impl MmioRegisters {
    /// Wraps a mapped register window.
    ///
    /// Returns `None` for a null or misaligned base.
    ///
    /// # Safety
    ///
    /// `base` must point to at least `0x5c` bytes of mapped, device-typed
    /// memory that stays mapped for the lifetime of the returned value.
    pub unsafe fn new(base: *mut u8) -> Option<Self> {
        if base.align_offset(std::mem::align_of::<u32>()) != 0 {
            return None;
        }
        NonNull::new(base.cast::<u32>()).map(|base| MmioRegisters { base })
    }

    fn slot(&self, reg: Register) -> *mut u32 {
        // SAFETY: every offset is inside the window promised by `new`.
        unsafe { self.base.as_ptr().add((reg.offset() / 4) as usize) }
    }
}

impl Registers for MmioRegisters {
    fn read(&self, reg: Register) -> u32 {
        // SAFETY: see `slot`.
        unsafe { self.slot(reg).read_volatile() }
    }

    fn write(&self, reg: Register, value: u32) {
        // SAFETY: see `slot`.
        unsafe { self.slot(reg).write_volatile(value) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_offsets() {
        assert_eq!(Register::Cfg1.offset(), 0x00);
        assert_eq!(Register::Ctrl.offset(), 0x24);
        assert_eq!(Register::Status.offset(), 0x28);
        assert_eq!(Register::DmaCDscr.offset(), 0x58);
        for pair in Register::ALL.windows(2) {
            assert!(pair[0].offset() < pair[1].offset());
        }
    }

    #[test]
    fn test_register_display() {
        assert_eq!(format!("{}", Register::DmaPDscr), "DMA_P_DSCR");
        assert_eq!(format!("{}", Register::Pdecf), "PDECF");
    }

    #[test]
    fn test_status_bits_shared_with_ctrl() {
        // reset and disable acknowledgements use the CTRL request bit positions
        assert_eq!(status::SRST, ctrl::SRST);
        assert_eq!(status::DIS_DONE, ctrl::DIS);
        assert_eq!(status::CDC_PND, ctrl::CDC);
    }

    #[test]
    fn test_mmio_window() {
        let mut window = vec![0u32; 0x60 / 4];
        let regs = unsafe { MmioRegisters::new(window.as_mut_ptr().cast::<u8>()) }.unwrap();
        regs.write(Register::Cfg2, 0xdead_beef);
        regs.write(Register::DmaCDscr, 0x1234);
        assert_eq!(regs.read(Register::Cfg2), 0xdead_beef);
        assert_eq!(regs.read(Register::DmaCDscr), 0x1234);
        drop(regs);
        assert_eq!(window[1], 0xdead_beef);
        assert_eq!(window[0x58 / 4], 0x1234);
    }

    #[test]
    fn test_mmio_rejects_null() {
        assert!(unsafe { MmioRegisters::new(std::ptr::null_mut()) }.is_none());
    }
}
