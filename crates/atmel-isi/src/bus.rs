// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Parallel bus parameter negotiation between the ISI and a sensor.

use crate::{regs::cfg1, Error};
use std::{fmt, ops};

/// Parallel media-bus configuration flags.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BusFlags(u32);

impl BusFlags {
    pub const MASTER: BusFlags = BusFlags(1 << 0);
    pub const SLAVE: BusFlags = BusFlags(1 << 1);
    pub const HSYNC_ACTIVE_HIGH: BusFlags = BusFlags(1 << 2);
    pub const HSYNC_ACTIVE_LOW: BusFlags = BusFlags(1 << 3);
    pub const VSYNC_ACTIVE_HIGH: BusFlags = BusFlags(1 << 4);
    pub const VSYNC_ACTIVE_LOW: BusFlags = BusFlags(1 << 5);
    pub const PCLK_SAMPLE_RISING: BusFlags = BusFlags(1 << 6);
    pub const PCLK_SAMPLE_FALLING: BusFlags = BusFlags(1 << 7);
    pub const DATA_ACTIVE_HIGH: BusFlags = BusFlags(1 << 8);
    pub const DATA_ACTIVE_LOW: BusFlags = BusFlags(1 << 9);

    const MODE: BusFlags = BusFlags(Self::MASTER.0 | Self::SLAVE.0);
    const HSYNC: BusFlags = BusFlags(Self::HSYNC_ACTIVE_HIGH.0 | Self::HSYNC_ACTIVE_LOW.0);
    const VSYNC: BusFlags = BusFlags(Self::VSYNC_ACTIVE_HIGH.0 | Self::VSYNC_ACTIVE_LOW.0);
    const PCLK: BusFlags = BusFlags(Self::PCLK_SAMPLE_RISING.0 | Self::PCLK_SAMPLE_FALLING.0);
    const DATA: BusFlags = BusFlags(Self::DATA_ACTIVE_HIGH.0 | Self::DATA_ACTIVE_LOW.0);

    pub const fn empty() -> BusFlags {
        BusFlags(0)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Unknown bits are dropped.
    pub const fn from_bits_truncate(bits: u32) -> BusFlags {
        BusFlags(bits & 0x3ff)
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn contains(&self, other: BusFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(&self, other: BusFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn remove(&mut self, other: BusFlags) {
        self.0 &= !other.0;
    }
}

impl ops::BitOr for BusFlags {
    type Output = BusFlags;

    fn bitor(self, rhs: BusFlags) -> BusFlags {
        BusFlags(self.0 | rhs.0)
    }
}

impl ops::BitAnd for BusFlags {
    type Output = BusFlags;

    fn bitand(self, rhs: BusFlags) -> BusFlags {
        BusFlags(self.0 & rhs.0)
    }
}

impl fmt::Debug for BusFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "BusFlags({:#05x})", self.0)
    }
}

impl fmt::Display for BusFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#05x}", self.0)
    }
}

/// Everything the ISI side of the bus can do.
pub const ISI_BUS_PARAM: BusFlags = BusFlags(
    BusFlags::MASTER.0
        | BusFlags::HSYNC_ACTIVE_HIGH.0
        | BusFlags::HSYNC_ACTIVE_LOW.0
        | BusFlags::VSYNC_ACTIVE_HIGH.0
        | BusFlags::VSYNC_ACTIVE_LOW.0
        | BusFlags::PCLK_SAMPLE_RISING.0
        | BusFlags::PCLK_SAMPLE_FALLING.0
        | BusFlags::DATA_ACTIVE_HIGH.0,
);

/// Returns the flags common to both sides, or empty when the mode, hsync,
/// vsync, pixel clock or data polarity pairs have no overlap.
pub fn config_compatible(sensor: BusFlags, host: BusFlags) -> BusFlags {
    let common = sensor & host;
    let groups = [
        BusFlags::MODE,
        BusFlags::HSYNC,
        BusFlags::VSYNC,
        BusFlags::PCLK,
        BusFlags::DATA,
    ];
    if groups.iter().all(|group| common.intersects(*group)) {
        common
    } else {
        BusFlags::empty()
    }
}

pub const DATAWIDTH_8: u32 = 0x01;
pub const DATAWIDTH_10: u32 = 0x02;

/// Board wiring of the ISI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformData {
    pub has_emb_sync: bool,
    pub hsync_act_low: bool,
    pub vsync_act_low: bool,
    pub pclk_act_falling: bool,
    pub full_mode: bool,
    /// `DATAWIDTH_8` and/or `DATAWIDTH_10`
    pub data_width_flags: u32,
    /// Frame-rate divisor, captures one frame in `frate + 1`
    pub frate: u32,
    /// Master clock fed to the sensor
    pub mck_hz: u32,
}

impl Default for PlatformData {
    fn default() -> Self {
        PlatformData {
            has_emb_sync: false,
            hsync_act_low: false,
            vsync_act_low: false,
            pclk_act_falling: false,
            full_mode: false,
            data_width_flags: DATAWIDTH_8 | DATAWIDTH_10,
            frate: 0,
            mck_hz: 25_000_000,
        }
    }
}

impl PlatformData {
    pub fn validate(&self) -> Result<(), Error> {
        if self.data_width_flags & (DATAWIDTH_8 | DATAWIDTH_10) == 0 {
            return Err(Error::InvalidArgument(
                "platform has no supported data width".to_owned(),
            ));
        }
        if self.mck_hz == 0 {
            return Err(Error::InvalidArgument(
                "platform has no sensor master clock".to_owned(),
            ));
        }
        if self.frate > 7 {
            return Err(Error::InvalidArgument(format!(
                "frame-rate divisor {} out of range",
                self.frate
            )));
        }
        Ok(())
    }

    /// Bus widths as a mask with bit `n - 1` set for an `n`-bit bus.
    pub fn width_mask(&self) -> u32 {
        let mut mask = 0;
        if self.data_width_flags & DATAWIDTH_8 != 0 {
            mask |= 1 << 7;
        }
        if self.data_width_flags & DATAWIDTH_10 != 0 {
            mask |= 1 << 9;
        }
        mask
    }

    pub fn supports_buswidth(&self, bits: u8) -> bool {
        (1..=32).contains(&bits) && (1u32 << (bits - 1)) & self.width_mask() != 0
    }

    /// Narrows each ambiguous polarity pair to the wiring preference.
    pub fn resolve(&self, mut flags: BusFlags) -> BusFlags {
        let pairs = [
            (
                BusFlags::HSYNC_ACTIVE_HIGH,
                BusFlags::HSYNC_ACTIVE_LOW,
                self.hsync_act_low,
            ),
            (
                BusFlags::VSYNC_ACTIVE_HIGH,
                BusFlags::VSYNC_ACTIVE_LOW,
                self.vsync_act_low,
            ),
            (
                BusFlags::PCLK_SAMPLE_RISING,
                BusFlags::PCLK_SAMPLE_FALLING,
                self.pclk_act_falling,
            ),
        ];
        for (high, low, prefer_low) in pairs {
            if flags.contains(high | low) {
                flags.remove(if prefer_low { high } else { low });
            }
        }
        flags
    }

    /// CFG1 polarity and mode bits for a resolved flag set.
    pub fn cfg1(&self, flags: BusFlags) -> u32 {
        let mut value = 0;
        if flags.contains(BusFlags::HSYNC_ACTIVE_LOW) {
            value |= cfg1::HSYNC_POL_ACTIVE_LOW;
        }
        if flags.contains(BusFlags::VSYNC_ACTIVE_LOW) {
            value |= cfg1::VSYNC_POL_ACTIVE_LOW;
        }
        if flags.contains(BusFlags::PCLK_SAMPLE_FALLING) {
            value |= cfg1::PIXCLK_POL_ACTIVE_FALLING;
        }
        if self.has_emb_sync {
            value |= cfg1::EMB_SYNC;
        }
        if self.full_mode {
            value |= cfg1::FULL_MODE;
        }
        value
    }

    /// CFG1 frame-rate divisor field.
    pub fn frate_bits(&self) -> u32 {
        (self.frate << cfg1::FRATE_DIV_OFFSET) & cfg1::FRATE_DIV_MASK
    }
}

/// Intersects sensor flags with the host capability, `None` sensor flags
/// mean the sensor does not report its bus configuration.
pub fn negotiate(sensor: Option<BusFlags>) -> Result<BusFlags, Error> {
    match sensor {
        None => Ok(ISI_BUS_PARAM),
        Some(flags) => {
            let common = config_compatible(flags, ISI_BUS_PARAM);
            if common.is_empty() {
                log::warn!(
                    "Flags incompatible: camera {}, host {}",
                    flags,
                    ISI_BUS_PARAM
                );
                return Err(Error::InvalidFormat(format!(
                    "bus flags incompatible: camera {}, host {}",
                    flags, ISI_BUS_PARAM
                )));
            }
            Ok(common)
        }
    }
}
