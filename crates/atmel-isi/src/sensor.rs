// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Sensor-control collaborator contract.
//!
//! The ISI never talks the sensor's own control protocol. Format and bus
//! negotiation go through [`Sensor`], the sensor driver decides what it can
//! actually deliver and writes that back into the request.

use crate::{bus::BusFlags, format::MbusCode, Error};
use std::fmt;

/// Field order of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Field {
    /// Let the driver choose
    #[default]
    Any,
    /// Progressive
    None,
    Top,
    Bottom,
    Interlaced,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Field::Any => write!(f, "any"),
            Field::None => write!(f, "none"),
            Field::Top => write!(f, "top"),
            Field::Bottom => write!(f, "bottom"),
            Field::Interlaced => write!(f, "interlaced"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Colorspace {
    #[default]
    Default,
    Srgb,
    Jpeg,
    Smpte170m,
}

impl fmt::Display for Colorspace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Colorspace::Default => write!(f, "default"),
            Colorspace::Srgb => write!(f, "srgb"),
            Colorspace::Jpeg => write!(f, "jpeg"),
            Colorspace::Smpte170m => write!(f, "smpte170m"),
        }
    }
}

/// Frame format on the media bus between sensor and ISI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbusFrameFormat {
    pub width: u32,
    pub height: u32,
    pub code: MbusCode,
    pub field: Field,
    pub colorspace: Colorspace,
}

impl MbusFrameFormat {
    pub fn new(width: u32, height: u32, code: MbusCode) -> Self {
        MbusFrameFormat {
            width,
            height,
            code,
            field: Field::Any,
            colorspace: Colorspace::Default,
        }
    }
}

/// Sensor driver operations used by the ISI host.
pub trait Sensor: Send {
    /// Human readable sensor name.
    fn name(&self) -> &str {
        "sensor"
    }

    /// Media-bus code at `index`, `None` past the last one.
    fn enum_format(&self, index: usize) -> Option<MbusCode>;

    /// Adjusts `format` to the closest the sensor supports without
    /// applying it.
    fn try_format(&mut self, format: &mut MbusFrameFormat) -> Result<(), Error>;

    /// Applies `format`, adjusted to what the sensor supports.
    fn set_format(&mut self, format: &mut MbusFrameFormat) -> Result<(), Error>;

    /// Bus flags the sensor supports, `None` when it does not report them.
    fn bus_config(&self) -> Option<BusFlags> {
        None
    }

    /// Applies a resolved bus configuration.
    fn set_bus_config(&mut self, _flags: BusFlags) -> Result<(), Error> {
        Ok(())
    }
}

/// Every media-bus code the sensor enumerates, in its order.
pub fn enum_formats(sensor: &dyn Sensor) -> Vec<MbusCode> {
    (0..).map_while(|index| sensor.enum_format(index)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    impl Sensor for Fixed {
        fn enum_format(&self, index: usize) -> Option<MbusCode> {
            [MbusCode::UYVY8_2X8, MbusCode::Y8_1X8].get(index).copied()
        }

        fn try_format(&mut self, format: &mut MbusFrameFormat) -> Result<(), Error> {
            format.width = 320;
            format.height = 240;
            Ok(())
        }

        fn set_format(&mut self, format: &mut MbusFrameFormat) -> Result<(), Error> {
            self.try_format(format)
        }
    }

    #[test]
    fn test_enum_formats() {
        let sensor = Fixed;
        assert_eq!(
            enum_formats(&sensor),
            vec![MbusCode::UYVY8_2X8, MbusCode::Y8_1X8]
        );
        assert_eq!(sensor.name(), "sensor");
        assert!(sensor.bus_config().is_none());
    }

    #[test]
    fn test_frame_format_defaults() {
        let mut mf = MbusFrameFormat::new(640, 480, MbusCode::UYVY8_2X8);
        assert_eq!(mf.field, Field::Any);
        Fixed.try_format(&mut mf).unwrap();
        assert_eq!((mf.width, mf.height), (320, 240));
    }
}
