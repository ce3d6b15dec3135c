// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Media-bus codes and host format translation
//!
//! A sensor emits pixels on the parallel bus in one of the [`MbusCode`]
//! encodings. The ISI can store such a stream in memory in a small number of
//! host formats; [`translations`] lists which host formats are reachable
//! from a given bus code and through which datapath.
//!
//! | Bus code          | Host format | Datapath |
//! |-------------------|-------------|----------|
//! | any YUV 2x8       | YUYV        | codec, reordered into YUYV |
//! | any YUV 2x8       | RGB565      | preview, scaled |
//! | supported packing | passthrough | codec, stored as received |

use crate::fourcc::FourCC;
use std::fmt;

/// Sensor media-bus pixel encodings understood by the host.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MbusCode {
    Y8_1X8,
    UYVY8_2X8,
    VYUY8_2X8,
    YUYV8_2X8,
    YVYU8_2X8,
    RGB565_2X8_LE,
    RGB565_2X8_BE,
}

impl MbusCode {
    pub const ALL: [MbusCode; 7] = [
        MbusCode::Y8_1X8,
        MbusCode::UYVY8_2X8,
        MbusCode::VYUY8_2X8,
        MbusCode::YUYV8_2X8,
        MbusCode::YVYU8_2X8,
        MbusCode::RGB565_2X8_LE,
        MbusCode::RGB565_2X8_BE,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MbusCode::Y8_1X8 => "Y8_1X8",
            MbusCode::UYVY8_2X8 => "UYVY8_2X8",
            MbusCode::VYUY8_2X8 => "VYUY8_2X8",
            MbusCode::YUYV8_2X8 => "YUYV8_2X8",
            MbusCode::YVYU8_2X8 => "YVYU8_2X8",
            MbusCode::RGB565_2X8_LE => "RGB565_2X8_LE",
            MbusCode::RGB565_2X8_BE => "RGB565_2X8_BE",
        }
    }

    /// Returns true for the four YUV 4:2:2 orderings sent as two 8-bit samples.
    pub fn is_yuv_2x8(&self) -> bool {
        matches!(
            self,
            MbusCode::UYVY8_2X8 | MbusCode::VYUY8_2X8 | MbusCode::YUYV8_2X8 | MbusCode::YVYU8_2X8
        )
    }

    /// Case-insensitive lookup by canonical name.
    pub fn from_name(name: &str) -> Option<MbusCode> {
        MbusCode::ALL
            .into_iter()
            .find(|code| code.name().eq_ignore_ascii_case(name))
    }

    /// Memory layout of this code when stored without conversion.
    pub fn pixel_format(&self) -> &'static PixelFormat {
        match self {
            MbusCode::Y8_1X8 => &MBUS_PIXEL_FORMATS[0],
            MbusCode::UYVY8_2X8 => &MBUS_PIXEL_FORMATS[1],
            MbusCode::VYUY8_2X8 => &MBUS_PIXEL_FORMATS[2],
            MbusCode::YUYV8_2X8 => &MBUS_PIXEL_FORMATS[3],
            MbusCode::YVYU8_2X8 => &MBUS_PIXEL_FORMATS[4],
            MbusCode::RGB565_2X8_LE => &MBUS_PIXEL_FORMATS[5],
            MbusCode::RGB565_2X8_BE => &MBUS_PIXEL_FORMATS[6],
        }
    }
}

impl fmt::Display for MbusCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How bus samples are packed into memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Packing {
    /// One sample per pixel, no padding
    None,
    /// Two 8-bit samples per pixel, padding in the high bits
    TwoX8PadHi,
    /// Samples wider than 8 bits extended to 16
    Extend16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    Le,
    Be,
}

/// Memory pixel format descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelFormat {
    pub fourcc: FourCC,
    pub name: &'static str,
    pub bits_per_sample: u8,
    pub packing: Packing,
    pub order: ByteOrder,
}

impl PixelFormat {
    /// Returns true when the ISI can store this format as received.
    pub fn packing_supported(&self) -> bool {
        self.packing == Packing::None
            || (self.bits_per_sample == 8 && self.packing == Packing::TwoX8PadHi)
            || (self.bits_per_sample > 8 && self.packing == Packing::Extend16)
    }
}

const fn packed_8bit(fourcc: FourCC, name: &'static str, order: ByteOrder) -> PixelFormat {
    PixelFormat {
        fourcc,
        name,
        bits_per_sample: 8,
        packing: Packing::TwoX8PadHi,
        order,
    }
}

static MBUS_PIXEL_FORMATS: [PixelFormat; 7] = [
    PixelFormat {
        fourcc: FourCC::GREY,
        name: "Grey",
        bits_per_sample: 8,
        packing: Packing::None,
        order: ByteOrder::Le,
    },
    packed_8bit(FourCC::UYVY, "UYVY", ByteOrder::Le),
    packed_8bit(FourCC::VYUY, "VYUY", ByteOrder::Le),
    packed_8bit(FourCC::YUYV, "YUYV", ByteOrder::Le),
    packed_8bit(FourCC::YVYU, "YVYU", ByteOrder::Le),
    packed_8bit(FourCC::RGB565, "RGB565", ByteOrder::Le),
    packed_8bit(FourCC::RGB565X, "RGB565 BE", ByteOrder::Be),
];

/// The two formats the ISI produces by conversion.
static ISI_YUYV: PixelFormat = packed_8bit(FourCC::YUYV, "Packed YUV422 16 bit", ByteOrder::Le);
static ISI_RGB565: PixelFormat = packed_8bit(FourCC::RGB565, "RGB565", ByteOrder::Le);

/// Which host format entry a translation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatTag {
    /// YUV reordered into YUYV by the codec path
    Yuyv,
    /// YUV converted to RGB565 by the preview path
    Rgb565,
    /// Stored exactly as the sensor sends it
    Passthrough,
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FormatTag::Yuyv => write!(f, "yuyv"),
            FormatTag::Rgb565 => write!(f, "rgb565"),
            FormatTag::Passthrough => write!(f, "passthrough"),
        }
    }
}

/// Host memory format reachable from a sensor bus code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Translation {
    pub tag: FormatTag,
    pub host: &'static PixelFormat,
    pub code: MbusCode,
}

impl Translation {
    pub fn fourcc(&self) -> FourCC {
        self.host.fourcc
    }

    /// RGB565 output goes through the scaling preview path.
    pub fn is_output_rgb565(&self) -> bool {
        self.host.fourcc == FourCC::RGB565
    }

    /// Bytes per line of `width` pixels in the host format.
    pub fn bytes_per_line(&self, width: u32) -> u32 {
        bytes_per_line(width, self.host)
    }

    /// Bytes of one `width` x `height` frame in the host format.
    pub fn frame_size(&self, width: u32, height: u32) -> usize {
        self.bytes_per_line(width) as usize * height as usize
    }
}

/// Bytes per line of `width` pixels stored as `format`.
pub fn bytes_per_line(width: u32, format: &PixelFormat) -> u32 {
    match format.packing {
        Packing::None => width * u32::from(format.bits_per_sample) / 8,
        Packing::TwoX8PadHi | Packing::Extend16 => width * 2,
    }
}

/// Host formats the ISI offers for a sensor bus code, in preference order.
pub fn translations(code: MbusCode) -> Vec<Translation> {
    let mut out = Vec::with_capacity(3);
    let sensor = code.pixel_format();

    if code.is_yuv_2x8() {
        out.push(Translation {
            tag: FormatTag::Yuyv,
            host: &ISI_YUYV,
            code,
        });
        out.push(Translation {
            tag: FormatTag::Rgb565,
            host: &ISI_RGB565,
            code,
        });
    } else if !sensor.packing_supported() {
        return out;
    }

    out.push(Translation {
        tag: FormatTag::Passthrough,
        host: sensor,
        code,
    });
    out
}

/// First translation in `list` producing `fourcc`.
pub fn find_by_fourcc(list: &[Translation], fourcc: FourCC) -> Option<&Translation> {
    list.iter().find(|t| t.fourcc() == fourcc)
}
