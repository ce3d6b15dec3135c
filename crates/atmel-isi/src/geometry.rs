// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Geometry and format register computation
//!
//! Turns a negotiated sensor format plus a requested host format into the
//! CFG2, PSIZE and PDECF register values, and picks the datapath:
//!
//! - **Preview**: RGB565 output, YUV to RGB conversion and decimation.
//! - **Codec**: YUV output at sensor resolution, optionally reordered.

use crate::{
    format::{FormatTag, MbusCode, Translation},
    fourcc::FourCC,
    regs::{cfg2, ctrl, pdecf, psize, Register, Registers},
    Error,
};
use std::fmt;

pub const MAX_SUPPORT_WIDTH: u32 = 2048;
pub const MAX_SUPPORT_HEIGHT: u32 = 2048;
pub const MAX_PREVIEW_SUPPORT_WIDTH: u32 = 640;
pub const MAX_PREVIEW_SUPPORT_HEIGHT: u32 = 480;

/// Decimation factor meaning "no downsampling".
pub const UNITY_DECIMATION: u32 = 16;

/// The two mutually exclusive ISI transfer channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataPath {
    /// Scaled RGB565 channel
    Preview,
    /// Unscaled passthrough channel
    #[default]
    Codec,
}

impl fmt::Display for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DataPath::Preview => write!(f, "preview"),
            DataPath::Codec => write!(f, "codec"),
        }
    }
}

/// Byte order permutation applied to YCbCr input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum YccSwap {
    Default,
    Mode1,
    Mode2,
    Mode3,
}

impl YccSwap {
    pub fn bits(&self) -> u32 {
        match self {
            YccSwap::Default => cfg2::YCC_SWAP_DEFAULT,
            YccSwap::Mode1 => cfg2::YCC_SWAP_MODE_1,
            YccSwap::Mode2 => cfg2::YCC_SWAP_MODE_2,
            YccSwap::Mode3 => cfg2::YCC_SWAP_MODE_3,
        }
    }

    /// Decodes the swap field of a CFG2 value.
    pub fn from_cfg2(value: u32) -> YccSwap {
        match (value & cfg2::YCC_SWAP_MASK) >> cfg2::YCC_SWAP_OFFSET {
            0 => YccSwap::Default,
            1 => YccSwap::Mode1,
            2 => YccSwap::Mode2,
            _ => YccSwap::Mode3,
        }
    }
}

/// Swap that brings a YUV 2x8 bus order into YUYV memory order.
fn swap_to_yuyv(code: MbusCode) -> Option<YccSwap> {
    match code {
        MbusCode::YUYV8_2X8 => Some(YccSwap::Default),
        MbusCode::YVYU8_2X8 => Some(YccSwap::Mode1),
        MbusCode::UYVY8_2X8 => Some(YccSwap::Mode2),
        MbusCode::VYUY8_2X8 => Some(YccSwap::Mode3),
        _ => None,
    }
}

/// Selects the YCC swap mode for a datapath and translation.
///
/// The preview converter and the YUYV codec output both expect YUYV order,
/// passthrough codec output is stored as the sensor sends it.
///
/// Preview uses the same table as codec YUYV output, so a YUYV sensor needs
/// no swap on either path. Older soc-camera drivers program preview as
/// UYVY default, VYUY mode 1, YUYV mode 2, YVYU mode 3; that table is not
/// used here.
pub fn ycc_swap(path: DataPath, xlate: &Translation) -> Result<YccSwap, Error> {
    let swap = match (path, xlate.tag) {
        (DataPath::Preview, _) | (DataPath::Codec, FormatTag::Yuyv) => swap_to_yuyv(xlate.code),
        (DataPath::Codec, _) if xlate.code.is_yuv_2x8() => Some(YccSwap::Default),
        (DataPath::Codec, _) => None,
    };

    swap.ok_or_else(|| {
        log::error!("not support format for YCC_SWAP: {}", xlate.code);
        Error::InvalidFormat(format!("no YCC swap for {} on {} path", xlate.code, path))
    })
}

/// Register values for one negotiated format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub path: DataPath,
    pub cfg2: u32,
    pub psize: u32,
    pub pdecf: u32,
    /// Unmasked decimation factor, 16 is unity
    pub factor: u32,
}

impl Geometry {
    /// Computes the register values for a sensor frame of `width` x `height`
    /// delivered as `preview_width` x `preview_height`.
    pub fn compute(
        width: u32,
        height: u32,
        xlate: &Translation,
        preview_width: u32,
        preview_height: u32,
    ) -> Result<Geometry, Error> {
        let fits = |w: u32, h: u32| {
            (1..=MAX_SUPPORT_WIDTH).contains(&w) && (1..=MAX_SUPPORT_HEIGHT).contains(&h)
        };
        if !fits(width, height) || !fits(preview_width, preview_height) {
            return Err(Error::InvalidFormat(format!(
                "geometry {}x{} -> {}x{} outside {}x{}",
                width,
                height,
                preview_width,
                preview_height,
                MAX_SUPPORT_WIDTH,
                MAX_SUPPORT_HEIGHT
            )));
        }

        let path = match xlate.fourcc() {
            FourCC::RGB565 => DataPath::Preview,
            FourCC::YUYV | FourCC::UYVY | FourCC::YVYU | FourCC::VYUY => DataPath::Codec,
            other => {
                log::error!("not support output memory format: {}", other);
                return Err(Error::InvalidFormat(format!(
                    "output memory format {}",
                    other
                )));
            }
        };

        let mut value = match xlate.code {
            MbusCode::Y8_1X8 => cfg2::GRAYSCALE,
            MbusCode::UYVY8_2X8
            | MbusCode::VYUY8_2X8
            | MbusCode::YUYV8_2X8
            | MbusCode::YVYU8_2X8 => ycc_swap(path, xlate)?.bits(),
            MbusCode::RGB565_2X8_LE => {
                cfg2::COL_SPACE_RGB | cfg2::RGB_MODE_565 | cfg2::RGB_CFG_MODE_3
            }
            MbusCode::RGB565_2X8_BE => {
                return Err(Error::InvalidFormat(format!(
                    "sensor format {}",
                    xlate.code
                )))
            }
        };
        log::debug!(
            "{} path is enabled with sensor format: {}",
            path,
            xlate.code
        );

        value |= ((width - 1) << cfg2::IM_HSIZE_OFFSET) & cfg2::IM_HSIZE_MASK;
        value |= ((height - 1) << cfg2::IM_VSIZE_OFFSET) & cfg2::IM_VSIZE_MASK;

        let size = (((preview_width - 1) << psize::PREV_HSIZE_OFFSET) & psize::PREV_HSIZE_MASK)
            | (((preview_height - 1) << psize::PREV_VSIZE_OFFSET) & psize::PREV_VSIZE_MASK);

        let factor = (width * UNITY_DECIMATION / preview_width)
            .min(height * UNITY_DECIMATION / preview_height);

        let geometry = Geometry {
            path,
            cfg2: value,
            psize: size,
            pdecf: factor & pdecf::DEC_FACTOR_MASK,
            factor,
        };
        if geometry.is_downsampling() {
            log::debug!("Down sampling is enabled, decimation factor is: {}", factor);
        }
        Ok(geometry)
    }

    /// Preview path with a decimation factor above unity.
    pub fn is_downsampling(&self) -> bool {
        self.path == DataPath::Preview && self.factor > UNITY_DECIMATION
    }

    pub fn ycc_swap(&self) -> YccSwap {
        YccSwap::from_cfg2(self.cfg2)
    }

    /// Disables the channel and programs the size and decimation registers.
    pub fn write<R: Registers + ?Sized>(&self, regs: &R) {
        regs.write(Register::Ctrl, ctrl::DIS);
        regs.write(Register::Cfg2, self.cfg2);
        regs.write(Register::Psize, self.psize);
        regs.write(Register::Pdecf, self.pdecf);
    }
}

/// Clamps a requested size to what the hardware can deliver.
///
/// The preview channel is limited to VGA.
pub fn clamp_to_hardware(width: u32, height: u32, rgb565: bool) -> (u32, u32) {
    let (max_width, max_height) = if rgb565 {
        (MAX_PREVIEW_SUPPORT_WIDTH, MAX_PREVIEW_SUPPORT_HEIGHT)
    } else {
        (MAX_SUPPORT_WIDTH, MAX_SUPPORT_HEIGHT)
    };
    (width.min(max_width), height.min(max_height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{find_by_fourcc, translations};

    fn xlate(code: MbusCode, fourcc: FourCC) -> Translation {
        *find_by_fourcc(&translations(code), fourcc).unwrap()
    }

    #[test]
    fn test_preview_yuyv_default_swap() {
        let t = xlate(MbusCode::YUYV8_2X8, FourCC::RGB565);
        let g = Geometry::compute(1280, 960, &t, 640, 480).unwrap();
        assert_eq!(g.path, DataPath::Preview);
        assert_eq!(g.ycc_swap(), YccSwap::Default);
        assert_eq!(g.factor, 32);
        assert_eq!(g.pdecf, 32);
        assert!(g.is_downsampling());
        assert_eq!(g.cfg2 & cfg2::IM_HSIZE_MASK, 1279 << 16);
        assert_eq!(g.cfg2 & cfg2::IM_VSIZE_MASK, 959);
        assert_eq!(g.psize, (639 << 16) | 479);
    }

    #[test]
    fn test_preview_swap_table() {
        let cases = [
            (MbusCode::YUYV8_2X8, YccSwap::Default),
            (MbusCode::YVYU8_2X8, YccSwap::Mode1),
            (MbusCode::UYVY8_2X8, YccSwap::Mode2),
            (MbusCode::VYUY8_2X8, YccSwap::Mode3),
        ];
        for (code, swap) in cases {
            let t = xlate(code, FourCC::RGB565);
            assert_eq!(ycc_swap(DataPath::Preview, &t).unwrap(), swap, "{}", code);
        }
    }

    #[test]
    fn test_codec_yuyv_swap_table() {
        let cases = [
            (MbusCode::YUYV8_2X8, YccSwap::Default),
            (MbusCode::YVYU8_2X8, YccSwap::Mode1),
            (MbusCode::UYVY8_2X8, YccSwap::Mode2),
            (MbusCode::VYUY8_2X8, YccSwap::Mode3),
        ];
        for (code, swap) in cases {
            let t = xlate(code, FourCC::YUYV);
            let g = Geometry::compute(640, 480, &t, 640, 480).unwrap();
            assert_eq!(g.path, DataPath::Codec);
            assert_eq!(g.ycc_swap(), swap, "{}", code);
        }
    }

    #[test]
    fn test_codec_passthrough_no_swap() {
        for (code, fourcc) in [
            (MbusCode::UYVY8_2X8, FourCC::UYVY),
            (MbusCode::VYUY8_2X8, FourCC::VYUY),
            (MbusCode::YVYU8_2X8, FourCC::YVYU),
        ] {
            let t = xlate(code, fourcc);
            assert_eq!(t.tag, FormatTag::Passthrough);
            let g = Geometry::compute(320, 240, &t, 320, 240).unwrap();
            assert_eq!(g.ycc_swap(), YccSwap::Default);
            assert_eq!(g.factor, UNITY_DECIMATION);
            assert!(!g.is_downsampling());
        }
    }

    #[test]
    fn test_rgb_sensor_passthrough() {
        let t = xlate(MbusCode::RGB565_2X8_LE, FourCC::RGB565);
        let g = Geometry::compute(320, 240, &t, 320, 240).unwrap();
        assert_eq!(g.path, DataPath::Preview);
        assert_ne!(g.cfg2 & cfg2::COL_SPACE_RGB, 0);
        assert_ne!(g.cfg2 & cfg2::RGB_MODE_565, 0);
    }

    #[test]
    fn test_unsupported_output() {
        let t = xlate(MbusCode::Y8_1X8, FourCC::GREY);
        assert!(matches!(
            Geometry::compute(640, 480, &t, 640, 480),
            Err(Error::InvalidFormat(_))
        ));
        let t = xlate(MbusCode::RGB565_2X8_BE, FourCC::RGB565X);
        assert!(Geometry::compute(640, 480, &t, 640, 480).is_err());
    }

    #[test]
    fn test_zero_preview_rejected() {
        let t = xlate(MbusCode::YUYV8_2X8, FourCC::RGB565);
        assert!(Geometry::compute(640, 480, &t, 0, 480).is_err());
    }

    #[test]
    fn test_oversized_geometry_rejected() {
        let t = xlate(MbusCode::YUYV8_2X8, FourCC::YUYV);
        assert!(Geometry::compute(2048, 2048, &t, 2048, 2048).is_ok());
        for (w, h) in [(2049, 480), (640, 2049), (1 << 28, 480), (u32::MAX, u32::MAX)] {
            assert!(matches!(
                Geometry::compute(w, h, &t, 640, 480),
                Err(Error::InvalidFormat(_))
            ));
        }
        let t = xlate(MbusCode::YUYV8_2X8, FourCC::RGB565);
        assert!(Geometry::compute(640, 480, &t, 1 << 28, 480).is_err());
    }

    #[test]
    fn test_decimation_uses_smaller_ratio() {
        let t = xlate(MbusCode::UYVY8_2X8, FourCC::RGB565);
        // 1280/320 = 4, 480/240 = 2 -> factor 2 * 16
        let g = Geometry::compute(1280, 480, &t, 320, 240).unwrap();
        assert_eq!(g.factor, 32);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp_to_hardware(4000, 3000, false), (2048, 2048));
        assert_eq!(clamp_to_hardware(1280, 720, true), (640, 480));
        assert_eq!(clamp_to_hardware(320, 240, true), (320, 240));
    }
}
