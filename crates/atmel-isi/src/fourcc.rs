// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
#![forbid(unsafe_code)]

use crate::Error;
use core::{fmt, str::FromStr};

/// Four character pixel format code.
///
/// The numeric value packs the first character into the least significant
/// byte, the V4L2 convention, independent of host endianness.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Packed YUV 4:2:2, Y0 U Y1 V
    pub const YUYV: FourCC = FourCC(*b"YUYV");
    /// Packed YUV 4:2:2, U Y0 V Y1
    pub const UYVY: FourCC = FourCC(*b"UYVY");
    /// Packed YUV 4:2:2, Y0 V Y1 U
    pub const YVYU: FourCC = FourCC(*b"YVYU");
    /// Packed YUV 4:2:2, V Y0 U Y1
    pub const VYUY: FourCC = FourCC(*b"VYUY");
    /// RGB 5:6:5 little endian
    pub const RGB565: FourCC = FourCC(*b"RGBP");
    /// RGB 5:6:5 big endian
    pub const RGB565X: FourCC = FourCC(*b"RGBR");
    /// 8-bit greyscale
    pub const GREY: FourCC = FourCC(*b"GREY");

    pub const fn to_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    /// Returns true for the four packed YUV 4:2:2 orderings.
    pub fn is_packed_yuv(&self) -> bool {
        matches!(
            *self,
            FourCC::YUYV | FourCC::UYVY | FourCC::YVYU | FourCC::VYUY
        )
    }
}

impl From<[u8; 4]> for FourCC {
    fn from(buf: [u8; 4]) -> FourCC {
        FourCC(buf)
    }
}

impl From<u32> for FourCC {
    fn from(val: u32) -> FourCC {
        FourCC(val.to_le_bytes())
    }
}

impl From<FourCC> for u32 {
    fn from(val: FourCC) -> Self {
        val.to_u32()
    }
}

impl FromStr for FourCC {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 || !bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            return Err(Error::InvalidArgument(format!(
                "fourcc must be exactly 4 printable characters: {:?}",
                s
            )));
        }
        Ok(FourCC([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match core::str::from_utf8(&self.0) {
            Ok(s) => f.write_str(s),
            Err(_) => {
                // fmt::Error would make format!() panic, escape the bytes instead
                for b in self.0 {
                    write!(f, "{}", core::ascii::escape_default(b))?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FourCC")
            .field(&format_args!("{}", self))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourcc_value() {
        assert_eq!(FourCC::YUYV.to_u32(), 0x5659_5559);
        assert_eq!(u32::from(FourCC::RGB565), 0x5042_4752);
        assert_eq!(FourCC::from(0x5659_5559), FourCC::YUYV);
    }

    #[test]
    fn test_fourcc_parse() {
        assert_eq!("UYVY".parse::<FourCC>().unwrap(), FourCC::UYVY);
        assert!("YUV".parse::<FourCC>().is_err());
        assert!("YUYV2".parse::<FourCC>().is_err());
        assert!("YU\nV".parse::<FourCC>().is_err());
    }

    #[test]
    fn test_fourcc_display() {
        assert_eq!(FourCC::GREY.to_string(), "GREY");
        assert_eq!(format!("{:?}", FourCC::VYUY), "FourCC(VYUY)");
        assert_eq!(FourCC([0xff, b'A', b'B', b'C']).to_string(), "\\xffABC");
    }

    #[test]
    fn test_packed_yuv() {
        assert!(FourCC::YVYU.is_packed_yuv());
        assert!(!FourCC::RGB565.is_packed_yuv());
        assert!(!FourCC::GREY.is_packed_yuv());
    }
}
