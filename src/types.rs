//! Common types used throughout rgaconvert

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    // Common resolutions
    pub const VGA: Self = Self::new(640, 480);
    pub const HD_720P: Self = Self::new(1280, 720);
    pub const FHD_1080P: Self = Self::new(1920, 1080);
    pub const UHD_4K: Self = Self::new(3840, 2160);

    /// Calculate total pixels
    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::FHD_1080P
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = Error;

    /// Parse `WIDTHxHEIGHT`
    fn from_str(s: &str) -> Result<Self> {
        let (w, h) = s
            .split_once(|c: char| c == 'x' || c == 'X')
            .ok_or_else(|| Error::InvalidGeometry(format!("expected WIDTHxHEIGHT, got {s:?}")))?;
        let width = w
            .trim()
            .parse()
            .map_err(|_| Error::InvalidGeometry(format!("bad width in {s:?}")))?;
        let height = h
            .trim()
            .parse()
            .map_err(|_| Error::InvalidGeometry(format!("bad height in {s:?}")))?;
        Ok(Self::new(width, height))
    }
}

/// Framerate representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Framerate {
    pub num: u32,
    pub den: u32,
}

impl Framerate {
    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    pub const FPS_30: Self = Self::new(30, 1);
    pub const FPS_60: Self = Self::new(60, 1);
    /// Variable framerate (`0/1` in caps)
    pub const VARIABLE: Self = Self::new(0, 1);

    /// Get framerate as f64
    pub fn as_f64(&self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            self.num as f64 / self.den as f64
        }
    }
}

impl Default for Framerate {
    fn default() -> Self {
        Self::VARIABLE
    }
}

impl std::fmt::Display for Framerate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.den == 1 {
            write!(f, "{} fps", self.num)
        } else {
            write!(f, "{:.2} fps", self.as_f64())
        }
    }
}

/// Host pixel format, named as in `video/x-raw` caps
///
/// Includes formats the RGA cannot handle so that negotiation has something
/// to reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoFormat {
    /// Planar 4:2:0, U before V
    I420,
    /// Planar 4:2:0, V before U
    Yv12,
    /// Semi-planar 4:2:0, interleaved UV
    Nv12,
    /// Semi-planar 4:2:0, interleaved VU
    Nv21,
    /// NV12_10LE40: 10-bit semi-planar 4:2:0, 4 samples packed in 5 bytes
    Nv12Le40,
    /// Planar 4:2:2
    Y42b,
    /// Semi-planar 4:2:2, interleaved UV
    Nv16,
    /// Semi-planar 4:2:2, interleaved VU
    Nv61,
    /// 16-bit RGB 5:6:5
    Rgb16,
    /// 15-bit RGB 5:5:5
    Rgb15,
    Bgr,
    Rgb,
    Bgra,
    Rgba,
    Bgrx,
    Rgbx,
    /// Packed 4:2:2 YUYV
    Yuy2,
    /// Packed 4:2:2 UYVY
    Uyvy,
    /// 8-bit luma only
    Gray8,
    /// 32-bit ARGB
    Argb,
    /// Planar 4:4:4
    Y444,
    Unknown,
}

impl VideoFormat {
    /// Every format known to the host, in caps listing order
    pub const ALL: [VideoFormat; 21] = [
        VideoFormat::I420,
        VideoFormat::Yv12,
        VideoFormat::Nv12,
        VideoFormat::Nv21,
        VideoFormat::Nv12Le40,
        VideoFormat::Y42b,
        VideoFormat::Nv16,
        VideoFormat::Nv61,
        VideoFormat::Rgb16,
        VideoFormat::Rgb15,
        VideoFormat::Bgr,
        VideoFormat::Rgb,
        VideoFormat::Bgra,
        VideoFormat::Rgba,
        VideoFormat::Bgrx,
        VideoFormat::Rgbx,
        VideoFormat::Yuy2,
        VideoFormat::Uyvy,
        VideoFormat::Gray8,
        VideoFormat::Argb,
        VideoFormat::Y444,
    ];

    /// Caps string name
    pub fn name(&self) -> &'static str {
        match self {
            VideoFormat::I420 => "I420",
            VideoFormat::Yv12 => "YV12",
            VideoFormat::Nv12 => "NV12",
            VideoFormat::Nv21 => "NV21",
            VideoFormat::Nv12Le40 => "NV12_10LE40",
            VideoFormat::Y42b => "Y42B",
            VideoFormat::Nv16 => "NV16",
            VideoFormat::Nv61 => "NV61",
            VideoFormat::Rgb16 => "RGB16",
            VideoFormat::Rgb15 => "RGB15",
            VideoFormat::Bgr => "BGR",
            VideoFormat::Rgb => "RGB",
            VideoFormat::Bgra => "BGRA",
            VideoFormat::Rgba => "RGBA",
            VideoFormat::Bgrx => "BGRx",
            VideoFormat::Rgbx => "RGBx",
            VideoFormat::Yuy2 => "YUY2",
            VideoFormat::Uyvy => "UYVY",
            VideoFormat::Gray8 => "GRAY8",
            VideoFormat::Argb => "ARGB",
            VideoFormat::Y444 => "Y444",
            VideoFormat::Unknown => "UNKNOWN",
        }
    }

    /// Number of memory planes
    pub fn n_planes(&self) -> usize {
        match self {
            VideoFormat::I420 | VideoFormat::Yv12 | VideoFormat::Y42b | VideoFormat::Y444 => 3,
            VideoFormat::Nv12
            | VideoFormat::Nv21
            | VideoFormat::Nv12Le40
            | VideoFormat::Nv16
            | VideoFormat::Nv61 => 2,
            _ => 1,
        }
    }

    /// Is this a YUV format?
    pub fn is_yuv(&self) -> bool {
        matches!(
            self,
            VideoFormat::I420
                | VideoFormat::Yv12
                | VideoFormat::Nv12
                | VideoFormat::Nv21
                | VideoFormat::Nv12Le40
                | VideoFormat::Y42b
                | VideoFormat::Nv16
                | VideoFormat::Nv61
                | VideoFormat::Yuy2
                | VideoFormat::Uyvy
                | VideoFormat::Y444
        )
    }
}

impl std::fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VideoFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        VideoFormat::ALL
            .iter()
            .copied()
            .find(|f| f.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnsupportedFormat(format!("unknown video format {s:?}")))
    }
}

/// Stride and byte offset of one plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaneLayout {
    /// Bytes per row
    pub stride: u32,
    /// Byte offset from the start of the buffer
    pub offset: usize,
}

/// Negotiated video layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub format: VideoFormat,
    pub width: u32,
    pub height: u32,
    pub framerate: Framerate,
    pub planes: Vec<PlaneLayout>,
    /// Total frame size in bytes
    pub size: usize,
}

fn round_up(v: u32, n: u32) -> Option<u32> {
    Some(v.checked_add(n - 1)? / n * n)
}

impl VideoInfo {
    /// Create with the default host layout (rows padded to 4 bytes)
    ///
    /// Sizes whose layout does not fit in 32 bits are `InvalidGeometry`.
    pub fn new(format: VideoFormat, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidGeometry(format!(
                "{}x{} is not a valid frame size",
                width, height
            )));
        }

        let too_large =
            || Error::InvalidGeometry(format!("{}x{} {} frame is too large", width, height, format));
        let up = |v: u32, n: u32| round_up(v, n).ok_or_else(too_large);
        let mul = |a: u32, b: u32| a.checked_mul(b).ok_or_else(too_large);
        let add = |a: u32, b: u32| a.checked_add(b).ok_or_else(too_large);
        let plane = |stride: u32, offset: u32| PlaneLayout {
            stride,
            offset: offset as usize,
        };

        let w = width;
        let h = height;
        let (planes, size) = match format {
            VideoFormat::I420 | VideoFormat::Yv12 => {
                let h2 = up(h, 2)?;
                let s0 = up(w, 4)?;
                let s1 = up(up(w, 2)? / 2, 4)?;
                let o1 = mul(s0, h2)?;
                let o2 = add(o1, mul(s1, h2 / 2)?)?;
                let size = add(o2, mul(s1, h2 / 2)?)?;
                (vec![plane(s0, 0), plane(s1, o1), plane(s1, o2)], size)
            }
            VideoFormat::Nv12 | VideoFormat::Nv21 => {
                let h2 = up(h, 2)?;
                let s0 = up(w, 4)?;
                let o1 = mul(s0, h2)?;
                let size = add(o1, mul(s0, h2 / 2)?)?;
                (vec![plane(s0, 0), plane(s0, o1)], size)
            }
            VideoFormat::Nv12Le40 => {
                let h2 = up(h, 2)?;
                let s0 = up(mul(w, 5)? >> 2, 5)?;
                let o1 = mul(s0, h2)?;
                let size = add(o1, mul(s0, h2 / 2)?)?;
                (vec![plane(s0, 0), plane(s0, o1)], size)
            }
            VideoFormat::Y42b => {
                let s0 = up(w, 4)?;
                let s1 = up(w, 8)? / 2;
                let o1 = mul(s0, h)?;
                let o2 = add(o1, mul(s1, h)?)?;
                let size = add(o2, mul(s1, h)?)?;
                (vec![plane(s0, 0), plane(s1, o1), plane(s1, o2)], size)
            }
            VideoFormat::Nv16 | VideoFormat::Nv61 => {
                let s0 = up(w, 4)?;
                let o1 = mul(s0, h)?;
                (vec![plane(s0, 0), plane(s0, o1)], mul(o1, 2)?)
            }
            VideoFormat::Y444 => {
                let s0 = up(w, 4)?;
                let o1 = mul(s0, h)?;
                let o2 = mul(o1, 2)?;
                (vec![plane(s0, 0), plane(s0, o1), plane(s0, o2)], mul(o1, 3)?)
            }
            VideoFormat::Bgr | VideoFormat::Rgb => {
                let s = up(mul(w, 3)?, 4)?;
                (vec![plane(s, 0)], mul(s, h)?)
            }
            VideoFormat::Rgb16 | VideoFormat::Rgb15 | VideoFormat::Yuy2 | VideoFormat::Uyvy => {
                let s = up(mul(w, 2)?, 4)?;
                (vec![plane(s, 0)], mul(s, h)?)
            }
            VideoFormat::Gray8 => {
                let s = up(w, 4)?;
                (vec![plane(s, 0)], mul(s, h)?)
            }
            VideoFormat::Bgra
            | VideoFormat::Rgba
            | VideoFormat::Bgrx
            | VideoFormat::Rgbx
            | VideoFormat::Argb => {
                let s = mul(w, 4)?;
                (vec![plane(s, 0)], mul(s, h)?)
            }
            VideoFormat::Unknown => return Err(Error::UnsupportedFormat("UNKNOWN".into())),
        };

        Ok(Self {
            format,
            width,
            height,
            framerate: Framerate::default(),
            planes,
            size: size as usize,
        })
    }

    pub fn with_framerate(mut self, framerate: Framerate) -> Self {
        self.framerate = framerate;
        self
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names_round_trip() {
        for format in VideoFormat::ALL {
            assert_eq!(format.name().parse::<VideoFormat>().unwrap(), format);
        }
        assert!("P010".parse::<VideoFormat>().is_err());
    }

    #[test]
    fn test_nv12_layout() {
        let info = VideoInfo::new(VideoFormat::Nv12, 1920, 1080).unwrap();
        assert_eq!(info.planes[0], PlaneLayout { stride: 1920, offset: 0 });
        assert_eq!(info.planes[1], PlaneLayout { stride: 1920, offset: 1920 * 1080 });
        assert_eq!(info.size, 1920 * 1080 * 3 / 2);
    }

    #[test]
    fn test_i420_odd_layout() {
        let info = VideoInfo::new(VideoFormat::I420, 33, 17).unwrap();
        assert_eq!(info.planes[0].stride, 36);
        assert_eq!(info.planes[1].stride, 20);
        assert_eq!(info.planes[1].offset, 36 * 18);
        assert_eq!(info.planes[2].offset, 36 * 18 + 20 * 9);
    }

    #[test]
    fn test_rgb_row_padding() {
        let info = VideoInfo::new(VideoFormat::Bgr, 641, 2).unwrap();
        assert_eq!(info.planes[0].stride, 1924);
        assert_eq!(info.size, 1924 * 2);
    }

    #[test]
    fn test_resolution_parse() {
        assert_eq!("640x480".parse::<Resolution>().unwrap(), Resolution::VGA);
        assert!("640".parse::<Resolution>().is_err());
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(VideoInfo::new(VideoFormat::Rgba, 0, 10).is_err());
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let err = VideoInfo::new(VideoFormat::Rgba, 70000, 70000).unwrap_err();
        assert!(matches!(err, Error::InvalidGeometry(_)));
        assert!(VideoInfo::new(VideoFormat::Nv12, u32::MAX, 2).is_err());
        assert!(VideoInfo::new(VideoFormat::I420, 2, u32::MAX).is_err());
        assert!(VideoInfo::new(VideoFormat::Bgr, 1 << 30, 1).is_err());

        // the largest input the RGA takes still fits
        let info = VideoInfo::new(VideoFormat::Rgba, 8192, 8192).unwrap();
        assert_eq!(info.size, 8192 * 8192 * 4);
    }
}
