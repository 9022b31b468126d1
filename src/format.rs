//! Host format to RGA surface format translation
//!
//! The RGA only understands its own `RK_FORMAT_*` codes. The table below is
//! closed: anything not listed maps to [`RgaFormat::Unknown`], which callers
//! must treat as a hard failure.

use crate::error::{Error, Result};
use crate::types::VideoFormat;

/// RGA native surface format (`RgaSURF_FORMAT`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum RgaFormat {
    Rgba8888 = 0x0 << 8,
    Rgbx8888 = 0x1 << 8,
    Rgb888 = 0x2 << 8,
    Bgra8888 = 0x3 << 8,
    Rgb565 = 0x4 << 8,
    Rgba5551 = 0x5 << 8,
    Rgba4444 = 0x6 << 8,
    Bgr888 = 0x7 << 8,
    YCbCr422Sp = 0x8 << 8,
    YCbCr422P = 0x9 << 8,
    YCbCr420Sp = 0xa << 8,
    YCbCr420P = 0xb << 8,
    YCrCb422Sp = 0xc << 8,
    YCrCb422P = 0xd << 8,
    YCrCb420Sp = 0xe << 8,
    YCrCb420P = 0xf << 8,
    Bgrx8888 = 0x16 << 8,
    YCbCr420Sp10B = 0x20 << 8,
    Unknown = 0x100 << 8,
}

impl RgaFormat {
    /// Raw `RK_FORMAT_*` value
    pub fn code(self) -> u32 {
        self as u32
    }

    /// librga constant name
    pub fn name(&self) -> &'static str {
        match self {
            RgaFormat::Rgba8888 => "RK_FORMAT_RGBA_8888",
            RgaFormat::Rgbx8888 => "RK_FORMAT_RGBX_8888",
            RgaFormat::Rgb888 => "RK_FORMAT_RGB_888",
            RgaFormat::Bgra8888 => "RK_FORMAT_BGRA_8888",
            RgaFormat::Rgb565 => "RK_FORMAT_RGB_565",
            RgaFormat::Rgba5551 => "RK_FORMAT_RGBA_5551",
            RgaFormat::Rgba4444 => "RK_FORMAT_RGBA_4444",
            RgaFormat::Bgr888 => "RK_FORMAT_BGR_888",
            RgaFormat::YCbCr422Sp => "RK_FORMAT_YCbCr_422_SP",
            RgaFormat::YCbCr422P => "RK_FORMAT_YCbCr_422_P",
            RgaFormat::YCbCr420Sp => "RK_FORMAT_YCbCr_420_SP",
            RgaFormat::YCbCr420P => "RK_FORMAT_YCbCr_420_P",
            RgaFormat::YCrCb422Sp => "RK_FORMAT_YCrCb_422_SP",
            RgaFormat::YCrCb422P => "RK_FORMAT_YCrCb_422_P",
            RgaFormat::YCrCb420Sp => "RK_FORMAT_YCrCb_420_SP",
            RgaFormat::YCrCb420P => "RK_FORMAT_YCrCb_420_P",
            RgaFormat::Bgrx8888 => "RK_FORMAT_BGRX_8888",
            RgaFormat::YCbCr420Sp10B => "RK_FORMAT_YCbCr_420_SP_10B",
            RgaFormat::Unknown => "RK_FORMAT_UNKNOWN",
        }
    }

    /// Bytes per pixel for packed RGB, one element for YUV
    ///
    /// `None` means the RGA cannot take this format as a surface.
    pub fn pixel_size(&self) -> Option<u32> {
        match self {
            RgaFormat::Rgbx8888 | RgaFormat::Bgrx8888 | RgaFormat::Rgba8888 | RgaFormat::Bgra8888 => {
                Some(4)
            }
            RgaFormat::Rgb888 | RgaFormat::Bgr888 => Some(3),
            RgaFormat::Rgba5551 | RgaFormat::Rgb565 => Some(2),
            RgaFormat::YCbCr420Sp10B
            | RgaFormat::YCbCr422Sp
            | RgaFormat::YCrCb422Sp
            | RgaFormat::YCbCr422P
            | RgaFormat::YCrCb422P
            | RgaFormat::YCbCr420Sp
            | RgaFormat::YCrCb420Sp
            | RgaFormat::YCbCr420P
            | RgaFormat::YCrCb420P => Some(1),
            RgaFormat::Rgba4444 | RgaFormat::Unknown => None,
        }
    }

    /// Chroma-subsampled formats need even-aligned rectangles
    pub fn is_yuv(&self) -> bool {
        matches!(
            self,
            RgaFormat::YCbCr420Sp10B
                | RgaFormat::YCbCr422Sp
                | RgaFormat::YCrCb422Sp
                | RgaFormat::YCbCr422P
                | RgaFormat::YCrCb422P
                | RgaFormat::YCbCr420Sp
                | RgaFormat::YCrCb420Sp
                | RgaFormat::YCbCr420P
                | RgaFormat::YCrCb420P
        )
    }
}

impl std::fmt::Display for RgaFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Formats the element advertises, in pad template order
///
/// `NV12_10LE40` translates but is not advertised.
pub const SUPPORTED_FORMATS: [VideoFormat; 15] = [
    VideoFormat::I420,
    VideoFormat::Yv12,
    VideoFormat::Nv12,
    VideoFormat::Nv21,
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
];

/// Map a host format to its RGA surface format
pub fn to_rga_format(format: VideoFormat) -> RgaFormat {
    match format {
        VideoFormat::I420 => RgaFormat::YCbCr420P,
        VideoFormat::Yv12 => RgaFormat::YCrCb420P,
        VideoFormat::Nv12 => RgaFormat::YCbCr420Sp,
        VideoFormat::Nv21 => RgaFormat::YCrCb420Sp,
        VideoFormat::Nv12Le40 => RgaFormat::YCbCr420Sp10B,
        VideoFormat::Y42b => RgaFormat::YCbCr422P,
        VideoFormat::Nv16 => RgaFormat::YCbCr422Sp,
        VideoFormat::Nv61 => RgaFormat::YCrCb422Sp,
        VideoFormat::Rgb16 => RgaFormat::Rgb565,
        VideoFormat::Rgb15 => RgaFormat::Rgba5551,
        VideoFormat::Bgr => RgaFormat::Bgr888,
        VideoFormat::Rgb => RgaFormat::Rgb888,
        VideoFormat::Bgra => RgaFormat::Bgra8888,
        VideoFormat::Rgba => RgaFormat::Rgba8888,
        VideoFormat::Bgrx => RgaFormat::Bgrx8888,
        VideoFormat::Rgbx => RgaFormat::Rgbx8888,
        VideoFormat::Yuy2
        | VideoFormat::Uyvy
        | VideoFormat::Gray8
        | VideoFormat::Argb
        | VideoFormat::Y444
        | VideoFormat::Unknown => RgaFormat::Unknown,
    }
}

/// Like [`to_rga_format`], but the unknown sentinel becomes an error
pub fn try_to_rga_format(format: VideoFormat) -> Result<RgaFormat> {
    match to_rga_format(format) {
        RgaFormat::Unknown => Err(Error::UnsupportedFormat(format!(
            "{} has no RGA surface format",
            format
        ))),
        rga => Ok(rga),
    }
}

/// Check whether the RGA can read or write this format
pub fn is_supported(format: VideoFormat) -> bool {
    to_rga_format(format) != RgaFormat::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn translated() -> impl Iterator<Item = VideoFormat> {
        VideoFormat::ALL.into_iter().filter(|f| is_supported(*f))
    }

    #[test]
    fn test_table_is_injective() {
        let mut seen = HashSet::new();
        for format in translated() {
            let rga = to_rga_format(format);
            assert!(seen.insert(rga), "{rga} mapped twice");
        }
        assert_eq!(seen.len(), SUPPORTED_FORMATS.len() + 1);
    }

    #[test]
    fn test_advertised_formats_translate() {
        for format in SUPPORTED_FORMATS {
            assert_ne!(to_rga_format(format), RgaFormat::Unknown, "{format} must be mapped");
        }
        let unadvertised: Vec<_> = translated()
            .filter(|f| !SUPPORTED_FORMATS.contains(f))
            .collect();
        assert_eq!(unadvertised, vec![VideoFormat::Nv12Le40]);
        assert_eq!(to_rga_format(VideoFormat::Nv12Le40), RgaFormat::YCbCr420Sp10B);
    }

    #[test]
    fn test_every_mapped_format_has_pixel_size() {
        for format in translated() {
            assert!(to_rga_format(format).pixel_size().is_some());
        }
        assert_eq!(RgaFormat::Unknown.pixel_size(), None);
    }

    #[test]
    fn test_pixel_sizes() {
        assert_eq!(to_rga_format(VideoFormat::Bgrx).pixel_size(), Some(4));
        assert_eq!(to_rga_format(VideoFormat::Rgb).pixel_size(), Some(3));
        assert_eq!(to_rga_format(VideoFormat::Rgb15).pixel_size(), Some(2));
        assert_eq!(to_rga_format(VideoFormat::Nv61).pixel_size(), Some(1));
    }

    #[test]
    fn test_unsupported_is_error() {
        assert!(matches!(
            try_to_rga_format(VideoFormat::Yuy2),
            Err(Error::UnsupportedFormat(_))
        ));
        assert_eq!(try_to_rga_format(VideoFormat::Nv12).unwrap().code(), 0xa << 8);
    }
}
