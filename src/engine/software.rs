//! CPU reference driver
//!
//! Performs the RGA's convert-and-scale on the CPU for virtual-address
//! surfaces. Scaling is nearest-neighbour and every format goes through an
//! RGBA intermediate, using BT.601 limited range for YUV. Surfaces are read
//! the way the RGA reads them: chroma planes follow the luma plane at
//! `wstride * hstride` with half the luma stride.
//!
//! The driver also records the calls it receives so tests can inspect them.

use super::{CoreMask, RgaDriver};
use crate::error::{Error, Result};
use crate::format::RgaFormat;
use crate::surface::{RgaRect, RgaSurface, SurfaceAddress};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Software implementation of [`RgaDriver`]
#[derive(Debug, Default)]
pub struct SoftwareDriver {
    inits: AtomicU64,
    deinits: AtomicU64,
    blits: AtomicU64,
    scheduler_calls: Mutex<Vec<CoreMask>>,
    last_cores: Mutex<Option<(CoreMask, CoreMask)>>,
    fail_init: bool,
    blit_error: Option<i32>,
}

impl SoftwareDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `init` fail
    pub fn with_init_failure(mut self) -> Self {
        self.fail_init = true;
        self
    }

    /// Make every blit return `code` without touching the surfaces
    pub fn with_blit_error(mut self, code: i32) -> Self {
        self.blit_error = Some(code);
        self
    }

    pub fn init_count(&self) -> u64 {
        self.inits.load(Ordering::Relaxed)
    }

    pub fn deinit_count(&self) -> u64 {
        self.deinits.load(Ordering::Relaxed)
    }

    pub fn blit_count(&self) -> u64 {
        self.blits.load(Ordering::Relaxed)
    }

    /// Masks passed to `configure_scheduler`, in call order
    pub fn scheduler_calls(&self) -> Vec<CoreMask> {
        self.scheduler_calls.lock().clone()
    }

    /// Source and destination core masks of the last blit
    pub fn last_blit_cores(&self) -> Option<(CoreMask, CoreMask)> {
        *self.last_cores.lock()
    }

    fn convert(&self, src: &RgaSurface, dst: &RgaSurface) -> std::result::Result<(), i32> {
        let (src_ptr, src_len) = virtual_address(src)?;
        let (dst_ptr, dst_len) = virtual_address(dst)?;
        check_surface(&src.rect, src_len)?;
        check_surface(&dst.rect, dst_len)?;

        let src_start = src_ptr as usize;
        let dst_start = dst_ptr as usize;
        if src_start < dst_start + dst_len && dst_start < src_start + src_len {
            return Err(-libc::EINVAL);
        }

        // SAFETY: both regions come from live mappings of the stated length
        // and were checked not to overlap
        let src_data = unsafe { std::slice::from_raw_parts(src_ptr, src_len) };
        let dst_data = unsafe { std::slice::from_raw_parts_mut(dst_ptr, dst_len) };

        let (sw, sh) = (src.rect.width as u64, src.rect.height as u64);
        let (dw, dh) = (dst.rect.width as u64, dst.rect.height as u64);
        for dy in 0..dst.rect.height {
            let sy = (dy as u64 * sh / dh) as u32;
            for dx in 0..dst.rect.width {
                let sx = (dx as u64 * sw / dw) as u32;
                let rgba = read_pixel(&src.rect, src_data, sx, sy);
                write_pixel(&dst.rect, dst_data, dx, dy, rgba);
            }
        }
        Ok(())
    }
}

impl RgaDriver for SoftwareDriver {
    fn name(&self) -> &str {
        "software"
    }

    fn init(&self) -> Result<()> {
        if self.fail_init {
            return Err(Error::EngineInit("software driver init disabled".into()));
        }
        self.inits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn deinit(&self) {
        self.deinits.fetch_add(1, Ordering::Relaxed);
    }

    fn configure_scheduler(&self, mask: CoreMask) -> Result<()> {
        self.scheduler_calls.lock().push(mask);
        Ok(())
    }

    fn blit(&self, src: &RgaSurface, dst: &RgaSurface) -> i32 {
        self.blits.fetch_add(1, Ordering::Relaxed);
        *self.last_cores.lock() = Some((src.core, dst.core));
        if let Some(code) = self.blit_error {
            return code;
        }
        match self.convert(src, dst) {
            Ok(()) => 0,
            Err(code) => {
                tracing::debug!(code, src = %src.format(), dst = %dst.format(), "software blit rejected");
                code
            }
        }
    }
}

fn virtual_address(surface: &RgaSurface) -> std::result::Result<(*mut u8, usize), i32> {
    match surface.addr {
        SurfaceAddress::Virtual { ptr, len } => Ok((ptr.as_ptr(), len)),
        SurfaceAddress::Fd(_) => Err(-libc::EOPNOTSUPP),
    }
}

/// Bytes the RGA reads or writes for a surface
fn surface_len(rect: &RgaRect) -> Option<usize> {
    let luma = rect.wstride as usize * rect.hstride as usize;
    let len = match rect.format {
        RgaFormat::YCbCr420P | RgaFormat::YCrCb420P | RgaFormat::YCbCr420Sp | RgaFormat::YCrCb420Sp => {
            luma + luma / 2
        }
        RgaFormat::YCbCr422P | RgaFormat::YCrCb422P | RgaFormat::YCbCr422Sp | RgaFormat::YCrCb422Sp => {
            luma * 2
        }
        other => luma * other.pixel_size()? as usize,
    };
    Some(len)
}

fn check_surface(rect: &RgaRect, len: usize) -> std::result::Result<(), i32> {
    if rect.format == RgaFormat::YCbCr420Sp10B {
        return Err(-libc::EOPNOTSUPP);
    }
    if rect.width == 0
        || rect.height == 0
        || rect.x != 0
        || rect.y != 0
        || rect.width > rect.wstride
        || rect.height > rect.hstride
    {
        return Err(-libc::EINVAL);
    }
    match surface_len(rect) {
        Some(needed) if needed <= len => Ok(()),
        Some(_) => Err(-libc::EINVAL),
        None => Err(-libc::EOPNOTSUPP),
    }
}

/// Byte offsets of the Cb and Cr samples for luma position (x, y)
fn chroma_offsets(rect: &RgaRect, x: u32, y: u32) -> (usize, usize) {
    let ws = rect.wstride as usize;
    let hs = rect.hstride as usize;
    let (x, y) = (x as usize, y as usize);
    let luma = ws * hs;
    let cstride = ws / 2;

    match rect.format {
        RgaFormat::YCbCr420P | RgaFormat::YCrCb420P => {
            let first = luma + (y / 2) * cstride + x / 2;
            let second = first + cstride * (hs / 2);
            if rect.format == RgaFormat::YCbCr420P {
                (first, second)
            } else {
                (second, first)
            }
        }
        RgaFormat::YCbCr422P | RgaFormat::YCrCb422P => {
            let first = luma + y * cstride + x / 2;
            let second = first + cstride * hs;
            if rect.format == RgaFormat::YCbCr422P {
                (first, second)
            } else {
                (second, first)
            }
        }
        RgaFormat::YCbCr420Sp | RgaFormat::YCrCb420Sp => {
            let pair = luma + (y / 2) * ws + (x / 2) * 2;
            if rect.format == RgaFormat::YCbCr420Sp {
                (pair, pair + 1)
            } else {
                (pair + 1, pair)
            }
        }
        _ => {
            let pair = luma + y * ws + (x / 2) * 2;
            if rect.format == RgaFormat::YCbCr422Sp {
                (pair, pair + 1)
            } else {
                (pair + 1, pair)
            }
        }
    }
}

fn clamp(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

fn yuv_to_rgba(y: u8, u: u8, v: u8) -> [u8; 4] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    [
        clamp((298 * c + 409 * e + 128) >> 8),
        clamp((298 * c - 100 * d - 208 * e + 128) >> 8),
        clamp((298 * c + 516 * d + 128) >> 8),
        255,
    ]
}

fn rgba_to_yuv([r, g, b, _]: [u8; 4]) -> (u8, u8, u8) {
    let (r, g, b) = (r as i32, g as i32, b as i32);
    (
        clamp(((66 * r + 129 * g + 25 * b + 128) >> 8) + 16),
        clamp(((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128),
        clamp(((112 * r - 94 * g - 18 * b + 128) >> 8) + 128),
    )
}

fn expand5(v: u16) -> u8 {
    let v = (v & 0x1f) as u8;
    (v << 3) | (v >> 2)
}

fn expand6(v: u16) -> u8 {
    let v = (v & 0x3f) as u8;
    (v << 2) | (v >> 4)
}

fn read_pixel(rect: &RgaRect, data: &[u8], x: u32, y: u32) -> [u8; 4] {
    if rect.format.is_yuv() {
        let luma = data[y as usize * rect.wstride as usize + x as usize];
        let (cb, cr) = chroma_offsets(rect, x, y);
        return yuv_to_rgba(luma, data[cb], data[cr]);
    }

    let px = rect.format.pixel_size().unwrap_or(4) as usize;
    let at = (y as usize * rect.wstride as usize + x as usize) * px;
    let p = &data[at..at + px];
    match rect.format {
        RgaFormat::Rgba8888 => [p[0], p[1], p[2], p[3]],
        RgaFormat::Rgbx8888 | RgaFormat::Rgb888 => [p[0], p[1], p[2], 255],
        RgaFormat::Bgra8888 => [p[2], p[1], p[0], p[3]],
        RgaFormat::Bgrx8888 | RgaFormat::Bgr888 => [p[2], p[1], p[0], 255],
        RgaFormat::Rgb565 => {
            let v = u16::from_le_bytes([p[0], p[1]]);
            [expand5(v >> 11), expand6(v >> 5), expand5(v), 255]
        }
        RgaFormat::Rgba5551 => {
            let v = u16::from_le_bytes([p[0], p[1]]);
            [expand5(v >> 10), expand5(v >> 5), expand5(v), 255]
        }
        _ => [0, 0, 0, 255],
    }
}

fn write_pixel(rect: &RgaRect, data: &mut [u8], x: u32, y: u32, rgba: [u8; 4]) {
    if rect.format.is_yuv() {
        let (luma, cb, cr) = rgba_to_yuv(rgba);
        data[y as usize * rect.wstride as usize + x as usize] = luma;
        let vertical = matches!(
            rect.format,
            RgaFormat::YCbCr420P | RgaFormat::YCrCb420P | RgaFormat::YCbCr420Sp | RgaFormat::YCrCb420Sp
        );
        if x % 2 == 0 && (!vertical || y % 2 == 0) {
            let (cb_at, cr_at) = chroma_offsets(rect, x, y);
            data[cb_at] = cb;
            data[cr_at] = cr;
        }
        return;
    }

    let [r, g, b, a] = rgba;
    let px = rect.format.pixel_size().unwrap_or(4) as usize;
    let at = (y as usize * rect.wstride as usize + x as usize) * px;
    let p = &mut data[at..at + px];
    match rect.format {
        RgaFormat::Rgba8888 => p.copy_from_slice(&[r, g, b, a]),
        RgaFormat::Rgbx8888 => p.copy_from_slice(&[r, g, b, 255]),
        RgaFormat::Bgra8888 => p.copy_from_slice(&[b, g, r, a]),
        RgaFormat::Bgrx8888 => p.copy_from_slice(&[b, g, r, 255]),
        RgaFormat::Rgb888 => p.copy_from_slice(&[r, g, b]),
        RgaFormat::Bgr888 => p.copy_from_slice(&[b, g, r]),
        RgaFormat::Rgb565 => {
            let v = (((r as u16) >> 3) << 11) | (((g as u16) >> 2) << 5) | ((b as u16) >> 3);
            p.copy_from_slice(&v.to_le_bytes());
        }
        RgaFormat::Rgba5551 => {
            let v = 0x8000 | (((r as u16) >> 3) << 10) | (((g as u16) >> 3) << 5) | ((b as u16) >> 3);
            p.copy_from_slice(&v.to_le_bytes());
        }
        _ => {}
    }
}
