//! Frame to RGA surface resolution
//!
//! Turns a host frame into the descriptor the RGA consumes: native format
//! code, rectangle, pixel strides and one address. DMA-BUF frames at offset 0
//! go to the hardware by fd. Everything else is mapped, and the mapping lives
//! in the returned [`ResolvedSurface`] until it drops.

use crate::buffer::{MapAccess, MappedBuffer};
use crate::engine::CoreMask;
use crate::error::{Error, Result};
use crate::format::{self, RgaFormat};
use crate::frame::FrameDescriptor;
use std::os::unix::io::RawFd;
use std::ptr::NonNull;

/// Surface rectangle, strides in pixels (`rga_rect_t`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgaRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub wstride: u32,
    pub hstride: u32,
    pub format: RgaFormat,
}

/// How the hardware reaches the surface memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceAddress {
    /// DMA-BUF file descriptor
    Fd(RawFd),
    /// CPU address of a mapped buffer
    Virtual { ptr: NonNull<u8>, len: usize },
}

impl SurfaceAddress {
    pub fn is_fd(&self) -> bool {
        matches!(self, SurfaceAddress::Fd(_))
    }
}

/// Hardware-native surface descriptor (`rga_info_t`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgaSurface {
    pub rect: RgaRect,
    pub addr: SurfaceAddress,
    /// Cores allowed to run the blit; empty leaves the hardware default
    pub core: CoreMask,
    pub mmu: bool,
}

impl RgaSurface {
    pub fn format(&self) -> RgaFormat {
        self.rect.format
    }
}

/// Which addressing path a surface took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressPath {
    ZeroCopy,
    Mapped,
}

impl std::fmt::Display for AddressPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressPath::ZeroCopy => write!(f, "dmabuf"),
            AddressPath::Mapped => write!(f, "mapped"),
        }
    }
}

/// A surface plus the mapping backing its virtual address, if any
#[derive(Debug)]
pub struct ResolvedSurface<'a> {
    surface: RgaSurface,
    _mapping: Option<MappedBuffer<'a>>,
}

impl ResolvedSurface<'_> {
    pub fn surface(&self) -> &RgaSurface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut RgaSurface {
        &mut self.surface
    }

    pub fn path(&self) -> AddressPath {
        if self.surface.addr.is_fd() {
            AddressPath::ZeroCopy
        } else {
            AddressPath::Mapped
        }
    }
}

/// Resolve a frame into an RGA surface
///
/// `access` is the CPU access used if the buffer has to be mapped: read for
/// the source, write for the destination.
pub fn resolve<'a>(frame: &FrameDescriptor<'a>, access: MapAccess) -> Result<ResolvedSurface<'a>> {
    let format = format::try_to_rga_format(frame.format)?;

    let first = frame
        .planes
        .first()
        .ok_or_else(|| Error::InvalidGeometry(format!("{} frame has no planes", frame.format)))?;
    let mut wstride = first.stride;
    if wstride == 0 {
        return Err(Error::InvalidGeometry("zero plane stride".into()));
    }

    let hstride = match frame.planes.get(1) {
        None => frame.height,
        Some(second) => u32::try_from(second.offset / wstride as usize).map_err(|_| {
            Error::InvalidGeometry(format!("plane offset {} out of range", second.offset))
        })?,
    };
    if hstride < frame.height {
        return Err(Error::InvalidGeometry(format!(
            "vertical stride {} below height {}",
            hstride, frame.height
        )));
    }

    let pixel_size = format
        .pixel_size()
        .ok_or_else(|| Error::UnsupportedFormat(format.name().to_string()))?;

    let (mut width, mut height) = (frame.width, frame.height);
    if format.is_yuv() {
        width &= !1;
        height &= !1;
    }
    if width == 0 || height == 0 {
        return Err(Error::InvalidGeometry(format!(
            "{}x{} {} frame is empty after alignment",
            frame.width, frame.height, frame.format
        )));
    }

    // Strides that cover the width in pixel units were given in bytes
    if wstride / pixel_size >= width {
        if wstride % pixel_size != 0 {
            return Err(Error::InvalidGeometry(format!(
                "byte stride {} is not a multiple of pixel size {}",
                wstride, pixel_size
            )));
        }
        wstride /= pixel_size;
    }
    if wstride < width {
        return Err(Error::InvalidGeometry(format!(
            "stride {} below width {}",
            wstride, width
        )));
    }

    let rect = RgaRect {
        x: 0,
        y: 0,
        width,
        height,
        wstride,
        hstride,
        format,
    };

    let fd = match frame.buffer.memory_blocks() {
        [block] if block.offset == 0 => block.dmabuf_fd().filter(|fd| *fd > 0),
        _ => None,
    };

    let (addr, mapping) = match fd {
        Some(fd) => (SurfaceAddress::Fd(fd), None),
        None => {
            let mapped = MappedBuffer::new(frame.buffer, access).map_err(|e| match e {
                Error::BufferMap(_) => e,
                other => Error::BufferMap(other.to_string()),
            })?;
            let addr = SurfaceAddress::Virtual {
                ptr: mapped.ptr(),
                len: mapped.len(),
            };
            (addr, Some(mapped))
        }
    };

    let resolved = ResolvedSurface {
        surface: RgaSurface {
            rect,
            addr,
            core: CoreMask::AUTO,
            mmu: true,
        },
        _mapping: mapping,
    };

    tracing::debug!(
        format = %format,
        width,
        height,
        wstride,
        hstride,
        path = %resolved.path(),
        ?access,
        "resolved surface"
    );

    Ok(resolved)
}
