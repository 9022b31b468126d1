//! Per-frame view handed to the converter

use crate::buffer::FrameBuffer;
use crate::types::{PlaneLayout, VideoFormat, VideoInfo};

/// A host frame: negotiated layout plus the buffer holding it
///
/// Read-only to the converter and only valid for one transform call.
pub struct FrameDescriptor<'a> {
    pub format: VideoFormat,
    pub width: u32,
    pub height: u32,
    /// Stride and offset per plane, in plane order
    pub planes: Vec<PlaneLayout>,
    pub buffer: &'a dyn FrameBuffer,
}

impl<'a> FrameDescriptor<'a> {
    /// Frame laid out as `info` describes
    pub fn new(info: &VideoInfo, buffer: &'a dyn FrameBuffer) -> Self {
        Self {
            format: info.format,
            width: info.width,
            height: info.height,
            planes: info.planes.clone(),
            buffer,
        }
    }

    /// Frame with an explicit plane layout (e.g. from a padded allocator)
    pub fn with_planes(
        format: VideoFormat,
        width: u32,
        height: u32,
        planes: Vec<PlaneLayout>,
        buffer: &'a dyn FrameBuffer,
    ) -> Self {
        Self {
            format,
            width,
            height,
            planes,
            buffer,
        }
    }

    pub fn n_planes(&self) -> usize {
        self.planes.len()
    }
}

impl std::fmt::Debug for FrameDescriptor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameDescriptor")
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("planes", &self.planes)
            .field("memory_blocks", &self.buffer.memory_blocks())
            .finish()
    }
}
