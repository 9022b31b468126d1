//! Frame buffer memory
//!
//! Buffers are owned by the host. The converter only inspects their memory
//! blocks (to find a DMA-BUF fd for zero-copy) and, as a fallback, maps them
//! for CPU addressing. Mappings are scoped by [`MappedBuffer`], which unmaps
//! on drop.

mod dmabuf;
mod heap;

pub use dmabuf::DmaBuffer;
pub use heap::HeapBuffer;

use crate::error::Result;
use std::mem::ManuallyDrop;
use std::os::unix::io::RawFd;
use std::ptr::NonNull;

/// Requested CPU access for a mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapAccess {
    Read,
    Write,
}

/// Backing of one memory block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryKind {
    /// Plain process memory
    System,
    /// Shareable DMA-BUF, addressable by the RGA through its fd
    DmaBuf(RawFd),
}

/// One memory block of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBlock {
    pub kind: MemoryKind,
    /// Offset of the block's data inside its allocation
    pub offset: usize,
    /// Size of the block's data in bytes
    pub size: usize,
}

impl MemoryBlock {
    pub fn system(size: usize) -> Self {
        Self {
            kind: MemoryKind::System,
            offset: 0,
            size,
        }
    }

    pub fn dmabuf(fd: RawFd, offset: usize, size: usize) -> Self {
        Self {
            kind: MemoryKind::DmaBuf(fd),
            offset,
            size,
        }
    }

    pub fn dmabuf_fd(&self) -> Option<RawFd> {
        match self.kind {
            MemoryKind::DmaBuf(fd) => Some(fd),
            MemoryKind::System => None,
        }
    }
}

/// A CPU mapping of a whole buffer
///
/// `ptr..ptr + len` is the buffer's data. `base`/`base_len` describe the
/// region the implementation actually mapped, which may start earlier.
#[derive(Debug)]
pub struct Mapping {
    ptr: NonNull<u8>,
    len: usize,
    access: MapAccess,
    base: NonNull<u8>,
    base_len: usize,
}

impl Mapping {
    pub fn new(ptr: NonNull<u8>, len: usize, access: MapAccess) -> Self {
        Self {
            ptr,
            len,
            access,
            base: ptr,
            base_len: len,
        }
    }

    /// Mapping whose data starts `offset` bytes into a larger region
    ///
    /// # Safety
    ///
    /// `base` must be valid for `base_len` bytes and `offset + len <= base_len`.
    pub unsafe fn with_base(
        base: NonNull<u8>,
        base_len: usize,
        offset: usize,
        len: usize,
        access: MapAccess,
    ) -> Self {
        debug_assert!(offset + len <= base_len);
        Self {
            ptr: NonNull::new_unchecked(base.as_ptr().add(offset)),
            len,
            access,
            base,
            base_len,
        }
    }

    pub fn ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn access(&self) -> MapAccess {
        self.access
    }

    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    pub fn base_len(&self) -> usize {
        self.base_len
    }
}

/// Host-owned frame memory
pub trait FrameBuffer {
    /// Memory blocks in plane order
    fn memory_blocks(&self) -> &[MemoryBlock];

    /// Map every block as one contiguous CPU-addressable region
    fn map(&self, access: MapAccess) -> Result<Mapping>;

    /// Release a mapping previously returned by [`FrameBuffer::map`]
    fn unmap(&self, mapping: Mapping);
}

/// Scoped mapping: unmapped exactly once when dropped
pub struct MappedBuffer<'a> {
    buffer: &'a dyn FrameBuffer,
    mapping: ManuallyDrop<Mapping>,
}

impl<'a> MappedBuffer<'a> {
    pub fn new(buffer: &'a dyn FrameBuffer, access: MapAccess) -> Result<Self> {
        let mapping = buffer.map(access)?;
        Ok(Self {
            buffer,
            mapping: ManuallyDrop::new(mapping),
        })
    }

    pub fn ptr(&self) -> NonNull<u8> {
        self.mapping.ptr()
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn access(&self) -> MapAccess {
        self.mapping.access()
    }
}

impl Drop for MappedBuffer<'_> {
    fn drop(&mut self) {
        // SAFETY: drop runs once and the mapping is not touched afterwards
        let mapping = unsafe { ManuallyDrop::take(&mut self.mapping) };
        self.buffer.unmap(mapping);
    }
}

impl std::fmt::Debug for MappedBuffer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedBuffer")
            .field("mapping", &*self.mapping)
            .finish()
    }
}
