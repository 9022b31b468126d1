//! DMA-BUF backed buffers
//!
//! A DMA-BUF whose data starts at offset 0 is handed to the RGA by fd with no
//! CPU involvement. Otherwise the converter falls back to an `mmap` of the fd.

use super::{FrameBuffer, MapAccess, Mapping, MemoryBlock};
use crate::error::{Error, Result};
use std::os::unix::io::{AsRawFd, OwnedFd, RawFd};
use std::ptr::NonNull;

/// DMA-BUF frame memory with an owned file descriptor (closed on drop)
#[derive(Debug)]
pub struct DmaBuffer {
    fd: OwnedFd,
    blocks: [MemoryBlock; 1],
}

impl DmaBuffer {
    /// Wrap a DMA-BUF fd whose frame data is `size` bytes at offset 0
    pub fn new(fd: OwnedFd, size: usize) -> Self {
        Self::with_offset(fd, 0, size)
    }

    /// Wrap a DMA-BUF fd whose frame data starts `offset` bytes in
    pub fn with_offset(fd: OwnedFd, offset: usize, size: usize) -> Self {
        let raw = fd.as_raw_fd();
        Self {
            fd,
            blocks: [MemoryBlock::dmabuf(raw, offset, size)],
        }
    }

    /// Get the raw file descriptor
    pub fn fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    pub fn offset(&self) -> usize {
        self.blocks[0].offset
    }

    pub fn size(&self) -> usize {
        self.blocks[0].size
    }
}

impl FrameBuffer for DmaBuffer {
    fn memory_blocks(&self) -> &[MemoryBlock] {
        &self.blocks
    }

    fn map(&self, access: MapAccess) -> Result<Mapping> {
        let offset = self.offset();
        let size = self.size();
        let base_len = offset + size;
        if size == 0 {
            return Err(Error::BufferMap("empty DMA-BUF".into()));
        }

        let prot = match access {
            MapAccess::Read => libc::PROT_READ,
            MapAccess::Write => libc::PROT_READ | libc::PROT_WRITE,
        };

        // SAFETY: mapping a caller-owned fd; the result is checked below
        let addr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                base_len,
                prot,
                libc::MAP_SHARED,
                self.fd(),
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(Error::BufferMap(format!(
                "mmap of DMA-BUF fd {} failed: {}",
                self.fd(),
                std::io::Error::last_os_error()
            )));
        }
        let base = NonNull::new(addr as *mut u8)
            .ok_or_else(|| Error::BufferMap("mmap returned null".into()))?;

        tracing::trace!(fd = self.fd(), offset, size, ?access, "mapped DMA-BUF");

        // SAFETY: base is valid for offset + size bytes
        Ok(unsafe { Mapping::with_base(base, base_len, offset, size, access) })
    }

    fn unmap(&self, mapping: Mapping) {
        // SAFETY: base/base_len are exactly what mmap returned in `map`
        let ret = unsafe { libc::munmap(mapping.base().as_ptr().cast(), mapping.base_len()) };
        if ret != 0 {
            tracing::warn!(
                fd = self.fd(),
                "munmap failed: {}",
                std::io::Error::last_os_error()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Seek, SeekFrom, Write};

    fn backing_file(len: usize) -> std::fs::File {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(&vec![0u8; len]).unwrap();
        file
    }

    #[test]
    fn test_map_with_offset_writes_through() {
        let mut file = backing_file(64);
        let fd: OwnedFd = file.try_clone().unwrap().into();
        let buffer = DmaBuffer::with_offset(fd, 16, 32);

        let mapping = buffer.map(MapAccess::Write).unwrap();
        assert_eq!(mapping.len(), 32);
        unsafe { mapping.ptr().as_ptr().write(0x5a) };
        buffer.unmap(mapping);

        let mut contents = Vec::new();
        file.seek(SeekFrom::Start(0)).unwrap();
        file.read_to_end(&mut contents).unwrap();
        assert_eq!(contents[16], 0x5a);
        assert_eq!(contents[0], 0);
    }

    #[test]
    fn test_memory_block_reports_fd() {
        let file = backing_file(16);
        let fd: OwnedFd = file.into();
        let raw = fd.as_raw_fd();
        let buffer = DmaBuffer::new(fd, 16);
        assert_eq!(buffer.memory_blocks()[0].dmabuf_fd(), Some(raw));
        assert_eq!(buffer.memory_blocks()[0].offset, 0);
    }
}
