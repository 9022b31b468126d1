//! System memory buffers

use super::{FrameBuffer, MapAccess, Mapping, MemoryBlock};
use crate::error::{Error, Result};
use std::cell::{Cell, UnsafeCell};
use std::ptr::NonNull;

/// Frame memory in a heap allocation
///
/// The allocation is contiguous, but it may be described as several memory
/// blocks (one per plane) the way a host allocator hands out per-plane
/// memories. Mapping always covers the whole allocation.
///
/// Map and unmap calls are counted so callers can check that every mapping
/// was released.
pub struct HeapBuffer {
    data: Box<[UnsafeCell<u8>]>,
    blocks: Vec<MemoryBlock>,
    maps: Cell<u64>,
    unmaps: Cell<u64>,
}

impl HeapBuffer {
    /// Zeroed buffer with a single memory block
    pub fn new(size: usize) -> Self {
        Self::from_vec(vec![0u8; size])
    }

    pub fn from_vec(data: Vec<u8>) -> Self {
        let size = data.len();
        Self {
            data: data.into_iter().map(UnsafeCell::new).collect(),
            blocks: vec![MemoryBlock::system(size)],
            maps: Cell::new(0),
            unmaps: Cell::new(0),
        }
    }

    /// Zeroed buffer split into one memory block per size
    pub fn with_blocks(sizes: &[usize]) -> Self {
        let total = sizes.iter().sum();
        let mut buffer = Self::new(total);
        buffer.blocks = sizes.iter().map(|&s| MemoryBlock::system(s)).collect();
        buffer
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Buffer contents
    ///
    /// The slice must not be held across a blit that writes this buffer.
    pub fn bytes(&self) -> &[u8] {
        // SAFETY: `UnsafeCell<u8>` has the layout of `u8`; writers only go
        // through mappings, which the converter holds for a single blit
        unsafe { std::slice::from_raw_parts(self.data.as_ptr().cast::<u8>(), self.data.len()) }
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: exclusive borrow, so no mapping is live
        unsafe {
            std::slice::from_raw_parts_mut(self.data.as_mut_ptr().cast::<u8>(), self.data.len())
        }
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
            .into_vec()
            .into_iter()
            .map(UnsafeCell::into_inner)
            .collect()
    }

    pub fn map_count(&self) -> u64 {
        self.maps.get()
    }

    pub fn unmap_count(&self) -> u64 {
        self.unmaps.get()
    }

    /// Mappings not yet released
    pub fn active_maps(&self) -> u64 {
        self.maps.get() - self.unmaps.get()
    }
}

impl FrameBuffer for HeapBuffer {
    fn memory_blocks(&self) -> &[MemoryBlock] {
        &self.blocks
    }

    fn map(&self, access: MapAccess) -> Result<Mapping> {
        if self.data.is_empty() {
            return Err(Error::BufferMap("empty heap buffer".into()));
        }
        // The boxed slice never moves while the buffer is alive, and its
        // cells allow writes through a shared borrow.
        let ptr = NonNull::new(UnsafeCell::raw_get(self.data.as_ptr()))
            .ok_or_else(|| Error::BufferMap("null heap allocation".into()))?;
        self.maps.set(self.maps.get() + 1);
        Ok(Mapping::new(ptr, self.data.len(), access))
    }

    fn unmap(&self, _mapping: Mapping) {
        self.unmaps.set(self.unmaps.get() + 1);
    }
}

impl std::fmt::Debug for HeapBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeapBuffer")
            .field("size", &self.size())
            .field("blocks", &self.blocks)
            .field("maps", &self.maps.get())
            .field("unmaps", &self.unmaps.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks() {
        let buffer = HeapBuffer::with_blocks(&[100, 50]);
        assert_eq!(buffer.size(), 150);
        assert_eq!(buffer.memory_blocks().len(), 2);
    }

    #[test]
    fn test_write_through_mapping() {
        let buffer = HeapBuffer::new(4);
        let mapping = buffer.map(MapAccess::Write).unwrap();
        unsafe { mapping.ptr().as_ptr().add(2).write(0xab) };
        buffer.unmap(mapping);
        assert_eq!(buffer.bytes(), &[0, 0, 0xab, 0]);
        assert_eq!(buffer.active_maps(), 0);
    }

    #[test]
    fn test_map_while_contents_borrowed() {
        let mut buffer = HeapBuffer::from_vec(vec![1, 2, 3, 4]);
        let before = buffer.bytes();
        let mapping = buffer.map(MapAccess::Read).unwrap();
        assert_eq!(before, &[1, 2, 3, 4]);
        assert_eq!(unsafe { mapping.ptr().as_ptr().add(3).read() }, 4);
        buffer.unmap(mapping);

        buffer.bytes_mut()[0] = 9;
        let mapping = buffer.map(MapAccess::Write).unwrap();
        unsafe { mapping.ptr().as_ptr().add(1).write(7) };
        buffer.unmap(mapping);
        assert_eq!(buffer.into_vec(), vec![9, 7, 3, 4]);
    }

    #[test]
    fn test_empty_buffer_cannot_map() {
        let buffer = HeapBuffer::new(0);
        assert!(matches!(buffer.map(MapAccess::Read), Err(Error::BufferMap(_))));
        assert_eq!(buffer.map_count(), 0);
    }
}
