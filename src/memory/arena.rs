/*!
Linear memory arena: the VM module's single contiguous address space.

Model:
- `LinearMemory` is the module's memory object. It is a cheap, cloneable
  handle; every clone observes the same memory.
- `ArenaBuffer` is the byte buffer currently backing that memory. Buffers are
  stamped with a generation.
- Growing the memory replaces the buffer object: contents are copied into a
  fresh, larger buffer with the next generation, and the old buffer is
  detached (it reads as empty from then on). Anything that cached the old
  buffer must go back to `LinearMemory::buffer()` to see live bytes.

Only the module writes into the arena; the host reads through
[`MemoryView`](crate::memory::MemoryView) and writes only when cloning a
cartridge in for loading.
*/

use std::cell::{Ref, RefCell};
use std::rc::Rc;

/// Growth granularity of the arena (in bytes).
pub const PAGE_SIZE: usize = 64 * 1024;

/// One generation of the arena's backing bytes.
#[derive(Debug)]
pub struct ArenaBuffer {
    generation: u64,
    bytes: RefCell<Vec<u8>>,
}

impl ArenaBuffer {
    fn new(generation: u64, bytes: Vec<u8>) -> Self {
        Self {
            generation,
            bytes: RefCell::new(bytes),
        }
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Current byte length. A detached buffer reports 0.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.borrow().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the raw bytes (read-only).
    #[inline]
    pub fn bytes(&self) -> Ref<'_, [u8]> {
        Ref::map(self.bytes.borrow(), |v| v.as_slice())
    }

    fn detach(&self) -> Vec<u8> {
        std::mem::take(&mut *self.bytes.borrow_mut())
    }
}

/// Shared handle to the module's linear memory.
#[derive(Clone, Debug)]
pub struct LinearMemory {
    current: Rc<RefCell<Rc<ArenaBuffer>>>,
}

impl LinearMemory {
    /// Create a zero-filled memory of `pages` x [`PAGE_SIZE`] bytes, generation 0.
    pub fn new(pages: usize) -> Self {
        let buffer = ArenaBuffer::new(0, vec![0; pages * PAGE_SIZE]);
        Self {
            current: Rc::new(RefCell::new(Rc::new(buffer))),
        }
    }

    /// The buffer currently backing this memory.
    #[inline]
    pub fn buffer(&self) -> Rc<ArenaBuffer> {
        Rc::clone(&self.current.borrow())
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.current.borrow().generation()
    }

    #[inline]
    pub fn byte_len(&self) -> usize {
        self.current.borrow().len()
    }

    /// Whether `other` is a handle to this same memory object.
    #[inline]
    pub fn same_memory(&self, other: &LinearMemory) -> bool {
        Rc::ptr_eq(&self.current, &other.current)
    }

    /// Grow by `pages` pages. Replaces the backing buffer (next generation) and
    /// detaches the previous one. Returns the previous size in pages.
    pub fn grow(&self, pages: usize) -> usize {
        let mut current = self.current.borrow_mut();
        let old_len = current.len();
        let mut bytes = current.detach();
        bytes.resize(old_len + pages * PAGE_SIZE, 0);
        let next = ArenaBuffer::new(current.generation() + 1, bytes);
        *current = Rc::new(next);
        old_len / PAGE_SIZE
    }

    /// Copy `src` into the arena at `ptr`.
    ///
    /// Panics if the range falls outside the arena.
    pub fn write(&self, ptr: u32, src: &[u8]) {
        let buffer = self.buffer();
        let mut bytes = buffer.bytes.borrow_mut();
        let range = checked_range(ptr, src.len(), bytes.len());
        bytes[range].copy_from_slice(src);
    }

    /// Copy bytes out of the arena at `ptr` into `dst`.
    ///
    /// Panics if the range falls outside the arena.
    pub fn read(&self, ptr: u32, dst: &mut [u8]) {
        let buffer = self.buffer();
        let bytes = buffer.bytes();
        let range = checked_range(ptr, dst.len(), bytes.len());
        dst.copy_from_slice(&bytes[range]);
    }

    #[inline]
    pub fn write_u8(&self, ptr: u32, value: u8) {
        self.write(ptr, &[value]);
    }

    #[inline]
    pub fn read_u8(&self, ptr: u32) -> u8 {
        let mut out = [0u8; 1];
        self.read(ptr, &mut out);
        out[0]
    }
}

/// Validate `[ptr, ptr + len)` against an arena of `arena_len` bytes.
pub(crate) fn checked_range(ptr: u32, len: usize, arena_len: usize) -> std::ops::Range<usize> {
    let start = ptr as usize;
    let end = start.checked_add(len);
    match end {
        Some(end) if end <= arena_len => start..end,
        _ => panic!(
            "arena access out of bounds: ptr={ptr:#x} len={len} arena_len={arena_len}"
        ),
    }
}
