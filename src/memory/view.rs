/*!
Views over the VM's linear memory.

A `MemoryView` names a byte range `[ptr, ptr + len)` of the arena. It keeps
only a weak reference to the buffer it was sliced from, stamped with that
buffer's generation. Every read first checks that the cached buffer is still
alive and still the memory's current generation; if not, the view re-slices
itself from the live buffer before touching any bytes. A view can therefore
be held across calls that grow the arena without ever observing a detached
buffer.

`OwnedView` is the one host-side allocation: bytes cloned into module memory.
It is move-only and must be handed back through `release`, which frees the
block exactly once.
*/

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::error::{BridgeError, Result};
use crate::memory::arena::{ArenaBuffer, LinearMemory, checked_range};
use crate::module::VmModule;

pub struct MemoryView {
    memory: LinearMemory,
    buffer: RefCell<Weak<ArenaBuffer>>,
    generation: Cell<u64>,
    ptr: u32,
    len: u32,
}

impl std::fmt::Debug for MemoryView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryView")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .field("generation", &self.generation.get())
            .finish()
    }
}

impl MemoryView {
    /// Slice `[ptr, ptr + len)` out of the memory's current buffer.
    ///
    /// Panics if the range lies outside the arena (a protocol violation).
    pub fn new(memory: &LinearMemory, ptr: u32, len: u32) -> Self {
        let buffer = memory.buffer();
        checked_range(ptr, len as usize, buffer.len());
        Self {
            memory: memory.clone(),
            buffer: RefCell::new(Rc::downgrade(&buffer)),
            generation: Cell::new(buffer.generation()),
            ptr,
            len,
        }
    }

    #[inline]
    pub fn ptr(&self) -> u32 {
        self.ptr
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Generation of the buffer this view was last sliced from.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    /// Whether the cached buffer has been replaced since the last access.
    pub fn is_stale(&self) -> bool {
        match self.buffer.borrow().upgrade() {
            Some(buffer) => buffer.generation() != self.memory.generation(),
            None => true,
        }
    }

    /// Return the live buffer, re-slicing from the memory if the cached one is stale.
    fn live(&self) -> Rc<ArenaBuffer> {
        let current = self.memory.generation();
        if let Some(buffer) = self.buffer.borrow().upgrade() {
            if buffer.generation() == current {
                return buffer;
            }
        }

        let buffer = self.memory.buffer();
        checked_range(self.ptr, self.len(), buffer.len());
        tracing::trace!(
            ptr = self.ptr,
            len = self.len,
            from = self.generation.get(),
            to = buffer.generation(),
            "reacquired memory view"
        );
        *self.buffer.borrow_mut() = Rc::downgrade(&buffer);
        self.generation.set(buffer.generation());
        buffer
    }

    /// Run `f` over the view's bytes.
    pub fn with<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let buffer = self.live();
        let bytes = buffer.bytes();
        let start = self.ptr as usize;
        f(&bytes[start..start + self.len()])
    }

    /// Byte at `offset` within the view.
    pub fn get(&self, offset: usize) -> Option<u8> {
        if offset >= self.len() {
            return None;
        }
        Some(self.with(|bytes| bytes[offset]))
    }

    /// Little-endian u16 at `offset` within the view.
    pub fn u16_le(&self, offset: usize) -> Option<u16> {
        let end = offset.checked_add(2)?;
        if end > self.len() {
            return None;
        }
        Some(self.with(|bytes| u16::from_le_bytes([bytes[offset], bytes[offset + 1]])))
    }

    /// Copy the view's bytes out.
    pub fn to_vec(&self) -> Vec<u8> {
        self.with(|bytes| bytes.to_vec())
    }

    /// Sub-view `[offset, offset + len)` relative to this view.
    pub fn subview(&self, offset: u32, len: u32) -> Option<MemoryView> {
        let end = offset.checked_add(len)?;
        if end as usize > self.len() {
            return None;
        }
        Some(MemoryView::new(&self.memory, self.ptr + offset, len))
    }
}

/// Bytes cloned into module memory. Must be released with [`OwnedView::release`].
#[must_use = "an OwnedView leaks module memory unless released"]
#[derive(Debug)]
pub struct OwnedView {
    view: MemoryView,
}

impl OwnedView {
    /// Allocate `bytes.len()` bytes in the module and copy `bytes` in.
    pub fn clone_into<M: VmModule + ?Sized>(module: &mut M, bytes: &[u8]) -> Result<Self> {
        let requested = u32::try_from(bytes.len())
            .map_err(|_| BridgeError::OutOfMemory { requested: u32::MAX })?;
        let ptr = module.malloc(requested)?;
        if ptr == 0 {
            return Err(BridgeError::OutOfMemory { requested });
        }
        // malloc may have grown the arena; slice from the memory as it is now.
        let memory = module.memory();
        memory.write(ptr, bytes);
        Ok(Self {
            view: MemoryView::new(memory, ptr, requested),
        })
    }

    #[inline]
    pub fn view(&self) -> &MemoryView {
        &self.view
    }

    #[inline]
    pub fn ptr(&self) -> u32 {
        self.view.ptr()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.view.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    /// Free the block. Consumes the view so it cannot be freed twice.
    pub fn release<M: VmModule + ?Sized>(self, module: &mut M) -> Result<()> {
        module.free(self.view.ptr())?;
        Ok(())
    }
}
