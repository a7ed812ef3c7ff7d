/*!
Rectangular views (screen, background, window, sprites, patterns).

A `MatrixView` is a `MemoryView` whose length is always `width * height`,
laid out row-major with one byte (a shade index) per pixel.
*/

use crate::memory::arena::LinearMemory;
use crate::memory::view::MemoryView;

#[derive(Debug)]
pub struct MatrixView {
    view: MemoryView,
    width: u16,
    height: u16,
}

impl MatrixView {
    pub fn new(memory: &LinearMemory, ptr: u32, width: u16, height: u16) -> Self {
        let len = width as u32 * height as u32;
        Self {
            view: MemoryView::new(memory, ptr, len),
            width,
            height,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width as usize
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height as usize
    }

    #[inline]
    pub fn view(&self) -> &MemoryView {
        &self.view
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.view.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    /// Pixel at column `x`, row `y`.
    pub fn get(&self, x: usize, y: usize) -> Option<u8> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        self.view.get(y * self.width() + x)
    }

    /// Copy out row `y`.
    pub fn row(&self, y: usize) -> Option<Vec<u8>> {
        if y >= self.height() {
            return None;
        }
        let w = self.width();
        Some(self.view.with(|bytes| bytes[y * w..(y + 1) * w].to_vec()))
    }

    pub fn with<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        self.view.with(f)
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.view.to_vec()
    }
}
