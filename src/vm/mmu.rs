/*!
MMU view: the VM's full 16-bit address space as seen by the emulated CPU.

`MMU_SEGMENTS` is a static map of the regions presentation layers colorize.
It carries no runtime state; ends are inclusive.
*/

use crate::memory::MemoryView;
use crate::vm::hardware::MMU_LEN;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub start: u16,
    pub end: u16,
    pub name: &'static str,
}

impl Segment {
    #[inline]
    pub fn contains(&self, addr: u16) -> bool {
        (self.start..=self.end).contains(&addr)
    }

    #[inline]
    pub fn len(&self) -> usize {
        (self.end - self.start) as usize + 1
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }
}

pub const MMU_SEGMENTS: [Segment; 5] = [
    Segment {
        start: 0x8000,
        end: 0x9FFF,
        name: "vram",
    },
    Segment {
        start: 0xC000,
        end: 0xDFFF,
        name: "ram",
    },
    Segment {
        start: 0xFE00,
        end: 0xFE9F,
        name: "oam",
    },
    Segment {
        start: 0xFF00,
        end: 0xFF4B,
        name: "io",
    },
    Segment {
        start: 0xFF80,
        end: 0xFFFE,
        name: "himem",
    },
];

/// Segment containing `addr`, if any.
pub fn segment_of(addr: u16) -> Option<&'static Segment> {
    MMU_SEGMENTS.iter().find(|s| s.contains(addr))
}

#[derive(Debug)]
pub struct MmuView {
    view: MemoryView,
}

impl MmuView {
    /// Wrap an address-space view. Panics unless it spans all 64 KiB.
    pub fn new(view: MemoryView) -> Self {
        assert_eq!(view.len(), MMU_LEN as usize, "mmu view has unexpected length");
        Self { view }
    }

    #[inline]
    pub fn view(&self) -> &MemoryView {
        &self.view
    }

    /// Byte at CPU address `addr`.
    #[inline]
    pub fn read(&self, addr: u16) -> u8 {
        self.view.with(|bytes| bytes[addr as usize])
    }

    /// Copy out the bytes of one segment.
    pub fn segment_bytes(&self, segment: &Segment) -> Vec<u8> {
        self.view
            .with(|bytes| bytes[segment.start as usize..=segment.end as usize].to_vec())
    }
}
