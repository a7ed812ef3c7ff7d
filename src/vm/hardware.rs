//! Fixed properties of the emulated hardware.
//!
//! Surface geometries are checked against what the VM reports, never taken on
//! trust: a mismatch means host and VM disagree on the protocol.

/// CPU clock rate in Hz.
pub const CLOCK_HZ: u32 = 4_194_304;

/// CPU cycles per display refresh (154 lines x 456 dots).
pub const CYCLES_PER_FRAME: u32 = 70_224;

/// Byte length of the CPU register block (AF, BC, DE, HL, SP, PC; low byte first).
pub const CPU_REGISTERS_LEN: u32 = 12;

/// Byte length of the MMU view (the whole 16-bit address space).
pub const MMU_LEN: u32 = 0x1_0000;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Geometry {
    pub width: u16,
    pub height: u16,
}

impl Geometry {
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    pub const fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pixel surfaces the VM exposes as matrix views.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Surface {
    Screen,
    Background,
    Window,
    Sprites,
    Patterns,
}

impl Surface {
    pub const ALL: [Surface; 5] = [
        Surface::Screen,
        Surface::Background,
        Surface::Window,
        Surface::Sprites,
        Surface::Patterns,
    ];

    pub const fn geometry(self) -> Geometry {
        match self {
            Surface::Screen => Geometry::new(160, 144),
            Surface::Background => Geometry::new(256, 256),
            Surface::Window => Geometry::new(256, 256),
            // Composited in background coordinates.
            Surface::Sprites => Geometry::new(256, 256),
            // 384 tiles of 8x8, 32 tiles per row.
            Surface::Patterns => Geometry::new(256, 96),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Surface::Screen => "screen",
            Surface::Background => "background",
            Surface::Window => "window",
            Surface::Sprites => "sprites",
            Surface::Patterns => "patterns",
        }
    }
}
