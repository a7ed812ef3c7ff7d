/*!
Input state protocol for the eight Game Boy buttons.

Behavior:
- Button states form one byte held by the VM. The bit layout is part of the
  wire contract with the VM and never changes:
    bit 0..7 = Right, Left, Up, Down, A, B, Select, Start
- Press sets the button's bit, release clears it. Both are idempotent: pressing
  an already-pressed button changes nothing.
- The VM answers every press/release with the resulting byte. That answer is
  the authoritative state; the host never predicts it locally. Several input
  sources (keyboard, pointer, touch) may race on the same button, and only the
  VM's answer reflects the order the VM actually applied.
- `release_all` clears every bit at once; hosts call it when focus is lost so no
  key stays stuck down.

The VM-facing calls live on [`VmHandle`](crate::vm::VmHandle); this module
only defines the button set and the mask type.
*/

use bitflags::bitflags;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Button {
    Right,
    Left,
    Up,
    Down,
    A,
    B,
    Select,
    Start,
}

impl Button {
    pub const ALL: [Button; 8] = [
        Button::Right,
        Button::Left,
        Button::Up,
        Button::Down,
        Button::A,
        Button::B,
        Button::Select,
        Button::Start,
    ];

    /// Bit index of this button in the input byte.
    #[inline]
    pub fn bit(self) -> u8 {
        match self {
            Button::Right => 0,
            Button::Left => 1,
            Button::Up => 2,
            Button::Down => 3,
            Button::A => 4,
            Button::B => 5,
            Button::Select => 6,
            Button::Start => 7,
        }
    }

    #[inline]
    pub fn mask(self) -> InputMask {
        InputMask::from_bits_retain(1 << self.bit())
    }

    /// Parse a lowercase button name ("right", "a", "start", ...).
    pub fn from_name(name: &str) -> Option<Button> {
        Button::ALL.into_iter().find(|b| b.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Button::Right => "right",
            Button::Left => "left",
            Button::Up => "up",
            Button::Down => "down",
            Button::A => "a",
            Button::B => "b",
            Button::Select => "select",
            Button::Start => "start",
        }
    }
}

bitflags! {
    /// Button states as recorded by the VM. Bit set = pressed.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct InputMask: u8 {
        const RIGHT = 1 << 0;
        const LEFT = 1 << 1;
        const UP = 1 << 2;
        const DOWN = 1 << 3;
        const A = 1 << 4;
        const B = 1 << 5;
        const SELECT = 1 << 6;
        const START = 1 << 7;
    }
}

impl InputMask {
    #[inline]
    pub fn is_pressed(self, button: Button) -> bool {
        self.contains(button.mask())
    }

    /// Buttons currently held, in bit order.
    pub fn pressed(self) -> impl Iterator<Item = Button> {
        Button::ALL.into_iter().filter(move |b| self.is_pressed(*b))
    }
}

impl From<Button> for InputMask {
    fn from(button: Button) -> Self {
        button.mask()
    }
}
