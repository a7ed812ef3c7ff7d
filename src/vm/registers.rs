/*!
registers.rs - typed access to the VM's CPU register block.

Layout (12 bytes, fixed by the emulated CPU):

```text
offset  0   1   2   3   4   5   6   7   8   9   10  11
        F   A   C   B   E   D   L   H   SP.lo   PC.lo
                                            SP.hi   PC.hi
```

Each 16-bit pair is `low + (high << 8)` over adjacent bytes, so AF reads F from
offset 0 and A from offset 1. Values are read live from module memory on every
call; take a `Registers` snapshot to freeze them.
*/

use bitflags::bitflags;

use crate::memory::MemoryView;
use crate::vm::hardware::CPU_REGISTERS_LEN;

bitflags! {
    /// The F register's condition flags. The low nibble is always zero.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct CpuFlags: u8 {
        const ZERO = 0x80;
        const SUBTRACT = 0x40;
        const HALF_CARRY = 0x20;
        const CARRY = 0x10;
    }
}

/// Live view over the CPU register block.
#[derive(Debug)]
pub struct CpuView {
    view: MemoryView,
}

impl CpuView {
    /// Wrap a register-block view. Panics unless it is exactly 12 bytes.
    pub fn new(view: MemoryView) -> Self {
        assert_eq!(
            view.len(),
            CPU_REGISTERS_LEN as usize,
            "cpu register block has unexpected length"
        );
        Self { view }
    }

    #[inline]
    pub fn view(&self) -> &MemoryView {
        &self.view
    }

    #[inline]
    fn pair(&self, offset: usize) -> u16 {
        self.view.with(|raw| raw[offset] as u16 + ((raw[offset + 1] as u16) << 8))
    }

    pub fn af(&self) -> u16 {
        self.pair(0)
    }

    pub fn bc(&self) -> u16 {
        self.pair(2)
    }

    pub fn de(&self) -> u16 {
        self.pair(4)
    }

    pub fn hl(&self) -> u16 {
        self.pair(6)
    }

    pub fn sp(&self) -> u16 {
        self.pair(8)
    }

    pub fn pc(&self) -> u16 {
        self.pair(10)
    }

    pub fn a(&self) -> u8 {
        (self.af() >> 8) as u8
    }

    pub fn f(&self) -> u8 {
        self.af() as u8
    }

    pub fn flags(&self) -> CpuFlags {
        CpuFlags::from_bits_truncate(self.f())
    }

    pub fn snapshot(&self) -> Registers {
        Registers {
            af: self.af(),
            bc: self.bc(),
            de: self.de(),
            hl: self.hl(),
            sp: self.sp(),
            pc: self.pc(),
        }
    }
}

/// Register values copied out at one point in time.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Registers {
    pub af: u16,
    pub bc: u16,
    pub de: u16,
    pub hl: u16,
    pub sp: u16,
    pub pc: u16,
}

impl std::fmt::Display for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "AF={:04X} BC={:04X} DE={:04X} HL={:04X} SP={:04X} PC={:04X}",
            self.af, self.bc, self.de, self.hl, self.sp, self.pc
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::LinearMemory;

    fn cpu_at(mem: &LinearMemory, raw: [u8; 12]) -> CpuView {
        mem.write(0x80, &raw);
        CpuView::new(MemoryView::new(mem, 0x80, 12))
    }

    #[test]
    fn pairs_are_little_endian() {
        let mem = LinearMemory::new(1);
        let cpu = cpu_at(
            &mem,
            [0xB0, 0x01, 0x13, 0x00, 0xD8, 0x00, 0x4D, 0x01, 0xFE, 0xFF, 0x00, 0x01],
        );
        let regs = cpu.snapshot();
        assert_eq!(regs.af, 0x01B0);
        assert_eq!(regs.bc, 0x0013);
        assert_eq!(regs.de, 0x00D8);
        assert_eq!(regs.hl, 0x014D);
        assert_eq!(regs.sp, 0xFFFE);
        assert_eq!(regs.pc, 0x0100);
        assert_eq!(cpu.a(), 0x01);
        assert_eq!(cpu.f(), 0xB0);
        assert_eq!(cpu.flags(), CpuFlags::ZERO | CpuFlags::HALF_CARRY | CpuFlags::CARRY);
        assert_eq!(
            regs.to_string(),
            "AF=01B0 BC=0013 DE=00D8 HL=014D SP=FFFE PC=0100"
        );
    }

    #[test]
    fn reads_are_live() {
        let mem = LinearMemory::new(1);
        let cpu = cpu_at(&mem, [0; 12]);
        assert_eq!(cpu.pc(), 0);
        mem.write(0x80 + 10, &[0x34, 0x12]);
        assert_eq!(cpu.pc(), 0x1234);
    }

    #[test]
    #[should_panic(expected = "unexpected length")]
    fn wrong_block_length_panics() {
        let mem = LinearMemory::new(1);
        let _ = CpuView::new(MemoryView::new(&mem, 0, 10));
    }
}
