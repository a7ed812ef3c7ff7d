/*!
Cartridge header inspection.

Reads the fixed header every Game Boy ROM carries at 0x0100..0x0150:
- 0x0134..0x0144: title, upper-case ASCII padded with NULs
- 0x0147: cartridge kind (memory bank controller and extras)
- 0x0148: ROM size code, `32 KiB << code`
- 0x0149: external RAM size code
- 0x014D: header checksum over 0x0134..=0x014C

Notes:
- This is informational. The VM alone decides whether an image is accepted;
  a header that parses here can still be rejected by `load` and vice versa.
- Unknown size codes parse fine and report `None` sizes.
*/

use std::fmt;

use thiserror::Error;

const TITLE: std::ops::Range<usize> = 0x134..0x144;
const KIND: usize = 0x147;
const ROM_SIZE: usize = 0x148;
const RAM_SIZE: usize = 0x149;
const CHECKSUM: usize = 0x14D;
const CHECKSUMMED: std::ops::RangeInclusive<usize> = 0x134..=0x14C;

/// Smallest image that contains the whole header.
pub const HEADER_END: usize = 0x150;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("image too short for a cartridge header ({len} bytes)")]
    TooShort { len: usize },
    #[error("header checksum mismatch (stored {stored:#04X}, computed {computed:#04X})")]
    BadChecksum { stored: u8, computed: u8 },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CartridgeKind {
    RomOnly,
    Mbc1,
    Mbc2,
    Mbc3,
    Mbc5,
    Other(u8),
}

impl CartridgeKind {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x00 => CartridgeKind::RomOnly,
            0x01..=0x03 => CartridgeKind::Mbc1,
            0x05 | 0x06 => CartridgeKind::Mbc2,
            0x0F..=0x13 => CartridgeKind::Mbc3,
            0x19..=0x1E => CartridgeKind::Mbc5,
            other => CartridgeKind::Other(other),
        }
    }
}

impl fmt::Display for CartridgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CartridgeKind::RomOnly => f.write_str("ROM only"),
            CartridgeKind::Mbc1 => f.write_str("MBC1"),
            CartridgeKind::Mbc2 => f.write_str("MBC2"),
            CartridgeKind::Mbc3 => f.write_str("MBC3"),
            CartridgeKind::Mbc5 => f.write_str("MBC5"),
            CartridgeKind::Other(code) => write!(f, "type {code:#04X}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CartridgeHeader {
    pub title: String,
    pub kind: CartridgeKind,
    pub kind_code: u8,
    pub rom_size_code: u8,
    pub ram_size_code: u8,
    /// Total ROM size, if the size code is known.
    pub rom_bytes: Option<usize>,
    /// External RAM size, if the size code is known.
    pub ram_bytes: Option<usize>,
    pub checksum: u8,
}

impl CartridgeHeader {
    /// Parse and checksum-verify the header of a ROM image.
    pub fn parse(rom: &[u8]) -> Result<Self, HeaderError> {
        if rom.len() < HEADER_END {
            return Err(HeaderError::TooShort { len: rom.len() });
        }

        let computed = header_checksum(rom);
        let stored = rom[CHECKSUM];
        if stored != computed {
            return Err(HeaderError::BadChecksum { stored, computed });
        }

        let title = rom[TITLE]
            .iter()
            .take_while(|b| **b != 0)
            .filter(|b| b.is_ascii_graphic() || **b == b' ')
            .map(|b| *b as char)
            .collect::<String>()
            .trim_end()
            .to_string();

        let rom_size_code = rom[ROM_SIZE];
        let ram_size_code = rom[RAM_SIZE];
        Ok(Self {
            title,
            kind: CartridgeKind::from_code(rom[KIND]),
            kind_code: rom[KIND],
            rom_size_code,
            ram_size_code,
            rom_bytes: rom_bytes(rom_size_code),
            ram_bytes: ram_bytes(ram_size_code),
            checksum: stored,
        })
    }

    /// Whether the cartridge kind includes battery-backed RAM.
    pub fn has_battery(&self) -> bool {
        matches!(
            self.kind_code,
            0x03 | 0x06 | 0x09 | 0x0D | 0x0F | 0x10 | 0x13 | 0x1B | 0x1E | 0xFF
        )
    }
}

impl fmt::Display for CartridgeHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kib = |bytes: Option<usize>| match bytes {
            Some(b) => format!("{} KiB", b / 1024),
            None => "unknown".to_string(),
        };
        writeln!(f, "title:    {}", self.title)?;
        writeln!(f, "kind:     {}", self.kind)?;
        writeln!(f, "rom:      {}", kib(self.rom_bytes))?;
        write!(f, "ram:      {}", kib(self.ram_bytes))
    }
}

/// Header checksum over 0x0134..=0x014C, as the boot ROM computes it.
pub fn header_checksum(rom: &[u8]) -> u8 {
    rom[CHECKSUMMED]
        .iter()
        .fold(0u8, |acc, b| acc.wrapping_sub(*b).wrapping_sub(1))
}

fn rom_bytes(code: u8) -> Option<usize> {
    (code <= 8).then(|| (32 * 1024) << code)
}

fn ram_bytes(code: u8) -> Option<usize> {
    match code {
        0 => Some(0),
        1 => Some(2 * 1024),
        2 => Some(8 * 1024),
        3 => Some(32 * 1024),
        4 => Some(128 * 1024),
        5 => Some(64 * 1024),
        _ => None,
    }
}
