/*!
table.rs - SM83 opcode table.

Purpose
=======
Maps each of the 256 primary opcodes to a static `Opcode` descriptor
(mnemonic, operand kinds, encoded length). `0xCB`-prefixed opcodes are decoded
separately by `cb_opcode`, since their meaning depends on the second byte.

Design
------
- `OPCODES: [Option<Opcode>; 256]` is built at compile time from the usual
  `x/y/z/p/q` field split of the opcode byte.
- `None` marks the eleven opcodes the CPU does not implement
  (D3 DB DD E3 E4 EB EC ED F4 FC FD).
- Immediate operands are described by kind only; the decoder in `mod.rs`
  fetches and formats the bytes.
*/

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    /// Register, condition, bit index or fixed restart vector.
    Text(&'static str),
    /// Register used as a memory address: `(HL)`.
    Indirect(&'static str),
    /// `($FF00+C)`.
    HighC,
    /// 8-bit immediate `$NN` (also relative jump offsets, shown raw).
    Imm8,
    /// 16-bit immediate `$NNNN`.
    Imm16,
    /// 16-bit immediate used as a memory address: `($NNNN)`.
    Addr16,
    /// 8-bit immediate offset into the high page: `($FF00+$NN)`.
    High8,
}

impl Operand {
    /// Operand bytes following the opcode.
    pub const fn width(self) -> u8 {
        match self {
            Operand::Imm8 | Operand::High8 => 1,
            Operand::Imm16 | Operand::Addr16 => 2,
            Operand::Text(_) | Operand::Indirect(_) | Operand::HighC => 0,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Opcode {
    pub mnemonic: &'static str,
    pub operands: [Option<Operand>; 2],
    /// Encoded length in bytes, opcode included.
    pub len: u8,
}

impl Opcode {
    const fn new(mnemonic: &'static str, a: Option<Operand>, b: Option<Operand>) -> Self {
        let mut len = 1;
        if let Some(op) = a {
            len += op.width();
        }
        if let Some(op) = b {
            len += op.width();
        }
        Self {
            mnemonic,
            operands: [a, b],
            len,
        }
    }

    const fn bare(mnemonic: &'static str) -> Self {
        Self::new(mnemonic, None, None)
    }

    const fn unary(mnemonic: &'static str, a: Operand) -> Self {
        Self::new(mnemonic, Some(a), None)
    }

    const fn binary(mnemonic: &'static str, a: Operand, b: Operand) -> Self {
        Self::new(mnemonic, Some(a), Some(b))
    }

    const fn with_len(mut self, len: u8) -> Self {
        self.len = len;
        self
    }
}

pub const CB_PREFIX: u8 = 0xCB;

const R8: [&str; 8] = ["B", "C", "D", "E", "H", "L", "(HL)", "A"];
const RP: [&str; 4] = ["BC", "DE", "HL", "SP"];
const RP2: [&str; 4] = ["BC", "DE", "HL", "AF"];
const CC: [&str; 4] = ["NZ", "Z", "NC", "C"];
const ALU: [&str; 8] = ["ADD", "ADC", "SUB", "SBC", "AND", "XOR", "OR", "CP"];
const ROT: [&str; 8] = ["RLC", "RRC", "RL", "RR", "SLA", "SRA", "SWAP", "SRL"];
const ACC_ROT: [&str; 8] = ["RLCA", "RRCA", "RLA", "RRA", "DAA", "CPL", "SCF", "CCF"];
const RST: [&str; 8] = ["$00", "$08", "$10", "$18", "$20", "$28", "$30", "$38"];
const BITS: [&str; 8] = ["0", "1", "2", "3", "4", "5", "6", "7"];

const fn r8(index: u8) -> Operand {
    if index == 6 {
        Operand::Indirect("HL")
    } else {
        Operand::Text(R8[index as usize])
    }
}

const fn text(s: &'static str) -> Operand {
    Operand::Text(s)
}

const A: Operand = Operand::Text("A");
const HL: Operand = Operand::Text("HL");
const SP: Operand = Operand::Text("SP");

const fn decode(op: u8) -> Option<Opcode> {
    let x = op >> 6;
    let y = (op >> 3) & 7;
    let z = op & 7;
    let p = (y >> 1) as usize;
    let q = y & 1;

    let opcode = match (x, z) {
        (0, 0) => match y {
            0 => Opcode::bare("NOP"),
            1 => Opcode::binary("LD", Operand::Addr16, SP),
            // STOP carries a padding byte.
            2 => Opcode::bare("STOP").with_len(2),
            3 => Opcode::unary("JR", Operand::Imm8),
            _ => Opcode::binary("JR", text(CC[(y - 4) as usize]), Operand::Imm8),
        },
        (0, 1) if q == 0 => Opcode::binary("LD", text(RP[p]), Operand::Imm16),
        (0, 1) => Opcode::binary("ADD", HL, text(RP[p])),
        (0, 2) => {
            let (mnemonic, addr) = match p {
                0 => ("LD", Operand::Indirect("BC")),
                1 => ("LD", Operand::Indirect("DE")),
                2 => ("LDI", Operand::Indirect("HL")),
                _ => ("LDD", Operand::Indirect("HL")),
            };
            if q == 0 {
                Opcode::binary(mnemonic, addr, A)
            } else {
                Opcode::binary(mnemonic, A, addr)
            }
        }
        (0, 3) if q == 0 => Opcode::unary("INC", text(RP[p])),
        (0, 3) => Opcode::unary("DEC", text(RP[p])),
        (0, 4) => Opcode::unary("INC", r8(y)),
        (0, 5) => Opcode::unary("DEC", r8(y)),
        (0, 6) => Opcode::binary("LD", r8(y), Operand::Imm8),
        (0, _) => Opcode::bare(ACC_ROT[y as usize]),

        (1, _) if y == 6 && z == 6 => Opcode::bare("HALT"),
        (1, _) => Opcode::binary("LD", r8(y), r8(z)),

        (2, _) => Opcode::binary(ALU[y as usize], A, r8(z)),

        (_, 0) => match y {
            0..=3 => Opcode::unary("RET", text(CC[y as usize])),
            4 => Opcode::binary("LDH", Operand::High8, A),
            5 => Opcode::binary("ADD", SP, Operand::Imm8),
            6 => Opcode::binary("LDH", A, Operand::High8),
            _ => Opcode::binary("LDHL", SP, Operand::Imm8),
        },
        (_, 1) if q == 0 => Opcode::unary("POP", text(RP2[p])),
        (_, 1) => match p {
            0 => Opcode::bare("RET"),
            1 => Opcode::bare("RETI"),
            2 => Opcode::unary("JP", Operand::Indirect("HL")),
            _ => Opcode::binary("LD", SP, HL),
        },
        (_, 2) => match y {
            0..=3 => Opcode::binary("JP", text(CC[y as usize]), Operand::Imm16),
            4 => Opcode::binary("LD", Operand::HighC, A),
            5 => Opcode::binary("LD", Operand::Addr16, A),
            6 => Opcode::binary("LD", A, Operand::HighC),
            _ => Opcode::binary("LD", A, Operand::Addr16),
        },
        (_, 3) => match y {
            0 => Opcode::unary("JP", Operand::Imm16),
            // Real length depends on the second byte; see `cb_opcode`.
            1 => Opcode::bare("PREFIX").with_len(2),
            6 => Opcode::bare("DI"),
            7 => Opcode::bare("EI"),
            _ => return None,
        },
        (_, 4) => match y {
            0..=3 => Opcode::binary("CALL", text(CC[y as usize]), Operand::Imm16),
            _ => return None,
        },
        (_, 5) if q == 0 => Opcode::unary("PUSH", text(RP2[p])),
        (_, 5) => match p {
            0 => Opcode::unary("CALL", Operand::Imm16),
            _ => return None,
        },
        (_, 6) => Opcode::binary(ALU[y as usize], A, Operand::Imm8),
        _ => Opcode::unary("RST", text(RST[y as usize])),
    };
    Some(opcode)
}

const fn build_table() -> [Option<Opcode>; 256] {
    let mut table = [None; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = decode(i as u8);
        i += 1;
    }
    table
}

pub static OPCODES: [Option<Opcode>; 256] = build_table();

/// Decode the byte following a `0xCB` prefix. Every value is defined.
pub const fn cb_opcode(op: u8) -> Opcode {
    let y = (op >> 3) & 7;
    let z = op & 7;
    let opcode = match op >> 6 {
        0 => Opcode::unary(ROT[y as usize], r8(z)),
        1 => Opcode::binary("BIT", text(BITS[y as usize]), r8(z)),
        2 => Opcode::binary("RES", text(BITS[y as usize]), r8(z)),
        _ => Opcode::binary("SET", text(BITS[y as usize]), r8(z)),
    };
    opcode.with_len(2)
}
