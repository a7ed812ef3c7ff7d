/*!
Host-side disassembly of a cartridge image.

`Disassembly` decodes straight from the raw ROM bytes, one instruction per
iterator step, starting at offset 0. The sequence is:
- lazy: nothing is decoded until the iterator is advanced;
- finite: it ends at the end of the image, on an instruction whose operands
  run past the end, or on the first opcode the CPU does not implement;
- restartable: every call to `iter` decodes again from the start.

Text format: mnemonic, then each operand preceded by a single space. Hex is
upper-case `$NN` / `$NNNN`; memory operands are parenthesized and high-page
accesses read `($FF00+$NN)` / `($FF00+C)`.
*/

pub mod table;

use std::rc::Rc;

use table::{CB_PREFIX, OPCODES, Opcode, Operand, cb_opcode};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    /// Offset of the first byte within the cartridge image.
    pub address: u32,
    pub text: String,
    /// Encoded length in bytes.
    pub len: u8,
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${:04X}  {}", self.address, self.text)
    }
}

/// Decode the instruction at the start of `bytes`.
///
/// Returns `(text, len)`, or `None` if the opcode is undefined or the
/// instruction does not fit in `bytes`.
pub fn decode(bytes: &[u8]) -> Option<(String, u8)> {
    let (&op, rest) = bytes.split_first()?;
    let opcode: Opcode = if op == CB_PREFIX {
        cb_opcode(*rest.first()?)
    } else {
        OPCODES[op as usize]?
    };
    if bytes.len() < opcode.len as usize {
        return None;
    }

    let mut text = String::from(opcode.mnemonic);
    let mut imm = &bytes[1..opcode.len as usize];
    for operand in opcode.operands.into_iter().flatten() {
        let (rendered, rest) = render_operand(operand, imm);
        imm = rest;
        text.push(' ');
        text.push_str(&rendered);
    }
    Some((text, opcode.len))
}

/// Format one operand, consuming its immediate bytes from `imm`.
fn render_operand(operand: Operand, imm: &[u8]) -> (String, &[u8]) {
    let (value, rest) = imm.split_at(operand.width() as usize);
    let rendered = match operand {
        Operand::Text(s) => s.to_string(),
        Operand::Indirect(s) => format!("({s})"),
        Operand::HighC => "($FF00+C)".to_string(),
        Operand::Imm8 => format!("${:02X}", value[0]),
        Operand::High8 => format!("($FF00+${:02X})", value[0]),
        Operand::Imm16 => format!("${:04X}", u16::from_le_bytes([value[0], value[1]])),
        Operand::Addr16 => format!("(${:04X})", u16::from_le_bytes([value[0], value[1]])),
    };
    (rendered, rest)
}

/// Restartable disassembly of one cartridge image.
#[derive(Clone, Debug)]
pub struct Disassembly {
    image: Rc<[u8]>,
}

impl Disassembly {
    pub fn new(image: impl Into<Rc<[u8]>>) -> Self {
        Self {
            image: image.into(),
        }
    }

    pub fn image(&self) -> &[u8] {
        &self.image
    }

    /// Decode from offset 0.
    pub fn iter(&self) -> Instructions<'_> {
        self.iter_from(0)
    }

    /// Decode from an arbitrary offset, e.g. the 0x100 entry point.
    pub fn iter_from(&self, offset: u32) -> Instructions<'_> {
        Instructions {
            image: &self.image,
            offset,
            done: false,
        }
    }
}

impl<'a> IntoIterator for &'a Disassembly {
    type Item = Instruction;
    type IntoIter = Instructions<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct Instructions<'a> {
    image: &'a [u8],
    offset: u32,
    done: bool,
}

impl Iterator for Instructions<'_> {
    type Item = Instruction;

    fn next(&mut self) -> Option<Instruction> {
        if self.done {
            return None;
        }
        let rest = self.image.get(self.offset as usize..).unwrap_or(&[]);
        match decode(rest) {
            Some((text, len)) => {
                let address = self.offset;
                self.offset += len as u32;
                Some(Instruction { address, text, len })
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

impl std::iter::FusedIterator for Instructions<'_> {}
