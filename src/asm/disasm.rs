//! Disassembler for SM213 programs.
//!
//! Converts memory images back to readable assembly, walking the variable
//! 2/6-byte instruction lengths from address 0. Bytes that do not decode
//! are rendered as raw `.word` data rather than failing, since an image may
//! mix code and data.

use crate::cpu::decode::{self, Instruction, InstructionWord};

/// Disassemble a single fetched instruction word to text.
pub fn disassemble_instruction(iw: &InstructionWord) -> String {
    match decode::decode(iw) {
        Ok(instr) => format_instruction(&instr),
        Err(_) => format!(".word 0x{:04x}", (iw.raw() >> 32) as u16),
    }
}

/// Disassemble a memory image, one line per instruction:
/// `addr: bytes  text`.
pub fn disassemble(image: &[u8]) -> String {
    let mut output = String::new();
    let mut pos = 0usize;

    while pos < image.len() {
        let (len, text) = disassemble_at(image, pos);
        let bytes: Vec<String> = image[pos..pos + len]
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        output.push_str(&format!("{:04x}: {:<18} {}\n", pos, bytes.join(" "), text));
        pos += len;
    }

    output
}

/// Decode the instruction at `pos`, returning its byte length and text.
///
/// The length follows the fetch rule (6 bytes for opcodes 0x0 and 0xB, else
/// 2), clamped to what the image actually contains.
pub fn disassemble_at(image: &[u8], pos: usize) -> (usize, String) {
    if pos + 2 > image.len() {
        return (
            image.len() - pos,
            format!(".byte 0x{:02x}", image[pos]),
        );
    }

    let byte0 = image[pos];
    let byte1 = image[pos + 1];

    if decode::opcode_has_extension(byte0 >> 4) {
        if pos + 6 > image.len() {
            // Truncated extension word; show the header as data.
            return (2, format!(".word 0x{:02x}{:02x}", byte0, byte1));
        }
        let ext = u32::from_be_bytes([
            image[pos + 2],
            image[pos + 3],
            image[pos + 4],
            image[pos + 5],
        ]);
        let iw = InstructionWord::from_parts(byte0, byte1, ext);
        return (6, disassemble_instruction(&iw));
    }

    let iw = InstructionWord::from_parts(byte0, byte1, 0);
    (2, disassemble_instruction(&iw))
}

/// Format a decoded instruction as assembly text.
pub fn format_instruction(instr: &Instruction) -> String {
    match *instr {
        Instruction::LoadImm { value, dst } => format!("ld $0x{:x}, r{}", value, dst),
        Instruction::LoadOffset { offset, base, dst } => {
            format!("ld {}(r{}), r{}", offset, base, dst)
        }
        Instruction::LoadIndexed { base, index, dst } => {
            format!("ld (r{}, r{}, 4), r{}", base, index, dst)
        }
        Instruction::StoreOffset { src, offset, base } => {
            format!("st r{}, {}(r{})", src, offset, base)
        }
        Instruction::StoreIndexed { src, base, index } => {
            format!("st r{}, (r{}, r{}, 4)", src, base, index)
        }
        Instruction::Mov { src, dst } => format!("mov r{}, r{}", src, dst),
        Instruction::Add { src, dst } => format!("add r{}, r{}", src, dst),
        Instruction::And { src, dst } => format!("and r{}, r{}", src, dst),
        Instruction::Inc { reg } => format!("inc r{}", reg),
        Instruction::Inca { reg } => format!("inca r{}", reg),
        Instruction::Dec { reg } => format!("dec r{}", reg),
        Instruction::Deca { reg } => format!("deca r{}", reg),
        Instruction::Not { reg } => format!("not r{}", reg),
        Instruction::Shift { reg, amount } => {
            if amount >= 0 {
                format!("shl ${}, r{}", amount, reg)
            } else {
                format!("shr ${}, r{}", -(amount as i32), reg)
            }
        }
        Instruction::Halt => "halt".to_string(),
        Instruction::Nop => "nop".to_string(),
    }
}
