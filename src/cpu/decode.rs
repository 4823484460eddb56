//! Instruction decoder for the SM213.
//!
//! Instructions are 2 bytes, except opcodes 0x0 and 0xB which carry a 4-byte
//! big-endian extension word for a total of 6 bytes. The header splits into
//! four nibbles:
//!
//! - byte 0: opcode (high), op0 (low)
//! - byte 1: op1 (high), op2 (low); byte 1 reinterpreted as `i8` is the
//!   signed immediate used by the shift instruction

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Opcode values (the high nibble of the first instruction byte).
struct Opcode;

impl Opcode {
    const LOAD_IMM: u8 = 0x0;
    const LOAD_OFFSET: u8 = 0x1;
    const LOAD_INDEXED: u8 = 0x2;
    const STORE_OFFSET: u8 = 0x3;
    const STORE_INDEXED: u8 = 0x4;
    const ALU: u8 = 0x6;
    const SHIFT: u8 = 0x7;
    // Reserved for the absolute jump of the full instruction set; still a
    // 6-byte encoding, but decoding it is an error here.
    const RESERVED_JUMP: u8 = 0xB;
    const MISC: u8 = 0xF;
}

/// ALU sub-operations (the op0 nibble under opcode 0x6).
struct AluOp;

impl AluOp {
    const MOV: u8 = 0x0;
    const ADD: u8 = 0x1;
    const AND: u8 = 0x2;
    const INC: u8 = 0x3;
    const INCA: u8 = 0x4;
    const DEC: u8 = 0x5;
    const DECA: u8 = 0x6;
    const NOT: u8 = 0x7;
}

/// A fetched instruction word with its fields extracted.
///
/// This is the machine's instruction register: the raw header nibbles, the
/// byte-1 immediate, and the extension word (0 when the opcode has none).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionWord {
    /// High nibble of byte 0.
    pub opcode: u8,
    /// Low nibble of byte 0.
    pub op0: u8,
    /// High nibble of byte 1.
    pub op1: u8,
    /// Low nibble of byte 1.
    pub op2: u8,
    /// Byte 1 reinterpreted as a signed 8-bit value.
    pub imm: i8,
    /// 32-bit big-endian extension word (opcodes 0x0 and 0xB only).
    pub ext: u32,
}

impl InstructionWord {
    /// Split two header bytes (and an already-fetched extension word) into
    /// instruction fields.
    pub fn from_parts(byte0: u8, byte1: u8, ext: u32) -> Self {
        Self {
            opcode: byte0 >> 4,
            op0: byte0 & 0x0f,
            op1: byte1 >> 4,
            op2: byte1 & 0x0f,
            imm: byte1 as i8,
            ext,
        }
    }

    /// True if this opcode is followed by a 4-byte extension word.
    pub fn has_extension(&self) -> bool {
        opcode_has_extension(self.opcode)
    }

    /// Encoded length in bytes: 6 with an extension word, 2 without.
    pub fn byte_len(&self) -> u32 {
        if self.has_extension() {
            6
        } else {
            2
        }
    }

    /// The packed instruction-register value: byte 0 in bits 47-40, byte 1
    /// in bits 39-32, the extension word in bits 31-0.
    pub fn raw(&self) -> u64 {
        let byte0 = ((self.opcode << 4) | self.op0) as u64;
        let byte1 = ((self.op1 << 4) | self.op2) as u64;
        (byte0 << 40) | (byte1 << 32) | self.ext as u64
    }
}

/// True if the given opcode nibble is followed by an extension word.
pub fn opcode_has_extension(opcode: u8) -> bool {
    opcode == Opcode::LOAD_IMM || opcode == Opcode::RESERVED_JUMP
}

/// A decoded SM213 instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    // ==================== Loads ====================

    /// Load immediate `ld $v, rd`: rd := v
    LoadImm { value: u32, dst: u8 },

    /// Load base+offset `ld o(rs), rd`: rd := mem[rs + o]
    LoadOffset { offset: u8, base: u8, dst: u8 },

    /// Load indexed `ld (rs, ri, 4), rd`: rd := mem[rs + ri*4]
    LoadIndexed { base: u8, index: u8, dst: u8 },

    // ==================== Stores ====================

    /// Store base+offset `st rs, o(rd)`: mem[rd + o] := rs
    StoreOffset { src: u8, offset: u8, base: u8 },

    /// Store indexed `st rs, (rd, ri, 4)`: mem[rd + ri*4] := rs
    StoreIndexed { src: u8, base: u8, index: u8 },

    // ==================== ALU ====================

    /// Register move `mov rs, rd`: rd := rs
    Mov { src: u8, dst: u8 },

    /// Add `add rs, rd`: rd := rd + rs (wrapping)
    Add { src: u8, dst: u8 },

    /// Bitwise and `and rs, rd`: rd := rd & rs
    And { src: u8, dst: u8 },

    /// Increment `inc rd`: rd := rd + 1
    Inc { reg: u8 },

    /// Increment by 4 `inca rd`: rd := rd + 4
    Inca { reg: u8 },

    /// Decrement `dec rd`: rd := rd - 1
    Dec { reg: u8 },

    /// Decrement by 4 `deca rd`: rd := rd - 4
    Deca { reg: u8 },

    /// Bitwise complement `not rd`: rd := !rd
    Not { reg: u8 },

    // ==================== Shifts ====================

    /// Shift `shl $i, rd` / `shr $i, rd`. Positive amounts shift left;
    /// negative amounts shift right arithmetically by the magnitude.
    Shift { reg: u8, amount: i8 },

    // ==================== Control ====================

    /// Stop the machine.
    Halt,

    /// No operation.
    Nop,
}

/// Decode a fetched instruction word to an [`Instruction`].
pub fn decode(iw: &InstructionWord) -> Result<Instruction, DecodeError> {
    let instr = match iw.opcode {
        Opcode::LOAD_IMM => Instruction::LoadImm {
            value: iw.ext,
            dst: iw.op0,
        },
        Opcode::LOAD_OFFSET => Instruction::LoadOffset {
            offset: iw.op0 << 2,
            base: iw.op1,
            dst: iw.op2,
        },
        Opcode::LOAD_INDEXED => Instruction::LoadIndexed {
            base: iw.op0,
            index: iw.op1,
            dst: iw.op2,
        },
        Opcode::STORE_OFFSET => Instruction::StoreOffset {
            src: iw.op0,
            offset: iw.op1 << 2,
            base: iw.op2,
        },
        Opcode::STORE_INDEXED => Instruction::StoreIndexed {
            src: iw.op0,
            base: iw.op1,
            index: iw.op2,
        },
        Opcode::ALU => match iw.op0 {
            AluOp::MOV => Instruction::Mov {
                src: iw.op1,
                dst: iw.op2,
            },
            AluOp::ADD => Instruction::Add {
                src: iw.op1,
                dst: iw.op2,
            },
            AluOp::AND => Instruction::And {
                src: iw.op1,
                dst: iw.op2,
            },
            AluOp::INC => Instruction::Inc { reg: iw.op2 },
            AluOp::INCA => Instruction::Inca { reg: iw.op2 },
            AluOp::DEC => Instruction::Dec { reg: iw.op2 },
            AluOp::DECA => Instruction::Deca { reg: iw.op2 },
            AluOp::NOT => Instruction::Not { reg: iw.op2 },
            op => return Err(DecodeError::IllegalAluOp(op)),
        },
        Opcode::SHIFT => Instruction::Shift {
            reg: iw.op0,
            amount: iw.imm,
        },
        // f0-- halts; any other op0 under 0xF is a don't-care encoding that
        // executes as a no-op (the documented nop is ff00).
        Opcode::MISC => {
            if iw.op0 == 0 {
                Instruction::Halt
            } else {
                Instruction::Nop
            }
        }
        op => return Err(DecodeError::IllegalOpcode(op)),
    };

    Ok(instr)
}

/// Encode an instruction to its byte form (2 or 6 bytes).
///
/// Register fields are masked to 4 bits and offsets to their encodable
/// range; the assembler validates ranges before constructing instructions.
pub fn encode(instr: &Instruction) -> Vec<u8> {
    match *instr {
        Instruction::LoadImm { value, dst } => {
            let mut bytes = vec![(Opcode::LOAD_IMM << 4) | (dst & 0x0f), 0x00];
            bytes.extend_from_slice(&value.to_be_bytes());
            bytes
        }
        Instruction::LoadOffset { offset, base, dst } => vec![
            (Opcode::LOAD_OFFSET << 4) | ((offset >> 2) & 0x0f),
            ((base & 0x0f) << 4) | (dst & 0x0f),
        ],
        Instruction::LoadIndexed { base, index, dst } => vec![
            (Opcode::LOAD_INDEXED << 4) | (base & 0x0f),
            ((index & 0x0f) << 4) | (dst & 0x0f),
        ],
        Instruction::StoreOffset { src, offset, base } => vec![
            (Opcode::STORE_OFFSET << 4) | (src & 0x0f),
            (((offset >> 2) & 0x0f) << 4) | (base & 0x0f),
        ],
        Instruction::StoreIndexed { src, base, index } => vec![
            (Opcode::STORE_INDEXED << 4) | (src & 0x0f),
            ((base & 0x0f) << 4) | (index & 0x0f),
        ],
        Instruction::Mov { src, dst } => alu_bytes(AluOp::MOV, src, dst),
        Instruction::Add { src, dst } => alu_bytes(AluOp::ADD, src, dst),
        Instruction::And { src, dst } => alu_bytes(AluOp::AND, src, dst),
        Instruction::Inc { reg } => alu_bytes(AluOp::INC, 0, reg),
        Instruction::Inca { reg } => alu_bytes(AluOp::INCA, 0, reg),
        Instruction::Dec { reg } => alu_bytes(AluOp::DEC, 0, reg),
        Instruction::Deca { reg } => alu_bytes(AluOp::DECA, 0, reg),
        Instruction::Not { reg } => alu_bytes(AluOp::NOT, 0, reg),
        Instruction::Shift { reg, amount } => vec![
            (Opcode::SHIFT << 4) | (reg & 0x0f),
            amount as u8,
        ],
        Instruction::Halt => vec![(Opcode::MISC << 4), 0x00],
        Instruction::Nop => vec![(Opcode::MISC << 4) | 0x0f, 0x00],
    }
}

fn alu_bytes(op: u8, src: u8, dst: u8) -> Vec<u8> {
    vec![
        (Opcode::ALU << 4) | (op & 0x0f),
        ((src & 0x0f) << 4) | (dst & 0x0f),
    ]
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The opcode nibble names no implemented instruction.
    #[error("illegal opcode {0:#x}")]
    IllegalOpcode(u8),

    /// Opcode 0x6 with an undefined ALU sub-operation.
    #[error("illegal ALU operation {0:#x}")]
    IllegalAluOp(u8),
}
