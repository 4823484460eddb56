//! Assembler for SM213 programs.
//!
//! Syntax:
//! ```text
//! # Comment
//! start:               # define a label
//!     ld $100, r0      # load immediate (also: ld $start, r0)
//!     ld 4(r0), r1     # load base + offset
//!     ld (r0, r1, 4), r2
//!     add r1, r2       # ALU: mov/add/and rs, rd; inc/inca/dec/deca/not rd
//!     st r2, 8(r0)
//!     shl $2, r2       # shifts: shl/shr $i, rd
//!     halt
//!
//!     .pos 0x100       # set the location counter
//! val: .long 42        # emit a 32-bit big-endian word
//! ```
//!
//! Offsets must be multiples of 4 in 0-60, shift counts 0-127, registers
//! r0-r7. Label references are allowed wherever a 32-bit value fits: `ld $`
//! immediates and `.long` words. Forward references are resolved in a
//! second pass.

use crate::cpu::decode::{encode, Instruction};
use std::collections::HashMap;
use thiserror::Error;

/// Assemble source code to a memory image starting at address 0.
pub fn assemble(source: &str) -> Result<Vec<u8>, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// A memory operand: either base+offset or base+scaled-index.
enum MemRef {
    Offset { offset: u8, base: u8 },
    Indexed { base: u8, index: u8 },
}

/// The assembler state.
struct Assembler {
    /// Symbol table (label -> address).
    symbols: HashMap<String, u32>,
    /// Pending label references (byte offset of a 32-bit field, label,
    /// source line).
    pending: Vec<(usize, String, usize)>,
    /// Output image; the location counter is its length.
    output: Vec<u8>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            symbols: HashMap::new(),
            pending: Vec::new(),
            output: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Vec<u8>, AssemblerError> {
        // Pass 1: collect labels and generate code
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        // Pass 2: resolve forward references
        self.resolve_references()?;

        Ok(self.output.clone())
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        // Remove comments
        let line = match line.find('#') {
            Some(idx) => &line[..idx],
            None => line,
        };
        let line = line.trim();

        if line.is_empty() {
            return Ok(());
        }

        // Check for a label definition
        if let Some(colon_idx) = line.find(':') {
            let label = line[..colon_idx].trim();
            if label.is_empty() || label.contains(char::is_whitespace) {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("invalid label '{}'", &line[..colon_idx]),
                });
            }
            self.symbols.insert(label.to_string(), self.output.len() as u32);

            // Process the rest of the line if any
            let rest = line[colon_idx + 1..].trim();
            if !rest.is_empty() {
                return self.process_instruction(rest, line_num);
            }
            return Ok(());
        }

        self.process_instruction(line, line_num)
    }

    fn process_instruction(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let (mnemonic, rest) = match line.split_once(char::is_whitespace) {
            Some((m, r)) => (m, r.trim()),
            None => (line, ""),
        };
        let mnemonic = mnemonic.to_lowercase();
        let operands = split_operands(rest);

        match mnemonic.as_str() {
            // Directives
            ".pos" => {
                expect_operands(&operands, 1, &mnemonic, line_num)?;
                let addr = parse_value(&operands[0], line_num)?;
                if addr < 0 || addr > u32::MAX as i64 {
                    return Err(AssemblerError::ValueOutOfRange {
                        line: line_num,
                        value: addr,
                    });
                }
                if (addr as usize) < self.output.len() {
                    return Err(AssemblerError::PosOverlap {
                        line: line_num,
                        addr: addr as u32,
                    });
                }
                self.output.resize(addr as usize, 0);
            }

            ".long" => {
                expect_operands(&operands, 1, &mnemonic, line_num)?;
                let value = self.parse_imm32(&operands[0], self.output.len(), line_num)?;
                self.output.extend_from_slice(&value.to_be_bytes());
            }

            // Instructions
            _ => {
                let instr = self.parse_instruction(&mnemonic, &operands, line_num)?;
                let bytes = encode(&instr);
                self.output.extend_from_slice(&bytes);
            }
        }

        Ok(())
    }

    fn parse_instruction(
        &mut self,
        mnemonic: &str,
        operands: &[String],
        line_num: usize,
    ) -> Result<Instruction, AssemblerError> {
        let instr = match mnemonic {
            "ld" => {
                expect_operands(operands, 2, mnemonic, line_num)?;
                if let Some(imm) = operands[0].strip_prefix('$') {
                    // The extension word sits 2 bytes past the header.
                    let value = self.parse_imm32(imm, self.output.len() + 2, line_num)?;
                    let dst = parse_register(&operands[1], line_num)?;
                    Instruction::LoadImm { value, dst }
                } else {
                    let dst = parse_register(&operands[1], line_num)?;
                    match parse_mem_operand(&operands[0], line_num)? {
                        MemRef::Offset { offset, base } => {
                            Instruction::LoadOffset { offset, base, dst }
                        }
                        MemRef::Indexed { base, index } => {
                            Instruction::LoadIndexed { base, index, dst }
                        }
                    }
                }
            }

            "st" => {
                expect_operands(operands, 2, mnemonic, line_num)?;
                let src = parse_register(&operands[0], line_num)?;
                match parse_mem_operand(&operands[1], line_num)? {
                    MemRef::Offset { offset, base } => {
                        Instruction::StoreOffset { src, offset, base }
                    }
                    MemRef::Indexed { base, index } => {
                        Instruction::StoreIndexed { src, base, index }
                    }
                }
            }

            "mov" | "add" | "and" => {
                expect_operands(operands, 2, mnemonic, line_num)?;
                let src = parse_register(&operands[0], line_num)?;
                let dst = parse_register(&operands[1], line_num)?;
                match mnemonic {
                    "mov" => Instruction::Mov { src, dst },
                    "add" => Instruction::Add { src, dst },
                    _ => Instruction::And { src, dst },
                }
            }

            "inc" | "inca" | "dec" | "deca" | "not" => {
                expect_operands(operands, 1, mnemonic, line_num)?;
                let reg = parse_register(&operands[0], line_num)?;
                match mnemonic {
                    "inc" => Instruction::Inc { reg },
                    "inca" => Instruction::Inca { reg },
                    "dec" => Instruction::Dec { reg },
                    "deca" => Instruction::Deca { reg },
                    _ => Instruction::Not { reg },
                }
            }

            "shl" | "shr" => {
                expect_operands(operands, 2, mnemonic, line_num)?;
                let imm = operands[0].strip_prefix('$').ok_or_else(|| {
                    AssemblerError::SyntaxError {
                        line: line_num,
                        message: format!("'{}' expects an immediate count like $2", mnemonic),
                    }
                })?;
                let count = parse_value(imm, line_num)?;
                if !(0..=127).contains(&count) {
                    return Err(AssemblerError::ValueOutOfRange {
                        line: line_num,
                        value: count,
                    });
                }
                let reg = parse_register(&operands[1], line_num)?;
                let amount = if mnemonic == "shr" {
                    -(count as i8)
                } else {
                    count as i8
                };
                Instruction::Shift { reg, amount }
            }

            "halt" => {
                expect_operands(operands, 0, mnemonic, line_num)?;
                Instruction::Halt
            }

            "nop" => {
                expect_operands(operands, 0, mnemonic, line_num)?;
                Instruction::Nop
            }

            _ => {
                return Err(AssemblerError::UnknownMnemonic {
                    line: line_num,
                    mnemonic: mnemonic.to_string(),
                })
            }
        };

        Ok(instr)
    }

    /// Parse a 32-bit immediate: a numeric literal, or a label to be
    /// patched into `field_offset` in pass 2.
    fn parse_imm32(
        &mut self,
        token: &str,
        field_offset: usize,
        line_num: usize,
    ) -> Result<u32, AssemblerError> {
        let token = token.trim();
        if token.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
            let value = parse_value(token, line_num)?;
            if value < i32::MIN as i64 || value > u32::MAX as i64 {
                return Err(AssemblerError::ValueOutOfRange {
                    line: line_num,
                    value,
                });
            }
            Ok(value as u32)
        } else {
            // Label reference; placeholder until pass 2.
            self.pending.push((field_offset, token.to_string(), line_num));
            Ok(0)
        }
    }

    fn resolve_references(&mut self) -> Result<(), AssemblerError> {
        for (offset, label, line_num) in &self.pending {
            let addr = self
                .symbols
                .get(label)
                .ok_or_else(|| AssemblerError::UndefinedLabel {
                    line: *line_num,
                    label: label.clone(),
                })?;
            self.output[*offset..*offset + 4].copy_from_slice(&addr.to_be_bytes());
        }
        Ok(())
    }
}

/// Split an operand list on commas, ignoring commas inside parentheses.
fn split_operands(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();

    for c in s.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }

    parts
}

fn expect_operands(
    operands: &[String],
    count: usize,
    mnemonic: &str,
    line_num: usize,
) -> Result<(), AssemblerError> {
    if operands.len() != count {
        return Err(AssemblerError::SyntaxError {
            line: line_num,
            message: format!(
                "'{}' expects {} operand(s), found {}",
                mnemonic,
                count,
                operands.len()
            ),
        });
    }
    Ok(())
}

/// Parse `rN` to a register number 0-7.
fn parse_register(token: &str, line_num: usize) -> Result<u8, AssemblerError> {
    token
        .strip_prefix('r')
        .or_else(|| token.strip_prefix('R'))
        .and_then(|n| n.parse::<u8>().ok())
        .filter(|n| *n < 8)
        .ok_or_else(|| AssemblerError::InvalidRegister {
            line: line_num,
            name: token.to_string(),
        })
}

/// Parse a decimal or `0x` hex numeric literal.
fn parse_value(token: &str, line_num: usize) -> Result<i64, AssemblerError> {
    let token = token.trim();
    let parsed = if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map(|v| v as i64)
    } else if let Some(hex) = token.strip_prefix("-0x").or_else(|| token.strip_prefix("-0X")) {
        u32::from_str_radix(hex, 16).map(|v| -(v as i64))
    } else {
        token.parse::<i64>()
    };

    parsed.map_err(|_| AssemblerError::SyntaxError {
        line: line_num,
        message: format!("invalid numeric literal '{}'", token),
    })
}

/// Parse `o(rs)`, `(rs)`, or `(rs, ri, 4)`.
fn parse_mem_operand(operand: &str, line_num: usize) -> Result<MemRef, AssemblerError> {
    if let Some(inner) = operand.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
        match parts.len() {
            1 => Ok(MemRef::Offset {
                offset: 0,
                base: parse_register(parts[0], line_num)?,
            }),
            3 => {
                if parts[2] != "4" {
                    return Err(AssemblerError::SyntaxError {
                        line: line_num,
                        message: format!("index scale must be 4, found '{}'", parts[2]),
                    });
                }
                Ok(MemRef::Indexed {
                    base: parse_register(parts[0], line_num)?,
                    index: parse_register(parts[1], line_num)?,
                })
            }
            _ => Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("malformed memory operand '{}'", operand),
            }),
        }
    } else if let Some(open) = operand.find('(') {
        if !operand.ends_with(')') {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("malformed memory operand '{}'", operand),
            });
        }
        let offset = parse_value(&operand[..open], line_num)?;
        if offset < 0 || offset > 60 || offset % 4 != 0 {
            return Err(AssemblerError::ValueOutOfRange {
                line: line_num,
                value: offset,
            });
        }
        let base = parse_register(&operand[open + 1..operand.len() - 1], line_num)?;
        Ok(MemRef::Offset {
            offset: offset as u8,
            base,
        })
    } else {
        Err(AssemblerError::SyntaxError {
            line: line_num,
            message: format!("expected a memory operand, found '{}'", operand),
        })
    }
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: i64 },

    #[error("invalid register on line {line}: {name}")]
    InvalidRegister { line: usize, name: String },

    #[error(".pos on line {line} moves backwards to {addr:#x}")]
    PosOverlap { line: usize, addr: u32 },
}
