//! SM213 CPU registers.
//!
//! The register file holds:
//! - r0-r7: 32-bit two's-complement general-purpose registers
//! - PC: program counter, an unsigned byte address into memory
//!
//! Instruction operand fields are 4 bits wide, so an encoding can name
//! registers 8-15 that do not exist; all access goes through [`Registers::get`]
//! and [`Registers::set`], which report those as a [`RegisterError`].

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Number of general-purpose registers.
pub const NUM_GPRS: usize = 8;

/// The SM213 register file: r0-r7 plus the program counter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    gpr: [i32; NUM_GPRS],
    pc: u32,
}

impl Registers {
    /// Create a register file with all registers zeroed.
    pub fn new() -> Self {
        Self {
            gpr: [0; NUM_GPRS],
            pc: 0,
        }
    }

    /// Read a general-purpose register by index (0-7).
    pub fn get(&self, r: u8) -> Result<i32, RegisterError> {
        self.gpr
            .get(r as usize)
            .copied()
            .ok_or(RegisterError::OutOfRange { index: r })
    }

    /// Write a general-purpose register by index (0-7).
    pub fn set(&mut self, r: u8, value: i32) -> Result<(), RegisterError> {
        let slot = self
            .gpr
            .get_mut(r as usize)
            .ok_or(RegisterError::OutOfRange { index: r })?;
        *slot = value;
        Ok(())
    }

    /// The program counter.
    pub fn pc(&self) -> u32 {
        self.pc
    }

    /// Set the program counter to an absolute byte address.
    pub fn set_pc(&mut self, pc: u32) {
        self.pc = pc;
    }

    /// Read-only view of all general-purpose registers, for display.
    pub fn gpr(&self) -> &[i32; NUM_GPRS] {
        &self.gpr
    }

    /// Reset all registers and the PC to zero.
    pub fn reset(&mut self) {
        self.gpr = [0; NUM_GPRS];
        self.pc = 0;
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors raised by register access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegisterError {
    /// An operand field named a register outside r0-r7.
    #[error("register r{index} out of range (r0-r7)")]
    OutOfRange { index: u8 },
}
