//! # SM213 Emulator
//!
//! An emulator of the SM213 "Simple Machine" teaching computer.
//!
//! The SM213 is a small instruction-set architecture used to teach how
//! hardware executes software: 8 general-purpose 32-bit registers, a program
//! counter, byte-addressable big-endian memory, and a compact instruction
//! encoding of 2 or 6 bytes. This crate implements the fetch/decode/execute
//! core together with an assembler, a disassembler, a memory-image file
//! format, and an interactive debugger.

pub mod cpu;
pub mod asm;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export commonly used types
pub use cpu::{Cpu, CpuState, CpuError, CycleOutcome, Memory, Registers, Instruction};
pub use asm::{assemble, disassemble, AssemblerError, Image, load_image, save_image};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
