//! CPU emulation for the SM213 "Simple Machine".
//!
//! This module implements the complete SM213 teaching architecture:
//! - byte-addressable big-endian memory
//! - 8 general-purpose 32-bit registers plus a program counter
//! - 2- and 6-byte instruction encodings covering loads, stores, ALU
//!   operations, shifts, and halt

pub mod memory;
pub mod registers;
pub mod decode;
pub mod execute;

pub use memory::{Memory, MemoryError};
pub use registers::{Registers, RegisterError};
pub use decode::{Instruction, InstructionWord, DecodeError};
pub use execute::{Cpu, CpuError, CpuState, CycleOutcome, Signal};
