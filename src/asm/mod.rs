//! Assembler and disassembler for SM213 programs.
//!
//! This module provides:
//! - A two-pass assembler (text -> memory image bytes)
//! - A disassembler (memory image -> readable text)
//! - The text file format for memory images

pub mod assembler;
pub mod disasm;
pub mod image;

pub use assembler::{assemble, AssemblerError};
pub use disasm::{disassemble, format_instruction};
pub use image::{Image, ImageError, load_image, save_image};
