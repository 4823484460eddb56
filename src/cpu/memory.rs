//! SM213 main memory.
//!
//! A flat, byte-addressable store. 32-bit integer accesses cover 4
//! consecutive bytes in big-endian order. The data path (load and store
//! instructions) requires 4-byte alignment; instruction fetch reads its
//! extension word through the unaligned path, because the extension of a
//! 6-byte instruction sits at header+2.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Default memory size in bytes (64 KiB).
pub const DEFAULT_SIZE: usize = 0x1_0000;

/// Byte-addressable main memory.
#[derive(Clone, Serialize, Deserialize)]
pub struct Memory {
    bytes: Vec<u8>,
}

impl Memory {
    /// Create a zeroed memory of [`DEFAULT_SIZE`] bytes.
    pub fn new() -> Self {
        Self::with_size(DEFAULT_SIZE)
    }

    /// Create a zeroed memory of the given size in bytes.
    pub fn with_size(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
        }
    }

    /// Total size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bounds-check an access of `len` bytes starting at `addr`.
    fn range(&self, addr: u32, len: u32) -> Result<std::ops::Range<usize>, MemoryError> {
        let start = addr as usize;
        let end = start + len as usize;
        if end > self.bytes.len() {
            return Err(MemoryError::OutOfRange {
                addr,
                len,
                size: self.bytes.len(),
            });
        }
        Ok(start..end)
    }

    /// Read a single byte.
    pub fn read_byte(&self, addr: u32) -> Result<u8, MemoryError> {
        let range = self.range(addr, 1)?;
        Ok(self.bytes[range.start])
    }

    /// Write a single byte.
    pub fn write_byte(&mut self, addr: u32, value: u8) -> Result<(), MemoryError> {
        let range = self.range(addr, 1)?;
        self.bytes[range.start] = value;
        Ok(())
    }

    /// Read `len` consecutive bytes starting at `addr`.
    pub fn read_bytes(&self, addr: u32, len: u32) -> Result<&[u8], MemoryError> {
        let range = self.range(addr, len)?;
        Ok(&self.bytes[range])
    }

    /// Write a run of bytes starting at `addr`.
    pub fn write_bytes(&mut self, addr: u32, bytes: &[u8]) -> Result<(), MemoryError> {
        let range = self.range(addr, bytes.len() as u32)?;
        self.bytes[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Read a 32-bit integer, big-endian. The address must be 4-byte
    /// aligned; this is the path load instructions use.
    pub fn read_int(&self, addr: u32) -> Result<i32, MemoryError> {
        if addr % 4 != 0 {
            return Err(MemoryError::Misaligned { addr });
        }
        self.read_int_unaligned(addr)
    }

    /// Read a 32-bit integer, big-endian, with no alignment requirement.
    /// Instruction fetch uses this for the extension word.
    pub fn read_int_unaligned(&self, addr: u32) -> Result<i32, MemoryError> {
        let range = self.range(addr, 4)?;
        let b = &self.bytes[range];
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Write a 32-bit integer, big-endian. The address must be 4-byte
    /// aligned; this is the path store instructions use.
    pub fn write_int(&mut self, addr: u32, value: i32) -> Result<(), MemoryError> {
        if addr % 4 != 0 {
            return Err(MemoryError::Misaligned { addr });
        }
        let range = self.range(addr, 4)?;
        self.bytes[range].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Zero the whole memory.
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    /// Load a program image starting at the given address.
    pub fn load_image(&mut self, start: u32, image: &[u8]) -> Result<(), MemoryError> {
        let available = self.bytes.len().saturating_sub(start as usize);
        if image.len() > available {
            return Err(MemoryError::ImageTooLarge {
                size: image.len(),
                available,
            });
        }
        self.write_bytes(start, image)
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Dumping 64 KiB into Debug output helps nobody; show a summary.
        let non_zero = self.bytes.iter().filter(|b| **b != 0).count();
        f.debug_struct("Memory")
            .field("size", &self.bytes.len())
            .field("non_zero_bytes", &non_zero)
            .finish()
    }
}

/// Errors raised by memory accesses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// The access runs past the end of memory.
    #[error("address {addr:#010x}+{len} outside memory of {size} bytes")]
    OutOfRange { addr: u32, len: u32, size: usize },

    /// A 4-byte data access at an address that is not a multiple of 4.
    #[error("misaligned 4-byte access at address {addr:#010x}")]
    Misaligned { addr: u32 },

    /// A program image does not fit in memory.
    #[error("image of {size} bytes exceeds available space of {available} bytes")]
    ImageTooLarge { size: usize, available: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_read_write() {
        let mut mem = Memory::new();

        mem.write_int(0x100, 0x1234_5678).unwrap();
        assert_eq!(mem.read_int(0x100).unwrap(), 0x1234_5678);
    }

    #[test]
    fn test_int_is_big_endian() {
        let mut mem = Memory::new();
        mem.write_int(0, 0x0102_0304).unwrap();

        assert_eq!(mem.read_byte(0).unwrap(), 0x01);
        assert_eq!(mem.read_byte(1).unwrap(), 0x02);
        assert_eq!(mem.read_byte(2).unwrap(), 0x03);
        assert_eq!(mem.read_byte(3).unwrap(), 0x04);
    }

    #[test]
    fn test_negative_int_roundtrip() {
        let mut mem = Memory::new();
        mem.write_int(8, -4).unwrap();

        assert_eq!(mem.read_int(8).unwrap(), -4);
        assert_eq!(mem.read_byte(8).unwrap(), 0xff);
    }

    #[test]
    fn test_bounds() {
        let mem = Memory::with_size(16);

        assert!(mem.read_byte(15).is_ok());
        assert!(mem.read_byte(16).is_err());
        assert!(mem.read_int(12).is_ok());
        assert!(matches!(
            mem.read_int_unaligned(13),
            Err(MemoryError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_alignment() {
        let mut mem = Memory::new();

        assert!(matches!(
            mem.read_int(0x102),
            Err(MemoryError::Misaligned { addr: 0x102 })
        ));
        assert!(matches!(
            mem.write_int(0x103, 1),
            Err(MemoryError::Misaligned { addr: 0x103 })
        ));
        // The fetch path has no alignment requirement.
        assert!(mem.read_int_unaligned(0x102).is_ok());
    }

    #[test]
    fn test_load_image() {
        let mut mem = Memory::with_size(8);

        mem.load_image(2, &[1, 2, 3]).unwrap();
        assert_eq!(mem.read_bytes(2, 3).unwrap(), &[1, 2, 3]);

        assert!(matches!(
            mem.load_image(6, &[1, 2, 3]),
            Err(MemoryError::ImageTooLarge {
                size: 3,
                available: 2
            })
        ));
    }

    #[test]
    fn test_clear() {
        let mut mem = Memory::with_size(8);
        mem.write_byte(3, 0xaa).unwrap();

        mem.clear();

        assert_eq!(mem.read_byte(3).unwrap(), 0);
    }
}
