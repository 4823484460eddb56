//! Memory image file format for SM213 programs.
//!
//! A simple text format:
//! - Each data line is `ADDR: XX XX ...` (hex address, hex bytes)
//! - Lines starting with `#` are comments
//! - Blank lines are ignored
//! - All-zero rows are omitted when saving; memory is zeroed before a load,
//!   so the gaps are implied

use std::path::Path;
use thiserror::Error;

/// Bytes per data row when formatting.
const ROW_LEN: usize = 16;

/// A loaded memory image: flat bytes starting at address 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Image {
    /// The image bytes.
    pub bytes: Vec<u8>,
}

impl Image {
    /// Create a new empty image.
    pub fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Parse image text into an [`Image`].
pub fn parse_image(text: &str) -> Result<Image, ImageError> {
    let mut image = Image::new();

    for (line_num, line) in text.lines().enumerate() {
        let line = match line.find('#') {
            Some(idx) => &line[..idx],
            None => line,
        };
        let line = line.trim();

        if line.is_empty() {
            continue;
        }

        let (addr_part, data_part) = line.split_once(':').ok_or_else(|| {
            ImageError::ParseError {
                line: line_num + 1,
                message: "expected 'ADDR: bytes...'".to_string(),
            }
        })?;

        let addr = parse_hex_u32(addr_part.trim()).ok_or_else(|| ImageError::ParseError {
            line: line_num + 1,
            message: format!("invalid address '{}'", addr_part.trim()),
        })? as usize;

        let mut offset = addr;
        for token in data_part.split_whitespace() {
            let byte = u8::from_str_radix(token, 16).map_err(|_| ImageError::ParseError {
                line: line_num + 1,
                message: format!("invalid byte '{}'", token),
            })?;
            if offset >= image.bytes.len() {
                image.bytes.resize(offset + 1, 0);
            }
            image.bytes[offset] = byte;
            offset += 1;
        }
    }

    Ok(image)
}

/// Format bytes as image text, skipping all-zero rows.
pub fn format_image(bytes: &[u8]) -> String {
    let mut output = String::new();
    output.push_str("# SM213 memory image\n");
    output.push_str(&format!("# {} bytes\n\n", bytes.len()));

    for (row, chunk) in bytes.chunks(ROW_LEN).enumerate() {
        if chunk.iter().all(|b| *b == 0) {
            continue;
        }
        let hex: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
        output.push_str(&format!("{:04x}: {}\n", row * ROW_LEN, hex.join(" ")));
    }

    output
}

/// Load an image file from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<Image, ImageError> {
    let text = std::fs::read_to_string(path.as_ref())
        .map_err(|e| ImageError::IoError(e.to_string()))?;
    parse_image(&text)
}

/// Save bytes as an image file.
pub fn save_image<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<(), ImageError> {
    std::fs::write(path.as_ref(), format_image(bytes))
        .map_err(|e| ImageError::IoError(e.to_string()))
}

fn parse_hex_u32(token: &str) -> Option<u32> {
    let token = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")).unwrap_or(token);
    u32::from_str_radix(token, 16).ok()
}

/// Errors that can occur reading or writing image files.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error on line {line}: {message}")]
    ParseError { line: usize, message: String },
}
