//! Utility module
//!
//! This module provides common utilities and helper functions used
//! throughout the library.

use std::fmt;

use crate::core::{Error, Result};

/// Space separated lowercase hex, e.g. `62 10 f4`
pub struct HexBytes<'a>(pub &'a [u8]);

impl fmt::Display for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Formats bytes lazily for logs and dumps
pub fn hex_bytes(bytes: &[u8]) -> HexBytes<'_> {
    HexBytes(bytes)
}

/// Parses hex typed by a human; whitespace and `:` separators are ignored
pub fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    hex::decode(&compact).map_err(|e| Error::protocol(format!("Invalid hex {:?}: {}", text, e)))
}
