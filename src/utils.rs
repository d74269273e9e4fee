//! Utility functions for binary parsing and string conversion.

use crate::error::{RegistryError, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use encoding_rs::UTF_16LE;
use std::io::Cursor;

/// Offset where hive bins start (after base block)
pub const HBIN_START_OFFSET: u32 = 0x1000;

/// Reads an ASCII string from a byte slice, trimming null terminators.
///
/// Registry strings are often null-terminated, so we trim trailing nulls.
/// Uses lossy conversion to handle any invalid UTF-8 bytes gracefully.
pub fn read_ascii_string(data: &[u8]) -> String {
    String::from_utf8_lossy(data)
        .trim_end_matches('\0')
        .to_string()
}

/// Reads a UTF-16LE string from a byte slice, trimming null terminators.
///
/// Registry strings are typically null-terminated. This function decodes
/// UTF-16LE data and removes trailing null characters.
///
/// # Errors
///
/// Returns an error if the data length is not even (UTF-16 requires 2-byte units)
/// or if the UTF-16 decoding fails.
pub fn read_utf16_string(data: &[u8], offset: u32) -> Result<String> {
    if data.is_empty() {
        return Ok(String::new());
    }

    // UTF-16 requires even number of bytes
    if data.len() % 2 != 0 {
        return Err(RegistryError::invalid_utf16(offset));
    }

    let (decoded, _encoding, had_errors) = UTF_16LE.decode(data);

    if had_errors {
        return Err(RegistryError::invalid_utf16(offset));
    }

    // Drop at most one trailing NUL, not a whole run of them: a second
    // trailing NUL is part of the data (e.g. a REG_MULTI_SZ's embedded
    // empty-string terminator), not padding.
    let mut decoded = decoded.into_owned();
    if decoded.ends_with('\0') {
        decoded.pop();
    }
    Ok(decoded)
}

/// Decodes a UTF-16LE string leniently, never failing.
///
/// Used for diagnostic-only fields (such as the base block's embedded file
/// name) where malformed code units should not prevent the hive from
/// opening.
pub fn read_utf16_string_lossy(data: &[u8]) -> String {
    let even_len = data.len() - (data.len() % 2);
    let (decoded, _encoding, _had_errors) = UTF_16LE.decode(&data[..even_len]);
    decoded.trim_end_matches('\0').to_string()
}

/// Reads a fixed-length ASCII string (not null-terminated).
pub fn read_fixed_ascii(data: &[u8], len: usize) -> String {
    data.iter()
        .take(len)
        .map(|&b| if b == 0 { ' ' } else { b as char })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Reads a u32 from a byte slice at the given offset.
pub fn read_u32_le(data: &[u8], offset: usize) -> Result<u32> {
    if offset + 4 > data.len() {
        return Err(RegistryError::short_read(
            offset as u32,
            4,
            data.len().saturating_sub(offset),
        ));
    }

    let mut cursor = Cursor::new(&data[offset..offset + 4]);
    Ok(cursor.read_u32::<LittleEndian>()?)
}

/// Reads a u16 from a byte slice at the given offset.
pub fn read_u16_le(data: &[u8], offset: usize) -> Result<u16> {
    if offset + 2 > data.len() {
        return Err(RegistryError::short_read(
            offset as u32,
            2,
            data.len().saturating_sub(offset),
        ));
    }

    let mut cursor = Cursor::new(&data[offset..offset + 2]);
    Ok(cursor.read_u16::<LittleEndian>()?)
}

/// Reads an i32 from a byte slice at the given offset.
pub fn read_i32_le(data: &[u8], offset: usize) -> Result<i32> {
    if offset + 4 > data.len() {
        return Err(RegistryError::short_read(
            offset as u32,
            4,
            data.len().saturating_sub(offset),
        ));
    }

    let mut cursor = Cursor::new(&data[offset..offset + 4]);
    Ok(cursor.read_i32::<LittleEndian>()?)
}

/// Calculates XOR checksum for the first 508 bytes of the base block.
pub fn calculate_checksum(data: &[u8]) -> u32 {
    let mut checksum: u32 = 0;

    // XOR all DWORDs except the checksum field itself (at offset 0x1FC)
    for i in (0..0x1FC).step_by(4) {
        if i + 4 <= data.len() {
            if let Ok(dword) = read_u32_le(data, i) {
                checksum ^= dword;
            }
        }
    }

    checksum
}

/// Folds a single character the way the hive's name-hash algorithm does:
/// uppercase the first resulting code point, leaving the rest of the
/// decomposition (if any) untouched. Matches the rune-wise `ToUpper` the
/// original tooling applies per character rather than a locale-aware
/// whole-string case fold.
#[inline]
pub fn uppercase_fold(c: char) -> char {
    c.to_uppercase().next().unwrap_or(c)
}

/// Computes the `lh` (hash leaf) name hash: `h = h * 37 + upper(c)` over
/// the name's characters, wrapping on overflow.
///
/// This is the only supported way to pick the right child out of a hash
/// leaf's entries without decoding every candidate child's name.
pub fn lh_hash(name: &str) -> u32 {
    let mut hash: u32 = 0;
    for c in name.chars() {
        let folded = uppercase_fold(c) as u32;
        hash = hash.wrapping_mul(37).wrapping_add(folded);
    }
    hash
}

/// Case-insensitive comparison of registry key/value names, folding each
/// character the same way [`lh_hash`] does.
pub fn names_eq_ignore_case(a: &str, b: &str) -> bool {
    let mut ac = a.chars().map(uppercase_fold);
    let mut bc = b.chars().map(uppercase_fold);
    loop {
        match (ac.next(), bc.next()) {
            (None, None) => return true,
            (Some(x), Some(y)) if x == y => continue,
            _ => return false,
        }
    }
}

/// Converts a relative cell offset to an absolute hive offset.
///
/// Cell offsets in the registry are relative to the first hbin (at 0x1000).
/// This function adds 0x1000 to convert to an absolute offset.
///
/// # Arguments
///
/// * `cell_offset` - Cell offset relative to first hbin
///
/// # Returns
///
/// Returns the absolute offset, or an error if the addition would overflow.
///
/// # Errors
///
/// Returns `RegistryError::BadRegistry` (`InvalidOffset`) if the offset would overflow.
#[inline]
pub fn cell_offset_to_absolute(cell_offset: u32) -> Result<u32> {
    cell_offset
        .checked_add(HBIN_START_OFFSET)
        .ok_or_else(|| RegistryError::invalid_offset(cell_offset, 0))
}

/// Converts an absolute hive offset to a relative cell offset.
///
/// # Arguments
///
/// * `absolute_offset` - Absolute offset from start of hive
///
/// # Returns
///
/// Returns the cell offset relative to first hbin, or an error if the
/// absolute offset is before the hbin start.
///
/// # Errors
///
/// Returns `RegistryError::BadRegistry` (`Malformed`) if the offset is before hbin start.
#[inline]
pub fn absolute_to_cell_offset(absolute_offset: u32) -> Result<u32> {
    if absolute_offset < HBIN_START_OFFSET {
        return Err(RegistryError::malformed(format!(
            "absolute offset {:#x} is before hbin start",
            absolute_offset
        )));
    }
    Ok(absolute_offset - HBIN_START_OFFSET)
}
