//! Registry value (vk) parsing and data extraction.

use crate::cell::ValueType;
use crate::error::{RegistryError, Result};
use crate::utils::{read_ascii_string, read_i32_le, read_u16_le, read_u32_le, read_utf16_string};
use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// Bit set on the raw on-disk data-size field when the value's data is
/// stored inline in the `data_offset` field rather than at a separate cell.
const INLINE_DATA_FLAG: u32 = 0x8000_0000;

/// Value key (vk) structure.
///
/// Represents a registry value with its name, type, and data.
#[derive(Debug, Clone)]
pub struct ValueKey {
    /// Length of value name.
    pub name_length: u16,

    /// Length of value data, in bytes, with the inline-storage flag
    /// cleared.
    pub data_length: u32,

    /// Raw on-disk data-size field, MSB included. Needed to tell inline
    /// storage apart from an on-disk data cell of exactly the same
    /// reported length.
    pub data_size_raw: u32,

    /// Offset to value data, or (when inline) the 4 raw bytes of inline
    /// data themselves.
    pub data_offset: u32,

    /// Value data type.
    pub data_type: ValueType,

    /// Flags (0x0001 = name is ASCII).
    pub flags: u16,

    /// Value name.
    pub name: String,
}

impl ValueKey {
    /// Parses a value key from cell data.
    ///
    /// # Arguments
    ///
    /// * `data` - Cell data (excluding size field, starting with "vk" signature).
    /// * `offset` - Offset of this cell for error reporting.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is malformed or truncated.
    pub fn parse(data: &[u8], offset: u32) -> Result<Self> {
        if data.len() < 20 {
            return Err(RegistryError::short_read(offset, 20, data.len()));
        }

        // Verify signature
        if &data[0..2] != b"vk" {
            return Err(RegistryError::invalid_signature(b"vk", &data[0..2], offset));
        }

        let name_length = read_u16_le(data, 0x02)?;

        // Data size is stored as a signed 32-bit value; the MSB marks
        // inline storage and must be kept around (not just masked off) so
        // is_inline_data()/inline_data() can recover it later.
        let data_size_raw = read_i32_le(data, 0x04)? as u32;
        let data_length = data_size_raw & !INLINE_DATA_FLAG;

        let data_offset = read_u32_le(data, 0x08)?;
        let data_type_raw = read_u32_le(data, 0x0C)?;
        let data_type = ValueType::from_u32(data_type_raw);
        let flags = read_u16_le(data, 0x10)?;

        // Spare field at 0x12 (2 bytes) - unused

        // Value name starts at offset 0x14
        let name = if name_length > 0 {
            let name_end = 0x14 + name_length as usize;
            if name_end > data.len() {
                return Err(RegistryError::short_read(offset, name_end, data.len()));
            }

            let name_data = &data[0x14..name_end];

            // Check if name is ASCII (flag 0x0001)
            if (flags & 0x0001) != 0 {
                read_ascii_string(name_data)
            } else {
                read_utf16_string(name_data, offset)?
            }
        } else {
            // Default value (unnamed) - use lowercase to match regipy convention
            String::from("(default)")
        };

        Ok(ValueKey {
            name_length,
            data_length,
            data_size_raw,
            data_offset,
            data_type,
            flags,
            name,
        })
    }

    /// Returns true if the data is stored inline (in the data_offset field)
    /// rather than at a separate cell.
    ///
    /// Inline storage is signalled by the MSB of the raw on-disk data-size
    /// field, not by the decoded length being small: a zero-length value
    /// can also be marked inline.
    pub fn is_inline_data(&self) -> bool {
        self.data_size_raw & INLINE_DATA_FLAG != 0
    }

    /// Extracts inline data.
    ///
    /// The effective length is the low byte of the raw data-size field,
    /// clamped to one of {0, 1, 2, 4}, and the effective bytes are the
    /// *last* N bytes of `data_offset`'s 4-byte on-disk representation, not
    /// the first N: a 1-byte inline value's single byte sits in the
    /// highest-order position the on-disk field would occupy, because the
    /// 4-byte field was originally meant to be read back apos;as-isapos;
    /// rather than reinterpreted by length.
    pub fn inline_data(&self) -> Vec<u8> {
        let raw_len = (self.data_length & 0xFF) as usize;
        let len = match raw_len {
            0 | 1 | 2 => raw_len,
            _ => 4,
        };
        let bytes = self.data_offset.to_le_bytes();
        bytes[4 - len..].to_vec()
    }
}

/// Parsed registry value data.
#[derive(Debug, Clone)]
pub enum ValueData {
    /// No data.
    None,

    /// String value.
    String(String),

    /// Expandable string value.
    ExpandString(String),

    /// Symbolic link to another key, stored as a string path.
    Link(String),

    /// Binary data.
    Binary(Vec<u8>),

    /// 32-bit integer.
    Dword(u32),

    /// 32-bit big-endian integer.
    DwordBigEndian(u32),

    /// Multiple strings.
    MultiString(Vec<String>),

    /// 64-bit integer.
    Qword(u64),

    /// Unknown or unsupported type, kept as its raw bytes.
    Unknown(Vec<u8>),
}

impl ValueData {
    /// Parses value data based on the value type.
    ///
    /// # Arguments
    ///
    /// * `data` - Raw value data bytes.
    /// * `value_type` - Type of the value.
    /// * `offset` - Offset for error reporting.
    pub fn parse(data: &[u8], value_type: ValueType, offset: u32) -> Result<Self> {
        if data.is_empty() {
            return Ok(ValueData::None);
        }

        match value_type {
            ValueType::None => Ok(ValueData::None),

            ValueType::String | ValueType::ExpandString | ValueType::Link => {
                let s = read_utf16_string(data, offset)?;
                match value_type {
                    ValueType::String => Ok(ValueData::String(s)),
                    ValueType::ExpandString => Ok(ValueData::ExpandString(s)),
                    _ => Ok(ValueData::Link(s)),
                }
            }

            ValueType::Binary => Ok(ValueData::Binary(data.to_vec())),

            ValueType::Dword => {
                if data.len() < 4 {
                    return Err(RegistryError::short_read(offset, 4, data.len()));
                }
                let mut cursor = Cursor::new(data);
                let value = cursor.read_u32::<LittleEndian>()?;
                Ok(ValueData::Dword(value))
            }

            ValueType::DwordBigEndian => {
                if data.len() < 4 {
                    return Err(RegistryError::short_read(offset, 4, data.len()));
                }
                let mut cursor = Cursor::new(data);
                let value = cursor.read_u32::<BigEndian>()?;
                Ok(ValueData::DwordBigEndian(value))
            }

            ValueType::Qword => {
                if data.len() < 8 {
                    return Err(RegistryError::short_read(offset, 8, data.len()));
                }
                let mut cursor = Cursor::new(data);
                let value = cursor.read_u64::<LittleEndian>()?;
                Ok(ValueData::Qword(value))
            }

            ValueType::MultiString => {
                let full_string = read_utf16_string(data, offset)?;
                // Only the trailing empty string produced by the final
                // double-NUL terminator is dropped; embedded empty strings
                // between two NULs are legitimate entries and must survive.
                let mut strings: Vec<String> =
                    full_string.split('\0').map(|s| s.to_string()).collect();
                if strings.last().map(|s| s.is_empty()).unwrap_or(false) {
                    strings.pop();
                }
                Ok(ValueData::MultiString(strings))
            }

            // For other known-but-unhandled or entirely unrecognized types,
            // keep the raw bytes so callers can still retrieve them via
            // get_binary/get_value.
            ValueType::ResourceList
            | ValueType::FullResourceDescriptor
            | ValueType::ResourceRequirementsList
            | ValueType::Unknown(_) => Ok(ValueData::Unknown(data.to_vec())),
        }
    }

    /// Converts the value data to a string representation.
    pub fn to_string(&self) -> String {
        match self {
            ValueData::None => String::from("(none)"),
            ValueData::String(s) | ValueData::ExpandString(s) | ValueData::Link(s) => s.clone(),
            ValueData::Binary(b) => format!("{:02X?}", b),
            ValueData::Dword(d) => format!("{} (0x{:08X})", d, d),
            ValueData::DwordBigEndian(d) => format!("{} (0x{:08X})", d, d),
            ValueData::Qword(q) => format!("{} (0x{:016X})", q, q),
            ValueData::MultiString(strings) => strings.join(", "),
            ValueData::Unknown(b) => format!("{:02X?}", b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_key_minimum_size() {
        let data = vec![0u8; 19];
        let result = ValueKey::parse(&data, 0);
        assert!(result.is_err());
    }

    #[test]
    fn test_value_key_invalid_signature() {
        let mut data = vec![0u8; 24];
        data[0..2].copy_from_slice(b"XX");
        let result = ValueKey::parse(&data, 0);
        assert!(result.is_err());
    }

    #[test]
    fn test_inline_data_dword() {
        let mut data = vec![0u8; 24];
        data[0..2].copy_from_slice(b"vk");
        // Raw data-size: inline flag set, low byte = 4 (full DWORD).
        data[4..8].copy_from_slice(&(INLINE_DATA_FLAG | 4).to_le_bytes());
        // data_offset holds the inline payload directly.
        data[8..12].copy_from_slice(&[0x01, 0x02, 0x03, 0x04]);

        let vk = ValueKey::parse(&data, 0).unwrap();
        assert!(vk.is_inline_data());
        assert_eq!(vk.inline_data(), vec![0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_inline_data_single_byte_uses_last_byte() {
        let mut data = vec![0u8; 24];
        data[0..2].copy_from_slice(b"vk");
        data[4..8].copy_from_slice(&(INLINE_DATA_FLAG | 1).to_le_bytes());
        data[8..12].copy_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD]);

        let vk = ValueKey::parse(&data, 0).unwrap();
        assert!(vk.is_inline_data());
        // Last byte of the little-endian on-disk representation, not the first.
        assert_eq!(vk.inline_data(), vec![0xDD]);
    }

    #[test]
    fn test_non_inline_data_not_flagged() {
        let mut data = vec![0u8; 24];
        data[0..2].copy_from_slice(b"vk");
        data[4..8].copy_from_slice(&100u32.to_le_bytes());
        let vk = ValueKey::parse(&data, 0).unwrap();
        assert!(!vk.is_inline_data());
        assert_eq!(vk.data_length, 100);
    }

    #[test]
    fn test_link_decodes_as_string_not_raw_bytes() {
        let mut bytes = Vec::new();
        for ch in "\\REGISTRY\\Machine\\System".chars() {
            bytes.extend_from_slice(&(ch as u16).to_le_bytes());
        }
        let parsed = ValueData::parse(&bytes, ValueType::Link, 0).unwrap();
        match parsed {
            ValueData::Link(s) => assert_eq!(s, "\\REGISTRY\\Machine\\System"),
            other => panic!("expected Link, got {:?}", other),
        }
    }

    #[test]
    fn test_multi_string_keeps_embedded_empty_strings() {
        // "a\0\0b\0\0" -> ["a", "", "b"] (only trailing empty dropped)
        let mut bytes = Vec::new();
        for ch in ['a', '\0', '\0', 'b', '\0', '\0'] {
            bytes.extend_from_slice(&(ch as u16).to_le_bytes());
        }
        let parsed = ValueData::parse(&bytes, ValueType::MultiString, 0).unwrap();
        match parsed {
            ValueData::MultiString(strings) => {
                assert_eq!(strings, vec!["a".to_string(), "".to_string(), "b".to_string()]);
            }
            _ => panic!("expected MultiString"),
        }
    }
}
