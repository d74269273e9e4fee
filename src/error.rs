//! Error types for registry parsing operations.
//!
//! This module provides comprehensive error handling for all registry parsing
//! operations, including I/O errors, format violations, and data corruption.

use std::io;
use thiserror::Error;

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors that can occur during registry parsing.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// I/O error occurred while opening or mapping the hive file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file is not a valid hive, or a structural check failed while
    /// reading past the header (a bad cell signature, a hash that doesn't
    /// match its entry, an offset outside the hive, ...). The first such
    /// failure poisons the operation; it is not retried.
    #[error("bad registry: {cause}")]
    BadRegistry {
        /// The specific structural check that failed.
        cause: BadRegistryCause,
    },

    /// No key or value with the requested name exists.
    #[error("not found: {0}")]
    NotExist(String),

    /// The value exists but is not of the logical type the caller asked for.
    #[error("unexpected type: wanted {wanted}, found {actual_name} ({actual_code})")]
    UnexpectedType {
        /// The logical type the caller requested (e.g. "REG_SZ").
        wanted: &'static str,
        /// The human-readable name of the value's actual type.
        actual_name: String,
        /// The raw REG_* type code of the value's actual type.
        actual_code: u32,
    },

    /// `get_value`'s output buffer is shorter than the required byte count.
    /// No bytes are written when this is returned.
    #[error("short buffer: need {required} bytes, have {available}")]
    ShortBuffer {
        /// Number of bytes the caller must allocate.
        required: usize,
        /// Number of bytes the caller actually supplied.
        available: usize,
        /// The raw REG_* type code of the value.
        type_code: u32,
    },

    /// Internal: an index-based access fell outside the value list.
    /// Surfaced only if ever reached from the public API.
    #[error("index {index} out of bounds for {count} entries")]
    OutOfBounds {
        /// The requested index.
        index: usize,
        /// The number of entries actually available.
        count: usize,
    },

    /// A feature this decoder deliberately does not implement
    /// (big-endian DWORD writes, MUI strings, class-name/security-descriptor
    /// payload access, transaction-log replay, hive versions outside the
    /// validated range).
    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// The specific structural check that failed inside a [`RegistryError::BadRegistry`].
#[derive(Error, Debug)]
pub enum BadRegistryCause {
    /// A magic/signature field did not match its expected value.
    #[error("bad signature: expected {expected:?}, found {found:?} at offset {offset:#x}")]
    BadSignature {
        /// Expected signature bytes.
        expected: Vec<u8>,
        /// Signature bytes actually present.
        found: Vec<u8>,
        /// Offset at which the signature was read.
        offset: u32,
    },

    /// The header's primary and secondary sequence numbers disagree.
    #[error("bad sequence number: primary {primary:#x} != secondary {secondary:#x}")]
    BadSequenceNumber {
        /// Primary sequence number.
        primary: u32,
        /// Secondary sequence number.
        secondary: u32,
    },

    /// The header's XOR checksum does not match the computed value.
    #[error("invalid checksum: stored {stored:#x}, computed {computed:#x}")]
    InvalidXor {
        /// Checksum stored in the header.
        stored: u32,
        /// Checksum computed over the header bytes.
        computed: u32,
    },

    /// An `hbin` header failed to validate (bad signature or offset mismatch).
    #[error("invalid bin header at offset {offset:#x}: {reason}")]
    InvalidBinHeader {
        /// Offset of the bin header that failed to validate.
        offset: u32,
        /// Human-readable description of what was wrong.
        reason: String,
    },

    /// A stored `lh` sub-key hash does not match the computed hash of the
    /// referenced child's name.
    #[error(
        "invalid hash for child at offset {offset:#x}: stored {stored:#x}, computed {computed:#x}"
    )]
    InvalidHash {
        /// Stored hash value.
        stored: u32,
        /// Hash computed from the child's decoded name.
        computed: u32,
        /// Offset of the child `nk` cell.
        offset: u32,
    },

    /// No named key with the literal name `ROOT` and the `KEY_HIVE_ENTRY`
    /// flag could be located while walking the hive's bins.
    #[error("root key not found")]
    RootNotFound,

    /// A read ran past the end of the mapped hive, or a cell did not
    /// contain as many bytes as its own framing promised.
    #[error("short read at offset {offset:#x}: expected {expected} bytes, got {actual}")]
    ShortRead {
        /// Offset the read was attempted at.
        offset: u32,
        /// Number of bytes expected.
        expected: usize,
        /// Number of bytes actually available.
        actual: usize,
    },

    /// A cell's signed size prefix decoded to a size smaller than the
    /// prefix itself, or otherwise out of range.
    #[error("invalid cell size {size} at offset {offset:#x}")]
    InvalidCellSize {
        /// The signed size value read from the cell.
        size: i32,
        /// Offset of the cell's size prefix.
        offset: u32,
    },

    /// A cell's 2-byte record signature did not match any known record type
    /// in a context where the traversal required a specific one.
    #[error("unknown cell signature {signature:?} at offset {offset:#x}")]
    UnknownCellSignature {
        /// The two signature bytes found.
        signature: [u8; 2],
        /// Offset of the cell.
        offset: u32,
    },

    /// A decoded offset fell outside the hive's mapped extent.
    #[error("invalid offset {offset:#x} (hive size {hive_size:#x})")]
    InvalidOffset {
        /// The offset that was out of range.
        offset: u32,
        /// Total size of the mapped hive.
        hive_size: usize,
    },

    /// The hive is smaller than the minimum size a valid hive can have.
    #[error("hive too small: {size} bytes (minimum {minimum} bytes)")]
    HiveTooSmall {
        /// Actual file size.
        size: usize,
        /// Minimum required size.
        minimum: usize,
    },

    /// A UTF-16LE string could not be decoded (odd byte length or invalid
    /// code units).
    #[error("invalid UTF-16 string at offset {offset:#x}")]
    InvalidUtf16 {
        /// Offset of the string data.
        offset: u32,
    },

    /// Catch-all for a structural violation that doesn't fit another cause.
    #[error("{0}")]
    Malformed(String),
}

impl RegistryError {
    /// Wraps a [`BadRegistryCause`] in the outer `BadRegistry` kind.
    pub fn bad_registry(cause: BadRegistryCause) -> Self {
        Self::BadRegistry { cause }
    }

    /// Builds a `BadRegistry(BadSignature)` error.
    pub fn invalid_signature(expected: &[u8], found: &[u8], offset: u32) -> Self {
        Self::bad_registry(BadRegistryCause::BadSignature {
            expected: expected.to_vec(),
            found: found.to_vec(),
            offset,
        })
    }

    /// Builds a `BadRegistry(InvalidOffset)` error.
    pub fn invalid_offset(offset: u32, hive_size: usize) -> Self {
        Self::bad_registry(BadRegistryCause::InvalidOffset { offset, hive_size })
    }

    /// Builds a `BadRegistry(InvalidCellSize)` error.
    pub fn invalid_cell_size(size: i32, offset: u32) -> Self {
        Self::bad_registry(BadRegistryCause::InvalidCellSize { size, offset })
    }

    /// Builds a `BadRegistry(ShortRead)` error.
    pub fn short_read(offset: u32, expected: usize, actual: usize) -> Self {
        Self::bad_registry(BadRegistryCause::ShortRead {
            offset,
            expected,
            actual,
        })
    }

    /// Builds a `BadRegistry(HiveTooSmall)` error.
    pub fn hive_too_small(size: usize, minimum: usize) -> Self {
        Self::bad_registry(BadRegistryCause::HiveTooSmall { size, minimum })
    }

    /// Builds a `BadRegistry(InvalidUtf16)` error.
    pub fn invalid_utf16(offset: u32) -> Self {
        Self::bad_registry(BadRegistryCause::InvalidUtf16 { offset })
    }

    /// Builds a `BadRegistry(Malformed)` error with a free-form message.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::bad_registry(BadRegistryCause::Malformed(message.into()))
    }

    /// Builds a `BadRegistry(UnknownCellSignature)` error.
    pub fn unknown_cell_signature(signature: [u8; 2], offset: u32) -> Self {
        Self::bad_registry(BadRegistryCause::UnknownCellSignature { signature, offset })
    }

    /// Builds a `NotExist` error describing what was being searched for.
    pub fn not_found(item_type: &str, name: &str) -> Self {
        Self::NotExist(format!("{} '{}'", item_type, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_registry_wraps_cause() {
        let err = RegistryError::invalid_signature(b"regf", b"XXXX", 0);
        assert!(matches!(
            err,
            RegistryError::BadRegistry {
                cause: BadRegistryCause::BadSignature { .. }
            }
        ));
    }

    #[test]
    fn display_includes_cause_detail() {
        let err = RegistryError::short_read(0x1000, 16, 4);
        let rendered = err.to_string();
        assert!(rendered.contains("short read"));
    }

    #[test]
    fn not_found_formats_item_and_name() {
        let err = RegistryError::not_found("value", "DisplayName");
        assert_eq!(err.to_string(), "not found: value 'DisplayName'");
    }
}
