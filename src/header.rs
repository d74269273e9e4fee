//! Registry hive header (`regf` base block) parsing.
//!
//! The base block is the first 4096 bytes (0x1000) of a registry hive file.
//! It contains metadata about the hive including version, timestamps, and
//! the root key cell offset.

use crate::error::{BadRegistryCause, RegistryError, Result};
use crate::utils::{calculate_checksum, read_u32_le, read_utf16_string_lossy};
use std::fmt;

/// Size of the base block in bytes.
pub const BASE_BLOCK_SIZE: usize = 4096;

/// Expected signature for a valid registry hive ("regf").
pub const REGF_SIGNATURE: &[u8; 4] = b"regf";

/// Offset of the file name in the base block.
const FILE_NAME_OFFSET: usize = 0x30;

/// Length of the file name field (64 UTF-16LE characters = 128 bytes).
const FILE_NAME_LENGTH: usize = 128;

/// Registry hive header (the `regf` base block).
///
/// This structure represents the first 4KB of a registry hive file and
/// contains metadata about the hive required before any bin can be read.
#[derive(Debug, Clone)]
pub struct HiveHeader {
    /// Signature, should be "regf" (0x66676572).
    pub signature: [u8; 4],

    /// Primary sequence number.
    pub primary_sequence: u32,

    /// Secondary sequence number.
    pub secondary_sequence: u32,

    /// Last written timestamp (Windows FILETIME).
    pub last_written: u64,

    /// Major version of the hive format.
    pub major_version: u32,

    /// Minor version of the hive format.
    pub minor_version: u32,

    /// File type (0 = normal, 1 = transaction log).
    pub file_type: u32,

    /// File format (1 = direct memory load).
    pub file_format: u32,

    /// Offset to root key cell (relative to first hbin).
    pub root_cell_offset: u32,

    /// Length of hive data in bytes.
    pub hive_length: u32,

    /// Clustering factor (always 1).
    pub clustering_factor: u32,

    /// File name as originally embedded by the OS when the hive was saved.
    ///
    /// Decoded leniently from UTF-16LE: this field is diagnostic only (it is
    /// never used to locate or validate anything) and malformed code units
    /// must not prevent the hive from opening.
    pub file_name: String,

    /// Checksum (XOR of first 508 bytes).
    pub checksum: u32,
}

impl HiveHeader {
    /// Parses a hive header from raw bytes.
    ///
    /// # Arguments
    ///
    /// * `data` - Raw bytes of the base block (must be at least 4096 bytes).
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Data is too small
    /// - Signature is invalid
    /// - Checksum doesn't match
    /// - The major/minor version falls outside the range this crate
    ///   validates against (surfaced as [`RegistryError::Unsupported`],
    ///   not a structural corruption).
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < BASE_BLOCK_SIZE {
            return Err(RegistryError::hive_too_small(data.len(), BASE_BLOCK_SIZE));
        }

        // Read signature
        let mut signature = [0u8; 4];
        signature.copy_from_slice(&data[0..4]);

        if &signature != REGF_SIGNATURE {
            return Err(RegistryError::invalid_signature(REGF_SIGNATURE, &signature, 0));
        }

        // Parse header fields
        let primary_sequence = read_u32_le(data, 0x04)?;
        let secondary_sequence = read_u32_le(data, 0x08)?;

        if primary_sequence != secondary_sequence {
            return Err(RegistryError::bad_registry(
                BadRegistryCause::BadSequenceNumber {
                    primary: primary_sequence,
                    secondary: secondary_sequence,
                },
            ));
        }

        // Last written timestamp (8 bytes at offset 0x0C)
        let last_written =
            u64::from(read_u32_le(data, 0x0C)?) | (u64::from(read_u32_le(data, 0x10)?) << 32);

        let major_version = read_u32_le(data, 0x14)?;
        let minor_version = read_u32_le(data, 0x18)?;
        let file_type = read_u32_le(data, 0x1C)?;
        let file_format = read_u32_le(data, 0x20)?;
        let root_cell_offset = read_u32_le(data, 0x24)?;
        let hive_length = read_u32_le(data, 0x28)?;
        let clustering_factor = read_u32_le(data, 0x2C)?;

        // File name at offset 0x30 (64 UTF-16LE characters = 128 bytes)
        let file_name_bytes = &data[FILE_NAME_OFFSET..FILE_NAME_OFFSET + FILE_NAME_LENGTH];
        let file_name = read_utf16_string_lossy(file_name_bytes);

        // Checksum at offset 0x1FC
        let checksum = read_u32_le(data, 0x1FC)?;

        // Verify checksum
        let calculated = calculate_checksum(data);
        if checksum != calculated {
            return Err(RegistryError::bad_registry(BadRegistryCause::InvalidXor {
                stored: checksum,
                computed: calculated,
            }));
        }

        // Supported format range: 1.3 through 1.6. Anything outside this is
        // a version this crate has never validated against, not structural
        // corruption of a version it understands.
        if major_version != 1 || !(3..=6).contains(&minor_version) {
            return Err(RegistryError::Unsupported(format!(
                "hive format version {}.{} is outside the supported range (1.3-1.6)",
                major_version, minor_version
            )));
        }

        Ok(HiveHeader {
            signature,
            primary_sequence,
            secondary_sequence,
            last_written,
            major_version,
            minor_version,
            file_type,
            file_format,
            root_cell_offset,
            hive_length,
            clustering_factor,
            file_name,
            checksum,
        })
    }

    /// Returns true if the hive is in a consistent state.
    ///
    /// Always true for any `HiveHeader` that made it out of `parse`: a
    /// primary/secondary sequence number mismatch is rejected there as
    /// `BadRegistry { cause: BadSequenceNumber }`. Kept as a cheap,
    /// self-documenting check for callers that want to assert the
    /// invariant explicitly rather than trust it implicitly.
    pub fn is_consistent(&self) -> bool {
        self.primary_sequence == self.secondary_sequence
    }

    /// Converts the last written timestamp to a human-readable format.
    pub fn last_written_datetime(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        // Windows FILETIME is 100-nanosecond intervals since 1601-01-01
        // Unix epoch is 1970-01-01, difference is 11644473600 seconds
        const FILETIME_UNIX_DIFF: i64 = 11644473600;

        let seconds = (self.last_written / 10_000_000) as i64 - FILETIME_UNIX_DIFF;
        let nanos = ((self.last_written % 10_000_000) * 100) as u32;

        chrono::DateTime::from_timestamp(seconds, nanos)
    }
}

impl fmt::Display for HiveHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Registry Hive Header:\n\
             - Version: {}.{}\n\
             - Root Cell Offset: {:#x}\n\
             - Hive Length: {} bytes\n\
             - Consistent: {}\n\
             - File Name: {}",
            self.major_version,
            self.minor_version,
            self.root_cell_offset,
            self.hive_length,
            self.is_consistent(),
            self.file_name
        )
    }
}
