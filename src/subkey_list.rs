//! Subkey list parsing (lf, lh, li, ri).
//!
//! Registry keys can have multiple subkeys, which are organized in various
//! list structures for efficient lookup.

use crate::error::{BadRegistryCause, RegistryError, Result};
use crate::utils::read_u32_le;

/// Subkey list types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubkeyListType {
    /// Index leaf (li) - simple list of offsets.
    IndexLeaf,

    /// Fast leaf (lf) - list with 4-byte name hints.
    FastLeaf,

    /// Hash leaf (lh) - list with name hash hints.
    HashLeaf,

    /// Index root (ri) - list of subkey list offsets.
    IndexRoot,
}

impl SubkeyListType {
    /// Parses a subkey list type from a 2-byte signature.
    pub fn from_signature(sig: &[u8; 2]) -> Result<Self> {
        match sig {
            b"li" => Ok(SubkeyListType::IndexLeaf),
            b"lf" => Ok(SubkeyListType::FastLeaf),
            b"lh" => Ok(SubkeyListType::HashLeaf),
            b"ri" => Ok(SubkeyListType::IndexRoot),
            _ => Err(RegistryError::unknown_cell_signature(*sig, 0)),
        }
    }
}

/// Subkey list entry (for lf/lh lists).
#[derive(Debug, Clone)]
pub struct SubkeyListEntry {
    /// Offset to the key node.
    pub key_offset: u32,

    /// Name hint: the child's first 4 raw name bytes for `lf`, or the
    /// hive's name-hash of the child's name for `lh`. Which interpretation
    /// applies depends on which [`SubkeyList`] variant this entry came
    /// from.
    pub name_hint: u32,
}

/// Parsed subkey list.
#[derive(Debug, Clone)]
pub enum SubkeyList {
    /// Index leaf (`li`) - flat list of child key offsets, no hints.
    IndexLeaf(Vec<u32>),

    /// Fast leaf (`lf`) - child offsets with a 4-byte name-prefix hint.
    /// Matching a candidate name still requires reading the child's `nk`
    /// and comparing the full name; the hint only short-circuits clear
    /// mismatches.
    FastLeaf(Vec<SubkeyListEntry>),

    /// Hash leaf (`lh`) - child offsets with a full name hash. A name can
    /// be matched by computing its hash and comparing, without reading
    /// every candidate child.
    HashLeaf(Vec<SubkeyListEntry>),

    /// Index root (`ri`) - offsets of further subkey lists, not of keys
    /// directly. Descent must recurse into each referenced list and keep
    /// recursing until it reaches a leaf list, since `ri` entries can
    /// themselves point at other `ri` lists.
    IndexRoot(Vec<u32>),
}

impl SubkeyList {
    /// Parses a subkey list from cell data.
    ///
    /// # Arguments
    ///
    /// * `data` - Cell data (excluding size field).
    /// * `offset` - Offset of this cell for error reporting.
    pub fn parse(data: &[u8], offset: u32) -> Result<Self> {
        if data.len() < 4 {
            return Err(RegistryError::short_read(offset, 4, data.len()));
        }

        let sig = [data[0], data[1]];
        let list_type = SubkeyListType::from_signature(&sig).map_err(|_| {
            RegistryError::bad_registry(BadRegistryCause::UnknownCellSignature {
                signature: sig,
                offset,
            })
        })?;

        let count = u16::from_le_bytes([data[2], data[3]]) as usize;

        match list_type {
            SubkeyListType::IndexLeaf => {
                // li: signature (2) + count (2) + offsets (4 * count)
                let expected_size = 4 + (count * 4);
                if data.len() < expected_size {
                    return Err(RegistryError::short_read(offset, expected_size, data.len()));
                }

                let mut offsets = Vec::with_capacity(count);
                for i in 0..count {
                    let offset_pos = 4 + (i * 4);
                    offsets.push(read_u32_le(data, offset_pos)?);
                }

                Ok(SubkeyList::IndexLeaf(offsets))
            }

            SubkeyListType::FastLeaf | SubkeyListType::HashLeaf => {
                // lf/lh: signature (2) + count (2) + entries (8 * count)
                // Each entry: offset (4) + hint (4)
                let expected_size = 4 + (count * 8);
                if data.len() < expected_size {
                    return Err(RegistryError::short_read(offset, expected_size, data.len()));
                }

                let mut entries = Vec::with_capacity(count);
                for i in 0..count {
                    let entry_pos = 4 + (i * 8);
                    let key_offset = read_u32_le(data, entry_pos)?;
                    let name_hint = read_u32_le(data, entry_pos + 4)?;

                    entries.push(SubkeyListEntry {
                        key_offset,
                        name_hint,
                    });
                }

                Ok(if list_type == SubkeyListType::FastLeaf {
                    SubkeyList::FastLeaf(entries)
                } else {
                    SubkeyList::HashLeaf(entries)
                })
            }

            SubkeyListType::IndexRoot => {
                // ri: signature (2) + count (2) + offsets (4 * count)
                let expected_size = 4 + (count * 4);
                if data.len() < expected_size {
                    return Err(RegistryError::short_read(offset, expected_size, data.len()));
                }

                let mut offsets = Vec::with_capacity(count);
                for i in 0..count {
                    let offset_pos = 4 + (i * 4);
                    offsets.push(read_u32_le(data, offset_pos)?);
                }

                Ok(SubkeyList::IndexRoot(offsets))
            }
        }
    }

    /// Returns an iterator over this list's entries' key offsets.
    ///
    /// For an `IndexRoot`, these are offsets of further subkey lists, not
    /// of keys; the caller is expected to recurse.
    pub fn key_offsets_iter(&self) -> impl Iterator<Item = u32> + '_ {
        match self {
            SubkeyList::IndexLeaf(offsets) => {
                Box::new(offsets.iter().copied()) as Box<dyn Iterator<Item = u32> + '_>
            }
            SubkeyList::FastLeaf(entries) | SubkeyList::HashLeaf(entries) => {
                Box::new(entries.iter().map(|e| e.key_offset))
            }
            SubkeyList::IndexRoot(offsets) => Box::new(offsets.iter().copied()),
        }
    }

    /// Returns the number of entries in this list.
    pub fn len(&self) -> usize {
        match self {
            SubkeyList::IndexLeaf(offsets) => offsets.len(),
            SubkeyList::FastLeaf(entries) | SubkeyList::HashLeaf(entries) => entries.len(),
            SubkeyList::IndexRoot(offsets) => offsets.len(),
        }
    }

    /// Returns true if this list is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if this is an index root (contains sublists, not keys).
    pub fn is_index_root(&self) -> bool {
        matches!(self, SubkeyList::IndexRoot(_))
    }
}
