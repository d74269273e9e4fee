//! Public, read-only facade over a registry hive.
//!
//! [`Registry`] opens a hive file and hands out [`Key`] handles that can
//! either borrow the `Registry` non-owningly, or own one exclusively via
//! the top-level [`open_key`] convenience function. Both shapes share the
//! same navigation and value-reading surface.

use crate::cell::ValueType;
use crate::error::{RegistryError, Result};
use crate::hive::Hive;
use crate::key::KeyNode;
use crate::value::ValueData;
use std::path::Path;
use std::sync::Arc;
use tracing::instrument;

/// An open registry hive.
///
/// Wraps [`Hive`] (the lower-level engine) behind the API surface this
/// crate commits to: open a path, fetch a key, close.
pub struct Registry {
    hive: Hive,
}

impl Registry {
    /// Opens a registry hive file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or is not a valid
    /// hive.
    #[instrument(skip(path))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            hive: Hive::open(path)?,
        })
    }

    /// Navigates from the root to the key at `path`, borrowing this
    /// `Registry`.
    ///
    /// `path` is a sequence of key names separated by `\`; an empty path
    /// returns the root key. Leading/trailing/duplicate separators are
    /// tolerated and treated as empty segments, which are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotExist`] if any path segment has no
    /// matching child.
    pub fn open_key(&self, path: &str) -> Result<Key<'_>> {
        let root = self.hive.root_key()?;
        let mut offset = root.offset;
        let mut node = root_node(&self.hive, offset)?;

        for segment in split_path(path) {
            let child_offset = self
                .hive
                .get_key(offset)?
                .open_sub_key(segment)
                .map(|k| k.offset)?;
            offset = child_offset;
            node = root_node(&self.hive, offset)?;
        }

        Ok(Key {
            owner: KeyOwner::Borrowed(self),
            offset,
            node,
        })
    }

    /// Closes the registry, releasing the memory map.
    ///
    /// Equivalent to dropping the `Registry`; provided so callers can make
    /// the point in the code where the hive is released explicit.
    pub fn close(self) {
        drop(self)
    }

    fn hive(&self) -> &Hive {
        &self.hive
    }
}

/// Splits a backslash-separated key path into non-empty segments.
fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('\\').filter(|s| !s.is_empty())
}

/// Fetches the `KeyNode` at `offset`, used to seed a `Key`'s owned copy of
/// its metadata without holding onto the `RegistryKey` borrow.
fn root_node(hive: &Hive, offset: u32) -> Result<KeyNode> {
    hive.get_key(offset).map(|k| k.node().clone())
}

/// Opens `path` inside the hive at `file`, returning a [`Key`] that owns
/// its `Registry` exclusively.
///
/// This is the convenience form for callers who only need one key out of
/// a hive and don't want to manage a separate `Registry` value: the
/// returned `Key` keeps the hive open for as long as it (or any key
/// derived from it) is alive, and releases it when the last one drops.
///
/// # Errors
///
/// Returns an error if the file cannot be opened, is not a valid hive, or
/// `path` does not resolve to an existing key.
pub fn open_key<P: AsRef<Path>>(file: P, path: &str) -> Result<Key<'static>> {
    let registry = Arc::new(Registry::open(file)?);

    let root = registry.hive.root_key()?;
    let mut offset = root.offset;
    let mut node = root_node(&registry.hive, offset)?;

    for segment in split_path(path) {
        let child_offset = registry
            .hive
            .get_key(offset)?
            .open_sub_key(segment)
            .map(|k| k.offset)?;
        offset = child_offset;
        node = root_node(&registry.hive, offset)?;
    }

    Ok(Key {
        owner: KeyOwner::Owned(registry),
        offset,
        node,
    })
}

/// How a [`Key`] reaches the [`Registry`] it was opened from.
enum KeyOwner<'r> {
    /// Borrows a `Registry` the caller keeps alive independently.
    Borrowed(&'r Registry),
    /// Owns a reference-counted handle to the `Registry`; shared by every
    /// `Key` descended from the one that first opened it, and released
    /// once the last such `Key` drops.
    Owned(Arc<Registry>),
}

impl<'r> KeyOwner<'r> {
    fn hive(&self) -> &Hive {
        match self {
            KeyOwner::Borrowed(registry) => registry.hive(),
            KeyOwner::Owned(registry) => registry.hive(),
        }
    }

    fn clone_ref(&self) -> KeyOwner<'r> {
        match self {
            KeyOwner::Borrowed(registry) => KeyOwner::Borrowed(registry),
            KeyOwner::Owned(registry) => KeyOwner::Owned(Arc::clone(registry)),
        }
    }
}

/// A handle to a single registry key.
///
/// `Key<'r>` either borrows its `Registry` (when opened via
/// [`Registry::open_key`]) or owns one exclusively (when opened via the
/// top-level [`open_key`]); both forms expose the same navigation and
/// value-reading methods.
pub struct Key<'r> {
    owner: KeyOwner<'r>,
    offset: u32,
    node: KeyNode,
}

impl<'r> Key<'r> {
    fn hive(&self) -> &Hive {
        self.owner.hive()
    }

    fn with_registry_key<T>(
        &self,
        f: impl FnOnce(&crate::hive::RegistryKey) -> Result<T>,
    ) -> Result<T> {
        let registry_key = self.hive().get_key(self.offset)?;
        f(&registry_key)
    }

    /// Opens a direct child key by name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotExist`] if no child with that name
    /// exists.
    pub fn open_sub_key(&self, name: &str) -> Result<Key<'r>> {
        let child_offset = self.with_registry_key(|k| k.open_sub_key(name).map(|c| c.offset))?;
        let node = root_node(self.hive(), child_offset)?;
        Ok(Key {
            owner: self.owner.clone_ref(),
            offset: child_offset,
            node,
        })
    }

    /// Returns the names of this key's direct subkeys, sorted by Unicode
    /// code point.
    pub fn read_sub_key_names(&self, n: Option<usize>) -> Result<Vec<String>> {
        let mut names = self.with_registry_key(|k| k.subkey_names())?;
        if let Some(limit) = n {
            names.truncate(limit);
        }
        Ok(names)
    }

    /// Returns the names of this key's values, in on-disk order.
    pub fn read_value_names(&self, n: Option<usize>) -> Result<Vec<String>> {
        let mut names = self.with_registry_key(|k| k.value_names())?;
        if let Some(limit) = n {
            names.truncate(limit);
        }
        Ok(names)
    }

    /// Reads a `REG_SZ` or `REG_EXPAND_SZ` value as a string.
    ///
    /// Returns the string along with its actual type (`String` or
    /// `ExpandString`), so a caller that cares about the distinction
    /// doesn't have to look it up a second time.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotExist`] if the value doesn't exist, or
    /// [`RegistryError::UnexpectedType`] if it isn't string-typed.
    pub fn get_string(&self, name: &str) -> Result<(String, ValueType)> {
        let data = self.with_registry_key(|k| k.value(name)?.data())?;
        match data {
            ValueData::String(s) => Ok((s, ValueType::String)),
            ValueData::ExpandString(s) => Ok((s, ValueType::ExpandString)),
            other => Err(unexpected_type("REG_SZ", &other)),
        }
    }

    /// Reads a `REG_MULTI_SZ` value as a list of strings, along with its
    /// type.
    pub fn get_strings(&self, name: &str) -> Result<(Vec<String>, ValueType)> {
        let data = self.with_registry_key(|k| k.value(name)?.data())?;
        match data {
            ValueData::MultiString(strings) => Ok((strings, ValueType::MultiString)),
            other => Err(unexpected_type("REG_MULTI_SZ", &other)),
        }
    }

    /// Reads a `REG_BINARY` value's raw bytes, along with its type.
    pub fn get_binary(&self, name: &str) -> Result<(Vec<u8>, ValueType)> {
        let data = self.with_registry_key(|k| k.value(name)?.data())?;
        match data {
            ValueData::Binary(b) => Ok((b, ValueType::Binary)),
            other => Err(unexpected_type("REG_BINARY", &other)),
        }
    }

    /// Reads a `REG_DWORD`, `REG_DWORD_BIG_ENDIAN`, or `REG_QWORD` value as
    /// an integer (zero-extended to `u64`), along with its actual type.
    pub fn get_integer(&self, name: &str) -> Result<(u64, ValueType)> {
        let data = self.with_registry_key(|k| k.value(name)?.data())?;
        match data {
            ValueData::Dword(d) => Ok((d as u64, ValueType::Dword)),
            ValueData::DwordBigEndian(d) => Ok((d as u64, ValueType::DwordBigEndian)),
            ValueData::Qword(q) => Ok((q, ValueType::Qword)),
            other => Err(unexpected_type("REG_DWORD/REG_QWORD", &other)),
        }
    }

    /// Reads a value's bytes and type, the way a two-phase sizing API
    /// works: call with `buf = None` to learn the required buffer size
    /// without copying any data, then call again with a buffer of at
    /// least that size to receive the bytes.
    ///
    /// The bytes are a canonical encoding, not the raw on-disk
    /// representation: strings are UTF-8 with no added terminator,
    /// `REG_MULTI_SZ` is each string's UTF-8 bytes followed by a single NUL,
    /// and integers are encoded at their natural width in the type's
    /// endianness (4 bytes LE for `REG_DWORD`, 4 bytes BE for
    /// `REG_DWORD_BIG_ENDIAN`, 8 bytes LE for `REG_QWORD`). Binary and
    /// unrecognized types are passed through unchanged.
    ///
    /// Returns the value's type and a byte count. For string-shaped values
    /// (`REG_SZ`, `REG_EXPAND_SZ`, `REG_LINK`, `REG_MULTI_SZ`) that count is
    /// the value's length in UTF-16 code units, matching the on-disk
    /// `dataSize` convention those types use — not the UTF-8 byte length of
    /// the bytes actually copied, which only diverges for non-ASCII text.
    /// Every other type's required count and encoded length are the same
    /// thing. When `buf` is `Some` and shorter than the required count,
    /// returns [`RegistryError::ShortBuffer`] and writes nothing.
    pub fn get_value(&self, name: &str, buf: Option<&mut [u8]>) -> Result<(ValueType, usize)> {
        let (value_type, data) = self.with_registry_key(|k| {
            let value = k.value(name)?;
            Ok((value.data_type(), value.data()?))
        })?;

        let required = canonical_required_len(&data);
        let encoded = canonical_bytes(&data);

        match buf {
            None => Ok((value_type, required)),
            Some(buf) => {
                if buf.len() < required {
                    return Err(RegistryError::ShortBuffer {
                        required,
                        available: buf.len(),
                        type_code: type_code(value_type),
                    });
                }
                let written = encoded.len().min(buf.len());
                buf[..written].copy_from_slice(&encoded[..written]);
                Ok((value_type, written))
            }
        }
    }

    /// Closes the key.
    ///
    /// For a `Key` that owns its `Registry` exclusively, this is the last
    /// reference and releases the memory map; for a borrowed `Key`, the
    /// underlying `Registry` is left open.
    pub fn close(self) {
        drop(self)
    }
}

/// Re-encodes parsed value data into the canonical byte form `get_value`
/// hands back, as opposed to the raw on-disk bytes `ValueKey::raw_data`
/// would return (UTF-16LE for strings, for instance).
fn canonical_bytes(data: &ValueData) -> Vec<u8> {
    match data {
        ValueData::None => Vec::new(),
        ValueData::String(s) | ValueData::ExpandString(s) | ValueData::Link(s) => {
            s.as_bytes().to_vec()
        }
        ValueData::MultiString(strings) => {
            let mut bytes = Vec::new();
            for s in strings {
                bytes.extend_from_slice(s.as_bytes());
                bytes.push(0);
            }
            bytes
        }
        ValueData::Dword(d) => d.to_le_bytes().to_vec(),
        ValueData::DwordBigEndian(d) => d.to_be_bytes().to_vec(),
        ValueData::Qword(q) => q.to_le_bytes().to_vec(),
        ValueData::Binary(b) | ValueData::Unknown(b) => b.clone(),
    }
}

/// The byte count `get_value` reports as a value's required/written size.
///
/// For string-shaped values this is the UTF-16 code-unit count of the
/// decoded string (after its trailing NUL was dropped during parsing), not
/// the UTF-8 byte length `canonical_bytes` actually encodes: the two only
/// diverge for non-ASCII text, but the code-unit count is what callers that
/// size a buffer from a `get_value(name, None)` call must see, matching the
/// on-disk REG_SZ/REG_MULTI_SZ `dataSize` convention. For every other type
/// the required length and the encoded length are the same thing.
fn canonical_required_len(data: &ValueData) -> usize {
    match data {
        ValueData::String(s) | ValueData::ExpandString(s) | ValueData::Link(s) => {
            s.encode_utf16().count()
        }
        ValueData::MultiString(strings) => strings
            .iter()
            .map(|s| s.encode_utf16().count() + 1)
            .sum(),
        other => canonical_bytes(other).len(),
    }
}

fn unexpected_type(wanted: &'static str, actual: &ValueData) -> RegistryError {
    let (actual_name, actual_code) = match actual {
        ValueData::None => ("REG_NONE".to_string(), 0),
        ValueData::String(_) => ("REG_SZ".to_string(), 1),
        ValueData::ExpandString(_) => ("REG_EXPAND_SZ".to_string(), 2),
        ValueData::Link(_) => ("REG_LINK".to_string(), 6),
        ValueData::Binary(_) => ("REG_BINARY".to_string(), 3),
        ValueData::Dword(_) => ("REG_DWORD".to_string(), 4),
        ValueData::DwordBigEndian(_) => ("REG_DWORD_BIG_ENDIAN".to_string(), 5),
        ValueData::MultiString(_) => ("REG_MULTI_SZ".to_string(), 7),
        ValueData::Qword(_) => ("REG_QWORD".to_string(), 11),
        ValueData::Unknown(_) => ("REG_UNKNOWN".to_string(), u32::MAX),
    };
    RegistryError::UnexpectedType {
        wanted,
        actual_name,
        actual_code,
    }
}

fn type_code(value_type: ValueType) -> u32 {
    match value_type {
        ValueType::None => 0,
        ValueType::String => 1,
        ValueType::ExpandString => 2,
        ValueType::Binary => 3,
        ValueType::Dword => 4,
        ValueType::DwordBigEndian => 5,
        ValueType::Link => 6,
        ValueType::MultiString => 7,
        ValueType::ResourceList => 8,
        ValueType::FullResourceDescriptor => 9,
        ValueType::ResourceRequirementsList => 10,
        ValueType::Qword => 11,
        ValueType::Unknown(code) => code,
    }
}
