//! Main registry hive parser with memory-mapped file support.

use crate::bigdata::BigDataBlock;
use crate::error::{BadRegistryCause, RegistryError, Result};
use crate::hbin::HbinHeader;
use crate::header::{HiveHeader, BASE_BLOCK_SIZE};
use crate::key::KeyNode;
use crate::subkey_list::SubkeyList;
use crate::utils::{cell_offset_to_absolute, lh_hash, names_eq_ignore_case, read_utf16_string};
use crate::value::{ValueData, ValueKey};
use memmap2::Mmap;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, instrument};

/// Cell offsets below 16344 bytes are stored directly in a cell; larger
/// values spill into a big data (`db`) block.
const MAX_DIRECT_DATA_SIZE: u32 = 16344;

/// Marks an offset field as "not present" (used by both subkey lists and
/// value lists).
const NO_OFFSET: u32 = 0xFFFF_FFFF;

/// Main registry hive parser.
///
/// This structure provides access to a Windows registry hive file using
/// memory-mapped I/O for efficient, zero-copy parsing.
///
/// # Caching
///
/// The hive maintains an internal cache of parsed key nodes to avoid redundant
/// parsing during traversal. The cache uses interior mutability via `RwLock`
/// to allow caching while keeping the API immutable and thread-safe; this
/// also means concurrent read-only traversal from multiple threads is safe
/// even though this crate has no need for multi-writer concurrency.
pub struct Hive {
    /// Hive data - either memory-mapped or owned.
    data: HiveData,

    /// Parsed hive header.
    header: HiveHeader,

    /// Cache of parsed key nodes (offset -> KeyNode).
    /// Uses RwLock for interior mutability to allow thread-safe caching with &self.
    key_cache: RwLock<HashMap<u32, KeyNode>>,
}

/// Represents hive data storage.
enum HiveData {
    /// Memory-mapped file data.
    Mapped(Mmap),
    /// Owned data (used when constructing a hive from an in-memory buffer).
    Owned(Arc<Vec<u8>>),
}

impl HiveData {
    /// Returns a slice of the hive data.
    fn as_slice(&self) -> &[u8] {
        match self {
            HiveData::Mapped(mmap) => mmap,
            HiveData::Owned(data) => data,
        }
    }
}

impl Hive {
    /// Opens a registry hive file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the registry hive file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - File cannot be opened
    /// - File is not a valid registry hive
    /// - Header is corrupted
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use reg_parser::Hive;
    ///
    /// let hive = Hive::open("SYSTEM").unwrap();
    /// ```
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        info!("Opening registry hive");
        let file = File::open(&path)?;
        debug!("File opened successfully");

        // Validate file size BEFORE creating memory map
        let metadata = file.metadata()?;
        let file_size = metadata.len() as usize;

        if file_size < BASE_BLOCK_SIZE {
            return Err(RegistryError::hive_too_small(file_size, BASE_BLOCK_SIZE));
        }

        debug!(size = file_size, "File size validated");

        // SAFETY: This is safe because:
        // 1. The file is opened in read-only mode (no write access)
        // 2. The file size has been validated to be at least BASE_BLOCK_SIZE
        // 3. The mmap lifetime is tied to the Hive lifetime
        // 4. All access to the mmap is bounds-checked via read_cell() and other methods
        // 5. The file descriptor remains valid for the lifetime of the mmap
        // 6. No other code has mutable access to the underlying file
        let mmap = unsafe { Mmap::map(&file)? };
        debug!(size = mmap.len(), "Memory mapped hive file");

        Self::from_data(HiveData::Mapped(mmap))
    }

    /// Creates a hive parser from a memory-mapped region.
    ///
    /// # Arguments
    ///
    /// * `mmap` - Memory-mapped hive data.
    pub fn from_mmap(mmap: Mmap) -> Result<Self> {
        Self::from_data(HiveData::Mapped(mmap))
    }

    /// Creates a hive parser from owned data.
    ///
    /// # Arguments
    ///
    /// * `data` - Owned hive data.
    pub fn from_vec(data: Vec<u8>) -> Result<Self> {
        Self::from_data(HiveData::Owned(Arc::new(data)))
    }

    /// Creates a hive parser from hive data.
    fn from_data(data: HiveData) -> Result<Self> {
        // Parse base block
        let header = HiveHeader::parse(data.as_slice())?;

        Ok(Self {
            data,
            header,
            key_cache: RwLock::new(HashMap::new()),
        })
    }

    /// Returns a reference to the hive header.
    pub fn header(&self) -> &HiveHeader {
        &self.header
    }

    /// Returns the root key of the hive.
    ///
    /// The header's `root_cell_offset` is used first; if the cell at that
    /// offset does not turn out to be a root `nk` (the `ROOT_KEY` flag is
    /// unset), every bin is scanned in order for the first `nk` cell that
    /// is flagged as root. This mirrors tools that distrust the header
    /// offset rather than failing outright when it is off.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::BadRegistry`] with [`BadRegistryCause::RootNotFound`]
    /// if no root key can be located anywhere in the hive.
    #[instrument(skip(self))]
    pub fn root_key(&self) -> Result<RegistryKey> {
        let hinted_offset = self.header.root_cell_offset;
        debug!(offset = %format!("{:#x}", hinted_offset), "Trying header-hinted root key");

        if let Ok(key) = self.get_key(hinted_offset) {
            if key.key_node().is_root() {
                return Ok(key);
            }
        }

        debug!("Header-hinted root key invalid, scanning bins for root key");
        let offset = self.find_root_by_scan()?;
        self.get_key(offset)
    }

    /// Scans every hbin's cells for the first `nk` record with the
    /// `ROOT_KEY` flag set, regardless of the header's own claim about
    /// where the root lives.
    fn find_root_by_scan(&self) -> Result<u32> {
        use crate::hbin::HbinCellIterator;

        for hbin in self.hbins() {
            let hbin = hbin?;
            let hbin_abs_start = cell_offset_to_absolute(hbin.offset)? as usize;
            let data = self.data.as_slice();
            let header_end = hbin_abs_start + crate::hbin::HBIN_HEADER_SIZE;
            if header_end > data.len() {
                break;
            }
            let bin_end = (hbin_abs_start + hbin.size as usize).min(data.len());
            let cells = HbinCellIterator::new(&data[header_end..bin_end], hbin.offset);

            for cell in cells {
                let cell = match cell {
                    Ok(c) => c,
                    Err(_) => break,
                };
                if !cell.is_allocated {
                    continue;
                }
                if cell.cell_type() != Some(*b"nk") {
                    continue;
                }
                if let Ok(node) = KeyNode::parse(cell.data, cell.offset) {
                    if node.is_root() {
                        return Ok(cell.offset);
                    }
                }
            }
        }

        Err(RegistryError::bad_registry(BadRegistryCause::RootNotFound))
    }

    /// Gets a key node by its cell offset.
    ///
    /// # Arguments
    ///
    /// * `offset` - Cell offset (relative to first hbin).
    ///
    /// # Caching
    ///
    /// This method uses an internal cache to avoid re-parsing the same key node
    /// multiple times during traversal. The cache is transparent to the caller.
    pub fn get_key(&self, offset: u32) -> Result<RegistryKey> {
        // Check cache first (read lock)
        if let Some(key_node) = self
            .key_cache
            .read()
            .expect("key cache lock poisoned")
            .get(&offset)
        {
            debug!(offset = %format!("{:#x}", offset), "Cache hit for key node");
            return Ok(RegistryKey {
                hive: self,
                offset,
                key_node: key_node.clone(),
            });
        }

        // Parse and cache (write lock)
        debug!(offset = %format!("{:#x}", offset), "Cache miss, parsing key node");
        let key_node = self.parse_key_node(offset)?;
        self.key_cache
            .write()
            .expect("key cache lock poisoned")
            .insert(offset, key_node.clone());

        Ok(RegistryKey {
            hive: self,
            offset,
            key_node,
        })
    }

    /// Parses a key node at the given offset.
    fn parse_key_node(&self, offset: u32) -> Result<KeyNode> {
        let cell_data = self.read_cell(offset)?;
        KeyNode::parse(cell_data, offset)
    }

    /// Reads a cell at the given offset.
    ///
    /// # Arguments
    ///
    /// * `offset` - Cell offset (relative to first hbin).
    ///
    /// # Returns
    ///
    /// Returns the cell data (excluding the size field).
    fn read_cell(&self, offset: u32) -> Result<&[u8]> {
        let abs_offset = cell_offset_to_absolute(offset)? as usize;
        let data = self.data.as_slice();

        if abs_offset >= data.len() {
            return Err(RegistryError::invalid_offset(offset, data.len()));
        }

        // Read cell size
        if abs_offset + 4 > data.len() {
            return Err(RegistryError::short_read(offset, 4, data.len() - abs_offset));
        }

        let size_bytes = &data[abs_offset..abs_offset + 4];
        let size =
            i32::from_le_bytes([size_bytes[0], size_bytes[1], size_bytes[2], size_bytes[3]]);

        let abs_size = size.unsigned_abs() as usize;

        if abs_size < 4 {
            return Err(RegistryError::invalid_cell_size(size, offset));
        }

        let data_start = abs_offset + 4;
        let data_end = abs_offset + abs_size;

        if data_end > data.len() {
            return Err(RegistryError::short_read(offset, abs_size, data.len() - abs_offset));
        }

        Ok(&data[data_start..data_end])
    }

    /// Parses a subkey list at the given offset.
    fn parse_subkey_list(&self, offset: u32) -> Result<SubkeyList> {
        let cell_data = self.read_cell(offset)?;
        SubkeyList::parse(cell_data, offset)
    }

    /// Parses a value key at the given offset.
    fn parse_value_key(&self, offset: u32) -> Result<ValueKey> {
        let cell_data = self.read_cell(offset)?;
        ValueKey::parse(cell_data, offset)
    }

    /// Looks up an immediate child of `list_offset` by name, recursing
    /// through `ri` index roots until a leaf list is reached.
    ///
    /// Returns `Ok(None)` if no child with that name exists anywhere under
    /// this list (not an error: the caller reports `NotExist`).
    fn resolve_child(&self, list_offset: u32, name: &str) -> Result<Option<u32>> {
        if list_offset == NO_OFFSET || list_offset == 0 {
            return Ok(None);
        }

        let list = self.parse_subkey_list(list_offset)?;

        match &list {
            SubkeyList::IndexRoot(sublist_offsets) => {
                for &sublist_offset in sublist_offsets {
                    if let Some(found) = self.resolve_child(sublist_offset, name)? {
                        return Ok(Some(found));
                    }
                }
                Ok(None)
            }
            SubkeyList::HashLeaf(entries) => {
                let wanted_hash = lh_hash(name);
                for entry in entries {
                    if entry.name_hint != wanted_hash {
                        continue;
                    }
                    // Hashes can collide; confirm against the decoded name.
                    if let Ok(candidate) = self.get_key(entry.key_offset) {
                        if names_eq_ignore_case(&candidate.key_node().name, name) {
                            return Ok(Some(entry.key_offset));
                        }
                    }
                }
                Ok(None)
            }
            SubkeyList::FastLeaf(entries) => {
                for entry in entries {
                    if let Ok(candidate) = self.get_key(entry.key_offset) {
                        if names_eq_ignore_case(&candidate.key_node().name, name) {
                            return Ok(Some(entry.key_offset));
                        }
                    }
                }
                Ok(None)
            }
            SubkeyList::IndexLeaf(_) => {
                for offset in list.key_offsets_iter() {
                    if let Ok(candidate) = self.get_key(offset) {
                        if names_eq_ignore_case(&candidate.key_node().name, name) {
                            return Ok(Some(offset));
                        }
                    }
                }
                Ok(None)
            }
        }
    }

    /// Recursively collects every leaf key offset reachable from a subkey
    /// list, recursing through `ri` index roots until leaves are reached.
    fn collect_subkey_offsets(&self, list_offset: u32, offsets: &mut Vec<u32>) -> Result<()> {
        if list_offset == NO_OFFSET || list_offset == 0 {
            return Ok(());
        }

        let subkey_list = self.parse_subkey_list(list_offset)?;

        if subkey_list.is_index_root() {
            for offset in subkey_list.key_offsets_iter() {
                self.collect_subkey_offsets(offset, offsets)?;
            }
        } else {
            offsets.extend(subkey_list.key_offsets_iter());
        }

        Ok(())
    }

    /// Reads value data at the given offset.
    ///
    /// This method handles both regular values and big data blocks (values > 16KB).
    /// Big data blocks are stored in a "db" structure with multiple segments.
    ///
    /// # Arguments
    ///
    /// * `offset` - Cell offset of the value data
    /// * `length` - Length of the value data in bytes
    ///
    /// # Errors
    ///
    /// Returns an error if the data cannot be read or is corrupted.
    fn read_value_data(&self, offset: u32, length: u32) -> Result<Vec<u8>> {
        if length == 0 {
            return Ok(Vec::new());
        }

        // For large data (>16344 bytes), data is stored in a db structure
        if length > MAX_DIRECT_DATA_SIZE {
            return self.read_big_data(offset, length);
        }

        // Regular data - read directly from cell
        Ok(self.read_cell(offset)?.to_vec())
    }

    /// Reads big data block (values > 16KB).
    ///
    /// Big data blocks consist of a header cell ("db" signature) followed by
    /// a list of segment offsets. Each segment contains a portion of the data.
    ///
    /// # Arguments
    ///
    /// * `offset` - Cell offset of the big data block header
    /// * `expected_length` - Expected total length of the data
    ///
    /// # Errors
    ///
    /// Returns an error if the big data structure is corrupted or segments are missing.
    fn read_big_data(&self, offset: u32, expected_length: u32) -> Result<Vec<u8>> {
        debug!(
            "Reading big data block at offset {:#x}, expected length {}",
            offset, expected_length
        );

        // Read the big data block header
        let header_cell = self.read_cell(offset)?;
        let db_header = BigDataBlock::parse(header_cell, offset)?;

        debug!("Big data block has {} segments", db_header.segment_count);

        // Read the segment list (array of u32 offsets). This cell is
        // bounds-checked like any other cell: read_cell already validates
        // its framing, but the declared segment count must also fit.
        let segment_list_cell = self.read_cell(db_header.segment_list_offset)?;

        let expected_list_size = db_header.segment_count as usize * 4;
        if segment_list_cell.len() < expected_list_size {
            return Err(RegistryError::short_read(
                db_header.segment_list_offset,
                expected_list_size,
                segment_list_cell.len(),
            ));
        }

        // Parse segment offsets
        let mut segment_offsets = Vec::with_capacity(db_header.segment_count as usize);
        for i in 0..db_header.segment_count {
            let offset_pos = (i as usize) * 4;
            let segment_offset = u32::from_le_bytes([
                segment_list_cell[offset_pos],
                segment_list_cell[offset_pos + 1],
                segment_list_cell[offset_pos + 2],
                segment_list_cell[offset_pos + 3],
            ]);
            segment_offsets.push(segment_offset);
        }

        // Read and concatenate all segments
        let mut data = Vec::with_capacity(expected_length as usize);
        for (i, segment_offset) in segment_offsets.iter().enumerate() {
            debug!("Reading segment {} at offset {:#x}", i, segment_offset);

            let segment_data = self.read_cell(*segment_offset)?;
            data.extend_from_slice(segment_data);

            // Stop if we've read enough data
            if data.len() >= expected_length as usize {
                break;
            }
        }

        // Truncate to expected length (segments might contain extra data)
        data.truncate(expected_length as usize);

        debug!("Successfully read {} bytes from big data block", data.len());

        Ok(data)
    }

    /// Iterates over all hbins in the hive.
    pub fn hbins(&self) -> HbinIterator {
        let data = self.data.as_slice();
        HbinIterator {
            data: &data[BASE_BLOCK_SIZE..],
            offset: 0,
        }
    }
}

/// Iterator over hbins in a hive.
///
/// Walks every bin up to the hive's recorded extent; a bin whose header
/// fails to validate is treated as trailing padding/EOF rather than an
/// error, so iteration simply stops there instead of failing the whole
/// traversal.
pub struct HbinIterator<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for HbinIterator<'a> {
    type Item = Result<HbinHeader>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.data.len() {
            return None;
        }

        let hbin_data = &self.data[self.offset..];
        let result = HbinHeader::parse(hbin_data, self.offset as u32);

        match result {
            Ok(ref header) => {
                self.offset += header.size as usize;
                Some(Ok(header.clone()))
            }
            Err(RegistryError::BadRegistry {
                cause: BadRegistryCause::BadSignature { .. },
            }) => {
                // Stop iteration when we hit invalid signatures (padding/EOF)
                None
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// A registry key with access to its hive.
pub struct RegistryKey<'a> {
    hive: &'a Hive,
    /// Cell offset of this key (relative to first hbin).
    pub offset: u32,
    key_node: KeyNode,
}

impl<'a> RegistryKey<'a> {
    /// Returns a reference to the key node data.
    fn key_node(&self) -> &KeyNode {
        &self.key_node
    }

    /// Returns a reference to the key node data.
    ///
    /// Crate-visible so the [`crate::registry`] facade can pull an owned
    /// copy of a key's metadata without holding onto this borrow.
    pub(crate) fn node(&self) -> &KeyNode {
        &self.key_node
    }

    /// Returns the key name.
    pub fn name(&self) -> Result<String> {
        Ok(self.key_node().name.clone())
    }

    /// Returns the number of subkeys.
    pub fn subkey_count(&self) -> Result<u32> {
        Ok(self.key_node().subkey_count)
    }

    /// Returns the number of values.
    pub fn value_count(&self) -> Result<u32> {
        Ok(self.key_node().value_count)
    }

    /// Returns this key's class name, if it has one, decoded from the cell
    /// `class_name_offset` points at.
    ///
    /// Class names are always stored UTF-16LE, unlike key/value names which
    /// carry an ASCII flag. This is purely a label: nothing else in this
    /// crate parses a class name's payload.
    pub fn class_name(&self) -> Result<Option<String>> {
        let key_node = self.key_node();
        if key_node.class_name_offset == NO_OFFSET || key_node.class_name_length == 0 {
            return Ok(None);
        }

        let cell_data = self.hive.read_cell(key_node.class_name_offset)?;
        let len = key_node.class_name_length as usize;
        if cell_data.len() < len {
            return Err(RegistryError::short_read(
                key_node.class_name_offset,
                len,
                cell_data.len(),
            ));
        }

        Ok(Some(read_utf16_string(
            &cell_data[..len],
            key_node.class_name_offset,
        )?))
    }

    /// Returns a human-readable label for this key's class name: the
    /// matching entry from [`crate::key::KNOWN_CLASS_NAMES`] when the
    /// decoded class name is one of them, or the raw decoded string
    /// otherwise. Returns `None` if this key has no class name.
    pub fn class_name_label(&self) -> Result<Option<String>> {
        Ok(self.class_name()?.map(|name| {
            crate::key::known_class_name_label(&name)
                .map(str::to_string)
                .unwrap_or(name)
        }))
    }

    /// Looks up a direct child key by name, without enumerating every
    /// sibling first.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotExist`] if no child with that name exists.
    pub fn open_sub_key(&self, name: &str) -> Result<RegistryKey<'a>> {
        let key_node = self.key_node();
        if !key_node.has_subkeys() {
            return Err(RegistryError::not_found("key", name));
        }

        match self.hive.resolve_child(key_node.subkey_list_offset, name)? {
            Some(offset) => self.hive.get_key(offset),
            None => Err(RegistryError::not_found("key", name)),
        }
    }

    /// Returns all direct subkeys.
    pub fn subkeys(&self) -> Result<Vec<RegistryKey<'a>>> {
        let key_node = self.key_node();

        if !key_node.has_subkeys() {
            return Ok(Vec::new());
        }

        let mut subkey_offsets = Vec::new();
        self.hive
            .collect_subkey_offsets(key_node.subkey_list_offset, &mut subkey_offsets)?;

        let mut subkeys = Vec::new();
        for offset in subkey_offsets {
            subkeys.push(self.hive.get_key(offset)?);
        }

        Ok(subkeys)
    }

    /// Returns all direct subkey names, sorted by Unicode code point.
    ///
    /// Sorting is done purely on the decoded `String`'s `Ord` (byte-wise
    /// UTF-8 order, which agrees with code-point order); this does not
    /// depend on the process locale.
    pub fn subkey_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .subkeys()?
            .iter()
            .map(|k| k.name())
            .collect::<Result<Vec<_>>>()?;
        names.sort();
        Ok(names)
    }

    /// Returns an iterator over values.
    pub fn values(&self) -> Result<Vec<RegistryValue<'a>>> {
        let key_node = self.key_node();

        if !key_node.has_values() {
            return Ok(Vec::new());
        }

        if key_node.value_list_offset == NO_OFFSET || key_node.value_list_offset == 0 {
            return Ok(Vec::new());
        }

        // Value list is an array of offsets
        let list_data = self.hive.read_cell(key_node.value_list_offset)?;
        let value_count = key_node.value_count as usize;

        if list_data.len() < value_count * 4 {
            return Err(RegistryError::short_read(
                key_node.value_list_offset,
                value_count * 4,
                list_data.len(),
            ));
        }

        let mut values = Vec::new();
        for i in 0..value_count {
            let offset_pos = i * 4;
            let offset = u32::from_le_bytes([
                list_data[offset_pos],
                list_data[offset_pos + 1],
                list_data[offset_pos + 2],
                list_data[offset_pos + 3],
            ]);

            let value_key = self.hive.parse_value_key(offset)?;
            values.push(RegistryValue {
                hive: self.hive,
                value_key,
            });
        }

        Ok(values)
    }

    /// Returns all value names, in on-disk order (not sorted).
    ///
    /// Unlike subkeys, values are only ever linearly scanned; there is no
    /// documented ordering guarantee to preserve beyond file order, so none
    /// is imposed here.
    pub fn value_names(&self) -> Result<Vec<String>> {
        self.values()?.iter().map(|v| Ok(v.name().to_string())).collect()
    }

    /// Gets a specific value by name.
    ///
    /// A linear scan over the value list in on-disk order; the first entry
    /// with an exact (case-sensitive) name match wins. Unlike sub-key
    /// descent, value lookup has no documented case-folding rule, so names
    /// are compared as-is.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotExist`] if no value with that name exists.
    pub fn value(&self, name: &str) -> Result<RegistryValue<'a>> {
        let values = self.values()?;

        for value in values {
            if value.value_key.name == name {
                return Ok(value);
            }
        }

        Err(RegistryError::not_found("value", name))
    }
}

/// A registry value.
pub struct RegistryValue<'a> {
    hive: &'a Hive,
    value_key: ValueKey,
}

impl<'a> RegistryValue<'a> {
    /// Returns the value name.
    pub fn name(&self) -> &str {
        &self.value_key.name
    }

    /// Returns the value data type.
    pub fn data_type(&self) -> crate::cell::ValueType {
        self.value_key.data_type
    }

    /// Returns the parsed value data.
    pub fn data(&self) -> Result<ValueData> {
        let raw_data = self.raw_data()?;
        ValueData::parse(&raw_data, self.value_key.data_type, self.value_key.data_offset)
    }

    /// Returns the raw value data as bytes.
    pub fn raw_data(&self) -> Result<Vec<u8>> {
        if self.value_key.is_inline_data() {
            Ok(self.value_key.inline_data())
        } else if self.value_key.data_offset == NO_OFFSET || self.value_key.data_offset == 0 {
            Ok(Vec::new())
        } else {
            self.hive
                .read_value_data(self.value_key.data_offset, self.value_key.data_length)
        }
    }
}
