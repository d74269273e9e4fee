//! # Windows Registry Hive Parser
//!
//! A read-only Windows registry hive parser written in Rust.
//!
//! ## Features
//!
//! - **Fast parsing**: Memory-mapped I/O for efficient, zero-copy access
//! - **Complete support**: Handles all common registry hive formats (SYSTEM, SOFTWARE, SAM, SECURITY, NTUSER.DAT, etc.)
//! - **Type-safe**: Strong typing for registry values and structures
//! - **Lazy evaluation**: Parses structures only when accessed
//! - **Comprehensive error handling**: Detailed error types for debugging
//!
//! ## Architecture
//!
//! The parser is built on several layers:
//!
//! 1. **Header**: Contains hive metadata and root key offset
//! 2. **Hive Bins (hbin)**: 4KB-aligned blocks containing cells
//! 3. **Cells**: Variable-sized structures (keys, values, lists, etc.)
//! 4. **Key Nodes (nk)**: Registry keys with subkeys and values
//! 5. **Value Keys (vk)**: Registry values with typed data
//! 6. **Subkey Lists (lf/lh/li/ri)**: Efficient subkey organization
//!
//! On top of this engine sits [`registry`], the facade most callers should
//! reach for: [`registry::Registry`] opens a hive and hands out
//! [`registry::Key`] handles with a small, opinionated API (`get_string`,
//! `get_integer`, `read_sub_key_names`, ...). The lower-level [`hive::Hive`]
//! and [`hive::RegistryKey`] remain available for callers who want direct
//! access to cell offsets and raw value bytes.
//!
//! ## Binary Layout
//!
//! Registry hives follow this structure:
//!
//! ```text
//! [Header - 4KB]
//!   - Signature: "regf"
//!   - Version, timestamps, root offset
//!   - Checksum
//!
//! [Hive Bins - variable size, 4KB aligned]
//!   [Hbin Header - 32 bytes]
//!     - Signature: "hbin"
//!     - Offset, size
//!
//!   [Cells - variable size]
//!     [Cell Size - 4 bytes, negative if allocated]
//!     [Cell Data]
//!       - Key nodes (nk)
//!       - Value keys (vk)
//!       - Subkey lists (lf/lh/li/ri)
//!       - Security descriptors (sk)
//! ```
//!
//! ## Examples
//!
//! ### Using the `Registry`/`Key` facade
//!
//! ```no_run
//! use reg_parser::registry::Registry;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Registry::open("SYSTEM")?;
//! let key = registry.open_key(r"ControlSet001\Control")?;
//!
//! for name in key.read_sub_key_names(None)? {
//!     println!("  Subkey: {}", name);
//! }
//!
//! for name in key.read_value_names(None)? {
//!     println!("  Value: {}", name);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Using the lower-level `Hive` API
//!
//! ```no_run
//! use reg_parser::{Hive, ValueData};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let hive = Hive::open("SOFTWARE")?;
//! let root = hive.root_key()?;
//!
//! let microsoft = root.open_sub_key("Microsoft")?;
//! for value in microsoft.values()? {
//!     match value.data()? {
//!         ValueData::String(s) => println!("String value: {}", s),
//!         ValueData::Dword(d) => println!("DWORD value: {}", d),
//!         _ => println!("Other type"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Supported Features
//!
//! - Full registry hive parsing (SYSTEM, SOFTWARE, SAM, SECURITY, NTUSER.DAT, etc.)
//! - All common value types (REG_SZ, REG_DWORD, REG_BINARY, REG_MULTI_SZ, REG_QWORD, etc.)
//! - Subkey enumeration with efficient list structures (lf/lh/li/ri)
//! - Big data block (db) support for values > 16KB
//!
//! ## Non-goals
//!
//! - Write support: this crate is read-only.
//! - Transaction log (.LOG1/.LOG2) replay: a hive is parsed exactly as it
//!   sits on disk, with no attempt to apply uncommitted log entries.
//! - Security descriptor (sk) parsing beyond locating the cell.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bigdata;
pub mod cell;
pub mod error;
pub mod hbin;
pub mod header;
pub mod hive;
pub mod key;
pub mod registry;
pub mod subkey_list;
pub mod utils;
pub mod value;

// Re-export main types for convenience
pub use cell::{CellType, KeyNodeFlags, ValueType};
pub use error::{BadRegistryCause, RegistryError, Result};
pub use hbin::HbinHeader;
pub use header::HiveHeader;
pub use hive::{HbinIterator, Hive, RegistryKey, RegistryValue};
pub use key::KeyNode;
pub use registry::{open_key, Key, Registry};
pub use subkey_list::{SubkeyList, SubkeyListEntry, SubkeyListType};
pub use value::{ValueData, ValueKey};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
