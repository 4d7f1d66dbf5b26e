//! Module data model: export tables and import-address-tables.
//!
//! A [`Module`] is one loaded library or executable image inside the emulated
//! process. Its identity is the pair of a normalized (lower-cased) file name
//! and a base address; module handles at the API boundary *are* base
//! addresses. Symbol material comes in two tables:
//!
//! - [`ExportTable`] - the `(name, ordinal, address)` triples the module makes
//!   available, with O(1) lookup by either key
//! - [`ImportAddressTable`] - addresses that imports *from* this module were
//!   bound to when the process image was prepared; consulted when the
//!   module's own export directory was never parsed

use std::collections::HashMap;
use std::path::PathBuf;

/// A single exported symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportEntry {
    /// Export name; unique within one module.
    pub name: String,
    /// Export ordinal; unique within one module.
    pub ordinal: u16,
    /// Resolved guest address of the symbol.
    pub address: u64,
}

/// The set of symbols a module makes available to callers.
///
/// Entries keep their insertion order (the order of the export directory);
/// name and ordinal lookups are O(1). Duplicate names or ordinals are ignored
/// on insert — the first definition wins, matching how the OS loader reads a
/// damaged export directory.
///
/// # Example
///
/// ```rust
/// use winldr::loader::{ExportEntry, ExportTable};
///
/// let mut exports = ExportTable::new();
/// exports.insert(ExportEntry {
///     name: "GetVersion".into(),
///     ordinal: 5,
///     address: 0x76E1_0123,
/// });
///
/// assert_eq!(exports.by_name("GetVersion").unwrap().address, 0x76E1_0123);
/// assert_eq!(exports.by_ordinal(5).unwrap().name, "GetVersion");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExportTable {
    entries: Vec<ExportEntry>,
    by_name: HashMap<String, usize>,
    by_ordinal: HashMap<u16, usize>,
}

impl ExportTable {
    /// Creates an empty export table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an export. Entries whose name or ordinal is already present are
    /// dropped.
    pub fn insert(&mut self, entry: ExportEntry) {
        if self.by_name.contains_key(&entry.name) || self.by_ordinal.contains_key(&entry.ordinal) {
            return;
        }

        let index = self.entries.len();
        self.by_name.insert(entry.name.clone(), index);
        self.by_ordinal.insert(entry.ordinal, index);
        self.entries.push(entry);
    }

    /// Looks up an export by name. Export names are case-sensitive.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&ExportEntry> {
        self.by_name.get(name).map(|&index| &self.entries[index])
    }

    /// Looks up an export by ordinal.
    #[must_use]
    pub fn by_ordinal(&self, ordinal: u16) -> Option<&ExportEntry> {
        self.by_ordinal
            .get(&ordinal)
            .map(|&index| &self.entries[index])
    }

    /// Number of exports in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table holds no exports.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates the exports in directory order.
    pub fn iter(&self) -> impl Iterator<Item = &ExportEntry> {
        self.entries.iter()
    }
}

impl FromIterator<ExportEntry> for ExportTable {
    fn from_iter<I: IntoIterator<Item = ExportEntry>>(iter: I) -> Self {
        let mut table = ExportTable::new();
        for entry in iter {
            table.insert(entry);
        }
        table
    }
}

/// Bound import addresses, keyed by imported symbol name.
///
/// When the process image is prepared, every symbol it imports is bound to a
/// concrete guest address. Those bindings are recorded per exporting module;
/// `GetProcAddress` falls back to them for modules that were mapped at
/// process start without a parsed export directory.
#[derive(Debug, Clone, Default)]
pub struct ImportAddressTable {
    bindings: HashMap<String, u64>,
}

impl ImportAddressTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `name` was bound to `address`. Rebinding replaces the
    /// previous address.
    pub fn bind(&mut self, name: impl Into<String>, address: u64) {
        self.bindings.insert(name.into(), address);
    }

    /// Returns the bound address for `name`, if any.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<u64> {
        self.bindings.get(name).copied()
    }

    /// Number of bound imports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` if no imports are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl FromIterator<(String, u64)> for ImportAddressTable {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        let mut table = ImportAddressTable::new();
        for (name, address) in iter {
            table.bind(name, address);
        }
        table
    }
}

/// One loaded module inside the emulated process.
#[derive(Debug, Clone)]
pub struct Module {
    /// Normalized (lower-cased, extension-bearing) file name; the registry key.
    pub name: String,
    /// Base address the image is mapped at; doubles as the module handle.
    pub base_address: u64,
    /// Fully resolved path the module's bytes were loaded from.
    pub file_path: PathBuf,
    /// Symbols this module exports.
    pub exports: ExportTable,
    /// Addresses that imports from this module were bound to.
    pub iat: ImportAddressTable,
}

impl Module {
    /// Creates a module with an empty import-address-table.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        base_address: u64,
        file_path: impl Into<PathBuf>,
        exports: ExportTable,
    ) -> Self {
        Module {
            name: name.into(),
            base_address,
            file_path: file_path.into(),
            exports,
            iat: ImportAddressTable::new(),
        }
    }

    /// Attaches bound import addresses, builder style.
    #[must_use]
    pub fn with_iat(mut self, iat: ImportAddressTable) -> Self {
        self.iat = iat;
        self
    }
}
