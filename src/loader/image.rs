//! Library image mapping and export extraction.
//!
//! The dynamic loader is format-agnostic: it asks an [`ImageSource`] to place
//! a library file at a chosen base address and hand back the already-parsed
//! export table. [`PeImageSource`] is the default implementation, built on
//! `goblin` for the export directory and `memmap2` for file access; emulator
//! harnesses that pre-parse images or synthesize modules supply their own
//! source instead.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::{
    loader::{ExportEntry, ExportTable},
    memory::GuestMemory,
    Result,
};

/// A library image mapped into the virtual address space.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    /// Number of guest bytes the mapping occupies from its base address.
    pub size: u64,
    /// The image's parsed export table, addresses already rebased.
    pub exports: ExportTable,
}

/// Maps library files into guest memory and extracts their export tables.
///
/// This is the boundary to image-format parsing: the loader consumes parsed
/// exports and never interprets file bytes itself.
pub trait ImageSource: Send + Sync {
    /// Maps the file at `path` into guest memory based at `base` and returns
    /// the mapped size plus the export table with addresses rebased to `base`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not a valid image, or
    /// the guest mapping fails.
    fn load(&self, path: &Path, base: u64, mem: &mut dyn GuestMemory) -> Result<LoadedImage>;
}

/// PE-backed [`ImageSource`].
///
/// Memory-maps the library file, parses the export directory with `goblin`,
/// and maps the raw image bytes at the chosen base. Section-wise mapping with
/// protections is the embedding emulator's concern; for symbol resolution the
/// flat file image plus rebased export addresses is sufficient.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeImageSource;

impl PeImageSource {
    /// Creates a new PE image source.
    #[must_use]
    pub fn new() -> Self {
        PeImageSource
    }
}

impl ImageSource for PeImageSource {
    fn load(&self, path: &Path, base: u64, mem: &mut dyn GuestMemory) -> Result<LoadedImage> {
        let file = File::open(path)?;
        // The mapping must not outlive the file handle; Mmap keeps it alive.
        let data = unsafe { Mmap::map(&file)? };

        let pe = goblin::pe::PE::parse(&data)?;
        if pe.header.coff_header.machine == 0 {
            return Err(malformed_error!(
                "{} has no machine type",
                path.display()
            ));
        }

        // Export address table entries are ordered; the ordinal of entry `i`
        // is `ordinal_base + i`.
        let ordinal_base = pe
            .export_data
            .as_ref()
            .map_or(1, |data| data.export_directory_table.ordinal_base);

        let mut exports = ExportTable::new();
        for (index, export) in pe.exports.iter().enumerate() {
            let Some(name) = export.name else {
                continue;
            };
            #[allow(clippy::cast_possible_truncation)] // Export counts are 16-bit by format
            exports.insert(ExportEntry {
                name: name.to_string(),
                ordinal: (ordinal_base as usize + index) as u16,
                address: base + export.rva as u64,
            });
        }

        mem.map_at(base, &data)?;

        Ok(LoadedImage {
            size: data.len() as u64,
            exports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::AddressSpace;

    #[test]
    fn test_missing_file_is_io_error() {
        let mut space = AddressSpace::new();
        let source = PeImageSource::new();

        let result = source.load(Path::new("/nonexistent/missing.dll"), 0x1000_0000, &mut space);
        assert!(matches!(result, Err(crate::Error::FileError(_))));
    }

    #[test]
    fn test_garbage_file_is_parse_error() {
        let dir = std::env::temp_dir().join("winldr-image-tests");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("garbage.dll");
        std::fs::write(&path, b"this is not a portable executable").unwrap();

        let mut space = AddressSpace::new();
        let source = PeImageSource::new();

        let result = source.load(&path, 0x1000_0000, &mut space);
        assert!(result.is_err());
        assert!(!space.is_mapped(0x1000_0000));
    }
}
