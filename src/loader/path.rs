//! Library name canonicalization and virtual-filesystem path resolution.
//!
//! The loader sees library names the way the guest supplies them: any casing,
//! with or without an extension. [`canonicalize`] folds them to the single
//! registry key form (lower-cased, `.dll` appended when no recognized library
//! extension is present). [`LibraryPath`] then maps a canonical name onto the
//! virtual filesystem root the emulated process runs against.
//!
//! Resolution is existence-checked and returns an [`Option`]: a missing file
//! is a normal outcome the caller turns into a null handle, not an error.

use std::path::{Path, PathBuf};

/// File extensions recognized as loadable library images.
pub const LIBRARY_EXTENSIONS: &[&str] = &[".dll", ".exe", ".sys", ".drv"];

/// Returns `true` when `name` already carries a recognized library extension.
#[must_use]
pub fn is_library_name(name: &str) -> bool {
    let lowered = name.to_lowercase();
    LIBRARY_EXTENSIONS
        .iter()
        .any(|extension| lowered.ends_with(extension))
}

/// Canonicalizes a guest-supplied library name.
///
/// Lower-cases the name and appends `.dll` when no recognized library
/// extension is present, mirroring the default the OS loader applies to
/// extension-less `LoadLibrary` arguments.
///
/// # Example
///
/// ```rust
/// use winldr::loader::canonicalize;
///
/// assert_eq!(canonicalize("KERNEL32"), "kernel32.dll");
/// assert_eq!(canonicalize("User32.dll"), "user32.dll");
/// assert_eq!(canonicalize("winspool.drv"), "winspool.drv");
/// ```
#[must_use]
pub fn canonicalize(name: &str) -> String {
    let mut canonical = name.to_lowercase();
    if !is_library_name(&canonical) {
        canonical.push_str(".dll");
    }
    canonical
}

/// Maps canonical library names onto the virtual filesystem.
///
/// Library files live under a single search directory below the configured
/// rootfs (the emulated `C:` drive). There is no search-path walk beyond
/// that — path translation outside this one join is the sandbox layer's
/// concern, not the loader's.
#[derive(Debug, Clone)]
pub struct LibraryPath {
    rootfs: PathBuf,
    library_dir: PathBuf,
}

impl LibraryPath {
    /// Creates a resolver for `rootfs` with the given library search
    /// directory (relative to the rootfs, e.g. `Windows/System32`).
    #[must_use]
    pub fn new(rootfs: impl Into<PathBuf>, library_dir: impl Into<PathBuf>) -> Self {
        LibraryPath {
            rootfs: rootfs.into(),
            library_dir: library_dir.into(),
        }
    }

    /// The configured virtual filesystem root.
    #[must_use]
    pub fn rootfs(&self) -> &Path {
        &self.rootfs
    }

    /// Resolves a canonical library name to an on-disk path.
    ///
    /// Returns `None` when the computed path does not exist; the caller
    /// decides whether that is fatal.
    #[must_use]
    pub fn resolve(&self, canonical_name: &str) -> Option<PathBuf> {
        let path = self.rootfs.join(&self.library_dir).join(canonical_name);
        path.exists().then_some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_library_name() {
        assert!(is_library_name("kernel32.dll"));
        assert!(is_library_name("SAMPLE.EXE"));
        assert!(is_library_name("winspool.drv"));
        assert!(is_library_name("ntoskrnl.sys"));
        assert!(!is_library_name("kernel32"));
        assert!(!is_library_name("data.bin"));
    }

    #[test]
    fn test_canonicalize_appends_default_extension() {
        assert_eq!(canonicalize("advapi32"), "advapi32.dll");
        assert_eq!(canonicalize("ADVAPI32.DLL"), "advapi32.dll");
        assert_eq!(canonicalize("setup.exe"), "setup.exe");
    }

    #[test]
    fn test_resolve_missing_file_is_none() {
        let paths = LibraryPath::new("/nonexistent-rootfs", "Windows/System32");
        assert!(paths.resolve("kernel32.dll").is_none());
    }

    #[test]
    fn test_resolve_existing_file() {
        // The crate's own manifest stands in for a library file on disk.
        let paths = LibraryPath::new(env!("CARGO_MANIFEST_DIR"), "");
        let resolved = paths.resolve("Cargo.toml");
        assert!(resolved.is_some());
    }
}
