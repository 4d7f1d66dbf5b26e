//! The loader context: process image identity, module registry, and the
//! dynamic loading algorithm.
//!
//! [`Loader`] is the one stateful object of the subsystem. There is no hidden
//! process-wide singleton: the embedding emulator constructs a `Loader` per
//! emulated process (via [`LoaderBuilder`]) and passes it by reference into
//! every API operation.
//!
//! # Concurrency
//!
//! The registry and the fresh-base cursor live behind a single `RwLock`.
//! Queries take the read lock; loading takes the write lock across the whole
//! resolve-map-register sequence, so a concurrent execution context can never
//! observe a module whose base address is assigned but whose export table is
//! not yet populated. All operations are bounded, synchronous computations —
//! there are no suspension points, timeouts, or retries.
//!
//! # Example
//!
//! ```rust
//! use winldr::loader::{ExportEntry, ExportTable, LoaderBuilder, Module};
//! use winldr::memory::AddressSpace;
//!
//! let loader = LoaderBuilder::new("rootfs", 0x0040_0000, "D:\\sample.exe")
//!     .build();
//!
//! let exports: ExportTable = [ExportEntry {
//!     name: "GetVersion".into(),
//!     ordinal: 5,
//!     address: 0x76E1_0123,
//! }]
//! .into_iter()
//! .collect();
//! loader.register(Module::new("kernel32.dll", 0x76E1_0000, "kernel32.dll", exports))?;
//!
//! let mut mem = AddressSpace::new();
//! assert_eq!(loader.module_handle(Some("KERNEL32"), &mut mem)?, 0x76E1_0000);
//! assert_eq!(loader.module_handle(None, &mut mem)?, 0x0040_0000);
//! # Ok::<(), winldr::Error>(())
//! ```

use std::path::PathBuf;
use std::sync::RwLock;

use crate::{
    loader::{
        canonicalize, resolve_in_module, ImageSource, LibraryPath, Module, ModuleRegistry,
        PeImageSource, ProcRef,
    },
    memory::GuestMemory,
    trace::{LoaderEvent, NullSink, TraceSink},
    Error, Result,
};

/// Default guest address the first dynamically loaded library is mapped at.
const DEFAULT_LIBRARY_BASE: u64 = 0x7550_0000;

/// Windows allocation granularity; fresh bases advance in these steps.
const ALLOCATION_GRANULARITY: u64 = 0x1_0000;

/// Default library search directory below the rootfs.
const DEFAULT_LIBRARY_DIR: &str = "Windows/System32";

fn align_up(value: u64, align: u64) -> u64 {
    (value + align - 1) & !(align - 1)
}

/// Mutable loader state, guarded by one lock.
struct LoaderState {
    registry: ModuleRegistry,
    next_base: u64,
}

/// Builder for [`Loader`].
///
/// The rootfs, image base, and guest-visible image path are mandatory and
/// taken by [`new`](Self::new); everything else has defaults matching the
/// 32-bit samples this subsystem targets.
pub struct LoaderBuilder {
    rootfs: PathBuf,
    library_dir: PathBuf,
    image_base: u64,
    image_path: String,
    library_base: u64,
    pointer_size: usize,
    source: Box<dyn ImageSource>,
    trace: Box<dyn TraceSink>,
}

impl LoaderBuilder {
    /// Creates a builder for a process whose primary image is mapped at
    /// `image_base` and identified by the guest-visible `image_path`.
    #[must_use]
    pub fn new(rootfs: impl Into<PathBuf>, image_base: u64, image_path: impl Into<String>) -> Self {
        LoaderBuilder {
            rootfs: rootfs.into(),
            library_dir: PathBuf::from(DEFAULT_LIBRARY_DIR),
            image_base,
            image_path: image_path.into(),
            library_base: DEFAULT_LIBRARY_BASE,
            pointer_size: 4,
            source: Box::new(PeImageSource::new()),
            trace: Box::new(NullSink),
        }
    }

    /// Overrides the library search directory (relative to the rootfs).
    #[must_use]
    pub fn library_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.library_dir = dir.into();
        self
    }

    /// Overrides the base address fresh library mappings start at.
    #[must_use]
    pub fn library_base(mut self, base: u64) -> Self {
        self.library_base = base;
        self
    }

    /// Sets the guest pointer width in bytes (4 or 8). Defaults to 4.
    #[must_use]
    pub fn pointer_size(mut self, size: usize) -> Self {
        self.pointer_size = size;
        self
    }

    /// Replaces the image source used to map and parse library files.
    #[must_use]
    pub fn source(mut self, source: Box<dyn ImageSource>) -> Self {
        self.source = source;
        self
    }

    /// Attaches a diagnostic sink.
    #[must_use]
    pub fn trace(mut self, trace: Box<dyn TraceSink>) -> Self {
        self.trace = trace;
        self
    }

    /// Builds the loader and registers the primary module under the
    /// lower-cased base name of its image path.
    #[must_use]
    pub fn build(self) -> Loader {
        self.build_with_exports(crate::loader::ExportTable::new())
    }

    /// Like [`build`](Self::build), with the primary module's export table.
    ///
    /// Needed when the emulated program resolves symbols against itself.
    #[must_use]
    pub fn build_with_exports(self, exports: crate::loader::ExportTable) -> Loader {
        let image_name = basename(&self.image_path).to_lowercase();

        let mut registry = ModuleRegistry::new();
        let image_module = Module::new(
            image_name.clone(),
            self.image_base,
            self.image_path.clone(),
            exports,
        );
        // The primary module occupies a fresh registry; this cannot collide.
        registry
            .register(image_module)
            .expect("empty registry rejected the primary module");

        Loader {
            image_base: self.image_base,
            image_path: self.image_path,
            image_name,
            pointer_size: self.pointer_size,
            paths: LibraryPath::new(self.rootfs, self.library_dir),
            source: self.source,
            trace: self.trace,
            state: RwLock::new(LoaderState {
                registry,
                next_base: self.library_base,
            }),
        }
    }
}

/// Guest-path basename: the component after the last `\` or `/`.
fn basename(path: &str) -> &str {
    path.rsplit(['\\', '/']).next().unwrap_or(path)
}

/// The module loader and symbol-resolution context of one emulated process.
///
/// All `LoadLibrary*`/`GetModuleHandle*`/`GetProcAddress`/`GetModuleFileName*`
/// semantics are implemented against this object; the API handlers in
/// [`crate::api`] only marshal parameters and encode results.
pub struct Loader {
    image_base: u64,
    image_path: String,
    /// Lower-cased basename of the image path; the primary module's registry key.
    image_name: String,
    pointer_size: usize,
    paths: LibraryPath,
    source: Box<dyn ImageSource>,
    trace: Box<dyn TraceSink>,
    state: RwLock<LoaderState>,
}

impl Loader {
    /// Base address of the primary (entry) module.
    #[must_use]
    pub fn image_base(&self) -> u64 {
        self.image_base
    }

    /// Guest-visible path of the primary module.
    #[must_use]
    pub fn image_path(&self) -> &str {
        &self.image_path
    }

    /// Guest pointer width in bytes.
    #[must_use]
    pub fn pointer_size(&self) -> usize {
        self.pointer_size
    }

    /// Registers a module the embedding harness mapped itself (for example
    /// default system libraries placed at process start, with their bound
    /// import addresses).
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyRegistered`] on a name or base collision.
    pub fn register(&self, module: Module) -> Result<()> {
        write_lock!(self.state).registry.register(module)
    }

    /// Number of registered modules, including the primary image.
    #[must_use]
    pub fn module_count(&self) -> usize {
        read_lock!(self.state).registry.len()
    }

    /// Implements the `GetModuleHandle` contract.
    ///
    /// A null (`None`) name yields the image base. A registered name yields
    /// its stable base address. An unregistered name is late-bound through
    /// the dynamic loader, but only when the canonical name resolves to an
    /// existing file under the rootfs — this models system libraries mapped
    /// at process start that are not yet registry-visible under the queried
    /// alias. Otherwise the query fails with a null handle.
    ///
    /// # Errors
    ///
    /// Propagates guest memory or image parsing failures from a late bind.
    pub fn module_handle(
        &self,
        name: Option<&str>,
        mem: &mut dyn GuestMemory,
    ) -> Result<u64> {
        let Some(name) = name else {
            return Ok(self.image_base);
        };

        let canonical = canonicalize(name);
        if let Some(base) = read_lock!(self.state).registry.lookup(&canonical) {
            return Ok(base);
        }

        self.trace.record(LoaderEvent::ModuleNotRegistered {
            name: canonical.clone(),
        });

        if self.paths.resolve(&canonical).is_some() {
            self.load_library(&canonical, mem)
        } else {
            self.trace
                .record(LoaderEvent::ModuleNotFound { name: canonical });
            Ok(0)
        }
    }

    /// Implements the `LoadLibrary` contract.
    ///
    /// Loading is idempotent: a name already present in the registry returns
    /// its existing base address unchanged, indistinguishable from the first
    /// call. A request naming the process image's own path short-circuits to
    /// the image base — the same file is never mapped twice under two bases.
    /// An unresolvable name yields a null handle, not an error.
    ///
    /// # Errors
    ///
    /// Propagates image mapping and parsing failures; a merely missing file
    /// is reported through the trace sink and returns `Ok(0)`.
    pub fn load_library(&self, name: &str, mem: &mut dyn GuestMemory) -> Result<u64> {
        if name == self.image_path {
            return Ok(self.image_base);
        }

        let canonical = canonicalize(name);
        let mut state = write_lock!(self.state);

        if let Some(base) = state.registry.lookup(&canonical) {
            return Ok(base);
        }

        let Some(path) = self.paths.resolve(&canonical) else {
            self.trace
                .record(LoaderEvent::ModuleNotFound { name: canonical });
            return Ok(0);
        };

        let base = state.next_base;
        let image = self.source.load(&path, base, mem)?;
        state.next_base = align_up(base + image.size.max(1), ALLOCATION_GRANULARITY);

        state
            .registry
            .register(Module::new(canonical.clone(), base, path, image.exports))?;
        self.trace.record(LoaderEvent::ModuleLoaded {
            name: canonical,
            base,
        });

        Ok(base)
    }

    /// Implements the `GetProcAddress` contract.
    ///
    /// Denylisted names short-circuit to 0 before any table is consulted.
    /// The handle is reverse-mapped to its owning module; unknown handles and
    /// absent symbols resolve to 0 with a trace event, never an error.
    #[must_use]
    pub fn proc_address(&self, handle: u64, proc: &ProcRef) -> u64 {
        if proc.is_denylisted() {
            self.trace.record(LoaderEvent::SymbolSuppressed {
                name: proc.to_string(),
            });
            return 0;
        }

        let state = read_lock!(self.state);
        let Some(module) = state.registry.by_handle(handle) else {
            self.trace.record(LoaderEvent::UnknownModuleHandle {
                handle,
                symbol: proc.to_string(),
            });
            return 0;
        };

        let is_image = module.name == self.image_name;
        match resolve_in_module(module, proc, is_image) {
            Some(address) => address,
            None => {
                self.trace.record(LoaderEvent::SymbolNotFound {
                    module: module.name.clone(),
                    symbol: proc.to_string(),
                });
                0
            }
        }
    }

    /// Returns the image path serviced by `GetModuleFileName` for `handle`.
    ///
    /// Only the null handle and the image base are modeled; `GetModuleHandle`
    /// can return either for the primary module and samples pass both back.
    ///
    /// # Errors
    ///
    /// Any other handle is an [`Error::Unsupported`] condition: file names of
    /// secondary modules are not tracked, and silently returning a sentinel
    /// would mask a sample depending on them.
    pub fn module_file_name(&self, handle: u64) -> Result<&str> {
        if handle == 0 || handle == self.image_base {
            Ok(&self.image_path)
        } else {
            Err(Error::Unsupported {
                operation: "GetModuleFileName",
                handle,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::AddressSpace;
    use crate::test::{loader_with_kernel32, FakeImageSource, IMAGE_BASE, KERNEL32_BASE};
    use crate::trace::BufferSink;
    use std::sync::Arc;

    #[test]
    fn test_null_name_returns_image_base() {
        let loader = loader_with_kernel32();
        let mut mem = AddressSpace::new();
        assert_eq!(loader.module_handle(None, &mut mem).unwrap(), IMAGE_BASE);
    }

    #[test]
    fn test_module_handle_canonicalizes() {
        let loader = loader_with_kernel32();
        let mut mem = AddressSpace::new();

        for name in ["kernel32.dll", "KERNEL32.DLL", "Kernel32"] {
            assert_eq!(
                loader.module_handle(Some(name), &mut mem).unwrap(),
                KERNEL32_BASE,
                "alias {name} should hit the registry"
            );
        }
    }

    #[test]
    fn test_module_handle_unknown_name_is_null() {
        let loader = loader_with_kernel32();
        let mut mem = AddressSpace::new();
        assert_eq!(
            loader.module_handle(Some("nosuchlib"), &mut mem).unwrap(),
            0
        );
    }

    #[test]
    fn test_load_library_is_idempotent() {
        let (loader, _dir) = crate::test::loader_with_fake_fs();
        let mut mem = AddressSpace::new();

        let first = loader.load_library("fake.dll", &mut mem).unwrap();
        let second = loader.load_library("FAKE.DLL", &mut mem).unwrap();

        assert_ne!(first, 0);
        assert_eq!(first, second);
        assert_eq!(loader.module_count(), 2);
    }

    #[test]
    fn test_load_library_self_referential() {
        let loader = loader_with_kernel32();
        let mut mem = AddressSpace::new();

        let base = loader.load_library("D:\\sample.exe", &mut mem).unwrap();
        assert_eq!(base, IMAGE_BASE);
    }

    #[test]
    fn test_load_library_missing_traces_and_returns_null() {
        let sink = Arc::new(BufferSink::new());
        let loader = LoaderBuilder::new("/nonexistent", IMAGE_BASE, "D:\\sample.exe")
            .source(Box::new(FakeImageSource::default()))
            .trace(Box::new(SharedSink(Arc::clone(&sink))))
            .build();
        let mut mem = AddressSpace::new();

        assert_eq!(loader.load_library("ghost.dll", &mut mem).unwrap(), 0);
        let events = sink.drain();
        assert!(events
            .iter()
            .any(|e| matches!(e, LoaderEvent::ModuleNotFound { name } if name == "ghost.dll")));
    }

    #[test]
    fn test_fresh_bases_are_distinct_and_aligned() {
        let (loader, dir) = crate::test::loader_with_fake_fs();
        std::fs::write(dir.path_of("other.dll"), b"x").unwrap();
        let mut mem = AddressSpace::new();

        let first = loader.load_library("fake.dll", &mut mem).unwrap();
        let second = loader.load_library("other.dll", &mut mem).unwrap();

        assert_ne!(first, second);
        assert_eq!(first % ALLOCATION_GRANULARITY, 0);
        assert_eq!(second % ALLOCATION_GRANULARITY, 0);
    }

    #[test]
    fn test_module_file_name_contract() {
        let loader = loader_with_kernel32();

        assert_eq!(loader.module_file_name(0).unwrap(), "D:\\sample.exe");
        assert_eq!(
            loader.module_file_name(IMAGE_BASE).unwrap(),
            "D:\\sample.exe"
        );
        assert!(matches!(
            loader.module_file_name(KERNEL32_BASE),
            Err(Error::Unsupported { handle, .. }) if handle == KERNEL32_BASE
        ));
    }

    /// Forwards to a shared [`BufferSink`] so tests can inspect events.
    struct SharedSink(Arc<BufferSink>);

    impl TraceSink for SharedSink {
        fn record(&self, event: LoaderEvent) {
            self.0.record(event);
        }
    }
}
