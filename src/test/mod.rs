//! Shared fixtures for unit tests.
//!
//! Builders for loaders with a known module population, a fake image source
//! that needs no real PE files, and throwaway rootfs directories for the
//! path-resolution and dynamic-loading paths.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::loader::{
    ExportEntry, ExportTable, ImageSource, ImportAddressTable, LoadedImage, Loader, LoaderBuilder,
    Module,
};
use crate::memory::GuestMemory;
use crate::Result;

/// Base address of the test process image.
pub(crate) const IMAGE_BASE: u64 = 0x0040_0000;

/// Guest-visible path of the test process image.
pub(crate) const IMAGE_PATH: &str = "D:\\sample.exe";

/// Base address `kernel32.dll` is registered at in fixtures.
pub(crate) const KERNEL32_BASE: u64 = 0x76E1_0000;

/// Address of the `GetVersion` export in fixtures.
pub(crate) const GETVERSION_ADDR: u64 = 0x76E1_0123;

/// An [`ImageSource`] that fabricates a small image instead of parsing files.
///
/// Maps a zero-filled page at the requested base and exports one symbol,
/// `FakeProc` (ordinal 1), at `base + 0x10`.
#[derive(Debug, Default)]
pub(crate) struct FakeImageSource;

impl ImageSource for FakeImageSource {
    fn load(&self, _path: &std::path::Path, base: u64, mem: &mut dyn GuestMemory) -> Result<LoadedImage> {
        mem.map_at(base, &[0u8; 0x200])?;

        let exports: ExportTable = [ExportEntry {
            name: "FakeProc".into(),
            ordinal: 1,
            address: base + 0x10,
        }]
        .into_iter()
        .collect();

        Ok(LoadedImage {
            size: 0x200,
            exports,
        })
    }
}

/// The canonical fixture module: `kernel32.dll` with the `GetVersion` export
/// and one bound import.
pub(crate) fn kernel32_module() -> Module {
    let exports: ExportTable = [ExportEntry {
        name: "GetVersion".into(),
        ordinal: 5,
        address: GETVERSION_ADDR,
    }]
    .into_iter()
    .collect();

    let iat: ImportAddressTable = [("HeapAlloc".to_string(), 0x76E2_0000)]
        .into_iter()
        .collect();

    Module::new("kernel32.dll", KERNEL32_BASE, "kernel32.dll", exports).with_iat(iat)
}

/// A loader over a nonexistent rootfs with `kernel32.dll` preregistered.
pub(crate) fn loader_with_kernel32() -> Loader {
    let loader = LoaderBuilder::new("/nonexistent-rootfs", IMAGE_BASE, IMAGE_PATH)
        .source(Box::new(FakeImageSource))
        .build();
    loader
        .register(kernel32_module())
        .expect("fixture registration cannot collide");
    loader
}

/// A throwaway rootfs directory with a `Windows/System32` library dir.
pub(crate) struct TestDir {
    lib_dir: PathBuf,
}

impl TestDir {
    /// Path of `name` inside the library directory.
    pub(crate) fn path_of(&self, name: &str) -> PathBuf {
        self.lib_dir.join(name)
    }
}

/// A loader over a real (temporary) rootfs containing `fake.dll`, backed by
/// [`FakeImageSource`] so file contents never matter.
pub(crate) fn loader_with_fake_fs() -> (Loader, TestDir) {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    let root = std::env::temp_dir().join(format!(
        "winldr-test-{}-{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    let lib_dir = root.join("Windows").join("System32");
    std::fs::create_dir_all(&lib_dir).expect("failed to create test rootfs");
    std::fs::write(lib_dir.join("fake.dll"), b"stub").expect("failed to seed test rootfs");

    let loader = LoaderBuilder::new(&root, IMAGE_BASE, IMAGE_PATH)
        .source(Box::new(FakeImageSource))
        .build();

    (loader, TestDir { lib_dir })
}
