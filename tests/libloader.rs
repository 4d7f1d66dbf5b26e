//! Integration tests for the library-loader API surface.
//!
//! These tests drive the dispatch table the way an embedding emulator would:
//! raw machine words in, single machine-word results out, every guest access
//! through an [`AddressSpace`]. Covered contracts:
//! - `GetModuleHandle` null/name/alias resolution and stability
//! - `LoadLibrary` idempotence and the self-referential short-circuit
//! - `GetProcAddress` ordinal-vs-name duality and the symbol denylist
//! - `GetModuleFileName` truncation in both character widths
//! - the unsupported-operation condition
//! - the resource stubs

use winldr::api::{ApiOp, ApiParams, ApiTable, ApiValue, SYNTHETIC_RESOURCE_SIZE};
use winldr::loader::{
    ExportEntry, ExportTable, ImageSource, LoadedImage, Loader, LoaderBuilder, Module,
};
use winldr::memory::{AddressSpace, GuestMemory, StringWidth};
use winldr::{Error, Result};

const IMAGE_BASE: u64 = 0x0040_0000;
const IMAGE_PATH: &str = "D:\\sample.exe";
const KERNEL32_BASE: u64 = 0x76E1_0000;
const GETVERSION_ADDR: u64 = 0x76E1_0123;

/// Guest address of the scratch region tests place strings in.
const SCRATCH: u64 = 0x0030_0000;
/// Guest address of the output buffer region.
const OUT_BUF: u64 = 0x0020_0000;

/// Image source that fabricates a one-page image with a single export, so no
/// real PE files are needed on the fake rootfs.
struct StubSource;

impl ImageSource for StubSource {
    fn load(&self, _path: &std::path::Path, base: u64, mem: &mut dyn GuestMemory) -> Result<LoadedImage> {
        mem.map_at(base, &[0u8; 0x1000])?;
        let exports: ExportTable = [ExportEntry {
            name: "StubProc".into(),
            ordinal: 1,
            address: base + 0x40,
        }]
        .into_iter()
        .collect();
        Ok(LoadedImage {
            size: 0x1000,
            exports,
        })
    }
}

/// Builds the canonical scenario: a loader with `kernel32.dll` registered at
/// `0x76E10000` exporting `("GetVersion", ordinal 5, 0x76E10123)` (plus the
/// denylisted `RtlComputeCrc32`, to prove the denylist wins over the table),
/// an address space with scratch and output regions, and the dispatch table.
fn scenario() -> (ApiTable, Loader, AddressSpace) {
    let loader = LoaderBuilder::new("/nonexistent-rootfs", IMAGE_BASE, IMAGE_PATH)
        .source(Box::new(StubSource))
        .build();

    let exports: ExportTable = [
        ExportEntry {
            name: "GetVersion".into(),
            ordinal: 5,
            address: GETVERSION_ADDR,
        },
        ExportEntry {
            name: "RtlComputeCrc32".into(),
            ordinal: 9,
            address: 0x76E1_0200,
        },
    ]
    .into_iter()
    .collect();
    loader
        .register(Module::new(
            "kernel32.dll",
            KERNEL32_BASE,
            "kernel32.dll",
            exports,
        ))
        .unwrap();

    let mut mem = AddressSpace::new();
    mem.map_at(SCRATCH, &[0u8; 0x1000]).unwrap();
    mem.map_at(OUT_BUF, &[0u8; 0x1000]).unwrap();

    (ApiTable::new(), loader, mem)
}

/// Writes a NUL-terminated string into the scratch region and returns its
/// guest address.
fn place_string(mem: &mut AddressSpace, offset: u64, width: StringWidth, value: &str) -> u64 {
    let address = SCRATCH + offset;
    let mut bytes = width.encode(value);
    bytes.extend_from_slice(width.terminator());
    mem.write(address, &bytes).unwrap();
    address
}

/// A rootfs directory on the real filesystem, populated with stub library
/// files whose contents never matter.
fn stub_rootfs(files: &[&str]) -> std::path::PathBuf {
    use std::sync::atomic::{AtomicUsize, Ordering};
    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    let root = std::env::temp_dir().join(format!(
        "winldr-it-{}-{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    let lib_dir = root.join("Windows").join("System32");
    std::fs::create_dir_all(&lib_dir).unwrap();
    for file in files {
        std::fs::write(lib_dir.join(file), b"stub").unwrap();
    }
    root
}

#[test]
fn get_module_handle_null_returns_image_base() -> Result<()> {
    let (table, loader, mut mem) = scenario();

    let base = table.invoke(ApiOp::GetModuleHandleA, &loader, &mut mem, &[0])?;
    assert_eq!(base, IMAGE_BASE);

    let base = table.invoke(ApiOp::GetModuleHandleW, &loader, &mut mem, &[0])?;
    assert_eq!(base, IMAGE_BASE);
    Ok(())
}

#[test]
fn get_module_handle_resolves_registered_aliases() -> Result<()> {
    let (table, loader, mut mem) = scenario();

    for (offset, alias) in ["kernel32.dll", "KERNEL32.DLL", "Kernel32"].iter().enumerate() {
        let name = place_string(&mut mem, offset as u64 * 0x40, StringWidth::Ansi, alias);
        let base = table.invoke(ApiOp::GetModuleHandleA, &loader, &mut mem, &[name])?;
        assert_eq!(base, KERNEL32_BASE, "alias {alias}");
    }

    // Stability: the same query answered twice yields the same handle.
    let name = place_string(&mut mem, 0x200, StringWidth::Wide, "kernel32");
    let first = table.invoke(ApiOp::GetModuleHandleW, &loader, &mut mem, &[name])?;
    let second = table.invoke(ApiOp::GetModuleHandleW, &loader, &mut mem, &[name])?;
    assert_eq!(first, KERNEL32_BASE);
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn get_module_handle_unknown_name_is_null() -> Result<()> {
    let (table, loader, mut mem) = scenario();

    let name = place_string(&mut mem, 0, StringWidth::Ansi, "nosuchlib.dll");
    let base = table.invoke(ApiOp::GetModuleHandleA, &loader, &mut mem, &[name])?;
    assert_eq!(base, 0);
    Ok(())
}

#[test]
fn get_module_handle_late_binds_from_rootfs() -> Result<()> {
    let root = stub_rootfs(&["advapi32.dll"]);
    let loader = LoaderBuilder::new(&root, IMAGE_BASE, IMAGE_PATH)
        .source(Box::new(StubSource))
        .build();
    let table = ApiTable::new();
    let mut mem = AddressSpace::new();
    mem.map_at(SCRATCH, &[0u8; 0x1000]).unwrap();

    // Not registered, but present on the virtual filesystem: the query
    // falls through to the dynamic loader and self-registers the module.
    let name = place_string(&mut mem, 0, StringWidth::Ansi, "ADVAPI32");
    let base = table.invoke(ApiOp::GetModuleHandleA, &loader, &mut mem, &[name])?;
    assert_ne!(base, 0);

    // The late bind is now registry-visible and stable.
    let again = table.invoke(ApiOp::GetModuleHandleA, &loader, &mut mem, &[name])?;
    assert_eq!(base, again);
    Ok(())
}

#[test]
fn get_module_handle_ex_writes_through_pointer() -> Result<()> {
    let (table, loader, mut mem) = scenario();

    let name = place_string(&mut mem, 0, StringWidth::Wide, "kernel32.dll");
    let out = OUT_BUF + 0x100;
    let result = table.invoke(
        ApiOp::GetModuleHandleExW,
        &loader,
        &mut mem,
        &[0, name, out],
    )?;
    assert_eq!(result, 1);

    let written = mem.read(out, loader.pointer_size())?;
    assert_eq!(written, KERNEL32_BASE.to_le_bytes()[..loader.pointer_size()]);
    Ok(())
}

#[test]
fn load_library_is_idempotent() -> Result<()> {
    let root = stub_rootfs(&["crypt32.dll"]);
    let loader = LoaderBuilder::new(&root, IMAGE_BASE, IMAGE_PATH)
        .source(Box::new(StubSource))
        .build();
    let table = ApiTable::new();
    let mut mem = AddressSpace::new();
    mem.map_at(SCRATCH, &[0u8; 0x1000]).unwrap();

    let name_a = place_string(&mut mem, 0, StringWidth::Ansi, "crypt32.dll");
    let name_w = place_string(&mut mem, 0x80, StringWidth::Wide, "CRYPT32");

    let first = table.invoke(ApiOp::LoadLibraryA, &loader, &mut mem, &[name_a])?;
    let second = table.invoke(ApiOp::LoadLibraryW, &loader, &mut mem, &[name_w])?;
    let third = table.invoke(ApiOp::LoadLibraryExA, &loader, &mut mem, &[name_a, 0, 0])?;

    assert_ne!(first, 0);
    assert_eq!(first, second);
    assert_eq!(first, third);
    Ok(())
}

#[test]
fn load_library_self_reference_returns_image_base() -> Result<()> {
    let (table, loader, mut mem) = scenario();

    let name = place_string(&mut mem, 0, StringWidth::Ansi, IMAGE_PATH);
    let base = table.invoke(ApiOp::LoadLibraryA, &loader, &mut mem, &[name])?;
    assert_eq!(base, IMAGE_BASE);
    Ok(())
}

#[test]
fn load_library_missing_file_is_null() -> Result<()> {
    let (table, loader, mut mem) = scenario();

    let name = place_string(&mut mem, 0, StringWidth::Wide, "ghost.dll");
    let base = table.invoke(ApiOp::LoadLibraryExW, &loader, &mut mem, &[name, 0, 0])?;
    assert_eq!(base, 0);
    Ok(())
}

#[test]
fn get_proc_address_resolves_ordinal_and_name() -> Result<()> {
    let (table, loader, mut mem) = scenario();

    // Ordinal path: any value up to 0xFFFF is a literal ordinal.
    let by_ordinal = table.invoke(
        ApiOp::GetProcAddress,
        &loader,
        &mut mem,
        &[KERNEL32_BASE, 5],
    )?;
    assert_eq!(by_ordinal, GETVERSION_ADDR);

    // Name path: values above 0xFFFF are pointers to a name string.
    let name = place_string(&mut mem, 0, StringWidth::Ansi, "GetVersion");
    assert!(name > 0xFFFF);
    let by_name = table.invoke(
        ApiOp::GetProcAddress,
        &loader,
        &mut mem,
        &[KERNEL32_BASE, name],
    )?;
    assert_eq!(by_name, GETVERSION_ADDR);
    Ok(())
}

#[test]
fn get_proc_address_misses_return_null() -> Result<()> {
    let (table, loader, mut mem) = scenario();

    // Unknown handle.
    let name = place_string(&mut mem, 0, StringWidth::Ansi, "GetVersion");
    let result = table.invoke(
        ApiOp::GetProcAddress,
        &loader,
        &mut mem,
        &[0xDEAD_0000, name],
    )?;
    assert_eq!(result, 0);

    // Known handle, absent symbol.
    let missing = place_string(&mut mem, 0x80, StringWidth::Ansi, "NoSuchExport");
    let result = table.invoke(
        ApiOp::GetProcAddress,
        &loader,
        &mut mem,
        &[KERNEL32_BASE, missing],
    )?;
    assert_eq!(result, 0);

    // Absent ordinal.
    let result = table.invoke(
        ApiOp::GetProcAddress,
        &loader,
        &mut mem,
        &[KERNEL32_BASE, 77],
    )?;
    assert_eq!(result, 0);
    Ok(())
}

#[test]
fn get_proc_address_denylist_wins_over_export_table() -> Result<()> {
    let (table, loader, mut mem) = scenario();

    // The scenario registers RtlComputeCrc32 as a real export; the denylist
    // must still answer 0.
    let name = place_string(&mut mem, 0, StringWidth::Ansi, "RtlComputeCrc32");
    let result = table.invoke(
        ApiOp::GetProcAddress,
        &loader,
        &mut mem,
        &[KERNEL32_BASE, name],
    )?;
    assert_eq!(result, 0);
    Ok(())
}

#[test]
fn get_module_file_name_full_copy() -> Result<()> {
    let (table, loader, mut mem) = scenario();

    let path_len = IMAGE_PATH.len() as u64;
    let written = table.invoke(
        ApiOp::GetModuleFileNameA,
        &loader,
        &mut mem,
        &[0, OUT_BUF, 64],
    )?;
    assert_eq!(written, path_len);

    let bytes = mem.read(OUT_BUF, IMAGE_PATH.len() + 1)?;
    assert_eq!(&bytes[..IMAGE_PATH.len()], IMAGE_PATH.as_bytes());
    assert_eq!(bytes[IMAGE_PATH.len()], 0);

    // The image base handle behaves exactly like the null handle.
    let via_base = table.invoke(
        ApiOp::GetModuleFileNameA,
        &loader,
        &mut mem,
        &[IMAGE_BASE, OUT_BUF, 64],
    )?;
    assert_eq!(via_base, path_len);
    Ok(())
}

#[test]
fn get_module_file_name_truncates_to_capacity() -> Result<()> {
    let (table, loader, mut mem) = scenario();

    let n_size = 5u64;
    let written = table.invoke(
        ApiOp::GetModuleFileNameA,
        &loader,
        &mut mem,
        &[0, OUT_BUF, n_size],
    )?;
    assert_eq!(written, n_size);

    // Exactly nSize bytes: nSize-1 characters plus the terminator.
    let bytes = mem.read(OUT_BUF, n_size as usize)?;
    assert_eq!(&bytes[..4], &IMAGE_PATH.as_bytes()[..4]);
    assert_eq!(bytes[4], 0);
    Ok(())
}

#[test]
fn get_module_file_name_wide_counts_wide_characters() -> Result<()> {
    let (table, loader, mut mem) = scenario();

    // Full copy: the return value counts characters, not bytes.
    let written = table.invoke(
        ApiOp::GetModuleFileNameW,
        &loader,
        &mut mem,
        &[0, OUT_BUF, 64],
    )?;
    assert_eq!(written, IMAGE_PATH.len() as u64);

    let expected = StringWidth::Wide.encode(IMAGE_PATH);
    let bytes = mem.read(OUT_BUF, expected.len() + 2)?;
    assert_eq!(&bytes[..expected.len()], expected.as_slice());
    assert_eq!(&bytes[expected.len()..], &[0, 0]);

    // Truncated copy: nSize counted in wide characters, terminator included.
    let n_size = 6u64;
    let written = table.invoke(
        ApiOp::GetModuleFileNameW,
        &loader,
        &mut mem,
        &[0, OUT_BUF, n_size],
    )?;
    assert_eq!(written, n_size);

    let bytes = mem.read(OUT_BUF, n_size as usize * 2)?;
    assert_eq!(&bytes[..10], &expected[..10]);
    assert_eq!(&bytes[10..], &[0, 0]);
    Ok(())
}

#[test]
fn get_module_file_name_foreign_handle_is_unsupported() {
    let (table, loader, mut mem) = scenario();

    let result = table.invoke(
        ApiOp::GetModuleFileNameA,
        &loader,
        &mut mem,
        &[KERNEL32_BASE, OUT_BUF, 64],
    );
    assert!(matches!(
        result,
        Err(Error::Unsupported { operation: "GetModuleFileName", handle }) if handle == KERNEL32_BASE
    ));

    let result = table.invoke(
        ApiOp::GetModuleFileNameW,
        &loader,
        &mut mem,
        &[0x1234_5678, OUT_BUF, 64],
    );
    assert!(matches!(result, Err(Error::Unsupported { .. })));
}

#[test]
fn resource_stubs_are_fixed_and_pass_through() -> Result<()> {
    let (table, loader, mut mem) = scenario();

    for handles in [[0u64, 0x11], [KERNEL32_BASE, 0x5000_0000], [7, 7]] {
        let size = table.invoke(ApiOp::SizeofResource, &loader, &mut mem, &handles)?;
        assert_eq!(size, SYNTHETIC_RESOURCE_SIZE);
    }

    let data = table.invoke(
        ApiOp::LoadResource,
        &loader,
        &mut mem,
        &[KERNEL32_BASE, 0x5000_0000],
    )?;
    assert_eq!(data, 0x5000_0000);

    let locked = table.invoke(ApiOp::LockResource, &loader, &mut mem, &[data])?;
    assert_eq!(locked, data);
    Ok(())
}

#[test]
fn dispatch_accepts_prebuilt_parameter_maps() -> Result<()> {
    let (table, loader, mut mem) = scenario();

    // A harness that marshals its own parameters skips invoke() and calls
    // dispatch() with the structured map directly.
    let params = ApiParams::new()
        .with("hModule", ApiValue::Pointer(KERNEL32_BASE))
        .with("lpProcName", ApiValue::Pointer(5));
    let address = table.dispatch(ApiOp::GetProcAddress, &loader, &mut mem, &params)?;
    assert_eq!(address, GETVERSION_ADDR);
    Ok(())
}
