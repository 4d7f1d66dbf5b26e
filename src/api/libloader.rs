//! Handlers for the library-loader API family.
//!
//! Each function implements one documented operation contract against the
//! [`Loader`] context, reading and writing guest memory where the contract
//! demands it. Handlers never format diagnostics and never panic on guest
//! input: recoverable misses return 0, the single unsupported condition
//! propagates as [`Error::Unsupported`](crate::Error::Unsupported).

use bitflags::bitflags;

use crate::{
    loader::{Loader, ProcRef},
    memory::{GuestMemory, StringWidth},
    api::ApiParams,
    Result,
};

/// Fixed synthetic size reported by `SizeofResource`.
///
/// No real resource directory is modeled; every resource claims this size.
pub const SYNTHETIC_RESOURCE_SIZE: u64 = 0x8;

bitflags! {
    /// `GET_MODULE_HANDLE_EX_FLAG_*` values, accepted and ignored.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModuleHandleExFlags: u32 {
        /// `GET_MODULE_HANDLE_EX_FLAG_PIN`
        const PIN = 0x0000_0001;
        /// `GET_MODULE_HANDLE_EX_FLAG_UNCHANGED_REFCOUNT`
        const UNCHANGED_REFCOUNT = 0x0000_0002;
        /// `GET_MODULE_HANDLE_EX_FLAG_FROM_ADDRESS`
        const FROM_ADDRESS = 0x0000_0004;
    }
}

bitflags! {
    /// `LoadLibraryEx` flag values, accepted and ignored.
    ///
    /// Modules are always fully registered; alternate search paths and
    /// datafile mappings are not modeled.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LoadLibraryExFlags: u32 {
        /// `DONT_RESOLVE_DLL_REFERENCES`
        const DONT_RESOLVE_DLL_REFERENCES = 0x0000_0001;
        /// `LOAD_LIBRARY_AS_DATAFILE`
        const LOAD_LIBRARY_AS_DATAFILE = 0x0000_0002;
        /// `LOAD_WITH_ALTERED_SEARCH_PATH`
        const LOAD_WITH_ALTERED_SEARCH_PATH = 0x0000_0008;
        /// `LOAD_IGNORE_CODE_AUTHZ_LEVEL`
        const LOAD_IGNORE_CODE_AUTHZ_LEVEL = 0x0000_0010;
        /// `LOAD_LIBRARY_AS_IMAGE_RESOURCE`
        const LOAD_LIBRARY_AS_IMAGE_RESOURCE = 0x0000_0020;
        /// `LOAD_LIBRARY_AS_DATAFILE_EXCLUSIVE`
        const LOAD_LIBRARY_AS_DATAFILE_EXCLUSIVE = 0x0000_0040;
        /// `LOAD_LIBRARY_SEARCH_DLL_LOAD_DIR`
        const LOAD_LIBRARY_SEARCH_DLL_LOAD_DIR = 0x0000_0100;
        /// `LOAD_LIBRARY_SEARCH_APPLICATION_DIR`
        const LOAD_LIBRARY_SEARCH_APPLICATION_DIR = 0x0000_0200;
        /// `LOAD_LIBRARY_SEARCH_USER_DIRS`
        const LOAD_LIBRARY_SEARCH_USER_DIRS = 0x0000_0400;
        /// `LOAD_LIBRARY_SEARCH_SYSTEM32`
        const LOAD_LIBRARY_SEARCH_SYSTEM32 = 0x0000_0800;
        /// `LOAD_LIBRARY_SEARCH_DEFAULT_DIRS`
        const LOAD_LIBRARY_SEARCH_DEFAULT_DIRS = 0x0000_1000;
    }
}

/// `GetModuleHandleA`: resolve a module name (or null for self) to its base.
pub(crate) fn get_module_handle_a(
    loader: &Loader,
    mem: &mut dyn GuestMemory,
    params: &ApiParams,
) -> Result<u64> {
    let name = params.string("lpModuleName")?.map(str::to_owned);
    loader.module_handle(name.as_deref(), mem)
}

/// `GetModuleHandleW`: wide variant of [`get_module_handle_a`].
pub(crate) fn get_module_handle_w(
    loader: &Loader,
    mem: &mut dyn GuestMemory,
    params: &ApiParams,
) -> Result<u64> {
    let name = params.string("lpModuleName")?.map(str::to_owned);
    loader.module_handle(name.as_deref(), mem)
}

/// `GetModuleHandleExW`: resolve a module name and write the handle through
/// the caller-supplied pointer. Returns 1 (success) as the raw result.
pub(crate) fn get_module_handle_ex_w(
    loader: &Loader,
    mem: &mut dyn GuestMemory,
    params: &ApiParams,
) -> Result<u64> {
    let _flags = ModuleHandleExFlags::from_bits_truncate(params.uint("dwFlags")? as u32);
    let name = params.string("lpModuleName")?.map(str::to_owned);
    let destination = params.pointer("phModule")?;

    let handle = loader.module_handle(name.as_deref(), mem)?;
    let bytes = handle.to_le_bytes();
    mem.write(destination, &bytes[..loader.pointer_size()])?;

    Ok(1)
}

/// `GetModuleFileNameA`: copy the image path into a caller buffer, truncating
/// to the buffer capacity.
pub(crate) fn get_module_file_name_a(
    loader: &Loader,
    mem: &mut dyn GuestMemory,
    params: &ApiParams,
) -> Result<u64> {
    module_file_name(loader, mem, params, StringWidth::Ansi)
}

/// `GetModuleFileNameW`: wide variant of [`get_module_file_name_a`].
///
/// Truncation operates on the UTF-16 buffer with `nSize` counted in wide
/// characters, not on the narrow byte length.
pub(crate) fn get_module_file_name_w(
    loader: &Loader,
    mem: &mut dyn GuestMemory,
    params: &ApiParams,
) -> Result<u64> {
    module_file_name(loader, mem, params, StringWidth::Wide)
}

/// Shared `GetModuleFileName` contract over one character width.
///
/// If the encoded path exceeds `nSize - 1` characters it is cut to fit and
/// the return value equals `nSize`; otherwise the full path is written and
/// its character length returned. The terminator is always written.
fn module_file_name(
    loader: &Loader,
    mem: &mut dyn GuestMemory,
    params: &ApiParams,
    width: StringWidth,
) -> Result<u64> {
    let handle = params.pointer("hModule")?;
    let buffer = params.pointer("lpFilename")?;
    let capacity = params.uint("nSize")?;

    let path = loader.module_file_name(handle)?;
    if capacity == 0 {
        return Ok(0);
    }

    let encoded = width.encode(path);
    let unit = width.unit_size();
    let length = (encoded.len() / unit) as u64;

    let (written, result) = if length > capacity - 1 {
        #[allow(clippy::cast_possible_truncation)] // capacity bounded by length here
        (&encoded[..(capacity - 1) as usize * unit], capacity)
    } else {
        (encoded.as_slice(), length)
    };

    mem.write(buffer, written)?;
    mem.write(buffer + written.len() as u64, width.terminator())?;

    Ok(result)
}

/// `GetProcAddress`: resolve an export by ordinal or by name pointer.
pub(crate) fn get_proc_address(
    loader: &Loader,
    mem: &mut dyn GuestMemory,
    params: &ApiParams,
) -> Result<u64> {
    let handle = params.pointer("hModule")?;
    let raw = params.pointer("lpProcName")?;

    let proc = ProcRef::decode(raw, mem)?;
    Ok(loader.proc_address(handle, &proc))
}

/// `LoadLibraryA`: load (or find) a library by name.
pub(crate) fn load_library_a(
    loader: &Loader,
    mem: &mut dyn GuestMemory,
    params: &ApiParams,
) -> Result<u64> {
    load_library(loader, mem, params)
}

/// `LoadLibraryW`: wide variant of [`load_library_a`].
pub(crate) fn load_library_w(
    loader: &Loader,
    mem: &mut dyn GuestMemory,
    params: &ApiParams,
) -> Result<u64> {
    load_library(loader, mem, params)
}

/// `LoadLibraryExA`: the file-handle parameter is reserved and the flags are
/// not modeled; loading behaves like `LoadLibraryA`.
pub(crate) fn load_library_ex_a(
    loader: &Loader,
    mem: &mut dyn GuestMemory,
    params: &ApiParams,
) -> Result<u64> {
    let _reserved = params.pointer("hFile")?;
    let _flags = LoadLibraryExFlags::from_bits_truncate(params.uint("dwFlags")? as u32);
    load_library(loader, mem, params)
}

/// `LoadLibraryExW`: wide variant of [`load_library_ex_a`].
pub(crate) fn load_library_ex_w(
    loader: &Loader,
    mem: &mut dyn GuestMemory,
    params: &ApiParams,
) -> Result<u64> {
    let _reserved = params.pointer("hFile")?;
    let _flags = LoadLibraryExFlags::from_bits_truncate(params.uint("dwFlags")? as u32);
    load_library(loader, mem, params)
}

fn load_library(loader: &Loader, mem: &mut dyn GuestMemory, params: &ApiParams) -> Result<u64> {
    match params.string("lpLibFileName")?.map(str::to_owned) {
        Some(name) => loader.load_library(&name, mem),
        None => Ok(0),
    }
}

/// `SizeofResource`: every resource reports the fixed synthetic size.
pub(crate) fn sizeof_resource(
    _loader: &Loader,
    _mem: &mut dyn GuestMemory,
    _params: &ApiParams,
) -> Result<u64> {
    Ok(SYNTHETIC_RESOURCE_SIZE)
}

/// `LoadResource`: the resource-info handle doubles as the resource-data
/// handle; no resource directory is modeled.
pub(crate) fn load_resource(
    _loader: &Loader,
    _mem: &mut dyn GuestMemory,
    params: &ApiParams,
) -> Result<u64> {
    params.pointer("hResInfo")
}

/// `LockResource`: locking is a no-op; the data handle is already the
/// "pointer".
pub(crate) fn lock_resource(
    _loader: &Loader,
    _mem: &mut dyn GuestMemory,
    params: &ApiParams,
) -> Result<u64> {
    params.pointer("hResData")
}
