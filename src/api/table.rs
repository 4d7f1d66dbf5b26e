//! The closed operation enumeration and its dispatch table.
//!
//! Supported operations form a closed set: [`ApiOp`] enumerates them, and
//! [`ApiTable`] binds each one to its handler exactly once, at construction.
//! There is no name-based reflection at call time — the embedding emulator
//! resolves a trapped import name to an `ApiOp` with [`ApiTable::resolve`]
//! when it installs its trap, and dispatches by variant afterwards.

use std::collections::HashMap;
use std::str::FromStr;

use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::{
    api::{
        libloader,
        params::{marshal, ApiParams, ParamKind},
    },
    loader::Loader,
    memory::GuestMemory,
    Result,
};

/// Handler signature shared by every operation.
///
/// Handlers receive the loader context, guest memory, and the marshaled
/// parameter map, and produce the single machine-word result the trap site
/// places in the guest's return register.
pub type ApiHandler = fn(&Loader, &mut dyn GuestMemory, &ApiParams) -> Result<u64>;

/// The closed set of emulated library-loader operations.
///
/// Variant names equal the documented API names; `ApiOp::from_str` and
/// [`ApiOp::name`] convert between the two.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr, EnumIter,
)]
#[allow(missing_docs)] // Variants are the documented Windows API names.
pub enum ApiOp {
    GetModuleHandleA,
    GetModuleHandleW,
    GetModuleHandleExW,
    GetModuleFileNameA,
    GetModuleFileNameW,
    GetProcAddress,
    LoadLibraryA,
    LoadLibraryW,
    LoadLibraryExA,
    LoadLibraryExW,
    SizeofResource,
    LoadResource,
    LockResource,
}

impl ApiOp {
    /// The documented API name of this operation.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// The operation's parameter signature, in declaration order.
    ///
    /// This is what the marshaling layer uses to turn raw trapped machine
    /// words into a typed parameter map.
    #[must_use]
    pub fn signature(self) -> &'static [(&'static str, ParamKind)] {
        match self {
            ApiOp::GetModuleHandleA => &[("lpModuleName", ParamKind::AnsiStr)],
            ApiOp::GetModuleHandleW => &[("lpModuleName", ParamKind::WideStr)],
            ApiOp::GetModuleHandleExW => &[
                ("dwFlags", ParamKind::UInt),
                ("lpModuleName", ParamKind::WideStr),
                ("phModule", ParamKind::Pointer),
            ],
            ApiOp::GetModuleFileNameA | ApiOp::GetModuleFileNameW => &[
                ("hModule", ParamKind::Pointer),
                ("lpFilename", ParamKind::Pointer),
                ("nSize", ParamKind::UInt),
            ],
            ApiOp::GetProcAddress => &[
                ("hModule", ParamKind::Pointer),
                ("lpProcName", ParamKind::Pointer),
            ],
            ApiOp::LoadLibraryA => &[("lpLibFileName", ParamKind::AnsiStr)],
            ApiOp::LoadLibraryW => &[("lpLibFileName", ParamKind::WideStr)],
            ApiOp::LoadLibraryExA => &[
                ("lpLibFileName", ParamKind::AnsiStr),
                ("hFile", ParamKind::Pointer),
                ("dwFlags", ParamKind::UInt),
            ],
            ApiOp::LoadLibraryExW => &[
                ("lpLibFileName", ParamKind::WideStr),
                ("hFile", ParamKind::Pointer),
                ("dwFlags", ParamKind::UInt),
            ],
            ApiOp::SizeofResource | ApiOp::LoadResource => &[
                ("hModule", ParamKind::Pointer),
                ("hResInfo", ParamKind::Pointer),
            ],
            ApiOp::LockResource => &[("hResData", ParamKind::Pointer)],
        }
    }

    fn handler(self) -> ApiHandler {
        match self {
            ApiOp::GetModuleHandleA => libloader::get_module_handle_a,
            ApiOp::GetModuleHandleW => libloader::get_module_handle_w,
            ApiOp::GetModuleHandleExW => libloader::get_module_handle_ex_w,
            ApiOp::GetModuleFileNameA => libloader::get_module_file_name_a,
            ApiOp::GetModuleFileNameW => libloader::get_module_file_name_w,
            ApiOp::GetProcAddress => libloader::get_proc_address,
            ApiOp::LoadLibraryA => libloader::load_library_a,
            ApiOp::LoadLibraryW => libloader::load_library_w,
            ApiOp::LoadLibraryExA => libloader::load_library_ex_a,
            ApiOp::LoadLibraryExW => libloader::load_library_ex_w,
            ApiOp::SizeofResource => libloader::sizeof_resource,
            ApiOp::LoadResource => libloader::load_resource,
            ApiOp::LockResource => libloader::lock_resource,
        }
    }
}

/// Operation-to-handler dispatch table, built once at startup.
///
/// # Example
///
/// ```rust
/// use winldr::api::{ApiOp, ApiTable};
/// use winldr::loader::LoaderBuilder;
/// use winldr::memory::AddressSpace;
///
/// let table = ApiTable::new();
/// let loader = LoaderBuilder::new("rootfs", 0x0040_0000, "D:\\sample.exe").build();
/// let mut mem = AddressSpace::new();
///
/// let op = ApiTable::resolve("GetModuleHandleA").unwrap();
/// let base = table.invoke(op, &loader, &mut mem, &[0])?;
/// assert_eq!(base, 0x0040_0000);
/// # Ok::<(), winldr::Error>(())
/// ```
pub struct ApiTable {
    handlers: HashMap<ApiOp, ApiHandler>,
}

impl ApiTable {
    /// Builds the table covering every [`ApiOp`].
    #[must_use]
    pub fn new() -> Self {
        ApiTable {
            handlers: ApiOp::iter().map(|op| (op, op.handler())).collect(),
        }
    }

    /// Resolves a documented API name to its operation, if supported.
    #[must_use]
    pub fn resolve(name: &str) -> Option<ApiOp> {
        ApiOp::from_str(name).ok()
    }

    /// Number of operations in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if the table is empty (it never is after `new`).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Dispatches an already-marshaled call.
    ///
    /// # Errors
    ///
    /// Propagates the handler's error: parameter-map mismatches, guest memory
    /// faults, or the unsupported-operation condition.
    pub fn dispatch(
        &self,
        op: ApiOp,
        loader: &Loader,
        mem: &mut dyn GuestMemory,
        params: &ApiParams,
    ) -> Result<u64> {
        // The table is total over ApiOp by construction.
        (self.handlers[&op])(loader, mem, params)
    }

    /// Marshals raw trapped machine words against `op`'s signature, then
    /// dispatches.
    ///
    /// # Errors
    ///
    /// Propagates marshaling failures (short stacks, bad string pointers) and
    /// handler errors.
    pub fn invoke(
        &self,
        op: ApiOp,
        loader: &Loader,
        mem: &mut dyn GuestMemory,
        raw: &[u64],
    ) -> Result<u64> {
        let params = marshal(op.signature(), raw, mem)?;
        self.dispatch(op, loader, mem, &params)
    }
}

impl Default for ApiTable {
    fn default() -> Self {
        Self::new()
    }
}
