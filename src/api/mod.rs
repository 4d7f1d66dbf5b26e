//! The externally callable API facade.
//!
//! This module is the boundary between the emulator's trap sites and the
//! loader core: a closed set of operations ([`ApiOp`]), their parameter
//! signatures, the marshaling that turns raw trapped machine words into a
//! typed parameter map ([`ApiParams`]), and the handlers implementing each
//! documented Windows contract.
//!
//! # Calling convention
//!
//! Every operation takes its parameters by name from a structured map and
//! returns a single machine-word integer, interpreted as a handle, address,
//! boolean, or count depending on the operation. The embedding emulator either
//! builds the map itself and calls [`ApiTable::dispatch`], or hands the raw
//! stack words to [`ApiTable::invoke`] and lets the signature table do the
//! extraction.
//!
//! # Example
//!
//! ```rust
//! use winldr::api::{ApiTable, ApiOp};
//! use winldr::loader::LoaderBuilder;
//! use winldr::memory::AddressSpace;
//!
//! let table = ApiTable::new();
//! let loader = LoaderBuilder::new("rootfs", 0x0040_0000, "D:\\sample.exe").build();
//! let mut mem = AddressSpace::new();
//!
//! // GetModuleHandleA(NULL) -> image base
//! let base = table.invoke(ApiOp::GetModuleHandleA, &loader, &mut mem, &[0])?;
//! assert_eq!(base, loader.image_base());
//! # Ok::<(), winldr::Error>(())
//! ```

mod libloader;
mod params;
mod table;

pub use libloader::{LoadLibraryExFlags, ModuleHandleExFlags, SYNTHETIC_RESOURCE_SIZE};
pub use params::{marshal, ApiParams, ApiValue, ParamKind};
pub use table::{ApiHandler, ApiOp, ApiTable};
