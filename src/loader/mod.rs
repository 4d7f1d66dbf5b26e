//! Module registry, path resolution, dynamic loading, and symbol lookup.
//!
//! This module is the core of the subsystem: everything the Windows loader
//! tracks about an emulated process's modules lives here, behind the
//! [`Loader`] context object.
//!
//! # Architecture
//!
//! ```text
//! +--------------+      +----------------+      +----------------+
//! | API facade   | ---> | Loader         | ---> | ModuleRegistry |
//! | (crate::api) |      | (context)      |      | name <-> base  |
//! +--------------+      +---+-------+----+      +----------------+
//!                           |       |
//!                  +--------v-+   +-v------------+
//!                  | Library  |   | ImageSource  |
//!                  | Path     |   | (PE/goblin)  |
//!                  +----------+   +--------------+
//! ```
//!
//! # Key Components
//!
//! - [`Loader`] / [`LoaderBuilder`] - the explicit per-process context; no
//!   global state
//! - [`ModuleRegistry`] - normalized name ↔ base address table with per-module
//!   symbol material
//! - [`Module`], [`ExportTable`], [`ImportAddressTable`] - the data model
//! - [`ProcRef`] - ordinal-vs-name procedure references
//! - [`ImageSource`] / [`PeImageSource`] - the image mapping boundary
//! - [`canonicalize`] / [`LibraryPath`] - name and path normalization
//!
//! # Lifecycle
//!
//! Modules are created at first reference — at process preparation through
//! [`Loader::register`], or on demand through [`Loader::load_library`] — and
//! live for the whole emulation session. There is no unload path: the
//! subsystem does not model `FreeLibrary` reference counting.

mod context;
mod image;
mod module;
mod path;
mod registry;
mod symbols;

pub use context::{Loader, LoaderBuilder};
pub use image::{ImageSource, LoadedImage, PeImageSource};
pub use module::{ExportEntry, ExportTable, ImportAddressTable, Module};
pub use path::{canonicalize, is_library_name, LibraryPath, LIBRARY_EXTENSIONS};
pub use registry::ModuleRegistry;
pub use symbols::{ProcRef, DENYLISTED_SYMBOLS, MAX_ORDINAL};

pub(crate) use symbols::resolve_in_module;
