// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]
//#![deny(unsafe_code)]
// - 'loader/image.rs' uses mmap to map a library file into memory

//! # winldr
//!
//! Module loading and dynamic symbol resolution for user-mode Windows binary emulation.
//! `winldr` reproduces the semantics of the Windows loader — `LoadLibrary*`,
//! `GetModuleHandle*`, `GetProcAddress`, `GetModuleFileName*`, and the minimal resource
//! handle APIs — against an emulated process image, reading and writing guest state
//! exclusively through a virtual memory interface.
//!
//! ## Features
//!
//! - **🔍 Faithful loader edge cases** - Self-referencing handles, lazy on-demand loading,
//!   ordinal-vs-name lookup, ANSI/wide duality, and buffer-truncation contracts
//! - **📦 Idempotent module registry** - One base address per module for the whole session,
//!   O(1) handle queries, never a silent remap
//! - **⚡ Explicit dispatch** - A closed operation enum bound to handlers once at startup;
//!   no name-based reflection on the hot path
//! - **🧩 Clean collaborator seams** - Guest memory, image parsing, and diagnostics are
//!   traits the embedding emulator implements or replaces
//! - **🛡️ Honest failure modes** - Recoverable misses return null handles with typed trace
//!   events; unimplemented behavior surfaces as a hard, typed condition
//!
//! ## Quick Start
//!
//! Add `winldr` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! winldr = "0.2"
//! ```
//!
//! ### Using the Prelude
//!
//! ```rust
//! use winldr::prelude::*;
//!
//! // One loader per emulated process; no global state.
//! let loader = LoaderBuilder::new("rootfs", 0x0040_0000, "D:\\sample.exe").build();
//! let table = ApiTable::new();
//! let mut mem = AddressSpace::new();
//!
//! // GetModuleHandleA(NULL) resolves to the process image base.
//! let base = table.invoke(ApiOp::GetModuleHandleA, &loader, &mut mem, &[0])?;
//! assert_eq!(base, 0x0040_0000);
//! # Ok::<(), winldr::Error>(())
//! ```
//!
//! ### Registering preloaded modules
//!
//! An emulator typically maps default system libraries while preparing the
//! process image, then hands their symbol material to the loader:
//!
//! ```rust
//! use winldr::loader::{ExportEntry, ExportTable, LoaderBuilder, Module};
//!
//! let loader = LoaderBuilder::new("rootfs", 0x0040_0000, "D:\\sample.exe").build();
//!
//! let exports: ExportTable = [ExportEntry {
//!     name: "GetVersion".into(),
//!     ordinal: 5,
//!     address: 0x76E1_0123,
//! }]
//! .into_iter()
//! .collect();
//!
//! loader.register(Module::new(
//!     "kernel32.dll",
//!     0x76E1_0000,
//!     "kernel32.dll",
//!     exports,
//! ))?;
//! # Ok::<(), winldr::Error>(())
//! ```
//!
//! ## Architecture
//!
//! `winldr` is organized into four modules:
//!
//! - [`loader`] - the per-process [`Loader`] context: module registry, path
//!   resolution, dynamic loading, symbol resolution
//! - [`api`] - the operation enumeration, parameter marshaling, and handlers
//! - [`memory`] - the guest memory boundary and string-width adapters
//! - [`trace`] - typed diagnostic events and sinks
//!
//! Control flow: a trapped API call enters through [`api::ApiTable`], is
//! marshaled into a typed parameter map, delegates to the [`Loader`], and
//! reads/writes results through [`memory::GuestMemory`].
//!
//! ## Concurrency
//!
//! Operations are synchronous, bounded computations driven from the
//! emulator's trap-handling path. The loader's mutable state sits behind a
//! single reader-writer lock so concurrently scheduled execution contexts
//! never observe a half-registered module. See [`loader`] for details.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result). Recoverable misses are
//! not errors — they produce the documented null results. The one hard
//! condition, [`Error::Unsupported`], carries the operation and handle and is
//! meant to stop the run rather than mask unimplemented behavior:
//!
//! ```rust
//! use winldr::{Error, loader::LoaderBuilder};
//!
//! let loader = LoaderBuilder::new("rootfs", 0x0040_0000, "D:\\sample.exe").build();
//!
//! match loader.module_file_name(0x7FFF_0000) {
//!     Err(Error::Unsupported { operation, handle }) => {
//!         eprintln!("sample depends on {} for {:#x}", operation, handle);
//!     }
//!     other => panic!("expected the unsupported condition, got {:?}", other.err()),
//! }
//! ```

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// This module provides a curated selection of the most frequently used types
/// from across the winldr library, allowing for convenient glob imports.
///
/// # Example
///
/// ```rust
/// use winldr::prelude::*;
///
/// let loader = LoaderBuilder::new("rootfs", 0x0040_0000, "D:\\sample.exe").build();
/// assert_eq!(loader.image_base(), 0x0040_0000);
/// ```
pub mod prelude;

/// The externally callable API facade: operations, marshaling, dispatch.
///
/// Implements the documented contracts of the library-loader API family over
/// the loader core. The operation set is a closed enumeration ([`api::ApiOp`])
/// bound to handler functions exactly once, when [`api::ApiTable::new`] runs.
///
/// # Key Types
///
/// - [`api::ApiTable`] - operation-to-handler dispatch table
/// - [`api::ApiOp`] - the closed set of supported operations
/// - [`api::ApiParams`] / [`api::ApiValue`] - the structured parameter map
/// - [`api::ParamKind`] - declared parameter kinds for marshaling
///
/// # Example
///
/// ```rust
/// use winldr::api::ApiTable;
///
/// // Trap-site binding: documented name -> operation, resolved up front.
/// let op = ApiTable::resolve("LoadLibraryA").unwrap();
/// assert_eq!(op.name(), "LoadLibraryA");
/// ```
pub mod api;

/// Module registry, path resolution, dynamic loading, and symbol lookup.
///
/// The core of the subsystem. One [`Loader`] exists per emulated process and
/// is passed by reference into every operation; there is no process-wide
/// singleton.
///
/// # Key Types
///
/// - [`Loader`] / [`loader::LoaderBuilder`] - the explicit loader context
/// - [`loader::ModuleRegistry`] - name ↔ base address table
/// - [`loader::Module`], [`loader::ExportTable`], [`loader::ImportAddressTable`] - data model
/// - [`loader::ProcRef`] - ordinal-vs-name procedure references
/// - [`loader::ImageSource`] - the image mapping and export parsing boundary
pub mod loader;

/// Guest memory boundary and ANSI/wide string adapters.
///
/// Everything the subsystem reads or writes on behalf of the guest goes
/// through [`memory::GuestMemory`]; [`memory::AddressSpace`] is the bundled
/// region-backed implementation for stand-alone use and tests.
/// [`memory::StringWidth`] concentrates the A/W character-width duality into
/// one encode/decode adapter.
pub mod memory;

/// Typed diagnostic events and the sink trait to collect them.
///
/// Recoverable loader misses emit [`trace::LoaderEvent`]s through a
/// [`trace::TraceSink`] supplied by the embedder; rendering is out of scope.
pub mod trace;

/// `winldr` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
/// This is used consistently throughout the crate for all fallible operations.
///
/// # Examples
///
/// ```rust,no_run
/// use winldr::{loader::Loader, Result};
///
/// fn image_of(loader: &Loader) -> Result<String> {
///     Ok(loader.module_file_name(0)?.to_string())
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `winldr` Error type
///
/// The main error type for all operations in this crate. Recoverable loader
/// misses are expressed as null results, so this type only surfaces
/// integration-boundary failures and the hard unsupported-operation condition.
///
/// # Examples
///
/// ```rust
/// use winldr::{Error, loader::LoaderBuilder};
///
/// let loader = LoaderBuilder::new("rootfs", 0x0040_0000, "D:\\sample.exe").build();
/// let err = loader.module_file_name(0xBAD_F00D).unwrap_err();
/// assert!(matches!(err, Error::Unsupported { .. }));
/// ```
pub use error::Error;

/// The per-process loader context.
///
/// See [`loader::Loader`] for the full contract and
/// [`loader::LoaderBuilder`] for construction.
pub use loader::Loader;
