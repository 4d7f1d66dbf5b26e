//! # winldr Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the winldr library. Import this module to get quick access to the essential
//! types for driving the loader subsystem.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all winldr operations
pub use crate::Error;

/// The result type used throughout winldr
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// The per-process loader context
pub use crate::loader::Loader;

/// Builder for configuring and constructing a [`Loader`]
pub use crate::loader::LoaderBuilder;

/// Operation-to-handler dispatch table
pub use crate::api::ApiTable;

/// The closed set of supported API operations
pub use crate::api::ApiOp;

// ================================================================================================
// Loader Data Model
// ================================================================================================

/// One loaded module inside the emulated process
pub use crate::loader::Module;

/// Export table with O(1) name and ordinal lookup
pub use crate::loader::{ExportEntry, ExportTable};

/// Bound import addresses keyed by symbol name
pub use crate::loader::ImportAddressTable;

/// Ordinal-vs-name procedure references
pub use crate::loader::ProcRef;

// ================================================================================================
// API Boundary
// ================================================================================================

/// Structured parameter map and typed values
pub use crate::api::{ApiParams, ApiValue};

/// Raw-word marshaling against an operation signature
pub use crate::api::{marshal, ParamKind};

// ================================================================================================
// Guest Memory
// ================================================================================================

/// Byte-level access to the emulated virtual address space
pub use crate::memory::GuestMemory;

/// Region-backed reference implementation of [`GuestMemory`]
pub use crate::memory::AddressSpace;

/// ANSI/wide character width selector
pub use crate::memory::StringWidth;

// ================================================================================================
// Diagnostics
// ================================================================================================

/// Typed diagnostic events emitted by the loader
pub use crate::trace::LoaderEvent;

/// Outlet for loader diagnostics
pub use crate::trace::TraceSink;
