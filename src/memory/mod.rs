//! Emulated virtual address space access.
//!
//! Every byte the loader subsystem reads or writes on behalf of the guest goes
//! through this module; the crate never touches host memory on the guest's
//! behalf. The module has two halves:
//!
//! - [`GuestMemory`] - the interface boundary to the surrounding emulator's
//!   virtual address space (read, write, map). The loader only ever consumes
//!   this trait.
//! - [`AddressSpace`] - a region-backed reference implementation, sufficient
//!   for driving the subsystem stand-alone and in tests.
//!
//! # Architecture
//!
//! ```text
//! +----------------+     +----------------+     +------------------+
//! | API handlers   | --> | GuestMemory    | <-- | AddressSpace     |
//! | (strings, IAT, |     | (trait)        |     | (or the host     |
//! |  write-backs)  |     +----------------+     |  emulator's MMU) |
//! +----------------+                            +------------------+
//! ```
//!
//! # String duality
//!
//! Windows APIs come in ANSI and wide flavors. [`StringWidth`] is the single
//! switch point: guest strings are decoded into ordinary [`String`]s at the
//! boundary and encoded back into the variant's character width on the way
//! out. No handler re-encodes ad hoc.

mod space;
mod strings;

pub use space::{AddressSpace, GuestMemory};
pub use strings::{read_ansi_string, read_wide_string, StringWidth, MAX_GUEST_STRING};
