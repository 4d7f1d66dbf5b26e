//! Ordinal-vs-name procedure references and export resolution.
//!
//! `GetProcAddress` overloads one parameter: values that fit in an unsigned
//! 16-bit range are literal ordinals, anything larger is a guest pointer to a
//! NUL-terminated ASCII name. [`ProcRef`] makes the two cases explicit at
//! decode time so the resolver never re-interprets raw words.
//!
//! A small fixed denylist is checked before any table: certain symbols are
//! answered with 0 regardless of their presence, a compatibility carve-out
//! for samples that use them to fingerprint the emulation environment.

use std::fmt;

use crate::{
    loader::Module,
    memory::{read_ansi_string, GuestMemory},
    Result,
};

/// Largest raw value interpreted as a literal ordinal.
///
/// By loader convention anything above this is a pointer to a name string.
pub const MAX_ORDINAL: u64 = 0xFFFF;

/// Symbols that always resolve to 0, regardless of table contents.
///
/// `RtlComputeCrc32` is used by several malware families to checksum their
/// own code and detect instrumented environments.
pub const DENYLISTED_SYMBOLS: &[&str] = &["RtlComputeCrc32"];

/// A decoded procedure reference: either a literal ordinal or a name read
/// from guest memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcRef {
    /// Lookup by export ordinal.
    Ordinal(u16),
    /// Lookup by export name.
    Name(String),
}

impl ProcRef {
    /// Decodes the raw `lpProcName` machine word.
    ///
    /// Values up to [`MAX_ORDINAL`] are literal ordinals; larger values are
    /// treated as a guest pointer and the name string is read through `mem`.
    ///
    /// # Errors
    ///
    /// Returns an error if a name pointer leads into unmapped memory.
    pub fn decode(raw: u64, mem: &dyn GuestMemory) -> Result<Self> {
        if raw > MAX_ORDINAL {
            Ok(ProcRef::Name(read_ansi_string(mem, raw)?))
        } else {
            #[allow(clippy::cast_possible_truncation)] // Bounded by MAX_ORDINAL
            Ok(ProcRef::Ordinal(raw as u16))
        }
    }

    /// Returns `true` if this reference names a denylisted symbol.
    ///
    /// Ordinal references are never denylisted; the carve-out exists for
    /// name-based environment fingerprinting.
    #[must_use]
    pub fn is_denylisted(&self) -> bool {
        match self {
            ProcRef::Name(name) => DENYLISTED_SYMBOLS.contains(&name.as_str()),
            ProcRef::Ordinal(_) => false,
        }
    }
}

impl fmt::Display for ProcRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcRef::Ordinal(ordinal) => write!(f, "#{ordinal}"),
            ProcRef::Name(name) => f.write_str(name),
        }
    }
}

/// Resolves `proc` against one module's symbol material.
///
/// The module's export table is searched first (by name or ordinal). For
/// modules other than the process image the import-address-table is consulted
/// as a fallback, by name — those modules may have been mapped at process
/// start with bound imports but no parsed export directory. The process image
/// never falls back: its IAT records what *it* imported, not what it serves.
pub(crate) fn resolve_in_module(module: &Module, proc: &ProcRef, is_image: bool) -> Option<u64> {
    let export = match proc {
        ProcRef::Name(name) => module.exports.by_name(name),
        ProcRef::Ordinal(ordinal) => module.exports.by_ordinal(*ordinal),
    };
    if let Some(entry) = export {
        return Some(entry.address);
    }

    if is_image {
        return None;
    }

    match proc {
        ProcRef::Name(name) => module.iat.resolve(name),
        ProcRef::Ordinal(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        loader::{ExportEntry, ExportTable, ImportAddressTable},
        memory::{AddressSpace, GuestMemory},
    };

    fn sample_module() -> Module {
        let exports: ExportTable = [ExportEntry {
            name: "GetVersion".into(),
            ordinal: 5,
            address: 0x76E1_0123,
        }]
        .into_iter()
        .collect();

        let iat: ImportAddressTable = [("HeapAlloc".to_string(), 0x76E2_0000)]
            .into_iter()
            .collect();

        Module::new("kernel32.dll", 0x76E1_0000, "kernel32.dll", exports).with_iat(iat)
    }

    #[test]
    fn test_decode_ordinal() {
        let space = AddressSpace::new();
        assert_eq!(
            ProcRef::decode(5, &space).unwrap(),
            ProcRef::Ordinal(5)
        );
        assert_eq!(
            ProcRef::decode(MAX_ORDINAL, &space).unwrap(),
            ProcRef::Ordinal(0xFFFF)
        );
    }

    #[test]
    fn test_decode_name_pointer() {
        let mut space = AddressSpace::new();
        space.map_at(0x0010_0000, b"GetVersion\0").unwrap();

        assert_eq!(
            ProcRef::decode(0x0010_0000, &space).unwrap(),
            ProcRef::Name("GetVersion".into())
        );
    }

    #[test]
    fn test_decode_bad_pointer_fails() {
        let space = AddressSpace::new();
        assert!(ProcRef::decode(0x0010_0000, &space).is_err());
    }

    #[test]
    fn test_denylist_by_name_only() {
        assert!(ProcRef::Name("RtlComputeCrc32".into()).is_denylisted());
        assert!(!ProcRef::Name("RtlComputeCrc64".into()).is_denylisted());
        assert!(!ProcRef::Ordinal(1).is_denylisted());
    }

    #[test]
    fn test_resolve_export_by_both_keys() {
        let module = sample_module();
        assert_eq!(
            resolve_in_module(&module, &ProcRef::Ordinal(5), false),
            Some(0x76E1_0123)
        );
        assert_eq!(
            resolve_in_module(&module, &ProcRef::Name("GetVersion".into()), false),
            Some(0x76E1_0123)
        );
    }

    #[test]
    fn test_resolve_iat_fallback_for_non_image() {
        let module = sample_module();
        assert_eq!(
            resolve_in_module(&module, &ProcRef::Name("HeapAlloc".into()), false),
            Some(0x76E2_0000)
        );
        // The process image does not serve its own imports.
        assert_eq!(
            resolve_in_module(&module, &ProcRef::Name("HeapAlloc".into()), true),
            None
        );
    }

    #[test]
    fn test_resolve_miss() {
        let module = sample_module();
        assert_eq!(
            resolve_in_module(&module, &ProcRef::Name("Missing".into()), false),
            None
        );
    }
}
