//! Structured parameter maps for marshaled API calls.
//!
//! Every operation reaches the facade as a map from documented parameter name
//! to typed value, either built by the embedding harness or produced here by
//! [`marshal`] from the raw machine words captured at the trap site. String
//! parameters are decoded from guest memory exactly once, at marshal time, in
//! the width the operation's signature declares; a null string pointer
//! becomes an absent value rather than an empty string, because the two have
//! different meanings (`GetModuleHandle(NULL)` is the self query).

use std::collections::HashMap;

use crate::{
    memory::{GuestMemory, StringWidth},
    Error, Result,
};

/// A typed parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiValue {
    /// An integral value (`DWORD`, flags, sizes).
    UInt(u64),
    /// A raw guest pointer or handle, passed through undecoded.
    Pointer(u64),
    /// A decoded single-byte string, `None` when the pointer was null.
    Str(Option<String>),
    /// A decoded UTF-16 string, `None` when the pointer was null.
    WStr(Option<String>),
}

/// The parameter map of one marshaled call.
///
/// Keys are the operation's documented parameter names (`"lpModuleName"`,
/// `"nSize"`, ...). Typed accessors return
/// [`Error::MissingParameter`]/[`Error::ParameterType`] on mismatch — these
/// indicate a harness bug, never a guest-visible condition.
#[derive(Debug, Clone, Default)]
pub struct ApiParams {
    values: HashMap<&'static str, ApiValue>,
}

impl ApiParams {
    /// Creates an empty parameter map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a parameter, builder style.
    #[must_use]
    pub fn with(mut self, name: &'static str, value: ApiValue) -> Self {
        self.values.insert(name, value);
        self
    }

    /// Inserts a parameter.
    pub fn insert(&mut self, name: &'static str, value: ApiValue) {
        self.values.insert(name, value);
    }

    fn get(&self, name: &'static str) -> Result<&ApiValue> {
        self.values.get(name).ok_or(Error::MissingParameter(name))
    }

    /// Returns an integral parameter. Pointers are accepted — handles and
    /// sizes are marshaled interchangeably by different harnesses.
    pub fn uint(&self, name: &'static str) -> Result<u64> {
        match self.get(name)? {
            ApiValue::UInt(value) | ApiValue::Pointer(value) => Ok(*value),
            _ => Err(Error::ParameterType {
                name,
                expected: "integer",
            }),
        }
    }

    /// Returns a pointer/handle parameter.
    pub fn pointer(&self, name: &'static str) -> Result<u64> {
        match self.get(name)? {
            ApiValue::Pointer(value) | ApiValue::UInt(value) => Ok(*value),
            _ => Err(Error::ParameterType {
                name,
                expected: "pointer",
            }),
        }
    }

    /// Returns a decoded string parameter of either width; `Ok(None)` means
    /// the guest passed a null pointer.
    pub fn string(&self, name: &'static str) -> Result<Option<&str>> {
        match self.get(name)? {
            ApiValue::Str(value) | ApiValue::WStr(value) => Ok(value.as_deref()),
            _ => Err(Error::ParameterType {
                name,
                expected: "string",
            }),
        }
    }
}

/// Declared kind of one parameter in an operation signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Integral value, passed through.
    UInt,
    /// Pointer or handle, passed through undecoded.
    Pointer,
    /// Pointer to a NUL-terminated single-byte string, decoded at marshal time.
    AnsiStr,
    /// Pointer to a NUL-terminated UTF-16LE string, decoded at marshal time.
    WideStr,
}

/// Builds an [`ApiParams`] map from raw trapped machine words.
///
/// `raw` holds the call's parameters in declaration order, as captured from
/// the guest stack or registers by the calling-convention harness.
///
/// # Errors
///
/// Returns [`Error::MissingParameter`] if `raw` is shorter than the
/// signature, and propagates guest memory faults from string decoding.
pub fn marshal(
    signature: &[(&'static str, ParamKind)],
    raw: &[u64],
    mem: &dyn GuestMemory,
) -> Result<ApiParams> {
    let mut params = ApiParams::new();

    for (index, &(name, kind)) in signature.iter().enumerate() {
        let word = *raw.get(index).ok_or(Error::MissingParameter(name))?;
        let value = match kind {
            ParamKind::UInt => ApiValue::UInt(word),
            ParamKind::Pointer => ApiValue::Pointer(word),
            ParamKind::AnsiStr => ApiValue::Str(decode_string(StringWidth::Ansi, word, mem)?),
            ParamKind::WideStr => ApiValue::WStr(decode_string(StringWidth::Wide, word, mem)?),
        };
        params.insert(name, value);
    }

    Ok(params)
}

fn decode_string(
    width: StringWidth,
    pointer: u64,
    mem: &dyn GuestMemory,
) -> Result<Option<String>> {
    if pointer == 0 {
        return Ok(None);
    }
    width.read_string(mem, pointer).map(Some)
}
