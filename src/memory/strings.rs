//! ANSI/wide string adapters at the guest memory boundary.
//!
//! The Windows API surface exists twice, once with single-byte strings and
//! once with UTF-16LE strings. Internally the loader works with one
//! representation ([`String`]); this module holds the explicit decode and
//! encode adapters, selected by [`StringWidth`] at the API boundary. Nothing
//! outside this file converts between character widths.

use widestring::U16String;

use crate::{memory::GuestMemory, Error, Result};

/// Upper bound, in characters, for guest-supplied NUL-terminated strings.
///
/// A missing terminator would otherwise walk memory until the first unmapped
/// page; `MAX_PATH`-class inputs are orders of magnitude below this.
pub const MAX_GUEST_STRING: usize = 4096;

/// Reads a NUL-terminated single-byte string from guest memory.
///
/// Bytes are interpreted as ASCII/Latin-1; the loader compares and stores
/// names case-folded, so exotic code pages are out of scope.
///
/// # Errors
///
/// Returns an error if the string runs into unmapped memory or exceeds
/// [`MAX_GUEST_STRING`] characters without a terminator.
pub fn read_ansi_string(mem: &dyn GuestMemory, address: u64) -> Result<String> {
    let mut bytes = Vec::new();
    for offset in 0..MAX_GUEST_STRING as u64 {
        let byte = mem.read(address + offset, 1)?[0];
        if byte == 0 {
            return Ok(bytes.iter().map(|&b| b as char).collect());
        }
        bytes.push(byte);
    }
    Err(Error::InvalidAddress {
        address,
        reason: "unterminated guest string",
    })
}

/// Reads a NUL-terminated UTF-16LE string from guest memory.
///
/// Unpaired surrogates are replaced rather than rejected; guest programs are
/// not trusted to produce valid UTF-16.
///
/// # Errors
///
/// Returns an error if the string runs into unmapped memory or exceeds
/// [`MAX_GUEST_STRING`] characters without a terminator.
pub fn read_wide_string(mem: &dyn GuestMemory, address: u64) -> Result<String> {
    let mut units = Vec::new();
    for index in 0..MAX_GUEST_STRING as u64 {
        let raw = mem.read(address + index * 2, 2)?;
        let unit = u16::from_le_bytes([raw[0], raw[1]]);
        if unit == 0 {
            return Ok(U16String::from_vec(units).to_string_lossy());
        }
        units.push(unit);
    }
    Err(Error::InvalidAddress {
        address,
        reason: "unterminated guest string",
    })
}

/// Character width of an API variant ("A" vs "W").
///
/// Handlers that exist in both flavors are written once against this enum;
/// the dispatch table binds each variant to the right width.
///
/// # Example
///
/// ```rust
/// use winldr::memory::StringWidth;
///
/// let wide = StringWidth::Wide.encode("ab");
/// assert_eq!(wide, [0x61, 0x00, 0x62, 0x00]);
/// assert_eq!(wide.len() / StringWidth::Wide.unit_size(), 2);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StringWidth {
    /// Single-byte characters (the "A" API variants).
    Ansi,
    /// Two-byte little-endian characters (the "W" API variants).
    Wide,
}

impl StringWidth {
    /// Size of one character unit in bytes.
    #[must_use]
    pub fn unit_size(self) -> usize {
        match self {
            StringWidth::Ansi => 1,
            StringWidth::Wide => 2,
        }
    }

    /// Reads a NUL-terminated guest string of this width.
    ///
    /// # Errors
    ///
    /// Propagates guest memory faults and the unterminated-string guard.
    pub fn read_string(self, mem: &dyn GuestMemory, address: u64) -> Result<String> {
        match self {
            StringWidth::Ansi => read_ansi_string(mem, address),
            StringWidth::Wide => read_wide_string(mem, address),
        }
    }

    /// Encodes `value` into this width, without a terminator.
    ///
    /// The returned buffer length is always a multiple of
    /// [`unit_size`](Self::unit_size); dividing gives the length in characters.
    #[must_use]
    pub fn encode(self, value: &str) -> Vec<u8> {
        match self {
            StringWidth::Ansi => value.chars().map(|c| if c.is_ascii() { c as u8 } else { b'?' }).collect(),
            StringWidth::Wide => U16String::from_str(value)
                .into_vec()
                .iter()
                .flat_map(|unit| unit.to_le_bytes())
                .collect(),
        }
    }

    /// The NUL terminator for this width.
    #[must_use]
    pub fn terminator(self) -> &'static [u8] {
        match self {
            StringWidth::Ansi => &[0],
            StringWidth::Wide => &[0, 0],
        }
    }
}
