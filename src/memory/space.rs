//! Guest memory trait and the region-backed reference address space.
//!
//! [`GuestMemory`] is the boundary to the emulator's virtual address space:
//! the loader reads name strings, writes file-name buffers, and maps library
//! images exclusively through it. [`AddressSpace`] implements the trait over a
//! simple region map so the subsystem can run without a host emulator.
//!
//! # Address Space
//!
//! Regions are keyed by their base address and never overlap. Interior
//! addresses resolve to the containing region, so a read at `base + offset`
//! behaves like real memory. Regions are never unmapped — modules live for the
//! duration of the emulation session.

use std::collections::HashMap;

use crate::{Error, Result};

/// Byte-level access to the emulated virtual address space.
///
/// This is the consumed interface of the surrounding emulator. All addresses
/// are guest addresses; a failed access returns
/// [`Error::InvalidAddress`](crate::Error::InvalidAddress) rather than
/// touching host memory.
pub trait GuestMemory {
    /// Reads `size` bytes starting at `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is not fully contained in mapped memory.
    fn read(&self, address: u64, size: usize) -> Result<Vec<u8>>;

    /// Writes `data` starting at `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is not fully contained in mapped memory.
    fn write(&mut self, address: u64, data: &[u8]) -> Result<()>;

    /// Maps `data` as a new region based at `address`.
    ///
    /// Used by the dynamic loader to place library images. The region must
    /// not collide with an existing mapping.
    ///
    /// # Errors
    ///
    /// Returns an error if `address` is already mapped.
    fn map_at(&mut self, address: u64, data: &[u8]) -> Result<()>;
}

/// A mapped region of guest memory (internal).
#[derive(Clone, Debug)]
struct Region {
    /// The raw bytes in this region.
    data: Vec<u8>,
}

impl Region {
    #[inline]
    fn size(&self) -> usize {
        self.data.len()
    }
}

/// Region-backed implementation of [`GuestMemory`].
///
/// Tracks non-overlapping byte regions keyed by base address, with
/// bounds-checked access at both base and interior addresses. This is the
/// stand-alone counterpart of a real emulator's MMU: enough for tests,
/// tooling, and headless driving of the loader.
///
/// # Example
///
/// ```rust
/// use winldr::memory::{AddressSpace, GuestMemory};
///
/// let mut space = AddressSpace::new();
/// space.map_at(0x40_0000, &[0xAB; 64])?;
///
/// let bytes = space.read(0x40_0010, 4)?;
/// assert_eq!(bytes, [0xAB; 4]);
/// # Ok::<(), winldr::Error>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct AddressSpace {
    /// Memory regions indexed by their base address.
    regions: HashMap<u64, Region>,
}

impl AddressSpace {
    /// Creates an empty address space.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `address` falls inside a mapped region.
    #[must_use]
    pub fn is_mapped(&self, address: u64) -> bool {
        self.find_region(address).is_some()
    }

    /// Finds the region containing an address and returns the region and offset.
    ///
    /// Exact base addresses resolve in O(1); interior addresses fall back to a
    /// scan over the region map.
    fn find_region(&self, address: u64) -> Option<(&Region, usize)> {
        if let Some(region) = self.regions.get(&address) {
            return Some((region, 0));
        }

        for (&base, region) in &self.regions {
            if address >= base && address < base + region.size() as u64 {
                #[allow(clippy::cast_possible_truncation)] // Offset bounded by region size
                let offset = (address - base) as usize;
                return Some((region, offset));
            }
        }

        None
    }

    /// Mutable variant of [`find_region`](Self::find_region).
    ///
    /// Uses a two-pass approach due to borrow checker constraints.
    fn find_region_mut(&mut self, address: u64) -> Option<(&mut Region, usize)> {
        let mut found_base = None;

        if self.regions.contains_key(&address) {
            found_base = Some(address);
        } else {
            for (&base, region) in &self.regions {
                if address >= base && address < base + region.size() as u64 {
                    found_base = Some(base);
                    break;
                }
            }
        }

        let base = found_base?;
        let region = self.regions.get_mut(&base)?;
        #[allow(clippy::cast_possible_truncation)] // Offset bounded by region size
        let offset = (address - base) as usize;
        Some((region, offset))
    }
}

impl GuestMemory for AddressSpace {
    fn read(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let (region, offset) = self.find_region(address).ok_or(Error::InvalidAddress {
            address,
            reason: "address not in any mapped region",
        })?;

        if offset + size > region.size() {
            return Err(Error::InvalidAddress {
                address,
                reason: "read would exceed region bounds",
            });
        }

        Ok(region.data[offset..offset + size].to_vec())
    }

    fn write(&mut self, address: u64, data: &[u8]) -> Result<()> {
        let (region, offset) = self.find_region_mut(address).ok_or(Error::InvalidAddress {
            address,
            reason: "address not in any mapped region",
        })?;

        if offset + data.len() > region.size() {
            return Err(Error::InvalidAddress {
                address,
                reason: "write would exceed region bounds",
            });
        }

        region.data[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn map_at(&mut self, address: u64, data: &[u8]) -> Result<()> {
        if self.regions.contains_key(&address) {
            return Err(Error::InvalidAddress {
                address,
                reason: "address already mapped",
            });
        }

        self.regions.insert(
            address,
            Region {
                data: data.to_vec(),
            },
        );
        Ok(())
    }
}
