use std::fmt;

use log::trace;

use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::types::{pages_to_bytes, MemoryDescriptor, PAGE_SIZE};

/// The `MemoryMap` struct maps physical addresses to byte offsets in a dump file.
///
/// # Examples
///
/// ```
/// use memrun_core::{MemoryDescriptor, MemoryMap, MemoryRun};
///
/// let desc = MemoryDescriptor::from_runs(
///     0x2000,
///     vec![MemoryRun::new(0, 2), MemoryRun::new(0x10, 1)],
/// );
/// let map = MemoryMap::from_descriptor(&desc).unwrap();
///
/// assert_eq!(map.map(0x1008), Some(0x3008));
/// assert_eq!(map.map(0x10000), Some(0x4000));
/// assert_eq!(map.map(0x5000), None);
/// ```
#[derive(Clone, Default, Eq, PartialEq)]
pub struct MemoryMap {
    mappings: Vec<MemoryMapping>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MemoryMapping {
    base: u64,
    size: u64,
    real_base: u64,
}

impl MemoryMapping {
    /// First physical address of the mapping.
    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// File offset the mapping's base is stored at.
    pub fn real_base(&self) -> u64 {
        self.real_base
    }

    fn end(&self) -> u64 {
        self.base + self.size
    }
}

impl MemoryMap {
    /// Constructs a new, empty memory map.
    pub fn new() -> Self {
        MemoryMap::default()
    }

    /// Builds the map for a descriptor.
    ///
    /// The runs are stored back-to-back in the file starting at the descriptor's
    /// start of memory, in the order they appear in the descriptor.
    pub fn from_descriptor(desc: &MemoryDescriptor) -> Result<Self> {
        let mut map = MemoryMap::new();
        let mut real_base = desc.start_of_memory();

        for run in desc.runs().iter() {
            if run.base_page() < 0 || run.page_count() < 0 {
                return Err(Error(ErrorOrigin::MemoryMap, ErrorKind::InvalidMemoryMap)
                    .log_error(format!(
                        "negative run {:x}:{:x}",
                        run.base_page(),
                        run.page_count()
                    )));
            }

            let (base, size) = match (
                pages_to_bytes(run.base_page() as u64),
                pages_to_bytes(run.page_count() as u64),
            ) {
                (Some(base), Some(size)) => (base, size),
                _ => {
                    return Err(Error(ErrorOrigin::MemoryMap, ErrorKind::InvalidMemoryMap)
                        .log_error(format!(
                            "run {:x}:{:x} exceeds the address space",
                            run.base_page(),
                            run.page_count()
                        )))
                }
            };
            trace!(
                "adding memory mapping: base={:x} size={:x} real_base={:x}",
                base,
                size,
                real_base
            );
            map.push_remap(base, size, real_base)?;
            // push_remap guarantees real_base + size fits
            real_base += size;
        }

        Ok(map)
    }

    /// Iterator over memory mappings, sorted by physical address.
    pub fn iter(&self) -> impl Iterator<Item = &MemoryMapping> {
        self.mappings.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Adds a new mapping of `size` bytes at physical `base` to file offset `real_base`.
    ///
    /// Empty mappings are ignored. Overlapping mappings and mappings exceeding
    /// the address space or the file offset range are rejected.
    pub fn push_remap(&mut self, base: u64, size: u64, real_base: u64) -> Result<&mut Self> {
        if size == 0 {
            return Ok(self);
        }

        if base.checked_add(size).is_none() || real_base.checked_add(size).is_none() {
            return Err(
                Error(ErrorOrigin::MemoryMap, ErrorKind::InvalidMemoryMap).log_error(format!(
                    "region {:x}+{:x} at {:x} exceeds the address space",
                    base, size, real_base
                )),
            );
        }

        let mapping = MemoryMapping {
            base,
            size,
            real_base,
        };

        let idx = self.mappings.partition_point(|m| m.base < base);
        let overlaps_prev = idx > 0 && self.mappings[idx - 1].end() > base;
        let overlaps_next = idx < self.mappings.len() && self.mappings[idx].base < mapping.end();
        if overlaps_prev || overlaps_next {
            return Err(
                Error(ErrorOrigin::MemoryMap, ErrorKind::InvalidMemoryMap).log_error(format!(
                    "overlapping region {:x}-{:x}",
                    base,
                    mapping.end()
                )),
            );
        }

        self.mappings.insert(idx, mapping);
        Ok(self)
    }

    /// Maps a physical address to its file offset.
    ///
    /// Returns `None` if the address is not backed by the file.
    pub fn map(&self, addr: u64) -> Option<u64> {
        let idx = self.mappings.partition_point(|m| m.base <= addr);
        let mapping = self.mappings.get(idx.checked_sub(1)?)?;
        if addr < mapping.end() {
            Some(mapping.real_base + (addr - mapping.base))
        } else {
            None
        }
    }

    /// Maps a physical page number to the file offset of the page.
    pub fn map_page(&self, pfn: u64) -> Option<u64> {
        self.map(pfn.checked_mul(PAGE_SIZE)?)
    }

    /// Number of contiguous bytes backed by the file starting at `addr`.
    pub fn remaining(&self, addr: u64) -> Option<u64> {
        let idx = self.mappings.partition_point(|m| m.base <= addr);
        let mapping = self.mappings.get(idx.checked_sub(1)?)?;
        mapping.end().checked_sub(addr).filter(|&len| len > 0)
    }
}

impl fmt::Debug for MemoryMap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, m) in self.mappings.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(
                f,
                "{:x}-{:x} => {:x}-{:x}",
                m.base,
                m.end(),
                m.real_base,
                m.real_base + m.size
            )?;
        }
        Ok(())
    }
}
