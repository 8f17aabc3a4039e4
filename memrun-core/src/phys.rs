use std::cmp;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::mem_map::MemoryMap;
use crate::types::MemoryDescriptor;

/// Read-only access to the physical memory stored in a dump file.
pub struct PhysicalFile<T> {
    reader: T,
    mem_map: MemoryMap,
}

impl PhysicalFile<File> {
    /// Opens `path` and maps it with the given descriptor.
    pub fn open<P: AsRef<Path>>(path: P, desc: &MemoryDescriptor) -> Result<Self> {
        let file = File::open(path).map_err(|err| {
            Error(ErrorOrigin::PhysicalMemory, ErrorKind::UnableToOpenFile).log_error(err)
        })?;
        Ok(Self::with_reader(file, MemoryMap::from_descriptor(desc)?))
    }
}

impl<T: Read + Seek> PhysicalFile<T> {
    pub fn with_reader(reader: T, mem_map: MemoryMap) -> Self {
        Self { reader, mem_map }
    }

    pub fn mem_map(&self) -> &MemoryMap {
        &self.mem_map
    }

    /// Reads `buf.len()` bytes of physical memory starting at `addr`.
    ///
    /// The read may span multiple runs. It fails if any byte of the range is not backed by the file.
    pub fn phys_read(&mut self, mut addr: u64, mut buf: &mut [u8]) -> Result<()> {
        while !buf.is_empty() {
            let file_off = self
                .mem_map
                .map(addr)
                .ok_or(Error(ErrorOrigin::PhysicalMemory, ErrorKind::OutOfBounds))?;
            let remaining = self.mem_map.remaining(addr).unwrap_or(0);
            let len = cmp::min(remaining, buf.len() as u64) as usize;

            self.reader
                .seek(SeekFrom::Start(file_off))
                .map_err(|err| {
                    Error(ErrorOrigin::PhysicalMemory, ErrorKind::UnableToSeekFile).log_error(err)
                })?;

            let (chunk, rest) = std::mem::take(&mut buf).split_at_mut(len);
            self.reader.read_exact(chunk).map_err(|err| {
                Error(ErrorOrigin::PhysicalMemory, ErrorKind::UnableToReadFile).log_error(err)
            })?;

            buf = rest;
            addr += len as u64;
        }
        Ok(())
    }
}
