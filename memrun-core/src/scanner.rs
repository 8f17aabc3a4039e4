/*!
Baseline layout scanners.

A scanner produces a best-effort memory layout for a dump file without knowing its format.
Format detectors use it as a fallback when the file itself does not describe its layout.
*/

use crate::source::DumpSource;
use crate::types::{MemoryDescriptor, MemoryRun};

#[cfg(feature = "memmapfiles")]
use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
#[cfg(feature = "memmapfiles")]
use log::warn;
#[cfg(feature = "memmapfiles")]
use std::path::{Path, PathBuf};

/// Produces a best-effort memory layout for a dump source.
///
/// Returns `None` if no layout could be derived.
pub trait LayoutScanner {
    fn scan(&self, source: &DumpSource) -> Option<MemoryDescriptor>;
}

impl<F: Fn(&DumpSource) -> Option<MemoryDescriptor>> LayoutScanner for F {
    fn scan(&self, source: &DumpSource) -> Option<MemoryDescriptor> {
        (self)(source)
    }
}

/// Treats the whole file as a single run of physical memory starting at page 0.
#[derive(Copy, Clone, Debug, Default)]
pub struct LinearScanner;

impl LayoutScanner for LinearScanner {
    fn scan(&self, source: &DumpSource) -> Option<MemoryDescriptor> {
        Some(MemoryDescriptor::from_runs(
            0,
            vec![MemoryRun::new(0, source.max_page_count() as i64)],
        ))
    }
}

/// Never produces a layout.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullScanner;

impl LayoutScanner for NullScanner {
    fn scan(&self, _source: &DumpSource) -> Option<MemoryDescriptor> {
        None
    }
}

#[cfg(feature = "memmapfiles")]
#[derive(::serde::Deserialize)]
struct MemoryMapFile {
    #[serde(default)]
    start_of_memory: u64,
    #[serde(rename = "run", default)]
    runs: Vec<MemoryRun>,
}

/// Parses a memory layout from a [TOML](https://toml.io/) string.
///
/// The layout must be in the following format:
///
/// ```toml
/// start_of_memory = 0x2000
///
/// [[run]]
/// base_page = 0x1
/// page_count = 0x9e
///
/// [[run]]
/// base_page = 0x100
/// page_count = 0xeff
/// ```
///
/// `start_of_memory` is optional and defaults to 0.
#[cfg(feature = "memmapfiles")]
pub fn parse_memory_map(contents: &str) -> Result<MemoryDescriptor> {
    let file: MemoryMapFile = ::toml::from_str(contents).map_err(|err| {
        Error(ErrorOrigin::MemoryMapFile, ErrorKind::Configuration).log_error(err)
    })?;

    if let Some(run) = file
        .runs
        .iter()
        .find(|run| run.base_page() < 0 || run.page_count() < 0)
    {
        return Err(
            Error(ErrorOrigin::MemoryMapFile, ErrorKind::InvalidMemoryMap).log_error(format!(
                "negative run {:x}:{:x}",
                run.base_page(),
                run.page_count()
            )),
        );
    }

    Ok(MemoryDescriptor::from_runs(file.start_of_memory, file.runs))
}

/// Reads a memory layout from a TOML file, see [`parse_memory_map`] for the format.
#[cfg(feature = "memmapfiles")]
pub fn open_memory_map<P: AsRef<Path>>(path: P) -> Result<MemoryDescriptor> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|err| {
        Error(ErrorOrigin::MemoryMapFile, ErrorKind::UnableToReadFile).log_error(err)
    })?;
    parse_memory_map(&contents)
}

/// Reads the layout from a user supplied memory map file.
#[cfg(feature = "memmapfiles")]
#[derive(Clone, Debug)]
pub struct MemoryMapFileScanner {
    path: PathBuf,
}

#[cfg(feature = "memmapfiles")]
impl MemoryMapFileScanner {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[cfg(feature = "memmapfiles")]
impl LayoutScanner for MemoryMapFileScanner {
    fn scan(&self, _source: &DumpSource) -> Option<MemoryDescriptor> {
        match open_memory_map(&self.path) {
            Ok(desc) => Some(desc),
            Err(err) => {
                warn!(
                    "unable to use memory map file {}: {}",
                    self.path.display(),
                    err
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn linear_covers_whole_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 0x3800]).unwrap();
        file.flush().unwrap();

        let desc = LinearScanner.scan(&DumpSource::new(file.path())).unwrap();
        assert_eq!(desc.start_of_memory(), 0);
        assert_eq!(desc.runs(), &[MemoryRun::new(0, 3)]);
        assert_eq!(desc.number_of_pages(), 3);
    }

    #[test]
    fn null_scanner_yields_nothing() {
        assert_eq!(NullScanner.scan(&DumpSource::new("/nonexistent")), None);
    }

    #[test]
    fn closures_are_scanners() {
        let scanner = |_: &DumpSource| Some(MemoryDescriptor::from_runs(0x10, vec![]));
        let desc = scanner.scan(&DumpSource::new("/nonexistent")).unwrap();
        assert_eq!(desc.start_of_memory(), 0x10);
    }

    #[cfg(feature = "memmapfiles")]
    #[test]
    fn parse_memory_map_keeps_order() {
        let desc = parse_memory_map(
            r#"
            start_of_memory = 0x2000

            [[run]]
            base_page = 0x100
            page_count = 0x10

            [[run]]
            base_page = 0x1
            page_count = 0x9e
            "#,
        )
        .unwrap();

        assert_eq!(desc.start_of_memory(), 0x2000);
        assert_eq!(
            desc.runs(),
            &[MemoryRun::new(0x100, 0x10), MemoryRun::new(1, 0x9e)]
        );
        assert_eq!(desc.number_of_runs(), 2);
    }

    #[cfg(feature = "memmapfiles")]
    #[test]
    fn parse_memory_map_rejects_negative_runs() {
        let err = parse_memory_map("[[run]]\nbase_page = -1\npage_count = 1\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidMemoryMap);
    }

    #[cfg(feature = "memmapfiles")]
    #[test]
    fn memory_map_file_scanner_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[[run]]\nbase_page = 0\npage_count = 4").unwrap();
        file.flush().unwrap();

        let scanner = MemoryMapFileScanner::new(file.path());
        let desc = scanner.scan(&DumpSource::new("/nonexistent")).unwrap();
        assert_eq!(desc.runs(), &[MemoryRun::new(0, 4)]);
        assert_eq!(desc.start_of_memory(), 0);
    }

    #[cfg(feature = "memmapfiles")]
    #[test]
    fn memory_map_file_scanner_missing_file() {
        let scanner = MemoryMapFileScanner::new("/nonexistent/memmap.toml");
        assert_eq!(scanner.scan(&DumpSource::new("/nonexistent")), None);
    }
}
