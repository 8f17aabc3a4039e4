use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::types::bytes_to_pages;

/// A dump file that is a candidate for format detection.
///
/// The file size and the derived page count are computed once when the source is created.
/// The file does not need to exist at this point, a missing file simply has a size of zero.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DumpSource {
    path: PathBuf,
    file_size: u64,
    max_page_count: u64,
}

impl DumpSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let file_size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        let max_page_count = bytes_to_pages(file_size);

        debug!(
            "dump source {}: size={:x} max_page_count={:x}",
            path.display(),
            file_size,
            max_page_count
        );

        Self {
            path,
            file_size,
            max_page_count,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Number of whole pages that fit into the file.
    pub fn max_page_count(&self) -> u64 {
        self.max_page_count
    }

    /// Checks whether the file exists right now.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}
