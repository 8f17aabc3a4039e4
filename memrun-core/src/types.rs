/*!
Memory run descriptors.

A dump file stores physical memory as a sequence of runs of contiguous pages.
The runs are laid out back-to-back in the file, starting at the descriptor's
`start_of_memory` byte offset.
*/

/// Number of bits a page number has to be shifted to get a byte address.
pub const PAGE_SHIFT: u32 = 12;

/// Size of a single page in bytes.
pub const PAGE_SIZE: u64 = 1 << PAGE_SHIFT;

/// Converts a byte count into a page count, rounding down.
pub const fn bytes_to_pages(bytes: u64) -> u64 {
    bytes >> PAGE_SHIFT
}

/// Converts a page count into a byte count.
///
/// Returns `None` if the byte count does not fit into 64 bits.
pub const fn pages_to_bytes(pages: u64) -> Option<u64> {
    pages.checked_mul(PAGE_SIZE)
}

/// A contiguous span of physical pages.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct MemoryRun {
    base_page: i64,
    page_count: i64,
}

impl MemoryRun {
    pub const fn new(base_page: i64, page_count: i64) -> Self {
        Self {
            base_page,
            page_count,
        }
    }

    /// First physical page number covered by this run.
    pub const fn base_page(&self) -> i64 {
        self.base_page
    }

    /// Number of pages covered by this run.
    pub const fn page_count(&self) -> i64 {
        self.page_count
    }
}

/// Physical memory layout of a dump file.
///
/// The order of `runs` is the order in which the runs are stored in the file
/// and is never changed after construction.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct MemoryDescriptor {
    start_of_memory: u64,
    number_of_runs: i64,
    number_of_pages: i64,
    runs: Vec<MemoryRun>,
}

impl MemoryDescriptor {
    /// Constructs a descriptor with explicit header counts.
    ///
    /// The counts are stored as given, they are not recomputed from `runs`.
    pub fn new(
        start_of_memory: u64,
        number_of_runs: i64,
        number_of_pages: i64,
        runs: Vec<MemoryRun>,
    ) -> Self {
        Self {
            start_of_memory,
            number_of_runs,
            number_of_pages,
            runs,
        }
    }

    /// Constructs a descriptor and derives both counts from `runs`.
    pub fn from_runs(start_of_memory: u64, runs: Vec<MemoryRun>) -> Self {
        let number_of_pages = runs.iter().map(MemoryRun::page_count).sum();
        Self {
            start_of_memory,
            number_of_runs: runs.len() as i64,
            number_of_pages,
            runs,
        }
    }

    /// Returns a copy of this descriptor with a different start of memory.
    pub fn with_start_of_memory(self, start_of_memory: u64) -> Self {
        Self {
            start_of_memory,
            ..self
        }
    }

    /// Byte offset in the file where the first run begins.
    pub fn start_of_memory(&self) -> u64 {
        self.start_of_memory
    }

    pub fn number_of_runs(&self) -> i64 {
        self.number_of_runs
    }

    pub fn number_of_pages(&self) -> i64 {
        self.number_of_pages
    }

    pub fn runs(&self) -> &[MemoryRun] {
        &self.runs
    }
}
