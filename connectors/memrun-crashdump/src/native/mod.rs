pub mod x64;

pub use x64::parse_crashdump64;

/// Crash dump header signature of a 64 bit Microsoft Windows crash dump ('PAGE' + 'DU64')
pub const DUMP_SIGNATURE64: [u8; 8] = *b"PAGEDU64";

/// The maximum number of PhysicalMemoryRuns fitting into the header
pub const PHYSICAL_MEMORY_MAX_RUNS: i64 = 0x20;
