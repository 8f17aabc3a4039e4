use super::*;

use std::io::{self, Read, Seek, SeekFrom};
use std::mem::size_of;

use dataview::{Pod, PodMethods};
use log::{debug, info, trace, warn};
use memrun_core::*;

/// Total size of the 64 bit header. Embedded runs are stored right after it.
pub const HEADER_SIZE64: u64 = 0x2000;

/// Offset of the `PhysicalMemoryBlock` in the 64 bit header.
pub const PHYSICAL_MEMORY_BLOCK_OFFSET64: u64 = 0x88;

/// Offset of the first embedded `PhysicalMemoryRun`.
pub const RUN_TABLE_OFFSET64: u64 =
    PHYSICAL_MEMORY_BLOCK_OFFSET64 + size_of::<PhysicalMemoryDescriptor64>() as u64;

/// Offset of the start of memory field used when the run table can not be trusted.
pub const START_OF_MEMORY_OFFSET64: u64 = 0x2020;

/// Head of the `PhysicalMemoryBlock`, followed by `number_of_runs` runs.
#[repr(C)]
#[derive(Copy, Clone, Default, Pod)]
pub struct PhysicalMemoryDescriptor64 {
    pub number_of_runs: i64,  // 0x0088
    pub number_of_pages: i64, // 0x0090
}

#[repr(C)]
#[derive(Copy, Clone, Default, Pod)]
pub struct PhysicalMemoryRun64 {
    pub base_page: i64,
    pub page_count: i64,
}

fn seek<R: Seek>(reader: &mut R, offset: u64) -> Result<()> {
    reader
        .seek(SeekFrom::Start(offset))
        .map(|_| ())
        .map_err(|err| {
            Error(ErrorOrigin::CrashDump, ErrorKind::UnableToSeekFile)
                .log_error(format!("offset {:x}: {}", offset, err))
        })
}

fn read<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|err| {
        Error(ErrorOrigin::CrashDump, ErrorKind::UnableToReadFile)
            .log_error(format!("{}: {}", what, err))
    })
}

/// Tries to parse a reader as a Microsoft Windows 64bit crash dump.
///
/// The reader has to be positioned at the start of the file.
/// `baseline` is the best-effort layout used when the embedded run table is out of range.
///
/// Files without the `PAGEDU64` signature yield `Detection::Unsupported`.
/// Once the signature matched every failed read is returned as an error.
pub fn parse_crashdump64<R: Read + Seek>(
    reader: &mut R,
    baseline: Option<MemoryDescriptor>,
) -> Result<Detection> {
    let mut signature = [0u8; 8];
    match reader.read_exact(&mut signature) {
        Ok(()) => (),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
            trace!("file is too short to contain a crash dump signature");
            return Ok(Detection::Unsupported);
        }
        Err(err) => {
            return Err(
                Error(ErrorOrigin::CrashDump, ErrorKind::UnableToReadFile).log_error(err),
            )
        }
    }

    if signature != DUMP_SIGNATURE64 {
        trace!("header signature is not valid: {:x?}", signature);
        return Ok(Detection::Unsupported);
    }

    info!("64-bit Microsoft Crash Dump verified");

    seek(reader, START_OF_MEMORY_OFFSET64)?;
    let mut start_of_memory = [0u8; 4];
    read(reader, &mut start_of_memory, "start of memory")?;
    let start_of_memory = u32::from_le_bytes(start_of_memory) as u64;

    seek(reader, PHYSICAL_MEMORY_BLOCK_OFFSET64)?;
    let mut block = PhysicalMemoryDescriptor64::default();
    read(reader, block.as_bytes_mut(), "physical memory block")?;
    let number_of_runs = i64::from_le(block.number_of_runs);
    let number_of_pages = i64::from_le(block.number_of_pages);

    debug!(
        "physical memory block: runs={} pages={:x} start_of_memory={:x}",
        number_of_runs, number_of_pages, start_of_memory
    );

    if !(0..=PHYSICAL_MEMORY_MAX_RUNS).contains(&number_of_runs) {
        // the run table does not fit into the header, fall back to the scanned layout
        warn!(
            "embedded run count {} is out of range, using baseline layout at {:x}",
            number_of_runs, start_of_memory
        );

        let physical = baseline
            .unwrap_or_default()
            .with_start_of_memory(start_of_memory);

        return Ok(Detection::Supported(PhysicalLayout {
            logical: None,
            physical,
        }));
    }

    info!("using {} embedded memory runs", number_of_runs);

    let mut runs = Vec::with_capacity(number_of_runs as usize);
    for i in 0..number_of_runs {
        let mut raw = PhysicalMemoryRun64::default();
        read(reader, raw.as_bytes_mut(), "physical memory run")?;

        let run = MemoryRun::new(i64::from_le(raw.base_page), i64::from_le(raw.page_count));
        debug!(
            "run {}: base_page={:x} page_count={:x}",
            i,
            run.base_page(),
            run.page_count()
        );
        runs.push(run);
    }

    Ok(Detection::Supported(PhysicalLayout {
        logical: baseline,
        physical: MemoryDescriptor::new(HEADER_SIZE64, number_of_runs, number_of_pages, runs),
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    /// Builds a synthetic crash dump header followed by a single page of memory.
    pub(crate) fn build_header(
        number_of_runs: i64,
        runs: &[(i64, i64)],
        start_of_memory: u32,
    ) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_SIZE64 as usize + 0x1000];
        buf[..8].copy_from_slice(&DUMP_SIGNATURE64);

        let pages: i64 = runs.iter().map(|(_, count)| count).sum();
        buf[0x88..0x90].copy_from_slice(&number_of_runs.to_le_bytes());
        buf[0x90..0x98].copy_from_slice(&pages.to_le_bytes());

        let mut offset = RUN_TABLE_OFFSET64 as usize;
        for (base_page, page_count) in runs.iter() {
            buf[offset..offset + 8].copy_from_slice(&base_page.to_le_bytes());
            buf[offset + 8..offset + 16].copy_from_slice(&page_count.to_le_bytes());
            offset += 16;
        }

        let som = START_OF_MEMORY_OFFSET64 as usize;
        buf[som..som + 4].copy_from_slice(&start_of_memory.to_le_bytes());
        buf
    }

    fn baseline() -> MemoryDescriptor {
        MemoryDescriptor::from_runs(0, vec![MemoryRun::new(0, 0x100), MemoryRun::new(0x200, 8)])
    }

    fn parse(buf: Vec<u8>, baseline: Option<MemoryDescriptor>) -> Result<Detection> {
        parse_crashdump64(&mut Cursor::new(buf), baseline)
    }

    /// Records every seek issued against the wrapped reader.
    struct SeekLog<R> {
        inner: R,
        seeks: Vec<SeekFrom>,
    }

    impl<R> SeekLog<R> {
        fn new(inner: R) -> Self {
            Self {
                inner,
                seeks: Vec::new(),
            }
        }
    }

    impl<R: Read> Read for SeekLog<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.inner.read(buf)
        }
    }

    impl<R: Seek> Seek for SeekLog<R> {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.seeks.push(pos);
            self.inner.seek(pos)
        }
    }

    #[test]
    fn test_struct_sizes_x64() {
        assert_eq!(size_of::<PhysicalMemoryRun64>(), 0x10);
        assert_eq!(size_of::<PhysicalMemoryDescriptor64>(), 0x10);
        assert_eq!(RUN_TABLE_OFFSET64, 0x98);
        assert!(
            RUN_TABLE_OFFSET64
                + PHYSICAL_MEMORY_MAX_RUNS as u64 * size_of::<PhysicalMemoryRun64>() as u64
                <= HEADER_SIZE64
        );
    }

    #[test]
    fn embedded_runs_in_file_order() {
        let buf = build_header(3, &[(0, 50), (200, 50), (1000, 10)], 0x5000);
        let layout = parse(buf, Some(baseline())).unwrap().into_layout().unwrap();

        assert_eq!(
            layout.physical.runs(),
            &[
                MemoryRun::new(0, 50),
                MemoryRun::new(200, 50),
                MemoryRun::new(1000, 10)
            ]
        );
        assert_eq!(layout.physical.start_of_memory(), 0x2000);
        assert_eq!(layout.physical.number_of_runs(), 3);
        assert_eq!(layout.physical.number_of_pages(), 110);
        assert_eq!(layout.logical, Some(baseline()));
    }

    #[test]
    fn embedded_runs_keep_unsorted_entries() {
        let runs = [(0x300, 1), (0x10, 4), (0x300, 1), (0, 0)];
        let buf = build_header(runs.len() as i64, &runs, 0);
        let layout = parse(buf, None).unwrap().into_layout().unwrap();

        let expected = runs
            .iter()
            .map(|&(base, count)| MemoryRun::new(base, count))
            .collect::<Vec<_>>();
        assert_eq!(layout.physical.runs(), &expected[..]);
        assert_eq!(layout.logical, None);
    }

    #[test]
    fn zero_runs_take_embedded_path() {
        let buf = build_header(0, &[], 0x4000);
        let layout = parse(buf, Some(baseline())).unwrap().into_layout().unwrap();

        assert!(layout.physical.runs().is_empty());
        assert_eq!(layout.physical.number_of_runs(), 0);
        assert_eq!(layout.physical.start_of_memory(), 0x2000);
        assert_eq!(layout.logical, Some(baseline()));
    }

    #[test]
    fn max_runs_take_embedded_path() {
        let runs = (0..32).map(|i| (i * 2, 1)).collect::<Vec<_>>();
        let buf = build_header(32, &runs, 0x4000);
        let layout = parse(buf, None).unwrap().into_layout().unwrap();

        assert_eq!(layout.physical.runs().len(), 32);
        assert_eq!(layout.physical.runs()[31], MemoryRun::new(62, 1));
    }

    #[test]
    fn out_of_range_runs_promote_baseline() {
        for number_of_runs in [-1, 33, 40, i64::MAX, i64::MIN] {
            let buf = build_header(number_of_runs, &[(1, 1)], 0x3000);
            let layout = parse(buf, Some(baseline())).unwrap().into_layout().unwrap();

            assert_eq!(layout.logical, None);
            assert_eq!(
                layout.physical,
                baseline().with_start_of_memory(0x3000),
                "number_of_runs = {}",
                number_of_runs
            );
        }
    }

    #[test]
    fn out_of_range_without_baseline() {
        let buf = build_header(40, &[], 0x3000);
        let layout = parse(buf, None).unwrap().into_layout().unwrap();

        assert_eq!(layout.logical, None);
        assert!(layout.physical.runs().is_empty());
        assert_eq!(layout.physical.start_of_memory(), 0x3000);
    }

    #[test]
    fn invalid_signature() {
        let mut buf = build_header(1, &[(0, 1)], 0);
        buf[..8].copy_from_slice(b"PAGEDUMP");
        assert_eq!(parse(buf, None).unwrap(), Detection::Unsupported);

        assert_eq!(parse(vec![0u8; 0x3000], None).unwrap(), Detection::Unsupported);
    }

    #[test]
    fn invalid_signature_does_not_seek() {
        let mut reader = SeekLog::new(Cursor::new(vec![0u8; 0x3000]));
        assert_eq!(
            parse_crashdump64(&mut reader, None).unwrap(),
            Detection::Unsupported
        );
        assert!(reader.seeks.is_empty());
    }

    #[test]
    fn header_fields_are_read_in_order() {
        let buf = build_header(1, &[(0, 1)], 0x2000);
        let mut reader = SeekLog::new(Cursor::new(buf));
        assert!(parse_crashdump64(&mut reader, None)
            .unwrap()
            .into_layout()
            .is_some());
        assert_eq!(
            reader.seeks,
            vec![
                SeekFrom::Start(START_OF_MEMORY_OFFSET64),
                SeekFrom::Start(PHYSICAL_MEMORY_BLOCK_OFFSET64)
            ]
        );
    }

    #[test]
    fn too_short_for_signature() {
        assert_eq!(parse(b"PAGE".to_vec(), None).unwrap(), Detection::Unsupported);
        assert_eq!(parse(vec![], None).unwrap(), Detection::Unsupported);
    }

    #[test]
    fn truncated_after_signature() {
        let mut buf = build_header(1, &[(0, 1)], 0);
        buf.truncate(START_OF_MEMORY_OFFSET64 as usize + 2);

        let err = parse(buf, None).unwrap_err();
        assert_eq!(err.origin(), ErrorOrigin::CrashDump);
        assert_eq!(err.kind(), ErrorKind::UnableToReadFile);
    }

    #[test]
    fn signature_only() {
        let err = parse(DUMP_SIGNATURE64.to_vec(), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnableToReadFile);
    }
}
