/*!
Layout detection for Microsoft Windows crash dumps.

A 64 bit crash dump starts with a 0x2000 byte header carrying a table of up to 32 physical
memory runs. When the table is in range the runs are stored right after the header.
Otherwise the layout is taken from the baseline scanner and placed at the start of memory
offset recorded at 0x2020.

# Examples

```
use memrun_core::*;
use memrun_crashdump::CrashDump;

let mut dump = CrashDump::new("./memory.dmp");
if let Ok(true) = dump.is_supported_format(&DetectContext::default()) {
    println!("{:?}", dump.phys_mem_desc());
}
```
*/

mod native;
pub use native::x64::{
    HEADER_SIZE64, PHYSICAL_MEMORY_BLOCK_OFFSET64, RUN_TABLE_OFFSET64, START_OF_MEMORY_OFFSET64,
};
pub use native::{parse_crashdump64, DUMP_SIGNATURE64, PHYSICAL_MEMORY_MAX_RUNS};

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::debug;
use memrun_core::*;

/// A Microsoft Windows crash dump file.
#[derive(Clone, Debug)]
pub struct CrashDump {
    source: DumpSource,
    layout: Option<PhysicalLayout>,
}

impl CrashDump {
    /// Records the path and the size of the dump file.
    ///
    /// The file is not opened and does not have to exist yet.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            source: DumpSource::new(path),
            layout: None,
        }
    }

    pub fn path(&self) -> &Path {
        self.source.path()
    }

    pub fn file_size(&self) -> u64 {
        self.source.file_size()
    }

    pub fn max_page_count(&self) -> u64 {
        self.source.max_page_count()
    }

    /// Checks whether the file is a crash dump and remembers its layout.
    ///
    /// The layout is stored only on success and only once, later calls return `true` without
    /// reading the file again. Failures leave the layout unset.
    pub fn is_supported_format(&mut self, ctx: &DetectContext) -> Result<bool> {
        if self.layout.is_some() {
            return Ok(true);
        }

        match self.detect(ctx)? {
            Detection::Supported(layout) => {
                self.layout = Some(layout);
                Ok(true)
            }
            Detection::Unsupported => Ok(false),
        }
    }

    /// Layout produced by the baseline scanner, if it was not promoted to the physical layout.
    pub fn logical_phys_mem_desc(&self) -> Option<&MemoryDescriptor> {
        self.layout.as_ref().and_then(|l| l.logical.as_ref())
    }

    /// Authoritative physical memory layout of the dump.
    pub fn phys_mem_desc(&self) -> Option<&MemoryDescriptor> {
        self.layout.as_ref().map(|l| &l.physical)
    }

    pub fn layout(&self) -> Option<&PhysicalLayout> {
        self.layout.as_ref()
    }

    /// Opens the dump for reading physical memory.
    ///
    /// Fails if the layout has not been detected yet.
    pub fn open_physical(&self) -> Result<PhysicalFile<File>> {
        let desc = self
            .phys_mem_desc()
            .ok_or(Error(ErrorOrigin::CrashDump, ErrorKind::NotFound))?;
        PhysicalFile::open(self.path(), desc)
    }
}

impl MemoryRunDetector for CrashDump {
    fn format(&self) -> DumpFormat {
        DumpFormat::CrashDump64
    }

    fn source(&self) -> &DumpSource {
        &self.source
    }

    fn detect(&self, ctx: &DetectContext) -> Result<Detection> {
        if !self.source.exists() {
            debug!("{} does not exist", self.source.path().display());
            return Ok(Detection::Unsupported);
        }

        let baseline = ctx.baseline(&self.source);

        let file = File::open(self.source.path()).map_err(|err| {
            Error(ErrorOrigin::CrashDump, ErrorKind::UnableToOpenFile).log_error(err)
        })?;
        let mut reader = BufReader::new(file);

        parse_crashdump64(&mut reader, baseline)
    }
}

/// Creates a crash dump detector and its baseline scanner from the given arguments.
///
/// # Examples
///
/// ```
/// use memrun_core::*;
/// use memrun_crashdump::create_detector;
///
/// let args = DetectorArgs::with_default("./memory.dmp").insert("scanner", "none");
/// let (dump, scanner) = create_detector(&args).unwrap();
/// let detection = dump.detect(&DetectContext::new(scanner.as_ref()));
/// ```
pub fn create_detector(args: &DetectorArgs) -> Result<(CrashDump, Box<dyn LayoutScanner>)> {
    Ok((CrashDump::new(args.path()?), args.scanner()?))
}

/// Detects the layout of `path`, trying the crash dump format first and falling back to a raw image.
pub fn detect_file<P: AsRef<Path>>(
    path: P,
    ctx: &DetectContext,
) -> Result<Option<(DumpFormat, PhysicalLayout)>> {
    let dump = CrashDump::new(path.as_ref());
    let raw = RawImage::new(DumpSource::new(path.as_ref()));
    detect_format(&[&dump, &raw], ctx)
}
