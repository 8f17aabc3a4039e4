/*!
Format detection.

Every supported dump format implements [`MemoryRunDetector`]. The detectors are tried in order
by [`detect_format`] until one of them recognizes the file.
*/

use std::fmt;

use log::{debug, info};

use crate::error::Result;
use crate::scanner::{LayoutScanner, LinearScanner};
use crate::source::DumpSource;
use crate::types::MemoryDescriptor;

/// The dump formats known to the dispatcher.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum DumpFormat {
    /// 64 bit Microsoft Windows crash dump (`PAGEDU64`).
    CrashDump64,
    /// Raw physical memory image.
    Raw,
}

impl fmt::Display for DumpFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DumpFormat::CrashDump64 => f.write_str("crash dump (64 bit)"),
            DumpFormat::Raw => f.write_str("raw image"),
        }
    }
}

/// The layout a detector extracted from a recognized file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PhysicalLayout {
    /// Layout produced by the baseline scanner.
    ///
    /// This is `None` when the baseline was promoted to the physical layout.
    pub logical: Option<MemoryDescriptor>,
    /// Authoritative layout mapping physical pages to file offsets.
    pub physical: MemoryDescriptor,
}

/// Result of a single detection attempt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Detection {
    /// The file is not in the detector's format, the next detector should be tried.
    Unsupported,
    Supported(PhysicalLayout),
}

impl Detection {
    pub fn into_layout(self) -> Option<PhysicalLayout> {
        match self {
            Detection::Supported(layout) => Some(layout),
            Detection::Unsupported => None,
        }
    }
}

/// Collaborators available to detectors while detecting.
#[derive(Copy, Clone)]
pub struct DetectContext<'a> {
    scanner: &'a dyn LayoutScanner,
}

impl<'a> DetectContext<'a> {
    pub fn new(scanner: &'a dyn LayoutScanner) -> Self {
        Self { scanner }
    }

    /// Requests the baseline layout for `source` from the scanner.
    pub fn baseline(&self, source: &DumpSource) -> Option<MemoryDescriptor> {
        self.scanner.scan(source)
    }
}

impl Default for DetectContext<'static> {
    fn default() -> Self {
        Self::new(&LinearScanner)
    }
}

/// A decoder for one dump format.
pub trait MemoryRunDetector {
    fn format(&self) -> DumpFormat;

    fn source(&self) -> &DumpSource;

    /// Checks whether the source is in this detector's format and extracts its layout.
    ///
    /// A file in a different format yields `Ok(Detection::Unsupported)`.
    /// Errors are reserved for files that were recognized but could not be read.
    fn detect(&self, ctx: &DetectContext) -> Result<Detection>;
}

/// Tries all `detectors` in order and returns the layout of the first one recognizing its source.
///
/// Returns `Ok(None)` if no detector recognized its source.
/// An error from a detector stops the dispatch.
pub fn detect_format(
    detectors: &[&dyn MemoryRunDetector],
    ctx: &DetectContext,
) -> Result<Option<(DumpFormat, PhysicalLayout)>> {
    for detector in detectors.iter() {
        match detector.detect(ctx)? {
            Detection::Supported(layout) => {
                info!(
                    "{} detected as {}",
                    detector.source().path().display(),
                    detector.format()
                );
                return Ok(Some((detector.format(), layout)));
            }
            Detection::Unsupported => {
                debug!(
                    "{} is not a {}",
                    detector.source().path().display(),
                    detector.format()
                );
            }
        }
    }
    Ok(None)
}

/// Catch-all detector treating any existing file as raw physical memory.
///
/// The layout is taken from the scanner, or the whole file if the scanner has none.
#[derive(Clone, Debug)]
pub struct RawImage {
    source: DumpSource,
}

impl RawImage {
    pub fn new(source: DumpSource) -> Self {
        Self { source }
    }
}

impl MemoryRunDetector for RawImage {
    fn format(&self) -> DumpFormat {
        DumpFormat::Raw
    }

    fn source(&self) -> &DumpSource {
        &self.source
    }

    fn detect(&self, ctx: &DetectContext) -> Result<Detection> {
        if !self.source.exists() {
            return Ok(Detection::Unsupported);
        }

        let physical = match ctx.baseline(&self.source) {
            Some(desc) => desc,
            None => LinearScanner.scan(&self.source).unwrap_or_default(),
        };

        Ok(Detection::Supported(PhysicalLayout {
            logical: None,
            physical,
        }))
    }
}
