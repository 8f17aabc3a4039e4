/*!
Specialized `Error` and `Result` types for memrun.
*/

use std::{error, fmt, result};

use log::{error, trace, warn};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Error(pub ErrorOrigin, pub ErrorKind);

impl Error {
    /// Returns a static string representing the type of error.
    pub fn as_str(&self) -> &'static str {
        self.1.to_str()
    }

    /// Returns the component the error originated from.
    pub fn origin(&self) -> ErrorOrigin {
        self.0
    }

    /// Returns the kind of the error.
    pub fn kind(&self) -> ErrorKind {
        self.1
    }

    pub fn log_error(self, err: impl fmt::Display) -> Self {
        error!("{}: {} ({})", self.0.to_str(), self.1.to_str(), err);
        self
    }

    pub fn log_warn(self, err: impl fmt::Display) -> Self {
        warn!("{}: {} ({})", self.0.to_str(), self.1.to_str(), err);
        self
    }

    pub fn log_trace(self, err: impl fmt::Display) -> Self {
        trace!("{}: {} ({})", self.0.to_str(), self.1.to_str(), err);
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.0.to_str(), self.1.to_str())
    }
}

impl error::Error for Error {}

#[repr(u16)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ErrorOrigin {
    Args,

    CrashDump,

    MemoryMap,
    MemoryMapFile,
    PhysicalMemory,
}

impl ErrorOrigin {
    /// Returns a static string representing the type of error.
    pub fn to_str(self) -> &'static str {
        match self {
            ErrorOrigin::Args => "args",

            ErrorOrigin::CrashDump => "crash dump",

            ErrorOrigin::MemoryMap => "memory map",
            ErrorOrigin::MemoryMapFile => "memory map file",
            ErrorOrigin::PhysicalMemory => "physical memory",
        }
    }
}

#[repr(u16)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    NotSupported,
    Configuration,

    ArgNotExists,
    ArgValidation,

    NotFound,
    OutOfBounds,
    InvalidMemoryMap,

    UnableToOpenFile,
    UnableToReadFile,
    UnableToSeekFile,
}

impl ErrorKind {
    /// Returns a static string representing the type of error.
    pub fn to_str(self) -> &'static str {
        match self {
            ErrorKind::NotSupported => "not supported",
            ErrorKind::Configuration => "configuration error",

            ErrorKind::ArgNotExists => "the given argument does not exist",
            ErrorKind::ArgValidation => "the argument could not be validated",

            ErrorKind::NotFound => "not found",
            ErrorKind::OutOfBounds => "out of bounds",
            ErrorKind::InvalidMemoryMap => "invalid memory map",

            ErrorKind::UnableToOpenFile => "unable to open file",
            ErrorKind::UnableToReadFile => "unable to read file",
            ErrorKind::UnableToSeekFile => "unable to seek file",
        }
    }
}

/// Specialized `Result` type for memrun results.
pub type Result<T> = result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn display_includes_origin_and_kind() {
        let err = Error(ErrorOrigin::CrashDump, ErrorKind::UnableToReadFile);
        assert_eq!(err.to_string(), "crash dump: unable to read file");
        assert_eq!(err.as_str(), "unable to read file");
    }

    #[test]
    pub fn log_helpers_pass_error_through() {
        let err = Error(ErrorOrigin::Args, ErrorKind::ArgValidation);
        assert_eq!(err.log_warn("bad value").log_trace("again"), err);
    }
}
