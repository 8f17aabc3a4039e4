use std::collections::HashMap;

use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::scanner::{LayoutScanner, LinearScanner, NullScanner};

#[cfg(feature = "memmapfiles")]
use crate::scanner::MemoryMapFileScanner;

/// Argument wrapper for detectors
///
/// # Examples
///
/// Construct from a string:
/// ```
/// use memrun_core::DetectorArgs;
///
/// let args = DetectorArgs::try_from("./memory.dmp,scanner=none").unwrap();
/// assert_eq!(args.get_default().unwrap(), "./memory.dmp");
/// ```
///
/// Construct as builder:
/// ```
/// use memrun_core::DetectorArgs;
///
/// let args = DetectorArgs::with_default("./memory.dmp")
///     .insert("memmap", "./memory.toml");
/// ```
#[derive(Clone, Debug, Default)]
pub struct DetectorArgs {
    map: HashMap<String, String>,
}

impl DetectorArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(value: &str) -> Self {
        Self::new().insert("default", value)
    }

    /// Parses a comma separated list of `key=value` pairs.
    ///
    /// A leading token without a `=` is stored as the default argument.
    pub fn try_parse_str(args: &str) -> Result<Self> {
        let mut map = HashMap::new();

        for (i, kv) in args.split(',').enumerate() {
            let kv = kv.trim();
            if kv.is_empty() {
                continue;
            }

            match kv.split_once('=') {
                Some((key, value)) if !key.is_empty() && !value.contains('=') => {
                    map.insert(key.to_string(), value.to_string());
                }
                None if i == 0 => {
                    map.insert("default".to_string(), kv.to_string());
                }
                _ => {
                    return Err(
                        Error(ErrorOrigin::Args, ErrorKind::ArgValidation).log_error(kv),
                    )
                }
            }
        }

        Ok(Self { map })
    }

    pub fn insert(mut self, key: &str, value: &str) -> Self {
        self.map.insert(key.to_string(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.map.get(key)
    }

    pub fn get_default(&self) -> Option<&String> {
        self.get("default")
    }

    /// Returns the dump file path, either from the default argument or the `path` key.
    pub fn path(&self) -> Result<&str> {
        self.get_default()
            .or_else(|| self.get("path"))
            .map(String::as_str)
            .ok_or_else(|| {
                Error(ErrorOrigin::Args, ErrorKind::ArgNotExists).log_error("no dump path given")
            })
    }

    /// Builds the baseline scanner selected by the `memmap` and `scanner` keys.
    ///
    /// `memmap` takes precedence. `scanner` accepts `linear` (the default) and `none`.
    pub fn scanner(&self) -> Result<Box<dyn LayoutScanner>> {
        if let Some(scanner) = self.memmap_scanner()? {
            return Ok(scanner);
        }

        match self.get("scanner").map(String::as_str) {
            None | Some("linear") => Ok(Box::new(LinearScanner)),
            Some("none") => Ok(Box::new(NullScanner)),
            Some(other) => {
                Err(Error(ErrorOrigin::Args, ErrorKind::ArgValidation)
                    .log_error(format!("unknown scanner `{}`", other)))
            }
        }
    }
}

impl DetectorArgs {
    #[cfg(feature = "memmapfiles")]
    fn memmap_scanner(&self) -> Result<Option<Box<dyn LayoutScanner>>> {
        Ok(self
            .get("memmap")
            .map(|memmap| Box::new(MemoryMapFileScanner::new(memmap)) as Box<dyn LayoutScanner>))
    }

    #[cfg(not(feature = "memmapfiles"))]
    fn memmap_scanner(&self) -> Result<Option<Box<dyn LayoutScanner>>> {
        match self.get("memmap") {
            Some(_) => Err(Error(ErrorOrigin::Args, ErrorKind::NotSupported)
                .log_error("memory map files require the memmapfiles feature")),
            None => Ok(None),
        }
    }
}

impl TryFrom<&str> for DetectorArgs {
    type Error = Error;

    fn try_from(args: &str) -> Result<Self> {
        DetectorArgs::try_parse_str(args)
    }
}
