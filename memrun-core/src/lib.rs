/*!
This crate contains the foundation of memrun's dump file layout detection.

It contains the [memory run descriptors](types/index.html) describing where physical
memory is stored in a dump file, the [detector interface](detector/index.html) format
decoders implement, [baseline scanners](scanner/index.html) providing a best-effort
layout when a format does not carry one, and a [memory map](mem_map/index.html) to
translate physical addresses into file offsets.
*/

pub mod error;
#[doc(hidden)]
pub use error::*;

pub mod types;
#[doc(hidden)]
pub use types::*;

pub mod source;
#[doc(hidden)]
pub use source::*;

pub mod scanner;
#[doc(hidden)]
pub use scanner::*;

pub mod detector;
#[doc(hidden)]
pub use detector::*;

pub mod mem_map;
#[doc(hidden)]
pub use mem_map::*;

pub mod phys;
#[doc(hidden)]
pub use phys::*;

pub mod args;
#[doc(hidden)]
pub use args::*;
