//! Writes a directory tree into an ISO 9660 image with a Joliet supplementary volume.

pub mod date;
pub mod encoding;
pub mod error;
pub mod lba;
pub mod progress;
pub mod serialize;
pub mod source;
pub mod spec;
pub mod tree;
pub mod writer;

pub mod prelude {
  pub use crate::error::{Error, Result};
}

pub use writer::{convert, ConversionReport, IsoWriter, IsoWriterOptions};
