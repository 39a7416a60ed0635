//! Sector-level access to raw CD-ROM and CD-ROM XA disc images.
//!
//! Disc images come in several physical layouts (2048, 2336, 2352 and 2448 bytes per sector)
//! which are almost never declared anywhere. This crate identifies the layout of an image, exposes
//! it as a sequence of decoded sectors (headers, XA sub-headers, user data, corruption report) and
//! can write modified user data back while regenerating the CD-ROM error detection and correction
//! codes.

#![warn(missing_docs)]

#[macro_use]
extern crate arrayref;
extern crate thiserror;

pub use bcd::Bcd;
pub use byte_source::ByteSource;
pub use detect::identify;
pub use msf::Msf;
pub use options::OpenOptions;
pub use patch::{PatchProgress, PatchSet};
pub use sector::{ImageLayout, Sector, SectorKind, SectorLayout};
pub use store::{DiscDescriptor, SectorStore};

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub mod bcd;
pub mod byte_source;
pub mod detect;
pub mod ecc;
pub mod msf;
pub mod options;
pub mod patch;
pub mod riff;
pub mod sector;
pub mod store;


/// Error type for disc operations.
#[allow(missing_docs)]
#[derive(Error, Debug)]
pub enum CdError {
    #[error("Generic I/O error")]
    IoError(#[from] io::Error),
    #[error("File `{0}` not found")]
    FileNotFound(PathBuf),
    #[error("File `{path}` is too small ({len} bytes) to identify its sector layout")]
    FileTooSmall { path: PathBuf, len: u64 },
    #[error("File `{path}` is too large ({len} bytes)")]
    FileTooLarge { path: PathBuf, len: u64 },
    #[error("Error while reading `{path}`: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("Error while writing `{path}`: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("Couldn't reopen `{path}` for writing: {source}")]
    Reopen { path: PathBuf, source: io::Error },
    #[error("Invalid disc descriptor `{descriptor}`: {desc}")]
    BadDescriptor { descriptor: String, desc: String },
    #[error("First sector offset {offset} isn't smaller than the {size} byte sector size")]
    BadLayout { offset: u32, size: usize },
    #[error("Attempted to access sector {index} of a {count} sector image")]
    OutOfBounds { index: u64, count: u32 },
    #[error("Expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),
    #[error("Operation canceled")]
    Canceled,
    #[error("Couldn't read back staged patch data: {0}")]
    StagingRead(io::Error),
    #[error("Patch {offset}+{len} overlaps a previous patch of sector {sector}")]
    OverlappingPatch { sector: u32, offset: usize, len: usize },
    #[error("Patch {offset}+{len} doesn't fit in a sector")]
    PatchOutOfRange { offset: usize, len: usize },
    #[error("Can't wrap {0} bytes in a RIFF/CDXA header")]
    BadRiffPayload(u64),
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Convenience type alias for a `Result<R, CdError>`
pub type CdResult<R> = std::result::Result<R, CdError>;

#[test]
fn cderror_display() {
    // Make sure that CdError implements Display. This should be true if we set an
    // `#[error("...")]` for every variant
    println!("{}", CdError::Canceled);
    println!(
        "{}",
        CdError::OutOfBounds {
            index: 4,
            count: 4
        }
    );
}
