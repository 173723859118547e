//! Forward-only ZIP decoding and per-archive entry caching.
//!
//! ## Architecture
//!
//! - [`structures`]: Local file header layout, signatures and flags
//! - [`parser`]: Sequential decoding of entries from a non-seekable stream
//! - [`entry_reader`]: Thread-safe, scan-once access to the entries of one archive
//!
//! ## Streaming Strategy
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! Random access readers start from the EOCD. A forward-only stream cannot,
//! so this module walks the local file headers in order and stops at the
//! first central directory or end record. Entries written with a trailing
//! data descriptor are supported for DEFLATE, where the end of the
//! compressed data is found by the decoder itself.
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No BZIP2, LZMA, or other compression methods
//! - CRC values are read but not verified

pub mod entry_reader;
pub mod parser;
pub mod structures;

pub use entry_reader::{ArchiveEntryReader, ConsumePolicy};
pub use parser::{EntryStream, StreamedEntry};
pub use structures::CompressionMethod;

use thiserror::Error;

/// Decoding failures while walking a ZIP stream.
///
/// Any of these leaves the stream at an unknown position, so the caller
/// must not keep reading from it.
#[derive(Debug, Error)]
pub enum ZipError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected end of stream inside {0}")]
    Truncated(&'static str),

    #[error("invalid signature 0x{0:08X} at entry boundary")]
    InvalidSignature(u32),

    #[error("entry {0:?} is encrypted")]
    Encrypted(String),

    #[error("entry {name:?} uses unsupported compression method {method}")]
    UnsupportedCompression { name: String, method: u16 },

    #[error("stored entry {0:?} has no recorded length")]
    UnknownLength(String),

    #[error("entry {name:?} has a corrupt deflate stream")]
    Inflate {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("entry {name:?} records {expected} {what} bytes but {actual} were found")]
    SizeMismatch {
        name: String,
        what: &'static str,
        expected: u64,
        actual: u64,
    },
}
