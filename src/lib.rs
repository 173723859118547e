//! # streamzip
//!
//! On-demand, thread-safe extraction of single files from ZIP archives that
//! are only available as forward-only byte streams.
//!
//! Reaching an arbitrary entry of a streamed ZIP means reading past every
//! entry before it. This library scans each archive exactly once, buffers
//! the entries it passes over until someone asks for them, and shares one
//! scanner per archive between all threads.
//!
//! ## Features
//!
//! - Archives from the local filesystem or streamed over HTTP/HTTPS
//! - STORED and DEFLATE entries, including streamed entries with data descriptors
//! - ZIP64 sizes in local headers
//! - Pluggable location layouts (`archive.zip!/entry`, GitHub blob links)
//! - Lookup of the first entry matching a predicate, without consuming it
//!
//! ## Example
//!
//! ```no_run
//! use streamzip::{ArchiveRegistry, LocalFileSource, NestedPathLayout};
//!
//! fn main() -> streamzip::Result<()> {
//!     let registry = ArchiveRegistry::new(LocalFileSource::new(), NestedPathLayout::new(false));
//!
//!     // Locate the manifest, then fetch it by its exact path
//!     if let Some(manifest) = registry.find_in_archive("pack.zip!/", |p| p.as_str().ends_with("pack.toml"))? {
//!         let data = registry.get_entry(&format!("pack.zip!/{manifest}"))?;
//!         println!("{} bytes", data.map_or(0, |d| d.len()));
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod id;
pub mod io;
pub mod layout;
pub mod registry;
pub mod zip;

#[cfg(test)]
mod test_util;

pub use cli::Cli;
pub use error::{Error, Result};
pub use id::{ArchiveId, EntryPath};
pub use io::{ByteSource, ByteStream, HttpSource, LocalFileSource, MemorySource, RoutingSource};
pub use layout::{ArchiveLayout, GithubBlobLayout, NestedPathLayout};
pub use registry::ArchiveRegistry;
pub use self::zip::{ArchiveEntryReader, ConsumePolicy};
