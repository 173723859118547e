use thiserror::Error;

use crate::id::ArchiveId;
use crate::zip::ZipError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the registry, entry readers and byte sources.
///
/// A missing archive or entry is not an error; those come back as `Ok(None)`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP request for {url} failed with status: {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("no HTTP source configured for remote archive {0}")]
    NoHttpSource(ArchiveId),

    #[error("location {location:?} cannot be handled by the {layout} layout")]
    UnsupportedLocation {
        location: String,
        layout: &'static str,
    },

    #[error("failed to decode archive {archive}")]
    Decode {
        archive: ArchiveId,
        #[source]
        source: ZipError,
    },

    #[error("archive {archive} is unusable after an earlier decode failure")]
    Poisoned { archive: ArchiveId },
}
