mod http;
mod local;
mod memory;

pub use http::{HttpBodyReader, HttpSource};
pub use local::LocalFileSource;
pub use memory::MemorySource;

use std::io::Read;

use crate::error::{Error, Result};
use crate::id::ArchiveId;

/// A forward-only byte stream holding one archive.
pub type ByteStream = Box<dyn Read + Send>;

/// Trait for obtaining the raw byte stream of an archive
pub trait ByteSource: Send + Sync {
    /// Open the archive identified by `archive`.
    ///
    /// Returns `Ok(None)` when the archive does not exist; errors are
    /// reserved for transport failures.
    fn open(&self, archive: &ArchiveId) -> Result<Option<ByteStream>>;
}

impl<S: ByteSource + ?Sized> ByteSource for std::sync::Arc<S> {
    fn open(&self, archive: &ArchiveId) -> Result<Option<ByteStream>> {
        (**self).open(archive)
    }
}

/// Sends `http://` and `https://` archives to an [`HttpSource`] and
/// everything else to a [`LocalFileSource`].
pub struct RoutingSource {
    local: LocalFileSource,
    http: Option<HttpSource>,
}

impl RoutingSource {
    pub fn new(local: LocalFileSource, http: Option<HttpSource>) -> Self {
        Self { local, http }
    }

    pub fn http(&self) -> Option<&HttpSource> {
        self.http.as_ref()
    }
}

impl ByteSource for RoutingSource {
    fn open(&self, archive: &ArchiveId) -> Result<Option<ByteStream>> {
        if archive.is_http_url() {
            match &self.http {
                Some(http) => http.open(archive),
                None => Err(Error::NoHttpSource(archive.clone())),
            }
        } else {
            self.local.open(archive)
        }
    }
}
