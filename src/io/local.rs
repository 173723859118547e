use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{ByteSource, ByteStream};
use crate::error::Result;
use crate::id::ArchiveId;

/// Local file source; archive identifiers are filesystem paths
pub struct LocalFileSource {
    base_dir: Option<PathBuf>,
}

impl LocalFileSource {
    /// Resolve archive identifiers against the current directory.
    pub fn new() -> Self {
        Self { base_dir: None }
    }

    /// Resolve relative archive identifiers against `base_dir`.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn resolve(&self, archive: &ArchiveId) -> PathBuf {
        let path = Path::new(archive.as_str());
        match &self.base_dir {
            Some(base) => base.join(path),
            None => path.to_path_buf(),
        }
    }
}

impl Default for LocalFileSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteSource for LocalFileSource {
    fn open(&self, archive: &ArchiveId) -> Result<Option<ByteStream>> {
        let path = self.resolve(archive);
        match std::fs::File::open(&path) {
            Ok(file) => {
                debug!(path = %path.display(), "opened local archive");
                Ok(Some(Box::new(file)))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "local archive not found");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}
