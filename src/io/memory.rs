use bytes::{Buf, Bytes};
use parking_lot::RwLock;
use std::collections::HashMap;

use super::{ByteSource, ByteStream};
use crate::error::Result;
use crate::id::ArchiveId;

/// Archives held in memory, keyed by identifier.
#[derive(Default)]
pub struct MemorySource {
    archives: RwLock<HashMap<ArchiveId, Bytes>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, archive: impl Into<ArchiveId>, data: impl Into<Bytes>) {
        self.archives.write().insert(archive.into(), data.into());
    }
}

impl ByteSource for MemorySource {
    fn open(&self, archive: &ArchiveId) -> Result<Option<ByteStream>> {
        Ok(self
            .archives
            .read()
            .get(archive)
            .map(|data| Box::new(data.clone().reader()) as ByteStream))
    }
}
