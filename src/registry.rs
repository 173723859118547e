//! Per-archive reader cache and request routing.

use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::id::{ArchiveId, EntryPath};
use crate::io::ByteSource;
use crate::layout::ArchiveLayout;
use crate::zip::{ArchiveEntryReader, ConsumePolicy};

/// Routes entry requests to one [`ArchiveEntryReader`] per archive.
///
/// A reader is created the first time its archive is referenced and then
/// kept for the lifetime of the registry. The map lock is only held for
/// lookups and inserts (plus opening the stream of a new archive), never
/// while entries are decoded, so requests against different archives do
/// not wait on each other.
pub struct ArchiveRegistry<S, L> {
    source: S,
    layout: L,
    policy: ConsumePolicy,
    readers: RwLock<HashMap<ArchiveId, Arc<ArchiveEntryReader>>>,
}

impl<S: ByteSource, L: ArchiveLayout> ArchiveRegistry<S, L> {
    pub fn new(source: S, layout: L) -> Self {
        Self {
            source,
            layout,
            policy: ConsumePolicy::default(),
            readers: RwLock::new(HashMap::new()),
        }
    }

    /// Consume policy for readers created from now on.
    pub fn with_policy(mut self, policy: ConsumePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn layout(&self) -> &L {
        &self.layout
    }

    /// Whether `location` is something this registry's layout can serve.
    pub fn handles(&self, location: &str) -> bool {
        self.layout.matches(location)
    }

    /// Content of the entry named by `location`.
    ///
    /// `Ok(None)` when the archive is unavailable or does not contain the
    /// entry (or already handed it out).
    pub fn get_entry(&self, location: &str) -> Result<Option<Bytes>> {
        let (archive, entry) = self.decompose(location)?;
        self.get_archive_entry(&archive, &entry)
    }

    /// Same as [`get_entry`](Self::get_entry), for an already decomposed
    /// location, e.g. a path returned by [`find_in_archive`](Self::find_in_archive).
    pub fn get_archive_entry(&self, archive: &ArchiveId, entry: &EntryPath) -> Result<Option<Bytes>> {
        let Some(reader) = self.reader_for(archive)? else {
            return Ok(None);
        };
        reader.fetch(entry)
    }

    /// First entry in the archive of `location` that satisfies `predicate`.
    ///
    /// Only the archive part of `location` is used. The match is not
    /// consumed and can be fetched afterwards.
    pub fn find_in_archive<P>(&self, location: &str, predicate: P) -> Result<Option<EntryPath>>
    where
        P: FnMut(&EntryPath) -> bool,
    {
        let archive = self
            .layout
            .archive_of(location)
            .ok_or_else(|| self.unsupported(location))?;
        let Some(reader) = self.reader_for(&archive)? else {
            return Ok(None);
        };
        reader.find_first_matching(predicate)
    }

    /// Reader for `archive` if it has been opened already.
    pub fn reader(&self, archive: &ArchiveId) -> Option<Arc<ArchiveEntryReader>> {
        self.readers.read().get(archive).cloned()
    }

    /// Number of archives opened so far.
    pub fn open_archive_count(&self) -> usize {
        self.readers.read().len()
    }

    fn decompose(&self, location: &str) -> Result<(ArchiveId, EntryPath)> {
        let archive = self.layout.archive_of(location);
        let entry = self.layout.entry_within_archive_of(location);
        match (archive, entry) {
            (Some(archive), Some(entry)) => Ok((archive, entry)),
            _ => Err(self.unsupported(location)),
        }
    }

    fn reader_for(&self, archive: &ArchiveId) -> Result<Option<Arc<ArchiveEntryReader>>> {
        if let Some(reader) = self.readers.read().get(archive) {
            return Ok(Some(reader.clone()));
        }

        let mut readers = self.readers.write();
        // Recheck, another thread may have opened it between the two locks
        if let Some(reader) = readers.get(archive) {
            return Ok(Some(reader.clone()));
        }

        let Some(stream) = self.source.open(archive)? else {
            debug!(%archive, "archive unavailable");
            return Ok(None);
        };

        info!(%archive, "opened archive");
        let reader = Arc::new(
            ArchiveEntryReader::new(archive.clone(), stream, self.layout.strips_root_folder())
                .with_policy(self.policy),
        );
        readers.insert(archive.clone(), reader.clone());
        Ok(Some(reader))
    }

    fn unsupported(&self, location: &str) -> Error {
        Error::UnsupportedLocation {
            location: location.to_string(),
            layout: self.layout.name(),
        }
    }
}
