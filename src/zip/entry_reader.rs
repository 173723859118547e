//! Scan-once access to the entries of a single archive.
//!
//! An [`ArchiveEntryReader`] owns the only cursor into an archive's stream.
//! Entries are decoded in stream order; anything passed over on the way to
//! a requested entry is buffered until somebody asks for it, so the stream
//! is never rewound or reopened.

use bytes::Bytes;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::io::Read;
use tracing::{debug, info, warn};

use super::parser::EntryStream;
use crate::error::{Error, Result};
use crate::id::{ArchiveId, EntryPath};
use crate::io::ByteStream;

/// What happens to a buffered entry once it has been returned by `fetch`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConsumePolicy {
    /// The buffer is handed to the first caller and forgotten; asking for the
    /// same entry again yields nothing.
    #[default]
    HandOff,
    /// Buffers stay cached for the lifetime of the reader, so every fetch of
    /// an entry succeeds. Memory is only released with the reader.
    Retain,
}

struct ScanState<R: Read> {
    /// `None` once the stream is exhausted or poisoned.
    stream: Option<EntryStream<R>>,
    /// Scanned but not yet consumed entries, in stream order.
    pending: IndexMap<EntryPath, Bytes>,
    poisoned: bool,
}

/// Serves the entries of one archive from a forward-only stream.
///
/// All stream and cache access happens under one lock, held for the whole
/// of a scan-until-found step. Concurrent callers for the same archive
/// therefore queue up behind whoever is currently scanning.
pub struct ArchiveEntryReader<R: Read = ByteStream> {
    archive: ArchiveId,
    strip_root_folder: bool,
    policy: ConsumePolicy,
    state: Mutex<ScanState<R>>,
}

impl<R: Read> ArchiveEntryReader<R> {
    pub fn new(archive: ArchiveId, stream: R, strip_root_folder: bool) -> Self {
        Self {
            archive,
            strip_root_folder,
            policy: ConsumePolicy::default(),
            state: Mutex::new(ScanState {
                stream: Some(EntryStream::new(stream)),
                pending: IndexMap::new(),
                poisoned: false,
            }),
        }
    }

    pub fn with_policy(mut self, policy: ConsumePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn archive(&self) -> &ArchiveId {
        &self.archive
    }

    pub fn policy(&self) -> ConsumePolicy {
        self.policy
    }

    /// Return the content of `entry`, scanning forward as far as needed.
    ///
    /// Entries passed over on the way are buffered. `Ok(None)` means the
    /// archive ended without the entry, or (under [`ConsumePolicy::HandOff`])
    /// that it was already handed out.
    pub fn fetch(&self, entry: &EntryPath) -> Result<Option<Bytes>> {
        let mut state = self.state.lock();
        if state.poisoned {
            return Err(self.poisoned());
        }

        let cached = match self.policy {
            ConsumePolicy::HandOff => state.pending.shift_remove(entry.as_str()),
            ConsumePolicy::Retain => state.pending.get(entry.as_str()).cloned(),
        };
        if let Some(data) = cached {
            debug!(archive = %self.archive, %entry, "served from scan buffer");
            return Ok(Some(data));
        }

        while let Some((path, data)) = self.scan_next(&mut state)? {
            if &path == entry {
                if self.policy == ConsumePolicy::Retain {
                    state.pending.insert(path, data.clone());
                }
                return Ok(Some(data));
            }
            self.buffer(&mut state, path, data);
        }

        debug!(archive = %self.archive, %entry, "entry not found");
        Ok(None)
    }

    /// Find the first entry whose path satisfies `predicate`.
    ///
    /// Already buffered entries are checked first, in stream order, then the
    /// scan continues. Matching does not consume anything: the returned path
    /// can be fetched afterwards.
    pub fn find_first_matching<P>(&self, mut predicate: P) -> Result<Option<EntryPath>>
    where
        P: FnMut(&EntryPath) -> bool,
    {
        let mut state = self.state.lock();
        if state.poisoned {
            return Err(self.poisoned());
        }

        if let Some(found) = state.pending.keys().find(|&path| predicate(path)) {
            return Ok(Some(found.clone()));
        }

        while let Some((path, data)) = self.scan_next(&mut state)? {
            let matched = predicate(&path);
            self.buffer(&mut state, path.clone(), data);
            if matched {
                return Ok(Some(path));
            }
        }

        Ok(None)
    }

    /// Number of buffered entries.
    pub fn cached_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Total size of all buffered entries.
    pub fn cached_bytes(&self) -> usize {
        self.state.lock().pending.values().map(Bytes::len).sum()
    }

    /// Whether every entry of the archive has been scanned.
    pub fn is_exhausted(&self) -> bool {
        let state = self.state.lock();
        state.stream.is_none() && !state.poisoned
    }

    pub fn is_poisoned(&self) -> bool {
        self.state.lock().poisoned
    }

    // Must be called with the state lock held.
    fn scan_next(&self, state: &mut ScanState<R>) -> Result<Option<(EntryPath, Bytes)>> {
        let Some(stream) = state.stream.as_mut() else {
            return Ok(None);
        };

        match stream.next_entry() {
            Ok(Some(entry)) => {
                let path = EntryPath::from_raw(&entry.name, self.strip_root_folder);
                debug!(
                    archive = %self.archive,
                    entry = %path,
                    size = entry.data.len(),
                    "scanned entry"
                );
                Ok(Some((path, entry.data)))
            }
            Ok(None) => {
                info!(
                    archive = %self.archive,
                    entries = stream.entries_read(),
                    "archive fully scanned"
                );
                state.stream = None;
                Ok(None)
            }
            Err(source) => {
                warn!(archive = %self.archive, error = %source, "archive is corrupt, poisoning reader");
                state.stream = None;
                state.poisoned = true;
                Err(Error::Decode {
                    archive: self.archive.clone(),
                    source,
                })
            }
        }
    }

    fn buffer(&self, state: &mut ScanState<R>, path: EntryPath, data: Bytes) {
        if let Some(previous) = state.pending.insert(path, data) {
            warn!(
                archive = %self.archive,
                replaced_size = previous.len(),
                "duplicate entry name, keeping the later one"
            );
        }
    }

    fn poisoned(&self) -> Error {
        Error::Poisoned {
            archive: self.archive.clone(),
        }
    }
}
