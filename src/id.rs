//! Identifiers for archives and for entries inside them.

use std::borrow::Borrow;
use std::fmt;

/// Identifies one logical archive resource (a path or URL).
///
/// Two identifiers refer to the same archive iff their strings are equal;
/// any normalization happens before an `ArchiveId` is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchiveId(String);

impl ArchiveId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this identifier names a remote archive.
    pub fn is_http_url(&self) -> bool {
        self.0.starts_with("http://") || self.0.starts_with("https://")
    }
}

impl fmt::Display for ArchiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArchiveId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ArchiveId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Path of a single file inside an archive.
///
/// Separators are always `/`. When the archive wraps everything in a common
/// top-level directory, that directory is already stripped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryPath(String);

impl EntryPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into().replace('\\', "/"))
    }

    /// Build the identifier for a raw name as stored in the archive.
    ///
    /// With `strip_root_folder` everything up to and including the first `/`
    /// is removed. A name without any `/` is kept whole.
    pub fn from_raw(name: &str, strip_root_folder: bool) -> Self {
        let name = name.replace('\\', "/");
        if !strip_root_folder {
            return Self(name);
        }
        match name.find('/') {
            Some(idx) => Self(name[idx + 1..].to_string()),
            None => Self(name),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory entries end with `/`.
    pub fn is_dir(&self) -> bool {
        self.0.ends_with('/')
    }

    /// Last path component, ignoring a trailing `/`.
    pub fn file_name(&self) -> &str {
        let trimmed = self.0.trim_end_matches('/');
        trimmed.rsplit('/').next().unwrap_or(trimmed)
    }
}

impl fmt::Display for EntryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for EntryPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntryPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EntryPath {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}
