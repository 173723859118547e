//! How a composite location splits into an archive and an entry inside it.

use crate::id::{ArchiveId, EntryPath};

/// Decomposes composite locations for one flavor of archive.
pub trait ArchiveLayout: Send + Sync {
    /// Short name used in error messages.
    fn name(&self) -> &'static str;

    /// Whether this layout understands `location` at all.
    fn matches(&self, location: &str) -> bool;

    /// The archive holding `location`, or `None` if it does not decompose.
    fn archive_of(&self, location: &str) -> Option<ArchiveId>;

    /// Path of `location` inside its archive.
    fn entry_within_archive_of(&self, location: &str) -> Option<EntryPath>;

    /// Whether entries of these archives sit below one top-level folder that
    /// is not part of their identity.
    fn strips_root_folder(&self) -> bool;
}

/// Locations written as `<archive>!/<entry>`, as in `jar:` URLs.
#[derive(Debug, Clone, Default)]
pub struct NestedPathLayout {
    strip_root_folder: bool,
}

impl NestedPathLayout {
    pub const SEPARATOR: &'static str = "!/";

    pub fn new(strip_root_folder: bool) -> Self {
        Self { strip_root_folder }
    }

    fn split(location: &str) -> Option<(&str, &str)> {
        let (archive, entry) = location.split_once(Self::SEPARATOR)?;
        if archive.is_empty() {
            return None;
        }
        Some((archive, entry))
    }
}

impl ArchiveLayout for NestedPathLayout {
    fn name(&self) -> &'static str {
        "nested"
    }

    fn matches(&self, location: &str) -> bool {
        Self::split(location).is_some()
    }

    fn archive_of(&self, location: &str) -> Option<ArchiveId> {
        Self::split(location).map(|(archive, _)| ArchiveId::new(archive))
    }

    fn entry_within_archive_of(&self, location: &str) -> Option<EntryPath> {
        Self::split(location).map(|(_, entry)| EntryPath::new(entry))
    }

    fn strips_root_folder(&self) -> bool {
        self.strip_root_folder
    }
}

/// GitHub file links, served out of the repository's source archive.
///
/// `https://github.com/<owner>/<repo>/blob/<ref>/<path>` lives in
/// `https://github.com/<owner>/<repo>/archive/<ref>.zip` at `<path>`. GitHub
/// puts everything below a `<repo>-<ref>/` folder, which is stripped.
#[derive(Debug, Clone, Default)]
pub struct GithubBlobLayout;

struct BlobLink<'a> {
    repo: &'a str,
    git_ref: &'a str,
    path: &'a str,
}

impl GithubBlobLayout {
    const HOST_PREFIXES: [&'static str; 2] = ["https://github.com/", "http://github.com/"];

    fn parse(location: &str) -> Option<BlobLink<'_>> {
        let rest = Self::HOST_PREFIXES
            .iter()
            .find_map(|prefix| location.strip_prefix(prefix))?;

        let mut parts = rest.splitn(5, '/');
        let owner = parts.next()?;
        let name = parts.next()?;
        if parts.next()? != "blob" {
            return None;
        }
        let git_ref = parts.next()?;
        let path = parts.next()?;
        if owner.is_empty() || name.is_empty() || git_ref.is_empty() || path.is_empty() {
            return None;
        }

        let repo_len = owner.len() + 1 + name.len();
        Some(BlobLink {
            repo: &rest[..repo_len],
            git_ref,
            path,
        })
    }
}

impl ArchiveLayout for GithubBlobLayout {
    fn name(&self) -> &'static str {
        "github"
    }

    fn matches(&self, location: &str) -> bool {
        Self::parse(location).is_some()
    }

    fn archive_of(&self, location: &str) -> Option<ArchiveId> {
        Self::parse(location).map(|link| {
            ArchiveId::new(format!(
                "https://github.com/{}/archive/{}.zip",
                link.repo, link.git_ref
            ))
        })
    }

    fn entry_within_archive_of(&self, location: &str) -> Option<EntryPath> {
        Self::parse(location).map(|link| EntryPath::new(link.path))
    }

    fn strips_root_folder(&self) -> bool {
        true
    }
}
