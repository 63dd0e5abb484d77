use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use derive_more::{Display, From};

/// Path of a filesystem object relative to the root of its tree.
///
/// This is the join key between the source and the replica. Absolute paths
/// are derived from it through [`SyncRoots`], never compared directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, From)]
pub struct RelativePath(PathBuf);

impl RelativePath {
    /// Strips `root` from `path`. Returns `None` for the root itself and for
    /// paths outside of it.
    pub fn from_root(root: &Path, path: &Path) -> Option<Self> {
        let relative = path.strip_prefix(root).ok()?;
        if relative.as_os_str().is_empty() {
            return None;
        }
        Some(Self(relative.to_path_buf()))
    }

    /// Number of components, so `a/b.txt` has depth 2.
    pub fn depth(&self) -> usize {
        self.0.components().count()
    }

    pub fn resolve(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }

    pub fn parent(&self) -> Option<RelativePath> {
        self.0
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(|parent| Self(parent.to_path_buf()))
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl From<&str> for RelativePath {
    fn from(value: &str) -> Self {
        Self(PathBuf::from(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum EntryKind {
    #[display("file")]
    File,
    #[display("directory")]
    Directory,
    /// Only reported in replica trees, where links are never kept.
    #[display("symbolic link")]
    Symlink,
}

/// One file or directory found by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub relative: RelativePath,
    /// Absolute location inside the tree the entry was scanned from.
    pub path: PathBuf,
    pub kind: EntryKind,
    pub modified: Option<SystemTime>,
}

impl Entry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// The two tree roots a mirror is maintained between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRoots {
    pub source: PathBuf,
    pub replica: PathBuf,
}

impl SyncRoots {
    pub fn new(source: impl Into<PathBuf>, replica: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            replica: replica.into(),
        }
    }

    pub fn mirror(&self, relative: &RelativePath) -> MirrorPath {
        MirrorPath {
            source: relative.resolve(&self.source),
            destination: relative.resolve(&self.replica),
            relative: relative.clone(),
        }
    }

    /// Maps an absolute path under the source root onto both trees.
    pub fn mirror_source_path(&self, source_path: &Path) -> Option<MirrorPath> {
        RelativePath::from_root(&self.source, source_path).map(|relative| self.mirror(&relative))
    }
}

/// A relative path together with its absolute location in both trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorPath {
    pub relative: RelativePath,
    pub source: PathBuf,
    pub destination: PathBuf,
}
