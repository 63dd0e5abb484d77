use std::path::{Path, PathBuf};
use std::sync::Arc;

use snafu::{ResultExt, Snafu, ensure};
use tracing::debug;
use walkdir::WalkDir;

use crate::ext::BestEffortPathExt;
use crate::filesystem::{Entry, EntryKind, RelativePath, Tree};
use crate::journal::ActivitySink;

/// Walks a directory tree into a [`Tree`].
///
/// Symbolic links are never followed, so link cycles cannot occur. Entries
/// that cannot be read are reported to the sink and left out; a directory
/// whose listing failed is marked incomplete so nothing below it gets pruned.
pub struct Scanner {
    sink: Arc<dyn ActivitySink>,
}

impl Scanner {
    pub fn new(sink: Arc<dyn ActivitySink>) -> Self {
        Self { sink }
    }

    /// Scans a source tree. Symbolic links are left out.
    pub fn scan(&self, root: &Path) -> Result<Tree, ScanError> {
        self.walk(root, false)
    }

    /// Scans a replica tree. Symbolic links are reported as
    /// [`EntryKind::Symlink`] so they can be removed.
    pub fn scan_replica(&self, root: &Path) -> Result<Tree, ScanError> {
        self.walk(root, true)
    }

    fn walk(&self, root: &Path, report_links: bool) -> Result<Tree, ScanError> {
        let metadata = std::fs::metadata(root).context(RootSnafu {
            path: root.to_path_buf(),
        })?;
        ensure!(
            metadata.is_dir(),
            NotDirectorySnafu {
                path: root.to_path_buf()
            }
        );

        let mut tree = Tree::new(root);
        let walker = WalkDir::new(root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name();

        for item in walker {
            let dir_entry = match item {
                Ok(dir_entry) => dir_entry,
                Err(error) if error.depth() == 0 => {
                    return Err(error).context(ListSnafu {
                        path: root.to_path_buf(),
                    });
                }
                Err(error) => {
                    let path = error.path().unwrap_or(root).to_path_buf();
                    self.sink.failed("scan", &path, &error);
                    if let Some(relative) = RelativePath::from_root(root, &path) {
                        tree.mark_incomplete(relative);
                    }
                    continue;
                }
            };

            let file_type = dir_entry.file_type();
            let kind = if file_type.is_dir() {
                EntryKind::Directory
            } else if file_type.is_file() {
                EntryKind::File
            } else if report_links && file_type.is_symlink() {
                EntryKind::Symlink
            } else {
                debug!("Skipping special file {}", dir_entry.path().display());
                continue;
            };

            let Some(relative) = RelativePath::from_root(root, dir_entry.path()) else {
                continue;
            };

            let modified = match dir_entry.metadata() {
                Ok(metadata) => metadata.modified().ok(),
                Err(error) => {
                    self.sink.failed("scan", dir_entry.path(), &error);
                    if kind == EntryKind::Directory {
                        tree.mark_incomplete(relative);
                    }
                    continue;
                }
            };

            tree.insert(Entry {
                relative,
                path: dir_entry.path().to_path_buf(),
                kind,
                modified,
            });
        }

        debug!("Scanned {} entries under {}", tree.len(), root.display());
        Ok(tree)
    }
}

#[derive(Debug, Snafu)]
pub enum ScanError {
    #[snafu(display("Cannot access tree root {}", path.best_effort_path_display()))]
    RootError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Tree root {} is not a directory", path.best_effort_path_display()))]
    NotDirectory { path: PathBuf },
    #[snafu(display("Failed to list tree root {}", path.best_effort_path_display()))]
    ListError {
        path: PathBuf,
        source: walkdir::Error,
    },
}
