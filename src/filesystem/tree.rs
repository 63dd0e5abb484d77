use std::collections::HashSet;
use std::path::{Path, PathBuf};

use hashlink::LinkedHashMap;

use super::{Entry, RelativePath};

/// Scan-ordered snapshot of one directory tree.
///
/// Iteration yields entries in insertion order, which the scanner guarantees
/// to be depth-first with every directory before its children.
#[derive(Debug, Clone)]
pub struct Tree {
    root: PathBuf,
    entries: LinkedHashMap<RelativePath, Entry>,
    /// Directories whose content could not be listed.
    incomplete: HashSet<RelativePath>,
}

impl Tree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: LinkedHashMap::new(),
            incomplete: HashSet::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn insert(&mut self, entry: Entry) {
        self.entries.insert(entry.relative.clone(), entry);
    }

    pub fn get(&self, relative: &RelativePath) -> Option<&Entry> {
        self.entries.get(relative)
    }

    pub fn contains(&self, relative: &RelativePath) -> bool {
        self.entries.contains_key(relative)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    pub fn mark_incomplete(&mut self, relative: RelativePath) {
        self.incomplete.insert(relative);
    }

    /// Whether `relative` may exist in the real tree without having been
    /// scanned, because it or one of its ancestors failed to list.
    pub fn is_unlisted(&self, relative: &RelativePath) -> bool {
        if self.incomplete.is_empty() {
            return false;
        }
        let mut current = Some(relative.clone());
        while let Some(path) = current {
            if self.incomplete.contains(&path) {
                return true;
            }
            current = path.parent();
        }
        false
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
