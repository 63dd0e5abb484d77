use std::cmp::Reverse;

use tracing::debug;

use crate::filesystem::{RelativePath, Tree};
use crate::reconcile::ChangeAction;

/// Finds replica paths that no longer exist in the source.
pub struct Pruner;

impl Pruner {
    /// Returns one `Remove` per replica-only path, deepest paths first so
    /// every child is removed before its parent directory.
    ///
    /// Paths below a source directory that failed to list are kept: their
    /// absence from the source tree proves nothing.
    pub fn prune(source: &Tree, replica: &Tree) -> Vec<ChangeAction> {
        let mut stale: Vec<&RelativePath> = replica
            .iter()
            .map(|entry| &entry.relative)
            .filter(|relative| !source.contains(relative))
            .filter(|relative| {
                let unlisted = source.is_unlisted(relative);
                if unlisted {
                    debug!("Keeping '{}', its source directory was not listed", relative);
                }
                !unlisted
            })
            .collect();

        stale.sort_by_key(|relative| (Reverse(relative.depth()), *relative));

        stale
            .into_iter()
            .cloned()
            .map(ChangeAction::Remove)
            .collect()
    }
}
