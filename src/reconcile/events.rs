use std::path::PathBuf;
use std::pin::pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use derive_more::Display;
use futures::future::{Either, select};
use futures::{Stream, StreamExt};
use snafu::{ResultExt, Snafu};
use tracing::debug;
use walkdir::WalkDir;

use crate::ext::BestEffortPathExt;
use crate::filesystem::{EntryKind, MirrorPath, SyncRoots};
use crate::journal::ActivitySink;
use crate::reconcile::{Applier, ApplyError, Mutation, PollingReconciler};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum NotificationKind {
    #[display("created")]
    Created,
    #[display("modified")]
    Modified,
    #[display("deleted")]
    Deleted,
}

/// A change reported by the OS for one path under the source root.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("{} {} {}", entry, kind, path.display())]
pub struct NotificationEvent {
    pub kind: NotificationKind,
    pub entry: EntryKind,
    /// Absolute source-side path at notification time.
    pub path: PathBuf,
}

impl NotificationEvent {
    pub fn created(entry: EntryKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind: NotificationKind::Created,
            entry,
            path: path.into(),
        }
    }

    pub fn modified(entry: EntryKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind: NotificationKind::Modified,
            entry,
            path: path.into(),
        }
    }

    pub fn deleted(entry: EntryKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind: NotificationKind::Deleted,
            entry,
            path: path.into(),
        }
    }
}

/// Applies notifications to the replica one at a time, in arrival order.
///
/// Nothing is rescanned here: a notification the OS never delivered leaves
/// the replica out of date until a full pass runs.
pub struct EventReconciler {
    roots: SyncRoots,
    applier: Applier,
    sink: Arc<dyn ActivitySink>,
}

impl EventReconciler {
    pub fn new(roots: SyncRoots, sink: Arc<dyn ActivitySink>) -> Self {
        Self {
            roots,
            applier: Applier::new(sink.clone()),
            sink,
        }
    }

    /// Consumes `events` until the stream ends.
    pub async fn run<S>(&self, mut events: S)
    where
        S: Stream<Item = NotificationEvent> + Unpin,
    {
        while let Some(event) = events.next().await {
            self.handle(event).await;
        }
        debug!("Notification stream ended");
    }

    /// Like [`run`](Self::run), with a full polling pass every `interval`
    /// to catch up on notifications that were lost.
    pub async fn run_with_rescan<S>(
        &self,
        mut events: S,
        polling: &mut PollingReconciler,
        interval: Duration,
    ) where
        S: Stream<Item = NotificationEvent> + Unpin,
    {
        loop {
            let deadline = Instant::now() + interval;
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                let timer = pin!(compio::time::sleep(remaining));
                match select(events.next(), timer).await {
                    Either::Left((Some(event), _)) => self.handle(event).await,
                    Either::Left((None, _)) => {
                        debug!("Notification stream ended");
                        return;
                    }
                    Either::Right(_) => break,
                }
            }
            debug!("Running scheduled full rescan");
            polling.tick().await;
        }
    }

    /// Applies one event. Failures are reported and the event is dropped.
    pub async fn handle(&self, event: NotificationEvent) {
        if let Err(error) = self.dispatch(&event).await {
            self.sink
                .failed(&format!("{} {}", event.entry, event.kind), &event.path, &error);
        }
    }

    async fn dispatch(&self, event: &NotificationEvent) -> Result<(), EventError> {
        let Some(target) = self.roots.mirror_source_path(&event.path) else {
            debug!("Ignoring event outside of the source root: {event}");
            return Ok(());
        };
        debug!("Handling {event}");

        self.apply(event, &target).await.context(MirrorSnafu {
            kind: event.kind,
            path: target.destination.clone(),
        })
    }

    async fn apply(
        &self,
        event: &NotificationEvent,
        target: &MirrorPath,
    ) -> Result<(), ApplyError> {
        match (event.kind, event.entry) {
            (NotificationKind::Created | NotificationKind::Modified, EntryKind::File) => {
                self.mirror_file(target).await
            }
            (NotificationKind::Created, EntryKind::Directory) => {
                self.mirror_directory(target).await
            }
            (NotificationKind::Modified, EntryKind::Directory) => Ok(()),
            (NotificationKind::Deleted, EntryKind::File) => {
                if self.applier.remove_file(target).await? == Mutation::AlreadyInPlace {
                    self.sink.warned(
                        &target.destination,
                        "Deleted file was already absent from the replica",
                    );
                }
                Ok(())
            }
            (NotificationKind::Deleted, EntryKind::Directory) => {
                self.applier.remove_directory_tree(target).await?;
                Ok(())
            }
            (NotificationKind::Created | NotificationKind::Modified, EntryKind::Symlink) => {
                debug!("Ignoring symbolic link {}", target.source.display());
                Ok(())
            }
            (NotificationKind::Deleted, EntryKind::Symlink) => {
                self.applier.remove_file(target).await?;
                Ok(())
            }
        }
    }

    async fn mirror_file(&self, target: &MirrorPath) -> Result<(), ApplyError> {
        // Link creation is reported as a plain file creation on some platforms.
        if let Ok(metadata) = std::fs::symlink_metadata(&target.source)
            && !metadata.is_file()
        {
            debug!(
                "Ignoring {}, not a regular file",
                target.source.display()
            );
            return Ok(());
        }

        self.create_ancestors(target).await?;
        self.applier.copy_file(target).await?;
        Ok(())
    }

    /// Creates every replica ancestor of `target`, outermost first, replacing
    /// links that would redirect the copy.
    async fn create_ancestors(&self, target: &MirrorPath) -> Result<(), ApplyError> {
        let mut ancestors = Vec::new();
        let mut current = target.relative.parent();
        while let Some(parent) = current {
            current = parent.parent();
            ancestors.push(parent);
        }
        for ancestor in ancestors.iter().rev() {
            self.applier
                .create_directory(&self.roots.mirror(ancestor))
                .await?;
        }
        Ok(())
    }

    /// Recreates a directory from scratch together with its current
    /// subdirectories. Files follow through their own notifications.
    async fn mirror_directory(&self, target: &MirrorPath) -> Result<(), ApplyError> {
        match self.applier.remove_directory_tree(target).await {
            Err(ApplyError::Collision { .. }) => {
                self.applier.remove_file(target).await?;
            }
            result => {
                result?;
            }
        }
        self.applier.create_directory(target).await?;

        let walker = WalkDir::new(&target.source)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name();
        for item in walker {
            let dir_entry = match item {
                Ok(dir_entry) => dir_entry,
                Err(error) => {
                    let path = error.path().unwrap_or(&target.source).to_path_buf();
                    self.sink.failed("list directory", &path, &error);
                    continue;
                }
            };
            if !dir_entry.file_type().is_dir() {
                continue;
            }
            if let Some(subdirectory) = self.roots.mirror_source_path(dir_entry.path()) {
                self.applier.create_directory(&subdirectory).await?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Snafu)]
pub enum EventError {
    #[snafu(display("Failed to mirror {} event onto {}", kind, path.best_effort_path_display()))]
    MirrorError {
        kind: NotificationKind,
        path: PathBuf,
        source: ApplyError,
    },
}
