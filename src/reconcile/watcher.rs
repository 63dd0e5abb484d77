use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::{self, BoxStream};
use notify::event::{AccessKind, AccessMode, CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use snafu::{ResultExt, Snafu};
use tracing::{debug, info};

use crate::ext::BestEffortPathExt;
use crate::filesystem::{EntryKind, SyncRoots};
use crate::journal::ActivitySink;
use crate::reconcile::NotificationEvent;

/// Maps raw OS notifications onto [`NotificationEvent`]s.
///
/// When a notification does not say whether it concerns a file or a
/// directory, creations are resolved by looking at the source and removals
/// by looking at what the replica currently holds at the mirrored path.
#[derive(Debug, Clone)]
pub struct EventTranslator {
    roots: SyncRoots,
}

impl EventTranslator {
    pub fn new(roots: SyncRoots) -> Self {
        Self { roots }
    }

    pub fn translate(&self, event: Event) -> Vec<NotificationEvent> {
        let Event { kind, paths, .. } = event;
        match kind {
            EventKind::Create(CreateKind::File) => paths
                .into_iter()
                .map(|path| NotificationEvent::created(EntryKind::File, path))
                .collect(),
            EventKind::Create(CreateKind::Folder) => paths
                .into_iter()
                .map(|path| NotificationEvent::created(EntryKind::Directory, path))
                .collect(),
            EventKind::Create(_) => paths
                .into_iter()
                .filter_map(|path| self.created(path))
                .collect(),

            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => paths
                .into_iter()
                .map(|path| self.deleted(path))
                .collect(),
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => paths
                .into_iter()
                .filter_map(|path| self.created(path))
                .collect(),
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                let mut paths = paths.into_iter();
                let from = paths.next().map(|path| self.deleted(path));
                let to = paths.next().and_then(|path| self.created(path));
                from.into_iter().chain(to).collect()
            }
            EventKind::Modify(ModifyKind::Name(_)) => paths
                .into_iter()
                .map(|path| self.created(path.clone()).unwrap_or_else(|| self.deleted(path)))
                .collect(),
            EventKind::Modify(_) | EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
                paths
                    .into_iter()
                    .filter(|path| kind_on_disk(path) == Some(EntryKind::File))
                    .map(|path| NotificationEvent::modified(EntryKind::File, path))
                    .collect()
            }

            EventKind::Remove(RemoveKind::File) => paths
                .into_iter()
                .map(|path| NotificationEvent::deleted(EntryKind::File, path))
                .collect(),
            EventKind::Remove(RemoveKind::Folder) => paths
                .into_iter()
                .map(|path| NotificationEvent::deleted(EntryKind::Directory, path))
                .collect(),
            EventKind::Remove(_) => paths.into_iter().map(|path| self.deleted(path)).collect(),

            EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
        }
    }

    fn created(&self, path: PathBuf) -> Option<NotificationEvent> {
        match kind_on_disk(&path) {
            Some(entry) => Some(NotificationEvent::created(entry, path)),
            None => {
                debug!(
                    "Skipping creation of {}, not a file, directory or link",
                    path.best_effort_path_display()
                );
                None
            }
        }
    }

    fn deleted(&self, path: PathBuf) -> NotificationEvent {
        let entry = self
            .roots
            .mirror_source_path(&path)
            .and_then(|target| kind_on_disk(&target.destination))
            .unwrap_or(EntryKind::File);
        NotificationEvent::deleted(entry, path)
    }
}

fn kind_on_disk(path: &Path) -> Option<EntryKind> {
    let metadata = std::fs::symlink_metadata(path).ok()?;
    if metadata.is_dir() {
        Some(EntryKind::Directory)
    } else if metadata.is_file() {
        Some(EntryKind::File)
    } else if metadata.is_symlink() {
        Some(EntryKind::Symlink)
    } else {
        None
    }
}

/// A recursive watch on the source root.
///
/// Notifications stop once this value is dropped.
pub struct NotificationSubscription {
    _watcher: RecommendedWatcher,
    pub events: BoxStream<'static, NotificationEvent>,
}

impl NotificationSubscription {
    pub fn start(roots: &SyncRoots, sink: Arc<dyn ActivitySink>) -> Result<Self, WatchError> {
        let (sender, receiver) = futures_channel::mpsc::unbounded();

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            if sender.unbounded_send(result).is_err() {
                debug!("Notification channel closed, dropping event");
            }
        })
        .context(CreateWatcherSnafu)?;
        watcher
            .watch(&roots.source, RecursiveMode::Recursive)
            .context(WatchRootSnafu {
                path: roots.source.clone(),
            })?;
        info!(
            "Watching {} for changes",
            roots.source.best_effort_path_display()
        );

        let translator = EventTranslator::new(roots.clone());
        let source = roots.source.clone();
        let events = receiver
            .flat_map(move |result| {
                let translated = match result {
                    Ok(event) => translator.translate(event),
                    Err(error) => {
                        let path = error.paths.first().unwrap_or(&source).clone();
                        sink.warned(&path, &format!("Watcher reported an error: {error}"));
                        Vec::new()
                    }
                };
                stream::iter(translated)
            })
            .boxed();

        Ok(Self {
            _watcher: watcher,
            events,
        })
    }
}

#[derive(Debug, Snafu)]
pub enum WatchError {
    #[snafu(display("Failed to create a filesystem watcher"))]
    CreateWatcherError { source: notify::Error },
    #[snafu(display("Failed to watch {}", path.best_effort_path_display()))]
    WatchRootError {
        path: PathBuf,
        source: notify::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::events::NotificationKind;
    use notify::event::{DataChange, MetadataKind};
    use rstest::*;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        source: TempDir,
        replica: TempDir,
        translator: EventTranslator,
    }

    #[fixture]
    fn fixture() -> Fixture {
        let source = TempDir::new().expect("Failed to create source directory");
        let replica = TempDir::new().expect("Failed to create replica directory");
        let translator = EventTranslator::new(SyncRoots::new(source.path(), replica.path()));
        Fixture {
            source,
            replica,
            translator,
        }
    }

    fn event(kind: EventKind, paths: &[&Path]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |event, path| event.add_path(path.to_path_buf()))
    }

    fn summary(events: &[NotificationEvent]) -> Vec<(NotificationKind, EntryKind)> {
        events.iter().map(|event| (event.kind, event.entry)).collect()
    }

    #[rstest]
    #[case(EventKind::Create(CreateKind::File), EntryKind::File)]
    #[case(EventKind::Create(CreateKind::Folder), EntryKind::Directory)]
    fn typed_creation_is_taken_as_reported(
        fixture: Fixture,
        #[case] kind: EventKind,
        #[case] expected: EntryKind,
    ) {
        let path = fixture.source.path().join("new");

        let events = fixture.translator.translate(event(kind, &[&path]));

        assert_eq!(events, vec![NotificationEvent::created(expected, path)]);
    }

    #[rstest]
    fn untyped_creation_is_resolved_from_the_source(fixture: Fixture) {
        let file = fixture.source.path().join("a.txt");
        let directory = fixture.source.path().join("d");
        fs::write(&file, "a").unwrap();
        fs::create_dir(&directory).unwrap();

        let events = fixture
            .translator
            .translate(event(EventKind::Create(CreateKind::Any), &[&file, &directory]));

        assert_eq!(
            summary(&events),
            vec![
                (NotificationKind::Created, EntryKind::File),
                (NotificationKind::Created, EntryKind::Directory)
            ]
        );
    }

    #[rstest]
    fn untyped_creation_of_vanished_path_is_dropped(fixture: Fixture) {
        let path = fixture.source.path().join("gone");

        let events = fixture
            .translator
            .translate(event(EventKind::Create(CreateKind::Any), &[&path]));

        assert!(events.is_empty());
    }

    #[rstest]
    #[case(EventKind::Modify(ModifyKind::Data(DataChange::Content)))]
    #[case(EventKind::Modify(ModifyKind::Any))]
    #[case(EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime)))]
    #[case(EventKind::Access(AccessKind::Close(AccessMode::Write)))]
    fn file_writes_become_modifications(fixture: Fixture, #[case] kind: EventKind) {
        let path = fixture.source.path().join("a.txt");
        fs::write(&path, "a").unwrap();

        let events = fixture.translator.translate(event(kind, &[&path]));

        assert_eq!(
            events,
            vec![NotificationEvent::modified(EntryKind::File, path)]
        );
    }

    #[rstest]
    fn directory_modification_is_ignored(fixture: Fixture) {
        let path = fixture.source.path().join("d");
        fs::create_dir(&path).unwrap();

        let events = fixture
            .translator
            .translate(event(EventKind::Modify(ModifyKind::Any), &[&path]));

        assert!(events.is_empty());
    }

    #[rstest]
    fn rename_within_source_is_delete_then_create(fixture: Fixture) {
        let from = fixture.source.path().join("old.txt");
        let to = fixture.source.path().join("new.txt");
        fs::write(&to, "a").unwrap();
        fs::write(fixture.replica.path().join("old.txt"), "a").unwrap();

        let events = fixture.translator.translate(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &[&from, &to],
        ));

        assert_eq!(
            events,
            vec![
                NotificationEvent::deleted(EntryKind::File, from),
                NotificationEvent::created(EntryKind::File, to),
            ]
        );
    }

    #[rstest]
    fn rename_halves_map_to_delete_and_create(fixture: Fixture) {
        let from = fixture.source.path().join("gone");
        let to = fixture.source.path().join("arrived");
        fs::create_dir(&to).unwrap();
        fs::create_dir(fixture.replica.path().join("gone")).unwrap();

        let mut events = fixture.translator.translate(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &[&from],
        ));
        events.extend(fixture.translator.translate(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            &[&to],
        )));

        assert_eq!(
            events,
            vec![
                NotificationEvent::deleted(EntryKind::Directory, from),
                NotificationEvent::created(EntryKind::Directory, to),
            ]
        );
    }

    #[rstest]
    #[case(RemoveKind::File, EntryKind::File)]
    #[case(RemoveKind::Folder, EntryKind::Directory)]
    fn typed_removal_is_taken_as_reported(
        fixture: Fixture,
        #[case] kind: RemoveKind,
        #[case] expected: EntryKind,
    ) {
        let path = fixture.source.path().join("x");

        let events = fixture
            .translator
            .translate(event(EventKind::Remove(kind), &[&path]));

        assert_eq!(events, vec![NotificationEvent::deleted(expected, path)]);
    }

    #[rstest]
    fn untyped_removal_is_resolved_from_the_replica(fixture: Fixture) {
        let directory = fixture.source.path().join("d");
        let file = fixture.source.path().join("f.txt");
        fs::create_dir(fixture.replica.path().join("d")).unwrap();

        let events = fixture.translator.translate(event(
            EventKind::Remove(RemoveKind::Any),
            &[&directory, &file],
        ));

        assert_eq!(
            events,
            vec![
                NotificationEvent::deleted(EntryKind::Directory, directory),
                NotificationEvent::deleted(EntryKind::File, file),
            ]
        );
    }

    #[cfg(unix)]
    #[rstest]
    fn links_are_reported_as_links_on_both_sides(fixture: Fixture) {
        let created = fixture.source.path().join("link");
        let removed = fixture.source.path().join("stale");
        std::os::unix::fs::symlink("missing", &created).unwrap();
        std::os::unix::fs::symlink("missing", fixture.replica.path().join("stale")).unwrap();

        let mut events = fixture
            .translator
            .translate(event(EventKind::Create(CreateKind::Any), &[&created]));
        events.extend(
            fixture
                .translator
                .translate(event(EventKind::Remove(RemoveKind::Any), &[&removed])),
        );

        assert_eq!(
            events,
            vec![
                NotificationEvent::created(EntryKind::Symlink, created),
                NotificationEvent::deleted(EntryKind::Symlink, removed),
            ]
        );
    }

    #[rstest]
    #[case(EventKind::Access(AccessKind::Read))]
    #[case(EventKind::Access(AccessKind::Open(AccessMode::Any)))]
    #[case(EventKind::Any)]
    #[case(EventKind::Other)]
    fn uninteresting_events_are_dropped(fixture: Fixture, #[case] kind: EventKind) {
        let path = fixture.source.path().join("a.txt");
        fs::write(&path, "a").unwrap();

        assert!(fixture.translator.translate(event(kind, &[&path])).is_empty());
    }
}
