use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use derive_more::Display;
use snafu::{ResultExt, Snafu};
use tracing::debug;

use crate::ext::BestEffortPathExt;
use crate::filesystem::{
    Entry, EntryKind, MirrorPath, RelativePath, ScanError, Scanner, SyncRoots, Tree,
};
use crate::journal::ActivitySink;
use crate::reconcile::{
    Applier, ApplyError, ChangeAction, ChangeDetector, DetectionStrategy, Mutation, Pruner,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ReconcilerState {
    #[display("idle")]
    Idle,
    #[display("syncing")]
    Syncing,
}

/// Counters for one synchronization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl PassReport {
    /// Number of applied replica mutations.
    pub fn mutations(&self) -> usize {
        self.created + self.updated + self.removed
    }
}

/// Converges the replica onto the source with full-tree passes.
pub struct PollingReconciler {
    roots: SyncRoots,
    detector: DetectionStrategy,
    interval: Duration,
    scanner: Scanner,
    applier: Applier,
    sink: Arc<dyn ActivitySink>,
    state: ReconcilerState,
}

impl PollingReconciler {
    pub fn new(
        roots: SyncRoots,
        detector: DetectionStrategy,
        interval: Duration,
        sink: Arc<dyn ActivitySink>,
    ) -> Self {
        Self {
            roots,
            detector,
            interval,
            scanner: Scanner::new(sink.clone()),
            applier: Applier::new(sink.clone()),
            sink,
            state: ReconcilerState::Idle,
        }
    }

    pub fn state(&self) -> ReconcilerState {
        self.state
    }

    /// Runs passes forever, one per interval. Failed passes are reported and
    /// retried on the next tick.
    pub async fn run(&mut self) {
        loop {
            self.tick().await;
            debug!("Sleeping {:?} until next pass", self.interval);
            compio::time::sleep(self.interval).await;
        }
    }

    /// Runs one pass and reports its outcome to the sink.
    pub async fn tick(&mut self) {
        match self.sync().await {
            Ok(report) => self.sink.pass_finished(&report),
            Err(error) => self
                .sink
                .failed("synchronization pass", &self.roots.source, &error),
        }
    }

    pub async fn sync(&mut self) -> Result<PassReport, PassError> {
        self.state = ReconcilerState::Syncing;
        debug!("Reconciler is {}", self.state);
        let result = self.run_pass().await;
        self.state = ReconcilerState::Idle;
        debug!("Reconciler is {}", self.state);
        result
    }

    async fn run_pass(&self) -> Result<PassReport, PassError> {
        let source_tree = self
            .scanner
            .scan(&self.roots.source)
            .context(SourceScanSnafu)?;
        self.ensure_replica_root().await?;
        let replica_tree = self
            .scanner
            .scan_replica(&self.roots.replica)
            .context(ReplicaScanSnafu)?;

        let mut report = PassReport::default();

        // Scan order puts every directory before its children.
        for entry in source_tree.iter() {
            self.converge_entry(entry, &replica_tree, &mut report).await;
        }

        for action in Pruner::prune(&source_tree, &replica_tree) {
            if let ChangeAction::Remove(relative) = action {
                self.remove_stale(&relative, &replica_tree, &mut report)
                    .await;
            }
        }

        Ok(report)
    }

    async fn ensure_replica_root(&self) -> Result<(), PassError> {
        let replica = &self.roots.replica;
        if compio::fs::metadata(replica).await.is_ok() {
            return Ok(());
        }
        self.sink
            .warned(replica, "Replica root is missing, recreating it");
        compio::fs::create_dir_all(replica)
            .await
            .context(ReplicaRootSnafu {
                path: replica.clone(),
            })
    }

    async fn converge_entry(
        &self,
        entry: &Entry,
        replica_tree: &Tree,
        report: &mut PassReport,
    ) {
        let target = self.roots.mirror(&entry.relative);
        let mut replica_entry = replica_tree.get(&entry.relative);

        if let Some(existing) = replica_entry.filter(|existing| existing.kind != entry.kind) {
            match self.remove_entry(existing.kind, &target).await {
                Ok(Mutation::Applied) => report.removed += 1,
                Ok(Mutation::AlreadyInPlace) => {}
                Err(error) => {
                    self.sink.failed("replace", &target.destination, &error);
                    report.failed += 1;
                    return;
                }
            }
            replica_entry = None;
        }

        let action = match self.detector.classify(entry, replica_entry).await {
            Ok(action) => action,
            Err(error) => {
                self.sink.failed("classify", &entry.path, &error);
                report.failed += 1;
                return;
            }
        };
        self.sink.classified(&target, &action);

        let outcome = match &action {
            ChangeAction::Create(created) if created.is_dir() => {
                self.applier.create_directory(&target).await
            }
            ChangeAction::Create(_) | ChangeAction::Update(_) => {
                self.applier.copy_file(&target).await
            }
            ChangeAction::Remove(_) | ChangeAction::NoOp => {
                report.unchanged += 1;
                return;
            }
        };

        match outcome {
            Ok(Mutation::Applied) if matches!(action, ChangeAction::Update(_)) => {
                report.updated += 1
            }
            Ok(Mutation::Applied) => report.created += 1,
            Ok(Mutation::AlreadyInPlace) => report.unchanged += 1,
            Err(error) => {
                self.sink.failed(&action.to_string(), &target.destination, &error);
                report.failed += 1;
            }
        }
    }

    async fn remove_stale(
        &self,
        relative: &RelativePath,
        replica_tree: &Tree,
        report: &mut PassReport,
    ) {
        let Some(existing) = replica_tree.get(relative) else {
            return;
        };
        let target = self.roots.mirror(relative);

        match self.remove_entry(existing.kind, &target).await {
            Ok(Mutation::Applied) => report.removed += 1,
            Ok(Mutation::AlreadyInPlace) => {}
            Err(error) => {
                self.sink.failed("remove", &target.destination, &error);
                report.failed += 1;
            }
        }
    }

    async fn remove_entry(
        &self,
        kind: EntryKind,
        target: &MirrorPath,
    ) -> Result<Mutation, ApplyError> {
        match kind {
            EntryKind::File | EntryKind::Symlink => self.applier.remove_file(target).await,
            EntryKind::Directory => self.applier.remove_directory_tree(target).await,
        }
    }
}

#[derive(Debug, Snafu)]
pub enum PassError {
    #[snafu(display("Failed to scan the source tree"))]
    SourceScanError { source: ScanError },
    #[snafu(display("Failed to recreate replica root {}", path.best_effort_path_display()))]
    ReplicaRootError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to scan the replica tree"))]
    ReplicaScanError { source: ScanError },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::{ActionKind, RecordingSink};
    use crate::reconcile::{ContentHashDetector, TimestampDetector};
    use rstest::*;
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::Path;
    use std::time::SystemTime;
    use tempfile::TempDir;
    use walkdir::WalkDir;

    struct Fixture {
        source: TempDir,
        replica: TempDir,
        sink: Arc<RecordingSink>,
        reconciler: PollingReconciler,
    }

    fn fixture(detector: DetectionStrategy) -> Fixture {
        let source = TempDir::new().expect("Failed to create source directory");
        let replica = TempDir::new().expect("Failed to create replica directory");
        let sink = Arc::new(RecordingSink::default());
        let reconciler = PollingReconciler::new(
            SyncRoots::new(source.path(), replica.path()),
            detector,
            Duration::from_secs(1),
            sink.clone(),
        );
        Fixture {
            source,
            replica,
            sink,
            reconciler,
        }
    }

    fn timestamp() -> DetectionStrategy {
        DetectionStrategy::Timestamp(TimestampDetector)
    }

    fn content_hash() -> DetectionStrategy {
        DetectionStrategy::ContentHash(ContentHashDetector)
    }

    /// Builds a tree from `path` / `path/` (directory) entries; file content is
    /// the path itself.
    fn populate(root: &Path, layout: &[&str]) {
        for item in layout {
            let path = root.join(item.trim_end_matches('/'));
            if item.ends_with('/') {
                fs::create_dir_all(&path).unwrap();
            } else {
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(&path, item).unwrap();
            }
        }
    }

    fn write_file(root: &Path, relative: &str, content: &str, modified: Option<SystemTime>) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        if let Some(modified) = modified {
            touch(&path, modified);
        }
    }

    fn touch(path: &Path, modified: SystemTime) {
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(modified)
            .unwrap();
    }

    /// Relative path to file content (`None` for directories).
    fn snapshot(root: &Path) -> BTreeMap<String, Option<Vec<u8>>> {
        WalkDir::new(root)
            .min_depth(1)
            .into_iter()
            .map(|entry| entry.unwrap())
            .map(|entry| {
                let relative = entry.path().strip_prefix(root).unwrap().display().to_string();
                let content = entry
                    .file_type()
                    .is_file()
                    .then(|| fs::read(entry.path()).unwrap());
                (relative, content)
            })
            .collect()
    }

    fn actions(pairs: &[(ActionKind, &str)]) -> Vec<(ActionKind, String)> {
        pairs
            .iter()
            .map(|(kind, relative)| (*kind, relative.to_string()))
            .collect()
    }

    #[compio::test]
    async fn directory_is_created_before_its_file() {
        let mut fixture = fixture(timestamp());
        write_file(fixture.source.path(), "a/b.txt", "x", None);

        let report = fixture.reconciler.sync().await.unwrap();

        assert_eq!(
            fixture.sink.actions(),
            actions(&[
                (ActionKind::CreateDirectory, "a"),
                (ActionKind::CopyFile, "a/b.txt")
            ])
        );
        assert_eq!(
            fs::read_to_string(fixture.replica.path().join("a/b.txt")).unwrap(),
            "x"
        );
        assert_eq!(report.created, 2);
        assert_eq!(fixture.reconciler.state(), ReconcilerState::Idle);
    }

    #[compio::test]
    async fn changed_timestamp_triggers_update() {
        let mut fixture = fixture(timestamp());
        let first = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        write_file(fixture.source.path(), "b.txt", "x", Some(first));
        fixture.reconciler.sync().await.unwrap();
        fixture.sink.clear();

        let second = first + Duration::from_secs(10);
        write_file(fixture.source.path(), "b.txt", "y", Some(second));
        let report = fixture.reconciler.sync().await.unwrap();

        assert_eq!(report.updated, 1);
        assert_eq!(
            fixture.sink.actions(),
            actions(&[(ActionKind::CopyFile, "b.txt")])
        );
        assert_eq!(
            fs::read_to_string(fixture.replica.path().join("b.txt")).unwrap(),
            "y"
        );
    }

    #[rstest]
    #[case::timestamp(timestamp(), 1)]
    #[case::content_hash(content_hash(), 0)]
    #[compio::test]
    async fn touch_without_content_change(
        #[case] detector: DetectionStrategy,
        #[case] expected_copies: usize,
    ) {
        let mut fixture = fixture(detector);
        let first = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        write_file(fixture.source.path(), "b.txt", "y", Some(first));
        fixture.reconciler.sync().await.unwrap();
        fixture.sink.clear();

        touch(
            &fixture.source.path().join("b.txt"),
            first + Duration::from_secs(60),
        );
        let report = fixture.reconciler.sync().await.unwrap();

        assert_eq!(report.updated, expected_copies);
        assert_eq!(fixture.sink.records().len(), expected_copies);
    }

    #[compio::test]
    async fn stale_replica_file_is_removed() {
        let mut fixture = fixture(timestamp());
        write_file(fixture.replica.path(), "stale.txt", "old", None);

        let report = fixture.reconciler.sync().await.unwrap();

        assert_eq!(
            fixture.sink.actions(),
            actions(&[(ActionKind::RemoveFile, "stale.txt")])
        );
        assert!(!fixture.replica.path().join("stale.txt").exists());
        assert_eq!(report.removed, 1);
    }

    #[cfg(unix)]
    #[compio::test]
    async fn replica_links_are_replaced_or_removed_without_touching_their_targets() {
        let mut fixture = fixture(timestamp());
        let outside = TempDir::new().expect("Failed to create temp directory");
        let victim = outside.path().join("victim.txt");
        fs::write(&victim, "victim").unwrap();
        std::os::unix::fs::symlink(&victim, fixture.replica.path().join("x")).unwrap();
        std::os::unix::fs::symlink(&victim, fixture.replica.path().join("stale")).unwrap();
        write_file(fixture.source.path(), "x", "from source", None);

        let report = fixture.reconciler.sync().await.unwrap();

        assert_eq!(fs::read_to_string(&victim).unwrap(), "victim");
        let replaced = fs::symlink_metadata(fixture.replica.path().join("x")).unwrap();
        assert!(replaced.is_file());
        assert_eq!(
            fs::read_to_string(fixture.replica.path().join("x")).unwrap(),
            "from source"
        );
        assert!(fs::symlink_metadata(fixture.replica.path().join("stale")).is_err());
        assert_eq!(report.created, 1);
        assert_eq!(report.removed, 2);
        assert_eq!(report.failed, 0);
    }

    #[compio::test]
    async fn removed_directory_children_go_first() {
        let mut fixture = fixture(timestamp());
        populate(
            fixture.source.path(),
            &["d/", "d/a.txt", "d/e/", "d/e/f.txt", "keep.txt"],
        );
        fixture.reconciler.sync().await.unwrap();
        fixture.sink.clear();

        fs::remove_dir_all(fixture.source.path().join("d")).unwrap();
        fixture.reconciler.sync().await.unwrap();

        assert_eq!(
            fixture.sink.actions(),
            actions(&[
                (ActionKind::RemoveFile, "d/e/f.txt"),
                (ActionKind::RemoveFile, "d/a.txt"),
                (ActionKind::RemoveDirectoryTree, "d/e"),
                (ActionKind::RemoveDirectoryTree, "d"),
            ])
        );
        assert_eq!(
            snapshot(fixture.replica.path()),
            snapshot(fixture.source.path())
        );
    }

    #[rstest]
    #[case::flat(&["a.txt", "b.txt"])]
    #[case::nested(&["a/", "a/b/", "a/b/c.txt", "a/d.txt", "e.txt"])]
    #[case::empty_dirs(&["x/", "x/y/", "z/"])]
    #[case::empty(&[])]
    #[compio::test]
    async fn second_pass_applies_nothing(
        #[case] layout: &[&str],
        #[values(timestamp(), content_hash())] detector: DetectionStrategy,
    ) {
        let mut fixture = fixture(detector);
        populate(fixture.source.path(), layout);
        fixture.reconciler.sync().await.unwrap();
        fixture.sink.clear();

        let report = fixture.reconciler.sync().await.unwrap();

        assert_eq!(report.mutations(), 0);
        assert_eq!(report.failed, 0);
        assert!(fixture.sink.records().is_empty());
    }

    #[rstest]
    #[case::into_empty(&["a/", "a/b.txt", "c.txt"], &[])]
    #[case::prune_and_create(&["a/", "a/b.txt"], &["old/", "old/x.txt", "y.txt"])]
    #[case::overlapping(&["a/", "a/b.txt", "a/c/"], &["a/", "a/b.txt", "a/c/", "a/c/d.txt"])]
    #[case::source_empty(&[], &["p/", "p/q/", "p/q/r.txt"])]
    #[case::file_replaces_directory(&["x"], &["x/", "x/y.txt"])]
    #[case::directory_replaces_file(&["x/", "x/y.txt"], &["x"])]
    #[compio::test]
    async fn pass_converges_replica_to_source(
        #[case] source_layout: &[&str],
        #[case] replica_layout: &[&str],
        #[values(timestamp(), content_hash())] detector: DetectionStrategy,
    ) {
        let mut fixture = fixture(detector);
        populate(fixture.source.path(), source_layout);
        populate(fixture.replica.path(), replica_layout);

        let report = fixture.reconciler.sync().await.unwrap();

        assert_eq!(report.failed, 0, "failures: {:?}", fixture.sink.failures());
        assert_eq!(
            snapshot(fixture.replica.path()),
            snapshot(fixture.source.path())
        );
    }

    #[compio::test]
    async fn replica_content_divergence_is_repaired_by_hash() {
        let mut fixture = fixture(content_hash());
        let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        write_file(fixture.source.path(), "b.txt", "source", Some(modified));
        write_file(fixture.replica.path(), "b.txt", "tampered", Some(modified));

        let report = fixture.reconciler.sync().await.unwrap();

        assert_eq!(report.updated, 1);
        assert_eq!(
            fs::read_to_string(fixture.replica.path().join("b.txt")).unwrap(),
            "source"
        );
    }

    #[compio::test]
    async fn every_source_entry_is_classified() {
        let mut fixture = fixture(timestamp());
        populate(fixture.source.path(), &["a/", "a/b.txt"]);

        fixture.reconciler.sync().await.unwrap();

        let classified: Vec<String> = fixture
            .sink
            .classified()
            .into_iter()
            .map(|(relative, action)| format!("{relative}:{action}"))
            .collect();
        assert_eq!(classified, vec!["a:create", "a/b.txt:create"]);
    }

    #[compio::test]
    async fn missing_source_root_fails_only_the_pass() {
        let mut fixture = fixture(timestamp());
        let source_root = fixture.source.path().to_path_buf();
        fs::remove_dir_all(&source_root).unwrap();

        let result = fixture.reconciler.sync().await;
        assert!(matches!(result, Err(PassError::SourceScanError { .. })));
        assert_eq!(fixture.reconciler.state(), ReconcilerState::Idle);

        fixture.reconciler.tick().await;
        assert_eq!(
            fixture.sink.failures(),
            vec![("synchronization pass".to_string(), source_root)]
        );
        assert!(fixture.sink.records().is_empty());
    }

    #[compio::test]
    async fn missing_replica_root_is_recreated() {
        let mut fixture = fixture(timestamp());
        populate(fixture.source.path(), &["a.txt"]);
        fs::remove_dir_all(fixture.replica.path()).unwrap();

        fixture.reconciler.sync().await.unwrap();

        assert_eq!(
            snapshot(fixture.replica.path()),
            snapshot(fixture.source.path())
        );
        assert_eq!(
            fixture.sink.warnings(),
            vec![fixture.replica.path().to_path_buf()]
        );
    }

    #[compio::test]
    async fn successful_tick_reports_the_pass() {
        let mut fixture = fixture(timestamp());
        populate(fixture.source.path(), &["a.txt"]);

        fixture.reconciler.tick().await;

        let reports = fixture.sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].created, 1);
    }
}
