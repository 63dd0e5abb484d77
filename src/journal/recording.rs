use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::filesystem::{MirrorPath, RelativePath};
use crate::journal::{ActionKind, ActionRecord, ActivitySink};
use crate::reconcile::{ChangeAction, PassReport};

/// Sink that keeps everything in memory for assertions.
#[derive(Debug, Default)]
pub struct RecordingSink {
    records: Mutex<Vec<ActionRecord>>,
    classified: Mutex<Vec<(RelativePath, String)>>,
    warnings: Mutex<Vec<PathBuf>>,
    failures: Mutex<Vec<(String, PathBuf)>>,
    reports: Mutex<Vec<PassReport>>,
}

impl RecordingSink {
    pub fn records(&self) -> Vec<ActionRecord> {
        self.records.lock().unwrap().clone()
    }

    /// `(kind, relative path)` pairs in the order they were applied.
    pub fn actions(&self) -> Vec<(ActionKind, String)> {
        self.records()
            .into_iter()
            .map(|record| (record.kind, record.relative.to_string()))
            .collect()
    }

    pub fn classified(&self) -> Vec<(RelativePath, String)> {
        self.classified.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> Vec<PathBuf> {
        self.warnings.lock().unwrap().clone()
    }

    pub fn failures(&self) -> Vec<(String, PathBuf)> {
        self.failures.lock().unwrap().clone()
    }

    pub fn reports(&self) -> Vec<PassReport> {
        self.reports.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.records.lock().unwrap().clear();
        self.classified.lock().unwrap().clear();
        self.warnings.lock().unwrap().clear();
        self.failures.lock().unwrap().clear();
        self.reports.lock().unwrap().clear();
    }
}

impl ActivitySink for RecordingSink {
    fn applied(&self, record: &ActionRecord) {
        self.records.lock().unwrap().push(record.clone());
    }

    fn classified(&self, target: &MirrorPath, action: &ChangeAction) {
        self.classified
            .lock()
            .unwrap()
            .push((target.relative.clone(), action.to_string()));
    }

    fn warned(&self, path: &Path, _message: &str) {
        self.warnings.lock().unwrap().push(path.to_path_buf());
    }

    fn failed(&self, operation: &str, path: &Path, _error: &dyn Error) {
        self.failures
            .lock()
            .unwrap()
            .push((operation.to_string(), path.to_path_buf()));
    }

    fn pass_finished(&self, report: &PassReport) {
        self.reports.lock().unwrap().push(report.clone());
    }
}
