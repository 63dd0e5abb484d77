use std::error::Error;
use std::path::Path;

use snafu::Report;
use tracing::{debug, error, info, warn};

use crate::ext::SystemTimeExt;
use crate::filesystem::MirrorPath;
use crate::journal::ActionRecord;
use crate::reconcile::{ChangeAction, PassReport};

/// Receiver of everything observable the engine does.
pub trait ActivitySink: Send + Sync {
    /// A mutation was applied to the replica.
    fn applied(&self, record: &ActionRecord);
    /// A source entry was classified by the change detector.
    fn classified(&self, target: &MirrorPath, action: &ChangeAction);
    /// Something unexpected but harmless happened.
    fn warned(&self, path: &Path, message: &str);
    /// An operation failed; the caller carries on.
    fn failed(&self, operation: &str, path: &Path, error: &dyn Error);
    /// A polling pass ran to completion.
    fn pass_finished(&self, report: &PassReport);
}

/// Production sink writing structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ActivitySink for TracingSink {
    fn applied(&self, record: &ActionRecord) {
        info!(
            action = %record.kind,
            relative = %record.relative,
            source = %record.source.display(),
            destination = %record.destination.display(),
            at = record.at.unix_millis() as u64,
            "{} '{}'",
            record.kind,
            record.relative
        );
    }

    fn classified(&self, target: &MirrorPath, action: &ChangeAction) {
        match action {
            ChangeAction::NoOp => {
                debug!(relative = %target.relative, "'{}' is up to date", target.relative)
            }
            _ => info!(
                change = %action,
                relative = %target.relative,
                source = %target.source.display(),
                destination = %target.destination.display(),
                "Detected {} of '{}'",
                action,
                target.relative
            ),
        }
    }

    fn warned(&self, path: &Path, message: &str) {
        warn!(path = %path.display(), "{message}");
    }

    fn failed(&self, operation: &str, path: &Path, error: &dyn Error) {
        error!(
            operation,
            path = %path.display(),
            "{} failed: {}",
            operation,
            Report::from_error(error)
        );
    }

    fn pass_finished(&self, report: &PassReport) {
        if report.mutations() == 0 && report.failed == 0 {
            debug!("Replica already in sync ({} entries unchanged)", report.unchanged);
        } else {
            info!(
                created = report.created,
                updated = report.updated,
                removed = report.removed,
                unchanged = report.unchanged,
                failed = report.failed,
                "Synchronization pass finished"
            );
        }
    }
}
