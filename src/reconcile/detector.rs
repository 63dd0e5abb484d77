use snafu::{ResultExt, Snafu};

use crate::ext::AsyncTryFrom;
use crate::filesystem::{ContentHash, Entry, EntryKind, FingerprintError};
use crate::reconcile::ChangeAction;

/// Decides what a source entry needs given its replica counterpart.
pub trait ChangeDetector {
    async fn classify(
        &self,
        source: &Entry,
        replica: Option<&Entry>,
    ) -> Result<ChangeAction, DetectError>;
}

/// Shared rules: a missing (or differently typed) replica entry needs a
/// create, and directories are never updated.
fn classify_presence(source: &Entry, replica: Option<&Entry>) -> Option<ChangeAction> {
    match replica {
        None => Some(ChangeAction::Create(source.clone())),
        Some(replica) if replica.kind != source.kind => Some(ChangeAction::Create(source.clone())),
        Some(_) if source.kind == EntryKind::Directory => Some(ChangeAction::NoOp),
        Some(_) => None,
    }
}

/// Compares modification times only. An unknown time never matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampDetector;

impl ChangeDetector for TimestampDetector {
    async fn classify(
        &self,
        source: &Entry,
        replica: Option<&Entry>,
    ) -> Result<ChangeAction, DetectError> {
        if let Some(action) = classify_presence(source, replica) {
            return Ok(action);
        }
        let replica_modified = replica.and_then(|replica| replica.modified);

        match (source.modified, replica_modified) {
            (Some(source_time), Some(replica_time)) if source_time == replica_time => {
                Ok(ChangeAction::NoOp)
            }
            _ => Ok(ChangeAction::Update(source.clone())),
        }
    }
}

/// Compares SHA-256 digests of both files' content.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHashDetector;

impl ChangeDetector for ContentHashDetector {
    async fn classify(
        &self,
        source: &Entry,
        replica: Option<&Entry>,
    ) -> Result<ChangeAction, DetectError> {
        if let Some(action) = classify_presence(source, replica) {
            return Ok(action);
        }
        let Some(replica) = replica else {
            return Ok(ChangeAction::Create(source.clone()));
        };

        let source_hash = ContentHash::async_try_from(source.path.as_path())
            .await
            .context(SourceDigestSnafu)?;
        let replica_hash = ContentHash::async_try_from(replica.path.as_path())
            .await
            .context(ReplicaDigestSnafu)?;

        if source_hash == replica_hash {
            Ok(ChangeAction::NoOp)
        } else {
            Ok(ChangeAction::Update(source.clone()))
        }
    }
}

/// The configured change detection policy.
#[derive(Debug, Clone, Copy)]
pub enum DetectionStrategy {
    Timestamp(TimestampDetector),
    ContentHash(ContentHashDetector),
}

impl Default for DetectionStrategy {
    fn default() -> Self {
        DetectionStrategy::Timestamp(TimestampDetector)
    }
}

impl ChangeDetector for DetectionStrategy {
    async fn classify(
        &self,
        source: &Entry,
        replica: Option<&Entry>,
    ) -> Result<ChangeAction, DetectError> {
        match self {
            DetectionStrategy::Timestamp(detector) => detector.classify(source, replica).await,
            DetectionStrategy::ContentHash(detector) => detector.classify(source, replica).await,
        }
    }
}

#[derive(Debug, Snafu)]
pub enum DetectError {
    #[snafu(display("Failed to digest source file"))]
    SourceDigestError { source: FingerprintError },
    #[snafu(display("Failed to digest replica file"))]
    ReplicaDigestError { source: FingerprintError },
}
